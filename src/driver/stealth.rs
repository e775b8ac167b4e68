//! Bot-detection countermeasures applied to Chrome sessions.

/// Chrome flags that hide the most common automation fingerprints.
pub(crate) const STEALTH_ARGS: &[&str] = &[
    "--disable-blink-features=AutomationControlled",
    "--disable-infobars",
    "--disable-dev-shm-usage",
    "--no-first-run",
    "--no-default-browser-check",
    "--disable-background-networking",
    "--disable-sync",
    "--disable-translate",
    "--no-sandbox",
    "--disable-gpu",
    "--window-size=1366,768",
];

const HIDE_WEBDRIVER: &str = r#"
Object.defineProperty(navigator, 'webdriver', { get: () => undefined, configurable: true });
"#;

const CHROME_RUNTIME: &str = r#"
if (!window.chrome) {
    window.chrome = { runtime: {}, loadTimes: function() {}, csi: function() {}, app: {} };
}
"#;

const NOTIFICATION_PERMISSION: &str = r#"
if (navigator.permissions && navigator.permissions.query) {
    const query = navigator.permissions.query.bind(navigator.permissions);
    navigator.permissions.query = (p) => p.name === 'notifications'
        ? Promise.resolve({ state: Notification.permission })
        : query(p);
}
"#;

const PLUGINS: &str = r#"
Object.defineProperty(navigator, 'plugins', {
    get: () => [
        { name: 'Chrome PDF Plugin', filename: 'internal-pdf-viewer', description: 'Portable Document Format' },
        { name: 'Chrome PDF Viewer', filename: 'mhjfbmdgcfjbbpaeojofohoefgiehjai', description: '' }
    ],
    configurable: true
});
"#;

const WEBGL_VENDOR: &str = r#"
if (window.WebGLRenderingContext) {
    const getParameter = WebGLRenderingContext.prototype.getParameter;
    WebGLRenderingContext.prototype.getParameter = function(p) {
        if (p === 37445) return 'Intel Inc.';
        if (p === 37446) return 'Intel Iris OpenGL Engine';
        return getParameter.call(this, p);
    };
}
"#;

/// Scripts evaluated in each page after it becomes ready.
///
/// `language` is the marketplace UI language (e.g. `en`, `ko`), reported
/// first in `navigator.languages`.
pub(crate) fn stealth_scripts(language: &str) -> Vec<String> {
    let languages = if language.eq_ignore_ascii_case("en") {
        "['en-US', 'en']".to_string()
    } else {
        format!("['{}', 'en-US', 'en']", language.replace('\'', ""))
    };

    let mut scripts: Vec<String> = [
        HIDE_WEBDRIVER,
        CHROME_RUNTIME,
        NOTIFICATION_PERMISSION,
        PLUGINS,
        WEBGL_VENDOR,
    ]
    .iter()
    .map(|s| s.to_string())
    .collect();

    scripts.push(format!(
        "Object.defineProperty(navigator, 'languages', {{ get: () => {}, configurable: true }});",
        languages
    ));
    scripts
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_languages_script_puts_locale_first() {
        let scripts = stealth_scripts("ko");
        let last = scripts.last().unwrap();
        assert!(last.contains("['ko', 'en-US', 'en']"));

        let scripts = stealth_scripts("en");
        assert!(scripts.last().unwrap().contains("['en-US', 'en']"));
    }
}
