//! Web server command.

use console::style;

use crate::config::Settings;

/// Start the web server. Flags override the configured bind address.
pub async fn cmd_serve(
    mut settings: Settings,
    host: Option<String>,
    port: Option<u16>,
) -> anyhow::Result<()> {
    if let Some(host) = host {
        settings.host = host;
    }
    if let Some(port) = port {
        settings.port = port;
    }

    println!(
        "{} Starting pricescout at http://{}:{}",
        style("→").cyan(),
        settings.host,
        settings.port
    );
    if settings.browser.remote_url.is_none() && !settings.browser.headless {
        println!("  {} Browser windows will be visible", style("!").yellow());
    }
    println!("  Press Ctrl+C to stop");

    let (host, port) = (settings.host.clone(), settings.port);
    crate::server::serve(&settings, &host, port).await
}
