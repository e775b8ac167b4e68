//! Product URL parsing command.

use crate::url_parser::parse_product_url;

pub fn cmd_parse_url(url: &str) -> anyhow::Result<()> {
    let parsed = parse_product_url(url);
    println!("{}", serde_json::to_string_pretty(&parsed)?);
    if !parsed.success {
        anyhow::bail!(parsed.error.unwrap_or_else(|| "Could not parse URL".to_string()));
    }
    Ok(())
}
