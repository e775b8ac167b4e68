//! One-off search command.

use std::path::Path;

use anyhow::Context;
use console::style;

use crate::config::Settings;
use crate::driver::{ChromeLauncher, SnapshotLauncher};
use crate::humanize::Humanizer;
use crate::models::{Marketplace, ScrapeResult, SearchRequest, SearchResponse};
use crate::scrapers::{bridge, MarketplaceScraper, ScraperRegistry};
use crate::snapshot::snapshots_from_result;

pub async fn cmd_search(
    settings: &Settings,
    marketplace: &str,
    keyword: &str,
    limit: Option<i64>,
    html: Option<&Path>,
    snapshot: bool,
) -> anyhow::Result<()> {
    let marketplace = Marketplace::from_str(marketplace)
        .ok_or_else(|| anyhow::anyhow!("Unknown marketplace '{}'", marketplace))?;
    let request = SearchRequest::new(keyword, limit)?;

    let result = match html {
        Some(path) => {
            let page = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            let scraper = MarketplaceScraper::new(
                marketplace,
                settings.scraper.clone(),
                SnapshotLauncher::new(page),
            )
            .with_humanizer(Humanizer::disabled());
            scraper.scrape(&request.keyword, request.limit).await
        }
        None => {
            let launcher = ChromeLauncher::new(settings.browser.clone())
                .with_language(settings.scraper.aliexpress_lang.clone());
            let search = ScraperRegistry::from_settings(settings, launcher)
                .get(marketplace)
                .ok_or_else(|| anyhow::anyhow!("No search available for {}", marketplace))?;
            let SearchRequest { keyword, limit } = request.clone();
            bridge::run(async move { search.search(&keyword, limit).await }).await?
        }
    };

    print_result(&result, &request, marketplace, snapshot)
}

fn print_result(
    result: &ScrapeResult,
    request: &SearchRequest,
    marketplace: Marketplace,
    snapshot: bool,
) -> anyhow::Result<()> {
    if !result.is_success() {
        eprintln!(
            "{} {} search failed: {}",
            style("✗").red(),
            marketplace,
            result.error().unwrap_or("unknown error")
        );
    }

    let json = if snapshot {
        let snapshots = snapshots_from_result(result, &request.keyword, marketplace);
        serde_json::to_string_pretty(&snapshots)?
    } else {
        serde_json::to_string_pretty(&SearchResponse::from(result.clone()))?
    };
    println!("{}", json);

    if result.is_success() {
        eprintln!(
            "{} {} item(s) from {} ({} reported)",
            style("✓").green(),
            result.items().len(),
            marketplace,
            result.total()
        );
    }
    Ok(())
}
