//! Search result scraping for a single marketplace.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, error, info, warn};

use super::profile::{resolve_link, FieldSelector, ItemIdSource, SiteProfile};
use crate::config::ScraperSettings;
use crate::driver::{PageSession, SessionLauncher, WaitOutcome};
use crate::error::{DriverError, ScrapeError};
use crate::humanize::{random_user_agent, Humanizer};
use crate::models::{ImageRef, Marketplace, ScrapeResult, ScrapedItem};
use crate::normalize::{
    clean_text, parse_discount, parse_price_opt, parse_rating, parse_sales, SalesCount, SeenItems,
};

static COUNT_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d[\d,.]*").unwrap());

/// Progress of one scrape, reported in logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrapeStage {
    Init,
    Launched,
    Navigated,
    WaitingResults,
    Extracting,
    Done,
    Failed,
}

impl fmt::Display for ScrapeStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ScrapeStage::Init => "init",
            ScrapeStage::Launched => "launched",
            ScrapeStage::Navigated => "navigated",
            ScrapeStage::WaitingResults => "waiting_results",
            ScrapeStage::Extracting => "extracting",
            ScrapeStage::Done => "done",
            ScrapeStage::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Parse a site-reported result count such as `"12,345 results for drone"`
/// or `"1-48 of over 10,000 results"`.
pub fn parse_result_count(text: &str) -> Option<usize> {
    let tail = match text.rfind(" of ") {
        Some(idx) => &text[idx + 4..],
        None => text,
    };
    let m = COUNT_RE.find(tail)?;
    let digits: String = m.as_str().chars().filter(|c| c.is_ascii_digit()).collect();
    digits.parse().ok()
}

/// Compact form of a sales count: `"1200"`, `"900+"`, or the raw text.
fn format_sales(count: SalesCount) -> String {
    match count {
        SalesCount::Exact(n) => n.to_string(),
        SalesCount::AtLeast(n) => format!("{}+", n),
        SalesCount::Raw(text) => text,
    }
}

/// Scrapes search results for one marketplace.
///
/// Every call to [`MarketplaceScraper::scrape`] launches its own session and
/// closes it before returning. Nothing is shared between calls.
pub struct MarketplaceScraper<L> {
    profile: &'static SiteProfile,
    settings: ScraperSettings,
    humanizer: Humanizer,
    launcher: L,
}

impl<L: SessionLauncher> MarketplaceScraper<L> {
    pub fn new(marketplace: Marketplace, settings: ScraperSettings, launcher: L) -> Self {
        let humanizer = settings.humanizer();
        let (min_delay, max_delay) = humanizer.bounds();
        debug!(%marketplace, ?min_delay, ?max_delay, "Created scraper");
        Self {
            profile: SiteProfile::for_marketplace(marketplace),
            settings,
            humanizer,
            launcher,
        }
    }

    pub fn with_humanizer(mut self, humanizer: Humanizer) -> Self {
        self.humanizer = humanizer;
        self
    }

    pub fn marketplace(&self) -> Marketplace {
        self.profile.marketplace
    }

    pub fn launcher(&self) -> &L {
        &self.launcher
    }

    pub fn search_url(&self, keyword: &str, limit: usize) -> String {
        self.profile.search_url(keyword, limit, &self.settings)
    }

    /// Scrape up to `limit` distinct items for `keyword`.
    ///
    /// Never fails: timeouts and browser errors come back as a failed
    /// [`ScrapeResult`].
    pub async fn scrape(&self, keyword: &str, limit: usize) -> ScrapeResult {
        let url = self.search_url(keyword, limit);
        let marketplace = self.profile.marketplace;
        info!(%marketplace, keyword, limit, "Starting scrape");

        let mut stage = ScrapeStage::Init;
        match self.run(&url, keyword, limit, &mut stage).await {
            Ok(result) => {
                info!(
                    %marketplace,
                    keyword,
                    items = result.items().len(),
                    total = result.total(),
                    "Scrape complete"
                );
                result
            }
            Err(e) => {
                error!(%marketplace, keyword, %stage, "Scrape failed: {}", e);
                ScrapeResult::failure(e.to_string())
            }
        }
    }

    async fn run(
        &self,
        url: &str,
        keyword: &str,
        limit: usize,
        stage: &mut ScrapeStage,
    ) -> Result<ScrapeResult, ScrapeError> {
        let mut session = self.launcher.launch().await?;
        *stage = ScrapeStage::Launched;

        let outcome = self.drive(&mut session, url, keyword, limit, stage).await;

        if let Err(e) = session.close().await {
            warn!(marketplace = %self.profile.marketplace, "Failed to close session: {}", e);
        }

        *stage = if outcome.is_ok() {
            ScrapeStage::Done
        } else {
            ScrapeStage::Failed
        };
        debug!(marketplace = %self.profile.marketplace, %stage, "Session closed");
        outcome
    }

    async fn drive(
        &self,
        session: &mut L::Session,
        url: &str,
        keyword: &str,
        limit: usize,
        stage: &mut ScrapeStage,
    ) -> Result<ScrapeResult, ScrapeError> {
        let profile = self.profile;
        let timeout = self.settings.timeout();

        self.humanizer.pause().await;
        session.set_user_agent(random_user_agent()).await?;
        session.navigate(url, timeout).await?;
        *stage = ScrapeStage::Navigated;

        *stage = ScrapeStage::WaitingResults;
        match session.wait_for_selector(profile.container, timeout).await? {
            WaitOutcome::Found => {}
            WaitOutcome::Missing => {
                warn!(
                    marketplace = %profile.marketplace,
                    selector = profile.container,
                    "Result container not found, continuing with page as-is"
                );
            }
            WaitOutcome::TimedOut => return Err(ScrapeError::Timeout),
        }
        self.humanizer.pause().await;

        *stage = ScrapeStage::Extracting;
        let nodes = session.query_all(profile.item).await?;
        debug!(marketplace = %profile.marketplace, nodes = nodes.len(), "Found result nodes");

        let reported_total = match profile.result_count {
            Some(selector) => session
                .page_text(selector)
                .await?
                .as_deref()
                .and_then(parse_result_count),
            None => None,
        };

        let keyword_lower = keyword.to_lowercase();
        let mut seen = SeenItems::new();
        let mut items = Vec::with_capacity(limit.min(nodes.len()));

        for node in &nodes {
            if items.len() >= limit {
                break;
            }

            let item = self.extract_item(session, node).await?;

            if item.is_unidentifiable() {
                debug!(marketplace = %profile.marketplace, "Skipping node without title or url");
                continue;
            }
            if let Some(ref title) = item.title {
                if profile.skip_titles.iter().any(|s| title == s) {
                    continue;
                }
            }
            if self.settings.require_keyword_in_title {
                let matches = item
                    .title
                    .as_deref()
                    .map(|t| t.to_lowercase().contains(&keyword_lower))
                    .unwrap_or(false);
                if !matches {
                    debug!(title = ?item.title, keyword, "Skipping item without keyword in title");
                    continue;
                }
            }
            if !seen.insert(&item) {
                debug!(title = ?item.title, "Dropping duplicate item");
                continue;
            }

            items.push(item);
        }

        Ok(ScrapeResult::success(items, reported_total))
    }

    async fn read_field(
        &self,
        session: &mut L::Session,
        node: &<L::Session as PageSession>::Node,
        field: &FieldSelector,
    ) -> Result<Option<String>, DriverError> {
        for selector in field.selectors {
            if field.attributes.is_empty() {
                let text = session.extract_text(node, selector).await?;
                if let Some(text) = clean_text(text.as_deref()) {
                    return Ok(Some(text));
                }
                continue;
            }
            for attribute in field.attributes {
                let value = session.extract_attribute(node, selector, attribute).await?;
                if let Some(value) = clean_text(value.as_deref()) {
                    return Ok(Some(value));
                }
            }
        }
        Ok(None)
    }

    async fn extract_item(
        &self,
        session: &mut L::Session,
        node: &<L::Session as PageSession>::Node,
    ) -> Result<ScrapedItem, DriverError> {
        let profile = self.profile;
        let base = profile.base_url(&self.settings);
        let currency = self.settings.default_currency.as_str();

        let title = self.read_field(session, node, &profile.title).await?.map(|t| {
            let mut title = t.as_str();
            for prefix in profile.title_prefixes {
                if let Some(rest) = title.strip_prefix(prefix) {
                    title = rest.trim_start();
                }
            }
            title.to_string()
        });
        let title = title.filter(|t| !t.is_empty());

        let item_web_url = self
            .read_field(session, node, &profile.url)
            .await?
            .and_then(|u| resolve_link(&base, &u));

        let raw_price = self.read_field(session, node, &profile.price).await?;
        let raw_original = self.read_field(session, node, &profile.original_price).await?;
        let raw_discount = self.read_field(session, node, &profile.discount).await?;
        let raw_rating = self.read_field(session, node, &profile.rating).await?;
        let raw_sales = self.read_field(session, node, &profile.sales).await?;
        let raw_reviews = self.read_field(session, node, &profile.reviews).await?;
        let condition = self.read_field(session, node, &profile.condition).await?;
        let category = self.read_field(session, node, &profile.category).await?;
        let image = self
            .read_field(session, node, &profile.image)
            .await?
            .and_then(|src| resolve_link(&base, &src))
            .map(|image_url| ImageRef { image_url });

        let item_id = match profile.item_id {
            ItemIdSource::NodeAttribute(attribute) => {
                let value = session.extract_attribute(node, "", attribute).await?;
                clean_text(value.as_deref())
            }
            ItemIdSource::FromUrl(parse) => item_web_url.as_deref().and_then(parse),
        };

        let mut item = ScrapedItem {
            item_id,
            title,
            price: parse_price_opt(raw_price.as_deref(), currency),
            original_price: parse_price_opt(raw_original.as_deref(), currency),
            discount: parse_discount(raw_discount.as_deref()).map(|d| format!("{}%", d)),
            rating: parse_rating(raw_rating.as_deref()).map(|r| r.to_string()),
            sales: parse_sales(raw_sales.as_deref()).map(format_sales),
            condition,
            category,
            image,
            item_web_url,
            ..Default::default()
        };

        if let Some(reviews) = parse_sales(raw_reviews.as_deref()).and_then(|c| c.lower_bound()) {
            item.extra
                .insert("reviews".to_string(), serde_json::json!(reviews.to_string()));
        }

        if item.price.is_none() && raw_price.is_some() {
            debug!(raw = ?raw_price, "Price text held no number");
        }

        Ok(item)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::{SnapshotBehavior, SnapshotLauncher};
    use crate::humanize::USER_AGENTS;

    fn ebay_node(i: usize, title: &str) -> String {
        format!(
            r#"<li class="s-item">
                 <div class="s-item__image-wrapper"><img src="https://i.ebayimg.com/{i}.jpg"></div>
                 <a class="s-item__link" href="https://www.ebay.com/itm/{id}?hash=x">
                   <div class="s-item__title"><span role="heading">{title}</span></div>
                 </a>
                 <span class="SECONDARY_INFO">Brand New</span>
                 <span class="s-item__price">$1{i}.99</span>
                 <span class="s-item__trending-price"><span class="STRIKETHROUGH">$2{i}.00</span></span>
                 <span class="s-item__discount">45% off</span>
                 <div class="x-star-rating"><span class="clipped">4.5 out of 5 stars.</span></div>
                 <span class="s-item__quantitySold">1.2k sold</span>
               </li>"#,
            i = i,
            id = 256_000_000_000u64 + i as u64,
            title = title
        )
    }

    fn ebay_page(nodes: &[String], count: &str) -> String {
        format!(
            r#"<html><body>
                 <h1 class="srp-controls__count-heading">{count}</h1>
                 <ul class="srp-results">{nodes}</ul>
               </body></html>"#,
            count = count,
            nodes = nodes.join("\n")
        )
    }

    fn scraper(launcher: SnapshotLauncher, settings: ScraperSettings) -> MarketplaceScraper<SnapshotLauncher> {
        MarketplaceScraper::new(Marketplace::Ebay, settings, launcher)
            .with_humanizer(Humanizer::disabled())
    }

    #[tokio::test]
    async fn test_extracts_and_normalizes_fields() {
        let nodes = vec![ebay_node(1, "New Listing Mini Drone"), ebay_node(2, "Camera Drone")];
        let launcher = SnapshotLauncher::new(ebay_page(&nodes, "1,234 results for drone"));
        let scraper = scraper(launcher.clone(), ScraperSettings::default());

        let result = scraper.scrape("drone", 5).await;
        assert!(result.is_success());
        assert_eq!(result.items().len(), 2);
        assert_eq!(result.total(), 1234);

        let first = &result.items()[0];
        assert_eq!(first.title.as_deref(), Some("Mini Drone"));
        assert_eq!(first.item_id.as_deref(), Some("256000000001"));
        assert_eq!(first.price.as_ref().and_then(|p| p.value.as_deref()), Some("11.99"));
        assert_eq!(first.price.as_ref().map(|p| p.currency.as_str()), Some("USD"));
        assert_eq!(
            first.original_price.as_ref().and_then(|p| p.value.as_deref()),
            Some("21.00")
        );
        assert_eq!(first.discount.as_deref(), Some("45%"));
        assert_eq!(first.rating.as_deref(), Some("4.5"));
        assert_eq!(first.sales.as_deref(), Some("1200"));
        assert_eq!(first.condition.as_deref(), Some("Brand New"));
        assert_eq!(
            first.image.as_ref().map(|i| i.image_url.as_str()),
            Some("https://i.ebayimg.com/1.jpg")
        );

        assert_eq!(launcher.open_sessions(), 0);
    }

    #[tokio::test]
    async fn test_limit_and_dedupe() {
        let mut nodes: Vec<String> = (1..=5).map(|i| ebay_node(i, &format!("Item {}", i))).collect();
        nodes.insert(1, ebay_node(1, "Item 1"));
        let launcher = SnapshotLauncher::new(ebay_page(&nodes, ""));
        let scraper = scraper(launcher, ScraperSettings::default());

        let result = scraper.scrape("item", 3).await;
        let titles: Vec<_> = result
            .items()
            .iter()
            .filter_map(|i| i.title.as_deref())
            .collect();
        assert_eq!(titles, vec!["Item 1", "Item 2", "Item 3"]);
        assert_eq!(result.total(), 3);
    }

    #[tokio::test]
    async fn test_skips_placeholder_and_unidentifiable_nodes() {
        let nodes = vec![
            ebay_node(1, "Shop on eBay"),
            r#"<li class="s-item"><span class="s-item__price">$5.00</span></li>"#.to_string(),
            ebay_node(2, "Real Drone"),
        ];
        let launcher = SnapshotLauncher::new(ebay_page(&nodes, ""));
        let result = scraper(launcher, ScraperSettings::default())
            .scrape("drone", 10)
            .await;
        assert_eq!(result.items().len(), 1);
        assert_eq!(result.items()[0].title.as_deref(), Some("Real Drone"));
    }

    #[tokio::test]
    async fn test_keyword_filter_does_not_consume_limit() {
        let nodes = vec![
            ebay_node(1, "Phone case"),
            ebay_node(2, "Drone A"),
            ebay_node(3, "Charger"),
            ebay_node(4, "drone B"),
        ];
        let settings = ScraperSettings {
            require_keyword_in_title: true,
            ..Default::default()
        };
        let launcher = SnapshotLauncher::new(ebay_page(&nodes, ""));
        let result = scraper(launcher, settings).scrape("Drone", 2).await;
        let titles: Vec<_> = result
            .items()
            .iter()
            .filter_map(|i| i.title.as_deref())
            .collect();
        assert_eq!(titles, vec!["Drone A", "drone B"]);
    }

    #[tokio::test]
    async fn test_timeout_fails_and_missing_container_succeeds() {
        let page = ebay_page(&[ebay_node(1, "Drone")], "");
        let launcher = SnapshotLauncher::new(page).with_behavior(SnapshotBehavior::SelectorTimeout);
        let result = scraper(launcher.clone(), ScraperSettings::default())
            .scrape("drone", 3)
            .await;
        assert!(!result.is_success());
        assert_eq!(result.error(), Some("timeout"));
        assert!(result.items().is_empty());
        assert_eq!(launcher.open_sessions(), 0);

        let launcher = SnapshotLauncher::new("<html><body><p>No results</p></body></html>");
        let result = scraper(launcher, ScraperSettings::default())
            .scrape("drone", 3)
            .await;
        assert!(result.is_success());
        assert!(result.items().is_empty());
        assert_eq!(result.total(), 0);
    }

    #[tokio::test]
    async fn test_each_session_gets_a_pooled_user_agent() {
        let launcher = SnapshotLauncher::new(ebay_page(&[ebay_node(1, "Drone")], ""));
        let scraper = scraper(launcher.clone(), ScraperSettings::default());
        for _ in 0..3 {
            assert!(scraper.scrape("drone", 1).await.is_success());
        }

        let agents = launcher.user_agents();
        assert_eq!(launcher.launched(), 3);
        assert_eq!(agents.len(), 3);
        assert!(agents.iter().all(|ua| USER_AGENTS.contains(&ua.as_str())));
    }

    #[tokio::test]
    async fn test_empty_container_is_success() {
        let launcher = SnapshotLauncher::new(ebay_page(&[], ""));
        let result = scraper(launcher, ScraperSettings::default())
            .scrape("drone", 3)
            .await;
        assert!(result.is_success());
        assert!(result.items().is_empty());
        assert_eq!(result.total(), 0);
    }

    #[tokio::test]
    async fn test_browser_failures_become_failed_results() {
        let launcher = SnapshotLauncher::new("")
            .with_behavior(SnapshotBehavior::NavigationError("net::ERR_PROXY_CONNECTION_FAILED".into()));
        let result = scraper(launcher.clone(), ScraperSettings::default())
            .scrape("drone", 3)
            .await;
        assert!(!result.is_success());
        assert!(result.error().unwrap().contains("ERR_PROXY_CONNECTION_FAILED"));
        assert_eq!(launcher.open_sessions(), 0);

        let launcher = SnapshotLauncher::new("")
            .with_behavior(SnapshotBehavior::LaunchError("Chrome not found".into()));
        let result = scraper(launcher, ScraperSettings::default())
            .scrape("drone", 3)
            .await;
        assert!(!result.is_success());
        assert!(result.error().unwrap().contains("Chrome not found"));
    }

    #[test]
    fn test_parse_result_count() {
        assert_eq!(parse_result_count("12,345 results for drone"), Some(12_345));
        assert_eq!(
            parse_result_count("1-48 of over 10,000 results for \"3ce\""),
            Some(10_000)
        );
        assert_eq!(parse_result_count("No exact matches"), None);
    }
}
