//! End-to-end scrape pipeline tests over stored result pages.

use std::sync::Arc;

use pricescout::config::ScraperSettings;
use pricescout::driver::{SnapshotBehavior, SnapshotLauncher};
use pricescout::models::{Marketplace, SearchResponse};
use pricescout::scrapers::{bridge, ProductSearch, ScraperRegistry};

fn card(id: u64, title: &str, price: &str) -> String {
    format!(
        r#"<a class="search-card-item" href="//www.aliexpress.com/item/{id}.html">
             <h3>{title}</h3>
             <div class="multi--price-sale">{price}</div>
             <img src="//ae01.alicdn.com/kf/{id}.jpg">
           </a>"#
    )
}

fn page(cards: &[String]) -> String {
    format!(
        r#"<html><body><div id="card-list">{}</div></body></html>"#,
        cards.join("\n")
    )
}

fn settings() -> ScraperSettings {
    ScraperSettings {
        min_delay_ms: 0,
        max_delay_ms: 0,
        ..Default::default()
    }
}

fn registry(launcher: SnapshotLauncher) -> ScraperRegistry {
    ScraperRegistry::with_launcher(&settings(), launcher)
}

async fn search(
    registry: &ScraperRegistry,
    keyword: &str,
    limit: usize,
) -> SearchResponse {
    let scraper: Arc<dyn ProductSearch> = registry.get(Marketplace::Aliexpress).unwrap();
    let keyword = keyword.to_string();
    let result = bridge::run(async move { scraper.search(&keyword, limit).await })
        .await
        .unwrap();
    SearchResponse::from(result)
}

#[tokio::test(flavor = "multi_thread")]
async fn test_limit_enforced_after_dedup() {
    let mut cards: Vec<String> = (0..10)
        .map(|i| card(1005000000000000 + i, &format!("3CE Velvet Lip Tint #{}", i), "₩12,900"))
        .collect();
    cards.insert(3, card(1005000000000001, "3CE Velvet Lip Tint #1", "₩12,900"));
    cards.insert(7, card(1005000000000004, "3CE Velvet Lip Tint #4", "₩12,900"));
    assert_eq!(cards.len(), 12);

    let launcher = SnapshotLauncher::new(page(&cards));
    let response = search(&registry(launcher.clone()), "3ce", 10).await;

    assert!(response.success);
    assert_eq!(response.item_summaries.len(), 10);
    assert!(response.total >= response.item_summaries.len());

    let mut pairs: Vec<_> = response
        .item_summaries
        .iter()
        .map(|i| (i.title.clone(), i.item_web_url.clone()))
        .collect();
    let before = pairs.len();
    pairs.sort();
    pairs.dedup();
    assert_eq!(pairs.len(), before);

    let first = &response.item_summaries[0];
    assert_eq!(first.title.as_deref(), Some("3CE Velvet Lip Tint #0"));
    let price = first.price.as_ref().unwrap();
    assert_eq!(price.value.as_deref(), Some("12900"));
    assert_eq!(price.currency, "KRW");

    assert_eq!(launcher.open_sessions(), 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_limit_never_exceeded() {
    let cards: Vec<String> = (0..30)
        .map(|i| card(1005000000000000 + i, &format!("Drone {}", i), "$10"))
        .collect();
    let registry = registry(SnapshotLauncher::new(page(&cards)));

    for limit in [1, 3, 29, 30, 200] {
        let response = search(&registry, "drone", limit).await;
        assert!(response.item_summaries.len() <= limit);
        assert_eq!(response.item_summaries.len(), limit.min(30));
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn test_selector_timeout_fails_cleanly() {
    let launcher = SnapshotLauncher::new(page(&[card(1, "Drone", "$1")]))
        .with_behavior(SnapshotBehavior::SelectorTimeout);
    let response = search(&registry(launcher.clone()), "drone", 5).await;

    assert!(!response.success);
    assert!(response.item_summaries.is_empty());
    assert_eq!(response.error.as_deref(), Some("timeout"));
    assert_eq!(launcher.open_sessions(), 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_empty_container_is_a_valid_result() {
    let response = search(&registry(SnapshotLauncher::new(page(&[]))), "drone", 5).await;

    assert!(response.success);
    assert!(response.item_summaries.is_empty());
    assert_eq!(response.total, 0);
    assert!(response.error.is_none());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_concurrent_searches_are_isolated() {
    let keywords = ["drone", "lipstick", "keyboard", "tent"];
    let mut launcher = SnapshotLauncher::default();
    for (k, keyword) in keywords.iter().enumerate() {
        let cards: Vec<String> = (0..8)
            .map(|i| {
                card(
                    1005000000000000 + (k as u64) * 100 + i,
                    &format!("{} model {}", keyword, i),
                    "$5",
                )
            })
            .collect();
        launcher = launcher.with_page(format!("wholesale-{}.html", keyword), page(&cards));
    }
    let registry = Arc::new(registry(launcher.clone()));

    let mut handles = Vec::new();
    for round in 0..3 {
        for keyword in keywords {
            let registry = registry.clone();
            handles.push(tokio::spawn(async move {
                let limit = 3 + round;
                (keyword, limit, search(&registry, keyword, limit).await)
            }));
        }
    }

    for handle in handles {
        let (keyword, limit, response) = handle.await.unwrap();
        assert!(response.success);
        assert_eq!(response.item_summaries.len(), limit);
        for item in &response.item_summaries {
            let title = item.title.as_deref().unwrap();
            assert!(title.starts_with(keyword), "{} leaked into {}", title, keyword);
        }
    }

    assert_eq!(launcher.launched(), 12);
    assert_eq!(launcher.open_sessions(), 0);
}
