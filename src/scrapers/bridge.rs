//! Runs scrapes off the request-serving tasks.
//!
//! Driving a page blocks on long waits, so each scrape runs to completion on
//! tokio's blocking pool. The caller only awaits the join handle.

use std::future::Future;

use tokio::runtime::Handle;
use tracing::error;

use crate::error::BridgeError;

/// Run `fut` on a dedicated blocking worker and hand back its output unchanged.
pub async fn run<F, T>(fut: F) -> Result<T, BridgeError>
where
    F: Future<Output = T> + Send + 'static,
    T: Send + 'static,
{
    let handle = Handle::current();
    tokio::task::spawn_blocking(move || handle.block_on(fut))
        .await
        .map_err(|e| {
            let err = BridgeError::from(e);
            error!("Bridged scrape did not complete: {}", err);
            err
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(flavor = "multi_thread")]
    async fn test_returns_inner_value() {
        let value = run(async { 40 + 2 }).await.unwrap();
        assert_eq!(value, 42);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_inner_errors_pass_through() {
        let result: Result<Result<(), String>, BridgeError> =
            run(async { Err("boom".to_string()) }).await;
        assert_eq!(result.unwrap(), Err("boom".to_string()));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_panic_becomes_error() {
        let result = run(async {
            panic!("worker exploded");
        })
        .await;
        let err: BridgeError = match result {
            Ok(()) => panic!("expected an error"),
            Err(e) => e,
        };
        assert!(matches!(err, BridgeError::Panicked(ref m) if m.contains("worker exploded")));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_runs_off_the_calling_task() {
        let caller = std::thread::current().id();
        let worker = run(async { std::thread::current().id() }).await.unwrap();
        assert_ne!(caller, worker);
    }
}
