//! Timeout Supervisor.

use std::future::Future;
use std::time::Duration;

use dg_core::{Error, Result};

/// Run the future produced by `pipeline`, giving up after `deadline`.
///
/// When the deadline passes first, `on_timeout` runs while the pipeline
/// future is still alive and must stop it (cancel the in-flight process,
/// halt later stages). The future is then driven until it settles, so the
/// process group is reaped and scratch files are released before
/// [`Error::Timeout`] is returned. Whatever it settles with is discarded.
/// A result that arrives in time is passed through unchanged, errors
/// included.
pub async fn run_with_deadline<T, F, Fut, H>(pipeline: F, deadline: Duration, on_timeout: H) -> Result<T>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T>>,
    H: FnOnce(),
{
    let fut = pipeline();
    tokio::pin!(fut);

    tokio::select! {
        biased;
        result = &mut fut => result,
        _ = tokio::time::sleep(deadline) => {
            tracing::warn!(deadline_ms = deadline.as_millis() as u64, "Operation timed out; cancelling");
            on_timeout();
            match fut.await {
                Ok(_) => tracing::debug!("Pipeline finished after its deadline"),
                Err(e) => tracing::debug!("Pipeline settled after timeout: {e}"),
            }
            Err(Error::Timeout { after: deadline })
        }
    }
}
