//! Per-attempt deadlines.

use std::future::Future;
use std::time::Duration;

use tokio::time::timeout;

use crate::http::FetchError;

/// Run `attempt` with a deadline.
///
/// When the deadline passes first the attempt future is dropped, which
/// cancels any in-flight network operation it owns, and
/// [`FetchError::Timeout`] is returned.
pub async fn with_deadline<T, F>(deadline: Duration, attempt: F) -> Result<T, FetchError>
where
    F: Future<Output = Result<T, FetchError>>,
{
    match timeout(deadline, attempt).await {
        Ok(result) => result,
        Err(_) => Err(FetchError::Timeout(deadline)),
    }
}
