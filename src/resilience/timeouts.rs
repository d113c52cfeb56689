//! Timeout enforcement for outbound attempts.

use std::future::Future;
use std::time::Duration;

use crate::gateway::transport::TransportError;

/// Run one attempt under `limit`. An expired deadline is reported as a
/// temporary failure so the retry policy can try again.
pub async fn with_deadline<T, F>(limit: Duration, attempt: F) -> Result<T, TransportError>
where
    F: Future<Output = Result<T, TransportError>>,
{
    match tokio::time::timeout(limit, attempt).await {
        Ok(result) => result,
        Err(_) => Err(TransportError::temporary(format!(
            "timed out after {}ms",
            limit.as_millis()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn slow_attempt_times_out_as_temporary() {
        let err = with_deadline(Duration::from_millis(10), async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok::<_, TransportError>(())
        })
        .await
        .unwrap_err();
        assert!(err.is_temporary());
        assert!(err.to_string().contains("timed out"));
    }

    #[tokio::test]
    async fn fast_attempt_passes_through() {
        let value = with_deadline(Duration::from_secs(1), async { Ok::<_, TransportError>(7) })
            .await
            .unwrap();
        assert_eq!(value, 7);
    }
}
