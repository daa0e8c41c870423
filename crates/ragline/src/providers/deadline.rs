//! Deadlines for calls to external capabilities

use std::future::Future;
use std::time::Duration;

use crate::error::{Error, Result};

/// Run `fut`, failing with [`Error::Timeout`] if it does not finish within `after`
pub async fn bounded<T, F>(service: &'static str, after: Duration, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(after, fut).await {
        Ok(result) => result,
        Err(_) => {
            tracing::warn!("{} call exceeded {:?}", service, after);
            Err(Error::Timeout { service, after })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[tokio::test(start_paused = true)]
    async fn test_slow_call_times_out() {
        let result: Result<()> = bounded("embedding", Duration::from_secs(1), async {
            tokio::time::sleep(Duration::from_secs(10)).await;
            Ok(())
        })
        .await;

        let err = result.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DependencyTimeout);
        assert!(err.to_string().contains("embedding"));
    }

    #[tokio::test]
    async fn test_inner_error_passes_through() {
        let result: Result<()> =
            bounded("index", Duration::from_secs(1), async { Err(Error::vector_db("down")) }).await;
        assert_eq!(result.unwrap_err().kind(), ErrorKind::DependencyFailure);
    }
}
