use core::future::Future;

use anyhow::Result;
use log::debug;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("no result after {attempts} fetch attempts")]
    NotFound { attempts: usize },
}

/// Drives a lazy sequence of fetch thunks until one of them produces a
/// value, advancing to the next candidate on every failed attempt rather
/// than repeating the same one.
///
/// A thunk fails by returning an error or by returning `Ok(None)` (the
/// candidate does not exist yet). The sequence may be infinite; at most
/// `max_attempts` thunks are ever materialized. A sequence that ends early
/// counts as exhausted.
pub async fn retryable<T, F, Fut>(
    thunks: impl IntoIterator<Item = F>,
    max_attempts: usize,
) -> Result<T, Error>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<Option<T>>>,
{
    let mut attempts = 0;

    for thunk in thunks.into_iter().take(max_attempts) {
        attempts += 1;

        match thunk().await {
            Ok(Some(value)) => return Ok(value),
            Ok(None) => debug!("fetch attempt {attempts} returned no result"),
            Err(error) => debug!("fetch attempt {attempts} failed: {error}"),
        }
    }

    Err(Error::NotFound { attempts })
}

#[cfg(test)]
mod tests {
    use core::sync::atomic::{AtomicUsize, Ordering};

    use anyhow::anyhow;

    use super::*;

    #[tokio::test]
    async fn returns_the_first_success_and_stops_calling_thunks() {
        let calls = AtomicUsize::new(0);

        let thunks = (0_u64..).map(|candidate| {
            let calls = &calls;
            move || {
                calls.fetch_add(1, Ordering::Relaxed);
                async move {
                    if candidate < 2 {
                        Err(anyhow!("candidate {candidate} unavailable"))
                    } else {
                        Ok(Some(candidate))
                    }
                }
            }
        });

        let result = retryable(thunks, 5).await;

        assert_eq!(result.expect("third thunk should succeed"), 2);
        assert_eq!(calls.load(Ordering::Relaxed), 3);
    }

    #[tokio::test]
    async fn empty_results_count_as_failed_attempts() {
        let calls = AtomicUsize::new(0);

        let thunks = (0_u64..).map(|_| {
            let calls = &calls;
            move || {
                calls.fetch_add(1, Ordering::Relaxed);
                async move { Ok(None::<u64>) }
            }
        });

        let error = retryable(thunks, 3)
            .await
            .expect_err("every attempt should fail");

        assert!(matches!(error, Error::NotFound { attempts: 3 }));
        assert_eq!(calls.load(Ordering::Relaxed), 3);
    }

    #[tokio::test]
    async fn an_exhausted_sequence_is_not_found() {
        type Thunk = fn() -> futures::future::Ready<Result<Option<u64>>>;

        let error = retryable(core::iter::empty::<Thunk>(), 3)
            .await
            .expect_err("there is nothing to attempt");

        assert!(matches!(error, Error::NotFound { attempts: 0 }));
    }
}
