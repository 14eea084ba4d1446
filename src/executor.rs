use crate::model::{Query, SearchPage};
use crate::traits::{ProductSearch, SearchError};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};

/// Outcome of a paced call that may be interrupted while waiting its turn.
#[derive(Debug)]
pub enum Paced<T> {
    Done(T),
    Cancelled,
}

/// Serializes provider calls and keeps at least `min_interval` between the
/// start of consecutive calls.
pub struct PacedExecutor {
    min_interval: Duration,
    last_call: Mutex<Option<Instant>>,
    cancel: CancellationToken,
}

impl PacedExecutor {
    pub fn new(min_interval: Duration, cancel: CancellationToken) -> Self {
        Self {
            min_interval,
            last_call: Mutex::new(None),
            cancel,
        }
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Waits for the pacing slot, then issues the call.
    ///
    /// The lock is held across the call so two callers can never overlap.
    #[instrument(skip(self, provider), fields(provider = provider.provider_id()))]
    pub async fn execute<P>(
        &self,
        provider: Arc<P>,
        query: &Query,
        page: u32,
        item_count: u32,
    ) -> Paced<Result<SearchPage, SearchError>>
    where
        P: ProductSearch + ?Sized + 'static,
    {
        let mut last_call = self.last_call.lock().await;

        if let Some(previous) = *last_call {
            let ready_at = previous + self.min_interval;
            if ready_at > Instant::now() {
                debug!(wait_ms = (ready_at - Instant::now()).as_millis() as u64, "Pacing");
                tokio::select! {
                    _ = self.cancel.cancelled() => return Paced::Cancelled,
                    _ = tokio::time::sleep_until(ready_at) => {}
                }
            }
        }
        if self.cancel.is_cancelled() {
            return Paced::Cancelled;
        }

        *last_call = Some(Instant::now());
        let result = tokio::select! {
            _ = self.cancel.cancelled() => return Paced::Cancelled,
            result = provider.search(query, page, item_count) => result,
        };
        Paced::Done(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct InstantProvider;

    #[async_trait]
    impl ProductSearch for InstantProvider {
        fn provider_id(&self) -> &str {
            "instant"
        }

        async fn search(
            &self,
            _query: &Query,
            _page: u32,
            _item_count: u32,
        ) -> Result<SearchPage, SearchError> {
            Ok(SearchPage::default())
        }
    }

    #[tokio::test]
    async fn test_consecutive_calls_respect_interval() {
        let interval = Duration::from_millis(50);
        let executor = PacedExecutor::new(interval, CancellationToken::new());
        let provider = Arc::new(InstantProvider);
        let query = Query::Category("1".into());

        let start = Instant::now();
        for page in 1..=3 {
            assert!(matches!(
                executor.execute(provider.clone(), &query, page, 10).await,
                Paced::Done(Ok(_))
            ));
        }
        // Three calls need two full gaps.
        assert!(start.elapsed() >= interval * 2);
    }

    #[tokio::test]
    async fn test_cancel_interrupts_pacing_wait() {
        let cancel = CancellationToken::new();
        let executor = PacedExecutor::new(Duration::from_secs(3600), cancel.clone());
        let provider = Arc::new(InstantProvider);
        let query = Query::Keywords("rossetto".into());

        assert!(matches!(
            executor.execute(provider.clone(), &query, 1, 10).await,
            Paced::Done(Ok(_))
        ));

        cancel.cancel();
        let second = tokio::time::timeout(
            Duration::from_secs(5),
            executor.execute(provider, &query, 2, 10),
        )
        .await
        .expect("cancellation should not wait for the pacing interval");
        assert!(matches!(second, Paced::Cancelled));
    }
}
