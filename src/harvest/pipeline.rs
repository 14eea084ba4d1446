//! Category-driven paginated harvest loop.
//!
//! This module provides the [`HarvestPipeline`] coordinator that walks every
//! (query, page) unit of work in order with:
//! - Pacing and cancellation via [`PacedExecutor`]
//! - Per-unit failure isolation; throttling or rejected credentials end the run
//! - Structured logging via `tracing`
//! - Sink closed on every exit path

use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::HarvestConfig;
use crate::executor::{Paced, PacedExecutor};
use crate::extract::{extract, DescriptionSource};
use crate::harvest::traits::{RecordSink, SinkError, StopReason, UnitOutcome};
use crate::model::{CategoryIdentifier, Query, SearchPage, SearchTerm};
use crate::traits::{ErrorKind, ProductSearch};

// ============================================================================
// Pipeline Types
// ============================================================================

/// Complete harvest result.
#[derive(Debug)]
pub struct HarvestResult {
    pub stop_reason: StopReason,
    pub stats: HarvestStats,
}

/// Statistics about the harvest run.
#[derive(Debug, Default, Clone, serde::Serialize)]
pub struct HarvestStats {
    /// Total time spent on the run (milliseconds)
    pub total_duration_ms: u64,

    /// Records that reached the sink
    pub records_written: usize,

    /// Search calls issued (including failed ones)
    pub pages_requested: usize,

    /// Calls that succeeded with no items
    pub empty_pages: usize,

    /// Calls that failed
    pub failed_pages: usize,

    /// Items that extracted to an empty record
    pub items_skipped: usize,
}

impl HarvestStats {
    fn record(&mut self, outcome: &UnitOutcome) {
        self.pages_requested += 1;
        match outcome {
            UnitOutcome::Items {
                written, skipped, ..
            } => {
                self.records_written += written;
                self.items_skipped += skipped;
            }
            UnitOutcome::Empty => self.empty_pages += 1,
            UnitOutcome::Failed(_) => self.failed_pages += 1,
        }
    }
}

// ============================================================================
// Pipeline Errors
// ============================================================================

/// Errors that abort a run. Provider failures never do; they are contained
/// in [`UnitOutcome::Failed`] and [`StopReason`].
#[derive(thiserror::Error, Debug)]
pub enum PipelineError {
    /// The output could not be written; no further records can be preserved
    #[error("Sink failed: {0}")]
    Sink(#[from] SinkError),
}

// ============================================================================
// Pipeline Executor
// ============================================================================

/// Sequential harvest loop over categories, then search terms.
///
/// # Example
///
/// ```ignore
/// use catalog_harvester::harvest::{formats::DelimitedSink, HarvestPipeline};
///
/// let sink = DelimitedSink::create("beauty_products.csv", b',')?;
/// let mut pipeline = HarvestPipeline::new(Arc::new(client), sink, &config, cancel);
/// let result = pipeline.execute(node_ids, Vec::new()).await?;
/// println!("Wrote {} records", result.stats.records_written);
/// ```
pub struct HarvestPipeline<P, S>
where
    P: ProductSearch + ?Sized + 'static,
    S: RecordSink,
{
    provider: Arc<P>,
    sink: S,
    executor: PacedExecutor,
    cancel: CancellationToken,

    /// Pages requested per query, from 1
    max_pages: u32,

    /// Items requested per page
    page_size: u32,

    description: DescriptionSource,
}

impl<P, S> HarvestPipeline<P, S>
where
    P: ProductSearch + ?Sized + 'static,
    S: RecordSink,
{
    /// Page count and page size are capped at what the provider serves, so
    /// every requested page is distinct and a full page is never mistaken
    /// for a short one.
    pub fn new(provider: Arc<P>, sink: S, config: &HarvestConfig, cancel: CancellationToken) -> Self {
        let max_pages = within_limit("max_pages", config.max_pages, provider.max_page());
        let page_size = within_limit("page_size", config.page_size.max(1), provider.max_item_count());
        Self {
            provider,
            sink,
            executor: PacedExecutor::new(config.throttle, cancel.clone()),
            cancel,
            max_pages,
            page_size,
            description: config.description,
        }
    }

    /// Gives the sink back once the run is over.
    pub fn into_sink(self) -> S {
        self.sink
    }

    /// Runs every unit of work: each category's pages in order, then each
    /// search term's pages.
    ///
    /// Provider failures are logged and contained. Throttling, rejected
    /// credentials or cancellation end the run early with records written so
    /// far intact.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Sink`] if the output cannot be written. The
    /// sink is closed before returning either way.
    pub async fn execute(
        &mut self,
        categories: Vec<CategoryIdentifier>,
        terms: Vec<SearchTerm>,
    ) -> Result<HarvestResult, PipelineError> {
        let start = Instant::now();
        let mut stats = HarvestStats::default();

        info!(
            categories = categories.len(),
            terms = terms.len(),
            max_pages = self.max_pages,
            throttle_ms = self.executor.min_interval().as_millis() as u64,
            provider = self.provider.provider_id(),
            "Starting harvest"
        );

        let queries = categories
            .into_iter()
            .map(Query::Category)
            .chain(terms.into_iter().map(Query::Keywords));

        let run = self.run_queries(queries, &mut stats).await;
        let closed = self.sink.finish();
        stats.total_duration_ms = start.elapsed().as_millis() as u64;

        let stop_reason = run?;
        closed?;

        match &stop_reason {
            StopReason::Completed => info!(
                records = stats.records_written,
                pages = stats.pages_requested,
                failed = stats.failed_pages,
                duration_ms = stats.total_duration_ms,
                "Harvest completed"
            ),
            reason => warn!(
                reason = ?reason,
                records = stats.records_written,
                pages = stats.pages_requested,
                "Harvest stopped early; records written so far are kept"
            ),
        }

        Ok(HarvestResult { stop_reason, stats })
    }

    async fn run_queries(
        &mut self,
        queries: impl Iterator<Item = Query>,
        stats: &mut HarvestStats,
    ) -> Result<StopReason, PipelineError> {
        for query in queries {
            for page in 1..=self.max_pages {
                if self.cancel.is_cancelled() {
                    return Ok(StopReason::Cancelled);
                }

                let response = match self
                    .executor
                    .execute(self.provider.clone(), &query, page, self.page_size)
                    .await
                {
                    Paced::Cancelled => return Ok(StopReason::Cancelled),
                    Paced::Done(response) => response,
                };

                let (outcome, last_page) = match response {
                    Ok(result) => {
                        let last_page = self.is_last_page(&result, page);
                        (self.emit(&query, page, result)?, last_page)
                    }
                    Err(e) => (UnitOutcome::Failed(e), false),
                };
                stats.record(&outcome);

                match outcome {
                    UnitOutcome::Items {
                        received,
                        written,
                        skipped,
                    } => {
                        info!(query = %query, page, received, written, skipped, "Page harvested");
                    }
                    UnitOutcome::Empty => {
                        info!(query = %query, page, "No items returned");
                    }
                    UnitOutcome::Failed(e) => match e.kind() {
                        ErrorKind::Transient => {
                            warn!(query = %query, page, error = %e, "Search call failed; continuing");
                        }
                        ErrorKind::RateLimited => {
                            warn!(query = %query, page, error = %e, "Provider is throttling; ending run");
                            return Ok(StopReason::RateLimited);
                        }
                        ErrorKind::Fatal => {
                            error!(query = %query, page, error = %e, "Provider rejected the request; ending run");
                            return Ok(StopReason::ProviderFatal(e.to_string()));
                        }
                    },
                }

                if last_page {
                    debug!(query = %query, page, "No further pages for query");
                    break;
                }
            }
        }
        Ok(StopReason::Completed)
    }

    /// A short page, or a reported total already covered, ends the query.
    fn is_last_page(&self, result: &SearchPage, page: u32) -> bool {
        let short = result.items.len() < self.page_size as usize;
        let covered = result
            .total_result_count
            .is_some_and(|total| u64::from(page) * u64::from(self.page_size) >= total);
        short || covered
    }

    fn emit(&mut self, query: &Query, page: u32, result: SearchPage) -> Result<UnitOutcome, PipelineError> {
        if result.items.is_empty() {
            return Ok(UnitOutcome::Empty);
        }

        let received = result.items.len();
        let mut written = 0;
        let mut skipped = 0;
        for item in &result.items {
            let record = extract(item, self.description);
            if record.is_empty() {
                debug!(query = %query, page, "Skipping item with no extractable fields");
                skipped += 1;
                continue;
            }
            self.sink.write(&record)?;
            written += 1;
        }
        Ok(UnitOutcome::Items {
            received,
            written,
            skipped,
        })
    }
}

fn within_limit(setting: &'static str, value: u32, limit: Option<u32>) -> u32 {
    match limit {
        Some(limit) if value > limit => {
            warn!(setting, requested = value, limit, "Setting exceeds provider limit; capping");
            limit
        }
        _ => value,
    }
}

// ============================================================================
// Tests
// ============================================================================
