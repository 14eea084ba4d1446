//! Core traits and types for the harvest loop.
//!
//! - Output abstraction via [`RecordSink`]
//! - Per-unit results via [`UnitOutcome`]
//! - Run termination via [`StopReason`]

use thiserror::Error;

use crate::model::ProductRecord;
use crate::traits::SearchError;

// ============================================================================
// Sink Trait
// ============================================================================

/// Destination for harvested records, owned by the loop for a whole run.
///
/// The first `write` fixes the header; every later record must carry the
/// same field set. `finish` flushes and closes the output and is called on
/// every exit path of a run.
pub trait RecordSink: Send {
    fn write(&mut self, record: &ProductRecord) -> Result<(), SinkError>;

    /// Flushes and closes the output, returning the number of rows written.
    fn finish(&mut self) -> Result<usize, SinkError>;
}

/// Errors raised by a sink. Always fatal for the run.
#[derive(Error, Debug)]
pub enum SinkError {
    #[error("I/O error writing output: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error writing output: {0}")]
    Csv(#[from] csv::Error),

    /// A row's field set differs from the header fixed by the first row
    #[error("Row fields {actual:?} do not match header {expected:?}")]
    HeaderMismatch {
        expected: Vec<String>,
        actual: Vec<String>,
    },

    #[error("Sink already closed")]
    Closed,
}

// ============================================================================
// Unit Outcomes
// ============================================================================

/// Result of one (query, page) unit of work.
#[derive(Debug)]
pub enum UnitOutcome {
    /// The page had items; `written` reached the sink, `skipped` were empty.
    Items {
        received: usize,
        written: usize,
        skipped: usize,
    },
    /// The call succeeded with nothing to return.
    Empty,
    /// The call failed; the error kind decides whether the run goes on.
    Failed(SearchError),
}

/// Why a run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    /// Every unit of work was processed.
    Completed,
    /// The provider signalled throttling; records written so far are kept.
    RateLimited,
    /// The provider rejected the credentials or request permanently.
    ProviderFatal(String),
    /// The cancellation token fired between or during units.
    Cancelled,
}

impl StopReason {
    pub fn is_early(&self) -> bool {
        !matches!(self, StopReason::Completed)
    }
}
