//! Harvest module - paginated collection loop and record output.
//!
//! This module provides the core of the harvester:
//! - **Traits**: [`RecordSink`] for output destinations
//! - **Outcomes**: [`UnitOutcome`] per (query, page) and [`StopReason`] per run
//! - **Pipeline**: Async loop via [`pipeline::HarvestPipeline`]
//! - **Formats**: Delimited and JSON-lines sinks in [`formats`]

pub mod formats;
pub mod pipeline;
pub mod traits;

// Re-export commonly used types
pub use traits::{RecordSink, SinkError, StopReason, UnitOutcome};

pub use pipeline::{HarvestPipeline, HarvestResult, HarvestStats, PipelineError};
