//! Pipeline components: processor port, worker pool, reorder buffer,
//! in-order orchestrator.

pub mod orchestrator;
pub mod processor;
pub mod reorder;
pub mod workers;

pub use orchestrator::{OrchestratorOutcome, run_ordered};
pub use processor::{DocumentProcessor, FieldExtractor};
pub use reorder::ReorderBuffer;
pub use workers::{Completed, Job, process_one, spawn_process_workers};

use crate::utils::config::IN_FLIGHT_MULTIPLIER;

/// Pool sizing: worker count and the in-flight cap derived from it.
#[derive(Clone, Copy, Debug)]
pub struct PipelineTuning {
    pub num_workers: usize,
    /// Dispatched-but-unreleased cap; bounds reorder-buffer memory.
    pub max_in_flight: usize,
}

impl PipelineTuning {
    /// Build tuning from an optional override. Default worker count is
    /// available parallelism minus one (the coordinating thread), minimum 1.
    pub fn for_workers(num_workers: Option<usize>) -> Self {
        let num_workers = num_workers
            .unwrap_or_else(|| rayon::current_num_threads().saturating_sub(1))
            .max(1);
        Self {
            num_workers,
            max_in_flight: num_workers * IN_FLIGHT_MULTIPLIER,
        }
    }
}
