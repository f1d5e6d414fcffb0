//! Capacity-bounded dispatch across a set of pipelines.
//!
//! Two dispatch modes exist and are kept separate:
//! - [`Manager::dispatch_batch`] pairs record *i* with pipeline *i*.
//! - [`Manager::dispatch_chain`] threads one record through every pipeline in
//!   order, feeding each pipeline's outcome to the next.

use std::time::{Duration, Instant};

use tracing::{info, instrument, warn};

use stagechain_shared::{AppConfig, PipelineConfig, PipelineError, Record, Result};

use crate::capacity::Capacity;
use crate::format::{RecordFormat, StructuredFormat};
use crate::pipeline::{Pipeline, RunOutcome};
use crate::stage::{InputStage, OutputStage, TransformStage, shared};

// ---------------------------------------------------------------------------
// Progress
// ---------------------------------------------------------------------------

/// Progress callback for chained dispatch.
pub trait ChainProgress: Send + Sync {
    /// Called before the first traversal.
    fn start(&self, total: u64);
    /// Called after each full traversal of the pipeline chain.
    fn traversal_done(&self, current: u64, total: u64);
    /// Called when the chain finishes, successfully or not.
    fn finish(&self);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ChainProgress for SilentProgress {
    fn start(&self, _total: u64) {}
    fn traversal_done(&self, _current: u64, _total: u64) {}
    fn finish(&self) {}
}

// ---------------------------------------------------------------------------
// Chain report
// ---------------------------------------------------------------------------

/// Summary of a successful [`Manager::dispatch_chain`] call.
#[derive(Debug, Clone)]
pub struct ChainReport {
    /// Full traversals completed.
    pub records: u64,
    /// Pipelines in the chain.
    pub pipelines: usize,
    /// Individual pipeline runs performed.
    pub runs: u64,
    /// Runs that produced a success summary.
    pub successful_runs: u64,
    /// Outcome text of the last pipeline in the final traversal.
    pub final_output: Option<String>,
    /// Wall-clock time spent dispatching.
    pub elapsed: Duration,
}

impl ChainReport {
    /// Percentage of runs that succeeded (100 when nothing ran).
    pub fn efficiency(&self) -> f64 {
        if self.runs == 0 {
            return 100.0;
        }
        self.successful_runs as f64 * 100.0 / self.runs as f64
    }
}

impl std::fmt::Display for ChainReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Chain result: {} records processed through {}-stage pipeline",
            self.records, self.pipelines
        )
    }
}

// ---------------------------------------------------------------------------
// Manager
// ---------------------------------------------------------------------------

/// Owns pipelines and the capacity budget they draw from.
#[derive(Debug)]
pub struct Manager {
    pipelines: Vec<Pipeline>,
    capacity: Capacity,
    chain_seed: Record,
}

impl Manager {
    pub fn new(capacity: u64) -> Self {
        Self {
            pipelines: Vec::new(),
            capacity: Capacity::new(capacity),
            chain_seed: StructuredFormat.representative(),
        }
    }

    /// Manager with the standard structured → delimited → sentinel pipelines.
    pub fn from_config(config: &AppConfig) -> Self {
        let mut manager = Self::new(config.manager.capacity);
        for pipeline in standard_pipelines(&config.pipeline) {
            manager.add_pipeline(pipeline);
        }
        manager
    }

    /// Append a pipeline; insertion order is dispatch order.
    pub fn add_pipeline(&mut self, pipeline: Pipeline) {
        info!(
            pipeline = pipeline.id(),
            format = pipeline.format().name(),
            stages = pipeline.stage_count(),
            "pipeline registered"
        );
        self.pipelines.push(pipeline);
    }

    pub fn pipelines(&self) -> &[Pipeline] {
        &self.pipelines
    }

    pub fn capacity(&self) -> &Capacity {
        &self.capacity
    }

    /// Route record *i* to pipeline *i*, one capacity slot per record.
    ///
    /// Stops as soon as the budget is exhausted; unpaired records or pipelines
    /// are ignored. Returns one outcome per processed record.
    #[instrument(skip_all, fields(pipelines = self.pipelines.len()))]
    pub fn dispatch_batch<I>(&mut self, records: I) -> Vec<RunOutcome>
    where
        I: IntoIterator<Item = Record>,
    {
        let mut outcomes = Vec::new();

        for (pipeline, record) in self.pipelines.iter_mut().zip(records) {
            if !self.capacity.try_acquire() {
                warn!(
                    processed = outcomes.len(),
                    "capacity exhausted, stopping batch"
                );
                break;
            }
            outcomes.push(pipeline.run(record));
        }

        info!(
            processed = outcomes.len(),
            remaining = self.capacity.remaining(),
            "batch dispatch complete"
        );
        outcomes
    }

    /// Thread `count` records through every pipeline in order.
    ///
    /// Fails before running anything when capacity is already exhausted or
    /// `count` is negative. One capacity slot is taken per full traversal;
    /// running out part-way aborts with [`PipelineError::CapacityExceeded`].
    pub fn dispatch_chain(&mut self, count: i64) -> Result<ChainReport> {
        self.dispatch_chain_with_progress(count, &SilentProgress)
    }

    /// [`dispatch_chain`](Self::dispatch_chain) with progress reporting.
    #[instrument(skip_all, fields(count = count, pipelines = self.pipelines.len()))]
    pub fn dispatch_chain_with_progress(
        &mut self,
        count: i64,
        progress: &dyn ChainProgress,
    ) -> Result<ChainReport> {
        if self.capacity.is_exhausted() {
            return Err(PipelineError::CapacityExhausted);
        }
        let total = u64::try_from(count).map_err(|_| PipelineError::InvalidRecordCount(count))?;

        let start = Instant::now();
        let mut runs = 0u64;
        let mut successful_runs = 0u64;
        let mut final_output = None;

        progress.start(total);
        for done in 0..total {
            if !self.capacity.try_acquire() {
                progress.finish();
                warn!(processed = done, "capacity exceeded during chain");
                return Err(PipelineError::CapacityExceeded { processed: done });
            }

            let mut carried = self.chain_seed.clone();
            for pipeline in &mut self.pipelines {
                let input = pipeline.format().chain_input(carried);
                let outcome = pipeline.run(input);
                runs += 1;
                if outcome.is_success() {
                    successful_runs += 1;
                }
                carried = Record::Text(outcome.to_string());
            }
            final_output = carried.as_text().map(str::to_string);
            progress.traversal_done(done + 1, total);
        }
        progress.finish();

        let report = ChainReport {
            records: total,
            pipelines: self.pipelines.len(),
            runs,
            successful_runs,
            final_output: if self.pipelines.is_empty() {
                None
            } else {
                final_output
            },
            elapsed: start.elapsed(),
        };
        info!(
            records = report.records,
            runs = report.runs,
            successful_runs = report.successful_runs,
            elapsed_ms = report.elapsed.as_millis(),
            "chain dispatch complete"
        );
        Ok(report)
    }

    /// Run a record through one pipeline outside the capacity budget.
    ///
    /// Used to exercise the recovery path on demand. Returns `None` when
    /// `index` is out of range.
    pub fn probe_recovery(&mut self, index: usize, record: Record) -> Option<RunOutcome> {
        let pipeline = self.pipelines.get_mut(index)?;
        info!(pipeline = pipeline.id(), "probing recovery path");
        Some(pipeline.run(record))
    }
}

/// The three standard pipelines, sharing one input, transform and output stage.
pub fn standard_pipelines(config: &PipelineConfig) -> Vec<Pipeline> {
    let input = shared(InputStage);
    let transform = shared(TransformStage::from(config));
    let output = shared(OutputStage);

    [
        Pipeline::structured("structured", config),
        Pipeline::delimited("delimited", config),
        Pipeline::sentinel("sentinel", config),
    ]
    .into_iter()
    .map(|pipeline| {
        pipeline
            .with_stage(input.clone())
            .with_stage(transform.clone())
            .with_stage(output.clone())
    })
    .collect()
}
