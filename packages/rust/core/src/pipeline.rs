//! Staged pipeline with snapshot-based recovery.
//!
//! A [`Pipeline`] folds a record through its stages and hands the result to
//! its [`RecordFormat`] for summarizing. Failures never escape [`Pipeline::run`]:
//! they are turned into a recovery attempt and reported as a [`RunOutcome`].

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use tracing::{debug, info, instrument, warn};

use stagechain_shared::{PipelineConfig, PipelineError, Record, Result};

use crate::format::{DelimitedFormat, RecordFormat, SentinelFormat, StructuredFormat};
use crate::stage::SharedStage;

/// Narrative returned when a failed run restored an earlier configuration.
pub const RECOVERED_MESSAGE: &str = "Recovery successful: Pipeline restored, processing resumed";

/// Narrative returned when a failed run had nothing to restore.
pub const UNAVAILABLE_MESSAGE: &str = "Recovery failed: Backup processor unavailable";

/// Snapshots kept when no limit is configured.
pub const DEFAULT_MAX_SNAPSHOTS: usize = 32;

// ---------------------------------------------------------------------------
// Outcomes
// ---------------------------------------------------------------------------

/// Result of a single [`Pipeline::run`] call.
///
/// `Display` renders the string handed back to callers: the summary on success,
/// one of the two recovery narratives otherwise.
#[derive(Debug)]
pub enum RunOutcome {
    /// All stages and the final validation passed.
    Success(String),
    /// The run failed; the previous stage configuration was restored.
    Recovered { error: PipelineError },
    /// The run failed and no snapshot was available.
    Unavailable { error: PipelineError },
}

impl RunOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    /// The error that triggered recovery, if the run failed.
    pub fn error(&self) -> Option<&PipelineError> {
        match self {
            Self::Success(_) => None,
            Self::Recovered { error } | Self::Unavailable { error } => Some(error),
        }
    }

    /// Convert to a `Result`. A recovered run yields its triggering error; an
    /// unavailable backup yields [`PipelineError::RecoveryUnavailable`].
    pub fn into_result(self) -> Result<String> {
        match self {
            Self::Success(summary) => Ok(summary),
            Self::Recovered { error } => Err(error),
            Self::Unavailable { .. } => Err(PipelineError::RecoveryUnavailable),
        }
    }
}

impl std::fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Success(summary) => f.write_str(summary),
            Self::Recovered { .. } => f.write_str(RECOVERED_MESSAGE),
            Self::Unavailable { .. } => f.write_str(UNAVAILABLE_MESSAGE),
        }
    }
}

/// Cumulative counters for one pipeline.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineStats {
    pub runs: u64,
    pub succeeded: u64,
    pub recovered: u64,
    pub unavailable: u64,
}

// ---------------------------------------------------------------------------
// Snapshot
// ---------------------------------------------------------------------------

/// A saved copy of a pipeline's stage sequence.
#[derive(Clone)]
pub struct Snapshot {
    stages: Vec<SharedStage>,
    taken_at: DateTime<Utc>,
}

impl Snapshot {
    fn capture(stages: &[SharedStage]) -> Self {
        Self {
            stages: stages.to_vec(),
            taken_at: Utc::now(),
        }
    }

    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }

    pub fn taken_at(&self) -> DateTime<Utc> {
        self.taken_at
    }
}

impl std::fmt::Debug for Snapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Snapshot")
            .field("stages", &stage_names(&self.stages))
            .field("taken_at", &self.taken_at)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

/// An ordered stage chain for one record format.
pub struct Pipeline {
    id: String,
    format: Box<dyn RecordFormat>,
    stages: Vec<SharedStage>,
    backup: VecDeque<Snapshot>,
    max_snapshots: usize,
    stats: PipelineStats,
}

impl Pipeline {
    /// Create an empty pipeline for `format`.
    pub fn new<F: RecordFormat + 'static>(id: impl Into<String>, format: F) -> Self {
        Self {
            id: id.into(),
            format: Box::new(format),
            stages: Vec::new(),
            backup: VecDeque::new(),
            max_snapshots: DEFAULT_MAX_SNAPSHOTS,
            stats: PipelineStats::default(),
        }
    }

    /// Pipeline over structured sensor readings.
    pub fn structured(id: impl Into<String>, config: &PipelineConfig) -> Self {
        Self::new(id, StructuredFormat).with_max_snapshots(config.max_snapshots)
    }

    /// Pipeline over activity lines split on the configured delimiter.
    pub fn delimited(id: impl Into<String>, config: &PipelineConfig) -> Self {
        Self::new(id, DelimitedFormat::from(config)).with_max_snapshots(config.max_snapshots)
    }

    /// Pipeline triggered by the configured sentinel text.
    pub fn sentinel(id: impl Into<String>, config: &PipelineConfig) -> Self {
        Self::new(id, SentinelFormat::new(config.sentinel.clone()))
            .with_max_snapshots(config.max_snapshots)
    }

    /// Cap the snapshot history. Values below 1 are raised to 1.
    pub fn with_max_snapshots(mut self, max: usize) -> Self {
        self.max_snapshots = max.max(1);
        self
    }

    /// Append a stage; insertion order is execution order.
    pub fn add_stage(&mut self, stage: SharedStage) {
        debug!(pipeline = %self.id, stage = stage.name(), "stage added");
        self.stages.push(stage);
    }

    /// Builder-style [`add_stage`](Self::add_stage).
    pub fn with_stage(mut self, stage: SharedStage) -> Self {
        self.add_stage(stage);
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn format(&self) -> &dyn RecordFormat {
        self.format.as_ref()
    }

    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }

    /// Names of the active stages, in execution order.
    pub fn stage_names(&self) -> Vec<&str> {
        stage_names(&self.stages)
    }

    /// Number of snapshots currently held.
    pub fn backup_depth(&self) -> usize {
        self.backup.len()
    }

    /// Held snapshots, oldest first.
    pub fn snapshots(&self) -> impl Iterator<Item = &Snapshot> {
        self.backup.iter()
    }

    /// The snapshot [`recover`](Self::recover) would restore next.
    pub fn latest_snapshot(&self) -> Option<&Snapshot> {
        self.backup.back()
    }

    pub fn stats(&self) -> PipelineStats {
        self.stats
    }

    /// Push a copy of the active stage sequence onto the backup stack.
    pub fn snapshot(&mut self) {
        self.push_snapshot(Snapshot::capture(&self.stages));
    }

    /// Restore the most recent snapshot.
    ///
    /// Returns `false` when the backup stack is empty; the active stages are
    /// left untouched in that case.
    pub fn recover(&mut self) -> bool {
        match self.backup.pop_back() {
            Some(snapshot) => {
                info!(
                    pipeline = %self.id,
                    stages = snapshot.stage_count(),
                    remaining = self.backup.len(),
                    "pipeline restored from snapshot"
                );
                self.stages = snapshot.stages;
                true
            }
            None => {
                warn!(pipeline = %self.id, "no snapshot available for recovery");
                false
            }
        }
    }

    /// Run `record` through the stage chain.
    ///
    /// The stage sequence active at invocation start is captured first. On
    /// success it joins the backup stack as a known-good configuration. On
    /// failure it is discarded, since it is the configuration that just failed,
    /// and the previous snapshot is restored instead.
    #[instrument(skip_all, fields(pipeline = %self.id, format = self.format.name()))]
    pub fn run(&mut self, record: Record) -> RunOutcome {
        self.stats.runs += 1;
        let attempt = Snapshot::capture(&self.stages);

        match self.execute(record) {
            Ok(summary) => {
                self.push_snapshot(attempt);
                self.stats.succeeded += 1;
                info!(backup_depth = self.backup.len(), "pipeline run succeeded");
                RunOutcome::Success(summary)
            }
            Err(error) => {
                warn!(%error, "pipeline run failed, initiating recovery");
                if self.recover() {
                    self.stats.recovered += 1;
                    RunOutcome::Recovered { error }
                } else {
                    self.stats.unavailable += 1;
                    RunOutcome::Unavailable { error }
                }
            }
        }
    }

    fn execute(&self, record: Record) -> Result<String> {
        self.format.accepts(&record)?;

        let total = self.stages.len();
        let output = self
            .stages
            .iter()
            .enumerate()
            .try_fold(record, |current, (index, stage)| {
                debug!(
                    "executing stage {}/{}: {}",
                    index + 1,
                    total,
                    stage.name()
                );
                stage.process(current)
            })?;

        self.format.summarize(output)
    }

    fn push_snapshot(&mut self, snapshot: Snapshot) {
        if self.backup.len() == self.max_snapshots {
            self.backup.pop_front();
            debug!(pipeline = %self.id, "evicted oldest snapshot");
        }
        self.backup.push_back(snapshot);
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("id", &self.id)
            .field("format", &self.format.name())
            .field("stages", &self.stage_names())
            .field("backup_depth", &self.backup.len())
            .field("stats", &self.stats)
            .finish()
    }
}

fn stage_names(stages: &[SharedStage]) -> Vec<&str> {
    stages.iter().map(|s| s.name()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stage::{
        EnrichStage, InputStage, OutputStage, SplitStage, Stage, TransformStage, shared,
    };
    use serde_json::json;
    use stagechain_shared::DEFAULT_SENTINEL;

    fn reading() -> Record {
        Record::structured([
            ("sensor", json!("temp")),
            ("value", json!(23.5)),
            ("unit", json!("C")),
        ])
    }

    fn structured_pipeline() -> Pipeline {
        Pipeline::structured("json1", &PipelineConfig::default())
            .with_stage(shared(InputStage))
            .with_stage(shared(EnrichStage))
            .with_stage(shared(OutputStage))
    }

    fn delimited_pipeline() -> Pipeline {
        Pipeline::delimited("csv1", &PipelineConfig::default())
            .with_stage(shared(InputStage))
            .with_stage(shared(SplitStage::default()))
            .with_stage(shared(OutputStage))
    }

    fn sentinel_pipeline() -> Pipeline {
        Pipeline::sentinel("stream1", &PipelineConfig::default())
            .with_stage(shared(InputStage))
            .with_stage(shared(TransformStage::default()))
            .with_stage(shared(OutputStage))
    }

    struct FailStage;

    impl Stage for FailStage {
        fn process(&self, _record: Record) -> Result<Record> {
            Err(PipelineError::stage("fail", "always fails"))
        }

        fn name(&self) -> &str {
            "fail"
        }
    }

    #[test]
    fn structured_reading_summary() {
        let mut pipeline = structured_pipeline();
        let outcome = pipeline.run(reading());
        assert!(outcome.is_success());
        assert_eq!(
            outcome.to_string(),
            "Processed temperature reading: 23.5°C (Normal range)"
        );
    }

    #[test]
    fn delimited_line_counts_one_action() {
        let mut pipeline = delimited_pipeline();
        let outcome = pipeline.run(Record::text("user,action,timestamp"));
        assert_eq!(
            outcome.to_string(),
            "User activity logged: 1 actions processed"
        );
    }

    #[test]
    fn sentinel_pipeline_accepts_only_sentinel() {
        let mut pipeline = sentinel_pipeline();
        let outcome = pipeline.run(Record::text(DEFAULT_SENTINEL));
        assert_eq!(
            outcome.to_string(),
            "Stream summary: 5 readings, avg: 22.1°C"
        );
    }

    #[test]
    fn fresh_pipeline_failure_reports_unavailable() {
        let mut pipeline = sentinel_pipeline();
        let outcome = pipeline.run(Record::text("not the sentinel"));
        assert!(matches!(outcome, RunOutcome::Unavailable { .. }));
        assert_eq!(outcome.to_string(), UNAVAILABLE_MESSAGE);
        assert_eq!(pipeline.backup_depth(), 0);
        assert_eq!(pipeline.stats().unavailable, 1);
    }

    #[test]
    fn failure_after_success_restores_and_shrinks_backup() {
        let mut pipeline = structured_pipeline();
        assert!(pipeline.run(reading()).is_success());
        assert!(pipeline.run(reading()).is_success());
        assert_eq!(pipeline.backup_depth(), 2);

        let outcome = pipeline.run(Record::text("bad input"));
        assert_eq!(outcome.to_string(), RECOVERED_MESSAGE);
        assert!(matches!(
            outcome.error(),
            Some(PipelineError::Validation { .. })
        ));
        assert_eq!(pipeline.backup_depth(), 1);
        assert_eq!(pipeline.stats().recovered, 1);
    }

    #[test]
    fn stage_failure_triggers_recovery_to_known_good_stages() {
        let mut pipeline = structured_pipeline();
        assert!(pipeline.run(reading()).is_success());

        pipeline.add_stage(shared(FailStage));
        assert_eq!(pipeline.stage_count(), 4);

        let outcome = pipeline.run(reading());
        assert!(matches!(
            outcome.error(),
            Some(PipelineError::StageExecution { .. })
        ));
        assert_eq!(pipeline.stage_names(), vec!["input", "enrich", "output"]);
        assert!(pipeline.run(reading()).is_success());
    }

    #[test]
    fn stage_error_stops_the_chain() {
        let mut pipeline = Pipeline::delimited("csv", &PipelineConfig::default())
            .with_stage(shared(InputStage))
            .with_stage(shared(EnrichStage))
            .with_stage(shared(SplitStage::default()));
        let outcome = pipeline.run(Record::text("a,action"));
        match outcome.error() {
            Some(PipelineError::StageExecution { stage, .. }) => assert_eq!(stage, "enrich"),
            other => panic!("expected enrich stage failure, got {other:?}"),
        }
    }

    #[test]
    fn repeated_runs_are_idempotent() {
        let mut pipeline = structured_pipeline();
        let first = pipeline.run(reading()).to_string();
        let second = pipeline.run(reading()).to_string();
        assert_eq!(first, second);
    }

    #[test]
    fn explicit_snapshot_and_recover() {
        let mut pipeline = delimited_pipeline();
        assert!(!pipeline.recover());

        pipeline.snapshot();
        pipeline.add_stage(shared(FailStage));
        assert!(pipeline.recover());
        assert_eq!(pipeline.stage_count(), 3);
        assert_eq!(pipeline.backup_depth(), 0);
    }

    #[test]
    fn snapshot_history_is_bounded() {
        let mut pipeline = structured_pipeline().with_max_snapshots(2);
        for _ in 0..5 {
            pipeline.run(reading());
        }
        assert_eq!(pipeline.backup_depth(), 2);
        assert_eq!(pipeline.stats().runs, 5);
        assert_eq!(pipeline.stats().succeeded, 5);
    }

    #[test]
    fn constructors_apply_configured_history_limit() {
        let mut config = PipelineConfig::default();
        config.max_snapshots = 1;
        let pipelines = [
            Pipeline::structured("s", &config),
            Pipeline::delimited("d", &config),
            Pipeline::sentinel("t", &config),
        ];
        for mut pipeline in pipelines {
            pipeline.snapshot();
            pipeline.snapshot();
            assert_eq!(pipeline.backup_depth(), 1, "{}", pipeline.id());
        }
    }

    #[test]
    fn snapshots_are_timestamped_in_order() {
        let mut pipeline = structured_pipeline();
        let before = Utc::now();
        pipeline.run(reading());
        pipeline.run(reading());

        let stamps: Vec<_> = pipeline.snapshots().map(Snapshot::taken_at).collect();
        assert_eq!(stamps.len(), 2);
        assert!(stamps[0] >= before);
        assert!(stamps[0] <= stamps[1]);
        assert_eq!(pipeline.latest_snapshot().map(Snapshot::taken_at), Some(stamps[1]));
    }

    #[test]
    fn snapshots_do_not_alias_active_stages() {
        let mut pipeline = structured_pipeline();
        pipeline.snapshot();
        pipeline.add_stage(shared(OutputStage));
        let saved = pipeline.snapshots().next().expect("snapshot");
        assert_eq!(saved.stage_count(), 3);
        assert_eq!(pipeline.stage_count(), 4);
    }

    #[test]
    fn unavailable_maps_to_recovery_error() {
        let mut pipeline = structured_pipeline();
        let result = pipeline.run(Record::Absent).into_result();
        assert!(matches!(result, Err(PipelineError::RecoveryUnavailable)));
    }

    #[test]
    fn recovered_run_keeps_triggering_error() {
        let mut pipeline = structured_pipeline();
        assert_eq!(
            pipeline.run(reading()).into_result().unwrap(),
            "Processed temperature reading: 23.5°C (Normal range)"
        );
        let err = pipeline.run(Record::Absent).into_result().unwrap_err();
        assert!(err.is_recoverable());
    }
}
