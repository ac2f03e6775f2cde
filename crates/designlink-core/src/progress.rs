//! Progress and performance tracking for one extraction run
//!
//! The extractor reports every stage transition here; the tracker freezes
//! per-stage durations and produces `PerformanceMetrics` plus an efficiency
//! score once the run completes. Time comes from `tokio::time::Instant`.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;
use tokio::time::Instant;

/// Total-duration target; each whole second beyond it costs one point
const TARGET_TOTAL: Duration = Duration::from_secs(15);
const MAX_DURATION_PENALTY: u64 = 30;
const TIMEOUT_PENALTY: i64 = 20;
const RETRY_PENALTY: i64 = 5;
const CACHE_HIT_BONUS: i64 = 2;

/// Ceiling for estimated (not measured) progress of a running stage
const ESTIMATE_CEILING: u8 = 90;

/// Pipeline stage
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Variables,
    Components,
    Code,
    Complete,
}

impl Stage {
    /// How long a stage is expected to take. Only feeds the progress
    /// estimate shown to users; nothing is enforced with it.
    pub fn expected_duration(&self) -> Duration {
        match self {
            Stage::Variables => Duration::from_secs(5),
            Stage::Components => Duration::from_secs(10),
            Stage::Code => Duration::from_secs(15),
            Stage::Complete => Duration::ZERO,
        }
    }

    fn default_message(&self) -> &'static str {
        match self {
            Stage::Variables => "Extracting design variables",
            Stage::Components => "Mapping components",
            Stage::Code => "Generating code",
            Stage::Complete => "Extraction complete",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Variables => write!(f, "variables"),
            Stage::Components => write!(f, "components"),
            Stage::Code => write!(f, "code"),
            Stage::Complete => write!(f, "complete"),
        }
    }
}

/// One progress notification
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProgressEvent {
    pub stage: Stage,
    /// 0..=100
    pub percentage: u8,
    pub message: String,
    /// Milliseconds since the pipeline started
    pub duration: u64,
}

/// Aggregate timings and counters for one run
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceMetrics {
    pub total_duration: u64,
    pub variables_duration: u64,
    pub components_duration: u64,
    pub code_duration: u64,
    pub timeout_occurred: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_stage: Option<Stage>,
    pub cache_hits: u32,
    pub retry_attempts: u32,
}

impl PerformanceMetrics {
    /// 0..=100. Starts at 100; loses a point per whole second beyond 15s
    /// (at most 30), 20 for any timeout, 5 per retry; gains 2 per cache hit.
    pub fn efficiency_score(&self) -> u8 {
        let over_target = self
            .total_duration
            .saturating_sub(TARGET_TOTAL.as_millis() as u64)
            / 1000;

        let mut score = 100i64 - over_target.min(MAX_DURATION_PENALTY) as i64;
        if self.timeout_occurred {
            score -= TIMEOUT_PENALTY;
        }
        score -= RETRY_PENALTY * i64::from(self.retry_attempts);
        score += CACHE_HIT_BONUS * i64::from(self.cache_hits);

        score.clamp(0, 100) as u8
    }
}

#[derive(Debug, Clone, Copy)]
struct StageTiming {
    started_at: Instant,
    duration: Option<Duration>,
}

/// Stage bookkeeping for a single pipeline invocation
#[derive(Debug, Default)]
pub struct ProgressTracker {
    started_at: Option<Instant>,
    finished_at: Option<Instant>,
    current: Option<Stage>,
    stages: HashMap<Stage, StageTiming>,
    timeout_stage: Option<Stage>,
    cache_hits: u32,
    retries: u32,
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reset and start the clock
    pub fn start(&mut self) {
        *self = Self {
            started_at: Some(Instant::now()),
            ..Self::default()
        };
    }

    fn elapsed(&self) -> Duration {
        let end = self.finished_at.unwrap_or_else(Instant::now);
        self.started_at
            .map(|start| end.saturating_duration_since(start))
            .unwrap_or_default()
    }

    fn freeze(&mut self, stage: Stage, now: Instant) {
        if let Some(timing) = self.stages.get_mut(&stage) {
            if timing.duration.is_none() {
                timing.duration = Some(now.saturating_duration_since(timing.started_at));
            }
        }
    }

    /// Record a transition and build the event to emit.
    ///
    /// Entering a stage for the first time starts its clock; reaching 100%
    /// or moving to another stage freezes the previous duration. `Complete`
    /// also stops the overall clock.
    pub fn update_stage(
        &mut self,
        stage: Stage,
        percentage: u8,
        message: Option<&str>,
    ) -> ProgressEvent {
        if self.started_at.is_none() {
            self.start();
        }
        let now = Instant::now();

        if let Some(previous) = self.current {
            if previous != stage {
                self.freeze(previous, now);
            }
        }

        if stage == Stage::Complete {
            if self.finished_at.is_none() {
                self.finished_at = Some(now);
            }
        } else {
            self.stages.entry(stage).or_insert(StageTiming {
                started_at: now,
                duration: None,
            });
        }
        self.current = Some(stage);

        let percentage = percentage.min(100);
        if percentage == 100 {
            self.freeze(stage, now);
        }

        ProgressEvent {
            stage,
            percentage,
            message: message.unwrap_or(stage.default_message()).to_string(),
            duration: self.elapsed().as_millis() as u64,
        }
    }

    /// Heuristic progress for a stage: 100 once finished, otherwise
    /// `min(90, elapsed / expected * 100)`. For display only.
    pub fn estimate_percentage(&self, stage: Stage) -> u8 {
        if stage == Stage::Complete {
            return if self.finished_at.is_some() { 100 } else { 0 };
        }
        let Some(timing) = self.stages.get(&stage) else {
            return 0;
        };
        if timing.duration.is_some() {
            return 100;
        }

        let elapsed = timing.started_at.elapsed().as_secs_f64();
        let expected = stage.expected_duration().as_secs_f64();
        let estimate = (elapsed / expected * 100.0).min(f64::from(ESTIMATE_CEILING));
        estimate as u8
    }

    /// Note that `stage` lost its race against its timer. The first timeout
    /// of a run is the one reported.
    pub fn record_timeout(&mut self, stage: Stage) {
        if self.timeout_stage.is_none() {
            self.timeout_stage = Some(stage);
        }
    }

    pub fn record_cache_hit(&mut self) {
        self.cache_hits += 1;
    }

    pub fn record_retry(&mut self) {
        self.retries += 1;
    }

    fn stage_duration(&self, stage: Stage) -> u64 {
        self.stages
            .get(&stage)
            .map(|timing| {
                timing
                    .duration
                    .unwrap_or_else(|| timing.started_at.elapsed())
                    .as_millis() as u64
            })
            .unwrap_or(0)
    }

    pub fn metrics(&self) -> PerformanceMetrics {
        PerformanceMetrics {
            total_duration: self.elapsed().as_millis() as u64,
            variables_duration: self.stage_duration(Stage::Variables),
            components_duration: self.stage_duration(Stage::Components),
            code_duration: self.stage_duration(Stage::Code),
            timeout_occurred: self.timeout_stage.is_some(),
            timeout_stage: self.timeout_stage,
            cache_hits: self.cache_hits,
            retry_attempts: self.retries,
        }
    }

    pub fn efficiency_score(&self) -> u8 {
        self.metrics().efficiency_score()
    }
}
