//! Progressive fallback extraction
//!
//! `ProgressiveExtractor` walks the fallback ladder (see [`crate::fallback`])
//! against an [`RpcTransport`], racing every remote call against its stage
//! timer and the overall time budget. Whatever happens remotely, a URL that
//! parses always yields a report with a usable `ExtractionResult`; the only
//! failures handed back to the caller are an invalid URL, an unreachable
//! service at preflight, cancellation, and an exhausted budget under the
//! `fail` strategy.

use std::sync::Arc;
use std::time::Duration;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{ExtractError, Result, TransportError};
use crate::events::ProgressSink;
use crate::fallback::{FallbackLevel, StagePlan};
use crate::figma_url::{is_complex_node, DesignUrl};
use crate::inference::infer_components;
use crate::model::{
    Component, ComponentSource, ExtractOptions, ExtractionInput, ExtractionMetadata,
    ExtractionMethod, ExtractionReport, ExtractionResult, TimeoutStrategy,
};
use crate::progress::{ProgressTracker, Stage};
use crate::protocol::{RemotePayload, TOOLS_CALL};
use crate::transport::RpcTransport;

/// How often a running stage reports its estimated progress
const PROGRESS_TICK: Duration = Duration::from_millis(500);

/// Runs extractions against a shared transport
#[derive(Clone)]
pub struct ProgressiveExtractor {
    transport: Arc<dyn RpcTransport>,
}

impl ProgressiveExtractor {
    pub fn new(transport: Arc<dyn RpcTransport>) -> Self {
        Self { transport }
    }

    pub fn transport(&self) -> &Arc<dyn RpcTransport> {
        &self.transport
    }

    /// Extract design data, reporting progress to `sink`
    pub async fn extract(
        &self,
        input: ExtractionInput,
        sink: &dyn ProgressSink,
    ) -> Result<ExtractionReport> {
        self.extract_with_cancel(input, sink, CancellationToken::new())
            .await
    }

    /// Same as [`extract`](Self::extract), aborting with
    /// `TransportError::Cancelled` once `cancel` fires
    pub async fn extract_with_cancel(
        &self,
        input: ExtractionInput,
        sink: &dyn ProgressSink,
        cancel: CancellationToken,
    ) -> Result<ExtractionReport> {
        let mut run = Run::new(self.transport.as_ref(), sink, cancel);
        run.tracker.start();

        match input {
            ExtractionInput::Prefetched { figma_data, .. } => Ok(run.pass_through(figma_data).await),
            ExtractionInput::Url { url, options } => run.standalone(&url, &options).await,
        }
    }
}

/// Why a single stage produced nothing
#[derive(Debug)]
enum StageFailure {
    /// The stage timer (or the call's own timeout) won the race
    TimedOut(Duration),
    Failed(String),
    /// The run itself was cancelled
    Cancelled,
}

enum LevelOutcome {
    Succeeded(ExtractionResult),
    Failed,
    /// The overall budget ran out mid-level; carries what was collected
    BudgetExhausted(ExtractionResult),
}

/// State for one `extract` invocation
struct Run<'a> {
    transport: &'a dyn RpcTransport,
    sink: &'a dyn ProgressSink,
    cancel: CancellationToken,
    tracker: ProgressTracker,
    warnings: Vec<String>,
    errors: Vec<String>,
}

impl<'a> Run<'a> {
    fn new(
        transport: &'a dyn RpcTransport,
        sink: &'a dyn ProgressSink,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            transport,
            sink,
            cancel,
            tracker: ProgressTracker::new(),
            warnings: Vec::new(),
            errors: Vec::new(),
        }
    }

    async fn pass_through(mut self, mut figma_data: ExtractionResult) -> ExtractionReport {
        info!("Using pre-extracted data for file {}", figma_data.file_id);
        if figma_data.metadata.is_none() {
            let is_complex = figma_data.node_id.as_deref().is_some_and(is_complex_node);
            figma_data.metadata = Some(ExtractionMetadata::new(
                ExtractionMethod::PassThrough,
                is_complex,
                0,
            ));
        }
        self.progress(Stage::Complete, 100, Some("Using pre-extracted design data"))
            .await;
        self.finish(figma_data)
    }

    async fn standalone(
        mut self,
        raw_url: &str,
        options: &ExtractOptions,
    ) -> Result<ExtractionReport> {
        let url = DesignUrl::parse(raw_url)?;
        let is_complex = url.is_complex();
        info!(
            "Extracting file {} node {:?} (complex: {})",
            url.file_id, url.node_id, is_complex
        );

        let reachable = tokio::select! {
            _ = self.cancel.cancelled() => return Err(TransportError::Cancelled.into()),
            reachable = self.transport.test_connection() => reachable,
        };
        if !reachable {
            warn!("Design service unreachable; aborting extraction");
            return Err(TransportError::ServerUnavailable(
                "design service did not answer the connection probe".to_string(),
            )
            .into());
        }

        let budget = options.budget();
        let deadline = Instant::now() + budget;
        let mut level = FallbackLevel::Optimal;

        loop {
            if level == FallbackLevel::Emergency {
                return Ok(self.emergency(&url, is_complex).await);
            }

            match self.run_level(level, &url, options, deadline).await? {
                LevelOutcome::Succeeded(mut result) => {
                    enrich(&mut result);
                    result.metadata = Some(ExtractionMetadata::new(
                        level.method(),
                        is_complex,
                        level.number(),
                    ));
                    let message = format!("Extraction complete ({level})");
                    self.progress(Stage::Complete, 100, Some(message.as_str())).await;
                    return Ok(self.finish(result));
                }
                LevelOutcome::Failed => {
                    let Some(next) = level.next() else {
                        break;
                    };
                    self.warn(format!(
                        "Level {} ({}) failed, falling back to level {} ({})",
                        level.number(),
                        level,
                        next.number(),
                        next
                    ))
                    .await;
                    level = next;
                }
                LevelOutcome::BudgetExhausted(mut partial) => {
                    let budget_ms = budget.as_millis();
                    match options.timeout_strategy {
                        TimeoutStrategy::Fail => {
                            warn!("Extraction budget of {}ms exhausted", budget_ms);
                            return Err(ExtractError::DeadlineExceeded(budget));
                        }
                        TimeoutStrategy::Partial => {
                            self.warn(format!(
                                "Time budget of {budget_ms}ms exhausted at level {} ({level}); returning partial data",
                                level.number()
                            ))
                            .await;
                            enrich(&mut partial);
                            partial.metadata = Some(ExtractionMetadata::new(
                                level.method(),
                                is_complex,
                                level.number(),
                            ));
                            self.progress(Stage::Complete, 100, Some("Returning partial data"))
                                .await;
                            return Ok(self.finish(partial));
                        }
                        TimeoutStrategy::Graceful => {
                            self.warn(format!(
                                "Time budget of {budget_ms}ms exhausted; using emergency fallback"
                            ))
                            .await;
                            level = FallbackLevel::Emergency;
                        }
                    }
                }
            }
        }

        Ok(self.emergency(&url, is_complex).await)
    }

    /// Level 4: everything comes from the URL itself
    async fn emergency(mut self, url: &DesignUrl, is_complex: bool) -> ExtractionReport {
        warn!("Using emergency fallback for file {}", url.file_id);
        self.errors
            .push("Remote extraction unavailable; result derived from the URL only".to_string());

        let mut result =
            ExtractionResult::empty(url.file_id.clone(), url.node_id.clone(), url.url.clone());
        result.metadata = Some(ExtractionMetadata::new(
            ExtractionMethod::EmergencyFallback,
            is_complex,
            FallbackLevel::Emergency.number(),
        ));

        self.progress(Stage::Complete, 100, Some("Emergency fallback complete"))
            .await;
        self.finish(result)
    }

    async fn run_level(
        &mut self,
        level: FallbackLevel,
        url: &DesignUrl,
        options: &ExtractOptions,
        deadline: Instant,
    ) -> Result<LevelOutcome> {
        debug!("Attempting level {} ({})", level.number(), level);
        let mut result =
            ExtractionResult::empty(url.file_id.clone(), url.node_id.clone(), url.url.clone());

        let mut variables_ready = false;

        for plan in level.plan(url.is_complex(), options.include_code) {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                if !variables_ready {
                    return Ok(LevelOutcome::BudgetExhausted(result));
                }
                self.warn(format!("{} skipped: time budget exhausted", plan.label()))
                    .await;
                break;
            }
            let capped = remaining < plan.timeout;
            let timeout = plan.timeout.min(remaining);

            self.progress(plan.stage, 0, None).await;

            match self.run_stage(&plan, url, timeout).await {
                Ok(payload) => {
                    let message = merge(&mut result, payload);
                    self.progress(plan.stage, 100, Some(message.as_str())).await;
                    if plan.is_required() {
                        variables_ready = true;
                    }
                }
                Err(StageFailure::Cancelled) => {
                    info!("Extraction cancelled during {}", plan.stage);
                    return Err(TransportError::Cancelled.into());
                }
                Err(StageFailure::TimedOut(after)) => {
                    self.tracker.record_timeout(plan.stage);
                    if capped && !variables_ready {
                        return Ok(LevelOutcome::BudgetExhausted(result));
                    }
                    let message = format!("{} timed out after {}ms", plan.label(), after.as_millis());
                    self.progress(plan.stage, 100, Some(message.as_str())).await;
                    self.warn(message).await;
                    if plan.is_required() {
                        return Ok(LevelOutcome::Failed);
                    }
                    if capped {
                        // Nothing left for the remaining stages
                        break;
                    }
                }
                Err(StageFailure::Failed(reason)) => {
                    let message = format!("{} failed: {}", plan.label(), reason);
                    self.progress(plan.stage, 100, Some(message.as_str())).await;
                    self.warn(message).await;
                    if plan.is_required() {
                        return Ok(LevelOutcome::Failed);
                    }
                }
            }
        }

        Ok(LevelOutcome::Succeeded(result))
    }

    /// Race one remote call against its timer. The losing call's token is
    /// cancelled and its future dropped.
    async fn run_stage(
        &mut self,
        plan: &StagePlan,
        url: &DesignUrl,
        timeout: Duration,
    ) -> std::result::Result<RemotePayload, StageFailure> {
        let call_token = self.cancel.child_token();
        let params = plan.tool.call_params(&url.file_id, url.node_id.as_deref());
        debug!("Calling {} with {}ms timeout", plan.tool, timeout.as_millis());

        let transport = self.transport;
        let cancel = self.cancel.clone();
        let race = tokio::time::timeout(
            timeout,
            transport.call(TOOLS_CALL, params, call_token.clone()),
        );
        tokio::pin!(race);

        let mut ticker = tokio::time::interval(PROGRESS_TICK);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker.tick().await;

        let outcome = loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(StageFailure::Cancelled),
                outcome = &mut race => break outcome,
                _ = ticker.tick() => {
                    let estimate = self.tracker.estimate_percentage(plan.stage);
                    self.progress(plan.stage, estimate, None).await;
                }
            }
        };

        let reply = match outcome {
            Err(_) => {
                call_token.cancel();
                debug!("{} lost its race against the {}ms timer", plan.tool, timeout.as_millis());
                return Err(StageFailure::TimedOut(timeout));
            }
            Ok(Err(TransportError::Cancelled)) if self.cancel.is_cancelled() => {
                return Err(StageFailure::Cancelled);
            }
            Ok(Err(TransportError::Timeout(after))) => return Err(StageFailure::TimedOut(after)),
            Ok(Err(e)) => return Err(StageFailure::Failed(e.to_string())),
            Ok(Ok(reply)) => reply,
        };

        if reply.cached {
            self.tracker.record_cache_hit();
        }
        for _ in 0..reply.retries {
            self.tracker.record_retry();
        }

        let value = reply
            .response
            .into_result()
            .map_err(|e| StageFailure::Failed(format!("remote error: {e}")))?;
        plan.tool
            .parse(&value)
            .map_err(|e| StageFailure::Failed(e.to_string()))
    }

    async fn progress(&mut self, stage: Stage, percentage: u8, message: Option<&str>) {
        let event = self.tracker.update_stage(stage, percentage, message);
        if let Err(e) = self.sink.emit_progress(&event).await {
            warn!("Failed to emit progress event: {}", e);
        }
    }

    async fn warn(&mut self, message: String) {
        warn!("{}", message);
        if let Err(e) = self.sink.emit_warning(&message).await {
            warn!("Failed to emit warning: {}", e);
        }
        self.warnings.push(message);
    }

    fn finish(self, figma_data: ExtractionResult) -> ExtractionReport {
        let performance = self.tracker.metrics();
        let efficiency_score = performance.efficiency_score();
        info!(
            "Extraction finished in {}ms (efficiency {})",
            performance.total_duration, efficiency_score
        );

        ExtractionReport {
            figma_data,
            success: true,
            performance,
            efficiency_score,
            warnings: self.warnings,
            errors: self.errors,
        }
    }
}

/// Fold a stage payload into the result; returns a progress message
fn merge(result: &mut ExtractionResult, payload: RemotePayload) -> String {
    match payload {
        RemotePayload::Variables(vars) => {
            result.variables = vars.variables;
            format!("Found {} variables", result.variables.len())
        }
        RemotePayload::Components(components) => {
            result.components = components
                .mappings
                .iter()
                .map(|mapping| Component {
                    name: mapping.component_name.clone(),
                    source: ComponentSource::CodeConnect,
                    node_id: Some(mapping.node_id.clone()),
                })
                .collect();
            result.code_connect_map = components.mappings;
            format!("Mapped {} components", result.components.len())
        }
        RemotePayload::Code(code) => {
            let message = format!("Generated {} lines of code", code.code.lines().count());
            result.code = Some(code.code);
            message
        }
    }
}

/// Add components inferred from generated code that the mapping did not name
fn enrich(result: &mut ExtractionResult) {
    let Some(code) = result.code.as_deref() else {
        return;
    };
    let inferred: Vec<Component> = infer_components(code)
        .into_iter()
        .filter(|c| !result.components.iter().any(|known| known.name == c.name))
        .collect();
    if !inferred.is_empty() {
        debug!("Inferred {} components from generated code", inferred.len());
    }
    result.components.extend(inferred);
}
