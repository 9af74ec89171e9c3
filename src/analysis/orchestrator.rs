//! Analysis Orchestrator
//!
//! Runs every phase of a phase set concurrently on a bounded worker pool,
//! joins them, and aggregates the results into one cached report.
//!
//! ## Flow
//!
//! 1. Cache lookup on `(diagram_id, phase_set)`; a live hit returns at once
//! 2. Register the run as STARTED
//! 3. Spawn one task per phase, each holding a pool permit
//! 4. Join every phase under the run deadline
//! 5. AGGREGATING: concatenate issues, keep the comprehensive summary
//! 6. Cache the report, mark the run COMPLETED
//!
//! A caller that stops polling mid-run (dropped future, outer timeout)
//! aborts the phase tasks and leaves the run FAILED("cancelled").

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use serde::Serialize;
use tokio::sync::Semaphore;
use tokio::task::AbortHandle;
use tracing::{error, info, instrument, warn};

use super::cache::ReportCache;
use super::phase::{PhaseRunner, PhaseState};
use super::registry::StatusRegistry;
use crate::ai::{PromptBuilder, ProviderGateway, with_timeout_map};
use crate::constants::analysis as analysis_constants;
use crate::types::{
    AnalysisPhase, AnalysisReport, AnalysisRun, LensError, ParsedProcessModel, PhaseResult,
    PhaseSet, Result, RunStatus, SeverityCounts,
};

#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub phases: PhaseSet,
    pub cache_ttl: Duration,
    pub max_concurrent_phases: usize,
    /// Default deadline for a whole run
    pub run_deadline: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            phases: PhaseSet::canonical(),
            cache_ttl: Duration::from_secs(analysis_constants::CACHE_TTL_SECS),
            max_concurrent_phases: analysis_constants::MAX_CONCURRENT_PHASES,
            run_deadline: Duration::from_secs(analysis_constants::RUN_DEADLINE_SECS),
        }
    }
}

/// Point-in-time counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrchestratorStats {
    pub active_runs: usize,
    pub total_runs: usize,
    pub cached_reports: usize,
    pub available_permits: usize,
}

pub struct AnalysisOrchestrator {
    runner: PhaseRunner,
    phases: PhaseSet,
    cache: Arc<ReportCache>,
    registry: Arc<StatusRegistry>,
    pool: Arc<Semaphore>,
    run_deadline: Duration,
}

impl AnalysisOrchestrator {
    pub fn new(
        gateway: Arc<ProviderGateway>,
        prompts: Arc<dyn PromptBuilder>,
        config: OrchestratorConfig,
    ) -> Self {
        Self::with_runner(PhaseRunner::new(gateway, prompts), config)
    }

    pub fn with_runner(runner: PhaseRunner, config: OrchestratorConfig) -> Self {
        let cache = ReportCache::new(config.cache_ttl);
        Self::with_parts(runner, config, cache)
    }

    /// Use a prepared cache, e.g. one driven by a manual clock.
    pub fn with_parts(runner: PhaseRunner, config: OrchestratorConfig, cache: ReportCache) -> Self {
        if config.run_deadline <= runner.phase_deadline() {
            warn!(
                run_deadline = ?config.run_deadline,
                phase_deadline = ?runner.phase_deadline(),
                "Run deadline does not outlast one phase; provider fallback may never be reached"
            );
        }
        Self {
            runner,
            phases: config.phases,
            cache: Arc::new(cache),
            registry: Arc::new(StatusRegistry::new()),
            pool: Arc::new(Semaphore::new(config.max_concurrent_phases.max(1))),
            run_deadline: config.run_deadline,
        }
    }

    pub fn phases(&self) -> &PhaseSet {
        &self.phases
    }

    /// Analyze a diagram under the configured run deadline.
    pub async fn run_analysis(
        &self,
        diagram_id: &str,
        model: ParsedProcessModel,
    ) -> Result<Arc<AnalysisReport>> {
        self.run_analysis_with_deadline(diagram_id, model, self.run_deadline)
            .await
    }

    #[instrument(skip(self, model), fields(phases = %self.phases))]
    pub async fn run_analysis_with_deadline(
        &self,
        diagram_id: &str,
        model: ParsedProcessModel,
        deadline: Duration,
    ) -> Result<Arc<AnalysisReport>> {
        if let Some(report) = self.cache.get(diagram_id, &self.phases) {
            info!(analysis_id = %report.analysis_id, "Returning cached report");
            return Ok(report);
        }

        let run = AnalysisRun::start(diagram_id);
        let analysis_id = run.analysis_id.clone();
        self.registry.register(run);
        info!(%analysis_id, "Analysis started");

        let model = Arc::new(model);
        let runner = self.runner.clone().with_observer({
            let registry = Arc::clone(&self.registry);
            let analysis_id = analysis_id.clone();
            Arc::new(move |phase: AnalysisPhase, state: PhaseState| {
                if state == PhaseState::Prompting {
                    registry.publish_phase(&analysis_id, phase);
                }
            })
        });

        let mut handles = Vec::with_capacity(self.phases.len());
        for phase in self.phases.iter() {
            let pool = Arc::clone(&self.pool);
            let runner = runner.clone();
            let model = Arc::clone(&model);

            handles.push(tokio::spawn(async move {
                let _permit = pool
                    .acquire_owned()
                    .await
                    .map_err(|e| LensError::Orchestration(format!("worker pool closed: {}", e)))?;
                Ok::<PhaseResult, LensError>(runner.run(phase, &model).await)
            }));
        }
        let guard = RunGuard {
            registry: Arc::clone(&self.registry),
            analysis_id: analysis_id.clone(),
            aborts: handles.iter().map(|h| h.abort_handle()).collect(),
            armed: true,
        };

        let joined = match with_timeout_map(deadline, join_all(handles), "analysis run").await {
            Ok(joined) => joined,
            Err(err) => {
                warn!(%analysis_id, ?deadline, "Run deadline exceeded, phase tasks aborted");
                guard.abandon("timeout");
                return Err(err);
            }
        };

        let mut phases = Vec::with_capacity(joined.len());
        for outcome in joined {
            let result = match outcome {
                Ok(Ok(result)) => result,
                Ok(Err(err)) => return Err(self.fail_run(guard, err.to_string())),
                Err(join_err) => {
                    return Err(self.fail_run(guard, format!("phase task failed: {}", join_err)));
                }
            };
            phases.push(result);
        }

        self.registry.transition(&analysis_id, RunStatus::Aggregating);
        let report = Arc::new(aggregate(
            analysis_id.clone(),
            diagram_id,
            self.phases.clone(),
            phases,
        ));

        self.cache.insert(Arc::clone(&report));
        self.registry.transition(&analysis_id, RunStatus::Completed);
        guard.disarm();

        info!(
            %analysis_id,
            issues = report.total_issues(),
            critical = report.critical_issues(),
            degraded = report.degraded_phases().len(),
            "Analysis completed"
        );
        Ok(report)
    }

    pub fn get_status(&self, analysis_id: &str) -> Option<AnalysisRun> {
        self.registry.get(analysis_id)
    }

    /// Every run registered for `diagram_id`, oldest first. Cache hits
    /// register no run.
    pub fn runs_for_diagram(&self, diagram_id: &str) -> Vec<AnalysisRun> {
        self.registry.runs_for(diagram_id)
    }

    /// Report of a COMPLETED run that is still cached.
    pub fn get_result(&self, analysis_id: &str) -> Option<Arc<AnalysisReport>> {
        let run = self.registry.get(analysis_id)?;
        if run.status != RunStatus::Completed {
            return None;
        }
        self.cache.get_by_analysis_id(analysis_id)
    }

    /// Drop all cached reports. Runs in flight still cache their own report.
    pub fn clear_cache(&self) {
        self.cache.clear();
        info!("Report cache cleared");
    }

    pub fn purge_expired(&self) -> usize {
        self.cache.purge_expired()
    }

    pub fn statistics(&self) -> OrchestratorStats {
        OrchestratorStats {
            active_runs: self.registry.active_count(),
            total_runs: self.registry.len(),
            cached_reports: self.cache.len(),
            available_permits: self.pool.available_permits(),
        }
    }

    fn fail_run(&self, guard: RunGuard, reason: String) -> LensError {
        error!(analysis_id = %guard.analysis_id, %reason, "Analysis failed");
        guard.abandon(reason.clone());
        LensError::Orchestration(reason)
    }
}

/// Owns a run's phase tasks until the run is terminal.
///
/// Dropped while armed (the caller stopped polling), it aborts the tasks
/// and fails the run so it never stays active.
struct RunGuard {
    registry: Arc<StatusRegistry>,
    analysis_id: String,
    aborts: Vec<AbortHandle>,
    armed: bool,
}

impl RunGuard {
    fn abort_tasks(&self) {
        for abort in &self.aborts {
            abort.abort();
        }
    }

    /// Abort the tasks and fail the run with `reason`.
    fn abandon(mut self, reason: impl Into<String>) {
        self.armed = false;
        self.abort_tasks();
        self.registry.fail(&self.analysis_id, reason);
    }

    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        self.abort_tasks();
        if self.registry.fail(&self.analysis_id, "cancelled").is_some() {
            warn!(analysis_id = %self.analysis_id, "Run dropped by caller, phase tasks aborted");
        }
    }
}

fn aggregate(
    analysis_id: String,
    diagram_id: &str,
    phase_set: PhaseSet,
    phases: Vec<PhaseResult>,
) -> AnalysisReport {
    let issues: Vec<_> = phases
        .iter()
        .filter(|p| !p.phase.is_comprehensive())
        .flat_map(|p| p.issues.iter().cloned())
        .collect();
    let counts = SeverityCounts::from_issues(&issues);
    let summary = phases
        .iter()
        .find(|p| p.phase.is_comprehensive())
        .and_then(|p| p.summary.clone());

    AnalysisReport {
        analysis_id,
        diagram_id: diagram_id.to_string(),
        phase_set,
        issues,
        counts,
        phases,
        summary,
        created_at: chrono::Utc::now(),
    }
}
