//! Run status registry
//!
//! Every update replaces the whole [`AnalysisRun`] under the map's shard
//! lock, so readers always see a consistent record. Terminal runs are
//! never modified again.

use dashmap::DashMap;
use tracing::debug;

use crate::types::{AnalysisPhase, AnalysisRun, RunStatus};

#[derive(Debug, Default)]
pub struct StatusRegistry {
    runs: DashMap<String, AnalysisRun>,
}

impl StatusRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, run: AnalysisRun) {
        self.runs.insert(run.analysis_id.clone(), run);
    }

    pub fn get(&self, analysis_id: &str) -> Option<AnalysisRun> {
        self.runs.get(analysis_id).map(|run| run.clone())
    }

    /// Move a run to `next`. Returns the new record, or `None` when the run
    /// is unknown or the move would go backwards or leave a terminal state.
    pub fn transition(&self, analysis_id: &str, next: RunStatus) -> Option<AnalysisRun> {
        let mut entry = self.runs.get_mut(analysis_id)?;
        match entry.transitioned(next.clone()) {
            Some(updated) => {
                *entry = updated.clone();
                debug!(analysis_id, status = %updated.status, "Run status updated");
                Some(updated)
            }
            None => {
                debug!(analysis_id, from = %entry.status, to = %next, "Ignored status update");
                None
            }
        }
    }

    /// Publish the label of the phase that just started. Concurrent phases
    /// overwrite each other's label.
    pub fn publish_phase(&self, analysis_id: &str, phase: AnalysisPhase) -> Option<AnalysisRun> {
        self.transition(analysis_id, phase.status_label())
    }

    pub fn fail(&self, analysis_id: &str, reason: impl Into<String>) -> Option<AnalysisRun> {
        self.transition(analysis_id, RunStatus::Failed(reason.into()))
    }

    /// Every run of one diagram, oldest first.
    pub fn runs_for(&self, diagram_id: &str) -> Vec<AnalysisRun> {
        let mut runs: Vec<AnalysisRun> = self
            .runs
            .iter()
            .filter(|run| run.diagram_id == diagram_id)
            .map(|run| run.clone())
            .collect();
        runs.sort_by_key(|run| run.created_at);
        runs
    }

    /// Runs not yet COMPLETED or FAILED
    pub fn active_count(&self) -> usize {
        self.runs.iter().filter(|run| !run.is_terminal()).count()
    }

    pub fn len(&self) -> usize {
        self.runs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.runs.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registered() -> (StatusRegistry, String) {
        let registry = StatusRegistry::new();
        let run = AnalysisRun::start("d1");
        let id = run.analysis_id.clone();
        registry.register(run);
        (registry, id)
    }

    #[test]
    fn test_forward_transitions() {
        let (registry, id) = registered();
        assert_eq!(registry.active_count(), 1);

        registry.publish_phase(&id, AnalysisPhase::Security).unwrap();
        registry.publish_phase(&id, AnalysisPhase::Structure).unwrap();
        assert_eq!(registry.get(&id).unwrap().status, RunStatus::StructureAnalysis);

        registry.transition(&id, RunStatus::Aggregating).unwrap();
        let done = registry.transition(&id, RunStatus::Completed).unwrap();
        assert!(done.completed_at.is_some());
        assert_eq!(registry.active_count(), 0);
    }

    #[test]
    fn test_no_backwards_moves() {
        let (registry, id) = registered();
        registry.transition(&id, RunStatus::Aggregating).unwrap();
        assert!(registry.publish_phase(&id, AnalysisPhase::Security).is_none());
        assert_eq!(registry.get(&id).unwrap().status, RunStatus::Aggregating);
    }

    #[test]
    fn test_terminal_is_final() {
        let (registry, id) = registered();
        registry.fail(&id, "timeout").unwrap();
        assert!(registry.transition(&id, RunStatus::Completed).is_none());
        assert_eq!(
            registry.get(&id).unwrap().status,
            RunStatus::Failed("timeout".to_string())
        );
    }

    #[test]
    fn test_runs_for_diagram() {
        let (registry, first) = registered();
        let other = AnalysisRun::start("d2");
        registry.register(other);
        let second = AnalysisRun::start("d1");
        let second_id = second.analysis_id.clone();
        registry.register(second);
        registry.fail(&first, "cancelled");

        let runs = registry.runs_for("d1");
        assert_eq!(runs.len(), 2);
        assert!(runs.iter().any(|r| r.analysis_id == first && r.is_terminal()));
        assert!(runs.iter().any(|r| r.analysis_id == second_id && !r.is_terminal()));
        assert!(registry.runs_for("d3").is_empty());
    }

    #[test]
    fn test_unknown_run() {
        let registry = StatusRegistry::new();
        assert!(registry.get("nope").is_none());
        assert!(registry.fail("nope", "x").is_none());
    }
}
