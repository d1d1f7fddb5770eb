//! Run report — what happened to every puppet.
//!
//! The runner records one entry per attempted, skipped or failed action.
//! At the end of a run the report is summarised in the log and can be
//! written out as JSON.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::types::{Action, ActionOutcome, NationName};

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// Outcome of one action for one puppet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActionRecord {
    pub action: Action,
    /// What the action applied to, when it is not the puppet itself
    /// (a card for bids).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    pub outcome: ActionOutcome,
}

/// Everything recorded for a single puppet.
#[derive(Debug, Clone, Serialize)]
pub struct PuppetReport {
    pub nation: NationName,
    pub actions: Vec<ActionRecord>,
}

impl PuppetReport {
    pub fn new(nation: NationName) -> Self {
        Self {
            nation,
            actions: Vec::new(),
        }
    }

    pub fn record(&mut self, action: Action, outcome: ActionOutcome) {
        self.actions.push(ActionRecord {
            action,
            target: None,
            outcome,
        });
    }

    pub fn record_target(&mut self, action: Action, target: String, outcome: ActionOutcome) {
        self.actions.push(ActionRecord {
            action,
            target: Some(target),
            outcome,
        });
    }

    /// First recorded outcome for `action`.
    pub fn outcome(&self, action: Action) -> Option<&ActionOutcome> {
        self.actions
            .iter()
            .find(|r| r.action == action)
            .map(|r| &r.outcome)
    }

    pub fn logged_in(&self) -> bool {
        self.outcome(Action::Login) == Some(&ActionOutcome::Done)
    }

    pub fn failures(&self) -> impl Iterator<Item = &ActionRecord> {
        self.actions.iter().filter(|r| r.outcome.is_failed())
    }
}

/// Report for a whole run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    /// Why the run stopped before the end of the puppet list.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aborted: Option<String>,
    pub puppets: Vec<PuppetReport>,
}

impl Default for RunReport {
    fn default() -> Self {
        Self::new()
    }
}

impl RunReport {
    pub fn new() -> Self {
        Self {
            run_id: Uuid::new_v4(),
            started_at: Utc::now(),
            finished_at: None,
            aborted: None,
            puppets: Vec::new(),
        }
    }

    pub fn push(&mut self, puppet: PuppetReport) {
        self.puppets.push(puppet);
    }

    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    /// Mark the run as stopped early. Puppets already recorded are kept.
    pub fn abort(&mut self, reason: String) {
        self.aborted = Some(reason);
    }

    pub fn is_aborted(&self) -> bool {
        self.aborted.is_some()
    }

    pub fn summary(&self) -> RunSummary {
        let mut summary = RunSummary {
            puppets: self.puppets.len(),
            ..RunSummary::default()
        };

        for puppet in &self.puppets {
            if puppet.logged_in() {
                summary.logged_in += 1;
            }
            for record in &puppet.actions {
                match record.outcome {
                    ActionOutcome::Done => {
                        summary.done += 1;
                        if record.action == Action::Bids {
                            summary.bids_placed += 1;
                        }
                    }
                    ActionOutcome::Skipped(_) => summary.skipped += 1,
                    ActionOutcome::Failed(_) => summary.failed += 1,
                }
            }
        }

        summary
    }
}

/// Counts across a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub puppets: usize,
    pub logged_in: usize,
    pub done: usize,
    pub skipped: usize,
    pub failed: usize,
    pub bids_placed: usize,
}

/// Log a human-readable run summary, then each failure.
pub fn log_run_report(report: &RunReport) {
    let summary = report.summary();
    let elapsed_secs = report
        .finished_at
        .map(|end| (end - report.started_at).num_seconds())
        .unwrap_or_default();

    info!(
        run_id = %report.run_id,
        puppets = summary.puppets,
        logged_in = summary.logged_in,
        done = summary.done,
        skipped = summary.skipped,
        failed = summary.failed,
        bids = summary.bids_placed,
        elapsed_secs,
        "Run complete"
    );

    if let Some(reason) = &report.aborted {
        warn!(run_id = %report.run_id, reason = %reason, "Run stopped before the end of the puppet list");
    }

    for puppet in &report.puppets {
        for record in puppet.failures() {
            warn!(
                nation = %puppet.nation,
                action = %record.action,
                target = record.target.as_deref().unwrap_or(""),
                outcome = %record.outcome,
                "Action failed"
            );
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
