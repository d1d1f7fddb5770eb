//! Puppet runner — the per-puppet create → login → act loop.
//!
//! Puppets are processed one at a time in list order. Each restricted
//! action must be enabled and confirmed by the operator; every outcome is
//! recorded in the `RunReport`.

use anyhow::Result;
use std::path::PathBuf;
use tracing::{error, info, warn};

use super::actions;
use super::report::{PuppetReport, RunReport};
use crate::config::QueConfig;
use crate::nationstates::NationSession;
use crate::prompt::Confirm;
use crate::types::{Action, ActionOutcome, NationName};

/// Which actions a run may take at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActionToggles {
    pub create: bool,
    pub settings: bool,
    pub flag: bool,
    pub move_region: bool,
    pub bids: bool,
}

impl Default for ActionToggles {
    fn default() -> Self {
        Self {
            create: true,
            settings: true,
            flag: true,
            move_region: true,
            bids: true,
        }
    }
}

pub struct Runner<'a> {
    session: &'a dyn NationSession,
    confirm: &'a dyn Confirm,
    config: &'a QueConfig,
    toggles: ActionToggles,
    page_dump: Option<PathBuf>,
}

impl<'a> Runner<'a> {
    pub fn new(
        session: &'a dyn NationSession,
        confirm: &'a dyn Confirm,
        config: &'a QueConfig,
    ) -> Self {
        Self {
            session,
            confirm,
            config,
            toggles: ActionToggles::default(),
            page_dump: None,
        }
    }

    pub fn with_toggles(mut self, toggles: ActionToggles) -> Self {
        self.toggles = toggles;
        self
    }

    /// Where to save the page returned by a settings change.
    pub fn with_page_dump(mut self, path: Option<PathBuf>) -> Self {
        self.page_dump = path;
        self
    }

    /// Process every puppet in order.
    ///
    /// Action failures are recorded and the run continues. Only a failure
    /// to get an answer from the operator ends the run early; the report
    /// then keeps every puppet processed so far and says why it stopped.
    pub async fn process_nations(&self, nations: &[NationName]) -> RunReport {
        let mut report = RunReport::new();
        info!(
            run_id = %report.run_id,
            puppets = nations.len(),
            toggles = ?self.toggles,
            "Starting run"
        );

        for (idx, nation) in nations.iter().enumerate() {
            info!(nation = %nation, position = idx + 1, total = nations.len(), "Processing puppet");
            let mut puppet = PuppetReport::new(nation.clone());
            let result = self.process_nation(nation, &mut puppet).await;
            report.push(puppet);

            if let Err(e) = result {
                error!(nation = %nation, error = %format!("{e:#}"), "Run stopped early");
                report.abort(format!("Run stopped while processing {nation}: {e:#}"));
                break;
            }
        }

        report.finish();
        report
    }

    async fn process_nation(&self, nation: &NationName, report: &mut PuppetReport) -> Result<()> {
        if self.toggles.create {
            match self.session.can_nation_be_founded(nation).await {
                Ok(true) => {
                    let question = format!("Do you want to create {nation}?");
                    if self.confirm.confirm(&question).await? {
                        let outcome = actions::create_nation(self.session, nation, self.config).await;
                        report.record(Action::Create, outcome);
                    } else {
                        // A declined founding means there is nothing to log in to.
                        report.record(Action::Create, ActionOutcome::Skipped("declined".into()));
                        return Ok(());
                    }
                }
                Ok(false) => {}
                Err(e) => {
                    warn!(nation = %nation, error = %e, "Could not check whether nation can be founded");
                    report.record(Action::Create, ActionOutcome::Failed(format!("{e:#}")));
                }
            }
        }

        let login = match self.session.login(nation, self.config.password()).await {
            Ok(true) => ActionOutcome::Done,
            Ok(false) => ActionOutcome::Failed("login refused".into()),
            Err(e) => ActionOutcome::Failed(format!("{e:#}")),
        };
        let logged_in = login == ActionOutcome::Done;
        report.record(Action::Login, login);

        if !logged_in {
            error!(nation = %nation, "Could not login");
            self.confirm.pause("Slow down and try again.").await?;
            return Ok(());
        }

        let question = format!("Do you want to change {nation} settings?");
        if self.gate(Action::Settings, self.toggles.settings, &question, report).await? {
            let outcome = actions::change_nation_settings(
                self.session,
                nation,
                self.config,
                self.page_dump.as_deref(),
            )
            .await;
            report.record(Action::Settings, outcome);
        }

        let question = format!("Do you want to change {nation} flag?");
        if self.gate(Action::Flag, self.toggles.flag, &question, report).await? {
            let outcome = actions::change_nation_flag(self.session, nation, &self.config.flag).await;
            report.record(Action::Flag, outcome);
        }

        let question = format!("Do you want to move {nation} to target region?");
        if self.gate(Action::Move, self.toggles.move_region, &question, report).await? {
            let outcome =
                actions::move_to_region(self.session, nation, &self.config.region_target()).await;
            report.record(Action::Move, outcome);
        }

        if self.toggles.bids && self.config.bids.is_empty() {
            report.record(Action::Bids, ActionOutcome::Skipped("no bids configured".into()));
        } else if self
            .gate(Action::Bids, self.toggles.bids, "Do you want to place bids?", report)
            .await?
        {
            for (bid, outcome) in actions::bid_on_cards(self.session, nation, &self.config.bids).await {
                report.record_target(Action::Bids, bid.to_string(), outcome);
            }
        }

        Ok(())
    }

    /// Whether `action` should run. Disabled or declined actions are
    /// recorded as skipped.
    async fn gate(
        &self,
        action: Action,
        enabled: bool,
        question: &str,
        report: &mut PuppetReport,
    ) -> Result<bool> {
        if !enabled {
            report.record(action, ActionOutcome::Skipped("disabled".into()));
            return Ok(false);
        }
        if self.confirm.confirm(question).await? {
            Ok(true)
        } else {
            report.record(action, ActionOutcome::Skipped("declined".into()));
            Ok(false)
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
