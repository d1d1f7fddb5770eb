//! Mock session for integration testing.
//!
//! Provides a deterministic `NationSession` implementation that keeps a
//! set of existing nations, tracks who is logged in and records every
//! call, all in-memory with no network access.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::{Arc, Mutex};

use que::nationstates::NationSession;
use que::prompt::Confirm;
use que::types::*;

/// A mock NationStates session.
///
/// Nations not in `existing` can be founded. Login succeeds for existing
/// nations whose password matches and whose name is not in `bad_logins`.
pub struct MockSession {
    existing: Arc<Mutex<HashSet<String>>>,
    populations: HashMap<String, u64>,
    bad_logins: HashSet<String>,
    failing_cards: HashSet<u64>,
    password: String,
    logged_in: Arc<Mutex<Option<String>>>,
    calls: Arc<Mutex<Vec<String>>>,
    last_settings: Arc<Mutex<Option<NationSettings>>>,
}

impl MockSession {
    pub fn new(password: &str) -> Self {
        Self {
            existing: Arc::new(Mutex::new(HashSet::new())),
            populations: HashMap::new(),
            bad_logins: HashSet::new(),
            failing_cards: HashSet::new(),
            password: password.to_string(),
            logged_in: Arc::new(Mutex::new(None)),
            calls: Arc::new(Mutex::new(Vec::new())),
            last_settings: Arc::new(Mutex::new(None)),
        }
    }

    pub fn with_existing(mut self, name: &str, population: u64) -> Self {
        let canonical = canonicalize(name);
        self.existing.lock().unwrap().insert(canonical.clone());
        self.populations.insert(canonical, population);
        self
    }

    pub fn with_bad_login(mut self, name: &str) -> Self {
        self.bad_logins.insert(canonicalize(name));
        self
    }

    pub fn with_failing_card(mut self, card_id: u64) -> Self {
        self.failing_cards.insert(card_id);
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn last_settings(&self) -> Option<NationSettings> {
        self.last_settings.lock().unwrap().clone()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }

    fn current(&self) -> Result<String> {
        self.logged_in
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| QueError::NotLoggedIn.into())
    }
}

#[async_trait]
impl NationSession for MockSession {
    async fn can_nation_be_founded(&self, nation: &NationName) -> Result<bool> {
        self.record(format!("check {}", nation.canonical()));
        Ok(!self.existing.lock().unwrap().contains(&nation.canonical()))
    }

    async fn create_nation(
        &self,
        nation: &NationName,
        password: &str,
        _details: &NewNation,
    ) -> Result<()> {
        self.record(format!("create {}", nation.canonical()));
        if password != self.password {
            return Err(anyhow!("unexpected password"));
        }
        self.existing.lock().unwrap().insert(nation.canonical());
        *self.logged_in.lock().unwrap() = Some(nation.canonical());
        Ok(())
    }

    async fn login(&self, nation: &NationName, password: &str) -> Result<bool> {
        self.record(format!("login {}", nation.canonical()));
        *self.logged_in.lock().unwrap() = None;
        let ok = password == self.password
            && !self.bad_logins.contains(&nation.canonical())
            && self.existing.lock().unwrap().contains(&nation.canonical());
        if ok {
            *self.logged_in.lock().unwrap() = Some(nation.canonical());
        }
        Ok(ok)
    }

    async fn population(&self, nation: &NationName) -> Result<u64> {
        self.record(format!("population {}", nation.canonical()));
        // Freshly founded nations start small.
        Ok(self.populations.get(&nation.canonical()).copied().unwrap_or(5))
    }

    async fn change_settings(&self, settings: &NationSettings) -> Result<()> {
        let nation = self.current()?;
        self.record(format!("settings {nation}"));
        *self.last_settings.lock().unwrap() = Some(settings.clone());
        Ok(())
    }

    async fn change_flag(&self, flag: &Path) -> Result<()> {
        let nation = self.current()?;
        self.record(format!("flag {nation} {}", flag.display()));
        Ok(())
    }

    async fn move_to_region(&self, target: &RegionTarget) -> Result<()> {
        let nation = self.current()?;
        self.record(format!("move {nation} {}", target.name));
        Ok(())
    }

    async fn bid(&self, bid: &CardBid) -> Result<()> {
        let nation = self.current()?;
        self.record(format!("bid {nation} {}", bid.card_id));
        if self.failing_cards.contains(&bid.card_id) {
            return Err(QueError::SiteError("You cannot afford that bid.".into()).into());
        }
        Ok(())
    }

    fn current_page(&self) -> Option<String> {
        self.logged_in
            .lock()
            .unwrap()
            .as_ref()
            .map(|n| format!("<body data-nname=\"{n}\"></body>"))
    }
}

/// Answers from a fixed script. Once the script runs out it answers yes,
/// or fails as a closed stdin would when built with `closing`.
pub struct ScriptedConfirm {
    answers: Mutex<Vec<bool>>,
    close_when_empty: bool,
    pub asked: Mutex<Vec<String>>,
}

impl ScriptedConfirm {
    pub fn new(answers: &[bool]) -> Self {
        let mut answers = answers.to_vec();
        answers.reverse();
        Self {
            answers: Mutex::new(answers),
            close_when_empty: false,
            asked: Mutex::new(Vec::new()),
        }
    }

    pub fn closing(answers: &[bool]) -> Self {
        Self {
            close_when_empty: true,
            ..Self::new(answers)
        }
    }
}

#[async_trait]
impl Confirm for ScriptedConfirm {
    async fn confirm(&self, question: &str) -> Result<bool> {
        self.asked.lock().unwrap().push(question.to_string());
        match self.answers.lock().unwrap().pop() {
            Some(answer) => Ok(answer),
            None if self.close_when_empty => Err(anyhow!("stdin closed while waiting for an answer")),
            None => Ok(true),
        }
    }

    async fn pause(&self, _message: &str) -> Result<()> {
        Ok(())
    }
}
