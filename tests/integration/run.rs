//! End-to-end runs: files on disk → configuration → runner → report.

use std::path::PathBuf;

use que::config::QueConfig;
use que::engine::report::RunReport;
use que::engine::{ActionToggles, Runner};
use que::prompt::AutoConfirm;
use que::storage;
use que::types::{Action, ActionOutcome};

use crate::mock_session::{MockSession, ScriptedConfirm};

const CONFIG_ENV: &str = r#"UA=Testlandia
PASSWORD=hunter2
EMAIL=que@example.com
PRETITLE="Grand Duchy"
SLOGAN="Long live Que"
CURRENCY="Que Coin"
ANIMAL=otter
DEMONYM_NOUN=Quean
DEMONYM_ADJECTIVE=Queish
DEMONYM_PLURAL=Queans
TARGET_REGION=Lazarus
TARGET_REGION_PASSWORD=
FLAG=flag.png
"#;

const CARDS_ENV: &str = "CARD_IDS=101,202\nSEASONS=3,2\nPRICES=0.50,12.25\n";

const QUE_TXT: &str = "# puppets\nOld Puppet\n\nFresh Puppet\nold_puppet\nBad Puppet\n";

/// Scratch directory holding one run's input files.
struct Workspace {
    dir: PathBuf,
}

impl Workspace {
    fn new() -> Self {
        let mut dir = std::env::temp_dir();
        dir.push(format!("que_it_{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("config.env"), CONFIG_ENV).unwrap();
        std::fs::write(dir.join("cards.env"), CARDS_ENV).unwrap();
        std::fs::write(dir.join("que.txt"), QUE_TXT).unwrap();
        Self { dir }
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }

    fn config(&self) -> QueConfig {
        QueConfig::load(&self.path("config.env"), &self.path("cards.env")).unwrap()
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.dir);
    }
}

fn session() -> MockSession {
    MockSession::new("hunter2")
        .with_existing("Old Puppet", 300)
        .with_existing("Bad Puppet", 300)
        .with_bad_login("Bad Puppet")
        .with_failing_card(202)
}

#[tokio::test]
async fn test_full_run_from_files() {
    let ws = Workspace::new();
    let config = ws.config();
    let puppets = storage::load_puppets(&ws.path("que.txt")).unwrap();

    assert_eq!(puppets.nations.len(), 3);
    assert_eq!(puppets.rejected.len(), 1);
    assert_eq!(config.bids.len(), 2);

    let session = session();
    let runner = Runner::new(&session, &AutoConfirm, &config)
        .with_page_dump(Some(ws.path("response.html")));

    let report = runner.process_nations(&puppets.nations).await;
    assert_eq!(report.puppets.len(), 3);

    // Old Puppet: exists, logs in and runs every step.
    let old = &report.puppets[0];
    assert!(old.logged_in());
    assert!(old.outcome(Action::Create).is_none());
    for action in [Action::Settings, Action::Flag, Action::Move] {
        assert_eq!(old.outcome(action), Some(&ActionOutcome::Done));
    }
    let bid_failures: Vec<_> = old.failures().filter(|r| r.action == Action::Bids).collect();
    assert_eq!(bid_failures.len(), 1);
    assert_eq!(bid_failures[0].target.as_deref(), Some("card 202 (S2) @ 12.25"));

    // Fresh Puppet: founded first, then the same steps.
    let fresh = &report.puppets[1];
    assert_eq!(fresh.outcome(Action::Create), Some(&ActionOutcome::Done));
    assert!(fresh.logged_in());

    // Bad Puppet: login refused, nothing else attempted.
    let bad = &report.puppets[2];
    assert!(!bad.logged_in());
    assert_eq!(bad.actions.len(), 1);

    let calls = session.calls();
    let fresh_calls: Vec<_> = calls
        .iter()
        .skip_while(|c| c.as_str() != "check fresh_puppet")
        .take(3)
        .cloned()
        .collect();
    assert_eq!(
        fresh_calls,
        ["check fresh_puppet", "create fresh_puppet", "login fresh_puppet"]
    );
    assert!(calls.contains(&"move old_puppet Lazarus".to_string()));
    assert!(calls.contains(&"flag fresh_puppet flag.png".to_string()));
    assert!(!calls.iter().any(|c| c.starts_with("settings bad_puppet")));

    // Fresh Puppet is too small for a pretitle; it was the last settings sent.
    let settings = session.last_settings().unwrap();
    assert_eq!(settings.pretitle, None);
    assert_eq!(settings.slogan, "Long live Que");

    let page = std::fs::read_to_string(ws.path("response.html")).unwrap();
    assert!(page.contains("fresh_puppet"));

    let summary = report.summary();
    assert_eq!(summary.puppets, 3);
    assert_eq!(summary.logged_in, 2);
    assert_eq!(summary.bids_placed, 2);
    assert_eq!(summary.failed, 3);
}

#[tokio::test]
async fn test_declined_founding_and_toggles() {
    let ws = Workspace::new();
    let config = ws.config();
    let puppets = storage::load_puppets(&ws.path("que.txt")).unwrap();

    let session = session();
    // Old Puppet: settings yes; Fresh Puppet: decline founding.
    let confirm = ScriptedConfirm::new(&[true, false]);
    let toggles = ActionToggles {
        flag: false,
        move_region: false,
        bids: false,
        ..ActionToggles::default()
    };
    let runner = Runner::new(&session, &confirm, &config).with_toggles(toggles);

    let report = runner.process_nations(&puppets.nations).await;

    let fresh = &report.puppets[1];
    assert_eq!(
        fresh.outcome(Action::Create),
        Some(&ActionOutcome::Skipped("declined".into()))
    );
    assert!(!session.calls().contains(&"login fresh_puppet".to_string()));

    let old = &report.puppets[0];
    assert_eq!(old.outcome(Action::Settings), Some(&ActionOutcome::Done));
    assert_eq!(
        old.outcome(Action::Flag),
        Some(&ActionOutcome::Skipped("disabled".into()))
    );
    assert_eq!(
        session.last_settings().unwrap().pretitle.as_deref(),
        Some("Grand Duchy")
    );

    assert_eq!(
        confirm.asked.lock().unwrap().as_slice(),
        [
            "Do you want to change Old Puppet settings?",
            "Do you want to create Fresh Puppet?",
        ]
    );
}

#[tokio::test]
async fn test_report_saved_as_json() {
    let ws = Workspace::new();
    let config = ws.config();
    let puppets = storage::load_puppets(&ws.path("que.txt")).unwrap();

    let session = session();
    let runner = Runner::new(&session, &AutoConfirm, &config).with_toggles(ActionToggles {
        create: false,
        ..ActionToggles::default()
    });
    let report: RunReport = runner.process_nations(&puppets.nations).await;

    let path = ws.path("report.json");
    storage::save_report(&report, &path).unwrap();

    let json: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(json["run_id"], report.run_id.to_string());
    assert_eq!(json["puppets"].as_array().unwrap().len(), 3);
    assert_eq!(json["puppets"][0]["nation"], "Old Puppet");
    assert_eq!(json["puppets"][0]["actions"][0]["action"], "login");
    assert_eq!(json["puppets"][0]["actions"][0]["outcome"]["status"], "done");
    // Fresh Puppet was never founded, so its login fails.
    assert_eq!(json["puppets"][1]["actions"][0]["outcome"]["status"], "failed");
}

#[tokio::test]
async fn test_closed_stdin_keeps_earlier_puppets_in_report() {
    let ws = Workspace::new();
    let config = ws.config();
    let puppets = storage::load_puppets(&ws.path("que.txt")).unwrap();

    let session = MockSession::new("hunter2")
        .with_existing("Old Puppet", 300)
        .with_existing("Fresh Puppet", 300);
    // Old Puppet's settings are confirmed; the next prompt finds stdin closed.
    let confirm = ScriptedConfirm::closing(&[true]);
    let toggles = ActionToggles {
        create: false,
        flag: false,
        move_region: false,
        bids: false,
        ..ActionToggles::default()
    };
    let runner = Runner::new(&session, &confirm, &config).with_toggles(toggles);

    let report = runner.process_nations(&puppets.nations).await;

    assert_eq!(
        session.calls(),
        [
            "login old_puppet",
            "population old_puppet",
            "settings old_puppet",
            "login fresh_puppet",
        ]
    );
    assert_eq!(
        report.aborted.as_deref(),
        Some("Run stopped while processing Fresh Puppet: stdin closed while waiting for an answer")
    );
    assert_eq!(report.puppets.len(), 2);
    assert_eq!(
        report.puppets[0].outcome(Action::Settings),
        Some(&ActionOutcome::Done)
    );
    assert!(report.puppets[1].logged_in());

    let path = ws.path("report.json");
    storage::save_report(&report, &path).unwrap();
    let json: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(json["puppets"][0]["actions"][1]["action"], "settings");
    assert!(json["aborted"].as_str().unwrap().contains("stdin closed"));
}

#[test]
fn test_missing_user_agent_fails_load() {
    let ws = Workspace::new();
    let without_ua: String = CONFIG_ENV
        .lines()
        .filter(|l| !l.starts_with("UA="))
        .map(|l| format!("{l}\n"))
        .collect();
    std::fs::write(ws.path("config.env"), without_ua).unwrap();

    if std::env::var("UA").is_ok() {
        return;
    }
    let err = QueConfig::load(&ws.path("config.env"), &ws.path("cards.env")).unwrap_err();
    assert!(format!("{err:#}").contains("UA"));
}
