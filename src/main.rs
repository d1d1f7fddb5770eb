//! QUE — NationStates puppet processing
//!
//! Entry point. Parses the command line, initialises structured logging,
//! loads `config.env`, `cards.env` and the puppet list, then walks every
//! puppet through the create → login → settings → flag → move → bid loop.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::Path;
use std::time::Duration;
use tracing::{error, info, warn};

use que::cli::CliApp;
use que::config::QueConfig;
use que::engine::report::log_run_report;
use que::engine::Runner;
use que::nationstates::client::NsClient;
use que::prompt::{AutoConfirm, Confirm, StdinConfirm};
use que::storage;

const BANNER: &str = r#"
  ___  _   _ _____
 / _ \| | | | ____|
| | | | | | |  _|
| |_| | |_| | |___
 \__\_\\___/|_____|

  NationStates puppet processing
"#;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = CliApp::parse();

    init_logging(cli.verbose, &cli.log_file)?;

    println!("{BANNER}");
    info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %cli.config.display(),
        cards = %cli.cards.display(),
        puppets = %cli.puppets.display(),
        auto_confirm = cli.yes,
        "QUE starting up"
    );

    // -- Inputs ----------------------------------------------------------

    let config = QueConfig::load(&cli.config, &cli.cards)
        .inspect_err(|e| error!(error = %format!("{e:#}"), "Failed to load configuration"))?;

    let puppets = storage::load_puppets(&cli.puppets)
        .inspect_err(|e| error!(error = %format!("{e:#}"), "Failed to load puppet list"))?;

    if puppets.nations.is_empty() {
        warn!(path = %cli.puppets.display(), "No puppets to process");
    }

    // -- Session ---------------------------------------------------------

    let client = NsClient::new(
        &config.user_agent,
        Duration::from_secs(cli.html_interval_secs),
    )?;

    let confirm: Box<dyn Confirm> = if cli.yes {
        warn!("Auto-confirm enabled: every action will run without asking");
        Box::new(AutoConfirm)
    } else {
        Box::new(StdinConfirm)
    };

    // -- Run -------------------------------------------------------------

    let runner = Runner::new(&client, confirm.as_ref(), &config)
        .with_toggles(cli.toggles())
        .with_page_dump(Some(cli.page_dump.clone()));

    let report = runner.process_nations(&puppets.nations).await;
    log_run_report(&report);

    if let Some(path) = &cli.report {
        if let Err(e) = storage::save_report(&report, path) {
            error!(error = %format!("{e:#}"), "Failed to save run report");
        }
    }

    if let Some(reason) = &report.aborted {
        anyhow::bail!("{reason}");
    }

    info!("QUE finished.");
    Ok(())
}

/// Initialise the `tracing` subscriber: console plus a log file started
/// fresh each run.
fn init_logging(verbose: bool, log_file: &Path) -> Result<()> {
    use std::sync::Mutex;
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

    let default_directive = if verbose { "que=debug" } else { "que=info" };
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive));

    let file = storage::open_log_file(log_file)?;

    let json_logging = std::env::var("QUE_LOG_JSON").is_ok();

    let console = if json_logging {
        fmt::layer()
            .json()
            .with_target(true)
            .with_thread_ids(true)
            .boxed()
    } else {
        fmt::layer().with_target(true).boxed()
    };

    let file_layer = fmt::layer()
        .with_ansi(false)
        .with_target(true)
        .with_writer(Mutex::new(file));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console)
        .with(file_layer)
        .try_init()
        .context("Failed to initialise logging")?;

    Ok(())
}
