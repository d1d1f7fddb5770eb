//! Command-line interface.

use clap::Parser;
use std::path::PathBuf;

use crate::engine::ActionToggles;
use crate::nationstates::pacing::MIN_HTML_INTERVAL;
use crate::storage::DEFAULT_PAGE_DUMP;

/// Que - configuration-driven NationStates puppet processing
#[derive(Parser, Debug)]
#[command(
    name = "que",
    version = env!("CARGO_PKG_VERSION"),
    author = env!("CARGO_PKG_AUTHORS"),
    about = "Configuration-driven NationStates puppet processing",
    long_about = "Que walks the puppets listed in que.txt, founding missing ones and \
                  applying the settings, flag, region move and card bids from config.env \
                  and cards.env. Every restricted action is confirmed by the operator."
)]
pub struct CliApp {
    /// Path to the main configuration file
    #[arg(short, long, value_name = "FILE", default_value = "config.env")]
    pub config: PathBuf,

    /// Path to the card bid configuration file
    #[arg(long, value_name = "FILE", default_value = "cards.env")]
    pub cards: PathBuf,

    /// Path to the puppet list, one nation per line
    #[arg(short, long, value_name = "FILE", default_value = "que.txt")]
    pub puppets: PathBuf,

    /// Answer yes to every confirmation prompt
    #[arg(short, long)]
    pub yes: bool,

    /// Never found nations that do not exist
    #[arg(long)]
    pub no_create: bool,

    /// Skip the settings change
    #[arg(long)]
    pub no_settings: bool,

    /// Skip the flag upload
    #[arg(long)]
    pub no_flag: bool,

    /// Skip the region move
    #[arg(long)]
    pub no_move: bool,

    /// Skip card bids
    #[arg(long)]
    pub no_bids: bool,

    /// Seconds between HTML page requests (never below 6)
    #[arg(
        long,
        value_name = "SECS",
        default_value_t = MIN_HTML_INTERVAL.as_secs()
    )]
    pub html_interval_secs: u64,

    /// Where to save the page returned by a settings change
    #[arg(long, value_name = "FILE", default_value = DEFAULT_PAGE_DUMP)]
    pub page_dump: PathBuf,

    /// Write a JSON report of the run to this file
    #[arg(long, value_name = "FILE")]
    pub report: Option<PathBuf>,

    /// Log file
    #[arg(long, value_name = "FILE", default_value = "que.log")]
    pub log_file: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

impl CliApp {
    pub fn toggles(&self) -> ActionToggles {
        ActionToggles {
            create: !self.no_create,
            settings: !self.no_settings,
            flag: !self.no_flag,
            move_region: !self.no_move,
            bids: !self.no_bids,
        }
    }
}
