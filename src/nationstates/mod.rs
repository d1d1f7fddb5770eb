//! NationStates session integration.
//!
//! Defines the `NationSession` trait, covering everything the runner needs
//! from the game, and the `NsClient` HTTP implementation, which owns
//! cookies, form tokens and request pacing.
//!
//! Site: https://www.nationstates.net
//! API: https://www.nationstates.net/cgi-bin/api.cgi
//! Scripting rules: a contact-identifying User-Agent on every request,
//! 50 API requests per 30 seconds, one request in flight at a time, and
//! restricted actions only in response to a user action.

pub mod client;
pub mod pacing;
pub mod parse;

use anyhow::Result;
use async_trait::async_trait;
use std::path::Path;

use crate::types::{CardBid, NationName, NationSettings, NewNation, RegionTarget};

/// Script name reported in the User-Agent.
pub const SCRIPT_NAME: &str = "Que";

/// Script author reported in the User-Agent.
pub const SCRIPT_AUTHOR: &str = "Unshleepd";

/// Build the User-Agent string for an operator contact.
pub fn user_agent(contact: &str) -> String {
    format!(
        "{SCRIPT_NAME}/{} (by:{SCRIPT_AUTHOR}; usedBy:{})",
        env!("CARGO_PKG_VERSION"),
        contact.trim()
    )
}

/// Abstraction over a logged-in NationStates browser session.
///
/// Implementors keep track of which nation is logged in; every
/// state-changing method acts on that nation.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait NationSession: Send + Sync {
    /// Whether `nation` is free to be founded (never existed or has ceased
    /// to exist).
    async fn can_nation_be_founded(&self, nation: &NationName) -> Result<bool>;

    /// Found `nation`. Leaves the session logged in as it on success.
    async fn create_nation(
        &self,
        nation: &NationName,
        password: &str,
        details: &NewNation,
    ) -> Result<()>;

    /// Log in as `nation`. `Ok(false)` means the credentials were refused.
    async fn login(&self, nation: &NationName, password: &str) -> Result<bool>;

    /// Population of `nation` in millions, via the public API.
    async fn population(&self, nation: &NationName) -> Result<u64>;

    /// Submit the settings form for the logged-in nation.
    async fn change_settings(&self, settings: &NationSettings) -> Result<()>;

    /// Upload the image at `flag` as the logged-in nation's flag.
    async fn change_flag(&self, flag: &Path) -> Result<()>;

    /// Move the logged-in nation to the target region.
    async fn move_to_region(&self, target: &RegionTarget) -> Result<()>;

    /// Place a bid on a card with the logged-in nation.
    async fn bid(&self, bid: &CardBid) -> Result<()>;

    /// Body of the last HTML page received, if any.
    fn current_page(&self) -> Option<String>;
}
