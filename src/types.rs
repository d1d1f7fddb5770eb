//! Shared types for Que.
//!
//! These types form the data model used across all modules: nation names,
//! card bids, the settings payload, action outcomes and the error enum.

use rust_decimal::Decimal;
use serde::Serialize;
use std::fmt;

// ---------------------------------------------------------------------------
// Nation names
// ---------------------------------------------------------------------------

/// Longest nation name the site accepts.
pub const MAX_NATION_NAME_LEN: usize = 40;

/// A puppet nation name as written by the operator.
///
/// The display form is kept for logging; `canonical()` is the lowercase,
/// underscore-separated form the site uses in URLs and API queries.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct NationName(String);

impl NationName {
    /// Validate and wrap a raw name. Surrounding whitespace is trimmed.
    pub fn parse(raw: &str) -> Result<Self, QueError> {
        let name = raw.trim();
        if name.is_empty() {
            return Err(QueError::InvalidNationName {
                name: raw.to_string(),
                reason: "empty".to_string(),
            });
        }
        if name.chars().count() > MAX_NATION_NAME_LEN {
            return Err(QueError::InvalidNationName {
                name: name.to_string(),
                reason: format!("longer than {MAX_NATION_NAME_LEN} characters"),
            });
        }
        if let Some(bad) = name
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, ' ' | '-' | '_')))
        {
            return Err(QueError::InvalidNationName {
                name: name.to_string(),
                reason: format!("contains '{bad}'"),
            });
        }
        Ok(Self(name.to_string()))
    }

    /// Lowercase form with spaces replaced by underscores.
    pub fn canonical(&self) -> String {
        canonicalize(&self.0)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NationName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Canonical site form of a nation or region name.
pub fn canonicalize(name: &str) -> String {
    name.trim().to_lowercase().replace(' ', "_")
}

// ---------------------------------------------------------------------------
// Cards
// ---------------------------------------------------------------------------

/// A single bid target from `cards.env`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CardBid {
    pub card_id: u64,
    pub season: u8,
    /// Bid price in bank; the site accepts two decimal places.
    pub price: Decimal,
}

impl fmt::Display for CardBid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "card {} (S{}) @ {:.2}", self.card_id, self.season, self.price)
    }
}

// ---------------------------------------------------------------------------
// Nation payloads
// ---------------------------------------------------------------------------

/// Customisation fields submitted on the settings page.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NationSettings {
    pub email: String,
    /// Only sent when the nation is large enough to change it.
    pub pretitle: Option<String>,
    pub slogan: String,
    pub currency: String,
    pub animal: String,
    pub demonym_noun: String,
    pub demonym_adjective: String,
    pub demonym_plural: String,
}

impl NationSettings {
    /// Form fields as named on the site's settings form.
    pub fn form_fields(&self) -> Vec<(&'static str, String)> {
        let mut fields = vec![
            ("email", self.email.clone()),
            ("slogan", self.slogan.clone()),
            ("currency", self.currency.clone()),
            ("animal", self.animal.clone()),
            ("demonym2", self.demonym_noun.clone()),
            ("demonym", self.demonym_adjective.clone()),
            ("demonym2plural", self.demonym_plural.clone()),
        ];
        if let Some(pretitle) = &self.pretitle {
            fields.push(("pretitle", pretitle.clone()));
        }
        fields
    }
}

/// Details used when founding a puppet that does not exist yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewNation {
    pub email: String,
    pub currency: String,
    pub animal: String,
    pub slogan: String,
    /// Government classification code on the founding form.
    pub classification: String,
}

/// Region a puppet should move to.
#[derive(Clone, PartialEq, Eq)]
pub struct RegionTarget {
    pub name: String,
    /// Region password, for password-protected regions.
    pub password: Option<String>,
}

impl fmt::Debug for RegionTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegionTarget")
            .field("name", &self.name)
            .field("password", &self.password.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Actions
// ---------------------------------------------------------------------------

/// Every step the runner can take for a puppet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Create,
    Login,
    Settings,
    Flag,
    Move,
    Bids,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Create => write!(f, "create"),
            Action::Login => write!(f, "login"),
            Action::Settings => write!(f, "settings"),
            Action::Flag => write!(f, "flag"),
            Action::Move => write!(f, "move"),
            Action::Bids => write!(f, "bids"),
        }
    }
}

/// What happened when an action was attempted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum ActionOutcome {
    Done,
    Skipped(String),
    Failed(String),
}

impl ActionOutcome {
    pub fn is_failed(&self) -> bool {
        matches!(self, ActionOutcome::Failed(_))
    }
}

impl fmt::Display for ActionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActionOutcome::Done => write!(f, "done"),
            ActionOutcome::Skipped(why) => write!(f, "skipped ({why})"),
            ActionOutcome::Failed(why) => write!(f, "failed ({why})"),
        }
    }
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Domain-specific error types for Que.
#[derive(Debug, thiserror::Error)]
pub enum QueError {
    #[error("Missing configuration variables: {}", .0.join(", "))]
    MissingConfig(Vec<String>),

    #[error("Invalid configuration value for {key}: {reason}")]
    InvalidConfig { key: String, reason: String },

    #[error("Card lists differ in length: {card_ids} card ids, {seasons} seasons, {prices} prices")]
    CardListMismatch {
        card_ids: usize,
        seasons: usize,
        prices: usize,
    },

    #[error("Invalid nation name '{name}': {reason}")]
    InvalidNationName { name: String, reason: String },

    #[error("Not logged in to a nation")]
    NotLoggedIn,

    #[error("NationStates rejected the request: {0}")]
    SiteError(String),

    #[error("Rate limited by NationStates, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
