//! Configuration loading from `.env`-style files.
//!
//! Reads `config.env` (puppet settings, passwords, the mandatory User-Agent
//! contact) and `cards.env` (card bids) into strongly-typed structs.
//! Variables already present in the process environment win over file
//! values, matching dotenv semantics.

use anyhow::{Context, Result};
use rust_decimal::Decimal;
use secrecy::{ExposeSecret, SecretString};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, warn};

use crate::types::{CardBid, NationSettings, NewNation, QueError, RegionTarget};

/// Keys that must be present in `config.env`.
pub const REQUIRED_KEYS: &[&str] = &[
    "UA",
    "PASSWORD",
    "EMAIL",
    "PRETITLE",
    "SLOGAN",
    "CURRENCY",
    "ANIMAL",
    "DEMONYM_NOUN",
    "DEMONYM_ADJECTIVE",
    "DEMONYM_PLURAL",
    "TARGET_REGION",
    "TARGET_REGION_PASSWORD",
    "FLAG",
];

/// Keys that may appear in either file.
pub const OPTIONAL_KEYS: &[&str] = &["CLASSIFICATION", "CARD_IDS", "SEASONS", "PRICES"];

/// Classification code used on the founding form when none is configured.
const DEFAULT_CLASSIFICATION: &str = "100";

/// Top-level configuration for a run.
#[derive(Debug)]
pub struct QueConfig {
    /// Operator contact, sent in every User-Agent.
    pub user_agent: String,
    pub password: SecretString,
    pub email: String,
    pub pretitle: String,
    pub slogan: String,
    pub currency: String,
    pub animal: String,
    pub demonym_noun: String,
    pub demonym_adjective: String,
    pub demonym_plural: String,
    pub target_region: String,
    /// `None` when the key is present but empty.
    pub target_region_password: Option<SecretString>,
    pub flag: PathBuf,
    pub classification: String,
    pub bids: Vec<CardBid>,
}

impl QueConfig {
    /// Load `config.env` and `cards.env`, overlay the process environment
    /// and validate.
    ///
    /// A missing `config.env` is an error; a missing `cards.env` only means
    /// there is nothing to bid on.
    pub fn load(config_path: &Path, cards_path: &Path) -> Result<Self> {
        let mut vars = read_env_file(config_path)?;

        if cards_path.exists() {
            // config.env values take precedence over cards.env.
            for (key, value) in read_env_file(cards_path)? {
                vars.entry(key).or_insert(value);
            }
        } else {
            warn!(path = %cards_path.display(), "Cards file not found, no bids will be placed");
        }

        overlay_process_env(&mut vars);

        let config = Self::from_vars(&vars)?;
        debug!(
            bids = config.bids.len(),
            target_region = %config.target_region,
            "Configuration loaded"
        );
        Ok(config)
    }

    /// Build a configuration from already-collected variables.
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, QueError> {
        let missing: Vec<String> = REQUIRED_KEYS
            .iter()
            .filter(|k| !vars.contains_key(**k))
            .map(|k| k.to_string())
            .collect();
        if !missing.is_empty() {
            return Err(QueError::MissingConfig(missing));
        }

        let get = |key: &str| vars.get(key).cloned().unwrap_or_default();

        let user_agent = get("UA").trim().to_string();
        if user_agent.is_empty() {
            return Err(QueError::InvalidConfig {
                key: "UA".to_string(),
                reason: "must name a contact (nation or email) for the User-Agent".to_string(),
            });
        }

        let target_region = get("TARGET_REGION").trim().to_string();
        if target_region.is_empty() {
            return Err(QueError::InvalidConfig {
                key: "TARGET_REGION".to_string(),
                reason: "must not be empty".to_string(),
            });
        }

        let region_password = get("TARGET_REGION_PASSWORD");
        let target_region_password = if region_password.is_empty() {
            None
        } else {
            Some(SecretString::new(region_password))
        };

        let classification = vars
            .get("CLASSIFICATION")
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .unwrap_or_else(|| DEFAULT_CLASSIFICATION.to_string());

        Ok(Self {
            user_agent,
            password: SecretString::new(get("PASSWORD")),
            email: get("EMAIL"),
            pretitle: get("PRETITLE"),
            slogan: get("SLOGAN"),
            currency: get("CURRENCY"),
            animal: get("ANIMAL"),
            demonym_noun: get("DEMONYM_NOUN"),
            demonym_adjective: get("DEMONYM_ADJECTIVE"),
            demonym_plural: get("DEMONYM_PLURAL"),
            target_region,
            target_region_password,
            flag: PathBuf::from(get("FLAG")),
            classification,
            bids: parse_card_bids(vars)?,
        })
    }

    /// Settings payload; the pretitle is only included when allowed.
    pub fn settings(&self, include_pretitle: bool) -> NationSettings {
        NationSettings {
            email: self.email.clone(),
            pretitle: include_pretitle.then(|| self.pretitle.clone()),
            slogan: self.slogan.clone(),
            currency: self.currency.clone(),
            animal: self.animal.clone(),
            demonym_noun: self.demonym_noun.clone(),
            demonym_adjective: self.demonym_adjective.clone(),
            demonym_plural: self.demonym_plural.clone(),
        }
    }

    /// Founding details for puppets that do not exist yet.
    pub fn new_nation(&self) -> NewNation {
        NewNation {
            email: self.email.clone(),
            currency: self.currency.clone(),
            animal: self.animal.clone(),
            slogan: self.slogan.clone(),
            classification: self.classification.clone(),
        }
    }

    /// Where puppets are moved, with the region password if set.
    pub fn region_target(&self) -> RegionTarget {
        RegionTarget {
            name: self.target_region.clone(),
            password: self.region_password().map(str::to_string),
        }
    }

    pub fn password(&self) -> &str {
        self.password.expose_secret()
    }

    pub fn region_password(&self) -> Option<&str> {
        self.target_region_password
            .as_ref()
            .map(|p| p.expose_secret().as_str())
    }
}

/// Parse a `.env` file into key/value pairs without touching the process
/// environment.
pub fn read_env_file(path: &Path) -> Result<HashMap<String, String>> {
    let iter = dotenv::from_path_iter(path)
        .with_context(|| format!("Failed to read env file: {}", path.display()))?;

    let mut vars = HashMap::new();
    for item in iter {
        let (key, value) =
            item.with_context(|| format!("Failed to parse env file: {}", path.display()))?;
        vars.insert(key, value);
    }
    Ok(vars)
}

/// Process environment variables override file values for known keys.
fn overlay_process_env(vars: &mut HashMap<String, String>) {
    for key in REQUIRED_KEYS.iter().chain(OPTIONAL_KEYS) {
        if let Ok(value) = std::env::var(key) {
            debug!(key, "Using value from process environment");
            vars.insert(key.to_string(), value);
        }
    }
}

/// Zip `CARD_IDS`, `SEASONS` and `PRICES` into bids.
///
/// All three absent means no bids. Any other combination must line up
/// one-to-one.
pub fn parse_card_bids(vars: &HashMap<String, String>) -> Result<Vec<CardBid>, QueError> {
    let card_ids = split_list(vars.get("CARD_IDS"));
    let seasons = split_list(vars.get("SEASONS"));
    let prices = split_list(vars.get("PRICES"));

    if card_ids.is_empty() && seasons.is_empty() && prices.is_empty() {
        return Ok(Vec::new());
    }
    if card_ids.len() != seasons.len() || card_ids.len() != prices.len() {
        return Err(QueError::CardListMismatch {
            card_ids: card_ids.len(),
            seasons: seasons.len(),
            prices: prices.len(),
        });
    }

    card_ids
        .iter()
        .zip(&seasons)
        .zip(&prices)
        .map(|((id, season), price)| {
            Ok(CardBid {
                card_id: parse_card_id(id)?,
                season: parse_season(season)?,
                price: parse_price(price)?,
            })
        })
        .collect()
}

fn split_list(value: Option<&String>) -> Vec<&str> {
    value
        .map(|v| v.split(',').map(str::trim).filter(|s| !s.is_empty()).collect())
        .unwrap_or_default()
}

fn parse_field<T: FromStr>(key: &str, raw: &str) -> Result<T, QueError>
where
    T::Err: std::fmt::Display,
{
    raw.parse().map_err(|e: T::Err| QueError::InvalidConfig {
        key: key.to_string(),
        reason: format!("'{raw}': {e}"),
    })
}

fn parse_card_id(raw: &str) -> Result<u64, QueError> {
    let id: u64 = parse_field("CARD_IDS", raw)?;
    if id == 0 {
        return Err(QueError::InvalidConfig {
            key: "CARD_IDS".to_string(),
            reason: "card id must be at least 1".to_string(),
        });
    }
    Ok(id)
}

fn parse_season(raw: &str) -> Result<u8, QueError> {
    let season: u8 = parse_field("SEASONS", raw)?;
    if season == 0 {
        return Err(QueError::InvalidConfig {
            key: "SEASONS".to_string(),
            reason: "season must be at least 1".to_string(),
        });
    }
    Ok(season)
}

fn parse_price(raw: &str) -> Result<Decimal, QueError> {
    let price: Decimal = parse_field("PRICES", raw)?;
    if price.is_sign_negative() {
        return Err(QueError::InvalidConfig {
            key: "PRICES".to_string(),
            reason: format!("'{raw}' is negative"),
        });
    }
    if price.normalize().scale() > 2 {
        return Err(QueError::InvalidConfig {
            key: "PRICES".to_string(),
            reason: format!("'{raw}' has more than two decimal places"),
        });
    }
    Ok(price)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
