//! Puppet actions.
//!
//! Each action runs one step against the session for the logged-in
//! puppet, logs the result and converts any error into
//! `ActionOutcome::Failed` so a single failure never ends the run.

use std::path::Path;
use tracing::{error, info, warn};

use crate::config::QueConfig;
use crate::nationstates::NationSession;
use crate::storage;
use crate::types::{ActionOutcome, CardBid, NationName, RegionTarget};

/// Population (millions) a nation needs before its pretitle can change.
pub const PRETITLE_MIN_POPULATION: u64 = 250;

fn failed(e: anyhow::Error) -> ActionOutcome {
    ActionOutcome::Failed(format!("{e:#}"))
}

/// Found `nation` with the configured details.
pub async fn create_nation(
    session: &dyn NationSession,
    nation: &NationName,
    config: &QueConfig,
) -> ActionOutcome {
    match session
        .create_nation(nation, config.password(), &config.new_nation())
        .await
    {
        Ok(()) => {
            info!(nation = %nation, "Successfully created nation");
            ActionOutcome::Done
        }
        Err(e) => {
            error!(nation = %nation, error = %e, "Error creating nation");
            failed(e)
        }
    }
}

/// Change the puppet's settings.
///
/// The pretitle is only sent once the nation has reached
/// `PRETITLE_MIN_POPULATION`. On success the page the site answered with
/// is written to `page_dump`.
pub async fn change_nation_settings(
    session: &dyn NationSession,
    nation: &NationName,
    config: &QueConfig,
    page_dump: Option<&Path>,
) -> ActionOutcome {
    let include_pretitle = match session.population(nation).await {
        Ok(population) if population >= PRETITLE_MIN_POPULATION => true,
        Ok(population) => {
            warn!(
                nation = %nation,
                population,
                "Population below {PRETITLE_MIN_POPULATION} million, pretitle cannot be changed"
            );
            false
        }
        Err(e) => {
            warn!(nation = %nation, error = %e, "Population lookup failed, leaving pretitle unchanged");
            false
        }
    };

    if let Err(e) = session
        .change_settings(&config.settings(include_pretitle))
        .await
    {
        error!(nation = %nation, error = %e, "Error changing settings");
        return failed(e);
    }

    if let (Some(path), Some(page)) = (page_dump, session.current_page()) {
        if let Err(e) = storage::save_page(&page, path) {
            warn!(error = %e, "Could not save settings response page");
        }
    }

    info!(nation = %nation, pretitle = include_pretitle, "Successfully changed settings");
    ActionOutcome::Done
}

/// Upload the configured flag.
pub async fn change_nation_flag(
    session: &dyn NationSession,
    nation: &NationName,
    flag: &Path,
) -> ActionOutcome {
    match session.change_flag(flag).await {
        Ok(()) => {
            info!(nation = %nation, flag = %flag.display(), "Successfully changed flag");
            ActionOutcome::Done
        }
        Err(e) => {
            error!(nation = %nation, error = %e, "Error changing flag");
            failed(e)
        }
    }
}

/// Move the puppet to the target region.
pub async fn move_to_region(
    session: &dyn NationSession,
    nation: &NationName,
    target: &RegionTarget,
) -> ActionOutcome {
    match session.move_to_region(target).await {
        Ok(()) => {
            info!(nation = %nation, region = %target.name, "Successfully moved nation to target region");
            ActionOutcome::Done
        }
        Err(e) => {
            error!(
                nation = %nation,
                region = %target.name,
                error = %e,
                "Error moving nation to target region"
            );
            failed(e)
        }
    }
}

/// Place every configured bid in order; one failed bid does not stop the
/// rest.
pub async fn bid_on_cards(
    session: &dyn NationSession,
    nation: &NationName,
    bids: &[CardBid],
) -> Vec<(CardBid, ActionOutcome)> {
    let mut results = Vec::with_capacity(bids.len());

    for bid in bids {
        let outcome = match session.bid(bid).await {
            Ok(()) => {
                info!(
                    nation = %nation,
                    card_id = bid.card_id,
                    season = bid.season,
                    price = %bid.price,
                    "Successfully placed bid"
                );
                ActionOutcome::Done
            }
            Err(e) => {
                error!(
                    nation = %nation,
                    card_id = bid.card_id,
                    season = bid.season,
                    price = %bid.price,
                    error = %e,
                    "Error placing bid"
                );
                failed(e)
            }
        };
        results.push((bid.clone(), outcome));
    }

    results
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
