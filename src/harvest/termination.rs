//! The exhaustion judgment.
//!
//! Two independent signals, combined conservatively: a long empty streak
//! confirms exhaustion outright, while a shorter streak needs a marker-probe
//! consensus on top. False termination loses data permanently; false
//! continuation only wastes time, so every threshold leans toward
//! continuing.

use crate::browser::PageDriver;
use crate::config::{SiteProfile, TerminationPolicy};
use crate::events::{EventBus, HarvestEvent};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Which signal confirmed exhaustion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TerminationReason {
    /// The empty streak alone reached the fast-path limit.
    EmptyStreak,
    /// Marker probes agreed the site has stopped serving data.
    MarkerConsensus,
}

/// Judge whether pagination is exhausted. `None` means keep going.
///
/// Invoked only after a failed page attempt, never unconditionally; a
/// successful page always continues.
pub async fn confirm_exhausted(
    driver: &dyn PageDriver,
    site: &SiteProfile,
    policy: &TerminationPolicy,
    empty_streak: u32,
    events: &EventBus,
) -> Result<Option<TerminationReason>> {
    // Fast path: a long run of empty pages is conclusive on its own.
    if empty_streak >= policy.fast_streak {
        info!(empty_streak, "empty streak limit reached");
        return Ok(Some(TerminationReason::EmptyStreak));
    }

    // Slow path: probe the page markers and accumulate a consensus score.
    let mut score: i32 = 0;
    for probe in 1..=policy.probes {
        driver.scroll_to_bottom().await?;
        tokio::time::sleep(policy.probe_settle).await;

        let has_stop = driver
            .find_element(&site.no_results_selector, policy.marker_timeout)
            .await?
            .is_some()
            || driver
                .find_element(&site.compensate_selector, policy.marker_timeout)
                .await?
                .is_some();
        let has_data = driver
            .find_element(&site.list_item_selector, policy.marker_timeout)
            .await?
            .is_some();

        if has_stop && !has_data {
            score += 1;
        } else if !has_stop && has_data {
            // Visible data lowers confidence in the stop markers.
            score -= 1;
        }
        debug!(probe, has_stop, has_data, score, "exhaustion probe");
        events.emit(HarvestEvent::TerminationProbe {
            probe,
            has_stop,
            has_data,
            score,
        });
    }

    if score >= policy.confirm_score && empty_streak >= policy.min_streak {
        info!(score, empty_streak, "marker consensus confirms exhaustion");
        return Ok(Some(TerminationReason::MarkerConsensus));
    }
    Ok(None)
}
