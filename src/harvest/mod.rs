//! The pagination engine: session state, strategy selection, the control
//! loop, and the exhaustion judgment.

pub mod controller;
pub mod termination;

pub use controller::{Harvester, HarvestSummary};

use serde::{Deserialize, Serialize};
use std::fmt;

/// Mutable pagination state, owned exclusively by the controller.
#[derive(Debug, Clone, Copy)]
pub struct HarvestSession {
    /// Current page, starting at 1. Incremented only on confirmed success.
    pub page_index: u32,
    /// Consecutive pages yielding zero valid records. Resets to 0 the
    /// instant any page yields a valid record.
    pub empty_streak: u32,
}

impl HarvestSession {
    pub fn new() -> Self {
        Self {
            page_index: 1,
            empty_streak: 0,
        }
    }
}

impl Default for HarvestSession {
    fn default() -> Self {
        Self::new()
    }
}

/// How the next page of results is provoked out of the site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StrategyMode {
    /// Lazy-load by scrolling; the site feeds the first pages this way.
    Scroll,
    /// Deeper pages sit behind a load-more control.
    Button,
}

impl StrategyMode {
    /// Strategy is a pure function of the page index.
    pub fn for_page(page_index: u32, scroll_page_limit: u32) -> Self {
        if page_index <= scroll_page_limit {
            Self::Scroll
        } else {
            Self::Button
        }
    }
}

impl fmt::Display for StrategyMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Scroll => write!(f, "scroll"),
            Self::Button => write!(f, "button"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strategy_boundary() {
        assert_eq!(StrategyMode::for_page(1, 3), StrategyMode::Scroll);
        assert_eq!(StrategyMode::for_page(2, 3), StrategyMode::Scroll);
        assert_eq!(StrategyMode::for_page(3, 3), StrategyMode::Scroll);
        assert_eq!(StrategyMode::for_page(4, 3), StrategyMode::Button);
        assert_eq!(StrategyMode::for_page(100, 3), StrategyMode::Button);
    }

    #[test]
    fn test_session_starts_at_page_one() {
        let session = HarvestSession::new();
        assert_eq!(session.page_index, 1);
        assert_eq!(session.empty_streak, 0);
    }
}
