//! Harvest configuration.
//!
//! All site anchors (URL, selectors, accepted button labels) and tuning
//! thresholds live here with defaults matching the values tuned against the
//! live site, so behavior can be adjusted without touching the control loop.

use std::time::Duration;

/// Site-specific anchors: where to harvest and how to recognize the page's
/// moving parts.
#[derive(Debug, Clone)]
pub struct SiteProfile {
    /// Initial listing URL the session opens.
    pub listing_url: String,
    /// URL substring identifying the listing data responses.
    pub response_pattern: String,
    /// Selector for the load-more control.
    pub load_more_selector: String,
    /// Visible labels under which the load-more control is accepted.
    pub load_more_labels: Vec<String>,
    /// Selector for the in-flight loading indicator.
    pub loading_selector: String,
    /// Selector marking rendered listing items.
    pub list_item_selector: String,
    /// Selector for the "no more results" marker.
    pub no_results_selector: String,
    /// Selector for the compensating "nothing matched" banner.
    pub compensate_selector: String,
}

impl Default for SiteProfile {
    fn default() -> Self {
        Self {
            listing_url: "https://hotels.ctrip.com/hotels/list?countryId=1&city=12&highPrice=-1&barCurr=CNY&hotPoi=&sort=1&location=1046".to_string(),
            response_pattern: "soa2/31454/json".to_string(),
            load_more_selector: ".btn-box span".to_string(),
            load_more_labels: vec![
                "搜索更多酒店".to_string(),
                "更多推荐酒店".to_string(),
            ],
            loading_selector: ".loading".to_string(),
            list_item_selector: ".list-item-target".to_string(),
            no_results_selector: "p.nothing".to_string(),
            compensate_selector: ".compensate-title".to_string(),
        }
    }
}

/// Thresholds for the exhaustion judgment.
///
/// The defaults were tuned empirically against the live site; they are data,
/// not contracts of the judgment code, and can be adjusted independently.
#[derive(Debug, Clone, Copy)]
pub struct TerminationPolicy {
    /// Consecutive empty pages that confirm exhaustion outright.
    pub fast_streak: u32,
    /// Number of marker probes in the slow path.
    pub probes: u32,
    /// Minimum accumulated probe score for a slow-path verdict.
    pub confirm_score: i32,
    /// Minimum empty streak required alongside the probe score.
    pub min_streak: u32,
    /// Pause after the stabilizing scroll in each probe.
    pub probe_settle: Duration,
    /// Marker lookup timeout within a probe.
    pub marker_timeout: Duration,
}

impl Default for TerminationPolicy {
    fn default() -> Self {
        Self {
            fast_streak: 3,
            probes: 3,
            confirm_score: 2,
            min_streak: 2,
            probe_settle: Duration::from_secs(3),
            marker_timeout: Duration::from_secs(1),
        }
    }
}

/// Linearly increasing, capped wait between retries of the same page;
/// deeper pagination gets gentler treatment.
#[derive(Debug, Clone, Copy)]
pub struct BackoffPolicy {
    pub base_secs: u64,
    pub per_page_secs: u64,
    pub cap_secs: u64,
}

impl BackoffPolicy {
    /// The wait before retrying `page_index`.
    pub fn delay(&self, page_index: u32) -> Duration {
        let secs = self.base_secs + self.per_page_secs * u64::from(page_index);
        Duration::from_secs(secs.min(self.cap_secs))
    }
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            base_secs: 15,
            per_page_secs: 2,
            cap_secs: 60,
        }
    }
}

/// Everything the harvester needs to run one session.
#[derive(Debug, Clone, Default)]
pub struct HarvestConfig {
    pub site: SiteProfile,
    pub termination: TerminationPolicy,
    pub backoff: BackoffPolicy,
    pub acquisition: AcquisitionPolicy,
    pub strategy: StrategyPolicy,
}

/// Bounds on waiting for the site's data responses.
#[derive(Debug, Clone, Copy)]
pub struct AcquisitionPolicy {
    /// Attempts per acquisition before reporting page-level failure.
    pub max_retries: u32,
    /// How long each attempt waits for a matching response.
    pub response_timeout: Duration,
}

impl Default for AcquisitionPolicy {
    fn default() -> Self {
        Self {
            max_retries: 5,
            response_timeout: Duration::from_secs(30),
        }
    }
}

/// Strategy selection cutover.
#[derive(Debug, Clone, Copy)]
pub struct StrategyPolicy {
    /// Pages served by the scroll strategy before switching to the button.
    pub scroll_page_limit: u32,
}

impl Default for StrategyPolicy {
    fn default() -> Self {
        Self {
            scroll_page_limit: 3,
        }
    }
}
