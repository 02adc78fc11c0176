//! The pagination controller: the loop that drives a harvest session to
//! confirmed exhaustion.
//!
//! The controller performs no I/O of its own beyond delegating to its
//! collaborators: the page driver provokes data fetches, the response
//! listener delivers intercepted payloads, the extractor validates them,
//! and records flow to the sink. All decision logic (strategy selection,
//! bounded retry, empty-streak tracking, termination, backoff) lives here.

use super::{termination, HarvestSession, StrategyMode};
use crate::browser::{PageDriver, PageElement, ResponseListener};
use crate::config::HarvestConfig;
use crate::events::{EventBus, HarvestEvent};
use crate::extract;
use crate::sink::RecordSink;
use anyhow::Result;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

// Gesture pacing. The scroll offsets leave the lazy-load trigger region
// visible; the pauses give the site time to fire it.
const SCROLL_SETTLE: Duration = Duration::from_secs(3);
const SCROLL_BACK_SETTLE: Duration = Duration::from_secs(1);
const SCROLL_BACK_OFFSET: i64 = 200;

const BUTTON_POLL_WINDOW: Duration = Duration::from_secs(8);
const BUTTON_LOOKUP_TIMEOUT: Duration = Duration::from_secs(3);
const BUTTON_POLL_PAUSE: Duration = Duration::from_secs(2);
const REPOLL_SCROLL_OFFSET: i64 = 500;

const LOAD_WATCH_WINDOW: Duration = Duration::from_secs(60);
const LOADING_LOOKUP_TIMEOUT: Duration = Duration::from_secs(1);
const LOADING_PAUSE: Duration = Duration::from_secs(5);
const CONTENT_LOOKUP_TIMEOUT: Duration = Duration::from_secs(2);
const CONTENT_PAUSE: Duration = Duration::from_secs(3);

const STABILIZE_PAUSE: Duration = Duration::from_secs(1);
const STABILIZE_SCROLL_OFFSET: i64 = 400;

const RECOVERY_PAUSE: Duration = Duration::from_secs(2);
const RECOVERY_SCROLL_OFFSET: i64 = 600;

const MARKER_LOOKUP_TIMEOUT: Duration = Duration::from_millis(500);

/// End-of-session totals.
#[derive(Debug, Clone, Copy)]
pub struct HarvestSummary {
    /// Pages confirmed harvested.
    pub pages_harvested: u32,
    /// Records written to the sink.
    pub records_written: u64,
}

/// Drives one harvest session to completion or confirmed exhaustion.
pub struct Harvester {
    driver: Box<dyn PageDriver>,
    listener: Box<dyn ResponseListener>,
    sink: Box<dyn RecordSink>,
    config: HarvestConfig,
    events: Arc<EventBus>,
    session: HarvestSession,
    records_written: u64,
}

impl Harvester {
    pub fn new(
        driver: Box<dyn PageDriver>,
        listener: Box<dyn ResponseListener>,
        sink: Box<dyn RecordSink>,
        config: HarvestConfig,
        events: Arc<EventBus>,
    ) -> Self {
        Self {
            driver,
            listener,
            sink,
            config,
            events,
            session: HarvestSession::new(),
            records_written: 0,
        }
    }

    /// Run until termination is confirmed or a collaborator fails fatally.
    ///
    /// The sink is finished exactly once on every exit path; records written
    /// before a fatal error remain persisted.
    pub async fn run(mut self) -> Result<HarvestSummary> {
        let outcome = self.drive().await;
        let closed = self.sink.finish();

        outcome?;
        closed?;

        let summary = HarvestSummary {
            pages_harvested: self.session.page_index - 1,
            records_written: self.records_written,
        };
        self.events.emit(HarvestEvent::HarvestComplete {
            pages: summary.pages_harvested,
            records: summary.records_written,
        });
        Ok(summary)
    }

    async fn drive(&mut self) -> Result<()> {
        loop {
            let page = self.session.page_index;
            let strategy =
                StrategyMode::for_page(page, self.config.strategy.scroll_page_limit);
            info!(page, %strategy, "harvesting page");
            self.events.emit(HarvestEvent::PageStarted { page, strategy });

            let success = match strategy {
                StrategyMode::Scroll => self.scroll_page().await?,
                StrategyMode::Button => self.button_page().await,
            };

            if success {
                self.session.page_index += 1;
                // The extraction step already reset this on any valid
                // record; re-assert the invariant at the loop edge.
                self.session.empty_streak = 0;
                continue;
            }

            warn!(page, "page attempt failed");
            if let Some(reason) = termination::confirm_exhausted(
                self.driver.as_ref(),
                &self.config.site,
                &self.config.termination,
                self.session.empty_streak,
                &self.events,
            )
            .await?
            {
                info!(page, ?reason, "harvest exhausted");
                self.events
                    .emit(HarvestEvent::TerminationConfirmed { page, reason });
                return Ok(());
            }

            let delay = self.config.backoff.delay(page);
            info!(delay_secs = delay.as_secs(), "backing off before retrying");
            self.events.emit(HarvestEvent::RetryScheduled {
                page,
                delay_secs: delay.as_secs(),
            });
            tokio::time::sleep(delay).await;

            // Re-stabilize the viewport before retrying the same page.
            self.driver.scroll_to_bottom().await?;
            tokio::time::sleep(RECOVERY_PAUSE).await;
            self.driver.scroll_by(-RECOVERY_SCROLL_OFFSET).await?;
            tokio::time::sleep(RECOVERY_PAUSE).await;
        }
    }

    /// Scroll strategy: nudge the lazy-load trigger, then acquire.
    /// Driver failures here are fatal; the tab is in an unknown state.
    async fn scroll_page(&mut self) -> Result<bool> {
        debug!("scroll strategy: nudging the lazy-load trigger");
        self.driver.scroll_to_bottom().await?;
        tokio::time::sleep(SCROLL_SETTLE).await;
        self.driver.scroll_by(-SCROLL_BACK_OFFSET).await?;
        tokio::time::sleep(SCROLL_BACK_SETTLE).await;
        self.acquire().await
    }

    /// Button strategy: find and click the load-more control, wait out the
    /// loading indicator, then acquire. Any automation glitch in this
    /// sequence is converted into a page-level failure; the harvest must
    /// survive a single page's misbehavior.
    async fn button_page(&mut self) -> bool {
        match self.button_page_inner().await {
            Ok(success) => success,
            Err(e) => {
                warn!("button strategy failed: {e:#}");
                false
            }
        }
    }

    async fn button_page_inner(&mut self) -> Result<bool> {
        let Some(button) = self.poll_load_more().await? else {
            warn!("load-more control never appeared");
            return Ok(false);
        };

        // The control is routinely occluded by the sticky footer.
        button.click(true).await?;
        debug!("clicked load-more, watching for new content");
        self.watch_loading().await?;

        self.driver.scroll_to_bottom().await?;
        tokio::time::sleep(STABILIZE_PAUSE).await;
        self.driver.scroll_by(-STABILIZE_SCROLL_OFFSET).await?;
        tokio::time::sleep(STABILIZE_PAUSE).await;

        self.acquire().await
    }

    /// Poll for the load-more control within a bounded window, accepting it
    /// only under one of the configured labels.
    async fn poll_load_more(&mut self) -> Result<Option<Box<dyn PageElement>>> {
        let deadline = Instant::now() + BUTTON_POLL_WINDOW;
        loop {
            self.driver.scroll_to_bottom().await?;
            tokio::time::sleep(BUTTON_POLL_PAUSE).await;

            if let Some(element) = self
                .driver
                .find_element(&self.config.site.load_more_selector, BUTTON_LOOKUP_TIMEOUT)
                .await?
            {
                let label = element.text().await?;
                if self
                    .config
                    .site
                    .load_more_labels
                    .iter()
                    .any(|accepted| accepted == &label)
                {
                    return Ok(Some(element));
                }
                debug!(%label, "control present but label not accepted");
            }

            if Instant::now() >= deadline {
                return Ok(None);
            }
            debug!("load-more control not found, re-scrolling");
            self.driver.scroll_by(-REPOLL_SCROLL_OFFSET).await?;
            tokio::time::sleep(BUTTON_POLL_PAUSE).await;
        }
    }

    /// Watch the loading indicator for up to the load window, breaking early
    /// once new content is present.
    async fn watch_loading(&mut self) -> Result<()> {
        let deadline = Instant::now() + LOAD_WATCH_WINDOW;
        while Instant::now() < deadline {
            if self
                .driver
                .find_element(&self.config.site.loading_selector, LOADING_LOOKUP_TIMEOUT)
                .await?
                .is_some()
            {
                debug!("loading indicator present, waiting");
                tokio::time::sleep(LOADING_PAUSE).await;
            } else if self
                .driver
                .find_element(&self.config.site.list_item_selector, CONTENT_LOOKUP_TIMEOUT)
                .await?
                .is_some()
            {
                debug!("new content detected");
                break;
            } else {
                debug!("no new content yet");
                tokio::time::sleep(CONTENT_PAUSE).await;
            }
        }
        Ok(())
    }

    /// Shared response acquisition: bounded retries around the listener.
    ///
    /// Distinguishes "never got a parseable response" (network flake, retry)
    /// from "valid response with no valid listings" (a legitimate empty
    /// signal that feeds the termination logic, reported as page failure).
    async fn acquire(&mut self) -> Result<bool> {
        let page = self.session.page_index;
        let policy = self.config.acquisition;
        for attempt in 1..=policy.max_retries {
            debug!(attempt, max_retries = policy.max_retries, "awaiting listing response");
            self.events.emit(HarvestEvent::AcquisitionAttempt {
                page,
                attempt,
                max_retries: policy.max_retries,
            });

            let Some(response) = self.listener.wait_for_next(policy.response_timeout).await
            else {
                warn!(attempt, "no listing response before timeout");
                continue;
            };
            if !has_listing_envelope(&response.body) {
                warn!(attempt, url = %response.url, "response missing listing envelope");
                continue;
            }
            return self.consume(&response.body).await;
        }
        warn!(page, "acquisition attempts exhausted");
        Ok(false)
    }

    /// Extraction step for one structurally valid payload: observe (never
    /// act on) interference markers, project records into the sink, update
    /// the empty streak.
    async fn consume(&mut self, body: &Value) -> Result<bool> {
        self.observe_interference().await?;

        let extraction = extract::extract(body);
        for record in &extraction.records {
            self.sink.append(record)?;
        }
        self.records_written += extraction.valid_count as u64;

        let page = self.session.page_index;
        if extraction.valid_count == 0 {
            self.session.empty_streak += 1;
            info!(
                page,
                empty_streak = self.session.empty_streak,
                "page yielded no valid listings"
            );
            self.events.emit(HarvestEvent::PageEmpty {
                page,
                empty_streak: self.session.empty_streak,
            });
        } else {
            self.session.empty_streak = 0;
            info!(
                page,
                valid = extraction.valid_count,
                total = extraction.total_items,
                "listings written"
            );
            self.events.emit(HarvestEvent::PageLoaded {
                page,
                valid_count: extraction.valid_count,
                total_items: extraction.total_items,
            });
        }
        Ok(extraction.valid_count > 0)
    }

    /// End-of-results markers sometimes co-occur with valid trailing data,
    /// so their presence is logged and nothing more.
    async fn observe_interference(&mut self) -> Result<()> {
        let visible = self
            .driver
            .find_element(&self.config.site.no_results_selector, MARKER_LOOKUP_TIMEOUT)
            .await?
            .is_some()
            || self
                .driver
                .find_element(&self.config.site.compensate_selector, MARKER_LOOKUP_TIMEOUT)
                .await?
                .is_some();
        if visible {
            debug!("end-of-results marker visible, extracting anyway");
        }
        Ok(())
    }
}

/// A response is structurally valid when its body is an object carrying a
/// usable top-level `data` value.
fn has_listing_envelope(body: &Value) -> bool {
    match body.as_object().and_then(|o| o.get("data")) {
        None | Some(Value::Null) => false,
        Some(Value::Object(o)) => !o.is_empty(),
        Some(Value::Array(a)) => !a.is_empty(),
        Some(_) => true,
    }
}
