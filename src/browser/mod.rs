//! Browser-facing collaborator seams.
//!
//! Defines the `PageDriver` and `ResponseListener` traits that abstract over
//! the browser engine (currently Chromium via chromiumoxide). The pagination
//! controller only ever talks to these traits, so the hard control logic can
//! run against deterministic fakes in tests.

pub mod chromium;

use anyhow::Result;
use async_trait::async_trait;
use std::time::Duration;

/// One intercepted data response.
///
/// Produced per wait-call, consumed immediately by the extractor, never
/// retained. The body may be any JSON shape; the acquisition loop validates
/// the envelope.
#[derive(Debug, Clone)]
pub struct RawResponse {
    /// The URL the response was served from.
    pub url: String,
    /// The parsed JSON body.
    pub body: serde_json::Value,
}

/// Gestures against the live page.
#[async_trait]
pub trait PageDriver: Send + Sync {
    /// Scroll the page to its bottom.
    async fn scroll_to_bottom(&self) -> Result<()>;
    /// Scroll vertically by `dy` CSS pixels; negative scrolls up.
    async fn scroll_by(&self, dy: i64) -> Result<()>;
    /// Poll for an element until it appears or `timeout` elapses.
    async fn find_element(
        &self,
        selector: &str,
        timeout: Duration,
    ) -> Result<Option<Box<dyn PageElement>>>;
}

/// A handle to an element located by [`PageDriver::find_element`].
#[async_trait]
pub trait PageElement: Send + Sync {
    /// The element's visible text, trimmed.
    async fn text(&self) -> Result<String>;
    /// Click the element. With `force_js` the click is dispatched from
    /// script, bypassing hit-testing for occluded controls.
    async fn click(&self, force_js: bool) -> Result<()>;
}

/// Subscription to the site's matching network responses.
#[async_trait]
pub trait ResponseListener: Send {
    /// Wait for the next matching data response. `None` on timeout.
    async fn wait_for_next(&mut self, timeout: Duration) -> Option<RawResponse>;
}
