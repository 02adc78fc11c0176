//! Chromium-backed implementations of the browser seams, using chromiumoxide.

use super::{PageDriver, PageElement, RawResponse, ResponseListener};
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use base64::Engine as _;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::network::{
    EnableParams, EventLoadingFinished, EventResponseReceived, GetResponseBodyParams, RequestId,
};
use chromiumoxide::page::Page;
use futures::StreamExt;
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Poll interval inside [`ChromiumDriver::find_element`].
const ELEMENT_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Find the Chromium binary path.
pub fn find_chromium() -> Option<PathBuf> {
    // 1. STAYHARVEST_CHROMIUM_PATH env
    if let Ok(p) = std::env::var("STAYHARVEST_CHROMIUM_PATH") {
        let path = PathBuf::from(&p);
        if path.exists() {
            return Some(path);
        }
    }

    // 2. ~/.stayharvest/chromium/
    if let Some(home) = dirs::home_dir() {
        let candidates = if cfg!(target_os = "macos") {
            vec![
                home.join(".stayharvest/chromium/Google Chrome for Testing.app/Contents/MacOS/Google Chrome for Testing"),
                home.join(".stayharvest/chromium/chrome"),
            ]
        } else {
            vec![
                home.join(".stayharvest/chromium/chrome-linux64/chrome"),
                home.join(".stayharvest/chromium/chrome"),
            ]
        };
        for c in candidates {
            if c.exists() {
                return Some(c);
            }
        }
    }

    // 3. System PATH
    for name in ["google-chrome", "chromium", "chromium-browser"] {
        if let Ok(path) = which::which(name) {
            return Some(path);
        }
    }

    // 4. Common macOS locations
    if cfg!(target_os = "macos") {
        let common =
            PathBuf::from("/Applications/Google Chrome.app/Contents/MacOS/Google Chrome");
        if common.exists() {
            return Some(common);
        }
    }

    None
}

/// A launched Chromium instance.
pub struct ChromiumBrowser {
    browser: Browser,
    handler_task: tokio::task::JoinHandle<()>,
}

impl ChromiumBrowser {
    /// Launch a Chromium instance and spawn its CDP handler task.
    pub async fn launch(headless: bool) -> Result<Self> {
        let chrome_path = find_chromium()
            .context("Chromium not found. Set STAYHARVEST_CHROMIUM_PATH or install google-chrome.")?;

        let mut builder = BrowserConfig::builder()
            .chrome_executable(chrome_path)
            .arg("--disable-gpu")
            .arg("--no-sandbox")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-extensions")
            .arg("--disable-background-networking");
        if headless {
            builder = builder.arg("--headless=new");
        } else {
            builder = builder.with_head();
        }
        let config = builder
            .build()
            .map_err(|e| anyhow::anyhow!("failed to build browser config: {e}"))?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .context("failed to launch Chromium")?;

        // Drain CDP messages for the lifetime of the browser.
        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                let _ = event;
            }
        });

        Ok(Self {
            browser,
            handler_task,
        })
    }

    /// Open a blank tab. Navigation happens separately so the response
    /// listener can attach before the first data fetch fires.
    pub async fn open_blank(&self) -> Result<Page> {
        self.browser
            .new_page("about:blank")
            .await
            .context("failed to create new page")
    }

    /// Shut the browser down.
    pub async fn close(mut self) -> Result<()> {
        let _ = self.browser.close().await;
        self.handler_task.abort();
        Ok(())
    }
}

/// Page driver over a single Chromium tab.
///
/// All gestures go through `page.evaluate`, the same path the site's own
/// lazy-load triggers observe.
#[derive(Clone)]
pub struct ChromiumDriver {
    page: Page,
}

impl ChromiumDriver {
    pub fn new(page: Page) -> Self {
        Self { page }
    }

    /// Navigate to `url` with a timeout, waiting for the load to settle.
    pub async fn navigate(&self, url: &str, timeout: Duration) -> Result<()> {
        match tokio::time::timeout(timeout, self.page.goto(url)).await {
            Ok(Ok(_)) => {
                let _ = self.page.wait_for_navigation().await;
                Ok(())
            }
            Ok(Err(e)) => bail!("navigation failed: {e}"),
            Err(_) => bail!("navigation timed out after {}s", timeout.as_secs()),
        }
    }

    async fn selector_exists(&self, selector: &str) -> Result<bool> {
        let js = format!(
            "document.querySelector('{}') !== null",
            escape_js(selector)
        );
        let result = self
            .page
            .evaluate(js)
            .await
            .context("element lookup failed")?;
        Ok(result.into_value::<bool>().unwrap_or(false))
    }
}

#[async_trait]
impl PageDriver for ChromiumDriver {
    async fn scroll_to_bottom(&self) -> Result<()> {
        self.page
            .evaluate("window.scrollTo(0, document.body.scrollHeight)")
            .await
            .context("scroll to bottom failed")?;
        Ok(())
    }

    async fn scroll_by(&self, dy: i64) -> Result<()> {
        self.page
            .evaluate(format!("window.scrollBy(0, {dy})"))
            .await
            .context("scroll failed")?;
        Ok(())
    }

    async fn find_element(
        &self,
        selector: &str,
        timeout: Duration,
    ) -> Result<Option<Box<dyn PageElement>>> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if self.selector_exists(selector).await? {
                return Ok(Some(Box::new(ChromiumElement {
                    page: self.page.clone(),
                    selector: selector.to_string(),
                })));
            }
            if tokio::time::Instant::now() >= deadline {
                return Ok(None);
            }
            tokio::time::sleep(ELEMENT_POLL_INTERVAL).await;
        }
    }
}

/// An element handle resolved by selector on every use. The site re-renders
/// its list between pages, so a stored node reference would go stale.
pub struct ChromiumElement {
    page: Page,
    selector: String,
}

#[async_trait]
impl PageElement for ChromiumElement {
    async fn text(&self) -> Result<String> {
        let js = format!(
            "document.querySelector('{}')?.textContent ?? ''",
            escape_js(&self.selector)
        );
        let result = self.page.evaluate(js).await.context("text lookup failed")?;
        let text: String = result.into_value().unwrap_or_default();
        Ok(text.trim().to_string())
    }

    async fn click(&self, force_js: bool) -> Result<()> {
        if force_js {
            let js = format!(
                "document.querySelector('{}')?.click()",
                escape_js(&self.selector)
            );
            self.page.evaluate(js).await.context("js click failed")?;
            return Ok(());
        }
        let element = self
            .page
            .find_element(self.selector.as_str())
            .await
            .context("element vanished before click")?;
        element.click().await.context("click failed")?;
        Ok(())
    }
}

/// Captures matching network responses into a queue.
///
/// Subscribes to the CDP Network domain so it can attach before navigation;
/// the first page's data fetch must not be missed. Response bodies only
/// become available once loading finishes, so matched request ids are held
/// until the corresponding `LoadingFinished` event.
pub struct ChromiumListener {
    rx: mpsc::Receiver<RawResponse>,
    capture_task: tokio::task::JoinHandle<()>,
}

impl ChromiumListener {
    /// Start listening on `page` for responses whose URL contains `pattern`.
    pub async fn start(page: &Page, pattern: &str) -> Result<Self> {
        page.execute(EnableParams::default())
            .await
            .context("failed to enable the network domain")?;

        let mut responses = page
            .event_listener::<EventResponseReceived>()
            .await
            .context("failed to listen for network responses")?;
        let mut finished = page
            .event_listener::<EventLoadingFinished>()
            .await
            .context("failed to listen for loading-finished events")?;

        let (tx, rx) = mpsc::channel(16);
        let page = page.clone();
        let pattern = pattern.to_string();

        let capture_task = tokio::spawn(async move {
            // request ids whose response URL matched, awaiting their body
            let mut pending: HashMap<String, String> = HashMap::new();
            loop {
                tokio::select! {
                    event = responses.next() => {
                        let Some(event) = event else { break };
                        if event.response.url.contains(&pattern) {
                            debug!(url = %event.response.url, "matched listing response");
                            pending.insert(
                                event.request_id.inner().to_string(),
                                event.response.url.clone(),
                            );
                        }
                    }
                    event = finished.next() => {
                        let Some(event) = event else { break };
                        let Some(url) = pending.remove(event.request_id.inner()) else {
                            continue;
                        };
                        match fetch_body(&page, &event.request_id).await {
                            Ok(body) => {
                                if tx.send(RawResponse { url, body }).await.is_err() {
                                    break;
                                }
                            }
                            Err(e) => warn!("failed to read intercepted body: {e:#}"),
                        }
                    }
                }
            }
        });

        Ok(Self { rx, capture_task })
    }
}

async fn fetch_body(page: &Page, request_id: &RequestId) -> Result<serde_json::Value> {
    let reply = page
        .execute(GetResponseBodyParams::new(request_id.clone()))
        .await
        .context("GetResponseBody failed")?;

    let raw = if reply.result.base64_encoded {
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(reply.result.body.as_bytes())
            .context("response body is not valid base64")?;
        String::from_utf8(bytes).context("response body is not UTF-8")?
    } else {
        reply.result.body.clone()
    };

    serde_json::from_str(&raw).context("response body is not JSON")
}

#[async_trait]
impl ResponseListener for ChromiumListener {
    async fn wait_for_next(&mut self, timeout: Duration) -> Option<RawResponse> {
        tokio::time::timeout(timeout, self.rx.recv()).await.ok().flatten()
    }
}

impl Drop for ChromiumListener {
    fn drop(&mut self) {
        self.capture_task.abort();
    }
}

/// Escape a string for safe injection into a JS single-quoted literal.
fn escape_js(s: &str) -> String {
    let mut result = String::with_capacity(s.len() + 8);
    for ch in s.chars() {
        match ch {
            '\\' => result.push_str("\\\\"),
            '\'' => result.push_str("\\'"),
            '"' => result.push_str("\\\""),
            '\n' => result.push_str("\\n"),
            '\r' => result.push_str("\\r"),
            '\0' => {}
            _ => result.push(ch),
        }
    }
    result
}
