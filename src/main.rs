use anyhow::{Context, Result};
use clap::Parser;
use stayharvest::browser::chromium::{ChromiumBrowser, ChromiumDriver, ChromiumListener};
use stayharvest::config::HarvestConfig;
use stayharvest::events::{EventBus, HarvestEvent, HarvestNotice};
use stayharvest::harvest::Harvester;
use stayharvest::sink::CsvSink;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::info;

const NAVIGATION_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Parser)]
#[command(
    name = "stayharvest",
    about = "Stayharvest, an adaptive hotel-listing harvester",
    version,
    after_help = "The harvest runs until the site is confirmed exhausted; \
                  interrupting it keeps everything written so far."
)]
struct Cli {
    /// Listing URL to open (defaults to the built-in city search)
    #[arg(long)]
    url: Option<String>,

    /// Output CSV path
    #[arg(long, default_value = "hotel_data.csv")]
    output: PathBuf,

    /// Run the browser with a visible window
    #[arg(long)]
    headful: bool,

    /// Suppress progress output
    #[arg(long, short)]
    quiet: bool,

    /// Enable verbose/debug logging
    #[arg(long, short)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let directive = if cli.verbose {
        "stayharvest=debug"
    } else {
        "stayharvest=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(directive.parse().context("invalid log directive")?),
        )
        .init();

    let mut config = HarvestConfig::default();
    if let Some(url) = cli.url {
        url::Url::parse(&url).context("invalid listing URL")?;
        config.site.listing_url = url;
    }

    info!("starting stayharvest v{}", env!("CARGO_PKG_VERSION"));

    let events = Arc::new(EventBus::new(256));
    let printer = if cli.quiet {
        None
    } else {
        Some(tokio::spawn(print_progress(events.subscribe())))
    };

    let browser = ChromiumBrowser::launch(!cli.headful).await?;
    let page = browser.open_blank().await?;

    // The listener must attach before navigation so the first page's data
    // fetch is captured.
    let listener = ChromiumListener::start(&page, &config.site.response_pattern).await?;
    let driver = ChromiumDriver::new(page);
    driver
        .navigate(&config.site.listing_url, NAVIGATION_TIMEOUT)
        .await?;

    let sink = CsvSink::create(&cli.output)?;
    let harvester = Harvester::new(
        Box::new(driver),
        Box::new(listener),
        Box::new(sink),
        config,
        Arc::clone(&events),
    );
    let outcome = harvester.run().await;

    if let Some(task) = printer {
        task.abort();
    }
    let _ = browser.close().await;

    let summary = outcome?;
    println!(
        "harvest complete: {} pages, {} records -> {}",
        summary.pages_harvested,
        summary.records_written,
        cli.output.display()
    );
    Ok(())
}

/// Print progress lines as the harvester reports its decisions.
async fn print_progress(mut rx: broadcast::Receiver<HarvestNotice>) {
    loop {
        match rx.recv().await {
            Ok(notice) => eprintln!("  {}", render(&notice.event)),
            Err(broadcast::error::RecvError::Lagged(_)) => continue,
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

fn render(event: &HarvestEvent) -> String {
    match event {
        HarvestEvent::PageStarted { page, strategy } => {
            format!("page {page}: {strategy} strategy")
        }
        HarvestEvent::AcquisitionAttempt {
            page,
            attempt,
            max_retries,
        } => format!("page {page}: waiting for data ({attempt}/{max_retries})"),
        HarvestEvent::PageLoaded {
            page,
            valid_count,
            total_items,
        } => format!("page {page}: {valid_count} listings written ({total_items} seen)"),
        HarvestEvent::PageEmpty { page, empty_streak } => {
            format!("page {page}: no valid listings (streak {empty_streak})")
        }
        HarvestEvent::RetryScheduled { page, delay_secs } => {
            format!("page {page}: retrying in {delay_secs}s")
        }
        HarvestEvent::TerminationProbe {
            probe,
            has_stop,
            has_data,
            score,
        } => format!(
            "probe {probe}: stop_marker={has_stop} data_marker={has_data} score={score}"
        ),
        HarvestEvent::TerminationConfirmed { page, reason } => {
            format!("page {page}: exhaustion confirmed ({reason:?})")
        }
        HarvestEvent::HarvestComplete { pages, records } => {
            format!("done: {pages} pages, {records} records")
        }
    }
}
