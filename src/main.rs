use anyhow::{Context, Result};
use clap::Parser;
use listing_watch::airbnb_scraper::AirbnbScraper;
use listing_watch::config::{EmailArgs, MonitorArgs, Settings};
use listing_watch::detector::ChangeDetector;
use listing_watch::logging;
use listing_watch::notifier::EmailNotifier;
use listing_watch::scheduler::{Scheduler, Shutdown};
use listing_watch::seen_store::JsonSeenStore;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[clap(author, version, about = "Listing Watch - email alerts for new listings on a search page")]
struct Cli {
    #[clap(flatten)]
    monitor: MonitorArgs,

    #[clap(flatten)]
    email: EmailArgs,

    /// Run a single check and exit
    #[clap(long)]
    once: bool,

    /// Enable debug output
    #[clap(short, long)]
    debug: bool,
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    logging::init(cli.debug);

    let settings = match Settings::from_args(&cli.monitor, &cli.email) {
        Ok(settings) => settings,
        Err(e) => {
            error!("{}", e);
            error!("Please set these values (environment, .env or flags) before running");
            return Err(e.into());
        }
    };

    let source = AirbnbScraper::new(
        settings.search_url.clone(),
        settings.fetch_timeout,
        settings.fallback,
    )?;
    let notifier = EmailNotifier::new(&settings.email)?;
    let store = JsonSeenStore::new(&settings.state_file);
    let mut detector = ChangeDetector::new(source, notifier, store);

    let shutdown = Shutdown::new();
    let mut scheduler = Scheduler::new(settings.interval, settings.cooldown, shutdown.clone());

    if cli.once {
        let report = scheduler.run_once(&mut detector)?;
        info!(
            "Check complete: {} fetched, {} new, {} seen",
            report.fetched,
            report.new_listings.len(),
            report.seen_after
        );
        return Ok(());
    }

    let handle = shutdown.clone();
    ctrlc::set_handler(move || {
        info!("Shutdown requested, finishing current check...");
        handle.trigger();
    })
    .context("Failed to install shutdown handler")?;

    let stats = scheduler.run(&mut detector);
    info!(
        "Ran {} checks ({} aborted), {} listings seen",
        stats.cycles,
        stats.aborted,
        detector.seen().len()
    );

    Ok(())
}
