use anyhow::{Context, Result};
use clap::Parser;
use listing_watch::airbnb_scraper::AirbnbScraper;
use listing_watch::logging;
use listing_watch::parser::{self, FallbackPolicy, PageDiagnostics};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug)]
#[clap(author, version, about = "Fetch the search page and report what the extractor sees")]
struct Args {
    /// Search results page to inspect
    #[clap(long, env = "AIRBNB_SEARCH_URL")]
    search_url: String,

    /// Where to save the fetched HTML
    #[clap(short, long, default_value = "debug_page.html")]
    output: PathBuf,

    /// Request timeout in seconds
    #[clap(long, env = "FETCH_TIMEOUT_SECS", default_value = "30")]
    timeout_secs: u64,

    /// Enable debug output
    #[clap(short, long)]
    debug: bool,
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();
    logging::init(args.debug);

    let scraper = AirbnbScraper::new(
        args.search_url.clone(),
        Duration::from_secs(args.timeout_secs),
        FallbackPolicy::disabled(),
    )?;

    println!("Fetching page...");
    let html = scraper.fetch_page()?;
    std::fs::write(&args.output, &html)
        .context(format!("Failed to write {}", args.output.display()))?;
    println!("HTML saved to {}", args.output.display());

    let diag = PageDiagnostics::inspect(&html);
    println!("Page size: {} characters", diag.size);

    if diag.looks_blocked {
        println!("❌ Page might be blocked or requires captcha");
    }

    println!("\n=== Listing patterns ===");
    for (label, count) in &diag.pattern_counts {
        println!("Pattern {}: {} matches", label, count);
    }
    println!("Listing markers: {}", diag.marker_count);
    println!("Listing cards: {}", diag.card_count);

    if diag.has_initial_state {
        println!("✅ Found JavaScript state data");
    } else {
        println!("❌ No JavaScript state found - page might not be loading properly");
    }
    for marker in &diag.error_markers {
        println!("❌ Found error marker: {}", marker);
    }

    let listings = parser::extract_listings(&html, FallbackPolicy::default());
    println!("\n=== Extracted {} listings ===", listings.len());
    for listing in listings.iter().take(10) {
        println!(
            "{} | {} | {}",
            listing.id,
            listing.name,
            listing.price.as_deref().unwrap_or("-")
        );
    }

    Ok(())
}
