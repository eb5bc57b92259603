use crate::models::Listing;
use crate::parser::{self, FallbackPolicy};
use crate::source::ListingSource;
use anyhow::{Context, Result};
use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, USER_AGENT};
use std::time::Duration;
use tracing::{debug, info, warn};

const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

/// Scrapes an Airbnb search results page over plain HTTP.
pub struct AirbnbScraper {
    client: Client,
    search_url: String,
    fallback: FallbackPolicy,
}

impl AirbnbScraper {
    pub fn new(search_url: impl Into<String>, timeout: Duration, fallback: FallbackPolicy) -> Result<Self> {
        Ok(Self {
            client: build_client(timeout)?,
            search_url: search_url.into(),
            fallback,
        })
    }

    pub fn search_url(&self) -> &str {
        &self.search_url
    }

    /// Fetch the raw search page.
    pub fn fetch_page(&self) -> Result<String> {
        debug!(url = %self.search_url, "fetching search page");

        let response = self
            .client
            .get(&self.search_url)
            .send()
            .context("Failed to fetch search page")?
            .error_for_status()
            .context("Search page returned an error status")?;

        response.text().context("Failed to read response body")
    }
}

impl ListingSource for AirbnbScraper {
    fn name(&self) -> &str {
        "Airbnb"
    }

    fn fetch_listings(&self) -> Result<Vec<Listing>> {
        let html = self.fetch_page()?;
        let listings = parser::extract_listings(&html, self.fallback);

        info!("Found {} listings", listings.len());
        if self.fallback.threshold > 0 && listings.len() < self.fallback.threshold {
            warn!(
                "Found fewer than {} listings - the page structure may have changed",
                self.fallback.threshold
            );
        }

        Ok(listings)
    }
}

pub fn build_client(timeout: Duration) -> Result<Client> {
    let mut headers = HeaderMap::new();
    headers.insert(USER_AGENT, HeaderValue::from_static(BROWSER_USER_AGENT));
    headers.insert(
        ACCEPT,
        HeaderValue::from_static("text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8"),
    );
    headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.5"));

    Client::builder()
        .default_headers(headers)
        .cookie_store(true)
        .timeout(timeout)
        .build()
        .context("Failed to build HTTP client")
}
