pub mod airbnb_scraper;
pub mod config;
pub mod detector;
pub mod error;
pub mod logging;
pub mod models;
pub mod notifier;
pub mod parser;
pub mod scheduler;
pub mod seen_store;
pub mod source;
