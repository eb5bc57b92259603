use crate::models::Listing;
use anyhow::Result;

/// Something that can produce the current listings for a search.
///
/// Results are best effort. The detector deduplicates them and treats an empty
/// result as suspect, so implementations may return duplicates and should
/// return an error rather than an empty list when they know the fetch failed.
pub trait ListingSource {
    fn name(&self) -> &str;
    fn fetch_listings(&self) -> Result<Vec<Listing>>;
}

impl<T: ListingSource + ?Sized> ListingSource for Box<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn fetch_listings(&self) -> Result<Vec<Listing>> {
        (**self).fetch_listings()
    }
}
