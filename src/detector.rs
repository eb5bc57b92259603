use crate::error::CycleError;
use crate::models::{Listing, SeenSet};
use crate::notifier::Notifier;
use crate::seen_store::SeenStore;
use crate::source::ListingSource;
use std::collections::HashSet;
use tracing::{error, info, warn};

/// Result of splitting a fetched collection against the seen set.
#[derive(Debug, Clone, PartialEq)]
pub struct Partition {
    /// Fetched listings after deduplication, in fetch order.
    pub current: Vec<Listing>,
    /// Listings whose id was not in the seen set.
    pub new_listings: Vec<Listing>,
    /// Seen set plus every fetched id.
    pub seen: SeenSet,
}

/// Deduplicate `fetched` by id (first occurrence wins) and split off the
/// listings not yet in `seen`.
pub fn partition_new(seen: &SeenSet, fetched: Vec<Listing>) -> Partition {
    let mut ids: HashSet<String> = HashSet::new();
    let mut current = Vec::with_capacity(fetched.len());

    for mut listing in fetched {
        if !listing.has_valid_id() {
            warn!(name = %listing.name, "Dropping listing without an id");
            continue;
        }
        if listing.id.trim().len() != listing.id.len() {
            listing.id = listing.id.trim().to_string();
        }
        if ids.insert(listing.id.clone()) {
            current.push(listing);
        }
    }

    let new_listings: Vec<Listing> = current
        .iter()
        .filter(|l| !seen.contains(&l.id))
        .cloned()
        .collect();

    let mut updated = seen.clone();
    updated.extend(current.iter().map(|l| l.id.clone()));

    Partition {
        current,
        new_listings,
        seen: updated,
    }
}

/// What happened during one check cycle.
#[derive(Debug, Default)]
pub struct CycleReport {
    pub fetched: usize,
    pub new_listings: Vec<Listing>,
    pub seen_before: usize,
    pub seen_after: usize,
    /// True when the fetch failed or came back empty and nothing was changed.
    pub skipped: bool,
    pub notified: bool,
    pub errors: Vec<CycleError>,
}

impl CycleReport {
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Fetches listings, diffs them against the seen set, persists the result and
/// notifies about what is new.
pub struct ChangeDetector<S, N, St> {
    source: S,
    notifier: N,
    store: St,
    seen: SeenSet,
}

impl<S, N, St> ChangeDetector<S, N, St>
where
    S: ListingSource,
    N: Notifier,
    St: SeenStore,
{
    /// Loads the seen set from `store` once; afterwards the in-memory copy is
    /// authoritative and the store is only written to.
    pub fn new(source: S, notifier: N, store: St) -> Self {
        let seen = store.load();
        info!("Loaded {} previously seen listings", seen.len());
        Self {
            source,
            notifier,
            store,
            seen,
        }
    }

    pub fn seen(&self) -> &SeenSet {
        &self.seen
    }

    pub fn run_cycle(&mut self) -> CycleReport {
        info!("Checking {} for new listings...", self.source.name());

        let mut report = CycleReport {
            seen_before: self.seen.len(),
            seen_after: self.seen.len(),
            ..CycleReport::default()
        };

        let fetched = match self.source.fetch_listings() {
            Ok(listings) => listings,
            Err(e) => {
                let err = CycleError::FetchFailed {
                    source_name: self.source.name().to_string(),
                    reason: format!("{:#}", e),
                };
                error!("{}", err);
                report.skipped = true;
                report.errors.push(err);
                return report;
            }
        };

        let partition = partition_new(&self.seen, fetched);
        if partition.current.is_empty() {
            warn!("No listings found - this might indicate an issue with the scraping");
            report.skipped = true;
            return report;
        }
        report.fetched = partition.current.len();

        for listing in &partition.new_listings {
            info!("New listing found: {} (ID: {})", listing.name, listing.id);
        }

        self.seen = partition.seen;
        report.seen_after = self.seen.len();

        // Persist before notifying so a failed send cannot cause a resend storm.
        if let Err(e) = self.store.save(&self.seen) {
            let err = CycleError::PersistFailed(format!("{:#}", e));
            error!("{}", err);
            report.errors.push(err);
        }

        if partition.new_listings.is_empty() {
            info!("No new listings found");
        } else {
            match self.notifier.notify(&partition.new_listings) {
                Ok(()) => report.notified = true,
                Err(e) => {
                    let err = CycleError::NotifyFailed {
                        count: partition.new_listings.len(),
                        reason: format!("{:#}", e),
                    };
                    error!("{}", err);
                    report.errors.push(err);
                }
            }
            info!("Found {} new listings", partition.new_listings.len());
        }

        report.new_listings = partition.new_listings;
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn listing(id: &str, name: &str) -> Listing {
        Listing::new(id, Some(name.to_string()), format!("https://www.airbnb.com/rooms/{}", id))
    }

    #[test]
    fn first_occurrence_wins() {
        let fetched = vec![listing("100", "First"), listing("100", "Second"), listing("101", "B")];
        let partition = partition_new(&SeenSet::new(), fetched);

        assert_eq!(partition.current.len(), 2);
        assert_eq!(partition.new_listings[0].name, "First");
    }

    #[test]
    fn only_unseen_ids_are_new() {
        let seen: SeenSet = ["100"].into_iter().collect();
        let partition = partition_new(&seen, vec![listing("100", "A"), listing("101", "B")]);

        let new_ids: Vec<&str> = partition.new_listings.iter().map(|l| l.id.as_str()).collect();
        assert_eq!(new_ids, vec!["101"]);
        assert_eq!(partition.seen, ["100", "101"].into_iter().collect());
    }

    #[test]
    fn seen_set_keeps_ids_that_disappeared() {
        let seen: SeenSet = ["1", "2", "3"].into_iter().collect();
        let partition = partition_new(&seen, vec![listing("4", "D")]);
        assert!(partition.seen.is_superset(&seen));
        assert_eq!(partition.seen.len(), 4);
    }

    #[test]
    fn padded_ids_match_seen_ids() {
        let seen: SeenSet = ["100"].into_iter().collect();
        let mut padded = listing("100", "A");
        padded.id = " 100".to_string();

        let partition = partition_new(&seen, vec![padded, listing("100 ", "B")]);
        assert_eq!(partition.current.len(), 1);
        assert!(partition.new_listings.is_empty());
        assert_eq!(partition.seen, seen);
    }

    #[test]
    fn listings_without_id_are_dropped() {
        let partition = partition_new(&SeenSet::new(), vec![listing("", "Ghost"), listing("7", "G")]);
        assert_eq!(partition.current.len(), 1);
        assert!(!partition.seen.contains(""));
    }
}
