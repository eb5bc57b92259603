#![allow(dead_code)]

use anyhow::{anyhow, Result};
use listing_watch::models::{Listing, SeenSet};
use listing_watch::notifier::Notifier;
use listing_watch::seen_store::SeenStore;
use listing_watch::source::ListingSource;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

pub fn listing(id: &str, name: &str) -> Listing {
    Listing::new(id, Some(name.to_string()), format!("https://www.airbnb.com/rooms/{}", id))
}

/// Returns the queued responses in order, then empty results.
pub struct ScriptedSource {
    responses: RefCell<VecDeque<std::result::Result<Vec<Listing>, String>>>,
}

impl ScriptedSource {
    pub fn new(responses: Vec<std::result::Result<Vec<Listing>, String>>) -> Self {
        Self {
            responses: RefCell::new(responses.into()),
        }
    }
}

impl ListingSource for ScriptedSource {
    fn name(&self) -> &str {
        "scripted"
    }

    fn fetch_listings(&self) -> Result<Vec<Listing>> {
        match self.responses.borrow_mut().pop_front() {
            Some(Ok(listings)) => Ok(listings),
            Some(Err(reason)) => Err(anyhow!(reason)),
            None => Ok(Vec::new()),
        }
    }
}

/// Records every batch it is asked to deliver.
#[derive(Clone, Default)]
pub struct RecordingNotifier {
    calls: Rc<RefCell<Vec<Vec<Listing>>>>,
    fail: bool,
}

impl RecordingNotifier {
    pub fn failing() -> Self {
        Self {
            calls: Rc::default(),
            fail: true,
        }
    }

    pub fn calls(&self) -> Vec<Vec<Listing>> {
        self.calls.borrow().clone()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, listings: &[Listing]) -> Result<()> {
        self.calls.borrow_mut().push(listings.to_vec());
        if self.fail {
            return Err(anyhow!("smtp unavailable"));
        }
        Ok(())
    }
}

/// Store that cannot be written to.
pub struct FailingStore;

impl SeenStore for FailingStore {
    fn load(&self) -> SeenSet {
        SeenSet::new()
    }

    fn save(&self, _seen: &SeenSet) -> Result<()> {
        Err(anyhow!("disk full"))
    }
}
