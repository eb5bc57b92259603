use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::hash::{Hash, Hasher};

/// One entry from a search results page.
///
/// Identity is the external `id` only. Name, link, price and image are display
/// metadata and never take part in equality or in the seen set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Listing {
    pub id: String,
    pub name: String,
    pub url: String,
    pub price: Option<String>,
    pub image_url: Option<String>,
}

impl Listing {
    pub fn new(id: impl Into<String>, name: Option<String>, url: impl Into<String>) -> Self {
        let id = id.into().trim().to_string();
        let name = match name {
            Some(n) if !n.trim().is_empty() => n.trim().to_string(),
            _ => Self::placeholder_name(&id),
        };

        Self {
            id,
            name,
            url: url.into(),
            price: None,
            image_url: None,
        }
    }

    pub fn with_price(mut self, price: Option<String>) -> Self {
        self.price = price;
        self
    }

    pub fn with_image(mut self, image_url: Option<String>) -> Self {
        self.image_url = image_url;
        self
    }

    pub fn placeholder_name(id: &str) -> String {
        format!("Listing {}", id)
    }

    pub fn has_valid_id(&self) -> bool {
        !self.id.trim().is_empty()
    }
}

impl PartialEq for Listing {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Listing {}

impl Hash for Listing {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

/// Identifiers that have already been reported.
///
/// The set only grows: there is no removal API, so a listing that was seen once
/// is never reported again by this process. A `BTreeSet` keeps serialization
/// order stable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SeenSet {
    ids: BTreeSet<String>,
}

impl SeenSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    /// Returns true if the id was not present before.
    pub fn insert(&mut self, id: impl Into<String>) -> bool {
        self.ids.insert(id.into())
    }

    pub fn extend<I, S>(&mut self, ids: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for id in ids {
            self.ids.insert(id.into());
        }
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn is_superset(&self, other: &SeenSet) -> bool {
        self.ids.is_superset(&other.ids)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.ids.iter().map(String::as_str)
    }
}

impl<S: Into<String>> FromIterator<S> for SeenSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut set = SeenSet::new();
        set.extend(iter);
        set
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn listing_identity_ignores_metadata() {
        let a = Listing::new("100", Some("Cabin".to_string()), "https://example.com/a");
        let b = Listing::new("100", Some("Loft".to_string()), "https://example.com/b")
            .with_price(Some("$120".to_string()));
        assert_eq!(a, b);
    }

    #[test]
    fn missing_name_gets_placeholder() {
        let listing = Listing::new("42", None, "https://example.com/42");
        assert_eq!(listing.name, "Listing 42");

        let blank = Listing::new("43", Some("   ".to_string()), "https://example.com/43");
        assert_eq!(blank.name, "Listing 43");
    }

    #[test]
    fn surrounding_whitespace_is_not_part_of_the_id() {
        let padded = Listing::new(" 100 ", None, "https://example.com/100");
        assert_eq!(padded.id, "100");
        assert_eq!(padded, Listing::new("100", None, "https://example.com/100"));
        assert_eq!(padded.name, "Listing 100");
    }

    #[test]
    fn seen_set_serializes_as_sorted_array() {
        let set: SeenSet = ["b", "a", "c"].into_iter().collect();
        let json = serde_json::to_string(&set).unwrap();
        assert_eq!(json, r#"["a","b","c"]"#);

        let back: SeenSet = serde_json::from_str(r#"["c","a"]"#).unwrap();
        assert!(back.contains("a"));
        assert_eq!(back.len(), 2);
    }
}
