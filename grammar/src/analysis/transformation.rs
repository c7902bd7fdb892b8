use bimap::BiHashMap;
use serde::{Deserialize, Serialize};

/// The renaming performed by [`normalize`](super::normalize): a bijection between every original
/// rule name and the name of the rule which replaced it (`Name#0`).  Names of rules synthesized
/// during normalization have no entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transformation {
    names: BiHashMap<String, String>,
}

impl Transformation {
    pub fn new() -> Self {
        Self::default()
    }

    pub(super) fn insert(&mut self, original: String, normalized: String) {
        let overwritten = self.names.insert(original, normalized);
        debug_assert!(!overwritten.did_overwrite());
    }

    /// The normalized name of the rule originally called `original`
    pub fn forward(&self, original: &str) -> Option<&str> {
        self.names.get_by_left(original).map(String::as_str)
    }

    /// The original name of the normalized rule `normalized`, or `None` if `normalized` was
    /// synthesized
    pub fn backward(&self, normalized: &str) -> Option<&str> {
        self.names.get_by_right(normalized).map(String::as_str)
    }

    /// Iterates over `(original, normalized)` name pairs, in no particular order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.names.iter().map(|(o, n)| (o.as_str(), n.as_str()))
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}
