//! `DistanceBreakdown` - insertion-ordered label/value map.

use serde::ser::{Serialize, SerializeMap, Serializer};

/// Itemized contributions to a computed distance.
///
/// Keys keep the position of their first insertion; inserting an existing
/// key replaces its value in place. Serializes as a JSON object in that order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DistanceBreakdown {
    entries: Vec<(String, f64)>,
}

impl DistanceBreakdown {
    /// Creates an empty breakdown.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Sets `label` to `value`.
    pub fn insert(&mut self, label: impl Into<String>, value: f64) {
        let label = label.into();
        if let Some(entry) = self.entries.iter_mut().find(|(key, _)| *key == label) {
            entry.1 = value;
        } else {
            self.entries.push((label, value));
        }
    }

    /// Returns the value stored for `label`.
    #[must_use]
    pub fn get(&self, label: &str) -> Option<f64> {
        self.entries
            .iter()
            .find(|(key, _)| key == label)
            .map(|(_, value)| *value)
    }

    /// Returns `true` if `label` is present.
    #[must_use]
    pub fn contains(&self, label: &str) -> bool {
        self.get(label).is_some()
    }

    /// Iterates over entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.entries.iter().map(|(key, value)| (key.as_str(), *value))
    }

    /// Number of entries.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if there are no entries.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Serialize for DistanceBreakdown {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (key, value) in &self.entries {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}
