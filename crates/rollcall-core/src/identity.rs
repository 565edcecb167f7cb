use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A registered person. `enrollment` is the primary key; uniqueness is
/// enforced when the record is created, never at resolution time.
///
/// Serializes with the identity-directory file headers
/// (`Enrollment,Name,RegisteredOn`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Identity {
    pub enrollment: String,
    pub name: String,
    /// Registration timestamp, stored as written (e.g., "2026-03-01 09:15:00").
    pub registered_on: String,
}

/// Read-only lookup view of the identity directory: enrollment → display name.
///
/// Backed by a `BTreeMap` so iteration is lexicographic by enrollment. The
/// substring-fallback resolution strategies depend on this ordering being
/// deterministic.
#[derive(Debug, Clone, Default)]
pub struct Roster {
    entries: BTreeMap<String, String>,
}

impl Roster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_identities<I: IntoIterator<Item = Identity>>(identities: I) -> Self {
        let mut roster = Self::new();
        for id in identities {
            roster.insert(id.enrollment, id.name);
        }
        roster
    }

    /// Insert an entry. Last write wins; duplicate detection belongs to the
    /// registration path, not this lookup structure.
    pub fn insert(&mut self, enrollment: impl Into<String>, name: impl Into<String>) {
        self.entries.insert(enrollment.into(), name.into());
    }

    pub fn contains(&self, enrollment: &str) -> bool {
        self.entries.contains_key(enrollment)
    }

    pub fn name_of(&self, enrollment: &str) -> Option<&str> {
        self.entries.get(enrollment).map(String::as_str)
    }

    /// Iterate (enrollment, name) pairs in lexicographic enrollment order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(e, n)| (e.as_str(), n.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Mapping from a trainer-assigned numeric label to an enrollment id.
///
/// The trainer intends this to be injective (no two labels share an
/// enrollment); violations are tolerated and reported by the loading side.
#[derive(Debug, Clone, Default)]
pub struct LabelMap {
    entries: BTreeMap<u32, String>,
}

impl LabelMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, label: u32, enrollment: impl Into<String>) {
        self.entries.insert(label, enrollment.into());
    }

    pub fn get(&self, label: u32) -> Option<&str> {
        self.entries.get(&label).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, &str)> {
        self.entries.iter().map(|(l, e)| (*l, e.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<(u32, String)> for LabelMap {
    fn from_iter<T: IntoIterator<Item = (u32, String)>>(iter: T) -> Self {
        let mut map = Self::new();
        for (label, enrollment) in iter {
            map.insert(label, enrollment);
        }
        map
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roster_iterates_in_enrollment_order() {
        let mut roster = Roster::new();
        roster.insert("E300", "Carol");
        roster.insert("E100", "Alice");
        roster.insert("E200", "Bob");

        let keys: Vec<&str> = roster.iter().map(|(e, _)| e).collect();
        assert_eq!(keys, vec!["E100", "E200", "E300"]);
    }

    #[test]
    fn roster_last_insert_wins() {
        let mut roster = Roster::new();
        roster.insert("E100", "Alice");
        roster.insert("E100", "Alicia");
        assert_eq!(roster.name_of("E100"), Some("Alicia"));
        assert_eq!(roster.len(), 1);
    }

    #[test]
    fn label_map_lookup() {
        let map: LabelMap = [(0, "E001".to_string()), (1, "E002".to_string())]
            .into_iter()
            .collect();
        assert_eq!(map.get(0), Some("E001"));
        assert_eq!(map.get(7), None);
    }
}
