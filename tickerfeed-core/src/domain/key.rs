use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

use super::query::SourceKind;

/// `(source_kind, source-native id)`: the dedup identity of a record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NaturalKey {
    pub source: SourceKind,
    pub id: String,
}

impl NaturalKey {
    pub fn new(source: SourceKind, id: impl Into<String>) -> Self {
        Self {
            source,
            id: id.into(),
        }
    }
}

impl fmt::Display for NaturalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.source, self.id)
    }
}

/// Keys already persisted in one destination table.
///
/// Loaded once per run and only ever grown afterwards.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeySnapshot {
    keys: HashSet<NaturalKey>,
}

impl KeySnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, key: &NaturalKey) -> bool {
        self.keys.contains(key)
    }

    /// Returns `true` if the key was not present yet.
    pub fn insert(&mut self, key: NaturalKey) -> bool {
        self.keys.insert(key)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

impl FromIterator<NaturalKey> for KeySnapshot {
    fn from_iter<I: IntoIterator<Item = NaturalKey>>(iter: I) -> Self {
        Self {
            keys: iter.into_iter().collect(),
        }
    }
}

impl Extend<NaturalKey> for KeySnapshot {
    fn extend<I: IntoIterator<Item = NaturalKey>>(&mut self, iter: I) {
        self.keys.extend(iter);
    }
}
