//! Records, metadata and query results

use crate::vector::FeatureVector;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::time::{SystemTime, UNIX_EPOCH};

/// Identifier assigned to a record when it is added to a store.
pub type RecordId = String;

/// Free-form key/value metadata attached to a record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct Metadata {
    fields: BTreeMap<String, String>,
}

impl Metadata {
    /// Key under which the Exact Store persists a record's label.
    pub const LABEL_KEY: &'static str = "label";
    /// Key under which the caller's name hint is persisted.
    pub const NAME_KEY: &'static str = "name";

    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.fields.insert(key.into(), value.into());
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &String)> {
        self.fields.iter()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Metadata {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut m = Metadata::new();
        for (k, v) in iter {
            m.insert(k, v);
        }
        m
    }
}

/// A stored, labeled feature vector. Created once, never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorRecord {
    pub id: RecordId,
    pub label: String,
    pub vector: FeatureVector,
    pub metadata: Metadata,
}

/// One ranked result of a query. `distance` is always "lower is closer".
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Neighbor {
    pub id: RecordId,
    pub label: String,
    pub distance: f32,
    #[serde(skip_serializing_if = "Metadata::is_empty")]
    pub metadata: Metadata,
}

impl Neighbor {
    pub fn new(id: impl Into<RecordId>, label: impl Into<String>, distance: f32) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            distance,
            metadata: Metadata::new(),
        }
    }

    /// Name hint the record was inserted with, falling back to its id.
    pub fn display_name(&self) -> &str {
        self.metadata.get(Metadata::NAME_KEY).unwrap_or(&self.id)
    }
}

/// `"<unix millis>_<hint>"`, the insertion-time token used as a record id.
pub(crate) fn timestamped_id(hint: &str) -> RecordId {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0);
    format!("{}_{}", millis, hint)
}

/// `base`, or `base-N` for the smallest N not already taken.
pub(crate) fn unique_against(taken: &HashSet<RecordId>, base: RecordId) -> RecordId {
    if !taken.contains(&base) {
        return base;
    }
    let mut n = 1;
    loop {
        let candidate = format!("{}-{}", base, n);
        if !taken.contains(&candidate) {
            return candidate;
        }
        n += 1;
    }
}
