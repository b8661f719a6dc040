//! Chat → result-set bindings and the result sets themselves.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use ulid::Ulid;

use crate::error::Result;
use crate::shelter::CanonicalShelterRecord;

/// Identifier of one ingestion batch.
///
/// A ULID: time-ordered, and unique even for batches minted in the same
/// millisecond.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResultSetId(String);

impl ResultSetId {
    /// Mint a fresh id.
    pub fn generate() -> Self {
        Self(Ulid::new().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ResultSetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ResultSetId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for ResultSetId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Session bindings plus the ordered record lists they point at.
///
/// Serialized as one blob:
/// `{ "chat_to_result_set": {...}, "result_sets": {...} }`.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionMappingStore {
    #[serde(default)]
    chat_to_result_set: HashMap<String, ResultSetId>,
    #[serde(default)]
    result_sets: HashMap<ResultSetId, Vec<CanonicalShelterRecord>>,
}

impl SessionMappingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store an ordered record list. Insertion order is kept as given.
    pub fn insert_result_set(&mut self, id: ResultSetId, records: Vec<CanonicalShelterRecord>) {
        self.result_sets.insert(id, records);
    }

    pub fn has_result_set(&self, id: &ResultSetId) -> bool {
        self.result_sets.contains_key(id)
    }

    pub fn result_set(&self, id: &ResultSetId) -> Option<&[CanonicalShelterRecord]> {
        self.result_sets.get(id).map(Vec::as_slice)
    }

    /// Bind a chat to a result set, replacing any previous binding. Returns
    /// the previous binding.
    pub fn bind(&mut self, chat_id: &str, id: ResultSetId) -> Option<ResultSetId> {
        self.chat_to_result_set.insert(chat_id.to_string(), id)
    }

    /// Remove only the binding; the result set stays.
    pub fn unbind(&mut self, chat_id: &str) -> Option<ResultSetId> {
        self.chat_to_result_set.remove(chat_id)
    }

    pub fn binding(&self, chat_id: &str) -> Option<&ResultSetId> {
        self.chat_to_result_set.get(chat_id)
    }

    /// Records for a chat. `None` when the chat is unbound or its result set
    /// is gone.
    pub fn lookup(&self, chat_id: &str) -> Option<&[CanonicalShelterRecord]> {
        let id = self.binding(chat_id)?;
        self.result_set(id)
    }

    pub fn chat_count(&self) -> usize {
        self.chat_to_result_set.len()
    }

    pub fn result_set_count(&self) -> usize {
        self.result_sets.len()
    }

    /// Bound chat ids, sorted.
    pub fn chat_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.chat_to_result_set.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// `(result set id, record count)` pairs, oldest first.
    pub fn result_set_sizes(&self) -> Vec<(ResultSetId, usize)> {
        let mut sizes: Vec<(ResultSetId, usize)> = self
            .result_sets
            .iter()
            .map(|(id, records)| (id.clone(), records.len()))
            .collect();
        sizes.sort_by(|a, b| a.0.cmp(&b.0));
        sizes
    }

    pub fn clear(&mut self) {
        self.chat_to_result_set.clear();
        self.result_sets.clear();
    }

    pub fn to_blob(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_blob(blob: &str) -> Result<Self> {
        Ok(serde_json::from_str(blob)?)
    }
}
