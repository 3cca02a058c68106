//! Entities, views and raw snapshots

use crate::types::DocumentId;
use crate::value::{Fields, StoreFields, Value};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Normalized representation of one stored record
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Entity {
    /// Store-assigned key
    pub id: DocumentId,
    /// Resolved field data
    pub fields: Fields,
}

impl Entity {
    /// Create entity
    #[inline]
    #[must_use]
    pub fn new(id: DocumentId, fields: Fields) -> Self {
        Self { id, fields }
    }

    /// Raw field lookup
    #[inline]
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// String field, absent if missing or not a string
    #[inline]
    #[must_use]
    pub fn str_field(&self, field: &str) -> Option<&str> {
        self.get(field).and_then(Value::as_str)
    }

    /// Numeric field, absent if missing or not a number
    #[inline]
    #[must_use]
    pub fn number(&self, field: &str) -> Option<f64> {
        self.get(field).and_then(Value::as_f64)
    }

    /// Timestamp field, absent if missing, pending or not a timestamp
    #[inline]
    #[must_use]
    pub fn timestamp(&self, field: &str) -> Option<DateTime<Utc>> {
        self.get(field).and_then(Value::as_timestamp)
    }
}

/// Entities in the order the subscribed query delivered them
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(transparent)]
pub struct OrderedCollectionView {
    entities: Vec<Entity>,
}

impl OrderedCollectionView {
    /// Wrap entities without reordering
    #[inline]
    #[must_use]
    pub fn new(entities: Vec<Entity>) -> Self {
        Self { entities }
    }

    /// Entities in server order
    #[inline]
    #[must_use]
    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    /// Entity count
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Whether the view is empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Ids in server order
    pub fn ids(&self) -> impl Iterator<Item = &DocumentId> {
        self.entities.iter().map(|e| &e.id)
    }

    /// Find entity by id
    #[must_use]
    pub fn find(&self, id: &DocumentId) -> Option<&Entity> {
        self.entities.iter().find(|e| &e.id == id)
    }

    /// Consume into entities
    #[inline]
    #[must_use]
    pub fn into_entities(self) -> Vec<Entity> {
        self.entities
    }
}

/// One record of a raw store snapshot
#[derive(Debug, Clone, PartialEq)]
pub struct RawDocument {
    /// Store-assigned key
    pub id: DocumentId,
    /// Stored data, possibly with pending sentinels
    pub data: StoreFields,
}

impl RawDocument {
    /// Create raw record
    #[inline]
    #[must_use]
    pub fn new(id: impl Into<DocumentId>, data: StoreFields) -> Self {
        Self {
            id: id.into(),
            data,
        }
    }
}

/// Point-in-time payload pushed by a live subscription
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RawSnapshot {
    /// Records in query order
    pub documents: Vec<RawDocument>,
}

impl RawSnapshot {
    /// Create snapshot
    #[inline]
    #[must_use]
    pub fn new(documents: Vec<RawDocument>) -> Self {
        Self { documents }
    }

    /// Enumerate `(id, data)` pairs
    pub fn iter(&self) -> impl Iterator<Item = (&DocumentId, &StoreFields)> {
        self.documents.iter().map(|d| (&d.id, &d.data))
    }

    /// Record count
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    /// Whether the snapshot is empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}
