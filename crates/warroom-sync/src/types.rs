//! Core types for live collection sync
//!
//! Defines identifiers and the subscription query configuration:
//! - Handle, collection and document identifiers
//! - Sort direction and filter operators
//! - Query options and their validation

use crate::error::QueryError;
use crate::value::Value;
use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Reserved field name addressing the store-assigned document key
pub const DOCUMENT_ID_FIELD: &str = "__name__";

/// Unique live handle identifier (ULID for sortability)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct HandleId(pub Ulid);

impl HandleId {
    /// Generate new handle ID
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self(Ulid::new())
    }
}

impl Default for HandleId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for HandleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Name of a logical collection in the document store
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CollectionRef(String);

impl CollectionRef {
    /// Create collection reference
    #[inline]
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Collection name
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.0
    }

    /// Whether the name is empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<&str> for CollectionRef {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl std::fmt::Display for CollectionRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Store-assigned document key, unique within a collection
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(String);

impl DocumentId {
    /// Create document id
    #[inline]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Key as string
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the key is empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<&str> for DocumentId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl std::fmt::Display for DocumentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Sort direction of the server-side order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Smallest first
    #[default]
    Asc,
    /// Largest first
    Desc,
}

/// Filter comparison operator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operator {
    /// `==`
    Eq,
    /// `!=`
    NotEq,
    /// `<`
    Lt,
    /// `<=`
    Le,
    /// `>`
    Gt,
    /// `>=`
    Ge,
    /// Array field contains the value
    ArrayContains,
    /// Field equals one of the listed values
    In,
}

impl Operator {
    /// Range and not-equal operators constrain ordering
    #[inline]
    #[must_use]
    pub fn is_inequality(self) -> bool {
        matches!(self, Self::NotEq | Self::Lt | Self::Le | Self::Gt | Self::Ge)
    }
}

/// Single `(field, operator, value)` filter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WhereClause {
    /// Field path
    pub field: String,
    /// Comparison operator
    pub op: Operator,
    /// Operand
    pub value: Value,
}

impl WhereClause {
    /// Create filter clause
    #[inline]
    pub fn new(field: impl Into<String>, op: Operator, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            op,
            value: value.into(),
        }
    }
}

/// Live query configuration
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryOptions {
    /// Field the server orders by
    pub order_by_field: Option<String>,
    /// Direction of the server order
    pub direction: Direction,
    /// Maximum number of documents
    pub limit: Option<usize>,
    /// Conjunctive filters
    pub where_clauses: Vec<WhereClause>,
}

impl QueryOptions {
    /// Create unordered, unfiltered query
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With server order
    #[inline]
    #[must_use]
    pub fn order_by(mut self, field: impl Into<String>, direction: Direction) -> Self {
        self.order_by_field = Some(field.into());
        self.direction = direction;
        self
    }

    /// With document limit
    #[inline]
    #[must_use]
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Query matching exactly one document by id
    #[must_use]
    pub fn for_document(id: &DocumentId) -> Self {
        Self::new()
            .filter(WhereClause::new(DOCUMENT_ID_FIELD, Operator::Eq, id.as_str()))
            .with_limit(1)
    }

    /// With additional filter
    #[inline]
    #[must_use]
    pub fn filter(mut self, clause: WhereClause) -> Self {
        self.where_clauses.push(clause);
        self
    }

    /// Reject malformed configurations
    ///
    /// # Errors
    /// - `QueryError::EmptyOrderField` if an order field is set but empty
    /// - `QueryError::EmptyWhereField` if a clause names no field
    /// - `QueryError::OrderFieldRequired` if an inequality filter has no order field
    /// - `QueryError::OrderFieldMismatch` if the order field differs from the inequality field
    /// - `QueryError::InvalidLimit` if `limit` is zero
    pub fn validate(&self) -> Result<(), QueryError> {
        if matches!(self.order_by_field.as_deref(), Some("")) {
            return Err(QueryError::EmptyOrderField);
        }

        for (index, clause) in self.where_clauses.iter().enumerate() {
            if clause.field.is_empty() {
                return Err(QueryError::EmptyWhereField { index });
            }
            if !clause.op.is_inequality() {
                continue;
            }
            match self.order_by_field.as_deref() {
                None => {
                    return Err(QueryError::OrderFieldRequired {
                        field: clause.field.clone(),
                    })
                }
                Some(order) if order != clause.field => {
                    return Err(QueryError::OrderFieldMismatch {
                        filter_field: clause.field.clone(),
                        order_field: order.to_string(),
                    })
                }
                Some(_) => {}
            }
        }

        if self.limit == Some(0) {
            return Err(QueryError::InvalidLimit);
        }

        Ok(())
    }
}
