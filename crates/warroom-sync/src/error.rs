//! Error types for War Room sync
//!
//! Provides error handling for:
//! - Malformed subscription configuration
//! - Transport/auth failures on live subscriptions
//! - Rejected and failed mutations
//! - Partial multi-collection writes

use crate::types::{CollectionRef, DocumentId, HandleId};

/// Main sync error type
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// Query configuration rejected
    #[error("invalid query: {0}")]
    InvalidQuery(#[from] QueryError),

    /// Handle lookup failed
    #[error("handle error: {0}")]
    Handle(#[from] HandleError),

    /// Live subscription failed
    #[error(transparent)]
    Subscription(#[from] SubscriptionError),

    /// Mutation rejected or failed
    #[error("mutation error: {0}")]
    Mutation(#[from] MutationError),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl SyncError {
    /// Check if the failure is a caller bug rather than a remote fault
    #[inline]
    #[must_use]
    pub fn is_caller_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidQuery(_) | Self::Handle(_) | Self::Mutation(MutationError::Invalid(_))
        )
    }
}

/// Malformed subscription configuration
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QueryError {
    /// Collection name is empty
    #[error("collection name is empty")]
    EmptyCollection,

    /// `order_by_field` was given but is empty
    #[error("order-by field is empty")]
    EmptyOrderField,

    /// A where clause names no field
    #[error("where clause {index} has an empty field name")]
    EmptyWhereField { index: usize },

    /// An inequality filter needs an order-by on the same field
    #[error("inequality filter on `{field}` requires ordering by `{field}`")]
    OrderFieldRequired { field: String },

    /// Inequality field and order field disagree
    #[error("inequality filter on `{filter_field}` conflicts with ordering by `{order_field}`")]
    OrderFieldMismatch {
        filter_field: String,
        order_field: String,
    },

    /// Limit must be a positive integer
    #[error("limit must be positive")]
    InvalidLimit,

    /// Named preset not present in configuration
    #[error("unknown query preset: {0}")]
    UnknownPreset(String),
}

/// Handle registry errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HandleError {
    /// Handle never existed or was already closed
    #[error("unknown or closed handle: {0}")]
    UnknownHandle(HandleId),
}

/// Live subscription failure delivered to the listener
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("subscription to {collection} failed: {cause}")]
pub struct SubscriptionError {
    /// Subscribed collection
    pub collection: CollectionRef,
    /// Underlying store failure
    pub cause: StoreError,
}

/// Mutation errors
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MutationError {
    /// Rejected before reaching the store
    #[error("invalid mutation: {0}")]
    Invalid(InvalidMutation),

    /// Remote write failed
    #[error("mutation failed: {cause}")]
    Failed { cause: StoreError },

    /// Some writes of a multi-collection append landed, others did not
    #[error("partial write: succeeded {succeeded:?}, failed {failed:?}")]
    PartialWrite {
        /// Indices of writes that landed
        succeeded: Vec<usize>,
        /// Indices of writes that failed
        failed: Vec<usize>,
        /// Failure causes, parallel to `failed`
        causes: Vec<StoreError>,
    },
}

impl MutationError {
    /// Check if the store may have partially applied the request
    #[inline]
    #[must_use]
    pub fn is_partial(&self) -> bool {
        matches!(self, Self::PartialWrite { .. })
    }
}

impl From<InvalidMutation> for MutationError {
    fn from(reason: InvalidMutation) -> Self {
        Self::Invalid(reason)
    }
}

/// Reasons a mutation is rejected without touching the store
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvalidMutation {
    /// No fields to write
    #[error("no fields to write")]
    EmptyFields,

    /// A field name is empty
    #[error("empty field name")]
    EmptyFieldName,

    /// Attempt to write the store-assigned id
    #[error("field `{0}` is reserved for the document id")]
    ReservedField(String),

    /// Collection name is empty
    #[error("collection name is empty")]
    EmptyCollection,

    /// Document id is empty
    #[error("document id is empty")]
    EmptyDocumentId,

    /// Multi-collection append with nothing to write
    #[error("no writes given")]
    NoWrites,

    /// Blank chat message
    #[error("message text is blank")]
    BlankMessage,
}

/// Document store failures
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// Transport unavailable
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// Caller lacks permission
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// Target document does not exist
    #[error("document {id} not found in {collection}")]
    NotFound {
        collection: CollectionRef,
        id: DocumentId,
    },

    /// Any other store-side fault
    #[error("internal store error: {0}")]
    Internal(String),
}

impl StoreError {
    /// Check if a caller-driven retry could succeed
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Unavailable(_) | Self::Internal(_))
    }
}

/// Configuration loading errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File could not be read
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// TOML did not match the schema
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),

    /// A preset query is malformed
    #[error("preset `{name}` is invalid: {source}")]
    InvalidPreset {
        name: String,
        #[source]
        source: QueryError,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_error_is_retryable() {
        assert!(StoreError::Unavailable("offline".to_string()).is_retryable());
        assert!(StoreError::Internal("boom".to_string()).is_retryable());
        assert!(!StoreError::PermissionDenied("rules".to_string()).is_retryable());
    }

    #[test]
    fn partial_write_display_names_indices() {
        let err = MutationError::PartialWrite {
            succeeded: vec![0],
            failed: vec![1],
            causes: vec![StoreError::Unavailable("offline".to_string())],
        };
        assert!(err.is_partial());
        assert_eq!(
            err.to_string(),
            "partial write: succeeded [0], failed [1]"
        );
    }

    #[test]
    fn sync_error_caller_classification() {
        let err: SyncError = QueryError::InvalidLimit.into();
        assert!(err.is_caller_error());

        let err: SyncError = MutationError::Failed {
            cause: StoreError::Unavailable("offline".to_string()),
        }
        .into();
        assert!(!err.is_caller_error());

        let err: SyncError = MutationError::from(InvalidMutation::EmptyFields).into();
        assert!(err.is_caller_error());
    }
}
