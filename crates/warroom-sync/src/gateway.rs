//! Mutation gateway
//!
//! Applies writes to the document store without holding entity state.
//! Callers observe results through their live subscriptions; the gateway
//! only reports whether the store accepted the write. Nothing is retried.

use crate::error::{InvalidMutation, MutationError, StoreError};
use crate::store::{DocumentStore, SetMode};
use crate::types::{CollectionRef, DocumentId, DOCUMENT_ID_FIELD};
use crate::value::StoreFields;
use std::sync::Arc;

/// One append of a multi-collection write
#[derive(Debug, Clone, PartialEq)]
pub struct AppendWrite {
    /// Target collection
    pub collection: CollectionRef,
    /// Document fields
    pub fields: StoreFields,
}

impl AppendWrite {
    /// Create append
    #[inline]
    pub fn new(collection: impl Into<CollectionRef>, fields: StoreFields) -> Self {
        Self {
            collection: collection.into(),
            fields,
        }
    }
}

/// Write path to the document store
#[derive(Clone)]
pub struct MutationGateway {
    store: Arc<dyn DocumentStore>,
}

impl std::fmt::Debug for MutationGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MutationGateway").finish_non_exhaustive()
    }
}

impl MutationGateway {
    /// Create gateway over a store client
    #[inline]
    #[must_use]
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Apply a partial update to one document
    ///
    /// # Errors
    /// - `MutationError::Invalid` for an empty target or empty/reserved fields;
    ///   the store is not called
    /// - `MutationError::Failed` if the store rejects the write
    pub async fn update(
        &self,
        collection: &CollectionRef,
        id: &DocumentId,
        fields: StoreFields,
    ) -> Result<(), MutationError> {
        check_collection(collection)?;
        check_document(id)?;
        check_fields(&fields)?;

        self.store
            .update_document(collection, id, fields)
            .await
            .map_err(|cause| failed("update", collection, cause))
    }

    /// Append a document with a store-assigned key
    ///
    /// # Errors
    /// - `MutationError::Invalid` for an empty collection or empty/reserved fields
    /// - `MutationError::Failed` if the store rejects the write
    pub async fn add(
        &self,
        collection: &CollectionRef,
        fields: StoreFields,
    ) -> Result<DocumentId, MutationError> {
        check_collection(collection)?;
        check_fields(&fields)?;

        self.store
            .add_document(collection, fields)
            .await
            .map_err(|cause| failed("add", collection, cause))
    }

    /// Write a whole document under a known key
    ///
    /// # Errors
    /// - `MutationError::Invalid` for an empty target or empty/reserved fields
    /// - `MutationError::Failed` if the store rejects the write
    pub async fn set(
        &self,
        collection: &CollectionRef,
        id: &DocumentId,
        fields: StoreFields,
        mode: SetMode,
    ) -> Result<(), MutationError> {
        check_collection(collection)?;
        check_document(id)?;
        check_fields(&fields)?;

        self.store
            .set_document(collection, id, fields, mode)
            .await
            .map_err(|cause| failed("set", collection, cause))
    }

    /// Append to several collections as one logical action
    ///
    /// Every write is validated before any reaches the store, then each is
    /// attempted exactly once, in order, whatever happened to the others.
    ///
    /// # Returns
    /// New document ids in write order
    ///
    /// # Errors
    /// - `MutationError::Invalid` if there are no writes or any write is invalid
    /// - `MutationError::PartialWrite` if some writes landed and some failed
    /// - `MutationError::Failed` with the first cause if every write failed
    pub async fn append_dual(
        &self,
        writes: Vec<AppendWrite>,
    ) -> Result<Vec<DocumentId>, MutationError> {
        if writes.is_empty() {
            return Err(InvalidMutation::NoWrites.into());
        }
        for write in &writes {
            check_collection(&write.collection)?;
            check_fields(&write.fields)?;
        }

        let mut ids = Vec::with_capacity(writes.len());
        let mut succeeded = Vec::new();
        let mut failed = Vec::new();
        let mut causes = Vec::new();

        for (index, write) in writes.into_iter().enumerate() {
            match self.store.add_document(&write.collection, write.fields).await {
                Ok(id) => {
                    succeeded.push(index);
                    ids.push(id);
                }
                Err(cause) => {
                    tracing::error!("Append {} to {} failed: {}", index, write.collection, cause);
                    failed.push(index);
                    causes.push(cause);
                }
            }
        }

        match (succeeded.is_empty(), causes.first()) {
            (_, None) => Ok(ids),
            (true, Some(first)) => Err(MutationError::Failed {
                cause: first.clone(),
            }),
            (false, Some(_)) => {
                tracing::error!(
                    "Partial write: succeeded {:?}, failed {:?}",
                    succeeded,
                    failed
                );
                Err(MutationError::PartialWrite {
                    succeeded,
                    failed,
                    causes,
                })
            }
        }
    }
}

fn failed(op: &str, collection: &CollectionRef, cause: StoreError) -> MutationError {
    tracing::error!("Mutation {} on {} failed: {}", op, collection, cause);
    MutationError::Failed { cause }
}

fn check_collection(collection: &CollectionRef) -> Result<(), InvalidMutation> {
    if collection.is_empty() {
        return Err(InvalidMutation::EmptyCollection);
    }
    Ok(())
}

fn check_document(id: &DocumentId) -> Result<(), InvalidMutation> {
    if id.is_empty() {
        return Err(InvalidMutation::EmptyDocumentId);
    }
    Ok(())
}

fn check_fields(fields: &StoreFields) -> Result<(), InvalidMutation> {
    if fields.is_empty() {
        return Err(InvalidMutation::EmptyFields);
    }
    for name in fields.keys() {
        if name.is_empty() {
            return Err(InvalidMutation::EmptyFieldName);
        }
        if name == DOCUMENT_ID_FIELD {
            return Err(InvalidMutation::ReservedField(name.clone()));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MockDocumentStore;
    use crate::value::StoreValue;
    use mockall::Sequence;

    fn fields(pairs: &[(&str, StoreValue)]) -> StoreFields {
        pairs.iter().map(|(k, v)| ((*k).to_string(), v.clone())).collect()
    }

    fn offline() -> StoreError {
        StoreError::Unavailable("offline".to_string())
    }

    #[tokio::test]
    async fn update_with_empty_fields_never_reaches_store() {
        let mut store = MockDocumentStore::new();
        store.expect_update_document().times(0);
        let gateway = MutationGateway::new(Arc::new(store));

        let result = gateway
            .update(&"blockers".into(), &"b1".into(), StoreFields::new())
            .await;
        assert_eq!(result, Err(MutationError::Invalid(InvalidMutation::EmptyFields)));
    }

    #[tokio::test]
    async fn update_rejects_reserved_and_empty_names() {
        let mut store = MockDocumentStore::new();
        store.expect_update_document().times(0);
        let gateway = MutationGateway::new(Arc::new(store));

        let result = gateway
            .update(&"blockers".into(), &"b1".into(), fields(&[(DOCUMENT_ID_FIELD, "x".into())]))
            .await;
        assert!(matches!(
            result,
            Err(MutationError::Invalid(InvalidMutation::ReservedField(_)))
        ));

        let result = gateway
            .update(&"blockers".into(), &"b1".into(), fields(&[("", "x".into())]))
            .await;
        assert_eq!(result, Err(MutationError::Invalid(InvalidMutation::EmptyFieldName)));

        let result = gateway
            .update(&"blockers".into(), &"".into(), fields(&[("status", "Done".into())]))
            .await;
        assert_eq!(result, Err(MutationError::Invalid(InvalidMutation::EmptyDocumentId)));
    }

    #[tokio::test]
    async fn update_passes_fields_through() {
        let mut store = MockDocumentStore::new();
        store
            .expect_update_document()
            .withf(|collection, id, fields| {
                collection.name() == "blockers"
                    && id.as_str() == "b1"
                    && fields.get("status") == Some(&StoreValue::from("Done"))
            })
            .times(1)
            .returning(|_, _, _| Ok(()));
        let gateway = MutationGateway::new(Arc::new(store));

        gateway
            .update(&"blockers".into(), &"b1".into(), fields(&[("status", "Done".into())]))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn update_failure_is_reported_once() {
        let mut store = MockDocumentStore::new();
        store
            .expect_update_document()
            .times(1)
            .returning(|_, _, _| Err(StoreError::PermissionDenied("rules".to_string())));
        let gateway = MutationGateway::new(Arc::new(store));

        let result = gateway
            .update(&"blockers".into(), &"b1".into(), fields(&[("status", "Done".into())]))
            .await;
        assert_eq!(
            result,
            Err(MutationError::Failed {
                cause: StoreError::PermissionDenied("rules".to_string())
            })
        );
    }

    #[tokio::test]
    async fn append_dual_second_failure_is_partial() {
        let mut store = MockDocumentStore::new();
        let mut seq = Sequence::new();
        store
            .expect_add_document()
            .withf(|collection, _| collection.name() == "commands")
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(DocumentId::new("cmd-1")));
        store
            .expect_add_document()
            .withf(|collection, _| collection.name() == "chat_history")
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Err(offline()));
        let gateway = MutationGateway::new(Arc::new(store));

        let result = gateway
            .append_dual(vec![
                AppendWrite::new("commands", fields(&[("text", "deploy".into())])),
                AppendWrite::new("chat_history", fields(&[("text", "deploy".into())])),
            ])
            .await;

        assert_eq!(
            result,
            Err(MutationError::PartialWrite {
                succeeded: vec![0],
                failed: vec![1],
                causes: vec![offline()],
            })
        );
    }

    #[tokio::test]
    async fn append_dual_attempts_second_after_first_fails() {
        let mut store = MockDocumentStore::new();
        let mut seq = Sequence::new();
        store
            .expect_add_document()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Err(offline()));
        store
            .expect_add_document()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(DocumentId::new("chat-1")));
        let gateway = MutationGateway::new(Arc::new(store));

        let result = gateway
            .append_dual(vec![
                AppendWrite::new("commands", fields(&[("text", "a".into())])),
                AppendWrite::new("chat_history", fields(&[("text", "a".into())])),
            ])
            .await;

        assert!(matches!(
            result,
            Err(MutationError::PartialWrite { ref succeeded, ref failed, .. })
                if succeeded == &vec![1] && failed == &vec![0]
        ));
    }

    #[tokio::test]
    async fn append_dual_all_failed_is_plain_failure() {
        let mut store = MockDocumentStore::new();
        store
            .expect_add_document()
            .times(2)
            .returning(|_, _| Err(offline()));
        let gateway = MutationGateway::new(Arc::new(store));

        let result = gateway
            .append_dual(vec![
                AppendWrite::new("commands", fields(&[("text", "a".into())])),
                AppendWrite::new("chat_history", fields(&[("text", "a".into())])),
            ])
            .await;
        assert_eq!(result, Err(MutationError::Failed { cause: offline() }));
    }

    #[tokio::test]
    async fn append_dual_validates_everything_first() {
        let mut store = MockDocumentStore::new();
        store.expect_add_document().times(0);
        let gateway = MutationGateway::new(Arc::new(store));

        let result = gateway
            .append_dual(vec![
                AppendWrite::new("commands", fields(&[("text", "a".into())])),
                AppendWrite::new("chat_history", StoreFields::new()),
            ])
            .await;
        assert_eq!(result, Err(MutationError::Invalid(InvalidMutation::EmptyFields)));

        let result = gateway.append_dual(Vec::new()).await;
        assert_eq!(result, Err(MutationError::Invalid(InvalidMutation::NoWrites)));
    }

    #[tokio::test]
    async fn append_dual_success_returns_ids_in_order() {
        let mut store = MockDocumentStore::new();
        store
            .expect_add_document()
            .times(2)
            .returning(|collection, _| Ok(DocumentId::new(format!("{}-1", collection.name()))));
        let gateway = MutationGateway::new(Arc::new(store));

        let ids = gateway
            .append_dual(vec![
                AppendWrite::new("commands", fields(&[("text", "a".into())])),
                AppendWrite::new("chat_history", fields(&[("text", "a".into())])),
            ])
            .await
            .unwrap();
        assert_eq!(ids, vec![DocumentId::new("commands-1"), DocumentId::new("chat_history-1")]);
    }

    #[tokio::test]
    async fn set_forwards_mode() {
        let mut store = MockDocumentStore::new();
        store
            .expect_set_document()
            .withf(|_, id, _, mode| id.as_str() == "config" && *mode == SetMode::Merge)
            .times(1)
            .returning(|_, _, _, _| Ok(()));
        let gateway = MutationGateway::new(Arc::new(store));

        gateway
            .set(&"settings".into(), &"config".into(), fields(&[("theme", "dark".into())]), SetMode::Merge)
            .await
            .unwrap();
    }
}
