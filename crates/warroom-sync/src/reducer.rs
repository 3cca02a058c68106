//! Snapshot reducer
//!
//! Pure, total transform from a [`RawSnapshot`] to an
//! [`OrderedCollectionView`]. Output order is input order; nothing is
//! re-sorted and no record is dropped.

use crate::entity::{Entity, OrderedCollectionView, RawSnapshot};
use crate::value::{StoreValue, Value};

/// Reduce a raw snapshot into an ordered view
#[must_use]
pub fn reduce(snapshot: &RawSnapshot) -> OrderedCollectionView {
    let entities = snapshot
        .iter()
        .map(|(id, data)| {
            let fields = data
                .iter()
                .map(|(name, value)| (name.clone(), resolve(value)))
                .collect();
            Entity::new(id.clone(), fields)
        })
        .collect();

    OrderedCollectionView::new(entities)
}

/// Resolve store sentinels to plain values
///
/// A pending server timestamp becomes `Value::Null`.
#[must_use]
pub fn resolve(value: &StoreValue) -> Value {
    match value {
        StoreValue::Null | StoreValue::ServerTimestamp(None) => Value::Null,
        StoreValue::ServerTimestamp(Some(t)) | StoreValue::Timestamp(t) => Value::Timestamp(*t),
        StoreValue::Bool(b) => Value::Bool(*b),
        StoreValue::Integer(i) => Value::Integer(*i),
        StoreValue::Double(d) => Value::Double(*d),
        StoreValue::String(s) => Value::String(s.clone()),
        StoreValue::Array(items) => Value::Array(items.iter().map(resolve).collect()),
        StoreValue::Map(map) => {
            Value::Map(map.iter().map(|(k, v)| (k.clone(), resolve(v))).collect())
        }
    }
}
