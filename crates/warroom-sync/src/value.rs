//! Field values
//!
//! [`StoreValue`] is what travels to and from the document store and may
//! carry server timestamp sentinels. [`Value`] is the resolved form held by
//! entities and used by filters and sorts.

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;

/// Resolved entity fields, in stored order
pub type Fields = IndexMap<String, Value>;

/// Store-side fields, in stored order
pub type StoreFields = IndexMap<String, StoreValue>;

/// Resolved field value
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    /// Explicit null or pending server value
    #[default]
    Null,
    /// Boolean
    Bool(bool),
    /// 64-bit integer
    Integer(i64),
    /// Double-precision float
    Double(f64),
    /// UTF-8 string
    String(String),
    /// Point in time
    Timestamp(DateTime<Utc>),
    /// Ordered list
    Array(Vec<Value>),
    /// Nested object
    Map(Fields),
}

impl Value {
    /// String content, if a string
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Numeric content, if an integer or double
    #[inline]
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Integer(i) => Some(*i as f64),
            Self::Double(d) => Some(*d),
            _ => None,
        }
    }

    /// Timestamp content
    #[inline]
    #[must_use]
    pub fn as_timestamp(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Timestamp(t) => Some(*t),
            _ => None,
        }
    }

    /// Whether the value is null
    #[inline]
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Rank of the value's type in the cross-type order
    fn type_rank(&self) -> u8 {
        match self {
            Self::Null => 0,
            Self::Bool(_) => 1,
            Self::Integer(_) | Self::Double(_) => 2,
            Self::Timestamp(_) => 3,
            Self::String(_) => 4,
            Self::Array(_) => 5,
            Self::Map(_) => 6,
        }
    }

    /// Total order across all values
    ///
    /// Types order as null, bool, number, timestamp, string, array, map.
    /// Integers and doubles compare numerically with each other.
    #[must_use]
    pub fn total_cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Null, Self::Null) => Ordering::Equal,
            (Self::Bool(a), Self::Bool(b)) => a.cmp(b),
            (Self::Integer(a), Self::Integer(b)) => a.cmp(b),
            (Self::String(a), Self::String(b)) => a.cmp(b),
            (Self::Timestamp(a), Self::Timestamp(b)) => a.cmp(b),
            (Self::Array(a), Self::Array(b)) => a
                .iter()
                .zip(b)
                .map(|(x, y)| x.total_cmp(y))
                .find(|o| o.is_ne())
                .unwrap_or_else(|| a.len().cmp(&b.len())),
            (Self::Map(a), Self::Map(b)) => a
                .iter()
                .zip(b)
                .map(|((ka, va), (kb, vb))| ka.cmp(kb).then_with(|| va.total_cmp(vb)))
                .find(|o| o.is_ne())
                .unwrap_or_else(|| a.len().cmp(&b.len())),
            (Self::Double(a), Self::Double(b)) => cmp_doubles(*a, *b),
            (Self::Integer(a), Self::Double(b)) => cmp_integer_double(*a, *b),
            (Self::Double(a), Self::Integer(b)) => cmp_integer_double(*b, *a).reverse(),
            (a, b) => a.type_rank().cmp(&b.type_rank()),
        }
    }

    /// Equality under the total order (`1 == 1.0`)
    #[inline]
    #[must_use]
    pub fn loosely_eq(&self, other: &Self) -> bool {
        self.total_cmp(other).is_eq()
    }
}

/// Doubles in numeric order; `-0.0 == 0.0`, NaN at the ends by sign
#[allow(clippy::float_cmp)]
fn cmp_doubles(a: f64, b: f64) -> Ordering {
    if a == b {
        Ordering::Equal
    } else {
        a.total_cmp(&b)
    }
}

/// Exact comparison of an integer with a double
///
/// Goes through the double's integral part so integers beyond 2^53 never
/// collapse onto the same float.
#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
fn cmp_integer_double(i: i64, d: f64) -> Ordering {
    // 2^63, exactly representable
    const BOUND: f64 = 9_223_372_036_854_775_808.0;

    if d.is_nan() {
        return if d.is_sign_negative() {
            Ordering::Greater
        } else {
            Ordering::Less
        };
    }
    if d >= BOUND {
        return Ordering::Less;
    }
    if d < -BOUND {
        return Ordering::Greater;
    }

    let whole = d.trunc();
    i.cmp(&(whole as i64)).then_with(|| {
        let frac = d - whole;
        if frac > 0.0 {
            Ordering::Less
        } else if frac < 0.0 {
            Ordering::Greater
        } else {
            Ordering::Equal
        }
    })
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Self::Integer(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Self::Integer(i64::from(i))
    }
}

impl From<f64> for Value {
    fn from(d: f64) -> Self {
        Self::Double(d)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(t: DateTime<Utc>) -> Self {
        Self::Timestamp(t)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Self::Array(items)
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(b) => Self::Bool(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Self::Integer(i),
                None => n.as_f64().map_or(Self::Null, Self::Double),
            },
            serde_json::Value::String(s) => Self::String(s),
            serde_json::Value::Array(items) => {
                Self::Array(items.into_iter().map(Self::from).collect())
            }
            serde_json::Value::Object(map) => {
                Self::Map(map.into_iter().map(|(k, v)| (k, Self::from(v))).collect())
            }
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Null => serializer.serialize_unit(),
            Self::Bool(b) => serializer.serialize_bool(*b),
            Self::Integer(i) => serializer.serialize_i64(*i),
            Self::Double(d) => serializer.serialize_f64(*d),
            Self::String(s) => serializer.serialize_str(s),
            Self::Timestamp(t) => serializer.serialize_str(&t.to_rfc3339()),
            Self::Array(items) => serializer.collect_seq(items),
            Self::Map(map) => serializer.collect_map(map),
        }
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        serde_json::Value::deserialize(deserializer).map(Self::from)
    }
}

/// Store-side field value
///
/// `ServerTimestamp(None)` in a write asks the store to stamp the commit
/// time; in a snapshot it marks a stamp that is still pending.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreValue {
    /// Null
    Null,
    /// Boolean
    Bool(bool),
    /// 64-bit integer
    Integer(i64),
    /// Double-precision float
    Double(f64),
    /// UTF-8 string
    String(String),
    /// Client-provided point in time
    Timestamp(DateTime<Utc>),
    /// Server-assigned point in time
    ServerTimestamp(Option<DateTime<Utc>>),
    /// Ordered list
    Array(Vec<StoreValue>),
    /// Nested object
    Map(StoreFields),
}

impl StoreValue {
    /// Sentinel asking the store to stamp the write time
    #[inline]
    #[must_use]
    pub fn server_timestamp() -> Self {
        Self::ServerTimestamp(None)
    }

    /// Convert a JSON object into store fields
    ///
    /// Returns `None` when `json` is not an object.
    #[must_use]
    pub fn fields_from_json(json: serde_json::Value) -> Option<StoreFields> {
        match json {
            serde_json::Value::Object(map) => {
                Some(map.into_iter().map(|(k, v)| (k, Self::from(v))).collect())
            }
            _ => None,
        }
    }
}

impl From<Value> for StoreValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Bool(b) => Self::Bool(b),
            Value::Integer(i) => Self::Integer(i),
            Value::Double(d) => Self::Double(d),
            Value::String(s) => Self::String(s),
            Value::Timestamp(t) => Self::Timestamp(t),
            Value::Array(items) => Self::Array(items.into_iter().map(Self::from).collect()),
            Value::Map(map) => Self::Map(map.into_iter().map(|(k, v)| (k, Self::from(v))).collect()),
        }
    }
}

impl From<serde_json::Value> for StoreValue {
    fn from(json: serde_json::Value) -> Self {
        Self::from(Value::from(json))
    }
}

impl From<&str> for StoreValue {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for StoreValue {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<bool> for StoreValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i64> for StoreValue {
    fn from(i: i64) -> Self {
        Self::Integer(i)
    }
}

impl From<i32> for StoreValue {
    fn from(i: i32) -> Self {
        Self::Integer(i64::from(i))
    }
}

impl From<f64> for StoreValue {
    fn from(d: f64) -> Self {
        Self::Double(d)
    }
}

impl From<DateTime<Utc>> for StoreValue {
    fn from(t: DateTime<Utc>) -> Self {
        Self::Timestamp(t)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use proptest::prelude::*;

    #[test]
    fn numbers_compare_across_kinds() {
        assert!(Value::Integer(2).total_cmp(&Value::Double(1.5)).is_gt());
        assert!(Value::Integer(1).loosely_eq(&Value::Double(1.0)));
        assert_ne!(Value::Integer(1), Value::Double(1.0));
    }

    #[test]
    fn cross_type_order() {
        let ts = Value::Timestamp(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
        let ordered = [
            Value::Null,
            Value::Bool(true),
            Value::Integer(7),
            ts,
            Value::from("a"),
            Value::Array(vec![]),
            Value::Map(Fields::new()),
        ];
        for pair in ordered.windows(2) {
            assert!(pair[0].total_cmp(&pair[1]).is_lt(), "{:?} < {:?}", pair[0], pair[1]);
        }
    }

    #[test]
    fn integer_double_order_is_exact_above_2_pow_53() {
        let big = 1_i64 << 53;
        let lo = Value::Integer(big);
        let hi = Value::Integer(big + 1);
        #[allow(clippy::cast_precision_loss)]
        let float = Value::Double(big as f64);

        assert!(lo.total_cmp(&float).is_eq());
        assert!(hi.total_cmp(&float).is_gt());
        assert!(float.total_cmp(&hi).is_lt());
        assert!(Value::Integer(2).total_cmp(&Value::Double(2.5)).is_lt());
        assert!(Value::Integer(-2).total_cmp(&Value::Double(-2.5)).is_gt());
        assert!(Value::Integer(i64::MAX).total_cmp(&Value::Double(9.3e18)).is_lt());
        assert!(Value::Integer(i64::MIN).total_cmp(&Value::Double(f64::NEG_INFINITY)).is_gt());
        assert!(Value::Integer(0).total_cmp(&Value::Double(f64::NAN)).is_lt());
        assert!(Value::Double(-0.0).total_cmp(&Value::Double(0.0)).is_eq());
    }

    fn numeric() -> impl Strategy<Value = Value> {
        let big = 1_i64 << 53;
        prop_oneof![
            (big - 4..big + 4).prop_map(Value::Integer),
            (-4_i64..4).prop_map(Value::Integer),
            (big - 4..big + 4).prop_map(|i| {
                #[allow(clippy::cast_precision_loss)]
                let d = i as f64;
                Value::Double(d)
            }),
            (-8_i32..8).prop_map(|i| Value::Double(f64::from(i) / 2.0)),
        ]
    }

    proptest! {
        #[test]
        fn numeric_order_is_transitive(a in numeric(), b in numeric(), c in numeric()) {
            let ab = a.total_cmp(&b);
            let bc = b.total_cmp(&c);
            if ab.is_le() && bc.is_le() {
                prop_assert!(a.total_cmp(&c).is_le());
            }
            prop_assert_eq!(a.total_cmp(&b), b.total_cmp(&a).reverse());
        }
    }

    #[test]
    fn json_conversion_keeps_key_order() {
        let json = serde_json::json!({ "title": "Invoice", "impact": 40, "ratio": 0.5 });
        let fields = StoreValue::fields_from_json(json).unwrap();
        let keys: Vec<_> = fields.keys().cloned().collect();
        assert_eq!(keys, vec!["title", "impact", "ratio"]);
        assert_eq!(fields["impact"], StoreValue::Integer(40));
        assert_eq!(fields["ratio"], StoreValue::Double(0.5));
    }

    #[test]
    fn non_object_json_has_no_fields() {
        assert!(StoreValue::fields_from_json(serde_json::json!([1, 2])).is_none());
    }

    #[test]
    fn timestamp_serializes_as_rfc3339() {
        let ts = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let json = serde_json::to_string(&Value::Timestamp(ts)).unwrap();
        assert_eq!(json, "\"2024-05-01T12:00:00+00:00\"");
    }
}
