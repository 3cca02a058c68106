//! Secondary view transforms
//!
//! Pure functions deriving display-ready lists from an
//! [`OrderedCollectionView`]. None of them mutate their input.
//!
//! When a client sort mode is active it takes precedence over the server
//! order; with [`SortMode::None`] the server order is kept as is.

use crate::entity::{Entity, OrderedCollectionView};
use crate::status::{BoardStatus, Bucket};
use crate::types::Direction;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Keep entities whose listed string fields contain `query`, ignoring case
///
/// An empty query keeps everything.
#[must_use]
pub fn filter_text(entities: &[Entity], fields: &[&str], query: &str) -> Vec<Entity> {
    if query.is_empty() {
        return entities.to_vec();
    }

    let needle = query.to_lowercase();
    entities
        .iter()
        .filter(|e| {
            fields.iter().any(|f| {
                e.str_field(f)
                    .is_some_and(|s| s.to_lowercase().contains(&needle))
            })
        })
        .cloned()
        .collect()
}

/// Entities partitioned into status columns
#[derive(Debug, Clone, PartialEq)]
pub struct StatusBoard<S> {
    columns: Vec<(Bucket<S>, Vec<Entity>)>,
}

impl<S: BoardStatus> StatusBoard<S> {
    /// Columns in declaration order, overflow last
    #[inline]
    #[must_use]
    pub fn columns(&self) -> &[(Bucket<S>, Vec<Entity>)] {
        &self.columns
    }

    /// Entities of one column
    #[must_use]
    pub fn bucket(&self, bucket: Bucket<S>) -> &[Entity] {
        self.columns
            .iter()
            .find(|(b, _)| *b == bucket)
            .map(|(_, entities)| entities.as_slice())
            .unwrap_or_default()
    }

    /// Entities with a missing or unrecognized status
    #[inline]
    #[must_use]
    pub fn unsorted(&self) -> &[Entity] {
        self.bucket(Bucket::Unsorted)
    }

    /// Total entities across all columns
    #[must_use]
    pub fn len(&self) -> usize {
        self.columns.iter().map(|(_, entities)| entities.len()).sum()
    }

    /// Whether every column is empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Partition entities by the status stored in `field`
///
/// Every entity lands in exactly one column; within a column, input order
/// is kept.
#[must_use]
pub fn group_by_status<S: BoardStatus>(entities: &[Entity], field: &str) -> StatusBoard<S> {
    let mut columns: Vec<(Bucket<S>, Vec<Entity>)> = S::ALL
        .iter()
        .map(|s| (Bucket::Status(*s), Vec::new()))
        .chain(std::iter::once((Bucket::Unsorted, Vec::new())))
        .collect();

    for entity in entities {
        let bucket = Bucket::<S>::for_label(entity.str_field(field));
        if let Some((_, column)) = columns.iter_mut().find(|(b, _)| *b == bucket) {
            column.push(entity.clone());
        }
    }

    StatusBoard { columns }
}

/// Three-state client sort toggle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortMode {
    /// Server order
    #[default]
    None,
    /// Primary metric
    Primary,
    /// Secondary metric
    Secondary,
}

impl SortMode {
    /// Next state of the toggle
    #[inline]
    #[must_use]
    pub fn next(self) -> Self {
        match self {
            Self::None => Self::Primary,
            Self::Primary => Self::Secondary,
            Self::Secondary => Self::None,
        }
    }
}

/// Field and direction of one client sort metric
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortKey {
    /// Field compared
    pub field: String,
    /// Direction
    pub direction: Direction,
}

impl SortKey {
    /// Create sort key
    #[inline]
    pub fn new(field: impl Into<String>, direction: Direction) -> Self {
        Self {
            field: field.into(),
            direction,
        }
    }

    /// Compare two entities; missing values sort last in either direction
    fn compare(&self, a: &Entity, b: &Entity) -> Ordering {
        match (a.get(&self.field), b.get(&self.field)) {
            (Some(x), Some(y)) => match self.direction {
                Direction::Asc => x.total_cmp(y),
                Direction::Desc => y.total_cmp(x),
            },
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        }
    }
}

/// Metrics behind the two active sort states
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortKeys {
    /// Metric for [`SortMode::Primary`]
    pub primary: SortKey,
    /// Metric for [`SortMode::Secondary`]
    pub secondary: SortKey,
}

/// Stable sort by the metric selected by `mode`
///
/// Ties keep their input order.
#[must_use]
pub fn sort_entities(entities: &[Entity], mode: SortMode, keys: &SortKeys) -> Vec<Entity> {
    let mut sorted = entities.to_vec();
    let key = match mode {
        SortMode::None => return sorted,
        SortMode::Primary => &keys.primary,
        SortMode::Secondary => &keys.secondary,
    };
    sorted.sort_by(|a, b| key.compare(a, b));
    sorted
}

/// Search and sort state of one board
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewSettings {
    /// Fields searched by the text filter
    pub search_fields: Vec<String>,
    /// Current search text
    pub query: String,
    /// Current sort toggle state
    pub sort_mode: SortMode,
    /// Metrics behind the toggle
    pub sort_keys: SortKeys,
}

impl ViewSettings {
    /// Create settings with empty search and server order
    #[must_use]
    pub fn new(search_fields: &[&str], sort_keys: SortKeys) -> Self {
        Self {
            search_fields: search_fields.iter().map(ToString::to_string).collect(),
            query: String::new(),
            sort_mode: SortMode::None,
            sort_keys,
        }
    }

    /// With search text
    #[inline]
    #[must_use]
    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        self.query = query.into();
        self
    }

    /// With sort state
    #[inline]
    #[must_use]
    pub fn with_sort(mut self, mode: SortMode) -> Self {
        self.sort_mode = mode;
        self
    }

    /// Advance the sort toggle
    #[inline]
    pub fn cycle_sort(&mut self) -> SortMode {
        self.sort_mode = self.sort_mode.next();
        self.sort_mode
    }

    /// Filter then sort the view
    #[must_use]
    pub fn project(&self, view: &OrderedCollectionView) -> Vec<Entity> {
        let fields: Vec<&str> = self.search_fields.iter().map(String::as_str).collect();
        let filtered = filter_text(view.entities(), &fields, &self.query);
        sort_entities(&filtered, self.sort_mode, &self.sort_keys)
    }
}
