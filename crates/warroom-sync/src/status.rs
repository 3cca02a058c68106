//! Status vocabularies for board columns
//!
//! Each vocabulary is a closed enum with an exhaustive label mapping.
//! Labels outside the vocabulary parse to `None` and are routed to
//! [`Bucket::Unsorted`] by the grouping transform.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::Hash;

/// Label of the overflow bucket
pub const UNSORTED_LABEL: &str = "unsorted";

/// Closed set of status labels driving board columns
pub trait BoardStatus: Copy + Eq + Hash + fmt::Debug + 'static {
    /// Every status in column order
    const ALL: &'static [Self];

    /// Stored label
    fn label(self) -> &'static str;

    /// Parse a stored label
    fn parse(label: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|s| s.label() == label)
    }
}

/// Board column: a declared status or the overflow bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Bucket<S> {
    /// Declared status
    Status(S),
    /// Missing or unrecognized status
    Unsorted,
}

impl<S: BoardStatus> Bucket<S> {
    /// Bucket for a stored label
    #[inline]
    #[must_use]
    pub fn for_label(label: Option<&str>) -> Self {
        label.and_then(S::parse).map_or(Self::Unsorted, Self::Status)
    }

    /// Column label
    #[inline]
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Status(s) => s.label(),
            Self::Unsorted => UNSORTED_LABEL,
        }
    }
}

/// Blocker lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BlockerStatus {
    /// Blocking revenue now
    Critical,
    /// Past due
    Overdue,
    /// Due within the week
    #[serde(rename = "This Week")]
    ThisWeek,
    /// Resolved
    Done,
    /// Deferred by an operator
    Snoozed,
}

impl BoardStatus for BlockerStatus {
    const ALL: &'static [Self] = &[
        Self::Critical,
        Self::Overdue,
        Self::ThisWeek,
        Self::Done,
        Self::Snoozed,
    ];

    fn label(self) -> &'static str {
        match self {
            Self::Critical => "Critical",
            Self::Overdue => "Overdue",
            Self::ThisWeek => "This Week",
            Self::Done => "Done",
            Self::Snoozed => "Snoozed",
        }
    }
}

impl BlockerStatus {
    /// Column heading
    #[inline]
    #[must_use]
    pub fn display_name(self) -> &'static str {
        match self {
            Self::Done => "Complete",
            other => other.label(),
        }
    }
}

impl fmt::Display for BlockerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Sales pipeline stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PipelineStage {
    /// First contact
    Lead,
    /// Proposal sent
    Proposal,
    /// Terms under discussion
    Negotiation,
    /// Deal signed
    Won,
    /// Work started
    InProgress,
    /// Work handed over
    Delivered,
    /// Invoice settled
    Paid,
}

impl BoardStatus for PipelineStage {
    const ALL: &'static [Self] = &[
        Self::Lead,
        Self::Proposal,
        Self::Negotiation,
        Self::Won,
        Self::InProgress,
        Self::Delivered,
        Self::Paid,
    ];

    fn label(self) -> &'static str {
        match self {
            Self::Lead => "lead",
            Self::Proposal => "proposal",
            Self::Negotiation => "negotiation",
            Self::Won => "won",
            Self::InProgress => "inprogress",
            Self::Delivered => "delivered",
            Self::Paid => "paid",
        }
    }
}

impl PipelineStage {
    /// Column heading
    #[inline]
    #[must_use]
    pub fn display_name(self) -> &'static str {
        match self {
            Self::Lead => "Lead",
            Self::Proposal => "Proposal Sent",
            Self::Negotiation => "In Negotiation",
            Self::Won => "Won",
            Self::InProgress => "In Progress",
            Self::Delivered => "Delivered",
            Self::Paid => "Paid",
        }
    }

    /// Zero-based position in the pipeline
    #[inline]
    #[must_use]
    pub fn index(self) -> usize {
        Self::ALL.iter().position(|s| *s == self).unwrap_or_default()
    }

    /// Share of the pipeline completed at this stage, 0–100
    #[inline]
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn progress_percent(self) -> f64 {
        (self.index() + 1) as f64 / Self::ALL.len() as f64 * 100.0
    }
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blocker_labels_round_trip_through_parse() {
        for status in BlockerStatus::ALL {
            assert_eq!(BlockerStatus::parse(status.label()), Some(*status));
        }
        assert_eq!(BlockerStatus::parse("this week"), None);
        assert_eq!(BlockerStatus::Done.display_name(), "Complete");
    }

    #[test]
    fn unknown_label_goes_to_unsorted() {
        assert_eq!(Bucket::<BlockerStatus>::for_label(Some("Unknown")), Bucket::Unsorted);
        assert_eq!(Bucket::<BlockerStatus>::for_label(None), Bucket::Unsorted);
        assert_eq!(
            Bucket::<BlockerStatus>::for_label(Some("This Week")),
            Bucket::Status(BlockerStatus::ThisWeek)
        );
        assert_eq!(Bucket::<BlockerStatus>::Unsorted.label(), "unsorted");
    }

    #[test]
    fn pipeline_progress() {
        assert_eq!(PipelineStage::Lead.index(), 0);
        assert!((PipelineStage::Paid.progress_percent() - 100.0).abs() < f64::EPSILON);
        let won = PipelineStage::Won.progress_percent();
        assert!((won - 4.0 / 7.0 * 100.0).abs() < 1e-9);
        assert_eq!(PipelineStage::parse("inprogress"), Some(PipelineStage::InProgress));
    }

    #[test]
    fn serde_uses_stored_labels() {
        let json = serde_json::to_string(&BlockerStatus::ThisWeek).unwrap();
        assert_eq!(json, "\"This Week\"");
        let stage: PipelineStage = serde_json::from_str("\"inprogress\"").unwrap();
        assert_eq!(stage, PipelineStage::InProgress);
    }
}
