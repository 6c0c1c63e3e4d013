//! Deterministic segment planning
//!
//! Segment indices are 1-based. Segment i covers item indices
//! [(i-1)*size, i*size) clamped to the total. An index past the last
//! segment yields an explicitly-empty slice plus total-segment metadata,
//! so a caller walking segments detects completion without guessing.

use crate::config::SegmentConfig;
use crate::errors::{BrokerError, Result};
use serde::Serialize;
use std::ops::Range;

/// How much per-item depth the caller wants
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DetailLevel {
    /// Summary fields only
    #[default]
    Summary,
    /// Full per-item detail; trades breadth for depth
    Full,
}

/// A computed plan for one segment of a larger workload
///
/// Computed fresh per request, never stored.
#[derive(Debug, Clone, Serialize)]
pub struct SegmentPlan {
    pub total_items: usize,
    /// Effective segment size after the detail-level ceiling
    pub segment_size: usize,
    /// 1-based index of this segment
    pub segment_index: usize,
    /// First covered item index (0-based, inclusive)
    pub start: usize,
    /// Past-the-end item index (0-based, exclusive)
    pub end: usize,
    pub total_segments: usize,
}

impl SegmentPlan {
    /// Item range covered by this segment
    pub fn range(&self) -> Range<usize> {
        self.start..self.end
    }

    /// True when the requested index lies past the last valid segment
    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }

    /// Segments still to process after this one
    pub fn remaining_segments(&self) -> usize {
        self.total_segments.saturating_sub(self.segment_index)
    }
}

/// Segment planner parameterized by size limits
#[derive(Debug, Clone)]
pub struct SegmentPlanner {
    config: SegmentConfig,
}

impl SegmentPlanner {
    pub fn new(config: SegmentConfig) -> Self {
        Self { config }
    }

    /// Compute the plan for one segment
    ///
    /// `requested_size` of `None` uses the configured default. A maximal
    /// detail level lowers the effective size to the configured ceiling so
    /// per-item payload depth cannot multiply with breadth.
    pub fn plan(
        &self,
        total_items: usize,
        segment_index: usize,
        requested_size: Option<usize>,
        detail: DetailLevel,
    ) -> Result<SegmentPlan> {
        if segment_index == 0 {
            return Err(BrokerError::InvalidInput(
                "segment index is 1-based and must be >= 1".to_string(),
            ));
        }

        let mut size = requested_size
            .unwrap_or(self.config.default_segment_size)
            .clamp(1, self.config.max_segment_size);

        if detail == DetailLevel::Full {
            size = size.min(self.config.detail_ceiling).max(1);
        }

        let total_segments = total_items.div_ceil(size);
        let start = (segment_index - 1).saturating_mul(size).min(total_items);
        let end = segment_index.saturating_mul(size).min(total_items);

        Ok(SegmentPlan {
            total_items,
            segment_size: size,
            segment_index,
            start,
            end,
            total_segments,
        })
    }
}

impl Default for SegmentPlanner {
    fn default() -> Self {
        Self::new(SegmentConfig::default())
    }
}
