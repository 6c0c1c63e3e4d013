//! Segmented-processing planning
//! Bounds per-request work by slicing large item sets into fixed chunks

pub mod planner;

pub use planner::{DetailLevel, SegmentPlan, SegmentPlanner};
