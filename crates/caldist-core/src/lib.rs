//! Distance computation pipeline for caldist.
//!
//! Selects today's (or tomorrow's) calendar events, geocodes and routes
//! their locations from a fixed home, and aggregates the round-trip
//! distances into a single figure with an itemized breakdown.

/// Factor, offset and minimum adjustments.
pub mod aggregate;
/// Ordered label-to-value map.
pub mod breakdown;
/// Day-switch instant resolution.
pub mod day_switch;
/// Run orchestration.
pub mod pipeline;
/// Calendar event selection.
pub mod selector;
/// Published sensor state.
pub mod state;

pub use aggregate::{Adjustments, aggregate};
pub use breakdown::DistanceBreakdown;
pub use day_switch::{DaySwitchMode, DaySwitchPolicy};
pub use pipeline::{DistancePipeline, PipelineSettings, RunReport, RunResult, RunStage};
pub use selector::{Selection, select_destinations};
pub use state::{ATTRIBUTION, SensorAttributes, SensorState, unique_id};
