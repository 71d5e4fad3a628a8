//! Repair planning for damaged connection infrastructure.
//!
//! Segments are owned by a [`network::SegmentRegistry`]; buildings reference
//! them by id. The [`scheduler`] repairs buildings greedily, easiest first,
//! re-evaluating after every repair since segments are shared. The [`cost`]
//! model prices each building and the [`phases`] allocator splits buildings
//! into five ordered work phases.

pub mod config;
pub mod cost;
pub mod db;
pub mod difficulty;
pub mod error;
pub mod loader;
pub mod models;
pub mod network;
pub mod phases;
pub mod planner;
pub mod report;
pub mod scheduler;

pub use config::PlannerConfig;
pub use error::{PlanError, PlanResult};
pub use planner::{PlanReport, plan, plan_network};
