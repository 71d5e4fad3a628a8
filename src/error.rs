//! Error taxonomy for the planning core

use crate::models::PlanEntry;

#[derive(Debug, thiserror::Error)]
pub enum PlanError {
    /// The scheduler reached a state where every pending building needs a
    /// segment that serves no house.
    #[error(
        "unresolvable segments {segments:?}: buildings {buildings:?} cannot be scheduled ({} steps completed)",
        .partial.len()
    )]
    UnresolvableSegment {
        buildings: Vec<String>,
        segments: Vec<String>,
        partial: Vec<PlanEntry>,
    },

    #[error("unknown segment kind '{0}' (expected aerial, semi-aerial or conduit)")]
    UnknownSegmentKind(String),

    #[error("invalid segment '{id}': {reason}")]
    InvalidSegment { id: String, reason: String },

    #[error("building '{building}' references unknown segment '{segment}'")]
    UnknownSegment { building: String, segment: String },

    #[error("duplicate building '{0}'")]
    DuplicateBuilding(String),

    #[error("duplicate segment '{0}'")]
    DuplicateSegment(String),
}

pub type PlanResult<T> = Result<T, PlanError>;
