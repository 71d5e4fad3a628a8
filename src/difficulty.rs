//! Difficulty evaluation against the registry's current repair state

use crate::models::{Building, Difficulty, DifficultyKey, Segment};
use crate::network::SegmentRegistry;

/// `length / house_count`, infinite for a segment serving no house.
pub fn segment_difficulty(segment: &Segment) -> Difficulty {
    if segment.house_count == 0 {
        Difficulty::Infinite
    } else {
        Difficulty::Finite(segment.length / f64::from(segment.house_count))
    }
}

/// Sum over the building's segments that are still unrepaired right now.
///
/// Zero when nothing is left to repair, including buildings without segments.
pub fn remaining_difficulty(building: &Building, registry: &SegmentRegistry) -> Difficulty {
    unrepaired_segments(building, registry)
        .map(segment_difficulty)
        .sum()
}

/// Full-state difficulty: every segment that needed work when loaded,
/// whatever its current repair flag.
pub fn initial_difficulty(building: &Building, registry: &SegmentRegistry) -> Difficulty {
    building
        .segments
        .iter()
        .filter_map(|id| registry.get(id))
        .filter(|segment| segment.needs_work())
        .map(segment_difficulty)
        .sum()
}

pub fn unrepaired_segments<'a>(
    building: &'a Building,
    registry: &'a SegmentRegistry,
) -> impl Iterator<Item = &'a Segment> + 'a {
    building
        .segments
        .iter()
        .filter_map(|id| registry.get(id))
        .filter(|segment| !segment.is_repaired())
}

pub fn key<'a>(building: &'a Building, difficulty: Difficulty) -> DifficultyKey<'a> {
    DifficultyKey {
        difficulty,
        building_id: &building.id,
    }
}
