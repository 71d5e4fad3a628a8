//! Segment registry and building index
//!
//! The registry is the single owner of every segment and of its repair
//! state. Buildings only hold segment ids and look them up on demand, so a
//! segment shared by several buildings is repaired once for all of them.

use std::collections::BTreeMap;
use std::collections::btree_map::Entry;

use tracing::{debug, warn};

use crate::error::{PlanError, PlanResult};
use crate::models::{Building, InputRow, Segment, SegmentKind};

#[derive(Debug, Clone, Default)]
pub struct SegmentRegistry {
    segments: BTreeMap<String, Segment>,
}

impl SegmentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, segment: Segment) -> PlanResult<()> {
        match self.segments.entry(segment.id.clone()) {
            Entry::Occupied(_) => Err(PlanError::DuplicateSegment(segment.id)),
            Entry::Vacant(slot) => {
                slot.insert(segment);
                Ok(())
            }
        }
    }

    pub fn get(&self, id: &str) -> Option<&Segment> {
        self.segments.get(id)
    }

    /// Mark a segment repaired. Returns true only when it was not repaired before;
    /// unknown ids are ignored.
    pub fn repair(&mut self, id: &str) -> bool {
        self.segments
            .get_mut(id)
            .map(|segment| segment.mark_repaired())
            .unwrap_or(false)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Segment> {
        self.segments.values()
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn repaired_count(&self) -> usize {
        self.segments.values().filter(|s| s.is_repaired()).count()
    }
}

/// Buildings keyed by id, iterated in id order
#[derive(Debug, Clone, Default)]
pub struct BuildingIndex {
    buildings: BTreeMap<String, Building>,
}

impl BuildingIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, building: Building) -> PlanResult<()> {
        match self.buildings.entry(building.id.clone()) {
            Entry::Occupied(_) => Err(PlanError::DuplicateBuilding(building.id)),
            Entry::Vacant(slot) => {
                slot.insert(building);
                Ok(())
            }
        }
    }

    pub fn get(&self, id: &str) -> Option<&Building> {
        self.buildings.get(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Building> {
        self.buildings.values()
    }

    pub fn len(&self) -> usize {
        self.buildings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buildings.is_empty()
    }
}

/// A static snapshot of the damaged network: fixed shape, mutable repair state.
#[derive(Debug, Clone, Default)]
pub struct Network {
    pub registry: SegmentRegistry,
    pub buildings: BuildingIndex,
}

impl Network {
    /// Assemble a network, checking that every building reference resolves.
    pub fn new(registry: SegmentRegistry, buildings: BuildingIndex) -> PlanResult<Self> {
        for building in buildings.iter() {
            if let Some(missing) = building.segments.iter().find(|id| registry.get(id).is_none()) {
                return Err(PlanError::UnknownSegment {
                    building: building.id.clone(),
                    segment: missing.clone(),
                });
            }
        }
        Ok(Self { registry, buildings })
    }

    /// Build the network from loader rows.
    ///
    /// Rows sharing an infra id describe one segment: lengths and house counts
    /// are summed, and the first non-intact kind wins over `Intact`.
    pub fn from_rows(rows: &[InputRow]) -> PlanResult<Self> {
        let mut pending: BTreeMap<String, (f64, u32, SegmentKind)> = BTreeMap::new();
        let mut buildings: BTreeMap<String, Building> = BTreeMap::new();

        for row in rows {
            let building = buildings
                .entry(row.building_id.clone())
                .or_insert_with(|| Building::new(row.building_id.clone(), row.building_type));
            if building.building_type != row.building_type {
                warn!(
                    building = %row.building_id,
                    kept = %building.building_type,
                    ignored = %row.building_type,
                    "conflicting building type"
                );
            }

            if row.infra_id.is_empty() {
                continue;
            }

            // Rejects negative measurements row by row, before any summing.
            let segment = Segment::new(
                row.infra_id.clone(),
                row.length,
                row.infra_kind.clone(),
                row.house_count,
            )?;
            building.add_segment(segment.id.clone());

            match pending.entry(segment.id) {
                Entry::Vacant(slot) => {
                    slot.insert((segment.length, segment.house_count, segment.kind));
                }
                Entry::Occupied(mut slot) => {
                    let (length, houses, kind) = slot.get_mut();
                    *length += segment.length;
                    *houses = houses.saturating_add(segment.house_count);
                    if kind.is_intact() && !segment.kind.is_intact() {
                        *kind = segment.kind;
                    } else if *kind != segment.kind && !segment.kind.is_intact() {
                        debug!(segment = %row.infra_id, kept = %kind, ignored = %segment.kind, "conflicting segment kind");
                    }
                }
            }
        }

        let mut registry = SegmentRegistry::new();
        for (id, (length, houses, kind)) in pending {
            registry.insert(Segment::new(id, length, kind, i64::from(houses))?)?;
        }

        let mut index = BuildingIndex::new();
        for building in buildings.into_values() {
            index.insert(building)?;
        }

        debug!(
            segments = registry.len(),
            buildings = index.len(),
            "network built"
        );
        Self::new(registry, index)
    }
}
