//! Material, labor and calendar cost of repaired segments

use std::collections::HashMap;

use crate::error::{PlanError, PlanResult};
use crate::models::{Building, BuildingType, CostedSegment, SegmentKind};
use crate::network::SegmentRegistry;

/// Per-meter rates for one segment kind
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KindRates {
    pub material_per_m: f64,
    /// Person-hours per meter
    pub hours_per_m: f64,
}

#[derive(Debug, Clone)]
pub struct CostModel {
    pub rates: HashMap<SegmentKind, KindRates>,
    pub hourly_wage: f64,
    /// Requested crew per segment, clamped to `1..=max_crew`
    pub crew_size: u32,
    pub max_crew: u32,
}

impl Default for CostModel {
    fn default() -> Self {
        let rates = HashMap::from([
            (SegmentKind::Aerial, KindRates { material_per_m: 500.0, hours_per_m: 2.0 }),
            (SegmentKind::SemiAerial, KindRates { material_per_m: 750.0, hours_per_m: 4.0 }),
            (SegmentKind::Conduit, KindRates { material_per_m: 900.0, hours_per_m: 5.0 }),
        ]);
        Self {
            rates,
            hourly_wage: 300.0 / 8.0,
            crew_size: 4,
            max_crew: 4,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SegmentCost {
    pub person_hours: f64,
    pub material_cost: f64,
    pub labor_cost: f64,
    /// Calendar hours with the effective crew
    pub duration: f64,
}

/// Aggregate for one building: costs are summed, duration is the longest
/// segment since each segment gets its own crew.
#[derive(Debug, Clone, PartialEq)]
pub struct BuildingCost {
    pub building_id: String,
    pub building_type: BuildingType,
    pub material_cost: f64,
    pub labor_cost: f64,
    pub duration: f64,
    /// Costed segments, sorted by id
    pub segments: Vec<CostedSegment>,
    pub dominant_kind: Option<SegmentKind>,
}

impl BuildingCost {
    pub fn total_cost(&self) -> f64 {
        self.material_cost + self.labor_cost
    }
}

impl CostModel {
    pub fn effective_crew(&self) -> u32 {
        self.crew_size.clamp(1, self.max_crew.max(1))
    }

    pub fn segment_cost(&self, kind: &SegmentKind, length: f64) -> PlanResult<SegmentCost> {
        let rates = self
            .rates
            .get(kind)
            .ok_or_else(|| PlanError::UnknownSegmentKind(kind.to_string()))?;

        let person_hours = length * rates.hours_per_m;
        Ok(SegmentCost {
            person_hours,
            material_cost: length * rates.material_per_m,
            labor_cost: person_hours * self.hourly_wage,
            duration: person_hours / f64::from(self.effective_crew()),
        })
    }

    /// Cost every segment of the building that needed work when loaded.
    pub fn building_cost(&self, building: &Building, registry: &SegmentRegistry) -> PlanResult<BuildingCost> {
        let mut cost = BuildingCost {
            building_id: building.id.clone(),
            building_type: building.building_type,
            material_cost: 0.0,
            labor_cost: 0.0,
            duration: 0.0,
            segments: Vec::new(),
            dominant_kind: None,
        };
        let mut length_by_kind: Vec<(&SegmentKind, f64)> = Vec::new();

        let worked = building
            .segments
            .iter()
            .filter_map(|id| registry.get(id))
            .filter(|segment| segment.needs_work());
        for segment in worked {
            let seg = self.segment_cost(&segment.kind, segment.length)?;
            cost.material_cost += seg.material_cost;
            cost.labor_cost += seg.labor_cost;
            cost.duration = cost.duration.max(seg.duration);
            cost.segments.push(CostedSegment {
                id: segment.id.clone(),
                kind: segment.kind.clone(),
                length: segment.length,
                person_hours: seg.person_hours,
                duration: seg.duration,
                material_cost: seg.material_cost,
                labor_cost: seg.labor_cost,
            });

            match length_by_kind.iter_mut().find(|(k, _)| *k == &segment.kind) {
                Some((_, total)) => *total += segment.length,
                None => length_by_kind.push((&segment.kind, segment.length)),
            }
        }

        cost.dominant_kind = length_by_kind
            .into_iter()
            .min_by(|(ka, la), (kb, lb)| {
                lb.total_cmp(la)
                    .then_with(|| ka.speed_rank().unwrap_or(u8::MAX).cmp(&kb.speed_rank().unwrap_or(u8::MAX)))
            })
            .map(|(kind, _)| kind.clone());
        cost.segments.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(cost)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Segment;

    fn registry(segments: &[(&str, f64, SegmentKind)]) -> SegmentRegistry {
        let mut registry = SegmentRegistry::new();
        for (id, length, kind) in segments {
            registry
                .insert(Segment::new(*id, *length, kind.clone(), 1).unwrap())
                .unwrap();
        }
        registry
    }

    #[test]
    fn test_conduit_segment() {
        let model = CostModel::default();
        let cost = model.segment_cost(&SegmentKind::Conduit, 100.0).unwrap();
        assert_eq!(cost.person_hours, 500.0);
        assert_eq!(cost.duration, 125.0);
        assert_eq!(cost.material_cost, 90_000.0);
        assert_eq!(cost.labor_cost, 18_750.0);
    }

    #[test]
    fn test_crew_is_capped() {
        let model = CostModel { crew_size: 12, ..CostModel::default() };
        assert_eq!(model.effective_crew(), 4);
        let model = CostModel { crew_size: 0, ..CostModel::default() };
        assert_eq!(model.effective_crew(), 1);
        let cost = model.segment_cost(&SegmentKind::Aerial, 10.0).unwrap();
        assert_eq!(cost.duration, 20.0);
    }

    #[test]
    fn test_unknown_kind_is_an_error() {
        let model = CostModel::default();
        assert!(matches!(
            model.segment_cost(&SegmentKind::Other("underground".into()), 1.0),
            Err(PlanError::UnknownSegmentKind(kind)) if kind == "underground"
        ));
        assert!(model.segment_cost(&SegmentKind::Intact, 1.0).is_err());
    }

    #[test]
    fn test_building_takes_longest_segment_and_sums_costs() {
        let reg = registry(&[
            ("I1", 10.0, SegmentKind::Aerial),
            ("I2", 8.0, SegmentKind::SemiAerial),
            ("I3", 50.0, SegmentKind::Intact),
        ]);
        let b = Building::new("B1", BuildingType::School).with_segments(["I1", "I2", "I3"]);
        let cost = CostModel::default().building_cost(&b, &reg).unwrap();

        let ids: Vec<_> = cost.segments.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["I1", "I2"]);
        assert_eq!(cost.segments[1].person_hours, 32.0);
        assert_eq!(cost.segments[1].material_cost, 6_000.0);
        assert_eq!(cost.material_cost, 5_000.0 + 6_000.0);
        assert_eq!(cost.labor_cost, (20.0 + 32.0) * 37.5);
        // 32 person-hours / 4 beats 20 / 4
        assert_eq!(cost.duration, 8.0);
        assert_eq!(cost.dominant_kind, Some(SegmentKind::Aerial));
    }

    #[test]
    fn test_dominant_kind_tie_goes_to_faster_kind() {
        let reg = registry(&[("I1", 10.0, SegmentKind::Conduit), ("I2", 10.0, SegmentKind::SemiAerial)]);
        let b = Building::new("B1", BuildingType::Hospital).with_segments(["I1", "I2"]);
        let cost = CostModel::default().building_cost(&b, &reg).unwrap();
        assert_eq!(cost.dominant_kind, Some(SegmentKind::SemiAerial));
    }

    #[test]
    fn test_building_without_work_costs_nothing() {
        let reg = registry(&[("I1", 10.0, SegmentKind::Intact)]);
        let b = Building::new("B1", BuildingType::Residential).with_segments(["I1"]);
        let cost = CostModel::default().building_cost(&b, &reg).unwrap();
        assert_eq!(cost.total_cost(), 0.0);
        assert_eq!(cost.duration, 0.0);
        assert_eq!(cost.dominant_kind, None);
    }
}
