//! Phase allocation under priority and cost-quota rules
//!
//! Phase 0 holds every hospital. Phase 1 holds every school, topped up with
//! residential buildings until it reaches its share of the non-hospital cost.
//! The other residential buildings fill buckets 2, 3 and 4 in priority order,
//! each bucket taking buildings until it reaches its target.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use tracing::{debug, warn};

use crate::cost::BuildingCost;
use crate::models::{BuildingType, Difficulty, DifficultyKey, PhaseAssignment};

pub const PHASE_COUNT: u8 = 5;

/// Order in which residential buildings are handed to phases 1 to 4
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResidentialOrder {
    /// Initial difficulty ascending, then id
    #[default]
    Difficulty,
    CostDescending,
    CostAscending,
}

impl FromStr for ResidentialOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "difficulty" => Ok(Self::Difficulty),
            "cost-descending" => Ok(Self::CostDescending),
            "cost-ascending" => Ok(Self::CostAscending),
            other => Err(format!(
                "unknown residential order '{}' (expected difficulty, cost-descending or cost-ascending)",
                other
            )),
        }
    }
}

impl fmt::Display for ResidentialOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Difficulty => write!(f, "difficulty"),
            Self::CostDescending => write!(f, "cost-descending"),
            Self::CostAscending => write!(f, "cost-ascending"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PhasePolicy {
    /// Share of the non-hospital cost phase 1 must reach
    pub phase1_share: f64,
    /// Target share of the non-hospital cost for each of phases 2 to 4
    pub bucket_share: f64,
    /// Calendar hours every hospital must be reconnected within
    pub deadline_hours: f64,
    pub residential_order: ResidentialOrder,
}

impl Default for PhasePolicy {
    fn default() -> Self {
        Self {
            phase1_share: 0.40,
            bucket_share: 0.20,
            // 20 h of autonomy minus a 20% margin
            deadline_hours: 16.0,
            residential_order: ResidentialOrder::Difficulty,
        }
    }
}

/// A building's cost together with its priority key
#[derive(Debug, Clone)]
pub struct PhaseInput {
    pub cost: BuildingCost,
    /// Full-state difficulty, computed before any repair
    pub priority: Difficulty,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HospitalCompliance {
    pub max_duration: f64,
    pub deadline: f64,
    pub compliant: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PhaseSummary {
    pub phase: u8,
    pub buildings: usize,
    pub material_cost: f64,
    pub labor_cost: f64,
    pub total_cost: f64,
    pub max_duration: f64,
    /// Share of the cost of all phases
    pub share: f64,
}

#[derive(Debug, Clone)]
pub struct PhaseTable {
    /// Phase ascending, then total cost descending
    pub assignments: Vec<PhaseAssignment>,
    /// Execution order inside phase 0: fastest kind first, then shortest
    pub hospital_order: Vec<String>,
    pub compliance: HospitalCompliance,
}

impl PhaseTable {
    pub fn phase_of(&self, building_id: &str) -> Option<u8> {
        self.assignments
            .iter()
            .find(|a| a.building_id == building_id)
            .map(|a| a.phase)
    }

    pub fn in_phase(&self, phase: u8) -> impl Iterator<Item = &PhaseAssignment> {
        self.assignments.iter().filter(move |a| a.phase == phase)
    }

    pub fn summaries(&self) -> Vec<PhaseSummary> {
        let grand_total: f64 = self.assignments.iter().map(|a| a.total_cost()).sum();
        (0..PHASE_COUNT)
            .filter_map(|phase| {
                let members: Vec<_> = self.in_phase(phase).collect();
                if members.is_empty() {
                    return None;
                }
                let material_cost: f64 = members.iter().map(|a| a.material_cost).sum();
                let labor_cost: f64 = members.iter().map(|a| a.labor_cost).sum();
                let total_cost = material_cost + labor_cost;
                Some(PhaseSummary {
                    phase,
                    buildings: members.len(),
                    material_cost,
                    labor_cost,
                    total_cost,
                    max_duration: members.iter().map(|a| a.duration).fold(0.0, f64::max),
                    share: if grand_total > 0.0 { total_cost / grand_total } else { 0.0 },
                })
            })
            .collect()
    }
}

fn assignment(phase: u8, cost: &BuildingCost) -> PhaseAssignment {
    PhaseAssignment {
        phase,
        building_id: cost.building_id.clone(),
        building_type: cost.building_type,
        material_cost: cost.material_cost,
        labor_cost: cost.labor_cost,
        duration: cost.duration,
        segments: cost.segments.clone(),
    }
}

fn hospital_order(a: &PhaseInput, b: &PhaseInput) -> Ordering {
    let rank = |input: &PhaseInput| {
        input
            .cost
            .dominant_kind
            .as_ref()
            .and_then(|kind| kind.speed_rank())
            .unwrap_or(u8::MAX)
    };
    rank(a)
        .cmp(&rank(b))
        .then_with(|| a.cost.duration.total_cmp(&b.cost.duration))
        .then_with(|| a.cost.building_id.cmp(&b.cost.building_id))
}

fn priority_key(input: &PhaseInput) -> DifficultyKey<'_> {
    DifficultyKey {
        difficulty: input.priority,
        building_id: &input.cost.building_id,
    }
}

fn residential_order(order: ResidentialOrder) -> impl Fn(&PhaseInput, &PhaseInput) -> Ordering {
    move |a, b| match order {
        ResidentialOrder::Difficulty => priority_key(a).cmp(&priority_key(b)),
        ResidentialOrder::CostDescending => b
            .cost
            .total_cost()
            .total_cmp(&a.cost.total_cost())
            .then_with(|| a.cost.building_id.cmp(&b.cost.building_id)),
        ResidentialOrder::CostAscending => a
            .cost
            .total_cost()
            .total_cmp(&b.cost.total_cost())
            .then_with(|| a.cost.building_id.cmp(&b.cost.building_id)),
    }
}

/// Partition every building into phases 0 to 4.
pub fn allocate(inputs: Vec<PhaseInput>, policy: &PhasePolicy) -> PhaseTable {
    let mut hospitals = Vec::new();
    let mut schools = Vec::new();
    let mut residential = Vec::new();
    for input in inputs {
        match input.cost.building_type {
            BuildingType::Hospital => hospitals.push(input),
            BuildingType::School => schools.push(input),
            BuildingType::Residential => residential.push(input),
        }
    }

    let mut assignments = Vec::new();

    hospitals.sort_by(hospital_order);
    let max_duration = hospitals.iter().map(|h| h.cost.duration).fold(0.0, f64::max);
    let compliance = HospitalCompliance {
        max_duration,
        deadline: policy.deadline_hours,
        compliant: max_duration <= policy.deadline_hours,
    };
    if !compliance.compliant {
        warn!(
            max_duration,
            deadline = policy.deadline_hours,
            "hospital reconnection exceeds deadline even at full crew"
        );
    }
    let execution_order = hospitals.iter().map(|h| h.cost.building_id.clone()).collect();
    assignments.extend(hospitals.iter().map(|h| assignment(0, &h.cost)));

    let remainder_cost: f64 = schools
        .iter()
        .chain(residential.iter())
        .map(|input| input.cost.total_cost())
        .sum();

    let phase1_target = policy.phase1_share * remainder_cost;
    let mut phase1_cost: f64 = schools.iter().map(|s| s.cost.total_cost()).sum();
    assignments.extend(schools.iter().map(|s| assignment(1, &s.cost)));

    residential.sort_by(residential_order(policy.residential_order));
    let mut queue = residential.iter();
    while phase1_cost < phase1_target {
        let Some(input) = queue.next() else { break };
        phase1_cost += input.cost.total_cost();
        assignments.push(assignment(1, &input.cost));
    }

    let bucket_target = policy.bucket_share * remainder_cost;
    let mut filled = [0.0_f64; 3];
    let mut bucket = 0;
    for input in queue {
        while bucket < filled.len() - 1 && filled[bucket] >= bucket_target {
            bucket += 1;
        }
        filled[bucket] += input.cost.total_cost();
        assignments.push(assignment(2 + bucket as u8, &input.cost));
    }

    debug!(
        remainder_cost,
        phase1_cost,
        buckets = ?filled,
        "phases allocated"
    );

    assignments.sort_by(|a, b| {
        a.phase
            .cmp(&b.phase)
            .then_with(|| b.total_cost().total_cmp(&a.total_cost()))
            .then_with(|| a.building_id.cmp(&b.building_id))
    });

    PhaseTable {
        assignments,
        hospital_order: execution_order,
        compliance,
    }
}
