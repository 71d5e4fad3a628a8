//! End-to-end planning: network, repair order, costs, phases

use tracing::info;

use crate::config::PlannerConfig;
use crate::difficulty::initial_difficulty;
use crate::error::PlanResult;
use crate::models::InputRow;
use crate::network::Network;
use crate::phases::{PhaseInput, PhaseTable, allocate};
use crate::scheduler::{RepairPlan, schedule};

#[derive(Debug, Clone)]
pub struct PlanReport {
    pub repair: RepairPlan,
    pub phases: PhaseTable,
    pub segments: usize,
    pub buildings: usize,
}

pub fn plan(rows: &[InputRow], config: &PlannerConfig) -> PlanResult<PlanReport> {
    let network = Network::from_rows(rows)?;
    plan_network(network, config)
}

/// Schedule repairs over the network, then cost and phase every building.
///
/// A stuck schedule is returned as `UnresolvableSegment`; no phases are
/// allocated in that case.
pub fn plan_network(mut network: Network, config: &PlannerConfig) -> PlanResult<PlanReport> {
    if network.buildings.is_empty() {
        info!("no buildings supplied, nothing to repair");
    }

    let priorities: Vec<_> = network
        .buildings
        .iter()
        .map(|b| initial_difficulty(b, &network.registry))
        .collect();

    let repair = schedule(&mut network).into_result()?;
    info!(
        steps = repair.entries.len(),
        repaired = repair.total_repaired(),
        "repair order computed"
    );

    let inputs = network
        .buildings
        .iter()
        .zip(priorities)
        .map(|(building, priority)| {
            Ok(PhaseInput {
                cost: config.cost.building_cost(building, &network.registry)?,
                priority,
            })
        })
        .collect::<PlanResult<Vec<_>>>()?;

    let phases = allocate(inputs, &config.phases);

    Ok(PlanReport {
        repair,
        phases,
        segments: network.registry.len(),
        buildings: network.buildings.len(),
    })
}
