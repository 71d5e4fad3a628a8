//! Greedy repair-order scheduler
//!
//! Each iteration reads the remaining difficulty of every pending building
//! against one snapshot of the registry, then repairs the segments of the
//! easiest building. Repairing a shared segment lowers the difficulty of every
//! other building using it, so the order cannot be computed by a single sort
//! up front.

use std::collections::BTreeSet;

use rayon::prelude::*;
use tracing::{debug, info, trace, warn};

use crate::difficulty::{key, remaining_difficulty, segment_difficulty, unrepaired_segments};
use crate::error::{PlanError, PlanResult};
use crate::models::{Building, Difficulty, PlanEntry};
use crate::network::{Network, SegmentRegistry};

/// Where the scheduler stands between iterations
#[derive(Debug, Clone, PartialEq)]
pub enum SchedulerState {
    /// Some building may still have an unrepaired segment.
    Ready,
    /// Every building is finalized.
    Done,
    /// Every pending building has an infinite remaining difficulty.
    Stuck {
        buildings: Vec<String>,
        segments: Vec<String>,
    },
}

/// Ordered repair plan, complete or cut short by a stuck state
#[derive(Debug, Clone)]
pub struct RepairPlan {
    pub entries: Vec<PlanEntry>,
    pub state: SchedulerState,
}

impl RepairPlan {
    pub fn is_complete(&self) -> bool {
        self.state == SchedulerState::Done
    }

    /// Entries for buildings that needed no repair of their own.
    pub fn no_repair_entries(&self) -> impl Iterator<Item = &PlanEntry> {
        self.entries.iter().filter(|e| e.segments_repaired == 0)
    }

    pub fn total_repaired(&self) -> usize {
        self.entries.iter().map(|e| e.segments_repaired).sum()
    }

    /// Turn a stuck plan into an `UnresolvableSegment` error carrying the partial plan.
    pub fn into_result(self) -> PlanResult<Self> {
        match self.state {
            SchedulerState::Stuck { buildings, segments } => Err(PlanError::UnresolvableSegment {
                buildings,
                segments,
                partial: self.entries,
            }),
            SchedulerState::Ready | SchedulerState::Done => Ok(self),
        }
    }
}

pub struct RepairScheduler<'n> {
    registry: &'n mut SegmentRegistry,
    pending: Vec<&'n Building>,
    entries: Vec<PlanEntry>,
    state: SchedulerState,
}

impl<'n> RepairScheduler<'n> {
    /// Take exclusive hold of the network's repair state for one run.
    pub fn new(network: &'n mut Network) -> Self {
        let Network { registry, buildings } = network;
        Self {
            registry,
            pending: buildings.iter().collect(),
            entries: Vec::new(),
            state: SchedulerState::Ready,
        }
    }

    pub fn state(&self) -> &SchedulerState {
        &self.state
    }

    pub fn registry(&self) -> &SegmentRegistry {
        &*self.registry
    }

    pub fn pending(&self) -> impl Iterator<Item = &Building> {
        self.pending.iter().copied()
    }

    pub fn entries(&self) -> &[PlanEntry] {
        &self.entries
    }

    /// Run one select/repair/record iteration. Returns false once a terminal
    /// state has been reached.
    pub fn step(&mut self) -> bool {
        if self.state != SchedulerState::Ready {
            return false;
        }

        // Read phase: every evaluation sees the same registry snapshot.
        let snapshot: &SegmentRegistry = &*self.registry;
        let evaluated: Vec<(&'n Building, Difficulty, bool)> = self
            .pending
            .par_iter()
            .map(|building| {
                let open = unrepaired_segments(building, snapshot).next().is_some();
                (*building, remaining_difficulty(building, snapshot), open)
            })
            .collect();

        // Zero-length segments cost nothing but still have to be repaired,
        // so only buildings with no open segment take the fast path.
        let mut candidates = Vec::with_capacity(evaluated.len());
        for (building, difficulty, open) in evaluated {
            if !open {
                trace!(building = %building.id, "nothing left to repair");
                self.record(building, Difficulty::ZERO, 0, 0, 0.0);
            } else {
                candidates.push((building, difficulty));
            }
        }

        let Some(&(chosen, difficulty)) = candidates
            .iter()
            .min_by(|a, b| key(a.0, a.1).cmp(&key(b.0, b.1)))
        else {
            self.pending.clear();
            self.state = SchedulerState::Done;
            info!(steps = self.entries.len(), "repair plan complete");
            return false;
        };

        if difficulty.is_infinite() {
            self.state = self.stuck(candidates.iter().map(|(b, _)| *b));
            self.pending = candidates.into_iter().map(|(b, _)| b).collect();
            if let SchedulerState::Stuck { buildings, segments } = &self.state {
                warn!(?buildings, ?segments, "scheduler stuck on segments serving no house");
            }
            return false;
        }

        let (houses, length) = unrepaired_segments(chosen, &*self.registry)
            .fold((0u64, 0.0), |(h, l), s| (h + u64::from(s.house_count), l + s.length));

        // Mutation phase: single writer, after all reads of this iteration.
        let repaired = chosen
            .segments
            .iter()
            .filter(|id| self.registry.repair(id))
            .count();

        self.record(chosen, difficulty, repaired, houses, length);
        debug!(
            step = self.entries.len(),
            building = %chosen.id,
            %difficulty,
            repaired,
            "building selected"
        );

        self.pending = candidates
            .into_iter()
            .map(|(b, _)| b)
            .filter(|b| b.id != chosen.id)
            .collect();
        true
    }

    /// Drive the scheduler to a terminal state.
    pub fn run(mut self) -> RepairPlan {
        while self.step() {}
        RepairPlan {
            entries: self.entries,
            state: self.state,
        }
    }

    fn record(&mut self, building: &Building, difficulty: Difficulty, repaired: usize, houses: u64, length: f64) {
        self.entries.push(PlanEntry {
            step: self.entries.len() + 1,
            building_id: building.id.clone(),
            difficulty,
            segments_repaired: repaired,
            houses,
            length,
        });
    }

    fn stuck<'b>(&self, blocked: impl Iterator<Item = &'b Building>) -> SchedulerState {
        let mut buildings = Vec::new();
        let mut segments = BTreeSet::new();
        for building in blocked {
            buildings.push(building.id.clone());
            segments.extend(
                unrepaired_segments(building, self.registry())
                    .filter(|s| segment_difficulty(s).is_infinite())
                    .map(|s| s.id.clone()),
            );
        }
        SchedulerState::Stuck {
            buildings,
            segments: segments.into_iter().collect(),
        }
    }
}

/// Schedule every building of the network, consuming its repair state.
pub fn schedule(network: &mut Network) -> RepairPlan {
    RepairScheduler::new(network).run()
}
