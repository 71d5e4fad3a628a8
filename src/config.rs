//! Planner configuration

use crate::cost::CostModel;
use crate::phases::PhasePolicy;

/// Options applied while reading input files
#[derive(Debug, Clone)]
pub struct LoaderOptions {
    /// Keep rows flagged intact so their buildings still show up in the plan
    pub keep_intact: bool,
}

impl Default for LoaderOptions {
    fn default() -> Self {
        Self { keep_intact: true }
    }
}

#[derive(Debug, Clone, Default)]
pub struct PlannerConfig {
    pub cost: CostModel,
    pub phases: PhasePolicy,
    pub loader: LoaderOptions,
}
