//! Solver configuration.
use serde::{Deserialize, Serialize};

/// Configurable parameters used during solving.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SolverConfig {
    /// Multiplicative decay for the variable activities of the decision heuristic.
    /// (Default: 0.95)
    pub var_activity_decay: f64,

    /// Multiplicative decay for clause activities. (Default: 0.999)
    pub clause_activity_decay: f64,

    /// Scaling factor for Luby sequence based restarts (number of conflicts). (Default: 128)
    pub restart_interval_scale: u64,

    /// On restart, keep the prefix of the trail whose decisions are more active than the next
    /// decision candidate instead of backtracking to the root level. (Default: true)
    pub restart_trail_reuse: bool,

    /// Initial purge threshold as a fraction of the initial clause count. (Default: 0.33)
    pub purge_threshold_factor: f64,

    /// Growth factor applied to the purge threshold at each adjustment. (Default: 1.1)
    pub purge_threshold_growth: f64,

    /// Initial number of conflicts between purge threshold adjustments. (Default: 100)
    pub purge_adjust_interval: f64,

    /// Growth factor for the adjustment interval. (Default: 1.5)
    pub purge_adjust_growth: f64,

    /// Index 2-literal clauses by their implications and drain those implications ahead of the
    /// general watch walk. Must be set before the first clause is added. (Default: false)
    pub binary_index: bool,
}

impl Default for SolverConfig {
    fn default() -> SolverConfig {
        SolverConfig {
            var_activity_decay: 0.95,
            clause_activity_decay: 0.999,
            restart_interval_scale: 128,
            restart_trail_reuse: true,
            purge_threshold_factor: 0.33,
            purge_threshold_growth: 1.1,
            purge_adjust_interval: 100.0,
            purge_adjust_growth: 1.5,
            binary_index: false,
        }
    }
}
