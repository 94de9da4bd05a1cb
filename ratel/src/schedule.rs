//! Restart and purge scheduling.
pub mod luby;

pub use luby::LubySequence;

use log::info;

use partial_ref::{partial, PartialRef};

use crate::context::{
    AssignmentP, BinaryClausesP, ClauseDbP, Context, ScheduleP, TrailP,
};

/// Restart and purge bookkeeping.
///
/// The restart countdown follows the Luby sequence scaled by the configured base interval. The
/// purge threshold starts as a fraction of the initial clause count and grows geometrically at
/// geometrically growing intervals.
#[derive(Default)]
pub struct Schedule {
    /// Total number of conflicts seen.
    pub conflicts: u64,
    /// Number of restarts performed.
    pub restarts: u64,
    /// Conflicts remaining until the next restart.
    pub restart_countdown: u64,
    pub luby: LubySequence,
    /// Number of purgeable clauses that triggers the next purge.
    pub purge_threshold: f64,
    /// Conflicts remaining until the purge threshold grows.
    pub adjust_countdown: u64,
    /// Current adjustment interval in conflicts.
    pub adjust_interval: f64,
    /// A restart happened; satisfied clauses can be purged once back at the root level.
    pub pending_root_simplify: bool,
    /// Set by the first propagation call, which derives the initial purge threshold.
    pub initialized: bool,
}

/// Write a progress line to the log every few thousand conflicts.
pub fn log_progress(
    mut ctx: partial!(Context, AssignmentP, BinaryClausesP, ClauseDbP, ScheduleP, TrailP),
) {
    let schedule = ctx.part(ScheduleP);
    if schedule.conflicts == 0 || schedule.conflicts % 5000 != 0 {
        return;
    }

    info!(
        "confl: {}k rest: {} vars: {} bin: {} purgeable: {} trail: {}",
        schedule.conflicts / 1000,
        schedule.restarts,
        ctx.part(AssignmentP).var_count(),
        ctx.part(BinaryClausesP).count(),
        ctx.part(ClauseDbP).purgeable_count(),
        ctx.part(TrailP).trail().len(),
    );
}
