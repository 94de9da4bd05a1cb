//! Unit propagation.
pub mod assignment;
pub mod binary;
pub mod graph;
pub mod long;
pub mod watch;

pub use assignment::{backtrack, enqueue_assignment, Assignment, Trail};
pub use graph::{ImplGraph, ImplNode, Reason};
pub use watch::Watchlists;

use partial_ref::{partial, PartialRef};

use crate::clause::ClauseId;
use crate::context::{
    AssignmentP, BinaryClausesP, ClauseDbP, Context, HintsP, ImplGraphP, ProofP, SolverConfigP,
    TrailP, WatchlistsP,
};
use crate::hints;

/// Propagate all enqueued assignments.
///
/// Consumes trail literals from the propagation cursor onwards. For each literal the direct
/// implications of the binary index (when enabled) are drained ahead of the general watch walk.
///
/// When proofs are recorded, propagation at the root level first forces explanations for all
/// pending lazy reasons, so that every subsequent resolution step can cite a fixed clause id.
///
/// On conflict returns the conflicting clause and leaves the propagation cursor in place.
pub fn propagate(
    mut ctx: partial!(
        Context,
        mut AssignmentP,
        mut BinaryClausesP,
        mut ClauseDbP,
        mut HintsP,
        mut ImplGraphP,
        mut ProofP,
        mut TrailP,
        mut WatchlistsP,
        SolverConfigP,
    ),
) -> Result<(), ClauseId> {
    if ctx.part(ProofP).is_active() && ctx.part(TrailP).current_level() == 0 {
        let mut index = ctx.part(TrailP).cursor();
        while index < ctx.part(TrailP).trail().len() {
            let lit = ctx.part(TrailP).trail()[index];
            if ctx.part(ImplGraphP).reason(lit.var()) == Reason::Lazy {
                hints::explain_hint(ctx.borrow(), lit);
            }
            index += 1;
        }
    }

    let use_binary_index = ctx.part(SolverConfigP).binary_index;
    let mut binary_cursor = ctx.part(TrailP).cursor();

    loop {
        if use_binary_index {
            while binary_cursor < ctx.part(TrailP).trail().len() {
                let lit = ctx.part(TrailP).trail()[binary_cursor];
                binary_cursor += 1;
                binary::propagate_binary(ctx.borrow(), lit)?;
            }
        }

        let lit = match ctx.part(TrailP).next_unpropagated() {
            Some(lit) => lit,
            None => return Ok(()),
        };
        ctx.part_mut(TrailP).advance_cursor();

        long::propagate_watches(ctx.borrow(), lit)?;
    }
}
