//! Clause activity.
use partial_ref::{partial, PartialRef};

use crate::config::SolverConfig;
use crate::context::{ClauseActivityP, ClauseDbP, Context};

use super::ClauseId;

/// Rescale activities if any value exceeds this value.
const RESCALE_LIMIT: f64 = 1e20;

/// Clause activity.
///
/// The individual clause activities are stored in the clause records. This stores global metadata
/// used for bumping and decaying activities.
///
/// Instead of decaying all activities each conflict, the value added on bumping is divided by the
/// decay factor each conflict. When an activity would overflow, all activities and the bump value
/// are scaled down.
pub struct ClauseActivity {
    /// The value to add on bumping.
    bump: f64,
    /// The inverse of the decay factor.
    inv_decay: f64,
}

impl Default for ClauseActivity {
    fn default() -> ClauseActivity {
        ClauseActivity {
            bump: 1.0,
            inv_decay: 1.0 / SolverConfig::default().clause_activity_decay,
        }
    }
}

impl ClauseActivity {
    /// Change the decay factor.
    pub fn set_decay(&mut self, decay: f64) {
        assert!(decay < 1.0);
        assert!(decay > 1.0 / 16.0);
        self.inv_decay = 1.0 / decay;
    }

    /// The current bump value.
    pub fn bump(&self) -> f64 {
        self.bump
    }
}

/// Increase a clause's activity.
pub fn bump_clause_activity(
    mut ctx: partial!(Context, mut ClauseActivityP, mut ClauseDbP),
    cid: ClauseId,
) {
    let bump = ctx.part(ClauseActivityP).bump;
    let clause = ctx.part_mut(ClauseDbP).clause_mut(cid);

    let activity = clause.activity() + bump;
    clause.set_activity(activity);

    if activity > RESCALE_LIMIT {
        rescale_clause_activities(ctx.borrow());
    }
}

/// Decay the clause activities.
pub fn decay_clause_activities(mut ctx: partial!(Context, mut ClauseActivityP, mut ClauseDbP)) {
    let activity = ctx.part_mut(ClauseActivityP);
    activity.bump *= activity.inv_decay;
    if activity.bump >= RESCALE_LIMIT {
        rescale_clause_activities(ctx.borrow());
    }
}

/// Rescale all values to avoid an overflow.
///
/// Only the purgeable clauses are rescaled; activities are never compared across other clauses.
fn rescale_clause_activities(mut ctx: partial!(Context, mut ClauseActivityP, mut ClauseDbP)) {
    let rescale_factor = 1.0 / RESCALE_LIMIT;

    let (db, mut ctx) = ctx.split_part_mut(ClauseDbP);
    for index in 0..db.purgeable_count() {
        let cid = db.purgeable()[index];
        let clause = db.clause_mut(cid);
        let activity = clause.activity() * rescale_factor;
        clause.set_activity(activity);
    }
    ctx.part_mut(ClauseActivityP).bump *= rescale_factor;
}

#[cfg(test)]
mod tests {
    use super::*;

    use partial_ref::IntoPartialRefMut;
    use ratel_formula::lits;

    use crate::clause::db::add_clause;

    #[test]
    fn bumps_rescale() {
        let mut ctx = Context::default();
        let mut ctx = ctx.into_partial_ref_mut();

        let cid = add_clause(ctx.borrow(), &lits![1, 2, 3], true, false, false);
        let other = add_clause(ctx.borrow(), &lits![1, 2, 4], true, false, false);

        ctx.part_mut(ClauseActivityP).bump = RESCALE_LIMIT * 0.75;

        bump_clause_activity(ctx.borrow(), cid);
        bump_clause_activity(ctx.borrow(), cid);

        // The second bump crossed the rescale limit.
        assert!(ctx.part(ClauseDbP).clause(cid).activity() <= 2.0);
        assert_eq!(ctx.part(ClauseDbP).clause(other).activity(), 0.0);
        assert!(ctx.part(ClauseActivityP).bump() < 1.0);

        // Relative order survives rescaling.
        bump_clause_activity(ctx.borrow(), other);
        assert!(
            ctx.part(ClauseDbP).clause(cid).activity()
                > ctx.part(ClauseDbP).clause(other).activity()
        );
    }
}
