//! Watchlists to detect clauses that became unit.
//!
//! Every watched clause keeps its two watched literals in positions 0 and 1, and its id is kept in
//! the watch lists of exactly those two literals. When a clause is not unit under the current
//! assignment, the watched literals are two non-false literals. When a clause is unit and thus
//! propagating, the true literal is watched and in position 0, the other watched literal is the
//! one with the largest decision level and kept in position 1. When a clause becomes satisfied
//! before becoming unit the watches can be kept as they were.
//!
//! When a literal is assigned false that invariant can be invalidated. This is detected by
//! scanning the watch list of the falsified literal; the watches are moved to restore the
//! invariant, which also finds all clauses that became unit or conflicting. There is no need to
//! update watchlists on backtracking, as unassigning variables cannot invalidate the invariant.
//!
//! See [Section 4.5.1 of the "Handbook of Satisfiability"][handbook-ch4] for more details and
//! references.
//!
//! Deleted and unwatched clauses are not removed from the lists eagerly. Stale entries are
//! filtered out in one batch by [`sweep_watchlists`] after root level simplification or a learned
//! clause purge.
//!
//! [handbook-ch4]: https://www.satassociation.org/articles/FAIA185-0131.pdf
use partial_ref::{partial, PartialRef};

use ratel_formula::Lit;

use crate::clause::ClauseId;
use crate::context::{ClauseDbP, Context, WatchlistsP};

/// Watchlists to detect clauses that became unit.
#[derive(Default)]
pub struct Watchlists {
    /// Clause ids per watched literal, indexed by literal code.
    watches: Vec<Vec<ClauseId>>,
}

impl Watchlists {
    /// Update structures for a new variable count.
    pub fn set_var_count(&mut self, count: usize) {
        self.watches.resize(2 * (count + 1), vec![]);
    }

    /// Start watching a clause.
    ///
    /// `lits` have to be the first two literals of the given clause.
    pub fn watch_clause(&mut self, cid: ClauseId, lits: [Lit; 2]) {
        for &lit in lits.iter() {
            self.watches[lit.code()].push(cid);
        }
    }

    /// Make a literal watch a clause.
    pub fn add_watch(&mut self, lit: Lit, cid: ClauseId) {
        self.watches[lit.code()].push(cid)
    }

    /// Watch list of a given literal.
    pub fn watched_by_mut(&mut self, lit: Lit) -> &mut Vec<ClauseId> {
        &mut self.watches[lit.code()]
    }
}

/// Remove entries of deleted and unwatched clauses from every watch list.
pub fn sweep_watchlists(mut ctx: partial!(Context, mut WatchlistsP, ClauseDbP)) {
    let (watchlists, mut ctx) = ctx.split_part_mut(WatchlistsP);
    let db = ctx.part(ClauseDbP);

    for list in watchlists.watches.iter_mut() {
        list.retain(|&cid| {
            let header = db.clause(cid).header();
            !header.deleted() && header.watched()
        });
    }
}
