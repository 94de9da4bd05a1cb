//! Clause database.
use partial_ref::{partial, PartialRef};
use vec_mut_scan::VecMutScan;

use ratel_formula::Lit;

use crate::context::{BinaryClausesP, ClauseDbP, Context, ProofP, SolverConfigP, WatchlistsP};

use super::{Clause, ClauseHeader, ClauseId};

/// Database of clause records.
///
/// Records are addressed by [`ClauseId`] so that every other structure (watch lists, reasons, the
/// learned clause registry, proof chains) can hold plain ids that stay valid across reallocation
/// of the backing storage. Deletion is lazy: a deleted clause keeps its slot until the watch lists
/// have been swept, after which the slot is recycled through a free list. While proofs are
/// recorded, slots are never recycled since recorded chains may cite any clause id.
pub struct ClauseDb {
    /// Slot 0 is a reserved dummy entry.
    clauses: Vec<Clause>,
    /// Slots of deleted clauses available for reuse.
    free: Vec<ClauseId>,
    /// Registry of purgeable (learnt or conflict flagged) clauses.
    ///
    /// May contain deleted entries; those are removed by [`ClauseDb::compact_purgeable`], which
    /// has to run after a batch of deletions before new clauses are added.
    purgeable: Vec<ClauseId>,
}

impl Default for ClauseDb {
    fn default() -> ClauseDb {
        ClauseDb {
            clauses: vec![Clause::new(ClauseHeader::new(), Box::default())],
            free: vec![],
            purgeable: vec![],
        }
    }
}

impl ClauseDb {
    /// Access a clause record.
    pub fn clause(&self, cid: ClauseId) -> &Clause {
        &self.clauses[cid.index()]
    }

    /// Mutate a clause record.
    pub fn clause_mut(&mut self, cid: ClauseId) -> &mut Clause {
        &mut self.clauses[cid.index()]
    }

    /// The highest clause slot index in use.
    ///
    /// Valid ids are `1..=highest_id_index()`; some of them may refer to deleted clauses.
    pub fn highest_id_index(&self) -> usize {
        self.clauses.len() - 1
    }

    /// Number of purgeable clauses.
    pub fn purgeable_count(&self) -> usize {
        self.purgeable.len()
    }

    /// The purgeable clause registry.
    pub fn purgeable(&self) -> &[ClauseId] {
        &self.purgeable
    }

    pub(crate) fn take_purgeable(&mut self) -> Vec<ClauseId> {
        std::mem::take(&mut self.purgeable)
    }

    pub(crate) fn restore_purgeable(&mut self, registry: Vec<ClauseId>) {
        debug_assert!(self.purgeable.is_empty());
        self.purgeable = registry;
    }

    /// Drop deleted entries from the purgeable registry.
    pub fn compact_purgeable(&mut self) {
        let clauses = &self.clauses;
        let mut scan = VecMutScan::new(&mut self.purgeable);
        while let Some(cid) = scan.next() {
            if clauses[cid.index()].header().deleted() {
                cid.remove();
            }
        }
    }

    fn alloc(&mut self, header: ClauseHeader, lits: &[Lit]) -> ClauseId {
        let record = Clause::new(header, lits.into());

        let cid = if let Some(cid) = self.free.pop() {
            self.clauses[cid.index()] = record;
            cid
        } else {
            assert!(self.clauses.len() < ClauseId::MAX_COUNT, "too many clauses");
            let cid = ClauseId::from_index(self.clauses.len());
            self.clauses.push(record);
            cid
        };

        if header.learnt() || header.conflict() {
            self.purgeable.push(cid);
        }

        cid
    }
}

/// Add a clause to the database.
///
/// The first two literals become the watched literals when `watched` is requested and the clause
/// is long enough; callers have to order the literal slice accordingly. With the binary index
/// enabled, watched 2-literal clauses go into the implication index instead of the watch lists.
pub fn add_clause(
    mut ctx: partial!(
        Context,
        mut BinaryClausesP,
        mut ClauseDbP,
        mut WatchlistsP,
        SolverConfigP,
    ),
    lits: &[Lit],
    learnt: bool,
    watched: bool,
    conflict: bool,
) -> ClauseId {
    let use_binary_index = ctx.part(SolverConfigP).binary_index;

    let into_index = use_binary_index && watched && lits.len() == 2;
    let into_watchlists = watched && lits.len() >= 2 && !into_index;

    let mut header = ClauseHeader::new();
    header.set_len(lits.len());
    header.set_learnt(learnt);
    header.set_conflict(conflict);
    header.set_watched(into_watchlists);

    let cid = ctx.part_mut(ClauseDbP).alloc(header, lits);

    if into_index {
        ctx.part_mut(BinaryClausesP)
            .add_binary_clause(cid, [lits[0], lits[1]]);
    } else if into_watchlists {
        ctx.part_mut(WatchlistsP)
            .watch_clause(cid, [lits[0], lits[1]]);
    }

    cid
}

/// Lazily delete a clause.
///
/// The clause is only marked here; watch lists are compacted by the next sweep. The slot is
/// recycled unless proofs are recorded, in which case the record has to stay readable for chain
/// validation.
pub fn delete_clause(mut ctx: partial!(Context, mut ClauseDbP, ProofP), cid: ClauseId) {
    let keep_record = ctx.part(ProofP).is_active();
    let db = ctx.part_mut(ClauseDbP);

    {
        let header = db.clauses[cid.index()].header_mut();
        if header.deleted() {
            return;
        }
        header.set_deleted(true);
        header.set_watched(false);
    }

    if !keep_record {
        // Release the literal storage right away; the slot itself is recycled once the watch
        // lists have been swept and the purgeable registry compacted.
        let mut tombstone = ClauseHeader::new();
        tombstone.set_deleted(true);
        db.clauses[cid.index()] = Clause::new(tombstone, Box::default());
        db.free.push(cid);
    }
}
