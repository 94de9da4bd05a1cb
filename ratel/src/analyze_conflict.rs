//! Learns a new clause by analyzing a conflict.
use partial_ref::{partial, PartialRef};

use ratel_formula::{Lit, Var};

use crate::clause::activity::bump_clause_activity;
use crate::clause::{ClauseDb, ClauseId};
use crate::context::{
    AnalyzeConflictP, AssignmentP, BinaryClausesP, ClauseActivityP, ClauseDbP, Context, HintsP,
    ImplGraphP, ProofP, SolverConfigP, TrailP, VsidsP, WatchlistsP,
};
use crate::hints;
use crate::proof;
use crate::prop::{ImplGraph, Reason};

/// Temporaries for conflict analysis.
#[derive(Default)]
pub struct AnalyzeConflict {
    /// The learned clause after analysis finishes; position 0 is the asserting literal.
    clause: Vec<Lit>,
    /// Literals of the partial resolvent at the conflict level not yet resolved away.
    current_level_count: usize,
    /// Variables of the partial resolvent and variables visited by minimization.
    seen: Vec<bool>,
    /// Entries to clean in `seen` when analysis finishes.
    to_clean: Vec<Var>,
    /// Pending literals of the minimization search.
    stack: Vec<Lit>,
}

impl AnalyzeConflict {
    /// Update structures for a new variable count.
    pub fn set_var_count(&mut self, count: usize) {
        self.seen.resize(count + 1, false);
    }

    /// The learned clause.
    pub fn clause(&self) -> &[Lit] {
        &self.clause
    }
}

/// Approximate set of decision levels, collapsed modulo 32.
///
/// False positives are allowed; they only make minimization keep a removable literal.
#[derive(Default, Copy, Clone)]
struct LevelMask {
    bits: u32,
}

impl LevelMask {
    fn add(&mut self, level: usize) {
        self.bits |= 1 << (level & 31)
    }

    fn test(&self, level: usize) -> bool {
        self.bits & (1 << (level & 31)) != 0
    }
}

/// Learns a new clause by analyzing a conflict.
///
/// Returns the backtrack level: the highest level among the learned clause's literals besides the
/// asserting one, which afterwards sits in position 1 so it becomes the second watched literal.
///
/// The caller backtracks, inserts the learned clause, asserts position 0 with it as reason and
/// closes the proof chain opened here.
pub fn analyze_conflict(
    mut ctx: partial!(
        Context,
        mut AnalyzeConflictP,
        mut BinaryClausesP,
        mut ClauseActivityP,
        mut ClauseDbP,
        mut HintsP,
        mut ImplGraphP,
        mut ProofP,
        mut VsidsP,
        mut WatchlistsP,
        AssignmentP,
        SolverConfigP,
        TrailP,
    ),
    conflict: ClauseId,
) -> usize {
    debug_assert!(ctx.part(TrailP).current_level() > 0);

    {
        let analyze = ctx.part_mut(AnalyzeConflictP);
        analyze.clause.clear();
        // position 0 is filled with the asserting literal below
        analyze.clause.push(Lit::UNDEF);
        analyze.current_level_count = 0;
        debug_assert!(analyze.to_clean.is_empty());
    }

    bump_clause_activity(ctx.borrow(), conflict);
    proof::begin_chain(ctx.borrow(), conflict);

    // We start with all the literals of the conflict clause.
    let conflict_len = ctx.part(ClauseDbP).clause(conflict).lits().len();
    for k in 0..conflict_len {
        let lit = ctx.part(ClauseDbP).clause(conflict).lits()[k];
        debug_assert!(ctx.part(AssignmentP).lit_is_false(lit));
        add_literal(ctx.borrow(), lit);
    }

    // To get rid of all but one literal of the conflict level, the partial resolvent is resolved
    // with the reasons of those literals, in reverse trail order.
    let mut index = ctx.part(TrailP).trail().len();
    let uip = loop {
        let p = loop {
            index -= 1;
            let p = ctx.part(TrailP).trail()[index];
            if ctx.part(AnalyzeConflictP).seen[p.index()] {
                break p;
            }
        };

        {
            let analyze = ctx.part_mut(AnalyzeConflictP);
            analyze.seen[p.index()] = false;
            analyze.current_level_count -= 1;
            if analyze.current_level_count == 0 {
                // p is the last conflict level literal, so the resulting clause asserts !p
                break p;
            }
        }

        let rcid = reason_clause(ctx.borrow(), p);
        bump_clause_activity(ctx.borrow(), rcid);

        {
            // clauses in the binary implication index keep their original literal order
            let lits = ctx.part_mut(ClauseDbP).clause_mut(rcid).lits_mut();
            if lits.len() == 2 && lits[0] != p {
                lits.swap(0, 1);
            }
            debug_assert_eq!(lits[0], p);
        }

        proof::add_resolution(ctx.borrow(), p, rcid);

        let reason_len = ctx.part(ClauseDbP).clause(rcid).lits().len();
        for k in 1..reason_len {
            let lit = ctx.part(ClauseDbP).clause(rcid).lits()[k];
            add_literal(ctx.borrow(), lit);
        }
    };

    ctx.part_mut(AnalyzeConflictP).clause[0] = !uip;

    if ctx.part(ProofP).is_active() {
        resolve_root_literals(ctx.borrow());
    } else {
        minimize_clause(ctx.borrow());
    }

    let (analyze, mut ctx) = ctx.split_part_mut(AnalyzeConflictP);
    let graph = ctx.part(ImplGraphP);

    // The highest level literal besides the asserting one moves into position 1, so that it
    // becomes the second watched literal and determines the backtrack level.
    let mut backtrack_to = 0;
    if analyze.clause.len() > 1 {
        let mut max_pos = 1;
        let mut max_level = graph.level(analyze.clause[1].var());
        for pos in 2..analyze.clause.len() {
            let level = graph.level(analyze.clause[pos].var());
            if level > max_level {
                max_level = level;
                max_pos = pos;
            }
        }
        analyze.clause.swap(1, max_pos);
        backtrack_to = max_level;
    }

    for var in analyze.to_clean.drain(..) {
        analyze.seen[var.index()] = false;
    }

    backtrack_to
}

/// Add a literal to the partial resolvent.
///
/// Bumps the literal's variable. Conflict level literals are only counted; the others are
/// appended to the clause buffer. With proofs off, literals implied by root level units are
/// skipped outright; with proofs on they are collected and later resolved away by
/// [`resolve_root_literals`], recording the resolution steps.
fn add_literal(
    mut ctx: partial!(
        Context,
        mut AnalyzeConflictP,
        mut VsidsP,
        ImplGraphP,
        ProofP,
        TrailP,
    ),
    lit: Lit,
) {
    let (analyze, mut ctx) = ctx.split_part_mut(AnalyzeConflictP);
    let level = ctx.part(ImplGraphP).level(lit.var());

    if analyze.seen[lit.index()] {
        return;
    }
    if level == 0 && !ctx.part(ProofP).is_active() {
        return;
    }

    analyze.seen[lit.index()] = true;
    analyze.to_clean.push(lit.var());
    ctx.part_mut(VsidsP).bump(lit.var());

    if level == ctx.part(TrailP).current_level() {
        analyze.current_level_count += 1;
    } else {
        analyze.clause.push(lit);
    }
}

/// The reason clause of a trail literal, forcing an explanation for lazy reasons.
pub(crate) fn reason_clause(
    mut ctx: partial!(
        Context,
        mut BinaryClausesP,
        mut ClauseDbP,
        mut HintsP,
        mut ImplGraphP,
        mut ProofP,
        mut WatchlistsP,
        AssignmentP,
        SolverConfigP,
        TrailP,
    ),
    lit: Lit,
) -> ClauseId {
    match ctx.part(ImplGraphP).reason(lit.var()) {
        Reason::Clause(rcid) => rcid,
        Reason::Lazy => {
            debug_assert!(ctx.part(AssignmentP).lit_is_true(lit));
            hints::explain_hint(ctx.borrow(), lit);
            match ctx.part(ImplGraphP).reason(lit.var()) {
                Reason::Clause(rcid) => rcid,
                _ => unreachable!(),
            }
        }
        Reason::Decision => panic!("tried to resolve on the decision {:?}", lit),
    }
}

/// Drop root level literals from the learned clause by resolving with their unit reasons.
fn resolve_root_literals(
    mut ctx: partial!(
        Context,
        mut AnalyzeConflictP,
        mut BinaryClausesP,
        mut ClauseDbP,
        mut HintsP,
        mut ImplGraphP,
        mut ProofP,
        mut WatchlistsP,
        AssignmentP,
        SolverConfigP,
        TrailP,
    ),
) {
    let mut write = 1;
    let mut read = 1;
    loop {
        let lit = {
            let analyze = ctx.part(AnalyzeConflictP);
            if read >= analyze.clause.len() {
                break;
            }
            analyze.clause[read]
        };
        read += 1;

        if ctx.part(ImplGraphP).level(lit.var()) == 0 {
            // the reason is indexed by the assigned (true) polarity
            let rcid = reason_clause(ctx.borrow(), !lit);
            proof::add_resolution(ctx.borrow(), lit, rcid);
        } else {
            let analyze = ctx.part_mut(AnalyzeConflictP);
            analyze.clause[write] = lit;
            write += 1;
        }
    }
    ctx.part_mut(AnalyzeConflictP).clause.truncate(write);
}

/// Performs restricted recursive clause minimization.
///
/// A context literal is removable when it is implied by other clause literals through its reason
/// chain. The search over the implication graph stops at decisions, lazy reasons and literals of
/// levels not present in the clause's level mask; any of those makes the literal required. The
/// seen bits double as the already-visited set: redundant searches leave their marks in place so
/// later searches stop early, while failed searches roll their marks back.
fn minimize_clause(mut ctx: partial!(Context, mut AnalyzeConflictP, ClauseDbP, ImplGraphP)) {
    let (analyze, mut ctx) = ctx.split_part_mut(AnalyzeConflictP);
    let (graph, mut ctx) = ctx.split_part(ImplGraphP);
    let db = ctx.part(ClauseDbP);

    let mut levels = LevelMask::default();
    for &lit in &analyze.clause[1..] {
        levels.add(graph.level(lit.var()));
    }

    let mut write = 1;
    for read in 1..analyze.clause.len() {
        let lit = analyze.clause[read];
        let required = match graph.reason(lit.var()) {
            Reason::Decision | Reason::Lazy => true,
            Reason::Clause(_) => analyze.lit_required(graph, db, lit, levels),
        };
        if required {
            analyze.clause[write] = lit;
            write += 1;
        }
    }
    analyze.clause.truncate(write);
}

impl AnalyzeConflict {
    /// Whether a clause literal survives minimization.
    fn lit_required(
        &mut self,
        graph: &ImplGraph,
        db: &ClauseDb,
        lit: Lit,
        levels: LevelMask,
    ) -> bool {
        let clean_top = self.to_clean.len();

        self.stack.clear();
        self.stack.push(lit);

        let mut index = 0;
        while index < self.stack.len() {
            let pending = self.stack[index];
            index += 1;

            if self.expand_required(graph, db, pending, levels) {
                // not redundant: roll back the marks of this search
                for var in self.to_clean.drain(clean_top..) {
                    self.seen[var.index()] = false;
                }
                return true;
            }
        }

        // redundant: the marks stay so later searches stop at these literals
        false
    }

    /// Examine one reason clause of the minimization search.
    ///
    /// Pushes the unseen antecedents; returns true when one of them blocks the search.
    fn expand_required(
        &mut self,
        graph: &ImplGraph,
        db: &ClauseDb,
        lit: Lit,
        levels: LevelMask,
    ) -> bool {
        let rcid = match graph.reason(lit.var()) {
            Reason::Clause(rcid) => rcid,
            _ => return true,
        };

        for &reason_lit in db.clause(rcid).lits() {
            if reason_lit.var() == lit.var() || self.seen[reason_lit.index()] {
                continue;
            }
            let level = graph.level(reason_lit.var());
            if level == 0 {
                // implied by root level units
                continue;
            }
            match graph.reason(reason_lit.var()) {
                Reason::Decision | Reason::Lazy => return true,
                Reason::Clause(_) => {}
            }
            if !levels.test(level) {
                return true;
            }

            self.seen[reason_lit.index()] = true;
            self.to_clean.push(reason_lit.var());
            self.stack.push(reason_lit);
        }

        false
    }
}
