//! Minimal model extraction.
use partial_ref::{partial, PartialRef};

use ratel_formula::Lit;

use crate::clause::ClauseId;
use crate::context::{AssignmentP, ClauseDbP, Context, ImplGraphP, TrailP};

/// Options for [`minimal_model`].
#[derive(Copy, Clone, Default)]
pub struct MinimalModelOptions {
    /// Also attempt removal through conflict-origin clauses acting as reasons.
    pub use_tautologies: bool,
    /// Exclude propagated literals from removal candidacy.
    pub skip_propagated: bool,
}

/// Compress the current model to a subset that still satisfies every irredundant clause.
///
/// A literal can be dropped when each of its clauses stays satisfied by another literal. With
/// `use_tautologies`, literals whose reason is an externally supplied conflict clause are also
/// dropped when that clause mentions no previously dropped variable: the external reasoner
/// vouches for the clause being valid, so the remaining literals recover the dropped one.
///
/// Must only be called while the trail is a model, i.e. the status is `Sat`.
pub fn minimal_model(
    mut ctx: partial!(Context, AssignmentP, ClauseDbP, ImplGraphP, TrailP),
    options: MinimalModelOptions,
) -> Vec<Lit> {
    let (assignment, mut ctx) = ctx.split_part(AssignmentP);
    let (db, mut ctx) = ctx.split_part(ClauseDbP);
    let (graph, mut ctx) = ctx.split_part(ImplGraphP);
    let trail = ctx.part(TrailP).trail();

    let var_count = assignment.var_count();
    let highest = db.highest_id_index();

    // For each literal the irredundant clauses containing it, for each clause the number of
    // literals currently satisfying it.
    let mut clauses_by_lit: Vec<Vec<ClauseId>> = vec![vec![]; 2 * (var_count + 1)];
    let mut satisfied_count = vec![0u32; highest + 1];

    for index in 1..highest + 1 {
        let cid = ClauseId::from_index(index);
        let clause = db.clause(cid);
        let header = clause.header();
        if header.learnt() || header.deleted() {
            continue;
        }
        for &lit in clause.lits() {
            clauses_by_lit[lit.code()].push(cid);
            if assignment.lit_is_true(lit) {
                satisfied_count[cid.index()] += 1;
            }
        }
    }

    let mut dropped = vec![false; var_count + 1];

    // A literal all of whose clauses are multiply satisfied can be dropped.
    'candidates: for &lit in trail {
        if options.skip_propagated && !graph.reason(lit.var()).is_decision() {
            continue;
        }
        for &cid in &clauses_by_lit[lit.code()] {
            debug_assert!(satisfied_count[cid.index()] > 0);
            if satisfied_count[cid.index()] == 1 {
                continue 'candidates;
            }
        }
        dropped[lit.index()] = true;
        for &cid in &clauses_by_lit[lit.code()] {
            satisfied_count[cid.index()] -= 1;
        }
    }

    let mut dropped_by_reason = vec![false; var_count + 1];

    if options.use_tautologies {
        'reasons: for &lit in trail.iter().rev() {
            let rcid = match graph.reason(lit.var()).clause() {
                Some(rcid) => rcid,
                None => continue,
            };
            let clause = db.clause(rcid);
            if !clause.header().conflict() {
                continue;
            }
            for &reason_lit in clause.lits() {
                if dropped[reason_lit.index()] {
                    continue 'reasons;
                }
            }
            dropped_by_reason[lit.index()] = true;
        }
    }

    trail
        .iter()
        .cloned()
        .filter(|lit| !dropped[lit.index()] && !dropped_by_reason[lit.index()])
        .collect()
}
