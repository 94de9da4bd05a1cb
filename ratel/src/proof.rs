//! Resolution chain recording.
//!
//! When enabled, every derived clause (learned clauses, synthesized root level units, the empty
//! clause) gets a resolution chain: the id of the clause the derivation started from, followed by
//! the pivot literal and clause id of every resolution step. Before a chain is handed to the
//! consumer its shape is validated by replaying it with a per-variable state machine; an
//! inconsistent chain aborts the solver with a diagnostic.
//!
//! The consumer is external: chains can be passed to a callback and/or appended to a byte sink in
//! a LEB128 based binary format. The core does not retain chains.
use std::io::Write;

use partial_ref::{partial, PartialRef};
use thiserror::Error;

use ratel_formula::{Lit, Var};

use crate::clause::ClauseId;
use crate::context::{ClauseDbP, Context, ProofP};

/// Errors detected while validating a recorded resolution chain.
#[derive(Debug, Error)]
pub enum ChainError {
    #[error("variable {0} occurs with both polarities without being resolved")]
    Clash(Var),
    #[error("pivot variable {0} does not occur in the partial resolvent")]
    MissingPivot(Var),
    #[error("variable {0} is resolved more than once")]
    RepeatedResolution(Var),
    #[error("resolvent has {clause} literals but the chain produces {chain}")]
    LengthMismatch { clause: usize, chain: usize },
    #[error("literal {0} of the resolvent is not produced by the chain")]
    UnexpectedLiteral(Lit),
    #[error("the chain produces a literal of variable {0} that the resolvent lacks")]
    DroppedLiteral(Var),
}

/// Per-variable states of the chain validator.
const STATE_INIT: u8 = 0;
const STATE_POSITIVE: u8 = 1;
const STATE_NEGATIVE: u8 = 2;
const STATE_POSITIVE_RESOLVING: u8 = 3;
const STATE_NEGATIVE_RESOLVING: u8 = 4;
const STATE_RESOLVED: u8 = 5;

/// Callback receiving each validated chain as `(derived, antecedents, pivots)`.
pub type ProofSink = Box<dyn FnMut(ClauseId, &[ClauseId], &[Lit])>;

/// Resolution chain recorder.
#[derive(Default)]
pub struct Proof {
    enabled: bool,
    /// Antecedent clause ids of the open chain.
    chain_clauses: Vec<ClauseId>,
    /// Pivot literals; entry `i` resolves antecedent `i + 1` into the partial resolvent.
    chain_lits: Vec<Lit>,
    /// Saved outer chain while a nested chain is recorded.
    ///
    /// A nested chain arises when a lazy explanation has to be simplified (and thus derived)
    /// while the conflict chain is open. One level of nesting suffices.
    saved: Option<(Vec<ClauseId>, Vec<Lit>)>,
    /// Scratch states of the chain validator, indexed by variable.
    var_state: Vec<u8>,
    sink: Option<ProofSink>,
    writer: Option<Box<dyn Write>>,
}

impl Proof {
    /// Whether chains are being recorded.
    pub fn is_active(&self) -> bool {
        self.enabled
    }

    /// Start recording resolution chains.
    ///
    /// Must be called before the first clause is added: chains reference clauses by id, and with
    /// recording enabled deleted clause slots are never recycled.
    pub fn enable(&mut self) {
        self.enabled = true;
    }

    /// Install a callback receiving each validated chain.
    pub fn set_sink(&mut self, sink: ProofSink) {
        self.sink = Some(sink);
    }

    /// Append each validated chain to a byte sink.
    ///
    /// Chains are encoded as LEB128 integers: derived clause id, antecedent count, the antecedent
    /// ids and the literal codes of the pivots.
    pub fn set_writer(&mut self, writer: Box<dyn Write>) {
        self.writer = Some(writer);
    }

    /// Update structures for a new variable count.
    pub fn set_var_count(&mut self, count: usize) {
        self.var_state.resize(count + 1, STATE_INIT);
    }

    /// Feed one literal of an antecedent clause to the validator.
    ///
    /// Returns the change of the partial resolvent's size.
    fn update_lit(&mut self, lit: Lit) -> Result<isize, ChainError> {
        let state = &mut self.var_state[lit.index()];
        match *state {
            STATE_INIT => {
                *state = if lit.is_positive() {
                    STATE_POSITIVE
                } else {
                    STATE_NEGATIVE
                };
                Ok(1)
            }
            STATE_POSITIVE => {
                if lit.is_negative() {
                    return Err(ChainError::Clash(lit.var()));
                }
                Ok(0)
            }
            STATE_NEGATIVE => {
                if lit.is_positive() {
                    return Err(ChainError::Clash(lit.var()));
                }
                Ok(0)
            }
            STATE_POSITIVE_RESOLVING => {
                if lit.is_positive() {
                    return Err(ChainError::Clash(lit.var()));
                }
                *state = STATE_RESOLVED;
                Ok(-1)
            }
            STATE_NEGATIVE_RESOLVING => {
                if lit.is_negative() {
                    return Err(ChainError::Clash(lit.var()));
                }
                *state = STATE_RESOLVED;
                Ok(-1)
            }
            _ => Err(ChainError::RepeatedResolution(lit.var())),
        }
    }

    /// Mark the pivot of the next resolution step.
    fn resolve_lit(&mut self, lit: Lit) -> Result<(), ChainError> {
        let state = &mut self.var_state[lit.index()];
        match *state {
            STATE_INIT => Err(ChainError::MissingPivot(lit.var())),
            STATE_POSITIVE => {
                *state = STATE_POSITIVE_RESOLVING;
                Ok(())
            }
            STATE_NEGATIVE => {
                *state = STATE_NEGATIVE_RESOLVING;
                Ok(())
            }
            _ => Err(ChainError::RepeatedResolution(lit.var())),
        }
    }
}

/// Open a chain starting from the given clause.
pub fn begin_chain(mut ctx: partial!(Context, mut ProofP), cid: ClauseId) {
    let proof = ctx.part_mut(ProofP);
    if !proof.enabled {
        return;
    }
    if !proof.chain_clauses.is_empty() {
        // A nested derivation interrupted the open chain; save it and restore it on end_chain.
        assert!(proof.saved.is_none(), "proof chains nested too deep");
        proof.saved = Some((
            std::mem::take(&mut proof.chain_clauses),
            std::mem::take(&mut proof.chain_lits),
        ));
    }
    proof.chain_clauses.push(cid);
}

/// Record one resolution step: the partial resolvent is resolved with `cid` on `lit`'s variable.
pub fn add_resolution(mut ctx: partial!(Context, mut ProofP), lit: Lit, cid: ClauseId) {
    let proof = ctx.part_mut(ProofP);
    if !proof.enabled {
        return;
    }
    debug_assert!(!proof.chain_clauses.is_empty());
    proof.chain_lits.push(lit);
    proof.chain_clauses.push(cid);
}

/// Close the open chain as a derivation of `derived`, validate it and hand it to the consumer.
pub fn end_chain(mut ctx: partial!(Context, mut ProofP, ClauseDbP), derived: ClauseId) {
    let (proof, mut ctx) = ctx.split_part_mut(ProofP);
    if !proof.enabled {
        return;
    }

    if let Err(error) = check_chain(proof, ctx.borrow(), derived) {
        panic!("proof chain inconsistency deriving {:?}: {}", derived, error);
    }

    let Proof {
        chain_clauses,
        chain_lits,
        sink,
        writer,
        ..
    } = proof;

    if let Some(sink) = sink {
        sink(derived, chain_clauses, chain_lits);
    }

    if let Some(writer) = writer {
        write_chain(writer, derived, chain_clauses, chain_lits)
            .unwrap_or_else(|error| panic!("failed to write proof chain: {}", error));
    }

    proof.chain_clauses.clear();
    proof.chain_lits.clear();

    if let Some((clauses, lits)) = proof.saved.take() {
        proof.chain_clauses = clauses;
        proof.chain_lits = lits;
    }
}

/// Replay the chain with the per-variable state machine and compare the outcome with `derived`.
fn check_chain(
    proof: &mut Proof,
    ctx: partial!(Context, ClauseDbP),
    derived: ClauseId,
) -> Result<(), ChainError> {
    let db = ctx.part(ClauseDbP);

    let mut count: isize = 0;

    for step in 0..proof.chain_clauses.len() {
        let cid = proof.chain_clauses[step];
        for &lit in db.clause(cid).lits() {
            count += proof.update_lit(lit)?;
        }
        if step < proof.chain_lits.len() {
            let pivot = proof.chain_lits[step];
            proof.resolve_lit(pivot)?;
        }
    }

    let result_lits = db.clause(derived).lits();
    if result_lits.len() as isize != count {
        return Err(ChainError::LengthMismatch {
            clause: result_lits.len(),
            chain: count.max(0) as usize,
        });
    }

    for &lit in result_lits {
        let state = &mut proof.var_state[lit.index()];
        match *state {
            STATE_POSITIVE | STATE_NEGATIVE => *state = STATE_INIT,
            _ => return Err(ChainError::UnexpectedLiteral(lit)),
        }
    }

    let mut leftover = Ok(());
    for step in 0..proof.chain_clauses.len() {
        let cid = proof.chain_clauses[step];
        for &lit in db.clause(cid).lits() {
            let state = &mut proof.var_state[lit.index()];
            match *state {
                STATE_INIT | STATE_RESOLVED => *state = STATE_INIT,
                _ => {
                    *state = STATE_INIT;
                    if leftover.is_ok() {
                        leftover = Err(ChainError::DroppedLiteral(lit.var()));
                    }
                }
            }
        }
    }

    leftover
}

fn write_chain(
    writer: &mut Box<dyn Write>,
    derived: ClauseId,
    clauses: &[ClauseId],
    lits: &[Lit],
) -> std::io::Result<()> {
    leb128::write::unsigned(writer, derived.index() as u64)?;
    leb128::write::unsigned(writer, clauses.len() as u64)?;
    for &cid in clauses {
        leb128::write::unsigned(writer, cid.index() as u64)?;
    }
    for &lit in lits {
        leb128::write::unsigned(writer, lit.code() as u64)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use partial_ref::IntoPartialRefMut;
    use ratel_formula::{lit, lits};

    use crate::clause::db::add_clause;
    use crate::context::set_var_count;

    fn checked_context() -> Box<Context> {
        let mut ctx = Box::new(Context::default());
        {
            let mut ctx = ctx.into_partial_ref_mut();
            set_var_count(ctx.borrow(), 4);
            ctx.part_mut(ProofP).enable();
        }
        ctx
    }

    #[test]
    fn valid_chain_passes() {
        let mut ctx = checked_context();
        let mut ctx = ctx.into_partial_ref_mut();

        let a = add_clause(ctx.borrow(), &lits![1, 2], false, false, false);
        let b = add_clause(ctx.borrow(), &lits![-2, 3], false, false, false);
        let result = add_clause(ctx.borrow(), &lits![1, 3], false, false, false);

        begin_chain(ctx.borrow(), a);
        add_resolution(ctx.borrow(), lit!(2), b);
        end_chain(ctx.borrow(), result);
    }

    #[test]
    #[should_panic(expected = "proof chain inconsistency")]
    fn wrong_resolvent_aborts() {
        let mut ctx = checked_context();
        let mut ctx = ctx.into_partial_ref_mut();

        let a = add_clause(ctx.borrow(), &lits![1, 2], false, false, false);
        let b = add_clause(ctx.borrow(), &lits![-2, 3], false, false, false);
        let result = add_clause(ctx.borrow(), &lits![1, 4], false, false, false);

        begin_chain(ctx.borrow(), a);
        add_resolution(ctx.borrow(), lit!(2), b);
        end_chain(ctx.borrow(), result);
    }

    #[test]
    #[should_panic(expected = "proof chain inconsistency")]
    fn missing_pivot_aborts() {
        let mut ctx = checked_context();
        let mut ctx = ctx.into_partial_ref_mut();

        let a = add_clause(ctx.borrow(), &lits![1, 2], false, false, false);
        let b = add_clause(ctx.borrow(), &lits![-3, 4], false, false, false);
        let result = add_clause(ctx.borrow(), &lits![1, 2, 4], false, false, false);

        begin_chain(ctx.borrow(), a);
        add_resolution(ctx.borrow(), lit!(3), b);
        end_chain(ctx.borrow(), result);
    }

    #[test]
    fn chains_reach_the_sink() {
        use std::cell::RefCell;
        use std::rc::Rc;

        let seen = Rc::new(RefCell::new(vec![]));
        let seen_by_sink = seen.clone();

        let mut ctx = checked_context();
        let mut ctx = ctx.into_partial_ref_mut();

        ctx.part_mut(ProofP).set_sink(Box::new(move |derived, clauses, _| {
            seen_by_sink.borrow_mut().push((derived, clauses.len()));
        }));

        let a = add_clause(ctx.borrow(), &lits![1, 2], false, false, false);
        let b = add_clause(ctx.borrow(), &lits![-2, 3], false, false, false);
        let result = add_clause(ctx.borrow(), &lits![1, 3], false, false, false);

        begin_chain(ctx.borrow(), a);
        add_resolution(ctx.borrow(), lit!(2), b);
        end_chain(ctx.borrow(), result);

        assert_eq!(seen.borrow()[..], [(result, 2)]);
    }
}
