//! Externally propagated literals with lazily supplied reasons.
//!
//! A hint asserts a literal on the trail with the [`Reason::Lazy`] sentinel instead of a clause.
//! When propagation or conflict analysis needs the reason (to emit root level proofs or to walk
//! the implication graph), the installed explainer is invoked. The explainer fills a buffer with
//! the explaining clause, which is then run through the lazy clause ingestion path; that path
//! checks the explanation contract and patches the variable's reason in place, so no backtracking
//! happens while analysis is in progress.
use partial_ref::{partial, PartialRef};

use ratel_formula::Lit;

use crate::context::{
    AssignmentP, BinaryClausesP, ClauseDbP, Context, HintsP, ImplGraphP, ProofP, SolverConfigP,
    TrailP, WatchlistsP,
};
use crate::load;
use crate::prop::{enqueue_assignment, Reason};

/// Callback producing the explanation of a hinted literal.
///
/// Receives the literal to explain and a buffer to fill with the literals of the explaining
/// clause. The buffer contract is checked by the lazy clause ingestion path: the hinted literal
/// must be contained and true, all other literals false, and no literal may be assigned above the
/// hinted literal's level.
pub type Explainer = Box<dyn FnMut(Lit, &mut Vec<Lit>)>;

/// Storage for the hint explainer.
#[derive(Default)]
pub struct Hints {
    explainer: Option<Explainer>,
    /// Buffer handed to the explainer.
    buffer: Vec<Lit>,
}

impl Hints {
    /// Install the explainer callback.
    pub fn set_explainer(&mut self, explainer: Explainer) {
        self.explainer = Some(explainer);
    }
}

/// Assert a hinted literal.
///
/// A hint that is already true is discarded. Hinting a false literal is a contract violation.
pub fn add_hint(
    mut ctx: partial!(Context, mut AssignmentP, mut ImplGraphP, mut TrailP),
    lit: Lit,
) {
    let value = ctx.part(AssignmentP).lit_value(lit);
    if value.is_true() {
        return;
    }
    if value.is_false() {
        panic!("hinted literal {:?} is false", lit);
    }

    enqueue_assignment(ctx.borrow(), lit, Reason::Lazy);
}

/// Request the explanation for a lazily propagated literal.
///
/// After this returns, the literal's reason is a real clause.
pub fn explain_hint(
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
    ),
    lit: Lit,
) {
    debug_assert_eq!(ctx.part(ImplGraphP).reason(lit.var()), Reason::Lazy);

    let (hints, mut ctx) = ctx.split_part_mut(HintsP);

    let explainer = match hints.explainer.as_mut() {
        Some(explainer) => explainer,
        None => panic!("lazy reason of {:?} requested but no explainer installed", lit),
    };

    hints.buffer.clear();
    explainer(lit, &mut hints.buffer);

    load::load_lazy_clause(ctx.borrow(), &mut hints.buffer);

    assert!(
        ctx.part(ImplGraphP).reason(lit.var()).clause().is_some(),
        "explanation did not cover the hinted literal {:?}",
        lit
    );
}
