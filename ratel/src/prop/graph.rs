//! The implication graph.
use ratel_formula::{LitIdx, Var};

use crate::clause::ClauseId;

/// Assignment that caused a propagation.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum Reason {
    /// A decision; also the stale entry of unassigned variables.
    Decision,
    /// An externally propagated literal whose explaining clause was not supplied yet.
    ///
    /// The explanation is requested from the hint explainer when the reason is first needed, after
    /// which the reason is patched to a real clause.
    Lazy,
    /// A propagating clause with the propagated literal in position 0.
    Clause(ClauseId),
}

impl Reason {
    pub fn is_decision(self) -> bool {
        self == Reason::Decision
    }

    pub fn is_lazy(self) -> bool {
        self == Reason::Lazy
    }

    /// The reason clause if one was supplied.
    pub fn clause(self) -> Option<ClauseId> {
        match self {
            Reason::Clause(cid) => Some(cid),
            _ => None,
        }
    }
}

impl Default for Reason {
    fn default() -> Reason {
        Reason::Decision
    }
}

/// Node and incoming edges of the implication graph.
#[derive(Copy, Clone, Default)]
pub struct ImplNode {
    pub reason: Reason,
    pub level: LitIdx,
}

/// The implication graph.
///
/// This is a DAG having all assigned variables as nodes. It has unit clauses, hints and decisions
/// as sources. For each propagated assignment it has incoming edges from the literals whose
/// assignment caused the propagation to happen.
#[derive(Default)]
pub struct ImplGraph {
    /// Contains only valid data for indices of assigned variables.
    nodes: Vec<ImplNode>,
}

impl ImplGraph {
    /// Update structures for a new variable count.
    pub fn set_var_count(&mut self, count: usize) {
        self.nodes.resize(count + 1, ImplNode::default());
    }

    /// Get the reason for an assigned variable.
    ///
    /// Returns stale data if the variable isn't assigned.
    pub fn reason(&self, var: Var) -> Reason {
        self.nodes[var.index()].reason
    }

    /// Get the decision level of an assigned variable.
    ///
    /// Returns stale data if the variable isn't assigned.
    pub fn level(&self, var: Var) -> usize {
        self.nodes[var.index()].level as usize
    }

    /// Record level and reason of a newly assigned variable.
    pub fn assign(&mut self, var: Var, level: usize, reason: Reason) {
        self.nodes[var.index()] = ImplNode {
            reason,
            level: level as LitIdx,
        };
    }

    /// Updates the reason for an assigned variable.
    ///
    /// Used to patch lazy reasons once their explanation arrives. The reason clause's literals
    /// must precede the variable on the trail.
    pub fn update_reason(&mut self, var: Var, reason: Reason) {
        self.nodes[var.index()].reason = reason
    }
}
