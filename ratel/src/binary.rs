//! Binary clause implications.
use ratel_formula::Lit;

use crate::clause::ClauseId;

/// Direct implications of 2-literal clauses.
///
/// For a clause `a ∨ b` the index stores `(b, id)` under `¬a` and `(a, id)` under `¬b`: asserting
/// the key literal directly implies the stored consequent through the stored clause. Propagation
/// drains these implications ahead of the general watch walk.
///
/// This subsystem is optional (see `SolverConfig::binary_index`); the solver is complete without
/// it. Only direct implications are stored, the transitive closure is not materialized.
#[derive(Default)]
pub struct BinaryClauses {
    /// Implications per literal, indexed by literal code.
    by_lit: Vec<Vec<(Lit, ClauseId)>>,
    count: usize,
}

impl BinaryClauses {
    /// Update structures for a new variable count.
    pub fn set_var_count(&mut self, count: usize) {
        self.by_lit.resize(2 * (count + 1), vec![]);
    }

    /// Index a binary clause.
    pub fn add_binary_clause(&mut self, cid: ClauseId, lits: [Lit; 2]) {
        self.by_lit[(!lits[0]).code()].push((lits[1], cid));
        self.by_lit[(!lits[1]).code()].push((lits[0], cid));
        self.count += 1;
    }

    /// Direct consequences of asserting the given literal.
    pub fn implied(&self, lit: Lit) -> &[(Lit, ClauseId)] {
        &self.by_lit[lit.code()]
    }

    /// Number of indexed binary clauses.
    pub fn count(&self) -> usize {
        self.count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clause::ClauseId;
    use ratel_formula::{lit, lits};

    #[test]
    fn indexes_both_directions() {
        let mut binary = BinaryClauses::default();
        binary.set_var_count(3);

        let cid = ClauseId::from_index(1);
        binary.add_binary_clause(cid, lits![1, -3]);

        assert_eq!(binary.implied(lit!(-1)), &[(lit!(-3), cid)]);
        assert_eq!(binary.implied(lit!(3)), &[(lit!(1), cid)]);
        assert!(binary.implied(lit!(1)).is_empty());
        assert_eq!(binary.count(), 1);
    }
}
