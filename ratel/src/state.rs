//! Miscellaneous solver state.

use crate::clause::ClauseId;

/// Satisfiability status of the solver.
///
/// The discriminant values are part of the external ABI.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
#[repr(u8)]
pub enum Status {
    Unsat = 0,
    Sat = 1,
    Undef = 2,
}

impl Default for Status {
    fn default() -> Status {
        // A solver without clauses is trivially satisfiable.
        Status::Sat
    }
}

/// Miscellaneous solver state.
///
/// Anything larger or any larger group of related state variables should be moved into a separate
/// part of [`Context`](crate::context::Context).
#[derive(Default)]
pub struct SolverState {
    pub status: Status,
    /// Id of the derived empty clause when proofs are recorded and the solver is unsatisfiable.
    pub empty_clause: Option<ClauseId>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes() {
        assert_eq!(Status::Unsat as u8, 0);
        assert_eq!(Status::Sat as u8, 1);
        assert_eq!(Status::Undef as u8, 2);
    }
}
