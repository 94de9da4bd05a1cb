//! ratel is a CDCL based SAT solver library.
//!
//! Besides one shot solving, the solver supports incremental clause addition at any time, a
//! stepwise propagate/decide driving loop, externally propagated literals with lazily supplied
//! explanations ("hints") as used by SMT style embedders, minimal model extraction and optional
//! recording of resolution chains for unsatisfiability certificates.

mod analyze_conflict;
mod binary;
mod cdcl;
mod clause;
mod config;
mod context;
mod decision;
mod hints;
mod load;
mod model;
mod proof;
mod prop;
mod schedule;
mod simplify;
mod solver;
mod state;
mod tmp;

pub use crate::clause::ClauseId;
pub use crate::config::SolverConfig;
pub use crate::model::MinimalModelOptions;
pub use crate::solver::Solver;
pub use crate::state::Status;

pub use ratel_formula::{CnfFormula, Lit, Value, Var};
