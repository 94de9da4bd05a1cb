use proptest::{prelude::*, *};

use rand::distributions::Bernoulli;
use rand::seq::SliceRandom;

use crate::cnf::CnfFormula;
use crate::lit::Lit;

/// Generate small hard unsat instances.
///
/// Implementation of http://www.cs.qub.ac.uk/~i.spence/sgen/ but with random partitions
pub fn sgen_unsat_formula(
    blocks: impl Strategy<Value = usize>,
) -> impl Strategy<Value = CnfFormula> {
    blocks.prop_flat_map(|blocks| {
        collection::vec(bool::ANY, blocks * 4 + 1).prop_perturb(|polarity, mut rng| {
            let mut clauses: Vec<Vec<Lit>> = vec![];
            let mut lits = polarity
                .into_iter()
                .enumerate()
                .map(|(index, polarity)| Lit::from_index(index + 1, polarity))
                .collect::<Vec<_>>();

            for &invert in [false, true].iter() {
                lits.shuffle(&mut rng);
                for block in lits.chunks_exact(4) {
                    for a in 0..4 {
                        for b in 0..a {
                            for c in 0..b {
                                let mut clause =
                                    vec![block[a] ^ invert, block[b] ^ invert, block[c] ^ invert];
                                clause.shuffle(&mut rng);
                                clauses.push(clause);
                            }
                        }
                    }
                }
                let &lit_a = lits.last().unwrap();
                for b in 0..4 {
                    for c in 0..b {
                        let mut clause = vec![lit_a ^ invert, lits[b] ^ invert, lits[c] ^ invert];
                        clause.shuffle(&mut rng);
                        clauses.push(clause);
                    }
                }
            }

            clauses.shuffle(&mut rng);
            CnfFormula::from(clauses)
        })
    })
}

/// Generate a sat instance.
///
/// This generates a random full assignment and then only generates clauses compatible with that
/// assignment.
pub fn sat_formula(
    vars: impl Strategy<Value = usize>,
    clause_count: impl Strategy<Value = usize>,
    density: impl Strategy<Value = f64>,
    polarity_dist: impl Strategy<Value = f64>,
) -> impl Strategy<Value = CnfFormula> {
    (vars, clause_count, density, polarity_dist).prop_flat_map(
        |(vars, clause_count, density, polarity_dist)| {
            let density = Bernoulli::new(density).unwrap();
            let polarity_dist = Bernoulli::new(polarity_dist).unwrap();

            collection::vec(bool::ANY, vars).prop_perturb(move |polarity, mut rng| {
                let mut clauses: Vec<Vec<Lit>> = vec![];
                let lits = polarity
                    .into_iter()
                    .enumerate()
                    .map(|(index, polarity)| Lit::from_index(index + 1, polarity))
                    .collect::<Vec<_>>();

                for _ in 0..clause_count {
                    let &fixed_lit = lits.choose(&mut rng).unwrap();
                    let mut clause = vec![fixed_lit];
                    for &lit in lits.iter() {
                        if lit != fixed_lit && rng.sample(density) {
                            clause.push(lit ^ rng.sample(polarity_dist));
                        }
                    }
                    clause.shuffle(&mut rng);
                    clauses.push(clause);
                }

                clauses.shuffle(&mut rng);
                CnfFormula::from(clauses)
            })
        },
    )
}

/// Generate a random formula at a fixed clause/variable ratio.
///
/// Clauses are uniform random with the given width and no repeated variables.
pub fn random_formula(
    vars: usize,
    clause_width: usize,
    ratio: f64,
) -> impl Strategy<Value = CnfFormula> {
    let clause_count = (vars as f64 * ratio) as usize;
    collection::vec(bool::ANY, vars * clause_count).prop_perturb(move |polarity, mut rng| {
        let mut clauses: Vec<Vec<Lit>> = vec![];
        let mut selection: Vec<usize> = (1..vars + 1).collect();

        for c in 0..clause_count {
            selection.shuffle(&mut rng);
            let clause = selection[..clause_width.min(vars)]
                .iter()
                .map(|&index| Lit::from_index(index, polarity[c * vars + index - 1]))
                .collect();
            clauses.push(clause);
        }

        let mut formula = CnfFormula::from(clauses);
        formula.set_var_count(vars);
        formula
    })
}

/// The pigeon hole principle for `holes + 1` pigeons in `holes` holes, as CNF.
///
/// Unsatisfiable for every `holes >= 1`.
pub fn pigeon_hole_formula(holes: usize) -> CnfFormula {
    let pigeons = holes + 1;
    let var = |pigeon: usize, hole: usize| Lit::from_index(1 + pigeon * holes + hole, true);

    let mut formula = CnfFormula::new();

    // each pigeon sits in at least one hole
    for pigeon in 0..pigeons {
        let clause: Vec<Lit> = (0..holes).map(|hole| var(pigeon, hole)).collect();
        formula.add_clause(clause);
    }

    // no two pigeons share a hole
    for hole in 0..holes {
        for a in 0..pigeons {
            for b in 0..a {
                formula.add_clause([!var(a, hole), !var(b, hole)].iter().cloned());
            }
        }
    }

    formula
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pigeon_hole_shape() {
        let formula = pigeon_hole_formula(2);
        assert_eq!(formula.var_count(), 6);
        // 3 at-least-one clauses and 2 * 3 at-most-one clauses
        assert_eq!(formula.len(), 9);
    }
}
