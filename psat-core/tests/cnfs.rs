//! End-to-end scenarios run through a single worker with no sharing fabric attached, covering the
//! literal inputs and expected outputs enumerated in §8.
use std::collections::HashSet;

use psat_core::worker::SharingEndpoint;
use psat_core::{SolverConfig, Worker};
use psat_dimacs::DimacsParser;
use psat_formula::Lit;

/// A sharing endpoint that never has anything to offer or import. Used to exercise the
/// single-worker search loop in isolation from `psat-share`.
struct NoSharing;

impl SharingEndpoint for NoSharing {
    fn export_unit(&mut self, _lit: Lit) {}
    fn export_clause(&mut self, _lits: &[Lit], _lbd: usize) {}
    fn import_units(&mut self, _into: &mut Vec<Lit>) {}
    fn import_clauses(&mut self, _into: &mut Vec<(Vec<Lit>, usize, usize)>) {}
    fn should_stop(&self) -> bool {
        false
    }
    fn sync_barrier(&mut self) {}
}

fn solve(dimacs: &str) -> (bool, Worker) {
    let formula = DimacsParser::parse(dimacs.as_bytes()).expect("parsing failed");
    let mut worker = Worker::new(0, SolverConfig::default(), 0);
    worker.set_var_count(formula.var_count());
    for clause in formula.iter() {
        worker.add_clause(clause);
    }
    let sat = worker.solve(&mut NoSharing).expect("search failed")
        == psat_core::worker::SolveResult::Sat;
    (sat, worker)
}

fn assert_model_satisfies(worker: &Worker, dimacs: &str) {
    let formula = DimacsParser::parse(dimacs.as_bytes()).expect("parsing failed");
    let model = worker.model();
    let true_lits: HashSet<Lit> = (0..model.len())
        .map(|i| psat_formula::Var::from_index(i).lit(model[i]))
        .collect();
    for clause in formula.iter() {
        assert!(
            clause.iter().any(|lit| true_lits.contains(lit)),
            "clause {:?} not satisfied by model {:?}",
            clause,
            model
        );
    }
}

#[test]
fn two_unit_clauses_conflict() {
    let (sat, _) = solve("p cnf 1 2\n1 0\n-1 0\n");
    assert!(!sat);
}

#[test]
fn single_clause_is_satisfiable() {
    let dimacs = "p cnf 2 1\n1 2 0\n";
    let (sat, worker) = solve(dimacs);
    assert!(sat);
    assert_model_satisfies(&worker, dimacs);
}

#[test]
fn three_variable_cycle_is_satisfiable() {
    let dimacs = "p cnf 3 3\n1 2 0\n-1 3 0\n-2 -3 0\n";
    let (sat, worker) = solve(dimacs);
    assert!(sat);
    assert_model_satisfies(&worker, dimacs);
}

#[test]
fn two_variable_formula_is_unsat() {
    let dimacs = "p cnf 3 4\n1 2 0\n-1 2 0\n1 -2 0\n-1 -2 0\n";
    let (sat, _) = solve(dimacs);
    assert!(!sat);
}

#[test]
fn empty_formula_is_satisfiable() {
    let (sat, worker) = solve("p cnf 0 0\n");
    assert!(sat);
    assert_eq!(worker.model().len(), 0);
}

#[test]
fn single_unit_clause_fixes_the_model() {
    let (sat, worker) = solve("p cnf 1 1\n-1 0\n");
    assert!(sat);
    assert_eq!(worker.model(), vec![false]);
}

/// A pigeonhole instance with 4 pigeons, 3 holes: every pigeon in some hole, no hole holding two
/// pigeons. Classic CDCL stress test; confirms conflicts and propagations actually occur.
#[test]
fn pigeonhole_4_into_3_is_unsat() {
    // variable for pigeon p in hole h: p * 3 + h + 1 (1-based pigeons/holes, p in 0..4, h in 0..3)
    let var = |p: usize, h: usize| (p * 3 + h + 1) as isize;
    let mut dimacs = String::from("p cnf 12 22\n");
    for p in 0..4 {
        for h in 0..3 {
            dimacs.push_str(&format!("{} ", var(p, h)));
        }
        dimacs.push_str("0\n");
    }
    for h in 0..3 {
        for p1 in 0..4 {
            for p2 in (p1 + 1)..4 {
                dimacs.push_str(&format!("-{} -{} 0\n", var(p1, h), var(p2, h)));
            }
        }
    }

    let (sat, worker) = solve(&dimacs);
    assert!(!sat);
    assert!(worker.stats().conflicts > 0);
    assert!(worker.stats().decisions > 0);
}

#[test]
fn implication_chain_with_final_negation_is_unsat() {
    // x1 -> x2 -> ... -> x200, plus x1 and -x200.
    let mut dimacs = String::from("p cnf 200 201\n");
    for i in 1..200 {
        dimacs.push_str(&format!("-{} {} 0\n", i, i + 1));
    }
    dimacs.push_str("1 0\n-200 0\n");

    let (sat, _) = solve(&dimacs);
    assert!(!sat);
}
