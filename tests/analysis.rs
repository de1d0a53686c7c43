//! End-to-end tests: constraint generation, finalization and queries.

mod common;

use std::cell::RefCell;
use std::rc::Rc;

use flowqual::analysis::Analysis;
use flowqual::config::Config;
use flowqual::error::Error;
use flowqual::types::{EffKind, Lin, Location, Phase};
use test_log::test;

use common::{QVar, Qual, Taint};

fn loc(line: u32) -> Location {
    Location::new("prog.c", line)
}

fn tainted(analysis: &Analysis<Taint>) -> QVar {
    analysis.lattice().constant(Qual::Tainted)
}

fn untainted(analysis: &Analysis<Taint>) -> QVar {
    analysis.lattice().constant(Qual::Untainted)
}

fn aloc(analysis: &Analysis<Taint>, name: &str) -> flowqual::reference::Aloc {
    let target = analysis.lattice().var(&format!("*{}", name));
    analysis.make_aloc(name, target)
}

// ─── Locations ─────────────────────────────────────────────────────────────────

#[test]
fn unified_locations_are_equal() {
    let analysis = Analysis::new(Taint::new());
    let a = aloc(&analysis, "a");
    let b = aloc(&analysis, "b");
    let c = aloc(&analysis, "c");
    assert!(!analysis.eq_aloc(a, b));

    analysis.unify_aloc(&loc(1), a, b);
    assert!(analysis.eq_aloc(a, b));
    assert_eq!(analysis.hash_aloc(a), analysis.hash_aloc(b));
    assert!(!analysis.eq_aloc(a, c));

    analysis.unify_aloc(&loc(2), c, b);
    assert!(analysis.eq_aloc(a, c));
    assert_eq!(analysis.hash_aloc(c), analysis.hash_aloc(a));
    assert_eq!(analysis.error_count(), 0);
}

#[test]
fn unifying_incompatible_targets_is_reported() {
    let analysis = Analysis::new(Taint::new());
    let a = analysis.make_aloc("a", tainted(&analysis));
    let b = analysis.make_aloc("b", untainted(&analysis));
    analysis.unify_aloc(&loc(7), a, b);
    let errors = analysis.errors();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].loc, loc(7));
}

// ─── Effects ───────────────────────────────────────────────────────────────────

#[test]
fn union_is_a_join() {
    let analysis = Analysis::new(Taint::new());
    let x = aloc(&analysis, "x");
    let y = aloc(&analysis, "y");
    let z = aloc(&analysis, "z");
    let e1 = analysis.effect_var("e1");
    let e2 = analysis.effect_var("e2");
    analysis.mkleq_effect(&loc(1), analysis.effect_wr(x), e1);
    analysis.mkleq_effect(&loc(2), analysis.effect_r(y), e2);
    let u = analysis.effect_union(e1, e2);
    analysis.check_nin().unwrap();

    assert_eq!(analysis.check_nin_aloc_effect(x, u), Ok(true));
    assert_eq!(analysis.check_nin_aloc_effect(y, u), Ok(true));
    assert_eq!(analysis.check_nin_aloc_effect(z, u), Ok(false));
    assert_eq!(analysis.check_nin_aloc_effect(y, e1), Ok(false));
}

#[test]
fn effects_are_included_in_their_unions() {
    let analysis = Analysis::new(Taint::new());
    let x = aloc(&analysis, "x");
    let y = aloc(&analysis, "y");
    let e1 = analysis.effect_var("e1");
    let e2 = analysis.effect_var("e2");
    analysis.mkleq_effect(&loc(1), analysis.effect_wr(x), e1);
    analysis.mkleq_effect(&loc(2), analysis.effect_r(y), e2);
    for (a, b) in [(e1, e2), (e2, e1)] {
        let u = analysis.effect_union(a, b);
        analysis.mkleq_effect(&loc(3), a, u);
        analysis.mkleq_effect(&loc(3), b, u);
    }

    // The same with variable-free effects, which are checked rather than grown.
    let r = analysis.effect_r(x);
    let wr = analysis.effect_wr(y);
    for (a, b) in [(r, wr), (wr, r)] {
        let u = analysis.effect_union(a, b);
        analysis.mkleq_effect(&loc(4), a, u);
        analysis.mkleq_effect(&loc(4), b, u);
    }
    assert_eq!(analysis.check_nin(), Ok(0));
    assert_eq!(analysis.error_count(), 0);
}

#[test]
fn rwr_counts_as_both_r_and_wr() {
    let analysis = Analysis::new(Taint::new());
    let x = aloc(&analysis, "x");
    let r = analysis.effect_r(x);
    let wr = analysis.effect_wr(x);
    let rwr = analysis.effect_rwr(x);

    // Intersections, both operand orders.
    for (a, b) in [(rwr, r), (r, rwr), (rwr, wr), (wr, rwr)] {
        let both = analysis.effect_inter(a, b);
        analysis.mknin_aloc_effect(&loc(1), x, EffKind::R, both);
    }
    // Subset checks into variable-free effects.
    analysis.mkleq_effect(&loc(2), rwr, analysis.effect_union(r, wr));
    analysis.mkleq_effect(&loc(2), analysis.effect_union(wr, r), rwr);
    analysis.mkleq_effect(&loc(2), r, rwr);
    analysis.mkleq_effect(&loc(3), rwr, wr);
    // Disjointness, both directions.
    let reads = analysis.effect_var("reads");
    let writes = analysis.effect_var("writes");
    analysis.mkleq_effect(&loc(4), r, reads);
    analysis.mkleq_effect(&loc(4), rwr, writes);
    analysis.mknin_effect(&loc(5), rwr, reads);
    analysis.mknin_effect(&loc(6), r, writes);

    // Two intersections keep `r(x)`, `rwr ≤ wr` fails, and both disjointness
    // constraints overlap.
    assert_eq!(analysis.check_nin(), Ok(5));
    let lines: Vec<u32> = analysis.errors().iter().map(|e| e.loc.line).collect();
    assert_eq!(lines, vec![3, 1, 1, 5, 6]);
}

#[test]
fn intersection_keeps_common_locations() {
    let analysis = Analysis::new(Taint::new());
    let x = aloc(&analysis, "x");
    let y = aloc(&analysis, "y");
    let e1 = analysis.effect_var("e1");
    let e2 = analysis.effect_var("e2");
    analysis.mkleq_effect(&loc(1), analysis.effect_union(analysis.effect_wr(x), analysis.effect_wr(y)), e1);
    analysis.mkleq_effect(&loc(2), analysis.effect_rwr(x), e2);
    let both = analysis.effect_inter(e1, e2);
    analysis.check_nin().unwrap();

    assert_eq!(analysis.check_nin_aloc_effect(x, both), Ok(true));
    assert_eq!(analysis.check_nin_aloc_effect(y, both), Ok(false));
}

#[test]
fn effects_flow_through_variable_chains() {
    let analysis = Analysis::new(Taint::new());
    let x = aloc(&analysis, "x");
    let a = analysis.effect_var("a");
    let b = analysis.effect_var("b");
    let c = analysis.effect_var("c");
    analysis.mkleq_effect(&loc(1), a, b);
    analysis.mkleq_effect(&loc(2), b, c);
    analysis.mkleq_effect(&loc(3), c, a);
    analysis.mkleq_effect(&loc(4), analysis.effect_alloc(x), b);
    analysis.mknin_aloc_effect(&loc(5), x, EffKind::Alloc, a);
    analysis.mknin_aloc_effect(&loc(6), x, EffKind::Wr, a);

    assert_eq!(analysis.check_nin(), Ok(1));
    assert_eq!(analysis.errors()[0].loc, loc(5));
}

// ─── Negative constraints ──────────────────────────────────────────────────────

#[test]
fn nin_violation_is_reported_once() {
    let analysis = Analysis::new(Taint::new());
    let x = aloc(&analysis, "x");
    let e = analysis.effect_var("e");
    analysis.mkleq_effect(&loc(10), analysis.effect_single(x), e);
    analysis.mknin_aloc_effect(&loc(11), x, EffKind::Any, e);

    assert_eq!(analysis.check_nin(), Ok(1));
    let errors = analysis.errors();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].loc, loc(11));
    assert!(errors[0].message.contains("`x`"), "{}", errors[0]);
}

#[test]
fn nin_without_subset_edge_holds() {
    let analysis = Analysis::new(Taint::new());
    let x = aloc(&analysis, "x");
    let e = analysis.effect_var("e");
    analysis.mknin_aloc_effect(&loc(11), x, EffKind::Any, e);
    assert_eq!(analysis.check_nin(), Ok(0));
    assert_eq!(analysis.error_count(), 0);
}

#[test]
fn nin_effect_checks_each_location() {
    let analysis = Analysis::new(Taint::new());
    let x = aloc(&analysis, "x");
    let y = aloc(&analysis, "y");
    let z = aloc(&analysis, "z");
    let e = analysis.effect_var("e");
    analysis.mkleq_effect(&loc(1), analysis.effect_wr(x), e);
    analysis.mkleq_effect(&loc(2), analysis.effect_wr(z), e);
    let footprint = analysis.effect_union(
        analysis.effect_union(analysis.effect_wr(x), analysis.effect_wr(y)),
        analysis.effect_wr(z),
    );
    analysis.mknin_effect(&loc(3), footprint, e);
    assert_eq!(analysis.check_nin(), Ok(2));
}

#[test]
fn errors_reach_the_sink() {
    let analysis = Analysis::new(Taint::new());
    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&seen);
    analysis.set_sink(move |error| sink.borrow_mut().push(error.to_string()));

    let x = aloc(&analysis, "x");
    let e = analysis.effect_var("e");
    analysis.mkleq_effect(&loc(1), analysis.effect_wr(x), e);
    analysis.mknin_aloc_effect(&loc(2), x, EffKind::Wr, e);
    analysis.check_nin().unwrap();

    assert_eq!(seen.borrow().len(), 1);
    assert!(seen.borrow()[0].starts_with("prog.c:2: "));
    assert_eq!(analysis.take_errors().len(), 1);
    assert_eq!(analysis.error_count(), 0);
}

// ─── Stores ────────────────────────────────────────────────────────────────────

#[test]
fn phases_are_enforced() {
    let analysis = Analysis::new(Taint::new());
    let x = aloc(&analysis, "x");
    let entry = analysis.make_store_var(&loc(1), "entry");
    let s = analysis.make_store_ref(&loc(1), entry, x);
    assert_eq!(analysis.phase(), Phase::Open);
    assert_eq!(analysis.qtype_from_store(s, x), Err(Error::GraphOpen));
    assert_eq!(analysis.compute_lins(), Err(Error::GraphOpen));

    analysis.check_nin().unwrap();
    assert_eq!(analysis.phase(), Phase::Closed);
    assert_eq!(analysis.qtype_from_store(s, x), Err(Error::LinearitiesPending));

    analysis.compute_lins().unwrap();
    assert_eq!(analysis.phase(), Phase::Linearized);
    assert!(analysis.qtype_from_store(s, x).unwrap().is_some());
    assert_eq!(analysis.qtype_from_store(entry, x), Ok(None));
}

#[test]
fn filter_is_idempotent() {
    let analysis = Analysis::new(Taint::new());
    let x = aloc(&analysis, "x");
    let y = aloc(&analysis, "y");
    let entry = analysis.make_store_var(&loc(1), "entry");
    let s = analysis.make_store_ref(&loc(1), entry, x);
    let s = analysis.make_store_ref(&loc(2), s, y);
    let e = analysis.effect_single(x);
    let once = analysis.make_store_filter(&loc(3), s, e);
    let twice = analysis.make_store_filter(&loc(3), once, e);
    analysis.check_nin().unwrap();
    analysis.compute_lins().unwrap();

    assert_eq!(analysis.store_domain(once), analysis.store_domain(twice));
    assert_eq!(analysis.store_domain(once), Ok(vec![x]));
    assert_eq!(analysis.qtype_from_store(once, x), analysis.qtype_from_store(twice, x));
    assert_eq!(analysis.qtype_from_store(twice, y), Ok(None));
}

#[test]
fn weak_update_keeps_the_old_value() {
    let analysis = Analysis::new(Taint::new());
    let x = aloc(&analysis, "x");
    let entry = analysis.make_store_var(&loc(1), "entry");
    let s1 = analysis.make_store_ref(&loc(1), entry, x);
    let s2 = analysis.make_store_assign(&loc(2), "x = input()", s1, x, tainted(&analysis), true);
    let v = analysis.lattice().var("v");
    let s3 = analysis.make_store_assign(&loc(3), "x = v", s2, x, v, false);

    analysis.check_nin().unwrap();
    analysis.compute_lins().unwrap();
    assert_eq!(analysis.qtype_from_store(s3, x), Ok(Some(v)));
    assert_eq!(analysis.lattice().value(v), Qual::Tainted);
}

#[test]
fn strong_update_discards_the_old_value() {
    let analysis = Analysis::new(Taint::new());
    let x = aloc(&analysis, "x");
    let entry = analysis.make_store_var(&loc(1), "entry");
    let s1 = analysis.make_store_ref(&loc(1), entry, x);
    let s2 = analysis.make_store_assign(&loc(2), "x = input()", s1, x, tainted(&analysis), true);
    let v = analysis.lattice().var("v");
    let s3 = analysis.make_store_assign(&loc(3), "x = v", s2, x, v, true);

    analysis.check_nin().unwrap();
    analysis.compute_lins().unwrap();
    assert_eq!(analysis.lin_from_store(s3, x), Ok(Lin::One));
    assert_eq!(analysis.qtype_from_store(s3, x), Ok(Some(v)));
    assert_eq!(analysis.lattice().value(v), Qual::Untainted);
}

#[test]
fn store_constraints_reach_the_lattice() {
    let analysis = Analysis::new(Taint::new());
    let x = aloc(&analysis, "x");
    let entry = analysis.make_store_var(&loc(1), "entry");
    let a = analysis.make_store_ref(&loc(1), entry, x);
    let a = analysis.make_store_assign(&loc(2), "x = input()", a, x, tainted(&analysis), true);
    let sink = analysis.make_store_var(&loc(3), "sink");
    let b = analysis.make_store_assign(&loc(3), "expect clean x", sink, x, untainted(&analysis), true);
    analysis.mkleq_store(&loc(4), "tainted x reaches a clean use", a, b);

    analysis.check_nin().unwrap();
    let errors = analysis.errors();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].loc, loc(4));
    assert_eq!(errors[0].message, "tainted x reaches a clean use");
}

#[test]
fn lub_joins_both_branches() {
    let analysis = Analysis::new(Taint::new());
    let x = aloc(&analysis, "x");
    let y = aloc(&analysis, "y");
    let entry = analysis.make_store_var(&loc(1), "entry");
    let then = analysis.make_store_ref(&loc(2), entry, x);
    let then = analysis.make_store_assign(&loc(2), "x = input()", then, x, tainted(&analysis), true);
    let other = analysis.make_store_ref(&loc(3), entry, y);
    let join = analysis.lub_store(&loc(4), "if", then, other);

    analysis.check_nin().unwrap();
    analysis.compute_lins().unwrap();
    assert_eq!(analysis.store_domain(join), Ok(vec![x, y]));
    let qx = analysis.qtype_from_store(join, x).unwrap().unwrap();
    assert_eq!(analysis.lattice().value(qx), Qual::Tainted);
}

// ─── Linearity ─────────────────────────────────────────────────────────────────

#[test]
fn allocation_on_one_branch_is_linear() {
    let analysis = Analysis::new(Taint::new());
    let x = aloc(&analysis, "x");
    let entry = analysis.make_store_var(&loc(1), "entry");
    let then = analysis.make_store_ref(&loc(2), entry, x);
    let then = analysis.make_store_assign(&loc(2), "x = input()", then, x, tainted(&analysis), true);
    let join = analysis.lub_store(&loc(3), "if", then, entry);
    let v = analysis.lattice().var("v");
    let after = analysis.make_store_assign(&loc(4), "x = v", join, x, v, true);

    analysis.check_nin().unwrap();
    analysis.compute_lins().unwrap();
    assert_eq!(analysis.lin_from_store(after, x), Ok(Lin::One));
    assert_eq!(analysis.lattice().value(v), Qual::Untainted);
}

#[test]
fn allocation_on_both_branches_is_omega() {
    let analysis = Analysis::new(Taint::new());
    let x = aloc(&analysis, "x");
    let entry = analysis.make_store_var(&loc(1), "entry");
    let then = analysis.make_store_ref(&loc(2), entry, x);
    let then = analysis.make_store_assign(&loc(2), "x = input()", then, x, tainted(&analysis), true);
    let other = analysis.make_store_ref(&loc(3), entry, x);
    let join = analysis.lub_store(&loc(4), "if", then, other);
    let v = analysis.lattice().var("v");
    let after = analysis.make_store_assign(&loc(5), "x = v", join, x, v, true);

    analysis.check_nin().unwrap();
    analysis.compute_lins().unwrap();
    assert_eq!(analysis.lin_from_store(after, x), Ok(Lin::Omega));
    // The strong update was demoted, so the tainted branch reaches v.
    assert_eq!(analysis.lattice().value(v), Qual::Tainted);
}

// ─── Overwrite ─────────────────────────────────────────────────────────────────

#[test]
fn overwrite_takes_each_location_from_one_side() {
    let analysis = Analysis::new(Taint::new());
    let x = aloc(&analysis, "x");
    let y = aloc(&analysis, "y");
    let (q1, q2, q3, q4) = (
        analysis.lattice().var("q1"),
        analysis.lattice().var("q2"),
        analysis.lattice().var("q3"),
        analysis.lattice().var("q4"),
    );
    let entry = analysis.make_store_var(&loc(1), "entry");
    let base = analysis.make_store_ref_effect(
        &loc(1),
        entry,
        analysis.effect_union(analysis.effect_alloc(x), analysis.effect_alloc(y)),
    );
    let s1 = analysis.make_store_assign(&loc(2), "x = q1", base, x, q1, true);
    let s1 = analysis.make_store_assign(&loc(2), "y = q2", s1, y, q2, true);
    let s2 = analysis.make_store_assign(&loc(3), "x = q3", base, x, q3, true);
    let s2 = analysis.make_store_assign(&loc(3), "y = q4", s2, y, q4, true);
    let e = analysis.effect_wr(x);
    let ow = analysis.make_store_ow(&loc(4), s1, s2, e);

    analysis.check_nin().unwrap();
    analysis.compute_lins().unwrap();
    assert_eq!(analysis.qtype_from_store(ow, x), analysis.qtype_from_store(s1, x));
    assert_eq!(analysis.qtype_from_store(ow, y), analysis.qtype_from_store(s2, y));
    assert_eq!(analysis.qtype_from_store(ow, x), Ok(Some(q1)));
    assert_eq!(analysis.qtype_from_store(ow, y), Ok(Some(q4)));
}

// ─── Interesting cells ─────────────────────────────────────────────────────────

fn tainted_flow(config: Config) -> (Analysis<Taint>, flowqual::reference::Aloc, flowqual::reference::Store) {
    let analysis = Analysis::with_config(Taint::new(), config);
    let x = aloc(&analysis, "x");
    let entry = analysis.make_store_var(&loc(1), "entry");
    let a = analysis.make_store_ref(&loc(1), entry, x);
    let a = analysis.make_store_assign(&loc(2), "x = input()", a, x, tainted(&analysis), true);
    let sink = analysis.make_store_var(&loc(3), "sink");
    let b = analysis.make_store_assign(&loc(3), "expect clean x", sink, x, untainted(&analysis), true);
    analysis.mkleq_store(&loc(4), "tainted x reaches a clean use", a, b);
    (analysis, x, b)
}

#[test]
fn uninteresting_cells_are_closed_on_demand() {
    let (analysis, x, b) = tainted_flow(Config::default().with_interesting_only(true));
    analysis.check_nin().unwrap();
    assert_eq!(analysis.error_count(), 0);

    analysis.compute_lins().unwrap();
    analysis.qtype_from_store(b, x).unwrap();
    assert_eq!(analysis.error_count(), 1);
}

#[test]
fn interesting_locations_are_closed_at_check() {
    let (analysis, x, _) = tainted_flow(Config::default().with_interesting_only(true));
    analysis.mark_aloc_interesting(x);
    analysis.check_nin().unwrap();
    assert_eq!(analysis.error_count(), 1);
}

#[test]
fn forward_propagation_closes_downstream_cells() {
    let analysis = Analysis::with_config(Taint::new(), Config::default().with_interesting_only(true));
    let x = aloc(&analysis, "x");
    let entry = analysis.make_store_var(&loc(1), "entry");
    let a = analysis.make_store_ref(&loc(1), entry, x);
    let a = analysis.make_store_assign(&loc(2), "x = input()", a, x, tainted(&analysis), true);
    let sink = analysis.make_store_var(&loc(3), "sink");
    let b = analysis.make_store_assign(&loc(3), "expect clean x", sink, x, untainted(&analysis), true);
    analysis.mkleq_store(&loc(4), "tainted x reaches a clean use", a, b);
    analysis.propagate_store_cell_forward(a, x);

    analysis.check_nin().unwrap();
    assert_eq!(analysis.error_count(), 1);
}

#[test]
fn unified_stores_share_cells() {
    let analysis = Analysis::new(Taint::new());
    let x = aloc(&analysis, "x");
    let entry = analysis.make_store_var(&loc(1), "entry");
    let a = analysis.make_store_var(&loc(2), "a");
    let b = analysis.make_store_var(&loc(2), "b");
    let s = analysis.make_store_ref(&loc(1), entry, x);
    let s = analysis.make_store_assign(&loc(1), "x = input()", s, x, tainted(&analysis), true);
    analysis.mkleq_store(&loc(2), "flow", s, a);
    analysis.unify_store(&loc(3), "unify", a, b);

    analysis.check_nin().unwrap();
    analysis.compute_lins().unwrap();
    let qa = analysis.qtype_from_store(a, x).unwrap();
    let qb = analysis.qtype_from_store(b, x).unwrap();
    assert_eq!(qa, qb);
    assert_eq!(analysis.lattice().value(qa.unwrap()), Qual::Tainted);
}
