//! Store model.
//!
//! A store maps locations to qualified types at one program point. Stores are
//! nodes of their own constraint graph: variables (bounded below by subset
//! edges) and operators built on top of other stores (`filter`, `ref`, `ow`,
//! `assign`).
//!
//! Only store *variables* own qualified types for their cells. An operator
//! node either binds its own location (`ref`, `assign`) or forwards the
//! lookup to the store it was built on, so a cell is resolved by walking down
//! the chain until a binding or a variable is reached.
//!
//! Qualifier constraints for cells are generated when a cell is *closed*:
//! every subset edge into a store on the cell's chain yields one `mkleq` in
//! the lattice, and the stores on the left of those edges are closed in turn.
//! By default every cell is closed when the graph is finalized. With
//! [`Config::interesting_only`][crate::config::Config], only cells of
//! interesting locations and explicitly propagated cells are, and the others
//! are closed when first queried.

use std::cell::Cell;
use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use log::{debug, info};

use crate::analysis::Analysis;
use crate::effect::EffectNode;
use crate::error::Error;
use crate::qual::QualLattice;
use crate::reference::{Aloc, Effect, Store};
use crate::solver::Closure;
use crate::types::{Location, Phase};

pub(crate) enum StoreNode<Q> {
    Var {
        name: String,
    },
    /// `base|effect`
    Filter { base: Store, effect: Effect },
    /// `base + {aloc : fresh}`
    Ref { base: Store, aloc: Aloc, fresh: Q },
    /// `s1|effect + s2|!effect`
    Ow {
        s1: Store,
        s2: Store,
        effect: Effect,
    },
    /// `(base - aloc) + {aloc : qtype}`
    Assign {
        base: Store,
        aloc: Aloc,
        qtype: Q,
        strong: bool,
        loc: Location,
        msg: Rc<str>,
    },
}

/// A subset edge `left <= right` with its provenance.
#[derive(Debug, Clone)]
pub(crate) struct StoreEdge {
    pub(crate) left: Store,
    pub(crate) right: Store,
    pub(crate) loc: Location,
    pub(crate) msg: Rc<str>,
}

pub(crate) struct StoreGraph<Q> {
    pub(crate) nodes: Vec<StoreNode<Q>>,
    parent: Vec<Cell<u32>>,
    pub(crate) edges: Vec<StoreEdge>,
}

impl<Q> StoreGraph<Q> {
    pub(crate) fn new() -> Self {
        Self {
            nodes: Vec::new(),
            parent: Vec::new(),
            edges: Vec::new(),
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.nodes.len()
    }

    fn add(&mut self, node: StoreNode<Q>) -> Store {
        let index = self.nodes.len() as u32;
        self.nodes.push(node);
        self.parent.push(Cell::new(index));
        Store::new(index)
    }

    pub(crate) fn find(&self, s: Store) -> Store {
        assert!(s.index() < self.nodes.len(), "Unknown store {}", s);
        let mut i = s.raw();
        loop {
            let parent = self.parent[i as usize].get();
            if parent == i {
                return Store::new(i);
            }
            let grandparent = self.parent[parent as usize].get();
            self.parent[i as usize].set(grandparent);
            i = grandparent;
        }
    }

    pub(crate) fn node(&self, s: Store) -> &StoreNode<Q> {
        &self.nodes[self.find(s).index()]
    }

    pub(crate) fn is_var(&self, s: Store) -> bool {
        matches!(self.node(s), StoreNode::Var { .. })
    }
}

/// Direction of an explicit cell propagation request.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub(crate) enum Direction {
    Forward,
    Backward,
}

pub(crate) struct CellState<Q> {
    /// Qualified types of store-variable cells, by `(store root, location root)`.
    pub(crate) var_cells: HashMap<(u32, u32), Q>,
    /// Cells already closed against the current closure.
    visited: HashSet<(u32, u32)>,
    /// `(edge, location)` pairs whose constraint went to the lattice.
    emitted: HashSet<(usize, u32)>,
    /// Assign stores whose weak-update constraint went to the lattice.
    weak_emitted: HashSet<u32>,
    /// Propagation requests made before the graph was closed.
    pending: Vec<(Store, Aloc, Direction)>,
}

impl<Q> CellState<Q> {
    pub(crate) fn new() -> Self {
        Self {
            var_cells: HashMap::new(),
            visited: HashSet::new(),
            emitted: HashSet::new(),
            weak_emitted: HashSet::new(),
            pending: Vec::new(),
        }
    }

    pub(crate) fn reset_visits(&mut self) {
        self.visited.clear();
    }

    pub(crate) fn closed_cells(&self) -> usize {
        self.visited.len()
    }
}

/// One step of a cell lookup.
enum Step<Q> {
    /// The cell is whatever it is in this store.
    Next(Store),
    Value(Q),
    /// The cell belongs to this store variable.
    Var(Store),
}

impl<L: QualLattice> Analysis<L> {
    /// Return `true` iff `s1` and `s2` are the same store.
    pub fn eq_store(&self, s1: Store, s2: Store) -> bool {
        let stores = self.stores.borrow();
        stores.find(s1) == stores.find(s2)
    }

    fn add_store(&self, node: StoreNode<L::QType>) -> Store {
        let s = self.stores.borrow_mut().add(node);
        self.invalidate();
        s
    }

    /// Make a fresh store variable.
    pub fn make_store_var(&self, loc: &Location, name: &str) -> Store {
        let s = self.add_store(StoreNode::Var {
            name: name.to_string(),
        });
        debug!("make_store_var({}, {}) -> {}", loc, name, s);
        s
    }

    /// Make the store `s|e`, `s` restricted to the locations of `e`.
    pub fn make_store_filter(&self, loc: &Location, s: Store, e: Effect) -> Store {
        let r = self.add_store(StoreNode::Filter { base: s, effect: e });
        debug!("make_store_filter({}, {}, {}) -> {}", loc, s, e, r);
        r
    }

    /// Make the store `ref(al, s) = s + {al : fresh}`.
    ///
    /// If `al` turns out to be bound in `s` already, the existing binding is kept.
    pub fn make_store_ref(&self, loc: &Location, s: Store, al: Aloc) -> Store {
        let fresh = self.lattice.fresh(&self.points_to_aloc(al));
        let r = self.add_store(StoreNode::Ref {
            base: s,
            aloc: al,
            fresh,
        });
        debug!("make_store_ref({}, {}, {}) -> {}", loc, s, al, r);
        r
    }

    /// Make `ref(al1, ref(al2, ..., ref(aln, s)))` for every location of `e`.
    ///
    /// # Panics
    ///
    /// Panics unless `e` is built from single-location effects and unions.
    pub fn make_store_ref_effect(&self, loc: &Location, s: Store, e: Effect) -> Store {
        let mut locations: Vec<Aloc> = Vec::new();
        {
            let effects = self.effects.borrow();
            let mut stack = vec![e];
            while let Some(e) = stack.pop() {
                match effects.node(e) {
                    EffectNode::Empty => {}
                    EffectNode::Atom { aloc, .. } => locations.push(*aloc),
                    EffectNode::Union(a, b) => {
                        stack.push(*b);
                        stack.push(*a);
                    }
                    EffectNode::Var { .. } | EffectNode::Inter(..) => {
                        panic!("make_store_ref_effect needs a union of single-location effects, got {}", e)
                    }
                }
            }
        }
        let mut result = s;
        let mut seen: Vec<Aloc> = Vec::new();
        for al in locations.into_iter().rev() {
            if seen.iter().any(|&other| self.eq_aloc(al, other)) {
                continue;
            }
            seen.push(al);
            result = self.make_store_ref(loc, result, al);
        }
        result
    }

    /// Make the store `ow(s1, s2, e) = s1|e + s2|!e`.
    pub fn make_store_ow(&self, loc: &Location, s1: Store, s2: Store, e: Effect) -> Store {
        let r = self.add_store(StoreNode::Ow { s1, s2, effect: e });
        debug!("make_store_ow({}, {}, {}, {}) -> {}", loc, s1, s2, e, r);
        r
    }

    /// Make the store `assign(s, al, qt) = (s - al) + {al : qt}`.
    ///
    /// Unless `strong` is set, `qt` must also account for what `al` held
    /// before: the constraint `s(al) <= qt` is added when the cell is closed.
    /// Strong updates are demoted to weak ones by
    /// [`compute_lins`][Analysis::compute_lins] if `al` turns out to be ω.
    pub fn make_store_assign(
        &self,
        loc: &Location,
        err_msg: &str,
        s: Store,
        al: Aloc,
        qt: L::QType,
        strong: bool,
    ) -> Store {
        let r = self.add_store(StoreNode::Assign {
            base: s,
            aloc: al,
            qtype: qt,
            strong,
            loc: loc.clone(),
            msg: Rc::from(err_msg),
        });
        debug!(
            "make_store_assign({}, {}, {}, strong = {}) -> {}",
            loc, s, al, strong, r
        );
        r
    }

    /// Add the constraint `left <= right`.
    pub fn mkleq_store(&self, loc: &Location, err_msg: &str, left: Store, right: Store) {
        debug!("mkleq_store({} <= {})", left, right);
        if self.eq_store(left, right) {
            return;
        }
        self.stores.borrow_mut().edges.push(StoreEdge {
            left,
            right,
            loc: loc.clone(),
            msg: Rc::from(err_msg),
        });
        self.invalidate();
    }

    /// Add the constraint `s1 = s2`, as two subset edges sharing one message.
    pub fn mkeq_store(&self, loc: &Location, err_msg: &str, s1: Store, s2: Store) {
        self.mkleq_store(loc, &format!("{} (left to right)", err_msg), s1, s2);
        self.mkleq_store(loc, &format!("{} (right to left)", err_msg), s2, s1);
    }

    /// Return a fresh store `s` such that `s1 <= s` and `s2 <= s`.
    ///
    /// The result is always a new variable, even when `s1` and `s2` are equal.
    pub fn lub_store(&self, loc: &Location, err_msg: &str, s1: Store, s2: Store) -> Store {
        let s = self.make_store_var(loc, "lub");
        self.mkleq_store(loc, err_msg, s1, s);
        if !self.eq_store(s1, s2) {
            self.mkleq_store(loc, err_msg, s2, s);
        }
        s
    }

    /// Make the store variables `s1` and `s2` indistinguishable.
    ///
    /// # Panics
    ///
    /// Panics if either argument is not a store variable.
    pub fn unify_store(&self, loc: &Location, err_msg: &str, s1: Store, s2: Store) {
        debug!("unify_store({}, {}) at {}: {}", s1, s2, loc, err_msg);
        let stores = self.stores.borrow();
        assert!(
            stores.is_var(s1) && stores.is_var(s2),
            "Only store variables can be unified"
        );
        let (r1, r2) = (stores.find(s1), stores.find(s2));
        if r1 == r2 {
            return;
        }
        stores.parent[r2.index()].set(r1.raw());
        drop(stores);
        self.invalidate();
    }

    /// Mark the `al` cell of `s` as interesting and close it together with
    /// every cell it flows into.
    pub fn propagate_store_cell_forward(&self, s: Store, al: Aloc) {
        self.propagate_store_cell(s, al, Direction::Forward);
    }

    /// Mark the `al` cell of `s` as interesting and close it together with
    /// every cell it is computed from.
    pub fn propagate_store_cell_backward(&self, s: Store, al: Aloc) {
        self.propagate_store_cell(s, al, Direction::Backward);
    }

    fn propagate_store_cell(&self, s: Store, al: Aloc, direction: Direction) {
        debug!("propagate_store_cell({}, {}, {:?})", s, al, direction);
        if self.phase.get() == Phase::Open {
            self.cells.borrow_mut().pending.push((s, al, direction));
            return;
        }
        let closure = self.closure();
        let seed = (self.stores.borrow().find(s).raw(), self.aloc_root(al));
        match direction {
            Direction::Backward => self.close_cells(&closure, vec![seed]),
            Direction::Forward => {
                let reached = self.reach_forward(&closure, seed);
                self.close_cells(&closure, reached);
            }
        }
    }

    /// The locations bound in `s`, as canonical handles.
    pub fn store_domain(&self, s: Store) -> Result<Vec<Aloc>, Error> {
        self.require_closed()?;
        let closure = self.closure();
        let root = self.stores.borrow().find(s);
        Ok(closure.domains[root.index()]
            .iter()
            .map(|&al| Aloc::new(al))
            .collect())
    }

    /// Return `al`'s qualified type in `s`, or `None` if `s` does not bind `al`.
    pub fn qtype_from_store(&self, s: Store, al: Aloc) -> Result<Option<L::QType>, Error> {
        self.require_linearized()?;
        let closure = self.closure();
        let seed = (self.stores.borrow().find(s).raw(), self.aloc_root(al));
        self.close_cells(&closure, vec![seed]);
        Ok(self.resolve_cell(&closure, Store::new(seed.0), seed.1))
    }

    fn step(&self, closure: &Closure, s: Store, al: u32) -> Option<Step<L::QType>> {
        let stores = self.stores.borrow();
        let root = stores.find(s);
        if !closure.in_domain(root, al) {
            return None;
        }
        let step = match &stores.nodes[root.index()] {
            StoreNode::Var { .. } => Step::Var(root),
            StoreNode::Filter { base, .. } => Step::Next(*base),
            StoreNode::Ref { base, aloc, fresh } => {
                if self.aloc_root(*aloc) != al || closure.in_domain(stores.find(*base), al) {
                    Step::Next(*base)
                } else {
                    Step::Value(fresh.clone())
                }
            }
            StoreNode::Assign {
                base, aloc, qtype, ..
            } => {
                if self.aloc_root(*aloc) == al {
                    Step::Value(qtype.clone())
                } else {
                    Step::Next(*base)
                }
            }
            StoreNode::Ow { s1, s2, effect } => {
                let e = self.effects.borrow().find(*effect);
                if closure.mentions(e, al) {
                    Step::Next(*s1)
                } else {
                    Step::Next(*s2)
                }
            }
        };
        Some(step)
    }

    /// The qualified type of the `al` cell of `s`, walking down to its binding.
    pub(crate) fn resolve_cell(&self, closure: &Closure, s: Store, al: u32) -> Option<L::QType> {
        let mut s = s;
        loop {
            match self.step(closure, s, al)? {
                Step::Next(next) => s = next,
                Step::Value(qt) => return Some(qt),
                Step::Var(root) => return Some(self.var_cell(root, al)),
            }
        }
    }

    fn var_cell(&self, root: Store, al: u32) -> L::QType {
        if let Some(qt) = self.cells.borrow().var_cells.get(&(root.raw(), al)) {
            return qt.clone();
        }
        let like = self.alocs.borrow().get(al).points_to.clone();
        let qt = self.lattice.fresh(&like);
        self.cells
            .borrow_mut()
            .var_cells
            .insert((root.raw(), al), qt.clone());
        qt
    }

    /// Close cells: emit the constraints of every edge into each cell's
    /// chain, then close the cells on the other side of those edges.
    pub(crate) fn close_cells(&self, closure: &Closure, seeds: Vec<(u32, u32)>) {
        let mut stack = seeds;
        while let Some((s, al)) = stack.pop() {
            let s = Store::new(s);
            if !closure.in_domain(s, al) {
                continue;
            }
            if !self.cells.borrow_mut().visited.insert((s.raw(), al)) {
                continue;
            }

            for &index in closure.edges_into.get(&s.raw()).into_iter().flatten() {
                let edge = self.stores.borrow().edges[index].clone();
                let left = self.stores.borrow().find(edge.left);
                if !closure.in_domain(left, al) {
                    continue;
                }
                if self.cells.borrow_mut().emitted.insert((index, al)) {
                    let lq = self.resolve_cell(closure, left, al);
                    let rq = self.resolve_cell(closure, s, al);
                    if let (Some(lq), Some(rq)) = (lq, rq) {
                        self.qual_leq(&edge.loc, &edge.msg, &lq, &rq);
                    }
                }
                stack.push((left.raw(), al));
            }

            if let Some(base) = self.weak_update_base(closure, s, al) {
                self.emit_weak_update(closure, s);
                stack.push((base.raw(), al));
                continue;
            }
            if let Some(Step::Next(next)) = self.step(closure, s, al) {
                let next = self.stores.borrow().find(next);
                stack.push((next.raw(), al));
            }
        }
    }

    /// The base of `s` if `s` is a weak assignment to `al` over a store binding `al`.
    fn weak_update_base(&self, closure: &Closure, s: Store, al: u32) -> Option<Store> {
        let stores = self.stores.borrow();
        match stores.node(s) {
            StoreNode::Assign {
                base,
                aloc,
                strong,
                ..
            } if self.aloc_root(*aloc) == al => {
                let base = stores.find(*base);
                let weak = !*strong || self.lins.borrow().is_demoted(s.raw());
                (weak && closure.in_domain(base, al)).then_some(base)
            }
            _ => None,
        }
    }

    /// Add `s(al) <= qt` for the assign store `s`, once.
    pub(crate) fn emit_weak_update(&self, closure: &Closure, s: Store) {
        if !self.cells.borrow_mut().weak_emitted.insert(s.raw()) {
            return;
        }
        let (base, al, qt, loc, msg) = match self.stores.borrow().node(s) {
            StoreNode::Assign {
                base,
                aloc,
                qtype,
                loc,
                msg,
                ..
            } => (*base, *aloc, qtype.clone(), loc.clone(), Rc::clone(msg)),
            _ => return,
        };
        let al = self.aloc_root(al);
        if let Some(old) = self.resolve_cell(closure, base, al) {
            debug!("weak update at {}: {:?} <= {:?}", s, old, qt);
            self.qual_leq(&loc, &msg, &old, &qt);
        }
    }

    /// Every cell the `(s, al)` cell flows into, `(s, al)` included.
    fn reach_forward(&self, closure: &Closure, seed: (u32, u32)) -> Vec<(u32, u32)> {
        let al = seed.1;
        let mut seen = HashSet::new();
        let mut stack = vec![seed.0];
        let mut reached = Vec::new();
        while let Some(s) = stack.pop() {
            if !seen.insert(s) {
                continue;
            }
            reached.push((s, al));
            let store = Store::new(s);
            for &index in closure.edges_from.get(&s).into_iter().flatten() {
                let right = {
                    let stores = self.stores.borrow();
                    stores.find(stores.edges[index].right)
                };
                if closure.in_domain(right, al) {
                    stack.push(right.raw());
                }
            }
            for &child in &closure.children[store.index()] {
                let child = Store::new(child);
                let flows = match self.step(closure, child, al) {
                    Some(Step::Next(next)) => self.eq_store(next, store),
                    _ => self.weak_update_base(closure, child, al) == Some(store),
                };
                if flows {
                    stack.push(child.raw());
                }
            }
        }
        reached
    }

    /// Close store cells when the graph is finalized.
    pub(crate) fn close_store_cells(&self) {
        let closure = self.closure();
        let mut seeds = Vec::new();
        {
            let alocs = self.alocs.borrow();
            for (s, domain) in closure.domains.iter().enumerate() {
                for &al in domain {
                    if !self.config.interesting_only || alocs.get(al).interesting {
                        seeds.push((s as u32, al));
                    }
                }
            }
        }
        let pending = std::mem::take(&mut self.cells.borrow_mut().pending);
        for (s, al, direction) in pending {
            let seed = (self.stores.borrow().find(s).raw(), self.aloc_root(al));
            match direction {
                Direction::Backward => seeds.push(seed),
                Direction::Forward => seeds.extend(self.reach_forward(&closure, seed)),
            }
        }
        let count = seeds.len();
        self.close_cells(&closure, seeds);
        info!(
            "closed store cells from {} seeds ({} cells closed)",
            count,
            self.cells.borrow().closed_cells()
        );
    }

    /// Re-key store-variable cells after unifications, equating cells that
    /// now denote the same `(store, location)`.
    pub(crate) fn rekey_cells(&self) {
        let old = std::mem::take(&mut self.cells.borrow_mut().var_cells);
        let mut rekeyed: HashMap<(u32, u32), L::QType> = HashMap::with_capacity(old.len());
        let mut clashes = Vec::new();
        {
            let stores = self.stores.borrow();
            let alocs = self.alocs.borrow();
            for ((s, al), qt) in old {
                let key = (stores.find(Store::new(s)).raw(), alocs.find(al));
                match rekeyed.entry(key) {
                    Entry::Occupied(entry) => clashes.push((entry.get().clone(), qt)),
                    Entry::Vacant(entry) => {
                        entry.insert(qt);
                    }
                }
            }
        }
        self.cells.borrow_mut().var_cells = rekeyed;
        for (kept, merged) in clashes {
            if !self.lattice.mkeq(&kept, &merged) {
                self.report_qerror(
                    &Location::internal(),
                    "incompatible cells in unified stores".to_string(),
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;
    use crate::test_utils::Unit;

    fn setup() -> (Analysis<Unit>, Location) {
        (Analysis::new(Unit), Location::new("t.c", 1))
    }

    #[test]
    fn test_lub_is_always_fresh() {
        let (analysis, loc) = setup();
        let s = analysis.make_store_var(&loc, "s");
        let join = analysis.lub_store(&loc, "join", s, s);
        assert!(!analysis.eq_store(join, s));
        assert_eq!(analysis.stores.borrow().edges.len(), 1);

        // Constraining the join must not reach back into `s`.
        let x = analysis.make_aloc("x", ());
        let below = analysis.make_store_ref(&loc, s, x);
        analysis.mkleq_store(&loc, "late", below, join);
        analysis.check_nin().unwrap();
        assert_eq!(analysis.store_domain(join), Ok(vec![x]));
        assert_eq!(analysis.store_domain(s), Ok(vec![]));
    }

    #[test]
    fn test_ref_effect_binds_each_location_once() {
        let (analysis, loc) = setup();
        let x = analysis.make_aloc("x", ());
        let y = analysis.make_aloc("y", ());
        let e = analysis.effect_union(analysis.effect_alloc(x), analysis.effect_alloc(y));
        let e = analysis.effect_union(e, analysis.effect_single(x));
        let entry = analysis.make_store_var(&loc, "entry");
        let s = analysis.make_store_ref_effect(&loc, entry, e);
        // entry plus one ref per distinct location
        assert_eq!(analysis.stores.borrow().len(), 3);

        analysis.check_nin().unwrap();
        assert_eq!(analysis.store_domain(s), Ok(vec![x, y]));
    }

    #[test]
    #[should_panic(expected = "make_store_ref_effect needs a union of single-location effects")]
    fn test_ref_effect_rejects_variables() {
        let (analysis, loc) = setup();
        let entry = analysis.make_store_var(&loc, "entry");
        let e = analysis.effect_var("e");
        analysis.make_store_ref_effect(&loc, entry, e);
    }

    #[test]
    fn test_unify_store() {
        let (analysis, loc) = setup();
        let x = analysis.make_aloc("x", ());
        let a = analysis.make_store_var(&loc, "a");
        let b = analysis.make_store_var(&loc, "b");
        let s = analysis.make_store_ref(&loc, a, x);
        analysis.mkleq_store(&loc, "flow", s, a);
        analysis.unify_store(&loc, "unify", a, b);
        assert!(analysis.eq_store(a, b));

        analysis.check_nin().unwrap();
        assert_eq!(analysis.store_domain(b), Ok(vec![x]));
    }

    #[test]
    #[should_panic(expected = "Only store variables can be unified")]
    fn test_unify_store_rejects_operators() {
        let (analysis, loc) = setup();
        let x = analysis.make_aloc("x", ());
        let a = analysis.make_store_var(&loc, "a");
        let s = analysis.make_store_ref(&loc, a, x);
        analysis.unify_store(&loc, "unify", a, s);
    }

    #[test]
    fn test_filter_domain() {
        let (analysis, loc) = setup();
        let x = analysis.make_aloc("x", ());
        let y = analysis.make_aloc("y", ());
        let entry = analysis.make_store_var(&loc, "entry");
        let s = analysis.make_store_ref(&loc, entry, x);
        let s = analysis.make_store_ref(&loc, s, y);
        let f = analysis.make_store_filter(&loc, s, analysis.effect_r(y));
        let g = analysis.make_store_filter(&loc, s, analysis.effect_alloc(y));

        assert_eq!(analysis.store_domain(f), Err(Error::GraphOpen));
        analysis.check_nin().unwrap();
        assert_eq!(analysis.store_domain(f), Ok(vec![y]));
        assert_eq!(analysis.store_domain(g), Ok(vec![]));
    }

    #[test]
    fn test_graph_growth_after_close() {
        let (analysis, loc) = setup();
        let x = analysis.make_aloc("x", ());
        let entry = analysis.make_store_var(&loc, "entry");
        analysis.check_nin().unwrap();
        assert_eq!(analysis.store_domain(entry), Ok(vec![]));

        let s = analysis.make_store_ref(&loc, entry, x);
        analysis.mkleq_store(&loc, "late", s, entry);
        assert_eq!(analysis.store_domain(entry), Ok(vec![x]));
    }
}
