//! Effect algebra.
//!
//! An effect is a set of `(kind, location)` pairs. Effects are nodes of the
//! effect graph: concrete atoms, unions and intersections of other nodes, and
//! variables whose members are whatever the constraint graph forces into them.
//!
//! Atoms, unions and intersections are hash-consed through the session's
//! operation cache, so rebuilding the same expression usually yields the same
//! handle. Nothing here mutates membership; membership is only computed when
//! the graph is solved (see [`solver`][crate::solver]).

use std::cell::Cell;
use std::collections::BTreeSet;

use log::debug;

use crate::analysis::Analysis;
use crate::qual::QualLattice;
use crate::reference::{Aloc, Effect};
use crate::types::{EffKind, Location};
use crate::utils::{pairing3, MyHash};

#[derive(Debug, Clone, Eq, PartialEq)]
pub(crate) enum EffectNode {
    Empty,
    Atom { kind: EffKind, aloc: Aloc },
    Var { name: String },
    Union(Effect, Effect),
    Inter(Effect, Effect),
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub(crate) enum OpKey {
    Atom(u32, u32),
    Union(u32, u32),
    Inter(u32, u32),
}

impl MyHash for OpKey {
    fn hash(&self) -> u64 {
        match *self {
            OpKey::Atom(k, a) => pairing3(0, k as u64, a as u64),
            OpKey::Union(a, b) => pairing3(1, a as u64, b as u64),
            OpKey::Inter(a, b) => pairing3(2, a as u64, b as u64),
        }
    }
}

/// A subset edge `from <= to`.
#[derive(Debug, Clone)]
pub(crate) struct EffectEdge {
    pub(crate) from: Effect,
    pub(crate) to: Effect,
    pub(crate) loc: Location,
}

pub(crate) struct EffectGraph {
    pub(crate) nodes: Vec<EffectNode>,
    parent: Vec<Cell<u32>>,
    pub(crate) edges: Vec<EffectEdge>,
    pub(crate) interesting: Vec<bool>,
    fresh_count: usize,
}

impl EffectGraph {
    pub(crate) fn new() -> Self {
        let mut graph = Self {
            nodes: Vec::new(),
            parent: Vec::new(),
            edges: Vec::new(),
            interesting: Vec::new(),
            fresh_count: 0,
        };
        let empty = graph.add(EffectNode::Empty);
        assert_eq!(empty, Effect::EMPTY); // Make sure the empty effect is node 0.
        graph
    }

    pub(crate) fn len(&self) -> usize {
        self.nodes.len()
    }

    pub(crate) fn add(&mut self, node: EffectNode) -> Effect {
        let index = self.nodes.len() as u32;
        self.nodes.push(node);
        self.parent.push(Cell::new(index));
        self.interesting.push(false);
        Effect::new(index)
    }

    /// Representative of `e`. Only variables ever get a non-trivial parent.
    pub(crate) fn find(&self, e: Effect) -> Effect {
        assert!(e.index() < self.nodes.len(), "Unknown effect {}", e);
        let mut i = e.raw();
        loop {
            let parent = self.parent[i as usize].get();
            if parent == i {
                return Effect::new(i);
            }
            let grandparent = self.parent[parent as usize].get();
            self.parent[i as usize].set(grandparent);
            i = grandparent;
        }
    }

    pub(crate) fn node(&self, e: Effect) -> &EffectNode {
        &self.nodes[self.find(e).index()]
    }

    pub(crate) fn is_var(&self, e: Effect) -> bool {
        matches!(self.node(e), EffectNode::Var { .. })
    }

    pub(crate) fn link(&mut self, child: Effect, root: Effect) {
        self.parent[child.index()].set(root.raw());
        if self.interesting[child.index()] {
            self.interesting[root.index()] = true;
        }
    }

    pub(crate) fn next_fresh_name(&mut self) -> String {
        self.fresh_count += 1;
        format!("eff{}", self.fresh_count)
    }

    /// Does `e` mention any variable, directly or through its operands?
    pub(crate) fn has_vars(&self, e: Effect) -> bool {
        let mut stack = vec![e];
        while let Some(e) = stack.pop() {
            match self.node(e) {
                EffectNode::Var { .. } => return true,
                EffectNode::Union(a, b) | EffectNode::Inter(a, b) => {
                    stack.push(*a);
                    stack.push(*b);
                }
                EffectNode::Empty | EffectNode::Atom { .. } => {}
            }
        }
        false
    }

    /// Leaves of the union tree rooted at `e`, canonicalized by `aloc_root`.
    /// Empty leaves are dropped.
    pub(crate) fn union_leaves(
        &self,
        e: Effect,
        aloc_root: impl Fn(Aloc) -> u32,
    ) -> BTreeSet<Leaf> {
        let mut leaves = BTreeSet::new();
        let mut stack = vec![e];
        while let Some(e) = stack.pop() {
            let e = self.find(e);
            match self.node(e) {
                EffectNode::Empty => {}
                EffectNode::Atom { kind, aloc } => {
                    leaves.insert(Leaf::Atom(*kind, aloc_root(*aloc)));
                }
                EffectNode::Union(a, b) => {
                    stack.push(*a);
                    stack.push(*b);
                }
                EffectNode::Var { .. } | EffectNode::Inter(..) => {
                    leaves.insert(Leaf::Node(e.raw()));
                }
            }
        }
        leaves
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd)]
pub(crate) enum Leaf {
    Atom(EffKind, u32),
    Node(u32),
}

impl<L: QualLattice> Analysis<L> {
    /// The empty effect.
    pub fn effect_empty(&self) -> Effect {
        Effect::EMPTY
    }

    fn add_effect(&self, node: EffectNode) -> Effect {
        let e = self.effects.borrow_mut().add(node);
        self.invalidate();
        e
    }

    fn mk_atom(&self, al: Aloc, kind: EffKind) -> Effect {
        // Fail early on foreign handles.
        self.aloc_root(al);
        let key = OpKey::Atom(Self::effect_key_kind(kind), al.raw());
        if let Some(&e) = self.op_cache.borrow().get(&key) {
            return e;
        }
        let e = self.add_effect(EffectNode::Atom { kind, aloc: al });
        debug!("mk_atom({}, {}) -> {}", kind, al, e);
        self.op_cache.borrow_mut().insert(key, e);
        e
    }

    /// The effect `{al}`.
    pub fn effect_single(&self, al: Aloc) -> Effect {
        self.mk_atom(al, EffKind::Any)
    }

    /// The effect `alloc(al)`, which is different than `al` itself.
    pub fn effect_alloc(&self, al: Aloc) -> Effect {
        self.mk_atom(al, EffKind::Alloc)
    }

    pub fn effect_rwr(&self, al: Aloc) -> Effect {
        self.mk_atom(al, EffKind::Rwr)
    }

    pub fn effect_r(&self, al: Aloc) -> Effect {
        self.mk_atom(al, EffKind::R)
    }

    pub fn effect_wr(&self, al: Aloc) -> Effect {
        self.mk_atom(al, EffKind::Wr)
    }

    /// The effect `k(al)`.
    pub fn effect_constr(&self, al: Aloc, kind: EffKind) -> Effect {
        self.mk_atom(al, kind)
    }

    /// Create a fresh effect variable.
    pub fn effect_var(&self, name: &str) -> Effect {
        let e = self.add_effect(EffectNode::Var {
            name: name.to_string(),
        });
        debug!("effect_var({}) -> {}", name, e);
        e
    }

    /// Create a fresh effect variable with a generated name.
    pub fn effect_fresh(&self) -> Effect {
        let name = self.effects.borrow_mut().next_fresh_name();
        self.effect_var(&name)
    }

    /// The effect `e1 ∪ e2`.
    pub fn effect_union(&self, e1: Effect, e2: Effect) -> Effect {
        if e1.is_empty() {
            return e2;
        }
        if e2.is_empty() || self.eq_effect(e1, e2) {
            return e1;
        }
        // Unions commute: key on the ordered pair.
        let (a, b) = if e1 <= e2 { (e1, e2) } else { (e2, e1) };
        let key = OpKey::Union(a.raw(), b.raw());
        if let Some(&e) = self.op_cache.borrow().get(&key) {
            return e;
        }
        let e = self.add_effect(EffectNode::Union(a, b));
        debug!("effect_union({}, {}) -> {}", e1, e2, e);
        self.op_cache.borrow_mut().insert(key, e);
        e
    }

    /// The effect `e1 ∩ e2`.
    ///
    /// # Panics
    ///
    /// Panics if `e2` is the empty effect.
    pub fn effect_inter(&self, e1: Effect, e2: Effect) -> Effect {
        assert!(
            !e2.is_empty(),
            "The second operand of an effect intersection must not be empty"
        );
        if e1.is_empty() {
            return Effect::EMPTY;
        }
        if self.eq_effect(e1, e2) {
            return e1;
        }
        let key = OpKey::Inter(e1.raw(), e2.raw());
        if let Some(&e) = self.op_cache.borrow().get(&key) {
            return e;
        }
        let e = self.add_effect(EffectNode::Inter(e1, e2));
        debug!("effect_inter({}, {}) -> {}", e1, e2, e);
        self.op_cache.borrow_mut().insert(key, e);
        e
    }

    /// The location of a single-location effect (`{al}`, `r(al)`, ...).
    pub fn aloc_effect(&self, e: Effect) -> Option<Aloc> {
        match self.effects.borrow().node(e) {
            EffectNode::Atom { aloc, .. } => Some(*aloc),
            _ => None,
        }
    }

    /// Mark `e` as interesting: membership queries against it are memoized.
    pub fn mark_effect_interesting(&self, e: Effect) {
        let mut effects = self.effects.borrow_mut();
        let root = effects.find(e);
        effects.interesting[root.index()] = true;
    }

    /// Returns `true` only if `e1` and `e2` are certainly equal.
    ///
    /// `false` means "maybe not". Never generates a constraint.
    pub fn eq_effect(&self, e1: Effect, e2: Effect) -> bool {
        let effects = self.effects.borrow();
        let (r1, r2) = (effects.find(e1), effects.find(e2));
        if r1 == r2 {
            return true;
        }
        let alocs = self.alocs.borrow();
        let root = |al: Aloc| alocs.find(al.raw());
        effects.union_leaves(r1, &root) == effects.union_leaves(r2, &root)
    }

    /// Add the constraint `e1 ⊆ e2`.
    pub fn mkleq_effect(&self, loc: &Location, e1: Effect, e2: Effect) {
        debug!("mkleq_effect({} <= {})", e1, e2);
        if e1.is_empty() || self.eq_effect(e1, e2) {
            return;
        }
        let (left, right) = {
            let effects = self.effects.borrow();
            (effects.node(e1).clone(), effects.node(e2).clone())
        };
        // Split what can be split: constraints on atoms stay as precise as possible.
        if let EffectNode::Union(a, b) = left {
            self.mkleq_effect(loc, a, e2);
            self.mkleq_effect(loc, b, e2);
            return;
        }
        if let EffectNode::Inter(a, b) = right {
            self.mkleq_effect(loc, e1, a);
            self.mkleq_effect(loc, e1, b);
            return;
        }
        self.effects.borrow_mut().edges.push(EffectEdge {
            from: e1,
            to: e2,
            loc: loc.clone(),
        });
        self.invalidate();
    }

    /// Add the constraint `e1 = e2`, as two subset edges.
    pub fn mkeq_effect(&self, loc: &Location, e1: Effect, e2: Effect) {
        self.mkleq_effect(loc, e1, e2);
        self.mkleq_effect(loc, e2, e1);
    }

    /// Make the effect variables `e1` and `e2` indistinguishable.
    ///
    /// # Panics
    ///
    /// Panics if either argument is not an effect variable.
    pub fn unify_effect(&self, e1: Effect, e2: Effect) {
        debug!("unify_effect({}, {})", e1, e2);
        let mut effects = self.effects.borrow_mut();
        assert!(
            effects.is_var(e1) && effects.is_var(e2),
            "Only effect variables can be unified"
        );
        let (r1, r2) = (effects.find(e1), effects.find(e2));
        if r1 == r2 {
            return;
        }
        effects.link(r2, r1);
        drop(effects);
        self.invalidate();
    }
}
