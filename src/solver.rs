//! Constraint solving.
//!
//! The graph only ever grows while constraints are generated, so nothing is
//! solved eagerly. [`Analysis::solve`] saturates the whole graph in two
//! worklist passes and returns a [`Closure`]:
//!
//! 1. effect membership: atoms seed their own pairs (`rwr` as both `r` and
//!    `wr`), unions and intersections combine their operands, and every node
//!    with variables absorbs its lower bounds;
//! 2. store domains: each store's bound locations follow from its operator
//!    and, for store variables, from the stores below it.
//!
//! Subset edges into effects without variables cannot grow them; they are
//! collected as checks and reported by [`check_nin`][Analysis::check_nin].

use std::collections::{BTreeSet, HashMap, VecDeque};

use log::{debug, info};

use crate::analysis::Analysis;
use crate::effect::EffectNode;
use crate::qual::QualLattice;
use crate::reference::{Effect, Store};
use crate::store::StoreNode;
use crate::types::EffKind;

/// A member of an effect: the root of a location and an access kind.
pub(crate) type Member = (u32, EffKind);

/// Solved view of the constraint graph at one point in time.
#[derive(Debug, Default)]
pub(crate) struct Closure {
    /// Members of each effect root.
    pub(crate) members: Vec<BTreeSet<Member>>,
    /// Subset edges into variable-free effects that do not hold.
    pub(crate) violations: Vec<usize>,
    /// Locations bound in each store root.
    pub(crate) domains: Vec<BTreeSet<u32>>,
    /// Store edge indices by the root of their right-hand side.
    pub(crate) edges_into: HashMap<u32, Vec<usize>>,
    /// Store edge indices by the root of their left-hand side.
    pub(crate) edges_from: HashMap<u32, Vec<usize>>,
    /// Stores built directly on top of each store root.
    pub(crate) children: Vec<Vec<u32>>,
}

impl Closure {
    /// Does effect root `e` contain `al` at a kind overlapping `kind`?
    pub(crate) fn has_member(&self, e: Effect, al: u32, kind: EffKind) -> bool {
        kinds_of(&self.members[e.index()], al).any(|k| k.overlaps(kind))
    }

    /// Is `al` bound by effect root `e` for store purposes (any non-alloc kind)?
    pub(crate) fn mentions(&self, e: Effect, al: u32) -> bool {
        self.has_member(e, al, EffKind::Any)
    }

    pub(crate) fn in_domain(&self, s: Store, al: u32) -> bool {
        self.domains[s.index()].contains(&al)
    }
}

/// Kinds at which `al` is a member of `set`.
fn kinds_of(set: &BTreeSet<Member>, al: u32) -> impl Iterator<Item = EffKind> + '_ {
    set.range((al, EffKind::Any)..)
        .take_while(move |(a, _)| *a == al)
        .map(|&(_, k)| k)
}

fn absorb<T: Ord + Copy>(sets: &mut [BTreeSet<T>], target: usize, source: usize) -> bool {
    if target == source {
        return false;
    }
    let mut set = std::mem::take(&mut sets[target]);
    let before = set.len();
    set.extend(sets[source].iter().copied());
    let changed = set.len() != before;
    sets[target] = set;
    changed
}

impl<L: QualLattice> Analysis<L> {
    pub(crate) fn solve(&self) -> Closure {
        let mut closure = Closure::default();
        self.solve_effects(&mut closure);
        self.solve_stores(&mut closure);
        closure
    }

    fn solve_effects(&self, closure: &mut Closure) {
        let effects = self.effects.borrow();
        let alocs = self.alocs.borrow();
        let n = effects.len();

        // Operands are always created before the node using them, so one
        // forward sweep settles which nodes are variable-free.
        let mut closed = vec![false; n];
        for i in 0..n {
            closed[i] = match &effects.nodes[i] {
                EffectNode::Empty | EffectNode::Atom { .. } => true,
                EffectNode::Var { .. } => false,
                EffectNode::Union(a, b) | EffectNode::Inter(a, b) => {
                    closed[effects.find(*a).index()] && closed[effects.find(*b).index()]
                }
            };
        }

        let mut members: Vec<BTreeSet<Member>> = vec![BTreeSet::new(); n];
        let mut lower: Vec<Vec<usize>> = vec![Vec::new(); n];
        let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); n];
        let is_root = |i: usize| effects.find(Effect::new(i as u32)).index() == i;

        for i in (0..n).filter(|&i| is_root(i)) {
            match &effects.nodes[i] {
                EffectNode::Atom { kind, aloc } => {
                    let al = alocs.find(aloc.raw());
                    members[i].extend(kind.parts().map(|k| (al, k)));
                }
                EffectNode::Union(a, b) | EffectNode::Inter(a, b) => {
                    dependents[effects.find(*a).index()].push(i);
                    dependents[effects.find(*b).index()].push(i);
                }
                EffectNode::Empty | EffectNode::Var { .. } => {}
            }
        }

        let mut checks = Vec::new();
        for (index, edge) in effects.edges.iter().enumerate() {
            let from = effects.find(edge.from).index();
            let to = effects.find(edge.to).index();
            if closed[to] {
                checks.push(index);
            } else {
                lower[to].push(from);
                dependents[from].push(to);
            }
        }

        let mut queue: VecDeque<usize> = (0..n).filter(|&i| is_root(i)).collect();
        let mut queued: Vec<bool> = (0..n).map(is_root).collect();
        let mut steps = 0usize;
        while let Some(i) = queue.pop_front() {
            queued[i] = false;
            steps += 1;
            let mut changed = false;
            match &effects.nodes[i] {
                EffectNode::Union(a, b) => {
                    changed |= absorb(&mut members, i, effects.find(*a).index());
                    changed |= absorb(&mut members, i, effects.find(*b).index());
                }
                EffectNode::Inter(a, b) => {
                    let (a, b) = (effects.find(*a).index(), effects.find(*b).index());
                    let other = &members[b];
                    let common: Vec<Member> = members[a]
                        .iter()
                        .flat_map(move |&(al, kind)| {
                            kinds_of(other, al).filter_map(move |k| kind.meet(k).map(|m| (al, m)))
                        })
                        .collect();
                    let before = members[i].len();
                    members[i].extend(common);
                    changed |= members[i].len() != before;
                }
                EffectNode::Empty | EffectNode::Atom { .. } | EffectNode::Var { .. } => {}
            }
            for &source in &lower[i] {
                changed |= absorb(&mut members, i, source);
            }
            if changed {
                for &d in &dependents[i] {
                    if !queued[d] {
                        queued[d] = true;
                        queue.push_back(d);
                    }
                }
            }
        }

        for index in checks {
            let edge = &effects.edges[index];
            let from = effects.find(edge.from).index();
            let to = effects.find(edge.to).index();
            let holds = members[from]
                .iter()
                .all(|&(al, kind)| kinds_of(&members[to], al).any(|k| k.overlaps(kind)));
            if !holds {
                closure.violations.push(index);
            }
        }

        info!(
            "solved {} effect nodes, {} edges in {} steps ({} closed-target violations)",
            n,
            effects.edges.len(),
            steps,
            closure.violations.len()
        );
        closure.members = members;
    }

    fn solve_stores(&self, closure: &mut Closure) {
        let stores = self.stores.borrow();
        let effects = self.effects.borrow();
        let alocs = self.alocs.borrow();
        let n = stores.len();
        let root = |s: Store| stores.find(s).index();
        let eff = |e: Effect| effects.find(e);

        let mut domains: Vec<BTreeSet<u32>> = vec![BTreeSet::new(); n];
        let mut lower: Vec<Vec<usize>> = vec![Vec::new(); n];
        let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); n];
        let mut children: Vec<Vec<u32>> = vec![Vec::new(); n];
        let is_root = |i: usize| root(Store::new(i as u32)) == i;

        for i in (0..n).filter(|&i| is_root(i)) {
            let mut add_child = |base: Store| {
                let base = root(base);
                dependents[base].push(i);
                children[base].push(i as u32);
            };
            match &stores.nodes[i] {
                StoreNode::Var { .. } => {}
                StoreNode::Filter { base, .. } => add_child(*base),
                StoreNode::Ref { base, aloc, .. } | StoreNode::Assign { base, aloc, .. } => {
                    add_child(*base);
                    domains[i].insert(alocs.find(aloc.raw()));
                }
                StoreNode::Ow { s1, s2, .. } => {
                    add_child(*s1);
                    if root(*s1) != root(*s2) {
                        add_child(*s2);
                    }
                }
            }
        }

        for (index, edge) in stores.edges.iter().enumerate() {
            let left = root(edge.left);
            let right = root(edge.right);
            closure
                .edges_into
                .entry(right as u32)
                .or_default()
                .push(index);
            closure
                .edges_from
                .entry(left as u32)
                .or_default()
                .push(index);
            if matches!(stores.nodes[right], StoreNode::Var { .. }) {
                lower[right].push(left);
                dependents[left].push(right);
            }
        }

        let mut queue: VecDeque<usize> = (0..n).filter(|&i| is_root(i)).collect();
        let mut queued: Vec<bool> = (0..n).map(is_root).collect();
        let mut steps = 0usize;
        while let Some(i) = queue.pop_front() {
            queued[i] = false;
            steps += 1;
            let mut changed = false;
            match &stores.nodes[i] {
                StoreNode::Var { .. } => {}
                StoreNode::Filter { base, effect } => {
                    let e = eff(*effect);
                    let kept: Vec<u32> = domains[root(*base)]
                        .iter()
                        .copied()
                        .filter(|&al| closure.mentions(e, al))
                        .collect();
                    let before = domains[i].len();
                    domains[i].extend(kept);
                    changed |= domains[i].len() != before;
                }
                StoreNode::Ref { base, .. } | StoreNode::Assign { base, .. } => {
                    changed |= absorb(&mut domains, i, root(*base));
                }
                StoreNode::Ow { s1, s2, effect } => {
                    let e = eff(*effect);
                    let mut next: Vec<u32> = domains[root(*s1)]
                        .iter()
                        .copied()
                        .filter(|&al| closure.mentions(e, al))
                        .collect();
                    next.extend(
                        domains[root(*s2)]
                            .iter()
                            .copied()
                            .filter(|&al| !closure.mentions(e, al)),
                    );
                    let before = domains[i].len();
                    domains[i].extend(next);
                    changed |= domains[i].len() != before;
                }
            }
            for &source in &lower[i] {
                changed |= absorb(&mut domains, i, source);
            }
            if changed {
                for &d in &dependents[i] {
                    if !queued[d] {
                        queued[d] = true;
                        queue.push_back(d);
                    }
                }
            }
        }

        debug!("store domains settled after {} steps", steps);
        info!(
            "solved {} store nodes, {} edges in {} steps",
            n,
            stores.edges.len(),
            steps
        );
        closure.domains = domains;
        closure.children = children;
    }
}
