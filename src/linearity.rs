//! Linearity of locations at assign stores.
//!
//! A location is *linear* in a store when exactly one allocation of it (one
//! `ref` store) reaches the store along the store graph. Only then does the
//! location stand for a single concrete cell, and only then is a strong
//! update through it sound.
//!
//! [`compute_lins`][Analysis::compute_lins] runs a forward dataflow over the
//! closed store graph. Each store maps the locations it binds to the
//! allocations reaching it: none, one (with the `ref` store that made it), or
//! many. Two different allocations meeting at a join, or one allocation
//! reaching itself through a loop, make the location ω.

use std::collections::{HashMap, HashSet, VecDeque};

use log::{debug, info, warn};

use crate::analysis::Analysis;
use crate::error::Error;
use crate::qual::QualLattice;
use crate::reference::{Aloc, Store};
use crate::store::StoreNode;
use crate::types::{Lin, Phase};

/// Allocations of one location reaching one store.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
enum Writes {
    None,
    /// Exactly one, made by this `ref` store.
    One(u32),
    Many,
}

impl Writes {
    fn join(self, other: Writes) -> Writes {
        match (self, other) {
            (Writes::None, w) | (w, Writes::None) => w,
            (Writes::One(a), Writes::One(b)) if a == b => Writes::One(a),
            _ => Writes::Many,
        }
    }

    /// One more allocation, made by `site`.
    fn bump(self, site: u32) -> Writes {
        match self {
            Writes::None => Writes::One(site),
            Writes::One(_) | Writes::Many => Writes::Many,
        }
    }

    fn lin(self) -> Lin {
        match self {
            Writes::None => Lin::Zero,
            Writes::One(_) => Lin::One,
            Writes::Many => Lin::Omega,
        }
    }
}

type WriteMap = HashMap<u32, Writes>;

fn join_into(target: &mut WriteMap, source: &WriteMap) {
    for (&al, &w) in source {
        let entry = target.entry(al).or_insert(Writes::None);
        *entry = entry.join(w);
    }
}

/// Linearities computed by [`Analysis::compute_lins`].
#[derive(Debug, Default)]
pub(crate) struct LinTable {
    /// For each assign store root, the linearity of every location its base binds.
    by_assign: HashMap<u32, HashMap<u32, Lin>>,
    /// Strong assign stores that had to be turned into weak ones.
    demoted: HashSet<u32>,
}

impl LinTable {
    pub(crate) fn is_demoted(&self, s: u32) -> bool {
        self.demoted.contains(&s)
    }
}

impl<L: QualLattice> Analysis<L> {
    /// Compute the linearity of every location at every assign store.
    ///
    /// Strong assign stores whose location turns out to be ω are demoted: the
    /// weak-update constraint is added for them.
    pub fn compute_lins(&self) -> Result<(), Error> {
        match self.phase.get() {
            Phase::Open => return Err(Error::GraphOpen),
            Phase::Linearized => return Err(Error::AlreadyLinearized),
            Phase::Closed => {}
        }
        let closure = self.closure();
        let mut table = LinTable::default();
        let mut demote = Vec::new();
        {
            let stores = self.stores.borrow();
            let effects = self.effects.borrow();
            let n = stores.len();
            let root = |s: Store| stores.find(s).index();
            let is_root = |i: usize| root(Store::new(i as u32)) == i;

            let mut maps: Vec<WriteMap> = vec![WriteMap::new(); n];
            let mut queue: VecDeque<usize> = (0..n).filter(|&i| is_root(i)).collect();
            let mut queued: Vec<bool> = (0..n).map(is_root).collect();
            let mut steps = 0usize;

            while let Some(i) = queue.pop_front() {
                queued[i] = false;
                steps += 1;
                let mut next = WriteMap::new();
                match &stores.nodes[i] {
                    StoreNode::Var { .. } => {
                        for &index in closure.edges_into.get(&(i as u32)).into_iter().flatten() {
                            join_into(&mut next, &maps[root(stores.edges[index].left)]);
                        }
                    }
                    StoreNode::Filter { base, effect } => {
                        let e = effects.find(*effect);
                        next.extend(
                            maps[root(*base)]
                                .iter()
                                .filter(|&(&al, _)| closure.mentions(e, al)),
                        );
                    }
                    StoreNode::Ref { base, aloc, .. } => {
                        next = maps[root(*base)].clone();
                        let al = self.aloc_root(*aloc);
                        let entry = next.entry(al).or_insert(Writes::None);
                        *entry = entry.bump(i as u32);
                    }
                    StoreNode::Assign { base, .. } => next = maps[root(*base)].clone(),
                    StoreNode::Ow { s1, s2, effect } => {
                        let e = effects.find(*effect);
                        next.extend(
                            maps[root(*s1)]
                                .iter()
                                .filter(|&(&al, _)| closure.mentions(e, al)),
                        );
                        next.extend(
                            maps[root(*s2)]
                                .iter()
                                .filter(|&(&al, _)| !closure.mentions(e, al)),
                        );
                    }
                }
                join_into(&mut next, &maps[i]);
                if next == maps[i] {
                    continue;
                }
                maps[i] = next;

                let mut notify = |d: usize| {
                    if !queued[d] {
                        queued[d] = true;
                        queue.push_back(d);
                    }
                };
                for &child in &closure.children[i] {
                    notify(child as usize);
                }
                for &index in closure.edges_from.get(&(i as u32)).into_iter().flatten() {
                    let right = root(stores.edges[index].right);
                    if matches!(stores.nodes[right], StoreNode::Var { .. }) {
                        notify(right);
                    }
                }
            }

            for i in (0..n).filter(|&i| is_root(i)) {
                if let StoreNode::Assign {
                    base,
                    aloc,
                    strong,
                    ..
                } = &stores.nodes[i]
                {
                    let lins: HashMap<u32, Lin> = maps[root(*base)]
                        .iter()
                        .map(|(&al, &w)| (al, w.lin()))
                        .collect();
                    let al = self.aloc_root(*aloc);
                    let lin = lins.get(&al).copied().unwrap_or(Lin::Zero);
                    debug!("lin(s@{}, a@{}) = {}", i, al, lin);
                    if *strong && lin == Lin::Omega {
                        demote.push((Store::new(i as u32), root(*base) as u32, al));
                    }
                    table.by_assign.insert(i as u32, lins);
                }
            }
            info!(
                "computed linearities of {} assign stores in {} steps",
                table.by_assign.len(),
                steps
            );
        }

        table.demoted = demote.iter().map(|(s, _, _)| s.raw()).collect();
        *self.lins.borrow_mut() = table;
        self.phase.set(Phase::Linearized);

        for (s, base, al) in demote {
            warn!(
                "strong update of `{}` at {} demoted to weak: location is not linear",
                self.name_aloc(Aloc::new(al)),
                s
            );
            self.emit_weak_update(&closure, s);
            self.close_cells(&closure, vec![(base, al)]);
        }
        Ok(())
    }

    /// The linearity of `al` at the assign store `s`.
    pub fn lin_from_store(&self, s: Store, al: Aloc) -> Result<Lin, Error> {
        self.require_linearized()?;
        let root = self.stores.borrow().find(s);
        let lins = self.lins.borrow();
        let Some(map) = lins.by_assign.get(&root.raw()) else {
            return Err(Error::NotAssignStore(s));
        };
        Ok(map.get(&self.aloc_root(al)).copied().unwrap_or(Lin::Zero))
    }
}
