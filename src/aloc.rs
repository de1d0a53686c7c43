//! Location registry: abstract locations and their union-find.
//!
//! Locations live in an arena and are addressed by [`Aloc`] handles. Each
//! record carries a parent index; unification links one root under the other
//! (by rank), and every query goes through `find` so that both former
//! identities behave as the surviving one.

use std::cell::Cell;

use log::debug;

use crate::analysis::Analysis;
use crate::qual::QualLattice;
use crate::reference::Aloc;
use crate::types::Location;

pub(crate) struct AlocData<Q> {
    pub(crate) name: String,
    pub(crate) points_to: Q,
    parent: Cell<u32>,
    rank: u8,
    pub(crate) interesting: bool,
}

pub(crate) struct AlocTable<Q> {
    data: Vec<AlocData<Q>>,
}

impl<Q> AlocTable<Q> {
    pub(crate) fn new() -> Self {
        Self { data: Vec::new() }
    }

    pub(crate) fn len(&self) -> usize {
        self.data.len()
    }

    pub(crate) fn add(&mut self, name: &str, points_to: Q) -> u32 {
        let index = self.data.len() as u32;
        self.data.push(AlocData {
            name: name.to_string(),
            points_to,
            parent: Cell::new(index),
            rank: 0,
            interesting: false,
        });
        index
    }

    /// Find the root of `index`, halving the path on the way.
    pub(crate) fn find(&self, index: u32) -> u32 {
        assert!(
            (index as usize) < self.data.len(),
            "Unknown abstract location {}",
            index
        );
        let mut i = index;
        loop {
            let parent = self.data[i as usize].parent.get();
            if parent == i {
                return i;
            }
            let grandparent = self.data[parent as usize].parent.get();
            self.data[i as usize].parent.set(grandparent);
            i = grandparent;
        }
    }

    /// Link the roots of `a` and `b`. Returns `(survivor, absorbed)`, or
    /// `None` if they were already the same class.
    pub(crate) fn union(&mut self, a: u32, b: u32) -> Option<(u32, u32)> {
        let ra = self.find(a);
        let rb = self.find(b);
        if ra == rb {
            return None;
        }
        let (root, child) = if self.data[ra as usize].rank >= self.data[rb as usize].rank {
            (ra, rb)
        } else {
            (rb, ra)
        };
        if self.data[root as usize].rank == self.data[child as usize].rank {
            self.data[root as usize].rank += 1;
        }
        self.data[child as usize].parent.set(root);
        if self.data[child as usize].interesting {
            self.data[root as usize].interesting = true;
        }
        Some((root, child))
    }

    pub(crate) fn get(&self, index: u32) -> &AlocData<Q> {
        &self.data[self.find(index) as usize]
    }

    /// Indices of all current roots.
    pub(crate) fn roots(&self) -> impl Iterator<Item = u32> + '_ {
        (0..self.data.len() as u32).filter(move |&i| self.find(i) == i)
    }
}

impl<L: QualLattice> Analysis<L> {
    /// Make a new, unique abstract location.
    pub fn make_aloc(&self, name: &str, points_to: L::QType) -> Aloc {
        let al = Aloc::new(self.alocs.borrow_mut().add(name, points_to));
        debug!("make_aloc(name = {}) -> {}", name, al);
        al
    }

    pub fn name_aloc(&self, al: Aloc) -> String {
        self.alocs.borrow().get(al.raw()).name.clone()
    }

    /// Hash of the location's class. Stable across unification: aliases hash alike.
    pub fn hash_aloc(&self, al: Aloc) -> u64 {
        self.aloc_root(al) as u64
    }

    /// The qualified type of the values `al` holds.
    pub fn points_to_aloc(&self, al: Aloc) -> L::QType {
        self.alocs.borrow().get(al.raw()).points_to.clone()
    }

    pub fn eq_aloc(&self, al1: Aloc, al2: Aloc) -> bool {
        let alocs = self.alocs.borrow();
        alocs.find(al1.raw()) == alocs.find(al2.raw())
    }

    /// Unify `al1` and `al2`: they become the same location for good.
    ///
    /// The types the two locations point to are equated through the lattice;
    /// a failure is reported at `loc`.
    pub fn unify_aloc(&self, loc: &Location, al1: Aloc, al2: Aloc) {
        debug!("unify_aloc({}, {})", al1, al2);
        let merged = self.alocs.borrow_mut().union(al1.raw(), al2.raw());
        let Some((root, child)) = merged else {
            return;
        };
        let (left, right) = {
            let alocs = self.alocs.borrow();
            (
                alocs.data[root as usize].points_to.clone(),
                alocs.data[child as usize].points_to.clone(),
            )
        };
        if !self.lattice.mkeq(&left, &right) {
            let message = format!(
                "incompatible types for unified locations `{}` and `{}`",
                self.name_aloc(al1),
                self.name_aloc(al2)
            );
            self.report_qerror(loc, message);
        }
        self.invalidate();
    }

    /// Mark `al` as interesting: its store cells are closed at finalization
    /// even when [`Config::interesting_only`][crate::config::Config] is set.
    pub fn mark_aloc_interesting(&self, al: Aloc) {
        let root = self.aloc_root(al);
        self.alocs.borrow_mut().data[root as usize].interesting = true;
    }

    pub fn is_aloc_interesting(&self, al: Aloc) -> bool {
        self.alocs.borrow().get(al.raw()).interesting
    }
}
