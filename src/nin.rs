//! Negative constraints.
//!
//! A negative constraint `k(al) ∉ e` asserts that a location is *not* in an
//! effect. It cannot be decided while the graph is still growing, so it is
//! recorded and evaluated by [`check_nin`][Analysis::check_nin] against the
//! closed graph. A constraint is *violated* when the location is provably in
//! the effect's closure; every violation becomes a qualifier error at the
//! location the constraint was made at, and checking always carries on.

use log::{debug, info};

use crate::analysis::Analysis;
use crate::error::Error;
use crate::qual::QualLattice;
use crate::reference::{Aloc, Effect};
use crate::solver::Closure;
use crate::types::{EffKind, Location, Phase};

#[derive(Debug, Clone)]
pub(crate) enum NinConstraint {
    /// `kind(aloc) ∉ effect`
    Aloc {
        loc: Location,
        aloc: Aloc,
        kind: EffKind,
        effect: Effect,
    },
    /// `e1 ∩ e2 = ∅`, with `e1` free of variables.
    Effect { loc: Location, e1: Effect, e2: Effect },
    /// `∀ρ. kind(ρ) ∉ effect`
    Forall {
        loc: Location,
        kind: EffKind,
        effect: Effect,
    },
    /// `∀ρ. kind1(ρ) ∈ e1 ⇒ kind2(ρ) ∉ e2`
    ForallIn {
        loc: Location,
        kind1: EffKind,
        e1: Effect,
        kind2: EffKind,
        e2: Effect,
    },
}

impl<L: QualLattice> Analysis<L> {
    fn add_nin(&self, constraint: NinConstraint) {
        debug!("add_nin({:?})", constraint);
        if self.phase.get() == Phase::Open {
            self.nin.borrow_mut().push(constraint);
        } else {
            // Late constraints are checked right away against the current graph.
            let closure = self.closure();
            self.check_one(&closure, &constraint);
        }
    }

    /// Remember the constraint `kind(al) ∉ e`.
    pub fn mknin_aloc_effect(&self, loc: &Location, al: Aloc, kind: EffKind, e: Effect) {
        self.add_nin(NinConstraint::Aloc {
            loc: loc.clone(),
            aloc: al,
            kind,
            effect: e,
        });
    }

    /// Remember the constraint that no member of `e1` is in `e2`.
    ///
    /// # Panics
    ///
    /// Panics if `e1` contains an effect variable.
    pub fn mknin_effect(&self, loc: &Location, e1: Effect, e2: Effect) {
        assert!(
            !self.effects.borrow().has_vars(e1),
            "The left side of a negative effect constraint must not contain variables"
        );
        self.add_nin(NinConstraint::Effect {
            loc: loc.clone(),
            e1,
            e2,
        });
    }

    /// Remember `∀ρ. kind(ρ) ∉ e`.
    pub fn forall_aloc_mknin_effect(&self, loc: &Location, kind: EffKind, e: Effect) {
        self.add_nin(NinConstraint::Forall {
            loc: loc.clone(),
            kind,
            effect: e,
        });
    }

    /// Remember `∀ρ such that kind1(ρ) ∈ e1. kind2(ρ) ∉ e2`.
    pub fn forall_aloc_in_effect_mknin_effect(
        &self,
        loc: &Location,
        kind1: EffKind,
        e1: Effect,
        kind2: EffKind,
        e2: Effect,
    ) {
        self.add_nin(NinConstraint::ForallIn {
            loc: loc.clone(),
            kind1,
            e1,
            kind2,
            e2,
        });
    }

    /// Is `kind(al) ∈ e` in the closure? Memoized for interesting effects.
    fn is_member(&self, closure: &Closure, al: u32, kind: EffKind, e: Effect) -> bool {
        let (e, interesting) = {
            let effects = self.effects.borrow();
            let root = effects.find(e);
            (root, effects.interesting[root.index()])
        };
        if !interesting {
            return closure.has_member(e, al, kind);
        }
        let key = (al, Self::effect_key_kind(kind), e.raw());
        if let Some(&hit) = self.query_cache.borrow().get(&key) {
            return hit;
        }
        let result = closure.has_member(e, al, kind);
        self.query_cache.borrow_mut().insert(key, result);
        result
    }

    /// Test whether the constraint `al ∉ e` is satisfiable.
    ///
    /// Returns `true` if it is *unsatisfiable*, i.e. some access to `al` is
    /// provably in `e`.
    pub fn check_nin_aloc_effect(&self, al: Aloc, e: Effect) -> Result<bool, Error> {
        self.require_closed()?;
        let closure = self.closure();
        Ok(self.is_member(&closure, self.aloc_root(al), EffKind::Any, e))
    }

    /// Check one constraint, reporting every violation. Returns how many were found.
    fn check_one(&self, closure: &Closure, constraint: &NinConstraint) -> usize {
        let mut failures = 0;
        match constraint {
            NinConstraint::Aloc {
                loc,
                aloc,
                kind,
                effect,
            } => {
                if self.is_member(closure, self.aloc_root(*aloc), *kind, *effect) {
                    self.report_nin(loc, *kind, *aloc, "is in the effect");
                    failures += 1;
                }
            }
            NinConstraint::Effect { loc, e1, e2 } => {
                let e1 = self.effects.borrow().find(*e1);
                let mut last = None;
                for &(al, kind) in &closure.members[e1.index()] {
                    if last == Some(al) {
                        continue;
                    }
                    if self.is_member(closure, al, kind, *e2) {
                        // One report per location, even when several kinds overlap.
                        last = Some(al);
                        self.report_nin(loc, kind, Aloc::new(al), "is in both effects");
                        failures += 1;
                    }
                }
            }
            NinConstraint::Forall { loc, kind, effect } => {
                let roots: Vec<u32> = self.alocs.borrow().roots().collect();
                for al in roots {
                    if self.is_member(closure, al, *kind, *effect) {
                        self.report_nin(loc, *kind, Aloc::new(al), "is in the effect");
                        failures += 1;
                    }
                }
            }
            NinConstraint::ForallIn {
                loc,
                kind1,
                e1,
                kind2,
                e2,
            } => {
                let e1 = self.effects.borrow().find(*e1);
                let mut candidates: Vec<u32> = closure.members[e1.index()]
                    .iter()
                    .filter(|(_, k)| k.overlaps(*kind1))
                    .map(|&(al, _)| al)
                    .collect();
                candidates.dedup();
                for al in candidates {
                    if self.is_member(closure, al, *kind2, *e2) {
                        self.report_nin(loc, *kind2, Aloc::new(al), "is in the effect");
                        failures += 1;
                    }
                }
            }
        }
        failures
    }

    fn report_nin(&self, loc: &Location, kind: EffKind, al: Aloc, what: &str) {
        let message = format!(
            "{}(`{}`) {} but must not be",
            kind,
            self.name_aloc(al),
            what
        );
        self.report_qerror(loc, message);
    }

    /// Report subset edges into variable-free effects that do not hold.
    ///
    /// Each edge is reported at most once per session, so edges added after
    /// the graph was closed are reported when the closure is next rebuilt.
    pub(crate) fn report_effect_violations(&self, closure: &Closure) -> usize {
        let mut failures = 0;
        for &index in &closure.violations {
            if !self.reported_edges.borrow_mut().insert(index) {
                continue;
            }
            let edge = self.effects.borrow().edges[index].clone();
            let message = format!(
                "effect {} is not included in {}",
                self.print_effect_string(edge.from),
                self.print_effect_string(edge.to)
            );
            self.report_qerror(&edge.loc, message);
            failures += 1;
        }
        failures
    }

    /// Close the graph and check every remembered negative constraint.
    ///
    /// Subset constraints into variable-free effects that do not hold are
    /// reported here too. Store cells are closed afterwards, so qualifier
    /// errors from store constraints also surface during this call. Returns
    /// the number of effect violations found.
    pub fn check_nin(&self) -> Result<usize, Error> {
        if self.phase.get() != Phase::Open {
            return Err(Error::AlreadyChecked);
        }
        let closure = self.closure();
        let mut failures = self.report_effect_violations(&closure);

        let constraints = std::mem::take(&mut *self.nin.borrow_mut());
        for constraint in &constraints {
            failures += self.check_one(&closure, constraint);
        }

        self.phase.set(Phase::Closed);
        self.close_store_cells();
        info!(
            "checked {} negative constraints: {} violations",
            constraints.len(),
            failures
        );
        Ok(failures)
    }
}
