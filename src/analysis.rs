//! The analysis session.
//!
//! [`Analysis`] is the single owner of everything the engine knows about one
//! translation unit: the location registry, the effect and store constraint
//! graphs, the deferred negative constraints, and the diagnostics found so
//! far. Every operation is a method on it; the other modules of the crate add
//! their operations through their own `impl` blocks.
//!
//! # Protocol
//!
//! ```text
//! Open ──check_nin()──▶ Closed ──compute_lins()──▶ Linearized
//! ```
//!
//! - While `Open`, the caller builds locations, effects and stores and adds
//!   constraints.
//! - [`check_nin`][Analysis::check_nin] solves the graph, closes store cells
//!   and checks the deferred negative constraints.
//! - [`compute_lins`][Analysis::compute_lins] computes linearities. Only then
//!   may qualifier and linearity queries be issued.
//!
//! # Examples
//!
//! ```
//! use flowqual::analysis::Analysis;
//! use flowqual::qual::QualLattice;
//! use flowqual::types::{EffKind, Location};
//!
//! struct Unit;
//! impl QualLattice for Unit {
//!     type QType = ();
//!     fn fresh(&self, _: &()) {}
//!     fn mkleq(&self, _: &(), _: &()) -> bool { true }
//! }
//!
//! let analysis = Analysis::new(Unit);
//! let loc = Location::new("main.c", 3);
//! let x = analysis.make_aloc("x", ());
//! let e = analysis.effect_var("body");
//! analysis.mkleq_effect(&loc, analysis.effect_wr(x), e);
//! analysis.mknin_aloc_effect(&loc, x, EffKind::Wr, e);
//! assert_eq!(analysis.check_nin().unwrap(), 1);
//! ```

use std::cell::{Cell, RefCell};
use std::collections::HashSet;
use std::fmt::Debug;
use std::rc::Rc;

use log::{debug, warn};

use crate::aloc::AlocTable;
use crate::cache::Cache;
use crate::config::Config;
use crate::effect::{EffectGraph, OpKey};
use crate::error::{Error, QualError};
use crate::linearity::LinTable;
use crate::nin::NinConstraint;
use crate::qual::QualLattice;
use crate::reference::{Aloc, Effect};
use crate::solver::Closure;
use crate::store::{CellState, StoreGraph};
use crate::types::{EffKind, Location, Phase};

/// A caller-installed receiver for qualifier errors.
pub type Sink = Box<dyn Fn(&QualError)>;

pub struct Analysis<L: QualLattice> {
    pub(crate) config: Config,
    pub(crate) lattice: L,
    pub(crate) phase: Cell<Phase>,
    pub(crate) alocs: RefCell<AlocTable<L::QType>>,
    pub(crate) effects: RefCell<EffectGraph>,
    pub(crate) op_cache: RefCell<Cache<OpKey, Effect>>,
    pub(crate) query_cache: RefCell<Cache<(u32, u32, u32), bool>>,
    pub(crate) nin: RefCell<Vec<NinConstraint>>,
    pub(crate) stores: RefCell<StoreGraph<L::QType>>,
    pub(crate) cells: RefCell<CellState<L::QType>>,
    pub(crate) lins: RefCell<LinTable>,
    pub(crate) closure: RefCell<Option<Rc<Closure>>>,
    /// Effect edges already reported as closed-target violations.
    pub(crate) reported_edges: RefCell<HashSet<usize>>,
    errors: RefCell<Vec<QualError>>,
    sink: RefCell<Option<Sink>>,
}

impl<L: QualLattice> Analysis<L> {
    pub fn new(lattice: L) -> Self {
        Self::with_config(lattice, Config::default())
    }

    pub fn with_config(lattice: L, config: Config) -> Self {
        let bits = config.cache_bits;
        Self {
            config,
            lattice,
            phase: Cell::new(Phase::Open),
            alocs: RefCell::new(AlocTable::new()),
            effects: RefCell::new(EffectGraph::new()),
            op_cache: RefCell::new(Cache::new(bits)),
            query_cache: RefCell::new(Cache::new(bits)),
            nin: RefCell::new(Vec::new()),
            stores: RefCell::new(StoreGraph::new()),
            cells: RefCell::new(CellState::new()),
            lins: RefCell::new(LinTable::default()),
            closure: RefCell::new(None),
            reported_edges: RefCell::new(HashSet::new()),
            errors: RefCell::new(Vec::new()),
            sink: RefCell::new(None),
        }
    }
}

impl<L: QualLattice> Debug for Analysis<L> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Analysis")
            .field("phase", &self.phase.get())
            .field("alocs", &self.alocs.borrow().len())
            .field("effects", &self.effects.borrow().len())
            .field("stores", &self.stores.borrow().len())
            .field("errors", &self.errors.borrow().len())
            .finish()
    }
}

impl<L: QualLattice> Analysis<L> {
    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn lattice(&self) -> &L {
        &self.lattice
    }

    pub fn phase(&self) -> Phase {
        self.phase.get()
    }

    /// Fails with [`Error::GraphOpen`] unless the graph has been closed.
    pub(crate) fn require_closed(&self) -> Result<(), Error> {
        match self.phase.get() {
            Phase::Open => Err(Error::GraphOpen),
            Phase::Closed | Phase::Linearized => Ok(()),
        }
    }

    /// Fails unless linearities have been computed.
    pub(crate) fn require_linearized(&self) -> Result<(), Error> {
        match self.phase.get() {
            Phase::Open => Err(Error::GraphOpen),
            Phase::Closed => Err(Error::LinearitiesPending),
            Phase::Linearized => Ok(()),
        }
    }

    /// Forget the solved closure after the graph grew.
    pub(crate) fn invalidate(&self) {
        if self.closure.borrow_mut().take().is_some() {
            debug!("graph changed after solving, dropping closure");
            self.query_cache.borrow_mut().clear();
            self.cells.borrow_mut().reset_visits();
        }
    }

    /// The solved closure of the current graph, recomputed if stale.
    pub(crate) fn closure(&self) -> Rc<Closure> {
        if let Some(closure) = self.closure.borrow().as_ref() {
            return Rc::clone(closure);
        }
        let closure = Rc::new(self.solve());
        *self.closure.borrow_mut() = Some(Rc::clone(&closure));
        self.rekey_cells();
        if self.phase.get() != Phase::Open {
            self.report_effect_violations(&closure);
        }
        closure
    }

    /// Install a receiver that sees every qualifier error as it is reported.
    pub fn set_sink(&self, sink: impl Fn(&QualError) + 'static) {
        *self.sink.borrow_mut() = Some(Box::new(sink));
    }

    /// Record a qualifier error. Processing always continues.
    pub(crate) fn report_qerror(&self, loc: &Location, message: String) {
        let error = QualError {
            loc: loc.clone(),
            message,
        };
        warn!("{}", error);
        if let Some(sink) = self.sink.borrow().as_ref() {
            sink(&error);
        }
        self.errors.borrow_mut().push(error);
    }

    /// Qualifier errors reported so far.
    pub fn errors(&self) -> Vec<QualError> {
        self.errors.borrow().clone()
    }

    pub fn error_count(&self) -> usize {
        self.errors.borrow().len()
    }

    pub fn take_errors(&self) -> Vec<QualError> {
        std::mem::take(&mut *self.errors.borrow_mut())
    }

    /// Record `left <= right` in the lattice, reporting a failure at `loc`.
    pub(crate) fn qual_leq(&self, loc: &Location, msg: &str, left: &L::QType, right: &L::QType) {
        debug!("qual_leq({:?} <= {:?})", left, right);
        if !self.lattice.mkleq(left, right) {
            self.report_qerror(loc, msg.to_string());
        }
    }

    pub(crate) fn effect_key_kind(kind: EffKind) -> u32 {
        match kind {
            EffKind::Any => 0,
            EffKind::Rwr => 1,
            EffKind::R => 2,
            EffKind::Wr => 3,
            EffKind::Alloc => 4,
            EffKind::Custom(k) => 5 + k as u32,
        }
    }

    /// Canonical index of a location.
    pub(crate) fn aloc_root(&self, al: Aloc) -> u32 {
        self.alocs.borrow().find(al.raw())
    }
}
