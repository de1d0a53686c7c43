//! # flowqual: flow-sensitive qualifier inference core
//!
//! **`flowqual`** is the constraint engine behind flow-sensitive type
//! qualifier inference for C-like programs with pointers. A front end walks
//! the program and calls into the engine to describe memory; the engine
//! solves the resulting constraints and pushes the qualifier-level
//! consequences into a caller-supplied qualifier lattice.
//!
//! ## Key Concepts
//!
//! - **Abstract locations** ([`Aloc`][crate::reference::Aloc]) stand for memory cells.
//!   Locations can be unified, after which they are the same location for good.
//! - **Effects** ([`Effect`][crate::reference::Effect]) are sets of
//!   `(kind, location)` pairs: which locations a piece of code reads, writes
//!   or allocates. Effect variables are solved by subset constraints.
//! - **Stores** ([`Store`][crate::reference::Store]) map locations to
//!   qualified types at one program point. Stores are threaded through
//!   statements with `ref`, `assign`, `filter` and `ow` operators and joined
//!   with subset constraints.
//! - **Linearity** ([`Lin`][crate::types::Lin]) tells whether a location
//!   denotes a single concrete cell at an assignment, which is what makes a
//!   strong update sound.
//!
//! ## Session Architecture
//!
//! All operations go through the [`Analysis`][crate::analysis::Analysis]
//! session, which owns every arena and is generic over the qualifier lattice
//! ([`QualLattice`][crate::qual::QualLattice]). Handles are small `Copy`
//! integers into the session's arenas. The session moves through three
//! phases: constraints are generated while it is open,
//! [`check_nin`][crate::analysis::Analysis::check_nin] closes it, and
//! [`compute_lins`][crate::analysis::Analysis::compute_lins] makes
//! linearity and qualifier queries available.
//!
//! ## Basic Usage
//!
//! ```rust
//! use flowqual::analysis::Analysis;
//! use flowqual::qual::QualLattice;
//! use flowqual::types::{Lin, Location};
//!
//! struct Unit;
//! impl QualLattice for Unit {
//!     type QType = ();
//!     fn fresh(&self, _: &()) {}
//!     fn mkleq(&self, _: &(), _: &()) -> bool { true }
//! }
//!
//! let analysis = Analysis::new(Unit);
//! let loc = Location::new("main.c", 10);
//!
//! // int *p = malloc(...); *p = 1;
//! let p = analysis.make_aloc("p", ());
//! let entry = analysis.make_store_var(&loc, "entry");
//! let allocated = analysis.make_store_ref(&loc, entry, p);
//! let assigned = analysis.make_store_assign(&loc, "*p = 1", allocated, p, (), true);
//!
//! analysis.check_nin().unwrap();
//! analysis.compute_lins().unwrap();
//! assert_eq!(analysis.lin_from_store(assigned, p).unwrap(), Lin::One);
//! assert!(analysis.qtype_from_store(assigned, p).unwrap().is_some());
//! ```
//!
//! ## Core Components
//!
//! - **[`analysis`]**: the session and its protocol.
//! - **[`effect`]**, **[`store`]**: the two constraint graphs.
//! - **[`solver`]**: saturation of effect membership and store domains.
//! - **[`nin`]**: deferred negative constraints.
//! - **[`linearity`]**: linearity analysis and strong-update gating.
//! - **[`dot`]**: Graphviz export of the store graph.

pub mod aloc;
pub mod analysis;
pub mod cache;
pub mod config;
pub mod dot;
pub mod effect;
pub mod error;
pub mod linearity;
pub mod nin;
pub mod print;
pub mod qual;
pub mod reference;
pub mod solver;
pub mod store;
pub mod types;
pub mod utils;

#[cfg(test)]
pub(crate) mod test_utils {
    use crate::qual::QualLattice;

    /// A lattice with a single qualified type, where every constraint holds.
    pub(crate) struct Unit;

    impl QualLattice for Unit {
        type QType = ();

        fn fresh(&self, _: &()) {}

        fn mkleq(&self, _: &(), _: &()) -> bool {
            true
        }
    }
}
