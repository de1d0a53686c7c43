//! The boundary to the qualifier lattice.
//!
//! The engine stores qualified types at store cells and location targets but
//! never looks inside them. Everything it needs from the lattice goes through
//! [`QualLattice`].

use std::fmt::Debug;

pub trait QualLattice {
    type QType: Clone + Debug;

    /// A fresh qualified type with the same shape as `like`, related to
    /// nothing yet.
    fn fresh(&self, like: &Self::QType) -> Self::QType;

    /// Record `left <= right`.
    ///
    /// Returns `false` if the lattice already knows the constraint cannot be
    /// satisfied. The engine reports that as a qualifier error.
    fn mkleq(&self, left: &Self::QType, right: &Self::QType) -> bool;

    /// Record `left == right`.
    fn mkeq(&self, left: &Self::QType, right: &Self::QType) -> bool {
        let forward = self.mkleq(left, right);
        let backward = self.mkleq(right, left);
        forward && backward
    }
}
