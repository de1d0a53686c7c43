//! Small value types shared by the location, effect and store layers.
//!
//! Handles to arena nodes live in [`reference`][crate::reference]; the types
//! here carry no identity of their own.
use std::fmt;
use std::rc::Rc;

/// The kind of access an effect records on a location.
///
/// Kinds are ordered with [`EffKind::Any`] first so that member sets sorted by
/// `(location, kind)` can be scanned per location.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum EffKind {
    /// The location itself, with no particular access (`effect_single`).
    Any,
    /// Read and write.
    Rwr,
    /// Read.
    R,
    /// Write.
    Wr,
    /// Fresh allocation, distinct from referencing the location.
    Alloc,
    /// Caller-defined kind.
    Custom(u16),
}

impl EffKind {
    /// Returns `true` if a member of kind `self` witnesses a query for `query`.
    ///
    /// # Rules
    ///
    /// - `Alloc` only ever matches `Alloc`.
    /// - `Any` matches every other kind, in either position.
    /// - `Rwr` covers both `R` and `Wr`.
    /// - Otherwise kinds match by equality.
    pub fn covers(self, query: EffKind) -> bool {
        match (self, query) {
            (EffKind::Alloc, q) | (q, EffKind::Alloc) => q == EffKind::Alloc,
            (EffKind::Any, _) | (_, EffKind::Any) => true,
            (EffKind::Rwr, EffKind::R | EffKind::Wr) => true,
            (k, q) => k == q,
        }
    }

    /// The kinds `self` stands for: `Rwr` is `R` and `Wr`, every other kind is itself.
    pub fn parts(self) -> impl Iterator<Item = EffKind> {
        let (first, second) = match self {
            EffKind::Rwr => (EffKind::R, Some(EffKind::Wr)),
            k => (k, None),
        };
        std::iter::once(first).chain(second)
    }

    /// Returns `true` if some access of kind `self` is also an access of kind `other`.
    ///
    /// Symmetric, unlike [`covers`][EffKind::covers]: `rwr` overlaps `r` and `r` overlaps `rwr`.
    pub fn overlaps(self, other: EffKind) -> bool {
        self.parts().any(|a| other.parts().any(|b| a.covers(b)))
    }

    /// The most general kind both `self` and `other` describe, if any.
    pub fn meet(self, other: EffKind) -> Option<EffKind> {
        match (self, other) {
            (EffKind::Alloc, EffKind::Alloc) => Some(EffKind::Alloc),
            (EffKind::Alloc, _) | (_, EffKind::Alloc) => None,
            (EffKind::Any, k) | (k, EffKind::Any) => Some(k),
            (EffKind::Rwr, k @ (EffKind::R | EffKind::Wr)) => Some(k),
            (k @ (EffKind::R | EffKind::Wr), EffKind::Rwr) => Some(k),
            (k, q) if k == q => Some(k),
            _ => None,
        }
    }
}

impl fmt::Display for EffKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EffKind::Any => write!(f, "any"),
            EffKind::Rwr => write!(f, "rwr"),
            EffKind::R => write!(f, "r"),
            EffKind::Wr => write!(f, "wr"),
            EffKind::Alloc => write!(f, "alloc"),
            EffKind::Custom(k) => write!(f, "k{}", k),
        }
    }
}

/// Linearity of a location in a store: how many allocations of it reach the store.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum Lin {
    Zero,
    One,
    /// More than one, or ambiguous. Updates must be weak.
    Omega,
}

impl Lin {
    /// The numeric encoding used by C front ends: 0, 1 or 2 (= ω).
    pub fn as_int(self) -> u8 {
        match self {
            Lin::Zero => 0,
            Lin::One => 1,
            Lin::Omega => 2,
        }
    }

    pub fn is_strong(self) -> bool {
        self == Lin::One
    }
}

impl fmt::Display for Lin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Lin::Zero => write!(f, "0"),
            Lin::One => write!(f, "1"),
            Lin::Omega => write!(f, "ω"),
        }
    }
}

/// A source location attached to constraints for diagnostics.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct Location {
    pub file: Rc<str>,
    pub line: u32,
}

impl Location {
    pub fn new(file: &str, line: u32) -> Self {
        Self {
            file: Rc::from(file),
            line,
        }
    }

    /// A location for constraints the engine generates on its own.
    pub fn internal() -> Self {
        Self::new("<internal>", 0)
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file, self.line)
    }
}

/// The analysis phase of a session.
///
/// Constraints accumulate while `Open`. [`check_nin`] closes the graph and
/// [`compute_lins`] unlocks qualifier and linearity queries.
///
/// [`check_nin`]: crate::analysis::Analysis::check_nin
/// [`compute_lins`]: crate::analysis::Analysis::compute_lins
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd)]
pub enum Phase {
    Open,
    Closed,
    Linearized,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_covers() {
        assert!(EffKind::Rwr.covers(EffKind::R));
        assert!(EffKind::Rwr.covers(EffKind::Wr));
        assert!(!EffKind::R.covers(EffKind::Wr));
        assert!(!EffKind::R.covers(EffKind::Rwr));
        assert!(EffKind::Any.covers(EffKind::Wr));
        assert!(EffKind::Wr.covers(EffKind::Any));
        assert!(EffKind::Custom(3).covers(EffKind::Custom(3)));
        assert!(!EffKind::Custom(3).covers(EffKind::Custom(4)));
    }

    #[test]
    fn test_kind_overlaps_both_ways() {
        assert!(EffKind::Rwr.overlaps(EffKind::R));
        assert!(EffKind::R.overlaps(EffKind::Rwr));
        assert!(EffKind::Wr.overlaps(EffKind::Rwr));
        assert!(!EffKind::R.overlaps(EffKind::Wr));
        assert!(!EffKind::Rwr.overlaps(EffKind::Alloc));
        assert!(EffKind::Any.overlaps(EffKind::Rwr));
        assert_eq!(EffKind::Rwr.parts().collect::<Vec<_>>(), vec![EffKind::R, EffKind::Wr]);
        assert_eq!(EffKind::Custom(1).parts().collect::<Vec<_>>(), vec![EffKind::Custom(1)]);
    }

    #[test]
    fn test_kind_meet() {
        assert_eq!(EffKind::Rwr.meet(EffKind::R), Some(EffKind::R));
        assert_eq!(EffKind::R.meet(EffKind::Rwr), Some(EffKind::R));
        assert_eq!(EffKind::Any.meet(EffKind::Wr), Some(EffKind::Wr));
        assert_eq!(EffKind::Wr.meet(EffKind::Any), Some(EffKind::Wr));
        assert_eq!(EffKind::R.meet(EffKind::Wr), None);
        assert_eq!(EffKind::Any.meet(EffKind::Alloc), None);
        assert_eq!(EffKind::Alloc.meet(EffKind::Alloc), Some(EffKind::Alloc));
    }

    #[test]
    fn test_alloc_is_separate() {
        assert!(EffKind::Alloc.covers(EffKind::Alloc));
        assert!(!EffKind::Alloc.covers(EffKind::Any));
        assert!(!EffKind::Any.covers(EffKind::Alloc));
        assert!(!EffKind::Rwr.covers(EffKind::Alloc));
    }

    #[test]
    fn test_kinds_sort_any_first() {
        let mut kinds = vec![EffKind::Alloc, EffKind::R, EffKind::Any, EffKind::Custom(0)];
        kinds.sort();
        assert_eq!(kinds[0], EffKind::Any);
    }

    #[test]
    fn test_lin_encoding() {
        assert_eq!(Lin::Zero.as_int(), 0);
        assert_eq!(Lin::One.as_int(), 1);
        assert_eq!(Lin::Omega.as_int(), 2);
        assert!(Lin::One.is_strong());
        assert!(!Lin::Omega.is_strong());
        assert_eq!(Lin::Omega.to_string(), "ω");
    }

    #[test]
    fn test_location_display() {
        assert_eq!(Location::new("foo.c", 12).to_string(), "foo.c:12");
    }
}
