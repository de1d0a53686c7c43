use std::fmt::{Display, Formatter};

/// Handle to an abstract location.
///
/// Raw handles are *not* canonical: two handles may denote the same
/// location after [`unify_aloc`][crate::analysis::Analysis::unify_aloc].
/// Compare them with [`eq_aloc`][crate::analysis::Analysis::eq_aloc].
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Aloc(u32);

/// Handle to an effect node (a concrete effect, a union/intersection, or a variable).
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Effect(u32);

/// Handle to a store node.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Store(u32);

macro_rules! handle_impl {
    ($name:ident, $prefix:literal) => {
        impl $name {
            pub const fn new(index: u32) -> Self {
                Self(index)
            }

            /// Return the index of the handle in its arena.
            pub const fn index(self) -> usize {
                self.0 as usize
            }

            pub const fn raw(self) -> u32 {
                self.0
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}@{}", $prefix, self.0)
            }
        }
    };
}

handle_impl!(Aloc, "a");
handle_impl!(Effect, "e");
handle_impl!(Store, "s");

impl Effect {
    /// The empty effect is always node 0 of every session.
    pub const EMPTY: Effect = Effect(0);

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }
}
