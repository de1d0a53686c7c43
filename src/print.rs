//! Human-readable printing of locations, effects and stores.

use std::fmt::{self, Write};

use crate::analysis::Analysis;
use crate::effect::EffectNode;
use crate::error::Error;
use crate::qual::QualLattice;
use crate::reference::{Aloc, Effect, Store};
use crate::store::StoreNode;
use crate::types::EffKind;

impl<L: QualLattice> Analysis<L> {
    pub fn print_aloc(&self, out: &mut impl Write, al: Aloc) -> fmt::Result {
        write!(out, "{}", self.name_aloc(al))
    }

    /// Print `e` as an expression, e.g. `(body ∪ wr(x))`.
    pub fn print_effect(&self, out: &mut impl Write, e: Effect) -> fmt::Result {
        let node = self.effects.borrow().node(e).clone();
        match node {
            EffectNode::Empty => write!(out, "{{}}"),
            EffectNode::Atom { kind, aloc } => match kind {
                EffKind::Any => write!(out, "{{{}}}", self.name_aloc(aloc)),
                kind => write!(out, "{}({})", kind, self.name_aloc(aloc)),
            },
            EffectNode::Var { name } => write!(out, "{}", name),
            EffectNode::Union(a, b) => {
                write!(out, "(")?;
                self.print_effect(out, a)?;
                write!(out, " ∪ ")?;
                self.print_effect(out, b)?;
                write!(out, ")")
            }
            EffectNode::Inter(a, b) => {
                write!(out, "(")?;
                self.print_effect(out, a)?;
                write!(out, " ∩ ")?;
                self.print_effect(out, b)?;
                write!(out, ")")
            }
        }
    }

    pub(crate) fn print_effect_string(&self, e: Effect) -> String {
        let mut s = String::new();
        match self.print_effect(&mut s, e) {
            Ok(()) => s,
            Err(_) => e.to_string(),
        }
    }

    /// Short name of a store: the variable name, or its handle.
    fn store_name(&self, s: Store) -> String {
        match self.stores.borrow().node(s) {
            StoreNode::Var { name } => name.clone(),
            _ => self.stores.borrow().find(s).to_string(),
        }
    }

    /// Print the operator of `s` with its operands named, e.g. `ref(x, entry)`.
    pub fn print_store(&self, out: &mut impl Write, s: Store) -> fmt::Result {
        let stores = self.stores.borrow();
        match stores.node(s) {
            StoreNode::Var { name } => write!(out, "{}", name),
            StoreNode::Filter { base, effect } => {
                write!(out, "{}|", self.store_name(*base))?;
                self.print_effect(out, *effect)
            }
            StoreNode::Ref { base, aloc, .. } => {
                write!(out, "ref({}, {})", self.name_aloc(*aloc), self.store_name(*base))
            }
            StoreNode::Ow { s1, s2, effect } => {
                write!(out, "ow({}, {}, ", self.store_name(*s1), self.store_name(*s2))?;
                self.print_effect(out, *effect)?;
                write!(out, ")")
            }
            StoreNode::Assign {
                base, aloc, strong, ..
            } => write!(
                out,
                "assign{}({}, {})",
                if *strong { "!" } else { "" },
                self.store_name(*base),
                self.name_aloc(*aloc)
            ),
        }
    }

    /// Print `s` with raw handles only, e.g. `s@4 = ref(a@0, s@2)`.
    pub fn print_store_raw(&self, out: &mut impl Write, s: Store) -> fmt::Result {
        let stores = self.stores.borrow();
        let root = stores.find(s);
        write!(out, "{} = ", root)?;
        match stores.node(root) {
            StoreNode::Var { .. } => write!(out, "var"),
            StoreNode::Filter { base, effect } => {
                write!(out, "filter({}, {})", stores.find(*base), effect)
            }
            StoreNode::Ref { base, aloc, .. } => {
                write!(out, "ref({}, {})", aloc, stores.find(*base))
            }
            StoreNode::Ow { s1, s2, effect } => write!(
                out,
                "ow({}, {}, {})",
                stores.find(*s1),
                stores.find(*s2),
                effect
            ),
            StoreNode::Assign {
                base,
                aloc,
                strong,
                ..
            } => write!(
                out,
                "assign({}, {}, strong = {})",
                stores.find(*base),
                aloc,
                strong
            ),
        }
    }

    /// Print every cell of `s`, one per line, as `name: qtype`.
    ///
    /// Cells are closed before they are printed, so their types carry every
    /// constraint the store graph implies.
    pub fn print_store_cells<W, F>(
        &self,
        out: &mut W,
        mut pr_qual: F,
        s: Store,
        print_alocs: bool,
    ) -> Result<(), Error>
    where
        W: Write,
        F: FnMut(&mut W, &L::QType) -> fmt::Result,
    {
        self.require_closed()?;
        let closure = self.closure();
        let root = self.stores.borrow().find(s);
        for &al in &closure.domains[root.index()] {
            self.close_cells(&closure, vec![(root.raw(), al)]);
            let Some(qt) = self.resolve_cell(&closure, root, al) else {
                continue;
            };
            self.print_aloc(out, Aloc::new(al))?;
            if print_alocs {
                write!(out, " ({})", Aloc::new(al))?;
            }
            write!(out, ": ")?;
            pr_qual(out, &qt)?;
            writeln!(out)?;
        }
        Ok(())
    }
}
