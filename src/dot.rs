//! Store graph to DOT (Graphviz) conversion.
//!
//! # DOT Format
//!
//! The generated DOT output follows these conventions:
//! - **Store variables** are rendered as ellipses labeled with their name
//! - **Operator stores** (`filter`, `ref`, `ow`, `assign`) are rendered as boxes
//! - **Edges** point from a store to the stores it is computed from or bounded by:
//!   - Solid lines are subset constraints `left <= right`, drawn `right -> left`
//!   - Dashed lines go from an operator store to its operands
//!
//! # Examples
//!
//! ```
//! use flowqual::analysis::Analysis;
//! use flowqual::qual::QualLattice;
//! use flowqual::types::Location;
//!
//! struct Unit;
//! impl QualLattice for Unit {
//!     type QType = ();
//!     fn fresh(&self, _: &()) {}
//!     fn mkleq(&self, _: &(), _: &()) -> bool { true }
//! }
//!
//! let analysis = Analysis::new(Unit);
//! let loc = Location::new("main.c", 1);
//! let x = analysis.make_aloc("x", ());
//! let entry = analysis.make_store_var(&loc, "entry");
//! let s = analysis.make_store_ref(&loc, entry, x);
//!
//! let dot = analysis.to_dot(&[s]).unwrap();
//! // Write to file and render with: dot -Tpng output.dot -o output.png
//! ```

use std::collections::{BTreeSet, HashMap};

use crate::analysis::Analysis;
use crate::qual::QualLattice;
use crate::reference::Store;
use crate::store::StoreNode;

/// Configuration options for DOT output generation.
///
/// # Examples
///
/// ```
/// use flowqual::dot::DotConfig;
///
/// let config = DotConfig {
///     var_shape: "circle",
///     ..DotConfig::default()
/// };
/// ```
#[derive(Debug, Clone)]
pub struct DotConfig {
    /// Shape for store variables (default: "ellipse")
    pub var_shape: &'static str,
    /// Shape for operator stores (default: "box")
    pub op_shape: &'static str,
    /// Style for subset edges (default: "solid")
    pub subset_edge_style: &'static str,
    /// Style for operand edges (default: "dashed")
    pub operand_edge_style: &'static str,
    /// Whether to label subset edges with their message (default: false)
    pub label_edges: bool,
}

impl Default for DotConfig {
    fn default() -> Self {
        Self {
            var_shape: "ellipse",
            op_shape: "box",
            subset_edge_style: "solid",
            operand_edge_style: "dashed",
            label_edges: false,
        }
    }
}

fn escape(label: &str) -> String {
    label.replace('\\', "\\\\").replace('"', "\\\"")
}

impl<L: QualLattice> Analysis<L> {
    /// Converts the part of the store graph that `roots` depend on to DOT format.
    ///
    /// An empty `roots` slice exports the whole graph.
    pub fn to_dot(&self, roots: &[Store]) -> Result<String, std::fmt::Error> {
        self.to_dot_with_config(roots, &DotConfig::default())
    }

    /// Converts the store graph to DOT format with custom configuration.
    pub fn to_dot_with_config(&self, roots: &[Store], config: &DotConfig) -> Result<String, std::fmt::Error> {
        use std::fmt::Write as _;

        let nodes = self.store_ancestors(roots);
        let stores = self.stores.borrow();

        let mut dot = String::new();
        writeln!(dot, "digraph {{")?;
        writeln!(dot, "rankdir=BT;")?;

        for &i in &nodes {
            let s = Store::new(i);
            let mut label = String::new();
            self.print_store(&mut label, s)?;
            let shape = match stores.node(s) {
                StoreNode::Var { .. } => config.var_shape,
                _ => config.op_shape,
            };
            writeln!(dot, "{} [shape={}, label=\"{}\"];", i, shape, escape(&label))?;
        }

        for &i in &nodes {
            let operands: Vec<Store> = match stores.node(Store::new(i)) {
                StoreNode::Var { .. } => vec![],
                StoreNode::Filter { base, .. } | StoreNode::Ref { base, .. } | StoreNode::Assign { base, .. } => {
                    vec![*base]
                }
                StoreNode::Ow { s1, s2, .. } => vec![*s1, *s2],
            };
            for operand in operands {
                writeln!(
                    dot,
                    "{} -> {} [style={}];",
                    i,
                    stores.find(operand).raw(),
                    config.operand_edge_style
                )?;
            }
        }

        for edge in &stores.edges {
            let left = stores.find(edge.left).raw();
            let right = stores.find(edge.right).raw();
            if !nodes.contains(&right) {
                continue;
            }
            if config.label_edges {
                writeln!(
                    dot,
                    "{} -> {} [style={}, label=\"{}\"];",
                    right,
                    left,
                    config.subset_edge_style,
                    escape(&edge.msg)
                )?;
            } else {
                writeln!(dot, "{} -> {} [style={}];", right, left, config.subset_edge_style)?;
            }
        }

        writeln!(dot, "}}")?;
        Ok(dot)
    }

    /// Roots of every store `roots` is computed from, `roots` included.
    fn store_ancestors(&self, roots: &[Store]) -> BTreeSet<u32> {
        let stores = self.stores.borrow();
        if roots.is_empty() {
            return (0..stores.len() as u32)
                .filter(|&i| stores.find(Store::new(i)).raw() == i)
                .collect();
        }
        let mut lower: HashMap<u32, Vec<Store>> = HashMap::new();
        for edge in &stores.edges {
            lower.entry(stores.find(edge.right).raw()).or_default().push(edge.left);
        }
        let mut seen = BTreeSet::new();
        let mut stack: Vec<Store> = roots.to_vec();
        while let Some(s) = stack.pop() {
            let s = stores.find(s);
            if !seen.insert(s.raw()) {
                continue;
            }
            match stores.node(s) {
                StoreNode::Var { .. } => {}
                StoreNode::Filter { base, .. } | StoreNode::Ref { base, .. } | StoreNode::Assign { base, .. } => {
                    stack.push(*base)
                }
                StoreNode::Ow { s1, s2, .. } => {
                    stack.push(*s1);
                    stack.push(*s2);
                }
            }
            if let Some(left) = lower.get(&s.raw()) {
                stack.extend(left.iter().copied());
            }
        }
        seen
    }
}
