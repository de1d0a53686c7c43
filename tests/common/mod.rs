//! A two-point taint lattice for integration tests.
//!
//! Qualified types are variables bounded by `Untainted < Tainted`. Constants
//! are variables with both bounds fixed. `mkleq` records the constraint and
//! pushes lower bounds forward; it fails as soon as a tainted value reaches a
//! variable that must stay untainted.

#![allow(dead_code)]

use std::cell::RefCell;

use flowqual::qual::QualLattice;

#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd)]
pub enum Qual {
    Untainted,
    Tainted,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct QVar(pub usize);

#[derive(Debug)]
struct VarState {
    name: String,
    lower: Qual,
    upper: Qual,
    succs: Vec<usize>,
}

#[derive(Debug, Default)]
pub struct Taint {
    vars: RefCell<Vec<VarState>>,
    constraints: RefCell<Vec<(QVar, QVar)>>,
}

impl Taint {
    pub fn new() -> Self {
        Self::default()
    }

    fn add(&self, name: String, lower: Qual, upper: Qual) -> QVar {
        let mut vars = self.vars.borrow_mut();
        vars.push(VarState {
            name,
            lower,
            upper,
            succs: Vec::new(),
        });
        QVar(vars.len() - 1)
    }

    pub fn var(&self, name: &str) -> QVar {
        self.add(name.to_string(), Qual::Untainted, Qual::Tainted)
    }

    pub fn constant(&self, q: Qual) -> QVar {
        self.add(format!("{:?}", q), q, q)
    }

    /// The least value the constraints force on `v`.
    pub fn value(&self, v: QVar) -> Qual {
        self.vars.borrow()[v.0].lower
    }

    pub fn name(&self, v: QVar) -> String {
        self.vars.borrow()[v.0].name.clone()
    }

    pub fn constraint_count(&self) -> usize {
        self.constraints.borrow().len()
    }
}

impl QualLattice for Taint {
    type QType = QVar;

    fn fresh(&self, like: &QVar) -> QVar {
        let name = format!("{}'", self.name(*like));
        self.add(name, Qual::Untainted, Qual::Tainted)
    }

    fn mkleq(&self, left: &QVar, right: &QVar) -> bool {
        self.constraints.borrow_mut().push((*left, *right));
        let mut vars = self.vars.borrow_mut();
        vars[left.0].succs.push(right.0);

        let mut ok = true;
        let mut stack = vec![left.0];
        while let Some(i) = stack.pop() {
            let lower = vars[i].lower;
            let succs = vars[i].succs.clone();
            for j in succs {
                if vars[j].lower < lower {
                    vars[j].lower = lower;
                    if vars[j].lower > vars[j].upper {
                        ok = false;
                    }
                    stack.push(j);
                }
            }
        }
        ok
    }
}
