//! Linear expressions and constraints over model variables.
//!
//! The formulation engine emits constraints into a solver-agnostic store
//! (see [`crate::model`]); this module defines the algebra those constraints
//! are written in. Expressions are plain data, so a constraint system can be
//! inspected, bounded and point-evaluated without any solver attached.

use serde::{Deserialize, Serialize};

/// Index of a variable in a [`crate::model::ModelStore`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VarId(pub usize);

impl VarId {
    pub fn index(&self) -> usize {
        self.0
    }
}

/// Variable domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VarKind {
    Continuous,
    Integer,
    /// Activation/indicator variable in {0, 1}.
    Binary,
}

/// A declared decision variable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VariableDef {
    /// Namespaced name, e.g. `"pv_1.output[3,electricity]"`.
    pub name: String,
    pub lower: f64,
    pub upper: f64,
    pub kind: VarKind,
}

/// A linear expression `Σ aᵢ·xᵢ + c`.
///
/// Duplicate variable ids are allowed in `terms`; [`LinearExpr::simplified`]
/// merges them. All arithmetic (`+`, `-`, `*` by scalar) is supported between
/// expressions, `VarId`s and `f64`s.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LinearExpr {
    pub terms: Vec<(VarId, f64)>,
    pub constant: f64,
}

impl LinearExpr {
    pub fn zero() -> Self {
        Self::default()
    }

    pub fn constant(c: f64) -> Self {
        Self {
            terms: Vec::new(),
            constant: c,
        }
    }

    pub fn term(var: VarId, coeff: f64) -> Self {
        Self {
            terms: vec![(var, coeff)],
            constant: 0.0,
        }
    }

    /// Sum of unit terms over `vars`.
    pub fn sum(vars: impl IntoIterator<Item = VarId>) -> Self {
        Self {
            terms: vars.into_iter().map(|v| (v, 1.0)).collect(),
            constant: 0.0,
        }
    }

    pub fn is_constant(&self) -> bool {
        self.terms.is_empty()
    }

    /// Merge duplicate variable ids and drop zero coefficients.
    pub fn simplified(mut self) -> Self {
        self.terms.sort_by_key(|(v, _)| *v);
        let mut merged: Vec<(VarId, f64)> = Vec::with_capacity(self.terms.len());
        for (var, coeff) in self.terms {
            match merged.last_mut() {
                Some((last, acc)) if *last == var => *acc += coeff,
                _ => merged.push((var, coeff)),
            }
        }
        merged.retain(|(_, c)| *c != 0.0);
        self.terms = merged;
        self
    }

    /// Evaluate at a point, indexed by `VarId`.
    pub fn eval(&self, point: &[f64]) -> f64 {
        self.terms
            .iter()
            .map(|(v, c)| c * point[v.index()])
            .sum::<f64>()
            + self.constant
    }

    /// Interval bounds of the expression given variable bounds.
    ///
    /// Used to derive big-M constants; infinite variable bounds propagate.
    pub fn bounds(&self, vars: &[VariableDef]) -> (f64, f64) {
        let mut lo = self.constant;
        let mut hi = self.constant;
        for (v, c) in &self.terms {
            let def = &vars[v.index()];
            let (a, b) = (c * def.lower, c * def.upper);
            lo += a.min(b);
            hi += a.max(b);
        }
        (lo, hi)
    }

    /// Substitute variables via `map`, leaving unmapped ids untouched.
    pub fn substituted(&self, map: impl Fn(VarId) -> VarId) -> Self {
        Self {
            terms: self.terms.iter().map(|(v, c)| (map(*v), *c)).collect(),
            constant: self.constant,
        }
    }

    /// Variable ids referenced by this expression.
    pub fn variables(&self) -> impl Iterator<Item = VarId> + '_ {
        self.terms.iter().map(|(v, _)| *v)
    }
}

impl From<VarId> for LinearExpr {
    fn from(var: VarId) -> Self {
        LinearExpr::term(var, 1.0)
    }
}

impl From<f64> for LinearExpr {
    fn from(c: f64) -> Self {
        LinearExpr::constant(c)
    }
}

impl std::ops::Add for LinearExpr {
    type Output = LinearExpr;
    fn add(mut self, rhs: LinearExpr) -> LinearExpr {
        self.terms.extend(rhs.terms);
        self.constant += rhs.constant;
        self
    }
}

impl std::ops::Add<f64> for LinearExpr {
    type Output = LinearExpr;
    fn add(mut self, rhs: f64) -> LinearExpr {
        self.constant += rhs;
        self
    }
}

impl std::ops::Add<VarId> for LinearExpr {
    type Output = LinearExpr;
    fn add(mut self, rhs: VarId) -> LinearExpr {
        self.terms.push((rhs, 1.0));
        self
    }
}

impl std::ops::Sub for LinearExpr {
    type Output = LinearExpr;
    fn sub(mut self, rhs: LinearExpr) -> LinearExpr {
        self.terms
            .extend(rhs.terms.into_iter().map(|(v, c)| (v, -c)));
        self.constant -= rhs.constant;
        self
    }
}

impl std::ops::Sub<VarId> for LinearExpr {
    type Output = LinearExpr;
    fn sub(mut self, rhs: VarId) -> LinearExpr {
        self.terms.push((rhs, -1.0));
        self
    }
}

impl std::ops::Sub<f64> for LinearExpr {
    type Output = LinearExpr;
    fn sub(mut self, rhs: f64) -> LinearExpr {
        self.constant -= rhs;
        self
    }
}

impl std::ops::Mul<f64> for LinearExpr {
    type Output = LinearExpr;
    fn mul(mut self, rhs: f64) -> LinearExpr {
        for (_, c) in &mut self.terms {
            *c *= rhs;
        }
        self.constant *= rhs;
        self
    }
}

impl std::ops::Neg for LinearExpr {
    type Output = LinearExpr;
    fn neg(self) -> LinearExpr {
        self * -1.0
    }
}

/// Constraint sense, relating an expression to zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Sense {
    /// `expr == 0`
    Eq,
    /// `expr <= 0`
    Le,
    /// `expr >= 0`
    Ge,
}

/// A linear constraint `expr ⋈ 0`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinearConstraint {
    pub name: String,
    pub expr: LinearExpr,
    pub sense: Sense,
}

impl LinearConstraint {
    pub fn eq(name: impl Into<String>, expr: LinearExpr) -> Self {
        Self {
            name: name.into(),
            expr: expr.simplified(),
            sense: Sense::Eq,
        }
    }

    pub fn le(name: impl Into<String>, expr: LinearExpr) -> Self {
        Self {
            name: name.into(),
            expr: expr.simplified(),
            sense: Sense::Le,
        }
    }

    pub fn ge(name: impl Into<String>, expr: LinearExpr) -> Self {
        Self {
            name: name.into(),
            expr: expr.simplified(),
            sense: Sense::Ge,
        }
    }

    /// Whether the constraint holds at `point` within `tol`.
    pub fn satisfied(&self, point: &[f64], tol: f64) -> bool {
        let v = self.expr.eval(point);
        match self.sense {
            Sense::Eq => v.abs() <= tol,
            Sense::Le => v <= tol,
            Sense::Ge => v >= -tol,
        }
    }
}
