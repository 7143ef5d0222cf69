//! MILP formulation of technology performance for energy system models.
//!
//! The crate turns fitted technology performance data into linear
//! variables and constraints, collected in a solver-agnostic
//! [`model::ModelStore`]:
//!
//! - [`fit`] approximates sampled performance curves piecewise-linearly;
//! - [`bounds`] derives per-carrier operating bounds;
//! - [`tech`] holds the archetype builders (renewables, three conversion
//!   archetypes, storage, multi-unit banks, capture preprocessing);
//! - [`regime`] and [`disjunction`] encode "exactly one of N regimes"
//!   either as a convex hull or with bound-derived big-M constants;
//! - [`lower`] hands the finished store to `good_lp`/Clarabel as an LP
//!   relaxation.
//!
//! Construction is synchronous and append-only: builders only ever add
//! variables and constraints, so technologies can be formulated one after
//! another into the same store.

pub mod bounds;
pub mod disjunction;
pub mod expr;
pub mod fit;
pub mod lower;
pub mod model;
pub mod performance;
pub mod regime;
pub mod tech;

pub use bounds::OperatingBounds;
pub use disjunction::{assemble, AssembledDisjunction, Relaxation};
pub use expr::{LinearConstraint, LinearExpr, Sense, VarId, VarKind, VariableDef};
pub use fit::{fit_piecewise, FittedSegment, PerformanceSample, PiecewiseFit};
pub use lower::{solve_lp, LpSolution};
pub use model::{FormulationContext, ModelStore};
pub use performance::{FittedPerformance, SegmentCoefficients};
pub use regime::{Regime, RegimeKind};
