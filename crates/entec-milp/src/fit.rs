//! Piecewise-linear fitting of scalar performance curves.
//!
//! Technology performance data arrives as sampled (x, y) points — pump flow
//! against power, efficiency against load. [`fit_piecewise`] approximates the
//! curve with a budgeted number of linear segments so the constraint builders
//! can express it in a MILP.
//!
//! The fitter searches the family of *continuous* secant fits: breakpoints
//! are chosen among the distinct sample x-values and each segment is the line
//! through its two breakpoint endpoints. A dynamic program over breakpoint
//! placements minimizes the total squared error. The search is exhaustive
//! within that family, so identical input always yields an identical fit.

use entec_core::{EntecError, EntecResult};

/// Ordered (x, y) samples of a performance function. Immutable once built.
#[derive(Debug, Clone)]
pub struct PerformanceSample {
    xs: Vec<f64>,
    ys: Vec<f64>,
}

impl PerformanceSample {
    /// Build a sample from (x, y) pairs. Points are sorted by x; duplicate
    /// x-values are allowed (they are averaged when placing breakpoints).
    pub fn new(points: impl IntoIterator<Item = (f64, f64)>) -> EntecResult<Self> {
        let mut points: Vec<(f64, f64)> = points.into_iter().collect();
        if points.len() < 2 {
            return Err(EntecError::InsufficientData(
                "performance sample needs at least two points".into(),
            ));
        }
        if points.iter().any(|(x, y)| !x.is_finite() || !y.is_finite()) {
            return Err(EntecError::Validation(
                "performance sample contains non-finite values".into(),
            ));
        }
        points.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.total_cmp(&b.1)));
        Ok(Self {
            xs: points.iter().map(|p| p.0).collect(),
            ys: points.iter().map(|p| p.1).collect(),
        })
    }

    pub fn len(&self) -> usize {
        self.xs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.xs.is_empty()
    }

    /// Distinct x-values with the mean y at each, in ascending order.
    fn nodes(&self) -> Vec<(f64, f64)> {
        let mut nodes: Vec<(f64, f64)> = Vec::new();
        let mut i = 0;
        while i < self.xs.len() {
            let x = self.xs[i];
            let mut sum = 0.0;
            let mut count = 0usize;
            while i < self.xs.len() && self.xs[i] == x {
                sum += self.ys[i];
                count += 1;
                i += 1;
            }
            nodes.push((x, sum / count as f64));
        }
        nodes
    }
}

/// One linear piece of a fit, valid on the half-open domain `[lo, hi)`.
///
/// The last segment of a fit also covers its upper endpoint, so the union of
/// segment domains is the closed sample domain.
#[derive(Debug, Clone, PartialEq)]
pub struct FittedSegment {
    pub lo: f64,
    pub hi: f64,
    pub slope: f64,
    pub intercept: f64,
    /// Sum of squared residuals of the sample points in this segment.
    pub sse: f64,
}

impl FittedSegment {
    pub fn eval(&self, x: f64) -> f64 {
        self.slope * x + self.intercept
    }
}

/// An ordered, contiguous, domain-covering piecewise-linear fit.
#[derive(Debug, Clone)]
pub struct PiecewiseFit {
    segments: Vec<FittedSegment>,
}

impl PiecewiseFit {
    pub fn segments(&self) -> &[FittedSegment] {
        &self.segments
    }

    pub fn num_segments(&self) -> usize {
        self.segments.len()
    }

    /// Breakpoints including both domain endpoints; strictly increasing.
    pub fn breakpoints(&self) -> Vec<f64> {
        let mut bp: Vec<f64> = self.segments.iter().map(|s| s.lo).collect();
        bp.push(self.segments.last().expect("non-empty fit").hi);
        bp
    }

    pub fn slopes(&self) -> Vec<f64> {
        self.segments.iter().map(|s| s.slope).collect()
    }

    pub fn intercepts(&self) -> Vec<f64> {
        self.segments.iter().map(|s| s.intercept).collect()
    }

    /// Total squared error of the fit.
    pub fn sse(&self) -> f64 {
        self.segments.iter().map(|s| s.sse).sum()
    }

    /// Evaluate the fit. Segment lookup is half-open `[lo, hi)`, so a value
    /// exactly at a breakpoint belongs to the right-hand segment; x outside
    /// the domain is clamped to the nearest endpoint.
    pub fn eval(&self, x: f64) -> f64 {
        let first = self.segments.first().expect("non-empty fit");
        let last = self.segments.last().expect("non-empty fit");
        if x <= first.lo {
            return first.eval(first.lo);
        }
        if x >= last.hi {
            return last.eval(last.hi);
        }
        for seg in &self.segments {
            if x >= seg.lo && x < seg.hi {
                return seg.eval(x);
            }
        }
        last.eval(x)
    }
}

/// Squared-error of the secant through nodes `i` and `j` against every raw
/// sample point with x in `[x_i, x_j]`.
fn secant_cost(sample: &PerformanceSample, nodes: &[(f64, f64)], i: usize, j: usize) -> (f64, f64, f64) {
    let (x0, y0) = nodes[i];
    let (x1, y1) = nodes[j];
    let slope = (y1 - y0) / (x1 - x0);
    let intercept = y0 - slope * x0;
    let mut sse = 0.0;
    for (x, y) in sample.xs.iter().zip(sample.ys.iter()) {
        if *x >= x0 && *x <= x1 {
            let r = y - (slope * x + intercept);
            sse += r * r;
        }
    }
    (slope, intercept, sse)
}

/// Fit `segments` linear pieces to a performance sample.
///
/// Returns exactly `segments` pieces, or fewer when adjacent pieces of the
/// optimal fit coincide (straight-line data collapses to one segment). Fails
/// with [`EntecError::InsufficientData`] when the sample has fewer than
/// `segments + 1` distinct x-values.
pub fn fit_piecewise(sample: &PerformanceSample, segments: usize) -> EntecResult<PiecewiseFit> {
    if segments == 0 {
        return Err(EntecError::Config(
            "piecewise fit requires at least one segment".into(),
        ));
    }
    let nodes = sample.nodes();
    let n = nodes.len();
    if n < segments + 1 {
        return Err(EntecError::InsufficientData(format!(
            "{} distinct x-values cannot support {} segments",
            n, segments
        )));
    }

    // cost[i][j]: SSE of one secant segment spanning nodes i..j
    let mut cost = vec![vec![f64::INFINITY; n]; n];
    for i in 0..n {
        for j in (i + 1)..n {
            cost[i][j] = secant_cost(sample, &nodes, i, j).2;
        }
    }

    // dp[s][j]: best SSE covering nodes 0..j with s segments
    let mut dp = vec![vec![f64::INFINITY; n]; segments + 1];
    let mut prev = vec![vec![usize::MAX; n]; segments + 1];
    for j in 1..n {
        dp[1][j] = cost[0][j];
        prev[1][j] = 0;
    }
    for s in 2..=segments {
        for j in s..n {
            for i in (s - 1)..j {
                let candidate = dp[s - 1][i] + cost[i][j];
                // strict < keeps the leftmost split on ties, so the result
                // is independent of iteration incidentals
                if candidate < dp[s][j] {
                    dp[s][j] = candidate;
                    prev[s][j] = i;
                }
            }
        }
    }

    // Recover breakpoint node indices
    let mut cut_nodes = vec![n - 1];
    let mut s = segments;
    let mut j = n - 1;
    while s > 0 {
        let i = prev[s][j];
        cut_nodes.push(i);
        j = i;
        s -= 1;
    }
    cut_nodes.reverse();

    let mut pieces: Vec<FittedSegment> = Vec::with_capacity(segments);
    for w in cut_nodes.windows(2) {
        let (slope, intercept, sse) = secant_cost(sample, &nodes, w[0], w[1]);
        pieces.push(FittedSegment {
            lo: nodes[w[0]].0,
            hi: nodes[w[1]].0,
            slope,
            intercept,
            sse,
        });
    }

    // Collapse adjacent pieces that describe the same line
    let mut merged: Vec<FittedSegment> = Vec::with_capacity(pieces.len());
    for piece in pieces {
        match merged.last_mut() {
            Some(last)
                if (last.slope - piece.slope).abs() <= 1e-12
                    && (last.intercept - piece.intercept).abs() <= 1e-12 =>
            {
                last.hi = piece.hi;
                last.sse += piece.sse;
            }
            _ => merged.push(piece),
        }
    }

    Ok(PiecewiseFit { segments: merged })
}
