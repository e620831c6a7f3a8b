//! Artifacts exchanged between the builder, validator and aggregator.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Percentiles reported in logs and summaries.
pub const DECLARED_PERCENTILES: [f64; 11] = [
    5.0, 10.0, 20.0, 30.0, 40.0, 50.0, 60.0, 70.0, 80.0, 90.0, 95.0,
];

// =============================================================================
// Anchors
// =============================================================================

/// One elicited (percentile, value) pair. `percentile` lies in (0, 100).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PercentileAnchor {
    pub percentile: f64,
    pub value: f64,
}

impl PercentileAnchor {
    pub fn new(percentile: f64, value: f64) -> Self {
        Self { percentile, value }
    }

    /// Cumulative probability implied by this anchor.
    pub fn cdf(&self) -> f64 {
        self.percentile / 100.0
    }
}

// =============================================================================
// Dense distributions
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridPoint {
    pub x: f64,
    pub cdf: f64,
}

/// A CDF sampled at exactly K grid points spanning the domain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DenseDistribution {
    pub(crate) points: Vec<GridPoint>,
}

impl DenseDistribution {
    /// Wrap raw points. No invariant is checked here; run the validator.
    pub fn from_points(points: Vec<GridPoint>) -> Self {
        Self { points }
    }

    pub fn points(&self) -> &[GridPoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn xs(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.x).collect()
    }

    /// The bare K-vector of cumulative probabilities.
    pub fn cdf_values(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.cdf).collect()
    }

    /// Value at which the CDF reaches `p` (in [0, 1]).
    pub fn quantile(&self, p: f64) -> Option<f64> {
        quantile_of(&self.points, p)
    }

    pub fn declared_percentiles(&self) -> Vec<PercentileAnchor> {
        declared_percentiles_of(&self.points)
    }
}

/// Pointwise combination of several dense distributions on a shared grid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatedDistribution {
    pub(crate) points: Vec<GridPoint>,
    pub source_count: usize,
}

impl AggregatedDistribution {
    pub fn points(&self) -> &[GridPoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn cdf_values(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.cdf).collect()
    }

    /// Submission pairs `(x, cdf)`.
    pub fn to_pairs(&self) -> Vec<(f64, f64)> {
        self.points.iter().map(|p| (p.x, p.cdf)).collect()
    }

    pub fn quantile(&self, p: f64) -> Option<f64> {
        quantile_of(&self.points, p)
    }

    pub fn declared_percentiles(&self) -> Vec<PercentileAnchor> {
        declared_percentiles_of(&self.points)
    }

    /// Drop provenance, e.g. to re-run the validator.
    pub fn into_dense(self) -> DenseDistribution {
        DenseDistribution {
            points: self.points,
        }
    }
}

/// Inverse CDF by linear scan and linear interpolation between grid points.
/// Returns `None` when `p` lies outside the sampled cdf range.
fn quantile_of(points: &[GridPoint], p: f64) -> Option<f64> {
    let first = points.first()?;
    let last = points.last()?;
    if !p.is_finite() || p < first.cdf || p > last.cdf {
        return None;
    }
    if p == first.cdf {
        return Some(first.x);
    }
    for w in points.windows(2) {
        let (a, b) = (w[0], w[1]);
        if p <= b.cdf {
            if b.cdf <= a.cdf {
                return Some(b.x);
            }
            let frac = (p - a.cdf) / (b.cdf - a.cdf);
            return Some(a.x + frac * (b.x - a.x));
        }
    }
    Some(last.x)
}

fn declared_percentiles_of(points: &[GridPoint]) -> Vec<PercentileAnchor> {
    DECLARED_PERCENTILES
        .iter()
        .filter_map(|&pct| quantile_of(points, pct / 100.0).map(|v| PercentileAnchor::new(pct, v)))
        .collect()
}

// =============================================================================
// Validation verdicts
// =============================================================================

/// Invariant named by a violation record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ViolationKind {
    GridShape,
    NonMonotonic,
    MinSpacing,
    MaxConcentration,
    EndpointConcentration,
}

impl ViolationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::GridShape => "grid-shape",
            Self::NonMonotonic => "non-monotonic",
            Self::MinSpacing => "min-spacing",
            Self::MaxConcentration => "max-concentration",
            Self::EndpointConcentration => "endpoint-concentration",
        }
    }

    /// Whether the validator fixes this class of violation in place.
    pub fn is_repairable(&self) -> bool {
        matches!(self, Self::NonMonotonic | Self::EndpointConcentration)
    }
}

/// One violated invariant over the grid index range `[start, end]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Violation {
    pub kind: ViolationKind,
    pub start: usize,
    pub end: usize,
    pub repaired: bool,
}

impl Violation {
    pub fn new(kind: ViolationKind, start: usize, end: usize) -> Self {
        Self {
            kind,
            start,
            end,
            repaired: kind.is_repairable(),
        }
    }

    pub(crate) fn unrepaired(mut self) -> Self {
        self.repaired = false;
        self
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at [{}, {}]", self.kind.as_str(), self.start, self.end)?;
        if self.repaired {
            write!(f, " (repaired)")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationStatus {
    Accepted,
    Repaired,
    Rejected,
}

/// Outcome of one validation pass; violations are in check order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationVerdict {
    pub accepted: bool,
    pub repaired: bool,
    pub violations: Vec<Violation>,
}

impl ValidationVerdict {
    pub(crate) fn from_violations(violations: Vec<Violation>) -> Self {
        let accepted = violations.iter().all(|v| v.repaired);
        let repaired = violations.iter().any(|v| v.repaired);
        Self {
            accepted,
            repaired,
            violations,
        }
    }

    pub fn status(&self) -> ValidationStatus {
        match (self.accepted, self.repaired) {
            (false, _) => ValidationStatus::Rejected,
            (true, true) => ValidationStatus::Repaired,
            (true, false) => ValidationStatus::Accepted,
        }
    }

    /// Violations that caused rejection.
    pub fn rejections(&self) -> Vec<Violation> {
        self.violations
            .iter()
            .filter(|v| !v.repaired)
            .cloned()
            .collect()
    }
}
