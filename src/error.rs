//! Error types for extraction, domain resolution, construction and aggregation.
//!
//! Per-attempt errors (`ExtractionError`, `MonotonicityError`, `BuildError`,
//! `InvalidDistributionError`) exclude a single attempt. `DomainError` and
//! `AggregationError` are fatal for the whole question.

use thiserror::Error;

use crate::distribution::types::Violation;

/// The text did not contain parseable percentile anchors.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExtractionError {
    /// No line looked like `Percentile N: value`.
    #[error("no 'Percentile N: value' lines found")]
    NoPercentileLines,
    /// Some lines matched but too few usable anchors survived.
    #[error("found {found} usable percentile anchors, need at least {required}")]
    TooFewAnchors { found: usize, required: usize },
}

/// A higher percentile was given a lower value than a lower percentile.
#[derive(Debug, Clone, PartialEq, Error)]
#[error(
    "percentile {higher_percentile} has value {higher_value}, below percentile {lower_percentile} value {lower_value}"
)]
pub struct MonotonicityError {
    pub lower_percentile: f64,
    pub lower_value: f64,
    pub higher_percentile: f64,
    pub higher_value: f64,
}

/// Question bounds that cannot describe a legal value domain.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DomainError {
    #[error("bound '{0}' is not finite")]
    NonFinite(&'static str),
    #[error("lower bound {lower} must be strictly less than upper bound {upper}")]
    InvertedBounds { lower: f64, upper: f64 },
    #[error("log-scaled domain with lower bound {lower} needs an explicit zero point")]
    MissingZeroPoint { lower: f64 },
    #[error("zero point {zero_point} lies inside [{lower}, {upper}]")]
    ZeroPointInsideRange {
        zero_point: f64,
        lower: f64,
        upper: f64,
    },
}

/// Malformed input to the CDF builder.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BuildError {
    #[error("grid needs at least 2 points, got {0}")]
    TooFewGridPoints(usize),
    #[error("anchor value {value} (percentile {percentile}) lies outside [{lower}, {upper}]")]
    AnchorOutsideDomain {
        percentile: f64,
        value: f64,
        lower: f64,
        upper: f64,
    },
    #[error("anchor at percentile {0} is not a finite value")]
    NonFiniteAnchor(f64),
    #[error("need at least one anchor")]
    NoAnchors,
}

/// The validator rejected a distribution after attempting repairs.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("distribution rejected: {}", describe_violations(.violations))]
pub struct InvalidDistributionError {
    pub violations: Vec<Violation>,
}

fn describe_violations(violations: &[Violation]) -> String {
    violations
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

/// Aggregation could not produce a distribution.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AggregationError {
    #[error("no valid attempts survived validation")]
    NoSurvivingAttempts,
    #[error("distribution {index} does not share the grid of the first distribution")]
    GridMismatch { index: usize },
}

/// Engine configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Anything that discards a single forecasting attempt.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AttemptError {
    #[error(transparent)]
    Extraction(#[from] ExtractionError),
    #[error(transparent)]
    Monotonicity(#[from] MonotonicityError),
    #[error(transparent)]
    Build(#[from] BuildError),
    #[error(transparent)]
    Invalid(#[from] InvalidDistributionError),
}

impl AttemptError {
    /// Short error code for logs and traces.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Extraction(ExtractionError::NoPercentileLines) => "no_percentile_lines",
            Self::Extraction(ExtractionError::TooFewAnchors { .. }) => "too_few_anchors",
            Self::Monotonicity(_) => "non_monotonic_anchors",
            Self::Build(_) => "malformed_anchors",
            Self::Invalid(_) => "invalid_distribution",
        }
    }

    /// Violations behind a rejection, empty for other failures.
    pub fn violations(&self) -> &[Violation] {
        match self {
            Self::Invalid(e) => &e.violations,
            _ => &[],
        }
    }
}

/// Errors fatal for a whole question.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum QuestionError {
    #[error("invalid question bounds: {0}")]
    Domain(#[from] DomainError),
    #[error("aggregation failed: {0}")]
    Aggregation(#[from] AggregationError),
}

impl QuestionError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Domain(_) => "domain_error",
            Self::Aggregation(AggregationError::NoSurvivingAttempts) => "no_surviving_attempts",
            Self::Aggregation(AggregationError::GridMismatch { .. }) => "grid_mismatch",
        }
    }
}
