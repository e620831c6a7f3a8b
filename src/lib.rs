#![forbid(unsafe_code)]

//! # percentile-harness
//!
//! Turn an LLM's free-text percentile forecasts into a distribution a
//! forecasting platform will accept.
//!
//! A model is asked for a handful of percentiles ("Percentile 10: 1,200").
//! Each answer is parsed into anchors, interpolated into a dense CDF over the
//! question's domain, checked against the platform's shape constraints (and
//! repaired where that is safe), then several answers are combined by
//! pointwise median. Anything that cannot be made valid is excluded, never
//! silently submitted.
//!
//! ```no_run
//! use percentile_harness::{ForecastEngine, QuestionBounds};
//!
//! let engine = ForecastEngine::default();
//! let bounds = QuestionBounds::closed(0.0, 100.0);
//! let answer = "Percentile 10: 20\nPercentile 50: 45\nPercentile 90: 80";
//! let forecast = engine.forecast_question(&bounds, &[answer]).unwrap();
//! assert_eq!(forecast.distribution.len(), 201);
//! ```

pub mod config;
pub mod distribution;
pub mod domain;
pub mod error;
pub mod evaluation;
pub mod extract;
pub mod pipeline;
pub mod trace;

pub use config::{EngineConfig, Interpolation};
pub use distribution::{
    aggregate, build_distribution, validate, AggregatedDistribution, DenseDistribution,
    GridPoint, PercentileAnchor, ValidatedDistribution, ValidationStatus, ValidationVerdict,
    Violation, ViolationKind, DECLARED_PERCENTILES,
};
pub use domain::{resolve_domain, Domain, QuestionBounds};
pub use error::{
    AggregationError, AttemptError, BuildError, ConfigError, DomainError, ExtractionError,
    InvalidDistributionError, MonotonicityError, QuestionError,
};
pub use extract::extract_anchors;
pub use pipeline::{
    AttemptBatch, AttemptForecast, AttemptRecord, AttemptStatus, ForecastEngine, QuestionForecast,
};
pub use trace::{
    question_key, AttemptTrace, JsonlSink, JsonlTraceSink, JsonlWorker, TraceError, TraceSink,
};
