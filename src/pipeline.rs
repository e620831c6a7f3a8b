//! Attempt texts + question bounds → one aggregated distribution.
//!
//! The flow per question:
//! 1. **Resolve**: bounds become a [`Domain`]; a bad domain aborts the question
//!    before any attempt is parsed.
//! 2. **Attempt**: each text is extracted, built and validated independently.
//!    A failed or rejected attempt is logged and excluded, never fatal.
//! 3. **Aggregate**: surviving distributions are combined by pointwise median;
//!    zero survivors is a hard failure with no fallback distribution.
//!
//! Every step is synchronous and side-effect free apart from logging and the
//! optional trace sink. [`ForecastEngine`] is `Send + Sync`, so callers that
//! elicit attempts concurrently can run [`ForecastEngine::run_attempt`] from
//! any thread and aggregate once all results are in.

use serde::{Deserialize, Serialize};

use crate::config::EngineConfig;
use crate::distribution::types::{
    AggregatedDistribution, DenseDistribution, PercentileAnchor, ValidationStatus,
    ValidationVerdict, Violation,
};
use crate::distribution::{admit, aggregate, build_distribution};
use crate::domain::{Domain, QuestionBounds};
use crate::error::{AggregationError, AttemptError, ConfigError, DomainError, QuestionError};
use crate::extract::extract_anchors;
use crate::trace::{hash_text, now_epoch_ms, question_key, AttemptTrace, TraceSink};

// =============================================================================
// Types
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptStatus {
    Accepted,
    Repaired,
    Rejected,
    /// Extraction or construction failed before validation.
    Failed,
}

impl From<ValidationStatus> for AttemptStatus {
    fn from(status: ValidationStatus) -> Self {
        match status {
            ValidationStatus::Accepted => Self::Accepted,
            ValidationStatus::Repaired => Self::Repaired,
            ValidationStatus::Rejected => Self::Rejected,
        }
    }
}

/// A single attempt that survived validation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttemptForecast {
    pub anchors: Vec<PercentileAnchor>,
    pub distribution: DenseDistribution,
    pub verdict: ValidationVerdict,
}

/// What happened to one attempt, for reports and traces.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttemptRecord {
    pub index: usize,
    pub status: AttemptStatus,
    pub anchor_count: Option<usize>,
    pub error_code: Option<String>,
    pub error: Option<String>,
    pub violations: Vec<Violation>,
}

impl AttemptRecord {
    fn from_result(index: usize, result: &Result<AttemptForecast, AttemptError>) -> Self {
        match result {
            Ok(forecast) => Self {
                index,
                status: forecast.verdict.status().into(),
                anchor_count: Some(forecast.anchors.len()),
                error_code: None,
                error: None,
                violations: forecast.verdict.violations.clone(),
            },
            Err(err) => Self {
                index,
                status: match err {
                    AttemptError::Invalid(_) => AttemptStatus::Rejected,
                    _ => AttemptStatus::Failed,
                },
                anchor_count: None,
                error_code: Some(err.code().to_string()),
                error: Some(err.to_string()),
                violations: err.violations().to_vec(),
            },
        }
    }

    pub fn survived(&self) -> bool {
        matches!(self.status, AttemptStatus::Accepted | AttemptStatus::Repaired)
    }
}

/// Outcome of every attempt for one question, before aggregation.
#[derive(Debug, Clone)]
pub struct AttemptBatch {
    /// One record per attempt, in input order.
    pub records: Vec<AttemptRecord>,
    pub survivors: Vec<DenseDistribution>,
}

/// Final forecast for one question.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionForecast {
    pub domain: Domain,
    pub distribution: AggregatedDistribution,
    /// Implied values at the standard percentiles of the aggregate.
    pub declared_percentiles: Vec<PercentileAnchor>,
    pub attempts: Vec<AttemptRecord>,
}

// =============================================================================
// Engine
// =============================================================================

/// Stateless forecast engine around a validated [`EngineConfig`].
#[derive(Debug, Clone)]
pub struct ForecastEngine {
    config: EngineConfig,
}

impl Default for ForecastEngine {
    fn default() -> Self {
        Self {
            config: EngineConfig::default(),
        }
    }
}

impl ForecastEngine {
    pub fn new(config: EngineConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn resolve_domain(&self, bounds: &QuestionBounds) -> Result<Domain, DomainError> {
        Domain::resolve(bounds)
    }

    /// Text → validated distribution for one attempt.
    pub fn run_attempt(&self, text: &str, domain: &Domain) -> Result<AttemptForecast, AttemptError> {
        let anchors = extract_anchors(text)?;
        let dense = build_distribution(&anchors, domain, &self.config)?;
        let validated = admit(dense, domain, &self.config)?;
        Ok(AttemptForecast {
            anchors,
            distribution: validated.distribution,
            verdict: validated.verdict,
        })
    }

    /// Median-combine distributions produced by [`Self::run_attempt`].
    pub fn aggregate(
        &self,
        distributions: &[DenseDistribution],
        domain: &Domain,
    ) -> Result<AggregatedDistribution, AggregationError> {
        aggregate(distributions, domain, &self.config)
    }

    /// Run every attempt against `domain`, keeping failures as records.
    pub fn run_attempts<S: AsRef<str>>(&self, domain: &Domain, attempts: &[S]) -> AttemptBatch {
        self.run_attempts_traced(domain, attempts, None)
    }

    fn run_attempts_traced<S: AsRef<str>>(
        &self,
        domain: &Domain,
        attempts: &[S],
        trace: Option<(&dyn TraceSink, &str)>,
    ) -> AttemptBatch {
        let mut records = Vec::with_capacity(attempts.len());
        let mut survivors = Vec::with_capacity(attempts.len());

        for (index, text) in attempts.iter().enumerate() {
            let text = text.as_ref();
            let result = self.run_attempt(text, domain);
            let record = AttemptRecord::from_result(index, &result);

            match result {
                Ok(forecast) => {
                    if forecast.verdict.repaired {
                        tracing::debug!(
                            attempt = index,
                            violations = ?forecast.verdict.violations,
                            "Attempt repaired"
                        );
                    }
                    survivors.push(forecast.distribution);
                }
                Err(e) => {
                    tracing::warn!(
                        attempt = index,
                        code = e.code(),
                        error = %e,
                        "Attempt excluded from aggregation"
                    );
                }
            }

            if let Some((sink, key)) = trace {
                let event = AttemptTrace {
                    question_key: key.to_string(),
                    timestamp_ms: now_epoch_ms(),
                    attempt_index: index,
                    text_hash: hash_text(text),
                    status: record.status,
                    anchor_count: record.anchor_count,
                    error_code: record.error_code.clone(),
                    error: record.error.clone(),
                    violations: record.violations.clone(),
                };
                if let Err(e) = sink.record(event) {
                    tracing::warn!(attempt = index, error = %e, "Failed to record attempt trace");
                }
            }
            records.push(record);
        }

        AttemptBatch { records, survivors }
    }

    pub fn forecast_question<S: AsRef<str>>(
        &self,
        bounds: &QuestionBounds,
        attempts: &[S],
    ) -> Result<QuestionForecast, QuestionError> {
        self.forecast_question_with_trace(bounds, attempts, None)
    }

    /// Like [`Self::forecast_question`], recording one trace per attempt.
    /// Trace failures are logged and do not affect the forecast.
    pub fn forecast_question_with_trace<S: AsRef<str>>(
        &self,
        bounds: &QuestionBounds,
        attempts: &[S],
        trace: Option<&dyn TraceSink>,
    ) -> Result<QuestionForecast, QuestionError> {
        let domain = self.resolve_domain(bounds).inspect_err(|e| {
            tracing::error!(error = %e, "Question bounds rejected; no attempts run");
        })?;

        let key = question_key(bounds);
        let AttemptBatch { records, survivors } =
            self.run_attempts_traced(&domain, attempts, trace.map(|sink| (sink, key.as_str())));

        let distribution = self.aggregate(&survivors, &domain).inspect_err(|e| {
            tracing::error!(
                attempts = attempts.len(),
                error = %e,
                "No distribution to submit"
            );
        })?;
        let declared_percentiles = distribution.declared_percentiles();

        tracing::info!(
            attempts = attempts.len(),
            survivors = distribution.source_count,
            declared = ?declared_percentiles
                .iter()
                .map(|a| (a.percentile, a.value))
                .collect::<Vec<_>>(),
            "Aggregated forecast"
        );

        Ok(QuestionForecast {
            domain,
            distribution,
            declared_percentiles,
            attempts: records,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const GOOD: &str = "Percentile 10: 20\nPercentile 50: 50\nPercentile 90: 80\n";

    #[test]
    fn engine_rejects_invalid_config() {
        let cfg = EngineConfig::default().with_grid_points(1);
        assert!(ForecastEngine::new(cfg).is_err());
    }

    #[test]
    fn bad_attempts_are_excluded_not_fatal() {
        let engine = ForecastEngine::default();
        let bounds = QuestionBounds::closed(0.0, 100.0);
        let forecast = engine
            .forecast_question(&bounds, &[GOOD, "no numbers here", GOOD])
            .unwrap();

        assert_eq!(forecast.distribution.source_count, 2);
        assert_eq!(forecast.attempts.len(), 3);
        assert_eq!(forecast.attempts[1].status, AttemptStatus::Failed);
        assert_eq!(
            forecast.attempts[1].error_code.as_deref(),
            Some("no_percentile_lines")
        );
        assert!(forecast.attempts[0].survived());
    }

    #[test]
    fn domain_error_is_fatal() {
        let engine = ForecastEngine::default();
        let err = engine
            .forecast_question(&QuestionBounds::closed(5.0, 1.0), &[GOOD])
            .unwrap_err();
        assert_eq!(err.code(), "domain_error");
    }

    #[test]
    fn all_attempts_failing_is_an_aggregation_error() {
        let engine = ForecastEngine::default();
        let err = engine
            .forecast_question(&QuestionBounds::closed(0.0, 100.0), &["nothing", "nada"])
            .unwrap_err();
        assert_eq!(err, QuestionError::Aggregation(AggregationError::NoSurvivingAttempts));
    }

    #[test]
    fn run_attempts_keeps_records_when_nothing_survives() {
        let engine = ForecastEngine::default();
        let domain = engine
            .resolve_domain(&QuestionBounds::closed(0.0, 100.0))
            .unwrap();
        let spike = "Percentile 10: 50\nPercentile 50: 50.0001\nPercentile 90: 50.0002";
        let batch = engine.run_attempts(&domain, &[spike, "nothing"]);

        assert!(batch.survivors.is_empty());
        let statuses: Vec<_> = batch.records.iter().map(|r| r.status).collect();
        assert_eq!(statuses, vec![AttemptStatus::Rejected, AttemptStatus::Failed]);
        assert_eq!(
            engine.aggregate(&batch.survivors, &domain).unwrap_err(),
            AggregationError::NoSurvivingAttempts
        );
    }

    #[test]
    fn declared_percentiles_track_the_median_anchor() {
        let engine = ForecastEngine::default();
        let forecast = engine
            .forecast_question(&QuestionBounds::closed(0.0, 100.0), &[GOOD])
            .unwrap();
        let median = forecast
            .declared_percentiles
            .iter()
            .find(|a| a.percentile == 50.0)
            .unwrap();
        assert!((median.value - 50.0).abs() < 0.5);
    }
}
