//! Offline evaluation harness for the forecast engine.
//!
//! Runs synthetic cases through [`ForecastEngine::run_attempts`] and
//! [`ForecastEngine::aggregate`], replacing LLM answers with text rendered
//! from a known distribution plus seeded noise and injected failures, then
//! scores the aggregate against the truth CDF. Attempt outcomes are counted
//! even when aggregation fails.

use std::time::Instant;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use statrs::distribution::{ContinuousCDF, LogNormal, Normal};

use crate::distribution::types::DECLARED_PERCENTILES;
use crate::domain::{Domain, QuestionBounds};
use crate::error::QuestionError;
use crate::pipeline::{AttemptStatus, ForecastEngine};

// =============================================================================
// Synthetic case definitions
// =============================================================================

/// Ground truth the simulated forecaster is drawing from.
#[derive(Debug, Clone, Copy, Serialize)]
#[serde(tag = "family", rename_all = "snake_case")]
pub enum TruthDistribution {
    Normal { mean: f64, std_dev: f64 },
    LogNormal { location: f64, scale: f64 },
}

impl TruthDistribution {
    pub fn quantile(&self, p: f64) -> Option<f64> {
        match *self {
            Self::Normal { mean, std_dev } => {
                Normal::new(mean, std_dev).ok().map(|d| d.inverse_cdf(p))
            }
            Self::LogNormal { location, scale } => {
                LogNormal::new(location, scale).ok().map(|d| d.inverse_cdf(p))
            }
        }
    }

    pub fn cdf(&self, x: f64) -> Option<f64> {
        match *self {
            Self::Normal { mean, std_dev } => Normal::new(mean, std_dev).ok().map(|d| d.cdf(x)),
            Self::LogNormal { location, scale } => {
                LogNormal::new(location, scale).ok().map(|d| d.cdf(x))
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct SyntheticCase {
    pub name: &'static str,
    pub bounds: QuestionBounds,
    pub truth: TruthDistribution,
    pub attempts: usize,
    /// Half-width of the uniform jitter applied to each attempt's spread and
    /// location, in unit-coordinate terms.
    pub noise: f64,
    pub garbled_rate: f64,
    pub swapped_rate: f64,
    pub spike_rate: f64,
    pub seed: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct EvaluationMetrics {
    pub attempts: usize,
    pub accepted: usize,
    pub repaired: usize,
    pub rejected: usize,
    pub failed: usize,
    pub aggregated: bool,
    /// Largest |aggregate − truth| over the grid.
    pub max_cdf_error: Option<f64>,
    pub mean_cdf_error: Option<f64>,
    pub latency_ms: u128,
}

#[derive(Debug, Clone, Serialize)]
pub struct EvaluationResult {
    pub case_name: String,
    pub truth: TruthDistribution,
    pub metrics: EvaluationMetrics,
    pub error_code: Option<String>,
}

// =============================================================================
// Public API
// =============================================================================

pub fn synthetic_cases() -> Vec<SyntheticCase> {
    let clean = |name, bounds, truth, attempts, seed| SyntheticCase {
        name,
        bounds,
        truth,
        attempts,
        noise: 0.0,
        garbled_rate: 0.0,
        swapped_rate: 0.0,
        spike_rate: 0.0,
        seed,
    };
    let normal = TruthDistribution::Normal {
        mean: 50.0,
        std_dev: 10.0,
    };

    vec![
        clean(
            "normal_clean_5",
            QuestionBounds::closed(0.0, 100.0),
            normal,
            5,
            42,
        ),
        SyntheticCase {
            noise: 0.1,
            ..clean(
                "normal_noisy_open_9",
                QuestionBounds::closed(10.0, 90.0).open(true, true),
                normal,
                9,
                43,
            )
        },
        SyntheticCase {
            noise: 0.1,
            ..clean(
                "lognormal_log_scale_7",
                QuestionBounds::closed(1.0, 10_000.0).log_scaled(0.0),
                TruthDistribution::LogNormal {
                    location: 100f64.ln(),
                    scale: 0.8,
                },
                7,
                44,
            )
        },
        SyntheticCase {
            noise: 0.05,
            garbled_rate: 0.15,
            swapped_rate: 0.15,
            spike_rate: 0.15,
            ..clean(
                "mixed_failures_12",
                QuestionBounds::closed(0.0, 100.0),
                normal,
                12,
                45,
            )
        },
        SyntheticCase {
            spike_rate: 1.0,
            ..clean(
                "all_spikes_4",
                QuestionBounds::closed(0.0, 100.0),
                // Median between grid points, so each spike lands inside one step.
                TruthDistribution::Normal {
                    mean: 52.3,
                    std_dev: 10.0,
                },
                4,
                47,
            )
        },
        SyntheticCase {
            garbled_rate: 1.0,
            ..clean(
                "all_garbled_3",
                QuestionBounds::closed(0.0, 100.0),
                normal,
                3,
                46,
            )
        },
    ]
}

pub fn run_synthetic_suite(filter: Option<&str>) -> Vec<EvaluationResult> {
    let engine = ForecastEngine::default();
    synthetic_cases()
        .into_iter()
        .filter(|c| filter.map_or(true, |name| c.name == name))
        .map(|case| run_synthetic_case(&engine, &case))
        .collect()
}

pub fn run_synthetic_case(engine: &ForecastEngine, case: &SyntheticCase) -> EvaluationResult {
    let started = Instant::now();
    let mut rng = StdRng::seed_from_u64(case.seed);

    let mut metrics = EvaluationMetrics {
        attempts: case.attempts,
        accepted: 0,
        repaired: 0,
        rejected: 0,
        failed: 0,
        aggregated: false,
        max_cdf_error: None,
        mean_cdf_error: None,
        latency_ms: 0,
    };

    let domain = match engine.resolve_domain(&case.bounds) {
        Ok(domain) => domain,
        Err(e) => {
            // Nothing was attempted.
            metrics.failed = case.attempts;
            metrics.latency_ms = started.elapsed().as_millis();
            return EvaluationResult {
                case_name: case.name.to_string(),
                truth: case.truth,
                metrics,
                error_code: Some(QuestionError::from(e).code().to_string()),
            };
        }
    };

    let texts: Vec<String> = (0..case.attempts)
        .map(|_| simulate_attempt(&mut rng, case, &domain))
        .collect();
    let batch = engine.run_attempts(&domain, &texts);
    for record in &batch.records {
        tally(&mut metrics, record.status);
    }

    let error_code = match engine.aggregate(&batch.survivors, &domain) {
        Ok(aggregate) => {
            let errors: Vec<f64> = aggregate
                .points()
                .iter()
                .filter_map(|p| case.truth.cdf(p.x).map(|truth| (p.cdf - truth).abs()))
                .collect();
            if !errors.is_empty() {
                metrics.max_cdf_error = errors.iter().copied().reduce(f64::max);
                metrics.mean_cdf_error = Some(errors.iter().sum::<f64>() / errors.len() as f64);
            }
            metrics.aggregated = true;
            None
        }
        Err(e) => Some(QuestionError::from(e).code().to_string()),
    };

    metrics.latency_ms = started.elapsed().as_millis();
    tracing::debug!(
        case = case.name,
        aggregated = metrics.aggregated,
        max_cdf_error = ?metrics.max_cdf_error,
        "Synthetic case finished"
    );

    EvaluationResult {
        case_name: case.name.to_string(),
        truth: case.truth,
        metrics,
        error_code,
    }
}

// =============================================================================
// Simulation
// =============================================================================

enum Injected {
    None,
    Garbled,
    Swapped,
    Spike,
}

fn tally(metrics: &mut EvaluationMetrics, status: AttemptStatus) {
    match status {
        AttemptStatus::Accepted => metrics.accepted += 1,
        AttemptStatus::Repaired => metrics.repaired += 1,
        AttemptStatus::Rejected => metrics.rejected += 1,
        AttemptStatus::Failed => metrics.failed += 1,
    }
}

fn pick_failure(rng: &mut impl Rng, case: &SyntheticCase) -> Injected {
    let roll: f64 = rng.gen();
    if roll < case.garbled_rate {
        Injected::Garbled
    } else if roll < case.garbled_rate + case.swapped_rate {
        Injected::Swapped
    } else if roll < case.garbled_rate + case.swapped_rate + case.spike_rate {
        Injected::Spike
    } else {
        Injected::None
    }
}

/// Render one answer in the format the forecasting prompt asks for.
///
/// Noise is applied in the domain's unit coordinate, so log-scaled cases get
/// multiplicative jitter on the value scale.
fn simulate_attempt(rng: &mut impl Rng, case: &SyntheticCase, domain: &Domain) -> String {
    let failure = pick_failure(rng, case);
    if matches!(failure, Injected::Garbled) {
        return "I can't give a meaningful range for this question.".to_string();
    }

    let spread = if matches!(failure, Injected::Spike) {
        1e-4
    } else {
        1.0 + rng.gen_range(-case.noise..=case.noise)
    };
    let shift = rng.gen_range(-case.noise..=case.noise) * 0.25;

    let center = case
        .truth
        .quantile(0.5)
        .map(|x| domain.to_unit(x.clamp(domain.lower(), domain.upper())))
        .unwrap_or(0.5);

    let mut values: Vec<f64> = DECLARED_PERCENTILES
        .iter()
        .map(|&p| {
            let t = case
                .truth
                .quantile(p / 100.0)
                .map(|x| domain.to_unit(x.clamp(domain.lower(), domain.upper())))
                .unwrap_or(center);
            let jittered = center + (t - center) * spread + shift;
            domain.from_unit(jittered.clamp(0.0, 1.0))
        })
        .collect();

    if matches!(failure, Injected::Swapped) {
        // 10th and 50th percentiles.
        values.swap(1, 5);
    }

    let mut text = String::from("Reasoning omitted.\n\n");
    for (p, v) in DECLARED_PERCENTILES.iter().zip(values) {
        text.push_str(&format!("Percentile {p}: {v:.6}\n"));
    }
    text
}
