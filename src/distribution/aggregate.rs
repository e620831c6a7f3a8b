//! Pointwise median of several validated distributions on a shared grid.

use crate::config::EngineConfig;
use crate::domain::Domain;
use crate::error::AggregationError;

use super::types::{AggregatedDistribution, DenseDistribution, GridPoint};
use super::validator::{cdf_ceiling, repair_endpoints, repair_monotonicity};

/// Grid x positions must agree to this relative tolerance.
const GRID_MATCH_TOLERANCE: f64 = 1e-9;

/// Combine surviving attempts into one distribution by per-grid-point median.
///
/// The median of monotone sequences is monotone; the monotonicity pass only
/// guards against bad inputs. The endpoint pass restores the open-bound margin
/// when several attempts clamp to the same extreme.
pub fn aggregate(
    distributions: &[DenseDistribution],
    domain: &Domain,
    config: &EngineConfig,
) -> Result<AggregatedDistribution, AggregationError> {
    let first = distributions
        .first()
        .ok_or(AggregationError::NoSurvivingAttempts)?;
    let k = first.len();
    let scale = (domain.upper() - domain.lower()).abs().max(1.0);

    for (index, dist) in distributions.iter().enumerate().skip(1) {
        let same_grid = dist.len() == k
            && dist
                .points()
                .iter()
                .zip(first.points())
                .all(|(a, b)| (a.x - b.x).abs() <= GRID_MATCH_TOLERANCE * scale);
        if !same_grid {
            return Err(AggregationError::GridMismatch { index });
        }
    }

    let mut column = Vec::with_capacity(distributions.len());
    let mut cdf: Vec<f64> = (0..k)
        .map(|i| {
            column.clear();
            column.extend(distributions.iter().map(|d| d.points()[i].cdf));
            median(&mut column)
        })
        .collect();

    let mut repairs = repair_monotonicity(&mut cdf, cdf_ceiling(domain, config.open_bound_mass));
    repairs.extend(repair_endpoints(&mut cdf, domain, config.open_bound_mass));
    if !repairs.is_empty() {
        tracing::debug!(
            repairs = repairs.len(),
            "Repaired aggregated distribution"
        );
    }

    let points = first
        .points()
        .iter()
        .zip(cdf)
        .map(|(p, c)| GridPoint { x: p.x, cdf: c })
        .collect();

    Ok(AggregatedDistribution {
        points,
        source_count: distributions.len(),
    })
}

/// Median of a non-empty slice; even lengths average the two middle values.
fn median(values: &mut [f64]) -> f64 {
    values.sort_by(|a, b| a.total_cmp(b));
    let n = values.len();
    if n % 2 == 1 {
        values[n / 2]
    } else {
        (values[n / 2 - 1] + values[n / 2]) / 2.0
    }
}
