//! Anchors + domain → dense CDF on a fixed grid.
//!
//! Anchors become knots `(t, percentile / 100)` in the domain's unit
//! coordinate. Implicit knots pin the cdf at the (effective) domain edges, then
//! a monotone interpolant is sampled at `K` evenly spaced unit positions.

use crate::config::EngineConfig;
use crate::domain::Domain;
use crate::error::BuildError;

use super::interpolate::interpolate;
use super::types::{DenseDistribution, GridPoint, PercentileAnchor};

/// Build a dense distribution from anchors sorted by percentile.
///
/// The result is not validated; see [`super::validator::validate`].
pub fn build_distribution(
    anchors: &[PercentileAnchor],
    domain: &Domain,
    config: &EngineConfig,
) -> Result<DenseDistribution, BuildError> {
    let k = config.grid_points;
    if k < 2 {
        return Err(BuildError::TooFewGridPoints(k));
    }
    if anchors.is_empty() {
        return Err(BuildError::NoAnchors);
    }
    for anchor in anchors {
        if !anchor.value.is_finite() {
            return Err(BuildError::NonFiniteAnchor(anchor.percentile));
        }
        if !domain.contains(anchor.value) {
            return Err(BuildError::AnchorOutsideDomain {
                percentile: anchor.percentile,
                value: anchor.value,
                lower: domain.lower(),
                upper: domain.upper(),
            });
        }
    }

    let (ts, ys) = knots(anchors, domain, config);
    let unit_grid: Vec<f64> = (0..k).map(|i| i as f64 / (k - 1) as f64).collect();
    let cdf = interpolate(config.interpolation, &ts, &ys, &unit_grid);

    let points: Vec<GridPoint> = domain
        .grid(k)
        .into_iter()
        .zip(cdf)
        .map(|(x, c)| GridPoint {
            x,
            cdf: c.clamp(0.0, 1.0),
        })
        .collect();

    tracing::debug!(
        anchors = anchors.len(),
        knots = ts.len(),
        grid_points = k,
        "Built dense distribution"
    );
    Ok(DenseDistribution { points })
}

/// Interpolation knots: explicit anchors (equal values collapsed to the
/// highest cdf) plus implicit edge knots where no anchor reaches the edge.
fn knots(anchors: &[PercentileAnchor], domain: &Domain, config: &EngineConfig) -> (Vec<f64>, Vec<f64>) {
    let mut knots: Vec<(f64, f64)> = anchors
        .iter()
        .map(|a| (domain.to_unit(a.value), a.cdf()))
        .collect();
    knots.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.total_cmp(&b.1)));
    knots.dedup_by(|next, prev| {
        if next.0 == prev.0 {
            prev.1 = prev.1.max(next.1);
            true
        } else {
            false
        }
    });

    let mass = config.open_bound_mass;
    let lower_t = domain.effective_lower_unit(config.open_bound_inset);
    let upper_t = domain.effective_upper_unit(config.open_bound_inset);

    if let Some(&(first_t, first_cdf)) = knots.first() {
        if first_t > lower_t {
            // Stay strictly below the first anchor even for extreme percentiles.
            let edge_cdf = if domain.lower_open() {
                mass.min(first_cdf / 2.0)
            } else {
                0.0
            };
            knots.insert(0, (lower_t, edge_cdf));
        }
    }
    if let Some(&(last_t, last_cdf)) = knots.last() {
        if last_t < upper_t {
            let edge_cdf = if domain.upper_open() {
                (1.0 - mass).max(last_cdf + (1.0 - last_cdf) / 2.0)
            } else {
                1.0
            };
            knots.push((upper_t, edge_cdf));
        }
    }

    knots.into_iter().unzip()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Interpolation;
    use crate::domain::{resolve_domain, QuestionBounds};

    fn anchors(pairs: &[(f64, f64)]) -> Vec<PercentileAnchor> {
        pairs
            .iter()
            .map(|&(p, v)| PercentileAnchor::new(p, v))
            .collect()
    }

    #[test]
    fn closed_domain_runs_from_zero_to_one() {
        let domain = resolve_domain(&QuestionBounds::closed(0.0, 100.0)).unwrap();
        let cfg = EngineConfig::default().with_grid_points(5);
        let dist =
            build_distribution(&anchors(&[(10.0, 5.0), (50.0, 20.0), (90.0, 80.0)]), &domain, &cfg)
                .unwrap();

        assert_eq!(dist.xs(), vec![0.0, 25.0, 50.0, 75.0, 100.0]);
        let cdf = dist.cdf_values();
        assert_eq!(cdf[0], 0.0);
        assert_eq!(cdf[4], 1.0);
        assert!(cdf.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn open_bounds_keep_mass_beyond_edges() {
        let domain =
            resolve_domain(&QuestionBounds::closed(0.0, 100.0).open(true, true)).unwrap();
        let cfg = EngineConfig::default();
        let dist = build_distribution(
            &anchors(&[(10.0, 20.0), (50.0, 50.0), (90.0, 80.0)]),
            &domain,
            &cfg,
        )
        .unwrap();
        let cdf = dist.cdf_values();
        assert!((cdf[0] - cfg.open_bound_mass).abs() < 1e-12);
        assert!((cdf[cdf.len() - 1] - (1.0 - cfg.open_bound_mass)).abs() < 1e-12);
        assert!(cdf[1] > cdf[0]);
    }

    #[test]
    fn anchor_on_open_edge_suppresses_implicit_knot() {
        let domain =
            resolve_domain(&QuestionBounds::closed(0.0, 100.0).open(true, false)).unwrap();
        let cfg = EngineConfig::default().with_grid_points(11);
        let dist = build_distribution(&anchors(&[(5.0, 0.0), (95.0, 90.0)]), &domain, &cfg)
            .unwrap();
        assert!((dist.cdf_values()[0] - 0.05).abs() < 1e-12);
    }

    #[test]
    fn extreme_percentiles_stay_inside_implicit_edges() {
        let domain =
            resolve_domain(&QuestionBounds::closed(0.0, 100.0).open(true, true)).unwrap();
        let cfg = EngineConfig::default();
        let dist = build_distribution(
            &anchors(&[(0.01, 10.0), (50.0, 50.0), (99.99, 90.0)]),
            &domain,
            &cfg,
        )
        .unwrap();
        let cdf = dist.cdf_values();
        assert!(cdf[0] > 0.0 && cdf[0] < 0.0001);
        assert!(cdf[cdf.len() - 1] < 1.0 && cdf[cdf.len() - 1] > 0.9999);
        assert!(cdf.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn repeated_values_collapse_to_highest_percentile() {
        let domain = resolve_domain(&QuestionBounds::closed(0.0, 10.0)).unwrap();
        let cfg = EngineConfig::default()
            .with_grid_points(11)
            .with_interpolation(Interpolation::Linear);
        let dist = build_distribution(
            &anchors(&[(10.0, 2.0), (40.0, 5.0), (60.0, 5.0), (90.0, 8.0)]),
            &domain,
            &cfg,
        )
        .unwrap();
        assert!((dist.cdf_values()[5] - 0.6).abs() < 1e-12);
    }

    #[test]
    fn log_domain_interpolates_in_log_space() {
        let domain =
            resolve_domain(&QuestionBounds::closed(1.0, 1000.0).log_scaled(0.0)).unwrap();
        let cfg = EngineConfig::default()
            .with_grid_points(4)
            .with_interpolation(Interpolation::Linear);
        let dist = build_distribution(&anchors(&[(50.0, 31.622776601683793)]), &domain, &cfg)
            .unwrap();
        let cdf = dist.cdf_values();
        // Median at the geometric midpoint: one-third of the way per grid step.
        assert!((cdf[1] - 1.0 / 3.0).abs() < 1e-9);
        assert!((cdf[2] - 2.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn malformed_inputs_fail() {
        let domain = resolve_domain(&QuestionBounds::closed(0.0, 100.0)).unwrap();
        let cfg = EngineConfig::default();
        assert!(matches!(
            build_distribution(&anchors(&[(50.0, 150.0)]), &domain, &cfg),
            Err(BuildError::AnchorOutsideDomain { .. })
        ));
        assert!(matches!(
            build_distribution(&[], &domain, &cfg),
            Err(BuildError::NoAnchors)
        ));
        assert!(matches!(
            build_distribution(
                &anchors(&[(50.0, 10.0)]),
                &domain,
                &EngineConfig::default().with_grid_points(1)
            ),
            Err(BuildError::TooFewGridPoints(1))
        ));
    }
}
