//! Platform invariants for dense distributions: check, repair or reject.
//!
//! Checks are reported in a fixed order and accumulate violations:
//! 1. grid shape (x spans the domain, strictly increasing): reject
//! 2. monotonicity: repair (running max, flattened run re-spaced)
//! 3. minimum spacing over every window of `w` steps: reject
//! 4. maximum concentration of mass in one step: reject
//! 5. open-bound endpoints strictly inside (0, 1): repair
//!
//! Both repairs run before the rejecting checks, so spacing and concentration
//! are judged on the values that are actually returned. A `Repaired` output
//! re-validates as `Accepted`.
//!
//! Monotonicity and endpoint problems come from interpolation numerics and are
//! fixed in place. Flat regions and spikes reflect the elicited judgement
//! itself and are never fabricated away.

use serde::{Deserialize, Serialize};

use crate::config::EngineConfig;
use crate::domain::Domain;
use crate::error::InvalidDistributionError;

use super::types::{DenseDistribution, ValidationVerdict, Violation, ViolationKind};

/// Relative tolerance when comparing grid endpoints to domain bounds.
const GRID_EDGE_TOLERANCE: f64 = 1e-9;

/// A distribution after validation, possibly repaired.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidatedDistribution {
    pub distribution: DenseDistribution,
    pub verdict: ValidationVerdict,
}

/// Run every check, repairing what can be repaired.
pub fn validate(
    mut dist: DenseDistribution,
    domain: &Domain,
    config: &EngineConfig,
) -> ValidatedDistribution {
    let mut violations = Vec::new();

    violations.extend(check_grid_shape(&dist, domain, config));

    let mut cdf = dist.cdf_values();
    violations.extend(repair_monotonicity(
        &mut cdf,
        cdf_ceiling(domain, config.open_bound_mass),
    ));
    let endpoint_repairs = repair_endpoints(&mut cdf, domain, config.open_bound_mass);
    violations.extend(check_min_spacing(
        &cdf,
        config.min_spacing_window,
        config.min_spacing,
    ));
    violations.extend(check_max_concentration(&cdf, config.max_concentration));
    violations.extend(endpoint_repairs);

    for (point, value) in dist.points.iter_mut().zip(cdf) {
        point.cdf = value;
    }

    let verdict = ValidationVerdict::from_violations(violations);
    if verdict.repaired {
        tracing::debug!(
            violations = verdict.violations.len(),
            "Repaired distribution during validation"
        );
    }
    ValidatedDistribution {
        distribution: dist,
        verdict,
    }
}

/// Validate and convert a rejection into an error naming every violation.
pub fn admit(
    dist: DenseDistribution,
    domain: &Domain,
    config: &EngineConfig,
) -> Result<ValidatedDistribution, InvalidDistributionError> {
    let validated = validate(dist, domain, config);
    if validated.verdict.accepted {
        Ok(validated)
    } else {
        Err(InvalidDistributionError {
            violations: validated.verdict.violations,
        })
    }
}

fn check_grid_shape(
    dist: &DenseDistribution,
    domain: &Domain,
    config: &EngineConfig,
) -> Option<Violation> {
    let points = dist.points();
    let k = points.len();
    let bad = |start: usize, end: usize| {
        Some(Violation::new(
            ViolationKind::GridShape,
            start,
            end.max(start),
        ))
    };

    if k != config.grid_points || k < 2 {
        return bad(0, k.saturating_sub(1));
    }
    let scale = (domain.upper() - domain.lower()).abs().max(1.0);
    if (points[0].x - domain.lower()).abs() > GRID_EDGE_TOLERANCE * scale {
        return bad(0, 0);
    }
    if (points[k - 1].x - domain.upper()).abs() > GRID_EDGE_TOLERANCE * scale {
        return bad(k - 1, k - 1);
    }
    if let Some(i) = points.windows(2).position(|w| !(w[0].x < w[1].x)) {
        return bad(i, i + 1);
    }
    if let Some(i) = points
        .iter()
        .position(|p| !(0.0..=1.0).contains(&p.cdf))
    {
        return bad(i, i);
    }
    None
}

/// Highest cdf the last grid point may carry.
pub(crate) fn cdf_ceiling(domain: &Domain, mass: f64) -> f64 {
    if domain.upper_open() {
        1.0 - mass
    } else {
        1.0
    }
}

/// Force a non-decreasing cdf. Each dip is raised to the running maximum and
/// the flattened run is re-spaced linearly up to the next point above it.
/// A run that reaches the end is re-spaced up to `ceiling`; when the run
/// already sits at the ceiling, the ramp starts from the last point below it.
pub(crate) fn repair_monotonicity(cdf: &mut [f64], ceiling: f64) -> Vec<Violation> {
    let n = cdf.len();
    let mut violations = Vec::new();
    let mut i = 1;
    while i < n {
        if cdf[i] >= cdf[i - 1] {
            i += 1;
            continue;
        }
        let mut start = i - 1;
        let mut end = i;
        while end < n && cdf[end] <= cdf[start] {
            end += 1;
        }

        if end < n {
            ramp(cdf, start, end, cdf[end]);
        } else {
            let last = n - 1;
            while start > 0 && cdf[start] >= ceiling {
                start -= 1;
            }
            if cdf[start] < ceiling {
                ramp(cdf, start, last, ceiling);
                cdf[last] = ceiling;
            } else {
                let level = cdf[start];
                for value in cdf.iter_mut().skip(start + 1) {
                    *value = level;
                }
            }
        }
        violations.push(Violation::new(ViolationKind::NonMonotonic, start, end - 1));
        i = end;
    }
    violations
}

/// Linear values strictly between `cdf[start]` and `target` on `start+1..end`.
fn ramp(cdf: &mut [f64], start: usize, end: usize, target: f64) {
    let level = cdf[start];
    let span = (end - start) as f64;
    for idx in start + 1..end {
        cdf[idx] = level + (target - level) * (idx - start) as f64 / span;
    }
}

/// Every window of `window` steps must rise by at least `min_rise`.
/// Overlapping offending windows are merged into one range.
fn check_min_spacing(cdf: &[f64], window: usize, min_rise: f64) -> Vec<Violation> {
    let mut violations: Vec<Violation> = Vec::new();
    if window == 0 || cdf.len() <= window {
        return violations;
    }
    for i in 0..cdf.len() - window {
        if cdf[i + window] - cdf[i] >= min_rise {
            continue;
        }
        match violations.last_mut() {
            Some(last) if last.end >= i => last.end = i + window,
            _ => violations.push(Violation::new(ViolationKind::MinSpacing, i, i + window)),
        }
    }
    violations
}

/// No single step may carry more than `max_share` of the total mass.
fn check_max_concentration(cdf: &[f64], max_share: f64) -> Vec<Violation> {
    let (Some(first), Some(last)) = (cdf.first(), cdf.last()) else {
        return Vec::new();
    };
    let total = last - first;
    if total <= 0.0 {
        return Vec::new();
    }
    cdf.windows(2)
        .enumerate()
        .filter(|(_, w)| (w[1] - w[0]) / total > max_share)
        .map(|(i, _)| Violation::new(ViolationKind::MaxConcentration, i, i + 1))
        .collect()
}

/// Open bounds need cdf[0] > 0 and cdf[K-1] < 1; nudge by `mass` when not.
pub(crate) fn repair_endpoints(cdf: &mut [f64], domain: &Domain, mass: f64) -> Vec<Violation> {
    let n = cdf.len();
    let mut violations = Vec::new();
    if n < 2 {
        return violations;
    }

    // Nudges stay strictly inside the neighbouring point so no flat step appears.
    if domain.lower_open() && cdf[0] <= 0.0 {
        let nudged = mass.min(cdf[1] / 2.0);
        let violation = Violation::new(ViolationKind::EndpointConcentration, 0, 0);
        if nudged > 0.0 {
            cdf[0] = nudged;
            violations.push(violation);
        } else {
            violations.push(violation.unrepaired());
        }
    }
    if domain.upper_open() && cdf[n - 1] >= 1.0 {
        let nudged = (1.0 - mass).max(cdf[n - 2] + (1.0 - cdf[n - 2]) / 2.0);
        let violation = Violation::new(ViolationKind::EndpointConcentration, n - 1, n - 1);
        if nudged < 1.0 {
            cdf[n - 1] = nudged;
            violations.push(violation);
        } else {
            violations.push(violation.unrepaired());
        }
    }
    violations
}
