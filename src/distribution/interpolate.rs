//! Monotonicity-preserving interpolation over strictly increasing knots.
//!
//! Both interpolants return non-decreasing output for non-decreasing knot
//! values. Queries outside the knot range take the nearest knot value.

use crate::config::Interpolation;

/// Interpolate `ys` (given at strictly increasing `ts`) at every query point.
pub fn interpolate(scheme: Interpolation, ts: &[f64], ys: &[f64], queries: &[f64]) -> Vec<f64> {
    debug_assert_eq!(ts.len(), ys.len());
    match ts.len() {
        0 => return vec![0.0; queries.len()],
        1 => return vec![ys[0]; queries.len()],
        _ => {}
    }
    match scheme {
        Interpolation::Linear => queries.iter().map(|&q| linear_at(ts, ys, q)).collect(),
        Interpolation::MonotoneCubic => {
            let slopes = pchip_slopes(ts, ys);
            queries
                .iter()
                .map(|&q| hermite_at(ts, ys, &slopes, q))
                .collect()
        }
    }
}

/// Index of the segment `[ts[i], ts[i+1]]` containing `q`.
fn segment(ts: &[f64], q: f64) -> usize {
    let upper = ts.partition_point(|&t| t <= q);
    upper.saturating_sub(1).min(ts.len() - 2)
}

fn linear_at(ts: &[f64], ys: &[f64], q: f64) -> f64 {
    let n = ts.len();
    if q <= ts[0] {
        return ys[0];
    }
    if q >= ts[n - 1] {
        return ys[n - 1];
    }
    let i = segment(ts, q);
    let s = (q - ts[i]) / (ts[i + 1] - ts[i]);
    ys[i] + s * (ys[i + 1] - ys[i])
}

/// Fritsch–Carlson derivative estimates: weighted harmonic mean in the
/// interior, one-sided secant at the ends. Both keep every segment inside the
/// `α, β ≤ 3` monotone region.
fn pchip_slopes(ts: &[f64], ys: &[f64]) -> Vec<f64> {
    let n = ts.len();
    let h: Vec<f64> = ts.windows(2).map(|w| w[1] - w[0]).collect();
    let delta: Vec<f64> = (0..n - 1).map(|i| (ys[i + 1] - ys[i]) / h[i]).collect();

    if n == 2 {
        return vec![delta[0], delta[0]];
    }

    let mut d = vec![0.0; n];
    for i in 1..n - 1 {
        let (m0, m1) = (delta[i - 1], delta[i]);
        if m0 == 0.0 || m1 == 0.0 || m0.signum() != m1.signum() {
            continue;
        }
        let w1 = 2.0 * h[i] + h[i - 1];
        let w2 = h[i] + 2.0 * h[i - 1];
        d[i] = (w1 + w2) / (w1 / m0 + w2 / m1);
    }
    // A zero end slope would leave near-flat tails next to implicit edge knots.
    d[0] = delta[0];
    d[n - 1] = delta[n - 2];
    d
}

fn hermite_at(ts: &[f64], ys: &[f64], d: &[f64], q: f64) -> f64 {
    let n = ts.len();
    if q <= ts[0] {
        return ys[0];
    }
    if q >= ts[n - 1] {
        return ys[n - 1];
    }
    let i = segment(ts, q);
    let h = ts[i + 1] - ts[i];
    let s = (q - ts[i]) / h;
    let s2 = s * s;
    let s3 = s2 * s;
    let h00 = 2.0 * s3 - 3.0 * s2 + 1.0;
    let h10 = s3 - 2.0 * s2 + s;
    let h01 = -2.0 * s3 + 3.0 * s2;
    let h11 = s3 - s2;
    h00 * ys[i] + h10 * h * d[i] + h01 * ys[i + 1] + h11 * h * d[i + 1]
}
