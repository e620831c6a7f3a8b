//! Parse free-form model output into percentile anchors.
//!
//! Recognises lines such as:
//!
//! ```text
//! Percentile 10: 1,250
//! - **Percentile 50:** $3.2 million
//! Percentile 90 = 2031-06-30 (newest date)
//! ```
//!
//! The last occurrence of a percentile wins, since the final answer usually
//! follows earlier drafts. Non-monotone anchors are reported, never fixed.

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::distribution::types::PercentileAnchor;
use crate::error::{AttemptError, ExtractionError, MonotonicityError};

/// Fewest anchors that still describe a spread.
pub const MIN_ANCHORS: usize = 2;

static PERCENTILE_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?im)^[\s>*_#\-]*percentile\s*(\d+(?:\.\d+)?)(?:st|nd|rd|th)?[\s*_]*[:=][\s*_`]*(.*)$",
    )
    .expect("Invalid percentile line regex")
});

static NUMBER_VALUE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)^([-+\x{2212}]?)\s*[$€£]?\s*((?:\d{1,3}(?:,\d{3})+|\d+)(?:\.\d+)?|\.\d+)(?:e([-+]?\d+))?(?:\s*(thousand|million|billion|trillion)\b)?",
    )
    .expect("Invalid number value regex")
});

static DATE_VALUE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{4}-\d{2}-\d{2})\b").expect("Invalid date value regex"));

/// Anchors sorted by percentile, checked for monotonic values.
pub fn extract_anchors(text: &str) -> Result<Vec<PercentileAnchor>, AttemptError> {
    let anchors = parse_anchors(text)?;
    check_monotonic(&anchors)?;
    Ok(anchors)
}

/// Anchors sorted by percentile with duplicates resolved to the last occurrence.
/// Values are not checked for monotonicity.
pub fn parse_anchors(text: &str) -> Result<Vec<PercentileAnchor>, ExtractionError> {
    let mut matched_lines = 0usize;
    let mut anchors: Vec<PercentileAnchor> = Vec::new();

    for caps in PERCENTILE_LINE.captures_iter(text) {
        matched_lines += 1;
        let Ok(percentile) = caps[1].parse::<f64>() else {
            continue;
        };
        if !(percentile > 0.0 && percentile < 100.0) {
            tracing::debug!(percentile, "Skipping percentile outside (0, 100)");
            continue;
        }
        let Some(value) = parse_value(&caps[2]) else {
            tracing::debug!(percentile, raw = %caps[2].trim(), "Skipping unparseable percentile value");
            continue;
        };

        match anchors.iter_mut().find(|a| a.percentile == percentile) {
            Some(existing) => existing.value = value,
            None => anchors.push(PercentileAnchor::new(percentile, value)),
        }
    }

    if matched_lines == 0 {
        return Err(ExtractionError::NoPercentileLines);
    }
    if anchors.len() < MIN_ANCHORS {
        return Err(ExtractionError::TooFewAnchors {
            found: anchors.len(),
            required: MIN_ANCHORS,
        });
    }

    anchors.sort_by(|a, b| a.percentile.total_cmp(&b.percentile));
    Ok(anchors)
}

/// Values must be non-decreasing in percentile order.
pub fn check_monotonic(anchors: &[PercentileAnchor]) -> Result<(), MonotonicityError> {
    match anchors.windows(2).find(|w| w[1].value < w[0].value) {
        Some(w) => Err(MonotonicityError {
            lower_percentile: w[0].percentile,
            lower_value: w[0].value,
            higher_percentile: w[1].percentile,
            higher_value: w[1].value,
        }),
        None => Ok(()),
    }
}

/// Parse one value token: an ISO date (as Unix seconds at UTC midnight) or a
/// number with optional sign, currency, separators, exponent and scale word.
pub fn parse_value(raw: &str) -> Option<f64> {
    let token = raw.trim().trim_start_matches(['*', '_', '`', '"', '\'']);

    if let Some(caps) = DATE_VALUE.captures(token) {
        let date = NaiveDate::parse_from_str(&caps[1], "%Y-%m-%d").ok()?;
        let timestamp = date.and_hms_opt(0, 0, 0)?.and_utc().timestamp();
        return Some(timestamp as f64);
    }

    let caps = NUMBER_VALUE.captures(token)?;
    let mut digits = caps[2].replace(',', "");
    if let Some(exp) = caps.get(3) {
        digits = format!("{digits}e{}", exp.as_str());
    }
    let mut value: f64 = digits.parse().ok()?;
    if let Some(scale) = caps.get(4) {
        value *= match scale.as_str().to_ascii_lowercase().as_str() {
            "thousand" => 1e3,
            "million" => 1e6,
            "billion" => 1e9,
            _ => 1e12,
        };
    }
    if matches!(&caps[1], "-" | "\u{2212}") {
        value = -value;
    }
    value.is_finite().then_some(value)
}
