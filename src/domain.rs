//! Question bounds → legal value domain.
//!
//! A [`Domain`] maps values to a unit coordinate `t ∈ [0, 1]`. Linear domains
//! use `t = (x - lower) / (upper - lower)`. Log-scaled domains use
//! `x(t) = z + (lower - z) · r^t` with `r = (upper - z) / (lower - z)`, so grid
//! points are evenly spaced in `log(x - z)`. All interpolation happens in `t`.

use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// Question metadata as supplied by the question-fetching collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionBounds {
    pub lower_bound: f64,
    pub upper_bound: f64,
    #[serde(default)]
    pub open_lower_bound: bool,
    #[serde(default)]
    pub open_upper_bound: bool,
    /// Where the log transform's zero sits. Implies a log-scaled domain unless
    /// `log_scale` is explicitly false.
    #[serde(default)]
    pub zero_point: Option<f64>,
    #[serde(default)]
    pub log_scale: Option<bool>,
    /// Display bounds as phrased by the question author.
    #[serde(default)]
    pub nominal_lower_bound: Option<f64>,
    #[serde(default)]
    pub nominal_upper_bound: Option<f64>,
}

impl QuestionBounds {
    pub fn closed(lower: f64, upper: f64) -> Self {
        Self {
            lower_bound: lower,
            upper_bound: upper,
            open_lower_bound: false,
            open_upper_bound: false,
            zero_point: None,
            log_scale: None,
            nominal_lower_bound: None,
            nominal_upper_bound: None,
        }
    }

    pub fn open(mut self, lower_open: bool, upper_open: bool) -> Self {
        self.open_lower_bound = lower_open;
        self.open_upper_bound = upper_open;
        self
    }

    pub fn log_scaled(mut self, zero_point: f64) -> Self {
        self.log_scale = Some(true);
        self.zero_point = Some(zero_point);
        self
    }
}

/// Legal range of the forecast quantity. Immutable once resolved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Domain {
    lower: f64,
    upper: f64,
    lower_open: bool,
    upper_open: bool,
    log_scale: bool,
    zero_point: Option<f64>,
    nominal_lower: f64,
    nominal_upper: f64,
}

impl Domain {
    /// Resolve bounds into a domain, rejecting malformed metadata.
    pub fn resolve(bounds: &QuestionBounds) -> Result<Self, DomainError> {
        let lower = bounds.lower_bound;
        let upper = bounds.upper_bound;
        if !lower.is_finite() {
            return Err(DomainError::NonFinite("lower_bound"));
        }
        if !upper.is_finite() {
            return Err(DomainError::NonFinite("upper_bound"));
        }
        if lower >= upper {
            return Err(DomainError::InvertedBounds { lower, upper });
        }

        let log_scale = bounds.log_scale.unwrap_or(bounds.zero_point.is_some());
        let zero_point = if log_scale {
            let z = match bounds.zero_point {
                Some(z) if !z.is_finite() => return Err(DomainError::NonFinite("zero_point")),
                Some(z) => z,
                None if lower > 0.0 => 0.0,
                None => return Err(DomainError::MissingZeroPoint { lower }),
            };
            if (lower..=upper).contains(&z) {
                return Err(DomainError::ZeroPointInsideRange {
                    zero_point: z,
                    lower,
                    upper,
                });
            }
            Some(z)
        } else {
            None
        };

        let domain = Self {
            lower,
            upper,
            lower_open: bounds.open_lower_bound,
            upper_open: bounds.open_upper_bound,
            log_scale,
            zero_point,
            nominal_lower: bounds.nominal_lower_bound.unwrap_or(lower),
            nominal_upper: bounds.nominal_upper_bound.unwrap_or(upper),
        };
        tracing::debug!(
            lower,
            upper,
            lower_open = domain.lower_open,
            upper_open = domain.upper_open,
            log_scale,
            "Resolved question domain"
        );
        Ok(domain)
    }

    pub fn lower(&self) -> f64 {
        self.lower
    }

    pub fn upper(&self) -> f64 {
        self.upper
    }

    pub fn lower_open(&self) -> bool {
        self.lower_open
    }

    pub fn upper_open(&self) -> bool {
        self.upper_open
    }

    pub fn log_scale(&self) -> bool {
        self.log_scale
    }

    pub fn zero_point(&self) -> Option<f64> {
        self.zero_point
    }

    pub fn nominal_bounds(&self) -> (f64, f64) {
        (self.nominal_lower, self.nominal_upper)
    }

    pub fn contains(&self, x: f64) -> bool {
        (self.lower..=self.upper).contains(&x)
    }

    /// Position of `x` in the unit coordinate. Only meaningful inside the domain.
    pub fn to_unit(&self, x: f64) -> f64 {
        if x == self.lower {
            return 0.0;
        }
        if x == self.upper {
            return 1.0;
        }
        match self.zero_point {
            Some(z) if self.log_scale => {
                let ratio = (self.upper - z) / (self.lower - z);
                ((x - z) / (self.lower - z)).ln() / ratio.ln()
            }
            _ => (x - self.lower) / (self.upper - self.lower),
        }
    }

    /// Value at unit coordinate `t`; endpoints are exact.
    pub fn from_unit(&self, t: f64) -> f64 {
        if t <= 0.0 {
            return self.lower;
        }
        if t >= 1.0 {
            return self.upper;
        }
        match self.zero_point {
            Some(z) if self.log_scale => {
                let ratio = (self.upper - z) / (self.lower - z);
                z + (self.lower - z) * ratio.powf(t)
            }
            _ => self.lower + t * (self.upper - self.lower),
        }
    }

    /// `k` grid positions evenly spaced in the unit coordinate.
    pub fn grid(&self, k: usize) -> Vec<f64> {
        if k < 2 {
            return vec![self.lower; k];
        }
        let last = (k - 1) as f64;
        (0..k).map(|i| self.from_unit(i as f64 / last)).collect()
    }

    /// Unit coordinate of the effective lower interpolation endpoint. Open
    /// bounds are asymptotes, so the endpoint sits `inset` inside them.
    pub fn effective_lower_unit(&self, inset: f64) -> f64 {
        if self.lower_open {
            inset
        } else {
            0.0
        }
    }

    pub fn effective_upper_unit(&self, inset: f64) -> f64 {
        if self.upper_open {
            1.0 - inset
        } else {
            1.0
        }
    }
}

/// Resolve question bounds into a [`Domain`].
pub fn resolve_domain(bounds: &QuestionBounds) -> Result<Domain, DomainError> {
    Domain::resolve(bounds)
}
