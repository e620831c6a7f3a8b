//! Engine configuration: grid resolution, interpolation scheme and validator thresholds.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Interpolation scheme used between anchors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Interpolation {
    /// Piecewise linear in the unit coordinate.
    Linear,
    /// Fritsch–Carlson monotone cubic Hermite (PCHIP).
    #[default]
    MonotoneCubic,
}

/// Configuration for building, validating and aggregating distributions.
///
/// Defaults follow the scoring platform's published constraints for continuous
/// questions: 201 grid points, at least 0.001 of mass beyond an open bound,
/// per-step increase of at least 5e-5 and at most 0.59.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Number of grid points K.
    pub grid_points: usize,
    pub interpolation: Interpolation,

    // -- Open bounds ---------------------------------------------------------

    /// Probability mass kept beyond an open bound. The implicit anchor on an
    /// open lower bound carries this cdf; the upper one carries `1 - mass`.
    pub open_bound_mass: f64,
    /// Fraction of the (unit) range the effective interpolation endpoint sits
    /// inside an open bound.
    pub open_bound_inset: f64,

    // -- Validator thresholds ------------------------------------------------

    /// Window w (in grid steps) over which the cdf must rise by `min_spacing`.
    pub min_spacing_window: usize,
    /// ε_min: minimum cdf increase across every window of `min_spacing_window` steps.
    pub min_spacing: f64,
    /// ε_max: maximum share of total mass a single grid step may carry.
    pub max_concentration: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            grid_points: 201,
            interpolation: Interpolation::MonotoneCubic,
            open_bound_mass: 0.001,
            open_bound_inset: 0.0005,
            min_spacing_window: 1,
            min_spacing: 5e-5,
            max_concentration: 0.59,
        }
    }
}

impl EngineConfig {
    /// Load a JSON config; missing fields take their defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        let config: EngineConfig = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_grid_points(mut self, k: usize) -> Self {
        self.grid_points = k;
        self
    }

    pub fn with_interpolation(mut self, interpolation: Interpolation) -> Self {
        self.interpolation = interpolation;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: &str| Err(ConfigError::Invalid(msg.to_string()));

        if self.grid_points < 2 {
            return invalid("grid_points must be >= 2");
        }
        if self.min_spacing_window == 0 || self.min_spacing_window >= self.grid_points {
            return invalid("min_spacing_window must be in [1, grid_points)");
        }
        if !(self.open_bound_mass > 0.0 && self.open_bound_mass < 0.5) {
            return invalid("open_bound_mass must be in (0, 0.5)");
        }
        if !(self.open_bound_inset >= 0.0 && self.open_bound_inset < 0.5) {
            return invalid("open_bound_inset must be in [0, 0.5)");
        }
        // An inset wider than one grid step would leave a flat run at the edge.
        if self.open_bound_inset * (self.grid_points - 1) as f64 >= 1.0 {
            return invalid("open_bound_inset must be narrower than one grid step");
        }
        if !(self.min_spacing >= 0.0 && self.min_spacing.is_finite()) {
            return invalid("min_spacing must be >= 0");
        }
        if !(self.max_concentration > 0.0 && self.max_concentration <= 1.0) {
            return invalid("max_concentration must be in (0, 1]");
        }
        Ok(())
    }
}
