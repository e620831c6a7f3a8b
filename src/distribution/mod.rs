//! Dense CDF construction, validation and aggregation.
//!
//! Data flows one way:
//! anchors + domain → [`build_distribution`] → [`validate`] → (×N) → [`aggregate`].

pub mod aggregate;
pub mod builder;
pub mod interpolate;
pub mod types;
pub mod validator;

pub use aggregate::aggregate;
pub use builder::build_distribution;
pub use types::*;
pub use validator::{admit, validate, ValidatedDistribution};
