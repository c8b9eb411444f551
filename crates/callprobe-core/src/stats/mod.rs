//! Descriptive statistics shared by the analysis stages
//!
//! Mean, population standard deviation and linearly interpolated
//! percentiles over `f64` samples, plus the finite-value guard used before
//! any number enters a report.

pub mod descriptive;

pub use descriptive::{finite_or_zero, mean, percentile, population_std, Distribution};
