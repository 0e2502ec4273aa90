pub mod estimator;

pub use estimator::{estimate, EstimateReport, EstimatorParams};
