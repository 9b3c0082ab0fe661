pub mod prober;

pub use prober::{HealthProber, ProbeError};
