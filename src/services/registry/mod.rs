//! Registry module
//!
//! The authoritative set of service instances, split into:
//! - `types`: instance records and request/response shapes
//! - `service`: the `Registry` itself (registration, health, lookup, reaping)
//! - `token`: token issuance and comparison
//! - `clock`: the time source used for every timestamp
//! - `error`: core error taxonomy

pub mod clock;
pub mod error;
pub mod service;
pub mod token;
pub mod types;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::RegistryError;
pub use service::{InstanceList, Registry};
pub use types::{
    HealthStatus, Instance, InstanceMeta, InstanceRegisterRequest, ListFilter,
    RegistrationResponse, RegistryStats,
};
