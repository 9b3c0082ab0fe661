pub mod api;
pub mod health;
pub mod reaper;
pub mod registry;
pub mod router;

pub use api::RegistryApi;
pub use registry::{Instance, Registry, RegistryError};
pub use router::RegistryRouter;
