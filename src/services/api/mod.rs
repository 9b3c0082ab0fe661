pub mod adapter;
pub mod envelope;

pub use adapter::RegistryApi;
pub use envelope::{
    ApiError, ApiResponse, ErrorCode, ErrorResponse, HealthCheck, HealthCheckResponse,
};
