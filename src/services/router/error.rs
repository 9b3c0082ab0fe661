use thiserror::Error;

use crate::services::api::{ErrorCode, ErrorResponse};

// 路由层错误（请求还没有到达注册表）
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RouterError {
    #[error("Route not found: {0}")]
    NotFound(String),
    #[error("Method {method} not allowed for {path}")]
    MethodNotAllowed { method: String, path: String },
    #[error("Bad request: {0}")]
    BadRequest(String),
    #[error("Unauthorized: {0}")]
    Unauthorized(String),
    #[error("Request body exceeds {0} bytes")]
    PayloadTooLarge(usize),
}

impl RouterError {
    pub fn status(&self) -> http::StatusCode {
        match self {
            RouterError::NotFound(_) => http::StatusCode::NOT_FOUND,
            RouterError::MethodNotAllowed { .. } => http::StatusCode::METHOD_NOT_ALLOWED,
            RouterError::BadRequest(_) => http::StatusCode::BAD_REQUEST,
            RouterError::Unauthorized(_) => http::StatusCode::UNAUTHORIZED,
            RouterError::PayloadTooLarge(_) => http::StatusCode::PAYLOAD_TOO_LARGE,
        }
    }
}

impl From<&RouterError> for ErrorResponse {
    fn from(err: &RouterError) -> Self {
        let code = match err {
            RouterError::NotFound(_) | RouterError::MethodNotAllowed { .. } => {
                ErrorCode::GatewayError
            }
            RouterError::BadRequest(_) | RouterError::PayloadTooLarge(_) => {
                ErrorCode::ServiceError
            }
            RouterError::Unauthorized(_) => ErrorCode::auth(),
        };
        ErrorResponse::new(code, err.to_string())
    }
}
