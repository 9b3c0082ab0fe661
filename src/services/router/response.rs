use bytes::Bytes;
use http::StatusCode;
use http_body_util::combinators::UnsyncBoxBody;
use http_body_util::{BodyExt, Full};
use serde::Serialize;

use super::error::RouterError;
use crate::services::api::{ApiResponse, ErrorCode, ErrorResponse};

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;
pub type BoxResponse = http::Response<UnsyncBoxBody<Bytes, BoxError>>;

// 信封中的错误码决定 HTTP 状态码
pub fn status_for<T>(resp: &ApiResponse<T>) -> StatusCode {
    if resp.success {
        return StatusCode::OK;
    }
    match resp.error_code() {
        Some(ErrorCode::ServiceError) => StatusCode::BAD_REQUEST,
        Some(ErrorCode::ServiceNoExist) => StatusCode::NOT_FOUND,
        Some(ErrorCode::GatewayTimeout) => StatusCode::GATEWAY_TIMEOUT,
        Some(ErrorCode::GatewayStarting) => StatusCode::SERVICE_UNAVAILABLE,
        Some(ErrorCode::Other(code)) if code == ErrorCode::AUTH_ERROR => StatusCode::UNAUTHORIZED,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn body(bytes: impl Into<Bytes>) -> UnsyncBoxBody<Bytes, BoxError> {
    UnsyncBoxBody::new(Full::new(bytes.into()).map_err(|never| -> BoxError { match never {} }))
}

fn build(status: StatusCode, payload: Bytes) -> BoxResponse {
    match http::Response::builder()
        .status(status)
        .header(http::header::CONTENT_TYPE, "application/json")
        .body(body(payload))
    {
        Ok(response) => response,
        Err(e) => {
            tracing::error!(error = %e, "Failed to build response");
            let mut response = http::Response::new(body(Bytes::new()));
            *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
            response
        }
    }
}

// 序列化信封为 JSON 响应
pub fn api_response<T: Serialize>(resp: &ApiResponse<T>) -> BoxResponse {
    match serde_json::to_vec(resp) {
        Ok(payload) => build(status_for(resp), Bytes::from(payload)),
        Err(e) => {
            tracing::error!(error = %e, "Failed to encode response envelope");
            let fallback = format!(
                r#"{{"success":false,"error":{{"code":"{}","message":"failed to encode response"}},"timestamp":{}}}"#,
                ErrorCode::UnknownError,
                resp.timestamp
            );
            build(StatusCode::INTERNAL_SERVER_ERROR, Bytes::from(fallback))
        }
    }
}

// 路由层错误也包装成统一信封
pub fn error_response(error: &RouterError, timestamp: u64) -> BoxResponse {
    tracing::warn!(error = %error, "Rejected gateway request");
    let resp: ApiResponse<()> = ApiResponse::err(ErrorResponse::from(error), timestamp);
    match serde_json::to_vec(&resp) {
        Ok(payload) => build(error.status(), Bytes::from(payload)),
        Err(_) => build(StatusCode::INTERNAL_SERVER_ERROR, Bytes::new()),
    }
}
