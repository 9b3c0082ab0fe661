use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::services::registry::{HealthStatus, RegistryError};

/// 共享错误码：已知取值之外允许任意字符串
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ErrorCode {
    GatewayStarting,
    GatewayError,
    RegistryError,
    ServiceNoExist,
    ServiceError,
    UnknownError,
    GatewayTimeout,
    Other(String),
}

impl ErrorCode {
    /// 令牌不匹配时使用的自定义错误码
    pub const AUTH_ERROR: &'static str = "AUTH_ERROR";

    pub fn as_str(&self) -> &str {
        match self {
            ErrorCode::GatewayStarting => "GATEWAY_STARTING",
            ErrorCode::GatewayError => "GATEWAY_ERROR",
            ErrorCode::RegistryError => "REGISTRY_ERROR",
            ErrorCode::ServiceNoExist => "SERVICE_NO_EXIST",
            ErrorCode::ServiceError => "SERVICE_ERROR",
            ErrorCode::UnknownError => "UNKNOWN_ERROR",
            ErrorCode::GatewayTimeout => "GATEWAY_TIMEOUT",
            ErrorCode::Other(code) => code,
        }
    }

    pub fn auth() -> Self {
        ErrorCode::Other(Self::AUTH_ERROR.to_string())
    }
}

impl From<String> for ErrorCode {
    fn from(code: String) -> Self {
        match code.as_str() {
            "GATEWAY_STARTING" => ErrorCode::GatewayStarting,
            "GATEWAY_ERROR" => ErrorCode::GatewayError,
            "REGISTRY_ERROR" => ErrorCode::RegistryError,
            "SERVICE_NO_EXIST" => ErrorCode::ServiceNoExist,
            "SERVICE_ERROR" => ErrorCode::ServiceError,
            "UNKNOWN_ERROR" => ErrorCode::UnknownError,
            "GATEWAY_TIMEOUT" => ErrorCode::GatewayTimeout,
            _ => ErrorCode::Other(code),
        }
    }
}

impl From<ErrorCode> for String {
    fn from(code: ErrorCode) -> Self {
        match code {
            ErrorCode::Other(code) => code,
            known => known.as_str().to_string(),
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// 结构化错误
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub code: ErrorCode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ErrorResponse {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: Some(message.into()),
        }
    }
}

impl From<&RegistryError> for ErrorResponse {
    fn from(err: &RegistryError) -> Self {
        let code = match err {
            RegistryError::Validation(_) => ErrorCode::ServiceError,
            RegistryError::Auth { .. } => ErrorCode::auth(),
            RegistryError::ServiceNotExist { .. } => ErrorCode::ServiceNoExist,
            RegistryError::Internal(_) => ErrorCode::RegistryError,
        };
        ErrorResponse::new(code, err.to_string())
    }
}

/// `error` 字段：纯文本或结构化错误
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ApiError {
    Message(String),
    Detailed(ErrorResponse),
}

impl ApiError {
    pub fn code(&self) -> Option<&ErrorCode> {
        match self {
            ApiError::Message(_) => None,
            ApiError::Detailed(detail) => Some(&detail.code),
        }
    }
}

/// 所有面向注册表的结果都使用的统一信封
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ApiError>,
    pub timestamp: u64,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T, timestamp: u64) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            timestamp,
        }
    }

    /// 成功但没有数据（对应 void 结果）
    pub fn empty(timestamp: u64) -> Self {
        Self {
            success: true,
            data: None,
            error: None,
            timestamp,
        }
    }

    pub fn err(error: ErrorResponse, timestamp: u64) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(ApiError::Detailed(error)),
            timestamp,
        }
    }

    pub fn error_code(&self) -> Option<&ErrorCode> {
        self.error.as_ref().and_then(ApiError::code)
    }
}

// 健康探测数据：status 之外的字段原样展开
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthCheck {
    pub status: HealthStatus,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl HealthCheck {
    pub fn new(status: HealthStatus) -> Self {
        Self {
            status,
            extra: Map::new(),
        }
    }
}

pub type HealthCheckResponse = ApiResponse<HealthCheck>;

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_error_code_known_and_free_form() {
        let code: ErrorCode = serde_json::from_value(json!("SERVICE_NO_EXIST")).unwrap();
        assert_eq!(code, ErrorCode::ServiceNoExist);

        let code: ErrorCode = serde_json::from_value(json!("RATE_LIMITED")).unwrap();
        assert_eq!(code, ErrorCode::Other("RATE_LIMITED".to_string()));
        assert_eq!(serde_json::to_value(&code).unwrap(), json!("RATE_LIMITED"));

        assert_eq!(
            serde_json::to_value(ErrorCode::GatewayTimeout).unwrap(),
            json!("GATEWAY_TIMEOUT")
        );
    }

    #[test]
    fn test_success_envelope_omits_absent_fields() {
        let resp = ApiResponse::ok(json!({"a": 1}), 42);
        assert_eq!(
            serde_json::to_value(&resp).unwrap(),
            json!({"success": true, "data": {"a": 1}, "timestamp": 42})
        );

        let empty: ApiResponse<()> = ApiResponse::empty(7);
        assert_eq!(
            serde_json::to_value(&empty).unwrap(),
            json!({"success": true, "timestamp": 7})
        );
    }

    #[test]
    fn test_error_envelope_shape() {
        let resp: ApiResponse<()> = ApiResponse::err(
            ErrorResponse {
                code: ErrorCode::ServiceNoExist,
                message: None,
            },
            9,
        );
        assert_eq!(
            serde_json::to_value(&resp).unwrap(),
            json!({"success": false, "error": {"code": "SERVICE_NO_EXIST"}, "timestamp": 9})
        );
    }

    #[test]
    fn test_error_field_accepts_plain_string() {
        let resp: ApiResponse<Value> = serde_json::from_value(json!({
            "success": false,
            "error": "gateway is starting",
            "timestamp": 1
        }))
        .unwrap();
        assert_eq!(
            resp.error,
            Some(ApiError::Message("gateway is starting".to_string()))
        );
        assert!(resp.error_code().is_none());
    }

    #[test]
    fn test_health_check_flattens_extra_fields() {
        let body = json!({
            "success": true,
            "data": {"status": "UP", "uptime": 12, "version": "1.2.0"},
            "timestamp": 100
        });
        let resp: HealthCheckResponse = serde_json::from_value(body.clone()).unwrap();
        let data = resp.data.as_ref().unwrap();
        assert_eq!(data.status, HealthStatus::Up);
        assert_eq!(data.extra.get("uptime"), Some(&json!(12)));
        assert_eq!(serde_json::to_value(&resp).unwrap(), body);
    }

    #[test]
    fn test_health_check_response_without_data() {
        let resp: HealthCheckResponse = serde_json::from_value(json!({
            "success": false,
            "error": {"code": "GATEWAY_STARTING", "message": "warming up"},
            "timestamp": 5
        }))
        .unwrap();
        assert!(!resp.success);
        assert!(resp.data.is_none());
        assert_eq!(resp.error_code(), Some(&ErrorCode::GatewayStarting));
    }

    #[test]
    fn test_registry_error_mapping() {
        let cases = [
            (RegistryError::Validation("x".into()), "SERVICE_ERROR"),
            (
                RegistryError::Auth {
                    service_id: "a".into(),
                },
                "AUTH_ERROR",
            ),
            (
                RegistryError::ServiceNotExist {
                    service_id: "a".into(),
                },
                "SERVICE_NO_EXIST",
            ),
            (RegistryError::Internal("x".into()), "REGISTRY_ERROR"),
        ];
        for (err, expected) in cases {
            assert_eq!(ErrorResponse::from(&err).code.as_str(), expected);
        }
    }
}
