use thiserror::Error;

/// 注册表核心错误，操作失败时原子回退，不会留下部分修改
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Invalid token for service: {service_id}")]
    Auth { service_id: String },

    #[error("Service does not exist: {service_id}")]
    ServiceNotExist { service_id: String },

    #[error("Internal registry error: {0}")]
    Internal(String),
}

impl RegistryError {
    /// 错误分类标签
    pub fn kind(&self) -> &'static str {
        match self {
            RegistryError::Validation(_) => "VALIDATION_ERROR",
            RegistryError::Auth { .. } => "AUTH_ERROR",
            RegistryError::ServiceNotExist { .. } => "SERVICE_NO_EXIST",
            RegistryError::Internal(_) => "REGISTRY_ERROR",
        }
    }
}
