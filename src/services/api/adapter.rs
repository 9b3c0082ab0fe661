use super::envelope::{ApiResponse, ErrorResponse, HealthCheck, HealthCheckResponse};
use crate::services::registry::token::mask_token;
use crate::services::registry::{
    HealthStatus, Instance, InstanceRegisterRequest, ListFilter, Registry, RegistrationResponse,
    RegistryError,
};

/// 注册表与网关之间的适配层：把核心结果包进 `ApiResponse`
///
/// 查询接口返回的实例会遮蔽令牌，完整令牌只在注册响应中出现。
#[derive(Debug, Clone)]
pub struct RegistryApi {
    registry: Registry,
}

impl RegistryApi {
    pub fn new(registry: Registry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    fn wrap<T>(&self, result: Result<T, RegistryError>) -> ApiResponse<T> {
        let timestamp = self.registry.now_millis();
        match result {
            Ok(data) => ApiResponse::ok(data, timestamp),
            Err(e) => {
                tracing::debug!(error = %e, kind = e.kind(), "Registry operation failed");
                ApiResponse::err(ErrorResponse::from(&e), timestamp)
            }
        }
    }

    fn wrap_empty(&self, result: Result<(), RegistryError>) -> ApiResponse<()> {
        match result {
            Ok(()) => ApiResponse::empty(self.registry.now_millis()),
            Err(e) => self.wrap(Err(e)),
        }
    }

    fn redact(mut instance: Instance) -> Instance {
        instance.token = mask_token(&instance.token);
        instance
    }

    pub fn register(&self, req: InstanceRegisterRequest) -> ApiResponse<RegistrationResponse> {
        self.wrap(self.registry.register(req))
    }

    pub fn update_health(
        &self,
        id: &str,
        token: &str,
        status: HealthStatus,
    ) -> ApiResponse<()> {
        self.wrap_empty(self.registry.update_health(id, token, status))
    }

    pub fn touch(&self, id: &str, token: &str) -> ApiResponse<()> {
        self.wrap_empty(self.registry.touch(id, token))
    }

    pub fn deregister(&self, id: &str, token: &str) -> ApiResponse<bool> {
        self.wrap(self.registry.deregister(id, token))
    }

    pub fn get(&self, id: &str) -> ApiResponse<Instance> {
        self.wrap(self.registry.get(id).map(Self::redact))
    }

    pub fn list(&self, filter: &ListFilter) -> ApiResponse<Vec<Instance>> {
        self.wrap(
            self.registry
                .list(filter)
                .map(|list| list.into_iter().map(Self::redact).collect()),
        )
    }

    pub fn reap(&self, max_age_ms: u64) -> ApiResponse<usize> {
        self.wrap(self.registry.reap(max_age_ms))
    }

    /// 网关自身的健康探测结果
    pub fn health(&self) -> HealthCheckResponse {
        let stats = self.registry.stats().and_then(|stats| {
            serde_json::to_value(stats)
                .map_err(|e| RegistryError::Internal(format!("failed to encode stats: {e}")))
        });
        self.wrap(stats.map(|stats| {
            let mut check = HealthCheck::new(HealthStatus::Up);
            check.extra.insert("instances".to_string(), stats);
            check
        }))
    }
}
