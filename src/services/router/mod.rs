pub mod error;
pub mod extractor;
pub mod fallback;
pub mod response;

pub use error::RouterError;
pub use extractor::{ROUTE_PREFIX, Route};
pub use fallback::EnvelopeFallbackLayer;
pub use response::BoxResponse;

use bytes::Bytes;
use futures::future::BoxFuture;
use http_body::Body;
use http_body_util::{BodyExt, LengthLimitError, Limited};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::task::{Context, Poll};
use tonic::server::NamedService;
use tower::Service;

use crate::services::api::RegistryApi;
use crate::services::registry::{HealthStatus, InstanceRegisterRequest};

/// 请求体上限
pub const MAX_BODY_BYTES: usize = 64 * 1024;

// PUT /registry/instances/{id}/health 请求体
#[derive(Debug, Deserialize)]
struct HealthUpdate {
    status: HealthStatus,
}

// POST /registry/reap 请求体
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReapRequest {
    max_age_ms: u64,
}

/// 注册表的 HTTP 入口：解析路由，调用适配层，返回 JSON 信封
#[derive(Debug, Clone)]
pub struct RegistryRouter {
    pub api: RegistryApi,
}

impl RegistryRouter {
    pub fn new(api: RegistryApi) -> Self {
        Self { api }
    }

    // 收集请求体并解析 JSON，超过 MAX_BODY_BYTES 的请求体不会被完整读取
    async fn read_json<T, B>(body: B) -> Result<T, RouterError>
    where
        T: DeserializeOwned,
        B: Body<Data = Bytes> + Send + 'static,
        B::Error: Into<Box<dyn std::error::Error + Send + Sync>> + std::fmt::Debug,
    {
        if body.size_hint().lower() > MAX_BODY_BYTES as u64 {
            return Err(RouterError::PayloadTooLarge(MAX_BODY_BYTES));
        }
        let bytes = match Limited::new(body, MAX_BODY_BYTES).collect().await {
            Ok(collected) => collected.to_bytes(),
            Err(e) if e.is::<LengthLimitError>() => {
                return Err(RouterError::PayloadTooLarge(MAX_BODY_BYTES));
            }
            Err(e) => {
                return Err(RouterError::BadRequest(format!(
                    "failed to read request body: {e}"
                )));
            }
        };
        serde_json::from_slice(&bytes)
            .map_err(|e| RouterError::BadRequest(format!("invalid JSON body: {e}")))
    }

    async fn dispatch<B>(
        api: &RegistryApi,
        route: Route,
        req: http::Request<B>,
    ) -> Result<BoxResponse, RouterError>
    where
        B: Body<Data = Bytes> + Send + 'static,
        B::Error: Into<Box<dyn std::error::Error + Send + Sync>> + std::fmt::Debug,
    {
        let response = match route {
            Route::Register => {
                let body: InstanceRegisterRequest = Self::read_json(req.into_body()).await?;
                response::api_response(&api.register(body))
            }
            Route::List => {
                let filter = extractor::list_filter(req.uri().query())?;
                response::api_response(&api.list(&filter))
            }
            Route::Get(id) => response::api_response(&api.get(&id)),
            Route::Deregister(id) => {
                let token = extractor::bearer_token(req.headers())?;
                response::api_response(&api.deregister(&id, &token))
            }
            Route::UpdateHealth(id) => {
                let token = extractor::bearer_token(req.headers())?;
                let body: HealthUpdate = Self::read_json(req.into_body()).await?;
                response::api_response(&api.update_health(&id, &token, body.status))
            }
            Route::Touch(id) => {
                let token = extractor::bearer_token(req.headers())?;
                response::api_response(&api.touch(&id, &token))
            }
            Route::Reap => {
                let body: ReapRequest = Self::read_json(req.into_body()).await?;
                response::api_response(&api.reap(body.max_age_ms))
            }
            Route::GatewayHealth => response::api_response(&api.health()),
        };
        Ok(response)
    }

    pub async fn handle<B>(api: RegistryApi, req: http::Request<B>) -> BoxResponse
    where
        B: Body<Data = Bytes> + Send + 'static,
        B::Error: Into<Box<dyn std::error::Error + Send + Sync>> + std::fmt::Debug,
    {
        let path = req.uri().path().to_string();
        let route = match extractor::extract_route(req.method(), &path) {
            Ok(route) => route,
            Err(e) => return response::error_response(&e, api.registry().now_millis()),
        };

        tracing::debug!(path = %path, route = ?route, "Dispatching registry request");

        match Self::dispatch(&api, route, req).await {
            Ok(response) => response,
            Err(e) => response::error_response(&e, api.registry().now_millis()),
        }
    }
}

impl<B> Service<http::Request<B>> for RegistryRouter
where
    B: Body<Data = Bytes> + Send + 'static,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>> + std::fmt::Debug,
{
    type Response = BoxResponse;
    type Error = std::convert::Infallible;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: http::Request<B>) -> Self::Future {
        let api = self.api.clone();
        Box::pin(async move { Ok(Self::handle(api, req).await) })
    }
}

impl NamedService for RegistryRouter {
    const NAME: &'static str = ROUTE_PREFIX;
}
