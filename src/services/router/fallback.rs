use bytes::Bytes;
use futures::future::BoxFuture;
use http_body::Body;
use http_body_util::BodyExt;
use std::task::{Context, Poll};
use tower::{Layer, Service};

use super::extractor;
use super::response::{self, BoxError, BoxResponse};
use crate::services::registry::Registry;

/// 在 tonic 路由表之前拦截无法识别的请求
///
/// tonic 只把 `/registry/*` 交给 `RegistryRouter`，其余路径会落到 gRPC 的
/// unimplemented 响应。这里对 `extract_route` 不接受的请求直接返回 JSON 信封。
#[derive(Debug, Clone)]
pub struct EnvelopeFallbackLayer {
    registry: Registry,
}

impl EnvelopeFallbackLayer {
    pub fn new(registry: Registry) -> Self {
        Self { registry }
    }
}

impl<S> Layer<S> for EnvelopeFallbackLayer {
    type Service = EnvelopeFallback<S>;

    fn layer(&self, inner: S) -> Self::Service {
        EnvelopeFallback {
            inner,
            registry: self.registry.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct EnvelopeFallback<S> {
    inner: S,
    registry: Registry,
}

impl<S, B, ResBody> Service<http::Request<B>> for EnvelopeFallback<S>
where
    S: Service<http::Request<B>, Response = http::Response<ResBody>> + Clone + Send + 'static,
    S::Future: Send + 'static,
    B: Send + 'static,
    ResBody: Body<Data = Bytes> + Send + 'static,
    ResBody::Error: Into<BoxError>,
{
    type Response = BoxResponse;
    type Error = S::Error;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: http::Request<B>) -> Self::Future {
        if let Err(e) = extractor::extract_route(req.method(), req.uri().path()) {
            let response = response::error_response(&e, self.registry.now_millis());
            return Box::pin(async move { Ok(response) });
        }

        // poll_ready 过的是 self.inner，换出它再放回一个克隆
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);
        Box::pin(async move {
            let response = inner.call(req).await?;
            Ok(response.map(|body| body.map_err(Into::into).boxed_unsync()))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::Full;
    use serde_json::Value;
    use std::convert::Infallible;
    use tower::ServiceExt;

    async fn json_of(response: BoxResponse) -> (u16, Value) {
        let status = response.status().as_u16();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    fn service()
    -> impl Service<http::Request<Full<Bytes>>, Response = BoxResponse, Error = Infallible> {
        let inner = tower::service_fn(|_req: http::Request<Full<Bytes>>| async {
            Ok::<_, Infallible>(http::Response::new(Full::new(Bytes::from_static(
                br#"{"inner":true}"#,
            ))))
        });
        EnvelopeFallbackLayer::new(Registry::new()).layer(inner)
    }

    fn request(method: &str, path: &str) -> http::Request<Full<Bytes>> {
        http::Request::builder()
            .method(method)
            .uri(path)
            .body(Full::new(Bytes::new()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_unknown_paths_get_not_found_envelope() {
        for path in ["/", "/registry", "/other/x", "/registry/nowhere"] {
            let response = service().oneshot(request("GET", path)).await.unwrap();
            let (status, body) = json_of(response).await;
            assert_eq!(status, 404, "path {path}");
            assert_eq!(body["success"], Value::Bool(false));
            assert_eq!(body["error"]["code"], "GATEWAY_ERROR");
        }
    }

    #[tokio::test]
    async fn test_known_routes_reach_inner_service() {
        let response = service()
            .oneshot(request("GET", "/registry/health"))
            .await
            .unwrap();
        let (status, body) = json_of(response).await;
        assert_eq!(status, 200);
        assert_eq!(body["inner"], Value::Bool(true));

        let response = service()
            .oneshot(request("PATCH", "/registry/instances"))
            .await
            .unwrap();
        assert_eq!(response.status(), http::StatusCode::METHOD_NOT_ALLOWED);
    }
}
