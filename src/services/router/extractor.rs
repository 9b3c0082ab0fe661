use http::{HeaderMap, Method};

use super::error::RouterError;
use crate::services::registry::ListFilter;

/// 路由前缀，同时也是 `NamedService::NAME`
pub const ROUTE_PREFIX: &str = "registry";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Register,
    List,
    Get(String),
    Deregister(String),
    UpdateHealth(String),
    Touch(String),
    Reap,
    GatewayHealth,
}

// 解析 "/registry/..." 路径与方法
pub fn extract_route(method: &Method, path: &str) -> Result<Route, RouterError> {
    if !path.starts_with('/') {
        return Err(RouterError::NotFound(path.to_string()));
    }

    let parts: Vec<&str> = path.split('/').filter(|part| !part.is_empty()).collect();
    let Some((prefix, rest)) = parts.split_first() else {
        return Err(RouterError::NotFound(path.to_string()));
    };
    if *prefix != ROUTE_PREFIX {
        return Err(RouterError::NotFound(path.to_string()));
    }

    let not_allowed = || RouterError::MethodNotAllowed {
        method: method.to_string(),
        path: path.to_string(),
    };

    match rest {
        ["instances"] => match *method {
            Method::POST => Ok(Route::Register),
            Method::GET => Ok(Route::List),
            _ => Err(not_allowed()),
        },
        ["instances", id] => match *method {
            Method::GET => Ok(Route::Get(id.to_string())),
            Method::DELETE => Ok(Route::Deregister(id.to_string())),
            _ => Err(not_allowed()),
        },
        ["instances", id, "health"] => match *method {
            Method::PUT => Ok(Route::UpdateHealth(id.to_string())),
            _ => Err(not_allowed()),
        },
        ["instances", id, "heartbeat"] => match *method {
            Method::PUT => Ok(Route::Touch(id.to_string())),
            _ => Err(not_allowed()),
        },
        ["reap"] => match *method {
            Method::POST => Ok(Route::Reap),
            _ => Err(not_allowed()),
        },
        ["health"] => match *method {
            Method::GET => Ok(Route::GatewayHealth),
            _ => Err(not_allowed()),
        },
        _ => Err(RouterError::NotFound(path.to_string())),
    }
}

// 从 Authorization: Bearer <token> 中取出实例令牌
pub fn bearer_token(headers: &HeaderMap) -> Result<String, RouterError> {
    let value = headers
        .get(http::header::AUTHORIZATION)
        .ok_or_else(|| RouterError::Unauthorized("missing Authorization header".to_string()))?;
    let value = value
        .to_str()
        .map_err(|_| RouterError::Unauthorized("malformed Authorization header".to_string()))?;
    match value.strip_prefix("Bearer ") {
        Some(token) if !token.trim().is_empty() => Ok(token.trim().to_string()),
        _ => Err(RouterError::Unauthorized(
            "expected 'Bearer <token>'".to_string(),
        )),
    }
}

// 解析列表查询参数 ?serviceType=&healthyOnly=
pub fn list_filter(query: Option<&str>) -> Result<ListFilter, RouterError> {
    serde_urlencoded::from_str(query.unwrap_or_default())
        .map_err(|e| RouterError::BadRequest(format!("invalid query: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_routes() {
        let cases = [
            (Method::POST, "/registry/instances", Route::Register),
            (Method::GET, "/registry/instances/", Route::List),
            (Method::GET, "/registry/instances/abc", Route::Get("abc".into())),
            (
                Method::DELETE,
                "/registry/instances/abc",
                Route::Deregister("abc".into()),
            ),
            (
                Method::PUT,
                "/registry/instances/abc/health",
                Route::UpdateHealth("abc".into()),
            ),
            (
                Method::PUT,
                "/registry/instances/abc/heartbeat",
                Route::Touch("abc".into()),
            ),
            (Method::POST, "/registry/reap", Route::Reap),
            (Method::GET, "/registry/health", Route::GatewayHealth),
        ];
        for (method, path, expected) in cases {
            assert_eq!(extract_route(&method, path).unwrap(), expected, "{path}");
        }
    }

    #[test]
    fn test_extract_route_errors() {
        assert!(matches!(
            extract_route(&Method::GET, "/other/instances"),
            Err(RouterError::NotFound(_))
        ));
        assert!(matches!(
            extract_route(&Method::GET, "/registry/instances/a/b/c"),
            Err(RouterError::NotFound(_))
        ));
        assert!(matches!(
            extract_route(&Method::PATCH, "/registry/instances"),
            Err(RouterError::MethodNotAllowed { .. })
        ));
        assert!(matches!(
            extract_route(&Method::GET, "/registry/reap"),
            Err(RouterError::MethodNotAllowed { .. })
        ));
    }

    #[test]
    fn test_bearer_token() {
        let mut headers = HeaderMap::new();
        assert!(bearer_token(&headers).is_err());

        headers.insert(http::header::AUTHORIZATION, "Basic abc".parse().unwrap());
        assert!(bearer_token(&headers).is_err());

        headers.insert(http::header::AUTHORIZATION, "Bearer tok-123".parse().unwrap());
        assert_eq!(bearer_token(&headers).unwrap(), "tok-123");
    }

    #[test]
    fn test_list_filter_query() {
        assert_eq!(list_filter(None).unwrap(), ListFilter::default());
        assert_eq!(
            list_filter(Some("serviceType=product-database&healthyOnly=true")).unwrap(),
            ListFilter::service_type("product-database").healthy_only()
        );
        assert!(list_filter(Some("healthyOnly=maybe")).is_err());
    }
}
