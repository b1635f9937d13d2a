use actix_web::middleware::Next;
use actix_web::{
    Error, HttpResponse,
    body::BoxBody,
    dev::{ServiceRequest, ServiceResponse},
    web,
};
use serde::Deserialize;
use subtle::ConstantTimeEq;
use tracing::{debug, info};

/// 查询接口的访问令牌，作为 app_data 注入；为空时不鉴权
#[derive(Debug, Clone, Default)]
pub struct ApiToken(Option<String>);

impl ApiToken {
    pub fn new(token: Option<String>) -> Self {
        Self(token.filter(|t| !t.is_empty()))
    }

    pub fn is_enabled(&self) -> bool {
        self.0.is_some()
    }

    fn matches(&self, provided: Option<&str>) -> bool {
        match (&self.0, provided) {
            (None, _) => true,
            (Some(expected), Some(provided)) => {
                expected.as_bytes().ct_eq(provided.as_bytes()).into()
            }
            (Some(_), None) => false,
        }
    }
}

#[derive(Deserialize)]
struct AuthQuery {
    auth: Option<String>,
}

/// 令牌鉴权中间件
///
/// 令牌来源：`?auth=<token>` 优先，其次 `Authorization: Bearer <token>`。
pub async fn token_auth(
    req: ServiceRequest,
    next: Next<BoxBody>,
) -> Result<ServiceResponse<BoxBody>, Error> {
    let Some(token) = req.app_data::<web::Data<ApiToken>>().cloned() else {
        return next.call(req).await;
    };
    if !token.is_enabled() {
        return next.call(req).await;
    }

    let from_query = web::Query::<AuthQuery>::from_query(req.query_string())
        .ok()
        .and_then(|q| q.into_inner().auth)
        .filter(|t| !t.is_empty());
    let from_header = req
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(String::from);

    if token.matches(from_query.or(from_header).as_deref()) {
        debug!("API authentication succeeded");
        return next.call(req).await;
    }

    info!("API authentication failed: token mismatch or missing");
    Ok(req.into_response(
        HttpResponse::Unauthorized()
            .content_type("text/plain; charset=utf-8")
            .body("Unauthorized"),
    ))
}
