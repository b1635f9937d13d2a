use std::net::IpAddr;

use actix_web::{HttpRequest, HttpResponse, web};
use serde::Deserialize;
use tracing::trace;

use crate::services::GeoLocator;
use crate::utils::client_ip;

#[derive(Debug, Deserialize)]
pub struct LookupQuery {
    pub ip: Option<String>,
    pub format: Option<String>,
}

pub struct LookupService;

impl LookupService {
    /// `GET /?ip=<ip>&format=json|text`
    ///
    /// 未指定 `ip` 时查询调用方地址。
    pub async fn lookup(
        req: HttpRequest,
        query: web::Query<LookupQuery>,
        locator: web::Data<dyn GeoLocator>,
    ) -> HttpResponse {
        let requested = query.ip.as_deref().map(str::trim).filter(|s| !s.is_empty());

        let info = match requested {
            Some(raw) => match raw.parse::<IpAddr>() {
                Ok(ip) => locator.locate(ip),
                Err(_) => {
                    trace!("Rejecting invalid IP parameter: {}", raw);
                    return HttpResponse::BadRequest()
                        .content_type("text/plain; charset=utf-8")
                        .body("Invalid IP address");
                }
            },
            None => client_ip(&req)
                .map(|ip| locator.locate(ip))
                .unwrap_or_default(),
        };

        if wants_text(&req, query.format.as_deref()) {
            let body = info.ip.map(|ip| ip.to_string()).unwrap_or_default();
            return HttpResponse::Ok()
                .content_type("text/plain; charset=utf-8")
                .body(body);
        }

        HttpResponse::Ok().json(&info)
    }
}

fn wants_text(req: &HttpRequest, format: Option<&str>) -> bool {
    match format {
        Some("text") => true,
        Some("json") => false,
        _ => req
            .headers()
            .get("Accept")
            .and_then(|h| h.to_str().ok())
            .is_some_and(|accept| accept.contains("text/plain")),
    }
}
