//! 客户端 IP 提取
//!
//! 查询接口在未指定 `ip` 参数时查询调用方自己的地址：
//! - 优先 X-Forwarded-For 的第一个条目（原始客户端）
//! - 否则使用连接的对端地址

use std::net::IpAddr;

use actix_web::HttpRequest;
use actix_web::http::header::HeaderMap;
use tracing::debug;

/// 从 HttpRequest 提取客户端 IP
pub fn client_ip(req: &HttpRequest) -> Option<IpAddr> {
    if let Some(ip) = forwarded_ip_from_headers(req.headers()) {
        return Some(ip);
    }
    req.peer_addr().map(|addr| addr.ip())
}

/// X-Forwarded-For 可能是逗号分隔的列表，取第一个
pub fn forwarded_ip_from_headers(headers: &HeaderMap) -> Option<IpAddr> {
    let first = headers
        .get("x-forwarded-for")
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.split(',').next())
        .map(str::trim)
        .filter(|s| !s.is_empty())?;

    match first.parse::<IpAddr>() {
        Ok(ip) => Some(ip),
        Err(_) => {
            debug!("Ignoring unparseable X-Forwarded-For entry: {}", first);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::test::TestRequest;

    #[test]
    fn test_forwarded_for_takes_first_entry() {
        let req = TestRequest::default()
            .insert_header(("X-Forwarded-For", "203.0.113.7, 10.0.0.1"))
            .peer_addr("10.0.0.1:4000".parse().unwrap())
            .to_http_request();
        assert_eq!(client_ip(&req), Some("203.0.113.7".parse().unwrap()));
    }

    #[test]
    fn test_falls_back_to_peer_address() {
        let req = TestRequest::default()
            .peer_addr("[2001:db8::5]:443".parse().unwrap())
            .to_http_request();
        assert_eq!(client_ip(&req), Some("2001:db8::5".parse().unwrap()));
    }

    #[test]
    fn test_garbage_forwarded_for_uses_peer() {
        let req = TestRequest::default()
            .insert_header(("X-Forwarded-For", "unknown"))
            .peer_addr("198.51.100.2:80".parse().unwrap())
            .to_http_request();
        assert_eq!(client_ip(&req), Some("198.51.100.2".parse().unwrap()));
    }

    #[test]
    fn test_no_source_yields_none() {
        let req = TestRequest::default().to_http_request();
        assert_eq!(client_ip(&req), None);
    }
}
