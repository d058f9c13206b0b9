//! Request context helpers derived from proxy headers.

use actix_web::HttpRequest;

/// Protocol reported by the fronting proxy, defaulting to `http`.
#[must_use]
pub fn forwarded_proto(req: &HttpRequest) -> &str {
    req.headers()
        .get("x-forwarded-proto")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("http")
}

/// Whether cookies set for this request should be marked secure.
#[must_use]
pub fn should_use_secure_cookies(req: &HttpRequest) -> bool {
    forwarded_proto(req) == "https"
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::test::TestRequest;

    #[test]
    fn defaults_to_http_without_the_header() {
        let req = TestRequest::default().to_http_request();
        assert_eq!(forwarded_proto(&req), "http");
        assert!(!should_use_secure_cookies(&req));
    }

    #[test]
    fn https_proxies_get_secure_cookies() {
        let req = TestRequest::default()
            .insert_header(("x-forwarded-proto", "https"))
            .to_http_request();
        assert_eq!(forwarded_proto(&req), "https");
        assert!(should_use_secure_cookies(&req));
    }
}
