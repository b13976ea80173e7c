use crate::state::AppState;
use axum::extract::{Request, State};
use axum::http::HeaderValue;
use axum::middleware::Next;
use axum::response::{IntoResponse, Redirect, Response};
use http::header::{HOST, STRICT_TRANSPORT_SECURITY};

const FORWARDED_PROTO: &str = "x-forwarded-proto";

/// Hosts that never receive the HSTS header
const HSTS_EXCLUDED_HOSTS: [&str; 3] = ["localhost", "127.0.0.1", "[::1]"];

/// Whether the request arrived over HTTPS. `X-Forwarded-Proto` is only read
/// when `trust_forwarded` is set.
pub fn is_https<B>(req: &Request<B>, trust_forwarded: bool) -> bool {
    if req.uri().scheme_str() == Some("https") {
        return true;
    }
    if !trust_forwarded {
        return false;
    }
    req.headers()
        .get(FORWARDED_PROTO)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|proto| proto.trim().eq_ignore_ascii_case("https"))
        .unwrap_or(false)
}

/// Host the client addressed, from the URI or the `Host` header
fn request_host<B>(req: &Request<B>) -> Option<String> {
    if let Some(authority) = req.uri().authority() {
        return Some(authority.as_str().to_string());
    }
    req.headers()
        .get(HOST)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

/// Host name without its port; bracketed IPv6 literals keep their brackets
fn host_name(authority: &str) -> &str {
    if authority.starts_with('[') {
        return match authority.find(']') {
            Some(end) => &authority[..=end],
            None => authority,
        };
    }
    match authority.rsplit_once(':') {
        Some((host, _)) => host,
        None => authority,
    }
}

/// Send plain-HTTP requests to the same location over HTTPS with a 307
pub async fn https_redirection(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Response {
    let Some(port) = state.config.web.https_port else {
        return next.run(req).await;
    };
    if is_https(&req, state.config.web.trust_forwarded_proto) {
        return next.run(req).await;
    }
    let Some(authority) = request_host(&req) else {
        return next.run(req).await;
    };

    let host = host_name(&authority);
    let port = if port == 443 {
        String::new()
    } else {
        format!(":{}", port)
    };
    let path = req
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");
    let location = format!("https://{}{}{}", host, port, path);

    tracing::debug!(location = %location, "Redirecting to HTTPS");
    Redirect::temporary(&location).into_response()
}

/// Add `Strict-Transport-Security` to HTTPS responses for non-loopback hosts
pub async fn hsts(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let applies = is_https(&req, state.config.web.trust_forwarded_proto)
        && request_host(&req)
            .map(|authority| {
                let host = host_name(&authority).to_ascii_lowercase();
                !HSTS_EXCLUDED_HOSTS.contains(&host.as_str())
            })
            .unwrap_or(false);

    let mut response = next.run(req).await;

    if applies {
        if let Ok(value) = HeaderValue::from_str(&hsts_value(state.config.web.hsts_max_age_days)) {
            response.headers_mut().insert(STRICT_TRANSPORT_SECURITY, value);
        }
    }
    response
}

fn hsts_value(max_age_days: u64) -> String {
    format!("max-age={}", max_age_days.saturating_mul(24 * 60 * 60))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(uri: &str, headers: &[(&str, &str)]) -> Request<()> {
        let mut builder = http::Request::builder().uri(uri);
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        builder.body(()).unwrap()
    }

    #[test]
    fn test_is_https() {
        assert!(is_https(&request("https://example.com/", &[]), false));
        assert!(is_https(&request("/", &[("x-forwarded-proto", "HTTPS")]), true));
        assert!(!is_https(&request("/", &[("x-forwarded-proto", "http")]), true));
        assert!(!is_https(&request("/", &[]), true));
    }

    #[test]
    fn test_forwarded_proto_is_ignored_unless_trusted() {
        let forwarded = request("/", &[("x-forwarded-proto", "https")]);
        assert!(!is_https(&forwarded, false));
        assert!(is_https(&forwarded, true));
    }

    #[test]
    fn test_hsts_value() {
        assert_eq!(hsts_value(30), "max-age=2592000");
        assert_eq!(hsts_value(u64::MAX), format!("max-age={}", u64::MAX));
    }

    #[test]
    fn test_host_name() {
        assert_eq!(host_name("example.com:5000"), "example.com");
        assert_eq!(host_name("example.com"), "example.com");
        assert_eq!(host_name("[::1]:5000"), "[::1]");
    }

    #[test]
    fn test_request_host_prefers_uri_authority() {
        let req = request("http://a.example.com/x", &[("host", "b.example.com")]);
        assert_eq!(request_host(&req).as_deref(), Some("a.example.com"));

        let req = request("/x", &[("host", "b.example.com:8080")]);
        assert_eq!(request_host(&req).as_deref(), Some("b.example.com:8080"));
    }
}
