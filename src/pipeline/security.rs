//! Cookie policy, authentication and authorization stages.

use crate::auth::ClaimsPrincipal;
use crate::cookie_policy::read_cookie;
use crate::routing::Endpoint;
use crate::state::AppState;
use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use http::header::LOCATION;
use tracing::debug;

/// Where anonymous callers of protected endpoints are sent
pub const LOGIN_PATH: &str = "/Identity/Account/Login";

pub async fn cookie_policy(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let policy = state.services.cookie_policy();
    let has_consent = policy.has_consent(req.headers());

    let mut response = next.run(req).await;
    policy.apply(response.headers_mut(), has_consent);
    response
}

/// Attach the caller's [`ClaimsPrincipal`] when the authentication cookie is
/// valid. Missing, invalid and expired cookies all mean anonymous.
pub async fn authentication(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Response {
    let auth = state.services.auth();

    if let Some(token) = read_cookie(req.headers(), auth.cookie_name()) {
        match auth
            .validate_token(&token)
            .and_then(ClaimsPrincipal::try_from)
        {
            Ok(principal) => {
                req.extensions_mut().insert(principal);
            }
            Err(e) => debug!(error = %e, "Authentication cookie rejected"),
        }
    }

    next.run(req).await
}

/// Challenge anonymous callers of endpoints that require authorization
pub async fn authorization(req: Request, next: Next) -> Response {
    let requires_authorization = req
        .extensions()
        .get::<Endpoint>()
        .map(|e| e.requires_authorization)
        .unwrap_or(false);

    if requires_authorization && req.extensions().get::<ClaimsPrincipal>().is_none() {
        let return_url = req
            .uri()
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or("/");
        debug!(return_url = %return_url, "Challenging anonymous caller");
        return challenge(return_url);
    }

    next.run(req).await
}

/// `302` to the login page, remembering where the caller was going
pub fn challenge(return_url: &str) -> Response {
    let encoded: String = url::form_urlencoded::byte_serialize(return_url.as_bytes()).collect();
    let location = format!("{}?ReturnUrl={}", LOGIN_PATH, encoded);
    (StatusCode::FOUND, [(LOCATION, location)]).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_challenge_encodes_return_url() {
        let response = challenge("/Speakers/Edit/3?x=1");
        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(
            response.headers()[LOCATION],
            "/Identity/Account/Login?ReturnUrl=%2FSpeakers%2FEdit%2F3%3Fx%3D1"
        );
    }
}
