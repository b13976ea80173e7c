//! Exception stages: what a client sees when a later stage fails.

use crate::error::UnhandledError;
use crate::request_id::RequestId;
use crate::state::AppState;
use crate::views::encode;
use axum::extract::{Request, State};
use axum::http::{StatusCode, Uri};
use axum::middleware::Next;
use axum::response::{Html, IntoResponse, Response};
use http::header::CACHE_CONTROL;
use http::Method;
use std::any::Any;
use std::convert::Infallible;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use tower::{Layer, Service, ServiceExt};
use tracing::error;

/// Path re-executed by the production exception handler
pub const ERROR_PATH: &str = "/Home/Error";

/// Development only: render the failure with its full detail
pub async fn developer_exception_page(req: Request, next: Next) -> Response {
    let method = req.method().clone();
    let uri = req.uri().clone();
    let response = next.run(req).await;

    let Some(failure) = response.extensions().get::<UnhandledError>() else {
        return response;
    };

    let body = format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head><meta charset="utf-8" /><title>Internal Server Error</title></head>
<body>
<h1>An unhandled exception occurred while processing the request.</h1>
<h2>{summary}</h2>
<p>{method} {uri}</p>
<pre>{detail}</pre>
</body>
</html>"#,
        summary = encode(&failure.summary),
        method = method,
        uri = encode(&uri.to_string()),
        detail = encode(&failure.detail),
    );

    (StatusCode::INTERNAL_SERVER_ERROR, Html(body)).into_response()
}

/// Development only: explain database failures, naming the store involved
pub async fn database_error_page(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Response {
    let response = next.run(req).await;

    let Some(failure) = response.extensions().get::<UnhandledError>() else {
        return response;
    };
    if !failure.database {
        return response;
    }

    let database = state.services.database();
    let body = format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head><meta charset="utf-8" /><title>Database Error</title></head>
<body>
<h1>A database operation failed while processing the request.</h1>
<p>Store: <code>{name}</code></p>
<pre>{summary}</pre>
<p>The in-memory schema is created at startup. If this store was never initialized, check the startup log.</p>
</body>
</html>"#,
        name = encode(database.name()),
        summary = encode(&failure.summary),
    );

    (StatusCode::INTERNAL_SERVER_ERROR, Html(body)).into_response()
}

/// Turn a caught panic into a 500 carrying an [`UnhandledError`]
pub fn panic_response(payload: Box<dyn Any + Send + 'static>) -> Response {
    let message = if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "unknown panic payload".to_string()
    };
    error!(panic = %message, "Request handler panicked");

    let mut response = StatusCode::INTERNAL_SERVER_ERROR.into_response();
    response
        .extensions_mut()
        .insert(UnhandledError::from_panic(message));
    response
}

/// Production exception handler: on failure, re-executes `GET <path>` through
/// the rest of the pipeline and returns that page with status 500.
#[derive(Debug, Clone)]
pub struct ExceptionHandlerLayer {
    path: &'static str,
}

impl ExceptionHandlerLayer {
    pub fn new(path: &'static str) -> Self {
        Self { path }
    }
}

impl<S> Layer<S> for ExceptionHandlerLayer {
    type Service = ExceptionHandlerService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        ExceptionHandlerService {
            inner,
            path: self.path,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ExceptionHandlerService<S> {
    inner: S,
    path: &'static str,
}

impl<S> Service<Request> for ExceptionHandlerService<S>
where
    S: Service<Request, Response = Response, Error = Infallible> + Clone + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = Response;
    type Error = Infallible;
    type Future = Pin<Box<dyn Future<Output = Result<Response, Infallible>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request) -> Self::Future {
        // Use the instance that was driven to readiness
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);
        let retry = self.inner.clone();
        let error_request = reexecution_request(&req, self.path);

        Box::pin(async move {
            let response = inner.call(req).await?;
            let Some(failure) = response.extensions().get::<UnhandledError>() else {
                return Ok(response);
            };
            error!(error = %failure.summary, "An unhandled exception has occurred while executing the request");

            let Some(error_request) = error_request else {
                return Ok(StatusCode::INTERNAL_SERVER_ERROR.into_response());
            };

            let mut page = retry.oneshot(error_request).await?;
            if page.extensions().get::<UnhandledError>().is_some() {
                error!("The error page failed as well; returning a bare 500");
                return Ok(StatusCode::INTERNAL_SERVER_ERROR.into_response());
            }

            *page.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
            page.headers_mut()
                .insert(CACHE_CONTROL, http::HeaderValue::from_static("no-store"));
            Ok(page)
        })
    }
}

/// `GET <path>` carrying the original request's headers, scheme and request id
fn reexecution_request(original: &Request, path: &str) -> Option<Request> {
    let mut uri = Uri::builder();
    if let Some(scheme) = original.uri().scheme() {
        uri = uri.scheme(scheme.clone());
    }
    if let Some(authority) = original.uri().authority() {
        uri = uri.authority(authority.clone());
    }
    let uri = uri.path_and_query(path).build().ok()?;

    let mut request = http::Request::builder()
        .method(Method::GET)
        .uri(uri)
        .body(axum::body::Body::empty())
        .ok()?;
    *request.headers_mut() = original.headers().clone();
    request.headers_mut().remove(http::header::CONTENT_TYPE);
    request.headers_mut().remove(http::header::CONTENT_LENGTH);

    if let Some(id) = original.extensions().get::<RequestId>() {
        request.extensions_mut().insert(id.clone());
    }
    Some(request)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_panic_response_carries_record() {
        let response = panic_response(Box::new("boom"));
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let record = response.extensions().get::<UnhandledError>().unwrap();
        assert!(record.summary.contains("boom"));
    }

    #[test]
    fn test_reexecution_request_keeps_headers_and_request_id() {
        let mut original = http::Request::builder()
            .method(Method::POST)
            .uri("https://conf.example.com/Speakers/Create")
            .header("cookie", "a=b")
            .header("content-type", "application/x-www-form-urlencoded")
            .body(axum::body::Body::empty())
            .unwrap();
        original
            .extensions_mut()
            .insert(RequestId("req-1".to_string()));

        let request = reexecution_request(&original, ERROR_PATH).unwrap();
        assert_eq!(request.method(), Method::GET);
        assert_eq!(
            request.uri().to_string(),
            "https://conf.example.com/Home/Error"
        );
        assert_eq!(request.headers()["cookie"], "a=b");
        assert!(request.headers().get("content-type").is_none());
        assert_eq!(
            request.extensions().get::<RequestId>().map(RequestId::as_str),
            Some("req-1")
        );
    }
}
