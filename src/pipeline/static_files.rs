use crate::state::AppState;
use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use http::Method;
use percent_encoding::percent_decode_str;
use std::path::{Path, PathBuf};
use tower::ServiceExt;
use tower_http::services::ServeDir;

/// Serve existing files under the web root; everything else continues down
/// the pipeline
pub async fn static_files(State(state): State<AppState>, req: Request, next: Next) -> Response {
    if req.method() != Method::GET && req.method() != Method::HEAD {
        return next.run(req).await;
    }

    let root = &state.config.web.static_root;
    let Some(file) = file_under(root, req.uri().path()) else {
        return next.run(req).await;
    };

    let is_file = tokio::fs::metadata(&file)
        .await
        .map(|meta| meta.is_file())
        .unwrap_or(false);
    if !is_file {
        return next.run(req).await;
    }

    tracing::debug!(file = %file.display(), "Serving static file");
    match ServeDir::new(root).oneshot(req).await {
        Ok(response) => response.into_response(),
        Err(never) => match never {},
    }
}

/// Map a percent-encoded request path onto the web root, refusing anything
/// that would leave it
fn file_under(root: &Path, request_path: &str) -> Option<PathBuf> {
    let mut file = root.to_path_buf();
    for encoded in request_path.split('/').filter(|s| !s.is_empty()) {
        let segment = percent_decode_str(encoded).decode_utf8().ok()?;
        if segment == "."
            || segment == ".."
            || segment.contains(['/', '\\', '\0'])
        {
            return None;
        }
        file.push(&*segment);
    }
    (file != root).then_some(file)
}
