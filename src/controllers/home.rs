use super::{ActionContext, ActionDescriptor, Controller};
use crate::error::{AppError, AppResult};
use crate::views::{encode, page};
use async_trait::async_trait;
use axum::response::{IntoResponse, Response};
use http::header::CACHE_CONTROL;

const ACTIONS: &[ActionDescriptor] = &[
    ActionDescriptor::get("Index"),
    ActionDescriptor::get("Privacy"),
    ActionDescriptor::get("Error"),
];

pub struct HomeController;

#[async_trait]
impl Controller for HomeController {
    fn name(&self) -> &'static str {
        "Home"
    }

    fn actions(&self) -> &'static [ActionDescriptor] {
        ACTIONS
    }

    async fn invoke(&self, action: &'static str, ctx: ActionContext) -> AppResult<Response> {
        match action {
            "Index" => Ok(page(
                "Home",
                ctx.user.as_ref(),
                r#"<h1>Welcome</h1>
<p>Browse the <a href="/Presentations">presentations</a> and <a href="/Speakers">speakers</a>.</p>"#,
            )
            .into_response()),
            "Privacy" => Ok(page(
                "Privacy Policy",
                ctx.user.as_ref(),
                "<h1>Privacy Policy</h1><p>Use this page to detail your site's privacy policy.</p>",
            )
            .into_response()),
            "Error" => Ok(error(&ctx)),
            other => Err(AppError::NotFound(format!("Action Home.{}", other))),
        }
    }
}

/// Generic error page. Never shows error details.
fn error(ctx: &ActionContext) -> Response {
    let request_id = ctx
        .request_id()
        .map(|id| format!("<p><strong>Request ID:</strong> <code>{}</code></p>", encode(id)))
        .unwrap_or_default();

    let body = format!(
        r#"<h1 class="text-danger">Error.</h1>
<h2 class="text-danger">An error occurred while processing your request.</h2>
{}"#,
        request_id
    );

    (
        [(CACHE_CONTROL, "no-store")],
        page("Error", ctx.user.as_ref(), &body),
    )
        .into_response()
}
