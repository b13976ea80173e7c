use super::{ActionContext, ActionDescriptor, Controller};
use crate::error::{AppError, AppResult};
use crate::models::{Presentation, PresentationForm, Speaker};
use crate::services::ServiceScope;
use crate::views::{encode, errors_html, field, page, validation_messages};
use async_trait::async_trait;
use axum::response::{IntoResponse, Redirect, Response};
use tracing::info;
use validator::Validate;

const ACTIONS: &[ActionDescriptor] = &[
    ActionDescriptor::get("Index"),
    ActionDescriptor::get("Details"),
    ActionDescriptor::form("Create").authorized(),
    ActionDescriptor::form("Edit").authorized(),
    ActionDescriptor::form("Delete").authorized(),
];

pub struct PresentationsController;

#[async_trait]
impl Controller for PresentationsController {
    fn name(&self) -> &'static str {
        "Presentations"
    }

    fn actions(&self) -> &'static [ActionDescriptor] {
        ACTIONS
    }

    async fn invoke(&self, action: &'static str, ctx: ActionContext) -> AppResult<Response> {
        match action {
            "Index" => index(ctx).await,
            "Details" => details(ctx).await,
            "Create" => create(ctx).await,
            "Edit" => edit(ctx).await,
            "Delete" => delete(ctx).await,
            other => Err(AppError::NotFound(format!("Action Presentations.{}", other))),
        }
    }
}

async fn index(ctx: ActionContext) -> AppResult<Response> {
    let presentations = ctx.scope.presentations().list().await?;

    let rows: String = presentations
        .iter()
        .map(|p| {
            format!(
                r#"<tr><td><a href="/Presentations/Details/{}">{}</a></td><td>{}</td></tr>"#,
                p.id,
                encode(&p.title),
                p.speaker
                    .as_ref()
                    .map(|s| encode(&s.full_name()))
                    .unwrap_or_default()
            )
        })
        .collect();

    let body = format!(
        r#"<h1>Presentations</h1>
<p><a href="/Presentations/Create">Create New</a></p>
<table><thead><tr><th>Title</th><th>Speaker</th></tr></thead><tbody>{}</tbody></table>"#,
        rows
    );
    Ok(page("Presentations", ctx.user.as_ref(), &body).into_response())
}

async fn find(scope: &ServiceScope, id: i64) -> AppResult<Presentation> {
    scope
        .presentations()
        .get(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Presentation {}", id)))
}

async fn details(ctx: ActionContext) -> AppResult<Response> {
    let presentation = find(&ctx.scope, ctx.id()?).await?;
    let speaker = presentation
        .speaker
        .as_ref()
        .map(|s| {
            format!(
                r#"<a href="/Speakers/Details/{}">{}</a>"#,
                s.id,
                encode(&s.full_name())
            )
        })
        .unwrap_or_default();

    let body = format!(
        r#"<h1>{}</h1>
<p>{}</p>
<p>Speaker: {}</p>
<p><a href="/Presentations/Edit/{id}">Edit</a> | <a href="/Presentations/Delete/{id}">Delete</a> | <a href="/Presentations">Back to List</a></p>"#,
        encode(&presentation.title),
        encode(&presentation.description),
        speaker,
        id = presentation.id,
    );
    Ok(page(&presentation.title, ctx.user.as_ref(), &body).into_response())
}

async fn create(mut ctx: ActionContext) -> AppResult<Response> {
    let action = "/Presentations/Create";
    if ctx.is_post() {
        let form: PresentationForm = ctx.read_form().await?;
        if let Err(e) = form.validate() {
            let speakers = ctx.scope.speakers().list().await?;
            let current = form.into_presentation(0);
            let errors = validation_messages(&e);
            return Ok(form_page(
                &ctx,
                "Create presentation",
                action,
                Some(&current),
                &speakers,
                &errors,
            ));
        }

        let created = ctx
            .scope
            .presentations()
            .create(form.into_presentation(0))
            .await?;
        info!(presentation_id = created.id, "Presentation created");
        return Ok(Redirect::to("/Presentations").into_response());
    }

    let speakers = ctx.scope.speakers().list().await?;
    Ok(form_page(&ctx, "Create presentation", action, None, &speakers, &[]))
}

async fn edit(mut ctx: ActionContext) -> AppResult<Response> {
    let existing = find(&ctx.scope, ctx.id()?).await?;

    let action = format!("/Presentations/Edit/{}", existing.id);
    if ctx.is_post() {
        let form: PresentationForm = ctx.read_form().await?;
        if let Err(e) = form.validate() {
            let speakers = ctx.scope.speakers().list().await?;
            let current = form.into_presentation(existing.id);
            let errors = validation_messages(&e);
            return Ok(form_page(
                &ctx,
                "Edit presentation",
                &action,
                Some(&current),
                &speakers,
                &errors,
            ));
        }

        ctx.scope
            .presentations()
            .update(form.into_presentation(existing.id))
            .await?;
        info!(presentation_id = existing.id, "Presentation updated");
        return Ok(Redirect::to("/Presentations").into_response());
    }

    let speakers = ctx.scope.speakers().list().await?;
    Ok(form_page(&ctx, "Edit presentation", &action, Some(&existing), &speakers, &[]))
}

async fn delete(ctx: ActionContext) -> AppResult<Response> {
    let existing = find(&ctx.scope, ctx.id()?).await?;

    if ctx.is_post() {
        if !ctx.scope.presentations().delete(existing.id).await? {
            return Err(AppError::NotFound(format!("Presentation {}", existing.id)));
        }
        info!(presentation_id = existing.id, "Presentation deleted");
        return Ok(Redirect::to("/Presentations").into_response());
    }

    let body = format!(
        r#"<h1>Delete</h1>
<p>Are you sure you want to delete "{}"?</p>
<form method="post" action="/Presentations/Delete/{}"><button type="submit">Delete</button></form>"#,
        encode(&existing.title),
        existing.id
    );
    Ok(page("Delete presentation", ctx.user.as_ref(), &body).into_response())
}

fn form_page(
    ctx: &ActionContext,
    title: &str,
    action: &str,
    current: Option<&Presentation>,
    speakers: &[Speaker],
    errors: &[String],
) -> Response {
    let body = format!(
        "<h1>{}</h1>{}{}",
        encode(title),
        errors_html(errors),
        form_html(action, current, speakers)
    );
    page(title, ctx.user.as_ref(), &body).into_response()
}

fn form_html(action: &str, current: Option<&Presentation>, speakers: &[Speaker]) -> String {
    let selected = current.map(|p| p.speaker_id);
    let options: String = speakers
        .iter()
        .map(|s| {
            format!(
                r#"<option value="{}"{}>{}</option>"#,
                s.id,
                if Some(s.id) == selected { " selected" } else { "" },
                encode(&s.full_name())
            )
        })
        .collect();

    format!(
        r#"<form method="post" action="{action}">
{title}
{description}
<label>Speaker <select name="speaker_id">{options}</select></label><br />
<button type="submit">Save</button>
</form>"#,
        action = action,
        title = field("Title", "title", current.map(|p| p.title.as_str()).unwrap_or("")),
        description = field(
            "Description",
            "description",
            current.map(|p| p.description.as_str()).unwrap_or("")
        ),
        options = options,
    )
}
