use super::{ActionContext, ActionDescriptor, Controller};
use crate::error::{AppError, AppResult};
use crate::models::{Speaker, SpeakerForm};
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

pub struct SpeakersController;

#[async_trait]
impl Controller for SpeakersController {
    fn name(&self) -> &'static str {
        "Speakers"
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
            other => Err(AppError::NotFound(format!("Action Speakers.{}", other))),
        }
    }
}

async fn index(ctx: ActionContext) -> AppResult<Response> {
    let speakers = ctx.scope.speakers().list().await?;

    let rows: String = speakers
        .iter()
        .map(|s| {
            format!(
                r#"<tr><td><a href="/Speakers/Details/{}">{}</a></td><td>{}</td></tr>"#,
                s.id,
                encode(&s.full_name()),
                if s.is_staff { "Staff" } else { "" }
            )
        })
        .collect();

    let body = format!(
        r#"<h1>Speakers</h1>
<p><a href="/Speakers/Create">Create New</a></p>
<table><thead><tr><th>Name</th><th></th></tr></thead><tbody>{}</tbody></table>"#,
        rows
    );
    Ok(page("Speakers", ctx.user.as_ref(), &body).into_response())
}

async fn find(scope: &ServiceScope, id: i64) -> AppResult<Speaker> {
    scope
        .speakers()
        .get(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Speaker {}", id)))
}

/// Bind the posted speaker form along with its validation messages
async fn bind(ctx: &mut ActionContext, id: i64) -> AppResult<(Speaker, Vec<String>)> {
    let form = ctx.read_form::<SpeakerForm>().await?.normalized();
    let errors = match form.validate() {
        Ok(()) => Vec::new(),
        Err(e) => validation_messages(&e),
    };
    Ok((form.into_speaker(id), errors))
}

async fn details(ctx: ActionContext) -> AppResult<Response> {
    let speaker = find(&ctx.scope, ctx.id()?).await?;

    let contact = [speaker.email_address.as_deref(), speaker.phone_number.as_deref()]
        .into_iter()
        .flatten()
        .map(encode)
        .collect::<Vec<_>>()
        .join(" · ");

    let body = format!(
        r#"<h1>{}</h1>
<p>{}</p>
<p>{}</p>
<p><a href="/Speakers/Edit/{id}">Edit</a> | <a href="/Speakers/Delete/{id}">Delete</a> | <a href="/Speakers">Back to List</a></p>"#,
        encode(&speaker.full_name()),
        encode(&speaker.description),
        contact,
        id = speaker.id,
    );
    Ok(page(&speaker.full_name(), ctx.user.as_ref(), &body).into_response())
}

async fn create(mut ctx: ActionContext) -> AppResult<Response> {
    if ctx.is_post() {
        let (speaker, errors) = bind(&mut ctx, 0).await?;
        if !errors.is_empty() {
            return Ok(form_page(
                &ctx,
                "Create speaker",
                "/Speakers/Create",
                Some(&speaker),
                &errors,
            ));
        }
        let created = ctx.scope.speakers().create(speaker).await?;
        info!(speaker_id = created.id, "Speaker created");
        return Ok(Redirect::to("/Speakers").into_response());
    }

    Ok(form_page(&ctx, "Create speaker", "/Speakers/Create", None, &[]))
}

async fn edit(mut ctx: ActionContext) -> AppResult<Response> {
    let existing = find(&ctx.scope, ctx.id()?).await?;

    let action = format!("/Speakers/Edit/{}", existing.id);
    if ctx.is_post() {
        let (speaker, errors) = bind(&mut ctx, existing.id).await?;
        if !errors.is_empty() {
            return Ok(form_page(&ctx, "Edit speaker", &action, Some(&speaker), &errors));
        }
        ctx.scope.speakers().update(speaker).await?;
        info!(speaker_id = existing.id, "Speaker updated");
        return Ok(Redirect::to("/Speakers").into_response());
    }

    Ok(form_page(&ctx, "Edit speaker", &action, Some(&existing), &[]))
}

async fn delete(ctx: ActionContext) -> AppResult<Response> {
    let existing = find(&ctx.scope, ctx.id()?).await?;

    if ctx.is_post() {
        if !ctx.scope.speakers().delete(existing.id).await? {
            return Err(AppError::NotFound(format!("Speaker {}", existing.id)));
        }
        info!(speaker_id = existing.id, "Speaker deleted");
        return Ok(Redirect::to("/Speakers").into_response());
    }

    let body = format!(
        r#"<h1>Delete</h1>
<p>Are you sure you want to delete {}?</p>
<form method="post" action="/Speakers/Delete/{}"><button type="submit">Delete</button></form>"#,
        encode(&existing.full_name()),
        existing.id
    );
    Ok(page("Delete speaker", ctx.user.as_ref(), &body).into_response())
}

fn form_page(
    ctx: &ActionContext,
    title: &str,
    action: &str,
    current: Option<&Speaker>,
    errors: &[String],
) -> Response {
    let body = format!(
        "<h1>{}</h1>{}{}",
        encode(title),
        errors_html(errors),
        form_html(action, current)
    );
    page(title, ctx.user.as_ref(), &body).into_response()
}

fn form_html(action: &str, current: Option<&Speaker>) -> String {
    let text = |f: fn(&Speaker) -> Option<&str>| current.and_then(f).unwrap_or("");
    let checked = if current.map(|s| s.is_staff).unwrap_or(false) {
        " checked"
    } else {
        ""
    };

    format!(
        r#"<form method="post" action="{action}">
{first}
{last}
{description}
{email}
{phone}
<label>Staff <input type="checkbox" name="is_staff"{checked} /></label><br />
<button type="submit">Save</button>
</form>"#,
        action = action,
        first = field("First name", "first_name", text(|s| Some(s.first_name.as_str()))),
        last = field("Last name", "last_name", text(|s| Some(s.last_name.as_str()))),
        description = field("Description", "description", text(|s| Some(s.description.as_str()))),
        email = field("Email", "email_address", text(|s| s.email_address.as_deref())),
        phone = field("Phone", "phone_number", text(|s| s.phone_number.as_deref())),
        checked = checked,
    )
}
