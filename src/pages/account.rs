use super::Page;
use crate::controllers::{ActionContext, Verbs};
use crate::error::{AppError, AppResult};
use crate::identity::SignInResult;
use crate::models::{LoginForm, RegisterForm};
use crate::views::{encode, errors_html, field, page, validation_messages};
use async_trait::async_trait;
use axum::response::{IntoResponse, Redirect, Response};
use http::header::SET_COOKIE;
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;
use validator::Validate;

pub struct RegisterPage;

#[async_trait]
impl Page for RegisterPage {
    fn path(&self) -> &'static str {
        "/Identity/Account/Register"
    }

    fn verbs(&self) -> Verbs {
        Verbs::GetAndPost
    }

    async fn handle(&self, mut ctx: ActionContext) -> AppResult<Response> {
        if !ctx.is_post() {
            return Ok(register_form(&ctx, "", &[]));
        }

        let form: RegisterForm = ctx.read_form().await?;
        if let Err(e) = form.validate() {
            return Ok(register_form(&ctx, &form.email, &validation_messages(&e)));
        }

        let registration = match ctx.scope.identity().register(&form.email, &form.password).await {
            Ok(registration) => registration,
            Err(AppError::Validation(message)) => {
                return Ok(register_form(&ctx, &form.email, &[message]));
            }
            Err(e) => return Err(e),
        };

        // No email sender: the confirmation link is shown directly.
        let link = format!(
            "/Identity/Account/ConfirmEmail?userId={}&code={}",
            registration.user_id, registration.confirmation_code
        );
        let body = format!(
            r#"<h1>Register confirmation</h1>
<p>Please confirm your account by <a id="confirm-link" href="{}">clicking here</a>.</p>"#,
            encode(&link)
        );
        Ok(page("Register confirmation", ctx.user.as_ref(), &body).into_response())
    }
}

fn register_form(ctx: &ActionContext, email: &str, errors: &[String]) -> Response {
    let body = format!(
        r#"<h1>Register</h1>
{errors}
<form method="post" action="/Identity/Account/Register">
{email}
<label>Password <input type="password" name="password" /></label><br />
<label>Confirm password <input type="password" name="confirm_password" /></label><br />
<button type="submit">Register</button>
</form>"#,
        errors = errors_html(errors),
        email = field("Email", "email", email),
    );
    page("Register", ctx.user.as_ref(), &body).into_response()
}

#[derive(Debug, Deserialize)]
struct ConfirmEmailQuery {
    #[serde(rename = "userId")]
    user_id: Uuid,
    code: String,
}

pub struct ConfirmEmailPage;

#[async_trait]
impl Page for ConfirmEmailPage {
    fn path(&self) -> &'static str {
        "/Identity/Account/ConfirmEmail"
    }

    fn verbs(&self) -> Verbs {
        Verbs::Get
    }

    async fn handle(&self, ctx: ActionContext) -> AppResult<Response> {
        let query: ConfirmEmailQuery = ctx.query()?;

        let message = match ctx
            .scope
            .identity()
            .confirm_email(query.user_id, &query.code)
            .await
        {
            Ok(()) => "Thank you for confirming your email.",
            Err(AppError::Validation(_)) | Err(AppError::NotFound(_)) => {
                "Error confirming your email."
            }
            Err(e) => return Err(e),
        };

        let body = format!("<h1>Confirm email</h1><p>{}</p>", message);
        Ok(page("Confirm email", ctx.user.as_ref(), &body).into_response())
    }
}

#[derive(Debug, Default, Deserialize)]
struct LoginQuery {
    #[serde(default, rename = "ReturnUrl")]
    return_url: Option<String>,
}

pub struct LoginPage;

#[async_trait]
impl Page for LoginPage {
    fn path(&self) -> &'static str {
        "/Identity/Account/Login"
    }

    fn verbs(&self) -> Verbs {
        Verbs::GetAndPost
    }

    async fn handle(&self, mut ctx: ActionContext) -> AppResult<Response> {
        if !ctx.is_post() {
            let query: LoginQuery = ctx.query()?;
            return Ok(login_form(&ctx, "", query.return_url.as_deref(), None));
        }

        let secure = ctx.is_https();
        let form: LoginForm = ctx.read_form().await?;

        let result = ctx
            .scope
            .identity()
            .password_sign_in(&form.email, &form.password)
            .await?;

        let error = match result {
            SignInResult::Succeeded(user) => {
                let auth = ctx.scope.auth();
                let token = auth.generate_token(user.id, &user.email)?;
                let cookie = auth.sign_in_cookie(&token, secure);
                let target = form
                    .return_url
                    .as_deref()
                    .filter(|url| is_local_url(url))
                    .unwrap_or("/");

                return Ok(([(SET_COOKIE, cookie)], Redirect::to(target)).into_response());
            }
            SignInResult::NotAllowed => "You must confirm your email before you can sign in.",
            SignInResult::Failed => "Invalid login attempt.",
        };

        Ok(login_form(
            &ctx,
            &form.email,
            form.return_url.as_deref(),
            Some(error),
        ))
    }
}

fn login_form(
    ctx: &ActionContext,
    email: &str,
    return_url: Option<&str>,
    error: Option<&str>,
) -> Response {
    let errors: Vec<String> = error.map(str::to_string).into_iter().collect();
    let body = format!(
        r#"<h1>Log in</h1>
{errors}
<form method="post" action="/Identity/Account/Login">
{email}
<label>Password <input type="password" name="password" /></label><br />
<input type="hidden" name="ReturnUrl" value="{return_url}" />
<button type="submit">Log in</button>
</form>
<p><a href="/Identity/Account/Register">Register as a new user</a></p>"#,
        errors = errors_html(&errors),
        email = field("Email", "email", email),
        return_url = encode(return_url.unwrap_or("")),
    );
    page("Log in", ctx.user.as_ref(), &body).into_response()
}

pub struct LogoutPage;

#[async_trait]
impl Page for LogoutPage {
    fn path(&self) -> &'static str {
        "/Identity/Account/Logout"
    }

    fn verbs(&self) -> Verbs {
        Verbs::Post
    }

    async fn handle(&self, ctx: ActionContext) -> AppResult<Response> {
        if let Some(user) = &ctx.user {
            info!(user_id = %user.user_id, "User logged out");
        }
        let cookie = ctx.scope.auth().sign_out_cookie();
        Ok(([(SET_COOKIE, cookie)], Redirect::to("/")).into_response())
    }
}

/// Only same-site paths are valid return targets
fn is_local_url(url: &str) -> bool {
    url.starts_with('/') && !url.starts_with("//") && !url.starts_with("/\\")
}
