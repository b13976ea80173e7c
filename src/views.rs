//! Minimal HTML rendering shared by controllers and pages.

use crate::auth::ClaimsPrincipal;
use axum::response::Html;
use validator::ValidationErrors;

/// Escape text for inclusion in HTML content or attribute values
pub fn encode(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Wrap a body in the site layout
pub fn page(title: &str, user: Option<&ClaimsPrincipal>, body: &str) -> Html<String> {
    let account = match user {
        Some(user) => format!(
            r#"<span>Hello {}!</span>
<form method="post" action="/Identity/Account/Logout"><button type="submit">Logout</button></form>"#,
            encode(&user.email)
        ),
        None => r#"<a href="/Identity/Account/Register">Register</a> <a href="/Identity/Account/Login">Login</a>"#
            .to_string(),
    };

    Html(format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8" />
<title>{title} - ConferenceTracker</title>
<link rel="stylesheet" href="/css/site.css" />
</head>
<body>
<nav><a href="/">ConferenceTracker</a> <a href="/Presentations">Presentations</a> <a href="/Speakers">Speakers</a> <a href="/Home/Privacy">Privacy</a> {account}</nav>
<main>
{body}
</main>
</body>
</html>"#,
        title = encode(title),
        account = account,
        body = body,
    ))
}

/// `<input>` row for a form
pub fn field(label: &str, name: &str, value: &str) -> String {
    format!(
        r#"<label>{label} <input name="{name}" value="{value}" /></label><br />"#,
        label = encode(label),
        name = name,
        value = encode(value),
    )
}

/// Validation summary list; empty when there are no errors
pub fn errors_html(errors: &[String]) -> String {
    if errors.is_empty() {
        return String::new();
    }
    let items: String = errors
        .iter()
        .map(|e| format!("<li>{}</li>", encode(e)))
        .collect();
    format!(r#"<ul class="validation-summary-errors">{}</ul>"#, items)
}

/// One message per failed rule, ordered by field name
pub fn validation_messages(errors: &ValidationErrors) -> Vec<String> {
    let mut fields: Vec<_> = errors.field_errors().into_iter().collect();
    fields.sort_by(|a, b| a.0.cmp(&b.0));

    fields
        .into_iter()
        .flat_map(|(field, errors)| {
            errors.iter().map(move |error| match &error.message {
                Some(message) => message.to_string(),
                None => format!("{} is invalid", field),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SpeakerForm;
    use validator::Validate;

    #[test]
    fn test_encode() {
        assert_eq!(
            encode(r#"<a href="x">O'Neil & co</a>"#),
            "&lt;a href=&quot;x&quot;&gt;O&#39;Neil &amp; co&lt;/a&gt;"
        );
    }

    #[test]
    fn test_errors_html_is_encoded() {
        assert_eq!(errors_html(&[]), "");
        assert!(errors_html(&["<b>bad</b>".to_string()]).contains("&lt;b&gt;bad&lt;/b&gt;"));
    }

    #[test]
    fn test_validation_messages_use_rule_messages() {
        let form = SpeakerForm {
            first_name: String::new(),
            last_name: "Hopper".to_string(),
            description: String::new(),
            email_address: Some("not-an-email".to_string()),
            phone_number: None,
            is_staff: None,
        };
        let errors = form.validate().unwrap_err();

        assert_eq!(
            validation_messages(&errors),
            vec![
                "Must be a valid email address".to_string(),
                "First name is required".to_string(),
            ]
        );
    }

    #[test]
    fn test_layout_shows_login_links_for_anonymous_users() {
        let Html(html) = page("Home", None, "<p>hi</p>");
        assert!(html.contains("/Identity/Account/Login"));
        assert!(html.contains("<p>hi</p>"));
    }
}
