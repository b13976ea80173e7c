use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// Conference speaker
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Speaker {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    pub description: String,
    pub email_address: Option<String>,
    pub phone_number: Option<String>,
    pub is_staff: bool,
}

impl Speaker {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

/// Conference presentation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Presentation {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub speaker_id: i64,

    /// Attached on read; not stored with the presentation
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speaker: Option<Speaker>,
}

/// Account stored by the identity subsystem
#[derive(Debug, Clone)]
pub struct IdentityUser {
    pub id: Uuid,
    pub email: String,
    pub normalized_email: String,
    pub password_hash: String,
    pub email_confirmed: bool,
    pub confirmation_code: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Create/edit form for a speaker
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct SpeakerForm {
    #[validate(length(min = 1, max = 100, message = "First name is required"))]
    pub first_name: String,

    #[validate(length(min = 1, max = 100, message = "Last name is required"))]
    pub last_name: String,

    #[serde(default)]
    #[validate(length(max = 2000, message = "Description is limited to 2000 characters"))]
    pub description: String,

    #[serde(default)]
    #[validate(email(message = "Must be a valid email address"))]
    pub email_address: Option<String>,

    #[serde(default)]
    pub phone_number: Option<String>,

    /// HTML checkboxes post "on" when ticked and nothing otherwise
    #[serde(default)]
    pub is_staff: Option<String>,
}

impl SpeakerForm {
    /// Turn empty optional inputs into `None`
    pub fn normalized(mut self) -> Self {
        self.email_address = non_empty(self.email_address);
        self.phone_number = non_empty(self.phone_number);
        self
    }

    pub fn into_speaker(self, id: i64) -> Speaker {
        let is_staff = matches!(self.is_staff.as_deref(), Some("on") | Some("true"));
        Speaker {
            id,
            first_name: self.first_name.trim().to_string(),
            last_name: self.last_name.trim().to_string(),
            description: self.description,
            email_address: self.email_address,
            phone_number: self.phone_number,
            is_staff,
        }
    }
}

/// Create/edit form for a presentation
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct PresentationForm {
    #[validate(length(min = 1, max = 200, message = "Title is required"))]
    pub title: String,

    #[serde(default)]
    #[validate(length(max = 2000, message = "Description is limited to 2000 characters"))]
    pub description: String,

    #[validate(range(min = 1, message = "A speaker must be selected"))]
    pub speaker_id: i64,
}

impl PresentationForm {
    pub fn into_presentation(self, id: i64) -> Presentation {
        Presentation {
            id,
            title: self.title.trim().to_string(),
            description: self.description,
            speaker_id: self.speaker_id,
            speaker: None,
        }
    }
}

/// Account registration form
#[derive(Debug, Deserialize, Validate)]
pub struct RegisterForm {
    #[validate(email(message = "Must be a valid email address"))]
    pub email: String,

    pub password: String,

    #[validate(must_match(other = "password", message = "Passwords do not match"))]
    pub confirm_password: String,
}

/// Sign-in form
#[derive(Debug, Deserialize)]
pub struct LoginForm {
    pub email: String,
    pub password: String,

    #[serde(default, rename = "ReturnUrl")]
    pub return_url: Option<String>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
