//! Account management backed by the application database context.

use crate::db::{DbContext, DbError};
use crate::error::{AppError, AppResult};
use crate::models::IdentityUser;
use chrono::Utc;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;
use validator::ValidateEmail;

const CONFIRMATION_CODE_LENGTH: usize = 32;

#[derive(Debug, Clone)]
pub struct IdentityOptions {
    /// Sign-in is refused until the email address is confirmed
    pub require_confirmed_account: bool,
    pub password: PasswordOptions,
    /// bcrypt cost factor
    pub hash_cost: u32,
}

impl Default for IdentityOptions {
    fn default() -> Self {
        Self {
            require_confirmed_account: false,
            password: PasswordOptions::default(),
            hash_cost: bcrypt::DEFAULT_COST,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PasswordOptions {
    pub required_length: usize,
    pub require_digit: bool,
    pub require_lowercase: bool,
    pub require_uppercase: bool,
    pub require_non_alphanumeric: bool,
}

impl Default for PasswordOptions {
    fn default() -> Self {
        Self {
            required_length: 6,
            require_digit: true,
            require_lowercase: true,
            require_uppercase: true,
            require_non_alphanumeric: true,
        }
    }
}

impl PasswordOptions {
    /// Check a password against the rules, collecting every violation
    pub fn check(&self, password: &str) -> Result<(), Vec<String>> {
        let mut problems = Vec::new();

        if password.chars().count() < self.required_length {
            problems.push(format!(
                "Passwords must be at least {} characters.",
                self.required_length
            ));
        }
        if self.require_digit && !password.chars().any(|c| c.is_ascii_digit()) {
            problems.push("Passwords must have at least one digit ('0'-'9').".to_string());
        }
        if self.require_lowercase && !password.chars().any(|c| c.is_lowercase()) {
            problems.push("Passwords must have at least one lowercase ('a'-'z').".to_string());
        }
        if self.require_uppercase && !password.chars().any(|c| c.is_uppercase()) {
            problems.push("Passwords must have at least one uppercase ('A'-'Z').".to_string());
        }
        if self.require_non_alphanumeric && password.chars().all(|c| c.is_alphanumeric()) {
            problems.push("Passwords must have at least one non alphanumeric character.".to_string());
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(problems)
        }
    }
}

/// Outcome of a password sign-in attempt
#[derive(Debug)]
pub enum SignInResult {
    Succeeded(IdentityUser),
    /// Credentials may be right but the account may not sign in yet
    NotAllowed,
    Failed,
}

/// A freshly registered, unconfirmed account
#[derive(Debug, Clone)]
pub struct Registration {
    pub user_id: Uuid,
    pub email: String,
    pub confirmation_code: String,
}

pub struct IdentityService {
    context: Arc<DbContext>,
    options: IdentityOptions,
}

impl IdentityService {
    pub fn new(context: Arc<DbContext>, options: IdentityOptions) -> Self {
        Self { context, options }
    }

    pub fn options(&self) -> &IdentityOptions {
        &self.options
    }

    /// Create an unconfirmed account
    pub async fn register(&self, email: &str, password: &str) -> AppResult<Registration> {
        let email = email.trim();
        if !email.validate_email() {
            return Err(AppError::Validation(format!("'{}' is not a valid email", email)));
        }
        self.options
            .password
            .check(password)
            .map_err(|problems| AppError::Validation(problems.join(" ")))?;

        let password_hash = bcrypt::hash(password, self.options.hash_cost)?;
        let confirmation_code = nanoid::nanoid!(CONFIRMATION_CODE_LENGTH);
        let user = IdentityUser {
            id: Uuid::new_v4(),
            email: email.to_string(),
            normalized_email: normalize(email),
            password_hash,
            email_confirmed: false,
            confirmation_code: Some(confirmation_code.clone()),
            created_at: Utc::now(),
        };
        let registration = Registration {
            user_id: user.id,
            email: user.email.clone(),
            confirmation_code,
        };

        self.context
            .write(|tables| {
                let taken = tables
                    .users
                    .values()
                    .any(|u| u.normalized_email == user.normalized_email);
                if taken {
                    return Err(DbError::DuplicateKey {
                        table: "users",
                        key: user.email.clone(),
                    });
                }
                tables.users.insert(user.id, user);
                Ok(())
            })
            .await?
            .map_err(|_| AppError::Validation(format!("Email '{}' is already taken.", email)))?;

        info!(user_id = %registration.user_id, "User created a new account with password");
        Ok(registration)
    }

    /// Confirm an account's email with the code issued at registration
    pub async fn confirm_email(&self, user_id: Uuid, code: &str) -> AppResult<()> {
        self.context
            .write(|tables| {
                let user = tables
                    .users
                    .get_mut(&user_id)
                    .ok_or_else(|| AppError::NotFound(format!("User {}", user_id)))?;

                if user.email_confirmed {
                    return Ok(());
                }
                if user.confirmation_code.as_deref() != Some(code) {
                    return Err(AppError::Validation("Invalid confirmation code".to_string()));
                }
                user.email_confirmed = true;
                user.confirmation_code = None;
                Ok(())
            })
            .await?
    }

    /// Check credentials and whether the account may sign in
    pub async fn password_sign_in(&self, email: &str, password: &str) -> AppResult<SignInResult> {
        let normalized = normalize(email);
        let user = self
            .context
            .read(|tables| {
                tables
                    .users
                    .values()
                    .find(|u| u.normalized_email == normalized)
                    .cloned()
            })
            .await?;

        let Some(user) = user else {
            return Ok(SignInResult::Failed);
        };

        if self.options.require_confirmed_account && !user.email_confirmed {
            warn!(user_id = %user.id, "User cannot sign in without a confirmed account");
            return Ok(SignInResult::NotAllowed);
        }

        if !bcrypt::verify(password, &user.password_hash)? {
            return Ok(SignInResult::Failed);
        }

        info!(user_id = %user.id, "User logged in");
        Ok(SignInResult::Succeeded(user))
    }

    pub async fn find_by_id(&self, user_id: Uuid) -> AppResult<Option<IdentityUser>> {
        Ok(self
            .context
            .read(|tables| tables.users.get(&user_id).cloned())
            .await?)
    }
}

fn normalize(email: &str) -> String {
    email.trim().to_uppercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{DbContextOptions, InMemoryDatabaseRoot};

    async fn service(require_confirmed_account: bool) -> IdentityService {
        let root = InMemoryDatabaseRoot::new();
        let ctx = DbContext::open(&root, &DbContextOptions::in_memory("identity"));
        ctx.ensure_created().await;
        IdentityService::new(
            Arc::new(ctx),
            IdentityOptions {
                require_confirmed_account,
                hash_cost: 4,
                ..IdentityOptions::default()
            },
        )
    }

    #[test]
    fn test_password_rules() {
        let rules = PasswordOptions::default();
        assert!(rules.check("Secret1!").is_ok());

        let problems = rules.check("abc").unwrap_err();
        assert_eq!(problems.len(), 4);
    }

    #[tokio::test]
    async fn test_unconfirmed_account_cannot_sign_in() {
        let identity = service(true).await;
        let registration = identity.register("ada@example.com", "Secret1!").await.unwrap();

        assert!(matches!(
            identity.password_sign_in("ada@example.com", "Secret1!").await.unwrap(),
            SignInResult::NotAllowed
        ));

        identity
            .confirm_email(registration.user_id, &registration.confirmation_code)
            .await
            .unwrap();

        assert!(matches!(
            identity.password_sign_in("ADA@example.com", "Secret1!").await.unwrap(),
            SignInResult::Succeeded(user) if user.id == registration.user_id
        ));
    }

    #[tokio::test]
    async fn test_wrong_password_fails() {
        let identity = service(false).await;
        identity.register("bob@example.com", "Secret1!").await.unwrap();

        assert!(matches!(
            identity.password_sign_in("bob@example.com", "Wrong1!").await.unwrap(),
            SignInResult::Failed
        ));
        assert!(matches!(
            identity.password_sign_in("nobody@example.com", "Secret1!").await.unwrap(),
            SignInResult::Failed
        ));
    }

    #[tokio::test]
    async fn test_duplicate_email_is_rejected() {
        let identity = service(false).await;
        identity.register("carol@example.com", "Secret1!").await.unwrap();

        let result = identity.register("Carol@Example.com", "Secret1!").await;
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn test_wrong_confirmation_code_is_rejected() {
        let identity = service(true).await;
        let registration = identity.register("dan@example.com", "Secret1!").await.unwrap();

        let result = identity.confirm_email(registration.user_id, "nope").await;
        assert!(matches!(result, Err(AppError::Validation(_))));

        let user = identity.find_by_id(registration.user_id).await.unwrap().unwrap();
        assert!(!user.email_confirmed);
    }
}
