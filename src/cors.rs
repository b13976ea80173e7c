use crate::error::{AppError, AppResult};
use http::HeaderValue;
use std::collections::HashMap;
use tower_http::cors::CorsLayer;

/// Name under which the application's single CORS policy is registered
pub const ALLOWED_ORIGINS_POLICY: &str = "_allowedOrigins";

/// A CORS policy: the origins it admits. Methods and headers stay at the
/// layer defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CorsPolicy {
    origins: Vec<String>,
}

impl CorsPolicy {
    pub fn with_origins<I, S>(origins: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            origins: origins
                .into_iter()
                .map(|o| o.as_ref().trim().trim_end_matches('/').to_string())
                .collect(),
        }
    }

    pub fn origins(&self) -> &[String] {
        &self.origins
    }

    /// Build the tower layer enforcing this policy
    pub fn layer(&self) -> AppResult<CorsLayer> {
        let origins = self
            .origins
            .iter()
            .map(|origin| {
                origin.parse::<HeaderValue>().map_err(|_| {
                    AppError::Configuration(format!("Invalid CORS origin: {}", origin))
                })
            })
            .collect::<AppResult<Vec<HeaderValue>>>()?;

        Ok(CorsLayer::new().allow_origin(origins))
    }
}

/// Named CORS policies
#[derive(Debug, Clone, Default)]
pub struct CorsOptions {
    policies: HashMap<String, CorsPolicy>,
}

impl CorsOptions {
    pub fn add_policy(&mut self, name: &str, policy: CorsPolicy) {
        self.policies.insert(name.to_string(), policy);
    }

    pub fn policy(&self, name: &str) -> AppResult<&CorsPolicy> {
        self.policies.get(name).ok_or_else(|| {
            AppError::Configuration(format!("No CORS policy registered under '{}'", name))
        })
    }

    pub fn is_empty(&self) -> bool {
        self.policies.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_origins_are_normalized() {
        let policy = CorsPolicy::with_origins(["http://pluralsight.com/ "]);
        assert_eq!(policy.origins(), ["http://pluralsight.com".to_string()]);
    }

    #[test]
    fn test_unknown_policy_name_is_a_configuration_error() {
        let mut options = CorsOptions::default();
        options.add_policy(ALLOWED_ORIGINS_POLICY, CorsPolicy::with_origins(["http://a.test"]));

        assert!(options.policy(ALLOWED_ORIGINS_POLICY).is_ok());
        assert!(matches!(options.policy("other"), Err(AppError::Configuration(_))));
    }

    #[test]
    fn test_invalid_origin_fails_layer_build() {
        let policy = CorsPolicy::with_origins(["http://bad\norigin"]);
        assert!(policy.layer().is_err());
    }
}
