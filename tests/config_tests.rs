//! Configuration loading and validation tests.
//!
//! These go through `Config::from_source` so the process environment is
//! never touched.

use conference_tracker::config::{Config, HostEnvironment};
use conference_tracker::error::AppError;
use std::collections::HashMap;

fn load(pairs: &[(&str, &str)]) -> Result<Config, AppError> {
    let values: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    Config::from_source(|key| values.get(key).cloned())
}

/// Test module for values read from the source
mod loading_tests {
    use super::*;

    #[test]
    fn test_overrides_are_applied() {
        let config = load(&[
            ("APP_ENVIRONMENT", "Staging"),
            ("SERVER_HOST", "0.0.0.0"),
            ("SERVER_PORT", "8080"),
            ("HTTPS_PORT", "8443"),
            ("DATABASE_NAME", "Conferences"),
            ("CORS_ALLOWED_ORIGIN", "https://example.com"),
            ("AUTH_COOKIE_NAME", ".Custom.Identity"),
            ("AUTH_SIGNING_KEY", "0123456789abcdef0123456789abcdef"),
            ("AUTH_EXPIRATION_HOURS", "12"),
            ("STATIC_ROOT", "public"),
            ("HSTS_MAX_AGE_DAYS", "365"),
        ])
        .unwrap();

        assert_eq!(config.environment, HostEnvironment::new("Staging"));
        assert!(!config.environment.is_development());
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.web.https_port, Some(8443));
        assert_eq!(config.database.name, "Conferences");
        assert_eq!(config.cors.allowed_origin, "https://example.com");
        assert_eq!(config.auth.cookie_name, ".Custom.Identity");
        assert_eq!(config.auth.expiration_hours, 12);
        assert_eq!(config.web.static_root.to_str(), Some("public"));
        assert_eq!(config.web.hsts_max_age_days, 365);
    }

    #[test]
    fn test_default_cookie_lifetime_is_two_weeks() {
        let config = load(&[]).unwrap();
        assert_eq!(config.auth.expiration_hours, 14 * 24);
        assert_eq!(config.auth.cookie_name, ".ConferenceTracker.Identity");
        assert_eq!(config.web.static_root.to_str(), Some("wwwroot"));
    }

    #[test]
    fn test_generated_signing_keys_differ_per_load() {
        let first = load(&[]).unwrap();
        let second = load(&[]).unwrap();
        assert_ne!(first.auth.signing_key, second.auth.signing_key);
    }
}

/// Test module for rejected configurations
mod validation_tests {
    use super::*;

    fn rejected(pairs: &[(&str, &str)]) -> bool {
        matches!(load(pairs), Err(AppError::Configuration(_)))
    }

    #[test]
    fn test_zero_ports_are_rejected() {
        assert!(rejected(&[("SERVER_PORT", "0")]));
        assert!(rejected(&[("HTTPS_PORT", "0")]));
    }

    #[test]
    fn test_empty_names_are_rejected() {
        assert!(rejected(&[("DATABASE_NAME", "  ")]));
        assert!(rejected(&[("CORS_ALLOWED_ORIGIN", "")]));
    }

    #[test]
    fn test_lifetimes_are_bounded() {
        assert!(rejected(&[("AUTH_EXPIRATION_HOURS", "0")]));
        assert!(rejected(&[("HSTS_MAX_AGE_DAYS", "0")]));
        assert!(rejected(&[("PASSWORD_HASH_COST", "3")]));
        assert!(rejected(&[("PASSWORD_HASH_COST", "32")]));
    }

    #[test]
    fn test_oversized_lifetimes_are_rejected() {
        assert!(rejected(&[("HSTS_MAX_AGE_DAYS", "300000000000000")]));
        assert!(rejected(&[("HSTS_MAX_AGE_DAYS", "36501")]));
        let max_hours = i64::MAX.to_string();
        assert!(rejected(&[("AUTH_EXPIRATION_HOURS", max_hours.as_str())]));
        assert!(rejected(&[("AUTH_EXPIRATION_HOURS", "8761")]));

        assert!(!rejected(&[("HSTS_MAX_AGE_DAYS", "36500")]));
        assert!(!rejected(&[("AUTH_EXPIRATION_HOURS", "8760")]));
    }

    #[test]
    fn test_unparseable_values_are_rejected() {
        assert!(rejected(&[("AUTH_EXPIRATION_HOURS", "forever")]));
        assert!(rejected(&[("HSTS_MAX_AGE_DAYS", "-1")]));
    }

    #[test]
    fn test_validate_catches_later_overrides() {
        let mut config = load(&[]).unwrap();
        config.server.port = 0;
        assert!(matches!(config.validate(), Err(AppError::Configuration(_))));
    }
}
