//! Application bootstrapper: service registration, then pipeline assembly.

use crate::auth::AuthService;
use crate::config::{Config, SECRET_MESSAGE_KEY};
use crate::cookie_policy::{ConsentMode, CookiePolicy, SameSite};
use crate::cors::{CorsPolicy, ALLOWED_ORIGINS_POLICY};
use crate::db::DbContextOptions;
use crate::error::AppResult;
use crate::identity::IdentityOptions;
use crate::pipeline::{self, Stage};
use crate::repositories::{InMemoryPresentationRepository, InMemorySpeakerRepository};
use crate::routing::{EndpointRouter, RoutePattern, DEFAULT_ROUTE};
use crate::services::{ServiceCollection, ServiceProvider};
use crate::state::AppState;
use axum::Router;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{info, warn};

pub struct Startup {
    config: Arc<Config>,
    secret_message: Option<String>,
}

impl Startup {
    pub fn new(config: Config) -> Self {
        Self {
            config: Arc::new(config),
            secret_message: None,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The `SecretMessage` setting read during service registration
    pub fn secret_message(&self) -> Option<&str> {
        self.secret_message.as_deref()
    }

    /// The registrations [`Startup::configure_services`] makes, unbuilt
    pub fn services(&self) -> ServiceCollection {
        let config = &self.config;
        let mut services = ServiceCollection::new();

        services
            .add_db_context(DbContextOptions::in_memory(config.database.name.clone()))
            .add_default_identity(
                IdentityOptions {
                    require_confirmed_account: config.auth.require_confirmed_account,
                    hash_cost: config.auth.password_hash_cost,
                    ..IdentityOptions::default()
                },
                AuthService::new(&config.auth),
            )
            .add_cors(
                ALLOWED_ORIGINS_POLICY,
                CorsPolicy::with_origins([config.cors.allowed_origin.as_str()]),
            )
            .configure_cookie_policy(CookiePolicy {
                consent: ConsentMode::Granted,
                minimum_same_site: SameSite::None,
                essential_cookies: HashSet::from([config.auth.cookie_name.clone()]),
            })
            .add_controllers_with_views()
            .add_razor_pages()
            .add_transient_presentation_repository("InMemoryPresentationRepository", |ctx| {
                Arc::new(InMemoryPresentationRepository::new(ctx))
            })
            .add_transient_speaker_repository("InMemorySpeakerRepository", |ctx| {
                Arc::new(InMemorySpeakerRepository::new(ctx))
            });

        services
    }

    /// Register the application's services
    pub fn configure_services(&mut self) -> AppResult<ServiceProvider> {
        self.secret_message = self.config.secret_message.clone();
        if self.secret_message.is_none() {
            warn!(key = SECRET_MESSAGE_KEY, "Configuration value is not set");
        }

        let services = self.services();
        for descriptor in services.descriptors() {
            info!(
                service = descriptor.service,
                implementation = descriptor.implementation,
                lifetime = %descriptor.lifetime,
                "Service registered"
            );
        }
        services.build()
    }

    /// The stage list for this host
    pub fn stages(&self) -> Vec<Stage> {
        pipeline::stages_for(&self.config.environment)
    }

    /// Assemble the request pipeline
    pub async fn configure(&self, services: Arc<ServiceProvider>) -> AppResult<Router> {
        if self.config.environment.is_development() {
            info!("Environment is in development");
        }

        {
            let scope = services.create_scope();
            let context = scope.db_context();
            if context.ensure_created().await {
                info!(database = %context.database().name(), "In-memory database created");
            }
        }

        let endpoints = EndpointRouter::new(
            RoutePattern::parse(DEFAULT_ROUTE)?,
            services.controllers()?,
            &*services.pages()?,
        )?;
        info!(route = DEFAULT_ROUTE, "Conventional route mapped");

        let state = AppState {
            config: Arc::clone(&self.config),
            services,
            endpoints: Arc::new(endpoints),
        };

        pipeline::build(&self.stages(), state, ALLOWED_ORIGINS_POLICY)
    }

    /// Register services and assemble the pipeline in one go
    pub async fn build(&mut self) -> AppResult<(Router, Arc<ServiceProvider>)> {
        let services = Arc::new(self.configure_services()?);
        let router = self.configure(Arc::clone(&services)).await?;
        Ok((router, services))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(pairs: &[(&str, &str)]) -> Config {
        let mut values: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        values
            .entry("PASSWORD_HASH_COST".to_string())
            .or_insert_with(|| "4".to_string());
        values
            .entry("DATABASE_NAME".to_string())
            .or_insert_with(|| format!("startup-{}", uuid::Uuid::new_v4()));
        Config::from_source(|key| values.get(key).cloned()).unwrap()
    }

    #[test]
    fn test_secret_message_is_read_during_registration() {
        let mut startup = Startup::new(config(&[("SecretMessage", "hello")]));
        assert_eq!(startup.secret_message(), None);

        startup.configure_services().unwrap();
        assert_eq!(startup.secret_message(), Some("hello"));
    }

    #[test]
    fn test_missing_secret_message_is_not_an_error() {
        let mut startup = Startup::new(config(&[]));
        assert!(startup.configure_services().is_ok());
        assert_eq!(startup.secret_message(), None);
    }

    #[test]
    fn test_registered_cookie_policy_and_cors() {
        let mut startup = Startup::new(config(&[]));
        let services = startup.configure_services().unwrap();

        assert_eq!(services.cookie_policy().consent, ConsentMode::Granted);
        assert_eq!(services.cookie_policy().minimum_same_site, SameSite::None);
        assert_eq!(
            services
                .cors()
                .policy(ALLOWED_ORIGINS_POLICY)
                .unwrap()
                .origins(),
            &["http://pluralsight.com".to_string()]
        );
    }

    #[tokio::test]
    async fn test_configure_creates_empty_schema_and_releases_context() {
        let mut startup = Startup::new(config(&[]));
        let (_router, services) = startup.build().await.unwrap();

        let database = services.database();
        assert_eq!(database.open_contexts(), 0);

        let scope = services.create_scope();
        let empty = scope
            .db_context()
            .read(|tables| tables.is_empty())
            .await
            .unwrap();
        assert!(empty);
    }
}
