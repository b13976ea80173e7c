//! Service registration and resolution.
//!
//! Registration happens once at startup through [`ServiceCollection`], which
//! builds an immutable [`ServiceProvider`]. Each request works inside its own
//! [`ServiceScope`].

use crate::auth::AuthService;
use crate::controllers::ControllerRegistry;
use crate::cookie_policy::CookiePolicy;
use crate::cors::{CorsOptions, CorsPolicy};
use crate::db::{Database, DbContext, DbContextOptions, InMemoryDatabaseRoot};
use crate::error::{AppError, AppResult};
use crate::identity::{IdentityOptions, IdentityService};
use crate::pages::PageRegistry;
use crate::repositories::{PresentationRepository, SpeakerRepository};
use std::fmt;
use std::sync::{Arc, OnceLock};

/// How long a resolved service lives
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifetime {
    /// One instance for the whole provider
    Singleton,
    /// One instance per scope
    Scoped,
    /// A new instance on every resolution
    Transient,
}

impl fmt::Display for Lifetime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Lifetime::Singleton => "singleton",
            Lifetime::Scoped => "scoped",
            Lifetime::Transient => "transient",
        };
        f.write_str(name)
    }
}

/// A registration record, kept for startup logging and the admin CLI
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceDescriptor {
    pub service: &'static str,
    pub implementation: &'static str,
    pub lifetime: Lifetime,
}

type Factory<T> = Arc<dyn Fn(Arc<DbContext>) -> Arc<T> + Send + Sync>;

#[derive(Default)]
pub struct ServiceCollection {
    descriptors: Vec<ServiceDescriptor>,
    db_context: Option<DbContextOptions>,
    identity: Option<(IdentityOptions, AuthService)>,
    cors: CorsOptions,
    cookie_policy: CookiePolicy,
    controllers: Option<ControllerRegistry>,
    pages: Option<PageRegistry>,
    presentations: Option<Factory<dyn PresentationRepository>>,
    speakers: Option<Factory<dyn SpeakerRepository>>,
}

impl ServiceCollection {
    pub fn new() -> Self {
        Self::default()
    }

    fn describe(&mut self, service: &'static str, implementation: &'static str, lifetime: Lifetime) {
        self.descriptors.push(ServiceDescriptor {
            service,
            implementation,
            lifetime,
        });
    }

    /// Register the application database context (scoped)
    pub fn add_db_context(&mut self, options: DbContextOptions) -> &mut Self {
        self.describe("DbContextOptions", "DbContextOptions", Lifetime::Singleton);
        self.describe("DbContext", "DbContext", Lifetime::Scoped);
        self.db_context = Some(options);
        self
    }

    /// Register identity management and cookie authentication
    pub fn add_default_identity(&mut self, options: IdentityOptions, auth: AuthService) -> &mut Self {
        self.describe("AuthService", "AuthService", Lifetime::Singleton);
        self.describe("IdentityService", "IdentityService", Lifetime::Scoped);
        self.identity = Some((options, auth));
        self
    }

    pub fn add_cors(&mut self, name: &str, policy: CorsPolicy) -> &mut Self {
        if self.cors.is_empty() {
            self.describe("CorsOptions", "CorsOptions", Lifetime::Singleton);
        }
        self.cors.add_policy(name, policy);
        self
    }

    pub fn configure_cookie_policy(&mut self, policy: CookiePolicy) -> &mut Self {
        self.describe("CookiePolicy", "CookiePolicy", Lifetime::Singleton);
        self.cookie_policy = policy;
        self
    }

    pub fn add_controllers_with_views(&mut self) -> &mut Self {
        self.describe("ControllerRegistry", "ControllerRegistry", Lifetime::Singleton);
        self.controllers = Some(ControllerRegistry::discover());
        self
    }

    pub fn add_razor_pages(&mut self) -> &mut Self {
        self.describe("PageRegistry", "PageRegistry", Lifetime::Singleton);
        self.pages = Some(PageRegistry::discover());
        self
    }

    pub fn add_transient_presentation_repository<F>(
        &mut self,
        implementation: &'static str,
        factory: F,
    ) -> &mut Self
    where
        F: Fn(Arc<DbContext>) -> Arc<dyn PresentationRepository> + Send + Sync + 'static,
    {
        self.describe("PresentationRepository", implementation, Lifetime::Transient);
        self.presentations = Some(Arc::new(factory));
        self
    }

    pub fn add_transient_speaker_repository<F>(
        &mut self,
        implementation: &'static str,
        factory: F,
    ) -> &mut Self
    where
        F: Fn(Arc<DbContext>) -> Arc<dyn SpeakerRepository> + Send + Sync + 'static,
    {
        self.describe("SpeakerRepository", implementation, Lifetime::Transient);
        self.speakers = Some(Arc::new(factory));
        self
    }

    pub fn descriptors(&self) -> &[ServiceDescriptor] {
        &self.descriptors
    }

    /// Freeze the registrations into a provider
    pub fn build(self) -> AppResult<ServiceProvider> {
        let missing = |what: &str| {
            AppError::Configuration(format!("No service registered for {}", what))
        };

        let db_options = self.db_context.ok_or_else(|| missing("DbContext"))?;
        let (identity_options, auth) = self.identity.ok_or_else(|| missing("IdentityService"))?;
        let presentations = self
            .presentations
            .ok_or_else(|| missing("PresentationRepository"))?;
        let speakers = self.speakers.ok_or_else(|| missing("SpeakerRepository"))?;

        Ok(ServiceProvider {
            descriptors: self.descriptors,
            db_root: InMemoryDatabaseRoot::new(),
            db_options,
            identity_options,
            auth,
            cors: self.cors,
            cookie_policy: self.cookie_policy,
            controllers: self.controllers.map(Arc::new),
            pages: self.pages.map(Arc::new),
            presentations,
            speakers,
        })
    }
}

/// Immutable set of registered services
pub struct ServiceProvider {
    descriptors: Vec<ServiceDescriptor>,
    db_root: InMemoryDatabaseRoot,
    db_options: DbContextOptions,
    identity_options: IdentityOptions,
    auth: AuthService,
    cors: CorsOptions,
    cookie_policy: CookiePolicy,
    controllers: Option<Arc<ControllerRegistry>>,
    pages: Option<Arc<PageRegistry>>,
    presentations: Factory<dyn PresentationRepository>,
    speakers: Factory<dyn SpeakerRepository>,
}

impl ServiceProvider {
    pub fn create_scope(self: &Arc<Self>) -> ServiceScope {
        ServiceScope {
            provider: Arc::clone(self),
            db_context: OnceLock::new(),
        }
    }

    pub fn descriptors(&self) -> &[ServiceDescriptor] {
        &self.descriptors
    }

    /// The in-memory store the registered context binds to
    pub fn database(&self) -> Arc<Database> {
        self.db_root.database(&self.db_options.database_name)
    }

    pub fn auth(&self) -> &AuthService {
        &self.auth
    }

    pub fn cors(&self) -> &CorsOptions {
        &self.cors
    }

    pub fn cookie_policy(&self) -> &CookiePolicy {
        &self.cookie_policy
    }

    pub fn controllers(&self) -> AppResult<Arc<ControllerRegistry>> {
        self.controllers.clone().ok_or_else(|| {
            AppError::Configuration(
                "Controller support is not registered; call add_controllers_with_views".to_string(),
            )
        })
    }

    pub fn pages(&self) -> AppResult<Arc<PageRegistry>> {
        self.pages.clone().ok_or_else(|| {
            AppError::Configuration("Page support is not registered; call add_razor_pages".to_string())
        })
    }
}

/// Per-request resolution scope. Scoped services live as long as the scope.
pub struct ServiceScope {
    provider: Arc<ServiceProvider>,
    db_context: OnceLock<Arc<DbContext>>,
}

impl ServiceScope {
    pub fn provider(&self) -> &Arc<ServiceProvider> {
        &self.provider
    }

    pub fn db_context(&self) -> Arc<DbContext> {
        self.db_context
            .get_or_init(|| {
                Arc::new(DbContext::open(
                    &self.provider.db_root,
                    &self.provider.db_options,
                ))
            })
            .clone()
    }

    pub fn presentations(&self) -> Arc<dyn PresentationRepository> {
        (self.provider.presentations)(self.db_context())
    }

    pub fn speakers(&self) -> Arc<dyn SpeakerRepository> {
        (self.provider.speakers)(self.db_context())
    }

    pub fn identity(&self) -> IdentityService {
        IdentityService::new(self.db_context(), self.provider.identity_options.clone())
    }

    pub fn auth(&self) -> &AuthService {
        &self.provider.auth
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AuthConfig;
    use crate::repositories::{InMemoryPresentationRepository, InMemorySpeakerRepository};

    fn auth() -> AuthService {
        AuthService::new(&AuthConfig {
            cookie_name: ".Test.Identity".to_string(),
            signing_key: "0123456789abcdef0123456789abcdef".to_string(),
            expiration_hours: 1,
            require_confirmed_account: true,
            password_hash_cost: 4,
        })
    }

    fn collection() -> ServiceCollection {
        let mut services = ServiceCollection::new();
        services
            .add_db_context(DbContextOptions::in_memory("services"))
            .add_default_identity(IdentityOptions::default(), auth())
            .add_transient_presentation_repository("InMemoryPresentationRepository", |ctx| {
                Arc::new(InMemoryPresentationRepository::new(ctx))
            })
            .add_transient_speaker_repository("InMemorySpeakerRepository", |ctx| {
                Arc::new(InMemorySpeakerRepository::new(ctx))
            });
        services
    }

    #[test]
    fn test_missing_registration_fails_build() {
        let mut services = ServiceCollection::new();
        services.add_db_context(DbContextOptions::in_memory("services"));

        assert!(matches!(services.build(), Err(AppError::Configuration(_))));
    }

    #[test]
    fn test_transient_repositories_are_distinct_across_scopes() {
        let provider = Arc::new(collection().build().unwrap());

        let first = provider.create_scope().presentations();
        let second = provider.create_scope().presentations();
        assert!(!std::ptr::eq(
            Arc::as_ptr(&first) as *const (),
            Arc::as_ptr(&second) as *const ()
        ));

        let scope = provider.create_scope();
        let a = scope.speakers();
        let b = scope.speakers();
        assert!(!std::ptr::eq(
            Arc::as_ptr(&a) as *const (),
            Arc::as_ptr(&b) as *const ()
        ));
    }

    #[test]
    fn test_scope_shares_one_context_and_releases_it() {
        let provider = Arc::new(collection().build().unwrap());
        let database = provider.database();

        {
            let scope = provider.create_scope();
            let first = scope.db_context();
            let second = scope.db_context();
            assert!(Arc::ptr_eq(&first, &second));
            assert_eq!(database.open_contexts(), 1);
        }

        assert_eq!(database.open_contexts(), 0);
    }

    #[test]
    fn test_descriptors_record_lifetimes() {
        let services = collection();
        let lifetime_of = |name: &str| {
            services
                .descriptors()
                .iter()
                .find(|d| d.service == name)
                .map(|d| d.lifetime)
        };

        assert_eq!(lifetime_of("DbContext"), Some(Lifetime::Scoped));
        assert_eq!(lifetime_of("PresentationRepository"), Some(Lifetime::Transient));
        assert_eq!(lifetime_of("SpeakerRepository"), Some(Lifetime::Transient));
    }
}
