use crate::config::Config;
use crate::routing::EndpointRouter;
use crate::services::ServiceProvider;
use std::sync::Arc;

/// Shared state handed to every pipeline stage.
///
/// Built once by [`crate::startup::Startup::configure`] and cloned per request;
/// all fields are immutable after startup.
#[derive(Clone)]
pub struct AppState {
    /// Validated application configuration
    pub config: Arc<Config>,

    /// Registered services; each request opens its own scope
    pub services: Arc<ServiceProvider>,

    /// Page and conventional route resolution
    pub endpoints: Arc<EndpointRouter>,
}
