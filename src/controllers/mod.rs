//! MVC controllers dispatched through the conventional route.

mod home;
mod presentations;
mod speakers;

pub use home::HomeController;
pub use presentations::PresentationsController;
pub use speakers::SpeakersController;

use crate::auth::ClaimsPrincipal;
use crate::error::{AppError, AppResult};
use crate::request_id::RequestId;
use crate::routing::RouteValues;
use crate::services::ServiceScope;
use async_trait::async_trait;
use axum::extract::{FromRequest, Query, Request};
use axum::response::Response;
use axum::Form;
use http::Method;
use serde::de::DeserializeOwned;
use std::sync::Arc;

/// HTTP methods an action or page accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verbs {
    Get,
    Post,
    GetAndPost,
}

impl Verbs {
    pub fn allows(&self, method: &Method) -> bool {
        let read = *method == Method::GET || *method == Method::HEAD;
        match self {
            Verbs::Get => read,
            Verbs::Post => *method == Method::POST,
            Verbs::GetAndPost => read || *method == Method::POST,
        }
    }

    /// Value for the `Allow` header of a 405 response
    pub fn allow_header(&self) -> &'static str {
        match self {
            Verbs::Get => "GET, HEAD",
            Verbs::Post => "POST",
            Verbs::GetAndPost => "GET, HEAD, POST",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActionDescriptor {
    pub name: &'static str,
    pub verbs: Verbs,
    /// Anonymous callers are challenged
    pub authorize: bool,
}

impl ActionDescriptor {
    pub const fn get(name: &'static str) -> Self {
        Self {
            name,
            verbs: Verbs::Get,
            authorize: false,
        }
    }

    /// GET renders the form, POST submits it
    pub const fn form(name: &'static str) -> Self {
        Self {
            name,
            verbs: Verbs::GetAndPost,
            authorize: false,
        }
    }

    pub const fn authorized(self) -> Self {
        Self {
            authorize: true,
            ..self
        }
    }
}

/// Everything an action or page handler works with
pub struct ActionContext {
    pub request: Request,
    pub route_values: RouteValues,
    pub user: Option<ClaimsPrincipal>,
    pub scope: ServiceScope,

    /// Whether the request arrived over HTTPS
    pub https: bool,
}

impl ActionContext {
    pub fn is_post(&self) -> bool {
        self.request.method() == Method::POST
    }

    pub fn is_https(&self) -> bool {
        self.https
    }

    pub fn request_id(&self) -> Option<&str> {
        self.request.extensions().get::<RequestId>().map(RequestId::as_str)
    }

    /// The `id` route value as an entity key
    pub fn id(&self) -> AppResult<i64> {
        self.route_values
            .get("id")
            .and_then(|id| id.parse().ok())
            .ok_or_else(|| AppError::NotFound("Missing or invalid id".to_string()))
    }

    /// Bind the urlencoded request body
    pub async fn read_form<T: DeserializeOwned>(&mut self) -> AppResult<T> {
        let request = std::mem::take(&mut self.request);
        let Form(form) = Form::<T>::from_request(request, &())
            .await
            .map_err(|rejection| AppError::Validation(rejection.body_text()))?;
        Ok(form)
    }

    /// Bind the query string
    pub fn query<T: DeserializeOwned>(&self) -> AppResult<T> {
        let Query(query) = Query::<T>::try_from_uri(self.request.uri())
            .map_err(|rejection| AppError::Validation(rejection.body_text()))?;
        Ok(query)
    }
}

#[async_trait]
pub trait Controller: Send + Sync {
    fn name(&self) -> &'static str;

    fn actions(&self) -> &'static [ActionDescriptor];

    async fn invoke(&self, action: &'static str, ctx: ActionContext) -> AppResult<Response>;
}

/// The set of controllers known to the conventional route
pub struct ControllerRegistry {
    controllers: Vec<Arc<dyn Controller>>,
}

impl ControllerRegistry {
    pub fn new(controllers: Vec<Arc<dyn Controller>>) -> Self {
        Self { controllers }
    }

    /// The application's controllers
    pub fn discover() -> Self {
        Self::new(vec![
            Arc::new(HomeController),
            Arc::new(PresentationsController),
            Arc::new(SpeakersController),
        ])
    }

    pub fn find(&self, name: &str) -> Option<Arc<dyn Controller>> {
        self.controllers
            .iter()
            .find(|c| c.name().eq_ignore_ascii_case(name))
            .cloned()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn Controller>> {
        self.controllers.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verbs() {
        assert!(Verbs::Get.allows(&Method::HEAD));
        assert!(!Verbs::Get.allows(&Method::POST));
        assert!(Verbs::Post.allows(&Method::POST));
        assert!(Verbs::GetAndPost.allows(&Method::GET));
        assert!(!Verbs::GetAndPost.allows(&Method::PUT));
    }

    #[test]
    fn test_registry_lookup_is_case_insensitive() {
        let registry = ControllerRegistry::discover();
        assert_eq!(registry.find("home").map(|c| c.name()), Some("Home"));
        assert!(registry.find("admin").is_none());
    }

    #[test]
    fn test_protected_actions() {
        let registry = ControllerRegistry::discover();
        for name in ["Presentations", "Speakers"] {
            let controller = registry.find(name).unwrap();
            let protected: Vec<&str> = controller
                .actions()
                .iter()
                .filter(|a| a.authorize)
                .map(|a| a.name)
                .collect();
            assert_eq!(protected, vec!["Create", "Edit", "Delete"]);
        }
    }
}
