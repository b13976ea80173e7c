//! Endpoint resolution: page routes first, then the conventional route.

mod pattern;

pub use pattern::{RoutePattern, RouteValues};

use crate::controllers::{ActionDescriptor, Controller, ControllerRegistry};
use crate::error::{AppError, AppResult};
use crate::pages::{Page, PageRegistry};
use http::Method;
use std::sync::Arc;

/// The application's conventional route
pub const DEFAULT_ROUTE: &str = "{controller=Home}/{action=Index}/{id?}";

#[derive(Clone)]
pub enum EndpointTarget {
    Action {
        controller: Arc<dyn Controller>,
        action: &'static ActionDescriptor,
    },
    Page(Arc<dyn Page>),
    /// The path matched but not for this HTTP method
    MethodNotAllowed { allow: &'static str },
}

/// Endpoint selected by the routing stage, stored in request extensions
#[derive(Clone)]
pub struct Endpoint {
    pub display_name: String,
    pub requires_authorization: bool,
    pub route_values: RouteValues,
    pub target: EndpointTarget,
}

pub struct EndpointRouter {
    pattern: RoutePattern,
    controllers: Arc<ControllerRegistry>,
    pages: matchit::Router<Arc<dyn Page>>,
    page_paths: Vec<&'static str>,
}

impl EndpointRouter {
    pub fn new(
        pattern: RoutePattern,
        controllers: Arc<ControllerRegistry>,
        pages: &PageRegistry,
    ) -> AppResult<Self> {
        let mut router = matchit::Router::new();
        let mut page_paths = Vec::new();
        for page in pages.iter() {
            router
                .insert(page.path().to_ascii_lowercase(), Arc::clone(page))
                .map_err(|e| {
                    AppError::Configuration(format!("Invalid page route {}: {}", page.path(), e))
                })?;
            page_paths.push(page.path());
        }

        Ok(Self {
            pattern,
            controllers,
            pages: router,
            page_paths,
        })
    }

    pub fn pattern(&self) -> &RoutePattern {
        &self.pattern
    }

    pub fn page_paths(&self) -> &[&'static str] {
        &self.page_paths
    }

    pub fn controllers(&self) -> &ControllerRegistry {
        &self.controllers
    }

    /// Select the endpoint for a request, if any
    pub fn resolve(&self, method: &Method, path: &str) -> Option<Endpoint> {
        let lowered = path.to_ascii_lowercase();
        let page_key = match lowered.trim_end_matches('/') {
            "" => "/",
            trimmed => trimmed,
        };

        if let Ok(matched) = self.pages.at(page_key) {
            let page = Arc::clone(matched.value);
            let display_name = format!("Page {}", page.path());
            if !page.verbs().allows(method) {
                return Some(method_not_allowed(display_name, page.verbs().allow_header()));
            }
            return Some(Endpoint {
                display_name,
                requires_authorization: page.authorize(),
                route_values: RouteValues::default(),
                target: EndpointTarget::Page(page),
            });
        }

        let mut values = self.pattern.match_path(path)?;
        let controller = self.controllers.find(values.get("controller")?)?;
        let requested_action = values.get("action")?.to_string();
        let action = controller
            .actions()
            .iter()
            .find(|a| a.name.eq_ignore_ascii_case(&requested_action))?;

        let display_name = format!("{}.{}", controller.name(), action.name);
        if !action.verbs.allows(method) {
            return Some(method_not_allowed(display_name, action.verbs.allow_header()));
        }

        values.insert("controller", controller.name());
        values.insert("action", action.name);

        Some(Endpoint {
            display_name,
            requires_authorization: action.authorize,
            route_values: values,
            target: EndpointTarget::Action { controller, action },
        })
    }
}

fn method_not_allowed(display_name: String, allow: &'static str) -> Endpoint {
    Endpoint {
        display_name,
        requires_authorization: false,
        route_values: RouteValues::default(),
        target: EndpointTarget::MethodNotAllowed { allow },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn router() -> EndpointRouter {
        EndpointRouter::new(
            RoutePattern::parse(DEFAULT_ROUTE).unwrap(),
            Arc::new(ControllerRegistry::discover()),
            &PageRegistry::discover(),
        )
        .unwrap()
    }

    #[test]
    fn test_root_resolves_to_home_index() {
        let endpoint = router().resolve(&Method::GET, "/").unwrap();
        assert_eq!(endpoint.display_name, "Home.Index");
        assert!(!endpoint.requires_authorization);
    }

    #[test]
    fn test_controller_names_are_case_insensitive() {
        let endpoint = router().resolve(&Method::GET, "/presentations/details/3").unwrap();
        assert_eq!(endpoint.display_name, "Presentations.Details");
        assert_eq!(endpoint.route_values.get("controller"), Some("Presentations"));
        assert_eq!(endpoint.route_values.get("id"), Some("3"));
    }

    #[test]
    fn test_pages_take_precedence() {
        let endpoint = router()
            .resolve(&Method::GET, "/Identity/Account/Login/")
            .unwrap();
        assert_eq!(endpoint.display_name, "Page /Identity/Account/Login");
    }

    #[test]
    fn test_protected_actions_are_flagged() {
        let endpoint = router().resolve(&Method::POST, "/Speakers/Create").unwrap();
        assert!(endpoint.requires_authorization);
    }

    #[test]
    fn test_wrong_method_resolves_to_method_not_allowed() {
        let endpoint = router().resolve(&Method::DELETE, "/Home/Index").unwrap();
        assert!(matches!(
            endpoint.target,
            EndpointTarget::MethodNotAllowed { allow: "GET, HEAD" }
        ));
    }

    #[test]
    fn test_unknown_paths_do_not_resolve() {
        let router = router();
        assert!(router.resolve(&Method::GET, "/Nope").is_none());
        assert!(router.resolve(&Method::GET, "/Home/Nope").is_none());
        assert!(router.resolve(&Method::GET, "/Home/Index/1/extra").is_none());
    }
}
