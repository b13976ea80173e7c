//! The ordered request-handling stages and the router they are layered onto.
//!
//! [`stages_for`] yields the stage list for a hosting environment and
//! [`build`] turns that list into an axum [`Router`]. The list is the only
//! place stage order is decided: `build` layers the stages so that a request
//! meets them in list order.

pub mod endpoints;
pub mod exceptions;
pub mod https;
pub mod security;
pub mod static_files;

use crate::config::HostEnvironment;
use crate::error::{AppError, AppResult};
use crate::request_id::request_id_middleware;
use crate::state::AppState;
use axum::extract::{Request, State};
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::Router;
use std::collections::HashSet;
use std::fmt;
use std::sync::{Arc, Mutex};
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    DeveloperExceptionPage,
    DatabaseErrorPage,
    ExceptionHandler,
    Hsts,
    Cors,
    HttpsRedirection,
    StaticFiles,
    CookiePolicy,
    Routing,
    Authentication,
    Authorization,
    Endpoints,
}

impl Stage {
    /// Every stage in the only order they may appear in
    pub const CANONICAL: [Stage; 12] = [
        Stage::DeveloperExceptionPage,
        Stage::DatabaseErrorPage,
        Stage::ExceptionHandler,
        Stage::Hsts,
        Stage::Cors,
        Stage::HttpsRedirection,
        Stage::StaticFiles,
        Stage::CookiePolicy,
        Stage::Routing,
        Stage::Authentication,
        Stage::Authorization,
        Stage::Endpoints,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Stage::DeveloperExceptionPage => "DeveloperExceptionPage",
            Stage::DatabaseErrorPage => "DatabaseErrorPage",
            Stage::ExceptionHandler => "ExceptionHandler",
            Stage::Hsts => "Hsts",
            Stage::Cors => "Cors",
            Stage::HttpsRedirection => "HttpsRedirection",
            Stage::StaticFiles => "StaticFiles",
            Stage::CookiePolicy => "CookiePolicy",
            Stage::Routing => "Routing",
            Stage::Authentication => "Authentication",
            Stage::Authorization => "Authorization",
            Stage::Endpoints => "Endpoints",
        }
    }

    fn rank(&self) -> usize {
        Self::CANONICAL
            .iter()
            .position(|s| s == self)
            .unwrap_or(usize::MAX)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Stage list for a hosting environment
pub fn stages_for(environment: &HostEnvironment) -> Vec<Stage> {
    let mut stages = if environment.is_development() {
        vec![Stage::DeveloperExceptionPage, Stage::DatabaseErrorPage]
    } else {
        vec![Stage::ExceptionHandler, Stage::Hsts]
    };

    stages.extend([
        Stage::Cors,
        Stage::HttpsRedirection,
        Stage::StaticFiles,
        Stage::CookiePolicy,
        Stage::Routing,
        Stage::Authentication,
        Stage::Authorization,
        Stage::Endpoints,
    ]);
    stages
}

/// Reject stage lists that are out of order, repeat a stage, or cannot
/// dispatch
pub fn validate_order(stages: &[Stage]) -> AppResult<()> {
    let mut seen = HashSet::new();
    for stage in stages {
        if !seen.insert(*stage) {
            return Err(AppError::Configuration(format!(
                "Stage {} appears more than once",
                stage
            )));
        }
    }

    if let Some(pair) = stages.windows(2).find(|w| w[0].rank() > w[1].rank()) {
        return Err(AppError::Configuration(format!(
            "Stage {} must run before {}",
            pair[1], pair[0]
        )));
    }

    if stages.last() != Some(&Stage::Endpoints) {
        return Err(AppError::Configuration(
            "The pipeline must end with Endpoints".to_string(),
        ));
    }

    if !seen.contains(&Stage::Routing) {
        return Err(AppError::Configuration(
            "Endpoints requires the Routing stage".to_string(),
        ));
    }

    Ok(())
}

/// Records the stages a request passes through. Insert into a request's
/// extensions to observe it.
#[derive(Debug, Clone, Default)]
pub struct StageTrace(Arc<Mutex<Vec<Stage>>>);

impl StageTrace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stages(&self) -> Vec<Stage> {
        match self.0.lock() {
            Ok(stages) => stages.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn push(&self, stage: Stage) {
        match self.0.lock() {
            Ok(mut stages) => stages.push(stage),
            Err(poisoned) => poisoned.into_inner().push(stage),
        }
    }
}

/// Note that a request reached `stage`
pub fn record<B>(request: &Request<B>, stage: Stage) {
    if let Some(trace) = request.extensions().get::<StageTrace>() {
        trace.push(stage);
    }
}

async fn record_stage(State(stage): State<Stage>, req: Request, next: Next) -> Response {
    record(&req, stage);
    next.run(req).await
}

/// Layer `stages` onto the dispatch fallback, first stage outermost
pub fn build(stages: &[Stage], state: AppState, cors_policy: &str) -> AppResult<Router> {
    validate_order(stages)?;

    let mut router = Router::new()
        .fallback(endpoints::dispatch)
        .with_state(state.clone());

    // Router::layer wraps everything added so far, so the innermost stage
    // has to be applied first.
    for stage in stages.iter().rev() {
        router = match stage {
            // The fallback records itself
            Stage::Endpoints => router,
            Stage::DeveloperExceptionPage => router
                .layer(CatchPanicLayer::custom(exceptions::panic_response))
                .layer(middleware::from_fn(exceptions::developer_exception_page)),
            Stage::DatabaseErrorPage => router.layer(middleware::from_fn_with_state(
                state.clone(),
                exceptions::database_error_page,
            )),
            Stage::ExceptionHandler => router
                .layer(CatchPanicLayer::custom(exceptions::panic_response))
                .layer(exceptions::ExceptionHandlerLayer::new(exceptions::ERROR_PATH)),
            Stage::Hsts => {
                router.layer(middleware::from_fn_with_state(state.clone(), https::hsts))
            }
            Stage::Cors => {
                let layer = state.services.cors().policy(cors_policy)?.layer()?;
                router.layer(layer)
            }
            Stage::HttpsRedirection => match state.config.web.https_port {
                Some(_) => router.layer(middleware::from_fn_with_state(
                    state.clone(),
                    https::https_redirection,
                )),
                None => {
                    warn!("Failed to determine the https port for redirect; HTTPS redirection is disabled");
                    router
                }
            },
            Stage::StaticFiles => router.layer(middleware::from_fn_with_state(
                state.clone(),
                static_files::static_files,
            )),
            Stage::CookiePolicy => router.layer(middleware::from_fn_with_state(
                state.clone(),
                security::cookie_policy,
            )),
            Stage::Routing => router.layer(middleware::from_fn_with_state(
                state.clone(),
                endpoints::routing,
            )),
            Stage::Authentication => router.layer(middleware::from_fn_with_state(
                state.clone(),
                security::authentication,
            )),
            Stage::Authorization => router.layer(middleware::from_fn(security::authorization)),
        };

        if *stage != Stage::Endpoints {
            router = router.layer(middleware::from_fn_with_state(*stage, record_stage));
        }
    }

    for (position, stage) in stages.iter().enumerate() {
        info!(position = position + 1, stage = %stage, "Pipeline stage added");
    }

    // Host layers sit outside the ordered stages
    Ok(router
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(request_id_middleware)))
}
