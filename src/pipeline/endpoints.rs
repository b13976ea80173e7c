use super::{https, record, Stage};
use crate::auth::ClaimsPrincipal;
use crate::controllers::ActionContext;
use crate::error::AppError;
use crate::routing::{Endpoint, EndpointTarget};
use crate::state::AppState;
use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use http::header::ALLOW;
use tracing::debug;

/// Resolve the endpoint and store it in request extensions for the stages
/// that follow
pub async fn routing(State(state): State<AppState>, mut req: Request, next: Next) -> Response {
    match state.endpoints.resolve(req.method(), req.uri().path()) {
        Some(endpoint) => {
            debug!(endpoint = %endpoint.display_name, "Request matched endpoint");
            req.extensions_mut().insert(endpoint);
        }
        None => debug!(path = %req.uri().path(), "Request did not match any endpoint"),
    }
    next.run(req).await
}

/// Run the endpoint chosen by the routing stage
pub async fn dispatch(State(state): State<AppState>, req: Request) -> Response {
    record(&req, Stage::Endpoints);

    let Some(endpoint) = req.extensions().get::<Endpoint>().cloned() else {
        return AppError::NotFound(format!("No endpoint for {}", req.uri().path())).into_response();
    };

    let user = req.extensions().get::<ClaimsPrincipal>().cloned();
    let https = https::is_https(&req, state.config.web.trust_forwarded_proto);
    let ctx = ActionContext {
        https,
        request: req,
        route_values: endpoint.route_values,
        user,
        scope: state.services.create_scope(),
    };

    match endpoint.target {
        EndpointTarget::MethodNotAllowed { allow } => {
            (StatusCode::METHOD_NOT_ALLOWED, [(ALLOW, allow)]).into_response()
        }
        EndpointTarget::Action { controller, action } => {
            controller.invoke(action.name, ctx).await.into_response()
        }
        EndpointTarget::Page(page) => page.handle(ctx).await.into_response(),
    }
}
