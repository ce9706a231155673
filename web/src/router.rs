use crate::{controller::health_check_controller, sse::handler, AppState};
use axum::{
    http::{header, HeaderValue},
    routing::get,
    Json, Router,
};
use log::*;
use tower_http::set_header::SetResponseHeaderLayer;

use utoipa::{
    openapi::security::{ApiKey, ApiKeyValue, SecurityScheme},
    Modify, OpenApi,
};

// This is the global definition of our OpenAPI spec. To be a part
// of the rendered spec, a path and schema must be listed here.
#[derive(OpenApi)]
#[openapi(
        info(
            title = "SSE Relay API"
        ),
        paths(
            handler::sse_handler,
            health_check_controller::health_check,
        ),
        modifiers(&SecurityAddon),
        tags(
            (name = "sse_relay", description = "Server-Sent Events relay for message bus events")
        )
    )]
struct ApiDoc;

struct SecurityAddon;

// Defines the query-string token requirement for opening an event stream.
impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "sse_token",
                SecurityScheme::ApiKey(ApiKey::Query(ApiKeyValue::with_description(
                    "ssetoken",
                    "Short-lived HMAC-signed token issued by the backend application",
                ))),
            )
        }
    }
}

pub fn define_routes(app_state: AppState) -> Router {
    let allowed_origin = HeaderValue::from_str(&app_state.config.allowed_origin)
        .unwrap_or_else(|_| {
            warn!(
                "Invalid allowed origin {:?}, falling back to *",
                app_state.config.allowed_origin
            );
            HeaderValue::from_static("*")
        });

    Router::new()
        .merge(sse_routes(app_state))
        .merge(health_routes())
        .merge(api_doc_routes())
        // Applied to every response, including 401s, so browsers can read the failure
        .layer(SetResponseHeaderLayer::overriding(
            header::ACCESS_CONTROL_ALLOW_ORIGIN,
            allowed_origin,
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::ACCESS_CONTROL_ALLOW_CREDENTIALS,
            HeaderValue::from_static("true"),
        ))
}

fn sse_routes(app_state: AppState) -> Router {
    Router::new()
        .route("/sse-events", get(handler::sse_handler))
        .with_state(app_state)
}

fn health_routes() -> Router {
    Router::new().route("/health", get(health_check_controller::health_check))
}

fn api_doc_routes() -> Router {
    Router::new().route(
        "/api-docs/openapi.json",
        get(|| async { Json(ApiDoc::openapi()) }),
    )
}
