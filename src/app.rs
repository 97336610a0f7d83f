use axum::{
    extract::DefaultBodyLimit,
    http::HeaderValue,
    middleware::from_fn_with_state,
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::config::AppConfig;
use crate::handlers::{elevated, protected, public};
use crate::middleware::{require_admin, require_user};
use crate::state::AppState;

/// Every route with its auth gate, without transport layers
pub fn router(state: AppState) -> Router {
    Router::new()
        .merge(public_routes())
        .merge(protected_routes(state.clone()))
        .merge(elevated_routes(state.clone()))
        .with_state(state)
}

/// The router as served: body limit, CORS and request tracing on top
pub fn app(state: AppState, config: &AppConfig) -> Router {
    router(state).layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(cors_layer(&config.security.cors_origins))
            .layer(DefaultBodyLimit::max(config.api.max_request_size_bytes)),
    )
}

fn public_routes() -> Router<AppState> {
    Router::new()
        .route("/ping", get(public::ping))
        .route("/health", get(public::health))
}

fn protected_routes(state: AppState) -> Router<AppState> {
    use protected::{markers, me, objects, photo};

    Router::new()
        .route("/upload", post(markers::upload))
        .route("/markers", get(markers::list))
        .route(
            "/marker/:id",
            get(markers::show).post(markers::edit).delete(markers::remove),
        )
        .route("/photo/*path", get(photo::redirect))
        .route("/me", get(me::show))
        .route("/objects", get(objects::list).post(objects::create))
        .route_layer(from_fn_with_state(state, require_user))
}

fn elevated_routes(state: AppState) -> Router<AppState> {
    use elevated::{assignments, markers, objects, users};

    Router::new()
        .route("/markers/by-object/:id", get(markers::by_object))
        .route("/admin/users", get(users::list))
        .route("/admin/user", post(users::create))
        .route("/admin/user/:id", post(users::update).delete(users::remove))
        .route("/admin/object", get(objects::list).post(objects::create))
        .route(
            "/admin/object/:id",
            get(objects::show).post(objects::update).delete(objects::remove),
        )
        .route("/assignments", get(assignments::overview))
        .route("/assignments/toggle", post(assignments::toggle))
        .route_layer(from_fn_with_state(state, require_admin))
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.is_empty() {
        return CorsLayer::permissive();
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(allowed)
        .allow_methods(Any)
        .allow_headers(Any)
}
