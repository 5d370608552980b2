use crate::api::handlers::{admin, auth, health, orders, training};
use crate::auth::middleware::require_auth;
use crate::gateway::rate_limit;
use crate::AppState;
use axum::{
    extract::{DefaultBodyLimit, Request},
    http::{header, HeaderValue, Method, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};

const ALLOWED_METHODS: &str = "GET,POST,PUT,OPTIONS";
const ALLOWED_HEADERS: &str = "Content-Type, Authorization";

#[derive(OpenApi)]
#[openapi(
    info(title = "Masterfork Gateway", description = "Authentication and order/training proxy"),
    paths(
        auth::register,
        auth::login,
        auth::update_profile,
        auth::me,
        auth::refresh,
        orders::list_orders,
        orders::create_order,
        training::list_training,
        training::create_training,
        admin::admin_orders,
        admin::admin_training,
        health::health_check,
    ),
    components(schemas(
        crate::types::RegisterRequest,
        crate::types::LoginRequest,
        crate::types::ProfileUpdateRequest,
        crate::types::RefreshRequest,
        crate::types::PublicUser,
        crate::types::AuthResponse,
        crate::types::ProfileResponse,
        crate::types::MeResponse,
        crate::types::TokenResponse,
        crate::types::ErrorBody,
        crate::gateway::OrderPayload,
        crate::gateway::OrderItem,
        crate::gateway::TrainingPayload,
        health::HealthResponse,
    )),
    modifiers(&BearerAuth),
    tags(
        (name = "auth", description = "Registration, login and profile"),
        (name = "orders", description = "Order proxy"),
        (name = "training", description = "Training registration proxy"),
        (name = "admin", description = "Back-office proxies"),
        (name = "health", description = "Liveness"),
    )
)]
pub struct ApiDoc;

struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

/// Answers every `OPTIONS` request with 204 and the CORS headers, and stamps
/// the allowed methods and headers onto every other response.
async fn cors_headers(req: Request, next: Next) -> Response {
    let mut response = if req.method() == Method::OPTIONS {
        StatusCode::NO_CONTENT.into_response()
    } else {
        next.run(req).await
    };

    let headers = response.headers_mut();
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_ORIGIN,
        HeaderValue::from_static("*"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static(ALLOWED_METHODS),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static(ALLOWED_HEADERS),
    );
    response
}

fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
}

/// Builds the full gateway router.
///
/// Gated route groups check the rate limit before the bearer token, so a
/// flooding client is turned away without touching the identity store.
pub fn create_router(state: AppState) -> Router {
    let auth_service = state.auth_service.clone();
    let bearer = middleware::from_fn(move |req: Request, next: Next| {
        require_auth(auth_service.clone(), req, next)
    });

    let orders_limiter = state.rate_limiter.clone();
    let orders_limit = middleware::from_fn(move |req: Request, next: Next| {
        rate_limit::enforce(orders_limiter.clone(), "orders", req, next)
    });

    let training_limiter = state.rate_limiter.clone();
    let training_limit = middleware::from_fn(move |req: Request, next: Next| {
        rate_limit::enforce(training_limiter.clone(), "training", req, next)
    });

    let public_auth = Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/auth/refresh", post(auth::refresh));

    let protected_auth = Router::new()
        .route("/auth/profile", put(auth::update_profile))
        .route("/auth/me", get(auth::me))
        .route_layer(bearer.clone());

    let order_routes = Router::new()
        .route("/orders", get(orders::list_orders).post(orders::create_order))
        .route_layer(bearer)
        .route_layer(orders_limit);

    let training_routes = Router::new()
        .route(
            "/training",
            get(training::list_training).post(training::create_training),
        )
        .route_layer(training_limit);

    let admin_routes = Router::new()
        .route("/admin/orders", get(admin::admin_orders))
        .route("/admin/training", get(admin::admin_training));

    let body_limit = state.config.server.body_limit_bytes;

    Router::new()
        .route("/health", get(health::health_check))
        .route("/api-docs/openapi.json", get(health::openapi_json))
        .merge(public_auth)
        .merge(protected_auth)
        .merge(order_routes)
        .merge(training_routes)
        .merge(admin_routes)
        .fallback(health::not_found)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer())
        .layer(middleware::from_fn(cors_headers))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryUserStore;
    use crate::utils::toml_config::{GatewayConfig, IdentityBackend};
    use axum::{body::Body, extract::ConnectInfo};
    use std::net::SocketAddr;
    use std::sync::Arc;
    use tower::ServiceExt;

    fn router(capacity: u32) -> Router {
        let mut config = GatewayConfig::default();
        config.identity.backend = IdentityBackend::Memory;
        config.upstream.base_url = "http://127.0.0.1:1".to_string();
        config.rate_limit.capacity = capacity;
        let state = AppState::new(
            config,
            Arc::new(MemoryUserStore::new()),
            "router-test-secret-0123456789",
        )
        .unwrap();
        create_router(state)
    }

    fn post_orders_from(addr: &str) -> Request {
        let mut req = Request::builder()
            .method(Method::POST)
            .uri("/orders")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{}"))
            .unwrap();
        let addr: SocketAddr = addr.parse().unwrap();
        req.extensions_mut().insert(ConnectInfo(addr));
        req
    }

    #[tokio::test]
    async fn test_preflight_short_circuits_any_path() {
        let req = Request::builder()
            .method(Method::OPTIONS)
            .uri("/anything/at/all")
            .body(Body::empty())
            .unwrap();

        let response = router(60).oneshot(req).await.unwrap();

        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert_eq!(
            response.headers()[header::ACCESS_CONTROL_ALLOW_METHODS],
            ALLOWED_METHODS
        );
    }

    #[tokio::test]
    async fn test_error_responses_carry_cors_headers() {
        let req = Request::builder()
            .uri("/auth/me")
            .body(Body::empty())
            .unwrap();

        let response = router(60).oneshot(req).await.unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
        assert_eq!(
            response.headers()[header::ACCESS_CONTROL_ALLOW_HEADERS],
            ALLOWED_HEADERS
        );
    }

    #[tokio::test]
    async fn test_peer_address_keys_the_bucket() {
        let app = router(1);

        let first = app
            .clone()
            .oneshot(post_orders_from("10.0.0.1:5000"))
            .await
            .unwrap();
        assert_eq!(first.status(), StatusCode::UNAUTHORIZED);

        // Same host, different port: same client.
        let second = app
            .clone()
            .oneshot(post_orders_from("10.0.0.1:6000"))
            .await
            .unwrap();
        assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);

        let other = app.oneshot(post_orders_from("10.0.0.2:5000")).await.unwrap();
        assert_eq!(other.status(), StatusCode::UNAUTHORIZED);
    }
}
