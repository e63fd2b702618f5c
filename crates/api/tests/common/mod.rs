#![allow(dead_code)]

use std::time::Duration;

use axum::body::Body;
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{HeaderName, Method, Request, StatusCode};
use axum::response::Response;
use axum::Router;
use http_body_util::BodyExt;
use jsonwebtoken::{encode, EncodingKey, Header};
use sqlx::PgPool;
use tower::ServiceExt;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::CorsLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;

use atelier_api::auth::jwt::{Claims, JwtConfig};
use atelier_api::config::ServerConfig;
use atelier_api::middleware::caller::GUEST_ID_HEADER;
use atelier_api::routes;
use atelier_api::state::AppState;

pub const JWT_SECRET: &str = "test-secret-that-is-long-enough-for-hmac";

/// Guest limit used by every test app.
pub const GUEST_LIMIT: i64 = 2;

pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        guest_preview_limit: GUEST_LIMIT,
        jwt: JwtConfig {
            secret: JWT_SECRET.to_string(),
        },
    }
}

/// Mirror of the router built in `main.rs`.
pub fn build_test_app(pool: PgPool) -> Router {
    let state = AppState::new(pool, test_config());

    let cors = CorsLayer::new()
        .allow_origin(["http://localhost:5173".parse().unwrap()])
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([
            CONTENT_TYPE,
            AUTHORIZATION,
            HeaderName::from_static(GUEST_ID_HEADER),
        ])
        .allow_credentials(true)
        .max_age(Duration::from_secs(3600));

    let request_id_header = HeaderName::from_static("x-request-id");

    Router::new()
        .merge(routes::health::router())
        .nest("/api/v1", routes::api_routes())
        .layer(CatchPanicLayer::new())
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(30),
        ))
        .layer(PropagateRequestIdLayer::new(request_id_header.clone()))
        .layer(SetRequestIdLayer::new(request_id_header, MakeRequestUuid))
        .layer(cors)
        .with_state(state)
}

/// A valid access token for `user_id`.
pub fn token_for(user_id: i64) -> String {
    let now = chrono::Utc::now().timestamp();
    encode(
        &Header::default(),
        &Claims {
            sub: user_id,
            exp: now + 600,
            iat: now,
        },
        &EncodingKey::from_secret(JWT_SECRET.as_bytes()),
    )
    .unwrap()
}

/// How a test request identifies itself.
#[derive(Debug, Clone)]
pub enum As {
    User(i64),
    Guest(&'static str),
    Anonymous,
}

fn request(method: Method, uri: &str, who: &As, body: Option<serde_json::Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    builder = match who {
        As::User(id) => builder.header(AUTHORIZATION, format!("Bearer {}", token_for(*id))),
        As::Guest(id) => builder.header(GUEST_ID_HEADER, *id),
        As::Anonymous => builder,
    };
    match body {
        Some(json) => builder
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

pub async fn get(app: Router, uri: &str, who: As) -> Response {
    app.oneshot(request(Method::GET, uri, &who, None))
        .await
        .unwrap()
}

pub async fn post_json(app: Router, uri: &str, who: As, body: serde_json::Value) -> Response {
    app.oneshot(request(Method::POST, uri, &who, Some(body)))
        .await
        .unwrap()
}

pub async fn post(app: Router, uri: &str, who: As) -> Response {
    app.oneshot(request(Method::POST, uri, &who, None))
        .await
        .unwrap()
}

pub async fn body_json(response: Response) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

/// Insert a design subject and return its id.
pub async fn insert_subject(pool: &PgPool, kind: &str, owner_user_id: Option<i64>) -> i64 {
    sqlx::query_scalar(
        "INSERT INTO design_subjects (subject_kind, owner_user_id, semantic_snapshot) \
         VALUES ($1, $2, $3) RETURNING id",
    )
    .bind(kind)
    .bind(owner_user_id)
    .bind(serde_json::json!({
        "category": "ring",
        "metal": "platinum",
        "stones": [{ "shape": "round", "carat": 1.0 }],
    }))
    .fetch_one(pool)
    .await
    .unwrap()
}

/// Force a job's status, as the worker would after processing it.
pub async fn set_status(pool: &PgPool, job_id: i64, status_id: i16, error: Option<&str>) {
    sqlx::query("UPDATE preview_jobs SET status_id = $2, error_message = $3 WHERE id = $1")
        .bind(job_id)
        .bind(status_id)
        .bind(error)
        .execute(pool)
        .await
        .unwrap();
}
