use std::{collections::HashMap, net::SocketAddr};

use axum::{
    extract::Query,
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use kerala_trips::{
    error::{AppError, TOKEN_INVALID},
    services::identity::{GoTrueIdentity, IdentityProvider},
};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use url::Url;

const SERVICE_KEY: &str = "service-key";
const REDIRECT: &str = "https://app.example.com/reset-password";

type Reply = (StatusCode, Json<Value>);

async fn current_user(headers: HeaderMap) -> Reply {
    if headers.get("apikey").and_then(|v| v.to_str().ok()) != Some(SERVICE_KEY) {
        return (StatusCode::UNAUTHORIZED, Json(json!({ "message": "No API key found" })));
    }
    let bearer = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));
    match bearer {
        Some("good-token") => (
            StatusCode::OK,
            Json(json!({ "id": "gt-user-1", "email": "anu@example.com" })),
        ),
        Some("outage-token") => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "message": "upstream unavailable" })),
        ),
        _ => (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "msg": "invalid JWT: token is expired" })),
        ),
    }
}

async fn admin_users(Json(body): Json<Value>) -> Reply {
    match body["email"].as_str() {
        Some("taken@example.com") => (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({ "msg": "A user with this email address has already been registered" })),
        ),
        Some("outage@example.com") => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "message": "database is down" })),
        ),
        Some(email) => (
            StatusCode::OK,
            Json(json!({
                "id": "gt-user-2",
                "email": email,
                "created_at": "2025-01-15T09:30:00Z",
            })),
        ),
        None => (StatusCode::BAD_REQUEST, Json(json!({}))),
    }
}

async fn recover(Query(query): Query<HashMap<String, String>>, Json(body): Json<Value>) -> Reply {
    match body["email"].as_str() {
        Some("busy@example.com") => (StatusCode::TOO_MANY_REQUESTS, Json(json!({}))),
        Some(_) if query.get("redirect_to").map(String::as_str) == Some(REDIRECT) => {
            (StatusCode::OK, Json(json!({})))
        }
        _ => (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error_description": "missing redirect" })),
        ),
    }
}

/// Serves a fake auth API under `/project` and returns its base URL.
async fn fake_auth_api() -> anyhow::Result<Url> {
    let api = Router::new()
        .route("/auth/v1/user", get(current_user))
        .route("/auth/v1/admin/users", post(admin_users))
        .route("/auth/v1/recover", post(recover));
    let app = Router::new().nest("/project", api);

    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr: SocketAddr = listener.local_addr()?;
    tokio::spawn(async move {
        axum::serve(listener, app.into_make_service())
            .await
            .expect("auth stub");
    });
    Ok(Url::parse(&format!("http://{addr}/project"))?)
}

async fn identity() -> anyhow::Result<GoTrueIdentity> {
    Ok(GoTrueIdentity::new(fake_auth_api().await?, SERVICE_KEY.into()))
}

#[tokio::test]
async fn token_check_maps_provider_statuses() -> anyhow::Result<()> {
    let identity = identity().await?;

    let user = identity.verify_token("good-token").await?;
    assert_eq!(user.id, "gt-user-1");
    assert_eq!(user.email.as_deref(), Some("anu@example.com"));

    let rejected = identity.verify_token("stale-token").await.unwrap_err();
    assert!(matches!(rejected, AppError::Unauthorized(TOKEN_INVALID)));
    assert_eq!(rejected.status(), StatusCode::UNAUTHORIZED);

    let outage = identity.verify_token("outage-token").await.unwrap_err();
    assert!(matches!(outage, AppError::Identity(_)));
    assert_eq!(outage.status(), StatusCode::INTERNAL_SERVER_ERROR);
    Ok(())
}

#[tokio::test]
async fn registration_maps_provider_statuses() -> anyhow::Result<()> {
    let identity = identity().await?;

    let created = identity
        .create_user("new@example.com", "backwaters", "Anu")
        .await?;
    assert_eq!(created.id, "gt-user-2");
    assert_eq!(created.email, "new@example.com");
    assert_eq!(created.created_at.to_rfc3339(), "2025-01-15T09:30:00+00:00");
    assert_eq!(created.access_token, None);

    let taken = identity
        .create_user("taken@example.com", "backwaters", "Anu")
        .await
        .unwrap_err();
    assert_eq!(taken.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        taken.to_string(),
        "A user with this email address has already been registered"
    );

    let outage = identity
        .create_user("outage@example.com", "backwaters", "Anu")
        .await
        .unwrap_err();
    assert_eq!(outage.status(), StatusCode::INTERNAL_SERVER_ERROR);
    Ok(())
}

#[tokio::test]
async fn password_reset_forwards_redirect_and_maps_rejections() -> anyhow::Result<()> {
    let identity = identity().await?;

    identity
        .send_password_reset("anu@example.com", Some(REDIRECT))
        .await?;

    let missing = identity
        .send_password_reset("anu@example.com", None)
        .await
        .unwrap_err();
    assert_eq!(missing.status(), StatusCode::BAD_REQUEST);
    assert_eq!(missing.to_string(), "missing redirect");

    let throttled = identity
        .send_password_reset("busy@example.com", Some(REDIRECT))
        .await
        .unwrap_err();
    assert_eq!(throttled.status(), StatusCode::BAD_REQUEST);
    Ok(())
}
