//! Status/user HTTP API
//!
//! Read-only axum server running alongside the bot: process status plus the
//! registered user roster, backed by the same store the dispatcher uses.
//! Writes stay on the Telegram side.

use axum::{
    extract::{Path, State},
    http::{header, Method, StatusCode},
    response::{Html, IntoResponse},
    routing::get,
    Json, Router,
};
use serde_json::json;
use std::sync::Arc;
use std::time::Instant;
use tokio::signal;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::store::Store;

#[derive(Clone)]
pub struct ApiState {
    pub store: Arc<Store>,
    pub started_at: Instant,
}

impl ApiState {
    pub fn new(store: Arc<Store>) -> Self {
        Self {
            store,
            started_at: Instant::now(),
        }
    }
}

/// Build the router with all routes and middleware.
pub fn build_router(state: ApiState) -> Router {
    // Read-only surface, so CORS allows GET from anywhere.
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET])
        .allow_headers([header::CONTENT_TYPE]);

    Router::new()
        .route("/", get(index_handler))
        .route("/api/status", get(status_handler))
        .route("/api/users", get(users_handler))
        .route("/api/users/{id}", get(user_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve the API on `port` until a shutdown signal arrives.
pub async fn serve(state: ApiState, port: u16) -> anyhow::Result<()> {
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
    let router = build_router(state);

    info!("Starting status API on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Status API shut down gracefully");
    Ok(())
}

async fn status_handler(State(state): State<ApiState>) -> impl IntoResponse {
    let active_users = match state.store.user_count() {
        Ok(count) => count,
        Err(e) => {
            error!("Status query failed: {}", e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "message": "storage error" })),
            );
        }
    };

    (
        StatusCode::OK,
        Json(json!({
            "status": "online",
            "uptime": state.started_at.elapsed().as_secs(),
            "activeUsers": active_users,
        })),
    )
}

async fn users_handler(State(state): State<ApiState>) -> impl IntoResponse {
    match state.store.list_users() {
        Ok(users) => (StatusCode::OK, Json(json!(users))),
        Err(e) => {
            error!("User listing failed: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "message": "storage error" })),
            )
        }
    }
}

async fn user_handler(
    State(state): State<ApiState>,
    Path(id): Path<i64>,
) -> impl IntoResponse {
    match state.store.get_user(id) {
        Ok(Some(user)) => (StatusCode::OK, Json(json!(user))),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(json!({ "message": "User not found" })),
        ),
        Err(e) => {
            error!("User lookup failed for {}: {}", id, e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "message": "storage error" })),
            )
        }
    }
}

async fn index_handler() -> impl IntoResponse {
    Html(INDEX_PAGE)
}

/// Graceful shutdown signal handler.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => error!("Failed to install signal handler: {}", e),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down API"),
        _ = terminate => info!("Received SIGTERM, shutting down API"),
    }
}

/// Terminal-styled landing page pointing at the JSON endpoints.
const INDEX_PAGE: &str = r#"<!DOCTYPE html>
<html lang="es">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>Kenner Bot</title>
    <style>
        * { margin: 0; padding: 0; box-sizing: border-box; }
        body {
            font-family: 'SF Mono', 'Fira Code', 'JetBrains Mono', monospace;
            background: #050b11;
            color: #9fb4c7;
            min-height: 100vh;
            display: flex;
            align-items: center;
            justify-content: center;
        }
        .card {
            position: relative;
            border: 1px solid rgba(0, 243, 255, 0.25);
            background: rgba(13, 25, 35, 0.6);
            min-width: 22rem;
        }
        .card::before, .card::after {
            content: '';
            position: absolute;
            width: 8px;
            height: 8px;
        }
        .card::before {
            top: -1px;
            left: -1px;
            border-top: 2px solid #00f3ff;
            border-left: 2px solid #00f3ff;
        }
        .card::after {
            bottom: -1px;
            right: -1px;
            border-bottom: 2px solid #00f3ff;
            border-right: 2px solid #00f3ff;
        }
        .header {
            display: flex;
            align-items: center;
            gap: 0.5rem;
            padding: 0.75rem 1rem;
            border-bottom: 1px solid rgba(0, 243, 255, 0.15);
            color: #00f3ff;
            font-size: 0.8rem;
            letter-spacing: 0.15em;
            text-transform: uppercase;
        }
        .dot {
            width: 8px;
            height: 8px;
            background: #00f3ff;
            border-radius: 50%;
            box-shadow: 0 0 8px rgba(0, 243, 255, 0.6);
            animation: pulse 2s infinite;
        }
        @keyframes pulse {
            0%, 100% { opacity: 1; }
            50% { opacity: 0.4; }
        }
        .body { padding: 1.25rem 1rem; font-size: 0.875rem; }
        .body p { margin-bottom: 1rem; }
        .prompt::before { content: '> '; color: #00f3ff; }
        a { color: #00f3ff; text-decoration: none; }
        a:hover { text-decoration: underline; }
    </style>
</head>
<body>
    <div class="card">
        <div class="header"><span class="dot"></span>KENNER // SISTEMA</div>
        <div class="body">
            <p class="prompt">El bot está corriendo. API de solo lectura.</p>
            <p class="prompt"><a href="/api/status">/api/status</a></p>
            <p class="prompt"><a href="/api/users">/api/users</a></p>
        </div>
    </div>
</body>
</html>"#;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::roles::Role;
    use crate::store::Profile;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use tower::ServiceExt;

    fn test_router() -> (Router, Arc<Store>) {
        let store = Arc::new(Store::open_in_memory().unwrap());
        let router = build_router(ApiState::new(Arc::clone(&store)));
        (router, store)
    }

    fn seed(store: &Store, telegram_id: i64, username: &str) -> i64 {
        let (user, _) = store
            .ensure_user(
                telegram_id,
                &Profile {
                    username: Some(username.to_string()),
                    first_name: None,
                    last_name: None,
                },
            )
            .unwrap();
        user.id
    }

    async fn get_json(router: Router, uri: &str) -> (StatusCode, serde_json::Value) {
        let response = router
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&body).unwrap())
    }

    #[tokio::test]
    async fn test_status_reports_user_count() {
        let (router, store) = test_router();
        seed(&store, 111, "ana");
        seed(&store, 222, "luis");

        let (status, json) = get_json(router, "/api/status").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["status"], "online");
        assert_eq!(json["activeUsers"], 2);
        assert!(json["uptime"].is_number());
    }

    #[tokio::test]
    async fn test_users_listing_shape() {
        let (router, store) = test_router();
        seed(&store, 111, "ana");

        let (status, json) = get_json(router, "/api/users").await;
        assert_eq!(status, StatusCode::OK);
        let users = json.as_array().unwrap();
        assert_eq!(users.len(), 1);
        assert_eq!(users[0]["telegramId"], 111);
        assert_eq!(users[0]["username"], "ana");
        assert_eq!(users[0]["role"], "operator");
    }

    #[tokio::test]
    async fn test_user_by_internal_id() {
        let (router, store) = test_router();
        let id = seed(&store, 111, "ana");
        store.update_user_role(id, Role::Admin).unwrap();

        let (status, json) = get_json(router, &format!("/api/users/{}", id)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["id"], id);
        assert_eq!(json["role"], "admin");
    }

    #[tokio::test]
    async fn test_missing_user_is_404() {
        let (router, _store) = test_router();

        let (status, json) = get_json(router, "/api/users/999").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json["message"], "User not found");
    }

    #[tokio::test]
    async fn test_index_returns_html() {
        let (router, _store) = test_router();
        let response = router
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let html = String::from_utf8_lossy(&body);
        assert!(html.contains("Kenner Bot"));
    }
}
