//! HTTP surface: the bulk shift endpoint and the maintenance jobs

use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;
use tower_http::trace::TraceLayer;
use tracing::error;

use crate::error::Error;
use crate::services::{process_bulk_actions, BulkAction, BulkActionResult};
use crate::Scheduler;

/// Shared state of the router
#[derive(Clone)]
pub struct AppState {
    /// Built with the public key; rebound to each caller's access token
    pub scheduler: Scheduler,
    /// Built with service credentials for the cron jobs
    pub maintenance: Scheduler,
    /// Bearer secret the cron endpoints expect
    pub cron_secret: Option<String>,
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Scheduler(#[from] Error),
    #[error("Unauthorized")]
    BadCronSecret,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::BadCronSecret | ApiError::Scheduler(Error::Unauthorized) => {
                StatusCode::UNAUTHORIZED
            }
            ApiError::Scheduler(Error::Validation(_)) => StatusCode::BAD_REQUEST,
            ApiError::Scheduler(Error::NotFound(_)) => StatusCode::NOT_FOUND,
            ApiError::Scheduler(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            error!(error = %self, "request failed");
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

#[derive(Debug, Deserialize)]
pub struct BulkRequest {
    pub actions: Vec<BulkAction>,
}

#[derive(Debug, Serialize)]
pub struct BulkResponse {
    pub results: Vec<BulkActionResult>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/shifts/bulk", post(bulk_shifts))
        .route("/api/cron/cleanup-history", post(cleanup_history))
        .route("/api/cron/clock-out-reminder", post(clock_out_reminder))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

async fn bulk_shifts(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<BulkRequest>,
) -> Result<Json<BulkResponse>, ApiError> {
    let scheduler = match bearer_token(&headers) {
        Some(token) => state.scheduler.with_access_token(token)?,
        None => state.scheduler.clone(),
    };
    let results = process_bulk_actions(&scheduler, request.actions).await?;
    Ok(Json(BulkResponse { results }))
}

fn check_cron_secret(state: &AppState, headers: &HeaderMap) -> Result<(), ApiError> {
    match (&state.cron_secret, bearer_token(headers)) {
        (Some(secret), Some(token)) if secret == token => Ok(()),
        _ => Err(ApiError::BadCronSecret),
    }
}

async fn cleanup_history(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, ApiError> {
    check_cron_secret(&state, &headers)?;
    let deleted = state.maintenance.maintenance().cleanup_shift_history().await?;
    Ok(Json(json!({ "deleted": deleted })))
}

async fn clock_out_reminder(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, ApiError> {
    check_cron_secret(&state, &headers)?;
    let reminded = state
        .maintenance
        .maintenance()
        .send_clock_out_reminders()
        .await?;
    Ok(Json(json!({ "reminded": reminded })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::{to_bytes, Body},
        http::Request,
    };
    use chrono::{Duration, Utc};
    use shopshift_client::{AuthUser, MemoryStore, StaticIdentity, StoreOperation};
    use std::sync::Arc;
    use tower::ServiceExt;
    use uuid::Uuid;

    use crate::models::tables;
    use crate::services::timestamp;

    fn app(store: &MemoryStore, signed_in: bool) -> Router {
        let identity = if signed_in {
            StaticIdentity::signed_in(AuthUser::new(Uuid::new_v4()))
        } else {
            StaticIdentity::anonymous()
        };
        let scheduler = Scheduler::from_parts(Arc::new(store.clone()), Arc::new(identity));
        let maintenance =
            Scheduler::from_parts(Arc::new(store.clone()), Arc::new(StaticIdentity::anonymous()));
        router(AppState {
            scheduler,
            maintenance,
            cron_secret: Some("sekrit".to_string()),
        })
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    fn post_json(uri: &str, auth: Option<&str>, body: serde_json::Value) -> Request<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(auth) = auth {
            builder = builder.header(header::AUTHORIZATION, auth);
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    #[tokio::test]
    async fn health_is_open() {
        let response = app(&MemoryStore::new(), false)
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn bulk_requires_a_user() {
        let response = app(&MemoryStore::new(), false)
            .oneshot(post_json("/api/shifts/bulk", None, json!({ "actions": [] })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(body_json(response).await, json!({ "error": "Unauthorized" }));
    }

    #[tokio::test]
    async fn bulk_reports_each_item() {
        let store = MemoryStore::new();
        let shift_id = Uuid::new_v4();
        store.seed(
            tables::SHIFTS,
            vec![json!({
                "id": shift_id,
                "shop_id": Uuid::new_v4(),
                "start_time": "2024-05-01T09:00:00.000Z",
                "end_time": "2024-05-01T17:00:00.000Z",
                "status": "draft",
                "is_open": true,
            })],
        );

        let response = app(&store, true)
            .oneshot(post_json(
                "/api/shifts/bulk",
                Some("Bearer user-token"),
                json!({
                    "actions": [
                        { "action": "delete" },
                        { "action": "publish", "id": shift_id }
                    ]
                }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            body_json(response).await,
            json!({
                "results": [
                    { "action": "delete", "success": false, "error": "Missing id" },
                    { "action": "publish", "success": true }
                ]
            })
        );
        assert_eq!(store.rows(tables::SHIFTS)[0]["status"], "published");
    }

    #[tokio::test]
    async fn cron_needs_the_secret() {
        let store = MemoryStore::new();
        for auth in [None, Some("Bearer wrong"), Some("sekrit")] {
            let response = app(&store, true)
                .oneshot(post_json("/api/cron/cleanup-history", auth, json!({})))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        }
    }

    #[tokio::test]
    async fn cron_cleanup_reports_count() {
        let store = MemoryStore::new();
        store.seed(
            tables::SHIFT_HISTORY,
            vec![json!({
                "id": Uuid::new_v4(),
                "changed_at": timestamp(Utc::now() - Duration::days(200)),
            })],
        );

        let response = app(&store, false)
            .oneshot(post_json(
                "/api/cron/cleanup-history",
                Some("Bearer sekrit"),
                json!({}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await, json!({ "deleted": 1 }));
    }

    #[tokio::test]
    async fn cron_store_failure_is_a_server_error() {
        let store = MemoryStore::new();
        store.fail_next(tables::TIME_RECORDS, StoreOperation::Select, "connection reset");

        let response = app(&store, false)
            .oneshot(post_json(
                "/api/cron/clock-out-reminder",
                Some("Bearer sekrit"),
                json!({}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body_json(response).await, json!({ "error": "connection reset" }));
    }
}
