// Package http implements the illustrative network surface: a minimal JSON
// API in front of the cache manager. Not part of the core contract (see
// the manager module for Get/Set/Stats/Stop/LoadAOF) — this is one
// possible external collaborator among others.

use std::sync::Arc;
use std::time::Duration;

use axum::error_handling::HandleErrorLayer;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{BoxError, Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tower::ServiceBuilder;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::manager::CacheManager;

type SharedManager = Arc<CacheManager<String, Value>>;

/// Matches the reference system's HTTP handler: an explicit ttl of zero
/// falls back to a ten-minute default rather than expiring immediately.
const DEFAULT_TTL: Duration = Duration::from_secs(600);

const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

pub fn router(manager: SharedManager) -> Router {
    Router::new()
        .route("/set", post(set))
        .route("/get", get(get_value))
        .route("/stats", get(stats))
        .with_state(manager)
        .layer(
            ServiceBuilder::new()
                .layer(HandleErrorLayer::new(handle_timeout))
                .layer(TraceLayer::new_for_http())
                .layer(TimeoutLayer::new(REQUEST_TIMEOUT)),
        )
}

async fn handle_timeout(err: BoxError) -> (StatusCode, String) {
    if err.is::<tower::timeout::error::Elapsed>() {
        (StatusCode::REQUEST_TIMEOUT, "request timed out".to_string())
    } else {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("unhandled error: {err}"),
        )
    }
}

#[derive(Debug, Deserialize)]
struct SetRequest {
    key: String,
    value: Value,
    #[serde(default)]
    ttl: u64,
}

#[derive(Debug, Serialize)]
struct SetResponse {
    ok: bool,
}

async fn set(
    State(manager): State<SharedManager>,
    Json(req): Json<SetRequest>,
) -> Json<SetResponse> {
    let ttl = if req.ttl == 0 {
        DEFAULT_TTL
    } else {
        Duration::from_secs(req.ttl)
    };
    manager.set(req.key, req.value, ttl);
    Json(SetResponse { ok: true })
}

#[derive(Debug, Deserialize)]
struct GetQuery {
    key: String,
}

#[derive(Debug, Serialize)]
struct GetResponse {
    found: bool,
    value: Option<Value>,
}

async fn get_value(
    State(manager): State<SharedManager>,
    Query(q): Query<GetQuery>,
) -> Json<GetResponse> {
    match manager.get(&q.key) {
        Some(value) => Json(GetResponse {
            found: true,
            value: Some(value),
        }),
        None => Json(GetResponse {
            found: false,
            value: None,
        }),
    }
}

#[derive(Debug, Serialize)]
struct StatsResponse {
    hits: u64,
    misses: u64,
    evictions: u64,
    len: usize,
}

async fn stats(State(manager): State<SharedManager>) -> Json<StatsResponse> {
    let s = manager.stats();
    Json(StatsResponse {
        hits: s.hits,
        misses: s.misses,
        evictions: s.evictions,
        len: s.len,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manager::ManagerConfig;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    fn test_manager() -> SharedManager {
        CacheManager::new(ManagerConfig {
            shard_count: 4,
            replicas: 3,
            shard_capacity: 100,
            aof_path: None,
        })
        .unwrap()
    }

    #[tokio::test]
    async fn set_then_get_round_trips_over_http() {
        let _time = crate::time::start(Duration::from_millis(1));
        let app = router(test_manager());

        let set_req = Request::builder()
            .method("POST")
            .uri("/set")
            .header("content-type", "application/json")
            .body(Body::from(r#"{"key":"a","value":"hello","ttl":60}"#))
            .unwrap();
        let resp = app.clone().oneshot(set_req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let get_req = Request::builder()
            .uri("/get?key=a")
            .body(Body::empty())
            .unwrap();
        let resp = app.oneshot(get_req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        let parsed: GetResponse = serde_json::from_slice(&body).unwrap();
        assert!(parsed.found);
        assert_eq!(parsed.value, Some(Value::String("hello".into())));
    }

    #[tokio::test]
    async fn missing_key_reports_not_found() {
        let _time = crate::time::start(Duration::from_millis(1));
        let app = router(test_manager());
        let req = Request::builder()
            .uri("/get?key=missing")
            .body(Body::empty())
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        let body = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        let parsed: GetResponse = serde_json::from_slice(&body).unwrap();
        assert!(!parsed.found);
    }

    #[tokio::test]
    async fn stats_reports_hits_and_misses() {
        let _time = crate::time::start(Duration::from_millis(1));
        let app = router(test_manager());

        let req = Request::builder()
            .uri("/get?key=missing")
            .body(Body::empty())
            .unwrap();
        app.clone().oneshot(req).await.unwrap();

        let req = Request::builder()
            .uri("/stats")
            .body(Body::empty())
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        let body = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        let parsed: StatsResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(parsed.misses, 1);
    }
}
