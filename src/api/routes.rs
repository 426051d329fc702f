//! API route definitions.

use super::state::AppState;
use super::{ApiError, ApiResult};
use crate::events::{EventDetail, EventFilter, EventStats, EventSummary};
use crate::storage::StorageError;
use axum::extract::{Path, Query, State};
use axum::{routing::get, Json, Router};
use serde_json::{json, Value};

pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/events", get(list_events))
        .route("/events/stats", get(event_stats))
        .route("/events/{id}", get(event_detail))
}

/// Run a store-bound closure off the async executor.
async fn blocking<T, F>(f: F) -> ApiResult<T>
where
    F: FnOnce() -> Result<T, StorageError> + Send + 'static,
    T: Send + 'static,
{
    Ok(tokio::task::spawn_blocking(f).await??)
}

async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn list_events(
    State(state): State<AppState>,
    Query(filter): Query<EventFilter>,
) -> ApiResult<Json<Vec<EventSummary>>> {
    let events = state.events.clone();
    let list = blocking(move || events.search_events(&filter)).await?;
    Ok(Json(list))
}

async fn event_detail(
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
) -> ApiResult<Json<EventDetail>> {
    // Ids are positive integers; anything else cannot name an event.
    let id = match raw_id.parse::<i64>() {
        Ok(id) if id > 0 => id,
        _ => return Err(ApiError::NotFound),
    };

    let events = state.events.clone();
    blocking(move || events.get_event_detail(id))
        .await?
        .map(Json)
        .ok_or(ApiError::NotFound)
}

async fn event_stats(State(state): State<AppState>) -> ApiResult<Json<EventStats>> {
    let events = state.events.clone();
    let stats = blocking(move || events.get_stats()).await?;
    Ok(Json(stats))
}

#[cfg(test)]
mod tests {
    use crate::api::{router, state::AppState};
    use crate::events::{seed, EventService};
    use crate::storage::{open_memory_pool, SqliteEventStore};
    use axum::body::{Body, Bytes};
    use axum::http::{Request, StatusCode};
    use axum::Router;
    use std::sync::Arc;
    use tower::ServiceExt; // for `oneshot`

    fn app(seeded: bool) -> Router {
        let store = Arc::new(SqliteEventStore::new(open_memory_pool().unwrap()));
        if seeded {
            seed::seed_if_empty(store.as_ref()).unwrap();
        }
        router(AppState::new(EventService::new(store)))
    }

    async fn get(app: Router, uri: &str) -> (StatusCode, Bytes) {
        let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), 1_000_000)
            .await
            .unwrap();
        (status, body)
    }

    #[tokio::test]
    async fn test_list_events() {
        let (status, body) = get(app(true), "/api/events").await;
        assert_eq!(status, StatusCode::OK);

        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        let list = json.as_array().unwrap();
        assert_eq!(list.len(), 7);
        assert_eq!(list[0]["timestamp"], "2025-05-22 20:55");
        assert_eq!(list[0]["user"], "Joe Fam");
        assert_eq!(list[0]["anomaly"], 0.72);
        assert_eq!(list[0]["label"], "Anomaly");
        assert_eq!(list[0]["event"], "Event1");
    }

    #[tokio::test]
    async fn test_list_events_filtered() {
        let (status, body) = get(app(true), "/api/events?label=Normal").await;
        assert_eq!(status, StatusCode::OK);
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json.as_array().unwrap().len(), 2);

        let (_, body) = get(app(true), "/api/events?user=Tim&label=Anomaly").await;
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json.as_array().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_list_events_empty_store() {
        let (status, body) = get(app(false), "/api/events").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(&body[..], b"[]");
    }

    #[tokio::test]
    async fn test_event_detail() {
        let (status, body) = get(app(true), "/api/events/3").await;
        assert_eq!(status, StatusCode::OK);

        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["id"], 3);
        assert_eq!(json["date"], "2025-05-19");
        assert_eq!(json["anomalyScore"], 0.42);
        assert_eq!(json["incident"], "User login from an unusual location");
        assert_eq!(json["rowData"]["ip_address"], "172.158.32.33");
        assert_eq!(json["rowData"]["user"], "John Aoe");
        assert_eq!(json["rowData"]["number"], "1012303");
        assert_eq!(json["rowData"]["location"], "bin/bash");
    }

    #[tokio::test]
    async fn test_event_detail_not_found_is_empty_404() {
        for uri in ["/api/events/999", "/api/events/abc", "/api/events/0", "/api/events/-4"] {
            let (status, body) = get(app(true), uri).await;
            assert_eq!(status, StatusCode::NOT_FOUND, "{}", uri);
            assert!(body.is_empty(), "{}", uri);
        }
    }

    #[tokio::test]
    async fn test_stats() {
        let (status, body) = get(app(true), "/api/events/stats").await;
        assert_eq!(status, StatusCode::OK);

        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["totalEvents"], 7);
        assert_eq!(json["anomalies"], 5);
        assert_eq!(json["avgAnomaly"], 0.68);
        assert_eq!(json["highestScore"], 0.91);
    }

    #[tokio::test]
    async fn test_stats_empty_store() {
        let (status, body) = get(app(false), "/api/events/stats").await;
        assert_eq!(status, StatusCode::OK);

        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["totalEvents"], 0);
        assert_eq!(json["anomalies"], 0);
        assert_eq!(json["avgAnomaly"], 0.0);
        assert_eq!(json["highestScore"], 0.0);
    }

    #[tokio::test]
    async fn test_health_and_fallback() {
        let (status, body) = get(app(false), "/api/health").await;
        assert_eq!(status, StatusCode::OK);
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["status"], "ok");
        assert!(json["version"].is_string());

        let (status, _) = get(app(false), "/nope").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
