//! Request handlers for the download endpoints.

use crate::server::AppState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use jgl_metrics::MetricSource;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::debug;

/// Body of the per-source endpoint.
#[derive(Debug, Serialize)]
pub struct DownloadCount {
    pub source: &'static str,
    pub package: String,
    pub downloads: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct FormatQuery {
    /// `text` for a plain-text body
    pub format: Option<String>,
}

pub async fn handle_health() -> impl IntoResponse {
    Json(json!({"status": "ok"}))
}

/// `GET /api/downloads`: every tracked package keyed by its public name.
pub async fn handle_all_downloads(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.aggregator.get_all_counts().await)
}

/// `GET /api/downloads/:source/:package`, limited to tracked packages so
/// arbitrary names never reach an upstream or the store.
pub async fn handle_downloads(
    State(state): State<Arc<AppState>>,
    Path((source, package)): Path<(String, String)>,
    Query(query): Query<FormatQuery>,
) -> Response {
    let Some(source) = MetricSource::from_name(&source) else {
        debug!("Unknown source requested: {}", source);
        return (
            StatusCode::NOT_FOUND,
            Json(json!({"error": format!("Unknown metric source: {}", source)})),
        )
            .into_response();
    };

    if !state.aggregator.is_tracked(source, &package) {
        debug!("Untracked package requested: {}:{}", source, package);
        return (
            StatusCode::NOT_FOUND,
            Json(json!({"error": format!("Package {} is not tracked on {}", package, source)})),
        )
            .into_response();
    }

    let downloads = state.cache.count(source, &package).await;

    if query.format.as_deref() == Some("text") {
        return downloads.into_response();
    }

    Json(DownloadCount {
        source: source.as_str(),
        package,
        downloads,
    })
    .into_response()
}
