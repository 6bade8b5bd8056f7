//! Health check endpoint

use axum::{extract::State, Json};
use serde_json::{json, Value};

use crate::server::AppState;

/// GET /health
///
/// Always 200; reports whether storage is configured and reachable.
pub async fn health(State(state): State<AppState>) -> Json<Value> {
    let Some(services) = &state.services else {
        return Json(json!({
            "status": "ok",
            "version": env!("CARGO_PKG_VERSION"),
            "database": "not configured",
        }));
    };

    match services.db.stats() {
        Ok(stats) => Json(json!({
            "status": "ok",
            "version": env!("CARGO_PKG_VERSION"),
            "database": "connected",
            "stats": stats,
        })),
        Err(e) => Json(json!({
            "status": "degraded",
            "version": env!("CARGO_PKG_VERSION"),
            "database": "error",
            "error": e.to_string(),
        })),
    }
}
