use std::sync::Arc;

use axum::{routing::get, Json, Router};
use serde_json::{json, Value};

use crate::AppState;

pub mod sheets;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/health", get(health_check))
        .route("/api/", get(api_root))
}

async fn health_check() -> &'static str {
    "OK"
}

async fn api_root() -> Json<Value> {
    Json(json!({ "message": "Statly API is running" }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn health_reports_ok() {
        assert_eq!(tokio_test::block_on(health_check()), "OK");
    }

    #[test]
    fn api_root_reports_ready() {
        let Json(body) = tokio_test::block_on(api_root());
        assert_eq!(body["message"], "Statly API is running");
    }
}
