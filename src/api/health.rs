use axum::{extract::State, Json};
use serde::Serialize;

use super::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub store: String,
    pub redis: String,
}

pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let store_status = if state.service.store_ready().await {
        "connected".to_string()
    } else {
        "disconnected".to_string()
    };

    // Redis only backs the replay cache, so it is optional.
    let redis_status = match state.redis.clone() {
        Some(mut conn) => {
            let pong: std::result::Result<String, redis::RedisError> =
                redis::cmd("PING").query_async(&mut conn).await;
            if pong.is_ok() {
                "connected".to_string()
            } else {
                "disconnected".to_string()
            }
        }
        None => "disabled".to_string(),
    };

    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        store: store_status,
        redis: redis_status,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::test_support::state;

    #[tokio::test]
    async fn reports_memory_store_and_disabled_redis() {
        let Json(health) = health_check(State(state())).await;
        assert_eq!(health.status, "ok");
        assert_eq!(health.store, "connected");
        assert_eq!(health.redis, "disabled");
    }
}
