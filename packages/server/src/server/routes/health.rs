use axum::{extract::Extension, http::StatusCode, Json};
use serde::Serialize;
use sqlx::PgPool;
use std::time::Duration;

use crate::server::app::AppState;

const DB_PROBE_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Serialize)]
pub struct HealthReport {
    pub healthy: bool,
    pub database: DatabaseProbe,
    pub pool: PoolStats,
}

#[derive(Debug, Serialize)]
pub struct DatabaseProbe {
    pub reachable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct PoolStats {
    pub open: u32,
    pub idle: usize,
    pub max: u32,
}

/// Uptime probe. Answers as long as the process is serving requests.
pub async fn root_handler() -> &'static str {
    "Membership bot is up and watching."
}

async fn probe_database(pool: &PgPool) -> DatabaseProbe {
    let error = match tokio::time::timeout(DB_PROBE_TIMEOUT, sqlx::query("SELECT 1").execute(pool)).await {
        Ok(Ok(_)) => None,
        Ok(Err(e)) => Some(format!("query failed: {}", e)),
        Err(_) => Some(format!("no answer within {}s", DB_PROBE_TIMEOUT.as_secs())),
    };

    DatabaseProbe {
        reachable: error.is_none(),
        error,
    }
}

/// The subscriber store is the only hard dependency: 503 when it cannot be reached.
pub async fn health_handler(
    Extension(state): Extension<AppState>,
) -> (StatusCode, Json<HealthReport>) {
    let database = probe_database(&state.db_pool).await;
    let pool = PoolStats {
        open: state.db_pool.size(),
        idle: state.db_pool.num_idle(),
        max: state.db_pool.options().get_max_connections(),
    };

    let status = if database.reachable {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(HealthReport {
            healthy: database.reachable,
            database,
            pool,
        }),
    )
}
