use sqlx::{postgres::PgPoolOptions, PgPool};
use std::time::Duration;

use crate::config::env_parse;

pub async fn make_pool(database_url: &str) -> anyhow::Result<PgPool> {
    let max_connections = env_parse::<u32>("DFLOW_DB_MAX_CONNECTIONS")
        .unwrap_or(4)
        .clamp(1, 32);

    let acquire_timeout_secs = env_parse::<u64>("DFLOW_DB_ACQUIRE_TIMEOUT_SECS")
        .unwrap_or(10)
        .clamp(1, 60);

    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(Duration::from_secs(acquire_timeout_secs))
        .connect(database_url)
        .await?;

    tracing::debug!(max_connections, acquire_timeout_secs, "database pool ready");
    Ok(pool)
}

pub async fn run_migrations(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}
