use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions};
use tracing::info;

use crate::config::Config;

pub mod account;
pub mod bank;
pub mod transaction;

/// Initialize the Postgres connection pool and apply the schema.
pub async fn init_db(config: &Config) -> Result<PgPool, sqlx::Error> {
    let options = PgConnectOptions::new()
        .host(&config.db_host)
        .port(config.db_port)
        .username(&config.db_user)
        .password(&config.db_password)
        .database(&config.db_name);

    let pool = PgPoolOptions::new().connect_with(options).await?;
    create_tables(&pool).await?;

    info!("Database initialized");
    Ok(pool)
}

/// Schema creation is idempotent; safe to run on every startup.
pub(crate) async fn create_tables(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::raw_sql(include_str!("../../migrations/create_tables.sql"))
        .execute(pool)
        .await?;
    Ok(())
}
