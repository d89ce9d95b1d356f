use sqlx::{
    postgres::{PgConnectOptions, PgPoolOptions},
    Error, Executor, PgPool,
};
use thiserror::Error;

use crate::utils::quote_identifier;

pub mod models;

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("Connection options do not name a database")]
    MissingDatabaseName,
    #[error("Database error: {0}")]
    Sqlx(#[from] Error),
    #[error("Failed to create database: {0}")]
    CreateDb(String),
    #[error("Failed to run migrations: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),
}

/// Connects to the application database, creating it first if the server
/// does not have it yet, and brings the schema up to date.
pub async fn init_db(
    options: PgConnectOptions,
    max_connections: u32,
) -> Result<PgPool, DatabaseError> {
    let db_name = options
        .get_database()
        .ok_or(DatabaseError::MissingDatabaseName)?
        .to_string();

    let temp_pool = PgPoolOptions::new()
        .max_connections(1)
        .connect_with(options.clone().database("postgres"))
        .await
        .map_err(DatabaseError::Sqlx)?;

    ensure_database_exists(&temp_pool, &db_name).await?;
    temp_pool.close().await;

    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .connect_with(options)
        .await
        .map_err(DatabaseError::Sqlx)?;

    sqlx::migrate!("./migrations").run(&pool).await?;
    log::info!("Connected to database {} and applied migrations", db_name);

    Ok(pool)
}

async fn ensure_database_exists(pool: &PgPool, db_name: &str) -> Result<(), DatabaseError> {
    let db_exists: bool =
        sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM pg_database WHERE datname = $1)")
            .bind(db_name)
            .fetch_one(pool)
            .await
            .map_err(DatabaseError::Sqlx)?;

    if !db_exists {
        log::info!("Database {} not found, creating it", db_name);
        pool.execute(format!("CREATE DATABASE {}", quote_identifier(db_name)).as_str())
            .await
            .map_err(|e| DatabaseError::CreateDb(e.to_string()))?;
    }

    Ok(())
}

/// `true` when the error is Postgres rejecting a duplicate key.
pub fn is_unique_violation(err: &Error) -> bool {
    matches!(err, Error::Database(db) if db.is_unique_violation())
}

pub fn is_foreign_key_violation(err: &Error) -> bool {
    matches!(err, Error::Database(db) if db.is_foreign_key_violation())
}

/// `true` for Postgres `numeric_value_out_of_range` (22003), e.g. an
/// `INTEGER` overflow.
pub fn is_out_of_range(err: &Error) -> bool {
    matches!(err, Error::Database(db) if db.code().as_deref() == Some("22003"))
}
