//! # SQLite Database methods
//!
//! This module contains "low-level" SQLite database interactions.
//!
//! All these interaction are maintained by simple functions (rather than stateful structs) that accept a
//! `&mut SqliteConnection` argument. Callers can obtain a connection from a pool, or create an atomic transaction as
//! the need arises and call through to the functions without any other changes.
use std::{env, str::FromStr};

use log::info;
use rust_decimal::Decimal;
use sqlx::{sqlite::SqlitePoolOptions, Error as SqlxError, SqlitePool};

use crate::traits::OrderStoreError;

pub mod orders;
pub mod tickets;
pub mod webhooks;

const SQLITE_DB_URL: &str = "sqlite://data/order_sync.db";

pub fn db_url() -> String {
    let result = env::var("OSYNC_DATABASE_URL").unwrap_or_else(|_| {
        info!("🗃️ OSYNC_DATABASE_URL is not set. Using the default.");
        SQLITE_DB_URL.to_string()
    });
    info!("🗃️ Using database URL: {result}");
    result
}

pub async fn new_pool(url: &str, max_connections: u32) -> Result<SqlitePool, SqlxError> {
    let pool = SqlitePoolOptions::new().max_connections(max_connections).connect(url).await?;
    Ok(pool)
}

/// Decimals are stored as TEXT so that no precision is lost.
pub(crate) fn parse_decimal(field: &str, value: &str) -> Result<Decimal, OrderStoreError> {
    Decimal::from_str(value).map_err(|e| OrderStoreError::DataIntegrity(format!("Invalid {field} '{value}'. {e}")))
}

pub(crate) fn is_unique_violation(e: &SqlxError) -> bool {
    matches!(e, SqlxError::Database(db) if db.is_unique_violation())
}
