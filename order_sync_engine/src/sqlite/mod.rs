//! SQLite storage for local orders, tickets and the pending-webhook queue.
mod sqlite_impl;

pub mod db;
pub use sqlite_impl::SqliteDatabase;
