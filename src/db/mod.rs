//! Database module: persistent storage for signed-in sessions.
//!
//! Layout:
//! - `models.rs`: row struct and conversions to/from `User`
//! - `schema.rs`: SQL DDL for initializing the database (SQLite)
//! - `sqlite.rs`: lazily connected session store

pub mod models;
pub mod schema;
pub mod sqlite;

pub use models::DbSession;
pub use schema::SQLITE_INIT;
pub use sqlite::{SessionStorage, SqlitePool};
