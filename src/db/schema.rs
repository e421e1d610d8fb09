//! SQL DDL for the auth session store.

/// SQLite schema with:
/// - `storage_key` PRIMARY KEY, `firebase:authUser:{api_key}:{app_name}`
/// - `user_json` the serialized signed-in user, tokens included
/// - `updated_at` RFC3339
pub const SQLITE_INIT: &str = r#"
CREATE TABLE IF NOT EXISTS auth_sessions (
    storage_key TEXT PRIMARY KEY NOT NULL,
    user_json TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
"#;
