pub mod cache_entry;
pub mod connection;
pub mod trust;

pub const INIT_SCHEMA: &str = r#"
-- Cached lookup results, one row per (namespace, account). Expired rows are
-- ignored on read and overwritten in place; there is no background sweep.
CREATE TABLE IF NOT EXISTS cache_entries (
    namespace TEXT NOT NULL,
    account TEXT NOT NULL,
    value TEXT NOT NULL,
    stored_at INTEGER NOT NULL,
    PRIMARY KEY (namespace, account)
);

-- Manually trusted accounts. No expiry.
CREATE TABLE IF NOT EXISTS trust_list (
    account TEXT PRIMARY KEY,
    added_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_cache_entries_namespace ON cache_entries(namespace);
"#;
