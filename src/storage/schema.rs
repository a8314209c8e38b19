//! Database schema definitions
//!
//! Prices are stored as integer cents and timestamps as RFC 3339 text with
//! microsecond precision, which sorts chronologically as plain text.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- Catalog items, one row per vendor id
CREATE TABLE IF NOT EXISTS items (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    external_id TEXT NOT NULL UNIQUE,
    title TEXT NOT NULL,
    format TEXT NOT NULL,
    url TEXT NOT NULL,
    image_url TEXT,
    first_seen TEXT NOT NULL,
    last_updated TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_items_format ON items(format);

-- Append-only price series
CREATE TABLE IF NOT EXISTS price_observations (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    item_id INTEGER NOT NULL REFERENCES items(id),
    price_cents INTEGER CHECK (price_cents IS NULL OR price_cents >= 0),
    available INTEGER NOT NULL,
    observed_at TEXT NOT NULL,
    UNIQUE(item_id, observed_at)
);

CREATE INDEX IF NOT EXISTS idx_observations_item_time
    ON price_observations(item_id, observed_at);

-- User watch list
CREATE TABLE IF NOT EXISTS watch_entries (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    item_id INTEGER NOT NULL UNIQUE REFERENCES items(id),
    target_price_cents INTEGER CHECK (target_price_cents IS NULL OR target_price_cents >= 0),
    created_at TEXT NOT NULL
);

-- Items hidden from the cheapest views
CREATE TABLE IF NOT EXISTS exclusions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    item_id INTEGER NOT NULL UNIQUE REFERENCES items(id),
    created_at TEXT NOT NULL
);

-- Detected transitions, at most one per observation and kind
CREATE TABLE IF NOT EXISTS change_events (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    item_id INTEGER NOT NULL REFERENCES items(id),
    kind TEXT NOT NULL,
    old_price_cents INTEGER,
    new_price_cents INTEGER,
    previous_observation_id INTEGER REFERENCES price_observations(id),
    observation_id INTEGER NOT NULL REFERENCES price_observations(id),
    created_at TEXT NOT NULL,
    delivered INTEGER NOT NULL DEFAULT 0,
    UNIQUE(observation_id, kind)
);

CREATE INDEX IF NOT EXISTS idx_events_delivered ON change_events(delivered);
"#;

/// Version stamped into `PRAGMA user_version`
pub const SCHEMA_VERSION: u32 = 1;

/// Creates any missing tables and indexes and stamps the schema version
///
/// Safe to call on every open.
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    conn.pragma_update(None, "user_version", SCHEMA_VERSION)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    fn fresh() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        initialize_schema(&conn).unwrap();
        conn
    }

    #[test]
    fn test_reopening_keeps_schema() {
        let conn = fresh();
        initialize_schema(&conn).unwrap();

        let mut stmt = conn
            .prepare("SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name")
            .unwrap();
        let tables: Vec<String> = stmt
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(
            tables,
            vec![
                "change_events",
                "exclusions",
                "items",
                "price_observations",
                "watch_entries"
            ]
        );

        let version: u32 = conn
            .query_row("PRAGMA user_version", [], |row| row.get(0))
            .unwrap();
        assert_eq!(version, SCHEMA_VERSION);
    }

    #[test]
    fn test_negative_price_rejected() {
        let conn = fresh();
        conn.execute(
            "INSERT INTO items (external_id, title, format, url, first_seen, last_updated)
             VALUES ('abc', 'Heat', 'DVD', 'https://cdon.fi/tuote/heat-abc/', 't', 't')",
            [],
        )
        .unwrap();

        let negative = conn.execute(
            "INSERT INTO price_observations (item_id, price_cents, available, observed_at)
             VALUES (1, -100, 1, 't')",
            [],
        );
        assert!(negative.is_err());
    }
}
