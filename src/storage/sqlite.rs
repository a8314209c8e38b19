//! SQLite repository implementation
//!
//! This module provides a SQLite-based implementation of the Repository trait.

use crate::model::{
    CatalogEntry, CatalogStats, ChangeEvent, ChangeKind, Deal, FormatTag, Item, ItemRecord,
    MonitoredItem, NewChangeEvent, Price, PriceObservation, WatchEntry,
};
use crate::monitor::{MonitorScope, MonitorStrategy};
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{Repository, RepositoryError, RepositoryResult};
use chrono::{DateTime, Duration, SecondsFormat, TimeZone, Timelike, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

const ITEM_COLUMNS: &str =
    "i.id, i.external_id, i.title, i.format, i.url, i.image_url, i.first_seen, i.last_updated";

const OBSERVATION_COLUMNS: &str = "id, item_id, price_cents, available, observed_at";

const EVENT_COLUMNS: &str = "id, item_id, kind, old_price_cents, new_price_cents, \
     previous_observation_id, observation_id, created_at, delivered";

/// SQLite repository backend
pub struct SqliteRepository {
    conn: Mutex<Connection>,
}

impl SqliteRepository {
    /// Opens or creates a database file
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteRepository)` - Successfully opened/created database
    /// * `Err(RepositoryError)` - Failed to open database
    pub fn open(path: &Path) -> RepositoryResult<Self> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Creates an in-memory database
    pub fn open_in_memory() -> RepositoryResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> RepositoryResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| RepositoryError::Poisoned)
    }
}

// ===== Row Mapping =====

fn to_db_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_db_timestamp(idx: usize, raw: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn timestamp_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    parse_db_timestamp(idx, &raw)
}

fn price_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<Price>> {
    Ok(row.get::<_, Option<u32>>(idx)?.map(Price::from_cents))
}

fn truncate_to_micros(ts: DateTime<Utc>) -> DateTime<Utc> {
    ts.with_nanosecond(ts.nanosecond() / 1_000 * 1_000)
        .unwrap_or(ts)
}

/// Maps the leading `ITEM_COLUMNS` of a row
fn item_from_row(row: &Row<'_>) -> rusqlite::Result<Item> {
    Ok(Item {
        id: row.get(0)?,
        external_id: row.get(1)?,
        title: row.get(2)?,
        format: FormatTag::from_db_string(&row.get::<_, String>(3)?).unwrap_or(FormatTag::Dvd),
        url: row.get(4)?,
        image_url: row.get(5)?,
        first_seen: timestamp_at(row, 6)?,
        last_updated: timestamp_at(row, 7)?,
    })
}

fn observation_from_row(row: &Row<'_>) -> rusqlite::Result<PriceObservation> {
    Ok(PriceObservation {
        id: row.get(0)?,
        item_id: row.get(1)?,
        price: price_at(row, 2)?,
        available: row.get(3)?,
        observed_at: timestamp_at(row, 4)?,
    })
}

fn event_from_row(row: &Row<'_>) -> rusqlite::Result<ChangeEvent> {
    let kind_raw: String = row.get(2)?;
    let kind = ChangeKind::from_db_string(&kind_raw).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            2,
            Type::Text,
            format!("unknown change kind: {}", kind_raw).into(),
        )
    })?;

    Ok(ChangeEvent {
        id: row.get(0)?,
        item_id: row.get(1)?,
        kind,
        old_price: price_at(row, 3)?,
        new_price: price_at(row, 4)?,
        previous_observation_id: row.get(5)?,
        observation_id: row.get(6)?,
        created_at: timestamp_at(row, 7)?,
        delivered: row.get(8)?,
    })
}

/// Maps `ITEM_COLUMNS` followed by current, lowest, highest and target prices
fn catalog_entry_from_row(row: &Row<'_>) -> rusqlite::Result<CatalogEntry> {
    Ok(CatalogEntry {
        item: item_from_row(row)?,
        current_price: price_at(row, 8)?,
        lowest_price: price_at(row, 9)?,
        highest_price: price_at(row, 10)?,
        target_price: price_at(row, 11)?,
    })
}

fn query_item(conn: &Connection, external_id: &str) -> rusqlite::Result<Option<Item>> {
    conn.query_row(
        &format!(
            "SELECT {} FROM items i WHERE i.external_id = ?1",
            ITEM_COLUMNS
        ),
        params![external_id],
        item_from_row,
    )
    .optional()
}

/// Returns `ts`, moved just past the item's latest observation if it is not already later
fn after_last_observation(
    conn: &Connection,
    item_id: i64,
    ts: DateTime<Utc>,
) -> RepositoryResult<DateTime<Utc>> {
    let last: Option<String> = conn
        .query_row(
            "SELECT observed_at FROM price_observations
             WHERE item_id = ?1 ORDER BY observed_at DESC LIMIT 1",
            params![item_id],
            |row| row.get(0),
        )
        .optional()?;

    let ts = truncate_to_micros(ts);
    let Some(last) = last else {
        return Ok(ts);
    };
    let last = DateTime::parse_from_rfc3339(&last)
        .map_err(|e| RepositoryError::Timestamp(e.to_string()))?
        .with_timezone(&Utc);
    if ts <= last {
        Ok(last + Duration::microseconds(1))
    } else {
        Ok(ts)
    }
}

fn query_watch(conn: &Connection, item_id: i64) -> rusqlite::Result<Option<WatchEntry>> {
    conn.query_row(
        "SELECT item_id, target_price_cents, created_at FROM watch_entries WHERE item_id = ?1",
        params![item_id],
        |row| {
            Ok(WatchEntry {
                item_id: row.get(0)?,
                target_price: price_at(row, 1)?,
                created_at: timestamp_at(row, 2)?,
            })
        },
    )
    .optional()
}

impl Repository for SqliteRepository {
    // ===== Items =====

    fn find_item_by_external_id(&self, external_id: &str) -> RepositoryResult<Option<Item>> {
        let conn = self.conn()?;
        Ok(query_item(&conn, external_id)?)
    }

    fn get_item(&self, item_id: i64) -> RepositoryResult<Item> {
        let conn = self.conn()?;
        conn.query_row(
            &format!("SELECT {} FROM items i WHERE i.id = ?1", ITEM_COLUMNS),
            params![item_id],
            item_from_row,
        )
        .optional()?
        .ok_or_else(|| RepositoryError::ItemNotFound(format!("id {}", item_id)))
    }

    fn upsert_item(&self, record: &ItemRecord) -> RepositoryResult<Item> {
        let conn = self.conn()?;
        let now = to_db_timestamp(Utc::now());

        conn.execute(
            "INSERT INTO items (external_id, title, format, url, image_url, first_seen, last_updated)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)
             ON CONFLICT(external_id) DO UPDATE SET
                title = excluded.title,
                format = excluded.format,
                url = excluded.url,
                image_url = COALESCE(excluded.image_url, items.image_url),
                last_updated = excluded.last_updated",
            params![
                record.external_id,
                record.title,
                record.format.as_str(),
                record.url,
                record.image_url,
                now
            ],
        )?;

        query_item(&conn, &record.external_id)?
            .ok_or_else(|| RepositoryError::ItemNotFound(record.external_id.clone()))
    }

    // ===== Price Observations =====

    fn append_price_observation(
        &self,
        item_id: i64,
        price: Option<Price>,
        available: bool,
        observed_at: DateTime<Utc>,
    ) -> RepositoryResult<PriceObservation> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        let observed_at = after_last_observation(&tx, item_id, observed_at)?;

        tx.execute(
            "INSERT INTO price_observations (item_id, price_cents, available, observed_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                item_id,
                price.map(|p| p.cents()),
                available,
                to_db_timestamp(observed_at)
            ],
        )?;
        let id = tx.last_insert_rowid();
        tx.commit()?;

        Ok(PriceObservation {
            id,
            item_id,
            price,
            available,
            observed_at,
        })
    }

    fn latest_observation(&self, item_id: i64) -> RepositoryResult<Option<PriceObservation>> {
        let conn = self.conn()?;
        let observation = conn
            .query_row(
                &format!(
                    "SELECT {} FROM price_observations
                     WHERE item_id = ?1 ORDER BY observed_at DESC LIMIT 1",
                    OBSERVATION_COLUMNS
                ),
                params![item_id],
                observation_from_row,
            )
            .optional()?;
        Ok(observation)
    }

    fn price_history(&self, item_id: i64) -> RepositoryResult<Vec<PriceObservation>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM price_observations WHERE item_id = ?1 ORDER BY observed_at ASC",
            OBSERVATION_COLUMNS
        ))?;

        let history = stmt
            .query_map(params![item_id], observation_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(history)
    }

    // ===== Monitoring =====

    fn list_monitored_items(
        &self,
        strategy: &MonitorStrategy,
    ) -> RepositoryResult<Vec<MonitoredItem>> {
        let join = match strategy.scope {
            MonitorScope::Watchlist => "JOIN",
            MonitorScope::Catalog => "LEFT JOIN",
        };
        let filter = if strategy.include_excluded {
            ""
        } else {
            "WHERE i.id NOT IN (SELECT item_id FROM exclusions)"
        };

        let query = format!(
            "SELECT {}, w.target_price_cents, w.created_at
             FROM items i {} watch_entries w ON w.item_id = i.id
             {}
             ORDER BY i.id",
            ITEM_COLUMNS, join, filter
        );

        let conn = self.conn()?;
        let mut stmt = conn.prepare(&query)?;
        let items = stmt
            .query_map([], |row| {
                let item = item_from_row(row)?;
                let watched_at: Option<String> = row.get(9)?;
                let watch = match watched_at {
                    Some(raw) => Some(WatchEntry {
                        item_id: item.id,
                        target_price: price_at(row, 8)?,
                        created_at: parse_db_timestamp(9, &raw)?,
                    }),
                    None => None,
                };
                Ok(MonitoredItem { item, watch })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(items)
    }

    fn watch_entry(&self, item_id: i64) -> RepositoryResult<Option<WatchEntry>> {
        let conn = self.conn()?;
        Ok(query_watch(&conn, item_id)?)
    }

    fn set_watch(&self, item_id: i64, target_price: Option<Price>) -> RepositoryResult<WatchEntry> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        if let Some(existing) = query_watch(&tx, item_id)? {
            if existing.target_price == target_price {
                return Ok(existing);
            }
        }

        // A new target only judges observations recorded after it was set
        let armed_at = after_last_observation(&tx, item_id, Utc::now())?;
        tx.execute(
            "INSERT INTO watch_entries (item_id, target_price_cents, created_at)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(item_id) DO UPDATE SET
                 target_price_cents = excluded.target_price_cents,
                 created_at = excluded.created_at",
            params![
                item_id,
                target_price.map(|p| p.cents()),
                to_db_timestamp(armed_at)
            ],
        )?;

        let entry = query_watch(&tx, item_id)?
            .ok_or_else(|| RepositoryError::ItemNotFound(format!("id {}", item_id)))?;
        tx.commit()?;
        Ok(entry)
    }

    fn remove_watch(&self, item_id: i64) -> RepositoryResult<bool> {
        let conn = self.conn()?;
        let removed = conn.execute(
            "DELETE FROM watch_entries WHERE item_id = ?1",
            params![item_id],
        )?;
        Ok(removed > 0)
    }

    // ===== Exclusions =====

    fn is_excluded(&self, item_id: i64) -> RepositoryResult<bool> {
        let conn = self.conn()?;
        let excluded: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM exclusions WHERE item_id = ?1)",
            params![item_id],
            |row| row.get(0),
        )?;
        Ok(excluded)
    }

    fn exclude(&self, item_id: i64) -> RepositoryResult<bool> {
        let conn = self.conn()?;
        let inserted = conn.execute(
            "INSERT OR IGNORE INTO exclusions (item_id, created_at) VALUES (?1, ?2)",
            params![item_id, to_db_timestamp(Utc::now())],
        )?;
        Ok(inserted > 0)
    }

    fn include(&self, item_id: i64) -> RepositoryResult<bool> {
        let conn = self.conn()?;
        let removed = conn.execute("DELETE FROM exclusions WHERE item_id = ?1", params![item_id])?;
        Ok(removed > 0)
    }

    // ===== Change Events =====

    fn record_change_event(
        &self,
        event: &NewChangeEvent,
    ) -> RepositoryResult<Option<ChangeEvent>> {
        let conn = self.conn()?;
        let inserted = conn.execute(
            "INSERT OR IGNORE INTO change_events
             (item_id, kind, old_price_cents, new_price_cents, previous_observation_id,
              observation_id, created_at, delivered)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 0)",
            params![
                event.item_id,
                event.kind.to_db_string(),
                event.old_price.map(|p| p.cents()),
                event.new_price.map(|p| p.cents()),
                event.previous_observation_id,
                event.observation_id,
                to_db_timestamp(Utc::now())
            ],
        )?;

        if inserted == 0 {
            return Ok(None);
        }

        let id = conn.last_insert_rowid();
        let stored = conn.query_row(
            &format!("SELECT {} FROM change_events WHERE id = ?1", EVENT_COLUMNS),
            params![id],
            event_from_row,
        )?;
        Ok(Some(stored))
    }

    fn mark_event_delivered(&self, event_id: i64) -> RepositoryResult<()> {
        let conn = self.conn()?;
        let updated = conn.execute(
            "UPDATE change_events SET delivered = 1 WHERE id = ?1",
            params![event_id],
        )?;
        if updated == 0 {
            return Err(RepositoryError::EventNotFound(event_id));
        }
        Ok(())
    }

    fn pending_events(&self) -> RepositoryResult<Vec<ChangeEvent>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM change_events WHERE delivered = 0 ORDER BY id ASC",
            EVENT_COLUMNS
        ))?;

        let events = stmt
            .query_map([], event_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(events)
    }

    // ===== Derived Views =====

    fn cheapest(
        &self,
        format: Option<FormatTag>,
        limit: usize,
    ) -> RepositoryResult<Vec<CatalogEntry>> {
        let query = format!(
            "SELECT {},
                cur.price_cents,
                (SELECT MIN(price_cents) FROM price_observations WHERE item_id = i.id),
                (SELECT MAX(price_cents) FROM price_observations WHERE item_id = i.id),
                NULL
             FROM items i
             JOIN price_observations cur ON cur.id = (
                SELECT id FROM price_observations
                WHERE item_id = i.id ORDER BY observed_at DESC LIMIT 1
             )
             WHERE cur.price_cents IS NOT NULL
               AND i.id NOT IN (SELECT item_id FROM exclusions)
               AND i.id NOT IN (SELECT item_id FROM watch_entries)
               AND (?1 IS NULL OR i.format = ?1)
             ORDER BY cur.price_cents ASC, i.id ASC
             LIMIT ?2",
            ITEM_COLUMNS
        );

        let conn = self.conn()?;
        let mut stmt = conn.prepare(&query)?;
        let entries = stmt
            .query_map(
                params![format.map(|f| f.as_str()), limit as i64],
                catalog_entry_from_row,
            )?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(entries)
    }

    fn deals(&self, limit: usize) -> RepositoryResult<Vec<Deal>> {
        let query = format!(
            "SELECT {}, prev.price_cents, cur.price_cents
             FROM items i
             JOIN price_observations cur ON cur.id = (
                SELECT id FROM price_observations
                WHERE item_id = i.id ORDER BY observed_at DESC LIMIT 1
             )
             JOIN price_observations prev ON prev.id = (
                SELECT id FROM price_observations
                WHERE item_id = i.id ORDER BY observed_at DESC LIMIT 1 OFFSET 1
             )
             WHERE cur.price_cents IS NOT NULL
               AND prev.price_cents IS NOT NULL
               AND cur.price_cents < prev.price_cents
             ORDER BY (prev.price_cents - cur.price_cents) DESC, i.id ASC
             LIMIT ?1",
            ITEM_COLUMNS
        );

        let conn = self.conn()?;
        let mut stmt = conn.prepare(&query)?;
        let deals = stmt
            .query_map(params![limit as i64], |row| {
                Ok(Deal {
                    item: item_from_row(row)?,
                    previous_price: Price::from_cents(row.get(8)?),
                    current_price: Price::from_cents(row.get(9)?),
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(deals)
    }

    fn watchlist(&self) -> RepositoryResult<Vec<CatalogEntry>> {
        let query = format!(
            "SELECT {},
                (SELECT price_cents FROM price_observations
                 WHERE item_id = i.id ORDER BY observed_at DESC LIMIT 1),
                (SELECT MIN(price_cents) FROM price_observations WHERE item_id = i.id),
                (SELECT MAX(price_cents) FROM price_observations WHERE item_id = i.id),
                w.target_price_cents
             FROM items i
             JOIN watch_entries w ON w.item_id = i.id
             ORDER BY i.title ASC",
            ITEM_COLUMNS
        );

        let conn = self.conn()?;
        let mut stmt = conn.prepare(&query)?;
        let entries = stmt
            .query_map([], catalog_entry_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(entries)
    }

    fn stats(&self) -> RepositoryResult<CatalogStats> {
        let conn = self.conn()?;
        let count = |sql: &str| -> rusqlite::Result<u64> {
            let n: i64 = conn.query_row(sql, [], |row| row.get(0))?;
            Ok(n as u64)
        };

        let today = Utc::now()
            .date_naive()
            .and_hms_opt(0, 0, 0)
            .map(|midnight| to_db_timestamp(Utc.from_utc_datetime(&midnight)))
            .unwrap_or_default();

        let events_today: i64 = conn.query_row(
            "SELECT COUNT(*) FROM change_events WHERE created_at >= ?1",
            params![today],
            |row| row.get(0),
        )?;

        let last_update: Option<String> =
            conn.query_row("SELECT MAX(last_updated) FROM items", [], |row| row.get(0))?;
        let last_update = match last_update {
            Some(raw) => Some(parse_db_timestamp(0, &raw)?),
            None => None,
        };

        Ok(CatalogStats {
            items: count("SELECT COUNT(*) FROM items")?,
            observations: count("SELECT COUNT(*) FROM price_observations")?,
            watch_entries: count("SELECT COUNT(*) FROM watch_entries")?,
            exclusions: count("SELECT COUNT(*) FROM exclusions")?,
            events_today: events_today as u64,
            pending_events: count("SELECT COUNT(*) FROM change_events WHERE delivered = 0")?,
            last_update,
        })
    }
}
