//! Embedded SQLite persistence for resolved city coordinates and weather
//! observations.
//!
//! One [`WeatherDatabase`] holds one connection for the whole run. Writes are
//! buffered in an open transaction until [`WeatherDatabase::flush`] commits
//! them. Neither the handle nor its component views may be shared between
//! concurrent callers; there is exactly one writer.

use std::path::Path;

use rusqlite::{Connection, ErrorCode, ffi};
use tracing::{debug, info};

use crate::error::StoreError;

pub mod cities;
pub mod observations;

pub use cities::CityStore;
pub use observations::{ObservationStore, TimeBound};

/// Result of an insert that tolerates an existing primary key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    /// The key already existed; nothing was written.
    Duplicate,
}

impl InsertOutcome {
    pub fn is_inserted(self) -> bool {
        self == InsertOutcome::Inserted
    }
}

/// The store file plus its lifecycle.
///
/// Lifecycle: `open` -> `ensure_schema` -> reads/writes -> `close`.
/// `close` consumes the handle; reopening means calling `open` again.
#[derive(Debug)]
pub struct WeatherDatabase {
    conn: Connection,
}

impl WeatherDatabase {
    /// Open (or create) the store file at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        let conn = Connection::open(path)?;
        info!("Opened weather database at {}", path.display());

        Ok(Self { conn })
    }

    /// Private, non-durable store. Mostly useful in tests.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Ok(Self {
            conn: Connection::open_in_memory()?,
        })
    }

    /// Create both relations if absent. Safe to call on every start.
    pub fn ensure_schema(&self) -> Result<(), StoreError> {
        self.cities().ensure_schema()?;
        self.observations().ensure_schema()?;
        Ok(())
    }

    pub fn cities(&self) -> CityStore<'_> {
        CityStore::new(&self.conn)
    }

    pub fn observations(&self) -> ObservationStore<'_> {
        ObservationStore::new(&self.conn)
    }

    /// True when writes have been made since the last flush.
    pub fn has_pending_writes(&self) -> bool {
        !self.conn.is_autocommit()
    }

    /// Commit every buffered write as one durability checkpoint.
    pub fn flush(&self) -> Result<(), StoreError> {
        commit_pending(&self.conn)?;
        Ok(())
    }

    /// Flush, then release the connection.
    ///
    /// Taking `self` by value makes any use after close a compile error
    /// rather than a runtime state to guard against.
    pub fn close(self) -> Result<(), StoreError> {
        self.flush()?;
        self.conn.close().map_err(|(_, e)| e)?;
        info!("Closed weather database");
        Ok(())
    }
}

/// Open the write transaction that buffers inserts, unless one is already open.
pub(crate) fn begin_pending(conn: &Connection) -> rusqlite::Result<()> {
    if conn.is_autocommit() {
        conn.execute_batch("BEGIN")?;
    }
    Ok(())
}

pub(crate) fn commit_pending(conn: &Connection) -> rusqlite::Result<()> {
    if !conn.is_autocommit() {
        conn.execute_batch("COMMIT")?;
        debug!("Flushed pending writes");
    }
    Ok(())
}

/// Primary-key collisions; the only uniqueness constraints in the schema.
pub(crate) fn is_duplicate_key(err: &rusqlite::Error) -> bool {
    match err {
        rusqlite::Error::SqliteFailure(e, _) => {
            e.code == ErrorCode::ConstraintViolation
                && (e.extended_code == ffi::SQLITE_CONSTRAINT_PRIMARYKEY
                    || e.extended_code == ffi::SQLITE_CONSTRAINT_UNIQUE)
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Coordinates, Observation};

    fn schema_sql(db: &WeatherDatabase) -> Vec<String> {
        let mut stmt = db
            .conn
            .prepare("SELECT sql FROM sqlite_master WHERE type = 'table' ORDER BY name")
            .expect("prepare");
        stmt.query_map([], |row| row.get::<_, String>(0))
            .expect("query")
            .collect::<Result<_, _>>()
            .expect("rows")
    }

    fn observation(timestamp: i64, temperature: f64) -> Observation {
        Observation {
            timestamp,
            city: "Lima".into(),
            lat: -12.05,
            lon: -77.03,
            description: "mist".into(),
            temperature,
            feels_like: temperature - 1.0,
            pressure: 1012,
            humidity: 88,
            wind_speed: 2.6,
        }
    }

    #[test]
    fn ensure_schema_twice_keeps_identical_schema() {
        let db = WeatherDatabase::open_in_memory().unwrap();

        db.ensure_schema().unwrap();
        let first = schema_sql(&db);
        db.ensure_schema().unwrap();
        let second = schema_sql(&db);

        assert_eq!(first.len(), 2);
        assert_eq!(first, second);
    }

    #[test]
    fn writes_stay_pending_until_flush() {
        let db = WeatherDatabase::open_in_memory().unwrap();
        db.ensure_schema().unwrap();
        assert!(!db.has_pending_writes());

        db.cities()
            .insert("Lima", Coordinates::new(-12.05, -77.03))
            .unwrap();
        assert!(db.has_pending_writes());

        db.flush().unwrap();
        assert!(!db.has_pending_writes());

        // Flushing with nothing pending is a no-op.
        db.flush().unwrap();
    }

    #[test]
    fn flushed_data_is_visible_to_a_fresh_connection() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("weather.db");

        let writer = WeatherDatabase::open(&path).unwrap();
        writer.ensure_schema().unwrap();
        writer
            .cities()
            .insert("Lima", Coordinates::new(-12.05, -77.03))
            .unwrap();
        writer.observations().insert(&observation(100, 20.0)).unwrap();

        let reader = WeatherDatabase::open(&path).unwrap();
        assert_eq!(reader.cities().lookup("Lima").unwrap(), None);

        writer.flush().unwrap();

        assert_eq!(
            reader.cities().lookup("Lima").unwrap(),
            Some(Coordinates::new(-12.05, -77.03))
        );
        assert_eq!(
            reader
                .observations()
                .average_temperature("Lima", 100, 100)
                .unwrap(),
            Some(20.0)
        );
    }

    #[test]
    fn close_flushes_before_releasing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("weather.db");

        let db = WeatherDatabase::open(&path).unwrap();
        db.ensure_schema().unwrap();
        db.observations().insert(&observation(100, 20.0)).unwrap();
        db.observations().insert(&observation(200, 30.0)).unwrap();
        db.close().unwrap();

        let reopened = WeatherDatabase::open(&path).unwrap();
        reopened.ensure_schema().unwrap();
        assert_eq!(
            reopened
                .observations()
                .average_temperature("Lima", 100, 200)
                .unwrap(),
            Some(25.0)
        );
    }
}
