use rusqlite::{Connection, OptionalExtension, params};
use tracing::{debug, warn};

use super::{InsertOutcome, begin_pending, commit_pending, is_duplicate_key};
use crate::{error::StoreError, model::Coordinates};

const CREATE_CITIES: &str = "CREATE TABLE IF NOT EXISTS CITIES(
    NAME TEXT NOT NULL,
    LAT REAL NOT NULL,
    LON REAL NOT NULL,
    PRIMARY KEY(NAME, LAT, LON)
)";

/// Coordinate cache: city name -> coordinates, written once per identity.
///
/// The key is the whole `(name, lat, lon)` triple, so the same name may end up
/// with several coordinate rows if it is ever re-resolved differently.
#[derive(Debug, Clone, Copy)]
pub struct CityStore<'a> {
    conn: &'a Connection,
}

impl<'a> CityStore<'a> {
    pub(crate) fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    pub fn ensure_schema(&self) -> Result<(), StoreError> {
        self.conn.execute(CREATE_CITIES, [])?;
        commit_pending(self.conn)?;
        Ok(())
    }

    /// Record resolved coordinates for `name`.
    ///
    /// An existing identical row is left untouched and reported as
    /// [`InsertOutcome::Duplicate`].
    pub fn insert(&self, name: &str, coords: Coordinates) -> Result<InsertOutcome, StoreError> {
        begin_pending(self.conn)?;

        let result = self.conn.execute(
            "INSERT INTO CITIES(NAME, LAT, LON) VALUES(?1, ?2, ?3)",
            params![name, coords.lat, coords.lon],
        );

        match result {
            Ok(_) => {
                debug!("Cached coordinates for {name}: {coords}");
                Ok(InsertOutcome::Inserted)
            }
            Err(e) if is_duplicate_key(&e) => {
                warn!("Cannot insert city: {}, {}, {}", name, coords.lat, coords.lon);
                Ok(InsertOutcome::Duplicate)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Cached coordinates for an exact name match.
    ///
    /// When several rows share the name, whichever SQLite yields first wins.
    pub fn lookup(&self, name: &str) -> Result<Option<Coordinates>, StoreError> {
        let coords = self
            .conn
            .query_row(
                "SELECT LAT, LON FROM CITIES WHERE NAME = ?1 LIMIT 1",
                params![name],
                |row| Ok(Coordinates::new(row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        Ok(coords)
    }
}
