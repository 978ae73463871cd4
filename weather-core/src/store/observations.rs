use chrono::{DateTime, Utc};
use rusqlite::{
    Connection, params,
    types::{ToSql, ToSqlOutput},
};
use tracing::{debug, warn};

use super::{InsertOutcome, begin_pending, commit_pending, is_duplicate_key};
use crate::{error::StoreError, model::Observation};

const CREATE_WEATHER: &str = "CREATE TABLE IF NOT EXISTS WEATHER(
    TIMESTAMP INTEGER NOT NULL,
    CITY TEXT NOT NULL,
    LAT REAL NOT NULL,
    LON REAL NOT NULL,
    DESCRIPTION TEXT NOT NULL,
    TEMPERATURE REAL NOT NULL,
    FEELSLIKE REAL NOT NULL,
    PRESSURE INTEGER NOT NULL,
    HUMIDITY INTEGER NOT NULL,
    WINDSPEED REAL NOT NULL,
    PRIMARY KEY(TIMESTAMP, CITY, LAT, LON)
)";

/// Bound of a time-range query, in unix seconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TimeBound {
    Int(i64),
    Real(f64),
}

impl From<i64> for TimeBound {
    fn from(value: i64) -> Self {
        TimeBound::Int(value)
    }
}

impl From<i32> for TimeBound {
    fn from(value: i32) -> Self {
        TimeBound::Int(value.into())
    }
}

impl From<f64> for TimeBound {
    fn from(value: f64) -> Self {
        TimeBound::Real(value)
    }
}

impl From<DateTime<Utc>> for TimeBound {
    fn from(value: DateTime<Utc>) -> Self {
        TimeBound::Int(value.timestamp())
    }
}

impl TimeBound {
    fn check_finite(self) -> Result<Self, StoreError> {
        match self {
            TimeBound::Real(v) if !v.is_finite() => Err(StoreError::InvalidTimeBound(v)),
            bound => Ok(bound),
        }
    }
}

impl ToSql for TimeBound {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match *self {
            TimeBound::Int(v) => ToSqlOutput::from(v),
            TimeBound::Real(v) => ToSqlOutput::from(v),
        })
    }
}

/// Append-only log of weather readings, at most one per
/// `(timestamp, city, lat, lon)`.
///
/// City and coordinates are not tied to the `CITIES` table by a foreign key;
/// a reading may name a city that was never cached.
#[derive(Debug, Clone, Copy)]
pub struct ObservationStore<'a> {
    conn: &'a Connection,
}

impl<'a> ObservationStore<'a> {
    pub(crate) fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    pub fn ensure_schema(&self) -> Result<(), StoreError> {
        self.conn.execute(CREATE_WEATHER, [])?;
        commit_pending(self.conn)?;
        Ok(())
    }

    /// Append one reading.
    ///
    /// A reading whose key already exists is left out and reported as
    /// [`InsertOutcome::Duplicate`]. A reading with unusable values fails with
    /// [`StoreError::MalformedRecord`] and nothing is written.
    pub fn insert(&self, observation: &Observation) -> Result<InsertOutcome, StoreError> {
        observation.validate()?;
        begin_pending(self.conn)?;

        let result = self.conn.execute(
            "INSERT INTO WEATHER(TIMESTAMP, CITY, LAT, LON, DESCRIPTION, TEMPERATURE, FEELSLIKE, PRESSURE, HUMIDITY, WINDSPEED)
             VALUES(?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                observation.timestamp,
                observation.city,
                observation.lat,
                observation.lon,
                observation.description,
                observation.temperature,
                observation.feels_like,
                observation.pressure,
                observation.humidity,
                observation.wind_speed,
            ],
        );

        match result {
            Ok(_) => {
                debug!(
                    "Recorded observation for {} at {}",
                    observation.city, observation.timestamp
                );
                Ok(InsertOutcome::Inserted)
            }
            Err(e) if is_duplicate_key(&e) => {
                warn!("Cannot insert observation: {observation}");
                Ok(InsertOutcome::Duplicate)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Mean temperature of `city` over readings with `start <= timestamp <= end`.
    ///
    /// `None` when no reading falls in the range. A NaN or infinite bound is
    /// rejected with [`StoreError::InvalidTimeBound`].
    pub fn average_temperature(
        &self,
        city: &str,
        start: impl Into<TimeBound>,
        end: impl Into<TimeBound>,
    ) -> Result<Option<f64>, StoreError> {
        let start = TimeBound::check_finite(start.into())?;
        let end = TimeBound::check_finite(end.into())?;
        let average = self.conn.query_row(
            "SELECT AVG(TEMPERATURE) FROM WEATHER WHERE CITY = ?1 AND TIMESTAMP >= ?2 AND TIMESTAMP <= ?3",
            params![city, start, end],
            |row| row.get::<_, Option<f64>>(0),
        )?;

        Ok(average)
    }
}
