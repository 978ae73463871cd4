//! One polling pass over a list of cities.
//!
//! Coordinates come from the local cache when possible and from the provider
//! otherwise; each city then gets one current reading appended to the store.
//! Provider failures are logged and skipped. Store failures abort the pass.

use std::{fmt, time::Duration};

use rand::Rng;
use tracing::{debug, error, info, warn};

use crate::{
    error::StoreError,
    model::{Coordinates, Observation},
    provider::WeatherProvider,
    store::{InsertOutcome, WeatherDatabase},
};

/// Random delay window applied between two cities.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pacing {
    min: Duration,
    max: Duration,
}

impl Pacing {
    pub fn new(min: Duration, max: Duration) -> Self {
        if min <= max {
            Self { min, max }
        } else {
            Self { min: max, max: min }
        }
    }

    /// No waiting at all.
    pub fn none() -> Self {
        Self::new(Duration::ZERO, Duration::ZERO)
    }

    pub fn next_delay(&self) -> Duration {
        if self.min == self.max {
            return self.min;
        }
        rand::thread_rng().gen_range(self.min..=self.max)
    }
}

/// Tally of one pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// Cities whose coordinates had to be fetched from the provider.
    pub geocoded: usize,
    pub inserted: usize,
    pub duplicates: usize,
    pub malformed: usize,
    /// Cities skipped because the provider call failed.
    pub failed: usize,
}

impl fmt::Display for CycleReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} inserted, {} duplicate, {} malformed, {} failed ({} newly geocoded)",
            self.inserted, self.duplicates, self.malformed, self.failed, self.geocoded
        )
    }
}

/// Poll every city once, flushing the store after each one.
pub async fn run_cycle(
    db: &WeatherDatabase,
    provider: &dyn WeatherProvider,
    cities: &[String],
    pacing: Pacing,
) -> Result<CycleReport, StoreError> {
    let mut report = CycleReport::default();

    for (i, city) in cities.iter().enumerate() {
        if i > 0 {
            let delay = pacing.next_delay();
            if !delay.is_zero() {
                debug!("Sleeping {:?} before polling {city}", delay);
                tokio::time::sleep(delay).await;
            }
        }

        poll_city(db, provider, city, &mut report).await?;
        db.flush()?;
    }

    info!("Polling cycle finished: {report}");
    Ok(report)
}

async fn poll_city(
    db: &WeatherDatabase,
    provider: &dyn WeatherProvider,
    city: &str,
    report: &mut CycleReport,
) -> Result<(), StoreError> {
    let Some(coords) = resolve_coordinates(db, provider, city, report).await? else {
        return Ok(());
    };

    let raw = match provider.current(coords).await {
        Ok(raw) => raw,
        Err(e) if e.downcast_ref::<StoreError>().is_some_and(StoreError::is_malformed) => {
            error!("Discarding reading for {city}: {e:#}");
            report.malformed += 1;
            return Ok(());
        }
        Err(e) => {
            warn!("Failed to fetch current weather for {city}: {e:#}");
            report.failed += 1;
            return Ok(());
        }
    };

    let inserted = Observation::try_from(raw).and_then(|o| db.observations().insert(&o));

    match inserted {
        Ok(InsertOutcome::Inserted) => report.inserted += 1,
        Ok(InsertOutcome::Duplicate) => report.duplicates += 1,
        Err(e) if e.is_malformed() => {
            error!("Discarding reading for {city}: {e}");
            report.malformed += 1;
        }
        Err(e) => return Err(e),
    }

    Ok(())
}

async fn resolve_coordinates(
    db: &WeatherDatabase,
    provider: &dyn WeatherProvider,
    city: &str,
    report: &mut CycleReport,
) -> Result<Option<Coordinates>, StoreError> {
    if let Some(coords) = db.cities().lookup(city)? {
        debug!("Using cached coordinates for {city}: {coords}");
        return Ok(Some(coords));
    }

    match provider.geocode(city).await {
        Ok(coords) => {
            info!("Resolved {city} to {coords}");
            db.cities().insert(city, coords)?;
            report.geocoded += 1;
            Ok(Some(coords))
        }
        Err(e) => {
            warn!("Failed to geocode {city}: {e:#}");
            report.failed += 1;
            Ok(None)
        }
    }
}
