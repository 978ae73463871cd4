use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::StoreError;

/// A resolved (latitude, longitude) pair.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinates {
    pub lat: f64,
    pub lon: f64,
}

impl Coordinates {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }
}

impl fmt::Display for Coordinates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.lat, self.lon)
    }
}

/// One point-in-time weather reading for a city location.
///
/// Identity is `(timestamp, city, lat, lon)`; every field is required.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    /// Unix timestamp (seconds) of the reading.
    pub timestamp: i64,
    pub city: String,
    pub lat: f64,
    pub lon: f64,
    pub description: String,
    pub temperature: f64,
    pub feels_like: f64,
    /// Atmospheric pressure, hPa.
    pub pressure: i64,
    /// Relative humidity, percent.
    pub humidity: i64,
    pub wind_speed: f64,
}

impl Observation {
    pub fn coordinates(&self) -> Coordinates {
        Coordinates::new(self.lat, self.lon)
    }

    /// Rejects real-valued fields SQLite would store as NULL.
    pub fn validate(&self) -> Result<(), StoreError> {
        let reals = [
            ("lat", self.lat),
            ("lon", self.lon),
            ("temperature", self.temperature),
            ("feelsLike", self.feels_like),
            ("windSpeed", self.wind_speed),
        ];

        for (field, value) in reals {
            if !value.is_finite() {
                return Err(StoreError::MalformedRecord {
                    field,
                    problem: "is not a finite number",
                });
            }
        }

        Ok(())
    }
}

impl fmt::Display for Observation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}, {}, {}, {}, {}, {}, {}, {}, {}, {}",
            self.timestamp,
            self.city,
            self.lat,
            self.lon,
            self.description,
            self.temperature,
            self.feels_like,
            self.pressure,
            self.humidity,
            self.wind_speed,
        )
    }
}

/// Provider-shaped reading where any field may be absent.
///
/// Converting it into an [`Observation`] is where a malformed record is caught.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawObservation {
    pub timestamp: Option<i64>,
    pub city: Option<String>,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub description: Option<String>,
    pub temperature: Option<f64>,
    pub feels_like: Option<f64>,
    pub pressure: Option<i64>,
    pub humidity: Option<i64>,
    pub wind_speed: Option<f64>,
}

fn required<T>(value: Option<T>, field: &'static str) -> Result<T, StoreError> {
    value.ok_or(StoreError::MalformedRecord {
        field,
        problem: "is missing",
    })
}

impl TryFrom<RawObservation> for Observation {
    type Error = StoreError;

    fn try_from(raw: RawObservation) -> Result<Self, Self::Error> {
        let observation = Observation {
            timestamp: required(raw.timestamp, "timestamp")?,
            city: required(raw.city, "city")?,
            lat: required(raw.lat, "lat")?,
            lon: required(raw.lon, "lon")?,
            description: required(raw.description, "description")?,
            temperature: required(raw.temperature, "temperature")?,
            feels_like: required(raw.feels_like, "feelsLike")?,
            pressure: required(raw.pressure, "pressure")?,
            humidity: required(raw.humidity, "humidity")?,
            wind_speed: required(raw.wind_speed, "windSpeed")?,
        };
        observation.validate()?;

        Ok(observation)
    }
}

impl From<Observation> for RawObservation {
    fn from(o: Observation) -> Self {
        Self {
            timestamp: Some(o.timestamp),
            city: Some(o.city),
            lat: Some(o.lat),
            lon: Some(o.lon),
            description: Some(o.description),
            temperature: Some(o.temperature),
            feels_like: Some(o.feels_like),
            pressure: Some(o.pressure),
            humidity: Some(o.humidity),
            wind_speed: Some(o.wind_speed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lima_raw() -> RawObservation {
        RawObservation {
            timestamp: Some(100),
            city: Some("Lima".into()),
            lat: Some(-12.05),
            lon: Some(-77.03),
            description: Some("overcast clouds".into()),
            temperature: Some(20.0),
            feels_like: Some(19.5),
            pressure: Some(1013),
            humidity: Some(80),
            wind_speed: Some(3.1),
        }
    }

    #[test]
    fn complete_raw_record_converts() {
        let obs = Observation::try_from(lima_raw()).expect("complete record must convert");

        assert_eq!(obs.city, "Lima");
        assert_eq!(obs.coordinates(), Coordinates::new(-12.05, -77.03));
        assert_eq!(obs.pressure, 1013);
    }

    #[test]
    fn missing_temperature_is_malformed() {
        let raw = RawObservation {
            temperature: None,
            ..lima_raw()
        };

        let err = Observation::try_from(raw).unwrap_err();
        assert!(matches!(
            err,
            StoreError::MalformedRecord {
                field: "temperature",
                ..
            }
        ));
        assert!(err.is_malformed());
    }

    #[test]
    fn non_finite_reading_is_malformed() {
        let raw = RawObservation {
            wind_speed: Some(f64::NAN),
            ..lima_raw()
        };

        let err = Observation::try_from(raw).unwrap_err();
        assert!(err.to_string().contains("windSpeed"));
    }

    #[test]
    fn raw_record_uses_camel_case_keys() {
        let json = r#"{"timestamp": 5, "city": "Oslo", "feelsLike": -3.0, "windSpeed": 1.0}"#;
        let raw: RawObservation = serde_json::from_str(json).expect("valid json");

        assert_eq!(raw.feels_like, Some(-3.0));
        assert_eq!(raw.wind_speed, Some(1.0));
        assert_eq!(raw.temperature, None);
    }
}
