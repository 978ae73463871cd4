use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;

use crate::model::{Coordinates, RawObservation};

use super::{WeatherProvider, field_f64, field_i64, field_str, truncate_body};

const GEOCODE_URL: &str = "https://api.openweathermap.org/geo/1.0/direct";
const CURRENT_URL: &str = "https://api.openweathermap.org/data/2.5/weather";

#[derive(Debug, Clone)]
pub struct OpenWeatherProvider {
    api_key: String,
    http: Client,
}

impl OpenWeatherProvider {
    pub fn new(api_key: String) -> Self {
        Self {
            api_key,
            http: Client::new(),
        }
    }

    async fn get(&self, url: &str, query: &[(&str, &str)], what: &str) -> Result<String> {
        let res = self
            .http
            .get(url)
            .query(query)
            .query(&[("appid", self.api_key.as_str())])
            .send()
            .await
            .with_context(|| format!("Failed to send request to OpenWeather ({what})"))?;

        let status = res.status();
        let body = res
            .text()
            .await
            .with_context(|| format!("Failed to read OpenWeather {what} response body"))?;

        if !status.is_success() {
            return Err(anyhow!(
                "OpenWeather {} request failed with status {}: {}",
                what,
                status,
                truncate_body(&body),
            ));
        }

        Ok(body)
    }
}

#[derive(Debug, Deserialize)]
struct OwGeoEntry {
    lat: f64,
    lon: f64,
}

fn parse_geocode(city: &str, body: &str) -> Result<Coordinates> {
    let entries: Vec<OwGeoEntry> =
        serde_json::from_str(body).context("Failed to parse OpenWeather geocoding JSON")?;

    let first = entries
        .first()
        .ok_or_else(|| anyhow!("OpenWeather has no coordinates for '{city}'"))?;

    Ok(Coordinates::new(first.lat, first.lon))
}

fn parse_current(body: &str) -> Result<RawObservation> {
    let doc: Value =
        serde_json::from_str(body).context("Failed to parse OpenWeather current JSON")?;

    Ok(RawObservation {
        timestamp: field_i64(&doc, "/dt", "timestamp")?,
        city: field_str(&doc, "/name", "city")?,
        lat: field_f64(&doc, "/coord/lat", "lat")?,
        lon: field_f64(&doc, "/coord/lon", "lon")?,
        description: field_str(&doc, "/weather/0/description", "description")?,
        temperature: field_f64(&doc, "/main/temp", "temperature")?,
        feels_like: field_f64(&doc, "/main/feels_like", "feelsLike")?,
        pressure: field_i64(&doc, "/main/pressure", "pressure")?,
        humidity: field_i64(&doc, "/main/humidity", "humidity")?,
        wind_speed: field_f64(&doc, "/wind/speed", "windSpeed")?,
    })
}

#[async_trait]
impl WeatherProvider for OpenWeatherProvider {
    async fn geocode(&self, city: &str) -> Result<Coordinates> {
        let body = self
            .get(GEOCODE_URL, &[("q", city), ("limit", "1")], "geocoding")
            .await?;

        parse_geocode(city, &body)
    }

    async fn current(&self, coords: Coordinates) -> Result<RawObservation> {
        let lat = coords.lat.to_string();
        let lon = coords.lon.to_string();

        let body = self
            .get(
                CURRENT_URL,
                &[("lat", lat.as_str()), ("lon", lon.as_str()), ("units", "metric")],
                "current weather",
            )
            .await?;

        parse_current(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{error::StoreError, model::Observation};

    const CURRENT: &str = r#"{
        "coord": {"lon": -118.2437, "lat": 34.0522},
        "weather": [{"id": 800, "main": "Clear", "description": "clear sky", "icon": "01d"}],
        "main": {"temp": 22.4, "feels_like": 21.9, "temp_min": 20.1, "temp_max": 24.0, "pressure": 1015, "humidity": 48},
        "wind": {"speed": 3.6, "deg": 250},
        "dt": 1718900000,
        "name": "Los Angeles",
        "cod": 200
    }"#;

    #[test]
    fn geocode_takes_first_match() {
        let body = r#"[{"name": "New York", "lat": 40.7127, "lon": -74.006, "country": "US"}]"#;

        let coords = parse_geocode("New York", body).unwrap();
        assert_eq!(coords, Coordinates::new(40.7127, -74.006));
    }

    #[test]
    fn geocode_without_matches_is_an_error() {
        let err = parse_geocode("Atlantis", "[]").unwrap_err();
        assert!(err.to_string().contains("Atlantis"));
    }

    #[test]
    fn current_maps_every_field() {
        let raw = parse_current(CURRENT).unwrap();
        let obs = Observation::try_from(raw).unwrap();

        assert_eq!(obs.timestamp, 1718900000);
        assert_eq!(obs.city, "Los Angeles");
        assert_eq!(obs.coordinates(), Coordinates::new(34.0522, -118.2437));
        assert_eq!(obs.description, "clear sky");
        assert_eq!(obs.temperature, 22.4);
        assert_eq!(obs.feels_like, 21.9);
        assert_eq!(obs.pressure, 1015);
        assert_eq!(obs.humidity, 48);
        assert_eq!(obs.wind_speed, 3.6);
    }

    #[test]
    fn current_without_main_block_is_malformed() {
        let body = r#"{"coord": {"lon": 1.0, "lat": 2.0}, "weather": [], "dt": 5, "name": "X"}"#;

        let raw = parse_current(body).unwrap();
        assert_eq!(raw.temperature, None);

        let err = Observation::try_from(raw).unwrap_err();
        assert!(err.is_malformed());
    }

    #[test]
    fn current_with_mistyped_field_is_malformed() {
        let body = CURRENT.replace(r#""pressure": 1015"#, r#""pressure": "1015""#);

        let err = parse_current(&body).unwrap_err();
        let store_err = err.downcast_ref::<StoreError>().expect("typed store error");
        assert!(matches!(
            store_err,
            StoreError::MalformedRecord {
                field: "pressure",
                ..
            }
        ));
    }

    #[test]
    fn current_with_broken_json_is_a_provider_error() {
        let err = parse_current("<html>bad gateway</html>").unwrap_err();

        assert!(err.downcast_ref::<StoreError>().is_none());
        assert!(err.to_string().contains("Failed to parse OpenWeather current JSON"));
    }
}
