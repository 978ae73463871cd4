use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;

use crate::model::{Coordinates, RawObservation};

use super::{WeatherProvider, field_f64, field_i64, field_str, truncate_body};

const SEARCH_URL: &str = "http://api.weatherapi.com/v1/search.json";
const CURRENT_URL: &str = "http://api.weatherapi.com/v1/current.json";

#[derive(Debug, Clone)]
pub struct WeatherApiProvider {
    api_key: String,
    http: Client,
}

impl WeatherApiProvider {
    pub fn new(api_key: String) -> Self {
        Self { api_key, http: Client::new() }
    }

    async fn get(&self, url: &str, q: &str, what: &str) -> Result<String> {
        let res = self
            .http
            .get(url)
            .query(&[("key", self.api_key.as_str()), ("q", q)])
            .send()
            .await
            .with_context(|| format!("Failed to send request to WeatherAPI.com ({what})"))?;

        let status = res.status();
        let body = res
            .text()
            .await
            .with_context(|| format!("Failed to read WeatherAPI {what} response body"))?;

        if !status.is_success() {
            return Err(anyhow::anyhow!(
                "WeatherAPI {} request failed with status {}: {}",
                what,
                status,
                truncate_body(&body),
            ));
        }

        Ok(body)
    }
}

#[derive(Debug, Deserialize)]
struct WaSearchEntry {
    lat: f64,
    lon: f64,
}

fn parse_search(city: &str, body: &str) -> Result<Coordinates> {
    let entries: Vec<WaSearchEntry> =
        serde_json::from_str(body).context("Failed to parse WeatherAPI search JSON")?;

    let first = entries
        .first()
        .ok_or_else(|| anyhow::anyhow!("WeatherAPI has no coordinates for '{city}'"))?;

    Ok(Coordinates::new(first.lat, first.lon))
}

fn parse_current(body: &str) -> Result<RawObservation> {
    let doc: Value =
        serde_json::from_str(body).context("Failed to parse WeatherAPI current JSON")?;

    let timestamp = match field_i64(&doc, "/current/last_updated_epoch", "timestamp")? {
        Some(ts) => Some(ts),
        None => field_i64(&doc, "/location/localtime_epoch", "timestamp")?,
    };

    Ok(RawObservation {
        timestamp,
        city: field_str(&doc, "/location/name", "city")?,
        lat: field_f64(&doc, "/location/lat", "lat")?,
        lon: field_f64(&doc, "/location/lon", "lon")?,
        description: field_str(&doc, "/current/condition/text", "description")?,
        temperature: field_f64(&doc, "/current/temp_c", "temperature")?,
        feels_like: field_f64(&doc, "/current/feelslike_c", "feelsLike")?,
        pressure: field_f64(&doc, "/current/pressure_mb", "pressure")?.map(|p| p.round() as i64),
        humidity: field_i64(&doc, "/current/humidity", "humidity")?,
        wind_speed: field_f64(&doc, "/current/wind_kph", "windSpeed")?.map(|kph| kph / 3.6),
    })
}

#[async_trait]
impl WeatherProvider for WeatherApiProvider {
    async fn geocode(&self, city: &str) -> Result<Coordinates> {
        let body = self.get(SEARCH_URL, city, "search").await?;
        parse_search(city, &body)
    }

    async fn current(&self, coords: Coordinates) -> Result<RawObservation> {
        let q = format!("{},{}", coords.lat, coords.lon);
        let body = self.get(CURRENT_URL, &q, "current").await?;
        parse_current(&body)
    }
}
