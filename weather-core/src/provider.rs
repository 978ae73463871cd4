use crate::{
    Config,
    error::StoreError,
    model::{Coordinates, RawObservation},
    provider::{openweather::OpenWeatherProvider, weatherapi::WeatherApiProvider},
};
use async_trait::async_trait;
use serde_json::Value;
use std::{convert::TryFrom, fmt::Debug};

pub mod openweather;
pub mod weatherapi;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderId {
    OpenWeather,
    WeatherApi,
}

impl ProviderId {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderId::OpenWeather => "openweather",
            ProviderId::WeatherApi => "weatherapi",
        }
    }

    pub const fn all() -> &'static [ProviderId] {
        &[ProviderId::OpenWeather, ProviderId::WeatherApi]
    }
}

impl std::fmt::Display for ProviderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for ProviderId {
    type Error = anyhow::Error;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let lower = value.to_lowercase();

        match lower.as_str() {
            "openweather" => Ok(ProviderId::OpenWeather),
            "weatherapi" => Ok(ProviderId::WeatherApi),
            _ => Err(anyhow::anyhow!(
                "Unknown provider '{value}'. Supported providers: openweather, weatherapi."
            )),
        }
    }
}

/// Remote source of coordinates and current readings.
///
/// Implementations make a single request per call: no retries, no pacing.
#[async_trait]
pub trait WeatherProvider: Send + Sync + Debug {
    /// Resolve a city name to coordinates.
    async fn geocode(&self, city: &str) -> anyhow::Result<Coordinates>;

    /// Current reading at `coords`. Fields the provider omitted stay `None`;
    /// a field of the wrong type fails with [`StoreError::MalformedRecord`].
    async fn current(&self, coords: Coordinates) -> anyhow::Result<RawObservation>;
}

/// Construct a provider from config and explicit ProviderId.
pub fn provider_from_config(
    id: ProviderId,
    config: &Config,
) -> anyhow::Result<Box<dyn WeatherProvider>> {
    let api_key = config.provider_api_key(id).ok_or_else(|| {
        anyhow::anyhow!(
            "No API key configured for provider '{id}'.\n\
                 Hint: run `weather configure {id}` and enter your API key."
        )
    })?;

    let boxed: Box<dyn WeatherProvider> = match id {
        ProviderId::OpenWeather => Box::new(OpenWeatherProvider::new(api_key.to_owned())),
        ProviderId::WeatherApi => Box::new(WeatherApiProvider::new(api_key.to_owned())),
    };

    Ok(boxed)
}

/// Construct the default provider from config, using `default_provider` field.
pub fn default_provider_from_config(config: &Config) -> anyhow::Result<Box<dyn WeatherProvider>> {
    let id = config.default_provider_id()?;
    provider_from_config(id, config)
}

/// Reads of one reading field at a JSON pointer: absent or `null` is `None`,
/// anything else must have the expected type.
pub(crate) fn field_f64(
    doc: &Value,
    pointer: &str,
    field: &'static str,
) -> Result<Option<f64>, StoreError> {
    typed_field(doc, pointer, field, Value::as_f64)
}

pub(crate) fn field_i64(
    doc: &Value,
    pointer: &str,
    field: &'static str,
) -> Result<Option<i64>, StoreError> {
    typed_field(doc, pointer, field, Value::as_i64)
}

pub(crate) fn field_str(
    doc: &Value,
    pointer: &str,
    field: &'static str,
) -> Result<Option<String>, StoreError> {
    typed_field(doc, pointer, field, |v| v.as_str().map(str::to_string))
}

fn typed_field<T>(
    doc: &Value,
    pointer: &str,
    field: &'static str,
    convert: impl Fn(&Value) -> Option<T>,
) -> Result<Option<T>, StoreError> {
    match doc.pointer(pointer) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => convert(value).map(Some).ok_or(StoreError::MalformedRecord {
            field,
            problem: "has the wrong type",
        }),
    }
}

pub(crate) fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    match body.char_indices().nth(MAX) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_string(),
    }
}
