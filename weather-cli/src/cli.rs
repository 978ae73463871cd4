use anyhow::{Context, anyhow};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use weather_core::{
    Config, ProviderId, TimeBound, WeatherDatabase, provider::default_provider_from_config,
    run_cycle,
};

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "weather", version, about = "Poll current weather and keep it in a local database")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Configure credentials for a specific provider.
    Configure {
        /// Provider short name, e.g. "openweather" or "weatherapi".
        provider: String,
    },

    /// Fetch the current weather for each configured city and store it.
    Poll {
        /// Poll these cities instead of the configured list.
        #[arg(long = "city")]
        cities: Vec<String>,
    },

    /// Show the cached coordinates of a city.
    Coords {
        city: String,
    },

    /// Average stored temperature of a city over a time range (inclusive).
    Average {
        city: String,

        /// Range start: unix seconds or RFC 3339 date/time.
        #[arg(long, value_parser = parse_time_bound)]
        from: TimeBound,

        /// Range end: unix seconds or RFC 3339 date/time.
        #[arg(long, value_parser = parse_time_bound)]
        to: TimeBound,
    },
}

impl Cli {
    pub async fn run(self) -> anyhow::Result<()> {
        let config = Config::load()?;

        match self.command {
            Command::Configure { provider } => configure(config, &provider)?,
            Command::Poll { cities } => {
                let provider = default_provider_from_config(&config)?;
                let cities = if cities.is_empty() { config.cities.clone() } else { cities };

                let db = open_store(&config)?;
                let report = run_cycle(&db, provider.as_ref(), &cities, config.pacing()).await?;
                db.close()?;

                println!("{report}");
            }
            Command::Coords { city } => {
                let db = open_store(&config)?;
                match db.cities().lookup(&city)? {
                    Some(coords) => println!("{city}: {coords}"),
                    None => println!("{city}: not cached"),
                }
                db.close()?;
            }
            Command::Average { city, from, to } => {
                let db = open_store(&config)?;
                match db.observations().average_temperature(&city, from, to)? {
                    Some(avg) => println!("{city}: {avg:.2} °C"),
                    None => println!("{city}: no data in range"),
                }
                db.close()?;
            }
        }

        Ok(())
    }
}

fn configure(mut config: Config, provider: &str) -> anyhow::Result<()> {
    let id = ProviderId::try_from(provider)?;

    let api_key = inquire::Password::new(&format!("API key for {id}:"))
        .without_confirmation()
        .prompt()
        .context("Failed to read API key")?;

    config.upsert_provider_api_key(id, api_key.trim().to_string());
    config.save()?;

    println!("Saved {id} credentials to {}", Config::config_file_path()?.display());
    Ok(())
}

fn open_store(config: &Config) -> anyhow::Result<WeatherDatabase> {
    let path = config.database_path()?;
    let db = WeatherDatabase::open(&path)
        .with_context(|| format!("Failed to open weather database: {}", path.display()))?;
    db.ensure_schema()?;
    Ok(db)
}

fn parse_time_bound(s: &str) -> anyhow::Result<TimeBound> {
    let s = s.trim();

    if let Ok(secs) = s.parse::<i64>() {
        return Ok(TimeBound::Int(secs));
    }
    if let Ok(secs) = s.parse::<f64>() {
        if secs.is_finite() {
            return Ok(TimeBound::Real(secs));
        }
    }

    DateTime::parse_from_rfc3339(s)
        .map(|dt| TimeBound::from(dt.with_timezone(&Utc)))
        .map_err(|_| anyhow!("'{s}' is neither a unix timestamp nor an RFC 3339 date/time"))
}
