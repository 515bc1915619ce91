use std::{process::ExitCode, sync::Arc};

use anyhow::{Context, bail};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use cityinfo_core::{
    ApiResult, CityEnricher, CityStore, CityUpdate, Config, CountryLookup, HttpTransport,
    JsonFileStore, NewCity, TouristRating, Transport, WeatherLookup,
    provider::{country_provider_from_config, weather_provider_from_config},
};
use serde::Serialize;

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "cityinfo", version, about = "City records enriched with country and weather data")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Store the weather API key in the config file.
    Configure,

    /// Look up country information by name.
    Country {
        /// Country name, e.g. "France" or "Côte d'Ivoire".
        name: String,
    },

    /// Show current weather for a location.
    Weather {
        /// City or location name.
        location: String,
    },

    /// Manage stored cities.
    City {
        #[command(subcommand)]
        action: CityCommand,
    },
}

#[derive(Debug, Subcommand)]
pub enum CityCommand {
    /// Add a city.
    Add {
        #[arg(long)]
        name: String,
        #[arg(long)]
        state: String,
        #[arg(long)]
        country: String,
        /// Tourist rating, 1 to 5.
        #[arg(long, value_parser = clap::value_parser!(u8).range(1..=5))]
        rating: u8,
        /// Date established, YYYY-MM-DD.
        #[arg(long)]
        established: NaiveDate,
        #[arg(long)]
        population: u64,
    },

    /// List cities, optionally only those whose name contains `--name`.
    List {
        #[arg(long)]
        name: Option<String>,
    },

    /// Show a city with its country information and current weather.
    Show { id: u64 },

    /// Update rating, establishment date or population of a city.
    Update {
        id: u64,
        #[arg(long, value_parser = clap::value_parser!(u8).range(1..=5))]
        rating: Option<u8>,
        #[arg(long)]
        established: Option<NaiveDate>,
        #[arg(long)]
        population: Option<u64>,
    },

    /// Delete a city.
    Delete { id: u64 },
}

impl Cli {
    pub async fn run(self) -> anyhow::Result<ExitCode> {
        match self.command {
            // The file alone; an env override must not be persisted.
            Command::Configure => configure(Config::load()?),
            Command::Country { name } => {
                let config = runtime_config()?;
                let provider = country_provider_from_config(&config, transport(&config)?);
                let outcome = provider.lookup_country(require_key(&name, "Country name")?).await;
                Ok(exit_code(print_outcome(&outcome)?))
            }
            Command::Weather { location } => {
                let config = runtime_config()?;
                let provider = weather_provider_from_config(&config, transport(&config)?);
                let outcome = provider.lookup_weather(require_key(&location, "Location")?).await;
                Ok(exit_code(print_outcome(&outcome)?))
            }
            Command::City { action } => {
                let config = runtime_config()?;
                let store = JsonFileStore::new(config.data_file_path()?);
                run_city(action, &store, &config).await
            }
        }
    }
}

/// Config file with environment overrides applied.
fn runtime_config() -> anyhow::Result<Config> {
    let config = Config::load()?.with_env_overrides();
    tracing::debug!(?config, "Configuration loaded");
    Ok(config)
}

async fn run_city(
    action: CityCommand,
    store: &JsonFileStore,
    config: &Config,
) -> anyhow::Result<ExitCode> {
    match action {
        CityCommand::Add { name, state, country, rating, established, population } => {
            let city = store.create(NewCity {
                name,
                state,
                country,
                tourist_rating: TouristRating::new(rating)?,
                date_established: established,
                estimated_population: population,
            })?;
            print_json(&city)?;
        }
        CityCommand::List { name } => {
            let cities = match name {
                Some(query) => store.search_by_name(&query)?,
                None => store.list()?,
            };
            print_json(&cities)?;
        }
        CityCommand::Show { id } => {
            let Some(city) = store.get(id)? else {
                eprintln!("City not found: {id}");
                return Ok(ExitCode::FAILURE);
            };

            let transport = transport(config)?;
            let enricher = CityEnricher::new(
                country_provider_from_config(config, transport.clone()),
                weather_provider_from_config(config, transport),
            );
            print_json(&enricher.enrich(city).await)?;
        }
        CityCommand::Update { id, rating, established, population } => {
            let update = CityUpdate {
                tourist_rating: rating.map(TouristRating::new).transpose()?,
                date_established: established,
                estimated_population: population,
            };
            if update.is_empty() {
                bail!("Nothing to update. Pass --rating, --established or --population.");
            }
            print_json(&store.update(id, update)?)?;
        }
        CityCommand::Delete { id } => {
            print_json(&store.delete(id)?)?;
        }
    }

    Ok(ExitCode::SUCCESS)
}

fn configure(mut config: Config) -> anyhow::Result<ExitCode> {
    let key = inquire::Password::new("OpenWeather API key:")
        .without_confirmation()
        .with_display_mode(inquire::PasswordDisplayMode::Masked)
        .prompt()
        .context("Failed to read API key")?;

    if key.trim().is_empty() {
        bail!("API key must not be empty");
    }

    config.set_weather_api_key(key.trim().to_string());
    config.save()?;

    println!("Saved configuration to {}", Config::config_file_path()?.display());
    Ok(ExitCode::SUCCESS)
}

fn transport(config: &Config) -> anyhow::Result<Arc<dyn Transport>> {
    Ok(Arc::new(HttpTransport::from_config(config)?))
}

/// Blank keys never reach a provider.
fn require_key<'a>(key: &'a str, what: &str) -> anyhow::Result<&'a str> {
    if key.trim().is_empty() {
        bail!("{what} is required");
    }
    Ok(key)
}

/// Prints the record or the `{ "error": ... }` object; returns whether it was a record.
fn print_outcome<T: Serialize>(outcome: &ApiResult<T>) -> anyhow::Result<bool> {
    match outcome {
        Ok(value) => print_json(value).map(|_| true),
        Err(err) => print_json(err).map(|_| false),
    }
}

fn exit_code(success: bool) -> ExitCode {
    if success { ExitCode::SUCCESS } else { ExitCode::FAILURE }
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(value).context("Failed to serialize output")?;
    println!("{json}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use cityinfo_core::ApiError;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn rating_out_of_range_is_rejected_by_parser() {
        let parsed = Cli::try_parse_from([
            "cityinfo", "city", "add", "--name", "Paris", "--state", "IDF", "--country", "France",
            "--rating", "6", "--established", "0250-01-01", "--population", "2100000",
        ]);
        assert!(parsed.is_err());
    }

    #[test]
    fn add_parses_date() {
        let cli = Cli::try_parse_from([
            "cityinfo", "city", "add", "--name", "Paris", "--state", "IDF", "--country", "France",
            "--rating", "5", "--established", "0250-01-01", "--population", "2100000",
        ])
        .expect("valid arguments");

        match cli.command {
            Command::City { action: CityCommand::Add { established, rating, .. } } => {
                assert_eq!(established, NaiveDate::from_ymd_opt(250, 1, 1).unwrap());
                assert_eq!(rating, 5);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn blank_lookup_key_is_refused() {
        assert!(require_key("  ", "Location").is_err());
        assert_eq!(require_key(" Paris", "Location").unwrap(), " Paris");
    }

    #[test]
    fn api_error_outcome_is_reported_as_failure() {
        let outcome: ApiResult<()> = Err(ApiError::new("boom"));
        assert!(!print_outcome(&outcome).unwrap());
        assert!(print_outcome(&Ok(1)).unwrap());
    }
}
