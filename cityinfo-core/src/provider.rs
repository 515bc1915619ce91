use crate::{
    Config,
    model::{ApiResult, CountryInfo, WeatherInfo},
    normalize::{NormalizeError, Normalizer},
    provider::{country::CountryProvider, weather::WeatherProvider},
    transport::{Transport, TransportError, UNKNOWN_ERROR},
};
use async_trait::async_trait;
use serde_json::Value;
use std::{fmt::Debug, sync::Arc};
use thiserror::Error;

pub mod country;
pub mod weather;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderId {
    Country,
    Weather,
}

impl ProviderId {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderId::Country => "country",
            ProviderId::Weather => "weather",
        }
    }

    pub fn default_base_url(&self) -> &'static str {
        match self {
            ProviderId::Country => "https://restcountries.com/v3.1",
            ProviderId::Weather => "https://api.openweathermap.org/data/2.5",
        }
    }

    pub const fn all() -> &'static [ProviderId] {
        &[ProviderId::Country, ProviderId::Weather]
    }
}

impl std::fmt::Display for ProviderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a provider does with a non-2xx upstream status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusPolicy {
    /// Fail with the status as the error code; the body is never read.
    Reject,
    /// Log the status and parse the body anyway.
    Permissive,
}

#[async_trait]
pub trait CountryLookup: Send + Sync + Debug {
    async fn lookup_country(&self, name: &str) -> ApiResult<CountryInfo>;
}

#[async_trait]
pub trait WeatherLookup: Send + Sync + Debug {
    async fn lookup_weather(&self, location: &str) -> ApiResult<WeatherInfo>;
}

/// Failure of one request/parse/normalize round, before a provider words it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("upstream returned status {0}")]
    Rejected(u16),

    #[error("upstream returned no record")]
    Empty,

    /// Transport, parse or shape failure; holds the cause text.
    #[error("{0}")]
    Failed(String),

    /// Non-2xx reply read under [`StatusPolicy::Permissive`] whose body is
    /// not a record. Keeps the body so the provider can report the
    /// upstream's own explanation.
    #[error("upstream returned status {status}: {cause}")]
    Upstream { status: u16, body: Value, cause: String },
}

impl From<TransportError> for FetchError {
    fn from(err: TransportError) -> Self {
        FetchError::Failed(err.cause())
    }
}

impl From<NormalizeError> for FetchError {
    fn from(err: NormalizeError) -> Self {
        match err {
            NormalizeError::Empty => FetchError::Empty,
            NormalizeError::Malformed(msg) if msg.trim().is_empty() => {
                FetchError::Failed(UNKNOWN_ERROR.to_string())
            }
            NormalizeError::Malformed(msg) => FetchError::Failed(msg),
        }
    }
}

/// One GET, one parse, one normalization.
pub(crate) async fn fetch_normalized<N: Normalizer>(
    provider: ProviderId,
    transport: &dyn Transport,
    url: &str,
    policy: StatusPolicy,
    normalizer: &N,
) -> Result<N::Output, FetchError> {
    let response = transport.get(url).await?;

    let success = response.is_success();
    if !success {
        match policy {
            StatusPolicy::Reject => return Err(FetchError::Rejected(response.status)),
            StatusPolicy::Permissive => {
                tracing::warn!(
                    %provider,
                    status = response.status,
                    "upstream returned non-success status, parsing body anyway"
                );
            }
        }
    }

    let payload = response.json()?;
    if success {
        return Ok(normalizer.normalize(payload)?);
    }

    match normalizer.normalize(payload.clone()) {
        Ok(record) => Ok(record),
        Err(err) => Err(FetchError::Upstream {
            status: response.status,
            body: payload,
            cause: FetchError::from(err).to_string(),
        }),
    }
}

/// The `message` an upstream error body carries, if it is a non-blank string.
pub(crate) fn upstream_message(body: &Value) -> Option<&str> {
    body.get("message").and_then(Value::as_str).filter(|m| !m.trim().is_empty())
}

/// Construct the country provider from config.
pub fn country_provider_from_config(
    config: &Config,
    transport: Arc<dyn Transport>,
) -> CountryProvider {
    CountryProvider::new(transport).with_base_url(config.base_url(ProviderId::Country))
}

/// Construct the weather provider from config. The API key is handed over
/// explicitly; the provider never reads the environment itself.
pub fn weather_provider_from_config(
    config: &Config,
    transport: Arc<dyn Transport>,
) -> WeatherProvider {
    WeatherProvider::new(config.weather_api_key().map(str::to_owned), transport)
        .with_base_url(config.base_url(ProviderId::Weather))
}
