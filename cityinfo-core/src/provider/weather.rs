use std::{fmt, sync::Arc};

use async_trait::async_trait;

use crate::{
    model::{ApiError, ApiResult, WeatherInfo},
    normalize::PassThrough,
    transport::Transport,
};

use serde_json::Value;

use super::{
    FetchError, ProviderId, StatusPolicy, WeatherLookup, fetch_normalized, upstream_message,
};

pub const MISSING_API_KEY_MESSAGE: &str =
    "Weather API key not configured. Please set WEATHER_API_KEY environment variable.";

/// Placeholder substituted for the API key in anything that gets logged.
pub const REDACTED_KEY: &str = "API_KEY_HIDDEN";

/// Current weather from the OpenWeather API.
#[derive(Clone)]
pub struct WeatherProvider {
    api_key: Option<String>,
    base_url: String,
    transport: Arc<dyn Transport>,
    policy: StatusPolicy,
    normalizer: PassThrough<WeatherInfo>,
}

impl WeatherProvider {
    /// A blank key is treated as missing; every lookup then fails without
    /// touching the network.
    pub fn new(api_key: Option<String>, transport: Arc<dyn Transport>) -> Self {
        let api_key = api_key.filter(|k| !k.trim().is_empty());
        if api_key.is_none() {
            tracing::warn!("WEATHER_API_KEY not configured. Weather lookups will not work.");
        }

        Self {
            api_key,
            base_url: ProviderId::Weather.default_base_url().to_string(),
            transport,
            policy: StatusPolicy::Permissive,
            normalizer: PassThrough::new(),
        }
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    pub fn with_status_policy(mut self, policy: StatusPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }
}

impl fmt::Debug for WeatherProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeatherProvider")
            .field("api_key", &self.api_key.as_ref().map(|_| REDACTED_KEY))
            .field("base_url", &self.base_url)
            .field("transport", &self.transport)
            .field("policy", &self.policy)
            .finish()
    }
}

/// `<base>/weather?q=<location>&appid=<key>`, both values percent-encoded.
pub fn weather_url(base_url: &str, location: &str, api_key: &str) -> String {
    format!(
        "{}/weather?q={}&appid={}",
        base_url.trim_end_matches('/'),
        urlencoding::encode(location),
        urlencoding::encode(api_key),
    )
}

/// Replaces every occurrence of the key, raw or encoded, with [`REDACTED_KEY`].
pub fn redact_key(url: &str, api_key: &str) -> String {
    if api_key.is_empty() {
        return url.to_string();
    }

    url.replace(&*urlencoding::encode(api_key), REDACTED_KEY)
        .replace(api_key, REDACTED_KEY)
}

/// OpenWeather's `cod`, sent as a number or a numeric string.
fn upstream_code(body: &Value) -> Option<u16> {
    match body.get("cod")? {
        Value::Number(n) => n.as_u64().and_then(|n| u16::try_from(n).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

#[async_trait]
impl WeatherLookup for WeatherProvider {
    async fn lookup_weather(&self, location: &str) -> ApiResult<WeatherInfo> {
        let Some(api_key) = self.api_key.as_deref() else {
            return Err(ApiError::new(MISSING_API_KEY_MESSAGE));
        };

        let url = weather_url(&self.base_url, location, api_key);
        tracing::debug!(
            provider = %ProviderId::Weather,
            url = %redact_key(&url, api_key),
            "Fetching weather"
        );

        let outcome = fetch_normalized(
            ProviderId::Weather,
            self.transport.as_ref(),
            &url,
            self.policy,
            &self.normalizer,
        )
        .await;

        match outcome {
            Ok(info) => {
                tracing::info!(location = %info.name, "Weather data retrieved");
                Ok(info)
            }
            Err(FetchError::Rejected(status)) => {
                tracing::warn!(%location, status, "Weather lookup rejected upstream");
                Err(ApiError::with_code(format!("Weather not found: {location}"), status))
            }
            Err(FetchError::Upstream { status, body, cause }) => {
                let detail = redact_key(upstream_message(&body).unwrap_or(&cause), api_key);
                let code = upstream_code(&body).unwrap_or(status);
                tracing::warn!(%location, status, %detail, "Weather lookup failed upstream");
                Err(ApiError::with_code(
                    format!("Failed to fetch weather information: {detail}"),
                    code,
                ))
            }
            // The pass-through normalizer never reports an empty payload.
            Err(err @ (FetchError::Empty | FetchError::Failed(_))) => {
                let cause = redact_key(&err.to_string(), api_key);
                tracing::warn!(%location, %cause, "Weather lookup failed");
                Err(ApiError::new(format!("Failed to fetch weather information: {cause}")))
            }
        }
    }
}
