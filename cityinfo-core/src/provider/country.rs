use std::sync::Arc;

use async_trait::async_trait;

use crate::{
    model::{ApiError, ApiResult, CountryInfo},
    normalize::CountryNormalizer,
    transport::Transport,
};

use super::{CountryLookup, FetchError, ProviderId, StatusPolicy, fetch_normalized};

/// Country metadata from the REST Countries API.
#[derive(Debug, Clone)]
pub struct CountryProvider {
    base_url: String,
    transport: Arc<dyn Transport>,
    policy: StatusPolicy,
    normalizer: CountryNormalizer,
}

impl CountryProvider {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            base_url: ProviderId::Country.default_base_url().to_string(),
            transport,
            policy: StatusPolicy::Reject,
            normalizer: CountryNormalizer,
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
}

/// `<base>/name/<name>`, with the raw name percent-encoded.
pub fn country_url(base_url: &str, name: &str) -> String {
    format!("{}/name/{}", base_url.trim_end_matches('/'), urlencoding::encode(name))
}

#[async_trait]
impl CountryLookup for CountryProvider {
    async fn lookup_country(&self, name: &str) -> ApiResult<CountryInfo> {
        let url = country_url(&self.base_url, name);
        tracing::debug!(provider = %ProviderId::Country, %url, "Fetching country");

        let outcome = fetch_normalized(
            ProviderId::Country,
            self.transport.as_ref(),
            &url,
            self.policy,
            &self.normalizer,
        )
        .await;

        match outcome {
            Ok(info) => {
                tracing::info!(country = %info.name.common, "Country information retrieved");
                Ok(info)
            }
            Err(FetchError::Rejected(status) | FetchError::Upstream { status, .. }) => {
                tracing::warn!(%name, status, "Country lookup rejected upstream");
                Err(ApiError::with_code(format!("Country not found: {name}"), status))
            }
            Err(FetchError::Empty) => {
                tracing::warn!(%name, "Country lookup returned no data");
                Err(ApiError::new(format!("No data found for country: {name}")))
            }
            Err(FetchError::Failed(cause)) => {
                tracing::warn!(%name, %cause, "Country lookup failed");
                Err(ApiError::new(format!("Failed to fetch country information: {cause}")))
            }
        }
    }
}
