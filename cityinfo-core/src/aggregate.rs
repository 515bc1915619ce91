//! Fan-out of one city record to both providers.

use serde::Serialize;

use crate::{
    city::City,
    model::{ApiResult, CountryInfo, WeatherInfo, serialize_outcome},
    provider::{CountryLookup, WeatherLookup},
};

/// A stored city together with both lookup outcomes. Either outcome may be
/// an error without affecting the other.
#[derive(Debug, Clone, Serialize)]
pub struct CityEnrichment {
    pub city: City,
    #[serde(serialize_with = "serialize_outcome")]
    pub country: ApiResult<CountryInfo>,
    #[serde(serialize_with = "serialize_outcome")]
    pub weather: ApiResult<WeatherInfo>,
}

#[derive(Debug, Clone)]
pub struct CityEnricher<C, W> {
    country: C,
    weather: W,
}

impl<C: CountryLookup, W: WeatherLookup> CityEnricher<C, W> {
    pub fn new(country: C, weather: W) -> Self {
        Self { country, weather }
    }

    /// Country metadata, keyed by the city's country.
    pub async fn country_for(&self, city: &City) -> ApiResult<CountryInfo> {
        self.country.lookup_country(&city.country).await
    }

    /// Current weather, keyed by the city's name.
    pub async fn weather_for(&self, city: &City) -> ApiResult<WeatherInfo> {
        self.weather.lookup_weather(&city.name).await
    }

    /// Runs both lookups concurrently and waits for both outcomes.
    pub async fn enrich(&self, city: City) -> CityEnrichment {
        let (country, weather) = tokio::join!(self.country_for(&city), self.weather_for(&city));
        tracing::debug!(
            city = %city.name,
            country_ok = country.is_ok(),
            weather_ok = weather.is_ok(),
            "City enriched"
        );

        CityEnrichment { city, country, weather }
    }
}
