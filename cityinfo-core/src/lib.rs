//! Core library for the `cityinfo` CLI.
//!
//! This crate defines:
//! - Configuration & credentials handling
//! - Country and weather provider clients over a pluggable HTTP transport
//! - Normalization of upstream payloads into the shared records
//! - Fan-out of a stored city to both providers
//! - The city record store
//!
//! It is used by `cityinfo-cli`, but can also be reused by other binaries or services.

pub mod aggregate;
pub mod city;
pub mod config;
pub mod model;
pub mod normalize;
pub mod provider;
pub mod transport;

pub use aggregate::{CityEnricher, CityEnrichment};
pub use city::{City, CityStore, CityUpdate, JsonFileStore, NewCity, StoreError, TouristRating};
pub use config::Config;
pub use model::{ApiError, ApiResult, CountryInfo, WeatherInfo};
pub use provider::{
    CountryLookup, ProviderId, StatusPolicy, WeatherLookup, country::CountryProvider,
    weather::WeatherProvider,
};
pub use transport::{HttpTransport, Transport};
