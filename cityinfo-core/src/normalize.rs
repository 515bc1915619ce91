//! Mapping of upstream JSON payloads onto the internal records.
//!
//! Each provider composes with its own [`Normalizer`]: the country provider
//! deep-defaults a partial payload, the weather provider passes the upstream
//! shape through untouched.

use std::{collections::BTreeMap, fmt, marker::PhantomData};

use serde::{Deserialize, de::DeserializeOwned};
use serde_json::Value;
use thiserror::Error;

use crate::model::{CoatOfArms, CountryInfo, CountryName, Currency};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NormalizeError {
    /// The payload holds no record at all.
    #[error("payload contains no record")]
    Empty,

    /// The payload has a record whose shape cannot be mapped.
    #[error("{0}")]
    Malformed(String),
}

pub trait Normalizer: Send + Sync + fmt::Debug {
    type Output;

    fn normalize(&self, payload: Value) -> Result<Self::Output, NormalizeError>;
}

/// Picks the first candidate of a REST Countries match list and fills every
/// missing field with its default.
#[derive(Debug, Clone, Copy, Default)]
pub struct CountryNormalizer;

impl Normalizer for CountryNormalizer {
    type Output = CountryInfo;

    fn normalize(&self, payload: Value) -> Result<CountryInfo, NormalizeError> {
        // Ambiguous names return several candidates; the first one wins.
        let first = match payload {
            Value::Array(candidates) => candidates.into_iter().next().ok_or(NormalizeError::Empty)?,
            _ => return Err(NormalizeError::Empty),
        };

        let raw: RcCountry =
            serde_json::from_value(first).map_err(|e| NormalizeError::Malformed(e.to_string()))?;

        Ok(raw.into())
    }
}

/// Deserializes the payload as-is, no defaults applied.
pub struct PassThrough<T> {
    _output: PhantomData<fn() -> T>,
}

impl<T> PassThrough<T> {
    pub fn new() -> Self {
        Self { _output: PhantomData }
    }
}

impl<T> Default for PassThrough<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for PassThrough<T> {
    fn clone(&self) -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for PassThrough<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PassThrough<{}>", std::any::type_name::<T>())
    }
}

impl<T: DeserializeOwned> Normalizer for PassThrough<T> {
    type Output = T;

    fn normalize(&self, payload: Value) -> Result<T, NormalizeError> {
        serde_json::from_value(payload).map_err(|e| NormalizeError::Malformed(e.to_string()))
    }
}

// REST Countries v3.1 shape. `null` and absent both land as `None`.

#[derive(Debug, Deserialize)]
struct RcCountry {
    name: Option<RcName>,
    capital: Option<Vec<String>>,
    population: Option<u64>,
    area: Option<f64>,
    region: Option<String>,
    subregion: Option<String>,
    languages: Option<BTreeMap<String, String>>,
    currencies: Option<BTreeMap<String, RcCurrency>>,
    flag: Option<String>,
    #[serde(rename = "coatOfArms")]
    coat_of_arms: Option<RcCoatOfArms>,
}

#[derive(Debug, Deserialize)]
struct RcName {
    common: Option<String>,
    official: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RcCurrency {
    name: Option<String>,
    symbol: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RcCoatOfArms {
    png: Option<String>,
    svg: Option<String>,
}

impl From<RcCountry> for CountryInfo {
    fn from(raw: RcCountry) -> Self {
        let name = raw
            .name
            .map(|n| CountryName {
                common: n.common.unwrap_or_default(),
                official: n.official.unwrap_or_default(),
            })
            .unwrap_or_default();

        let currencies = raw
            .currencies
            .unwrap_or_default()
            .into_iter()
            .map(|(code, c)| {
                let currency = Currency {
                    name: c.name.unwrap_or_default(),
                    symbol: c.symbol.unwrap_or_default(),
                };
                (code, currency)
            })
            .collect();

        let coat_of_arms = raw
            .coat_of_arms
            .map(|c| CoatOfArms {
                png: c.png.unwrap_or_default(),
                svg: c.svg.unwrap_or_default(),
            })
            .unwrap_or_default();

        CountryInfo {
            name,
            capital: raw.capital.unwrap_or_default(),
            population: raw.population.unwrap_or_default(),
            area: raw.area.unwrap_or_default(),
            region: raw.region.unwrap_or_default(),
            subregion: raw.subregion.unwrap_or_default(),
            languages: raw.languages.unwrap_or_default(),
            currencies,
            flag: raw.flag.unwrap_or_default(),
            coat_of_arms,
        }
    }
}
