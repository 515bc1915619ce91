use std::collections::BTreeMap;

use serde::{Deserialize, Serialize, Serializer};

/// Outcome of a single provider lookup: the record, or the failure shape
/// both providers share.
pub type ApiResult<T> = Result<T, ApiError>;

/// Normalized country record. Every field is always present; absent
/// upstream values are replaced by their defaults.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CountryInfo {
    pub name: CountryName,
    pub capital: Vec<String>,
    pub population: u64,
    pub area: f64,
    pub region: String,
    pub subregion: String,
    /// Language code -> language name, e.g. `"fra" -> "French"`.
    pub languages: BTreeMap<String, String>,
    /// Currency code -> currency, e.g. `"EUR" -> Euro / €`.
    pub currencies: BTreeMap<String, Currency>,
    pub flag: String,
    pub coat_of_arms: CoatOfArms,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CountryName {
    pub common: String,
    pub official: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Currency {
    pub name: String,
    pub symbol: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CoatOfArms {
    pub png: String,
    pub svg: String,
}

/// Current weather observation, kept in the upstream OpenWeather shape.
///
/// Fields the upstream sends that are not modelled here (`rain`, `snow`,
/// `main.sea_level`, ...) are carried verbatim in the `extra` map of the
/// object they appear in. Fields OpenWeather omits for some stations are
/// optional and stay absent when re-serialized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherInfo {
    pub coord: Coordinates,
    pub weather: Vec<WeatherCondition>,
    pub base: String,
    pub main: MainMeasurements,
    /// Metres.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visibility: Option<u32>,
    pub wind: Wind,
    pub clouds: Clouds,
    /// Observation time, unix seconds.
    pub dt: i64,
    pub sys: SystemInfo,
    /// Shift from UTC in seconds.
    pub timezone: i64,
    pub id: i64,
    pub name: String,
    pub cod: i64,
    #[serde(flatten)]
    pub extra: Extra,
}

/// Upstream fields without a typed counterpart.
pub type Extra = serde_json::Map<String, serde_json::Value>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lon: f64,
    pub lat: f64,
    #[serde(flatten)]
    pub extra: Extra,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherCondition {
    pub id: i64,
    pub main: String,
    pub description: String,
    pub icon: String,
    #[serde(flatten)]
    pub extra: Extra,
}

/// Temperatures are in Kelvin (the upstream default unit).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MainMeasurements {
    pub temp: f64,
    pub feels_like: f64,
    pub temp_min: f64,
    pub temp_max: f64,
    /// hPa
    pub pressure: u32,
    /// Percent.
    pub humidity: u32,
    #[serde(flatten)]
    pub extra: Extra,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Wind {
    /// m/s
    pub speed: f64,
    /// Degrees.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deg: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gust: Option<f64>,
    #[serde(flatten)]
    pub extra: Extra,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Clouds {
    pub all: u32,
    #[serde(flatten)]
    pub extra: Extra,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemInfo {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    /// ISO 3166 alpha-2 code.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sunrise: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sunset: Option<i64>,
    #[serde(flatten)]
    pub extra: Extra,
}

/// The single failure shape returned by every provider:
/// `{ "error": { "message": "...", "code": 404 } }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("{}", .error.message)]
pub struct ApiError {
    pub error: ApiErrorBody,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiErrorBody {
    pub message: String,
    /// Only set for failures that carry an upstream HTTP status.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<ErrorCode>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ErrorCode {
    Status(u16),
    Text(String),
}

impl From<u16> for ErrorCode {
    fn from(status: u16) -> Self {
        ErrorCode::Status(status)
    }
}

impl ApiError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            error: ApiErrorBody {
                message: message.into(),
                code: None,
            },
        }
    }

    pub fn with_code(message: impl Into<String>, code: impl Into<ErrorCode>) -> Self {
        Self {
            error: ApiErrorBody {
                message: message.into(),
                code: Some(code.into()),
            },
        }
    }

    pub fn message(&self) -> &str {
        &self.error.message
    }

    pub fn code(&self) -> Option<&ErrorCode> {
        self.error.code.as_ref()
    }
}

/// Serializes an [`ApiResult`] as either the record itself or the
/// `{ "error": ... }` object, never both.
pub fn serialize_outcome<T, S>(outcome: &ApiResult<T>, serializer: S) -> Result<S::Ok, S::Error>
where
    T: Serialize,
    S: Serializer,
{
    match outcome {
        Ok(value) => value.serialize(serializer),
        Err(err) => err.serialize(serializer),
    }
}
