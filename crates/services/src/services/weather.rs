//! Site weather from the public Open-Meteo forecast API, cached per location.

use std::time::Duration;

use chrono::NaiveDate;
use moka::future::Cache;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};
use ts_rs::TS;

const THUNDERSTORM_CODES: [u16; 3] = [95, 96, 99];
const RAIN_LIMIT_PCT: u8 = 70;
const WIND_LIMIT_KMH: f64 = 50.0;
const FORECAST_DAYS: &str = "7";

#[derive(Debug, Clone, Error)]
pub enum WeatherError {
    #[error("invalid coordinates: {lat}, {lon}")]
    InvalidCoordinates { lat: f64, lon: f64 },
    #[error("network error: {0}")]
    Transport(String),
    #[error("timeout")]
    Timeout,
    #[error("http {status}: {body}")]
    Http { status: u16, body: String },
    #[error("unexpected forecast payload: {0}")]
    Parse(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
pub struct CurrentWeather {
    pub time: String,
    pub temperature_c: f64,
    pub humidity_pct: Option<f64>,
    pub wind_kmh: Option<f64>,
    pub weather_code: u16,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
pub struct DailyForecast {
    pub date: NaiveDate,
    pub max_c: Option<f64>,
    pub min_c: Option<f64>,
    pub precipitation_probability: Option<u8>,
    pub wind_max_kmh: Option<f64>,
    pub weather_code: u16,
    pub description: String,
    pub work_safe: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
pub struct Forecast {
    pub latitude: f64,
    pub longitude: f64,
    pub current: CurrentWeather,
    pub days: Vec<DailyForecast>,
}

#[derive(Debug, Deserialize)]
struct RawForecast {
    latitude: f64,
    longitude: f64,
    current: RawCurrent,
    daily: RawDaily,
}

#[derive(Debug, Deserialize)]
struct RawCurrent {
    time: String,
    temperature_2m: f64,
    relative_humidity_2m: Option<f64>,
    wind_speed_10m: Option<f64>,
    weather_code: u16,
}

#[derive(Debug, Deserialize)]
struct RawDaily {
    time: Vec<NaiveDate>,
    #[serde(default)]
    temperature_2m_max: Vec<Option<f64>>,
    #[serde(default)]
    temperature_2m_min: Vec<Option<f64>>,
    #[serde(default)]
    precipitation_probability_max: Vec<Option<f64>>,
    #[serde(default)]
    wind_speed_10m_max: Vec<Option<f64>>,
    #[serde(default)]
    weather_code: Vec<Option<u16>>,
}

/// Spanish description of a WMO weather interpretation code.
pub fn describe_weather_code(code: u16) -> &'static str {
    match code {
        0 => "Despejado",
        1 => "Mayormente despejado",
        2 => "Parcialmente nublado",
        3 => "Nublado",
        45 | 48 => "Niebla",
        51 | 53 | 55 => "Llovizna",
        56 | 57 => "Llovizna helada",
        61 => "Lluvia ligera",
        63 => "Lluvia moderada",
        65 => "Lluvia intensa",
        66 | 67 => "Lluvia helada",
        71 | 73 | 75 => "Nevada",
        77 => "Granizo fino",
        80 | 81 | 82 => "Chubascos",
        85 | 86 => "Chubascos de nieve",
        95 => "Tormenta eléctrica",
        96 | 99 => "Tormenta con granizo",
        _ => "Desconocido",
    }
}

/// Outdoor work is unsafe with thunderstorms, a likely downpour or strong wind.
pub fn is_work_safe(day: &DailyForecast) -> bool {
    !THUNDERSTORM_CODES.contains(&day.weather_code)
        && day.precipitation_probability.is_none_or(|p| p < RAIN_LIMIT_PCT)
        && day.wind_max_kmh.is_none_or(|w| w < WIND_LIMIT_KMH)
}

/// Parses an Open-Meteo forecast body.
pub fn parse_forecast(body: &str) -> Result<Forecast, WeatherError> {
    let raw: RawForecast =
        serde_json::from_str(body).map_err(|e| WeatherError::Parse(e.to_string()))?;

    let at = |values: &[Option<f64>], i: usize| values.get(i).copied().flatten();
    let days = raw
        .daily
        .time
        .iter()
        .enumerate()
        .map(|(i, date)| {
            let weather_code = raw.daily.weather_code.get(i).copied().flatten().unwrap_or(0);
            let mut day = DailyForecast {
                date: *date,
                max_c: at(&raw.daily.temperature_2m_max, i),
                min_c: at(&raw.daily.temperature_2m_min, i),
                precipitation_probability: at(&raw.daily.precipitation_probability_max, i)
                    .map(|p| p.clamp(0.0, 100.0).round() as u8),
                wind_max_kmh: at(&raw.daily.wind_speed_10m_max, i),
                weather_code,
                description: describe_weather_code(weather_code).to_string(),
                work_safe: true,
            };
            day.work_safe = is_work_safe(&day);
            day
        })
        .collect();

    Ok(Forecast {
        latitude: raw.latitude,
        longitude: raw.longitude,
        current: CurrentWeather {
            time: raw.current.time,
            temperature_c: raw.current.temperature_2m,
            humidity_pct: raw.current.relative_humidity_2m,
            wind_kmh: raw.current.wind_speed_10m,
            weather_code: raw.current.weather_code,
            description: describe_weather_code(raw.current.weather_code).to_string(),
        },
        days,
    })
}

/// Cache key: coordinates rounded to two decimals (about 1 km).
pub fn cache_key(lat: f64, lon: f64) -> (i32, i32) {
    ((lat * 100.0).round() as i32, (lon * 100.0).round() as i32)
}

fn validate(lat: f64, lon: f64) -> Result<(), WeatherError> {
    let ok = lat.is_finite() && lon.is_finite() && (-90.0..=90.0).contains(&lat) && (-180.0..=180.0).contains(&lon);
    if ok {
        Ok(())
    } else {
        Err(WeatherError::InvalidCoordinates { lat, lon })
    }
}

#[derive(Clone)]
pub struct WeatherService {
    http: Client,
    base_url: String,
    cache: Cache<(i32, i32), Forecast>,
}

impl WeatherService {
    const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

    pub fn new(base_url: impl Into<String>, ttl: Duration) -> Result<Self, WeatherError> {
        let http = Client::builder()
            .timeout(Self::REQUEST_TIMEOUT)
            .user_agent(concat!("obra/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| WeatherError::Transport(e.to_string()))?;

        Ok(Self {
            http,
            base_url: base_url.into(),
            cache: Cache::builder().max_capacity(512).time_to_live(ttl).build(),
        })
    }

    /// Cached forecast for the given site.
    pub async fn forecast(&self, lat: f64, lon: f64) -> Result<Forecast, WeatherError> {
        validate(lat, lon)?;
        let key = cache_key(lat, lon);
        self.cache
            .try_get_with(key, async {
                debug!(lat, lon, "Fetching forecast");
                self.fetch(key.0 as f64 / 100.0, key.1 as f64 / 100.0).await
            })
            .await
            .map_err(|e| {
                warn!(lat, lon, error = %e, "Weather lookup failed");
                (*e).clone()
            })
    }

    async fn fetch(&self, lat: f64, lon: f64) -> Result<Forecast, WeatherError> {
        let res = self
            .http
            .get(&self.base_url)
            .query(&[
                ("latitude", lat.to_string()),
                ("longitude", lon.to_string()),
                (
                    "current",
                    "temperature_2m,relative_humidity_2m,wind_speed_10m,weather_code".into(),
                ),
                (
                    "daily",
                    "temperature_2m_max,temperature_2m_min,precipitation_probability_max,wind_speed_10m_max,weather_code".into(),
                ),
                ("timezone", "auto".into()),
                ("forecast_days", FORECAST_DAYS.into()),
            ])
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = res.status();
        let body = res.text().await.map_err(map_reqwest_error)?;
        if !status.is_success() {
            return Err(WeatherError::Http {
                status: status.as_u16(),
                body,
            });
        }
        parse_forecast(&body)
    }
}

fn map_reqwest_error(e: reqwest::Error) -> WeatherError {
    if e.is_timeout() {
        WeatherError::Timeout
    } else {
        WeatherError::Transport(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "latitude": 19.43,
        "longitude": -99.13,
        "timezone": "America/Mexico_City",
        "current": {
            "time": "2026-10-16T12:00",
            "temperature_2m": 22.4,
            "relative_humidity_2m": 48,
            "wind_speed_10m": 11.2,
            "weather_code": 2
        },
        "daily": {
            "time": ["2026-10-16", "2026-10-17", "2026-10-18", "2026-10-19"],
            "temperature_2m_max": [24.0, 21.5, 19.0, null],
            "temperature_2m_min": [11.0, 12.0, 13.5, null],
            "precipitation_probability_max": [10, 85, 20, null],
            "wind_speed_10m_max": [15.0, 20.0, 55.3, null],
            "weather_code": [1, 63, 3, 95]
        }
    }"#;

    #[test]
    fn parses_current_and_daily() {
        let forecast = parse_forecast(SAMPLE).unwrap();
        assert_eq!(forecast.current.description, "Parcialmente nublado");
        assert_eq!(forecast.current.humidity_pct, Some(48.0));
        assert_eq!(forecast.days.len(), 4);
        assert_eq!(forecast.days[1].precipitation_probability, Some(85));
        assert_eq!(forecast.days[3].max_c, None);
    }

    #[test]
    fn flags_unsafe_days() {
        let forecast = parse_forecast(SAMPLE).unwrap();
        let flags: Vec<bool> = forecast.days.iter().map(|d| d.work_safe).collect();
        // rain 85 %, wind 55 km/h, thunderstorm
        assert_eq!(flags, vec![true, false, false, false]);
    }

    #[test]
    fn describes_codes_in_spanish() {
        assert_eq!(describe_weather_code(0), "Despejado");
        assert_eq!(describe_weather_code(65), "Lluvia intensa");
        assert_eq!(describe_weather_code(99), "Tormenta con granizo");
        assert_eq!(describe_weather_code(42), "Desconocido");
    }

    #[test]
    fn cache_key_rounds_to_two_decimals() {
        assert_eq!(cache_key(19.43261, -99.13321), cache_key(19.4349, -99.1301));
        assert_ne!(cache_key(19.43, -99.13), cache_key(19.44, -99.13));
    }

    #[test]
    fn garbage_is_a_parse_error() {
        assert!(matches!(parse_forecast("<html>"), Err(WeatherError::Parse(_))));
    }

    #[tokio::test]
    async fn out_of_range_coordinates_rejected_before_fetch() {
        let service = WeatherService::new("http://127.0.0.1:9", Duration::from_secs(60)).unwrap();
        let err = service.forecast(123.0, 0.0).await.unwrap_err();
        assert!(matches!(err, WeatherError::InvalidCoordinates { .. }));
    }
}
