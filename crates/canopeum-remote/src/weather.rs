use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use canopeum::{Weather, WeatherError, WeatherProvider};
use reqwest::StatusCode;
use serde::Deserialize;
use tokio::sync::RwLock;

const CURRENT_VARIABLES: &str = "temperature_2m,relative_humidity_2m,weathercode";

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Attempts after the first one.
    pub retries: u32,
    /// Delay before the first retry; doubled for each one after.
    pub base_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            retries: 5,
            base_backoff: Duration::from_millis(200),
        }
    }
}

impl RetryPolicy {
    fn backoff(&self, retry: u32) -> Duration {
        self.base_backoff
            .saturating_mul(2u32.saturating_pow(retry.saturating_sub(1)))
    }
}

/// Coordinates to a millionth of a degree, the precision sites are stored at.
type CacheKey = (i64, i64);

fn cache_key(latitude: f64, longitude: f64) -> CacheKey {
    (
        (latitude * 1_000_000.0).round() as i64,
        (longitude * 1_000_000.0).round() as i64,
    )
}

/// Current conditions from Open-Meteo, cached per coordinate.
pub struct OpenMeteo {
    client: reqwest::Client,
    base_url: String,
    ttl: Duration,
    retry: RetryPolicy,
    cache: RwLock<HashMap<CacheKey, (Instant, Weather)>>,
}

impl OpenMeteo {
    pub fn new(client: reqwest::Client, base_url: &str, ttl: Duration, retry: RetryPolicy) -> Self {
        OpenMeteo {
            client,
            base_url: base_url.to_string(),
            ttl,
            retry,
            cache: RwLock::new(HashMap::new()),
        }
    }

    async fn cached(&self, key: CacheKey, now: Instant) -> Option<Weather> {
        let cache = self.cache.read().await;
        cache
            .get(&key)
            .filter(|(stored, _)| now.duration_since(*stored) < self.ttl)
            .map(|(_, weather)| weather.clone())
    }

    async fn store(&self, key: CacheKey, now: Instant, weather: Weather) {
        let mut cache = self.cache.write().await;
        cache.retain(|_, (stored, _)| now.duration_since(*stored) < self.ttl);
        cache.insert(key, (now, weather));
    }

    async fn fetch(&self, latitude: f64, longitude: f64) -> Result<String, WeatherError> {
        let latitude = latitude.to_string();
        let longitude = longitude.to_string();
        let mut retry = 0;
        loop {
            let result = self
                .client
                .get(&self.base_url)
                .query(&[
                    ("latitude", latitude.as_str()),
                    ("longitude", longitude.as_str()),
                    ("current", CURRENT_VARIABLES),
                ])
                .send()
                .await;

            let error = match result {
                Ok(response) if response.status().is_success() => {
                    return response
                        .text()
                        .await
                        .map_err(|e| WeatherError::Transport(e.to_string()));
                }
                Ok(response) if !is_retryable(response.status()) => {
                    return Err(WeatherError::Transport(format!(
                        "open-meteo answered {}",
                        response.status()
                    )));
                }
                Ok(response) => format!("open-meteo answered {}", response.status()),
                Err(e) => e.to_string(),
            };

            if retry >= self.retry.retries {
                return Err(WeatherError::Transport(error));
            }
            retry += 1;
            let delay = self.retry.backoff(retry);
            tracing::debug!(retry, ?delay, %error, "retrying weather request");
            tokio::time::sleep(delay).await;
        }
    }
}

fn is_retryable(status: StatusCode) -> bool {
    status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS
}

#[derive(Debug, Deserialize)]
struct ForecastResponse {
    current: Option<CurrentConditions>,
}

#[derive(Debug, Deserialize)]
struct CurrentConditions {
    temperature_2m: Option<f64>,
    relative_humidity_2m: Option<f64>,
    weathercode: Option<f64>,
}

/// A missing reading falls back to its default; a missing `current` block is
/// an error.
fn parse_current(body: &str) -> Result<Weather, WeatherError> {
    let response: ForecastResponse =
        serde_json::from_str(body).map_err(|e| WeatherError::Transport(e.to_string()))?;
    let current = response
        .current
        .ok_or(WeatherError::MissingField("current"))?;
    Ok(Weather::from_readings(
        current.temperature_2m.unwrap_or_default(),
        current.relative_humidity_2m.unwrap_or_default(),
        current.weathercode.map(|code| code as i64),
    ))
}

#[async_trait]
impl WeatherProvider for OpenMeteo {
    async fn current(&self, latitude: f64, longitude: f64) -> Result<Weather, WeatherError> {
        let key = cache_key(latitude, longitude);
        if let Some(weather) = self.cached(key, Instant::now()).await {
            return Ok(weather);
        }

        let body = self.fetch(latitude, longitude).await?;
        let weather = parse_current(&body)?;
        tracing::debug!(latitude, longitude, description = %weather.description, "fetched weather");
        self.store(key, Instant::now(), weather.clone()).await;
        Ok(weather)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider(ttl: Duration) -> OpenMeteo {
        OpenMeteo::new(
            reqwest::Client::new(),
            "http://127.0.0.1:9/forecast",
            ttl,
            RetryPolicy {
                retries: 0,
                base_backoff: Duration::from_millis(1),
            },
        )
    }

    #[test]
    fn parses_current_block() {
        let body = r#"{
            "latitude": 45.5,
            "longitude": -73.56,
            "current": {
                "time": "2024-06-01T14:00",
                "interval": 900,
                "temperature_2m": 21.4567,
                "relative_humidity_2m": 48,
                "weathercode": 2
            }
        }"#;
        let weather = parse_current(body).unwrap();
        assert_eq!(weather.temperature, 21.457);
        assert_eq!(weather.humidity, 48.0);
        assert_eq!(weather.description, "Partly cloudy");
    }

    #[test]
    fn missing_current_block_is_an_error() {
        assert!(matches!(
            parse_current(r#"{"latitude": 0.0}"#),
            Err(WeatherError::MissingField("current"))
        ));
    }

    #[test]
    fn backoff_doubles() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.backoff(1), Duration::from_millis(200));
        assert_eq!(policy.backoff(2), Duration::from_millis(400));
        assert_eq!(policy.backoff(4), Duration::from_millis(1600));
    }

    #[test]
    fn only_server_trouble_is_retried() {
        assert!(is_retryable(StatusCode::BAD_GATEWAY));
        assert!(is_retryable(StatusCode::TOO_MANY_REQUESTS));
        assert!(!is_retryable(StatusCode::BAD_REQUEST));
    }

    #[tokio::test]
    async fn cache_expires_after_ttl() {
        let meteo = provider(Duration::from_secs(60));
        let key = cache_key(45.501694, -73.567306);
        let stored = Instant::now();
        meteo.store(key, stored, Weather::default()).await;

        assert_eq!(meteo.cached(key, stored).await, Some(Weather::default()));
        assert_eq!(meteo.cached(key, stored + Duration::from_secs(61)).await, None);
        assert_eq!(meteo.cached(cache_key(0.0, 0.0), stored).await, None);
    }

    #[tokio::test]
    async fn cached_reading_skips_the_network() {
        let meteo = provider(Duration::from_secs(60));
        let weather = Weather::from_readings(12.0, 80.0, Some(61));
        meteo
            .store(cache_key(46.0, -71.0), Instant::now(), weather.clone())
            .await;
        // The base url is unreachable, so only the cache can answer.
        assert_eq!(meteo.current(46.0, -71.0).await.unwrap(), weather);
    }
}
