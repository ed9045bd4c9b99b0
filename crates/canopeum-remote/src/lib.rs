//! Network-backed implementations of the `canopeum` collaborator traits.
//!
//! - [`GoogleGeocoder`] reverse-geocodes coordinates with the Google Geocoding API
//! - [`OpenMeteo`] reads current conditions from Open-Meteo, with a per-point cache
//!
//! Both are built once at startup from the config and shared as trait objects.

use std::sync::Arc;
use std::time::Duration;

use canopeum::{DisabledGeocoder, Geocoder, WeatherProvider};
use canopeum_config::Config;

mod geocode;
mod weather;

pub use geocode::GoogleGeocoder;
pub use weather::{OpenMeteo, RetryPolicy};

/// Timeout for geocoding requests.
const GEOCODE_TIMEOUT: Duration = Duration::from_secs(10);

fn http_client(timeout: Duration) -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(concat!("canopeum/", env!("CARGO_PKG_VERSION")))
        .build()
}

/// The geocoder for this config: Google when an API key is set, otherwise one
/// that never finds an address.
pub fn geocoder(config: &Config) -> reqwest::Result<Arc<dyn Geocoder>> {
    match &config.geocoding.api_key {
        Some(key) if !key.is_empty() => {
            let client = http_client(GEOCODE_TIMEOUT)?;
            Ok(Arc::new(GoogleGeocoder::new(
                client,
                config.geocoding.base_url(),
                key,
            )))
        }
        _ => {
            tracing::warn!("no geocoding api key configured, addresses will be unknown");
            Ok(Arc::new(DisabledGeocoder))
        }
    }
}

pub fn weather_provider(config: &Config) -> reqwest::Result<Arc<dyn WeatherProvider>> {
    let weather = &config.weather;
    let client = http_client(Duration::from_secs(weather.timeout_secs()))?;
    Ok(Arc::new(OpenMeteo::new(
        client,
        weather.base_url(),
        Duration::from_secs(weather.cache_ttl_secs()),
        RetryPolicy {
            retries: weather.retries(),
            ..RetryPolicy::default()
        },
    )))
}
