//! Current weather at a site.

use async_trait::async_trait;
use serde::Serialize;

use crate::WeatherError;

pub const UNKNOWN_WEATHER: &str = "Unknown weather";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Weather {
    /// Degrees Celsius.
    pub temperature: f64,
    /// Relative humidity, percent.
    pub humidity: f64,
    pub description: String,
}

impl Default for Weather {
    fn default() -> Self {
        Weather {
            temperature: 0.0,
            humidity: 0.0,
            description: UNKNOWN_WEATHER.to_string(),
        }
    }
}

impl Weather {
    /// Build from raw readings: values rounded to three decimals, code described.
    pub fn from_readings(temperature: f64, humidity: f64, code: Option<i64>) -> Self {
        Weather {
            temperature: round3(temperature),
            humidity: round3(humidity),
            description: code.map_or(UNKNOWN_WEATHER, describe).to_string(),
        }
    }
}

fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

/// Description of a WMO weather interpretation code.
pub fn describe(code: i64) -> &'static str {
    match code {
        0 => "Clear sky",
        1 => "Mainly clear",
        2 => "Partly cloudy",
        3 => "Overcast",
        45 => "Foggy",
        48 => "Depositing rime fog",
        51 => "Light Drizzle",
        53 => "Moderate Drizzle",
        55 => "Dense Drizzle",
        56 => "Light Freezing Drizzle",
        57 => "Dense Freezing Drizzle",
        61 => "Slight Rain",
        63 => "Moderate Rain",
        65 => "Heavy Rain",
        66 => "Light Freezing Rain",
        67 => "Heavy Freezing Rain",
        71 => "Slight Snow fall",
        73 => "Moderate Snow fall",
        75 => "Heavy Snow fall",
        77 => "Snow grains",
        80 => "Slight Rain showers",
        81 => "Moderate Rain showers",
        82 => "Violent Rain showers",
        85 => "Slight snow showers",
        86 => "Heavy snow showers",
        95 => "Thunderstorm with slight hail",
        96 => "Thunderstorm with hail",
        99 => "Thunderstorm with heavy hail",
        _ => UNKNOWN_WEATHER,
    }
}

#[async_trait]
pub trait WeatherProvider: Send + Sync {
    async fn current(&self, latitude: f64, longitude: f64) -> Result<Weather, WeatherError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use facet_testhelpers::test;

    #[test]
    fn describes_known_codes() {
        let described: Vec<_> = [0, 3, 45, 63, 99, 100].into_iter().map(describe).collect();
        insta::assert_snapshot!(described.join("\n"), @r"
        Clear sky
        Overcast
        Foggy
        Moderate Rain
        Thunderstorm with heavy hail
        Unknown weather
        ");
    }

    #[test]
    fn readings_are_rounded() {
        let weather = Weather::from_readings(21.123456, 54.9996, Some(2));
        assert_eq!(weather.temperature, 21.123);
        assert_eq!(weather.humidity, 55.0);
        assert_eq!(weather.description, "Partly cloudy");
    }

    #[test]
    fn missing_code_is_unknown() {
        assert_eq!(Weather::from_readings(0.0, 0.0, None), Weather::default());
    }
}
