//! Degrees-minutes-seconds coordinates and address resolution.
//!
//! Sites are entered with DMS strings such as `45°30'06.1"N`. We store the
//! original strings next to the decimal degrees derived from them, plus the
//! best address a reverse geocoder could find.

use std::fmt;

use async_trait::async_trait;
use thiserror::Error;

use crate::{CoordinateError, GeocodeError};

/// Address stored when no geocoder is configured or it found nothing.
pub const UNKNOWN_ADDRESS: &str = "Unknown address";

/// Decimal precision of stored coordinates (six places, about 11cm).
const DECIMAL_SCALE: f64 = 1_000_000.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    Latitude,
    Longitude,
}

impl Axis {
    fn positive(&self) -> char {
        match self {
            Axis::Latitude => 'N',
            Axis::Longitude => 'E',
        }
    }

    fn negative(&self) -> char {
        match self {
            Axis::Latitude => 'S',
            Axis::Longitude => 'W',
        }
    }

    fn name(&self) -> &'static str {
        match self {
            Axis::Latitude => "latitude",
            Axis::Longitude => "longitude",
        }
    }
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Convert a DMS string to signed decimal degrees.
///
/// The string is split on `°`, `'` and `"` into degrees, minutes, seconds and
/// a hemisphere letter. South and West negate the value.
pub fn dms_to_decimal(dms: &str, axis: Axis) -> Result<f64, CoordinateError> {
    let tokens: Vec<&str> = dms.split(['°', '\'', '"']).map(str::trim).collect();
    let [degrees, minutes, seconds, hemisphere] = tokens.as_slice() else {
        return Err(CoordinateError::MissingComponent {
            input: dms.to_string(),
        });
    };

    let degrees = parse_component("degrees", degrees)?;
    let minutes = parse_component("minutes", minutes)?;
    let seconds = parse_component("seconds", seconds)?;

    let mut letters = hemisphere.chars();
    let sign = match (letters.next().map(|c| c.to_ascii_uppercase()), letters.next()) {
        (Some(c), None) if c == axis.positive() => 1.0,
        (Some(c), None) if c == axis.negative() => -1.0,
        _ => {
            return Err(CoordinateError::InvalidHemisphere {
                hemisphere: hemisphere.to_string(),
                axis: axis.name(),
            });
        }
    };

    Ok(sign * (degrees + minutes / 60.0 + seconds / 3600.0))
}

fn parse_component(component: &'static str, value: &str) -> Result<f64, CoordinateError> {
    match value.parse::<f64>() {
        Ok(parsed) if parsed.is_finite() && parsed >= 0.0 => Ok(parsed),
        _ => Err(CoordinateError::InvalidNumber {
            component,
            value: value.to_string(),
        }),
    }
}

/// Render decimal degrees as `{deg}°{min}'{sec}"{hemisphere}`, seconds to a tenth.
pub fn decimal_to_dms(decimal: f64, axis: Axis) -> String {
    let hemisphere = if decimal < 0.0 {
        axis.negative()
    } else {
        axis.positive()
    };

    // Work in tenths of a second so rounding can carry into minutes and degrees.
    let tenths = (decimal.abs() * 36_000.0).round() as u64;
    let degrees = tenths / 36_000;
    let minutes = (tenths % 36_000) / 600;
    let seconds = (tenths % 600) as f64 / 10.0;

    format!("{degrees}°{minutes:02}'{seconds:04.1}\"{hemisphere}")
}

fn round_decimal(value: f64) -> f64 {
    (value * DECIMAL_SCALE).round() / DECIMAL_SCALE
}

/// Reverse geocoding collaborator.
#[async_trait]
pub trait Geocoder: Send + Sync {
    /// Formatted addresses near the given point, in any order.
    async fn reverse(&self, latitude: f64, longitude: f64) -> Result<Vec<String>, GeocodeError>;
}

/// Geocoder used when no API key is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledGeocoder;

#[async_trait]
impl Geocoder for DisabledGeocoder {
    async fn reverse(&self, _latitude: f64, _longitude: f64) -> Result<Vec<String>, GeocodeError> {
        Ok(Vec::new())
    }
}

/// Keep the most specific address, which in practice is the longest one.
///
/// Ties go to the earliest candidate.
pub fn pick_address(candidates: impl IntoIterator<Item = String>) -> String {
    candidates
        .into_iter()
        .reduce(|best, candidate| {
            if candidate.chars().count() > best.chars().count() {
                candidate
            } else {
                best
            }
        })
        .unwrap_or_else(|| UNKNOWN_ADDRESS.to_string())
}

#[derive(Debug, Error)]
pub enum NormalizeError {
    #[error("invalid latitude: {0}")]
    Latitude(#[source] CoordinateError),

    #[error("invalid longitude: {0}")]
    Longitude(#[source] CoordinateError),

    #[error(transparent)]
    Geocode(#[from] GeocodeError),
}

/// A normalized coordinate, ready to be stored.
#[derive(Debug, Clone, PartialEq)]
pub struct Coordinate {
    pub dms_latitude: String,
    pub dms_longitude: String,
    pub dd_latitude: f64,
    pub dd_longitude: f64,
    pub address: String,
}

impl Coordinate {
    /// Parse both DMS strings and resolve an address through `geocoder`.
    pub async fn from_dms(
        dms_latitude: &str,
        dms_longitude: &str,
        geocoder: &dyn Geocoder,
    ) -> Result<Coordinate, NormalizeError> {
        let mut coordinate = Coordinate::with_address(dms_latitude, dms_longitude, UNKNOWN_ADDRESS)?;
        let candidates = geocoder
            .reverse(coordinate.dd_latitude, coordinate.dd_longitude)
            .await?;
        coordinate.address = pick_address(candidates);
        tracing::debug!(
            dd_latitude = coordinate.dd_latitude,
            dd_longitude = coordinate.dd_longitude,
            address = %coordinate.address,
            "normalized coordinate"
        );
        Ok(coordinate)
    }

    /// Parse both DMS strings, keeping a known address.
    pub fn with_address(
        dms_latitude: &str,
        dms_longitude: &str,
        address: &str,
    ) -> Result<Coordinate, NormalizeError> {
        let dd_latitude = round_decimal(
            dms_to_decimal(dms_latitude, Axis::Latitude).map_err(NormalizeError::Latitude)?,
        );
        let dd_longitude = round_decimal(
            dms_to_decimal(dms_longitude, Axis::Longitude).map_err(NormalizeError::Longitude)?,
        );
        Ok(Coordinate {
            dms_latitude: dms_latitude.to_string(),
            dms_longitude: dms_longitude.to_string(),
            dd_latitude,
            dd_longitude,
            address: address.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn close(a: f64, b: f64, tolerance: f64) -> bool {
        (a - b).abs() < tolerance
    }

    #[test]
    fn converts_montreal() {
        let lat = dms_to_decimal("45°30'06.1\"N", Axis::Latitude).unwrap();
        let lon = dms_to_decimal("73°34'02.3\"W", Axis::Longitude).unwrap();
        assert!(close(lat, 45.5017, 1e-4), "{lat}");
        assert!(close(lon, -73.5673, 1e-4), "{lon}");
    }

    #[test]
    fn hemisphere_decides_sign() {
        let north = dms_to_decimal("10°00'00.0\"N", Axis::Latitude).unwrap();
        let south = dms_to_decimal("10°00'00.0\"S", Axis::Latitude).unwrap();
        let east = dms_to_decimal("10°00'00.0\"E", Axis::Longitude).unwrap();
        let west = dms_to_decimal("10°00'00.0\"W", Axis::Longitude).unwrap();
        assert_eq!(north, 10.0);
        assert_eq!(south, -10.0);
        assert_eq!(east, 10.0);
        assert_eq!(west, -10.0);
    }

    #[test]
    fn rejects_malformed_input() {
        assert!(matches!(
            dms_to_decimal("45.5017", Axis::Latitude),
            Err(CoordinateError::MissingComponent { .. })
        ));
        assert!(matches!(
            dms_to_decimal("45°3a'06.1\"N", Axis::Latitude),
            Err(CoordinateError::InvalidNumber {
                component: "minutes",
                ..
            })
        ));
        assert!(matches!(
            dms_to_decimal("45°30'06.1\"", Axis::Latitude),
            Err(CoordinateError::InvalidHemisphere { .. })
        ));
    }

    #[test]
    fn hemisphere_must_match_axis() {
        assert!(matches!(
            dms_to_decimal("45°30'06.1\"E", Axis::Latitude),
            Err(CoordinateError::InvalidHemisphere { axis: "latitude", .. })
        ));
        assert!(dms_to_decimal("73°34'02.3\"N", Axis::Longitude).is_err());
    }

    #[test]
    fn formats_dms() {
        insta::assert_snapshot!(decimal_to_dms(45.5017, Axis::Latitude), @r#"45°30'06.1"N"#);
        insta::assert_snapshot!(decimal_to_dms(-73.5673, Axis::Longitude), @r#"73°34'02.3"W"#);
    }

    #[test]
    fn formatting_carries_rounded_seconds() {
        // 59.99 seconds rounds up to the next minute
        let value = 10.0 + 59.0 / 60.0 + 59.99 / 3600.0;
        assert_eq!(decimal_to_dms(value, Axis::Latitude), "11°00'00.0\"N");
    }

    #[test]
    fn longest_address_wins() {
        let picked = pick_address(vec![
            "Montréal, QC, Canada".to_string(),
            "1 Rue Sainte-Catherine, Montréal, QC H2X 1K4, Canada".to_string(),
            "Canada".to_string(),
        ]);
        assert_eq!(picked, "1 Rue Sainte-Catherine, Montréal, QC H2X 1K4, Canada");
        assert_eq!(pick_address(Vec::new()), UNKNOWN_ADDRESS);
    }

    struct FixedGeocoder(Vec<&'static str>);

    #[async_trait]
    impl Geocoder for FixedGeocoder {
        async fn reverse(&self, _lat: f64, _lon: f64) -> Result<Vec<String>, GeocodeError> {
            Ok(self.0.iter().map(|s| s.to_string()).collect())
        }
    }

    #[tokio::test]
    async fn from_dms_uses_geocoder() {
        let geocoder = FixedGeocoder(vec!["Québec", "Québec City, QC, Canada"]);
        let coordinate = Coordinate::from_dms("46°48'47.0\"N", "71°12'29.0\"W", &geocoder)
            .await
            .unwrap();
        assert_eq!(coordinate.address, "Québec City, QC, Canada");
        assert!(coordinate.dd_longitude < 0.0);
        assert_eq!(coordinate.dms_latitude, "46°48'47.0\"N");
    }

    #[tokio::test]
    async fn from_dms_without_geocoder_uses_placeholder() {
        let coordinate = Coordinate::from_dms("45°30'06.1\"N", "73°34'02.3\"W", &DisabledGeocoder)
            .await
            .unwrap();
        assert_eq!(coordinate.address, UNKNOWN_ADDRESS);
        assert_eq!(coordinate.dd_latitude, 45.501694);
    }

    #[tokio::test]
    async fn from_dms_reports_failing_axis() {
        let err = Coordinate::from_dms("45°30'06.1\"N", "garbage", &DisabledGeocoder)
            .await
            .unwrap_err();
        assert!(matches!(err, NormalizeError::Longitude(_)));
    }

    proptest! {
        #[test]
        fn dms_round_trips(lat in -90.0f64..=90.0, lon in -180.0f64..=180.0) {
            let lat_back = dms_to_decimal(&decimal_to_dms(lat, Axis::Latitude), Axis::Latitude).unwrap();
            let lon_back = dms_to_decimal(&decimal_to_dms(lon, Axis::Longitude), Axis::Longitude).unwrap();
            // half a tenth of a second
            prop_assert!(close(lat, lat_back, 0.05 / 3600.0 + 1e-9));
            prop_assert!(close(lon, lon_back, 0.05 / 3600.0 + 1e-9));
        }

        #[test]
        fn hemispheres_are_symmetric(deg in 0u32..90, min in 0u32..60, sec in 0.0f64..59.9) {
            let north = dms_to_decimal(&format!("{deg}°{min}'{sec}\"N"), Axis::Latitude).unwrap();
            let south = dms_to_decimal(&format!("{deg}°{min}'{sec}\"S"), Axis::Latitude).unwrap();
            prop_assert_eq!(north, -south);
            prop_assert!(north >= 0.0);
        }
    }
}
