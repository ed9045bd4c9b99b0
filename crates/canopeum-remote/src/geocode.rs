use async_trait::async_trait;
use canopeum::{GeocodeError, Geocoder};
use serde::Deserialize;

/// Result types worth showing as a site address.
const RESULT_TYPES: &str = "political|street_address";

/// Reverse geocoding through the Google Geocoding API.
pub struct GoogleGeocoder {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl GoogleGeocoder {
    pub fn new(client: reqwest::Client, base_url: &str, api_key: &str) -> Self {
        GoogleGeocoder {
            client,
            base_url: base_url.to_string(),
            api_key: api_key.to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct GeocodeResponse {
    status: String,
    #[serde(default)]
    error_message: Option<String>,
    #[serde(default)]
    results: Vec<GeocodeResult>,
}

#[derive(Debug, Deserialize)]
struct GeocodeResult {
    formatted_address: String,
}

/// Addresses from a response body. `ZERO_RESULTS` is an empty answer, any
/// other non-`OK` status is a service error.
fn parse_addresses(body: &str) -> Result<Vec<String>, GeocodeError> {
    let response: GeocodeResponse =
        serde_json::from_str(body).map_err(|e| GeocodeError::Decode(e.to_string()))?;
    match response.status.as_str() {
        "OK" => Ok(response
            .results
            .into_iter()
            .map(|r| r.formatted_address)
            .collect()),
        "ZERO_RESULTS" => Ok(Vec::new()),
        _ => Err(GeocodeError::Service {
            status: response.status,
            message: response.error_message.unwrap_or_default(),
        }),
    }
}

#[async_trait]
impl Geocoder for GoogleGeocoder {
    async fn reverse(&self, latitude: f64, longitude: f64) -> Result<Vec<String>, GeocodeError> {
        let latlng = format!("{latitude},{longitude}");
        let response = self
            .client
            .get(&self.base_url)
            .query(&[
                ("latlng", latlng.as_str()),
                ("result_type", RESULT_TYPES),
                ("key", self.api_key.as_str()),
            ])
            .send()
            .await
            .map_err(|e| GeocodeError::Transport(e.to_string()))?;

        let body = response
            .text()
            .await
            .map_err(|e| GeocodeError::Transport(e.to_string()))?;
        let addresses = parse_addresses(&body)?;
        tracing::debug!(latitude, longitude, results = addresses.len(), "reverse geocoded");
        Ok(addresses)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use facet_testhelpers::test;

    #[test]
    fn ok_response_lists_every_address() {
        let body = r#"{
            "status": "OK",
            "results": [
                {"formatted_address": "Montréal, QC, Canada", "types": ["locality", "political"]},
                {"formatted_address": "721 Av. Walker, Montréal, QC H4C 2H5, Canada"}
            ]
        }"#;
        assert_eq!(
            parse_addresses(body).unwrap(),
            vec![
                "Montréal, QC, Canada".to_string(),
                "721 Av. Walker, Montréal, QC H4C 2H5, Canada".to_string(),
            ]
        );
    }

    #[test]
    fn zero_results_is_empty() {
        let body = r#"{"status": "ZERO_RESULTS", "results": []}"#;
        assert!(parse_addresses(body).unwrap().is_empty());
    }

    #[test]
    fn denied_request_is_a_service_error() {
        let body = r#"{"status": "REQUEST_DENIED", "error_message": "The provided API key is invalid."}"#;
        let err = parse_addresses(body).unwrap_err();
        assert!(
            matches!(&err, GeocodeError::Service { status, message }
                if status == "REQUEST_DENIED" && message.contains("API key")),
            "{err:?}"
        );
    }

    #[test]
    fn garbage_is_a_decode_error() {
        assert!(matches!(
            parse_addresses("<html>"),
            Err(GeocodeError::Decode(_))
        ));
        assert!(matches!(
            parse_addresses(r#"{"results": []}"#),
            Err(GeocodeError::Decode(_))
        ));
    }
}
