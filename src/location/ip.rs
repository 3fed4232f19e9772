use std::time::Duration;

use log::{info, warn};
use reqwest::Client;
use serde::Deserialize;

use crate::location::error::LocationError;
use crate::retry::{get_with_retry, RetryPolicy};
use crate::types::location::LocationRecord;

pub const DEFAULT_IP_ENDPOINT: &str = "https://ipinfo.io/json";

/// Configuration for the IP geolocation lookup.
#[derive(Debug, Clone)]
pub struct IpLookupConfig {
    pub endpoint: String,
    pub request_timeout: Duration,
    pub retry: RetryPolicy,
}

impl Default for IpLookupConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_IP_ENDPOINT.to_string(),
            request_timeout: Duration::from_secs(10),
            retry: RetryPolicy::default(),
        }
    }
}

/// Response shape of the ipinfo endpoint. All fields are optional on the
/// wire; completeness is checked after decoding so the error can name every
/// missing field at once.
#[derive(Debug, Deserialize)]
struct IpInfoResponse {
    city: Option<String>,
    postal: Option<String>,
    loc: Option<String>,
}

/// Client for the public IP geolocation endpoint (resolver tier 3).
pub struct IpLookup {
    client: Client,
    config: IpLookupConfig,
}

impl IpLookup {
    pub fn new(client: Client, config: IpLookupConfig) -> Self {
        Self { client, config }
    }

    /// Fetches the caller's location from the IP geolocation endpoint.
    ///
    /// Requires `city`, `postal` and a `loc` field that splits into exactly
    /// two parseable floats on a comma; anything less is discarded as
    /// invalid.
    pub async fn fetch(&self) -> Result<LocationRecord, LocationError> {
        info!("fetching location from IP geolocation endpoint");
        const NO_QUERY: [(&str, &str); 0] = [];
        let response = get_with_retry(
            &self.client,
            &self.config.endpoint,
            &NO_QUERY,
            self.config.request_timeout,
            &self.config.retry,
        )
        .await?;

        let info: IpInfoResponse = response.json().await.map_err(LocationError::IpDecode)?;

        let mut missing = Vec::new();
        if info.city.is_none() {
            missing.push("city");
        }
        if info.postal.is_none() {
            missing.push("postal");
        }
        if info.loc.is_none() {
            missing.push("loc");
        }
        if !missing.is_empty() {
            warn!("incomplete location info from IP endpoint, missing: {missing:?}");
            return Err(LocationError::IpIncomplete { missing });
        }

        // Completeness was just checked; destructure without unwrap.
        let (Some(city), Some(postal), Some(loc)) = (info.city, info.postal, info.loc) else {
            return Err(LocationError::IpIncomplete { missing: Vec::new() });
        };

        let (latitude, longitude) = parse_loc(&loc)?;
        info!("location fetched from IP: {city}, {postal}, {latitude}, {longitude}");
        Ok(LocationRecord {
            city: Some(city),
            postal,
            latitude,
            longitude,
        })
    }
}

/// Splits a `"lat,lon"` string into two floats.
fn parse_loc(loc: &str) -> Result<(f64, f64), LocationError> {
    let invalid = || LocationError::CoordinateParse {
        loc: loc.to_string(),
    };
    let mut parts = loc.split(',');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(lat), Some(lon), None) => {
            let latitude = lat.trim().parse::<f64>().map_err(|_| invalid())?;
            let longitude = lon.trim().parse::<f64>().map_err(|_| invalid())?;
            Ok((latitude, longitude))
        }
        _ => Err(invalid()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn lookup_for(server: &MockServer) -> IpLookup {
        IpLookup::new(
            Client::new(),
            IpLookupConfig {
                endpoint: server.uri(),
                request_timeout: Duration::from_secs(5),
                retry: RetryPolicy {
                    max_attempts: 1,
                    initial_backoff: Duration::from_millis(1),
                },
            },
        )
    }

    #[test]
    fn parses_coordinate_pair_with_whitespace() {
        assert_eq!(parse_loc("52.52, 13.405").unwrap(), (52.52, 13.405));
    }

    #[test]
    fn rejects_malformed_coordinates() {
        assert!(parse_loc("invalid,coord").is_err());
        assert!(parse_loc("52.52").is_err());
        assert!(parse_loc("52.52,13.405,7").is_err());
        assert!(parse_loc("").is_err());
    }

    #[tokio::test]
    async fn complete_response_yields_record() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "city": "Berlin",
                "postal": "10115",
                "loc": "52.52,13.405"
            })))
            .mount(&server)
            .await;

        let record = lookup_for(&server).fetch().await.unwrap();
        assert_eq!(record.city.as_deref(), Some("Berlin"));
        assert_eq!(record.postal, "10115");
        assert_eq!(record.latitude, 52.52);
        assert_eq!(record.longitude, 13.405);
    }

    #[tokio::test]
    async fn incomplete_response_names_missing_fields() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"city": "Berlin"})),
            )
            .mount(&server)
            .await;

        let error = lookup_for(&server).fetch().await.unwrap_err();
        match error {
            LocationError::IpIncomplete { missing } => {
                assert_eq!(missing, vec!["postal", "loc"]);
            }
            other => panic!("expected IpIncomplete, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn unparseable_loc_is_discarded() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "city": "Berlin",
                "postal": "10115",
                "loc": "invalid,coord"
            })))
            .mount(&server)
            .await;

        let error = lookup_for(&server).fetch().await.unwrap_err();
        assert!(matches!(error, LocationError::CoordinateParse { .. }));
    }
}
