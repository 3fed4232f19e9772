use std::path::PathBuf;

use log::{debug, info, warn};

use crate::location::error::LocationError;
use crate::location::ip::IpLookup;
use crate::settings::FixedLocation;
use crate::types::location::LocationRecord;
use crate::utils;

/// Resolves the pipeline's location from the first available source.
///
/// Priority chain: static settings, then the cache file on disk, then an
/// IP-based lookup. Each tier's failure is non-fatal and falls through; only
/// exhausting all three is a hard failure. A cache read never triggers a
/// network call, and a successful IP lookup persists its record to the cache
/// path before returning.
pub struct LocationResolver {
    fixed: Option<FixedLocation>,
    cache_path: PathBuf,
    ip: IpLookup,
}

impl LocationResolver {
    pub fn new(fixed: Option<FixedLocation>, cache_path: PathBuf, ip: IpLookup) -> Self {
        Self {
            fixed,
            cache_path,
            ip,
        }
    }

    pub async fn resolve(&self) -> Result<LocationRecord, LocationError> {
        if let Some(record) = self.fixed.as_ref().and_then(FixedLocation::as_record) {
            info!("location taken from settings");
            return Ok(record);
        }

        match self.read_cache().await {
            Ok(Some(record)) => {
                info!("using cached location from {}", self.cache_path.display());
                return Ok(record);
            }
            Ok(None) => {
                debug!("no location cache at {}", self.cache_path.display());
            }
            Err(e) => {
                warn!("ignoring unreadable location cache: {e}");
            }
        }

        info!("no settings or cached location, falling back to IP-based lookup");
        match self.ip.fetch().await {
            Ok(record) => {
                if let Err(e) = self.write_cache(&record).await {
                    warn!("failed to persist location cache: {e}");
                }
                Ok(record)
            }
            Err(e) => {
                warn!("IP-based location lookup failed: {e}");
                Err(LocationError::SourcesExhausted(Box::new(e)))
            }
        }
    }

    /// Reads the cache file, `Ok(None)` when it does not exist. Contents are
    /// returned as-is; no plausibility re-validation beyond the field
    /// contract enforced by deserialization.
    async fn read_cache(&self) -> Result<Option<LocationRecord>, LocationError> {
        match tokio::fs::read(&self.cache_path).await {
            Ok(bytes) => {
                let record = serde_json::from_slice(&bytes)
                    .map_err(|e| LocationError::CacheParse(self.cache_path.clone(), e))?;
                Ok(Some(record))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(LocationError::CacheRead(self.cache_path.clone(), e)),
        }
    }

    async fn write_cache(&self, record: &LocationRecord) -> Result<(), LocationError> {
        if let Some(parent) = self.cache_path.parent() {
            utils::ensure_dir_exists(parent)
                .await
                .map_err(|e| LocationError::CacheDirCreation(parent.to_path_buf(), e))?;
        }
        let bytes =
            serde_json::to_vec_pretty(record).map_err(LocationError::CacheSerialize)?;
        utils::write_atomic(&self.cache_path, bytes)
            .await
            .map_err(|e| LocationError::CacheWrite(self.cache_path.clone(), e))?;
        info!("location cache saved to {}", self.cache_path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::location::ip::IpLookupConfig;
    use crate::retry::RetryPolicy;
    use reqwest::Client;
    use serde_json::json;
    use std::time::Duration;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn ip_lookup(server: &MockServer) -> IpLookup {
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

    fn fixed_berlin() -> FixedLocation {
        FixedLocation {
            city: Some("Berlin".to_string()),
            postal: Some("10115".to_string()),
            latitude: Some(52.52),
            longitude: Some(13.405),
        }
    }

    #[tokio::test]
    async fn settings_tier_wins_without_any_network_call() {
        let server = MockServer::start().await;
        // Zero expected requests: the mock server panics on drop otherwise.
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .expect(0)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let resolver = LocationResolver::new(
            Some(fixed_berlin()),
            dir.path().join("location.json"),
            ip_lookup(&server),
        );
        let record = resolver.resolve().await.unwrap();
        assert_eq!(record.postal, "10115");
        assert_eq!(record.city.as_deref(), Some("Berlin"));
    }

    #[tokio::test]
    async fn incomplete_settings_fall_through_to_cache() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .expect(0)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let cache_path = dir.path().join("location.json");
        tokio::fs::write(
            &cache_path,
            json!({"city": "Hamburg", "postal": "20095", "latitude": 53.55, "longitude": 10.0})
                .to_string(),
        )
        .await
        .unwrap();

        let partial = FixedLocation {
            latitude: Some(52.52),
            ..FixedLocation::default()
        };
        let resolver = LocationResolver::new(Some(partial), cache_path, ip_lookup(&server));
        let record = resolver.resolve().await.unwrap();
        assert_eq!(record.postal, "20095");
    }

    #[tokio::test]
    async fn malformed_cache_falls_through_to_ip_and_rewrites_it() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "city": "Berlin",
                "postal": "10115",
                "loc": "52.52,13.405"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let cache_path = dir.path().join("nested").join("location.json");
        tokio::fs::create_dir_all(cache_path.parent().unwrap())
            .await
            .unwrap();
        tokio::fs::write(&cache_path, "{ not json").await.unwrap();

        let resolver = LocationResolver::new(None, cache_path.clone(), ip_lookup(&server));
        let record = resolver.resolve().await.unwrap();
        assert_eq!(record.postal, "10115");

        let cached: LocationRecord =
            serde_json::from_slice(&tokio::fs::read(&cache_path).await.unwrap()).unwrap();
        assert_eq!(cached, record);
    }

    #[tokio::test]
    async fn ip_success_creates_cache_parent_directories() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "city": "Berlin",
                "postal": "10115",
                "loc": "52.52,13.405"
            })))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let cache_path = dir.path().join("deep").join("cache").join("location.json");
        let resolver = LocationResolver::new(None, cache_path.clone(), ip_lookup(&server));
        resolver.resolve().await.unwrap();
        assert!(cache_path.exists());
    }

    #[tokio::test]
    async fn invalid_coordinates_exhaust_the_chain() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "city": "Berlin",
                "postal": "10115",
                "loc": "invalid,coord"
            })))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let resolver = LocationResolver::new(
            None,
            dir.path().join("location.json"),
            ip_lookup(&server),
        );
        let error = resolver.resolve().await.unwrap_err();
        match error {
            LocationError::SourcesExhausted(last) => {
                assert!(matches!(*last, LocationError::CoordinateParse { .. }));
            }
            other => panic!("expected SourcesExhausted, got {other:?}"),
        }
    }
}
