use crate::core::config::Config;
use crate::core::dataset::{DatasetCache, ProviderDataset};
use crate::core::errors::{Error, Result};
use crate::core::freshness::{Freshness, FreshnessController};
use crate::core::http::HttpClient;
use crate::core::provider::Provider;
use log::{debug, info, warn};
use std::net::IpAddr;
use std::sync::{Arc, OnceLock};

/*-------------------------------------------------------------------------------------------------
  Provider Checker
-------------------------------------------------------------------------------------------------*/

/// Membership queries against one provider's published address space.
///
/// The first query (or an explicit [ProviderChecker::initialize]) refreshes the local snapshot
/// and builds the prefix tries. This happens exactly once per checker: concurrent callers block
/// until it completes, and a failure is reported to every caller without being retried.
#[derive(Debug)]
pub struct ProviderChecker {
    freshness: FreshnessController,
    cache: DatasetCache,
    state: OnceLock<Result<Arc<ProviderDataset>>>,
}

impl ProviderChecker {
    pub fn new(provider: Provider, config: &Config, client: HttpClient) -> Self {
        Self::with_controller(FreshnessController::new(provider, config, client))
    }

    pub fn with_controller(freshness: FreshnessController) -> Self {
        let cache = DatasetCache::new(freshness.provider(), freshness.snapshot_path());
        Self {
            freshness,
            cache,
            state: OnceLock::new(),
        }
    }

    pub fn provider(&self) -> Provider {
        self.freshness.provider()
    }

    /*-------------------------------------------------------------------------
      Initialize
    -------------------------------------------------------------------------*/

    pub fn initialize(&self) -> Result<()> {
        self.dataset().map(|_| ())
    }

    /// The provider's dataset, initializing on first use.
    pub fn dataset(&self) -> Result<Arc<ProviderDataset>> {
        self.state
            .get_or_init(|| {
                self.build().inspect_err(|error| {
                    log::error!("{} initialization failed: {}", self.provider(), error)
                })
            })
            .clone()
    }

    fn build(&self) -> Result<Arc<ProviderDataset>> {
        if let Freshness::Unverified(error) = self.freshness.ensure_fresh()? {
            warn!(
                "{} snapshot could not be verified against upstream: {}",
                self.provider(),
                error
            );
        }

        let dataset = self.cache.load()?;
        let stats = dataset.stats();
        info!(
            "{} dataset ready: version {}, {} IPv4 and {} IPv6 prefixes ({} inserted, {} covered, {} duplicate, {} invalid)",
            self.provider(),
            dataset.version().unwrap_or("unknown"),
            dataset.ipv4_prefixes().len(),
            dataset.ipv6_prefixes().len(),
            stats.inserted,
            stats.covered,
            stats.duplicate,
            stats.invalid,
        );
        Ok(dataset)
    }

    /*-------------------------------------------------------------------------
      Is Member
    -------------------------------------------------------------------------*/

    /// `true` when `ip` falls inside one of the provider's published prefixes.
    ///
    /// An unparseable `ip` is an [Error::InvalidAddress] and never triggers initialization.
    pub fn is_member(&self, ip: &str) -> Result<bool> {
        let address: IpAddr = ip
            .parse()
            .map_err(|_| Error::InvalidAddress(ip.to_string()))?;

        let dataset = self.dataset()?;
        match dataset.matching_prefix(&address) {
            Some(cidr) => {
                debug!("{} matched {} prefix {}", ip, self.provider(), cidr);
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

/*-------------------------------------------------------------------------------------------------
  Unit Tests
-------------------------------------------------------------------------------------------------*/

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::discovery::UrlSource;
    use crate::core::http::tests::{test_config, MockUpstream};
    use crate::core::json::tests::{AWS_TEST_JSON, GCP_TEST_JSON};
    use crate::core::metadata::CacheMetadata;
    use std::fs;
    use std::thread;
    use tempfile::TempDir;
    use test_log::test;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, ResponseTemplate};

    const ROUTE: &str = "/ip-ranges.json";

    fn checker(upstream: &MockUpstream, dir: &TempDir, provider: Provider) -> ProviderChecker {
        let config = test_config(dir.path());
        let client = HttpClient::new(&config).unwrap();
        let source = UrlSource::Fixed(upstream.url(ROUTE));
        ProviderChecker::with_controller(FreshnessController::with_source(
            provider, &config, client, source,
        ))
    }

    /*-------------------------------------------------------------------------
      Test Initialize
    -------------------------------------------------------------------------*/

    #[test]
    fn test_concurrent_initialize_downloads_once() {
        let upstream = MockUpstream::start();
        upstream.head(ROUTE, 2000);
        upstream.get(ROUTE, AWS_TEST_JSON, 2000);

        let dir = TempDir::new().unwrap();
        let checker = checker(&upstream, &dir, Provider::Aws);

        let results: Vec<Result<()>> = thread::scope(|scope| {
            let handles: Vec<_> = (0..16)
                .map(|_| scope.spawn(|| checker.initialize()))
                .collect();
            handles
                .into_iter()
                .map(|handle| handle.join().unwrap())
                .collect()
        });

        assert!(results.iter().all(|result| result.is_ok()));
        assert_eq!(upstream.requests("GET", ROUTE), 1);
        assert_eq!(checker.dataset().unwrap().ipv4_prefixes().len(), 2);
    }

    #[test]
    fn test_failed_initialize_is_reported_to_every_caller() {
        let upstream = MockUpstream::start();
        upstream.mount(
            Mock::given(method("GET"))
                .and(path(ROUTE))
                .respond_with(ResponseTemplate::new(500)),
        );

        let dir = TempDir::new().unwrap();
        let checker = checker(&upstream, &dir, Provider::Aws);

        assert!(matches!(checker.initialize(), Err(Error::Upstream { .. })));
        let attempts = upstream.requests("GET", ROUTE);

        // Not retried within the process.
        assert!(matches!(checker.is_member("10.1.2.3"), Err(Error::Upstream { .. })));
        assert!(matches!(checker.initialize(), Err(Error::Upstream { .. })));
        assert_eq!(upstream.requests("GET", ROUTE), attempts);
    }

    #[test]
    fn test_decode_failure_fails_initialize() {
        let upstream = MockUpstream::start();
        upstream.head(ROUTE, 1000);

        let dir = TempDir::new().unwrap();
        let checker = checker(&upstream, &dir, Provider::Gcp);
        let snapshot = dir.path().join("gcp").join("gcp.json");
        fs::create_dir_all(snapshot.parent().unwrap()).unwrap();
        fs::write(&snapshot, r#"{"prefixes": "not a list"}"#).unwrap();
        CacheMetadata::new(Provider::Gcp, 1000)
            .write(&dir.path().join("gcp").join(".metadata.json"))
            .unwrap();

        assert!(matches!(checker.initialize(), Err(Error::Decode { .. })));
    }

    /*-------------------------------------------------------------------------
      Test Is Member
    -------------------------------------------------------------------------*/

    #[test]
    fn test_is_member() {
        let upstream = MockUpstream::start();
        upstream.head(ROUTE, 2000);
        upstream.get(ROUTE, AWS_TEST_JSON, 2000);

        let dir = TempDir::new().unwrap();
        let checker = checker(&upstream, &dir, Provider::Aws);

        assert!(checker.is_member("10.1.2.3").unwrap());
        assert!(checker.is_member("2001:db8:1::1").unwrap());
        assert!(checker.is_member("::ffff:10.1.2.3").unwrap());
        assert!(!checker.is_member("192.168.0.1").unwrap());
        assert!(!checker.is_member("2001:db9::1").unwrap());
    }

    #[test]
    fn test_invalid_address_does_not_initialize() {
        let upstream = MockUpstream::start();
        upstream.get(ROUTE, AWS_TEST_JSON, 2000);

        let dir = TempDir::new().unwrap();
        let checker = checker(&upstream, &dir, Provider::Aws);

        for input in ["not-an-ip", "", "10.0.0.256", "10.0.0.0/8"] {
            assert!(matches!(
                checker.is_member(input),
                Err(Error::InvalidAddress(_))
            ));
        }
        assert_eq!(upstream.requests("GET", ROUTE), 0);
    }

    #[test]
    fn test_unreachable_upstream_uses_cached_snapshot() {
        let dir = TempDir::new().unwrap();
        let config = test_config(dir.path());
        let client = HttpClient::new(&config).unwrap();
        let source = UrlSource::from("http://127.0.0.1:1/cloud.json");
        let checker = ProviderChecker::with_controller(FreshnessController::with_source(
            Provider::Gcp,
            &config,
            client,
            source,
        ));

        fs::create_dir_all(config.provider_dir(Provider::Gcp)).unwrap();
        fs::write(config.snapshot_path(Provider::Gcp), GCP_TEST_JSON).unwrap();
        CacheMetadata::new(Provider::Gcp, 1000)
            .write(&config.metadata_path(Provider::Gcp))
            .unwrap();

        assert!(checker.is_member("34.80.1.1").unwrap());
        assert!(!checker.is_member("10.1.2.3").unwrap());
    }
}
