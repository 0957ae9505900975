use crate::core::config::Config;
use crate::core::datetime::{format_http_date, parse_http_date};
use crate::core::discovery::{self, UrlSource};
use crate::core::errors::{log_error, Error, Result};
use crate::core::http::HttpClient;
use crate::core::metadata::CacheMetadata;
use crate::core::provider::Provider;
use crate::core::utils;
use log::{info, warn};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

/*-------------------------------------------------------------------------------------------------
  Cache State
-------------------------------------------------------------------------------------------------*/

/// The state of a provider's local snapshot relative to its upstream publication.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum CacheState {
    /// No local snapshot (or no metadata describing one).
    DataMissing,
    /// The upstream `Last-Modified` differs from the recorded one.
    DataStale,
    /// The upstream `Last-Modified` matches the recorded one.
    DataFresh,
}

/// Outcome of [FreshnessController::ensure_fresh].
#[derive(Debug, Clone)]
pub enum Freshness {
    /// The local snapshot matches upstream; nothing was downloaded.
    Fresh,

    /// A new snapshot was downloaded. `last_modified` is the upstream instant now recorded in
    /// the metadata, or `None` when the response carried no usable `Last-Modified` header.
    Refreshed {
        state: CacheState,
        last_modified: Option<i64>,
    },

    /// A local snapshot exists but could not be checked or refreshed against upstream; it is
    /// used as-is.
    Unverified(Error),
}

/*-------------------------------------------------------------------------------------------------
  Freshness Controller
-------------------------------------------------------------------------------------------------*/

/// Keeps one provider's local snapshot synchronized with its upstream publication using a HEAD
/// `Last-Modified` check, and persists [CacheMetadata] only after a snapshot has been committed.
#[derive(Debug)]
pub struct FreshnessController {
    provider: Provider,
    provider_dir: PathBuf,
    snapshot_path: PathBuf,
    metadata_path: PathBuf,
    source: UrlSource,
    url: OnceLock<Result<String>>,
    client: HttpClient,
}

impl FreshnessController {
    /// Controller for `provider` using the URL configured for it; Azure falls back to
    /// discovering the URL from the configured landing page.
    pub fn new(provider: Provider, config: &Config, client: HttpClient) -> Self {
        let source = match config.url(provider) {
            Some(url) => UrlSource::Fixed(url.to_string()),
            None => discovery::azure_service_tags(client.clone(), config.azure_discovery_url()),
        };
        Self::with_source(provider, config, client, source)
    }

    pub fn with_source(
        provider: Provider,
        config: &Config,
        client: HttpClient,
        source: UrlSource,
    ) -> Self {
        Self {
            provider,
            provider_dir: config.provider_dir(provider),
            snapshot_path: config.snapshot_path(provider),
            metadata_path: config.metadata_path(provider),
            source,
            url: OnceLock::new(),
            client,
        }
    }

    /*-------------------------------------------------------------------------
      Getters
    -------------------------------------------------------------------------*/

    pub fn provider(&self) -> Provider {
        self.provider
    }

    pub fn snapshot_path(&self) -> &Path {
        &self.snapshot_path
    }

    pub fn metadata_path(&self) -> &Path {
        &self.metadata_path
    }

    /// The provider's source URL. A discovered URL is resolved on first use and the outcome,
    /// success or failure, is reused afterwards.
    pub fn url(&self) -> Result<String> {
        self.url
            .get_or_init(|| self.source.resolve().inspect_err(log_error))
            .clone()
    }

    /*-------------------------------------------------------------------------
      Ensure Fresh
    -------------------------------------------------------------------------*/

    /// Bring the local snapshot up to date with upstream.
    ///
    /// A missing snapshot is downloaded; failing that is an error. An existing snapshot is
    /// checked with a HEAD request and replaced only when the upstream `Last-Modified` differs
    /// from the recorded one. Upstream failures while checking or replacing an existing
    /// snapshot are reported as [Freshness::Unverified] and the existing snapshot stays.
    pub fn ensure_fresh(&self) -> Result<Freshness> {
        let initialized =
            CacheMetadata::ensure(self.provider, &self.provider_dir, &self.metadata_path)?;

        if initialized || !utils::is_file(&self.snapshot_path) {
            info!("{} snapshot missing; downloading", self.provider);
            let last_modified = self.download_snapshot()?;
            return Ok(Freshness::Refreshed {
                state: CacheState::DataMissing,
                last_modified,
            });
        }

        let (state, recorded) = match self.check() {
            Ok(checked) => checked,
            Err(error) => {
                warn!(
                    "{} freshness check failed; using cached snapshot: {}",
                    self.provider, error
                );
                return Ok(Freshness::Unverified(error));
            }
        };

        if state == CacheState::DataFresh {
            info!(
                "{} snapshot is fresh (Last-Modified {})",
                self.provider,
                format_http_date(recorded)
            );
            return Ok(Freshness::Fresh);
        }

        info!(
            "{} snapshot is stale (recorded Last-Modified {}); downloading",
            self.provider,
            format_http_date(recorded)
        );
        match self.download_snapshot() {
            Ok(last_modified) => Ok(Freshness::Refreshed {
                state,
                last_modified,
            }),
            Err(error) if error.is_upstream() => {
                warn!(
                    "{} download failed; using cached snapshot: {}",
                    self.provider, error
                );
                Ok(Freshness::Unverified(error))
            }
            Err(error) => Err(error),
        }
    }

    /// Compare the upstream `Last-Modified` with the recorded one. Returns the resulting state
    /// and the recorded instant. Unreadable metadata counts as never fetched.
    fn check(&self) -> Result<(CacheState, i64)> {
        let recorded = CacheMetadata::read(&self.metadata_path)
            .inspect_err(|error| {
                warn!(
                    "{} metadata unreadable; treating snapshot as stale: {}",
                    self.provider, error
                )
            })
            .map(|metadata| metadata.last_modified)
            .unwrap_or(0);

        let url = self.url()?;
        let upstream = self.client.head_last_modified(&url)?;

        let state = if upstream == recorded {
            CacheState::DataFresh
        } else {
            CacheState::DataStale
        };
        Ok((state, recorded))
    }

    /*-------------------------------------------------------------------------
      Download Snapshot
    -------------------------------------------------------------------------*/

    /// Download the snapshot, atomically replace the local copy, then record the response's
    /// `Last-Modified` in the metadata file.
    ///
    /// On failure the existing snapshot and metadata are untouched. When the response carries
    /// no parseable `Last-Modified` header the new snapshot is kept, the metadata is left as it
    /// was, and `None` is returned; the next check then sees the snapshot as stale.
    pub fn download_snapshot(&self) -> Result<Option<i64>> {
        let url = self.url()?;
        let header = self.client.download(&url, &self.snapshot_path)?;

        let last_modified = match header.as_deref().map(parse_http_date) {
            Some(Ok(last_modified)) => last_modified,
            Some(Err(error)) => {
                warn!(
                    "{} snapshot saved but its Last-Modified header {:?} is unparseable: {}",
                    self.provider, header, error
                );
                return Ok(None);
            }
            None => {
                warn!(
                    "{} snapshot saved but the response had no Last-Modified header",
                    self.provider
                );
                return Ok(None);
            }
        };

        CacheMetadata::new(self.provider, last_modified)
            .write(&self.metadata_path)
            .inspect(|_| {
                info!(
                    "{} metadata updated: Last-Modified {}",
                    self.provider,
                    format_http_date(last_modified)
                )
            })?;

        Ok(Some(last_modified))
    }
}

/*-------------------------------------------------------------------------------------------------
  Unit Tests
-------------------------------------------------------------------------------------------------*/

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::http::tests::{test_config, MockUpstream};
    use crate::core::json::tests::AWS_TEST_JSON;
    use std::fs;
    use std::time::Duration;
    use tempfile::TempDir;
    use test_log::test;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, ResponseTemplate};

    const ROUTE: &str = "/ip-ranges.json";
    const OLD_SNAPSHOT: &str = r#"{"syncToken": "1000", "prefixes": [], "ipv6_prefixes": []}"#;

    fn controller(upstream: &MockUpstream, dir: &TempDir) -> FreshnessController {
        let config = test_config(dir.path());
        let client = HttpClient::new(&config).unwrap();
        let source = UrlSource::Fixed(upstream.url(ROUTE));
        FreshnessController::with_source(Provider::Aws, &config, client, source)
    }

    fn seed(controller: &FreshnessController, last_modified: i64) {
        fs::create_dir_all(controller.snapshot_path().parent().unwrap()).unwrap();
        fs::write(controller.snapshot_path(), OLD_SNAPSHOT).unwrap();
        CacheMetadata::new(Provider::Aws, last_modified)
            .write(controller.metadata_path())
            .unwrap();
    }

    fn recorded(controller: &FreshnessController) -> i64 {
        CacheMetadata::read(controller.metadata_path())
            .unwrap()
            .last_modified
    }

    fn snapshot(controller: &FreshnessController) -> String {
        fs::read_to_string(controller.snapshot_path()).unwrap()
    }

    /*-------------------------------------------------------------------------
      Missing Snapshot
    -------------------------------------------------------------------------*/

    #[test]
    fn test_missing_snapshot_is_downloaded() {
        let upstream = MockUpstream::start();
        upstream.head(ROUTE, 2000);
        upstream.get(ROUTE, AWS_TEST_JSON, 2000);

        let dir = TempDir::new().unwrap();
        let controller = controller(&upstream, &dir);

        let freshness = controller.ensure_fresh().unwrap();
        assert!(matches!(
            freshness,
            Freshness::Refreshed {
                state: CacheState::DataMissing,
                last_modified: Some(2000)
            }
        ));
        assert_eq!(snapshot(&controller), AWS_TEST_JSON);
        assert_eq!(recorded(&controller), 2000);
        assert_eq!(upstream.requests("HEAD", ROUTE), 0);
        assert_eq!(upstream.requests("GET", ROUTE), 1);
    }

    #[test]
    fn test_missing_snapshot_download_failure_is_an_error() {
        let upstream = MockUpstream::start();
        upstream.mount(
            Mock::given(method("GET"))
                .and(path(ROUTE))
                .respond_with(ResponseTemplate::new(404)),
        );

        let dir = TempDir::new().unwrap();
        let controller = controller(&upstream, &dir);

        let result = controller.ensure_fresh();
        assert!(matches!(result, Err(Error::Upstream { .. })));
        assert!(!controller.snapshot_path().exists());
        assert_eq!(
            CacheMetadata::read(controller.metadata_path()).unwrap(),
            CacheMetadata::never_fetched(Provider::Aws)
        );
    }

    /*-------------------------------------------------------------------------
      Conditional Check
    -------------------------------------------------------------------------*/

    #[test]
    fn test_matching_last_modified_skips_download() {
        let upstream = MockUpstream::start();
        upstream.head(ROUTE, 1000);
        upstream.get(ROUTE, AWS_TEST_JSON, 1000);

        let dir = TempDir::new().unwrap();
        let controller = controller(&upstream, &dir);
        seed(&controller, 1000);

        assert!(matches!(controller.ensure_fresh().unwrap(), Freshness::Fresh));
        assert_eq!(upstream.requests("HEAD", ROUTE), 1);
        assert_eq!(upstream.requests("GET", ROUTE), 0);
        assert_eq!(recorded(&controller), 1000);
        assert_eq!(snapshot(&controller), OLD_SNAPSHOT);
    }

    #[test]
    fn test_changed_last_modified_downloads_once() {
        let upstream = MockUpstream::start();
        upstream.head(ROUTE, 2000);
        upstream.get(ROUTE, AWS_TEST_JSON, 2000);

        let dir = TempDir::new().unwrap();
        let controller = controller(&upstream, &dir);
        seed(&controller, 1000);

        assert!(matches!(
            controller.ensure_fresh().unwrap(),
            Freshness::Refreshed {
                state: CacheState::DataStale,
                last_modified: Some(2000)
            }
        ));
        assert_eq!(upstream.requests("GET", ROUTE), 1);
        assert_eq!(recorded(&controller), 2000);
        assert_eq!(snapshot(&controller), AWS_TEST_JSON);
    }

    #[test]
    fn test_ensure_fresh_is_idempotent() {
        let upstream = MockUpstream::start();
        upstream.head(ROUTE, 2000);
        upstream.get(ROUTE, AWS_TEST_JSON, 2000);

        let dir = TempDir::new().unwrap();
        let controller = controller(&upstream, &dir);
        seed(&controller, 1000);

        controller.ensure_fresh().unwrap();
        upstream.reset();
        upstream.head(ROUTE, 2000);
        upstream.get(ROUTE, AWS_TEST_JSON, 2000);

        assert!(matches!(controller.ensure_fresh().unwrap(), Freshness::Fresh));
        assert_eq!(upstream.requests("HEAD", ROUTE), 1);
        assert_eq!(upstream.requests("GET", ROUTE), 0);
        assert_eq!(recorded(&controller), 2000);
    }

    /*-------------------------------------------------------------------------
      Crash Safety
    -------------------------------------------------------------------------*/

    #[test]
    fn test_metadata_lagging_snapshot_forces_redownload() {
        let upstream = MockUpstream::start();
        upstream.head(ROUTE, 2000);
        upstream.get(ROUTE, AWS_TEST_JSON, 2000);

        let dir = TempDir::new().unwrap();
        let controller = controller(&upstream, &dir);

        // New snapshot written, process interrupted before the metadata write.
        seed(&controller, 1000);
        fs::write(controller.snapshot_path(), AWS_TEST_JSON).unwrap();

        assert!(matches!(
            controller.ensure_fresh().unwrap(),
            Freshness::Refreshed {
                state: CacheState::DataStale,
                ..
            }
        ));
        assert_eq!(upstream.requests("GET", ROUTE), 1);
        assert_eq!(recorded(&controller), 2000);
    }

    #[test]
    fn test_missing_metadata_forces_download() {
        let upstream = MockUpstream::start();
        upstream.head(ROUTE, 2000);
        upstream.get(ROUTE, AWS_TEST_JSON, 2000);

        let dir = TempDir::new().unwrap();
        let controller = controller(&upstream, &dir);
        seed(&controller, 2000);
        fs::remove_file(controller.metadata_path()).unwrap();

        assert!(matches!(
            controller.ensure_fresh().unwrap(),
            Freshness::Refreshed {
                state: CacheState::DataMissing,
                ..
            }
        ));
        assert_eq!(upstream.requests("GET", ROUTE), 1);
        assert_eq!(recorded(&controller), 2000);
    }

    #[test]
    fn test_corrupt_metadata_is_treated_as_stale() {
        let upstream = MockUpstream::start();
        upstream.head(ROUTE, 2000);
        upstream.get(ROUTE, AWS_TEST_JSON, 2000);

        let dir = TempDir::new().unwrap();
        let controller = controller(&upstream, &dir);
        seed(&controller, 2000);
        fs::write(controller.metadata_path(), "{\"type\": \"aws\", \"lastMod").unwrap();

        assert!(matches!(
            controller.ensure_fresh().unwrap(),
            Freshness::Refreshed {
                state: CacheState::DataStale,
                ..
            }
        ));
        assert_eq!(recorded(&controller), 2000);
    }

    /*-------------------------------------------------------------------------
      Upstream Failures
    -------------------------------------------------------------------------*/

    #[test]
    fn test_head_failure_keeps_cached_snapshot() {
        let upstream = MockUpstream::start();
        upstream.mount(
            Mock::given(method("HEAD"))
                .and(path(ROUTE))
                .respond_with(ResponseTemplate::new(503)),
        );
        upstream.get(ROUTE, AWS_TEST_JSON, 2000);

        let dir = TempDir::new().unwrap();
        let controller = controller(&upstream, &dir);
        seed(&controller, 1000);

        assert!(matches!(
            controller.ensure_fresh().unwrap(),
            Freshness::Unverified(Error::Upstream { .. })
        ));
        assert_eq!(upstream.requests("GET", ROUTE), 0);
        assert_eq!(recorded(&controller), 1000);
        assert_eq!(snapshot(&controller), OLD_SNAPSHOT);
    }

    #[test]
    fn test_head_timeout_keeps_cached_snapshot() {
        let upstream = MockUpstream::start();
        upstream.mount(
            Mock::given(method("HEAD")).and(path(ROUTE)).respond_with(
                ResponseTemplate::new(200)
                    .insert_header("Last-Modified", format_http_date(2000))
                    .set_delay(Duration::from_secs(5)),
            ),
        );
        upstream.get(ROUTE, AWS_TEST_JSON, 2000);

        let dir = TempDir::new().unwrap();
        let controller = controller(&upstream, &dir);
        seed(&controller, 1000);

        assert!(matches!(
            controller.ensure_fresh().unwrap(),
            Freshness::Unverified(Error::Upstream { .. })
        ));
        assert_eq!(upstream.requests("GET", ROUTE), 0);
        assert_eq!(recorded(&controller), 1000);
        assert_eq!(snapshot(&controller), OLD_SNAPSHOT);
    }

    #[test]
    fn test_download_timeout_keeps_cached_snapshot() {
        let upstream = MockUpstream::start();
        upstream.head(ROUTE, 2000);
        upstream.mount(
            Mock::given(method("GET")).and(path(ROUTE)).respond_with(
                ResponseTemplate::new(200)
                    .insert_header("Last-Modified", format_http_date(2000))
                    .set_body_string(AWS_TEST_JSON)
                    .set_delay(Duration::from_secs(5)),
            ),
        );

        let dir = TempDir::new().unwrap();
        let controller = controller(&upstream, &dir);
        seed(&controller, 1000);

        assert!(matches!(
            controller.ensure_fresh().unwrap(),
            Freshness::Unverified(Error::Upstream { .. })
        ));
        assert_eq!(recorded(&controller), 1000);
        assert_eq!(snapshot(&controller), OLD_SNAPSHOT);
    }

    #[test]
    fn test_failed_download_leaves_files_untouched() {
        let upstream = MockUpstream::start();
        upstream.head(ROUTE, 2000);
        upstream.mount(
            Mock::given(method("GET"))
                .and(path(ROUTE))
                .respond_with(ResponseTemplate::new(500).set_body_string(AWS_TEST_JSON)),
        );

        let dir = TempDir::new().unwrap();
        let controller = controller(&upstream, &dir);
        seed(&controller, 1000);

        assert!(matches!(
            controller.ensure_fresh().unwrap(),
            Freshness::Unverified(Error::Upstream { .. })
        ));
        assert_eq!(recorded(&controller), 1000);
        assert_eq!(snapshot(&controller), OLD_SNAPSHOT);
    }

    #[test]
    fn test_unparseable_download_last_modified_keeps_metadata() {
        let upstream = MockUpstream::start();
        upstream.mount(
            Mock::given(method("GET")).and(path(ROUTE)).respond_with(
                ResponseTemplate::new(200)
                    .insert_header("Last-Modified", "last tuesday")
                    .set_body_string(AWS_TEST_JSON),
            ),
        );

        let dir = TempDir::new().unwrap();
        let controller = controller(&upstream, &dir);

        assert_eq!(controller.download_snapshot().unwrap(), None);
        assert_eq!(snapshot(&controller), AWS_TEST_JSON);
        assert!(!controller.metadata_path().exists());
    }

    #[test]
    fn test_discovery_runs_once() {
        let dir = TempDir::new().unwrap();
        let config = test_config(dir.path());
        let client = HttpClient::new(&config).unwrap();
        let calls = std::sync::Arc::new(std::sync::atomic::AtomicUsize::new(0));

        let counter = calls.clone();
        let source = UrlSource::discover(move || {
            counter.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            Err(Error::upstream("https://landing.invalid", "no link"))
        });
        let controller = FreshnessController::with_source(Provider::Azure, &config, client, source);

        assert!(controller.ensure_fresh().is_err());
        assert!(controller.ensure_fresh().is_err());
        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 1);
    }
}
