use crate::core::errors::{Error, Result};
use crate::core::provider::Provider;
use log::{info, warn};
use std::env;
use std::path::{Path, PathBuf};

/*-------------------------------------------------------------------------------------------------
  Defaults
-------------------------------------------------------------------------------------------------*/

pub const APP_NAME: &str = "cloudip";
pub const METADATA_FILE_NAME: &str = ".metadata.json";

pub const DEFAULT_AWS_URL: &str = "https://ip-ranges.amazonaws.com/ip-ranges.json";
pub const DEFAULT_GCP_URL: &str = "https://www.gstatic.com/ipranges/cloud.json";
pub const DEFAULT_AZURE_DISCOVERY_URL: &str =
    "https://www.microsoft.com/en-us/download/details.aspx?id=56519";

/// Default application data directory: `~/Library/Application Support/cloudip` on macOS,
/// `~/.cloudip` elsewhere. `None` when the home directory cannot be determined.
pub fn default_data_dir() -> Option<PathBuf> {
    let home_dir = dirs::home_dir()?;
    if cfg!(target_os = "macos") {
        Some(home_dir.join("Library").join("Application Support").join(APP_NAME))
    } else {
        Some(home_dir.join(format!(".{APP_NAME}")))
    }
}

/*-------------------------------------------------------------------------------------------------
  Config Builder
-------------------------------------------------------------------------------------------------*/

/// A builder for the [Config] struct. Provides setters for each configuration value and a
/// [ConfigBuilder::build] method to create a [Config] instance.
///
/// ```
/// let config = cloudip::ConfigBuilder::new()
///     .data_dir("/tmp/cloudip")
///     .providers([cloudip::Provider::Aws, cloudip::Provider::Gcp])
///     .request_timeout(5000) // 5 seconds
///     .retry_count(2)
///     .build()
///     .unwrap();
///
/// assert_eq!(config.data_dir(), std::path::Path::new("/tmp/cloudip"));
/// ```
///
/// The [ConfigBuilder::new] method sources initial values from `CLOUDIP_*` environment
/// variables when set; [ConfigBuilder::default] ignores the environment.
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    data_dir: Option<PathBuf>,
    providers: Vec<Provider>,
    aws_url: String,
    gcp_url: String,
    azure_url: Option<String>,
    azure_discovery_url: String,
    request_timeout: u64,
    retry_count: u32,
    retry_initial_delay: u64,
    retry_backoff_factor: u64,
    retry_timeout: u64,
}

/*--------------------------------------------------------------------------------------
  Config Builder Implementation
--------------------------------------------------------------------------------------*/

impl Default for ConfigBuilder {
    /// Create a new [ConfigBuilder] with default configuration values.
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            providers: Provider::ALL.to_vec(),
            aws_url: DEFAULT_AWS_URL.to_string(),
            gcp_url: DEFAULT_GCP_URL.to_string(),
            azure_url: None,
            azure_discovery_url: DEFAULT_AZURE_DISCOVERY_URL.to_string(),
            request_timeout: 10_000, // 10 seconds
            retry_count: 4,
            retry_initial_delay: 200, // 200 ms
            retry_backoff_factor: 2,
            retry_timeout: 15_000, // 15 seconds
        }
    }
}

impl ConfigBuilder {
    /// Create a new [ConfigBuilder] reading initial configuration values from environment
    /// variables when set and default values otherwise:
    /// - `CLOUDIP_DATA_DIR`
    /// - `CLOUDIP_AWS_URL`
    /// - `CLOUDIP_GCP_URL`
    /// - `CLOUDIP_AZURE_URL`
    /// - `CLOUDIP_AZURE_DISCOVERY_URL`
    /// - `CLOUDIP_REQUEST_TIMEOUT`
    /// - `CLOUDIP_RETRY_COUNT`
    /// - `CLOUDIP_RETRY_INITIAL_DELAY`
    /// - `CLOUDIP_RETRY_BACKOFF_FACTOR`
    /// - `CLOUDIP_RETRY_TIMEOUT`
    pub fn new() -> Self {
        let default = ConfigBuilder::default();

        Self {
            data_dir: get_env_var::<PathBuf>("CLOUDIP_DATA_DIR").or(default.data_dir),
            providers: default.providers,
            aws_url: get_env_var("CLOUDIP_AWS_URL").unwrap_or(default.aws_url),
            gcp_url: get_env_var("CLOUDIP_GCP_URL").unwrap_or(default.gcp_url),
            azure_url: get_env_var("CLOUDIP_AZURE_URL").or(default.azure_url),
            azure_discovery_url: get_env_var("CLOUDIP_AZURE_DISCOVERY_URL")
                .unwrap_or(default.azure_discovery_url),
            request_timeout: get_env_var("CLOUDIP_REQUEST_TIMEOUT")
                .unwrap_or(default.request_timeout),
            retry_count: get_env_var("CLOUDIP_RETRY_COUNT").unwrap_or(default.retry_count),
            retry_initial_delay: get_env_var("CLOUDIP_RETRY_INITIAL_DELAY")
                .unwrap_or(default.retry_initial_delay),
            retry_backoff_factor: get_env_var("CLOUDIP_RETRY_BACKOFF_FACTOR")
                .unwrap_or(default.retry_backoff_factor),
            retry_timeout: get_env_var("CLOUDIP_RETRY_TIMEOUT").unwrap_or(default.retry_timeout),
        }
    }

    /*-------------------------------------------------------------------------
      Setters
    -------------------------------------------------------------------------*/

    /// Set the directory holding one sub-directory of cached state per provider.
    pub fn data_dir<P: AsRef<Path>>(&mut self, data_dir: P) -> &mut Self {
        self.data_dir = Some(data_dir.as_ref().to_path_buf());
        self
    }

    /// Set the providers to query, in query order. Duplicates are ignored.
    pub fn providers<I: IntoIterator<Item = Provider>>(&mut self, providers: I) -> &mut Self {
        self.providers.clear();
        for provider in providers {
            if !self.providers.contains(&provider) {
                self.providers.push(provider);
            }
        }
        self
    }

    pub fn aws_url(&mut self, url: &str) -> &mut Self {
        self.aws_url = url.to_string();
        self
    }

    pub fn gcp_url(&mut self, url: &str) -> &mut Self {
        self.gcp_url = url.to_string();
        self
    }

    /// Set a fixed Azure Service Tags URL, bypassing discovery.
    pub fn azure_url(&mut self, url: &str) -> &mut Self {
        self.azure_url = Some(url.to_string());
        self
    }

    /// Set the landing page scraped for the current Azure Service Tags download link.
    pub fn azure_discovery_url(&mut self, url: &str) -> &mut Self {
        self.azure_discovery_url = url.to_string();
        self
    }

    /// Set the per-request timeout (in milliseconds) for upstream HTTP requests.
    pub fn request_timeout(&mut self, request_timeout: u64) -> &mut Self {
        self.request_timeout = request_timeout;
        self
    }

    /// Set the number of attempts made to download a snapshot.
    pub fn retry_count(&mut self, retry_count: u32) -> &mut Self {
        self.retry_count = retry_count;
        self
    }

    /// Set the initial delay (in milliseconds) between download attempts. The delay between
    /// attempts is `retry_initial_delay * (retry_backoff_factor ^ attempt)`.
    pub fn retry_initial_delay(&mut self, retry_initial_delay: u64) -> &mut Self {
        self.retry_initial_delay = retry_initial_delay;
        self
    }

    pub fn retry_backoff_factor(&mut self, retry_backoff_factor: u64) -> &mut Self {
        self.retry_backoff_factor = retry_backoff_factor;
        self
    }

    /// Set the maximum total time (in milliseconds) spent retrying a download.
    pub fn retry_timeout(&mut self, retry_timeout: u64) -> &mut Self {
        self.retry_timeout = retry_timeout;
        self
    }

    /*-------------------------------------------------------------------------
      Build Method
    -------------------------------------------------------------------------*/

    pub fn build(&self) -> Result<Config> {
        let data_dir = self.data_dir.clone().ok_or_else(|| {
            Error::Config("unable to determine the home directory; set CLOUDIP_DATA_DIR".into())
        })?;

        Ok(Config {
            data_dir,
            providers: self.providers.clone(),
            aws_url: self.aws_url.clone(),
            gcp_url: self.gcp_url.clone(),
            azure_url: self.azure_url.clone(),
            azure_discovery_url: self.azure_discovery_url.clone(),
            request_timeout: self.request_timeout,
            retry_count: self.retry_count,
            retry_initial_delay: self.retry_initial_delay,
            retry_backoff_factor: self.retry_backoff_factor,
            retry_timeout: self.retry_timeout,
        })
    }
}

/*-------------------------------------------------------------------------------------------------
  Config
-------------------------------------------------------------------------------------------------*/

/// Resolved configuration shared by every provider pipeline.
#[derive(Debug, Clone)]
pub struct Config {
    data_dir: PathBuf,
    providers: Vec<Provider>,
    aws_url: String,
    gcp_url: String,
    azure_url: Option<String>,
    azure_discovery_url: String,
    request_timeout: u64,
    retry_count: u32,
    retry_initial_delay: u64,
    retry_backoff_factor: u64,
    retry_timeout: u64,
}

impl Config {
    /// Configuration from `CLOUDIP_*` environment variables and defaults.
    pub fn new() -> Result<Self> {
        ConfigBuilder::new().build()
    }

    /*-------------------------------------------------------------------------
      Getters
    -------------------------------------------------------------------------*/

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn providers(&self) -> &[Provider] {
        &self.providers
    }

    /// Fixed source URL for the provider; `None` for Azure unless one was configured.
    pub fn url(&self, provider: Provider) -> Option<&str> {
        match provider {
            Provider::Aws => Some(&self.aws_url),
            Provider::Gcp => Some(&self.gcp_url),
            Provider::Azure => self.azure_url.as_deref(),
        }
    }

    pub fn azure_discovery_url(&self) -> &str {
        &self.azure_discovery_url
    }

    pub fn request_timeout(&self) -> u64 {
        self.request_timeout
    }

    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    pub fn retry_initial_delay(&self) -> u64 {
        self.retry_initial_delay
    }

    pub fn retry_backoff_factor(&self) -> u64 {
        self.retry_backoff_factor
    }

    pub fn retry_timeout(&self) -> u64 {
        self.retry_timeout
    }

    /*-------------------------------------------------------------------------
      Provider Paths
    -------------------------------------------------------------------------*/

    /// `<data_dir>/<provider>`
    pub fn provider_dir(&self, provider: Provider) -> PathBuf {
        self.data_dir.join(provider.name())
    }

    /// `<data_dir>/<provider>/<provider>.json`
    pub fn snapshot_path(&self, provider: Provider) -> PathBuf {
        self.provider_dir(provider).join(provider.snapshot_file_name())
    }

    /// `<data_dir>/<provider>/.metadata.json`
    pub fn metadata_path(&self, provider: Provider) -> PathBuf {
        self.provider_dir(provider).join(METADATA_FILE_NAME)
    }
}

/*-------------------------------------------------------------------------------------------------
  Helper Functions
-------------------------------------------------------------------------------------------------*/

/// Get and parse an environment variable value; `None` when unset or unparseable.
fn get_env_var<T: std::str::FromStr>(env_var: &str) -> Option<T> {
    env::var(env_var).ok().and_then(|value| {
        value
            .parse::<T>()
            .inspect(|_| info!("Using {}: {}", env_var, value))
            .inspect_err(|_| warn!("Invalid {}: {}", env_var, value))
            .ok()
    })
}

/*-------------------------------------------------------------------------------------------------
  Unit Tests
-------------------------------------------------------------------------------------------------*/
