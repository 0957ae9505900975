use crate::core::errors::{Error, Result};
use crate::core::provider::Provider;
use crate::core::utils;
use log::info;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/*-------------------------------------------------------------------------------------------------
  Cache Metadata
-------------------------------------------------------------------------------------------------*/

/// Persisted record of the upstream `Last-Modified` instant the local snapshot was last
/// confirmed to match. Stored as `{"type": "<provider>", "lastModified": <seconds>}`.
///
/// `last_modified == 0` means the snapshot has never been confirmed.
#[derive(Debug, Clone, Copy, Deserialize, Eq, PartialEq, Serialize)]
pub struct CacheMetadata {
    #[serde(rename = "type")]
    pub provider: Provider,

    #[serde(rename = "lastModified")]
    pub last_modified: i64,
}

impl CacheMetadata {
    pub fn new(provider: Provider, last_modified: i64) -> Self {
        Self {
            provider,
            last_modified,
        }
    }

    /// Metadata for a provider whose snapshot has never been fetched.
    pub fn never_fetched(provider: Provider) -> Self {
        Self::new(provider, 0)
    }

    /*-------------------------------------------------------------------------
      Read and Write
    -------------------------------------------------------------------------*/

    pub fn read(path: &Path) -> Result<CacheMetadata> {
        let json = fs::read_to_string(path).map_err(|error| Error::persistence(path, error))?;
        serde_json::from_str(&json).map_err(|error| Error::decode(path, error))
    }

    /// Atomically replace the metadata file at `path`.
    pub fn write(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_vec_pretty(self).map_err(|error| Error::decode(path, error))?;
        utils::replace_file_contents(path, &json)
    }

    /// Create the provider directory and an initial never-fetched metadata file when the
    /// metadata file does not exist. Returns `true` if the file was created.
    pub fn ensure(provider: Provider, provider_dir: &Path, path: &Path) -> Result<bool> {
        if provider_dir.is_dir() && utils::is_file(path) {
            return Ok(false);
        }

        info!("Initializing {} cache directory {:?}", provider, provider_dir);
        utils::ensure_dir(provider_dir)?;
        if utils::is_file(path) {
            return Ok(false);
        }

        CacheMetadata::never_fetched(provider).write(path)?;
        Ok(true)
    }
}

/*-------------------------------------------------------------------------------------------------
  Unit Tests
-------------------------------------------------------------------------------------------------*/
