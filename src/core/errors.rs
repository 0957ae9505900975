use std::path::PathBuf;
use std::sync::Arc;

/*-------------------------------------------------------------------------------------------------
  Errors and Results
-------------------------------------------------------------------------------------------------*/

/// Error type used throughout the crate.
///
/// Every variant is recoverable at the provider boundary: a failure in one provider's pipeline
/// is reported for that provider and never aborts lookups against the others. The type is
/// [Clone] so a failed one-time initialization can be reported to every caller waiting on it.
#[derive(Debug, Clone, thiserror::Error)]
pub enum Error {
    /// The input string is not a parseable IPv4 or IPv6 address.
    #[error("invalid IP address: {0:?}")]
    InvalidAddress(String),

    /// A snapshot or metadata file does not match its expected JSON schema.
    #[error("failed to decode `{}`: {message}", .path.display())]
    Decode { path: PathBuf, message: String },

    /// The snapshot file does not exist.
    #[error("snapshot file not found: `{}`", .0.display())]
    NotFound(PathBuf),

    /// Network failure, non-2xx status, or unusable `Last-Modified` header.
    #[error("upstream request to {url} failed: {message}")]
    Upstream { url: String, message: String },

    /// Failure to create a directory or to open, write, or replace a file.
    #[error("failed to persist `{}`: {source}", .path.display())]
    Persistence {
        path: PathBuf,
        #[source]
        source: Arc<std::io::Error>,
    },

    /// Unusable configuration (no home directory, invalid HTTP client settings, ...).
    #[error("configuration error: {0}")]
    Config(String),
}

// Result type alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/*--------------------------------------------------------------------------------------
  Error Constructors
--------------------------------------------------------------------------------------*/

impl Error {
    pub(crate) fn upstream(url: &str, message: impl ToString) -> Self {
        Error::Upstream {
            url: url.to_string(),
            message: message.to_string(),
        }
    }

    pub(crate) fn persistence(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Persistence {
            path: path.into(),
            source: Arc::new(source),
        }
    }

    pub(crate) fn decode(path: impl Into<PathBuf>, message: impl ToString) -> Self {
        Error::Decode {
            path: path.into(),
            message: message.to_string(),
        }
    }

    /// Returns `true` for errors raised while talking to the upstream publisher.
    pub fn is_upstream(&self) -> bool {
        matches!(self, Error::Upstream { .. })
    }
}

/*--------------------------------------------------------------------------------------
  Log Error Function
--------------------------------------------------------------------------------------*/

pub(crate) fn log_error(error: &Error) {
    log::error!("{}", error);
}

/*-------------------------------------------------------------------------------------------------
  Unit Tests
-------------------------------------------------------------------------------------------------*/
