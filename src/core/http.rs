use crate::core::config::Config;
use crate::core::datetime::parse_http_date;
use crate::core::errors::{Error, Result};
use crate::core::utils;
use log::{debug, info};
use reqwest::blocking::{Client, Response};
use reqwest::header::LAST_MODIFIED;
use std::io::{BufReader, ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::Path;
use std::{thread, time};

/*-------------------------------------------------------------------------------------------------
  HTTP Client
-------------------------------------------------------------------------------------------------*/

/// Blocking HTTP client for upstream range publishers. Every request is bounded by the
/// configured request timeout; snapshot downloads are retried with exponential back-off.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
    retry_count: u32,
    retry_initial_delay: u64,
    retry_backoff_factor: u64,
    retry_timeout: u64,
}

impl HttpClient {
    pub fn new(config: &Config) -> Result<Self> {
        let client = Client::builder()
            .timeout(time::Duration::from_millis(config.request_timeout()))
            .user_agent(concat!("cloudip/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|error| Error::Config(format!("unable to build HTTP client: {error}")))?;

        Ok(Self {
            client,
            retry_count: config.retry_count(),
            retry_initial_delay: config.retry_initial_delay(),
            retry_backoff_factor: config.retry_backoff_factor(),
            retry_timeout: config.retry_timeout(),
        })
    }

    /*-------------------------------------------------------------------------
      Conditional Check
    -------------------------------------------------------------------------*/

    /// Send a HEAD request to `url` and return its `Last-Modified` header as seconds since the
    /// Unix epoch. A network failure, non-2xx status, or a missing or unparseable header is an
    /// [Error::Upstream].
    pub fn head_last_modified(&self, url: &str) -> Result<i64> {
        debug!("HEAD {}", url);
        let response = self
            .client
            .head(url)
            .send()
            .map_err(|error| Error::upstream(url, error))?;
        let response = check_status(url, response)?;

        let value = last_modified_header(&response)
            .ok_or_else(|| Error::upstream(url, "missing Last-Modified header"))?;
        parse_http_date(&value).map_err(|error| {
            Error::upstream(
                url,
                format!("unparseable Last-Modified header {value:?}: {error}"),
            )
        })
    }

    /*-------------------------------------------------------------------------
      Get Text
    -------------------------------------------------------------------------*/

    /// GET `url` and return the response body as text.
    pub fn get_text(&self, url: &str) -> Result<String> {
        debug!("GET {}", url);
        self.client
            .get(url)
            .send()
            .map_err(|error| Error::upstream(url, error))
            .and_then(|response| check_status(url, response))
            .and_then(|response| response.text().map_err(|error| Error::upstream(url, error)))
    }

    /*-------------------------------------------------------------------------
      Download
    -------------------------------------------------------------------------*/

    /// GET `url` and atomically replace the file at `path` with the response body.
    ///
    /// The body is streamed to a temporary file beside `path` and checked to be well-formed
    /// JSON before it is renamed into place; on any failure `path` is left untouched. Upstream
    /// failures are retried. Returns the raw `Last-Modified` header of the successful response.
    pub fn download(&self, url: &str, path: &Path) -> Result<Option<String>> {
        let start_time = time::Instant::now();
        let max_elapsed_time = time::Duration::from_millis(self.retry_timeout);

        let mut attempt: u32 = 0;
        loop {
            info!("Download attempt {}: GET {}", attempt, url);

            match self.download_once(url, path) {
                Ok(last_modified) => {
                    info!("Download attempt {}: Ok; saved to {:?}", attempt, path);
                    break Ok(last_modified);
                }
                Err(error) => {
                    log::error!("Download attempt {}: FAILED: {}", attempt, error);

                    let delay = time::Duration::from_millis(
                        self.retry_initial_delay
                            .saturating_mul(self.retry_backoff_factor.saturating_pow(attempt)),
                    );

                    attempt += 1;

                    if error.is_upstream()
                        && (start_time.elapsed() + delay < max_elapsed_time)
                        && (attempt < self.retry_count)
                    {
                        thread::sleep(delay);
                        continue;
                    } else {
                        break Err(error);
                    }
                }
            }
        }
    }

    fn download_once(&self, url: &str, path: &Path) -> Result<Option<String>> {
        let response = self
            .client
            .get(url)
            .send()
            .map_err(|error| Error::upstream(url, error))?;
        let mut response = check_status(url, response)?;
        let last_modified = last_modified_header(&response);

        utils::replace_file(path, |file| {
            let bytes = copy_body(url, path, &mut response, file)?;
            debug!("Received {} bytes from {}", bytes, url);

            file.seek(SeekFrom::Start(0))
                .map_err(|error| Error::persistence(path, error))?;
            serde_json::from_reader::<_, serde::de::IgnoredAny>(BufReader::new(file))
                .map(|_| ())
                .map_err(|error| Error::upstream(url, format!("invalid JSON: {error}")))
        })?;

        Ok(last_modified)
    }
}

/*-------------------------------------------------------------------------------------------------
  Helper Functions
-------------------------------------------------------------------------------------------------*/

fn check_status(url: &str, response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        Err(Error::upstream(url, format!("HTTP status {status}")))
    }
}

/// Stream `body` into `file`. Read failures are [Error::Upstream]; write failures are local and
/// reported as [Error::Persistence] against `path`.
fn copy_body(url: &str, path: &Path, body: &mut impl Read, file: &mut impl Write) -> Result<u64> {
    let mut buffer = [0; 64 * 1024];
    let mut total: u64 = 0;
    loop {
        let read = match body.read(&mut buffer) {
            Ok(0) => return Ok(total),
            Ok(read) => read,
            Err(error) if error.kind() == ErrorKind::Interrupted => continue,
            Err(error) => return Err(Error::upstream(url, error)),
        };
        file.write_all(&buffer[..read])
            .map_err(|error| Error::persistence(path, error))?;
        total += read as u64;
    }
}

fn last_modified_header(response: &Response) -> Option<String> {
    response
        .headers()
        .get(LAST_MODIFIED)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
}

/*-------------------------------------------------------------------------------------------------
  Unit Tests
-------------------------------------------------------------------------------------------------*/
