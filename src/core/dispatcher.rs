use crate::core::checker::ProviderChecker;
use crate::core::config::Config;
use crate::core::errors::{Error, Result};
use crate::core::http::HttpClient;
use crate::core::provider::Provider;
use log::{debug, warn};
use serde::{Serialize, Serializer};
use std::net::IpAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;

/// Upper bound on lookup worker threads.
const MAX_WORKERS: usize = 64;

/*-------------------------------------------------------------------------------------------------
  Check Result
-------------------------------------------------------------------------------------------------*/

/// The outcome of checking one input address against every configured provider.
#[derive(Debug, Clone, Serialize)]
pub struct CheckResult {
    pub ip: String,

    /// The first provider, in query order, whose address space contains `ip`.
    pub provider: Option<Provider>,

    /// The first error encountered when no provider matched.
    #[serde(serialize_with = "serialize_error")]
    pub error: Option<Error>,
}

impl CheckResult {
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

fn serialize_error<S>(error: &Option<Error>, serializer: S) -> std::result::Result<S::Ok, S::Error>
where
    S: Serializer,
{
    match error {
        Some(error) => serializer.serialize_some(&error.to_string()),
        None => serializer.serialize_none(),
    }
}

/*-------------------------------------------------------------------------------------------------
  Dispatcher
-------------------------------------------------------------------------------------------------*/

/// Fans input addresses across the configured providers.
#[derive(Debug)]
pub struct Dispatcher {
    checkers: Vec<ProviderChecker>,
}

impl Dispatcher {
    /// One [ProviderChecker] per configured provider, sharing a single HTTP client.
    pub fn new(config: &Config) -> Result<Self> {
        let client = HttpClient::new(config)?;
        let checkers = config
            .providers()
            .iter()
            .map(|provider| ProviderChecker::new(*provider, config, client.clone()))
            .collect();
        Ok(Self::from_checkers(checkers))
    }

    /// Dispatch to `checkers`, queried in the given order.
    pub fn from_checkers(checkers: Vec<ProviderChecker>) -> Self {
        Self { checkers }
    }

    pub fn providers(&self) -> Vec<Provider> {
        self.checkers.iter().map(ProviderChecker::provider).collect()
    }

    /// Check every address in `ips` on a bounded pool of worker threads. Results are returned
    /// in input order.
    pub fn check<S: AsRef<str> + Sync>(&self, ips: &[S]) -> Vec<CheckResult> {
        let workers = worker_count(ips.len());
        let next = &AtomicUsize::new(0);
        debug!("Checking {} address(es) on {} worker(s)", ips.len(), workers);

        let mut results: Vec<Option<CheckResult>> = vec![None; ips.len()];
        thread::scope(|scope| {
            let handles: Vec<_> = (0..workers)
                .map(|_| {
                    scope.spawn(move || {
                        let mut checked = Vec::new();
                        loop {
                            let index = next.fetch_add(1, Ordering::Relaxed);
                            let Some(ip) = ips.get(index) else {
                                break checked;
                            };
                            checked.push((index, self.check_ip(ip.as_ref())));
                        }
                    })
                })
                .collect();

            for handle in handles {
                match handle.join() {
                    Ok(checked) => {
                        for (index, result) in checked {
                            results[index] = Some(result);
                        }
                    }
                    Err(_) => warn!("Lookup worker panicked"),
                }
            }
        });

        results
            .into_iter()
            .zip(ips)
            .map(|(result, ip)| {
                result.unwrap_or_else(|| CheckResult {
                    ip: ip.as_ref().to_string(),
                    provider: None,
                    error: Some(Error::Config("lookup worker panicked".to_string())),
                })
            })
            .collect()
    }

    /// Check one address against each provider in order, stopping at the first match.
    ///
    /// A provider failure does not stop the search; it is reported only if no later provider
    /// matches.
    pub fn check_ip(&self, ip: &str) -> CheckResult {
        let mut result = CheckResult {
            ip: ip.to_string(),
            provider: None,
            error: None,
        };

        if ip.parse::<IpAddr>().is_err() {
            result.error = Some(Error::InvalidAddress(ip.to_string()));
            return result;
        }

        for checker in &self.checkers {
            match checker.is_member(ip) {
                Ok(true) => {
                    debug!("{} belongs to {}", ip, checker.provider());
                    result.provider = Some(checker.provider());
                    result.error = None;
                    return result;
                }
                Ok(false) => {}
                Err(error) => {
                    warn!("{} lookup of {} failed: {}", checker.provider(), ip, error);
                    result.error.get_or_insert(error);
                }
            }
        }

        result
    }
}

/// One worker per available core, never more than there are addresses to check.
fn worker_count(addresses: usize) -> usize {
    let cores = thread::available_parallelism().map_or(1, |cores| cores.get());
    cores.min(MAX_WORKERS).min(addresses).max(1)
}

/*-------------------------------------------------------------------------------------------------
  Unit Tests
-------------------------------------------------------------------------------------------------*/
