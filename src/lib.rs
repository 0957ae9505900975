/*!
Check whether IP addresses belong to the published address space of AWS, Google Cloud, or Azure.

Each provider's published range list is cached on local disk and kept fresh with a conditional
`Last-Modified` check against the publisher. The cached prefixes are loaded into a binary prefix
trie per address family, so every lookup costs at most one walk of the address bits.

```no_run
let results = cloudip::check_ips(&["3.5.140.1", "34.80.0.1", "192.168.0.1"]).unwrap();

for result in results {
    match (result.provider, result.error) {
        (Some(provider), _) => println!("{} {}", result.ip, provider),
        (None, Some(error)) => println!("{} ERROR ({})", result.ip, error),
        (None, None) => println!("{} unknown", result.ip),
    }
}
```
*/

mod core;

/*-------------------------------------------------------------------------------------------------
  Library Interface
-------------------------------------------------------------------------------------------------*/

pub use crate::core::address_family::AddressFamily;
pub use crate::core::checker::ProviderChecker;
pub use crate::core::config::{Config, ConfigBuilder};
pub use crate::core::dataset::{DatasetCache, InsertStats, ProviderDataset};
pub use crate::core::discovery::UrlSource;
pub use crate::core::dispatcher::{CheckResult, Dispatcher};
pub use crate::core::errors::{Error, Result};
pub use crate::core::freshness::{CacheState, Freshness, FreshnessController};
pub use crate::core::http::HttpClient;
pub use crate::core::metadata::CacheMetadata;
pub use crate::core::prefix_trie::{InsertOutcome, PrefixTrie};
pub use crate::core::provider::Provider;

/*-------------------------------------------------------------------------------------------------
  Simple Interface
-------------------------------------------------------------------------------------------------*/

/// _**Simple library interface**_ checks `ips` against every provider using the configuration
/// from `CLOUDIP_*` environment variables and defaults. Fails only when the configuration is
/// unusable; per-address failures are reported in each [CheckResult].
pub fn check_ips<S: AsRef<str> + Sync>(ips: &[S]) -> Result<Vec<CheckResult>> {
    let config = Config::new()?;
    let dispatcher = Dispatcher::new(&config)?;
    Ok(dispatcher.check(ips))
}
