use crate::core::address_family::{canonical, AddressFamily};
use crate::core::errors::{Error, Result};
use crate::core::json::{self, JsonPrefixes};
use crate::core::prefix_trie::{family_of_network, InsertOutcome, PrefixTrie};
use crate::core::provider::Provider;
use ipnetwork::IpNetwork;
use log::{debug, info, warn};
use std::fs;
use std::io::ErrorKind;
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/*-------------------------------------------------------------------------------------------------
  Provider Dataset
-------------------------------------------------------------------------------------------------*/

/// One provider's decoded range list: the raw prefix strings and the two tries built from
/// them. Immutable once built and safe to share across threads.
#[derive(Debug, Clone)]
pub struct ProviderDataset {
    provider: Provider,
    version: Option<String>,
    ipv4_prefixes: Vec<String>,
    ipv6_prefixes: Vec<String>,
    ipv4_trie: PrefixTrie,
    ipv6_trie: PrefixTrie,
    stats: InsertStats,
}

/// Counts of [InsertOutcome]s seen while building a dataset.
#[derive(Debug, Clone, Copy, Default, Eq, PartialEq)]
pub struct InsertStats {
    pub inserted: usize,
    pub duplicate: usize,
    pub covered: usize,
    pub invalid: usize,
}

impl InsertStats {
    fn record(&mut self, outcome: InsertOutcome) {
        match outcome {
            InsertOutcome::Inserted => self.inserted += 1,
            InsertOutcome::Duplicate => self.duplicate += 1,
            InsertOutcome::Covered => self.covered += 1,
            InsertOutcome::Invalid | InsertOutcome::WrongFamily => self.invalid += 1,
        }
    }
}

/*--------------------------------------------------------------------------------------
  Provider Dataset Implementation
--------------------------------------------------------------------------------------*/

impl ProviderDataset {
    /// Read and decode the snapshot at `snapshot_path` using the provider's schema.
    ///
    /// Returns [Error::NotFound] if the file is absent and [Error::Decode] if its content does
    /// not match the schema.
    pub fn load(provider: Provider, snapshot_path: &Path) -> Result<ProviderDataset> {
        let json = fs::read_to_string(snapshot_path).map_err(|error| match error.kind() {
            ErrorKind::NotFound => Error::NotFound(snapshot_path.to_path_buf()),
            _ => Error::persistence(snapshot_path, error),
        })?;

        let prefixes = json::parse(provider, &json)
            .map_err(|error| Error::decode(snapshot_path, format!("{provider} schema: {error}")))?;

        let dataset = ProviderDataset::from_prefixes(provider, prefixes);
        info!(
            "Loaded {} snapshot from {:?}: {} IPv4 and {} IPv6 prefixes",
            provider,
            snapshot_path,
            dataset.ipv4_prefixes.len(),
            dataset.ipv6_prefixes.len()
        );
        Ok(dataset)
    }

    /// Build a dataset from prefix lists already extracted from a snapshot.
    pub fn from_prefixes(provider: Provider, prefixes: JsonPrefixes<'_>) -> ProviderDataset {
        let mut dataset = ProviderDataset {
            provider,
            version: prefixes.version,
            ipv4_prefixes: Vec::new(),
            ipv6_prefixes: Vec::new(),
            ipv4_trie: PrefixTrie::new(AddressFamily::IPv4),
            ipv6_trie: PrefixTrie::new(AddressFamily::IPv6),
            stats: InsertStats::default(),
        };

        let declared = prefixes
            .ipv4_prefixes
            .into_iter()
            .map(|prefix| (prefix, Some(AddressFamily::IPv4)))
            .chain(
                prefixes
                    .ipv6_prefixes
                    .into_iter()
                    .map(|prefix| (prefix, Some(AddressFamily::IPv6))),
            )
            .chain(prefixes.mixed_prefixes.into_iter().map(|prefix| (prefix, None)));

        for (prefix, family) in declared {
            dataset.add_prefix(prefix, family);
        }

        if dataset.stats.invalid > 0 {
            warn!(
                "Ignored {} invalid {} prefix(es)",
                dataset.stats.invalid, provider
            );
        }
        debug!("{} trie build: {:?}", provider, dataset.stats);

        dataset
    }

    fn add_prefix(&mut self, prefix: &str, declared: Option<AddressFamily>) {
        // A mapped IPv6 block is listed as IPv6 but stored in the IPv4 trie.
        let (listed, family) = match prefix.trim().parse::<IpNetwork>() {
            Ok(IpNetwork::V4(_)) => (AddressFamily::IPv4, AddressFamily::IPv4),
            Ok(IpNetwork::V6(network)) => (AddressFamily::IPv6, family_of_network(&network.into())),
            Err(error) => {
                warn!("Invalid {} CIDR {:?}: {}", self.provider, prefix, error);
                self.stats.record(InsertOutcome::Invalid);
                return;
            }
        };

        if declared.is_some_and(|declared| declared != listed) {
            warn!(
                "{} prefix {:?} listed under the wrong address family",
                self.provider, prefix
            );
        }

        let (trie, prefixes) = match family {
            AddressFamily::IPv4 => (&mut self.ipv4_trie, &mut self.ipv4_prefixes),
            AddressFamily::IPv6 => (&mut self.ipv6_trie, &mut self.ipv6_prefixes),
        };

        let outcome = trie.insert(prefix);
        if outcome == InsertOutcome::Invalid {
            warn!("Invalid {} CIDR {:?}", self.provider, prefix);
        } else {
            prefixes.push(prefix.trim().to_string());
        }
        self.stats.record(outcome);
    }

    /*-------------------------------------------------------------------------
      Getters
    -------------------------------------------------------------------------*/

    pub fn provider(&self) -> Provider {
        self.provider
    }

    /// Publisher's version marker for the snapshot, when the schema carries one.
    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    pub fn ipv4_prefixes(&self) -> &[String] {
        &self.ipv4_prefixes
    }

    pub fn ipv6_prefixes(&self) -> &[String] {
        &self.ipv6_prefixes
    }

    pub fn stats(&self) -> InsertStats {
        self.stats
    }

    /// `true` when the snapshot yielded no usable prefixes.
    pub fn is_empty(&self) -> bool {
        self.ipv4_prefixes.is_empty() && self.ipv6_prefixes.is_empty()
    }

    /// Trie for the given address family.
    pub fn trie(&self, family: AddressFamily) -> &PrefixTrie {
        match family {
            AddressFamily::IPv4 => &self.ipv4_trie,
            AddressFamily::IPv6 => &self.ipv6_trie,
        }
    }

    /*-------------------------------------------------------------------------
      Membership
    -------------------------------------------------------------------------*/

    /// Stored block containing `address`, routed to the trie of the address's family.
    pub fn matching_prefix(&self, address: &IpAddr) -> Option<&str> {
        let address = canonical(address);
        self.trie(AddressFamily::of(&address))
            .matching_prefix(&address)
    }

    pub fn contains(&self, address: &IpAddr) -> bool {
        self.matching_prefix(address).is_some()
    }
}

/*-------------------------------------------------------------------------------------------------
  Dataset Cache
-------------------------------------------------------------------------------------------------*/

/// Memoizes the [ProviderDataset] decoded from one snapshot file for the process lifetime.
/// The snapshot is re-read only while the cached dataset is absent or empty.
#[derive(Debug)]
pub struct DatasetCache {
    provider: Provider,
    snapshot_path: PathBuf,
    cached: Mutex<Option<Arc<ProviderDataset>>>,
}

impl DatasetCache {
    pub fn new(provider: Provider, snapshot_path: impl Into<PathBuf>) -> Self {
        Self {
            provider,
            snapshot_path: snapshot_path.into(),
            cached: Mutex::new(None),
        }
    }

    pub fn snapshot_path(&self) -> &Path {
        &self.snapshot_path
    }

    pub fn load(&self) -> Result<Arc<ProviderDataset>> {
        let mut cached = self
            .cached
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        if let Some(dataset) = cached.as_ref().filter(|dataset| !dataset.is_empty()) {
            debug!("Using cached {} dataset", self.provider);
            return Ok(Arc::clone(dataset));
        }

        let dataset = Arc::new(ProviderDataset::load(self.provider, &self.snapshot_path)?);
        *cached = Some(Arc::clone(&dataset));
        Ok(dataset)
    }
}

/*-------------------------------------------------------------------------------------------------
  Unit Tests
-------------------------------------------------------------------------------------------------*/
