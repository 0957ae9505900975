/*-------------------------------------------------------------------------------------------------
  Core Modules
-------------------------------------------------------------------------------------------------*/

pub mod address_family;
pub mod checker;
pub mod config;
pub mod dataset;
pub mod datetime;
pub mod discovery;
pub mod dispatcher;
pub mod errors;
pub mod freshness;
pub mod http;
pub mod json;
pub mod metadata;
pub mod prefix_trie;
pub mod provider;
pub mod utils;
