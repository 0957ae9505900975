use crate::core::provider::Provider;
use serde::{Deserialize, Serialize};

/*-------------------------------------------------------------------------------------------------
  Parse JSON
-------------------------------------------------------------------------------------------------*/

/// Prefix strings extracted from a provider snapshot, before any CIDR validation.
#[derive(Debug, Default, Eq, PartialEq)]
pub struct JsonPrefixes<'j> {
    /// Publisher's version marker (AWS and GCP `syncToken`, Azure `changeNumber`).
    pub version: Option<String>,

    /// Prefixes the schema declares as IPv4.
    pub ipv4_prefixes: Vec<&'j str>,

    /// Prefixes the schema declares as IPv6.
    pub ipv6_prefixes: Vec<&'j str>,

    /// Prefixes of either family (Azure does not separate them).
    pub mixed_prefixes: Vec<&'j str>,
}

/// Decode a snapshot using the provider's schema and reduce it to prefix lists.
pub fn parse(provider: Provider, json: &str) -> serde_json::Result<JsonPrefixes<'_>> {
    Ok(match provider {
        Provider::Aws => serde_json::from_str::<JsonAwsIpRanges>(json)?.into(),
        Provider::Gcp => serde_json::from_str::<JsonGcpIpRanges>(json)?.into(),
        Provider::Azure => serde_json::from_str::<JsonAzureServiceTags>(json)?.into(),
    })
}

/*-------------------------------------------------------------------------------------------------
  JSON Data Structures
-------------------------------------------------------------------------------------------------*/

/*--------------------------------------------------------------------------------------
  AWS IP Ranges
--------------------------------------------------------------------------------------*/

#[derive(Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct JsonAwsIpRanges<'j> {
    #[serde(rename = "syncToken")]
    pub sync_token: &'j str,

    #[serde(rename = "createDate")]
    pub create_date: &'j str,

    #[serde(borrow)]
    pub prefixes: Vec<JsonAwsIpPrefix<'j>>,

    #[serde(borrow)]
    pub ipv6_prefixes: Vec<JsonAwsIpv6Prefix<'j>>,
}

#[derive(Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct JsonAwsIpPrefix<'j> {
    pub ip_prefix: &'j str,
    pub region: &'j str,
    pub network_border_group: &'j str,
    pub service: &'j str,
}

#[derive(Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct JsonAwsIpv6Prefix<'j> {
    pub ipv6_prefix: &'j str,
    pub region: &'j str,
    pub network_border_group: &'j str,
    pub service: &'j str,
}

impl<'j> From<JsonAwsIpRanges<'j>> for JsonPrefixes<'j> {
    fn from(ranges: JsonAwsIpRanges<'j>) -> Self {
        JsonPrefixes {
            version: Some(ranges.sync_token.to_string()),
            ipv4_prefixes: ranges.prefixes.iter().map(|prefix| prefix.ip_prefix).collect(),
            ipv6_prefixes: ranges
                .ipv6_prefixes
                .iter()
                .map(|prefix| prefix.ipv6_prefix)
                .collect(),
            mixed_prefixes: Vec::new(),
        }
    }
}

/*--------------------------------------------------------------------------------------
  GCP IP Ranges
--------------------------------------------------------------------------------------*/

#[derive(Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct JsonGcpIpRanges<'j> {
    #[serde(rename = "syncToken")]
    pub sync_token: &'j str,

    #[serde(rename = "creationTime")]
    pub creation_time: &'j str,

    #[serde(borrow)]
    pub prefixes: Vec<JsonGcpPrefix<'j>>,
}

#[derive(Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct JsonGcpPrefix<'j> {
    #[serde(rename = "ipv4Prefix", borrow, default, skip_serializing_if = "Option::is_none")]
    pub ipv4_prefix: Option<&'j str>,

    #[serde(rename = "ipv6Prefix", borrow, default, skip_serializing_if = "Option::is_none")]
    pub ipv6_prefix: Option<&'j str>,

    #[serde(borrow, default)]
    pub service: Option<&'j str>,

    #[serde(borrow, default)]
    pub scope: Option<&'j str>,
}

impl<'j> From<JsonGcpIpRanges<'j>> for JsonPrefixes<'j> {
    fn from(ranges: JsonGcpIpRanges<'j>) -> Self {
        JsonPrefixes {
            version: Some(ranges.sync_token.to_string()),
            ipv4_prefixes: ranges
                .prefixes
                .iter()
                .filter_map(|prefix| prefix.ipv4_prefix)
                .collect(),
            ipv6_prefixes: ranges
                .prefixes
                .iter()
                .filter_map(|prefix| prefix.ipv6_prefix)
                .collect(),
            mixed_prefixes: Vec::new(),
        }
    }
}

/*--------------------------------------------------------------------------------------
  Azure Service Tags
--------------------------------------------------------------------------------------*/

#[derive(Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct JsonAzureServiceTags<'j> {
    #[serde(rename = "changeNumber")]
    pub change_number: i64,

    pub cloud: String,

    #[serde(borrow)]
    pub values: Vec<JsonAzureServiceTag<'j>>,
}

#[derive(Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct JsonAzureServiceTag<'j> {
    pub name: String,

    #[serde(borrow)]
    pub properties: JsonAzureProperties<'j>,
}

#[derive(Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct JsonAzureProperties<'j> {
    #[serde(rename = "changeNumber", default)]
    pub change_number: i64,

    #[serde(default)]
    pub region: String,

    #[serde(rename = "systemService", default)]
    pub system_service: String,

    #[serde(rename = "addressPrefixes", borrow)]
    pub address_prefixes: Vec<&'j str>,
}

impl<'j> From<JsonAzureServiceTags<'j>> for JsonPrefixes<'j> {
    fn from(tags: JsonAzureServiceTags<'j>) -> Self {
        JsonPrefixes {
            version: Some(tags.change_number.to_string()),
            ipv4_prefixes: Vec::new(),
            ipv6_prefixes: Vec::new(),
            mixed_prefixes: tags
                .values
                .into_iter()
                .flat_map(|tag| tag.properties.address_prefixes)
                .collect(),
        }
    }
}

/*-------------------------------------------------------------------------------------------------
  Unit Tests
-------------------------------------------------------------------------------------------------*/
