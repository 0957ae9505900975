use crate::core::errors::{Error, Result};
use crate::core::http::HttpClient;
use lazy_static::lazy_static;
use log::info;
use regex::Regex;
use std::fmt;
use std::sync::Arc;

/*-------------------------------------------------------------------------------------------------
  URL Source
-------------------------------------------------------------------------------------------------*/

pub type DiscoverFn = dyn Fn() -> Result<String> + Send + Sync;

/// Where a provider's snapshot is published: a fixed URL, or a function that finds the current
/// URL (Azure rotates its download link with every weekly publication).
#[derive(Clone)]
pub enum UrlSource {
    Fixed(String),
    Discover(Arc<DiscoverFn>),
}

impl UrlSource {
    pub fn discover<F>(discover: F) -> Self
    where
        F: Fn() -> Result<String> + Send + Sync + 'static,
    {
        UrlSource::Discover(Arc::new(discover))
    }

    pub fn resolve(&self) -> Result<String> {
        match self {
            UrlSource::Fixed(url) => Ok(url.clone()),
            UrlSource::Discover(discover) => discover(),
        }
    }
}

impl fmt::Debug for UrlSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UrlSource::Fixed(url) => f.debug_tuple("Fixed").field(url).finish(),
            UrlSource::Discover(_) => f.write_str("Discover(..)"),
        }
    }
}

impl From<&str> for UrlSource {
    fn from(url: &str) -> Self {
        UrlSource::Fixed(url.to_string())
    }
}

/*-------------------------------------------------------------------------------------------------
  Azure Discovery
-------------------------------------------------------------------------------------------------*/

lazy_static! {
    static ref AZURE_SERVICE_TAGS_LINK: Regex = Regex::new(
        r#"https://download\.microsoft\.com/[^"'\s<>]*ServiceTags_Public_[^"'\s<>]*\.json"#
    )
    .expect("Invalid Regex");
}

/// A [UrlSource] that scrapes the Azure Service Tags landing page for the current download link.
pub fn azure_service_tags(client: HttpClient, landing_url: &str) -> UrlSource {
    let landing_url = landing_url.to_string();
    UrlSource::discover(move || discover_azure_url(&client, &landing_url))
}

/// Fetch `landing_url` and return the first `ServiceTags_Public_*.json` download link on it.
pub fn discover_azure_url(client: &HttpClient, landing_url: &str) -> Result<String> {
    let page = client.get_text(landing_url)?;
    find_service_tags_link(&page)
        .map(str::to_string)
        .inspect(|url| info!("Discovered Azure Service Tags URL: {}", url))
        .ok_or_else(|| Error::upstream(landing_url, "no Service Tags download link found"))
}

fn find_service_tags_link(page: &str) -> Option<&str> {
    AZURE_SERVICE_TAGS_LINK.find(page).map(|link| link.as_str())
}

/*-------------------------------------------------------------------------------------------------
  Unit Tests
-------------------------------------------------------------------------------------------------*/

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::http::tests::{test_config, MockUpstream};
    use tempfile::TempDir;
    use test_log::test;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, ResponseTemplate};

    const LANDING_PAGE: &str = r#"<html><body>
        <a href="https://www.microsoft.com/en-us/download/confirmation.aspx?id=56519">Download</a>
        <a href="https://download.microsoft.com/download/7/1/D/71D86715-5596-4529-9B13-DA13A5DE5B63/ServiceTags_Public_20240916.json" class="mscom-link">click here</a>
        <a href="https://download.microsoft.com/download/7/1/D/71D86715-5596-4529-9B13-DA13A5DE5B63/ServiceTags_Public_20240909.json">older</a>
    </body></html>"#;

    #[test]
    fn test_find_service_tags_link() {
        assert_eq!(
            find_service_tags_link(LANDING_PAGE),
            Some("https://download.microsoft.com/download/7/1/D/71D86715-5596-4529-9B13-DA13A5DE5B63/ServiceTags_Public_20240916.json")
        );
        assert_eq!(find_service_tags_link("<html>moved</html>"), None);
    }

    #[test]
    fn test_fixed_url_source() {
        let source = UrlSource::from("https://www.gstatic.com/ipranges/cloud.json");
        assert_eq!(
            source.resolve().unwrap(),
            "https://www.gstatic.com/ipranges/cloud.json"
        );
    }

    #[test]
    fn test_discover_azure_url() {
        let upstream = MockUpstream::start();
        upstream.mount(
            Mock::given(method("GET"))
                .and(path("/details.aspx"))
                .respond_with(ResponseTemplate::new(200).set_body_string(LANDING_PAGE)),
        );
        upstream.mount(
            Mock::given(method("GET"))
                .and(path("/moved.aspx"))
                .respond_with(ResponseTemplate::new(200).set_body_string("<html></html>")),
        );

        let dir = TempDir::new().unwrap();
        let client = HttpClient::new(&test_config(dir.path())).unwrap();

        let source = azure_service_tags(client.clone(), &upstream.url("/details.aspx"));
        assert!(source.resolve().unwrap().ends_with("ServiceTags_Public_20240916.json"));

        let source = azure_service_tags(client, &upstream.url("/moved.aspx"));
        assert!(matches!(source.resolve(), Err(Error::Upstream { .. })));
    }
}
