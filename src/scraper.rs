use crate::parser::{feature_page_links, find_feature_link, parse_sections};
use crate::query::{Query, QueryError};
use crate::types::{PageView, Panels};

use reqwest::blocking::Client;
use reqwest::header::CONTENT_TYPE;
use std::time::Duration;
use url::Url;

const SEARCH_PATH: &str = "/primarySequenceFeature/list";

#[derive(Debug, thiserror::Error)]
pub enum ScraperError {
    #[error("Invalid query: {0}")]
    InvalidQuery(#[from] QueryError),
    #[error("Connecting to {url} failed ({reason}). Make sure the URL is set correctly and is reachable")]
    Connection { url: String, reason: String },
    #[error("Not connected. Call connect() before submitting a query")]
    NotConnected,
    #[error("No feature link matching '{0}' on the search result page")]
    FeatureNotFound(String),
    #[error("Search returned {count} features; give a feature term to pick one")]
    AmbiguousFeature { count: usize },
    #[error("Could not open {url}: {reason}")]
    BadResponse { url: String, reason: String },
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),
    #[error("Invalid URL: {0}")]
    UrlError(#[from] url::ParseError),
}

/// Scraper for the pseudomonas.com feature pages.
///
/// Every request is a blocking GET issued one after the other. A query can
/// only be run once [`PdcScraper::connect`] has reached the site.
#[derive(Debug, Clone)]
pub struct PdcScraper {
    client: Client,
    base_url: Url,
    query: Query,
    connected: bool,
}

impl PdcScraper {
    pub fn new(query: Option<Query>) -> Result<Self, ScraperError> {
        Self::with_base_url(crate::BASE_URL, query)
    }

    pub fn with_base_url(base_url: &str, query: Option<Query>) -> Result<Self, ScraperError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(format!(
                "{}/{}",
                env!("CARGO_PKG_NAME"),
                env!("CARGO_PKG_VERSION")
            ))
            .build()?;

        Ok(Self {
            client,
            base_url: Url::parse(base_url)?,
            query: query.unwrap_or_default(),
            connected: false,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn query(&self) -> &Query {
        &self.query
    }

    pub fn set_query(&mut self, query: Query) {
        self.query = query;
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn connect(&mut self) -> Result<(), ScraperError> {
        self.connected = false;
        let url = self.base_url.clone();

        self.get_html(&url)
            .map_err(|e| ScraperError::Connection {
                url: url.to_string(),
                reason: e.to_string(),
            })?;

        log::info!("Connected to {}", url);
        self.connected = true;
        Ok(())
    }

    /// Runs the stored query, or `query` if given (it replaces the stored one),
    /// and returns the tables from the feature's overview and functions pages.
    pub fn run_query(&mut self, query: Option<Query>) -> Result<Panels, ScraperError> {
        if !self.connected {
            return Err(ScraperError::NotConnected);
        }
        if let Some(query) = query {
            self.query = query;
        }

        let feature_url = self.locate_feature()?;

        log::info!("Fetching feature overview: {}", feature_url);
        let html = self.get_html(&feature_url)?;
        let mut panels = parse_sections(&html, PageView::Overview);

        let functions_url = functions_view_url(&feature_url);
        log::info!("Fetching feature functions: {}", functions_url);
        let html = self.get_html(&functions_url)?;
        panels.extend(parse_sections(&html, PageView::Functions));

        Ok(panels)
    }

    /// Runs the search for the stored query and resolves the feature detail
    /// link against the base URL.
    pub fn locate_feature(&self) -> Result<Url, ScraperError> {
        if !self.connected {
            return Err(ScraperError::NotConnected);
        }

        let search_url = self.search_url()?;
        let html = self.get_html(&search_url)?;

        let href = match self.feature_term() {
            Some(feature) => find_feature_link(&html, feature)
                .ok_or_else(|| ScraperError::FeatureNotFound(feature.to_string()))?,
            None => {
                let mut links = feature_page_links(&html);
                match links.len() {
                    0 => {
                        return Err(ScraperError::FeatureNotFound("any feature".to_string()));
                    }
                    1 => links.remove(0),
                    count => return Err(ScraperError::AmbiguousFeature { count }),
                }
            }
        };

        Ok(self.base_url.join(&href)?)
    }

    /// `{base}/primarySequenceFeature/list?c1=name&v1={feature}&e1=1&term…&assembly=complete`
    pub fn search_url(&self) -> Result<Url, ScraperError> {
        let mut url = self.base_url.join(SEARCH_PATH)?;
        {
            let mut pairs = url.query_pairs_mut();
            pairs
                .append_pair("c1", "name")
                .append_pair("v1", self.feature_term().unwrap_or(""))
                .append_pair("e1", "1");
            if let Some(strain) = self.query.strain() {
                pairs.append_pair("term1", strain);
            } else if let Some(organism) = self.query.organism() {
                pairs.append_pair("term2", organism);
            }
            pairs.append_pair("assembly", "complete");
        }
        Ok(url)
    }

    /// The feature term with surrounding whitespace removed; blank counts as absent.
    fn feature_term(&self) -> Option<&str> {
        self.query.feature().map(str::trim).filter(|f| !f.is_empty())
    }

    fn get_html(&self, url: &Url) -> Result<String, ScraperError> {
        log::debug!("Will now open {}", url);

        let response = self
            .client
            .get(url.clone())
            .send()
            .inspect_err(|e| log::error!("HTTP error: {e:?}"))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ScraperError::BadResponse {
                url: url.to_string(),
                reason: format!("status {}", status),
            });
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_lowercase();
        if !content_type.contains("html") {
            return Err(ScraperError::BadResponse {
                url: url.to_string(),
                reason: format!("expected HTML, got content type '{}'", content_type),
            });
        }

        let html = response
            .text()
            .inspect_err(|e| log::error!("Decode error: {e:?}"))?;
        log::info!("Good response from {}", url);
        Ok(html)
    }
}

/// The feature link switched to the "Function/Pathways/GO" tab.
fn functions_view_url(feature_url: &Url) -> Url {
    let kept: Vec<(String, String)> = feature_url
        .query_pairs()
        .filter(|(k, _)| *k != "view")
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    let mut url = feature_url.clone();
    url.query_pairs_mut()
        .clear()
        .extend_pairs(kept)
        .append_pair("view", "functions");
    url
}
