//! Product Advertising API 5.0 adapter.
//!
//! This module provides [`PaapiClient`], the [`ProductSearch`] implementation
//! backed by signed `SearchItems` calls:
//! - Request signing via [`signing`] (AWS SigV4)
//! - Response normalization and error classification via [`convert`]
//! - Locale table mapping a country code to host, region and marketplace

pub mod convert;
pub mod signing;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{json, Map, Value};
use std::time::Duration;
use tracing::debug;

use crate::config::ApiCredentials;
use crate::model::{Query, SearchPage};
use crate::traits::{ProductSearch, SearchError};

const TARGET_PREFIX: &str = "com.amazon.paapi5.v1.ProductAdvertisingAPIv1";

/// Resources requested for every search; one per extracted field.
pub const SEARCH_RESOURCES: [&str; 6] = [
    "BrowseNodeInfo.BrowseNodes",
    "Images.Primary.Large",
    "ItemInfo.Title",
    "ItemInfo.Features",
    "Offers.Listings.Price",
    "Offers.Listings.Availability.MaxOrderQuantity",
];

/// Largest page the provider serves.
pub const MAX_ITEM_COUNT: u32 = 10;

/// Highest page number the provider serves.
pub const MAX_ITEM_PAGE: u32 = 10;

#[derive(Debug, Clone, Copy)]
enum Operation {
    SearchItems,
    GetBrowseNodes,
}

impl Operation {
    fn path(self) -> &'static str {
        match self {
            Operation::SearchItems => "/paapi5/searchitems",
            Operation::GetBrowseNodes => "/paapi5/getbrowsenodes",
        }
    }

    fn target(self) -> String {
        let name = match self {
            Operation::SearchItems => "SearchItems",
            Operation::GetBrowseNodes => "GetBrowseNodes",
        };
        format!("{}.{}", TARGET_PREFIX, name)
    }
}

/// Endpoint data for one marketplace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Locale {
    pub host: &'static str,
    pub region: &'static str,
    pub marketplace: &'static str,
}

impl Locale {
    /// Looks up a two-letter country code (case-insensitive; `GB` = `UK`).
    pub fn for_country(country: &str) -> Option<Self> {
        let (host, region, marketplace) = match country.trim().to_ascii_uppercase().as_str() {
            "AU" => ("webservices.amazon.com.au", "us-west-2", "www.amazon.com.au"),
            "BR" => ("webservices.amazon.com.br", "us-east-1", "www.amazon.com.br"),
            "CA" => ("webservices.amazon.ca", "us-east-1", "www.amazon.ca"),
            "DE" => ("webservices.amazon.de", "eu-west-1", "www.amazon.de"),
            "ES" => ("webservices.amazon.es", "eu-west-1", "www.amazon.es"),
            "FR" => ("webservices.amazon.fr", "eu-west-1", "www.amazon.fr"),
            "IN" => ("webservices.amazon.in", "eu-west-1", "www.amazon.in"),
            "IT" => ("webservices.amazon.it", "eu-west-1", "www.amazon.it"),
            "JP" => ("webservices.amazon.co.jp", "us-west-2", "www.amazon.co.jp"),
            "MX" => ("webservices.amazon.com.mx", "us-east-1", "www.amazon.com.mx"),
            "NL" => ("webservices.amazon.nl", "eu-west-1", "www.amazon.nl"),
            "PL" => ("webservices.amazon.pl", "eu-west-1", "www.amazon.pl"),
            "SE" => ("webservices.amazon.se", "eu-west-1", "www.amazon.se"),
            "UK" | "GB" => ("webservices.amazon.co.uk", "eu-west-1", "www.amazon.co.uk"),
            "US" => ("webservices.amazon.com", "us-east-1", "www.amazon.com"),
            _ => return None,
        };
        Some(Self {
            host,
            region,
            marketplace,
        })
    }
}

/// Signed HTTP client for one marketplace and one credential.
pub struct PaapiClient {
    http: reqwest::Client,
    credentials: ApiCredentials,
    locale: Locale,
    search_index: Option<String>,
    timeout: Duration,
}

impl PaapiClient {
    pub fn new(credentials: ApiCredentials, locale: Locale, timeout: Duration) -> Result<Self, SearchError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("catalog-harvester/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| SearchError::Transport(e.to_string()))?;
        Ok(Self {
            http,
            credentials,
            locale,
            search_index: None,
            timeout,
        })
    }

    /// Restricts searches to one search index (e.g., "Beauty").
    pub fn with_search_index(mut self, search_index: Option<String>) -> Self {
        self.search_index = search_index;
        self
    }

    pub fn locale(&self) -> &Locale {
        &self.locale
    }

    /// Request body for one `SearchItems` page.
    ///
    /// Pages and page sizes the provider does not serve are rejected rather
    /// than rewritten, so no two pages ever map to the same request.
    pub fn search_body(&self, query: &Query, page: u32, item_count: u32) -> Result<Value, SearchError> {
        if !(1..=MAX_ITEM_PAGE).contains(&page) {
            return Err(SearchError::InvalidRequest(format!(
                "ItemPage {} is outside 1..={}",
                page, MAX_ITEM_PAGE
            )));
        }
        if !(1..=MAX_ITEM_COUNT).contains(&item_count) {
            return Err(SearchError::InvalidRequest(format!(
                "ItemCount {} is outside 1..={}",
                item_count, MAX_ITEM_COUNT
            )));
        }

        let mut body = Map::new();
        body.insert("PartnerTag".into(), json!(self.credentials.partner_tag));
        body.insert("PartnerType".into(), json!("Associates"));
        body.insert("Marketplace".into(), json!(self.locale.marketplace));
        match query {
            Query::Category(id) => body.insert("BrowseNodeId".into(), json!(id)),
            Query::Keywords(kw) => body.insert("Keywords".into(), json!(kw)),
        };
        if let Some(index) = &self.search_index {
            body.insert("SearchIndex".into(), json!(index));
        }
        body.insert("ItemCount".into(), json!(item_count));
        body.insert("ItemPage".into(), json!(page));
        body.insert("Resources".into(), json!(SEARCH_RESOURCES));
        Ok(Value::Object(body))
    }

    async fn post(&self, operation: Operation, body: &Value) -> Result<(u16, String), SearchError> {
        let payload = body.to_string();
        let target = operation.target();
        let signed = signing::sign(
            &signing::SigningInput {
                access_key: &self.credentials.access_key,
                secret_key: &self.credentials.secret_key,
                region: self.locale.region,
                host: self.locale.host,
                path: operation.path(),
                target: &target,
                payload: &payload,
            },
            Utc::now(),
        );

        let url = format!("https://{}{}", self.locale.host, operation.path());
        let response = self
            .http
            .post(&url)
            .header("content-encoding", signing::CONTENT_ENCODING)
            .header("content-type", "application/json; charset=utf-8")
            .header("host", self.locale.host)
            .header("x-amz-date", &signed.amz_date)
            .header("x-amz-target", &target)
            .header("authorization", &signed.authorization)
            .body(payload)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status().as_u16();
        let text = response.text().await.map_err(|e| self.transport_error(e))?;
        debug!(status, bytes = text.len(), operation = ?operation, "Provider responded");
        Ok((status, text))
    }

    fn transport_error(&self, e: reqwest::Error) -> SearchError {
        if e.is_timeout() {
            SearchError::Timeout(self.timeout.as_secs())
        } else {
            SearchError::Transport(e.to_string())
        }
    }

    /// Ids of the direct children of `node_id` in the browse tree.
    pub async fn child_node_ids(&self, node_id: &str) -> Result<Vec<String>, SearchError> {
        let body = json!({
            "BrowseNodeIds": [node_id],
            "Resources": ["BrowseNodes.Children"],
            "PartnerTag": self.credentials.partner_tag,
            "PartnerType": "Associates",
            "Marketplace": self.locale.marketplace,
        });
        let (status, text) = self.post(Operation::GetBrowseNodes, &body).await?;
        convert::parse_browse_node_children(status, &text)
    }
}

#[async_trait]
impl ProductSearch for PaapiClient {
    fn provider_id(&self) -> &str {
        "paapi5"
    }

    fn max_page(&self) -> Option<u32> {
        Some(MAX_ITEM_PAGE)
    }

    fn max_item_count(&self) -> Option<u32> {
        Some(MAX_ITEM_COUNT)
    }

    async fn search(
        &self,
        query: &Query,
        page: u32,
        item_count: u32,
    ) -> Result<SearchPage, SearchError> {
        let body = self.search_body(query, page, item_count)?;
        let (status, text) = self.post(Operation::SearchItems, &body).await?;
        convert::parse_search_response(status, &text)
    }
}
