use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use url::Url;

use crate::config::ProberConfig;
use crate::models::{Availability, Region, WatchItem};
use crate::utils::error::Result;

/// Result of one probe: the tri-state answer plus the link to act on it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProbeOutcome {
    pub availability: Availability,
    pub cart_url: Option<String>,
    pub detail: Option<String>,
}

impl ProbeOutcome {
    pub fn available(cart_url: impl Into<String>) -> Self {
        Self {
            availability: Availability::Available,
            cart_url: Some(cart_url.into()),
            detail: None,
        }
    }

    pub fn unavailable() -> Self {
        Self {
            availability: Availability::Unavailable,
            cart_url: None,
            detail: None,
        }
    }

    pub fn indeterminate(detail: impl Into<String>) -> Self {
        Self {
            availability: Availability::Indeterminate,
            cart_url: None,
            detail: Some(detail.into()),
        }
    }
}

/// Answers "is this item purchasable right now?".
///
/// Implementations never fail: anything that prevents a definite answer is
/// reported as `Availability::Indeterminate`.
#[async_trait]
pub trait AvailabilityProber: Send + Sync {
    async fn probe(&self, item: &WatchItem, timeout: Duration) -> ProbeOutcome;
}

#[derive(Debug, Deserialize)]
struct FulfillmentResponse {
    body: FulfillmentBody,
}

#[derive(Debug, Deserialize)]
struct FulfillmentBody {
    content: FulfillmentContent,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FulfillmentContent {
    pickup_message: PickupMessage,
}

#[derive(Debug, Deserialize)]
struct PickupMessage {
    #[serde(default)]
    stores: Vec<StoreAvailability>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoreAvailability {
    store_number: String,
    #[serde(default)]
    parts_availability: HashMap<String, PartAvailability>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PartAvailability {
    pickup_display: String,
}

/// Prober against the storefront's fulfillment-messages endpoint.
pub struct HttpProber {
    client: Client,
    config: ProberConfig,
}

impl HttpProber {
    pub fn new(config: ProberConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(config.request_timeout())
            .build()?;

        Ok(Self { client, config })
    }

    pub fn storefront(&self, region: &Region) -> String {
        match &region.storefront {
            Some(storefront) => storefront.trim_end_matches('/').to_string(),
            None if region.id.is_empty() => self.config.base_url.trim_end_matches('/').to_string(),
            None => format!("{}/{}", self.config.base_url.trim_end_matches('/'), region.id),
        }
    }

    pub fn cart_url(&self, region: &Region) -> String {
        format!("{}/shop/bag", self.storefront(region))
    }

    pub fn availability_url(&self, item: &WatchItem) -> Result<Url> {
        let endpoint = format!("{}/shop/fulfillment-messages", self.storefront(&item.region));
        let url = Url::parse_with_params(
            &endpoint,
            &[
                ("pl", "true"),
                ("mts.0", "regular"),
                ("parts.0", item.product.id.as_str()),
                ("store", item.store.id.as_str()),
            ],
        )?;
        Ok(url)
    }

    fn evaluate(payload: &FulfillmentResponse, store_id: &str, product_id: &str) -> Availability {
        let store = payload
            .body
            .content
            .pickup_message
            .stores
            .iter()
            .find(|s| s.store_number == store_id);

        match store.and_then(|s| s.parts_availability.get(product_id)) {
            Some(part) if part.pickup_display == "available" => Availability::Available,
            Some(_) => Availability::Unavailable,
            None => Availability::Indeterminate,
        }
    }
}

#[async_trait]
impl AvailabilityProber for HttpProber {
    async fn probe(&self, item: &WatchItem, timeout: Duration) -> ProbeOutcome {
        let url = match self.availability_url(item) {
            Ok(url) => url,
            Err(e) => return ProbeOutcome::indeterminate(format!("bad probe URL: {}", e)),
        };

        let response = match self.client.get(url).timeout(timeout).send().await {
            Ok(response) => response,
            Err(e) => return ProbeOutcome::indeterminate(format!("request failed: {}", e)),
        };

        if !response.status().is_success() {
            return ProbeOutcome::indeterminate(format!("unexpected status {}", response.status()));
        }

        let payload: FulfillmentResponse = match response.json().await {
            Ok(payload) => payload,
            Err(e) => return ProbeOutcome::indeterminate(format!("malformed payload: {}", e)),
        };

        match Self::evaluate(&payload, &item.store.id, &item.product.id) {
            Availability::Available => ProbeOutcome::available(self.cart_url(&item.region)),
            Availability::Unavailable => ProbeOutcome::unavailable(),
            Availability::Indeterminate => {
                ProbeOutcome::indeterminate("store or part missing from payload")
            }
        }
    }
}
