use serde::{Deserialize, Serialize};

/// A retail region (storefront) such as mainland China or Hong Kong.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Region {
    pub id: String,
    pub title: String,
    /// Explicit storefront root, e.g. `https://www.apple.com.cn`. When absent the
    /// prober derives it from its base URL and the region id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storefront: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Store {
    pub id: String,
    pub title: String,
    pub region_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Product {
    pub id: String,
    pub title: String,
    pub region_id: String,
}

impl Region {
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            storefront: None,
        }
    }

    pub fn with_storefront(mut self, storefront: impl Into<String>) -> Self {
        self.storefront = Some(storefront.into());
        self
    }
}

impl Store {
    pub fn new(id: impl Into<String>, title: impl Into<String>, region: &Region) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            region_id: region.id.clone(),
        }
    }
}

impl Product {
    pub fn new(id: impl Into<String>, title: impl Into<String>, region: &Region) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            region_id: region.id.clone(),
        }
    }
}
