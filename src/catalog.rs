use serde::{Deserialize, Serialize};
use std::path::Path;
use validator::Validate;

use crate::models::{Product, Region, Store};
use crate::utils::error::{AppError, Result};

/// A user's region/store/product selection, expressed as display titles.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq, Validate)]
pub struct Selection {
    #[validate(length(min = 1, message = "Please select a region"))]
    pub region: String,
    #[validate(length(min = 1, message = "Please select a pick-up store"))]
    pub store: String,
    #[validate(length(min = 1, message = "Please select a product"))]
    pub product: String,
}

impl Selection {
    pub fn new(
        region: impl Into<String>,
        store: impl Into<String>,
        product: impl Into<String>,
    ) -> Self {
        Self {
            region: region.into(),
            store: store.into(),
            product: product.into(),
        }
    }
}

/// Reference data: regions and the stores/products offered in each.
///
/// The engine never hardcodes any of this; it only receives entities that
/// were resolved here.
pub trait Catalog: Send + Sync {
    fn regions(&self) -> Vec<Region>;
    fn stores_in_region(&self, region_id: &str) -> Vec<Store>;
    fn products_in_region(&self, region_id: &str) -> Vec<Product>;

    fn default_region(&self) -> Option<Region> {
        self.regions().into_iter().next()
    }

    fn region_by_title(&self, title: &str) -> Option<Region> {
        self.regions().into_iter().find(|r| r.title == title)
    }

    /// Ordered store display names for a region title.
    fn store_options(&self, region_title: &str) -> Vec<String> {
        self.region_by_title(region_title)
            .map(|r| self.stores_in_region(&r.id).into_iter().map(|s| s.title).collect())
            .unwrap_or_default()
    }

    /// Ordered product display names for a region title.
    fn product_options(&self, region_title: &str) -> Vec<String> {
        self.region_by_title(region_title)
            .map(|r| self.products_in_region(&r.id).into_iter().map(|p| p.title).collect())
            .unwrap_or_default()
    }

    /// Turn a title selection into identified entities. Empty fields are a
    /// validation error; unknown titles are `NotFound`.
    fn resolve(&self, selection: &Selection) -> Result<(Region, Store, Product)> {
        selection.validate()?;

        let region = self
            .region_by_title(&selection.region)
            .ok_or_else(|| AppError::NotFound {
                resource: format!("region '{}'", selection.region),
            })?;
        let store = self
            .stores_in_region(&region.id)
            .into_iter()
            .find(|s| s.title == selection.store)
            .ok_or_else(|| AppError::NotFound {
                resource: format!("store '{}' in {}", selection.store, region.title),
            })?;
        let product = self
            .products_in_region(&region.id)
            .into_iter()
            .find(|p| p.title == selection.product)
            .ok_or_else(|| AppError::NotFound {
                resource: format!("product '{}' in {}", selection.product, region.title),
            })?;

        Ok((region, store, product))
    }
}

/// Catalog backed by a JSON document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StaticCatalog {
    pub regions: Vec<Region>,
    #[serde(default)]
    pub stores: Vec<Store>,
    #[serde(default)]
    pub products: Vec<Product>,
}

impl StaticCatalog {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let catalog: StaticCatalog = serde_json::from_str(json)?;
        catalog.check()?;
        Ok(catalog)
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json_str(&content)
    }

    fn check(&self) -> Result<()> {
        for store in &self.stores {
            if !self.regions.iter().any(|r| r.id == store.region_id) {
                return Err(AppError::Validation(format!(
                    "store '{}' references unknown region '{}'",
                    store.title, store.region_id
                )));
            }
        }
        for product in &self.products {
            if !self.regions.iter().any(|r| r.id == product.region_id) {
                return Err(AppError::Validation(format!(
                    "product '{}' references unknown region '{}'",
                    product.title, product.region_id
                )));
            }
        }
        Ok(())
    }
}

impl Catalog for StaticCatalog {
    fn regions(&self) -> Vec<Region> {
        self.regions.clone()
    }

    fn stores_in_region(&self, region_id: &str) -> Vec<Store> {
        self.stores
            .iter()
            .filter(|s| s.region_id == region_id)
            .cloned()
            .collect()
    }

    fn products_in_region(&self, region_id: &str) -> Vec<Product> {
        self.products
            .iter()
            .filter(|p| p.region_id == region_id)
            .cloned()
            .collect()
    }
}
