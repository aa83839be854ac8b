//! Catalog/pricing service contract: maps titles and platform app ids to a
//! canonical catalog id and returns current store prices for that id.

pub mod itad;

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::{Deal, Platform};
use crate::error::Result;

/// Canonical catalog record for one game.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogInfo {
    pub title: String,
    #[serde(default)]
    pub platform_app_id: Option<u32>,
    #[serde(default)]
    pub cover_url: Option<String>,
}

#[async_trait]
pub trait CatalogService: Send + Sync {
    /// Resolve a canonical catalog id from a title. None when the catalog
    /// has no match.
    async fn lookup_id_by_title(&self, title: &str) -> Result<Option<String>>;

    /// Resolve a canonical catalog id from a storefront app id.
    async fn lookup_id_by_app_id(
        &self,
        platform: Platform,
        app_id: u32,
    ) -> Result<Option<String>>;

    async fn get_info(&self, catalog_id: &str) -> Result<Option<CatalogInfo>>;

    async fn get_prices(&self, catalog_id: &str) -> Result<Vec<Deal>>;

    /// Batch variant of [`lookup_id_by_title`]: one round trip for N titles.
    /// The returned map only contains titles that resolved.
    async fn lookup_ids_by_titles(&self, titles: &[String]) -> Result<HashMap<String, String>>;

    /// Batch variant of [`get_prices`]: one round trip for N ids.
    async fn get_prices_batch(
        &self,
        catalog_ids: &[String],
    ) -> Result<HashMap<String, Vec<Deal>>>;
}
