//! Shared test doubles. Compiled only for tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::catalog::{CatalogInfo, CatalogService};
use crate::domain::{CompatibilityRating, Deal, DurationEstimate, Game, Platform, StoreMetadata};
use crate::enrich::{CompatibilityService, PlaytimeService};
use crate::error::{CoreError, Result};
use crate::platforms::{EpicApi, EpicToken, GogApi, GogSession, ProfileVisibility, SteamApi};
use crate::storage::memory::MemoryBackend;
use crate::storage::StorageRouter;

/// Router whose local and remote sides share one in-memory backend.
pub fn router_over(backend: MemoryBackend) -> StorageRouter {
    StorageRouter::new(backend.clone().into_backend(), backend.into_backend())
}

/// Catalog double with canned answers and per-call counters. `fail_all`
/// makes every method answer `ExternalServiceUnavailable`, simulating an
/// unreachable service.
#[derive(Default)]
pub struct CountingCatalog {
    pub infos: HashMap<String, CatalogInfo>,
    pub app_mappings: HashMap<u32, String>,
    pub title_ids: HashMap<String, String>,
    pub prices: HashMap<String, Vec<Deal>>,
    pub fail_all: bool,
    calls: AtomicUsize,
    title_batches: Mutex<Vec<Vec<String>>>,
}

impl CountingCatalog {
    pub fn with_info(mut self, id: &str, title: &str, app_id: Option<u32>) -> Self {
        self.infos.insert(
            id.to_string(),
            CatalogInfo {
                title: title.to_string(),
                platform_app_id: app_id,
                cover_url: None,
            },
        );
        self
    }

    pub fn with_app_mapping(mut self, app_id: u32, catalog_id: &str) -> Self {
        self.app_mappings.insert(app_id, catalog_id.to_string());
        self
    }

    pub fn with_title_id(mut self, title: &str, catalog_id: &str) -> Self {
        self.title_ids.insert(title.to_string(), catalog_id.to_string());
        self
    }

    pub fn with_prices(mut self, catalog_id: &str, deals: Vec<Deal>) -> Self {
        self.prices.insert(catalog_id.to_string(), deals);
        self
    }

    pub fn failing(mut self) -> Self {
        self.fail_all = true;
        self
    }

    pub fn total_calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Title payloads seen by `lookup_ids_by_titles`, in call order.
    pub fn title_batches(&self) -> Vec<Vec<String>> {
        self.title_batches.lock().unwrap().clone()
    }

    fn tick(&self) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_all {
            return Err(CoreError::unavailable("itad", "simulated outage"));
        }
        Ok(())
    }
}

#[async_trait]
impl CatalogService for CountingCatalog {
    async fn lookup_id_by_title(&self, title: &str) -> Result<Option<String>> {
        self.tick()?;
        Ok(self.title_ids.get(title).cloned())
    }

    async fn lookup_id_by_app_id(
        &self,
        _platform: Platform,
        app_id: u32,
    ) -> Result<Option<String>> {
        self.tick()?;
        Ok(self.app_mappings.get(&app_id).cloned())
    }

    async fn get_info(&self, catalog_id: &str) -> Result<Option<CatalogInfo>> {
        self.tick()?;
        Ok(self.infos.get(catalog_id).cloned())
    }

    async fn get_prices(&self, catalog_id: &str) -> Result<Vec<Deal>> {
        self.tick()?;
        Ok(self.prices.get(catalog_id).cloned().unwrap_or_default())
    }

    async fn lookup_ids_by_titles(&self, titles: &[String]) -> Result<HashMap<String, String>> {
        self.tick()?;
        self.title_batches.lock().unwrap().push(titles.to_vec());
        Ok(titles
            .iter()
            .filter_map(|t| self.title_ids.get(t).map(|id| (t.clone(), id.clone())))
            .collect())
    }

    async fn get_prices_batch(
        &self,
        catalog_ids: &[String],
    ) -> Result<HashMap<String, Vec<Deal>>> {
        self.tick()?;
        Ok(catalog_ids
            .iter()
            .filter_map(|id| self.prices.get(id).map(|d| (id.clone(), d.clone())))
            .collect())
    }
}

pub fn deal(store: &str, price: f64, original: f64, cut: u8) -> Deal {
    Deal {
        store_name: store.to_string(),
        price,
        original_price: original,
        discount_percentage: cut,
        url: format!("https://store.example/{store}"),
    }
}

/// Compatibility double: canned rating or simulated outage.
#[derive(Default)]
pub struct MockCompat {
    pub rating: Option<CompatibilityRating>,
    pub fail: bool,
}

#[async_trait]
impl CompatibilityService for MockCompat {
    async fn get_rating(&self, _app_id: u32) -> Result<Option<CompatibilityRating>> {
        if self.fail {
            return Err(CoreError::unavailable("protondb", "simulated outage"));
        }
        Ok(self.rating.clone())
    }
}

#[derive(Default)]
pub struct MockPlaytime {
    pub estimate: Option<DurationEstimate>,
    pub fail: bool,
}

#[async_trait]
impl PlaytimeService for MockPlaytime {
    async fn get_duration(&self, _title: &str) -> Result<Option<DurationEstimate>> {
        if self.fail {
            return Err(CoreError::unavailable("hltb", "simulated outage"));
        }
        Ok(self.estimate.clone())
    }
}

/// Steam double driving both the aggregator (store search/metadata) and the
/// linking strategies (openid, vanity, visibility, owned games).
#[derive(Default)]
pub struct MockSteam {
    pub owned: Vec<Game>,
    pub openid_id: Option<String>,
    pub vanity_id: Option<String>,
    pub visibility: Option<ProfileVisibility>,
    pub search_hit: Option<u32>,
    pub metadata: Option<StoreMetadata>,
    pub fail_metadata: bool,
    pub fail_owned: bool,
    pub owned_calls: AtomicUsize,
}

#[async_trait]
impl SteamApi for MockSteam {
    async fn get_owned_games(&self, _steam_id: &str) -> Result<Vec<Game>> {
        self.owned_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_owned {
            return Err(CoreError::unavailable("steam", "simulated outage"));
        }
        Ok(self.owned.clone())
    }

    async fn verify_openid(
        &self,
        _params: &HashMap<String, String>,
    ) -> Result<Option<String>> {
        Ok(self.openid_id.clone())
    }

    async fn resolve_vanity(&self, _vanity: &str) -> Result<Option<String>> {
        Ok(self.vanity_id.clone())
    }

    async fn check_profile_visibility(&self, _steam_id: &str) -> Result<ProfileVisibility> {
        Ok(self.visibility.unwrap_or(ProfileVisibility::Public))
    }

    async fn search_app_by_title(&self, _title: &str) -> Result<Option<u32>> {
        Ok(self.search_hit)
    }

    async fn get_store_metadata(&self, _app_id: u32) -> Result<Option<StoreMetadata>> {
        if self.fail_metadata {
            return Err(CoreError::unavailable("steam", "simulated outage"));
        }
        Ok(self.metadata.clone())
    }
}

#[derive(Default)]
pub struct MockEpic {
    pub token: Option<EpicToken>,
    pub entitlements: Vec<Game>,
    pub entitlement_calls: AtomicUsize,
}

#[async_trait]
impl EpicApi for MockEpic {
    async fn exchange_code(&self, _code: &str) -> Result<EpicToken> {
        self.token
            .clone()
            .ok_or_else(|| CoreError::unavailable("epic", "exchange rejected"))
    }

    async fn get_entitlements(&self, _token: &EpicToken) -> Result<Vec<Game>> {
        self.entitlement_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.entitlements.clone())
    }
}

#[derive(Default)]
pub struct MockGog {
    pub session: Option<GogSession>,
    pub owned: Vec<Game>,
}

#[async_trait]
impl GogApi for MockGog {
    async fn exchange_code(&self, _code: &str) -> Result<GogSession> {
        self.session
            .clone()
            .ok_or_else(|| CoreError::unavailable("gog", "exchange rejected"))
    }

    async fn get_owned_games(&self, _tokens: &crate::domain::OAuthTokens) -> Result<Vec<Game>> {
        Ok(self.owned.clone())
    }
}

pub fn epic_game(id: &str, title: &str) -> Game {
    let mut game = Game::ephemeral(id, title, None, None, None);
    game.platform = Platform::EpicGames;
    game
}

pub fn arc<T>(value: T) -> Arc<T> {
    Arc::new(value)
}
