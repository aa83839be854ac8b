//! In-memory backend. Used as the default guest store until the sqlite
//! store is opened, and as the test double everywhere.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::domain::{Game, IdentityPatch, LinkedPlatform, Platform, WishlistItem};
use crate::error::Result;
use crate::storage::{
    LibraryStore, PlatformLinkStore, StoreBackend, UserId, WishlistStore,
};

#[derive(Default)]
struct State {
    // user raw id -> game id -> game
    libraries: HashMap<String, HashMap<String, Game>>,
    links: HashMap<String, Vec<LinkedPlatform>>,
    wishlists: HashMap<String, Vec<WishlistItem>>,
    catalog: Vec<Game>,
}

#[derive(Clone, Default)]
pub struct MemoryBackend {
    state: Arc<RwLock<State>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn into_backend(self) -> StoreBackend {
        let shared = Arc::new(self);
        StoreBackend {
            library: shared.clone(),
            links: shared.clone(),
            wishlist: shared,
        }
    }

    /// Seed the global catalog rows returned by `search_catalog`. Setup
    /// helper; expects the lock to be uncontended.
    pub fn seed_catalog(&self, games: Vec<Game>) {
        let mut guard = self.state.try_write().expect("seed while store is idle");
        guard.catalog = games;
    }

    pub fn seed_library(&self, user: &UserId, games: Vec<Game>) {
        let mut guard = self.state.try_write().expect("seed while store is idle");
        let lib = guard.libraries.entry(user.raw().to_string()).or_default();
        for game in games {
            lib.insert(game.id.clone(), game);
        }
    }

    pub fn seed_links(&self, user: &UserId, links: Vec<LinkedPlatform>) {
        let mut guard = self.state.try_write().expect("seed while store is idle");
        guard.links.insert(user.raw().to_string(), links);
    }

    pub fn seed_wishlist(&self, user: &UserId, items: Vec<WishlistItem>) {
        let mut guard = self.state.try_write().expect("seed while store is idle");
        guard.wishlists.insert(user.raw().to_string(), items);
    }
}

#[async_trait]
impl LibraryStore for MemoryBackend {
    async fn get_all(&self, user: &UserId) -> Result<Vec<Game>> {
        let guard = self.state.read().await;
        Ok(guard
            .libraries
            .get(user.raw())
            .map(|lib| lib.values().cloned().collect())
            .unwrap_or_default())
    }

    async fn get_by_id(&self, user: &UserId, game_id: &str) -> Result<Option<Game>> {
        let guard = self.state.read().await;
        Ok(guard
            .libraries
            .get(user.raw())
            .and_then(|lib| lib.get(game_id))
            .cloned())
    }

    async fn upsert_batch(&self, user: &UserId, games: &[Game]) -> Result<()> {
        let mut guard = self.state.write().await;
        let lib = guard.libraries.entry(user.raw().to_string()).or_default();
        for game in games {
            lib.insert(game.id.clone(), game.clone());
        }
        Ok(())
    }

    async fn update_cross_reference(
        &self,
        user: &UserId,
        game_id: &str,
        patch: &IdentityPatch,
    ) -> Result<()> {
        let mut guard = self.state.write().await;
        if let Some(game) = guard
            .libraries
            .get_mut(user.raw())
            .and_then(|lib| lib.get_mut(game_id))
        {
            let updated = game.apply(patch);
            *game = updated;
        }
        Ok(())
    }

    async fn search_catalog(&self, query: &str) -> Result<Vec<Game>> {
        let needle = query.to_ascii_lowercase();
        let guard = self.state.read().await;
        Ok(guard
            .catalog
            .iter()
            .filter(|g| g.title.to_ascii_lowercase().contains(&needle))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl PlatformLinkStore for MemoryBackend {
    async fn get_linked(&self, user: &UserId) -> Result<Vec<LinkedPlatform>> {
        let guard = self.state.read().await;
        Ok(guard.links.get(user.raw()).cloned().unwrap_or_default())
    }

    async fn upsert(&self, user: &UserId, link: &LinkedPlatform) -> Result<()> {
        let mut guard = self.state.write().await;
        let links = guard.links.entry(user.raw().to_string()).or_default();
        links.retain(|l| l.platform != link.platform);
        links.push(link.clone());
        Ok(())
    }

    async fn remove(&self, user: &UserId, platform: Platform) -> Result<()> {
        let mut guard = self.state.write().await;
        if let Some(links) = guard.links.get_mut(user.raw()) {
            links.retain(|l| l.platform != platform);
        }
        Ok(())
    }
}

#[async_trait]
impl WishlistStore for MemoryBackend {
    async fn get_all(&self, user: &UserId) -> Result<Vec<WishlistItem>> {
        let guard = self.state.read().await;
        Ok(guard.wishlists.get(user.raw()).cloned().unwrap_or_default())
    }
}
