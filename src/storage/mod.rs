//! Storage contracts and the guest-vs-authenticated router.
//!
//! The concrete engines behind the remote multi-tenant store are owned by
//! collaborators; this module defines the repository traits the core talks
//! to and ships a local on-device backend for guest sessions.

pub mod memory;
pub mod sqlite;

use std::sync::Arc;

use async_trait::async_trait;

use crate::domain::{Game, IdentityPatch, LinkedPlatform, Platform, WishlistItem};
use crate::error::Result;

/// The acting user. Guest sessions are locally-only identities with no
/// remote account; the distinction is made explicit here, once, at the
/// composition root rather than re-derived from id-string inspection on
/// every call.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum UserId {
    Guest(String),
    Account(String),
}

impl UserId {
    pub fn raw(&self) -> &str {
        match self {
            UserId::Guest(id) | UserId::Account(id) => id,
        }
    }

    pub fn is_guest(&self) -> bool {
        matches!(self, UserId::Guest(_))
    }
}

/// Owned-game library repository contract.
#[async_trait]
pub trait LibraryStore: Send + Sync {
    async fn get_all(&self, user: &UserId) -> Result<Vec<Game>>;

    async fn get_by_id(&self, user: &UserId, game_id: &str) -> Result<Option<Game>>;

    /// Bulk upsert used by platform syncs and imported-entitlement stores.
    /// No transactional guarantee across rows; partial writes are accepted.
    async fn upsert_batch(&self, user: &UserId, games: &[Game]) -> Result<()>;

    /// Best-effort cache-warming write of discovered cross-reference ids.
    async fn update_cross_reference(
        &self,
        user: &UserId,
        game_id: &str,
        patch: &IdentityPatch,
    ) -> Result<()>;

    /// Search the global, user-independent catalog dataset. Only ever
    /// reachable through the remote backend (see [`StorageRouter`]).
    async fn search_catalog(&self, query: &str) -> Result<Vec<Game>>;
}

/// Linked-platform repository contract.
#[async_trait]
pub trait PlatformLinkStore: Send + Sync {
    async fn get_linked(&self, user: &UserId) -> Result<Vec<LinkedPlatform>>;

    /// Replaces any existing link for the same platform.
    async fn upsert(&self, user: &UserId, link: &LinkedPlatform) -> Result<()>;

    async fn remove(&self, user: &UserId, platform: Platform) -> Result<()>;
}

/// Wishlist repository contract.
#[async_trait]
pub trait WishlistStore: Send + Sync {
    async fn get_all(&self, user: &UserId) -> Result<Vec<WishlistItem>>;

    async fn contains(&self, user: &UserId, game_id: &str) -> Result<bool> {
        Ok(self
            .get_all(user)
            .await?
            .iter()
            .any(|item| item.game_id == game_id))
    }
}

/// One backend bundle (library + links + wishlist) for a given store kind.
#[derive(Clone)]
pub struct StoreBackend {
    pub library: Arc<dyn LibraryStore>,
    pub links: Arc<dyn PlatformLinkStore>,
    pub wishlist: Arc<dyn WishlistStore>,
}

/// Routes every repository call to the local or remote backend based on the
/// identity of the acting user, decided once per call site from the
/// [`UserId`] variant.
///
/// Catalog search is the single exception: the catalog is a global,
/// user-independent dataset, so it is always routed to the remote backend —
/// routing it locally would silently return empty results for guests.
///
/// The router itself never fails; it propagates whatever the chosen backend
/// raises.
#[derive(Clone)]
pub struct StorageRouter {
    local: StoreBackend,
    remote: StoreBackend,
}

impl StorageRouter {
    pub fn new(local: StoreBackend, remote: StoreBackend) -> Self {
        StorageRouter { local, remote }
    }

    fn backend(&self, user: &UserId) -> &StoreBackend {
        if user.is_guest() {
            &self.local
        } else {
            &self.remote
        }
    }

    pub fn library(&self, user: &UserId) -> Arc<dyn LibraryStore> {
        self.backend(user).library.clone()
    }

    pub fn links(&self, user: &UserId) -> Arc<dyn PlatformLinkStore> {
        self.backend(user).links.clone()
    }

    pub fn wishlist(&self, user: &UserId) -> Arc<dyn WishlistStore> {
        self.backend(user).wishlist.clone()
    }

    /// Always remote, regardless of user kind.
    pub async fn search_catalog(&self, query: &str) -> Result<Vec<Game>> {
        self.remote.library.search_catalog(query).await
    }
}
