//! Identity-resolution cascade: turns a possibly-foreign identifier (local
//! id, platform app id, catalog id) into a single `Game`, constructing an
//! ephemeral one when the game is not owned.

use std::sync::Arc;

use tracing::debug;

use crate::catalog::CatalogService;
use crate::domain::{Game, IdentityPatch, Platform};
use crate::error::{CoreError, Result};
use crate::storage::{StorageRouter, UserId};

/// Outcome of one resolution: the resolved game (with any discovered
/// cross-reference ids already applied in memory) plus the patch itself so
/// callers can decide whether to persist it.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub game: Game,
    pub patch: IdentityPatch,
}

impl Resolution {
    fn owned(game: Game) -> Self {
        Resolution {
            game,
            patch: IdentityPatch::default(),
        }
    }

    fn owned_with_patch(game: Game, patch: IdentityPatch) -> Self {
        let game = game.apply(&patch);
        Resolution { game, patch }
    }

    fn ephemeral(game: Game) -> Self {
        Resolution {
            game,
            patch: IdentityPatch::default(),
        }
    }
}

pub struct GameIdentityResolver {
    router: StorageRouter,
    catalog: Arc<dyn CatalogService>,
}

impl GameIdentityResolver {
    pub fn new(router: StorageRouter, catalog: Arc<dyn CatalogService>) -> Self {
        GameIdentityResolver { router, catalog }
    }

    /// Resolve `game_id` for `user`. Each cascade step is attempted only if
    /// the previous one produced nothing; the first owned hit wins, and an
    /// ephemeral game is constructed only once every owned-library avenue is
    /// exhausted. Never writes to storage.
    ///
    /// Idempotent: the same inputs against unchanged library state yield a
    /// field-equal result.
    pub async fn resolve(
        &self,
        user: &UserId,
        game_id: &str,
        hinted_app_id: Option<u32>,
    ) -> Result<Resolution> {
        let library = self.router.library(user);

        // 1. Direct library lookup; cache hit, no catalog traffic.
        if let Some(game) = library.get_by_id(user, game_id).await? {
            return Ok(Resolution::owned(game));
        }

        // 2. The caller may know the platform app id even though the UI
        //    passed a catalog id as game_id.
        if let Some(app_id) = hinted_app_id {
            if let Some(game) = library.get_by_id(user, &app_id.to_string()).await? {
                return Ok(Resolution::owned(game));
            }
        }

        if let Some(app_id) = parse_app_id(game_id) {
            return self.resolve_from_app_id(user, app_id).await;
        }
        self.resolve_from_catalog_id(user, game_id).await
    }

    /// 3. All-digits ids are platform app ids: map to a catalog id, fetch
    ///    catalog info, and give the library one last chance before
    ///    constructing an ephemeral entry.
    async fn resolve_from_app_id(&self, user: &UserId, app_id: u32) -> Result<Resolution> {
        let library = self.router.library(user);
        let itad_id = self
            .catalog
            .lookup_id_by_app_id(Platform::Steam, app_id)
            .await?
            .ok_or_else(|| CoreError::not_found(app_id.to_string()))?;
        let info = self
            .catalog
            .get_info(&itad_id)
            .await?
            .ok_or_else(|| CoreError::not_found(itad_id.clone()))?;

        // Last chance: the catalog may normalize to an app id the library
        // knows even when the incoming one missed (e.g. demo vs full ids).
        let final_app_id = info.platform_app_id.unwrap_or(app_id);
        if let Some(game) = library.get_by_id(user, &final_app_id.to_string()).await? {
            let patch = IdentityPatch::with_itad_id(itad_id);
            return Ok(Resolution::owned_with_patch(game, patch));
        }

        debug!(app_id, itad_id = %itad_id, "constructing ephemeral game from app id");
        Ok(Resolution::ephemeral(Game::ephemeral(
            app_id.to_string(),
            info.title,
            Some(itad_id),
            Some(app_id),
            info.cover_url,
        )))
    }

    /// 4. Everything else is treated as a catalog id directly.
    async fn resolve_from_catalog_id(&self, user: &UserId, catalog_id: &str) -> Result<Resolution> {
        let library = self.router.library(user);
        let info = self
            .catalog
            .get_info(catalog_id)
            .await?
            .ok_or_else(|| CoreError::not_found(catalog_id))?;

        // If the catalog reports a platform app id, one final library lookup
        // keyed on it may still surface an owned entry.
        if let Some(app_id) = info.platform_app_id {
            if let Some(game) = library.get_by_id(user, &app_id.to_string()).await? {
                let patch = IdentityPatch::with_itad_id(catalog_id);
                return Ok(Resolution::owned_with_patch(game, patch));
            }
        }

        debug!(catalog_id, "constructing ephemeral game from catalog id");
        Ok(Resolution::ephemeral(Game::ephemeral(
            catalog_id,
            info.title,
            Some(catalog_id.to_string()),
            info.platform_app_id,
            info.cover_url,
        )))
    }
}

/// All-digit ids are storefront app ids. A digit string that overflows u32
/// cannot be a real app id, so it deliberately falls through to the
/// catalog-id path rather than erroring.
fn parse_app_id(raw: &str) -> Option<u32> {
    if raw.is_empty() || !raw.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    raw.parse().ok()
}
