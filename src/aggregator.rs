//! Best-effort detail aggregation: one resolved game enriched from five
//! independently-failing sources under all-settle semantics.

use std::sync::Arc;

use futures::join;
use tracing::warn;

use crate::catalog::CatalogService;
use crate::domain::{Deal, Enrichment, Game, GameDetail, IdentityPatch, Platform, Unavailable};
use crate::enrich::{CompatibilityService, PlaytimeService};
use crate::error::Result;
use crate::platforms::SteamApi;
use crate::resolver::GameIdentityResolver;
use crate::storage::{StorageRouter, UserId};

pub struct DetailAggregator {
    resolver: Arc<GameIdentityResolver>,
    router: StorageRouter,
    catalog: Arc<dyn CatalogService>,
    compatibility: Arc<dyn CompatibilityService>,
    playtime: Arc<dyn PlaytimeService>,
    steam: Arc<dyn SteamApi>,
}

impl DetailAggregator {
    pub fn new(
        resolver: Arc<GameIdentityResolver>,
        router: StorageRouter,
        catalog: Arc<dyn CatalogService>,
        compatibility: Arc<dyn CompatibilityService>,
        playtime: Arc<dyn PlaytimeService>,
        steam: Arc<dyn SteamApi>,
    ) -> Self {
        DetailAggregator {
            resolver,
            router,
            catalog,
            compatibility,
            playtime,
            steam,
        }
    }

    /// Build the composite detail view.
    ///
    /// Only identity resolution and the Epic backfill read can fail the
    /// call; every enrichment branch degrades to an absent field on its own
    /// failure. The deals branch may discover the catalog id, which is
    /// warmed onto the in-memory game (never onto storage) — the single
    /// permitted mutation per call.
    pub async fn get_detail(&self, user: &UserId, game_id: &str) -> Result<GameDetail> {
        let resolution = self.resolver.resolve(user, game_id, None).await?;
        let mut game = resolution.game;

        // Phase 0: Epic entries carry no steam app id of their own; without
        // one the compatibility and store-metadata branches cannot run.
        if game.platform == Platform::EpicGames && game.steam_app_id.is_none() {
            if let Some(app_id) = self.discover_steam_app_id(&game).await? {
                let patch = IdentityPatch::with_steam_app_id(app_id);
                game = game.apply(&patch);
                // Best-effort persistence; the id is used in-memory for this
                // response even when the write fails.
                let library = self.router.library(user);
                if let Err(err) = library.update_cross_reference(user, &game.id, &patch).await {
                    warn!(game_id = %game.id, error = %err, "steam app id backfill write failed");
                }
            }
        }

        let app_id = game.steam_app_id;
        let title = game.title.clone();
        let known_itad = game.itad_game_id.clone();
        let wishlist = self.router.wishlist(user);

        let (compatibility, playtime, deals, wishlisted, metadata) = join!(
            async {
                match app_id {
                    Some(id) => capture("protondb", self.compatibility.get_rating(id)).await,
                    None => Ok(None),
                }
            },
            capture("hltb", self.playtime.get_duration(&title)),
            capture("deals", self.fetch_deals(known_itad, &title)),
            capture("wishlist", wishlist.contains(user, &game.id)),
            async {
                match app_id {
                    Some(id) => capture("steam-store", self.steam.get_store_metadata(id)).await,
                    None => Ok(None),
                }
            },
        );

        // Split the deal branch's piggybacked catalog-id discovery off
        // before reduction, and warm it onto the in-memory game.
        let (deals, discovered_itad) = match deals {
            Ok((deals, discovered)) => (Ok(deals), discovered),
            Err(unavailable) => (Err(unavailable), None),
        };
        if let Some(itad_id) = discovered_itad {
            game = game.apply(&IdentityPatch::with_itad_id(itad_id));
        }

        Ok(GameDetail::assemble(
            game,
            compatibility,
            playtime,
            deals,
            wishlisted,
            metadata,
        ))
    }

    /// Epic backfill: catalog lookup first, fuzzy store-title search second;
    /// the first strategy to succeed wins.
    async fn discover_steam_app_id(&self, game: &Game) -> Result<Option<u32>> {
        let itad_id = match game.itad_game_id.clone() {
            Some(id) => Some(id),
            None => self.catalog.lookup_id_by_title(&game.title).await?,
        };
        if let Some(itad_id) = itad_id {
            if let Some(info) = self.catalog.get_info(&itad_id).await? {
                if info.platform_app_id.is_some() {
                    return Ok(info.platform_app_id);
                }
            }
        }
        self.steam.search_app_by_title(&game.title).await
    }

    /// Deals need a catalog id; resolve one by title when unknown and hand
    /// the discovery back to the caller for cache warming.
    async fn fetch_deals(
        &self,
        known_itad: Option<String>,
        title: &str,
    ) -> Result<(Vec<Deal>, Option<String>)> {
        let (itad_id, discovered) = match known_itad {
            Some(id) => (Some(id), None),
            None => {
                let found = self.catalog.lookup_id_by_title(title).await?;
                (found.clone(), found)
            }
        };
        let Some(itad_id) = itad_id else {
            return Ok((Vec::new(), None));
        };
        let deals = self.catalog.get_prices(&itad_id).await?;
        Ok((deals, discovered))
    }
}

/// All-settle capture: a failed branch becomes `Unavailable` for that field
/// only, logged where it happened.
async fn capture<T, F>(service: &'static str, fut: F) -> Enrichment<T>
where
    F: std::future::Future<Output = Result<T>>,
{
    match fut.await {
        Ok(value) => Ok(value),
        Err(err) => {
            warn!(service, error = %err, "enrichment source failed; degrading to absent");
            Err(Unavailable { service })
        }
    }
}
