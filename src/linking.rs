//! Platform account linking.
//!
//! Every linking flow — Steam OpenID callback, Steam vanity/id entry, Epic
//! auth code, Epic manual export, GOG auth code — is one [`LinkStrategy`]
//! behind a single orchestrator. The orchestrator owns the invariant
//! ordering: verify first, persist imported games second, persist the link
//! third, kick the background sync last. A verification failure leaves no
//! trace; a sync failure never unwinds a persisted link.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info};

use crate::domain::{Game, LinkedPlatform, OAuthTokens, Platform};
use crate::error::{CoreError, Result};
use crate::platforms::epic::parse_manual_export;
use crate::platforms::{EpicApi, GogApi, ProfileVisibility, SteamApi};
use crate::storage::{StorageRouter, UserId};
use crate::sync::{SyncJob, SyncQueue};

/// Link lifecycle. `Verifying` exists only while a [`LinkStrategy`] call is
/// in flight; storage only ever holds `Linked`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Unlinked,
    Verifying,
    Linked,
}

/// What a successful verification hands back to the orchestrator.
pub struct LinkOutcome {
    pub external_user_id: String,
    /// Games the flow itself produced (Epic entitlements, manual imports),
    /// stored before the link persists. The background sync runs either way.
    pub imported_games: Option<Vec<Game>>,
    /// Credential to store on the link for later syncs.
    pub oauth: Option<OAuthTokens>,
}

/// One platform-specific verification flow. Strategies are constructed per
/// request and carry their own inputs.
#[async_trait]
pub trait LinkStrategy: Send + Sync {
    fn platform(&self) -> Platform;

    async fn verify(&self) -> Result<LinkOutcome>;
}

/// Steam OpenID return-URL callback: re-assert the parameters against the
/// provider, then require a public profile so the owned-games sync can see
/// anything at all.
pub struct SteamCallback {
    steam: Arc<dyn SteamApi>,
    params: HashMap<String, String>,
}

impl SteamCallback {
    pub fn new(steam: Arc<dyn SteamApi>, params: HashMap<String, String>) -> Self {
        SteamCallback { steam, params }
    }
}

#[async_trait]
impl LinkStrategy for SteamCallback {
    fn platform(&self) -> Platform {
        Platform::Steam
    }

    async fn verify(&self) -> Result<LinkOutcome> {
        let steam_id = self
            .steam
            .verify_openid(&self.params)
            .await?
            .ok_or_else(|| {
                CoreError::malformed("steam openid assertion was rejected by the provider")
            })?;
        require_public_profile(self.steam.as_ref(), &steam_id).await?;
        Ok(LinkOutcome {
            external_user_id: steam_id,
            imported_games: None,
            oauth: None,
        })
    }
}

/// Steam manual entry: a vanity name, profile URL, or bare steam id.
pub struct SteamDirect {
    steam: Arc<dyn SteamApi>,
    identifier: String,
}

impl SteamDirect {
    pub fn new(steam: Arc<dyn SteamApi>, identifier: impl Into<String>) -> Self {
        SteamDirect {
            steam,
            identifier: identifier.into(),
        }
    }
}

#[async_trait]
impl LinkStrategy for SteamDirect {
    fn platform(&self) -> Platform {
        Platform::Steam
    }

    async fn verify(&self) -> Result<LinkOutcome> {
        let steam_id = self
            .steam
            .resolve_vanity(&self.identifier)
            .await?
            .ok_or_else(|| CoreError::not_found(&self.identifier))?;
        require_public_profile(self.steam.as_ref(), &steam_id).await?;
        Ok(LinkOutcome {
            external_user_id: steam_id,
            imported_games: None,
            oauth: None,
        })
    }
}

async fn require_public_profile(steam: &dyn SteamApi, steam_id: &str) -> Result<()> {
    match steam.check_profile_visibility(steam_id).await? {
        ProfileVisibility::Public => Ok(()),
        ProfileVisibility::Private => Err(CoreError::precondition(
            "steam profile is private; set game details to public and link again",
        )),
    }
}

/// Epic authorization-code flow: exchange the code, pull entitlements in the
/// same pass, keep the access token for later refreshes.
pub struct EpicAuthCode {
    epic: Arc<dyn EpicApi>,
    code: String,
}

impl EpicAuthCode {
    pub fn new(epic: Arc<dyn EpicApi>, code: impl Into<String>) -> Self {
        EpicAuthCode {
            epic,
            code: code.into(),
        }
    }
}

#[async_trait]
impl LinkStrategy for EpicAuthCode {
    fn platform(&self) -> Platform {
        Platform::EpicGames
    }

    async fn verify(&self) -> Result<LinkOutcome> {
        let token = self.epic.exchange_code(&self.code).await?;
        let games = self.epic.get_entitlements(&token).await?;
        Ok(LinkOutcome {
            external_user_id: token.account_id.clone(),
            imported_games: Some(games),
            oauth: Some(OAuthTokens {
                access_token: token.access_token,
                refresh_token: String::new(),
                expires_in: None,
            }),
        })
    }
}

/// Epic manual export: the user pastes the JSON their account page exports.
/// No credential is involved, so the link carries the sentinel external id
/// and can never be background-synced.
pub struct EpicManualImport {
    raw: String,
}

pub const EPIC_MANUAL_EXTERNAL_ID: &str = "imported";

impl EpicManualImport {
    pub fn new(raw: impl Into<String>) -> Self {
        EpicManualImport { raw: raw.into() }
    }
}

#[async_trait]
impl LinkStrategy for EpicManualImport {
    fn platform(&self) -> Platform {
        Platform::EpicGames
    }

    async fn verify(&self) -> Result<LinkOutcome> {
        let games = parse_manual_export(&self.raw)?;
        Ok(LinkOutcome {
            external_user_id: EPIC_MANUAL_EXTERNAL_ID.to_string(),
            imported_games: Some(games),
            oauth: None,
        })
    }
}

/// GOG authorization-code flow: the token pair is stored on the link because
/// GOG's library endpoint needs it on every sync.
pub struct GogAuthCode {
    gog: Arc<dyn GogApi>,
    code: String,
}

impl GogAuthCode {
    pub fn new(gog: Arc<dyn GogApi>, code: impl Into<String>) -> Self {
        GogAuthCode {
            gog,
            code: code.into(),
        }
    }
}

#[async_trait]
impl LinkStrategy for GogAuthCode {
    fn platform(&self) -> Platform {
        Platform::Gog
    }

    async fn verify(&self) -> Result<LinkOutcome> {
        let session = self.gog.exchange_code(&self.code).await?;
        Ok(LinkOutcome {
            external_user_id: session.user_id,
            imported_games: None,
            oauth: Some(session.tokens),
        })
    }
}

/// The one orchestrator all strategies run through.
pub struct PlatformLinker {
    router: StorageRouter,
    queue: SyncQueue,
}

impl PlatformLinker {
    pub fn new(router: StorageRouter, queue: SyncQueue) -> Self {
        PlatformLinker { router, queue }
    }

    /// Run a linking flow to completion.
    ///
    /// Verification failures propagate before anything is written. Imported
    /// games and the link row are persisted in that order; the background
    /// sync is fire-and-forget, so the returned link is valid even if that
    /// sync later fails.
    pub async fn link(
        &self,
        user: &UserId,
        strategy: &dyn LinkStrategy,
    ) -> Result<LinkedPlatform> {
        let platform = strategy.platform();
        debug!(user = %user.raw(), platform = %platform.as_str(), "verifying platform link");
        let outcome = strategy.verify().await?;

        if let Some(games) = outcome.imported_games {
            self.router
                .library(user)
                .upsert_batch(user, &games)
                .await?;
        }

        let mut link = LinkedPlatform::new(platform, outcome.external_user_id);
        if let Some(tokens) = outcome.oauth {
            link = link.with_oauth(tokens);
        }
        self.router.links(user).upsert(user, &link).await?;
        info!(
            user = %user.raw(),
            platform = %platform.as_str(),
            external_id = %link.external_user_id,
            "platform linked"
        );

        // Every flow ends with the same background refresh, even the ones
        // that already stored games inline; a link without a usable
        // credential fails the sync's precondition and lands in the sink.
        self.queue.enqueue(SyncJob {
            user: user.clone(),
            platform,
        });
        Ok(link)
    }

    /// Unlink is idempotent: removing an absent link is a no-op.
    pub async fn unlink(&self, user: &UserId, platform: Platform) -> Result<()> {
        self.router.links(user).remove(user, platform).await
    }

    pub async fn state(&self, user: &UserId, platform: Platform) -> Result<LinkState> {
        let linked = self
            .router
            .links(user)
            .get_linked(user)
            .await?
            .iter()
            .any(|l| l.platform == platform);
        Ok(if linked {
            LinkState::Linked
        } else {
            LinkState::Unlinked
        })
    }
}
