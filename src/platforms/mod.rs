//! Platform API client contracts (Steam, Epic, GOG).
//!
//! The concrete clients own their wire protocols; the core consumes these
//! trait shapes only. Response payloads are mapped straight into domain
//! types.

pub mod epic;
pub mod gog;
pub mod steam;

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::{Game, OAuthTokens, StoreMetadata};
use crate::error::Result;

/// Steam profile visibility as reported by the player summary endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfileVisibility {
    Public,
    Private,
}

#[async_trait]
pub trait SteamApi: Send + Sync {
    /// Owned library for a steam id, already mapped to domain games.
    async fn get_owned_games(&self, steam_id: &str) -> Result<Vec<Game>>;

    /// Authenticate inbound OpenID callback parameters against the identity
    /// provider. Returns the verified steam id, or None when the provider
    /// rejects the assertion.
    async fn verify_openid(&self, params: &HashMap<String, String>) -> Result<Option<String>>;

    /// Resolve a vanity name or profile URL fragment to a steam id.
    async fn resolve_vanity(&self, vanity: &str) -> Result<Option<String>>;

    async fn check_profile_visibility(&self, steam_id: &str) -> Result<ProfileVisibility>;

    /// Fuzzy store search: first app id matching the title, if any.
    async fn search_app_by_title(&self, title: &str) -> Result<Option<u32>>;

    /// Store-page metadata (appdetails) for a known app id.
    async fn get_store_metadata(&self, app_id: u32) -> Result<Option<StoreMetadata>>;
}

/// Access token returned by Epic's authorization-code exchange.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EpicToken {
    pub account_id: String,
    pub access_token: String,
}

#[async_trait]
pub trait EpicApi: Send + Sync {
    /// Exchange a short-lived authorization code for an access token.
    async fn exchange_code(&self, code: &str) -> Result<EpicToken>;

    /// Owned-entitlements list for the token's account.
    async fn get_entitlements(&self, token: &EpicToken) -> Result<Vec<Game>>;
}

/// Token pair plus the account id GOG reports with it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GogSession {
    pub user_id: String,
    pub tokens: OAuthTokens,
}

#[async_trait]
pub trait GogApi: Send + Sync {
    /// Exchange an authorization code for an OAuth2 token pair.
    async fn exchange_code(&self, code: &str) -> Result<GogSession>;

    async fn get_owned_games(&self, tokens: &OAuthTokens) -> Result<Vec<Game>>;
}
