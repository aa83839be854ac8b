use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Storefront a library entry belongs to. `Unknown` marks an entry that was
/// resolved purely from the catalog for display purposes and is not part of
/// the user's owned library.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Platform {
    Steam,
    EpicGames,
    Gog,
    Unknown,
}

impl Platform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Steam => "STEAM",
            Platform::EpicGames => "EPIC_GAMES",
            Platform::Gog => "GOG",
            Platform::Unknown => "UNKNOWN",
        }
    }

    pub fn parse(raw: &str) -> Option<Platform> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "STEAM" => Some(Platform::Steam),
            "EPIC_GAMES" | "EPIC" => Some(Platform::EpicGames),
            "GOG" => Some(Platform::Gog),
            "UNKNOWN" => Some(Platform::Unknown),
            _ => None,
        }
    }
}

/// One library entry.
///
/// `id` carries platform-dependent meaning: the numeric app id for Steam,
/// an opaque string for Epic/GOG, or a catalog id for unresolved entries.
/// The struct is immutable; discovered cross-reference ids are expressed as
/// an [`IdentityPatch`] and applied through [`Game::apply`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Game {
    pub id: String,
    pub platform: Platform,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub cover_url: Option<String>,
    #[serde(default)]
    pub hero_url: Option<String>,
    /// Numeric Steam app id; cross-reference key into Steam and the catalog.
    #[serde(default)]
    pub steam_app_id: Option<u32>,
    /// Canonical catalog (ITAD) id; cross-reference key into the catalog.
    #[serde(default)]
    pub itad_game_id: Option<String>,
    #[serde(default)]
    pub playtime_minutes: u32,
    #[serde(default)]
    pub last_played: Option<DateTime<Utc>>,
}

impl Game {
    /// Construct an ephemeral, display-only entry resolved from the catalog.
    /// Never persisted unless the caller explicitly stores it.
    pub fn ephemeral(
        id: impl Into<String>,
        title: impl Into<String>,
        itad_game_id: Option<String>,
        steam_app_id: Option<u32>,
        cover_url: Option<String>,
    ) -> Self {
        Game {
            id: id.into(),
            platform: Platform::Unknown,
            title: title.into(),
            description: None,
            cover_url,
            hero_url: None,
            steam_app_id,
            itad_game_id,
            playtime_minutes: 0,
            last_played: None,
        }
    }

    /// Whether this entry belongs to the owned library.
    pub fn is_owned(&self) -> bool {
        self.platform != Platform::Unknown
    }

    /// Pure update: returns a copy with the patch's cross-reference ids
    /// filled in where they were missing. Existing ids are never replaced.
    pub fn apply(&self, patch: &IdentityPatch) -> Game {
        let mut out = self.clone();
        if out.steam_app_id.is_none() {
            out.steam_app_id = patch.steam_app_id;
        }
        if out.itad_game_id.is_none() {
            out.itad_game_id = patch.itad_game_id.clone();
        }
        out
    }
}

/// Cross-reference ids discovered during a resolution or aggregation call.
///
/// Returned alongside the resolved [`Game`] instead of being written into it
/// in place; callers decide whether to persist the patch (a best-effort
/// cache-warming write, not a business mutation).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IdentityPatch {
    pub steam_app_id: Option<u32>,
    pub itad_game_id: Option<String>,
}

impl IdentityPatch {
    pub fn is_empty(&self) -> bool {
        self.steam_app_id.is_none() && self.itad_game_id.is_none()
    }

    pub fn with_steam_app_id(app_id: u32) -> Self {
        IdentityPatch {
            steam_app_id: Some(app_id),
            ..Default::default()
        }
    }

    pub fn with_itad_id(id: impl Into<String>) -> Self {
        IdentityPatch {
            itad_game_id: Some(id.into()),
            ..Default::default()
        }
    }
}
