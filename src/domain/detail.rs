use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::Game;

/// A single store offer for a game, as reported by the catalog service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Deal {
    pub store_name: String,
    pub price: f64,
    pub original_price: f64,
    pub discount_percentage: u8,
    pub url: String,
}

/// Compatibility rating reported by the rating service (ProtonDB tiers).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompatibilityRating {
    pub tier: String,
    #[serde(default)]
    pub trending_tier: Option<String>,
    #[serde(default)]
    pub report_count: Option<u32>,
}

/// Playtime estimate in hours, keyed by title.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DurationEstimate {
    #[serde(default)]
    pub main_hours: Option<f64>,
    #[serde(default)]
    pub main_extra_hours: Option<f64>,
    #[serde(default)]
    pub completionist_hours: Option<f64>,
}

/// Store-page metadata fetched from the platform storefront.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct StoreMetadata {
    #[serde(default)]
    pub genres: Vec<String>,
    #[serde(default)]
    pub developers: Vec<String>,
    #[serde(default)]
    pub publishers: Vec<String>,
    #[serde(default)]
    pub release_date: Option<NaiveDate>,
    #[serde(default)]
    pub critic_score: Option<u8>,
    #[serde(default)]
    pub screenshots: Vec<String>,
    #[serde(default)]
    pub recommendation_count: Option<u64>,
}

/// Marker for an enrichment source that did not answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Unavailable {
    pub service: &'static str,
}

/// Typed per-source outcome; the reducer in [`GameDetail::assemble`] maps
/// `Err(Unavailable)` to an absent field, never to a call failure.
pub type Enrichment<T> = Result<T, Unavailable>;

/// Composite detail view for a resolved game. Constructed fresh on every
/// request, never cached or persisted. Every enrichment field is
/// independently nullable: absence means "that source did not answer",
/// never "the value is zero".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameDetail {
    pub game: Game,
    pub compatibility: Option<CompatibilityRating>,
    pub playtime_estimate: Option<DurationEstimate>,
    pub deals: Vec<Deal>,
    pub wishlisted: Option<bool>,
    pub store_metadata: Option<StoreMetadata>,
}

impl GameDetail {
    /// Reduce the five independent enrichment outcomes into one composite
    /// value. This is the single place where unavailability becomes an
    /// absent field.
    pub fn assemble(
        game: Game,
        compatibility: Enrichment<Option<CompatibilityRating>>,
        playtime_estimate: Enrichment<Option<DurationEstimate>>,
        deals: Enrichment<Vec<Deal>>,
        wishlisted: Enrichment<bool>,
        store_metadata: Enrichment<Option<StoreMetadata>>,
    ) -> GameDetail {
        GameDetail {
            game,
            compatibility: compatibility.ok().flatten(),
            playtime_estimate: playtime_estimate.ok().flatten(),
            deals: deals.unwrap_or_default(),
            wishlisted: wishlisted.ok(),
            store_metadata: store_metadata.ok().flatten(),
        }
    }
}
