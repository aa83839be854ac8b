use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One wishlist row. `best_deal_percentage` is a derived, periodically
/// refreshed annotation, not authoritative state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WishlistItem {
    pub id: String,
    pub game_id: String,
    pub title: String,
    #[serde(default)]
    pub cover_url: Option<String>,
    pub added_at: DateTime<Utc>,
    #[serde(default)]
    pub best_deal_percentage: Option<u8>,
}

impl WishlistItem {
    pub fn new(game_id: impl Into<String>, title: impl Into<String>) -> Self {
        WishlistItem {
            id: Uuid::new_v4().to_string(),
            game_id: game_id.into(),
            title: title.into(),
            cover_url: None,
            added_at: Utc::now(),
            best_deal_percentage: None,
        }
    }
}
