//! Optional enrichment sources: compatibility rating and playtime estimate.
//! Both are best-effort; the aggregator maps their failures to absent
//! fields, never to call failures.

pub mod hltb;
pub mod protondb;

use async_trait::async_trait;

use crate::domain::{CompatibilityRating, DurationEstimate};
use crate::error::Result;

#[async_trait]
pub trait CompatibilityService: Send + Sync {
    /// Rating keyed by platform app id. None when the service has no data
    /// for that id.
    async fn get_rating(&self, app_id: u32) -> Result<Option<CompatibilityRating>>;
}

#[async_trait]
pub trait PlaytimeService: Send + Sync {
    /// Estimate keyed by title. None when no close match exists.
    async fn get_duration(&self, title: &str) -> Result<Option<DurationEstimate>>;
}
