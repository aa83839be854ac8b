//! ProtonDB summaries client.
//!
//! GET /api/v1/reports/summaries/{appid}.json returns the aggregated tier,
//! trending tier and report count for one Steam app id; 404 means no data.

use std::time::Duration;

use anyhow::Result as AnyResult;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::Value;

use crate::domain::CompatibilityRating;
use crate::enrich::CompatibilityService;
use crate::error::{CoreError, Result};
use crate::util::env::{env_opt, env_parse};

const SERVICE: &str = "protondb";

#[derive(Debug, Clone)]
pub struct ProtonDbClient {
    base_url: String,
    http: Client,
}

impl ProtonDbClient {
    pub fn new(base_url: Option<&str>, timeout_secs: Option<u64>) -> AnyResult<Self> {
        let base_url = base_url
            .unwrap_or("https://www.protondb.com")
            .trim_end_matches('/')
            .to_string();
        let http = Client::builder()
            .user_agent("ludex/0.1")
            .timeout(Duration::from_secs(timeout_secs.unwrap_or(10)))
            .build()?;
        Ok(Self { base_url, http })
    }

    pub fn from_env() -> AnyResult<Self> {
        let base = env_opt("PROTONDB_BASE_URL");
        let timeout: u64 = env_parse("PROTONDB_TIMEOUT_SECS", 10);
        Self::new(base.as_deref(), Some(timeout))
    }
}

#[async_trait]
impl CompatibilityService for ProtonDbClient {
    async fn get_rating(&self, app_id: u32) -> Result<Option<CompatibilityRating>> {
        let url = format!(
            "{}/api/v1/reports/summaries/{}.json",
            self.base_url, app_id
        );
        let resp = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| CoreError::unavailable(SERVICE, e))?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let status = resp.status();
        if !status.is_success() {
            return Err(CoreError::unavailable(
                SERVICE,
                format!("summary fetch failed: {status}"),
            ));
        }
        let body: Value = resp
            .json()
            .await
            .map_err(|e| CoreError::unavailable(SERVICE, e))?;

        let Some(tier) = body.get("tier").and_then(|v| v.as_str()) else {
            return Ok(None);
        };
        Ok(Some(CompatibilityRating {
            tier: tier.to_string(),
            trending_tier: body
                .get("trendingTier")
                .and_then(|v| v.as_str())
                .map(|s| s.to_string()),
            report_count: body
                .get("total")
                .and_then(|v| v.as_u64())
                .map(|v| v as u32),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn summary_parses_tiers() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", "/api/v1/reports/summaries/1245620.json")
            .with_body(
                json!({"tier": "gold", "trendingTier": "platinum", "total": 412}).to_string(),
            )
            .create_async()
            .await;

        let client = ProtonDbClient::new(Some(&server.url()), Some(5)).unwrap();
        let rating = client.get_rating(1_245_620).await.unwrap().unwrap();
        assert_eq!(rating.tier, "gold");
        assert_eq!(rating.trending_tier.as_deref(), Some("platinum"));
        assert_eq!(rating.report_count, Some(412));
    }

    #[tokio::test]
    async fn missing_app_is_none_not_error() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", "/api/v1/reports/summaries/42.json")
            .with_status(404)
            .create_async()
            .await;

        let client = ProtonDbClient::new(Some(&server.url()), Some(5)).unwrap();
        assert!(client.get_rating(42).await.unwrap().is_none());
    }
}
