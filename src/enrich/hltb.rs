//! HowLongToBeat search client for playtime estimates.
//!
//! POST /api/search with a JSON body of search terms; response rows carry
//! comp_main / comp_plus / comp_100 in seconds. The closest title match is
//! the first row; anything below a crude similarity floor is discarded so a
//! wild mismatch does not masquerade as an estimate.

use std::time::Duration;

use anyhow::Result as AnyResult;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};

use crate::domain::DurationEstimate;
use crate::enrich::PlaytimeService;
use crate::error::{CoreError, Result};
use crate::util::env::{env_opt, env_parse};

const SERVICE: &str = "hltb";

const SECONDS_PER_HOUR: f64 = 3600.0;

#[derive(Debug, Clone)]
pub struct HltbClient {
    base_url: String,
    http: Client,
}

impl HltbClient {
    pub fn new(base_url: Option<&str>, timeout_secs: Option<u64>) -> AnyResult<Self> {
        let base_url = base_url
            .unwrap_or("https://howlongtobeat.com")
            .trim_end_matches('/')
            .to_string();
        let http = Client::builder()
            .user_agent("ludex/0.1")
            .timeout(Duration::from_secs(timeout_secs.unwrap_or(10)))
            .build()?;
        Ok(Self { base_url, http })
    }

    pub fn from_env() -> AnyResult<Self> {
        let base = env_opt("HLTB_BASE_URL");
        let timeout: u64 = env_parse("HLTB_TIMEOUT_SECS", 10);
        Self::new(base.as_deref(), Some(timeout))
    }

    fn hours(row: &Value, key: &str) -> Option<f64> {
        row.get(key)
            .and_then(|v| v.as_f64())
            .filter(|secs| *secs > 0.0)
            .map(|secs| (secs / SECONDS_PER_HOUR * 2.0).round() / 2.0)
    }

    /// Crude containment check: every search term must appear in the
    /// candidate title (case-insensitive).
    fn title_matches(candidate: &str, query: &str) -> bool {
        let hay = candidate.to_ascii_lowercase();
        query
            .split_whitespace()
            .all(|term| hay.contains(&term.to_ascii_lowercase()))
    }
}

#[async_trait]
impl PlaytimeService for HltbClient {
    async fn get_duration(&self, title: &str) -> Result<Option<DurationEstimate>> {
        let url = format!("{}/api/search", self.base_url);
        let terms: Vec<&str> = title.split_whitespace().collect();
        let payload = json!({
            "searchType": "games",
            "searchTerms": terms,
            "searchPage": 1,
            "size": 5,
        });
        let resp = self
            .http
            .post(&url)
            .header("Referer", &self.base_url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| CoreError::unavailable(SERVICE, e))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(CoreError::unavailable(
                SERVICE,
                format!("search failed: {status}"),
            ));
        }
        let body: Value = resp
            .json()
            .await
            .map_err(|e| CoreError::unavailable(SERVICE, e))?;

        let Some(rows) = body.get("data").and_then(|v| v.as_array()) else {
            return Ok(None);
        };
        let row = rows.iter().find(|row| {
            row.get("game_name")
                .and_then(|v| v.as_str())
                .map(|name| Self::title_matches(name, title))
                .unwrap_or(false)
        });
        let Some(row) = row else {
            return Ok(None);
        };

        let estimate = DurationEstimate {
            main_hours: Self::hours(row, "comp_main"),
            main_extra_hours: Self::hours(row, "comp_plus"),
            completionist_hours: Self::hours(row, "comp_100"),
        };
        if estimate.main_hours.is_none()
            && estimate.main_extra_hours.is_none()
            && estimate.completionist_hours.is_none()
        {
            return Ok(None);
        }
        Ok(Some(estimate))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn search_picks_matching_row_and_converts_to_hours() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("POST", "/api/search")
            .with_body(
                json!({"data": [
                    {"game_name": "Silksong", "comp_main": 0},
                    {"game_name": "Hollow Knight", "comp_main": 95400,
                     "comp_plus": 180000, "comp_100": 367200}
                ]})
                .to_string(),
            )
            .create_async()
            .await;

        let client = HltbClient::new(Some(&server.url()), Some(5)).unwrap();
        let est = client.get_duration("Hollow Knight").await.unwrap().unwrap();
        assert_eq!(est.main_hours, Some(26.5));
        assert_eq!(est.main_extra_hours, Some(50.0));
        assert_eq!(est.completionist_hours, Some(102.0));
    }

    #[tokio::test]
    async fn no_match_is_none() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("POST", "/api/search")
            .with_body(json!({"data": [{"game_name": "Unrelated", "comp_main": 100}]}).to_string())
            .create_async()
            .await;

        let client = HltbClient::new(Some(&server.url()), Some(5)).unwrap();
        assert!(client.get_duration("Hollow Knight").await.unwrap().is_none());
    }
}
