//! ITAD (IsThereAnyDeal) catalog client.
//!
//! Public API (base): https://api.isthereanydeal.com/
//!
//! Key endpoints:
//! - GET  /games/search/v1?title=...      - search for games
//! - GET  /games/lookup/v1?appid=...      - storefront app id -> catalog id
//! - GET  /games/info/v2?id=...           - catalog record with assets
//! - POST /games/prices/v2                - prices for a batch of ids
//! - POST /lookup/id/title/v1             - title -> id for a batch of titles

use std::collections::HashMap;
use std::time::Duration;

use anyhow::{anyhow, Result as AnyResult};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;

use crate::catalog::{CatalogInfo, CatalogService};
use crate::domain::{Deal, Platform};
use crate::error::{CoreError, Result};
use crate::util::env::{env_opt, env_parse};

const SERVICE: &str = "itad";

fn truncate_for_log(mut s: String, max_len: usize) -> String {
    if s.len() > max_len {
        s.truncate(max_len);
        s.push_str("…");
    }
    s
}

#[derive(Debug, Clone)]
pub struct ItadCatalog {
    base_url: String,
    http: Client,
    api_key: Option<String>,
}

impl ItadCatalog {
    pub fn new(base_url: Option<&str>, timeout_secs: Option<u64>) -> AnyResult<Self> {
        let base_url = base_url
            .unwrap_or("https://api.isthereanydeal.com")
            .trim_end_matches('/')
            .to_string();
        let timeout_secs = timeout_secs.unwrap_or(15);
        let http = Client::builder()
            .user_agent("ludex/0.1")
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;

        Ok(Self {
            base_url,
            http,
            api_key: None,
        })
    }

    /// Construct from ITAD_BASE_URL / ITAD_API_KEY / ITAD_TIMEOUT_SECS env.
    pub fn from_env() -> AnyResult<Self> {
        let base = env_opt("ITAD_BASE_URL");
        let timeout: u64 = env_parse("ITAD_TIMEOUT_SECS", 15);
        Ok(Self::new(base.as_deref(), Some(timeout))?.with_api_key(env_opt("ITAD_API_KEY")))
    }

    pub fn with_api_key(mut self, api_key: Option<String>) -> Self {
        self.api_key = api_key.filter(|s| !s.trim().is_empty());
        self
    }

    fn add_auth_query(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.api_key.as_deref() {
            Some(key) => req.query(&[("key", key)]),
            None => req,
        }
    }

    fn value_as_f64(v: &Value) -> Option<f64> {
        if let Some(n) = v.as_f64() {
            return Some(n);
        }
        if let Some(n) = v.as_i64() {
            return Some(n as f64);
        }
        if let Some(s) = v.as_str() {
            return s.parse::<f64>().ok();
        }
        None
    }

    fn extract_asset_url(obj: &Value, key: &str) -> Option<String> {
        obj.get("assets")
            .and_then(|a| a.get(key))
            .and_then(|v| v.as_str())
            .map(|s| s.to_string())
    }

    async fn get_json(&self, path: &str, query: &[(&str, String)]) -> AnyResult<Value> {
        let url = format!("{}{}", self.base_url, path);
        let req = self
            .http
            .get(&url)
            .header("Accept", "application/json")
            .query(query);
        let resp = self.add_auth_query(req).send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = truncate_for_log(resp.text().await.unwrap_or_default(), 2000);
            return Err(anyhow!("ITAD GET failed: {status} url={url} body={body}"));
        }
        Ok(resp.json().await?)
    }

    async fn post_json(&self, path: &str, payload: &Value) -> AnyResult<Value> {
        let url = format!("{}{}", self.base_url, path);
        let req = self
            .http
            .post(&url)
            .header("Accept", "application/json")
            .json(payload);
        let resp = self.add_auth_query(req).send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = truncate_for_log(resp.text().await.unwrap_or_default(), 2000);
            return Err(anyhow!("ITAD POST failed: {status} url={url} body={body}"));
        }
        Ok(resp.json().await?)
    }

    fn parse_deals(entry: &Value) -> Vec<Deal> {
        let mut deals = Vec::new();
        let Some(arr) = entry.get("deals").and_then(|v| v.as_array()) else {
            return deals;
        };
        for deal in arr {
            let store_name = deal
                .get("shop")
                .and_then(|s| s.get("name"))
                .and_then(|v| v.as_str())
                .unwrap_or("Unknown");
            let price = deal
                .get("price")
                .and_then(|p| p.get("amount"))
                .and_then(Self::value_as_f64);
            let Some(price) = price else { continue };
            let regular = deal
                .get("regular")
                .and_then(|p| p.get("amount"))
                .and_then(Self::value_as_f64)
                .unwrap_or(price);
            let cut = deal
                .get("cut")
                .and_then(|v| v.as_i64())
                .unwrap_or_else(|| {
                    if regular > 0.0 {
                        ((1.0 - price / regular) * 100.0).round() as i64
                    } else {
                        0
                    }
                })
                .clamp(0, 100) as u8;
            let url = deal
                .get("url")
                .and_then(|v| v.as_str())
                .unwrap_or("")
                .to_string();
            deals.push(Deal {
                store_name: store_name.to_string(),
                price,
                original_price: regular,
                discount_percentage: cut,
                url,
            });
        }
        deals
    }
}

#[async_trait]
impl CatalogService for ItadCatalog {
    async fn lookup_id_by_title(&self, title: &str) -> Result<Option<String>> {
        let body = self
            .get_json("/games/search/v1", &[("title", title.to_string())])
            .await
            .map_err(|e| CoreError::unavailable(SERVICE, e))?;

        // First search hit wins; ITAD orders by relevance.
        let id = body
            .as_array()
            .and_then(|arr| arr.first())
            .and_then(|item| item.get("id"))
            .and_then(|v| v.as_str())
            .map(|s| s.to_string());
        Ok(id)
    }

    async fn lookup_id_by_app_id(
        &self,
        platform: Platform,
        app_id: u32,
    ) -> Result<Option<String>> {
        // ITAD's lookup endpoint only understands Steam app ids.
        if platform != Platform::Steam {
            return Ok(None);
        }
        let body = self
            .get_json("/games/lookup/v1", &[("appid", app_id.to_string())])
            .await
            .map_err(|e| CoreError::unavailable(SERVICE, e))?;

        if !body.get("found").and_then(|v| v.as_bool()).unwrap_or(false) {
            return Ok(None);
        }
        Ok(body
            .get("game")
            .and_then(|g| g.get("id"))
            .and_then(|v| v.as_str())
            .map(|s| s.to_string()))
    }

    async fn get_info(&self, catalog_id: &str) -> Result<Option<CatalogInfo>> {
        let body = match self
            .get_json("/games/info/v2", &[("id", catalog_id.to_string())])
            .await
        {
            Ok(v) => v,
            Err(e) => return Err(CoreError::unavailable(SERVICE, e)),
        };

        // /games/info/v2 returns a single object (not wrapped in {data: ...}).
        if !body.is_object() || body.get("id").is_none() {
            return Ok(None);
        }

        let title = body
            .get("title")
            .and_then(|v| v.as_str())
            .unwrap_or(catalog_id)
            .to_string();
        let platform_app_id = body
            .get("appid")
            .and_then(|v| v.as_u64())
            .map(|v| v as u32);
        let cover_url = Self::extract_asset_url(&body, "boxart")
            .or_else(|| Self::extract_asset_url(&body, "banner"));

        Ok(Some(CatalogInfo {
            title,
            platform_app_id,
            cover_url,
        }))
    }

    async fn get_prices(&self, catalog_id: &str) -> Result<Vec<Deal>> {
        let map = self.get_prices_batch(&[catalog_id.to_string()]).await?;
        Ok(map.get(catalog_id).cloned().unwrap_or_default())
    }

    async fn lookup_ids_by_titles(&self, titles: &[String]) -> Result<HashMap<String, String>> {
        if titles.is_empty() {
            return Ok(HashMap::new());
        }
        let payload = Value::from(titles.to_vec());
        let body = self
            .post_json("/lookup/id/title/v1", &payload)
            .await
            .map_err(|e| CoreError::unavailable(SERVICE, e))?;

        let mut out = HashMap::new();
        if let Some(obj) = body.as_object() {
            for (title, id) in obj {
                if let Some(id) = id.as_str() {
                    out.insert(title.clone(), id.to_string());
                }
            }
        }
        Ok(out)
    }

    async fn get_prices_batch(
        &self,
        catalog_ids: &[String],
    ) -> Result<HashMap<String, Vec<Deal>>> {
        if catalog_ids.is_empty() {
            return Ok(HashMap::new());
        }
        let payload = Value::from(catalog_ids.to_vec());
        let body = self
            .post_json("/games/prices/v2", &payload)
            .await
            .map_err(|e| CoreError::unavailable(SERVICE, e))?;

        let mut out = HashMap::new();
        if let Some(arr) = body.as_array() {
            for entry in arr {
                let Some(id) = entry.get("id").and_then(|v| v.as_str()) else {
                    continue;
                };
                out.insert(id.to_string(), Self::parse_deals(entry));
            }
        }
        Ok(out)
    }
}
