//! Steam Web API + storefront client.
//!
//! Endpoints used:
//! - GET IPlayerService/GetOwnedGames/v1        - owned library with playtime
//! - POST /openid/login (check_authentication)  - callback verification
//! - GET ISteamUser/ResolveVanityURL/v1         - vanity name -> steam id
//! - GET ISteamUser/GetPlayerSummaries/v2       - profile visibility
//! - GET store /api/storesearch                 - fuzzy title -> app id
//! - GET store /api/appdetails                  - store-page metadata

use std::collections::HashMap;
use std::time::Duration;

use anyhow::{anyhow, Result as AnyResult};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use reqwest::Client;
use serde_json::Value;

use crate::domain::{Game, Platform, StoreMetadata};
use crate::error::{CoreError, Result};
use crate::platforms::{ProfileVisibility, SteamApi};
use crate::util::env::{env_opt, env_parse, env_req};

const SERVICE: &str = "steam";

// communityvisibilitystate value for a fully public profile.
const VISIBILITY_PUBLIC: i64 = 3;

#[derive(Debug, Clone)]
pub struct SteamClient {
    api_base: String,
    store_base: String,
    openid_base: String,
    api_key: String,
    http: Client,
}

impl SteamClient {
    pub fn new(
        api_key: impl Into<String>,
        api_base: Option<&str>,
        store_base: Option<&str>,
        timeout_secs: Option<u64>,
    ) -> AnyResult<Self> {
        let api_base = api_base
            .unwrap_or("https://api.steampowered.com")
            .trim_end_matches('/')
            .to_string();
        let store_base = store_base
            .unwrap_or("https://store.steampowered.com")
            .trim_end_matches('/')
            .to_string();
        let openid_base = format!("{}/openid/login", store_base);
        let http = Client::builder()
            .user_agent("ludex/0.1")
            .timeout(Duration::from_secs(timeout_secs.unwrap_or(15)))
            .build()?;
        Ok(Self {
            api_base,
            store_base,
            openid_base,
            api_key: api_key.into(),
            http,
        })
    }

    /// Construct from STEAM_API_KEY / STEAM_API_BASE / STEAM_STORE_BASE env.
    pub fn from_env() -> AnyResult<Self> {
        let key = env_req("STEAM_API_KEY")?;
        let timeout: u64 = env_parse("STEAM_HTTP_TIMEOUT_SECS", 15);
        Self::new(
            key,
            env_opt("STEAM_API_BASE").as_deref(),
            env_opt("STEAM_STORE_BASE").as_deref(),
            Some(timeout),
        )
    }

    async fn get_json(&self, url: &str, query: &[(&str, String)]) -> AnyResult<Value> {
        let resp = self
            .http
            .get(url)
            .header("Accept", "application/json")
            .query(query)
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(anyhow!("steam request failed: {status} url={url}"));
        }
        Ok(resp.json().await?)
    }

    fn game_from_owned_entry(entry: &Value) -> Option<Game> {
        let appid = entry.get("appid").and_then(|v| v.as_u64())? as u32;
        let title = entry
            .get("name")
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .to_string();
        let playtime = entry
            .get("playtime_forever")
            .and_then(|v| v.as_u64())
            .unwrap_or(0) as u32;
        let last_played = entry
            .get("rtime_last_played")
            .and_then(|v| v.as_i64())
            .filter(|ts| *ts > 0)
            .and_then(|ts| DateTime::<Utc>::from_timestamp(ts, 0));
        Some(Game {
            id: appid.to_string(),
            platform: Platform::Steam,
            title,
            description: None,
            cover_url: Some(format!(
                "https://cdn.cloudflare.steamstatic.com/steam/apps/{appid}/library_600x900.jpg"
            )),
            hero_url: Some(format!(
                "https://cdn.cloudflare.steamstatic.com/steam/apps/{appid}/header.jpg"
            )),
            steam_app_id: Some(appid),
            itad_game_id: None,
            playtime_minutes: playtime,
            last_played,
        })
    }

    fn metadata_from_appdetails(data: &Value) -> StoreMetadata {
        let strings = |key: &str| -> Vec<String> {
            data.get(key)
                .and_then(|v| v.as_array())
                .map(|arr| {
                    arr.iter()
                        .filter_map(|v| v.as_str().map(|s| s.to_string()))
                        .collect()
                })
                .unwrap_or_default()
        };
        let genres = data
            .get("genres")
            .and_then(|v| v.as_array())
            .map(|arr| {
                arr.iter()
                    .filter_map(|g| g.get("description").and_then(|v| v.as_str()))
                    .map(|s| s.to_string())
                    .collect()
            })
            .unwrap_or_default();
        let screenshots = data
            .get("screenshots")
            .and_then(|v| v.as_array())
            .map(|arr| {
                arr.iter()
                    .filter_map(|s| s.get("path_full").and_then(|v| v.as_str()))
                    .map(|s| s.to_string())
                    .collect()
            })
            .unwrap_or_default();
        let release_date = data
            .get("release_date")
            .and_then(|r| r.get("date"))
            .and_then(|v| v.as_str())
            .and_then(|raw| NaiveDate::parse_from_str(raw, "%e %b, %Y").ok());
        StoreMetadata {
            genres,
            developers: strings("developers"),
            publishers: strings("publishers"),
            release_date,
            critic_score: data
                .get("metacritic")
                .and_then(|m| m.get("score"))
                .and_then(|v| v.as_u64())
                .map(|s| s.min(100) as u8),
            screenshots,
            recommendation_count: data
                .get("recommendations")
                .and_then(|r| r.get("total"))
                .and_then(|v| v.as_u64()),
        }
    }
}

#[async_trait]
impl SteamApi for SteamClient {
    async fn get_owned_games(&self, steam_id: &str) -> Result<Vec<Game>> {
        let url = format!("{}/IPlayerService/GetOwnedGames/v1/", self.api_base);
        let body = self
            .get_json(
                &url,
                &[
                    ("key", self.api_key.clone()),
                    ("steamid", steam_id.to_string()),
                    ("include_appinfo", "1".to_string()),
                    ("include_played_free_games", "1".to_string()),
                ],
            )
            .await
            .map_err(|e| CoreError::unavailable(SERVICE, e))?;

        let mut games = Vec::new();
        if let Some(arr) = body
            .get("response")
            .and_then(|r| r.get("games"))
            .and_then(|v| v.as_array())
        {
            for entry in arr {
                if let Some(game) = Self::game_from_owned_entry(entry) {
                    games.push(game);
                }
            }
        }
        Ok(games)
    }

    async fn verify_openid(&self, params: &HashMap<String, String>) -> Result<Option<String>> {
        // Re-post the callback parameters with mode=check_authentication;
        // the provider answers a key-value document with is_valid.
        let mut form: Vec<(String, String)> = params
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        form.retain(|(k, _)| k != "openid.mode");
        form.push(("openid.mode".to_string(), "check_authentication".to_string()));

        let resp = self
            .http
            .post(&self.openid_base)
            .form(&form)
            .send()
            .await
            .map_err(|e| CoreError::unavailable(SERVICE, e))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(CoreError::unavailable(
                SERVICE,
                format!("openid verification failed: {status}"),
            ));
        }
        let text = resp
            .text()
            .await
            .map_err(|e| CoreError::unavailable(SERVICE, e))?;
        let valid = text
            .lines()
            .any(|line| line.trim().eq_ignore_ascii_case("is_valid:true"));
        if !valid {
            return Ok(None);
        }

        // claimed_id looks like https://steamcommunity.com/openid/id/7656119...
        let steam_id = params
            .get("openid.claimed_id")
            .and_then(|claimed| claimed.rsplit('/').next())
            .filter(|id| !id.is_empty() && id.chars().all(|c| c.is_ascii_digit()))
            .map(|id| id.to_string());
        Ok(steam_id)
    }

    async fn resolve_vanity(&self, vanity: &str) -> Result<Option<String>> {
        // Accept either a bare vanity name or a full profile URL.
        let trimmed = vanity.trim_end_matches('/');
        if let Some(rest) = trimmed.rfind("/profiles/").map(|i| &trimmed[i + 10..]) {
            if !rest.is_empty() && rest.chars().all(|c| c.is_ascii_digit()) {
                return Ok(Some(rest.to_string()));
            }
        }
        let name = trimmed.rsplit('/').next().unwrap_or(trimmed);
        if name.chars().all(|c| c.is_ascii_digit()) && name.len() >= 16 {
            return Ok(Some(name.to_string()));
        }

        let url = format!("{}/ISteamUser/ResolveVanityURL/v1/", self.api_base);
        let body = self
            .get_json(
                &url,
                &[
                    ("key", self.api_key.clone()),
                    ("vanityurl", name.to_string()),
                ],
            )
            .await
            .map_err(|e| CoreError::unavailable(SERVICE, e))?;

        let response = body.get("response").unwrap_or(&Value::Null);
        if response.get("success").and_then(|v| v.as_i64()) != Some(1) {
            return Ok(None);
        }
        Ok(response
            .get("steamid")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string()))
    }

    async fn check_profile_visibility(&self, steam_id: &str) -> Result<ProfileVisibility> {
        let url = format!("{}/ISteamUser/GetPlayerSummaries/v2/", self.api_base);
        let body = self
            .get_json(
                &url,
                &[
                    ("key", self.api_key.clone()),
                    ("steamids", steam_id.to_string()),
                ],
            )
            .await
            .map_err(|e| CoreError::unavailable(SERVICE, e))?;

        let state = body
            .get("response")
            .and_then(|r| r.get("players"))
            .and_then(|p| p.as_array())
            .and_then(|arr| arr.first())
            .and_then(|p| p.get("communityvisibilitystate"))
            .and_then(|v| v.as_i64());
        Ok(if state == Some(VISIBILITY_PUBLIC) {
            ProfileVisibility::Public
        } else {
            ProfileVisibility::Private
        })
    }

    async fn search_app_by_title(&self, title: &str) -> Result<Option<u32>> {
        let url = format!(
            "{}/api/storesearch?term={}&cc=US&l=english",
            self.store_base,
            urlencoding::encode(title)
        );
        let body = self
            .get_json(&url, &[])
            .await
            .map_err(|e| CoreError::unavailable(SERVICE, e))?;

        Ok(body
            .get("items")
            .and_then(|v| v.as_array())
            .and_then(|arr| arr.first())
            .and_then(|item| item.get("id"))
            .and_then(|v| v.as_u64())
            .map(|id| id as u32))
    }

    async fn get_store_metadata(&self, app_id: u32) -> Result<Option<StoreMetadata>> {
        let url = format!("{}/api/appdetails", self.store_base);
        let body = self
            .get_json(&url, &[("appids", app_id.to_string())])
            .await
            .map_err(|e| CoreError::unavailable(SERVICE, e))?;

        let entry = body.get(app_id.to_string()).unwrap_or(&Value::Null);
        if entry.get("success").and_then(|v| v.as_bool()) != Some(true) {
            return Ok(None);
        }
        Ok(entry
            .get("data")
            .map(Self::metadata_from_appdetails))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn client(server: &mockito::ServerGuard) -> SteamClient {
        SteamClient::new("test-key", Some(&server.url()), Some(&server.url()), Some(5)).unwrap()
    }

    #[tokio::test]
    async fn owned_games_map_playtime_and_ids() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", "/IPlayerService/GetOwnedGames/v1/")
            .match_query(mockito::Matcher::Any)
            .with_body(
                json!({"response": {"game_count": 1, "games": [
                    {"appid": 1245620, "name": "Elden Ring", "playtime_forever": 5400,
                     "rtime_last_played": 1700000000}
                ]}})
                .to_string(),
            )
            .create_async()
            .await;

        let games = client(&server).get_owned_games("76561198000000000").await.unwrap();
        assert_eq!(games.len(), 1);
        assert_eq!(games[0].id, "1245620");
        assert_eq!(games[0].platform, Platform::Steam);
        assert_eq!(games[0].steam_app_id, Some(1_245_620));
        assert_eq!(games[0].playtime_minutes, 5400);
        assert!(games[0].last_played.is_some());
    }

    #[tokio::test]
    async fn openid_verification_extracts_claimed_id() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("POST", "/openid/login")
            .with_body("ns:http://specs.openid.net/auth/2.0\nis_valid:true\n")
            .create_async()
            .await;

        let mut params = HashMap::new();
        params.insert(
            "openid.claimed_id".to_string(),
            "https://steamcommunity.com/openid/id/76561198012345678".to_string(),
        );
        params.insert("openid.mode".to_string(), "id_res".to_string());

        let id = client(&server).verify_openid(&params).await.unwrap();
        assert_eq!(id.as_deref(), Some("76561198012345678"));
    }

    #[tokio::test]
    async fn openid_rejection_yields_none() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("POST", "/openid/login")
            .with_body("is_valid:false\n")
            .create_async()
            .await;

        let id = client(&server)
            .verify_openid(&HashMap::new())
            .await
            .unwrap();
        assert!(id.is_none());
    }

    #[tokio::test]
    async fn private_profile_detected() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", "/ISteamUser/GetPlayerSummaries/v2/")
            .match_query(mockito::Matcher::Any)
            .with_body(
                json!({"response": {"players": [{"communityvisibilitystate": 1}]}}).to_string(),
            )
            .create_async()
            .await;

        let vis = client(&server)
            .check_profile_visibility("76561198012345678")
            .await
            .unwrap();
        assert_eq!(vis, ProfileVisibility::Private);
    }

    #[tokio::test]
    async fn profile_url_short_circuits_vanity_call() {
        // No mock set up: resolving a /profiles/ URL must not hit the API.
        let mut server = mockito::Server::new_async().await;
        let id = client(&server)
            .resolve_vanity("https://steamcommunity.com/profiles/76561198012345678/")
            .await
            .unwrap();
        assert_eq!(id.as_deref(), Some("76561198012345678"));
    }
}
