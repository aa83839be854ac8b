//! Epic Games Store client: authorization-code exchange, owned entitlements,
//! and the manual library-export parser used by the import linking path.

use std::time::Duration;

use anyhow::Result as AnyResult;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;

use crate::domain::{Game, Platform};
use crate::error::{CoreError, Result};
use crate::platforms::{EpicApi, EpicToken};
use crate::util::env::{env_opt, env_parse, env_req};

const SERVICE: &str = "epic";

#[derive(Debug, Clone)]
pub struct EpicClient {
    base_url: String,
    client_credentials: String,
    http: Client,
}

impl EpicClient {
    pub fn new(
        client_credentials: impl Into<String>,
        base_url: Option<&str>,
        timeout_secs: Option<u64>,
    ) -> AnyResult<Self> {
        let base_url = base_url
            .unwrap_or("https://account-public-service-prod.ol.epicgames.com")
            .trim_end_matches('/')
            .to_string();
        let http = Client::builder()
            .user_agent("ludex/0.1")
            .timeout(Duration::from_secs(timeout_secs.unwrap_or(15)))
            .build()?;
        Ok(Self {
            base_url,
            client_credentials: client_credentials.into(),
            http,
        })
    }

    pub fn from_env() -> AnyResult<Self> {
        let creds = env_req("EPIC_CLIENT_CREDENTIALS")?;
        let timeout: u64 = env_parse("EPIC_HTTP_TIMEOUT_SECS", 15);
        Self::new(creds, env_opt("EPIC_API_BASE").as_deref(), Some(timeout))
    }

    fn game_from_record(record: &Value) -> Option<Game> {
        let id = record
            .get("catalogItemId")
            .or_else(|| record.get("appName"))
            .and_then(|v| v.as_str())?;
        let title = record
            .get("title")
            .or_else(|| record.get("displayName"))
            .and_then(|v| v.as_str())
            .unwrap_or(id);
        let mut game = Game::ephemeral(id, title, None, None, None);
        game.platform = Platform::EpicGames;
        Some(game)
    }
}

#[async_trait]
impl EpicApi for EpicClient {
    async fn exchange_code(&self, code: &str) -> Result<EpicToken> {
        let url = format!("{}/account/api/oauth/token", self.base_url);
        let resp = self
            .http
            .post(&url)
            .header(
                "Authorization",
                format!("basic {}", self.client_credentials),
            )
            .form(&[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("token_type", "eg1"),
            ])
            .send()
            .await
            .map_err(|e| CoreError::unavailable(SERVICE, e))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(CoreError::unavailable(
                SERVICE,
                format!("token exchange failed: {status}"),
            ));
        }
        let body: Value = resp
            .json()
            .await
            .map_err(|e| CoreError::unavailable(SERVICE, e))?;

        let account_id = body
            .get("account_id")
            .and_then(|v| v.as_str())
            .ok_or_else(|| CoreError::unavailable(SERVICE, "token response missing account_id"))?;
        let access_token = body
            .get("access_token")
            .and_then(|v| v.as_str())
            .ok_or_else(|| CoreError::unavailable(SERVICE, "token response missing access_token"))?;
        Ok(EpicToken {
            account_id: account_id.to_string(),
            access_token: access_token.to_string(),
        })
    }

    async fn get_entitlements(&self, token: &EpicToken) -> Result<Vec<Game>> {
        let url = format!(
            "{}/epic/ecom/v1/identities/{}/entitlements",
            self.base_url, token.account_id
        );
        let resp = self
            .http
            .get(&url)
            .header("Authorization", format!("bearer {}", token.access_token))
            .send()
            .await
            .map_err(|e| CoreError::unavailable(SERVICE, e))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(CoreError::unavailable(
                SERVICE,
                format!("entitlement fetch failed: {status}"),
            ));
        }
        let body: Value = resp
            .json()
            .await
            .map_err(|e| CoreError::unavailable(SERVICE, e))?;

        let records = body
            .get("entitlements")
            .and_then(|v| v.as_array())
            .or_else(|| body.as_array())
            .cloned()
            .unwrap_or_default();
        Ok(records.iter().filter_map(Self::game_from_record).collect())
    }
}

/// Parse a user-supplied manual library export (the JSON file the Epic
/// launcher's order-history tooling produces: an array of objects carrying at
/// least a title, optionally an item id).
///
/// Fails with [`CoreError::MalformedInput`] on anything that is not a
/// non-empty array of that shape.
pub fn parse_manual_export(raw: &str) -> Result<Vec<Game>> {
    let value: Value = serde_json::from_str(raw)
        .map_err(|e| CoreError::MalformedInput(format!("export is not valid JSON: {e}")))?;
    let arr = value
        .as_array()
        .ok_or_else(|| CoreError::MalformedInput("export must be a JSON array".into()))?;
    if arr.is_empty() {
        return Err(CoreError::MalformedInput("export contains no entries".into()));
    }

    let mut games = Vec::with_capacity(arr.len());
    for (idx, entry) in arr.iter().enumerate() {
        let title = entry
            .get("title")
            .or_else(|| entry.get("name"))
            .and_then(|v| v.as_str())
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| {
                CoreError::MalformedInput(format!("entry {idx} is missing a title"))
            })?;
        let id = entry
            .get("catalogItemId")
            .or_else(|| entry.get("id"))
            .and_then(|v| v.as_str())
            .map(|s| s.to_string())
            .unwrap_or_else(|| format!("epic-import-{idx}"));
        let mut game = Game::ephemeral(id, title, None, None, None);
        game.platform = Platform::EpicGames;
        games.push(game);
    }
    Ok(games)
}
