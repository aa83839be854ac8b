//! GOG client: OAuth2 code exchange and owned-library fetch.

use std::time::Duration;

use anyhow::Result as AnyResult;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;

use crate::domain::{Game, OAuthTokens, Platform};
use crate::error::{CoreError, Result};
use crate::platforms::{GogApi, GogSession};
use crate::util::env::{env_opt, env_parse, env_req};

const SERVICE: &str = "gog";

// Public client id/secret GOG Galaxy itself uses for the embed flow.
const DEFAULT_CLIENT_ID: &str = "46899977096215655";
const DEFAULT_REDIRECT: &str = "https://embed.gog.com/on_login_success?origin=client";

#[derive(Debug, Clone)]
pub struct GogClient {
    auth_base: String,
    embed_base: String,
    client_id: String,
    client_secret: String,
    http: Client,
}

impl GogClient {
    pub fn new(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        auth_base: Option<&str>,
        embed_base: Option<&str>,
        timeout_secs: Option<u64>,
    ) -> AnyResult<Self> {
        let http = Client::builder()
            .user_agent("ludex/0.1")
            .timeout(Duration::from_secs(timeout_secs.unwrap_or(15)))
            .build()?;
        Ok(Self {
            auth_base: auth_base
                .unwrap_or("https://auth.gog.com")
                .trim_end_matches('/')
                .to_string(),
            embed_base: embed_base
                .unwrap_or("https://embed.gog.com")
                .trim_end_matches('/')
                .to_string(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            http,
        })
    }

    pub fn from_env() -> AnyResult<Self> {
        let id = env_opt("GOG_CLIENT_ID").unwrap_or_else(|| DEFAULT_CLIENT_ID.to_string());
        let secret = env_req("GOG_CLIENT_SECRET")?;
        let timeout: u64 = env_parse("GOG_HTTP_TIMEOUT_SECS", 15);
        Self::new(
            id,
            secret,
            env_opt("GOG_AUTH_BASE").as_deref(),
            env_opt("GOG_EMBED_BASE").as_deref(),
            Some(timeout),
        )
    }
}

#[async_trait]
impl GogApi for GogClient {
    async fn exchange_code(&self, code: &str) -> Result<GogSession> {
        let url = format!("{}/token", self.auth_base);
        let resp = self
            .http
            .get(&url)
            .query(&[
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("grant_type", "authorization_code"),
                ("code", code),
                ("redirect_uri", DEFAULT_REDIRECT),
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

        let access_token = body
            .get("access_token")
            .and_then(|v| v.as_str())
            .ok_or_else(|| CoreError::unavailable(SERVICE, "token response missing access_token"))?
            .to_string();
        let refresh_token = body
            .get("refresh_token")
            .and_then(|v| v.as_str())
            .ok_or_else(|| CoreError::unavailable(SERVICE, "token response missing refresh_token"))?
            .to_string();
        let user_id = body
            .get("user_id")
            .and_then(|v| v.as_str())
            .ok_or_else(|| CoreError::unavailable(SERVICE, "token response missing user_id"))?
            .to_string();
        Ok(GogSession {
            user_id,
            tokens: OAuthTokens {
                access_token,
                refresh_token,
                expires_in: body.get("expires_in").and_then(|v| v.as_u64()),
            },
        })
    }

    async fn get_owned_games(&self, tokens: &OAuthTokens) -> Result<Vec<Game>> {
        // The embed endpoint pages; accountsGamesList returns everything in
        // one document, which is enough for library sync.
        let url = format!("{}/user/data/games", self.embed_base);
        let resp = self
            .http
            .get(&url)
            .header("Authorization", format!("Bearer {}", tokens.access_token))
            .send()
            .await
            .map_err(|e| CoreError::unavailable(SERVICE, e))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(CoreError::unavailable(
                SERVICE,
                format!("owned games fetch failed: {status}"),
            ));
        }
        let body: Value = resp
            .json()
            .await
            .map_err(|e| CoreError::unavailable(SERVICE, e))?;

        let mut games = Vec::new();
        if let Some(ids) = body.get("owned").and_then(|v| v.as_array()) {
            for id in ids {
                let Some(product_id) = id.as_u64() else { continue };
                let mut game = Game::ephemeral(
                    product_id.to_string(),
                    format!("gog-{product_id}"),
                    None,
                    None,
                    None,
                );
                game.platform = Platform::Gog;
                games.push(game);
            }
        }
        Ok(games)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn code_exchange_returns_session_with_token_pair() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", "/token")
            .match_query(mockito::Matcher::Any)
            .with_body(
                json!({
                    "access_token": "at",
                    "refresh_token": "rt",
                    "expires_in": 3600,
                    "user_id": "gog-user-9"
                })
                .to_string(),
            )
            .create_async()
            .await;

        let client =
            GogClient::new("id", "secret", Some(&server.url()), None, Some(5)).unwrap();
        let session = client.exchange_code("code").await.unwrap();
        assert_eq!(session.user_id, "gog-user-9");
        assert_eq!(session.tokens.refresh_token, "rt");
        assert_eq!(session.tokens.expires_in, Some(3600));
    }

    #[tokio::test]
    async fn missing_refresh_token_is_an_error() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", "/token")
            .match_query(mockito::Matcher::Any)
            .with_body(json!({"access_token": "at", "user_id": "u"}).to_string())
            .create_async()
            .await;

        let client =
            GogClient::new("id", "secret", Some(&server.url()), None, Some(5)).unwrap();
        assert!(client.exchange_code("code").await.is_err());
    }
}
