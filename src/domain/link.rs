use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Platform;

/// OAuth2 token pair returned by a platform's code exchange (GOG).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OAuthTokens {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(default)]
    pub expires_in: Option<u64>,
}

/// A platform account linked to a user. One row per platform per user;
/// re-linking replaces rather than appends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkedPlatform {
    pub platform: Platform,
    pub external_user_id: String,
    pub linked_at: DateTime<Utc>,
    /// Present only for platforms whose sync needs a stored credential.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub oauth: Option<OAuthTokens>,
}

impl LinkedPlatform {
    pub fn new(platform: Platform, external_user_id: impl Into<String>) -> Self {
        LinkedPlatform {
            platform,
            external_user_id: external_user_id.into(),
            linked_at: Utc::now(),
            oauth: None,
        }
    }

    pub fn with_oauth(mut self, tokens: OAuthTokens) -> Self {
        self.oauth = Some(tokens);
        self
    }
}
