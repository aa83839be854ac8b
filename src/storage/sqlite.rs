//! On-device sqlite backend used for guest sessions.
//!
//! rusqlite is synchronous, so every call hops onto the blocking pool with
//! the connection behind a mutex. The store is per-device and low-traffic;
//! contention is not a concern.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::domain::{Game, IdentityPatch, LinkedPlatform, OAuthTokens, Platform, WishlistItem};
use crate::error::{CoreError, Result};
use crate::storage::{LibraryStore, PlatformLinkStore, StoreBackend, UserId, WishlistStore};

#[derive(Clone)]
pub struct SqliteBackend {
    conn: Arc<Mutex<Connection>>,
}

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS library (
    user_id          TEXT NOT NULL,
    id               TEXT NOT NULL,
    platform         TEXT NOT NULL,
    title            TEXT NOT NULL,
    description      TEXT,
    cover_url        TEXT,
    hero_url         TEXT,
    steam_app_id     INTEGER,
    itad_game_id     TEXT,
    playtime_minutes INTEGER NOT NULL DEFAULT 0,
    last_played      TEXT,
    PRIMARY KEY (user_id, id)
);
CREATE TABLE IF NOT EXISTS platform_links (
    user_id          TEXT NOT NULL,
    platform         TEXT NOT NULL,
    external_user_id TEXT NOT NULL,
    linked_at        TEXT NOT NULL,
    oauth_json       TEXT,
    PRIMARY KEY (user_id, platform)
);
CREATE TABLE IF NOT EXISTS wishlist (
    user_id              TEXT NOT NULL,
    id                   TEXT NOT NULL,
    game_id              TEXT NOT NULL,
    title                TEXT NOT NULL,
    cover_url            TEXT,
    added_at             TEXT NOT NULL,
    best_deal_percentage INTEGER,
    PRIMARY KEY (user_id, id)
);
"#;

impl SqliteBackend {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path).map_err(CoreError::storage)?;
        conn.execute_batch(SCHEMA).map_err(CoreError::storage)?;
        Ok(SqliteBackend {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(CoreError::storage)?;
        conn.execute_batch(SCHEMA).map_err(CoreError::storage)?;
        Ok(SqliteBackend {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn into_backend(self) -> StoreBackend {
        let shared = Arc::new(self);
        StoreBackend {
            library: shared.clone(),
            links: shared.clone(),
            wishlist: shared,
        }
    }

    async fn with_conn<T, F>(&self, op: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> rusqlite::Result<T> + Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let guard = conn.lock().expect("sqlite mutex poisoned");
            op(&guard)
        })
        .await
        .map_err(CoreError::storage)?
        .map_err(CoreError::storage)
    }
}

fn game_from_row(row: &Row<'_>) -> rusqlite::Result<Game> {
    let platform_raw: String = row.get("platform")?;
    let last_played_raw: Option<String> = row.get("last_played")?;
    Ok(Game {
        id: row.get("id")?,
        platform: Platform::parse(&platform_raw).unwrap_or(Platform::Unknown),
        title: row.get("title")?,
        description: row.get("description")?,
        cover_url: row.get("cover_url")?,
        hero_url: row.get("hero_url")?,
        steam_app_id: row.get::<_, Option<i64>>("steam_app_id")?.map(|v| v as u32),
        itad_game_id: row.get("itad_game_id")?,
        playtime_minutes: row.get::<_, i64>("playtime_minutes")? as u32,
        last_played: last_played_raw
            .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
            .map(|dt| dt.with_timezone(&Utc)),
    })
}

#[async_trait]
impl LibraryStore for SqliteBackend {
    async fn get_all(&self, user: &UserId) -> Result<Vec<Game>> {
        let uid = user.raw().to_string();
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare("SELECT * FROM library WHERE user_id = ?1")?;
            let rows = stmt.query_map(params![uid], game_from_row)?;
            rows.collect()
        })
        .await
    }

    async fn get_by_id(&self, user: &UserId, game_id: &str) -> Result<Option<Game>> {
        let uid = user.raw().to_string();
        let gid = game_id.to_string();
        self.with_conn(move |conn| {
            conn.query_row(
                "SELECT * FROM library WHERE user_id = ?1 AND id = ?2",
                params![uid, gid],
                game_from_row,
            )
            .optional()
        })
        .await
    }

    async fn upsert_batch(&self, user: &UserId, games: &[Game]) -> Result<()> {
        let uid = user.raw().to_string();
        let games = games.to_vec();
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(
                "INSERT INTO library (user_id, id, platform, title, description, cover_url, \
                 hero_url, steam_app_id, itad_game_id, playtime_minutes, last_played) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11) \
                 ON CONFLICT (user_id, id) DO UPDATE SET \
                 platform = excluded.platform, title = excluded.title, \
                 description = excluded.description, cover_url = excluded.cover_url, \
                 hero_url = excluded.hero_url, \
                 steam_app_id = COALESCE(excluded.steam_app_id, library.steam_app_id), \
                 itad_game_id = COALESCE(excluded.itad_game_id, library.itad_game_id), \
                 playtime_minutes = excluded.playtime_minutes, \
                 last_played = excluded.last_played",
            )?;
            for game in &games {
                stmt.execute(params![
                    uid,
                    game.id,
                    game.platform.as_str(),
                    game.title,
                    game.description,
                    game.cover_url,
                    game.hero_url,
                    game.steam_app_id.map(|v| v as i64),
                    game.itad_game_id,
                    game.playtime_minutes as i64,
                    game.last_played.map(|dt| dt.to_rfc3339()),
                ])?;
            }
            Ok(())
        })
        .await
    }

    async fn update_cross_reference(
        &self,
        user: &UserId,
        game_id: &str,
        patch: &IdentityPatch,
    ) -> Result<()> {
        let uid = user.raw().to_string();
        let gid = game_id.to_string();
        let patch = patch.clone();
        self.with_conn(move |conn| {
            conn.execute(
                "UPDATE library SET \
                 steam_app_id = COALESCE(steam_app_id, ?3), \
                 itad_game_id = COALESCE(itad_game_id, ?4) \
                 WHERE user_id = ?1 AND id = ?2",
                params![
                    uid,
                    gid,
                    patch.steam_app_id.map(|v| v as i64),
                    patch.itad_game_id
                ],
            )?;
            Ok(())
        })
        .await
    }

    async fn search_catalog(&self, _query: &str) -> Result<Vec<Game>> {
        // The on-device store carries no catalog dataset. The router never
        // sends catalog searches here; answering empty keeps the contract
        // total without pretending to have data.
        Ok(Vec::new())
    }
}

#[async_trait]
impl PlatformLinkStore for SqliteBackend {
    async fn get_linked(&self, user: &UserId) -> Result<Vec<LinkedPlatform>> {
        let uid = user.raw().to_string();
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT platform, external_user_id, linked_at, oauth_json \
                 FROM platform_links WHERE user_id = ?1",
            )?;
            let rows = stmt.query_map(params![uid], |row| {
                let platform_raw: String = row.get(0)?;
                let linked_at_raw: String = row.get(2)?;
                let oauth_raw: Option<String> = row.get(3)?;
                Ok(LinkedPlatform {
                    platform: Platform::parse(&platform_raw).unwrap_or(Platform::Unknown),
                    external_user_id: row.get(1)?,
                    linked_at: DateTime::parse_from_rfc3339(&linked_at_raw)
                        .map(|dt| dt.with_timezone(&Utc))
                        .unwrap_or_else(|_| Utc::now()),
                    oauth: oauth_raw
                        .and_then(|raw| serde_json::from_str::<OAuthTokens>(&raw).ok()),
                })
            })?;
            rows.collect()
        })
        .await
    }

    async fn upsert(&self, user: &UserId, link: &LinkedPlatform) -> Result<()> {
        let uid = user.raw().to_string();
        let link = link.clone();
        self.with_conn(move |conn| {
            let oauth_json = link
                .oauth
                .as_ref()
                .and_then(|t| serde_json::to_string(t).ok());
            conn.execute(
                "INSERT INTO platform_links (user_id, platform, external_user_id, linked_at, oauth_json) \
                 VALUES (?1, ?2, ?3, ?4, ?5) \
                 ON CONFLICT (user_id, platform) DO UPDATE SET \
                 external_user_id = excluded.external_user_id, \
                 linked_at = excluded.linked_at, oauth_json = excluded.oauth_json",
                params![
                    uid,
                    link.platform.as_str(),
                    link.external_user_id,
                    link.linked_at.to_rfc3339(),
                    oauth_json
                ],
            )?;
            Ok(())
        })
        .await
    }

    async fn remove(&self, user: &UserId, platform: Platform) -> Result<()> {
        let uid = user.raw().to_string();
        self.with_conn(move |conn| {
            conn.execute(
                "DELETE FROM platform_links WHERE user_id = ?1 AND platform = ?2",
                params![uid, platform.as_str()],
            )?;
            Ok(())
        })
        .await
    }
}

#[async_trait]
impl WishlistStore for SqliteBackend {
    async fn get_all(&self, user: &UserId) -> Result<Vec<WishlistItem>> {
        let uid = user.raw().to_string();
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, game_id, title, cover_url, added_at, best_deal_percentage \
                 FROM wishlist WHERE user_id = ?1",
            )?;
            let rows = stmt.query_map(params![uid], |row| {
                let added_raw: String = row.get(4)?;
                Ok(WishlistItem {
                    id: row.get(0)?,
                    game_id: row.get(1)?,
                    title: row.get(2)?,
                    cover_url: row.get(3)?,
                    added_at: DateTime::parse_from_rfc3339(&added_raw)
                        .map(|dt| dt.with_timezone(&Utc))
                        .unwrap_or_else(|_| Utc::now()),
                    best_deal_percentage: row
                        .get::<_, Option<i64>>(5)?
                        .map(|v| v.clamp(0, 100) as u8),
                })
            })?;
            rows.collect()
        })
        .await
    }
}
