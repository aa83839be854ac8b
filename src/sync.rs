//! Background library synchronization.
//!
//! Linking hands a [`SyncJob`] to the [`SyncQueue`] and returns immediately;
//! a detached worker drains the queue and runs [`LibrarySyncService`] per
//! job. A failed sync never undoes a link — it is reported to the
//! [`FailureSink`] and the job is dropped.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::domain::Platform;
use crate::error::{CoreError, Result};
use crate::platforms::{EpicApi, EpicToken, GogApi, SteamApi};
use crate::storage::{StorageRouter, UserId};

/// One unit of background work: refresh one user's library for one platform.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncJob {
    pub user: UserId,
    pub platform: Platform,
}

/// Where failed background jobs end up. The default sink logs; callers that
/// need retry or alerting plug their own in.
pub trait FailureSink: Send + Sync {
    fn report(&self, job: &SyncJob, err: &CoreError);
}

/// Structured-log sink, the composition-root default.
pub struct LoggingFailureSink;

impl FailureSink for LoggingFailureSink {
    fn report(&self, job: &SyncJob, err: &CoreError) {
        error!(
            user = %job.user.raw(),
            platform = %job.platform.as_str(),
            error = %err,
            "background library sync failed"
        );
    }
}

/// Fetches the owned library from the linked platform and upserts it into
/// the user's store. Stateless; safe to share behind an `Arc`.
pub struct LibrarySyncService {
    router: StorageRouter,
    steam: Arc<dyn SteamApi>,
    epic: Arc<dyn EpicApi>,
    gog: Arc<dyn GogApi>,
}

impl LibrarySyncService {
    pub fn new(
        router: StorageRouter,
        steam: Arc<dyn SteamApi>,
        epic: Arc<dyn EpicApi>,
        gog: Arc<dyn GogApi>,
    ) -> Self {
        LibrarySyncService {
            router,
            steam,
            epic,
            gog,
        }
    }

    /// Refresh the user's library for one platform using the stored link.
    pub async fn sync(&self, job: &SyncJob) -> Result<()> {
        let link = self
            .router
            .links(&job.user)
            .get_linked(&job.user)
            .await?
            .into_iter()
            .find(|l| l.platform == job.platform)
            .ok_or_else(|| {
                CoreError::precondition(format!(
                    "no {} link stored for this user",
                    job.platform.as_str()
                ))
            })?;

        let games = match job.platform {
            Platform::Steam => self.steam.get_owned_games(&link.external_user_id).await?,
            Platform::EpicGames => {
                let oauth = link.oauth.as_ref().ok_or_else(|| {
                    CoreError::precondition(
                        "epic link has no stored credential; re-import the library",
                    )
                })?;
                let token = EpicToken {
                    account_id: link.external_user_id.clone(),
                    access_token: oauth.access_token.clone(),
                };
                self.epic.get_entitlements(&token).await?
            }
            Platform::Gog => {
                let oauth = link.oauth.as_ref().ok_or_else(|| {
                    CoreError::precondition("gog link has no stored token pair")
                })?;
                self.gog.get_owned_games(oauth).await?
            }
            Platform::Unknown => {
                return Err(CoreError::precondition("cannot sync an unlinked platform"))
            }
        };

        info!(
            user = %job.user.raw(),
            platform = %job.platform.as_str(),
            count = games.len(),
            "library sync fetched owned games"
        );
        self.router
            .library(&job.user)
            .upsert_batch(&job.user, &games)
            .await
    }
}

/// Unbounded fire-and-forget queue with one detached worker. Enqueueing
/// never blocks and never fails the caller; jobs outlive the handle that
/// enqueued them.
#[derive(Clone)]
pub struct SyncQueue {
    tx: mpsc::UnboundedSender<SyncJob>,
}

impl SyncQueue {
    pub fn spawn(service: Arc<LibrarySyncService>, sink: Arc<dyn FailureSink>) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<SyncJob>();
        tokio::spawn(async move {
            while let Some(job) = rx.recv().await {
                if let Err(err) = service.sync(&job).await {
                    sink.report(&job, &err);
                }
            }
        });
        SyncQueue { tx }
    }

    pub fn enqueue(&self, job: SyncJob) {
        if self.tx.send(job).is_err() {
            // Worker gone: nothing to do but surface it in the logs.
            warn!("sync worker is down; dropping job");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::time::Duration;

    use tokio::sync::Notify;

    use crate::domain::{Game, LinkedPlatform};
    use crate::storage::memory::MemoryBackend;
    use crate::storage::LibraryStore;
    use crate::testing::{arc, router_over, MockEpic, MockGog, MockSteam};

    struct RecordingSink {
        failures: Mutex<Vec<String>>,
        notify: Notify,
    }

    impl RecordingSink {
        fn new() -> Arc<Self> {
            Arc::new(RecordingSink {
                failures: Mutex::new(Vec::new()),
                notify: Notify::new(),
            })
        }
    }

    impl FailureSink for RecordingSink {
        fn report(&self, job: &SyncJob, err: &CoreError) {
            self.failures
                .lock()
                .unwrap()
                .push(format!("{}: {err}", job.platform.as_str()));
            self.notify.notify_one();
        }
    }

    fn steam_game(id: &str, title: &str) -> Game {
        Game {
            id: id.into(),
            platform: Platform::Steam,
            title: title.into(),
            description: None,
            cover_url: None,
            hero_url: None,
            steam_app_id: id.parse().ok(),
            itad_game_id: None,
            playtime_minutes: 0,
            last_played: None,
        }
    }

    fn service(backend: MemoryBackend, steam: Arc<MockSteam>) -> Arc<LibrarySyncService> {
        Arc::new(LibrarySyncService::new(
            router_over(backend),
            steam,
            arc(MockEpic::default()),
            arc(MockGog::default()),
        ))
    }

    #[tokio::test]
    async fn steam_sync_upserts_owned_games() {
        let user = UserId::Account("u1".into());
        let backend = MemoryBackend::new();
        backend.seed_links(&user, vec![LinkedPlatform::new(Platform::Steam, "7656119")]);
        let steam = arc(MockSteam {
            owned: vec![steam_game("620", "Portal 2")],
            ..Default::default()
        });

        let svc = service(backend.clone(), steam);
        svc.sync(&SyncJob {
            user: user.clone(),
            platform: Platform::Steam,
        })
        .await
        .unwrap();

        assert_eq!(backend.get_all(&user).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn missing_link_is_a_precondition_failure() {
        let user = UserId::Account("u1".into());
        let svc = service(MemoryBackend::new(), arc(MockSteam::default()));

        let err = svc
            .sync(&SyncJob {
                user,
                platform: Platform::Gog,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::PreconditionFailed { .. }));
    }

    #[tokio::test]
    async fn queue_routes_failures_to_the_sink() {
        let user = UserId::Account("u1".into());
        let svc = service(MemoryBackend::new(), arc(MockSteam::default()));
        let sink = RecordingSink::new();

        let queue = SyncQueue::spawn(svc, sink.clone());
        queue.enqueue(SyncJob {
            user,
            platform: Platform::Steam,
        });

        tokio::time::timeout(Duration::from_secs(1), sink.notify.notified())
            .await
            .expect("sink should be notified");
        let failures = sink.failures.lock().unwrap();
        assert_eq!(failures.len(), 1);
        assert!(failures[0].starts_with("STEAM"));
    }

    #[tokio::test]
    async fn queued_job_lands_in_the_library() {
        let user = UserId::Account("u1".into());
        let backend = MemoryBackend::new();
        backend.seed_links(&user, vec![LinkedPlatform::new(Platform::Steam, "7656119")]);
        let steam = arc(MockSteam {
            owned: vec![steam_game("620", "Portal 2")],
            ..Default::default()
        });

        let queue = SyncQueue::spawn(service(backend.clone(), steam), RecordingSink::new());
        queue.enqueue(SyncJob {
            user: user.clone(),
            platform: Platform::Steam,
        });

        for _ in 0..100 {
            if !backend.get_all(&user).await.unwrap().is_empty() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("sync job never wrote the library");
    }
}
