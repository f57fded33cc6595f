//! Background cache of the latest update info.
//!
//! Many short-lived CLI invocations ask the same question: is there an
//! update? The cache actor answers from memory and refreshes in the
//! background, right after it starts and then on a fixed interval.
//!
//! The snapshot is owned by a single task. Callers talk to it through an
//! [`UpdateCacheHandle`], sending a request with a `oneshot` reply channel.
//! Refreshes run in a separate task, so a slow or hanging update server never
//! delays a reader; readers see the last successful refresh.

use super::model::AvailableUpdate;
use super::provider::UpdateInfoProvider;
use anyhow::{Result, anyhow};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// What the cache currently knows.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateSnapshot {
    /// Result of the last successful refresh.
    pub update: Option<AvailableUpdate>,
    /// When that refresh completed; `None` until the first one succeeds.
    pub refreshed_at: Option<DateTime<Utc>>,
}

enum CacheRequest {
    Snapshot {
        reply: oneshot::Sender<UpdateSnapshot>,
    },
    Refresh,
}

/// Cheap, cloneable access to a running cache actor.
#[derive(Debug, Clone)]
pub struct UpdateCacheHandle {
    requests: mpsc::Sender<CacheRequest>,
}

impl UpdateCacheHandle {
    /// Current snapshot. Never waits on the network.
    pub async fn snapshot(&self) -> Result<UpdateSnapshot> {
        let (reply, response) = oneshot::channel();
        self.requests
            .send(CacheRequest::Snapshot {
                reply,
            })
            .await
            .map_err(|_| anyhow!("Update cache is not running"))?;
        response.await.map_err(|_| anyhow!("Update cache stopped before replying"))
    }

    /// Asks for a refresh now. Returns without waiting for it.
    pub async fn request_refresh(&self) -> Result<()> {
        self.requests
            .send(CacheRequest::Refresh)
            .await
            .map_err(|_| anyhow!("Update cache is not running"))
    }
}

impl UpdateInfoProvider for UpdateCacheHandle {
    async fn current_update(&self) -> Result<Option<AvailableUpdate>> {
        Ok(self.snapshot().await?.update)
    }
}

/// Spawns update cache actors.
pub struct UpdateCache;

impl UpdateCache {
    /// Starts the actor on the current tokio runtime.
    ///
    /// The first refresh starts immediately, later ones every `interval`. The
    /// actor stops once every handle has been dropped.
    pub fn spawn<P>(provider: P, interval: Duration) -> UpdateCacheHandle
    where
        P: UpdateInfoProvider + 'static,
    {
        let (requests_tx, requests_rx) = mpsc::channel(32);
        let actor = CacheActor {
            provider: Arc::new(provider),
            snapshot: UpdateSnapshot::default(),
            interval,
            requests: requests_rx,
            refreshing: false,
        };
        tokio::spawn(actor.run());
        UpdateCacheHandle {
            requests: requests_tx,
        }
    }
}

struct CacheActor<P> {
    provider: Arc<P>,
    snapshot: UpdateSnapshot,
    interval: Duration,
    requests: mpsc::Receiver<CacheRequest>,
    refreshing: bool,
}

impl<P: UpdateInfoProvider + 'static> CacheActor<P> {
    async fn run(mut self) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let (done_tx, mut done_rx) = mpsc::channel::<Result<Option<AvailableUpdate>>>(1);

        debug!(interval_secs = self.interval.as_secs(), "Update cache started");
        loop {
            tokio::select! {
                request = self.requests.recv() => match request {
                    Some(CacheRequest::Snapshot { reply }) => {
                        let _ = reply.send(self.snapshot.clone());
                    }
                    Some(CacheRequest::Refresh) => self.start_refresh(&done_tx),
                    None => break,
                },
                _ = ticker.tick() => self.start_refresh(&done_tx),
                Some(result) = done_rx.recv() => self.finish_refresh(result),
            }
        }
        debug!("Update cache stopped");
    }

    fn start_refresh(&mut self, done: &mpsc::Sender<Result<Option<AvailableUpdate>>>) {
        if self.refreshing {
            debug!("Update cache refresh already in flight");
            return;
        }
        self.refreshing = true;

        let provider = Arc::clone(&self.provider);
        let done = done.clone();
        tokio::spawn(async move {
            let result = provider.current_update().await;
            let _ = done.send(result).await;
        });
    }

    fn finish_refresh(&mut self, result: Result<Option<AvailableUpdate>>) {
        self.refreshing = false;
        match result {
            Ok(update) => {
                if update != self.snapshot.update
                    && let Some(update) = &update
                {
                    info!(update = %update, "Update cache found a new update");
                }
                self.snapshot = UpdateSnapshot {
                    update,
                    refreshed_at: Some(Utc::now()),
                };
            }
            Err(e) => {
                warn!(error = %e, "Update cache refresh failed, keeping previous snapshot");
            }
        }
    }
}
