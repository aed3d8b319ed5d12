pub mod feed;

pub use feed::{FeedService, RefreshOutcome};

use moodwatch_core::{AppConfig, CoreError, ErrorExt, ProcessedPost};
use notify_rust::Notification;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// Re-polls the feed on a fixed interval until stopped.
pub struct BackgroundService {
    feed: Arc<FeedService>,
    polling_interval: Duration,
    notifications: bool,
    shutdown: watch::Sender<bool>,
}

impl BackgroundService {
    pub fn new(feed: Arc<FeedService>, polling_interval: Duration, notifications: bool) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            feed,
            polling_interval,
            notifications,
            shutdown,
        }
    }

    pub async fn from_config(config: &AppConfig) -> Result<Self, CoreError> {
        let feed = FeedService::from_config(config).await?;
        Ok(Self::new(
            Arc::new(feed),
            Duration::from_secs(config.polling_interval_seconds),
            config.notifications,
        ))
    }

    pub fn feed(&self) -> Arc<FeedService> {
        self.feed.clone()
    }

    /// Spawns the polling loop. The first refresh happens immediately.
    pub fn start(&self) -> JoinHandle<()> {
        let feed = self.feed.clone();
        let notifications = self.notifications;
        let polling_interval = self.polling_interval;
        let mut shutdown = self.shutdown.subscribe();

        info!(
            "Polling r/{} every {:?}",
            feed.subreddit(),
            polling_interval
        );

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(polling_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        poll_once(&feed, notifications).await;
                    }
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            break;
                        }
                    }
                }
            }

            info!("Background polling stopped");
        })
    }

    pub fn stop(&self) {
        self.shutdown.send_replace(true);
    }
}

async fn poll_once(feed: &FeedService, notifications: bool) {
    match feed.refresh().await {
        Ok(outcome) => {
            for post in &outcome.new_posts {
                info!(
                    post_id = %post.id(),
                    emotion = %post.emotion,
                    "{} ({}): {}",
                    post.post.title,
                    post.post.permalink,
                    post.advice
                );
                if notifications {
                    if let Err(e) = send_notification(post).await {
                        warn!("Notification failed: {}", e);
                    }
                }
            }
        }
        Err(e) => {
            // The loop keeps going; the next tick retries
            e.log_error();
        }
    }
}

pub async fn send_notification(post: &ProcessedPost) -> Result<(), CoreError> {
    let summary = format!("r/{}: {}", post.post.subreddit, post.emotion);
    let body = format!("{}\n{}", post.post.title, post.advice);

    let shown = tokio::task::spawn_blocking(move || {
        Notification::new()
            .appname("moodwatch")
            .summary(&summary)
            .body(&body)
            .show()
            .map(|_| ())
            .map_err(|e| e.to_string())
    })
    .await
    .map_err(|e| CoreError::Internal {
        message: format!("notification task failed: {}", e),
    })?;

    shown.map_err(|message| CoreError::Internal { message })?;
    debug!("Notified about post {}", post.id());
    Ok(())
}
