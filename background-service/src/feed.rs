use database::Database;
use emotion_engine::{EmotionAnalyzer, HuggingFaceClassifier};
use moodwatch_core::{
    AppConfig, ConfigError, CoreError, ErrorExt, FileSeenStore, MemorySeenStore, ProcessedPost,
    SeenStore, SeenStoreKind,
};
use reddit_client::{PostSource, RedditClient, RedditOAuth2Config};
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// What one refresh did.
#[derive(Debug, Clone, Default)]
pub struct RefreshOutcome {
    pub new_posts: Vec<ProcessedPost>,
    pub skipped: usize,
    pub failed: usize,
}

/// Fetch, filter against the seen-set, classify, persist.
pub struct FeedService {
    source: Arc<dyn PostSource>,
    analyzer: EmotionAnalyzer,
    seen: Arc<dyn SeenStore>,
    history: Option<Database>,
    subreddit: String,
    limit: u32,
}

impl fmt::Debug for FeedService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FeedService")
            .field("subreddit", &self.subreddit)
            .field("limit", &self.limit)
            .field("model", &self.analyzer.model_name())
            .field("history", &self.history.is_some())
            .finish()
    }
}

impl FeedService {
    pub fn new(
        source: Arc<dyn PostSource>,
        analyzer: EmotionAnalyzer,
        seen: Arc<dyn SeenStore>,
        subreddit: impl Into<String>,
        limit: u32,
    ) -> Self {
        Self {
            source,
            analyzer,
            seen,
            history: None,
            subreddit: subreddit.into(),
            limit,
        }
    }

    pub fn with_history(mut self, history: Database) -> Self {
        self.history = Some(history);
        self
    }

    pub async fn from_config(config: &AppConfig) -> Result<Self, CoreError> {
        let client = RedditClient::new(RedditOAuth2Config::from(&config.reddit))?;
        let classifier = HuggingFaceClassifier::new(&config.classifier)?;
        let analyzer = EmotionAnalyzer::new(Arc::new(classifier), config.classifier.max_input_chars);

        let history = match &config.database_url {
            Some(url) => Some(Database::open(url.as_str()).await?),
            None => None,
        };

        let seen: Arc<dyn SeenStore> = match config.seen_store {
            SeenStoreKind::File => Arc::new(FileSeenStore::load(&config.seen_file).await?),
            SeenStoreKind::Memory => Arc::new(MemorySeenStore::new()),
            SeenStoreKind::Database => match &history {
                Some(db) => Arc::new(db.clone()),
                None => {
                    return Err(ConfigError::MissingField {
                        field: "database_url".to_string(),
                    }
                    .into())
                }
            },
        };

        info!(
            "Watching r/{} ({} posts per refresh, model {})",
            config.subreddit,
            config.post_limit,
            analyzer.model_name()
        );

        let service = Self::new(
            Arc::new(client),
            analyzer,
            seen,
            config.subreddit.clone(),
            config.post_limit,
        );
        Ok(match history {
            Some(db) => service.with_history(db),
            None => service,
        })
    }

    pub fn subreddit(&self) -> &str {
        &self.subreddit
    }

    pub fn has_history(&self) -> bool {
        self.history.is_some()
    }

    pub async fn refresh(&self) -> Result<RefreshOutcome, CoreError> {
        let posts = self.source.fetch_posts(&self.subreddit, self.limit).await?;
        debug!("Fetched {} posts from r/{}", posts.len(), self.subreddit);

        let mut outcome = RefreshOutcome::default();
        let mut batch = HashSet::new();

        for post in posts {
            if !batch.insert(post.id.clone()) {
                outcome.skipped += 1;
                continue;
            }
            match self.seen.contains(&post.id).await {
                Ok(true) => {
                    outcome.skipped += 1;
                    continue;
                }
                Ok(false) => {}
                Err(e) => {
                    warn!("Could not check seen-set for post {}: {}", post.id, e);
                    e.log_warn();
                    outcome.failed += 1;
                    continue;
                }
            }

            let post_id = post.id.clone();
            let processed = match self.analyzer.analyze_post(post).await {
                Ok(processed) => processed,
                Err(e) => {
                    // Left unseen so the next refresh tries again
                    warn!("Could not classify post {}: {}", post_id, e);
                    e.log_warn();
                    outcome.failed += 1;
                    continue;
                }
            };

            if let Err(e) = self.persist(&processed).await {
                warn!("Could not record post {}: {}", post_id, e);
                e.log_warn();
                outcome.failed += 1;
                continue;
            }
            outcome.new_posts.push(processed);
        }

        info!(
            "Refresh of r/{}: {} new, {} skipped, {} failed",
            self.subreddit,
            outcome.new_posts.len(),
            outcome.skipped,
            outcome.failed
        );
        Ok(outcome)
    }

    /// History first, then the seen-set, so a post is never marked seen
    /// without its history row.
    async fn persist(&self, processed: &ProcessedPost) -> Result<(), CoreError> {
        if let Some(history) = &self.history {
            history.save_post(processed).await?;
        }
        self.seen.mark_seen(processed.id()).await?;
        Ok(())
    }

    /// Stored history, newest first. Empty without a database.
    pub async fn past_posts(&self, limit: u32) -> Result<Vec<ProcessedPost>, CoreError> {
        match &self.history {
            Some(history) => history.get_posts(limit).await,
            None => Ok(Vec::new()),
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use async_trait::async_trait;
    use emotion_engine::EmotionClassifier;
    use moodwatch_core::{
        ClassifierError, Emotion, EmotionScore, RedditApiError, RedditPost,
        EMPTY_CONTENT_MESSAGE,
    };
    use std::sync::Mutex;

    pub(crate) struct StubSource {
        pub posts: Mutex<Vec<RedditPost>>,
        pub fail: bool,
    }

    impl StubSource {
        pub fn new(posts: Vec<RedditPost>) -> Arc<Self> {
            Arc::new(Self {
                posts: Mutex::new(posts),
                fail: false,
            })
        }
    }

    #[async_trait]
    impl PostSource for StubSource {
        async fn fetch_posts(
            &self,
            _subreddit: &str,
            limit: u32,
        ) -> Result<Vec<RedditPost>, CoreError> {
            if self.fail {
                return Err(RedditApiError::ServerError { status_code: 503 }.into());
            }
            let posts = self.posts.lock().unwrap();
            Ok(posts.iter().take(limit as usize).cloned().collect())
        }
    }

    /// Sad about everything, except text containing "fallo".
    pub(crate) struct StubClassifier;

    #[async_trait]
    impl EmotionClassifier for StubClassifier {
        async fn classify(&self, text: &str) -> Result<Vec<EmotionScore>, CoreError> {
            if text.contains("fallo") {
                return Err(ClassifierError::ServiceUnavailable { status_code: 502 }.into());
            }
            Ok(vec![
                EmotionScore {
                    label: "sadness".to_string(),
                    score: 0.8,
                },
                EmotionScore {
                    label: "fear".to_string(),
                    score: 0.2,
                },
            ])
        }

        fn model_name(&self) -> &str {
            "stub"
        }
    }

    pub(crate) fn post(id: &str, content: &str) -> RedditPost {
        RedditPost {
            id: id.to_string(),
            title: format!("Título {}", id),
            author: "someone".to_string(),
            content: if content.is_empty() {
                None
            } else {
                Some(content.to_string())
            },
            subreddit: "Depresion".to_string(),
            url: format!("https://www.reddit.com/r/Depresion/comments/{}/", id),
            permalink: format!("https://www.reddit.com/r/Depresion/comments/{}/", id),
            created_utc: 1_700_000_000,
        }
    }

    pub(crate) fn service(source: Arc<StubSource>, seen: Arc<dyn SeenStore>) -> FeedService {
        let analyzer = EmotionAnalyzer::new(Arc::new(StubClassifier), 512);
        FeedService::new(source, analyzer, seen, "Depresion", 5)
    }

    #[tokio::test]
    async fn test_refresh_processes_new_posts() {
        let source = StubSource::new(vec![post("a", "me siento solo"), post("b", "")]);
        let seen = Arc::new(MemorySeenStore::new());
        let feed = service(source, seen.clone());

        let outcome = feed.refresh().await.unwrap();
        assert_eq!(outcome.new_posts.len(), 2);
        assert_eq!(outcome.skipped, 0);
        assert_eq!(outcome.failed, 0);

        assert_eq!(outcome.new_posts[0].emotion, Emotion::Sadness);
        assert_eq!(outcome.new_posts[1].emotion, Emotion::Neutral);
        assert_eq!(outcome.new_posts[1].advice, EMPTY_CONTENT_MESSAGE);

        assert!(seen.contains("a").await.unwrap());
        assert!(seen.contains("b").await.unwrap());
    }

    #[tokio::test]
    async fn test_second_refresh_skips_seen_posts() {
        let source = StubSource::new(vec![post("a", "uno"), post("b", "dos")]);
        let feed = service(source.clone(), Arc::new(MemorySeenStore::new()));

        feed.refresh().await.unwrap();
        source.posts.lock().unwrap().insert(0, post("c", "tres"));

        let outcome = feed.refresh().await.unwrap();
        assert_eq!(outcome.new_posts.len(), 1);
        assert_eq!(outcome.new_posts[0].id(), "c");
        assert_eq!(outcome.skipped, 2);
    }

    #[tokio::test]
    async fn test_duplicate_ids_in_batch_are_processed_once() {
        let source = StubSource::new(vec![post("a", "uno"), post("a", "uno")]);
        let feed = service(source, Arc::new(MemorySeenStore::new()));

        let outcome = feed.refresh().await.unwrap();
        assert_eq!(outcome.new_posts.len(), 1);
        assert_eq!(outcome.skipped, 1);
    }

    #[tokio::test]
    async fn test_failed_classification_stays_unseen() {
        let source = StubSource::new(vec![post("ok", "bien"), post("bad", "fallo total")]);
        let seen = Arc::new(MemorySeenStore::new());
        let feed = service(source, seen.clone());

        let outcome = feed.refresh().await.unwrap();
        assert_eq!(outcome.new_posts.len(), 1);
        assert_eq!(outcome.failed, 1);
        assert!(!seen.contains("bad").await.unwrap());

        // Retried on the next refresh
        let outcome = feed.refresh().await.unwrap();
        assert_eq!(outcome.failed, 1);
        assert_eq!(outcome.skipped, 1);
    }

    /// Memory seen-set whose appends fail for one id.
    struct FailingSeenStore {
        inner: MemorySeenStore,
        broken_id: &'static str,
    }

    #[async_trait]
    impl SeenStore for FailingSeenStore {
        async fn contains(&self, post_id: &str) -> Result<bool, CoreError> {
            self.inner.contains(post_id).await
        }

        async fn mark_seen(&self, post_id: &str) -> Result<bool, CoreError> {
            if post_id == self.broken_id {
                return Err(std::io::Error::new(std::io::ErrorKind::Other, "disk full").into());
            }
            self.inner.mark_seen(post_id).await
        }

        async fn len(&self) -> Result<usize, CoreError> {
            self.inner.len().await
        }
    }

    #[tokio::test]
    async fn test_seen_write_failure_keeps_rest_of_batch() {
        let source = StubSource::new(vec![post("a", "uno"), post("b", "dos"), post("c", "tres")]);
        let seen = Arc::new(FailingSeenStore {
            inner: MemorySeenStore::new(),
            broken_id: "c",
        });
        let feed = service(source, seen.clone());

        let outcome = feed.refresh().await.unwrap();
        let ids: Vec<&str> = outcome.new_posts.iter().map(|p| p.id()).collect();
        assert_eq!(ids, vec!["a", "b"]);
        assert_eq!(outcome.failed, 1);
        assert!(!seen.contains("c").await.unwrap());

        // Later refreshes still succeed and only retry the broken post
        let outcome = feed.refresh().await.unwrap();
        assert!(outcome.new_posts.is_empty());
        assert_eq!(outcome.skipped, 2);
        assert_eq!(outcome.failed, 1);
    }

    #[tokio::test]
    async fn test_fetch_error_propagates() {
        let source = Arc::new(StubSource {
            posts: Mutex::new(Vec::new()),
            fail: true,
        });
        let feed = service(source, Arc::new(MemorySeenStore::new()));

        assert!(matches!(
            feed.refresh().await,
            Err(CoreError::RedditApi(RedditApiError::ServerError { status_code: 503 }))
        ));
    }

    #[tokio::test]
    async fn test_past_posts_without_history_is_empty() {
        let feed = service(StubSource::new(vec![]), Arc::new(MemorySeenStore::new()));
        assert!(!feed.has_history());
        assert!(feed.past_posts(10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_history_records_processed_posts() {
        let db_path = std::env::temp_dir().join(format!(
            "test_moodwatch_feed_{}.db",
            std::process::id()
        ));
        let _ = std::fs::remove_file(&db_path);
        let db = Database::open(format!("sqlite://{}", db_path.display()))
            .await
            .unwrap();

        let source = StubSource::new(vec![post("h1", "uno"), post("h2", "dos")]);
        let feed = service(source, Arc::new(db.clone())).with_history(db);

        feed.refresh().await.unwrap();
        let past = feed.past_posts(10).await.unwrap();
        assert_eq!(past.len(), 2);
        assert!(past.iter().all(|p| p.emotion == Emotion::Sadness));

        let _ = std::fs::remove_file(&db_path);
    }
}
