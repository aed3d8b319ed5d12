use crate::Database;
use chrono::{Duration, Utc};
use moodwatch_core::{
    CoreError, DatabaseError, Emotion, EmotionScore, ProcessedPost, RedditPost, SeenStore,
};
use std::env;

async fn setup_test_db() -> Database {
    let db_path = env::temp_dir().join(format!("test_moodwatch_{}.db", uuid::Uuid::new_v4()));
    let db_url = format!("sqlite://{}", db_path.display());

    let mut db = Database::new(db_url);
    db.connect()
        .await
        .expect("Failed to connect to test database");
    db.run_migrations().await.expect("Failed to run migrations");

    db
}

fn processed(id: &str, emotion: Emotion, minutes_ago: i64) -> ProcessedPost {
    ProcessedPost {
        post: RedditPost {
            id: id.to_string(),
            title: format!("Post {}", id),
            author: "someone".to_string(),
            content: Some("No sé qué hacer".to_string()),
            subreddit: "Depresion".to_string(),
            url: format!("https://www.reddit.com/r/Depresion/comments/{}/", id),
            permalink: format!("https://www.reddit.com/r/Depresion/comments/{}/", id),
            created_utc: 1_700_000_000,
        },
        advice: emotion.advice().to_string(),
        emotion,
        scores: vec![EmotionScore {
            label: "sadness".to_string(),
            score: 0.87,
        }],
        processed_at: Utc::now() - Duration::minutes(minutes_ago),
    }
}

#[tokio::test]
async fn test_migrations_are_idempotent() {
    let db = setup_test_db().await;
    db.run_migrations().await.expect("Second migration run failed");
    assert_eq!(db.count_posts().await.unwrap(), 0);
}

#[tokio::test]
async fn test_not_connected_is_an_error() {
    let db = Database::new("sqlite::memory:");
    let result = db.count_posts().await;
    assert!(matches!(
        result,
        Err(CoreError::Database(DatabaseError::ConnectionFailed { .. }))
    ));
}

#[tokio::test]
async fn test_save_and_load_post() {
    let db = setup_test_db().await;
    let post = processed("t3abc", Emotion::Sadness, 0);

    assert!(db.save_post(&post).await.unwrap());
    assert!(db.has_post("t3abc").await.unwrap());
    assert!(!db.has_post("missing").await.unwrap());

    let loaded = db.get_posts(10).await.unwrap();
    assert_eq!(loaded.len(), 1);
    assert_eq!(loaded[0].post, post.post);
    assert_eq!(loaded[0].emotion, Emotion::Sadness);
    assert_eq!(loaded[0].advice, post.advice);
    assert_eq!(loaded[0].scores, post.scores);
}

#[tokio::test]
async fn test_duplicate_post_is_ignored() {
    let db = setup_test_db().await;
    let post = processed("dup", Emotion::Fear, 0);

    assert!(db.save_post(&post).await.unwrap());
    assert!(!db.save_post(&post).await.unwrap());
    assert_eq!(db.count_posts().await.unwrap(), 1);
}

#[tokio::test]
async fn test_posts_newest_first_with_limit() {
    let db = setup_test_db().await;
    db.save_post(&processed("old", Emotion::Joy, 30)).await.unwrap();
    db.save_post(&processed("new", Emotion::Anger, 1)).await.unwrap();
    db.save_post(&processed("mid", Emotion::Love, 10)).await.unwrap();

    let ids: Vec<String> = db
        .get_posts(2)
        .await
        .unwrap()
        .into_iter()
        .map(|p| p.post.id)
        .collect();
    assert_eq!(ids, vec!["new".to_string(), "mid".to_string()]);
}

#[tokio::test]
async fn test_link_post_without_content() {
    let db = setup_test_db().await;
    let mut post = processed("link", Emotion::Neutral, 0);
    post.post.content = None;

    db.save_post(&post).await.unwrap();
    let loaded = db.get_posts(1).await.unwrap();
    assert_eq!(loaded[0].post.content, None);
    assert_eq!(loaded[0].emotion, Emotion::Neutral);
}

#[tokio::test]
async fn test_settings() {
    let db = setup_test_db().await;

    assert_eq!(db.get_setting("show_past_posts").await.unwrap(), None);

    db.save_setting("show_past_posts", "true").await.unwrap();
    db.save_setting("show_past_posts", "false").await.unwrap();
    assert_eq!(
        db.get_setting("show_past_posts").await.unwrap(),
        Some("false".to_string())
    );
}

#[tokio::test]
async fn test_database_as_seen_store() {
    let db = setup_test_db().await;

    assert!(!db.contains("abc").await.unwrap());
    assert!(db.mark_seen("abc").await.unwrap());
    assert!(!db.mark_seen("abc").await.unwrap());
    assert!(db.contains("abc").await.unwrap());
    assert_eq!(db.len().await.unwrap(), 1);

    assert!(db.mark_seen("has space").await.is_err());
    assert_eq!(db.len().await.unwrap(), 1);
}

#[tokio::test]
async fn test_seen_set_survives_reopen() {
    let db_path = env::temp_dir().join(format!("test_moodwatch_{}.db", uuid::Uuid::new_v4()));
    let db_url = format!("sqlite://{}", db_path.display());

    let db = Database::open(db_url.clone()).await.unwrap();
    db.mark_seen("persisted").await.unwrap();
    drop(db);

    let reopened = Database::open(db_url).await.unwrap();
    assert!(reopened.contains("persisted").await.unwrap());
}
