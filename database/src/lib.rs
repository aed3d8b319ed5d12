//! SQLite persistence for processed posts, the seen-set and settings.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use moodwatch_core::{
    validate_id, CoreError, DatabaseError, Emotion, EmotionScore, ProcessedPost, RedditPost,
    SeenStore,
};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use std::str::FromStr;
use tracing::{debug, info};

#[cfg(test)]
mod tests;

const MIGRATIONS: &[(&str, &str)] = &[
    (
        "create_processed_posts",
        "CREATE TABLE IF NOT EXISTS processed_posts (
            id TEXT PRIMARY KEY NOT NULL,
            title TEXT NOT NULL,
            author TEXT NOT NULL,
            content TEXT,
            subreddit TEXT NOT NULL,
            url TEXT NOT NULL,
            permalink TEXT NOT NULL,
            created_utc INTEGER NOT NULL,
            emotion TEXT NOT NULL,
            advice TEXT NOT NULL,
            scores TEXT NOT NULL,
            processed_at TEXT NOT NULL
        )",
    ),
    (
        "create_seen_posts",
        "CREATE TABLE IF NOT EXISTS seen_posts (
            id TEXT PRIMARY KEY NOT NULL,
            seen_at TEXT NOT NULL
        )",
    ),
    (
        "create_settings",
        "CREATE TABLE IF NOT EXISTS settings (
            key TEXT PRIMARY KEY NOT NULL,
            value TEXT NOT NULL
        )",
    ),
];

#[derive(Debug, Clone)]
pub struct Database {
    connection_string: String,
    pool: Option<SqlitePool>,
}

fn sql_error(error: sqlx::Error) -> CoreError {
    let locked = error
        .as_database_error()
        .map(|db| db.message().contains("locked"))
        .unwrap_or(false);

    if locked {
        CoreError::Database(DatabaseError::DatabaseLocked)
    } else {
        CoreError::Database(DatabaseError::Sql(error))
    }
}

impl Database {
    pub fn new(connection_string: impl Into<String>) -> Self {
        Self {
            connection_string: connection_string.into(),
            pool: None,
        }
    }

    /// Opens and migrates in one step.
    pub async fn open(connection_string: impl Into<String>) -> Result<Self, CoreError> {
        let mut db = Self::new(connection_string);
        db.connect().await?;
        db.run_migrations().await?;
        Ok(db)
    }

    pub fn connection_string(&self) -> &str {
        &self.connection_string
    }

    pub async fn connect(&mut self) -> Result<(), CoreError> {
        let options = SqliteConnectOptions::from_str(&self.connection_string)
            .map_err(|e| DatabaseError::ConnectionFailed {
                reason: e.to_string(),
            })?
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(|e| DatabaseError::ConnectionFailed {
                reason: e.to_string(),
            })?;

        info!("Connected to {}", self.connection_string);
        self.pool = Some(pool);
        Ok(())
    }

    fn pool(&self) -> Result<&SqlitePool, CoreError> {
        self.pool.as_ref().ok_or_else(|| {
            DatabaseError::ConnectionFailed {
                reason: "database not connected".to_string(),
            }
            .into()
        })
    }

    pub async fn run_migrations(&self) -> Result<(), CoreError> {
        let pool = self.pool()?;
        for (name, statement) in MIGRATIONS {
            sqlx::query(statement).execute(pool).await.map_err(|e| {
                debug!("Migration {} failed: {}", name, e);
                DatabaseError::MigrationFailed {
                    migration: name.to_string(),
                }
            })?;
        }
        Ok(())
    }

    /// Stores a processed post. Returns `false` when the id was already stored.
    pub async fn save_post(&self, post: &ProcessedPost) -> Result<bool, CoreError> {
        let scores = serde_json::to_string(&post.scores)?;

        let result = sqlx::query(
            "INSERT OR IGNORE INTO processed_posts
                (id, title, author, content, subreddit, url, permalink, created_utc,
                 emotion, advice, scores, processed_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&post.post.id)
        .bind(&post.post.title)
        .bind(&post.post.author)
        .bind(&post.post.content)
        .bind(&post.post.subreddit)
        .bind(&post.post.url)
        .bind(&post.post.permalink)
        .bind(post.post.created_utc)
        .bind(post.emotion.as_str())
        .bind(&post.advice)
        .bind(scores)
        .bind(post.processed_at)
        .execute(self.pool()?)
        .await
        .map_err(sql_error)?;

        Ok(result.rows_affected() > 0)
    }

    /// Most recently processed first.
    pub async fn get_posts(&self, limit: u32) -> Result<Vec<ProcessedPost>, CoreError> {
        let rows = sqlx::query(
            "SELECT * FROM processed_posts ORDER BY processed_at DESC, rowid DESC LIMIT ?",
        )
        .bind(limit as i64)
        .fetch_all(self.pool()?)
        .await
        .map_err(sql_error)?;

        rows.iter().map(row_to_post).collect()
    }

    pub async fn has_post(&self, post_id: &str) -> Result<bool, CoreError> {
        let row = sqlx::query("SELECT 1 FROM processed_posts WHERE id = ?")
            .bind(post_id)
            .fetch_optional(self.pool()?)
            .await
            .map_err(sql_error)?;
        Ok(row.is_some())
    }

    pub async fn count_posts(&self) -> Result<usize, CoreError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM processed_posts")
            .fetch_one(self.pool()?)
            .await
            .map_err(sql_error)?;
        Ok(count as usize)
    }

    pub async fn save_setting(&self, key: &str, value: &str) -> Result<(), CoreError> {
        sqlx::query(
            "INSERT INTO settings (key, value) VALUES (?, ?)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        )
        .bind(key)
        .bind(value)
        .execute(self.pool()?)
        .await
        .map_err(sql_error)?;
        Ok(())
    }

    pub async fn get_setting(&self, key: &str) -> Result<Option<String>, CoreError> {
        sqlx::query_scalar::<_, String>("SELECT value FROM settings WHERE key = ?")
            .bind(key)
            .fetch_optional(self.pool()?)
            .await
            .map_err(sql_error)
    }
}

fn row_to_post(row: &SqliteRow) -> Result<ProcessedPost, CoreError> {
    let scores: String = row.try_get("scores").map_err(sql_error)?;
    let scores: Vec<EmotionScore> = serde_json::from_str(&scores)?;
    let emotion: String = row.try_get("emotion").map_err(sql_error)?;
    let processed_at: DateTime<Utc> = row.try_get("processed_at").map_err(sql_error)?;

    Ok(ProcessedPost {
        post: RedditPost {
            id: row.try_get("id").map_err(sql_error)?,
            title: row.try_get("title").map_err(sql_error)?,
            author: row.try_get("author").map_err(sql_error)?,
            content: row.try_get("content").map_err(sql_error)?,
            subreddit: row.try_get("subreddit").map_err(sql_error)?,
            url: row.try_get("url").map_err(sql_error)?,
            permalink: row.try_get("permalink").map_err(sql_error)?,
            created_utc: row.try_get("created_utc").map_err(sql_error)?,
        },
        emotion: Emotion::from(emotion),
        advice: row.try_get("advice").map_err(sql_error)?,
        scores,
        processed_at,
    })
}

#[async_trait]
impl SeenStore for Database {
    async fn contains(&self, post_id: &str) -> Result<bool, CoreError> {
        let row = sqlx::query("SELECT 1 FROM seen_posts WHERE id = ?")
            .bind(post_id)
            .fetch_optional(self.pool()?)
            .await
            .map_err(sql_error)?;
        Ok(row.is_some())
    }

    async fn mark_seen(&self, post_id: &str) -> Result<bool, CoreError> {
        validate_id(post_id)?;
        let result = sqlx::query("INSERT OR IGNORE INTO seen_posts (id, seen_at) VALUES (?, ?)")
            .bind(post_id)
            .bind(Utc::now())
            .execute(self.pool()?)
            .await
            .map_err(sql_error)?;
        Ok(result.rows_affected() > 0)
    }

    async fn len(&self) -> Result<usize, CoreError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM seen_posts")
            .fetch_one(self.pool()?)
            .await
            .map_err(sql_error)?;
        Ok(count as usize)
    }
}
