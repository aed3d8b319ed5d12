use crate::emotion::Emotion;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RedditPost {
    pub id: String,
    pub title: String,
    pub author: String,
    pub content: Option<String>,
    pub subreddit: String,
    pub url: String,
    pub permalink: String,
    pub created_utc: i64,
}

impl RedditPost {
    /// Body text to analyse; empty for link posts.
    pub fn text(&self) -> &str {
        self.content.as_deref().unwrap_or("")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmotionScore {
    pub label: String,
    pub score: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Analysis {
    pub emotion: Emotion,
    pub advice: String,
    pub scores: Vec<EmotionScore>,
}

/// A post that went through classification. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessedPost {
    pub post: RedditPost,
    pub emotion: Emotion,
    pub advice: String,
    pub scores: Vec<EmotionScore>,
    pub processed_at: DateTime<Utc>,
}

impl ProcessedPost {
    pub fn new(post: RedditPost, analysis: Analysis) -> Self {
        Self {
            post,
            emotion: analysis.emotion,
            advice: analysis.advice,
            scores: analysis.scores,
            processed_at: Utc::now(),
        }
    }

    pub fn id(&self) -> &str {
        &self.post.id
    }
}
