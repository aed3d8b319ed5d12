use crate::classifier::EmotionClassifier;
use moodwatch_core::{
    Analysis, ClassifierError, CoreError, Emotion, ProcessedPost, RedditPost,
    EMPTY_CONTENT_MESSAGE,
};
use std::cmp::Ordering;
use std::sync::Arc;
use tracing::debug;

/// Turns raw text into a dominant emotion plus advice.
pub struct EmotionAnalyzer {
    classifier: Arc<dyn EmotionClassifier>,
    max_input_chars: usize,
}

impl EmotionAnalyzer {
    pub fn new(classifier: Arc<dyn EmotionClassifier>, max_input_chars: usize) -> Self {
        Self {
            classifier,
            max_input_chars,
        }
    }

    pub fn model_name(&self) -> &str {
        self.classifier.model_name()
    }

    pub async fn analyze_text(&self, text: &str) -> Result<Analysis, CoreError> {
        if text.trim().is_empty() {
            return Ok(Analysis {
                emotion: Emotion::Neutral,
                advice: EMPTY_CONTENT_MESSAGE.to_string(),
                scores: Vec::new(),
            });
        }

        let input: String = text.chars().take(self.max_input_chars).collect();
        let mut scores = self.classifier.classify(&input).await?;
        scores.sort_by(|a, b| descending_nan_last(a.score, b.score));

        let top = scores
            .first()
            .ok_or(CoreError::Classifier(ClassifierError::EmptyResult))?;
        let emotion = Emotion::from(top.label.as_str());
        debug!("Dominant emotion {} ({:.3})", emotion, top.score);

        Ok(Analysis {
            advice: emotion.advice().to_string(),
            emotion,
            scores,
        })
    }

    pub async fn analyze_post(&self, post: RedditPost) -> Result<ProcessedPost, CoreError> {
        let analysis = self.analyze_text(post.text()).await?;
        Ok(ProcessedPost::new(post, analysis))
    }
}

/// Highest score first; NaN never outranks a real score.
fn descending_nan_last(a: f32, b: f32) -> Ordering {
    match (a.is_nan(), b.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => b.total_cmp(&a),
    }
}
