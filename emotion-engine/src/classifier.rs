use async_trait::async_trait;
use moodwatch_core::{ClassifierError, ClassifierSettings, CoreError, EmotionScore};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

/// Number of labels the distilroberta emotion model produces.
const TOP_K: usize = 7;

#[async_trait]
pub trait EmotionClassifier: Send + Sync {
    /// Scores for every emotion label the model knows, in any order.
    async fn classify(&self, text: &str) -> Result<Vec<EmotionScore>, CoreError>;

    fn model_name(&self) -> &str;
}

/// Client for the Hugging Face text-classification inference API.
pub struct HuggingFaceClassifier {
    client: Client,
    endpoint: String,
    model: String,
    api_token: Option<String>,
}

#[derive(Serialize)]
struct InferenceRequest<'a> {
    inputs: &'a str,
    parameters: InferenceParameters,
    options: InferenceOptions,
}

#[derive(Serialize)]
struct InferenceParameters {
    top_k: usize,
}

#[derive(Serialize)]
struct InferenceOptions {
    wait_for_model: bool,
}

/// The API nests results per input when given a single string, but some
/// deployments return the flat list.
#[derive(Deserialize)]
#[serde(untagged)]
enum InferenceResponse {
    Nested(Vec<Vec<EmotionScore>>),
    Flat(Vec<EmotionScore>),
}

impl InferenceResponse {
    fn into_scores(self) -> Vec<EmotionScore> {
        match self {
            InferenceResponse::Nested(batches) => batches.into_iter().next().unwrap_or_default(),
            InferenceResponse::Flat(scores) => scores,
        }
    }
}

#[derive(Deserialize)]
struct LoadingResponse {
    estimated_time: Option<f64>,
}

impl HuggingFaceClassifier {
    pub fn new(settings: &ClassifierSettings) -> Result<Self, CoreError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_seconds))
            .build()
            .map_err(|e| CoreError::Internal {
                message: format!("Failed to create HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            endpoint: settings.endpoint.trim_end_matches('/').to_string(),
            model: settings.model.clone(),
            api_token: settings.api_token.clone(),
        })
    }

    pub fn url(&self) -> String {
        format!("{}/{}", self.endpoint, self.model)
    }

    fn map_status(&self, status: StatusCode, retry_after: Option<u64>, body: &str) -> ClassifierError {
        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ClassifierError::InvalidApiKey {
                model: self.model.clone(),
            },
            StatusCode::TOO_MANY_REQUESTS => ClassifierError::RateLimitExceeded {
                retry_after: retry_after.unwrap_or(60),
            },
            StatusCode::SERVICE_UNAVAILABLE => {
                let estimated_seconds = serde_json::from_str::<LoadingResponse>(body)
                    .ok()
                    .and_then(|loading| loading.estimated_time)
                    .map(|seconds| seconds.ceil() as u64)
                    .unwrap_or(20);
                ClassifierError::ModelLoading {
                    model: self.model.clone(),
                    estimated_seconds,
                }
            }
            status if status.is_server_error() => ClassifierError::ServiceUnavailable {
                status_code: status.as_u16(),
            },
            status => ClassifierError::InvalidResponse {
                details: format!("unexpected status {}: {}", status, truncate(body, 200)),
            },
        }
    }
}

#[async_trait]
impl EmotionClassifier for HuggingFaceClassifier {
    async fn classify(&self, text: &str) -> Result<Vec<EmotionScore>, CoreError> {
        let request = InferenceRequest {
            inputs: text,
            parameters: InferenceParameters { top_k: TOP_K },
            options: InferenceOptions {
                wait_for_model: true,
            },
        };

        debug!("Classifying {} chars with {}", text.chars().count(), self.model);

        let mut builder = self.client.post(self.url()).json(&request);
        if let Some(token) = &self.api_token {
            builder = builder.bearer_auth(token);
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                CoreError::Classifier(ClassifierError::RequestTimeout)
            } else {
                CoreError::Network(e)
            }
        })?;

        let status = response.status();
        let retry_after = response
            .headers()
            .get("retry-after")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok());
        let body = response.text().await.map_err(|e| {
            if e.is_timeout() {
                CoreError::Classifier(ClassifierError::RequestTimeout)
            } else {
                CoreError::Network(e)
            }
        })?;

        if !status.is_success() {
            let error = self.map_status(status, retry_after, &body);
            warn!("Inference API returned {}: {}", status, error);
            return Err(error.into());
        }

        Ok(parse_scores(&body)?)
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

pub fn parse_scores(body: &str) -> Result<Vec<EmotionScore>, ClassifierError> {
    let parsed: InferenceResponse =
        serde_json::from_str(body).map_err(|e| ClassifierError::InvalidResponse {
            details: format!("{}: {}", e, truncate(body, 200)),
        })?;

    let scores = parsed.into_scores();
    if scores.is_empty() {
        return Err(ClassifierError::EmptyResult);
    }
    Ok(scores)
}

fn truncate(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}
