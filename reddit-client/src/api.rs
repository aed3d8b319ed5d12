use crate::metrics::{MetricsCollector, RequestMetrics};
use crate::rate_limiter::{RateLimitConfig, RateLimiter};
use moodwatch_core::{CoreError, RedditApiError, RedditPost};
use reqwest::{Client, Method, Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

pub const REDDIT_API_BASE: &str = "https://oauth.reddit.com";
const REDDIT_WEB_BASE: &str = "https://www.reddit.com";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedditListing<T> {
    pub kind: String,
    pub data: RedditListingData<T>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedditListingData<T> {
    pub children: Vec<RedditListingChild<T>>,
    pub after: Option<String>,
    pub before: Option<String>,
    #[serde(default)]
    pub dist: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedditListingChild<T> {
    pub kind: String,
    pub data: T,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedditPostData {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub selftext: String,
    #[serde(default = "deleted_author")]
    pub author: String,
    pub subreddit: String,
    pub url: String,
    pub permalink: String,
    pub created_utc: f64,
    #[serde(default)]
    pub score: i32,
    #[serde(default)]
    pub num_comments: u32,
    #[serde(default)]
    pub over_18: bool,
    #[serde(default)]
    pub stickied: bool,
    #[serde(default)]
    pub is_self: bool,
}

fn deleted_author() -> String {
    "[deleted]".to_string()
}

/// Listing order for subreddit posts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListingSort {
    New,
    Hot,
    Top,
    Rising,
}

impl ListingSort {
    pub fn as_str(&self) -> &'static str {
        match self {
            ListingSort::New => "new",
            ListingSort::Hot => "hot",
            ListingSort::Top => "top",
            ListingSort::Rising => "rising",
        }
    }
}

impl fmt::Display for ListingSort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug)]
pub struct RedditApiClient {
    http_client: Client,
    rate_limiter: Arc<RateLimiter>,
    metrics: Arc<MetricsCollector>,
    base_url: String,
}

impl RedditApiClient {
    pub fn new(user_agent: &str) -> Result<Self, CoreError> {
        let http_client = Client::builder()
            .user_agent(user_agent)
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            http_client,
            rate_limiter: Arc::new(RateLimiter::new(RateLimitConfig::reddit_oauth())),
            metrics: Arc::new(MetricsCollector::new()),
            base_url: REDDIT_API_BASE.to_string(),
        })
    }

    /// Points the client at another API host.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub async fn make_request(
        &self,
        method: Method,
        endpoint: &str,
        access_token: &str,
        query_params: &[(&str, String)],
    ) -> Result<Response, CoreError> {
        let url = format!("{}{}", self.base_url, endpoint);
        let start_time = Instant::now();

        let permit = self.rate_limiter.acquire_permit().await;
        debug!(
            "Acquired rate limit permit for {} {} after {:?}",
            method, endpoint, permit.queue_wait_time
        );

        let request_builder = self
            .http_client
            .request(method.clone(), &url)
            .bearer_auth(access_token)
            .query(query_params);

        info!("Making Reddit API request: {} {}", method, endpoint);
        let result = match request_builder.send().await {
            Ok(response) => check_status(response, endpoint),
            Err(e) => {
                error!("Network error for {} {}: {}", method, endpoint, e);
                if e.is_timeout() {
                    Err(CoreError::RedditApi(RedditApiError::RequestTimeout))
                } else {
                    Err(CoreError::Network(e))
                }
            }
        };

        let (status_code, error_type) = match &result {
            Ok(response) => (Some(response.status().as_u16()), None),
            Err(e) => (status_of(e), Some(error_type_of(e).to_string())),
        };
        self.metrics
            .record_request(RequestMetrics {
                endpoint: endpoint.to_string(),
                method: method.to_string(),
                status_code,
                response_time: start_time.elapsed(),
                success: result.is_ok(),
                rate_limited: matches!(
                    result,
                    Err(CoreError::RedditApi(RedditApiError::RateLimitExceeded { .. }))
                ),
                error_type,
            })
            .await;

        result
    }

    pub async fn get_subreddit_posts(
        &self,
        access_token: &str,
        subreddit: &str,
        sort: ListingSort,
        limit: Option<u32>,
        after: Option<&str>,
    ) -> Result<RedditListing<RedditPostData>, CoreError> {
        let endpoint = format!("/r/{}/{}", subreddit, sort);
        let mut params = vec![("raw_json", "1".to_string())];
        if let Some(limit) = limit {
            params.push(("limit", limit.to_string()));
        }
        if let Some(after) = after {
            params.push(("after", after.to_string()));
        }

        let response = self
            .make_request(Method::GET, &endpoint, access_token, &params)
            .await
            .map_err(|e| match e {
                CoreError::RedditApi(RedditApiError::SubredditNotFound { .. }) => {
                    CoreError::RedditApi(RedditApiError::SubredditNotFound {
                        subreddit: subreddit.to_string(),
                    })
                }
                other => other,
            })?;

        let body = response.text().await?;
        let listing = parse_listing(&body).map_err(|e| {
            error!("Failed to parse posts for r/{}: {}", subreddit, e);
            CoreError::RedditApi(RedditApiError::InvalidResponse {
                details: format!("Failed to parse posts for r/{}", subreddit),
            })
        })?;

        info!(
            "Retrieved {} posts from r/{}",
            listing.data.children.len(),
            subreddit
        );
        Ok(listing)
    }

    pub async fn get_metrics(&self) -> crate::metrics::ApiMetrics {
        self.metrics.get_metrics().await
    }

    pub async fn get_rate_limit_status(&self) -> crate::rate_limiter::RateLimitStatus {
        self.rate_limiter.get_rate_limit_status().await
    }

    pub async fn reset_metrics(&self) {
        self.metrics.reset_metrics().await;
    }
}

fn check_status(response: Response, endpoint: &str) -> Result<Response, CoreError> {
    let status = response.status();
    if status.is_success() {
        debug!("Request successful: {} {}", status, endpoint);
        return Ok(response);
    }

    error!("Request failed with status: {} for {}", status, endpoint);
    let error = match status {
        StatusCode::TOO_MANY_REQUESTS => {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|value| value.to_str().ok())
                .and_then(|value| value.trim().parse::<u64>().ok())
                .unwrap_or(60);
            warn!("Rate limited, retry after {} seconds", retry_after);
            RedditApiError::RateLimitExceeded { retry_after }
        }
        StatusCode::UNAUTHORIZED => RedditApiError::InvalidToken,
        StatusCode::FORBIDDEN => RedditApiError::Forbidden {
            resource: endpoint.to_string(),
        },
        StatusCode::NOT_FOUND => RedditApiError::SubredditNotFound {
            subreddit: endpoint.to_string(),
        },
        s => RedditApiError::ServerError {
            status_code: s.as_u16(),
        },
    };
    Err(CoreError::RedditApi(error))
}

fn status_of(error: &CoreError) -> Option<u16> {
    match error {
        CoreError::RedditApi(RedditApiError::RateLimitExceeded { .. }) => Some(429),
        CoreError::RedditApi(RedditApiError::InvalidToken) => Some(401),
        CoreError::RedditApi(RedditApiError::Forbidden { .. }) => Some(403),
        CoreError::RedditApi(RedditApiError::SubredditNotFound { .. }) => Some(404),
        CoreError::RedditApi(RedditApiError::ServerError { status_code }) => Some(*status_code),
        _ => None,
    }
}

fn error_type_of(error: &CoreError) -> &'static str {
    match error {
        CoreError::RedditApi(RedditApiError::RateLimitExceeded { .. }) => "rate_limited",
        CoreError::RedditApi(RedditApiError::InvalidToken) => "unauthorized",
        CoreError::RedditApi(RedditApiError::Forbidden { .. }) => "forbidden",
        CoreError::RedditApi(RedditApiError::SubredditNotFound { .. }) => "not_found",
        CoreError::RedditApi(RedditApiError::RequestTimeout) => "timeout",
        CoreError::RedditApi(_) => "server_error",
        _ => "network_error",
    }
}

pub fn parse_listing(body: &str) -> Result<RedditListing<RedditPostData>, serde_json::Error> {
    serde_json::from_str(body)
}

impl From<RedditPostData> for RedditPost {
    fn from(post_data: RedditPostData) -> Self {
        let content = if post_data.selftext.trim().is_empty() {
            None
        } else {
            Some(post_data.selftext)
        };

        Self {
            id: post_data.id,
            title: post_data.title,
            author: post_data.author,
            content,
            subreddit: post_data.subreddit,
            url: post_data.url,
            permalink: format!("{}{}", REDDIT_WEB_BASE, post_data.permalink),
            created_utc: post_data.created_utc as i64,
        }
    }
}
