pub mod api;
pub mod metrics;
pub mod rate_limiter;
pub mod retry;


use api::{ListingSort, RedditApiClient};
use async_trait::async_trait;
use moodwatch_core::{CoreError, RedditApiError, RedditCredentials, RedditPost};
use oauth2::basic::{BasicClient, BasicErrorResponse, BasicTokenResponse};
use oauth2::{
    AuthUrl, ClientId, ClientSecret, HttpRequest, HttpResponse, RequestTokenError,
    ResourceOwnerPassword, ResourceOwnerUsername, TokenResponse, TokenUrl,
};
use retry::{RetryConfig, RetryExecutor};
use serde::{Deserialize, Serialize};
use std::sync::RwLock;
use std::time::{Duration, SystemTime};
use tracing::{debug, info, warn};

const REDDIT_AUTHORIZE_URL: &str = "https://www.reddit.com/api/v1/authorize";
const REDDIT_TOKEN_URL: &str = "https://www.reddit.com/api/v1/access_token";

/// Tokens are refreshed this long before Reddit would reject them.
const EXPIRY_MARGIN: Duration = Duration::from_secs(60);

/// Anything that can hand out the newest posts of a subreddit.
#[async_trait]
pub trait PostSource: Send + Sync {
    async fn fetch_posts(&self, subreddit: &str, limit: u32) -> Result<Vec<RedditPost>, CoreError>;
}

#[derive(Debug, Clone)]
pub struct RedditOAuth2Config {
    pub client_id: String,
    pub client_secret: String,
    pub user_agent: String,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl RedditOAuth2Config {
    pub fn new(client_id: String, client_secret: String, user_agent: String) -> Self {
        Self {
            client_id,
            client_secret,
            user_agent,
            username: None,
            password: None,
        }
    }

    /// Script-app credentials for the password grant.
    pub fn with_password(mut self, username: String, password: String) -> Self {
        self.username = Some(username);
        self.password = Some(password);
        self
    }
}

impl From<&RedditCredentials> for RedditOAuth2Config {
    fn from(credentials: &RedditCredentials) -> Self {
        let config = Self::new(
            credentials.client_id.clone(),
            credentials.client_secret.clone(),
            credentials.user_agent.clone(),
        );
        match (&credentials.username, &credentials.password) {
            (Some(username), Some(password)) => {
                config.with_password(username.clone(), password.clone())
            }
            _ => config,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedditToken {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: SystemTime,
    pub scope: Vec<String>,
}

impl RedditToken {
    pub fn is_expired(&self) -> bool {
        SystemTime::now() + EXPIRY_MARGIN >= self.expires_at
    }
}

#[derive(Debug, Clone)]
pub enum AuthState {
    NotAuthenticated,
    Authenticated { token: RedditToken },
    TokenExpired { token: RedditToken },
}

pub struct RedditClient {
    config: RedditOAuth2Config,
    oauth_client: BasicClient,
    api_client: RedditApiClient,
    retry: RetryExecutor,
    auth_state: RwLock<AuthState>,
}

impl RedditClient {
    pub fn new(config: RedditOAuth2Config) -> Result<Self, CoreError> {
        let auth_url = AuthUrl::new(REDDIT_AUTHORIZE_URL.to_string()).map_err(|e| {
            CoreError::Internal {
                message: format!("invalid authorize URL: {e}"),
            }
        })?;
        let token_url = TokenUrl::new(REDDIT_TOKEN_URL.to_string()).map_err(|e| {
            CoreError::Internal {
                message: format!("invalid token URL: {e}"),
            }
        })?;

        let oauth_client = BasicClient::new(
            ClientId::new(config.client_id.clone()),
            Some(ClientSecret::new(config.client_secret.clone())),
            auth_url,
            Some(token_url),
        );
        let api_client = RedditApiClient::new(&config.user_agent)?;

        Ok(Self {
            config,
            oauth_client,
            api_client,
            retry: RetryExecutor::new(RetryConfig::reddit()),
            auth_state: RwLock::new(AuthState::NotAuthenticated),
        })
    }

    pub fn config(&self) -> &RedditOAuth2Config {
        &self.config
    }

    /// `password` for script apps, `client_credentials` for read-only access.
    pub fn grant_type(&self) -> &'static str {
        if self.config.username.is_some() && self.config.password.is_some() {
            "password"
        } else {
            "client_credentials"
        }
    }

    pub fn get_auth_state(&self) -> AuthState {
        self.auth_state
            .read()
            .map(|state| state.clone())
            .unwrap_or(AuthState::NotAuthenticated)
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self.get_auth_state(), AuthState::Authenticated { token } if !token.is_expired())
    }

    pub fn needs_refresh(&self) -> bool {
        match self.get_auth_state() {
            AuthState::NotAuthenticated => false,
            AuthState::TokenExpired { .. } => true,
            AuthState::Authenticated { token } => token.is_expired(),
        }
    }

    pub fn set_token(&self, token: RedditToken) {
        let state = if token.is_expired() {
            AuthState::TokenExpired { token }
        } else {
            AuthState::Authenticated { token }
        };
        self.replace_state(state);
    }

    /// Marks the current token as unusable so the next call re-authenticates.
    pub fn invalidate_token(&self) {
        if let AuthState::Authenticated { token } = self.get_auth_state() {
            self.replace_state(AuthState::TokenExpired { token });
        }
    }

    fn replace_state(&self, state: AuthState) {
        match self.auth_state.write() {
            Ok(mut guard) => *guard = state,
            Err(poisoned) => *poisoned.into_inner() = state,
        }
    }

    pub async fn authenticate(&self) -> Result<RedditToken, CoreError> {
        info!("Authenticating with Reddit using {} grant", self.grant_type());

        let user_agent = self.config.user_agent.clone();
        let http_client = move |request| token_http_request(user_agent, request);

        let response = match (&self.config.username, &self.config.password) {
            (Some(username), Some(password)) => {
                self.oauth_client
                    .exchange_password(
                        &ResourceOwnerUsername::new(username.clone()),
                        &ResourceOwnerPassword::new(password.clone()),
                    )
                    .request_async(http_client)
                    .await
            }
            _ => {
                self.oauth_client
                    .exchange_client_credentials()
                    .request_async(http_client)
                    .await
            }
        }
        .map_err(map_token_error)?;

        let token = token_from_response(&response);
        debug!("Reddit token valid until {:?}", token.expires_at);
        self.set_token(token.clone());
        Ok(token)
    }

    /// Returns a usable access token, authenticating when needed.
    pub async fn access_token(&self) -> Result<String, CoreError> {
        if let AuthState::Authenticated { token } = self.get_auth_state() {
            if !token.is_expired() {
                return Ok(token.access_token);
            }
        }
        Ok(self.authenticate().await?.access_token)
    }

    pub async fn fetch_new_posts(
        &self,
        subreddit: &str,
        limit: u32,
    ) -> Result<Vec<RedditPost>, CoreError> {
        let access_token = self.access_token().await?;
        let operation_name = format!("fetch r/{}", subreddit);

        let result = self
            .retry
            .execute(&operation_name, || {
                self.api_client.get_subreddit_posts(
                    &access_token,
                    subreddit,
                    ListingSort::New,
                    Some(limit),
                    None,
                )
            })
            .await;

        let listing = match result {
            Ok(listing) => listing,
            Err(CoreError::RedditApi(RedditApiError::InvalidToken)) => {
                warn!("Reddit rejected the access token, re-authenticating next time");
                self.invalidate_token();
                return Err(CoreError::RedditApi(RedditApiError::InvalidToken));
            }
            Err(e) => return Err(e),
        };

        let metrics = self.api_client.get_metrics().await;
        debug!(
            "Reddit API usage: {} requests, {} failed, avg {:?}",
            metrics.total_requests, metrics.failed_requests, metrics.average_response_time
        );

        Ok(listing
            .data
            .children
            .into_iter()
            .map(|child| child.data.into())
            .collect())
    }

    pub async fn get_api_metrics(&self) -> metrics::ApiMetrics {
        self.api_client.get_metrics().await
    }

    pub async fn get_rate_limit_status(&self) -> rate_limiter::RateLimitStatus {
        self.api_client.get_rate_limit_status().await
    }
}

#[async_trait]
impl PostSource for RedditClient {
    async fn fetch_posts(&self, subreddit: &str, limit: u32) -> Result<Vec<RedditPost>, CoreError> {
        self.fetch_new_posts(subreddit, limit).await
    }
}

/// Token endpoint transport. Reddit rejects requests without a descriptive
/// User-Agent, which the stock oauth2 client does not send.
async fn token_http_request(
    user_agent: String,
    request: HttpRequest,
) -> Result<HttpResponse, reqwest::Error> {
    let client = reqwest::Client::builder()
        .user_agent(user_agent)
        .redirect(reqwest::redirect::Policy::none())
        .timeout(Duration::from_secs(30))
        .build()?;

    let mut request_builder = client
        .request(request.method, request.url.as_str())
        .body(request.body);
    for (name, value) in &request.headers {
        request_builder = request_builder.header(name.as_str(), value.as_bytes());
    }

    let response = request_builder.send().await?;
    let status_code = response.status();
    let headers = response.headers().to_owned();
    let body = response.bytes().await?.to_vec();

    Ok(HttpResponse {
        status_code,
        headers,
        body,
    })
}

fn token_from_response(response: &BasicTokenResponse) -> RedditToken {
    let lifetime = response
        .expires_in()
        .unwrap_or_else(|| Duration::from_secs(3600));

    RedditToken {
        access_token: response.access_token().secret().clone(),
        refresh_token: response.refresh_token().map(|t| t.secret().clone()),
        expires_at: SystemTime::now() + lifetime,
        scope: response
            .scopes()
            .map(|scopes| scopes.iter().map(|s| s.to_string()).collect())
            .unwrap_or_default(),
    }
}

fn map_token_error(error: RequestTokenError<reqwest::Error, BasicErrorResponse>) -> CoreError {
    match error {
        RequestTokenError::ServerResponse(response) => {
            CoreError::RedditApi(RedditApiError::AuthenticationFailed {
                reason: response.error().to_string(),
            })
        }
        RequestTokenError::Request(e) => {
            if e.is_timeout() {
                CoreError::RedditApi(RedditApiError::RequestTimeout)
            } else {
                CoreError::Network(e)
            }
        }
        RequestTokenError::Parse(_, body) => {
            CoreError::RedditApi(RedditApiError::AuthenticationFailed {
                reason: token_error_reason(&body),
            })
        }
        RequestTokenError::Other(message) => {
            CoreError::RedditApi(RedditApiError::AuthenticationFailed { reason: message })
        }
    }
}

/// Reddit answers bad script credentials with `200 {"error": "invalid_grant"}`.
fn token_error_reason(body: &[u8]) -> String {
    serde_json::from_slice::<serde_json::Value>(body)
        .ok()
        .and_then(|value| value.get("error").map(|e| e.to_string().trim_matches('"').to_string()))
        .unwrap_or_else(|| "unexpected token response".to_string())
}
