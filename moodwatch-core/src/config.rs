//! Application configuration.
//!
//! Values come from built-in defaults, then an optional TOML secrets file,
//! then the process environment (after `.env` is loaded). Later sources win.

use crate::error::{ConfigError, CoreError};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, info};

pub const DEFAULT_SUBREDDIT: &str = "Depresion";
pub const DEFAULT_MODEL: &str = "j-hartmann/emotion-english-distilroberta-base";
pub const DEFAULT_INFERENCE_URL: &str = "https://router.huggingface.co/hf-inference/models";
pub const DEFAULT_SECRETS_PATH: &str = "secrets.toml";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SeenStoreKind {
    File,
    Memory,
    Database,
}

impl FromStr for SeenStoreKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "file" => Ok(SeenStoreKind::File),
            "memory" | "session" => Ok(SeenStoreKind::Memory),
            "database" | "sqlite" => Ok(SeenStoreKind::Database),
            other => Err(ConfigError::InvalidValue {
                field: "seen_store".to_string(),
                value: other.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct RedditCredentials {
    pub client_id: String,
    pub client_secret: String,
    pub user_agent: String,
    pub username: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ClassifierSettings {
    pub model: String,
    pub endpoint: String,
    pub api_token: Option<String>,
    pub max_input_chars: usize,
    pub timeout_seconds: u64,
}

impl Default for ClassifierSettings {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            endpoint: DEFAULT_INFERENCE_URL.to_string(),
            api_token: None,
            max_input_chars: 512,
            timeout_seconds: 60,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub reddit: RedditCredentials,
    pub subreddit: String,
    pub post_limit: u32,
    pub polling_interval_seconds: u64,
    pub show_past_posts: bool,
    pub seen_store: SeenStoreKind,
    pub seen_file: PathBuf,
    pub database_url: Option<String>,
    pub notifications: bool,
    pub classifier: ClassifierSettings,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            reddit: RedditCredentials {
                user_agent: format!("moodwatch/{}", env!("CARGO_PKG_VERSION")),
                ..Default::default()
            },
            subreddit: DEFAULT_SUBREDDIT.to_string(),
            post_limit: 5,
            polling_interval_seconds: 60,
            show_past_posts: false,
            seen_store: SeenStoreKind::File,
            seen_file: PathBuf::from("seen_posts.txt"),
            database_url: Some("sqlite://moodwatch.db".to_string()),
            notifications: false,
            classifier: ClassifierSettings::default(),
        }
    }
}

/// Layout of the secrets file. Every key is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SecretsFile {
    pub reddit: RedditSection,
    pub dashboard: DashboardSection,
    pub classifier: ClassifierSection,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RedditSection {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub user_agent: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct DashboardSection {
    pub subreddit: Option<String>,
    pub post_limit: Option<u32>,
    pub polling_interval_seconds: Option<u64>,
    pub show_past_posts: Option<bool>,
    pub seen_store: Option<SeenStoreKind>,
    pub seen_file: Option<PathBuf>,
    pub database_url: Option<String>,
    pub notifications: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ClassifierSection {
    pub model: Option<String>,
    pub endpoint: Option<String>,
    pub api_token: Option<String>,
    pub max_input_chars: Option<usize>,
    pub timeout_seconds: Option<u64>,
}

impl SecretsFile {
    pub fn parse(contents: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(contents)?)
    }

    /// Reads the secrets file, or `None` if it does not exist.
    pub fn read(path: &Path) -> Result<Option<Self>, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(contents) => Self::parse(&contents).map(Some),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(_) => Err(ConfigError::FileNotFound {
                path: path.display().to_string(),
            }),
        }
    }
}

impl AppConfig {
    /// Loads `.env`, the secrets file and the environment, then validates.
    pub fn load() -> Result<Self, CoreError> {
        match dotenvy::dotenv() {
            Ok(path) => debug!("Loaded environment from {}", path.display()),
            Err(e) if e.not_found() => debug!("No .env file found"),
            Err(e) => {
                return Err(ConfigError::ValidationFailed {
                    reason: format!(".env could not be parsed: {e}"),
                }
                .into())
            }
        }

        let secrets_path = std::env::var("MOODWATCH_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_SECRETS_PATH));
        let secrets = SecretsFile::read(&secrets_path)?;
        if secrets.is_some() {
            info!("Using secrets file {}", secrets_path.display());
        }

        let config = Self::from_sources(secrets, |key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Builds a configuration from an optional secrets file and an
    /// environment lookup. Does not validate.
    pub fn from_sources<F>(secrets: Option<SecretsFile>, env: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(secrets) = secrets {
            config.apply_secrets(secrets);
        }

        if let Some(v) = first_set(&env, &["REDDIT_CLIENT_ID", "CLIENT_ID"]) {
            config.reddit.client_id = v;
        }
        if let Some(v) = first_set(&env, &["REDDIT_CLIENT_SECRET", "CLIENT_SECRET"]) {
            config.reddit.client_secret = v;
        }
        if let Some(v) = first_set(&env, &["REDDIT_USER_AGENT", "USER_AGENT"]) {
            config.reddit.user_agent = v;
        }
        if let Some(v) = first_set(&env, &["REDDIT_USERNAME", "USERNAME"]) {
            config.reddit.username = Some(v);
        }
        if let Some(v) = first_set(&env, &["REDDIT_PASSWORD", "PASSWORD"]) {
            config.reddit.password = Some(v);
        }
        if let Some(v) = first_set(&env, &["MOODWATCH_SUBREDDIT"]) {
            config.subreddit = v;
        }
        if let Some(v) = first_set(&env, &["MOODWATCH_POST_LIMIT"]) {
            config.post_limit = parse_value("post_limit", &v)?;
        }
        if let Some(v) = first_set(&env, &["MOODWATCH_POLL_INTERVAL"]) {
            config.polling_interval_seconds = parse_value("polling_interval_seconds", &v)?;
        }
        if let Some(v) = first_set(&env, &["MOODWATCH_SHOW_PAST_POSTS"]) {
            config.show_past_posts = parse_bool("show_past_posts", &v)?;
        }
        if let Some(v) = first_set(&env, &["MOODWATCH_SEEN_STORE"]) {
            config.seen_store = v.parse()?;
        }
        if let Some(v) = first_set(&env, &["MOODWATCH_SEEN_FILE"]) {
            config.seen_file = PathBuf::from(v);
        }
        if let Some(v) = first_set(&env, &["MOODWATCH_DATABASE_URL"]) {
            config.database_url = match v.to_lowercase().as_str() {
                "none" | "off" => None,
                _ => Some(v),
            };
        }
        if let Some(v) = first_set(&env, &["MOODWATCH_NOTIFICATIONS"]) {
            config.notifications = parse_bool("notifications", &v)?;
        }
        if let Some(v) = first_set(&env, &["HF_API_TOKEN"]) {
            config.classifier.api_token = Some(v);
        }
        if let Some(v) = first_set(&env, &["MOODWATCH_MODEL"]) {
            config.classifier.model = v;
        }
        if let Some(v) = first_set(&env, &["MOODWATCH_INFERENCE_URL"]) {
            config.classifier.endpoint = v;
        }

        config.subreddit = normalize_subreddit(&config.subreddit);
        Ok(config)
    }

    fn apply_secrets(&mut self, secrets: SecretsFile) {
        let SecretsFile {
            reddit,
            dashboard,
            classifier,
        } = secrets;

        if let Some(v) = reddit.client_id {
            self.reddit.client_id = v;
        }
        if let Some(v) = reddit.client_secret {
            self.reddit.client_secret = v;
        }
        if let Some(v) = reddit.user_agent {
            self.reddit.user_agent = v;
        }
        self.reddit.username = reddit.username.or(self.reddit.username.take());
        self.reddit.password = reddit.password.or(self.reddit.password.take());

        if let Some(v) = dashboard.subreddit {
            self.subreddit = v;
        }
        if let Some(v) = dashboard.post_limit {
            self.post_limit = v;
        }
        if let Some(v) = dashboard.polling_interval_seconds {
            self.polling_interval_seconds = v;
        }
        if let Some(v) = dashboard.show_past_posts {
            self.show_past_posts = v;
        }
        if let Some(v) = dashboard.seen_store {
            self.seen_store = v;
        }
        if let Some(v) = dashboard.seen_file {
            self.seen_file = v;
        }
        if let Some(v) = dashboard.database_url {
            self.database_url = Some(v);
        }
        if let Some(v) = dashboard.notifications {
            self.notifications = v;
        }

        if let Some(v) = classifier.model {
            self.classifier.model = v;
        }
        if let Some(v) = classifier.endpoint {
            self.classifier.endpoint = v;
        }
        if let Some(v) = classifier.api_token {
            self.classifier.api_token = Some(v);
        }
        if let Some(v) = classifier.max_input_chars {
            self.classifier.max_input_chars = v;
        }
        if let Some(v) = classifier.timeout_seconds {
            self.classifier.timeout_seconds = v;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.reddit.client_id.is_empty() {
            return Err(ConfigError::MissingEnvironmentVariable {
                var_name: "CLIENT_ID".to_string(),
            });
        }
        if self.reddit.client_secret.is_empty() {
            return Err(ConfigError::MissingEnvironmentVariable {
                var_name: "CLIENT_SECRET".to_string(),
            });
        }
        if self.subreddit.is_empty() {
            return Err(ConfigError::MissingField {
                field: "subreddit".to_string(),
            });
        }
        if !(1..=100).contains(&self.post_limit) {
            return Err(ConfigError::InvalidValue {
                field: "post_limit".to_string(),
                value: self.post_limit.to_string(),
            });
        }
        if self.polling_interval_seconds < 10 {
            return Err(ConfigError::InvalidValue {
                field: "polling_interval_seconds".to_string(),
                value: self.polling_interval_seconds.to_string(),
            });
        }
        if self.classifier.max_input_chars == 0 {
            return Err(ConfigError::InvalidValue {
                field: "max_input_chars".to_string(),
                value: "0".to_string(),
            });
        }
        if self.seen_store == SeenStoreKind::Database && self.database_url.is_none() {
            return Err(ConfigError::ValidationFailed {
                reason: "seen_store = database requires a database_url".to_string(),
            });
        }
        Ok(())
    }
}

fn first_set<F>(env: &F, keys: &[&str]) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    keys.iter()
        .find_map(|key| env(key).filter(|value| !value.is_empty()))
}

fn normalize_subreddit(name: &str) -> String {
    let trimmed = name.trim().trim_start_matches('/');
    trimmed
        .strip_prefix("r/")
        .unwrap_or(trimmed)
        .trim_end_matches('/')
        .to_string()
}

fn parse_value<T: FromStr>(field: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        field: field.to_string(),
        value: value.to_string(),
    })
}

fn parse_bool(field: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            field: field.to_string(),
            value: value.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = AppConfig::from_sources(None, env_from(&[])).unwrap();
        assert_eq!(config.subreddit, "Depresion");
        assert_eq!(config.post_limit, 5);
        assert_eq!(config.seen_store, SeenStoreKind::File);
        assert_eq!(config.classifier.model, DEFAULT_MODEL);
        assert_eq!(config.classifier.max_input_chars, 512);
        assert!(!config.show_past_posts);
    }

    #[test]
    fn test_credentials_from_plain_env_names() {
        let config = AppConfig::from_sources(
            None,
            env_from(&[
                ("CLIENT_ID", "id"),
                ("CLIENT_SECRET", "secret"),
                ("USER_AGENT", "agent/1.0"),
                ("USERNAME", "someone"),
                ("PASSWORD", "hunter2"),
            ]),
        )
        .unwrap();

        assert_eq!(config.reddit.client_id, "id");
        assert_eq!(config.reddit.client_secret, "secret");
        assert_eq!(config.reddit.user_agent, "agent/1.0");
        assert_eq!(config.reddit.username.as_deref(), Some("someone"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_prefixed_env_names_win() {
        let config = AppConfig::from_sources(
            None,
            env_from(&[("CLIENT_ID", "plain"), ("REDDIT_CLIENT_ID", "prefixed")]),
        )
        .unwrap();
        assert_eq!(config.reddit.client_id, "prefixed");
    }

    #[test]
    fn test_secrets_file_then_env_override() {
        let secrets = SecretsFile::parse(
            r#"
            [reddit]
            client_id = "file-id"
            client_secret = "file-secret"

            [dashboard]
            subreddit = "r/rust"
            post_limit = 10
            seen_store = "memory"
            show_past_posts = true

            [classifier]
            api_token = "hf_file"
            "#,
        )
        .unwrap();

        let config = AppConfig::from_sources(
            Some(secrets),
            env_from(&[("CLIENT_SECRET", "env-secret"), ("MOODWATCH_POST_LIMIT", "3")]),
        )
        .unwrap();

        assert_eq!(config.reddit.client_id, "file-id");
        assert_eq!(config.reddit.client_secret, "env-secret");
        assert_eq!(config.subreddit, "rust");
        assert_eq!(config.post_limit, 3);
        assert_eq!(config.seen_store, SeenStoreKind::Memory);
        assert!(config.show_past_posts);
        assert_eq!(config.classifier.api_token.as_deref(), Some("hf_file"));
    }

    #[test]
    fn test_invalid_number_is_rejected() {
        let result = AppConfig::from_sources(None, env_from(&[("MOODWATCH_POST_LIMIT", "many")]));
        assert!(matches!(
            result,
            Err(ConfigError::InvalidValue { ref field, .. }) if field == "post_limit"
        ));
    }

    #[test]
    fn test_validation_requires_credentials() {
        let config = AppConfig::default();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::MissingEnvironmentVariable { ref var_name }) if var_name == "CLIENT_ID"
        ));
    }

    #[test]
    fn test_validation_limits() {
        let mut config = AppConfig::from_sources(
            None,
            env_from(&[("CLIENT_ID", "id"), ("CLIENT_SECRET", "secret")]),
        )
        .unwrap();
        assert!(config.validate().is_ok());

        config.post_limit = 0;
        assert!(config.validate().is_err());
        config.post_limit = 5;

        config.polling_interval_seconds = 1;
        assert!(config.validate().is_err());
        config.polling_interval_seconds = 60;

        config.seen_store = SeenStoreKind::Database;
        config.database_url = None;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_database_can_be_disabled() {
        let config =
            AppConfig::from_sources(None, env_from(&[("MOODWATCH_DATABASE_URL", "none")])).unwrap();
        assert!(config.database_url.is_none());
    }

    #[test]
    fn test_missing_secrets_file_is_none() {
        let path = std::env::temp_dir().join(format!("absent_{}.toml", uuid::Uuid::new_v4()));
        assert!(SecretsFile::read(&path).unwrap().is_none());
    }
}
