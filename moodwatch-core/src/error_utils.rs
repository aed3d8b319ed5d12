use crate::error::*;
use std::time::Duration;
use tracing::{error, info, warn};

pub trait ErrorExt {
    fn log_error(&self) -> &Self;
    fn log_warn(&self) -> &Self;
    fn is_retryable(&self) -> bool;
    fn retry_after(&self) -> Option<Duration>;
    fn user_friendly_message(&self) -> String;
    fn error_code(&self) -> String;
}

impl ErrorExt for CoreError {
    fn log_error(&self) -> &Self {
        error!("CoreError: {}", self);
        match self {
            CoreError::RedditApi(e) => {
                error!("Reddit API error details: {:?}", e);
            }
            CoreError::Classifier(e) => {
                error!("Classifier error details: {:?}", e);
            }
            CoreError::Database(e) => {
                error!("Database error details: {:?}", e);
            }
            CoreError::Config(e) => {
                error!("Configuration error details: {:?}", e);
            }
            _ => {}
        }
        self
    }

    fn log_warn(&self) -> &Self {
        warn!("CoreError (warning): {}", self);
        self
    }

    fn is_retryable(&self) -> bool {
        match self {
            CoreError::RedditApi(e) => e.is_retryable(),
            CoreError::Classifier(e) => e.is_retryable(),
            CoreError::Database(e) => e.is_retryable(),
            CoreError::Network(_) => true,
            CoreError::Timeout { .. } => true,
            CoreError::RateLimited { .. } => true,
            _ => false,
        }
    }

    fn retry_after(&self) -> Option<Duration> {
        match self {
            CoreError::RedditApi(e) => e.retry_after(),
            CoreError::Classifier(e) => e.retry_after(),
            CoreError::Database(e) => e.retry_after(),
            CoreError::Timeout { seconds } => Some(Duration::from_secs(*seconds)),
            CoreError::RateLimited { retry_after, .. } => *retry_after,
            _ if self.is_retryable() => Some(Duration::from_secs(5)),
            _ => None,
        }
    }

    fn user_friendly_message(&self) -> String {
        match self {
            CoreError::RedditApi(e) => e.user_friendly_message(),
            CoreError::Classifier(e) => e.user_friendly_message(),
            CoreError::Database(e) => e.user_friendly_message(),
            CoreError::Config(e) => e.user_friendly_message(),
            CoreError::Io(_) => "No se pudo leer o escribir un archivo local.".to_string(),
            CoreError::Network(_) => {
                "Error de conexión. Revisa tu conexión a internet.".to_string()
            }
            CoreError::InvalidInput { message } => format!("Entrada no válida: {}", message),
            CoreError::Timeout { .. } => {
                "La operación tardó demasiado. Inténtalo de nuevo.".to_string()
            }
            CoreError::NotFound { resource } => format!("No se encontró: {}", resource),
            CoreError::RateLimited { message, .. } => {
                format!(
                    "Límite de peticiones alcanzado: {}. Espera antes de volver a intentarlo.",
                    message
                )
            }
            _ => "Ocurrió un error inesperado. Inténtalo más tarde.".to_string(),
        }
    }

    fn error_code(&self) -> String {
        match self {
            CoreError::RedditApi(_) => "REDDIT_API".to_string(),
            CoreError::Classifier(_) => "CLASSIFIER".to_string(),
            CoreError::Database(_) => "DATABASE".to_string(),
            CoreError::Config(_) => "CONFIG".to_string(),
            CoreError::Io(_) => "IO".to_string(),
            CoreError::Serialization(_) => "SERIALIZATION".to_string(),
            CoreError::Network(_) => "NETWORK".to_string(),
            CoreError::InvalidInput { .. } => "INVALID_INPUT".to_string(),
            CoreError::Timeout { .. } => "TIMEOUT".to_string(),
            CoreError::NotFound { .. } => "NOT_FOUND".to_string(),
            CoreError::Internal { .. } => "INTERNAL".to_string(),
            CoreError::RateLimited { .. } => "RATE_LIMITED".to_string(),
        }
    }
}

impl ErrorExt for RedditApiError {
    fn log_error(&self) -> &Self {
        error!("RedditApiError: {}", self);
        self
    }

    fn log_warn(&self) -> &Self {
        warn!("RedditApiError (warning): {}", self);
        self
    }

    fn is_retryable(&self) -> bool {
        match self {
            RedditApiError::RateLimitExceeded { .. } => true,
            RedditApiError::RequestTimeout => true,
            RedditApiError::ServerError { status_code } => *status_code >= 500,
            _ => false,
        }
    }

    fn retry_after(&self) -> Option<Duration> {
        match self {
            RedditApiError::RateLimitExceeded { retry_after } => {
                Some(Duration::from_secs(*retry_after))
            }
            _ if self.is_retryable() => Some(Duration::from_secs(30)),
            _ => None,
        }
    }

    fn user_friendly_message(&self) -> String {
        match self {
            RedditApiError::AuthenticationFailed { .. } => {
                "Falló la autenticación con Reddit. Revisa tus credenciales.".to_string()
            }
            RedditApiError::RateLimitExceeded { retry_after } => format!(
                "Demasiadas peticiones. Espera {} segundos antes de volver a intentarlo.",
                retry_after
            ),
            RedditApiError::Forbidden { resource } => format!(
                "Acceso denegado a {}. Puede que no tengas permiso para ver este contenido.",
                resource
            ),
            RedditApiError::SubredditNotFound { subreddit } => {
                format!("El subreddit '{}' no existe o es privado.", subreddit)
            }
            RedditApiError::InvalidToken => {
                "El token de autenticación de Reddit no es válido. Vuelve a autenticarte.".to_string()
            }
            RedditApiError::RequestTimeout => {
                "La petición a Reddit tardó demasiado. Inténtalo de nuevo.".to_string()
            }
            _ => "Error de la API de Reddit. Inténtalo más tarde.".to_string(),
        }
    }

    fn error_code(&self) -> String {
        match self {
            RedditApiError::AuthenticationFailed { .. } => "REDDIT_AUTH_FAILED".to_string(),
            RedditApiError::RateLimitExceeded { .. } => "REDDIT_RATE_LIMIT".to_string(),
            RedditApiError::Forbidden { .. } => "REDDIT_FORBIDDEN".to_string(),
            RedditApiError::SubredditNotFound { .. } => "REDDIT_SUBREDDIT_NOT_FOUND".to_string(),
            RedditApiError::InvalidToken => "REDDIT_INVALID_TOKEN".to_string(),
            RedditApiError::RequestTimeout => "REDDIT_TIMEOUT".to_string(),
            RedditApiError::InvalidResponse { .. } => "REDDIT_INVALID_RESPONSE".to_string(),
            RedditApiError::ServerError { .. } => "REDDIT_SERVER_ERROR".to_string(),
        }
    }
}

impl ErrorExt for ClassifierError {
    fn log_error(&self) -> &Self {
        error!("ClassifierError: {}", self);
        self
    }

    fn log_warn(&self) -> &Self {
        warn!("ClassifierError (warning): {}", self);
        self
    }

    fn is_retryable(&self) -> bool {
        matches!(
            self,
            ClassifierError::RateLimitExceeded { .. }
                | ClassifierError::ModelLoading { .. }
                | ClassifierError::ServiceUnavailable { .. }
                | ClassifierError::RequestTimeout
        )
    }

    fn retry_after(&self) -> Option<Duration> {
        match self {
            ClassifierError::RateLimitExceeded { retry_after } => {
                Some(Duration::from_secs(*retry_after))
            }
            ClassifierError::ModelLoading {
                estimated_seconds, ..
            } => Some(Duration::from_secs(*estimated_seconds)),
            _ if self.is_retryable() => Some(Duration::from_secs(10)),
            _ => None,
        }
    }

    fn user_friendly_message(&self) -> String {
        match self {
            ClassifierError::InvalidApiKey { model } => format!(
                "El servicio de inferencia rechazó el token para {}. Revisa HF_API_TOKEN.",
                model
            ),
            ClassifierError::RateLimitExceeded { retry_after } => format!(
                "El análisis de emociones alcanzó su límite. Espera {} segundos.",
                retry_after
            ),
            ClassifierError::ModelLoading {
                estimated_seconds, ..
            } => format!(
                "El modelo de emociones se está cargando. Inténtalo en unos {} segundos.",
                estimated_seconds
            ),
            ClassifierError::ServiceUnavailable { .. } => {
                "El servicio de análisis de emociones no está disponible por ahora.".to_string()
            }
            ClassifierError::RequestTimeout => {
                "El análisis de emociones tardó demasiado. Inténtalo de nuevo.".to_string()
            }
            _ => "Falló el análisis de emociones. Inténtalo más tarde.".to_string(),
        }
    }

    fn error_code(&self) -> String {
        match self {
            ClassifierError::InvalidApiKey { .. } => "CLASSIFIER_INVALID_API_KEY".to_string(),
            ClassifierError::RateLimitExceeded { .. } => "CLASSIFIER_RATE_LIMIT".to_string(),
            ClassifierError::ModelLoading { .. } => "CLASSIFIER_MODEL_LOADING".to_string(),
            ClassifierError::ServiceUnavailable { .. } => "CLASSIFIER_UNAVAILABLE".to_string(),
            ClassifierError::RequestTimeout => "CLASSIFIER_TIMEOUT".to_string(),
            ClassifierError::InvalidResponse { .. } => "CLASSIFIER_INVALID_RESPONSE".to_string(),
            ClassifierError::EmptyResult => "CLASSIFIER_EMPTY_RESULT".to_string(),
        }
    }
}

impl ErrorExt for DatabaseError {
    fn log_error(&self) -> &Self {
        error!("DatabaseError: {}", self);
        self
    }

    fn log_warn(&self) -> &Self {
        warn!("DatabaseError (warning): {}", self);
        self
    }

    fn is_retryable(&self) -> bool {
        matches!(
            self,
            DatabaseError::DatabaseLocked | DatabaseError::ConnectionFailed { .. }
        )
    }

    fn retry_after(&self) -> Option<Duration> {
        match self {
            DatabaseError::DatabaseLocked => Some(Duration::from_millis(100)),
            _ if self.is_retryable() => Some(Duration::from_secs(1)),
            _ => None,
        }
    }

    fn user_friendly_message(&self) -> String {
        match self {
            DatabaseError::ConnectionFailed { .. } => {
                "No se pudo conectar con la base de datos. Inténtalo de nuevo.".to_string()
            }
            DatabaseError::DatabaseLocked => {
                "La base de datos está ocupada. Inténtalo de nuevo.".to_string()
            }
            _ => "Error de la base de datos. Inténtalo de nuevo.".to_string(),
        }
    }

    fn error_code(&self) -> String {
        match self {
            DatabaseError::ConnectionFailed { .. } => "DB_CONNECTION_FAILED".to_string(),
            DatabaseError::MigrationFailed { .. } => "DB_MIGRATION_FAILED".to_string(),
            DatabaseError::QueryFailed { .. } => "DB_QUERY_FAILED".to_string(),
            DatabaseError::DatabaseLocked => "DB_LOCKED".to_string(),
            DatabaseError::Sql(_) => "DB_SQL_ERROR".to_string(),
        }
    }
}

impl ErrorExt for ConfigError {
    fn log_error(&self) -> &Self {
        error!("ConfigError: {}", self);
        self
    }

    fn log_warn(&self) -> &Self {
        warn!("ConfigError (warning): {}", self);
        self
    }

    fn is_retryable(&self) -> bool {
        false
    }

    fn retry_after(&self) -> Option<Duration> {
        None
    }

    fn user_friendly_message(&self) -> String {
        match self {
            ConfigError::FileNotFound { path } => {
                format!("No se pudo leer el archivo de configuración '{}'.", path)
            }
            ConfigError::MissingField { field } => {
                format!("Falta el campo de configuración obligatorio '{}'.", field)
            }
            ConfigError::InvalidValue { field, .. } => {
                format!("Valor no válido para el campo de configuración '{}'.", field)
            }
            ConfigError::MissingEnvironmentVariable { var_name } => format!(
                "La variable de entorno '{}' es obligatoria y no está definida.",
                var_name
            ),
            ConfigError::ValidationFailed { reason } => {
                format!("La configuración no es válida: {}", reason)
            }
            ConfigError::Parse(_) => {
                "El formato del archivo de configuración no es válido. Revisa los ajustes.".to_string()
            }
        }
    }

    fn error_code(&self) -> String {
        match self {
            ConfigError::FileNotFound { .. } => "CONFIG_FILE_NOT_FOUND".to_string(),
            ConfigError::MissingField { .. } => "CONFIG_MISSING_FIELD".to_string(),
            ConfigError::InvalidValue { .. } => "CONFIG_INVALID_VALUE".to_string(),
            ConfigError::MissingEnvironmentVariable { .. } => "CONFIG_MISSING_ENV_VAR".to_string(),
            ConfigError::ValidationFailed { .. } => "CONFIG_VALIDATION_FAILED".to_string(),
            ConfigError::Parse(_) => "CONFIG_PARSE_ERROR".to_string(),
        }
    }
}

pub struct ErrorReporter {
    report_errors: bool,
    report_warnings: bool,
}

impl ErrorReporter {
    pub fn new() -> Self {
        Self {
            report_errors: true,
            report_warnings: true,
        }
    }

    pub fn with_error_reporting(mut self, enabled: bool) -> Self {
        self.report_errors = enabled;
        self
    }

    pub fn with_warning_reporting(mut self, enabled: bool) -> Self {
        self.report_warnings = enabled;
        self
    }

    pub fn report_error(&self, error: &CoreError) {
        if self.report_errors {
            error.log_error();
            info!("Error code: {}", error.error_code());
            info!("User message: {}", error.user_friendly_message());
            if error.is_retryable() {
                if let Some(retry_after) = error.retry_after() {
                    info!("Error is retryable. Retry after: {:?}", retry_after);
                }
            }
        }
    }

    pub fn report_warning(&self, error: &CoreError) {
        if self.report_warnings {
            error.log_warn();
        }
    }
}

impl Default for ErrorReporter {
    fn default() -> Self {
        Self::new()
    }
}
