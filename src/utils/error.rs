use thiserror::Error;

#[derive(Error, Debug)]
pub enum ChefError {
    #[error("Backend service is not configured")]
    BackendUnavailable,

    #[error("User not authenticated")]
    Unauthenticated,

    #[error("Invalid request: {message}")]
    InvalidRequest { message: String },

    #[error("Failed to parse recipe data: {message}")]
    GenerationParseError { message: String },

    #[error("Transport failure: {0}")]
    TransportFailure(#[from] reqwest::Error),

    #[error("Remote service returned {status}: {message}")]
    RemoteError { status: u16, message: String },

    #[error("Model call failed: {message}")]
    ModelError { message: String },

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Missing configuration: {field}")]
    MissingConfigError { field: String },

    #[error("Invalid value for {field} ({value}): {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    Authentication,
    Request,
    Network,
    Generation,
    Internal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl ChefError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            ChefError::BackendUnavailable
            | ChefError::ConfigError { .. }
            | ChefError::MissingConfigError { .. }
            | ChefError::InvalidConfigValueError { .. } => ErrorCategory::Configuration,
            ChefError::Unauthenticated => ErrorCategory::Authentication,
            ChefError::InvalidRequest { .. } => ErrorCategory::Request,
            ChefError::TransportFailure(_) | ChefError::RemoteError { .. } => {
                ErrorCategory::Network
            }
            ChefError::GenerationParseError { .. } | ChefError::ModelError { .. } => {
                ErrorCategory::Generation
            }
            ChefError::SerializationError(_) | ChefError::IoError(_) => ErrorCategory::Internal,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self.category() {
            // 本地/示範模式，不算故障
            ErrorCategory::Configuration if matches!(self, ChefError::BackendUnavailable) => {
                ErrorSeverity::Low
            }
            ErrorCategory::Configuration => ErrorSeverity::Critical,
            ErrorCategory::Network | ErrorCategory::Generation => ErrorSeverity::Medium,
            ErrorCategory::Authentication | ErrorCategory::Request => ErrorSeverity::High,
            ErrorCategory::Internal => ErrorSeverity::Critical,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.severity() == ErrorSeverity::Medium
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            ChefError::BackendUnavailable => {
                "The recipe service is not connected; showing example data.".to_string()
            }
            ChefError::Unauthenticated => "Please sign in to continue.".to_string(),
            ChefError::InvalidRequest { message } => format!("Invalid request: {}", message),
            ChefError::GenerationParseError { .. } => "Failed to parse recipe data".to_string(),
            ChefError::ModelError { .. } => "Failed to generate recipes".to_string(),
            ChefError::TransportFailure(_) | ChefError::RemoteError { .. } => {
                "Could not reach the recipe service.".to_string()
            }
            ChefError::MissingConfigError { field } => {
                format!("Missing required setting: {}", field)
            }
            ChefError::InvalidConfigValueError { field, reason, .. } => {
                format!("Invalid setting {}: {}", field, reason)
            }
            other => other.to_string(),
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self.category() {
            ErrorCategory::Configuration => {
                "Set SUPABASE_URL and SUPABASE_ANON_KEY (or pass --config) and try again"
            }
            ErrorCategory::Authentication => "Sign in with --email and --password",
            ErrorCategory::Request => "Provide a non-empty list of ingredients",
            ErrorCategory::Network => "Check your network connection and retry",
            ErrorCategory::Generation => "Retry; the model output was unusable",
            ErrorCategory::Internal => "Re-run with --verbose and report the log",
        }
    }

    /// HTTP status used when this error crosses the generation function boundary.
    pub fn status_code(&self) -> u16 {
        match self {
            ChefError::InvalidRequest { .. } => 400,
            _ => 500,
        }
    }
}

pub type Result<T> = std::result::Result<T, ChefError>;
