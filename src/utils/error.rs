use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Storage,
    Network,
    Configuration,
    Validation,
    Calculation,
    Export,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

#[derive(Error, Debug)]
pub enum MetricsError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] rusqlite::Error),

    #[error("API request failed: {0}")]
    ApiError(#[from] reqwest::Error),

    #[error("CSV processing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Zip operation failed: {0}")]
    ZipError(#[from] zip::result::ZipError),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Configuration validation failed for '{field}': {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Missing required configuration: {field}")]
    MissingConfigError { field: String },

    #[error("Invalid value '{value}' for '{field}': {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Validation error: {message}")]
    ValidationError { message: String },

    #[error("Invalid input '{value}' for '{field}': {reason}")]
    InvalidInput {
        field: String,
        value: String,
        reason: String,
    },

    #[error("{entity} with id {id} not found")]
    NotFound { entity: String, id: i64 },

    #[error("Calculation error: {message}")]
    CalculationError { message: String },

    #[error("Analyst error: {message}")]
    AnalystError { message: String },
}

impl MetricsError {
    pub fn invalid_input(field: &str, value: impl ToString, reason: &str) -> Self {
        MetricsError::InvalidInput {
            field: field.to_string(),
            value: value.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn not_found(entity: &str, id: i64) -> Self {
        MetricsError::NotFound {
            entity: entity.to_string(),
            id,
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            MetricsError::DatabaseError(_) | MetricsError::NotFound { .. } => ErrorCategory::Storage,
            MetricsError::ApiError(_) | MetricsError::AnalystError { .. } => ErrorCategory::Network,
            MetricsError::ConfigError { .. }
            | MetricsError::ConfigValidationError { .. }
            | MetricsError::MissingConfigError { .. }
            | MetricsError::InvalidConfigValueError { .. } => ErrorCategory::Configuration,
            MetricsError::ValidationError { .. } | MetricsError::InvalidInput { .. } => {
                ErrorCategory::Validation
            }
            MetricsError::CalculationError { .. } => ErrorCategory::Calculation,
            MetricsError::CsvError(_)
            | MetricsError::IoError(_)
            | MetricsError::SerializationError(_)
            | MetricsError::ZipError(_) => ErrorCategory::Export,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self {
            // 分析服務不可用只影響敘述內容
            MetricsError::AnalystError { .. } => ErrorSeverity::Low,
            MetricsError::ApiError(_)
            | MetricsError::ValidationError { .. }
            | MetricsError::InvalidInput { .. }
            | MetricsError::NotFound { .. } => ErrorSeverity::Medium,
            MetricsError::CsvError(_)
            | MetricsError::SerializationError(_)
            | MetricsError::ZipError(_)
            | MetricsError::CalculationError { .. }
            | MetricsError::ConfigError { .. }
            | MetricsError::ConfigValidationError { .. }
            | MetricsError::MissingConfigError { .. }
            | MetricsError::InvalidConfigValueError { .. } => ErrorSeverity::High,
            MetricsError::DatabaseError(_) | MetricsError::IoError(_) => ErrorSeverity::Critical,
        }
    }

    pub fn recovery_suggestion(&self) -> String {
        match self.category() {
            ErrorCategory::Storage => match self {
                MetricsError::NotFound { entity, .. } => {
                    format!("Check the {} id, list existing records first", entity.to_lowercase())
                }
                _ => "Check that the database file is writable, or run `init` to create it".to_string(),
            },
            ErrorCategory::Network => {
                "Check analyst credentials and network access; local analysis is used meanwhile".to_string()
            }
            ErrorCategory::Configuration => {
                "Review the TOML configuration file and environment variables".to_string()
            }
            ErrorCategory::Validation => {
                "Correct the input values: amounts must be non-negative and required fields set".to_string()
            }
            ErrorCategory::Calculation => {
                "Check the plan assumptions for out-of-range rates".to_string()
            }
            ErrorCategory::Export => "Check the output path and available disk space".to_string(),
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            MetricsError::InvalidInput { field, reason, .. } => format!("{}: {}", field, reason),
            MetricsError::ValidationError { message } => message.clone(),
            MetricsError::NotFound { entity, id } => format!("{} #{} does not exist", entity, id),
            MetricsError::DatabaseError(_) => "The local database could not be accessed".to_string(),
            MetricsError::ApiError(_) | MetricsError::AnalystError { .. } => {
                "The AI analyst is currently unavailable".to_string()
            }
            other => other.to_string(),
        }
    }
}

impl From<toml::de::Error> for MetricsError {
    fn from(e: toml::de::Error) -> Self {
        MetricsError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        }
    }
}

pub type Result<T> = std::result::Result<T, MetricsError>;
