use thiserror::Error;

/// Classified exit status of the provisioning tool.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct ProvisioningError {
    pub exit_code: i32,
    pub message: String,
}

impl ProvisioningError {
    pub fn new(exit_code: i32, message: impl Into<String>) -> Self {
        Self {
            exit_code,
            message: message.into(),
        }
    }
}

#[derive(Error, Debug)]
pub enum LandlordError {
    #[error("Coordination store error: {message}")]
    Store { message: String },

    #[error("No free ports. Increase max_tenants, or set up a new Landlord server.")]
    PoolExhausted,

    #[error(transparent)]
    Provisioning(#[from] ProvisioningError),

    #[error("No port bound to tenant \"{id}\".")]
    NotFound { id: String },

    #[error("{message}")]
    Validation { message: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error in {field}: {message}")]
    Config { field: String, message: String },

    #[error("Invalid value for {field} ({value}): {reason}")]
    InvalidConfigValue {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl From<redis::RedisError> for LandlordError {
    fn from(e: redis::RedisError) -> Self {
        LandlordError::Store {
            message: e.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Store,
    Capacity,
    Provisioning,
    Request,
    Configuration,
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl LandlordError {
    pub fn validation(message: impl Into<String>) -> Self {
        LandlordError::Validation {
            message: message.into(),
        }
    }

    pub fn store(message: impl Into<String>) -> Self {
        LandlordError::Store {
            message: message.into(),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            LandlordError::Store { .. } => ErrorCategory::Store,
            LandlordError::PoolExhausted => ErrorCategory::Capacity,
            LandlordError::Provisioning(_) => ErrorCategory::Provisioning,
            LandlordError::NotFound { .. }
            | LandlordError::Validation { .. }
            | LandlordError::Serialization(_) => ErrorCategory::Request,
            LandlordError::Config { .. } | LandlordError::InvalidConfigValue { .. } => {
                ErrorCategory::Configuration
            }
            LandlordError::Io(_) | LandlordError::Internal { .. } => ErrorCategory::System,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self.category() {
            ErrorCategory::Request => ErrorSeverity::Low,
            ErrorCategory::Capacity | ErrorCategory::Provisioning => ErrorSeverity::Medium,
            ErrorCategory::Store | ErrorCategory::Configuration => ErrorSeverity::High,
            ErrorCategory::System => ErrorSeverity::Critical,
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            LandlordError::Store { .. } => {
                "Check that the coordination store is running and the shared credential is correct"
            }
            LandlordError::PoolExhausted => {
                "Raise pool.max_tenants or delete unused tenants"
            }
            LandlordError::Provisioning(e) if e.exit_code == 4 => {
                "Run landlord as a user allowed to sudo the provisioning tool"
            }
            LandlordError::Provisioning(_) => "Inspect the provisioning tool output in the log",
            LandlordError::NotFound { .. } => "Run Setup for the tenant first",
            LandlordError::Validation { .. } | LandlordError::Serialization(_) => {
                "Fix the request and send it again"
            }
            LandlordError::Io(_) => "Check file permissions and paths",
            LandlordError::Config { .. } | LandlordError::InvalidConfigValue { .. } => {
                "Fix the configuration file and restart"
            }
            LandlordError::Internal { .. } => "Report the log excerpt around this failure",
        }
    }
}

pub type Result<T> = std::result::Result<T, LandlordError>;
