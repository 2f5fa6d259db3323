use thiserror::Error;

/// Business-rule failures surfaced by the service layer. The display text of
/// the client-facing variants is what ends up in the `error` field of a 4xx body.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Product not found: {id}")]
    ProductNotFound { id: String },

    #[error("Category not found: {id}")]
    CategoryNotFound { id: String },

    #[error("Category already exist")]
    DuplicateCategory { name: String },

    #[error("Email is already taken")]
    DuplicateEmail { email: String },

    #[error("{message}")]
    InvalidRequest { message: String },

    #[error("{message}")]
    ValidationError { message: String },

    #[error("Unauthorized request")]
    Unauthorized { reason: String },

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Invalid signature")]
    InvalidSignature,

    #[error("Payment gateway error: {message}")]
    PaymentGateway { message: String },

    #[error("Repository error: {source}")]
    Repository {
        #[from]
        source: RepositoryError,
    },

    #[error("Configuration error: {message}")]
    Configuration { message: String },
}

impl ServiceError {
    pub fn invalid_request(message: impl Into<String>) -> Self {
        ServiceError::InvalidRequest {
            message: message.into(),
        }
    }

    pub fn unauthorized(reason: impl Into<String>) -> Self {
        ServiceError::Unauthorized {
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("Constraint violation: {message}")]
    ConstraintViolation { message: String },

    /// A conditional write lost: the item exists already or is not in the expected state
    #[error("Conditional write rejected")]
    ConditionFailed,

    #[error("AWS SDK error: {message}")]
    AwsSdk { message: String },

    #[error("DynamoDB table not found: {table_name}. Ensure the table exists and IAM permissions are correct.")]
    TableNotFound { table_name: String },

    #[error("Invalid item data: {message}")]
    InvalidQuery { message: String },

    #[error("Timeout occurred during operation")]
    Timeout,
}

/// Input that fails a field rule
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("{field} is required")]
    RequiredField { field: String },

    #[error("Invalid {field} '{value}': {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    #[error("{field} must be at most {max_length} characters (got {actual_length})")]
    TooLong {
        field: String,
        max_length: usize,
        actual_length: usize,
    },

    #[error("{field} must be at least {min_length} characters (got {actual_length})")]
    TooShort {
        field: String,
        min_length: usize,
        actual_length: usize,
    },

    #[error("Invalid {field}: {expected}")]
    InvalidFormat { field: String, expected: String },

    #[error("{field} must be between {min} and {max} (got {value})")]
    OutOfRange {
        field: String,
        min: String,
        max: String,
        value: String,
    },
}

impl From<ValidationError> for ServiceError {
    fn from(err: ValidationError) -> Self {
        ServiceError::ValidationError {
            message: err.to_string(),
        }
    }
}

pub type ServiceResult<T> = Result<T, ServiceError>;
pub type RepositoryResult<T> = Result<T, RepositoryError>;
pub type ValidationResult<T> = Result<T, ValidationError>;
