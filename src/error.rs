use thiserror::Error;

/// Failures raised by the discount workflow components.
///
/// Lookup misses are not errors: components return `Option`/`false` for
/// "nothing there" and reserve these variants for real failures.
#[derive(Debug, Error)]
pub enum DiscountError {
    #[error("invalid email address: {0}")]
    InvalidEmail(String),

    #[error("could not find an unused coupon code after {attempts} attempts")]
    CodeGenerationExhausted { attempts: u32 },

    #[error("coupon creation failed: {0}")]
    CouponCreationFailed(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("email dispatch failed: {0}")]
    EmailDispatchFailed(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("persistence failed: {0}")]
    PersistenceFailed(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("a discount was already issued to {email} (coupon {code})")]
    AlreadyIssued { email: String, code: String },
}

impl From<rusqlite::Error> for DiscountError {
    fn from(err: rusqlite::Error) -> Self {
        DiscountError::PersistenceFailed(Box::new(err))
    }
}

impl From<mobc::Error<rusqlite::Error>> for DiscountError {
    fn from(err: mobc::Error<rusqlite::Error>) -> Self {
        DiscountError::PersistenceFailed(Box::new(err))
    }
}

/// Reasons a coupon code can fail format validation. Each check has its
/// own variant so callers can report the exact problem.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodeFormatError {
    #[error("code length {actual} outside the allowed range {min}-{max}")]
    InvalidLength {
        actual: usize,
        min: usize,
        max: usize,
    },

    #[error("code does not start with the configured prefix '{expected}'")]
    InvalidPrefix { expected: String },

    #[error("code contains characters outside the configured alphabet")]
    InvalidCharacters,
}
