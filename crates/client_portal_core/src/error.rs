//! crates/client_portal_core/src/error.rs
//!
//! The failures an operation can report to its caller, independent of transport.

use crate::ports::PortError;
use crate::validation::FieldError;

#[derive(Debug, thiserror::Error)]
pub enum DomainError {
    #[error("validation failed")]
    Validation(Vec<FieldError>),

    #[error("User with this email, PAN, or mobile number already exists")]
    DuplicateIdentity,

    #[error("You must be at least 18 years old to register.")]
    AgeRestriction,

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("Account is deactivated")]
    Deactivated,

    #[error("Invalid PAN or password")]
    InvalidCredentials,

    #[error("Account is temporarily locked. Please try again later.")]
    AccountLocked,

    #[error("Invalid or expired OTP")]
    InvalidOrExpiredOtp,

    #[error("Please wait 30 seconds before requesting a new OTP")]
    OtpCooldown,

    #[error("Invalid or expired token")]
    InvalidOrExpiredToken,

    #[error("No file uploaded")]
    NoFile,

    #[error("{0}")]
    UnsupportedFile(String),

    #[error("{0}")]
    Forbidden(&'static str),

    #[error("Particulars is required")]
    MissingParticulars,

    #[error("A bill with this bill number already exists")]
    DuplicateBillNumber,

    #[error("Email could not be sent")]
    Delivery,

    #[error(transparent)]
    Port(#[from] PortError),
}

impl DomainError {
    /// Shorthand for a single-field validation failure.
    pub fn invalid(field: &str, message: impl Into<String>) -> Self {
        Self::Validation(vec![FieldError::new(field, message)])
    }
}

pub type DomainResult<T> = Result<T, DomainError>;
