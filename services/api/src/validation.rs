//! services/api/src/validation.rs
//!
//! Custom `validator` rules for identity fields, shared by the request
//! payloads and the administrator seed, and the mapping of `validator`
//! failures onto the portal's field errors.

use client_portal_core::validation::{is_valid_mobile, is_valid_pan, normalize_pan, FieldError};
use validator::{ValidationError, ValidationErrors};

/// Any casing is accepted; PANs are upper-cased before they are stored.
pub fn pan_format(pan: &str) -> Result<(), ValidationError> {
    if is_valid_pan(&normalize_pan(pan)) {
        Ok(())
    } else {
        Err(ValidationError::new("pan_format"))
    }
}

pub fn mobile_format(mobile: &str) -> Result<(), ValidationError> {
    if is_valid_mobile(mobile.trim()) {
        Ok(())
    } else {
        Err(ValidationError::new("mobile_format"))
    }
}

/// One entry per failed rule, ordered by field name.
pub fn field_errors(errors: &ValidationErrors) -> Vec<FieldError> {
    let mut fields: Vec<FieldError> = errors
        .field_errors()
        .into_iter()
        .flat_map(|(field, failures)| {
            failures.iter().map(move |failure| {
                let message = failure
                    .message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| format!("Invalid {}", field));
                FieldError::new(&field, message)
            })
        })
        .collect();
    fields.sort_by(|a, b| a.field.cmp(&b.field));
    fields
}
