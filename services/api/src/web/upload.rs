//! services/api/src/web/upload.rs
//!
//! Reads a `multipart/form-data` body into its text fields and at most one file.

use axum::extract::Multipart;
use chrono::{DateTime, NaiveDate, Utc};
use std::collections::HashMap;
use std::str::FromStr;

use crate::error::ApiError;
use crate::services::documents::UploadedFile;

/// The parts of a multipart form the portal cares about.
#[derive(Debug, Default)]
pub struct UploadForm {
    fields: HashMap<String, String>,
    pub file: Option<UploadedFile>,
}

impl UploadForm {
    /// Drains `multipart`. The part named `file_field` becomes the file; parts
    /// submitted without a filename (or with an empty one) are ignored.
    pub async fn read(mut multipart: Multipart, file_field: &str) -> Result<Self, ApiError> {
        let mut form = UploadForm::default();
        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| ApiError::BadRequest(format!("Failed to read multipart data: {}", e)))?
        {
            let name = field.name().unwrap_or_default().to_string();
            if name == file_field {
                let file_name = field.file_name().unwrap_or_default().to_string();
                let mime_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::BadRequest(format!("Failed to read file bytes: {}", e)))?;
                if !file_name.is_empty() {
                    form.file = Some(UploadedFile {
                        file_name,
                        mime_type,
                        data,
                    });
                }
            } else {
                let value = field
                    .text()
                    .await
                    .map_err(|e| ApiError::BadRequest(format!("Invalid field '{}': {}", name, e)))?;
                form.fields.insert(name, value);
            }
        }
        Ok(form)
    }

    /// The trimmed value of a text field; blank counts as absent.
    pub fn text(&self, name: &str) -> Option<String> {
        self.fields
            .get(name)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    }

    pub fn require(&self, name: &str) -> Result<String, ApiError> {
        self.text(name)
            .ok_or_else(|| ApiError::BadRequest(format!("{} is required", name)))
    }

    /// Parses an optional field, rejecting values that do not parse.
    pub fn parse<T: FromStr>(&self, name: &str) -> Result<Option<T>, ApiError> {
        self.text(name)
            .map(|v| {
                v.parse::<T>()
                    .map_err(|_| ApiError::BadRequest(format!("Invalid {}", name)))
            })
            .transpose()
    }

    pub fn parse_required<T: FromStr>(&self, name: &str) -> Result<T, ApiError> {
        self.parse(name)?
            .ok_or_else(|| ApiError::BadRequest(format!("{} is required", name)))
    }
}

/// Accepts an RFC 3339 timestamp or a bare `YYYY-MM-DD` (taken as midnight UTC).
pub fn parse_timestamp(value: &str, field: &str) -> Result<DateTime<Utc>, ApiError> {
    let value = value.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(value) {
        return Ok(ts.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
        .ok_or_else(|| ApiError::BadRequest(format!("Invalid {}", field)))
}
