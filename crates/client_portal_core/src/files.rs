//! Upload acceptance rules for documents and bill attachments.

use crate::error::{DomainError, DomainResult};

/// Hard ceiling for any single uploaded file.
pub const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// Extension / MIME pairs accepted for tax and GST documents.
const DOCUMENT_TYPES: &[(&str, &[&str])] = &[
    ("jpg", &["image/jpeg", "image/jpg"]),
    ("jpeg", &["image/jpeg", "image/jpg"]),
    ("png", &["image/png"]),
    ("gif", &["image/gif"]),
    ("pdf", &["application/pdf"]),
    ("doc", &["application/msword"]),
    (
        "docx",
        &["application/vnd.openxmlformats-officedocument.wordprocessingml.document"],
    ),
    ("xls", &["application/vnd.ms-excel"]),
    (
        "xlsx",
        &["application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"],
    ),
];

/// Lower-cased extension of `file_name`, without the dot.
pub fn extension_of(file_name: &str) -> Option<String> {
    let (stem, ext) = file_name.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

/// Extension a stored file gets, chosen from its accepted MIME type rather
/// than the name the client sent.
pub fn stored_extension(mime_type: &str) -> Option<&'static str> {
    let mime = mime_type.to_ascii_lowercase();
    DOCUMENT_TYPES
        .iter()
        .find(|(_, mimes)| mimes.iter().any(|m| *m == mime))
        .map(|(ext, _)| *ext)
}

fn check_size(size: usize) -> DomainResult<()> {
    if size == 0 {
        return Err(DomainError::NoFile);
    }
    if size > MAX_UPLOAD_BYTES {
        return Err(DomainError::UnsupportedFile(
            "File exceeds the 10 MB limit".to_string(),
        ));
    }
    Ok(())
}

/// Images, PDF, Word and Excel files up to 10 MB; extension and MIME must agree.
pub fn check_document_upload(file_name: &str, mime_type: &str, size: usize) -> DomainResult<()> {
    check_size(size)?;
    let mime = mime_type.to_ascii_lowercase();
    let accepted = extension_of(file_name)
        .and_then(|ext| DOCUMENT_TYPES.iter().find(|(e, _)| *e == ext))
        .is_some_and(|(_, mimes)| mimes.iter().any(|m| *m == mime));
    if !accepted {
        return Err(DomainError::UnsupportedFile(
            "Only image, PDF, and document files are allowed!".to_string(),
        ));
    }
    Ok(())
}

/// Bill attachments must be PDFs.
pub fn check_bill_attachment(mime_type: &str, size: usize) -> DomainResult<()> {
    check_size(size)?;
    if !mime_type.eq_ignore_ascii_case("application/pdf") {
        return Err(DomainError::UnsupportedFile(
            "Only PDF files are allowed".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_office_formats_by_their_real_mime_types() {
        assert!(check_document_upload("itr.pdf", "application/pdf", 10).is_ok());
        assert!(check_document_upload("ledger.XLS", "application/vnd.ms-excel", 10).is_ok());
        assert!(check_document_upload(
            "notes.docx",
            "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
            10
        )
        .is_ok());
    }

    #[test]
    fn rejects_mismatched_or_unknown_types() {
        assert!(matches!(
            check_document_upload("script.exe", "application/octet-stream", 10),
            Err(DomainError::UnsupportedFile(_))
        ));
        assert!(matches!(
            check_document_upload("photo.png", "application/pdf", 10),
            Err(DomainError::UnsupportedFile(_))
        ));
        assert!(matches!(
            check_document_upload("noextension", "application/pdf", 10),
            Err(DomainError::UnsupportedFile(_))
        ));
    }

    #[test]
    fn size_limits() {
        assert!(check_document_upload("a.pdf", "application/pdf", MAX_UPLOAD_BYTES).is_ok());
        assert!(matches!(
            check_document_upload("a.pdf", "application/pdf", MAX_UPLOAD_BYTES + 1),
            Err(DomainError::UnsupportedFile(_))
        ));
        assert!(matches!(
            check_bill_attachment("application/pdf", 0),
            Err(DomainError::NoFile)
        ));
    }

    #[test]
    fn stored_extension_follows_the_mime_type() {
        assert_eq!(stored_extension("application/pdf"), Some("pdf"));
        assert_eq!(stored_extension("IMAGE/JPEG"), Some("jpg"));
        assert_eq!(stored_extension("application/vnd.ms-excel"), Some("xls"));
        assert_eq!(stored_extension("text/html"), None);
    }

    #[test]
    fn bill_attachments_are_pdf_only() {
        assert!(check_bill_attachment("application/pdf", 1).is_ok());
        assert!(check_bill_attachment("image/png", 1).is_err());
    }
}
