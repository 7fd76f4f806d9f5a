//! services/api/src/services/documents.rs
//!
//! Upload, listing, audited retrieval and deletion of taxpayer documents.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use client_portal_core::domain::{
    AccessAction, AccessLogEntry, Document, DocumentCategory, DocumentQuery, NewDocument,
};
use client_portal_core::error::{DomainError, DomainResult};
use client_portal_core::files::check_document_upload;
use client_portal_core::ports::{ByteStream, DatabaseService, FileStorage, PortError};
use client_portal_core::Principal;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

/// Storage area for document files.
pub const DOCUMENT_AREA: &str = "documents";

/// One file received in a multipart upload.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub file_name: String,
    pub mime_type: String,
    pub data: Bytes,
}

#[derive(Debug, Clone)]
pub struct DocumentUpload {
    pub owner_id: Uuid,
    pub category: DocumentCategory,
    pub document_type: String,
    pub financial_year: String,
    pub description: Option<String>,
    pub file: Option<UploadedFile>,
}

pub struct DocumentService {
    db: Arc<dyn DatabaseService>,
    storage: Arc<dyn FileStorage>,
}

fn document_not_found(e: PortError) -> DomainError {
    match e {
        PortError::NotFound(_) => DomainError::NotFound("Document"),
        other => other.into(),
    }
}

impl DocumentService {
    pub fn new(db: Arc<dyn DatabaseService>, storage: Arc<dyn FileStorage>) -> Self {
        Self { db, storage }
    }

    /// Stores the file and its metadata. `admin_upload` marks documents only an
    /// administrator may later delete.
    pub async fn upload(
        &self,
        uploader: &Principal,
        upload: DocumentUpload,
        admin_upload: bool,
    ) -> DomainResult<Document> {
        match self.db.get_user(upload.owner_id).await {
            Ok(_) => {}
            Err(PortError::NotFound(_)) => return Err(DomainError::NotFound("User")),
            Err(e) => return Err(e.into()),
        }

        let file = upload.file.ok_or(DomainError::NoFile)?;
        check_document_upload(&file.file_name, &file.mime_type, file.data.len())?;

        let document_type = upload.document_type.trim().to_string();
        if document_type.is_empty() {
            return Err(DomainError::invalid("documentType", "Document type is required"));
        }
        let financial_year = upload.financial_year.trim().to_string();
        if financial_year.is_empty() {
            return Err(DomainError::invalid(
                "financialYear",
                "Financial year is required",
            ));
        }

        let stored = self
            .storage
            .save(DOCUMENT_AREA, &file.file_name, &file.mime_type, file.data)
            .await?;
        let key = stored.key.clone();

        let created = self
            .db
            .create_document(NewDocument {
                user_id: upload.owner_id,
                financial_year,
                category: upload.category,
                document_type,
                description: upload.description.filter(|d| !d.trim().is_empty()),
                file: stored,
                uploaded_by: uploader.user_id,
                is_admin_upload: admin_upload,
            })
            .await;

        match created {
            Ok(document) => {
                info!(
                    "Document {} uploaded for user {} by {}",
                    document.id, document.user_id, uploader.user_id
                );
                Ok(document)
            }
            Err(e) => {
                if let Err(cleanup) = self.storage.remove(&key).await {
                    warn!("Could not remove orphaned file {}: {}", key, cleanup);
                }
                Err(e.into())
            }
        }
    }

    /// Newest first. Non-admins only ever see their own documents.
    pub async fn list(&self, requester: &Principal, query: DocumentQuery) -> DomainResult<Vec<Document>> {
        let query = DocumentQuery {
            user_id: requester.owner_scope(query.user_id),
            ..query
        };
        Ok(self.db.list_documents(query).await?)
    }

    /// Records the access and opens the file. Documents of other users are reported
    /// as missing to non-admins.
    pub async fn open(
        &self,
        requester: &Principal,
        document_id: Uuid,
        action: AccessAction,
        now: DateTime<Utc>,
    ) -> DomainResult<(Document, ByteStream)> {
        let document = self
            .db
            .get_document(document_id)
            .await
            .map_err(document_not_found)?;
        if !requester.can_read(document.user_id) {
            return Err(DomainError::NotFound("Document"));
        }

        self.db
            .append_access_log(
                document.id,
                AccessLogEntry {
                    user_id: requester.user_id,
                    action,
                    timestamp: now,
                },
            )
            .await?;

        let stream = self.storage.open(&document.file.key).await?;
        info!("Document {} opened for {} by user {}", document.id, action, requester.user_id);
        Ok((document, stream))
    }

    /// Only administrator uploads can be deleted; the stored file goes first.
    pub async fn delete(&self, document_id: Uuid) -> DomainResult<()> {
        let document = self
            .db
            .get_document(document_id)
            .await
            .map_err(document_not_found)?;
        if !document.is_admin_upload {
            return Err(DomainError::Forbidden("Only admin can delete this document"));
        }
        self.storage.remove(&document.file.key).await?;
        self.db
            .delete_document(document.id)
            .await
            .map_err(document_not_found)?;
        info!("Document {} deleted", document.id);
        Ok(())
    }
}
