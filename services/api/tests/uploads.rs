mod common;

use api_lib::{
    adapters::{LocalFileStorage, MemoryDatabase},
    web::{build_router, csrf::CsrfTokenStore, AppState},
};
use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use chrono::Utc;
use client_portal_core::Role;
use common::{seed_account, send_to, test_config, CapturingMailer, Multipart, Reply};
use std::{path::PathBuf, sync::Arc};
use uuid::Uuid;

/// The router over real on-disk storage, so the static mount can be exercised.
struct DiskApp {
    router: Router,
    state: Arc<AppState>,
    root: PathBuf,
}

impl DiskApp {
    fn new() -> Self {
        let root = std::env::temp_dir().join(format!("client-portal-uploads-{}", Uuid::new_v4()));
        let mut config = test_config();
        config.upload_dir = root.clone();
        let state = Arc::new(AppState::new(
            Arc::new(config),
            Arc::new(MemoryDatabase::new()),
            Arc::new(LocalFileStorage::new(root.clone())),
            Arc::new(CapturingMailer::default()),
        ));
        let router = build_router(state.clone()).unwrap();
        Self {
            router,
            state,
            root,
        }
    }

    async fn token(&self, pan: &str, role: Role) -> (Uuid, String) {
        let user = seed_account(&self.state, pan, role).await;
        let token = self.state.identity.tokens().issue(&user, Utc::now()).unwrap();
        (user.id, token)
    }

    async fn post_form(&self, uri: &str, token: &str, form: Multipart) -> Reply {
        let (content_type, body) = form.finish();
        let request = Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header(header::AUTHORIZATION, format!("Bearer {token}"))
            .header("x-csrf-token", self.state.csrf.issue())
            .header(header::CONTENT_TYPE, content_type)
            .body(Body::from(body))
            .unwrap();
        send_to(&self.router, request).await
    }

    /// An anonymous GET.
    async fn fetch(&self, uri: &str) -> Reply {
        let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
        send_to(&self.router, request).await
    }
}

impl Drop for DiskApp {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.root);
    }
}

#[tokio::test]
async fn bill_attachments_are_always_served_as_pdf() {
    let app = DiskApp::new();
    let (_, admin) = app.token("ADMIN1111A", Role::Admin).await;
    let (client_id, _) = app.token("CLIEN2222B", Role::User).await;

    let created = app
        .post_form(
            "/api/billing",
            &admin,
            Multipart::new()
                .text("userId", &client_id.to_string())
                .text("particulars", "Audit fees")
                .text("billNumber", "INV-1")
                .text("amount", "100")
                .text("dueDate", "2025-03-31")
                .file("billFile", "invoice.html", "application/pdf", b"%PDF-1.4 bill"),
        )
        .await;
    assert_eq!(created.status, StatusCode::CREATED);
    let bill = created.json();
    assert_eq!(bill["billFile"]["fileName"], "invoice.html");
    let url = bill["billFile"]["fileUrl"].as_str().unwrap().to_string();
    assert!(url.starts_with("/uploads/bills/"), "{url}");
    assert!(url.ends_with(".pdf"), "{url}");

    let served = app.fetch(&url).await;
    assert_eq!(served.status, StatusCode::OK);
    assert_eq!(served.headers[header::CONTENT_TYPE], "application/pdf");
    assert_eq!(served.bytes, b"%PDF-1.4 bill");
}

#[tokio::test]
async fn documents_are_not_served_statically() {
    let app = DiskApp::new();
    let (_, token) = app.token("CLIEN2222B", Role::User).await;

    let uploaded = app
        .post_form(
            "/api/documents",
            &token,
            Multipart::new()
                .text("category", "income-tax")
                .text("documentType", "Income Tax Computation")
                .text("financialYear", "2024-25")
                .file("document", "computation.pdf", "application/pdf", b"%PDF-1.7 itr"),
        )
        .await;
    assert_eq!(uploaded.status, StatusCode::CREATED);
    let document = uploaded.json()["document"].clone();

    let stored: Vec<String> = std::fs::read_dir(app.root.join("documents"))
        .unwrap()
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.file_name().to_string_lossy().into_owned())
        .collect();
    assert_eq!(stored.len(), 1);

    let direct = app.fetch(&format!("/uploads/documents/{}", stored[0])).await;
    assert_eq!(direct.status, StatusCode::NOT_FOUND);

    // The advertised URL goes through the bearer check.
    let advertised = app.fetch(document["fileUrl"].as_str().unwrap()).await;
    assert_eq!(advertised.status, StatusCode::UNAUTHORIZED);
}
