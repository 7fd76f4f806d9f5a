mod common;

use axum::http::{header, Method, StatusCode};
use client_portal_core::ports::DatabaseService;
use client_portal_core::Role;
use common::{Multipart, Reply, TestApp};

fn itr_form() -> Multipart {
    Multipart::new()
        .text("category", "income-tax")
        .text("documentType", "Income Tax Computation")
        .text("financialYear", "2024-25")
        .text("description", "Computation sheet")
        .file("document", "computation.pdf", "application/pdf", b"%PDF-1.7 itr")
}

async fn self_upload(app: &TestApp, token: &str) -> Reply {
    app.multipart(Method::POST, "/api/documents", token, itr_form())
        .await
}

/// The storage key behind an uploaded document.
async fn key_of(app: &TestApp, document: &serde_json::Value) -> String {
    let id = document["id"].as_str().unwrap().parse().unwrap();
    app.db.get_document(id).await.unwrap().file.key
}

#[tokio::test]
async fn clients_upload_and_list_their_documents() {
    let app = TestApp::new();
    let (client, token) = app.user_with_token("CLIEN2222B", Role::User).await;

    let reply = self_upload(&app, &token).await;
    assert_eq!(reply.status, StatusCode::CREATED);
    let body = reply.json();
    assert_eq!(body["message"], "Document uploaded successfully");
    let document = &body["document"];
    assert_eq!(document["userId"], client.id.to_string());
    assert_eq!(document["isAdminUpload"], false);
    assert_eq!(document["fileName"], "computation.pdf");
    assert_eq!(document["mimeType"], "application/pdf");
    assert_eq!(
        document["fileUrl"],
        format!("/api/documents/{}/view", document["id"].as_str().unwrap())
    );
    assert!(app.storage.contains(&key_of(&app, document).await).await);

    let listed = app.get("/api/documents?category=income-tax", &token).await.json();
    assert_eq!(listed.as_array().unwrap().len(), 1);
    let gst = app.get("/api/documents?category=gst", &token).await.json();
    assert!(gst.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn uploads_are_checked() {
    let app = TestApp::new();
    let (_, token) = app.user_with_token("CLIEN2222B", Role::User).await;

    let missing = app
        .multipart(
            Method::POST,
            "/api/documents",
            &token,
            Multipart::new()
                .text("category", "gst")
                .text("documentType", "GSTR1")
                .text("financialYear", "2024-25"),
        )
        .await;
    assert_eq!(missing.status, StatusCode::BAD_REQUEST);
    assert_eq!(missing.json()["message"], "No file uploaded");

    let executable = app
        .multipart(
            Method::POST,
            "/api/documents",
            &token,
            Multipart::new()
                .text("category", "gst")
                .text("documentType", "GSTR1")
                .text("financialYear", "2024-25")
                .file("document", "tool.exe", "application/octet-stream", b"MZ"),
        )
        .await;
    assert_eq!(executable.status, StatusCode::BAD_REQUEST);
    assert_eq!(
        executable.json()["message"],
        "Only image, PDF, and document files are allowed!"
    );

    let untyped = app
        .multipart(
            Method::POST,
            "/api/documents",
            &token,
            Multipart::new()
                .text("category", "gst")
                .text("documentType", "  ")
                .text("financialYear", "2024-25")
                .file("document", "gstr1.pdf", "application/pdf", b"%PDF"),
        )
        .await;
    assert_eq!(untyped.status, StatusCode::BAD_REQUEST);
    assert_eq!(untyped.json()["message"], "documentType is required");
}

#[tokio::test]
async fn type_and_year_labels_are_stored_as_given() {
    let app = TestApp::new();
    let (_, token) = app.user_with_token("CLIEN2222B", Role::User).await;

    let reply = app
        .multipart(
            Method::POST,
            "/api/documents",
            &token,
            Multipart::new()
                .text("category", "gst")
                .text("documentType", "GSTR-9 Annual Return")
                .text("financialYear", "2024-2025")
                .file("document", "gstr9.pdf", "application/pdf", b"%PDF"),
        )
        .await;
    assert_eq!(reply.status, StatusCode::CREATED);
    let document = &reply.json()["document"];
    assert_eq!(document["documentType"], "GSTR-9 Annual Return");
    assert_eq!(document["financialYear"], "2024-2025");

    let listed = app
        .get("/api/documents?financialYear=2024-2025", &token)
        .await
        .json();
    assert_eq!(listed.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn only_admin_uploads_can_be_deleted() {
    let app = TestApp::new();
    let (_, admin) = app.user_with_token("ADMIN1111A", Role::Admin).await;
    let (client, token) = app.user_with_token("CLIEN2222B", Role::User).await;

    let own = self_upload(&app, &token).await.json();
    let own_id = own["document"]["id"].as_str().unwrap().to_string();

    let by_client = app
        .call(Method::DELETE, &format!("/api/documents/{own_id}"), Some(&token), None)
        .await;
    assert_eq!(by_client.status, StatusCode::FORBIDDEN);

    let by_admin = app
        .call(Method::DELETE, &format!("/api/documents/{own_id}"), Some(&admin), None)
        .await;
    assert_eq!(by_admin.status, StatusCode::FORBIDDEN);
    assert_eq!(by_admin.json()["message"], "Only admin can delete this document");

    let uploaded = app
        .multipart(
            Method::POST,
            "/api/documents/upload",
            &admin,
            itr_form().text("userId", &client.id.to_string()),
        )
        .await;
    assert_eq!(uploaded.status, StatusCode::CREATED);
    let document = uploaded.json()["document"].clone();
    assert_eq!(document["isAdminUpload"], true);
    assert_eq!(document["userId"], client.id.to_string());
    let key = key_of(&app, &document).await;
    assert!(app.storage.contains(&key).await);

    let deleted = app
        .call(
            Method::DELETE,
            &format!("/api/documents/{}", document["id"].as_str().unwrap()),
            Some(&admin),
            None,
        )
        .await;
    assert_eq!(deleted.status, StatusCode::OK);
    assert_eq!(deleted.json()["message"], "Document deleted successfully");
    assert!(!app.storage.contains(&key).await);
}

#[tokio::test]
async fn view_and_download_are_logged() {
    let app = TestApp::new();
    let (_, admin) = app.user_with_token("ADMIN1111A", Role::Admin).await;
    let (client, token) = app.user_with_token("CLIEN2222B", Role::User).await;
    let (_, stranger) = app.user_with_token("STRAN3333C", Role::User).await;

    let document = self_upload(&app, &token).await.json()["document"].clone();
    let id = document["id"].as_str().unwrap().to_string();

    let view = app.get(&format!("/api/documents/{id}/view"), &token).await;
    assert_eq!(view.status, StatusCode::OK);
    assert_eq!(view.bytes, b"%PDF-1.7 itr");
    assert!(view.headers[header::CONTENT_DISPOSITION]
        .to_str()
        .unwrap()
        .starts_with("inline"));

    let download = app.get(&format!("/api/documents/{id}/download"), &admin).await;
    assert_eq!(download.status, StatusCode::OK);
    assert_eq!(
        download.headers[header::CONTENT_DISPOSITION],
        "attachment; filename=\"computation.pdf\""
    );

    let hidden = app.get(&format!("/api/documents/{id}/view"), &stranger).await;
    assert_eq!(hidden.status, StatusCode::NOT_FOUND);

    let listed = app.get("/api/documents", &token).await.json();
    let logs = listed[0]["accessLogs"].as_array().unwrap().clone();
    assert_eq!(logs.len(), 2);
    let actions: Vec<&str> = logs.iter().filter_map(|l| l["action"].as_str()).collect();
    assert!(actions.contains(&"view"));
    assert!(actions.contains(&"download"));
    assert!(logs
        .iter()
        .any(|l| l["userId"] == client.id.to_string()));
}

#[tokio::test]
async fn categories_are_a_static_catalog() {
    let app = TestApp::new();
    let (_, token) = app.user_with_token("CLIEN2222B", Role::User).await;

    let first = app.get("/api/documents/categories", &token).await;
    let second = app.get("/api/documents/categories", &token).await;
    assert_eq!(first.status, StatusCode::OK);
    assert_eq!(first.json(), second.json());

    let catalog = first.json();
    assert_eq!(
        catalog["gst"]["types"],
        serde_json::json!(["GSTR3B", "GSTR1", "Others"])
    );
    assert!(catalog["income-tax"]["types"]
        .as_array()
        .unwrap()
        .iter()
        .any(|t| t == "Balance Sheet"));
}
