//! services/api/src/bin/openapi.rs
//!
//! Writes the OpenAPI 3 document for the portal's REST API to a file, by
//! default `openapi.json`, or to the path given as the first argument.

use api_lib::web::ApiDoc;
use utoipa::OpenApi;

fn write_document(path: &str) -> std::io::Result<()> {
    let json = ApiDoc::openapi()
        .to_pretty_json()
        .map_err(std::io::Error::other)?;
    std::fs::write(path, json)
}

fn main() -> std::io::Result<()> {
    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "openapi.json".to_string());
    write_document(&path)?;
    println!("Wrote the portal API description to {path}");
    Ok(())
}
