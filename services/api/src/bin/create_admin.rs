//! services/api/src/bin/create_admin.rs
//!
//! Seeds the first administrator from `ADMIN_EMAIL`, `ADMIN_MOBILE`, `ADMIN_PAN`
//! and `ADMIN_PASSWORD`. Does nothing when an administrator already exists.

use api_lib::{
    adapters::DbAdapter,
    config::{AdminSeed, Config, ConfigError},
    error::ApiError,
    services::{profiles::NewAccount, ProfileService},
};
use chrono::Utc;
use client_portal_core::domain::Profile;
use client_portal_core::{Role, UserType};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Config::from_env()?;
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    let seed = AdminSeed::from_env()?
        .ok_or_else(|| ConfigError::MissingVar("ADMIN_PAN".to_string()))?;

    // --- 2. Connect to Database & Run Migrations ---
    if config.uses_memory_store() {
        return Err(ApiError::Internal(
            "create_admin needs a PostgreSQL DATABASE_URL".to_string(),
        ));
    }
    let db_pool = PgPoolOptions::new()
        .max_connections(1)
        .connect(&config.database_url)
        .await?;
    let db_adapter = DbAdapter::new(db_pool);
    db_adapter.run_migrations().await?;

    // --- 3. Create the administrator ---
    let profiles = ProfileService::new(Arc::new(db_adapter));
    let account = NewAccount {
        user_type: UserType::Individual,
        email: seed.email,
        mobile: seed.mobile,
        pan: seed.pan,
        password: seed.password,
        role: Role::Admin,
        profile: Profile::default(),
    };
    match profiles.ensure_admin(account, Utc::now().date_naive()).await? {
        Some(admin) => info!("Administrator {} created ({})", admin.pan, admin.id),
        None => info!("An administrator already exists; nothing to do."),
    }

    Ok(())
}
