//! services/api/src/bin/api.rs

use api_lib::{
    adapters::{
        DbAdapter, HttpEmailAdapter, LocalFileStorage, LogEmailAdapter, MemoryDatabase,
    },
    config::{AdminSeed, Config},
    error::ApiError,
    services::profiles::NewAccount,
    web::{build_router, AppState},
};
use chrono::Utc;
use client_portal_core::domain::Profile;
use client_portal_core::ports::{DatabaseService, EmailService, FileStorage};
use client_portal_core::{Role, UserType};
use sqlx::postgres::PgPoolOptions;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    // --- 1. Settings and logging ---
    let config = Arc::new(Config::from_env()?);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Client portal configuration loaded");

    // --- 2. Record store ---
    let db: Arc<dyn DatabaseService> = if config.uses_memory_store() {
        warn!("DATABASE_URL is memory://; records will be lost on shutdown.");
        Arc::new(MemoryDatabase::new())
    } else {
        info!("Connecting to Postgres");
        let db_pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(&config.database_url)
            .await?;
        let db_adapter = DbAdapter::new(db_pool);
        info!("Applying migrations");
        db_adapter.run_migrations().await?;
        info!("Schema is up to date");
        Arc::new(db_adapter)
    };

    // --- 3. File storage and mail ---
    tokio::fs::create_dir_all(&config.upload_dir).await?;
    let storage: Arc<dyn FileStorage> = Arc::new(LocalFileStorage::new(config.upload_dir.clone()));
    info!("Storing uploads under {}", config.upload_dir.display());

    let mailer: Arc<dyn EmailService> = match &config.mail_relay_url {
        Some(url) => {
            info!("Sending email through relay {}", url);
            Arc::new(HttpEmailAdapter::new(url.clone(), config.mail_from.clone())?)
        }
        None => {
            warn!("MAIL_RELAY_URL not set; outgoing email will only be logged.");
            Arc::new(LogEmailAdapter)
        }
    };

    // --- 4. Services ---
    let app_state = Arc::new(AppState::new(config.clone(), db, storage, mailer));

    // An in-memory store starts empty, so seed the administrator here.
    if config.uses_memory_store() {
        if let Some(seed) = AdminSeed::from_env()? {
            let account = NewAccount {
                user_type: UserType::Individual,
                email: seed.email,
                mobile: seed.mobile,
                pan: seed.pan,
                password: seed.password,
                role: Role::Admin,
                profile: Profile::default(),
            };
            if let Some(admin) = app_state
                .profiles
                .ensure_admin(account, Utc::now().date_naive())
                .await?
            {
                info!("Seeded administrator {}", admin.pan);
            }
        }
    }

    // --- 5. Routes ---
    let app = build_router(app_state)?;

    // --- 6. Serve ---
    info!("Portal listening on {}", config.bind_address);
    info!("API docs at http://{}/swagger-ui", config.bind_address);
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
