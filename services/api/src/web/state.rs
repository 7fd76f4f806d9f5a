//! services/api/src/web/state.rs
//!
//! Defines the application's shared state.

use crate::config::Config;
use crate::services::{
    AdminService, BillingService, DocumentService, IdentityPolicy, IdentityService,
    ProfileService, TokenIssuer,
};
use crate::web::csrf::{CsrfTokenStore, InMemoryCsrfStore};
use crate::web::rate_limit::RateLimiter;
use chrono::Duration;
use client_portal_core::ports::{DatabaseService, EmailService, FileStorage};
use std::sync::Arc;
use std::time::Duration as StdDuration;

//=========================================================================================
// AppState (Shared Across All Requests)
//=========================================================================================

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub db: Arc<dyn DatabaseService>,
    pub storage: Arc<dyn FileStorage>,
    pub csrf: Arc<dyn CsrfTokenStore>,
    pub global_limiter: Arc<RateLimiter>,
    pub auth_limiter: Arc<RateLimiter>,
    pub identity: Arc<IdentityService>,
    pub profiles: Arc<ProfileService>,
    pub documents: Arc<DocumentService>,
    pub billing: Arc<BillingService>,
    pub admin: Arc<AdminService>,
}

impl AppState {
    /// Wires the services on top of the given adapters.
    pub fn new(
        config: Arc<Config>,
        db: Arc<dyn DatabaseService>,
        storage: Arc<dyn FileStorage>,
        mailer: Arc<dyn EmailService>,
    ) -> Self {
        let tokens = TokenIssuer::new(&config.jwt_secret, Duration::hours(config.jwt_ttl_hours));
        let window = StdDuration::from_secs(config.rate_limit_window_secs);

        Self {
            csrf: Arc::new(InMemoryCsrfStore::new(StdDuration::from_secs(
                config.csrf_token_ttl_secs,
            ))),
            global_limiter: Arc::new(RateLimiter::new(config.rate_limit_max, window)),
            auth_limiter: Arc::new(RateLimiter::new(config.auth_rate_limit_max, window)),
            identity: Arc::new(IdentityService::new(
                db.clone(),
                mailer,
                tokens,
                IdentityPolicy::from_config(&config),
            )),
            profiles: Arc::new(ProfileService::new(db.clone())),
            documents: Arc::new(DocumentService::new(db.clone(), storage.clone())),
            billing: Arc::new(BillingService::new(db.clone(), storage.clone())),
            admin: Arc::new(AdminService::new(db.clone())),
            config,
            db,
            storage,
        }
    }
}
