//! services/api/src/services/mod.rs
//!
//! Application services. Each one holds the ports it needs and turns a
//! request-level operation into domain calls and store reads and writes.

pub mod admin;
pub mod billing;
pub mod credentials;
pub mod documents;
pub mod identity;
pub mod profiles;

pub use admin::AdminService;
pub use billing::BillingService;
pub use credentials::TokenIssuer;
pub use documents::DocumentService;
pub use identity::{IdentityPolicy, IdentityService};
pub use profiles::ProfileService;
