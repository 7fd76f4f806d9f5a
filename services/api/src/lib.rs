//! services/api/src/lib.rs
//!
//! The `api` service as a library: adapters for the core ports, the
//! application services and the HTTP layer. The binaries in `src/bin`
//! and the integration tests build on this crate.

pub mod adapters;
pub mod config;
pub mod error;
pub mod services;
pub mod validation;
pub mod web;
