//! HTTP API for the evaluation platform
//!
//! Exposes:
//! - Directory and login endpoints
//! - Form lifecycle (create, regenerate, duplicate, delete)
//! - Token-gated evaluation access and submission
//! - Reporting, notifications, and admin utilities

pub mod server;

pub use server::{ApiServer, ApiServerConfig};
