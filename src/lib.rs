//! Vantage - Multi-Party Evaluation Platform
//!
//! A small HTTP service for running structured evaluations: a form names
//! subjects and the evaluators positioned around each of them, every
//! question is scoped to a role, and each participant reaches their share
//! of the form through an unguessable access token.
//!
//! # Architecture
//!
//! The system is organized into a few layers:
//! - **Types**: Core documents (Form, Assignment, EvaluationResponse, ...)
//! - **Fanout**: Pure form-to-assignments expansion
//! - **Storage**: libSQL persistence behind the `Store` trait
//! - **Services**: Evaluation access/submission and analytics
//! - **API**: The axum HTTP surface
//!
//! # Example
//!
//! ```ignore
//! use vantage_core::{ApiServer, ApiServerConfig, LibsqlStore, SessionSigner};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let store = Arc::new(LibsqlStore::open_local("vantage.db").await?);
//!     vantage_core::seed::seed_users(store.as_ref()).await?;
//!
//!     let sessions = SessionSigner::new(b"secret".to_vec(), 24);
//!     let server = ApiServer::new(ApiServerConfig::default(), store, sessions);
//!     server.serve().await
//! }
//! ```

pub mod analytics;
pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod evaluation;
pub mod fanout;
pub mod seed;
pub mod storage;
pub mod token;
pub mod types;

// Re-export commonly used types
pub use api::{ApiServer, ApiServerConfig};
pub use auth::{CredentialVerifier, PasswordHash, SessionSigner, Sha256Verifier};
pub use config::AppConfig;
pub use error::{Result, VantageError};
pub use storage::{
    libsql::{ConnectionMode, LibsqlStore},
    EntityCounts, Store,
};
pub use token::AccessToken;
pub use types::{
    Assignment, AssignmentId, AssignmentStatus, EvaluationResponse, Form, FormId, FormStatus,
    Notification, NotificationId, NotificationKind, ParticipantType, Question, QuestionType,
    ResponseId, SubjectEntry, User, UserId,
};
