//! Shared helpers for storage-backed tests

use crate::storage::libsql::{ConnectionMode, LibsqlStore};
use std::sync::Arc;

/// Create a fresh in-memory store with all migrations applied
pub async fn create_test_store() -> Arc<LibsqlStore> {
    let store = LibsqlStore::connect(ConnectionMode::InMemory, true)
        .await
        .expect("failed to create in-memory test store");
    Arc::new(store)
}
