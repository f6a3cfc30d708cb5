//! Shared helpers for the claim-graph conformance test suite.
//!
//! Provides [`backends`], which opens one fresh instance of every
//! [`Storage`] implementation, so each contract test can be run against all
//! of them, and [`client`], which wraps a backend in a [`GraphClient`] that
//! does not sleep between retries.

use std::sync::Arc;
use std::time::Duration;

use claimgraph::Identity;
use claimgraph_store::storage::{memory::MemoryStorage, sqlite::SqliteStorage};
use claimgraph_store::{GraphClient, RetryPolicy, Storage};

/// A named, empty storage backend.
pub struct Backend {
    pub name: &'static str,
    pub storage: Arc<dyn Storage>,
}

/// One fresh instance of every backend.
///
/// # Panics
///
/// Panics if the in-memory SQLite database cannot be opened.
pub fn backends() -> Vec<Backend> {
    vec![
        Backend {
            name: "memory",
            storage: Arc::new(MemoryStorage::new()),
        },
        Backend {
            name: "sqlite",
            storage: Arc::new(SqliteStorage::open_in_memory().expect("open in-memory sqlite")),
        },
    ]
}

/// A client for `caller` over `storage`, retrying without delay.
pub fn client(storage: &Arc<dyn Storage>, caller: &str) -> GraphClient {
    GraphClient::new(Arc::clone(storage), caller).with_retry(RetryPolicy::new(3, Duration::ZERO))
}

/// Create identities with the given names, in order.
///
/// # Panics
///
/// Panics if any name is already taken.
pub async fn seed_identities(client: &GraphClient, names: &[&str]) -> Vec<Identity> {
    let mut out = Vec::with_capacity(names.len());
    for name in names {
        out.push(
            client
                .create_identity(name, "seeded by the conformance suite")
                .await
                .unwrap_or_else(|e| panic!("seed {name:?}: {e}")),
        );
    }
    out
}
