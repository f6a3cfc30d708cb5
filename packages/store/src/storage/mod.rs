//! Storage abstraction for the Identity Store and the Claim Store.
//!
//! The [`Storage`] trait is the logical contract every backend must satisfy.
//! It enforces the store invariants (unique display names, unique triples,
//! no dangling claim endpoints) and evaluates filter trees. Everything built
//! on conventions — get-or-create, special predicates, profiles — lives
//! above it in [`GraphClient`](crate::GraphClient).
//!
//! # Implementations
//!
//! | Type | When to use |
//! |------|-------------|
//! | [`MemoryStorage`] | Tests, the conformance suite, throwaway runs |
//! | [`SqliteStorage`] | Durable single-file database |
//!
//! [`MemoryStorage`]: memory::MemoryStorage
//! [`SqliteStorage`]: sqlite::SqliteStorage

pub mod memory;
pub mod sqlite;

use std::sync::Arc;

use async_trait::async_trait;
use claimgraph::{Attestation, Claim, ClaimFilter, Identity, IdentityFilter, InsertError};

use crate::config::StoreConfig;

// ---------------------------------------------------------------------------
// StorageError
// ---------------------------------------------------------------------------

/// Errors that storage operations can return.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// The requested item does not exist.
    #[error("not found")]
    NotFound,

    /// The write collides with an existing record: a reused id, a taken
    /// display name, or a triple another claim already asserts.
    #[error("conflict: {0}")]
    Conflict(String),

    /// A claim endpoint does not resolve to a stored identity.
    #[error("dangling reference: {0}")]
    DanglingReference(String),

    /// An unexpected error in the underlying storage backend.
    #[error("internal storage error: {0}")]
    Internal(String),
}

impl From<InsertError> for StorageError {
    fn from(e: InsertError) -> Self {
        match e {
            InsertError::DanglingReference { .. } => StorageError::DanglingReference(e.to_string()),
            InsertError::UnknownClaim(_) => StorageError::NotFound,
            InsertError::DuplicateIdentityId(_)
            | InsertError::DuplicateDisplayName { .. }
            | InsertError::DuplicateClaimId(_)
            | InsertError::DuplicateTriple { .. }
            | InsertError::DuplicateAttestationId(_) => StorageError::Conflict(e.to_string()),
        }
    }
}

// ---------------------------------------------------------------------------
// Storage trait
// ---------------------------------------------------------------------------

/// The persistence contract for the claim graph.
///
/// All methods are `async` and single-shot. Implementations must be
/// `Send + Sync + 'static` so they can be held in an `Arc<dyn Storage>` and
/// shared by any number of concurrent callers. Query results are ordered by
/// record id ascending; callers must not rely on any particular order.
#[async_trait]
pub trait Storage: Send + Sync + 'static {
    // --- Identities ----------------------------------------------------------

    /// Persist an identity. Returns [`StorageError::Conflict`] if the id or
    /// the display name is already taken.
    async fn put_identity(&self, identity: &Identity) -> Result<(), StorageError>;

    /// Retrieve an identity by id. Returns `None` if not found.
    async fn get_identity(&self, id: &str) -> Result<Option<Identity>, StorageError>;

    /// All identities matching `filter`. An empty result is not an error.
    async fn query_identities(
        &self,
        filter: &IdentityFilter,
    ) -> Result<Vec<Identity>, StorageError>;

    // --- Claims --------------------------------------------------------------

    /// Persist a claim.
    ///
    /// Returns [`StorageError::DanglingReference`] if any endpoint does not
    /// resolve, and [`StorageError::Conflict`] if the id is taken or another
    /// claim already asserts the same `(subject, predicate, object)` triple.
    async fn put_claim(&self, claim: &Claim) -> Result<(), StorageError>;

    /// Retrieve a claim by id. Returns `None` if not found.
    async fn get_claim(&self, id: &str) -> Result<Option<Claim>, StorageError>;

    /// All claims matching `filter`. An empty result is not an error.
    async fn query_claims(&self, filter: &ClaimFilter) -> Result<Vec<Claim>, StorageError>;

    // --- Attestations --------------------------------------------------------

    /// Append an attestation. Returns [`StorageError::NotFound`] if the claim
    /// does not exist. Never modifies the claim or earlier attestations.
    async fn put_attestation(&self, attestation: &Attestation) -> Result<(), StorageError>;

    /// All attestations on a claim, oldest first. Returns
    /// [`StorageError::NotFound`] if the claim does not exist.
    async fn list_attestations(&self, claim_id: &str) -> Result<Vec<Attestation>, StorageError>;
}

/// Open the configured backend: SQLite when a database path is set, memory
/// otherwise.
pub fn open_storage(config: &StoreConfig) -> Result<Arc<dyn Storage>, StorageError> {
    match config.db_path.as_deref() {
        Some(path) => {
            tracing::info!("storage: SQLite at {path}");
            let storage = sqlite::SqliteStorage::open(path)
                .map_err(|e| StorageError::Internal(format!("failed to open {path}: {e}")))?;
            Ok(Arc::new(storage))
        }
        None => {
            tracing::info!("storage: in-memory (data will not survive exit)");
            Ok(Arc::new(memory::MemoryStorage::new()))
        }
    }
}
