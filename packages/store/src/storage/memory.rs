//! In-memory storage implementation.
//!
//! All data is held in a [`Graph`] behind a [`RwLock`] and is lost when the
//! process exits. The graph enforces the store invariants on insert and
//! evaluates filters directly, so this backend is also the reference the
//! SQLite backend is checked against.

use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use claimgraph::query::{select_claims, select_identities};
use claimgraph::{Attestation, Claim, ClaimFilter, Graph, Identity, IdentityFilter};

use super::{Storage, StorageError};

// ---------------------------------------------------------------------------
// MemoryStorage
// ---------------------------------------------------------------------------

/// Thread-safe, in-memory implementation of [`Storage`].
pub struct MemoryStorage {
    inner: RwLock<Graph>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Graph::new()),
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Graph>, StorageError> {
        self.inner
            .read()
            .map_err(|_| StorageError::Internal("memory store lock poisoned".into()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Graph>, StorageError> {
        self.inner
            .write()
            .map_err(|_| StorageError::Internal("memory store lock poisoned".into()))
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Storage impl
// ---------------------------------------------------------------------------

#[async_trait]
impl Storage for MemoryStorage {
    // --- Identities ----------------------------------------------------------

    async fn put_identity(&self, identity: &Identity) -> Result<(), StorageError> {
        self.write()?.insert_identity(identity.clone())?;
        Ok(())
    }

    async fn get_identity(&self, id: &str) -> Result<Option<Identity>, StorageError> {
        Ok(self.read()?.get_identity(id).cloned())
    }

    async fn query_identities(
        &self,
        filter: &IdentityFilter,
    ) -> Result<Vec<Identity>, StorageError> {
        let graph = self.read()?;
        Ok(select_identities(&*graph, filter))
    }

    // --- Claims --------------------------------------------------------------

    async fn put_claim(&self, claim: &Claim) -> Result<(), StorageError> {
        self.write()?.insert_claim(claim.clone())?;
        Ok(())
    }

    async fn get_claim(&self, id: &str) -> Result<Option<Claim>, StorageError> {
        Ok(self.read()?.get_claim(id).cloned())
    }

    async fn query_claims(&self, filter: &ClaimFilter) -> Result<Vec<Claim>, StorageError> {
        let graph = self.read()?;
        Ok(select_claims(&*graph, filter))
    }

    // --- Attestations --------------------------------------------------------

    async fn put_attestation(&self, attestation: &Attestation) -> Result<(), StorageError> {
        self.write()?.insert_attestation(attestation.clone())?;
        Ok(())
    }

    async fn list_attestations(&self, claim_id: &str) -> Result<Vec<Attestation>, StorageError> {
        self.read()?
            .attestations(claim_id)
            .map(<[Attestation]>::to_vec)
            .ok_or(StorageError::NotFound)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
