//! The per-caller execution context.
//!
//! A [`GraphClient`] pairs a shared [`Storage`] backend with the identity of
//! the caller using it. Every store operation goes through a client: it
//! validates records before they are written, turns backend errors into
//! [`GraphError`]s, and implements the conventions that sit above the raw
//! store (get-or-create, lookup by unique name, bounded read-after-write
//! retry).
//!
//! Several clients may share one backend; that is how the `demo` command
//! runs two users against the same graph.

use std::sync::Arc;

use claimgraph::{
    validate_attestation, validate_claim, validate_identity, Attestation,
    AttestationTally, Claim, ClaimFilter, GetOrCreate, Identity, IdentityFilter,
};

use crate::config::StoreConfig;
use crate::error::GraphError;
use crate::retry::RetryPolicy;
use crate::storage::{Storage, StorageError};

/// A caller's handle on the claim graph.
#[derive(Clone)]
pub struct GraphClient {
    storage: Arc<dyn Storage>,
    caller: String,
    retry: RetryPolicy,
}

impl GraphClient {
    pub fn new(storage: Arc<dyn Storage>, caller: impl Into<String>) -> Self {
        Self {
            storage,
            caller: caller.into(),
            retry: RetryPolicy::default(),
        }
    }

    /// Build a client for the configured caller and retry policy.
    pub fn from_config(storage: Arc<dyn Storage>, config: &StoreConfig) -> Self {
        Self::new(storage, config.caller.clone()).with_retry(config.retry)
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// A client for another caller over the same backend.
    pub fn as_caller(&self, caller: impl Into<String>) -> Self {
        Self {
            storage: Arc::clone(&self.storage),
            caller: caller.into(),
            retry: self.retry,
        }
    }

    pub fn caller(&self) -> &str {
        &self.caller
    }

    pub fn storage(&self) -> &Arc<dyn Storage> {
        &self.storage
    }

    // --- Identities ----------------------------------------------------------

    /// Store a new identity. Fails with [`GraphError::Conflict`] if the
    /// display name is taken.
    pub async fn create_identity(
        &self,
        display_name: &str,
        description: &str,
    ) -> Result<Identity, GraphError> {
        let identity = Identity::new(display_name, description);
        validate_identity(&identity)?;
        self.storage.put_identity(&identity).await?;
        tracing::info!(
            caller = %self.caller,
            id = %identity.identity_id,
            "created identity {:?}",
            identity.display_name
        );
        Ok(identity)
    }

    /// Create the identity, or return the one already stored under
    /// `display_name`.
    ///
    /// A name conflict is resolved by looking the existing record up,
    /// retrying while it is not yet visible.
    pub async fn get_or_create_identity(
        &self,
        display_name: &str,
        description: &str,
    ) -> Result<GetOrCreate<Identity>, GraphError> {
        match self.create_identity(display_name, description).await {
            Ok(identity) => Ok(GetOrCreate::Created(identity)),
            Err(GraphError::Conflict(reason)) => {
                tracing::warn!(
                    caller = %self.caller,
                    "{display_name:?} already exists ({reason}); looking it up"
                );
                self.retry
                    .until_some("identity", || self.find_identity_by_name(display_name))
                    .await?
                    .map(GetOrCreate::Existed)
                    .ok_or_else(|| {
                        GraphError::NotFound(format!(
                            "identity {display_name:?} conflicted on create \
                             but never became visible"
                        ))
                    })
            }
            Err(e) => Err(e),
        }
    }

    pub async fn get_identity(&self, id: &str) -> Result<Identity, GraphError> {
        self.storage
            .get_identity(id)
            .await?
            .ok_or_else(|| GraphError::NotFound(format!("identity {id}")))
    }

    /// [`get_identity`](Self::get_identity), polling while the record is not
    /// yet visible.
    pub async fn get_identity_eventually(&self, id: &str) -> Result<Identity, GraphError> {
        self.retry
            .until_some("identity", || async {
                self.storage.get_identity(id).await.map_err(GraphError::from)
            })
            .await?
            .ok_or_else(|| GraphError::NotFound(format!("identity {id}")))
    }

    /// The identity named `display_name`, if there is one.
    ///
    /// Names are unique by convention; more than one match is reported as a
    /// [`GraphError::ConsistencyViolation`].
    pub async fn find_identity_by_name(
        &self,
        display_name: &str,
    ) -> Result<Option<Identity>, GraphError> {
        let mut found = self
            .query_identities(&IdentityFilter::display_name(display_name))
            .await?;
        match found.len() {
            0 => Ok(None),
            1 => Ok(found.pop()),
            n => Err(GraphError::ConsistencyViolation(format!(
                "{n} identities are named {display_name:?}"
            ))),
        }
    }

    /// The identity named `display_name`; [`GraphError::NotFound`] if there
    /// is none.
    pub async fn identity_by_name(&self, display_name: &str) -> Result<Identity, GraphError> {
        self.find_identity_by_name(display_name)
            .await?
            .ok_or_else(|| GraphError::NotFound(format!("no identity named {display_name:?}")))
    }

    pub async fn query_identities(
        &self,
        filter: &IdentityFilter,
    ) -> Result<Vec<Identity>, GraphError> {
        let found = self.storage.query_identities(filter).await?;
        tracing::debug!(matches = found.len(), "query_identities");
        Ok(found)
    }

    // --- Claims --------------------------------------------------------------

    /// Store a new claim. Fails with [`GraphError::DanglingReference`] if an
    /// endpoint does not resolve and [`GraphError::Conflict`] if the triple
    /// is already asserted.
    pub async fn create_claim(
        &self,
        subject_id: &str,
        predicate_id: &str,
        object_id: &str,
        direction: bool,
    ) -> Result<Claim, GraphError> {
        let claim = Claim::new(subject_id, predicate_id, object_id, direction);
        validate_claim(&claim)?;
        self.storage.put_claim(&claim).await?;
        tracing::info!(
            caller = %self.caller,
            id = %claim.claim_id,
            "created claim {subject_id} --{predicate_id}--> {object_id}"
        );
        Ok(claim)
    }

    /// Create the claim, or return the one already asserting the triple.
    ///
    /// The existing claim is returned as stored, whatever its direction.
    pub async fn get_or_create_claim(
        &self,
        subject_id: &str,
        predicate_id: &str,
        object_id: &str,
        direction: bool,
    ) -> Result<GetOrCreate<Claim>, GraphError> {
        match self
            .create_claim(subject_id, predicate_id, object_id, direction)
            .await
        {
            Ok(claim) => Ok(GetOrCreate::Created(claim)),
            Err(GraphError::Conflict(reason)) => {
                tracing::warn!(
                    caller = %self.caller,
                    "claim already exists ({reason}); looking it up"
                );
                self.retry
                    .until_some("claim", || self.find_claim(subject_id, predicate_id, object_id))
                    .await?
                    .map(GetOrCreate::Existed)
                    .ok_or_else(|| {
                        GraphError::NotFound(format!(
                            "claim {subject_id} --{predicate_id}--> {object_id} \
                             conflicted on create but never became visible"
                        ))
                    })
            }
            Err(e) => Err(e),
        }
    }

    /// The claim asserting `subject --predicate--> object`, if any.
    pub async fn find_claim(
        &self,
        subject_id: &str,
        predicate_id: &str,
        object_id: &str,
    ) -> Result<Option<Claim>, GraphError> {
        let mut found = self
            .query_claims(&ClaimFilter::triple(subject_id, predicate_id, object_id))
            .await?;
        match found.len() {
            0 => Ok(None),
            1 => Ok(found.pop()),
            n => Err(GraphError::ConsistencyViolation(format!(
                "{n} claims assert {subject_id} --{predicate_id}--> {object_id}"
            ))),
        }
    }

    pub async fn get_claim(&self, id: &str) -> Result<Claim, GraphError> {
        self.storage
            .get_claim(id)
            .await?
            .ok_or_else(|| GraphError::NotFound(format!("claim {id}")))
    }

    pub async fn query_claims(&self, filter: &ClaimFilter) -> Result<Vec<Claim>, GraphError> {
        let found = self.storage.query_claims(filter).await?;
        tracing::debug!(matches = found.len(), "query_claims");
        Ok(found)
    }

    // --- Attestations --------------------------------------------------------

    /// Record this caller's endorsement (or denial) of a claim.
    pub async fn attest_claim(
        &self,
        claim_id: &str,
        direction: bool,
    ) -> Result<Attestation, GraphError> {
        let attestation = Attestation::new(claim_id, direction, self.caller.as_str());
        validate_attestation(&attestation)?;
        self.storage
            .put_attestation(&attestation)
            .await
            .map_err(|e| with_subject(e, || format!("claim {claim_id}")))?;
        tracing::info!(caller = %self.caller, claim = %claim_id, direction, "attested claim");
        Ok(attestation)
    }

    pub async fn attestations(&self, claim_id: &str) -> Result<Vec<Attestation>, GraphError> {
        self.storage
            .list_attestations(claim_id)
            .await
            .map_err(|e| with_subject(e, || format!("claim {claim_id}")))
    }

    pub async fn tally(&self, claim_id: &str) -> Result<AttestationTally, GraphError> {
        let attestations = self.attestations(claim_id).await?;
        Ok(AttestationTally::from_attestations(&attestations))
    }
}

/// Name the missing record in a bare [`StorageError::NotFound`].
fn with_subject(e: StorageError, what: impl FnOnce() -> String) -> GraphError {
    match e {
        StorageError::NotFound => GraphError::NotFound(what()),
        other => other.into(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
