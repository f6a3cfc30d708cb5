use std::collections::{BTreeMap, BTreeSet, HashMap};

use thiserror::Error;

use crate::query::GraphView;
use crate::types::{Attestation, Claim, Identity, Role};

/// Invariant violations raised when inserting into a [`Graph`].
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum InsertError {
    #[error("identity {0} already exists")]
    DuplicateIdentityId(String),

    #[error("an identity named {name:?} already exists ({existing_id})")]
    DuplicateDisplayName { name: String, existing_id: String },

    #[error("claim {0} already exists")]
    DuplicateClaimId(String),

    #[error("claim {existing_id} already asserts this triple")]
    DuplicateTriple { existing_id: String },

    #[error("{role} {id} does not resolve to an identity")]
    DanglingReference { role: Role, id: String },

    #[error("claim {0} does not exist")]
    UnknownClaim(String),

    #[error("attestation {0} already exists")]
    DuplicateAttestationId(String),
}

type Triple = (String, String, String);

/// An in-memory claim graph: identities, the claims connecting them, and
/// the attestations appended to those claims.
///
/// Records are keyed by their UUIDv7 ids in `BTreeMap`s, so iteration is in
/// creation order. Insertion enforces the store invariants: unique display
/// names, unique triples, and no dangling claim endpoints.
#[derive(Debug, Default, Clone)]
pub struct Graph {
    identities: BTreeMap<String, Identity>,
    names: HashMap<String, String>,
    claims: BTreeMap<String, Claim>,
    triples: HashMap<Triple, String>,
    /// (role, identity id) → ids of claims with that identity in that role.
    by_endpoint: HashMap<(Role, String), BTreeSet<String>>,
    attestations: HashMap<String, Vec<Attestation>>,
}

impl Graph {
    /// Create an empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a graph from identities and claims, checking every invariant.
    pub fn from_records(
        identities: impl IntoIterator<Item = Identity>,
        claims: impl IntoIterator<Item = Claim>,
    ) -> Result<Self, InsertError> {
        let mut g = Self::new();
        for i in identities {
            g.insert_identity(i)?;
        }
        for c in claims {
            g.insert_claim(c)?;
        }
        Ok(g)
    }

    /// Insert an identity. Fails if the id or the display name is taken.
    pub fn insert_identity(&mut self, identity: Identity) -> Result<(), InsertError> {
        if self.identities.contains_key(&identity.identity_id) {
            return Err(InsertError::DuplicateIdentityId(identity.identity_id));
        }
        if let Some(existing) = self.names.get(&identity.display_name) {
            return Err(InsertError::DuplicateDisplayName {
                name: identity.display_name,
                existing_id: existing.clone(),
            });
        }
        self.names
            .insert(identity.display_name.clone(), identity.identity_id.clone());
        self.identities
            .insert(identity.identity_id.clone(), identity);
        Ok(())
    }

    /// Insert a claim. Fails on a dangling endpoint, a reused id, or a
    /// triple that another claim already asserts.
    pub fn insert_claim(&mut self, claim: Claim) -> Result<(), InsertError> {
        for (role, id) in claim.endpoints() {
            if !self.identities.contains_key(id) {
                return Err(InsertError::DanglingReference {
                    role,
                    id: id.to_string(),
                });
            }
        }
        if self.claims.contains_key(&claim.claim_id) {
            return Err(InsertError::DuplicateClaimId(claim.claim_id));
        }
        let triple = (
            claim.subject_id.clone(),
            claim.predicate_id.clone(),
            claim.object_id.clone(),
        );
        if let Some(existing) = self.triples.get(&triple) {
            return Err(InsertError::DuplicateTriple {
                existing_id: existing.clone(),
            });
        }

        self.triples.insert(triple, claim.claim_id.clone());
        for (role, id) in claim.endpoints() {
            self.by_endpoint
                .entry((role, id.to_string()))
                .or_default()
                .insert(claim.claim_id.clone());
        }
        self.claims.insert(claim.claim_id.clone(), claim);
        Ok(())
    }

    /// Append an attestation to an existing claim.
    pub fn insert_attestation(&mut self, attestation: Attestation) -> Result<(), InsertError> {
        if !self.claims.contains_key(&attestation.claim_id) {
            return Err(InsertError::UnknownClaim(attestation.claim_id));
        }
        let list = self
            .attestations
            .entry(attestation.claim_id.clone())
            .or_default();
        if list
            .iter()
            .any(|a| a.attestation_id == attestation.attestation_id)
        {
            return Err(InsertError::DuplicateAttestationId(attestation.attestation_id));
        }
        list.push(attestation);
        Ok(())
    }

    pub fn get_identity(&self, id: &str) -> Option<&Identity> {
        self.identities.get(id)
    }

    pub fn get_claim(&self, id: &str) -> Option<&Claim> {
        self.claims.get(id)
    }

    /// The identity holding `display_name`, if any.
    pub fn identity_by_name(&self, display_name: &str) -> Option<&Identity> {
        self.names
            .get(display_name)
            .and_then(|id| self.identities.get(id))
    }

    /// The claim asserting exactly this triple, if any.
    pub fn find_triple(
        &self,
        subject_id: &str,
        predicate_id: &str,
        object_id: &str,
    ) -> Option<&Claim> {
        let key = (
            subject_id.to_string(),
            predicate_id.to_string(),
            object_id.to_string(),
        );
        self.triples.get(&key).and_then(|id| self.claims.get(id))
    }

    /// Attestations on `claim_id` in insertion order, or `None` if the claim
    /// does not exist.
    pub fn attestations(&self, claim_id: &str) -> Option<&[Attestation]> {
        if !self.claims.contains_key(claim_id) {
            return None;
        }
        Some(
            self.attestations
                .get(claim_id)
                .map(Vec::as_slice)
                .unwrap_or(&[]),
        )
    }

    pub fn identity_count(&self) -> usize {
        self.identities.len()
    }

    pub fn claim_count(&self) -> usize {
        self.claims.len()
    }

    pub fn is_empty(&self) -> bool {
        self.identities.is_empty()
    }

    /// Claims whose subject is `id` (outgoing edges).
    pub fn outgoing(&self, id: &str) -> Vec<&Claim> {
        self.claims_in_role(Role::Subject, id)
    }

    /// Claims whose object is `id` (incoming edges).
    pub fn incoming(&self, id: &str) -> Vec<&Claim> {
        self.claims_in_role(Role::Object, id)
    }

    fn claims_in_role(&self, role: Role, id: &str) -> Vec<&Claim> {
        self.by_endpoint
            .get(&(role, id.to_string()))
            .map(|ids| ids.iter().filter_map(|c| self.claims.get(c)).collect())
            .unwrap_or_default()
    }
}

impl GraphView for Graph {
    fn identity(&self, id: &str) -> Option<&Identity> {
        self.identities.get(id)
    }

    fn identities(&self) -> Box<dyn Iterator<Item = &Identity> + '_> {
        Box::new(self.identities.values())
    }

    fn claims(&self) -> Box<dyn Iterator<Item = &Claim> + '_> {
        Box::new(self.claims.values())
    }

    fn claims_by_endpoint(&self, role: Role, id: &str) -> Vec<&Claim> {
        self.claims_in_role(role, id)
    }
}

// --- tests -------------------------------------------------------------------
