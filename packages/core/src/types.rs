//! Core records of the claim graph.
//!
//! An [`Identity`] is a node; a [`Claim`] is a directed
//! subject–predicate–object triple whose three endpoints are identities; an
//! [`Attestation`] is an endorsement event appended to a claim. All three are
//! immutable once stored.

use serde::{Deserialize, Serialize};

/// Generate a fresh UUIDv7 identifier.
///
/// UUIDv7 strings sort lexicographically in creation order, which the stores
/// rely on for stable result ordering.
pub fn new_id() -> String {
    uuid::Uuid::now_v7().to_string()
}

fn now() -> String {
    chrono::Utc::now().to_rfc3339()
}

/// A node in the claim graph.
///
/// `display_name` is unique by convention: the stores reject a second
/// identity with the same name as a conflict, and callers resolve that
/// conflict by looking the existing record up.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Identity {
    /// UUIDv7 identifier, assigned at creation.
    pub identity_id: String,

    /// Human-readable label.
    pub display_name: String,

    /// Free text.
    pub description: String,

    /// RFC 3339 creation timestamp.
    pub created_at: String,
}

impl Identity {
    /// Create a new identity with an auto-generated id and current UTC timestamp.
    pub fn new(display_name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            identity_id: new_id(),
            display_name: display_name.into(),
            description: description.into(),
            created_at: now(),
        }
    }
}

/// The role an identity plays in a claim.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Subject,
    Predicate,
    Object,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Subject => write!(f, "subject"),
            Role::Predicate => write!(f, "predicate"),
            Role::Object => write!(f, "object"),
        }
    }
}

/// A directed `subject --predicate--> object` triple.
///
/// The three endpoints are non-owning references by id; the store owns the
/// identity records. `direction` is the creator's polarity (true = affirming).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Claim {
    /// UUIDv7 identifier, assigned at creation.
    pub claim_id: String,
    pub subject_id: String,
    pub predicate_id: String,
    pub object_id: String,
    pub direction: bool,
    /// RFC 3339 creation timestamp.
    pub created_at: String,
}

impl Claim {
    /// Create a new claim with an auto-generated id and current UTC timestamp.
    ///
    /// Endpoints are not checked here; the store rejects dangling references.
    pub fn new(
        subject_id: impl Into<String>,
        predicate_id: impl Into<String>,
        object_id: impl Into<String>,
        direction: bool,
    ) -> Self {
        Self {
            claim_id: new_id(),
            subject_id: subject_id.into(),
            predicate_id: predicate_id.into(),
            object_id: object_id.into(),
            direction,
            created_at: now(),
        }
    }

    /// The endpoint id occupying `role`.
    pub fn endpoint(&self, role: Role) -> &str {
        match role {
            Role::Subject => &self.subject_id,
            Role::Predicate => &self.predicate_id,
            Role::Object => &self.object_id,
        }
    }

    /// All three endpoints paired with their roles, in triple order.
    pub fn endpoints(&self) -> [(Role, &str); 3] {
        [
            (Role::Subject, self.subject_id.as_str()),
            (Role::Predicate, self.predicate_id.as_str()),
            (Role::Object, self.object_id.as_str()),
        ]
    }

    /// Whether `other` names the same `(subject, predicate, object)` triple.
    pub fn same_triple(&self, other: &Claim) -> bool {
        self.subject_id == other.subject_id
            && self.predicate_id == other.predicate_id
            && self.object_id == other.object_id
    }
}

/// An endorsement event on a claim.
///
/// Attestations accumulate: attesting twice with the same polarity yields two
/// records, and neither changes the claim itself.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Attestation {
    /// UUIDv7 identifier, assigned at creation.
    pub attestation_id: String,
    pub claim_id: String,
    pub direction: bool,
    /// Caller identifier of the execution context that attested.
    pub attestor: String,
    /// RFC 3339 creation timestamp.
    pub created_at: String,
}

impl Attestation {
    pub fn new(claim_id: impl Into<String>, direction: bool, attestor: impl Into<String>) -> Self {
        Self {
            attestation_id: new_id(),
            claim_id: claim_id.into(),
            direction,
            attestor: attestor.into(),
            created_at: now(),
        }
    }
}

/// Attestation counts for one claim, split by polarity.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct AttestationTally {
    pub affirming: u64,
    pub denying: u64,
}

impl AttestationTally {
    /// Count a sequence of attestations.
    pub fn from_attestations<'a>(iter: impl IntoIterator<Item = &'a Attestation>) -> Self {
        let mut tally = Self::default();
        for a in iter {
            if a.direction {
                tally.affirming += 1;
            } else {
                tally.denying += 1;
            }
        }
        tally
    }

    pub fn total(&self) -> u64 {
        self.affirming + self.denying
    }
}

/// Outcome of a create-or-get operation.
///
/// Replaces "try create, catch already-exists, look up" with an explicit
/// result: both arms carry the stored record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "outcome", content = "record", rename_all = "snake_case")]
pub enum GetOrCreate<T> {
    Created(T),
    Existed(T),
}

impl<T> GetOrCreate<T> {
    pub fn into_inner(self) -> T {
        match self {
            GetOrCreate::Created(t) | GetOrCreate::Existed(t) => t,
        }
    }

    pub fn get(&self) -> &T {
        match self {
            GetOrCreate::Created(t) | GetOrCreate::Existed(t) => t,
        }
    }

    pub fn was_created(&self) -> bool {
        matches!(self, GetOrCreate::Created(_))
    }
}
