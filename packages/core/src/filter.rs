//! Filter trees for identity and claim queries.
//!
//! Filters are recursive tagged variants so the evaluator can match them
//! exhaustively. Their JSON form follows the query shapes of the graph API:
//!
//! ```json
//! { "in_claim": { "as_subject": {
//!     "where_predicate": { "field": { "field": "display_name", "op": "=", "value": "Guest" } },
//!     "where_object":    { "field": { "field": "display_name", "op": "=", "value": "Club" } }
//! } } }
//! ```
//!
//! Evaluation lives in [`crate::query`].

use serde::{Deserialize, Serialize};

use crate::types::{Identity, Role};

/// A stored identity field that a [`FieldPredicate`] can test.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum IdentityField {
    IdentityId,
    DisplayName,
    Description,
}

impl IdentityField {
    /// The stored value of this field on `identity`.
    pub fn value<'a>(&self, identity: &'a Identity) -> &'a str {
        match self {
            IdentityField::IdentityId => &identity.identity_id,
            IdentityField::DisplayName => &identity.display_name,
            IdentityField::Description => &identity.description,
        }
    }
}

impl std::fmt::Display for IdentityField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IdentityField::IdentityId => write!(f, "identity_id"),
            IdentityField::DisplayName => write!(f, "display_name"),
            IdentityField::Description => write!(f, "description"),
        }
    }
}

/// Comparison operator of a [`FieldPredicate`]. All comparisons are
/// case-sensitive on the stored value.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum FieldOp {
    /// Exact match.
    #[serde(rename = "=", alias = "eq")]
    Eq,
    #[serde(rename = "!=", alias = "ne")]
    Ne,
    #[serde(rename = "contains")]
    Contains,
    #[serde(rename = "starts_with")]
    StartsWith,
}

impl FieldOp {
    pub fn apply(&self, stored: &str, value: &str) -> bool {
        match self {
            FieldOp::Eq => stored == value,
            FieldOp::Ne => stored != value,
            FieldOp::Contains => stored.contains(value),
            FieldOp::StartsWith => stored.starts_with(value),
        }
    }
}

impl std::fmt::Display for FieldOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FieldOp::Eq => write!(f, "="),
            FieldOp::Ne => write!(f, "!="),
            FieldOp::Contains => write!(f, "contains"),
            FieldOp::StartsWith => write!(f, "starts_with"),
        }
    }
}

/// `(field, operator, value)` over one identity.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FieldPredicate {
    pub field: IdentityField,
    pub op: FieldOp,
    pub value: String,
}

impl FieldPredicate {
    pub fn matches(&self, identity: &Identity) -> bool {
        self.op.apply(self.field.value(identity), &self.value)
    }
}

/// A filter over identities.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum IdentityFilter {
    /// Matches every identity.
    #[default]
    All,
    Field(FieldPredicate),
    /// Identities that take part in at least one claim in the given role,
    /// with the claim's other endpoints satisfying their sub-filters.
    InClaim(Participation),
    And(Vec<IdentityFilter>),
    Or(Vec<IdentityFilter>),
    Not(Box<IdentityFilter>),
}

impl IdentityFilter {
    pub fn field(field: IdentityField, op: FieldOp, value: impl Into<String>) -> Self {
        IdentityFilter::Field(FieldPredicate {
            field,
            op,
            value: value.into(),
        })
    }

    /// `display_name = name`.
    pub fn display_name(name: impl Into<String>) -> Self {
        Self::field(IdentityField::DisplayName, FieldOp::Eq, name)
    }

    /// `identity_id = id`.
    pub fn id(id: impl Into<String>) -> Self {
        Self::field(IdentityField::IdentityId, FieldOp::Eq, id)
    }

    /// Identities that are the subject of some `_ --predicate--> object` claim.
    pub fn subject_of(predicate: IdentityFilter, object: IdentityFilter) -> Self {
        IdentityFilter::InClaim(Participation::AsSubject {
            where_predicate: Some(Box::new(predicate)),
            where_object: Some(Box::new(object)),
        })
    }

    /// Identities that are the object of some `subject --predicate--> _` claim.
    pub fn object_of(subject: IdentityFilter, predicate: IdentityFilter) -> Self {
        IdentityFilter::InClaim(Participation::AsObject {
            where_subject: Some(Box::new(subject)),
            where_predicate: Some(Box::new(predicate)),
        })
    }

    /// Conjunction, flattening nested `And`s.
    pub fn and(self, other: IdentityFilter) -> Self {
        match (self, other) {
            (IdentityFilter::All, f) | (f, IdentityFilter::All) => f,
            (IdentityFilter::And(mut a), IdentityFilter::And(b)) => {
                a.extend(b);
                IdentityFilter::And(a)
            }
            (IdentityFilter::And(mut a), f) => {
                a.push(f);
                IdentityFilter::And(a)
            }
            (f, g) => IdentityFilter::And(vec![f, g]),
        }
    }

    pub fn or(self, other: IdentityFilter) -> Self {
        match (self, other) {
            (IdentityFilter::Or(mut a), f) => {
                a.push(f);
                IdentityFilter::Or(a)
            }
            (f, g) => IdentityFilter::Or(vec![f, g]),
        }
    }

    pub fn negate(self) -> Self {
        IdentityFilter::Not(Box::new(self))
    }
}

/// Claim-participation predicate: the role the filtered identity plays and
/// sub-filters for the claim's other two endpoints. An absent sub-filter
/// matches any identity.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Participation {
    AsSubject {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        where_predicate: Option<Box<IdentityFilter>>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        where_object: Option<Box<IdentityFilter>>,
    },
    AsPredicate {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        where_subject: Option<Box<IdentityFilter>>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        where_object: Option<Box<IdentityFilter>>,
    },
    AsObject {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        where_subject: Option<Box<IdentityFilter>>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        where_predicate: Option<Box<IdentityFilter>>,
    },
}

impl Participation {
    /// The role the filtered identity occupies.
    pub fn role(&self) -> Role {
        match self {
            Participation::AsSubject { .. } => Role::Subject,
            Participation::AsPredicate { .. } => Role::Predicate,
            Participation::AsObject { .. } => Role::Object,
        }
    }

    /// The two other roles paired with their sub-filters (`None` = any).
    pub fn constraints(&self) -> [(Role, Option<&IdentityFilter>); 2] {
        match self {
            Participation::AsSubject {
                where_predicate,
                where_object,
            } => [
                (Role::Predicate, where_predicate.as_deref()),
                (Role::Object, where_object.as_deref()),
            ],
            Participation::AsPredicate {
                where_subject,
                where_object,
            } => [
                (Role::Subject, where_subject.as_deref()),
                (Role::Object, where_object.as_deref()),
            ],
            Participation::AsObject {
                where_subject,
                where_predicate,
            } => [
                (Role::Subject, where_subject.as_deref()),
                (Role::Predicate, where_predicate.as_deref()),
            ],
        }
    }
}

/// A filter over claims.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ClaimFilter {
    /// Matches every claim.
    #[default]
    All,
    /// Claims whose subject identity satisfies the filter.
    WithSubject(IdentityFilter),
    /// Claims whose predicate identity satisfies the filter.
    WithPredicate(IdentityFilter),
    /// Claims whose object identity satisfies the filter.
    WithObject(IdentityFilter),
    /// Claims created with this polarity.
    Direction(bool),
    And(Vec<ClaimFilter>),
    Or(Vec<ClaimFilter>),
    Not(Box<ClaimFilter>),
}

impl ClaimFilter {
    pub fn with_subject(filter: IdentityFilter) -> Self {
        ClaimFilter::WithSubject(filter)
    }

    pub fn with_predicate(filter: IdentityFilter) -> Self {
        ClaimFilter::WithPredicate(filter)
    }

    pub fn with_object(filter: IdentityFilter) -> Self {
        ClaimFilter::WithObject(filter)
    }

    /// Anchor the endpoint in `role` to `filter`.
    pub fn anchored(role: Role, filter: IdentityFilter) -> Self {
        match role {
            Role::Subject => ClaimFilter::WithSubject(filter),
            Role::Predicate => ClaimFilter::WithPredicate(filter),
            Role::Object => ClaimFilter::WithObject(filter),
        }
    }

    /// Claims matching the exact `(subject, predicate, object)` id triple.
    pub fn triple(subject_id: &str, predicate_id: &str, object_id: &str) -> Self {
        ClaimFilter::with_subject(IdentityFilter::id(subject_id))
            .and(ClaimFilter::with_predicate(IdentityFilter::id(predicate_id)))
            .and(ClaimFilter::with_object(IdentityFilter::id(object_id)))
    }

    /// Conjunction, flattening nested `And`s.
    pub fn and(self, other: ClaimFilter) -> Self {
        match (self, other) {
            (ClaimFilter::All, f) | (f, ClaimFilter::All) => f,
            (ClaimFilter::And(mut a), ClaimFilter::And(b)) => {
                a.extend(b);
                ClaimFilter::And(a)
            }
            (ClaimFilter::And(mut a), f) => {
                a.push(f);
                ClaimFilter::And(a)
            }
            (f, g) => ClaimFilter::And(vec![f, g]),
        }
    }

    pub fn or(self, other: ClaimFilter) -> Self {
        match (self, other) {
            (ClaimFilter::Or(mut a), f) => {
                a.push(f);
                ClaimFilter::Or(a)
            }
            (f, g) => ClaimFilter::Or(vec![f, g]),
        }
    }

    pub fn negate(self) -> Self {
        ClaimFilter::Not(Box::new(self))
    }
}
