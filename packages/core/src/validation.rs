use thiserror::Error;

use crate::types::{Attestation, Claim, Identity};

/// Errors returned when a record fails conformance validation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("{field} must be a valid UUIDv7 (RFC 9562), got: {value:?}")]
    InvalidId { field: &'static str, value: String },

    #[error("display_name must not be blank")]
    BlankDisplayName,

    #[error("created_at must be a valid RFC 3339 date-time, got: {0:?}")]
    InvalidTimestamp(String),

    #[error("attestor must not be blank")]
    BlankAttestor,
}

/// Validate an [`Identity`] before it is stored.
pub fn validate_identity(identity: &Identity) -> Result<(), ValidationError> {
    validate_uuid_v7("identity_id", &identity.identity_id)?;
    validate_display_name(&identity.display_name)?;
    validate_timestamp(&identity.created_at)
}

/// Validate a [`Claim`] before it is stored.
///
/// Endpoint ids are deliberately not checked here: an id that does not
/// resolve is a dangling reference, which the store reports on its own.
pub fn validate_claim(claim: &Claim) -> Result<(), ValidationError> {
    validate_uuid_v7("claim_id", &claim.claim_id)?;
    validate_timestamp(&claim.created_at)
}

/// Validate an [`Attestation`] before it is stored.
pub fn validate_attestation(attestation: &Attestation) -> Result<(), ValidationError> {
    validate_uuid_v7("attestation_id", &attestation.attestation_id)?;
    if attestation.attestor.trim().is_empty() {
        return Err(ValidationError::BlankAttestor);
    }
    validate_timestamp(&attestation.created_at)
}

pub fn validate_display_name(name: &str) -> Result<(), ValidationError> {
    if name.trim().is_empty() {
        return Err(ValidationError::BlankDisplayName);
    }
    Ok(())
}

// --- helpers -----------------------------------------------------------------

fn validate_uuid_v7(field: &'static str, s: &str) -> Result<(), ValidationError> {
    match uuid::Uuid::parse_str(s) {
        Ok(u) if u.get_version_num() == 7 => Ok(()),
        _ => Err(ValidationError::InvalidId {
            field,
            value: s.to_string(),
        }),
    }
}

fn validate_timestamp(s: &str) -> Result<(), ValidationError> {
    chrono::DateTime::parse_from_rfc3339(s)
        .map(|_| ())
        .map_err(|_| ValidationError::InvalidTimestamp(s.to_string()))
}

// --- tests -------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal() -> Identity {
        Identity {
            identity_id: "019526b2-f68a-7c3e-a0b4-1d2e3f4a5b6c".into(),
            display_name: "My User".into(),
            description: "I <3 Intuition".into(),
            created_at: "2026-02-18T12:00:00Z".into(),
        }
    }

    #[test]
    fn valid_minimal_identity() {
        assert_eq!(validate_identity(&minimal()), Ok(()));
        assert_eq!(validate_identity(&Identity::new("x", "")), Ok(()));
    }

    #[test]
    fn invalid_id_not_uuid() {
        let mut i = minimal();
        i.identity_id = "not-a-uuid".into();
        assert!(matches!(
            validate_identity(&i),
            Err(ValidationError::InvalidId { field: "identity_id", .. })
        ));
    }

    #[test]
    fn invalid_id_wrong_version() {
        let mut i = minimal();
        // UUIDv4
        i.identity_id = "550e8400-e29b-41d4-a716-446655440000".into();
        assert!(matches!(
            validate_identity(&i),
            Err(ValidationError::InvalidId { .. })
        ));
    }

    #[test]
    fn blank_display_name() {
        let mut i = minimal();
        i.display_name = "   ".into();
        assert_eq!(validate_identity(&i), Err(ValidationError::BlankDisplayName));
    }

    #[test]
    fn empty_description_is_fine() {
        let mut i = minimal();
        i.description = String::new();
        assert_eq!(validate_identity(&i), Ok(()));
    }

    #[test]
    fn bad_timestamp() {
        let mut i = minimal();
        i.created_at = "yesterday".into();
        assert_eq!(
            validate_identity(&i),
            Err(ValidationError::InvalidTimestamp("yesterday".into()))
        );
    }

    #[test]
    fn claim_endpoints_are_not_validated() {
        let c = Claim::new("anything", "goes", "here", true);
        assert_eq!(validate_claim(&c), Ok(()));
    }

    #[test]
    fn blank_attestor() {
        let a = Attestation::new("019526b2-f68a-7c3e-a0b4-1d2e3f4a5b6c", true, " ");
        assert_eq!(validate_attestation(&a), Err(ValidationError::BlankAttestor));
    }
}
