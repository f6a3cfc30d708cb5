//! Profile reconstruction and writing.
//!
//! Reading is two steps: resolve the single pointer identity the user is
//! linked to through the profile predicate, then fold every claim whose
//! subject is that pointer into `field name → value name`. Writing is the
//! reverse and reuses existing identities by name, so a value identity
//! created for one user's profile is shared by any other profile that
//! names it.

use std::collections::HashMap;

use claimgraph::{Claim, ClaimFilter, Identity, IdentityFilter, Profile, ProfileField};

use crate::client::GraphClient;
use crate::error::GraphError;

/// Claims linking `user_id` to a profile pointer.
async fn pointer_links(
    client: &GraphClient,
    user_id: &str,
    profile_predicate_id: &str,
) -> Result<Vec<Claim>, GraphError> {
    let filter = ClaimFilter::with_subject(IdentityFilter::id(user_id))
        .and(ClaimFilter::with_predicate(IdentityFilter::id(profile_predicate_id)));
    client.query_claims(&filter).await
}

/// Resolve an identity a stored claim points at. Claims never dangle, so a
/// miss means the store broke an invariant.
async fn endpoint(
    client: &GraphClient,
    cache: &mut HashMap<String, Identity>,
    id: &str,
) -> Result<Identity, GraphError> {
    if let Some(found) = cache.get(id) {
        return Ok(found.clone());
    }
    let identity = match client.get_identity_eventually(id).await {
        Ok(identity) => identity,
        Err(GraphError::NotFound(_)) => {
            return Err(GraphError::ConsistencyViolation(format!(
                "claim endpoint {id} does not resolve to an identity"
            )))
        }
        Err(e) => return Err(e),
    };
    cache.insert(id.to_string(), identity.clone());
    Ok(identity)
}

/// The pointer identity anchoring `user_id`'s profile.
///
/// Exactly one `user --profile predicate--> pointer` claim must exist; zero
/// or several is a [`GraphError::ConsistencyViolation`].
pub async fn resolve_profile_pointer(
    client: &GraphClient,
    user_id: &str,
    profile_predicate_id: &str,
) -> Result<Identity, GraphError> {
    let links = pointer_links(client, user_id, profile_predicate_id).await?;
    let link = match links.as_slice() {
        [link] => link,
        [] => {
            return Err(GraphError::ConsistencyViolation(format!(
                "identity {user_id} has no profile pointer"
            )))
        }
        many => {
            return Err(GraphError::ConsistencyViolation(format!(
                "identity {user_id} has {} profile pointers",
                many.len()
            )))
        }
    };
    endpoint(client, &mut HashMap::new(), &link.object_id).await
}

/// The `field → value` pairs hanging off `pointer_id`.
async fn field_pairs(
    client: &GraphClient,
    pointer_id: &str,
) -> Result<Vec<(Identity, Identity)>, GraphError> {
    let claims = client
        .query_claims(&ClaimFilter::with_subject(IdentityFilter::id(pointer_id)))
        .await?;
    let mut cache = HashMap::new();
    let mut pairs = Vec::with_capacity(claims.len());
    for claim in &claims {
        let field = endpoint(client, &mut cache, &claim.predicate_id).await?;
        let value = endpoint(client, &mut cache, &claim.object_id).await?;
        pairs.push((field, value));
    }
    Ok(pairs)
}

/// Rebuild `user_id`'s profile. Creates nothing.
pub async fn reconstruct_profile(
    client: &GraphClient,
    user_id: &str,
    profile_predicate_id: &str,
) -> Result<Profile, GraphError> {
    let pointer = resolve_profile_pointer(client, user_id, profile_predicate_id).await?;
    let pairs = field_pairs(client, &pointer.identity_id).await?;
    tracing::debug!(
        user = %user_id,
        pointer = %pointer.identity_id,
        fields = pairs.len(),
        "reconstructed profile"
    );
    Ok(Profile::fold(pairs.iter().map(|(f, v)| (f, v))))
}

/// Refuse to write `fields` through `pointer` for `user_id` if the pointer
/// is linked to another user or already holds a different value for one of
/// the fields.
async fn check_pointer(
    client: &GraphClient,
    user_id: &str,
    profile_predicate_id: &str,
    pointer: &Identity,
    fields: &[ProfileField],
) -> Result<(), GraphError> {
    let owners = ClaimFilter::with_predicate(IdentityFilter::id(profile_predicate_id))
        .and(ClaimFilter::with_object(IdentityFilter::id(&pointer.identity_id)));
    if let Some(other) = client
        .query_claims(&owners)
        .await?
        .into_iter()
        .find(|link| link.subject_id != user_id)
    {
        return Err(GraphError::Conflict(format!(
            "profile pointer {:?} belongs to identity {}",
            pointer.display_name, other.subject_id
        )));
    }

    let pairs = field_pairs(client, &pointer.identity_id).await?;
    let mut current = Profile::fold(pairs.iter().map(|(f, v)| (f, v)));
    for f in fields {
        if let Some(stored) = current.get(&f.field) {
            if stored != f.value {
                return Err(GraphError::Conflict(format!(
                    "profile field {:?} already holds {stored:?}, not {:?}",
                    f.field, f.value
                )));
            }
        }
        current.insert(f.field.as_str(), f.value.as_str());
    }
    Ok(())
}

/// Write `fields` into `user_id`'s profile and return the pointer.
///
/// A user already linked to a pointer keeps it and `pointer_name` is
/// ignored; otherwise the pointer is got-or-created by name and linked last,
/// after its field claims exist. Re-running with the same fields is a no-op.
///
/// Fails with [`GraphError::Conflict`] before any field is written when the
/// pointer is linked to a different user, when a field would change its
/// stored value, or when `fields` gives one field two values.
pub async fn write_profile(
    client: &GraphClient,
    user_id: &str,
    profile_predicate_id: &str,
    pointer_name: &str,
    pointer_description: &str,
    fields: &[ProfileField],
) -> Result<Identity, GraphError> {
    let links = pointer_links(client, user_id, profile_predicate_id).await?;
    if links.len() > 1 {
        return Err(GraphError::ConsistencyViolation(format!(
            "identity {user_id} has {} profile pointers",
            links.len()
        )));
    }

    let pointer = match links.first() {
        Some(link) => {
            let pointer = endpoint(client, &mut HashMap::new(), &link.object_id).await?;
            tracing::debug!(
                user = %user_id,
                pointer = %pointer.identity_id,
                "reusing profile pointer"
            );
            check_pointer(client, user_id, profile_predicate_id, &pointer, fields).await?;
            pointer
        }
        None => {
            let pointer = client
                .get_or_create_identity(pointer_name, pointer_description)
                .await?
                .into_inner();
            // An existing pointer of that name may belong to someone else.
            check_pointer(client, user_id, profile_predicate_id, &pointer, fields).await?;
            pointer
        }
    };

    for f in fields {
        let field = client
            .get_or_create_identity(&f.field, &f.field_description)
            .await?
            .into_inner();
        let value = client
            .get_or_create_identity(&f.value, &f.value_description)
            .await?
            .into_inner();
        client
            .get_or_create_claim(
                &pointer.identity_id,
                &field.identity_id,
                &value.identity_id,
                true,
            )
            .await?;
    }

    client
        .get_or_create_claim(user_id, profile_predicate_id, &pointer.identity_id, true)
        .await?;
    tracing::info!(
        caller = %client.caller(),
        user = %user_id,
        pointer = %pointer.display_name,
        fields = fields.len(),
        "profile written"
    );
    Ok(pointer)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::memory::MemoryStorage;
    use std::sync::Arc;

    struct Fixture {
        client: GraphClient,
        user: Identity,
        profile: Identity,
    }

    async fn fixture() -> Fixture {
        let client = GraphClient::new(Arc::new(MemoryStorage::new()), "tester")
            .with_retry(crate::RetryPolicy::none());
        let user = client.create_identity("My User", "").await.unwrap();
        let profile = client.create_identity("Profile", "").await.unwrap();
        Fixture { client, user, profile }
    }

    #[tokio::test]
    async fn write_then_reconstruct() {
        let fx = fixture().await;
        let pointer = write_profile(
            &fx.client,
            &fx.user.identity_id,
            &fx.profile.identity_id,
            "PROFILE1: My User",
            "first profile",
            &[
                ProfileField::new("Favorite Ice Cream", "Superman"),
                ProfileField::new("Shoe Width", "Fred Flinstone"),
            ],
        )
        .await
        .unwrap();
        assert_eq!(pointer.display_name, "PROFILE1: My User");

        let profile = reconstruct_profile(&fx.client, &fx.user.identity_id, &fx.profile.identity_id)
            .await
            .unwrap();
        assert_eq!(profile.len(), 2);
        assert_eq!(profile.get("Favorite Ice Cream"), Some("Superman"));
        assert_eq!(profile.get("Shoe Width"), Some("Fred Flinstone"));
    }

    #[tokio::test]
    async fn rewrite_is_idempotent_and_extends() {
        let fx = fixture().await;
        let fields = [ProfileField::new("Color", "Blue")];
        let (u, p) = (&fx.user.identity_id, &fx.profile.identity_id);
        let first = write_profile(&fx.client, u, p, "PP", "", &fields).await.unwrap();
        let claims_before = fx.client.query_claims(&ClaimFilter::All).await.unwrap().len();
        let again = write_profile(&fx.client, u, p, "PP", "", &fields).await.unwrap();
        assert_eq!(first, again);
        assert_eq!(
            fx.client.query_claims(&ClaimFilter::All).await.unwrap().len(),
            claims_before
        );

        // A different pointer name is ignored once a pointer is linked.
        write_profile(&fx.client, u, p, "Other", "", &[ProfileField::new("Size", "L")])
            .await
            .unwrap();
        let profile = reconstruct_profile(&fx.client, u, p).await.unwrap();
        assert_eq!(profile.len(), 2);
        assert!(fx.client.find_identity_by_name("Other").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn changing_a_field_conflicts_without_writing() {
        let fx = fixture().await;
        let (u, p) = (&fx.user.identity_id, &fx.profile.identity_id);
        write_profile(&fx.client, u, p, "PP", "", &[ProfileField::new("Color", "Blue")])
            .await
            .unwrap();
        let err = write_profile(
            &fx.client,
            u,
            p,
            "PP",
            "",
            &[ProfileField::new("Size", "L"), ProfileField::new("Color", "Red")],
        )
        .await
        .unwrap_err();
        assert!(matches!(err, GraphError::Conflict(_)));
        assert!(fx.client.find_identity_by_name("Size").await.unwrap().is_none());
        assert!(fx.client.find_identity_by_name("Red").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn another_users_pointer_is_not_shared() {
        let fx = fixture().await;
        let p = &fx.profile.identity_id;
        let other = fx.client.create_identity("My Other User", "").await.unwrap();
        write_profile(
            &fx.client,
            &fx.user.identity_id,
            p,
            "PP",
            "",
            &[ProfileField::new("Color", "Blue")],
        )
        .await
        .unwrap();

        for value in ["Red", "Blue"] {
            let err = write_profile(
                &fx.client,
                &other.identity_id,
                p,
                "PP",
                "",
                &[ProfileField::new("Color", value)],
            )
            .await
            .unwrap_err();
            assert!(matches!(err, GraphError::Conflict(_)), "{value}: {err:?}");
        }

        let profile = reconstruct_profile(&fx.client, &fx.user.identity_id, p)
            .await
            .unwrap();
        assert_eq!(profile.get("Color"), Some("Blue"));
        assert_eq!(profile.len(), 1);
        assert!(fx.client.find_identity_by_name("Red").await.unwrap().is_none());
        let err = resolve_profile_pointer(&fx.client, &other.identity_id, p)
            .await
            .unwrap_err();
        assert!(matches!(err, GraphError::ConsistencyViolation(_)));
    }

    #[tokio::test]
    async fn unlinked_named_pointer_keeps_its_fields() {
        let fx = fixture().await;
        let pointer = fx.client.create_identity("PP", "").await.unwrap();
        let color = fx.client.create_identity("Color", "").await.unwrap();
        let blue = fx.client.create_identity("Blue", "").await.unwrap();
        fx.client
            .create_claim(&pointer.identity_id, &color.identity_id, &blue.identity_id, true)
            .await
            .unwrap();

        let (u, p) = (&fx.user.identity_id, &fx.profile.identity_id);
        let err = write_profile(&fx.client, u, p, "PP", "", &[ProfileField::new("Color", "Red")])
            .await
            .unwrap_err();
        assert!(matches!(err, GraphError::Conflict(_)));

        write_profile(&fx.client, u, p, "PP", "", &[ProfileField::new("Size", "L")])
            .await
            .unwrap();
        let profile = reconstruct_profile(&fx.client, u, p).await.unwrap();
        assert_eq!(profile.get("Color"), Some("Blue"));
        assert_eq!(profile.get("Size"), Some("L"));
    }

    #[tokio::test]
    async fn missing_pointer_is_a_consistency_violation() {
        let fx = fixture().await;
        let err = reconstruct_profile(&fx.client, &fx.user.identity_id, &fx.profile.identity_id)
            .await
            .unwrap_err();
        assert!(matches!(err, GraphError::ConsistencyViolation(_)));
    }

    #[tokio::test]
    async fn two_pointers_is_a_consistency_violation() {
        let fx = fixture().await;
        let (u, p) = (&fx.user.identity_id, &fx.profile.identity_id);
        let a = fx.client.create_identity("PP-A", "").await.unwrap();
        let b = fx.client.create_identity("PP-B", "").await.unwrap();
        fx.client.create_claim(u, p, &a.identity_id, true).await.unwrap();
        fx.client.create_claim(u, p, &b.identity_id, true).await.unwrap();

        let err = resolve_profile_pointer(&fx.client, u, p).await.unwrap_err();
        assert!(matches!(err, GraphError::ConsistencyViolation(_)));
        let err = write_profile(&fx.client, u, p, "PP", "", &[]).await.unwrap_err();
        assert!(matches!(err, GraphError::ConsistencyViolation(_)));
    }

    #[tokio::test]
    async fn empty_pointer_reconstructs_empty_profile() {
        let fx = fixture().await;
        let (u, p) = (&fx.user.identity_id, &fx.profile.identity_id);
        write_profile(&fx.client, u, p, "PP", "", &[]).await.unwrap();
        assert!(reconstruct_profile(&fx.client, u, p).await.unwrap().is_empty());
    }
}
