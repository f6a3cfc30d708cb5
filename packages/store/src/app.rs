//! An application built on the claim graph.
//!
//! The application is itself an identity, and it gives a handful of other
//! identities special meaning (see [`SpecialPredicate`]). [`Application`]
//! resolves those once at startup and then offers membership and profile
//! operations in terms of the typed registry rather than display names.

use claimgraph::{
    AppConventions, Claim, GetOrCreate, Identity, IdentityFilter, Profile, ProfileField,
    SpecialPredicate, SpecialPredicates,
};

use crate::client::GraphClient;
use crate::error::GraphError;
use crate::profile;

/// Get-or-create the application identity and every special predicate.
pub async fn resolve_special_predicates(
    client: &GraphClient,
    conventions: &AppConventions,
) -> Result<SpecialPredicates, GraphError> {
    let app = client
        .get_or_create_identity(
            &conventions.app_name,
            &format!("The {:?} application", conventions.app_name),
        )
        .await?
        .into_inner();

    let mut ids = Vec::with_capacity(SpecialPredicate::ALL.len());
    for predicate in SpecialPredicate::ALL {
        let identity = client
            .get_or_create_identity(
                conventions.name_of(predicate),
                &conventions.description_of(predicate),
            )
            .await?
            .into_inner();
        tracing::debug!(%predicate, id = %identity.identity_id, "resolved special predicate");
        ids.push((predicate, identity.identity_id));
    }

    SpecialPredicates::from_ids(app.identity_id, ids).ok_or_else(|| {
        GraphError::ConsistencyViolation("special predicate registry is incomplete".into())
    })
}

/// A caller's view of one application.
#[derive(Clone)]
pub struct Application {
    client: GraphClient,
    conventions: AppConventions,
    registry: SpecialPredicates,
}

impl Application {
    /// Resolve the registry for `conventions` and bind it to `client`.
    pub async fn bootstrap(
        client: GraphClient,
        conventions: AppConventions,
    ) -> Result<Self, GraphError> {
        let registry = resolve_special_predicates(&client, &conventions).await?;
        tracing::info!(app = %conventions.app_name, id = %registry.app_id(), "application ready");
        Ok(Self {
            client,
            conventions,
            registry,
        })
    }

    /// The same application, acting as another caller.
    pub fn for_caller(&self, client: GraphClient) -> Self {
        Self {
            client,
            conventions: self.conventions.clone(),
            registry: self.registry.clone(),
        }
    }

    pub fn client(&self) -> &GraphClient {
        &self.client
    }

    pub fn conventions(&self) -> &AppConventions {
        &self.conventions
    }

    pub fn registry(&self) -> &SpecialPredicates {
        &self.registry
    }

    // --- Membership ----------------------------------------------------------

    /// Make `user_id` a member: `user --Member--> app`, attested by the
    /// caller when the claim is new.
    pub async fn join(&self, user_id: &str) -> Result<GetOrCreate<Claim>, GraphError> {
        let claim = self
            .client
            .get_or_create_claim(
                user_id,
                self.registry.id(SpecialPredicate::Member),
                self.registry.app_id(),
                true,
            )
            .await?;
        if let GetOrCreate::Created(created) = &claim {
            self.client.attest_claim(&created.claim_id, true).await?;
        }
        Ok(claim)
    }

    /// Filter selecting the application's members.
    pub fn members_filter(&self) -> IdentityFilter {
        IdentityFilter::subject_of(
            IdentityFilter::id(self.registry.id(SpecialPredicate::Member)),
            IdentityFilter::id(self.registry.app_id()),
        )
    }

    /// Every identity with a membership claim.
    pub async fn members(&self) -> Result<Vec<Identity>, GraphError> {
        self.client.query_identities(&self.members_filter()).await
    }

    // --- Profiles ------------------------------------------------------------

    pub async fn write_profile(
        &self,
        user_id: &str,
        pointer_name: &str,
        pointer_description: &str,
        fields: &[ProfileField],
    ) -> Result<Identity, GraphError> {
        profile::write_profile(
            &self.client,
            user_id,
            self.registry.id(SpecialPredicate::ProfilePointer),
            pointer_name,
            pointer_description,
            fields,
        )
        .await
    }

    pub async fn profile(&self, user_id: &str) -> Result<Profile, GraphError> {
        profile::reconstruct_profile(
            &self.client,
            user_id,
            self.registry.id(SpecialPredicate::ProfilePointer),
        )
        .await
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::memory::MemoryStorage;
    use std::sync::Arc;

    async fn app() -> Application {
        let client = GraphClient::new(Arc::new(MemoryStorage::new()), "alice");
        Application::bootstrap(client, AppConventions::default()).await.unwrap()
    }

    #[tokio::test]
    async fn bootstrap_is_idempotent() {
        let first = app().await;
        let again = Application::bootstrap(first.client().clone(), AppConventions::default())
            .await
            .unwrap();
        assert_eq!(first.registry(), again.registry());
        let app = first.client().identity_by_name("Internet Amigos").await.unwrap();
        assert_eq!(app.identity_id, first.registry().app_id());
        assert_eq!(
            first.registry().lookup(first.registry().id(SpecialPredicate::Member)),
            Some(SpecialPredicate::Member)
        );
    }

    #[tokio::test]
    async fn join_attests_once_and_lists_members() {
        let app = app().await;
        let alice = app.client().create_identity("Alice", "").await.unwrap();
        let _outsider = app.client().create_identity("Outsider", "").await.unwrap();

        let joined = app.join(&alice.identity_id).await.unwrap();
        assert!(joined.was_created());
        let rejoined = app.join(&alice.identity_id).await.unwrap();
        assert!(!rejoined.was_created());

        let tally = app.client().tally(&joined.get().claim_id).await.unwrap();
        assert_eq!(tally.affirming, 1);
        assert_eq!(app.members().await.unwrap(), vec![alice]);
    }

    #[tokio::test]
    async fn callers_share_value_identities() {
        let app = app().await;
        let bob = app.for_caller(app.client().as_caller("bob"));
        let u1 = app.client().create_identity("My User", "").await.unwrap();
        let u2 = bob.client().create_identity("My Other User", "").await.unwrap();

        let ice_cream = [ProfileField::new("Favorite Ice Cream", "Superman")];
        app.write_profile(&u1.identity_id, "PROFILE1: My User", "", &ice_cream)
            .await
            .unwrap();
        let superhero = [ProfileField::new("Worst Superhero", "Superman")];
        bob.write_profile(&u2.identity_id, "PROFILE2: My Other User", "", &superhero)
            .await
            .unwrap();

        assert_eq!(
            app.client()
                .query_identities(&IdentityFilter::display_name("Superman"))
                .await
                .unwrap()
                .len(),
            1
        );
        let theirs = app.profile(&u2.identity_id).await.unwrap();
        assert_eq!(theirs.get("Worst Superhero"), Some("Superman"));
        let mine = bob.profile(&u1.identity_id).await.unwrap();
        assert_eq!(mine.get("Favorite Ice Cream"), Some("Superman"));
    }
}
