//! Query evaluation over any read-only view of the claim graph.
//!
//! [`GraphView`] is the minimal read surface the evaluator needs. The
//! in-memory [`Graph`](crate::Graph) implements it directly; other stores
//! may implement it or translate filters into their own query language, as
//! long as they return the same result sets.
//!
//! Participation filters are a join `Identity ⋈ Claim ⋈ Identity`: the
//! candidate identity must occupy the named role in at least one claim whose
//! other endpoints, resolved to identities, satisfy their sub-filters.
//! Sub-filters recurse, so evaluation depth is bounded by filter depth.

use crate::filter::{ClaimFilter, IdentityFilter, Participation};
use crate::types::{Claim, Identity, Role};

/// Read access to identities and claims.
pub trait GraphView {
    fn identity(&self, id: &str) -> Option<&Identity>;

    /// All identities, in the view's natural order.
    fn identities(&self) -> Box<dyn Iterator<Item = &Identity> + '_>;

    /// All claims, in the view's natural order.
    fn claims(&self) -> Box<dyn Iterator<Item = &Claim> + '_>;

    /// Claims in which `id` occupies `role`. The default scans every claim.
    fn claims_by_endpoint(&self, role: Role, id: &str) -> Vec<&Claim> {
        self.claims().filter(|c| c.endpoint(role) == id).collect()
    }
}

impl IdentityFilter {
    /// Whether `identity` satisfies this filter within `view`.
    pub fn matches<V: GraphView + ?Sized>(&self, identity: &Identity, view: &V) -> bool {
        match self {
            IdentityFilter::All => true,
            IdentityFilter::Field(predicate) => predicate.matches(identity),
            IdentityFilter::InClaim(participation) => {
                participates(view, participation, &identity.identity_id)
            }
            IdentityFilter::And(parts) => parts.iter().all(|f| f.matches(identity, view)),
            IdentityFilter::Or(parts) => parts.iter().any(|f| f.matches(identity, view)),
            IdentityFilter::Not(inner) => !inner.matches(identity, view),
        }
    }
}

impl ClaimFilter {
    /// Whether `claim` satisfies this filter within `view`.
    ///
    /// Anchored sub-filters are applied to the resolved endpoint identity;
    /// an endpoint that does not resolve matches nothing.
    pub fn matches<V: GraphView + ?Sized>(&self, claim: &Claim, view: &V) -> bool {
        match self {
            ClaimFilter::All => true,
            ClaimFilter::WithSubject(f) => endpoint_matches(view, claim, Role::Subject, f),
            ClaimFilter::WithPredicate(f) => endpoint_matches(view, claim, Role::Predicate, f),
            ClaimFilter::WithObject(f) => endpoint_matches(view, claim, Role::Object, f),
            ClaimFilter::Direction(d) => claim.direction == *d,
            ClaimFilter::And(parts) => parts.iter().all(|f| f.matches(claim, view)),
            ClaimFilter::Or(parts) => parts.iter().any(|f| f.matches(claim, view)),
            ClaimFilter::Not(inner) => !inner.matches(claim, view),
        }
    }
}

fn endpoint_matches<V: GraphView + ?Sized>(
    view: &V,
    claim: &Claim,
    role: Role,
    filter: &IdentityFilter,
) -> bool {
    view.identity(claim.endpoint(role))
        .is_some_and(|i| filter.matches(i, view))
}

fn participates<V: GraphView + ?Sized>(
    view: &V,
    participation: &Participation,
    identity_id: &str,
) -> bool {
    let constraints = participation.constraints();
    view.claims_by_endpoint(participation.role(), identity_id)
        .into_iter()
        .any(|claim| {
            constraints.iter().all(|(role, sub)| match sub {
                None => true,
                Some(f) => endpoint_matches(view, claim, *role, f),
            })
        })
}

/// All identities in `view` matching `filter`, in view order.
pub fn select_identities<V: GraphView + ?Sized>(
    view: &V,
    filter: &IdentityFilter,
) -> Vec<Identity> {
    view.identities()
        .filter(|i| filter.matches(i, view))
        .cloned()
        .collect()
}

/// All claims in `view` matching `filter`, in view order.
pub fn select_claims<V: GraphView + ?Sized>(view: &V, filter: &ClaimFilter) -> Vec<Claim> {
    view.claims()
        .filter(|c| filter.matches(c, view))
        .cloned()
        .collect()
}

// --- tests -------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::{FieldOp, IdentityField};
    use crate::graph::Graph;

    struct Fixture {
        graph: Graph,
        alice: Identity,
        bob: Identity,
        guest: Identity,
        club: Identity,
        other_club: Identity,
    }

    fn fixture() -> Fixture {
        let alice = Identity::new("Alice", "a user");
        let bob = Identity::new("Bob", "another user");
        let guest = Identity::new("Guest", "membership predicate");
        let club = Identity::new("Club", "the app");
        let other_club = Identity::new("Other Club", "some other app");
        let claims = vec![
            Claim::new(&alice.identity_id, &guest.identity_id, &club.identity_id, true),
            Claim::new(&bob.identity_id, &guest.identity_id, &other_club.identity_id, true),
        ];
        let graph = Graph::from_records(
            vec![
                alice.clone(),
                bob.clone(),
                guest.clone(),
                club.clone(),
                other_club.clone(),
            ],
            claims,
        )
        .unwrap();
        Fixture {
            graph,
            alice,
            bob,
            guest,
            club,
            other_club,
        }
    }

    fn names(ids: &[Identity]) -> Vec<&str> {
        let mut names: Vec<&str> = ids.iter().map(|i| i.display_name.as_str()).collect();
        names.sort_unstable();
        names
    }

    #[test]
    fn participation_as_subject() {
        let f = fixture();
        let filter = IdentityFilter::subject_of(
            IdentityFilter::display_name("Guest"),
            IdentityFilter::display_name("Club"),
        );
        let result = select_identities(&f.graph, &filter);
        assert_eq!(names(&result), vec!["Alice"]);
    }

    #[test]
    fn participation_sub_filters_apply_to_identities_not_ids() {
        let f = fixture();
        // Matching on description reaches through the claim to the object record.
        let filter = IdentityFilter::subject_of(
            IdentityFilter::All,
            IdentityFilter::field(IdentityField::Description, FieldOp::Contains, "other"),
        );
        assert_eq!(names(&select_identities(&f.graph, &filter)), vec!["Bob"]);
    }

    #[test]
    fn participation_as_object_and_predicate() {
        let f = fixture();
        let objects = IdentityFilter::object_of(
            IdentityFilter::id(&f.alice.identity_id),
            IdentityFilter::All,
        );
        assert_eq!(names(&select_identities(&f.graph, &objects)), vec!["Club"]);

        let predicates = IdentityFilter::InClaim(Participation::AsPredicate {
            where_subject: None,
            where_object: None,
        });
        assert_eq!(names(&select_identities(&f.graph, &predicates)), vec!["Guest"]);
    }

    #[test]
    fn empty_result_is_not_an_error() {
        let f = fixture();
        let filter = IdentityFilter::subject_of(
            IdentityFilter::display_name("Guest"),
            IdentityFilter::display_name("Nowhere"),
        );
        assert!(select_identities(&f.graph, &filter).is_empty());
    }

    #[test]
    fn combinators() {
        let f = fixture();
        let users = IdentityFilter::subject_of(IdentityFilter::All, IdentityFilter::All);
        let not_alice = users.clone().and(IdentityFilter::display_name("Alice").negate());
        assert_eq!(names(&select_identities(&f.graph, &not_alice)), vec!["Bob"]);

        let either = IdentityFilter::display_name("Club").or(IdentityFilter::display_name("Guest"));
        assert_eq!(names(&select_identities(&f.graph, &either)), vec!["Club", "Guest"]);
    }

    #[test]
    fn subject_anchored_claim_filter() {
        let f = fixture();
        let filter = ClaimFilter::with_subject(IdentityFilter::display_name("Alice"))
            .and(ClaimFilter::with_predicate(IdentityFilter::display_name("Guest")));
        let claims = select_claims(&f.graph, &filter);
        assert_eq!(claims.len(), 1);
        assert_eq!(claims[0].object_id, f.club.identity_id);

        let by_object = ClaimFilter::with_object(IdentityFilter::id(&f.other_club.identity_id));
        let claims = select_claims(&f.graph, &by_object);
        assert_eq!(claims.len(), 1);
        assert_eq!(claims[0].subject_id, f.bob.identity_id);
    }

    #[test]
    fn triple_and_direction_filters() {
        let f = fixture();
        let triple = ClaimFilter::triple(
            &f.alice.identity_id,
            &f.guest.identity_id,
            &f.club.identity_id,
        );
        assert_eq!(select_claims(&f.graph, &triple).len(), 1);
        assert!(select_claims(&f.graph, &ClaimFilter::Direction(false)).is_empty());
        assert_eq!(select_claims(&f.graph, &ClaimFilter::All).len(), 2);
    }

    #[test]
    fn default_endpoint_scan_agrees_with_index() {
        struct Scan<'a>(&'a Graph);
        impl GraphView for Scan<'_> {
            fn identity(&self, id: &str) -> Option<&Identity> {
                self.0.identity(id)
            }
            fn identities(&self) -> Box<dyn Iterator<Item = &Identity> + '_> {
                self.0.identities()
            }
            fn claims(&self) -> Box<dyn Iterator<Item = &Claim> + '_> {
                self.0.claims()
            }
        }

        let f = fixture();
        let filter = IdentityFilter::subject_of(
            IdentityFilter::display_name("Guest"),
            IdentityFilter::display_name("Club"),
        );
        assert_eq!(
            select_identities(&Scan(&f.graph), &filter),
            select_identities(&f.graph, &filter)
        );
    }
}
