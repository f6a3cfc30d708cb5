//! Data model of the claim graph.
//!
//! Identities are nodes; claims are directed, attestable
//! subject–predicate–object triples over identities. Applications use the
//! graph as a schema-less data layer: memberships, custom profile fields,
//! and attested relationships are all just claims.
//!
//! This crate is pure logic with no I/O. The persistent stores and the
//! caller-facing client live in `claimgraph-store`.
//!
//! # Crate layout
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`types`] | Records: [`Identity`], [`Claim`], [`Attestation`], [`GetOrCreate`] |
//! | [`filter`] | Filter trees: [`IdentityFilter`], [`ClaimFilter`], [`Participation`] |
//! | [`query`] | Filter evaluation over any [`GraphView`] |
//! | [`graph`] | In-memory [`Graph`] enforcing the store invariants |
//! | [`special`] | Typed registry of [`SpecialPredicate`]s |
//! | [`profile`] | [`Profile`] folding and [`ProfileField`] inputs |
//! | [`validation`] | Record conformance checks |
//! | [`render`] | Human-readable text rendering |
//!
//! # Quick start
//!
//! ```rust
//! use claimgraph::{query, Claim, Graph, Identity, IdentityFilter};
//!
//! let alice = Identity::new("Alice", "a user");
//! let guest = Identity::new("Guest", "membership predicate");
//! let club = Identity::new("Club", "the app");
//! let claim = Claim::new(&alice.identity_id, &guest.identity_id, &club.identity_id, true);
//! let graph = Graph::from_records([alice, guest, club], [claim]).unwrap();
//!
//! let members = query::select_identities(
//!     &graph,
//!     &IdentityFilter::subject_of(
//!         IdentityFilter::display_name("Guest"),
//!         IdentityFilter::display_name("Club"),
//!     ),
//! );
//! assert_eq!(members[0].display_name, "Alice");
//! ```

pub mod filter;
pub mod graph;
pub mod profile;
pub mod query;
pub mod render;
pub mod special;
pub mod types;
pub mod validation;

pub use filter::{
    ClaimFilter, FieldOp, FieldPredicate, IdentityField, IdentityFilter, Participation,
};
pub use graph::{Graph, InsertError};
pub use profile::{Profile, ProfileField};
pub use query::GraphView;
pub use special::{AppConventions, SpecialPredicate, SpecialPredicates};
pub use types::{Attestation, AttestationTally, Claim, GetOrCreate, Identity, Role};
pub use validation::{
    validate_attestation, validate_claim, validate_display_name, validate_identity, ValidationError,
};
