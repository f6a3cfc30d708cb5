//! # claimgraph-store
//!
//! The Identity Store and Claim Store of the claim graph, and the
//! caller-side conventions built on them.
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`storage`] | The async [`Storage`] contract with in-memory and SQLite backends |
//! | [`client`] | [`GraphClient`]: per-caller get-or-create, lookups, attestations |
//! | [`profile`] | Profile pointer resolution, reconstruction and writing |
//! | [`app`] | [`Application`]: special-predicate registry, membership, profiles |
//! | [`config`] | [`StoreConfig`] from environment variables |
//! | [`error`] | The caller-facing [`GraphError`] taxonomy |
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use claimgraph::IdentityFilter;
//! use claimgraph_store::{open_storage, GraphClient, StoreConfig};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = StoreConfig::from_env();
//! let client = GraphClient::from_config(open_storage(&config)?, &config);
//!
//! let alice = client.get_or_create_identity("Alice", "").await?.into_inner();
//! let guest = client.get_or_create_identity("Guest", "").await?.into_inner();
//! let club = client.get_or_create_identity("Club", "").await?.into_inner();
//! client
//!     .get_or_create_claim(&alice.identity_id, &guest.identity_id, &club.identity_id, true)
//!     .await?;
//!
//! let members = client
//!     .query_identities(&IdentityFilter::subject_of(
//!         IdentityFilter::display_name("Guest"),
//!         IdentityFilter::display_name("Club"),
//!     ))
//!     .await?;
//! assert_eq!(members, vec![alice]);
//! # Ok(())
//! # }
//! ```

pub mod app;
pub mod client;
pub mod config;
pub mod error;
pub mod profile;
pub mod retry;
pub mod storage;

pub use app::{resolve_special_predicates, Application};
pub use client::GraphClient;
pub use config::StoreConfig;
pub use error::GraphError;
pub use profile::{reconstruct_profile, resolve_profile_pointer, write_profile};
pub use retry::RetryPolicy;
pub use storage::{open_storage, Storage, StorageError};
