//! Human-readable text rendering of identities, claims, and profiles.
//!
//! The output is stable plain text for terminals and logs. It is not a
//! canonical format; only the JSON serialisation of records is.

use crate::profile::Profile;
use crate::types::{AttestationTally, Claim, Identity};

/// Render an identity on two lines.
///
/// ```text
/// My User
///   id: 019526b2-f68a-7c3e-a0b4-1d2e3f4a5b6c  "I <3 Intuition"
/// ```
pub fn render_identity(identity: &Identity) -> String {
    let mut out = String::new();
    out.push_str(&identity.display_name);
    out.push('\n');
    out.push_str(&format!("  id: {}", identity.identity_id));
    if !identity.description.is_empty() {
        out.push_str(&format!("  {:?}", identity.description));
    }
    out.push('\n');
    out
}

/// Render a claim as `"subject" --predicate--> "object"`, resolving endpoint
/// ids to display names with `name_of`. Unresolved endpoints print their id.
///
/// ```text
/// "My User" --Esteemed Guest--> "Internet Amigos"  (affirming)
///   claim: 019526b2-f68a-7c3e-a0b4-1d2e3f4a5b6d
/// ```
pub fn render_claim<'a, F>(claim: &'a Claim, name_of: F) -> String
where
    F: Fn(&'a str) -> Option<&'a str>,
{
    let name = |id: &'a str| name_of(id).unwrap_or(id);
    let polarity = if claim.direction { "affirming" } else { "denying" };
    format!(
        "{:?} --{}--> {:?}  ({})\n  claim: {}\n",
        name(&claim.subject_id),
        name(&claim.predicate_id),
        name(&claim.object_id),
        polarity,
        claim.claim_id
    )
}

/// Render an attestation tally on one line.
pub fn render_tally(tally: &AttestationTally) -> String {
    format!(
        "attestations: {} ({} affirming, {} denying)\n",
        tally.total(),
        tally.affirming,
        tally.denying
    )
}

/// Render a profile under a heading, one field per line with aligned values.
///
/// ```text
/// Profile of My User
///   Favorite Ice Cream  Superman
///   Shoe Width          Fred Flinstone
/// ```
pub fn render_profile(owner: &str, profile: &Profile) -> String {
    let mut out = format!("Profile of {}\n", owner);
    if profile.is_empty() {
        out.push_str("  (no fields)\n");
        return out;
    }
    let width = profile.iter().map(|(k, _)| k.chars().count()).max().unwrap_or(0);
    for (field, value) in profile.iter() {
        out.push_str(&format!("  {:<width$}  {}\n", field, value, width = width));
    }
    out
}

// --- tests -------------------------------------------------------------------
