//! Special predicates: identities an application elevates to fixed relation
//! types.
//!
//! The store treats special predicates as ordinary identities. The typed
//! registry here maps each [`SpecialPredicate`] to the identity id it was
//! resolved to at startup, so callers look relations up by variant instead
//! of matching display names.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A relation type with application-defined meaning.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SpecialPredicate {
    /// `user --Member--> app`: the user belongs to the application.
    Member,
    /// `user --ProfilePointer--> pointer`: the pointer anchors the user's
    /// profile field claims.
    ProfilePointer,
}

impl SpecialPredicate {
    pub const ALL: [SpecialPredicate; 2] =
        [SpecialPredicate::Member, SpecialPredicate::ProfilePointer];
}

impl std::fmt::Display for SpecialPredicate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SpecialPredicate::Member => write!(f, "member"),
            SpecialPredicate::ProfilePointer => write!(f, "profile_pointer"),
        }
    }
}

/// The display names an application uses for its own identity and for its
/// special predicates.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AppConventions {
    /// Display name of the application identity (the object of membership claims).
    pub app_name: String,
    pub member_predicate: String,
    pub profile_predicate: String,
}

impl AppConventions {
    pub fn new(
        app_name: impl Into<String>,
        member_predicate: impl Into<String>,
        profile_predicate: impl Into<String>,
    ) -> Self {
        Self {
            app_name: app_name.into(),
            member_predicate: member_predicate.into(),
            profile_predicate: profile_predicate.into(),
        }
    }

    /// Display name of the identity backing `predicate`.
    pub fn name_of(&self, predicate: SpecialPredicate) -> &str {
        match predicate {
            SpecialPredicate::Member => &self.member_predicate,
            SpecialPredicate::ProfilePointer => &self.profile_predicate,
        }
    }

    /// Description given to the identity backing `predicate` when it is created.
    pub fn description_of(&self, predicate: SpecialPredicate) -> String {
        match predicate {
            SpecialPredicate::Member => format!("Members of the {:?} application", self.app_name),
            SpecialPredicate::ProfilePointer => {
                format!("User profiles for the {:?} application", self.app_name)
            }
        }
    }
}

impl Default for AppConventions {
    fn default() -> Self {
        Self::new("Internet Amigos", "Esteemed Guest", "Internet Amigos Profile")
    }
}

/// Special predicates resolved to identity ids, plus the application identity.
///
/// Deserializing goes through [`SpecialPredicates::from_ids`], so a
/// registry missing a variant is rejected.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(try_from = "RawSpecialPredicates")]
pub struct SpecialPredicates {
    app_id: String,
    ids: BTreeMap<SpecialPredicate, String>,
}

#[derive(Deserialize)]
struct RawSpecialPredicates {
    app_id: String,
    ids: BTreeMap<SpecialPredicate, String>,
}

impl TryFrom<RawSpecialPredicates> for SpecialPredicates {
    type Error = String;

    fn try_from(raw: RawSpecialPredicates) -> Result<Self, Self::Error> {
        let missing: Vec<String> = SpecialPredicate::ALL
            .iter()
            .filter(|p| !raw.ids.contains_key(*p))
            .map(ToString::to_string)
            .collect();
        Self::from_ids(raw.app_id, raw.ids)
            .ok_or_else(|| format!("special predicate registry lacks {}", missing.join(", ")))
    }
}

impl SpecialPredicates {
    /// Build a registry from resolved ids. Returns `None` if any variant of
    /// [`SpecialPredicate`] is missing.
    pub fn from_ids(
        app_id: impl Into<String>,
        ids: impl IntoIterator<Item = (SpecialPredicate, String)>,
    ) -> Option<Self> {
        let ids: BTreeMap<_, _> = ids.into_iter().collect();
        if SpecialPredicate::ALL.iter().any(|p| !ids.contains_key(p)) {
            return None;
        }
        Some(Self {
            app_id: app_id.into(),
            ids,
        })
    }

    /// Identity id of the application.
    pub fn app_id(&self) -> &str {
        &self.app_id
    }

    /// Identity id backing `predicate`.
    pub fn id(&self, predicate: SpecialPredicate) -> &str {
        // from_ids guarantees every variant is present
        self.ids.get(&predicate).map(String::as_str).unwrap_or_default()
    }

    /// The special predicate an identity id stands for, if any.
    pub fn lookup(&self, identity_id: &str) -> Option<SpecialPredicate> {
        self.ids
            .iter()
            .find(|(_, id)| id.as_str() == identity_id)
            .map(|(p, _)| *p)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_requires_every_variant() {
        let partial = [(SpecialPredicate::Member, "m".to_string())];
        assert!(SpecialPredicates::from_ids("app", partial).is_none());

        let reg = SpecialPredicates::from_ids(
            "app",
            [
                (SpecialPredicate::Member, "m".to_string()),
                (SpecialPredicate::ProfilePointer, "p".to_string()),
            ],
        )
        .unwrap();
        assert_eq!(reg.app_id(), "app");
        assert_eq!(reg.id(SpecialPredicate::ProfilePointer), "p");
        assert_eq!(reg.lookup("m"), Some(SpecialPredicate::Member));
        assert_eq!(reg.lookup("x"), None);
    }

    #[test]
    fn deserializing_checks_every_variant() {
        let err = serde_json::from_str::<SpecialPredicates>(
            r#"{ "app_id": "app", "ids": { "member": "m" } }"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("profile_pointer"), "{err}");

        let reg: SpecialPredicates = serde_json::from_str(
            r#"{ "app_id": "app", "ids": { "member": "m", "profile_pointer": "p" } }"#,
        )
        .unwrap();
        assert_eq!(reg.id(SpecialPredicate::ProfilePointer), "p");
        assert_eq!(serde_json::to_value(&reg).unwrap()["ids"]["member"], "m");
    }

    #[test]
    fn default_conventions() {
        let c = AppConventions::default();
        assert_eq!(c.name_of(SpecialPredicate::Member), "Esteemed Guest");
        assert_eq!(c.name_of(SpecialPredicate::ProfilePointer), "Internet Amigos Profile");
        assert!(c.description_of(SpecialPredicate::Member).contains("Internet Amigos"));
    }
}
