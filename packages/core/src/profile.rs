//! Profiles: flexible, caller-defined records built from claims.
//!
//! A profile hangs off a *pointer* identity. The user links to the pointer
//! with `user --ProfilePointer--> pointer`, and every field is a claim
//! `pointer --field--> value`. Reading a profile folds those field claims
//! into a flat `field display name → value display name` map.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::types::Identity;

/// A reconstructed profile. Read-only projection; holds no references into
/// the store.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct Profile {
    fields: BTreeMap<String, String>,
}

impl Profile {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold `(field, value)` identity pairs into a profile.
    ///
    /// Two pairs with the same field display name collide; the later one wins.
    pub fn fold<'a>(pairs: impl IntoIterator<Item = (&'a Identity, &'a Identity)>) -> Self {
        let mut profile = Self::new();
        for (field, value) in pairs {
            profile.insert(&field.display_name, &value.display_name);
        }
        profile
    }

    /// Set `field` to `value`, returning the previous value.
    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.fields.insert(field.into(), value.into())
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.fields.get(field).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Fields in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Profile {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut profile = Self::new();
        for (k, v) in iter {
            profile.insert(k, v);
        }
        profile
    }
}

/// One field to write into a profile: the field identity and the value
/// identity, each by display name with the description used if it has to be
/// created. Existing identities are reused by name.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProfileField {
    pub field: String,
    #[serde(default)]
    pub field_description: String,
    pub value: String,
    #[serde(default)]
    pub value_description: String,
}

impl ProfileField {
    pub fn new(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            field_description: String::new(),
            value: value.into(),
            value_description: String::new(),
        }
    }

    pub fn describe(
        mut self,
        field_description: impl Into<String>,
        value_description: impl Into<String>,
    ) -> Self {
        self.field_description = field_description.into();
        self.value_description = value_description.into();
        self
    }
}

/// Parses `FIELD=VALUE`. Only the first `=` splits, so values may contain `=`.
impl std::str::FromStr for ProfileField {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('=') {
            Some((field, value)) if !field.trim().is_empty() && !value.trim().is_empty() => {
                Ok(ProfileField::new(field.trim(), value.trim()))
            }
            _ => Err(format!("invalid profile field {:?}; expected FIELD=VALUE", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fold_maps_display_names() {
        let f1 = Identity::new("Favorite Ice Cream", "");
        let v1 = Identity::new("Superman", "");
        let f2 = Identity::new("Shoe Width", "");
        let v2 = Identity::new("Fred Flinstone", "");
        let p = Profile::fold([(&f1, &v1), (&f2, &v2)]);
        assert_eq!(p.len(), 2);
        assert_eq!(p.get("Favorite Ice Cream"), Some("Superman"));
        assert_eq!(p.get("Shoe Width"), Some("Fred Flinstone"));
    }

    #[test]
    fn fold_is_order_independent_for_distinct_fields() {
        let f1 = Identity::new("a", "");
        let v1 = Identity::new("1", "");
        let f2 = Identity::new("b", "");
        let v2 = Identity::new("2", "");
        assert_eq!(
            Profile::fold([(&f1, &v1), (&f2, &v2)]),
            Profile::fold([(&f2, &v2), (&f1, &v1)])
        );
    }

    #[test]
    fn colliding_field_names_last_wins() {
        let f = Identity::new("Color", "");
        let red = Identity::new("Red", "");
        let blue = Identity::new("Blue", "");
        let p = Profile::fold([(&f, &red), (&f, &blue)]);
        assert_eq!(p.len(), 1);
        assert_eq!(p.get("Color"), Some("Blue"));
    }

    #[test]
    fn serialises_as_flat_map() {
        let p: Profile = [("Worst Superhero", "Superman")].into_iter().collect();
        assert_eq!(
            serde_json::to_string(&p).unwrap(),
            r#"{"Worst Superhero":"Superman"}"#
        );
    }

    #[test]
    fn parse_field_assignment() {
        let f: ProfileField = "Shoe Width = Fred Flinstone".parse().unwrap();
        assert_eq!(f.field, "Shoe Width");
        assert_eq!(f.value, "Fred Flinstone");

        let f: ProfileField = "eq=a=b".parse().unwrap();
        assert_eq!(f.value, "a=b");

        assert!("novalue=".parse::<ProfileField>().is_err());
        assert!("no separator".parse::<ProfileField>().is_err());
    }
}
