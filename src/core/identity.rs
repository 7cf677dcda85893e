use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use crate::common::{FaceLockError, Result};

const MAX_IDENTITY_LEN: usize = 64;

/// A human-readable identity name that is always safe as a single path
/// component. Ordering is lexicographic on the name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Identity(String);

impl Identity {
    pub fn new(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        if name.is_empty() || name.len() > MAX_IDENTITY_LEN {
            return Err(FaceLockError::InvalidIdentity(format!(
                "'{}' must be 1 to {} characters", name, MAX_IDENTITY_LEN
            )));
        }
        if name == "." || name == ".." {
            return Err(FaceLockError::InvalidIdentity(name));
        }
        if !name.chars().all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.')) {
            return Err(FaceLockError::InvalidIdentity(format!(
                "'{}' may only contain letters, digits, '-', '_' and '.'", name
            )));
        }
        Ok(Self(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Identity {
    type Error = FaceLockError;

    fn try_from(value: String) -> Result<Self> {
        Identity::new(value)
    }
}

impl From<Identity> for String {
    fn from(identity: Identity) -> Self {
        identity.0
    }
}

impl std::str::FromStr for Identity {
    type Err = FaceLockError;

    fn from_str(s: &str) -> Result<Self> {
        Identity::new(s)
    }
}

/// Dense classifier label assigned to an identity by one training run.
pub type Label = u32;

/// Bidirectional Identity <-> label mapping produced by a single training run.
///
/// Labels are dense (`0..len`) and assigned in the order identities are
/// given. An index is never patched: retraining builds a fresh one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityIndex {
    by_label: Vec<Identity>,
    by_identity: BTreeMap<Identity, Label>,
}

impl IdentityIndex {
    pub fn from_ordered(identities: Vec<Identity>) -> Result<Self> {
        let mut by_identity = BTreeMap::new();
        for (label, identity) in identities.iter().enumerate() {
            if by_identity.insert(identity.clone(), label as Label).is_some() {
                return Err(FaceLockError::ModelCorrupt(format!(
                    "identity {} appears twice in index", identity
                )));
            }
        }
        Ok(Self { by_label: identities, by_identity })
    }

    pub fn identity(&self, label: Label) -> Option<&Identity> {
        self.by_label.get(label as usize)
    }

    pub fn label(&self, identity: &Identity) -> Option<Label> {
        self.by_identity.get(identity).copied()
    }

    pub fn len(&self) -> usize {
        self.by_label.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_label.is_empty()
    }

    /// Identities in label order.
    pub fn identities(&self) -> &[Identity] {
        &self.by_label
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_plain_names() {
        for name in ["alice", "Bob_2", "carol.smith", "d-e"] {
            assert_eq!(Identity::new(name).unwrap().as_str(), name);
        }
    }

    #[test]
    fn rejects_path_like_names() {
        for name in ["", ".", "..", "a/b", "../etc", "x y", "名前"] {
            assert!(
                matches!(Identity::new(name), Err(FaceLockError::InvalidIdentity(_))),
                "{name:?} should be rejected"
            );
        }
        assert!(Identity::new("a".repeat(65)).is_err());
    }

    #[test]
    fn index_is_bidirectional() {
        let alice = Identity::new("alice").unwrap();
        let bob = Identity::new("bob").unwrap();
        let index = IdentityIndex::from_ordered(vec![alice.clone(), bob.clone()]).unwrap();

        assert_eq!(index.label(&alice), Some(0));
        assert_eq!(index.label(&bob), Some(1));
        assert_eq!(index.identity(1), Some(&bob));
        assert_eq!(index.identity(2), None);
        assert_eq!(index.len(), 2);
    }

    #[test]
    fn index_rejects_duplicates() {
        let alice = Identity::new("alice").unwrap();
        assert!(IdentityIndex::from_ordered(vec![alice.clone(), alice]).is_err());
    }

    #[test]
    fn deserialize_validates() {
        let ok: Identity = serde_json::from_str("\"alice\"").unwrap();
        assert_eq!(ok.as_str(), "alice");
        assert!(serde_json::from_str::<Identity>("\"../x\"").is_err());
    }
}
