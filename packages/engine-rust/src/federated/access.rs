use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use conflux_core::User;

/// Visibility policy gating access to a set of sub-executors.
///
/// A value object usable as a map key: hashed and ordered by value. The
/// predicate [`is_valid_to_execute`](FederatedAccess::is_valid_to_execute)
/// is pure, total, and the single gate for every read, list, and remove
/// path in federated storage.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FederatedAccess {
    /// Auth strings granting access when intersecting the caller's.
    #[serde(default)]
    pub auths: BTreeSet<String>,
    /// Id of the user that added the executors under this policy.
    pub adding_user_id: String,
    /// Whether every caller (including anonymous ones) may use the bucket.
    #[serde(default)]
    pub public: bool,
    /// Whether the bucket is excluded from unspecified-target requests.
    #[serde(default)]
    pub disabled_by_default: bool,
}

impl FederatedAccess {
    /// Policy visible to everyone.
    #[must_use]
    pub fn public(adding_user_id: impl Into<String>) -> Self {
        Self {
            auths: BTreeSet::new(),
            adding_user_id: adding_user_id.into(),
            public: true,
            disabled_by_default: false,
        }
    }

    /// Policy visible to the adding user and holders of `auths`.
    #[must_use]
    pub fn private<I, S>(adding_user_id: impl Into<String>, auths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            auths: auths.into_iter().map(Into::into).collect(),
            adding_user_id: adding_user_id.into(),
            public: false,
            disabled_by_default: false,
        }
    }

    /// Marks the bucket as excluded from unspecified-target requests.
    #[must_use]
    pub fn disabled_by_default(mut self) -> Self {
        self.disabled_by_default = true;
        self
    }

    /// Whether `user` may see and use executors under this policy.
    ///
    /// Public policies admit everyone, including a `None` user. Otherwise
    /// the adding user is always admitted, then any caller whose op auths
    /// intersect a non-empty auth set. Never panics.
    #[must_use]
    pub fn is_valid_to_execute(&self, user: Option<&User>) -> bool {
        if self.public {
            return true;
        }
        let Some(user) = user else {
            return false;
        };
        if user.id() == self.adding_user_id {
            return true;
        }
        !self.auths.is_empty() && self.auths.iter().any(|auth| user.has_auth(auth))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn public_access_admits_everyone() {
        let access = FederatedAccess::public("owner");
        assert!(access.is_valid_to_execute(Some(&User::new("anyone"))));
        assert!(access.is_valid_to_execute(Some(&User::default())));
        assert!(access.is_valid_to_execute(None));
    }

    #[test]
    fn adding_user_is_admitted_regardless_of_auths() {
        let access = FederatedAccess::private("owner", ["secret"]);
        assert!(access.is_valid_to_execute(Some(&User::new("owner"))));
    }

    #[test]
    fn intersecting_auths_admit() {
        let access = FederatedAccess::private("owner", ["a", "b"]);
        assert!(access.is_valid_to_execute(Some(&User::with_auths("x", ["b", "c"]))));
    }

    #[test]
    fn disjoint_auths_and_foreign_user_are_rejected() {
        let access = FederatedAccess::private("owner", ["a", "b"]);
        assert!(!access.is_valid_to_execute(Some(&User::with_auths("x", ["c"]))));
        assert!(!access.is_valid_to_execute(Some(&User::new("x"))));
        assert!(!access.is_valid_to_execute(None));
    }

    #[test]
    fn empty_auth_set_admits_only_the_adding_user() {
        let access = FederatedAccess::private("owner", Vec::<String>::new());
        assert!(access.is_valid_to_execute(Some(&User::new("owner"))));
        assert!(!access.is_valid_to_execute(Some(&User::with_auths("x", ["anything"]))));
    }

    #[test]
    fn usable_as_a_map_key_by_value() {
        use std::collections::HashMap;

        let mut map = HashMap::new();
        map.insert(FederatedAccess::public("owner"), 1);
        // An equal value constructed independently hits the same slot.
        assert_eq!(map.get(&FederatedAccess::public("owner")), Some(&1));
    }
}
