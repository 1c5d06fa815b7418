// Store state (AuthState)

use crate::models::user::User;
use crate::stores::seed::bootstrap_users;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Everything the store holds, and everything that gets persisted.
///
/// `user` is a detached copy of `users[user.id]`, not a reference into the
/// mapping. The store keeps both copies equal after every mutation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthState {
    /// Signed-in user, if any
    #[serde(default)]
    pub user: Option<User>,

    /// All known users keyed by id
    #[serde(default)]
    pub users: BTreeMap<String, User>,

    #[serde(default)]
    pub is_authenticated: bool,

    /// Base64 image, not tied to any user
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_icon: Option<String>,

    /// Persisted records that did not decode as a `User`, kept verbatim so
    /// they are written back untouched. Not visible through the store.
    #[serde(skip)]
    pub unreadable_users: BTreeMap<String, Value>,
}

impl AuthState {
    /// Signed-out state seeded with the bootstrap users
    pub fn new() -> Self {
        Self {
            user: None,
            users: bootstrap_users(),
            is_authenticated: false,
            custom_icon: None,
            unreadable_users: BTreeMap::new(),
        }
    }

    /// Add bootstrap users whose id is not taken by a persisted record,
    /// readable or not. Returns the number added.
    pub fn merge_bootstrap(&mut self) -> usize {
        let mut added = 0;
        for (id, user) in bootstrap_users() {
            if !self.users.contains_key(&id) && !self.unreadable_users.contains_key(&id) {
                self.users.insert(id, user);
                added += 1;
            }
        }
        added
    }

    /// Current user id, if signed in
    pub fn current_id(&self) -> Option<&str> {
        self.user.as_ref().map(|user| user.id.as_str())
    }

    /// Whether `user` is absent or matches its mapping entry exactly
    pub fn is_consistent(&self) -> bool {
        match &self.user {
            Some(user) => self.users.get(&user.id) == Some(user),
            None => true,
        }
    }
}

impl Default for AuthState {
    fn default() -> Self {
        Self::new()
    }
}
