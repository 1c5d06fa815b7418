use crate::core::error::StoreError;
use crate::core::state::AuthState;
use crate::models::user::{User, UserUpdate};
use crate::utils::time::{now_utc, to_iso8601};
use chrono::{DateTime, SubsecRound, Utc};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

/// Callback invoked with `(new_state, previous_state)` after a mutation
pub type Listener = Box<dyn FnMut(&AuthState, &AuthState) + Send>;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// User/auth state container.
///
/// Mutations that find nothing to act on (no signed-in user, unknown target
/// id) leave the state alone and notify nobody.
pub struct AuthStore {
    state: AuthState,
    listeners: Vec<(ListenerId, Listener)>,
    next_listener: u64,
}

impl AuthStore {
    /// Create a signed-out store seeded with the bootstrap users
    pub fn new() -> Self {
        Self::with_state(AuthState::new())
    }

    pub fn with_state(state: AuthState) -> Self {
        Self {
            state,
            listeners: Vec::new(),
            next_listener: 0,
        }
    }

    pub fn state(&self) -> &AuthState {
        &self.state
    }

    pub fn current_user(&self) -> Option<&User> {
        self.state.user.as_ref()
    }

    pub fn is_authenticated(&self) -> bool {
        self.state.is_authenticated
    }

    pub fn users(&self) -> &BTreeMap<String, User> {
        &self.state.users
    }

    pub fn custom_icon(&self) -> Option<&str> {
        self.state.custom_icon.as_deref()
    }

    /// Pure lookup
    pub fn get_user(&self, user_id: &str) -> Option<&User> {
        self.state.users.get(user_id)
    }

    /// Register a listener for state changes
    pub fn subscribe<F>(&mut self, listener: F) -> ListenerId
    where
        F: FnMut(&AuthState, &AuthState) + Send + 'static,
    {
        let id = ListenerId(self.next_listener);
        self.next_listener += 1;
        self.listeners.push((id, Box::new(listener)));
        id
    }

    /// Remove a listener. Returns false if it was not registered.
    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(listener_id, _)| *listener_id != id);
        self.listeners.len() != before
    }

    /// Swap in a whole new state without notifying listeners
    pub fn replace_state(&mut self, state: AuthState) {
        self.state = state;
    }

    /// Sign in as an existing user, stamping `last_login` with the current time
    pub fn login(&mut self, user_id: &str) -> Result<&User, StoreError> {
        self.login_at(user_id, now_utc())
    }

    /// Sign in as an existing user with an explicit login timestamp.
    /// The stored record is used as-is apart from `last_login`, which is
    /// kept at millisecond precision like its persisted form.
    pub fn login_at(&mut self, user_id: &str, at: DateTime<Utc>) -> Result<&User, StoreError> {
        let at = at.trunc_subsecs(3);
        if !self.state.users.contains_key(user_id) {
            warn!(user_id = %user_id, "Login rejected, unknown user");
            return Err(StoreError::UnknownUser(user_id.to_string()));
        }

        self.set(|state| {
            let Some(user) = state.users.get_mut(user_id) else {
                return false;
            };
            user.last_login = Some(at);
            state.user = Some(user.clone());
            state.is_authenticated = true;
            true
        });

        info!(user_id = %user_id, last_login = %to_iso8601(&at), "User logged in");

        self.state
            .user
            .as_ref()
            .ok_or_else(|| StoreError::UnknownUser(user_id.to_string()))
    }

    pub fn logout(&mut self) {
        let user_id = self.state.current_id().map(str::to_owned);
        self.set(|state| {
            state.user = None;
            state.is_authenticated = false;
            true
        });
        info!(user_id = ?user_id, "User logged out");
    }

    /// Merge `update` onto the current user. No-op when signed out.
    pub fn update_profile(&mut self, update: &UserUpdate) {
        self.update_current("update_profile", |user| {
            update.apply_to(user);
            true
        });
    }

    pub fn update_icon(&mut self, base64: impl Into<String>) {
        let icon = base64.into();
        debug!(icon_len = icon.len(), "Custom icon updated");
        self.set(|state| {
            state.custom_icon = Some(icon);
            true
        });
    }

    /// Set the current user's avatar URL. No-op when signed out.
    pub fn update_avatar(&mut self, avatar_url: impl Into<String>) {
        let update = UserUpdate::avatar(avatar_url);
        self.update_current("update_avatar", |user| {
            update.apply_to(user);
            true
        });
    }

    /// Replace the current user's balance with `points` and add `points` to
    /// their running total. No-op when signed out, or when the total would
    /// overflow.
    pub fn update_points(&mut self, points: i64) {
        self.update_current("update_points", |user| apply_points_checked(user, points));
    }

    /// Same arithmetic as [`update_points`](Self::update_points) for any
    /// known user. Unknown ids are ignored; no record is created.
    pub fn update_user_points(&mut self, user_id: &str, points: i64) {
        if !self.state.users.contains_key(user_id) {
            debug!(user_id = %user_id, "Point update ignored, unknown user");
            return;
        }
        self.update_user(user_id, |user| apply_points_checked(user, points));
    }

    /// Add a new record to the mapping
    pub fn register_user(&mut self, user: User) -> Result<(), StoreError> {
        if self.state.users.contains_key(&user.id) {
            return Err(StoreError::DuplicateUser(user.id));
        }

        let user_id = user.id.clone();
        self.set(|state| {
            state.users.insert(user.id.clone(), user);
            true
        });
        info!(user_id = %user_id, "User registered");
        Ok(())
    }

    fn update_current<F>(&mut self, op: &str, f: F) -> bool
    where
        F: FnOnce(&mut User) -> bool,
    {
        let Some(user_id) = self.state.current_id().map(str::to_owned) else {
            debug!(op = op, "No current user, ignoring");
            return false;
        };
        self.update_user(&user_id, f)
    }

    /// Apply `f` to `users[user_id]` and mirror the result into the current
    /// user when it is the same id. `f` returning false aborts the update.
    fn update_user<F>(&mut self, user_id: &str, f: F) -> bool
    where
        F: FnOnce(&mut User) -> bool,
    {
        self.set(|state| {
            let Some(user) = state.users.get_mut(user_id) else {
                return false;
            };
            if !f(user) {
                return false;
            }
            let updated = user.clone();
            if state.current_id() == Some(user_id) {
                state.user = Some(updated);
            }
            true
        })
    }

    /// Run a mutation and notify listeners if it reported a change
    fn set<F>(&mut self, mutate: F) -> bool
    where
        F: FnOnce(&mut AuthState) -> bool,
    {
        let previous = self.state.clone();
        if !mutate(&mut self.state) {
            self.state = previous;
            return false;
        }

        for (_, listener) in self.listeners.iter_mut() {
            listener(&self.state, &previous);
        }
        true
    }
}

fn apply_points_checked(user: &mut User, points: i64) -> bool {
    let applied = user.apply_points(points);
    if !applied {
        warn!(
            user_id = %user.id,
            points = points,
            total_earned = user.total_earned,
            "Point update ignored, running total would overflow"
        );
    }
    applied
}

impl Default for AuthStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::user::{Role, UserStatus};
    use crate::stores::seed::{ADMIN_ID, WORKER_ID};
    use chrono::TimeZone;
    use std::sync::{Arc, Mutex};

    fn logged_in(user_id: &str) -> AuthStore {
        let mut store = AuthStore::new();
        store.login(user_id).unwrap();
        store
    }

    fn counting(store: &mut AuthStore) -> Arc<Mutex<usize>> {
        let count = Arc::new(Mutex::new(0));
        let handle = Arc::clone(&count);
        store.subscribe(move |_, _| *handle.lock().unwrap() += 1);
        count
    }

    #[test]
    fn test_login_sets_current_user() {
        let mut store = AuthStore::new();
        let at = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        let user = store.login_at(ADMIN_ID, at).unwrap();

        assert_eq!(user.id, ADMIN_ID);
        assert_eq!(user.last_login, Some(at));
        assert!(store.is_authenticated());
        assert_eq!(store.current_user().unwrap().id, ADMIN_ID);
        assert_eq!(store.get_user(ADMIN_ID).unwrap().last_login, Some(at));
        assert!(store.state().is_consistent());
    }

    #[test]
    fn test_login_unknown_user_fails_without_change() {
        let mut store = AuthStore::new();
        let count = counting(&mut store);
        let before = store.state().clone();

        let result = store.login("nobody");

        assert_eq!(result, Err(StoreError::UnknownUser("nobody".to_string())));
        assert_eq!(store.state(), &before);
        assert_eq!(*count.lock().unwrap(), 0);
    }

    #[test]
    fn test_logout_keeps_users_and_icon() {
        let mut store = logged_in(WORKER_ID);
        store.update_icon("aWNvbg==");
        let users_before = store.users().clone();

        store.logout();

        assert!(store.current_user().is_none());
        assert!(!store.is_authenticated());
        assert_eq!(store.users(), &users_before);
        assert_eq!(store.custom_icon(), Some("aWNvbg=="));
    }

    #[test]
    fn test_update_points_replaces_balance_and_accumulates_total() {
        let mut store = logged_in(WORKER_ID);
        let total = store.current_user().unwrap().total_earned;

        store.update_points(50);
        store.update_points(-20);

        let user = store.current_user().unwrap();
        assert_eq!(user.points, -20);
        assert_eq!(user.total_earned, total + 50 - 20);
        assert!(store.state().is_consistent());
    }

    #[test]
    fn test_update_points_overflow_is_noop() {
        let mut store = logged_in(WORKER_ID);
        store.update_points(i64::MAX);
        let count = counting(&mut store);
        let before = store.state().clone();

        store.update_points(1);
        store.update_user_points(WORKER_ID, 1);

        assert_eq!(store.state(), &before);
        assert_eq!(store.current_user().unwrap().total_earned, i64::MAX);
        assert_eq!(*count.lock().unwrap(), 0);

        store.update_points(-1);
        assert_eq!(store.current_user().unwrap().points, -1);
        assert_eq!(store.current_user().unwrap().total_earned, i64::MAX - 1);
        assert!(store.state().is_consistent());
    }

    #[test]
    fn test_login_stamp_has_millisecond_precision() {
        let mut store = AuthStore::new();
        let at = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
            + chrono::Duration::nanoseconds(123_456_789);

        store.login_at(ADMIN_ID, at).unwrap();

        let stamped = store.current_user().unwrap().last_login.unwrap();
        assert_eq!(stamped.timestamp_subsec_nanos(), 123_000_000);
        assert_eq!(to_iso8601(&stamped), "2024-03-01T12:00:00.123Z");
    }

    #[test]
    fn test_update_points_signed_out_is_noop() {
        let mut store = AuthStore::new();
        let count = counting(&mut store);
        let before = store.state().clone();

        store.update_points(10);
        store.update_avatar("https://example.com/a.png");

        assert_eq!(store.state(), &before);
        assert_eq!(*count.lock().unwrap(), 0);
    }

    #[test]
    fn test_update_user_points_other_user_leaves_current_alone() {
        let mut store = logged_in(ADMIN_ID);
        let current_before = store.current_user().cloned();

        store.update_user_points(WORKER_ID, 100);

        assert_eq!(store.current_user().cloned(), current_before);
        let worker = store.get_user(WORKER_ID).unwrap();
        assert_eq!(worker.points, 100);
        assert_eq!(worker.total_earned, 100);
    }

    #[test]
    fn test_update_user_points_current_user_syncs_copy() {
        let mut store = logged_in(WORKER_ID);

        store.update_user_points(WORKER_ID, 75);

        assert_eq!(store.current_user().unwrap().points, 75);
        assert!(store.state().is_consistent());
    }

    #[test]
    fn test_update_user_points_unknown_id_creates_nothing() {
        let mut store = AuthStore::new();
        let count = counting(&mut store);
        let users_before = store.users().clone();

        store.update_user_points("nonexistent-id", 10);

        assert_eq!(store.users(), &users_before);
        assert!(store.get_user("nonexistent-id").is_none());
        assert_eq!(*count.lock().unwrap(), 0);
    }

    #[test]
    fn test_update_profile_without_user_is_noop() {
        let mut store = AuthStore::new();
        let count = counting(&mut store);
        let before = store.state().clone();

        store.update_profile(&UserUpdate {
            name: Some("X".to_string()),
            ..UserUpdate::default()
        });

        assert_eq!(store.state(), &before);
        assert_eq!(*count.lock().unwrap(), 0);
    }

    #[test]
    fn test_update_profile_merges_and_syncs() {
        let mut store = logged_in(WORKER_ID);

        store.update_profile(&UserUpdate {
            name: Some("X".to_string()),
            status: Some(UserStatus::Inactive),
            ..UserUpdate::default()
        });

        let user = store.current_user().unwrap();
        assert_eq!(user.name, "X");
        assert_eq!(user.status, UserStatus::Inactive);
        assert_eq!(user.email, "worker@pointmoney.com");
        assert!(store.state().is_consistent());
    }

    #[test]
    fn test_update_avatar_syncs_both_copies() {
        let mut store = logged_in(ADMIN_ID);

        store.update_avatar("https://example.com/a.png");

        assert_eq!(
            store.get_user(ADMIN_ID).unwrap().avatar_url.as_deref(),
            Some("https://example.com/a.png")
        );
        assert!(store.state().is_consistent());
    }

    #[test]
    fn test_update_icon_touches_no_user() {
        let mut store = logged_in(ADMIN_ID);
        let users_before = store.users().clone();

        store.update_icon("data:image/png;base64,AAAA");

        assert_eq!(store.custom_icon(), Some("data:image/png;base64,AAAA"));
        assert_eq!(store.users(), &users_before);
    }

    #[test]
    fn test_register_then_login() {
        let mut store = AuthStore::new();
        let user = User::new(
            "w3",
            "w3",
            "Third",
            "w3@example.com",
            Role::Worker,
            "2024-05-01",
        );

        store.register_user(user.clone()).unwrap();
        assert_eq!(
            store.register_user(user),
            Err(StoreError::DuplicateUser("w3".to_string()))
        );
        assert_eq!(store.users().len(), 3);

        store.login("w3").unwrap();
        assert_eq!(store.current_user().unwrap().name, "Third");
    }

    #[test]
    fn test_listeners_receive_new_and_previous_state() {
        let mut store = AuthStore::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let handle = Arc::clone(&seen);
        let id = store.subscribe(move |new, prev| {
            handle
                .lock()
                .unwrap()
                .push((prev.is_authenticated, new.is_authenticated));
        });

        store.login(ADMIN_ID).unwrap();
        store.logout();
        assert!(store.unsubscribe(id));
        assert!(!store.unsubscribe(id));
        store.login(ADMIN_ID).unwrap();

        assert_eq!(*seen.lock().unwrap(), vec![(false, true), (true, false)]);
    }

    #[test]
    fn test_replace_state_does_not_notify() {
        let mut store = AuthStore::new();
        let count = counting(&mut store);
        let mut state = AuthState::new();
        state.custom_icon = Some("x".to_string());

        store.replace_state(state);

        assert_eq!(store.custom_icon(), Some("x"));
        assert_eq!(*count.lock().unwrap(), 0);
    }
}
