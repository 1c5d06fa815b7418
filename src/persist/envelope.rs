use crate::core::error::PersistError;
use crate::core::state::AuthState;
use crate::models::user::User;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use tracing::{info, warn};

/// Versioned wrapper the state is stored in: `{"state": {...}, "version": N}`
#[derive(Clone, Debug, PartialEq)]
pub struct PersistedEnvelope {
    pub state: AuthState,
    pub version: u32,
}

#[derive(Deserialize)]
struct RawEnvelope {
    state: RawState,
    #[serde(default)]
    version: u32,
}

/// State with every user record left as raw JSON, so one bad record does
/// not take the rest down with it
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawState {
    #[serde(default)]
    user: Option<Value>,
    #[serde(default)]
    users: BTreeMap<String, Value>,
    #[serde(default)]
    is_authenticated: bool,
    #[serde(default)]
    custom_icon: Option<String>,
}

/// Unreadable records held in the state are written back next to the
/// readable ones; a readable record with the same id wins.
pub fn encode_state(state: &AuthState, version: u32) -> Result<String, PersistError> {
    let mut value = serde_json::to_value(state).map_err(PersistError::Encode)?;

    if let Some(users) = value.get_mut("users").and_then(Value::as_object_mut) {
        for (id, raw) in &state.unreadable_users {
            users.entry(id.clone()).or_insert_with(|| raw.clone());
        }
    }

    serde_json::to_string(&json!({ "state": value, "version": version }))
        .map_err(PersistError::Encode)
}

/// Decode an envelope. Fails only when the blob as a whole is not an
/// envelope; individual user records that do not decode are set aside in
/// `unreadable_users`.
pub fn decode_state(raw: &str) -> Result<PersistedEnvelope, PersistError> {
    let envelope: RawEnvelope = serde_json::from_str(raw).map_err(PersistError::Decode)?;
    let RawState {
        user,
        users,
        is_authenticated,
        custom_icon,
    } = envelope.state;

    let mut state = AuthState {
        user: None,
        users: BTreeMap::new(),
        is_authenticated,
        custom_icon,
        unreadable_users: BTreeMap::new(),
    };

    for (id, value) in users {
        match User::deserialize(&value) {
            Ok(user) => {
                state.users.insert(id, user);
            }
            Err(e) => {
                warn!(user_id = %id, error = %e, "Unreadable user record, keeping it as stored");
                state.unreadable_users.insert(id, value);
            }
        }
    }

    if let Some(value) = user {
        match User::deserialize(&value) {
            Ok(user) => state.user = Some(user),
            Err(e) => {
                warn!(error = %e, "Unreadable current user, signing out");
                state.is_authenticated = false;
            }
        }
    }

    Ok(PersistedEnvelope {
        state,
        version: envelope.version,
    })
}

/// Bring state written by another version up to date.
///
/// Bootstrap users missing from the persisted mapping are added; persisted
/// records are never dropped or rewritten. Records are not validated.
pub fn migrate(mut state: AuthState, from_version: u32, to_version: u32) -> AuthState {
    let added = state.merge_bootstrap();
    info!(
        from_version = from_version,
        to_version = to_version,
        bootstrap_added = added,
        users = state.users.len(),
        "Migrated persisted state"
    );
    state
}
