use crate::core::error::PersistError;
use crate::core::state::AuthState;
use crate::persist::envelope::{decode_state, encode_state, migrate};
use crate::persist::storage::StateStorage;
use crate::stores::auth_store::{AuthStore, ListenerId};
use std::sync::Arc;
use tracing::{debug, info, warn};

pub const STORAGE_KEY: &str = "auth-storage";
pub const STORAGE_VERSION: u32 = 1;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PersistOptions {
    /// Storage key the envelope is written under
    pub name: String,
    /// Current envelope version; anything else goes through `migrate`
    pub version: u32,
}

impl Default for PersistOptions {
    fn default() -> Self {
        Self {
            name: STORAGE_KEY.to_string(),
            version: STORAGE_VERSION,
        }
    }
}

/// Outcome of a hydration pass
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Hydration {
    /// Nothing stored under the key
    Empty,
    Restored {
        migrated: bool,
        bootstrap_added: usize,
        /// Records kept verbatim because they did not decode
        unreadable: usize,
    },
    /// Stored blob could not be decoded; it was copied to `backup_key`
    /// before the defaults took over
    Discarded { backup_key: String },
}

/// Loads a store from storage and writes it back after each change
pub struct Persister {
    storage: Arc<dyn StateStorage>,
    options: PersistOptions,
    hydrated: bool,
}

impl Persister {
    pub fn new(storage: Arc<dyn StateStorage>, options: PersistOptions) -> Self {
        Self {
            storage,
            options,
            hydrated: false,
        }
    }

    pub fn options(&self) -> &PersistOptions {
        &self.options
    }

    pub fn has_hydrated(&self) -> bool {
        self.hydrated
    }

    /// Replace the store's state with what is persisted.
    ///
    /// Bootstrap users are merged in on every load. Envelopes from another
    /// version are migrated and written back.
    pub fn hydrate(&mut self, store: &mut AuthStore) -> Result<Hydration, PersistError> {
        let Some(raw) = self.storage.get_item(&self.options.name)? else {
            debug!(key = %self.options.name, "No persisted state found");
            self.hydrated = true;
            return Ok(Hydration::Empty);
        };

        let envelope = match decode_state(&raw) {
            Ok(envelope) => envelope,
            Err(e) => {
                // The next write-back replaces the item, so keep a copy first
                let backup_key = self.backup_key();
                self.storage.set_item(&backup_key, &raw)?;
                warn!(
                    key = %self.options.name,
                    backup_key = %backup_key,
                    error = %e,
                    "Failed to decode persisted state, keeping defaults"
                );
                self.hydrated = true;
                return Ok(Hydration::Discarded { backup_key });
            }
        };

        let migrated = envelope.version != self.options.version;
        let before = envelope.state.users.len();
        let mut state = if migrated {
            migrate(envelope.state, envelope.version, self.options.version)
        } else {
            envelope.state
        };
        state.merge_bootstrap();
        let bootstrap_added = state.users.len() - before;
        let unreadable = state.unreadable_users.len();

        if !state.is_consistent() {
            warn!(
                user_id = ?state.current_id(),
                "Persisted current user does not match its mapping entry"
            );
        }

        store.replace_state(state);
        self.hydrated = true;

        if migrated {
            write_state(self.storage.as_ref(), &self.options, store.state())?;
        }

        info!(
            key = %self.options.name,
            version = envelope.version,
            migrated = migrated,
            users = store.users().len(),
            unreadable = unreadable,
            authenticated = store.is_authenticated(),
            "Store hydrated"
        );

        Ok(Hydration::Restored {
            migrated,
            bootstrap_added,
            unreadable,
        })
    }

    /// Key an undecodable blob is copied to
    pub fn backup_key(&self) -> String {
        format!("{}.discarded", self.options.name)
    }

    /// Read storage again into an already hydrated store
    pub fn rehydrate(&mut self, store: &mut AuthStore) -> Result<Hydration, PersistError> {
        self.hydrated = false;
        self.hydrate(store)
    }

    /// Subscribe to `store` so every change is written to storage.
    /// Write failures are logged; the in-memory state is kept either way.
    pub fn attach(&self, store: &mut AuthStore) -> ListenerId {
        let storage = Arc::clone(&self.storage);
        let options = self.options.clone();

        store.subscribe(move |state, _previous| {
            if let Err(e) = write_state(storage.as_ref(), &options, state) {
                warn!(key = %options.name, error = %e, "Failed to persist state");
            }
        })
    }

    pub fn write(&self, state: &AuthState) -> Result<(), PersistError> {
        write_state(self.storage.as_ref(), &self.options, state)
    }

    /// Remove the persisted item. The in-memory store is left as is.
    pub fn clear_storage(&self) -> Result<(), PersistError> {
        self.storage.remove_item(&self.options.name)?;
        info!(key = %self.options.name, "Persisted state cleared");
        Ok(())
    }
}

fn write_state(
    storage: &dyn StateStorage,
    options: &PersistOptions,
    state: &AuthState,
) -> Result<(), PersistError> {
    let raw = encode_state(state, options.version)?;
    storage.set_item(&options.name, &raw)?;
    debug!(key = %options.name, bytes = raw.len(), "State persisted");
    Ok(())
}
