//! Per-device identity and reload continuity.
//!
//! Everything stored here is a convenience cache. The server remains the source of truth, and a
//! cached ticket that no longer matches a live session is simply forgotten.

use std::cell::RefCell;
use std::collections::HashMap;

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use uuid::Uuid;

pub const DEVICE_ID_KEY: &str = "anniversary-device-id";
pub const PLAYER_KEY: &str = "anniversary-player";
pub const HOST_CODE_KEY: &str = "anniversary-host-code";
pub const HOST_SESSION_KEY: &str = "anniversary-session-id";

/// A small string key-value store.
pub trait KeyValueCache {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str);
    fn remove(&self, key: &str);
}

#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: RefCell<HashMap<String, String>>,
}

impl KeyValueCache for MemoryCache {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.borrow().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) {
        self.entries
            .borrow_mut()
            .insert(key.to_string(), value.to_string());
    }

    fn remove(&self, key: &str) {
        self.entries.borrow_mut().remove(key);
    }
}

/// `window.localStorage`. Falls back to doing nothing when storage is unavailable (private mode,
/// or no window).
#[cfg(feature = "hydrate")]
#[derive(Debug, Clone, Copy, Default)]
pub struct BrowserStorage;

#[cfg(feature = "hydrate")]
impl BrowserStorage {
    fn storage() -> Option<web_sys::Storage> {
        web_sys::window()?.local_storage().ok().flatten()
    }
}

#[cfg(feature = "hydrate")]
impl KeyValueCache for BrowserStorage {
    fn get(&self, key: &str) -> Option<String> {
        Self::storage()?.get_item(key).ok().flatten()
    }

    fn set(&self, key: &str, value: &str) {
        if let Some(storage) = Self::storage() {
            if storage.set_item(key, value).is_err() {
                leptos::logging::warn!("Could not persist {key}");
            }
        }
    }

    fn remove(&self, key: &str) {
        if let Some(storage) = Self::storage() {
            let _ = storage.remove_item(key);
        }
    }
}

/// Who this device joined as.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerTicket {
    pub player_id: i32,
    pub session_id: i32,
    pub session_code: String,
    pub name: String,
}

/// The session this device is hosting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostTicket {
    pub session_id: i32,
    pub code: String,
}

pub struct DeviceIdentity<C: KeyValueCache> {
    cache: C,
}

impl<C: KeyValueCache> DeviceIdentity<C> {
    pub fn new(cache: C) -> Self {
        Self { cache }
    }

    /// The stable id for this device, created on first use.
    pub fn device_id(&self) -> String {
        match self.cache.get(DEVICE_ID_KEY) {
            Some(id) if !id.trim().is_empty() => id,
            _ => {
                let id = Uuid::new_v4().to_string();
                self.cache.set(DEVICE_ID_KEY, &id);
                id
            }
        }
    }

    pub fn remember_player(&self, ticket: &PlayerTicket) {
        self.store(PLAYER_KEY, ticket);
    }

    pub fn restore_player(&self) -> Option<PlayerTicket> {
        self.load(PLAYER_KEY)
    }

    /// Forgets the player ticket and the device id, so the next join is a fresh device.
    pub fn forget_player(&self) {
        self.cache.remove(PLAYER_KEY);
        self.cache.remove(DEVICE_ID_KEY);
    }

    pub fn remember_host(&self, ticket: &HostTicket) {
        self.cache.set(HOST_CODE_KEY, &ticket.code);
        self.cache.set(HOST_SESSION_KEY, &ticket.session_id.to_string());
    }

    pub fn restore_host(&self) -> Option<HostTicket> {
        let code = self.cache.get(HOST_CODE_KEY)?;
        let session_id = self.cache.get(HOST_SESSION_KEY)?.parse().ok()?;
        Some(HostTicket { session_id, code })
    }

    pub fn forget_host(&self) {
        self.cache.remove(HOST_CODE_KEY);
        self.cache.remove(HOST_SESSION_KEY);
    }

    fn store<T: Serialize>(&self, key: &str, value: &T) {
        match serde_json::to_string(value) {
            Ok(json) => self.cache.set(key, &json),
            Err(e) => leptos::logging::warn!("Could not encode {key}: {e}"),
        }
    }

    fn load<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = self.cache.get(key)?;
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(_) => {
                // Written by an older build, or tampered with.
                self.cache.remove(key);
                None
            }
        }
    }
}
