//! Session-scoped storage for the population cache.
//!
//! Browser builds use `sessionStorage`; native builds keep the cache in
//! memory for the life of the window.

use playermap::{SessionStore, StoreError};

#[cfg(not(target_arch = "wasm32"))]
pub type PlatformStore = playermap::MemoryStore;

#[cfg(target_arch = "wasm32")]
pub type PlatformStore = BrowserSessionStore;

pub fn platform_store() -> PlatformStore {
    PlatformStore::default()
}

/// `window.sessionStorage`. Every call re-resolves the storage object so a
/// page that blocks storage simply reports `Unavailable`.
#[derive(Debug, Default)]
pub struct BrowserSessionStore;

#[cfg(target_arch = "wasm32")]
fn session_storage() -> Result<web_sys::Storage, StoreError> {
    web_sys::window()
        .and_then(|w| w.session_storage().ok().flatten())
        .ok_or(StoreError::Unavailable)
}

#[cfg(target_arch = "wasm32")]
impl SessionStore for BrowserSessionStore {
    fn get_item(&self, key: &str) -> Result<Option<String>, StoreError> {
        session_storage()?
            .get_item(key)
            .map_err(|_| StoreError::Unavailable)
    }

    fn set_item(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        session_storage()?
            .set_item(key, value)
            .map_err(|e| StoreError::WriteRejected(format!("{e:?}")))
    }

    fn remove_item(&mut self, key: &str) -> Result<(), StoreError> {
        session_storage()?
            .remove_item(key)
            .map_err(|_| StoreError::Unavailable)
    }
}

// Off the browser there is no sessionStorage to reach.
#[cfg(not(target_arch = "wasm32"))]
impl SessionStore for BrowserSessionStore {
    fn get_item(&self, _key: &str) -> Result<Option<String>, StoreError> {
        Err(StoreError::Unavailable)
    }

    fn set_item(&mut self, _key: &str, _value: &str) -> Result<(), StoreError> {
        Err(StoreError::Unavailable)
    }

    fn remove_item(&mut self, _key: &str) -> Result<(), StoreError> {
        Err(StoreError::Unavailable)
    }
}
