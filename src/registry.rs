//! Case-insensitive name→factory table, one instance per plugin kind
//! (dialers, agents). Registration happens once at process start from
//! `main`; lookup failures name the registered alternatives.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

#[derive(Debug, thiserror::Error)]
#[error("'{name}' not registered. Available: {}", available.join(", "))]
pub struct NotRegistered {
    pub name: String,
    pub available: Vec<String>,
}

/// A generic case-insensitive registry of named factories. Used for both
/// the dialer-plugin table and the agent-plugin table; the entry type `T`
/// is typically an `Arc<dyn DialerPlugin>` or `Arc<dyn AgentPlugin>`.
#[derive(Clone)]
pub struct PluginRegistry<T> {
    inner: Arc<RwLock<HashMap<String, T>>>,
}

impl<T> Default for PluginRegistry<T> {
    fn default() -> Self {
        Self {
            inner: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

impl<T: Clone> PluginRegistry<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a plugin under `name`. Re-registering an existing name
    /// overwrites it, with a warning, rather than erroring.
    pub fn register(&self, name: &str, plugin: T) {
        let key = name.to_lowercase();
        let mut guard = self.inner.write().expect("registry lock poisoned");
        if guard.contains_key(&key) {
            tracing::warn!(name = %name, "plugin already registered, overwriting");
        }
        guard.insert(key, plugin);
        tracing::info!(name = %name, "registered plugin");
    }

    pub fn get(&self, name: &str) -> Result<T, NotRegistered> {
        let key = name.to_lowercase();
        let guard = self.inner.read().expect("registry lock poisoned");
        guard.get(&key).cloned().ok_or_else(|| NotRegistered {
            name: name.to_string(),
            available: guard.keys().cloned().collect(),
        })
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.inner
            .read()
            .expect("registry lock poisoned")
            .contains_key(&name.to_lowercase())
    }

    pub fn list(&self) -> Vec<String> {
        self.inner
            .read()
            .expect("registry lock poisoned")
            .keys()
            .cloned()
            .collect()
    }

    pub fn unregister(&self, name: &str) -> Result<(), NotRegistered> {
        let key = name.to_lowercase();
        let mut guard = self.inner.write().expect("registry lock poisoned");
        if guard.remove(&key).is_none() {
            return Err(NotRegistered {
                name: name.to_string(),
                available: guard.keys().cloned().collect(),
            });
        }
        tracing::info!(name = %name, "unregistered plugin");
        Ok(())
    }

    #[cfg(test)]
    pub fn clear(&self) {
        self.inner.write().expect("registry lock poisoned").clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_and_get_is_case_insensitive() {
        let reg: PluginRegistry<&'static str> = PluginRegistry::new();
        reg.register("Twilio", "twilio-impl");
        assert_eq!(reg.get("twilio").unwrap(), "twilio-impl");
        assert_eq!(reg.get("TWILIO").unwrap(), "twilio-impl");
    }

    #[test]
    fn missing_lookup_lists_available_names() {
        let reg: PluginRegistry<&'static str> = PluginRegistry::new();
        reg.register("twilio", "twilio-impl");
        reg.register("room", "room-impl");
        let err = reg.get("plivo").unwrap_err();
        assert_eq!(err.name, "plivo");
        assert!(err.available.contains(&"twilio".to_string()));
        assert!(err.available.contains(&"room".to_string()));
    }

    #[test]
    fn reregister_overwrites() {
        let reg: PluginRegistry<&'static str> = PluginRegistry::new();
        reg.register("twilio", "v1");
        reg.register("twilio", "v2");
        assert_eq!(reg.get("twilio").unwrap(), "v2");
    }

    #[test]
    fn unregister_removes_entry() {
        let reg: PluginRegistry<&'static str> = PluginRegistry::new();
        reg.register("twilio", "v1");
        reg.unregister("twilio").unwrap();
        assert!(!reg.is_registered("twilio"));
        assert!(reg.unregister("twilio").is_err());
    }
}
