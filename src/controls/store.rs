//! Global control store
//!
//! The host's flat, string-keyed, dynamically typed value map. At most one
//! effect's keys are present at a time; keys match the active effect's
//! control ids one to one.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use serde_json::Value;

/// Injected key-value store shared by the bridge and the control panel
pub trait ControlStore {
    fn get(&self, key: &str) -> Option<Value>;
    fn set(&mut self, key: &str, value: Value);
    /// Remove a key, returning its previous value
    fn delete(&mut self, key: &str) -> Option<Value>;
    fn keys(&self) -> Vec<String>;
}

/// In-process store backed by a hash map
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    values: HashMap<String, Value>,
    writes: u64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `set` calls since creation
    pub fn writes(&self) -> u64 {
        self.writes
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl ControlStore for MemoryStore {
    fn get(&self, key: &str) -> Option<Value> {
        self.values.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: Value) {
        self.writes += 1;
        self.values.insert(key.to_string(), value);
    }

    fn delete(&mut self, key: &str) -> Option<Value> {
        self.values.remove(key)
    }

    fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.values.keys().cloned().collect();
        keys.sort();
        keys
    }
}

/// Shared handle, so the host application can write the store it gave away
impl<S: ControlStore> ControlStore for Rc<RefCell<S>> {
    fn get(&self, key: &str) -> Option<Value> {
        self.borrow().get(key)
    }

    fn set(&mut self, key: &str, value: Value) {
        self.borrow_mut().set(key, value);
    }

    fn delete(&mut self, key: &str) -> Option<Value> {
        self.borrow_mut().delete(key)
    }

    fn keys(&self) -> Vec<String> {
        self.borrow().keys()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_memory_store_basics() {
        let mut store = MemoryStore::new();
        store.set("speed", json!(5));
        store.set("mode", json!("Fire"));
        store.set("speed", json!(7));

        assert_eq!(store.get("speed"), Some(json!(7)));
        assert_eq!(store.keys(), ["mode", "speed"]);
        assert_eq!(store.writes(), 3);

        assert_eq!(store.delete("mode"), Some(json!("Fire")));
        assert_eq!(store.delete("mode"), None);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_shared_store_handle() {
        let shared = Rc::new(RefCell::new(MemoryStore::new()));
        let mut handle = shared.clone();
        handle.set("speed", json!(9));

        assert_eq!(shared.borrow().get("speed"), Some(json!(9)));
        assert_eq!(ControlStore::keys(&handle), ["speed"]);
        assert_eq!(handle.delete("speed"), Some(json!(9)));
        assert!(shared.borrow().is_empty());
    }
}
