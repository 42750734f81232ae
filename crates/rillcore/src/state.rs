use crate::value::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Shared key/value store used for both instance-scoped and session-global
/// state. Callable from sync cleanup callbacks as well as async node code,
/// so the lock is a plain mutex; holders never await while locked.
#[derive(Clone, Default)]
pub struct StateStore {
    inner: Arc<Mutex<HashMap<String, Value>>>,
}

impl StateStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn guard(&self) -> MutexGuard<'_, HashMap<String, Value>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.guard().get(key).cloned()
    }

    pub fn set(&self, key: impl Into<String>, value: impl Into<Value>) {
        self.guard().insert(key.into(), value.into());
    }

    pub fn remove(&self, key: &str) -> Option<Value> {
        self.guard().remove(key)
    }

    /// Read-modify-write under one lock acquisition; returns the new value
    pub fn update(&self, key: &str, f: impl FnOnce(Option<&Value>) -> Value) -> Value {
        let mut map = self.guard();
        let next = f(map.get(key));
        map.insert(key.to_string(), next.clone());
        next
    }

    pub fn snapshot(&self) -> HashMap<String, Value> {
        self.guard().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_get_remove() {
        let store = StateStore::new();
        store.set("k", 1i64);
        assert_eq!(store.get("k"), Some(Value::Number(1.0)));
        assert_eq!(store.remove("k"), Some(Value::Number(1.0)));
        assert_eq!(store.get("k"), None);
    }

    #[test]
    fn update_is_atomic_per_call() {
        let store = StateStore::new();
        for _ in 0..5 {
            store.update("n", |v| {
                Value::Number(v.and_then(Value::as_f64).unwrap_or(0.0) + 1.0)
            });
        }
        assert_eq!(store.get("n"), Some(Value::Number(5.0)));
    }

    #[test]
    fn clones_share_the_map() {
        let a = StateStore::new();
        let b = a.clone();
        a.set("shared", true);
        assert_eq!(b.get("shared"), Some(Value::Bool(true)));
    }
}
