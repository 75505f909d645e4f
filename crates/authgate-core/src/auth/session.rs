use std::fmt;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard};

use serde::{Serialize, Serializer};
use serde_json::{Map, Value};

/// Key/value record of the logged-in user. Empty means anonymous.
pub type UserData = Map<String, Value>;

/// Shared handle to the logged-in user record.
///
/// Clones share one record: a handle taken before a login or logout sees the
/// new contents without re-fetching. Only `SessionCache` can write to it.
#[derive(Clone, Default)]
pub struct SessionUser {
    data: Arc<RwLock<UserData>>,
}

impl SessionUser {
    fn read(&self) -> RwLockReadGuard<'_, UserData> {
        self.data.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// True when both handles refer to the same record
    pub fn same_as(&self, other: &SessionUser) -> bool {
        Arc::ptr_eq(&self.data, &other.data)
    }

    pub fn is_anonymous(&self) -> bool {
        self.read().is_empty()
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.read().get(key).cloned()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.read().contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.is_anonymous()
    }

    /// Copy of the current contents
    pub fn snapshot(&self) -> UserData {
        self.read().clone()
    }

    fn replace_contents(&self, new_data: UserData) {
        let mut data = self.data.write().unwrap_or_else(PoisonError::into_inner);
        data.clear();
        data.extend(new_data);
    }
}

impl fmt::Debug for SessionUser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("SessionUser").field(&*self.read()).finish()
    }
}

impl Serialize for SessionUser {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.read().serialize(serializer)
    }
}

/// Owner of the single `SessionUser` for an application session.
#[derive(Default)]
pub struct SessionCache {
    user: SessionUser,
}

impl SessionCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// The session's user record; always the same record
    pub fn get(&self) -> SessionUser {
        self.user.clone()
    }

    /// Swap in new contents, keeping the record's identity
    pub fn replace_contents(&self, new_data: UserData) {
        self.user.replace_contents(new_data);
    }

    pub fn clear(&self) {
        self.user.replace_contents(UserData::new());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn user_data(value: Value) -> UserData {
        match value {
            Value::Object(map) => map,
            other => panic!("not an object: {}", other),
        }
    }

    #[test]
    fn test_new_cache_is_anonymous() {
        let cache = SessionCache::new();
        assert!(cache.get().is_anonymous());
        assert_eq!(cache.get().len(), 0);
    }

    #[test]
    fn test_replace_contents_keeps_identity() {
        let cache = SessionCache::new();
        let before = cache.get();

        cache.replace_contents(user_data(json!({"id": 7, "name": "Bob"})));
        let after = cache.get();

        assert!(before.same_as(&after));
        assert_eq!(before.get("name"), Some(json!("Bob")));
        assert_eq!(before.get("id"), Some(json!(7)));
    }

    #[test]
    fn test_replace_contents_drops_old_keys() {
        let cache = SessionCache::new();
        cache.replace_contents(user_data(json!({"id": 7, "role": "admin"})));
        cache.replace_contents(user_data(json!({"id": 8})));

        let user = cache.get();
        assert!(!user.contains_key("role"));
        assert_eq!(user.get("id"), Some(json!(8)));
        assert_eq!(user.len(), 1);
    }

    #[test]
    fn test_clear_makes_user_anonymous() {
        let cache = SessionCache::new();
        let held = cache.get();
        cache.replace_contents(user_data(json!({"id": 7})));
        cache.clear();
        assert!(held.is_anonymous());
    }

    #[test]
    fn test_separate_caches_do_not_share() {
        let a = SessionCache::new();
        let b = SessionCache::new();
        assert!(!a.get().same_as(&b.get()));
    }

    #[test]
    fn test_serializes_as_plain_object() {
        let cache = SessionCache::new();
        cache.replace_contents(user_data(json!({"id": 7, "name": "Bob"})));
        let text = serde_json::to_string(&cache.get()).expect("serialize");
        assert_eq!(text, r#"{"id":7,"name":"Bob"}"#);
    }
}
