use std::sync::{Mutex, MutexGuard};

/// Holds the backend credential for the lifetime of the process.
/// Shared between the API client (which attaches it to requests) and the
/// workflow engine (which clears it on logout or auth failure).
#[derive(Debug, Default)]
pub struct SessionStore {
    token: Mutex<Option<String>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has_token(&self) -> bool {
        self.lock().is_some()
    }

    pub fn token(&self) -> Option<String> {
        self.lock().clone()
    }

    pub fn set_token(&self, token: impl Into<String>) {
        *self.lock() = Some(token.into());
    }

    pub fn clear_token(&self) {
        *self.lock() = None;
    }

    fn lock(&self) -> MutexGuard<'_, Option<String>> {
        self.token.lock().expect("session store lock poisoned")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reflects_most_recent_call() {
        let store = SessionStore::new();
        assert!(!store.has_token());

        store.set_token("abc");
        assert!(store.has_token());
        assert_eq!(store.token().as_deref(), Some("abc"));

        store.set_token("def");
        assert_eq!(store.token().as_deref(), Some("def"));

        store.clear_token();
        assert!(!store.has_token());
        assert_eq!(store.token(), None);
    }
}
