// Session-scoped key/value store.
//
// All wizard state lives in the administrator's session; the host
// application provides the real store (cookie-backed, database-backed, …).
// The in-memory implementation covers tests and single-process deployments.

use std::collections::HashMap;
use uuid::Uuid;

/// Key/value storage scoped to one user session.
pub trait SessionStore: Send {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&mut self, key: &str, value: String);

    fn get_or(&self, key: &str, default: &str) -> String {
        self.get(key).unwrap_or_else(|| default.to_string())
    }
}

/// Simple in-memory session store.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    id: Option<Uuid>,
    values: HashMap<String, String>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self {
            id: Some(Uuid::new_v4()),
            values: HashMap::new(),
        }
    }

    /// Stable identifier of this session, for log correlation.
    pub fn id(&self) -> Option<Uuid> {
        self.id
    }
}

impl SessionStore for MemorySessionStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: String) {
        self.values.insert(key.to_string(), value);
    }
}
