//! Per-token cache of immutable command replies.
//!
//! Capability answers never change while a token stays connected. The IO
//! task records them as they arrive and the token handle reads them back,
//! so repeated queries are answered without touching the link.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use anyboard_core::TokenValue;

/// Shared map from command name to its last reply.
#[derive(Debug, Clone, Default)]
pub(crate) struct CommandCache {
    inner: Arc<Mutex<HashMap<&'static str, TokenValue>>>,
}

impl CommandCache {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn get(&self, name: &str) -> Option<TokenValue> {
        self.lock().get(name).cloned()
    }

    pub(crate) fn insert(&self, name: &'static str, value: TokenValue) {
        self.lock().insert(name, value);
    }

    pub(crate) fn clear(&self) {
        self.lock().clear();
    }

    // Entries are plain values, so a poisoned lock is still consistent.
    fn lock(&self) -> MutexGuard<'_, HashMap<&'static str, TokenValue>> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
