//! Name → strategy lookup tables.
//!
//! A [`Registry`] is filled by an explicit bootstrap routine at startup and
//! then handed to the dispatcher, which only reads it. Registering a key
//! twice keeps the later strategy and logs the replacement.

use tracing::{debug, warn};

pub struct Registry<S: ?Sized> {
    kind: &'static str,
    entries: Vec<(String, Box<S>)>,
}

impl<S: ?Sized> Registry<S> {
    /// `kind` only labels log lines ("source", "environment").
    pub fn new(kind: &'static str) -> Self {
        Self {
            kind,
            entries: Vec::new(),
        }
    }

    /// Add or replace the strategy for `key`.
    ///
    /// Returns `true` when an earlier registration was overwritten. A
    /// replaced key keeps its original listing position.
    pub fn register(&mut self, key: impl Into<String>, strategy: Box<S>) -> bool {
        let key = key.into();
        if let Some(slot) = self.entries.iter_mut().find(|(k, _)| *k == key) {
            warn!(kind = self.kind, key = %key, "handler registered twice, the later one wins");
            slot.1 = strategy;
            return true;
        }
        debug!(kind = self.kind, key = %key, "registered handler");
        self.entries.push((key, strategy));
        false
    }

    pub fn get(&self, key: &str) -> Option<&S> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, strategy)| strategy.as_ref())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Keys in first-registration order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
