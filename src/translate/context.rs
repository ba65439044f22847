use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

pub const MAX_CONTEXT_ITEMS: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslationPair {
    pub source: String,
    pub translated: String,
}

/// Bounded FIFO of recent source/translation pairs, shared across pages so
/// later requests can reuse established terminology. Oldest entries fall off
/// once the cap is reached.
#[derive(Debug, Clone, Default)]
pub struct ContextStore {
    inner: Arc<Mutex<VecDeque<TranslationPair>>>,
}

impl ContextStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, source: impl Into<String>, translated: impl Into<String>) {
        let mut guard = match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if guard.len() >= MAX_CONTEXT_ITEMS {
            guard.pop_front();
        }
        guard.push_back(TranslationPair {
            source: source.into(),
            translated: translated.into(),
        });
    }

    pub fn snapshot(&self) -> Vec<TranslationPair> {
        let guard = match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        guard.iter().cloned().collect()
    }

    pub fn clear(&self) {
        let mut guard = match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        guard.clear();
    }

    pub fn is_empty(&self) -> bool {
        let guard = match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        guard.is_empty()
    }
}
