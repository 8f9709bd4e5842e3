//! Rotating pool of Alpha Vantage API keys.

use serde::Serialize;
use std::sync::{Mutex, PoisonError};
use tracing::info;

const MASK_PREFIX_LEN: usize = 8;

/// Masks a key for logs and status output. At most half of the key, and
/// never more than eight characters, is shown.
pub fn mask_key(key: &str) -> String {
    let shown = (key.chars().count() / 2).min(MASK_PREFIX_LEN);
    let prefix: String = key.chars().take(shown).collect();
    format!("{prefix}...")
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KeyUsage {
    pub index: usize,
    pub key: String,
    pub requests: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KeyPoolStatus {
    pub total_keys: usize,
    pub current_key_index: usize,
    pub current_key: Option<String>,
    /// Request counts in pool order.
    pub usage: Vec<KeyUsage>,
}

struct PoolState {
    current: usize,
    usage: Vec<u64>,
}

/// Ordered keys with fail-over rotation. The pool stays on a key until that
/// key fails, then moves to the next one.
pub struct ApiKeyPool {
    keys: Vec<String>,
    state: Mutex<PoolState>,
}

impl ApiKeyPool {
    pub fn new(keys: Vec<String>) -> Self {
        let usage = vec![0; keys.len()];
        Self {
            keys,
            state: Mutex::new(PoolState { current: 0, usage }),
        }
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn current_index(&self) -> usize {
        self.lock().current
    }

    /// The key `offset` positions after `start`, wrapping around.
    pub fn key_at(&self, start: usize, offset: usize) -> Option<(usize, &str)> {
        if self.keys.is_empty() {
            return None;
        }
        let index = (start + offset) % self.keys.len();
        Some((index, self.keys[index].as_str()))
    }

    pub fn record_use(&self, index: usize) {
        if let Some(count) = self.lock().usage.get_mut(index) {
            *count += 1;
        }
    }

    /// Moves past `failed` if it is still the current key. A key that another
    /// request already rotated away from is left alone.
    pub fn rotate_from(&self, failed: usize) {
        if self.keys.len() < 2 {
            return;
        }
        let mut state = self.lock();
        if state.current == failed {
            state.current = (failed + 1) % self.keys.len();
            info!(
                "Rotated API key {} -> {}",
                mask_key(&self.keys[failed]),
                mask_key(&self.keys[state.current])
            );
        }
    }

    pub fn status(&self) -> KeyPoolStatus {
        let state = self.lock();
        let usage = self
            .keys
            .iter()
            .zip(&state.usage)
            .enumerate()
            .map(|(index, (key, requests))| KeyUsage {
                index,
                key: mask_key(key),
                requests: *requests,
            })
            .collect();
        KeyPoolStatus {
            total_keys: self.keys.len(),
            current_key_index: state.current,
            current_key: self.keys.get(state.current).map(|k| mask_key(k)),
            usage,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, PoolState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
