//! In-memory key-value backend for projection cache tests
//!
//! Provides fast, deterministic testing infrastructure for the repository:
//! - [`InMemoryKeyValueBackend`]: HashMap-based strings and sets with Redis-like semantics
//! - [`BackendCall`]: recorded backend round-trips, for asserting call patterns
//! - Failure and latency injection, for partial-failure and timeout scenarios
//! - Raw access that bypasses the repository, for creating drift out-of-band

#![allow(clippy::unwrap_used)] // Test infrastructure uses unwrap for simplicity
#![allow(clippy::missing_panics_doc)] // Test utilities document panics where critical

use product_projection_core::{KeyValueBackend, ProjectionError, Result};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};
use std::time::Duration;

/// One backend round-trip, as seen by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendCall {
    /// `GET`
    Get,
    /// `MGET`
    MultiGet,
    /// `SET`
    Set,
    /// `MSET`
    MultiSet,
    /// `DEL`
    Delete,
    /// `SADD`
    SetAdd,
    /// `SREM`
    SetRemove,
    /// `SMEMBERS`
    SetMembers,
    /// `SCARD`
    SetCardinality,
    /// `SCAN`
    ScanKeys,
}

impl BackendCall {
    /// Operation name used in errors.
    #[must_use]
    pub const fn operation(self) -> &'static str {
        match self {
            Self::Get => "get",
            Self::MultiGet => "mget",
            Self::Set => "set",
            Self::MultiSet => "mset",
            Self::Delete => "del",
            Self::SetAdd => "sadd",
            Self::SetRemove => "srem",
            Self::SetMembers => "smembers",
            Self::SetCardinality => "scard",
            Self::ScanKeys => "scan",
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Failure {
    Always,
    Times(usize),
}

#[derive(Debug, Default)]
struct BackendState {
    strings: HashMap<String, Vec<u8>>,
    sets: HashMap<String, HashSet<String>>,
    calls: Vec<BackendCall>,
    failures: HashMap<BackendCall, Failure>,
    unavailable: bool,
    latency: Option<Duration>,
}

impl BackendState {
    fn wrong_type(operation: &'static str) -> ProjectionError {
        ProjectionError::Backend {
            operation,
            reason: "WRONGTYPE Operation against a key holding the wrong kind of value"
                .to_string(),
        }
    }
}

/// In-memory key-value backend for fast, deterministic testing.
///
/// Strings and sets share one key space like in Redis: `set` replaces a key
/// of any type, `del` removes either kind, and set commands on a string key
/// fail with a `WRONGTYPE` error. Set iteration order is unspecified, as it
/// is in Redis.
///
/// # Example
///
/// ```
/// use product_projection_testing::{BackendCall, InMemoryKeyValueBackend};
/// use product_projection_core::{KeyValueBackend, ProductProjectionRepository};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let backend = InMemoryKeyValueBackend::new();
/// let repository = ProductProjectionRepository::new(backend.clone());
///
/// assert!(repository.find_all().await?.is_empty());
/// assert_eq!(backend.calls(), vec![BackendCall::SetMembers]);
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug, Default)]
pub struct InMemoryKeyValueBackend {
    state: Arc<RwLock<BackendState>>,
}

impl InMemoryKeyValueBackend {
    /// Create a new empty backend
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail every future call of this kind with `BackendUnavailable`
    ///
    /// Stays in effect until [`clear_failures`](Self::clear_failures).
    pub fn fail_on(&self, call: BackendCall) {
        self.state
            .write()
            .unwrap()
            .failures
            .insert(call, Failure::Always);
    }

    /// Fail the next `times` calls of this kind with `BackendUnavailable`
    pub fn fail_next(&self, call: BackendCall, times: usize) {
        self.state
            .write()
            .unwrap()
            .failures
            .insert(call, Failure::Times(times));
    }

    /// Remove all injected per-call failures
    pub fn clear_failures(&self) {
        self.state.write().unwrap().failures.clear();
    }

    /// Make every call fail as if the backend were unreachable
    pub fn set_unavailable(&self, unavailable: bool) {
        self.state.write().unwrap().unavailable = unavailable;
    }

    /// Delay every call by `latency` before it is served
    pub fn set_latency(&self, latency: Option<Duration>) {
        self.state.write().unwrap().latency = latency;
    }

    /// All calls received so far, in order
    #[must_use]
    pub fn calls(&self) -> Vec<BackendCall> {
        self.state.read().unwrap().calls.clone()
    }

    /// Number of calls of one kind received so far
    #[must_use]
    pub fn call_count(&self, call: BackendCall) -> usize {
        self.state
            .read()
            .unwrap()
            .calls
            .iter()
            .filter(|c| **c == call)
            .count()
    }

    /// Forget recorded calls
    pub fn reset_calls(&self) {
        self.state.write().unwrap().calls.clear();
    }

    /// Write a string value directly, bypassing failure injection and call recording
    pub fn insert_raw(&self, key: &str, value: impl Into<Vec<u8>>) {
        let mut state = self.state.write().unwrap();
        state.sets.remove(key);
        state.strings.insert(key.to_string(), value.into());
    }

    /// Delete a key of any type directly
    ///
    /// Returns whether the key existed.
    pub fn remove_raw(&self, key: &str) -> bool {
        let mut state = self.state.write().unwrap();
        let had_string = state.strings.remove(key).is_some();
        let had_set = state.sets.remove(key).is_some();
        had_string || had_set
    }

    /// Add a set member directly
    pub fn add_member_raw(&self, key: &str, member: &str) {
        self.state
            .write()
            .unwrap()
            .sets
            .entry(key.to_string())
            .or_default()
            .insert(member.to_string());
    }

    /// Read a string value directly
    #[must_use]
    pub fn raw(&self, key: &str) -> Option<Vec<u8>> {
        self.state.read().unwrap().strings.get(key).cloned()
    }

    /// Check if a key of any type exists
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        let state = self.state.read().unwrap();
        state.strings.contains_key(key) || state.sets.contains_key(key)
    }

    /// Members of a set, sorted for stable assertions
    #[must_use]
    pub fn members(&self, key: &str) -> Vec<String> {
        let mut members: Vec<String> = self
            .state
            .read()
            .unwrap()
            .sets
            .get(key)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default();
        members.sort();
        members
    }

    /// All string keys, sorted
    #[must_use]
    pub fn string_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.state.read().unwrap().strings.keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Number of keys of any type
    #[must_use]
    pub fn len(&self) -> usize {
        let state = self.state.read().unwrap();
        state.strings.len() + state.sets.len()
    }

    /// Check if the backend holds no keys
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop all data, calls, failures and latency (for test isolation)
    pub fn reset(&self) {
        *self.state.write().unwrap() = BackendState::default();
    }

    /// Record the call, apply latency, then apply failure injection.
    async fn enter(&self, call: BackendCall) -> Result<()> {
        let latency = {
            let mut state = self.state.write().unwrap();
            state.calls.push(call);
            state.latency
        };

        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }

        let mut state = self.state.write().unwrap();
        if state.unavailable {
            return Err(ProjectionError::unavailable(
                call.operation(),
                "Connection refused (os error 111)",
            ));
        }

        let fail = match state.failures.get(&call).copied() {
            Some(Failure::Always) => true,
            Some(Failure::Times(n)) if n > 0 => {
                state.failures.insert(call, Failure::Times(n - 1));
                true
            }
            _ => false,
        };
        if fail {
            return Err(ProjectionError::unavailable(
                call.operation(),
                "injected failure",
            ));
        }
        Ok(())
    }
}

impl KeyValueBackend for InMemoryKeyValueBackend {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        self.enter(BackendCall::Get).await?;
        let state = self.state.read().unwrap();
        if state.sets.contains_key(key) {
            return Err(BackendState::wrong_type("get"));
        }
        Ok(state.strings.get(key).cloned())
    }

    async fn multi_get(&self, keys: &[String]) -> Result<Vec<Option<Vec<u8>>>> {
        self.enter(BackendCall::MultiGet).await?;
        let state = self.state.read().unwrap();
        // MGET answers nil for keys of other types
        Ok(keys.iter().map(|key| state.strings.get(key).cloned()).collect())
    }

    async fn set(&self, key: &str, value: &[u8]) -> Result<()> {
        self.enter(BackendCall::Set).await?;
        let mut state = self.state.write().unwrap();
        state.sets.remove(key);
        state.strings.insert(key.to_string(), value.to_vec());
        Ok(())
    }

    async fn multi_set(&self, entries: &[(String, Vec<u8>)]) -> Result<()> {
        self.enter(BackendCall::MultiSet).await?;
        let mut state = self.state.write().unwrap();
        for (key, value) in entries {
            state.sets.remove(key);
            state.strings.insert(key.clone(), value.clone());
        }
        Ok(())
    }

    async fn delete(&self, keys: &[String]) -> Result<()> {
        self.enter(BackendCall::Delete).await?;
        let mut state = self.state.write().unwrap();
        for key in keys {
            state.strings.remove(key);
            state.sets.remove(key);
        }
        Ok(())
    }

    async fn set_add(&self, key: &str, members: &[String]) -> Result<()> {
        self.enter(BackendCall::SetAdd).await?;
        let mut state = self.state.write().unwrap();
        if state.strings.contains_key(key) {
            return Err(BackendState::wrong_type("sadd"));
        }
        state
            .sets
            .entry(key.to_string())
            .or_default()
            .extend(members.iter().cloned());
        Ok(())
    }

    async fn set_remove(&self, key: &str, members: &[String]) -> Result<()> {
        self.enter(BackendCall::SetRemove).await?;
        let mut state = self.state.write().unwrap();
        if state.strings.contains_key(key) {
            return Err(BackendState::wrong_type("srem"));
        }
        if let Some(set) = state.sets.get_mut(key) {
            for member in members {
                set.remove(member);
            }
            // Redis removes a set once its last member is gone
            if set.is_empty() {
                state.sets.remove(key);
            }
        }
        Ok(())
    }

    async fn set_members(&self, key: &str) -> Result<Vec<String>> {
        self.enter(BackendCall::SetMembers).await?;
        let state = self.state.read().unwrap();
        if state.strings.contains_key(key) {
            return Err(BackendState::wrong_type("smembers"));
        }
        Ok(state
            .sets
            .get(key)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default())
    }

    async fn set_cardinality(&self, key: &str) -> Result<usize> {
        self.enter(BackendCall::SetCardinality).await?;
        let state = self.state.read().unwrap();
        if state.strings.contains_key(key) {
            return Err(BackendState::wrong_type("scard"));
        }
        Ok(state.sets.get(key).map_or(0, HashSet::len))
    }

    async fn scan_keys(&self, pattern: &str) -> Result<Vec<String>> {
        self.enter(BackendCall::ScanKeys).await?;
        let state = self.state.read().unwrap();
        let matches = |key: &str| match pattern.strip_suffix('*') {
            Some(prefix) => key.starts_with(prefix),
            None => key == pattern,
        };
        let mut keys: Vec<String> = state
            .strings
            .keys()
            .chain(state.sets.keys())
            .filter(|key| matches(key))
            .cloned()
            .collect();
        keys.sort();
        Ok(keys)
    }
}
