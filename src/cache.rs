//! Memoization of resolved module bases and recently read values.
//!
//! The cache never resolves or reads anything itself; it only remembers
//! results handed to it. Its lifetime is tied to one session: [`clear`]
//! runs on detach so a later attach never sees addresses from a previous
//! incarnation of the target.
//!
//! [`clear`]: AddressCache::clear

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use crate::types::Addr;

/// Default bound on the read-value side of the cache.
pub const DEFAULT_VALUE_CAPACITY: usize = 256;

/// Session-scoped cache of module bases and read values.
///
/// Lookup-and-insert is serialized per map; the resolve callback in
/// [`get_or_resolve`] runs outside the lock so a slow resolve does not
/// block unrelated keys. Two racing resolves of the same key may both run;
/// they produce the same value and the second insert is harmless.
///
/// [`get_or_resolve`]: AddressCache::get_or_resolve
#[derive(Debug)]
pub struct AddressCache {
    modules: Mutex<HashMap<String, Addr>>,
    values: Mutex<HashMap<Addr, Vec<u8>>>,
    value_capacity: usize,
}

impl Default for AddressCache {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_VALUE_CAPACITY)
    }
}

impl AddressCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cache with a custom bound on stored read values.
    pub fn with_capacity(value_capacity: usize) -> Self {
        AddressCache {
            modules: Mutex::new(HashMap::new()),
            values: Mutex::new(HashMap::new()),
            value_capacity: value_capacity.max(1),
        }
    }

    /// Return the cached base for `name`, or run `resolve` and remember a
    /// successful result. A failed resolve is not cached, so the next call
    /// retries.
    pub fn get_or_resolve<F>(&self, name: &str, resolve: F) -> Option<Addr>
    where
        F: FnOnce() -> Option<Addr>,
    {
        if let Some(&addr) = lock(&self.modules).get(name) {
            return Some(addr);
        }
        let addr = resolve()?;
        lock(&self.modules).insert(name.to_string(), addr);
        Some(addr)
    }

    /// Bytes previously remembered for `addr`, if still cached.
    pub fn cached_value(&self, addr: Addr) -> Option<Vec<u8>> {
        lock(&self.values).get(&addr).cloned()
    }

    /// Remember the bytes read at `addr`.
    ///
    /// On reaching capacity the value side is dropped wholesale rather than
    /// evicted entry-by-entry.
    pub fn remember_value(&self, addr: Addr, bytes: Vec<u8>) {
        let mut values = lock(&self.values);
        if values.len() >= self.value_capacity && !values.contains_key(&addr) {
            values.clear();
        }
        values.insert(addr, bytes);
    }

    /// Drop everything. Runs on detach.
    pub fn clear(&self) {
        lock(&self.modules).clear();
        lock(&self.values).clear();
    }

    /// Number of memoized module bases.
    pub fn module_count(&self) -> usize {
        lock(&self.modules).len()
    }

    /// Number of remembered read values.
    pub fn value_count(&self) -> usize {
        lock(&self.values).len()
    }
}

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}
