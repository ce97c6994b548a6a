//! Content-addressed memoization
//!
//! Keys are SHA-256 digests over a versioned canonical serialization, so the
//! same facts and targets map to the same key in every process. Entries are
//! write-once for the lifetime of the session; there is no eviction.

use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;
use tokio::sync::{Mutex, OnceCell};
use tracing::debug;

use crate::memory::facts::FactSet;

pub const FACTS_KEY_VERSION: &str = "rights-agency/facts/v2";
pub const TARGET_KEY_VERSION: &str = "rights-agency/target/v2";

#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey([u8; 32]);

impl CacheKey {
    /// Digest of a version tag followed by length-prefixed fields.
    fn digest<'a>(version: &str, fields: impl IntoIterator<Item = &'a [u8]>) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(version.as_bytes());
        for field in fields {
            hasher.update((field.len() as u64).to_le_bytes());
            hasher.update(field);
        }
        Self(hasher.finalize().into())
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CacheKey({})", &self.to_hex()[..12])
    }
}

/// Key of the EU-level rights computed for a fact set under one directive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FactsKey(CacheKey);

impl FactsKey {
    pub fn of(directive: &str, facts: &FactSet) -> Self {
        let lines = facts.canonical_lines();
        Self(CacheKey::digest(
            FACTS_KEY_VERSION,
            std::iter::once(directive.as_bytes()).chain(lines.iter().map(|l| l.as_bytes())),
        ))
    }

    pub fn key(&self) -> CacheKey {
        self.0
    }
}

impl fmt::Display for FactsKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Key of everything derived for one (directive, country, right, option)
/// over a fact set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TargetKey(CacheKey);

impl TargetKey {
    pub fn of(directive: &str, country: &str, right: &str, option: &str, facts: FactsKey) -> Self {
        let facts_bytes = facts.0 .0;
        Self(CacheKey::digest(
            TARGET_KEY_VERSION,
            [
                directive.as_bytes(),
                country.as_bytes(),
                right.as_bytes(),
                option.as_bytes(),
                &facts_bytes[..],
            ],
        ))
    }

    pub fn key(&self) -> CacheKey {
        self.0
    }
}

impl fmt::Display for TargetKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// At-most-once memo table.
///
/// Concurrent callers of the same key share one computation; a failed
/// computation leaves the key empty so "not computed" stays distinct from
/// "computed: nothing".
pub struct MemoCache<K, V> {
    name: &'static str,
    entries: Mutex<HashMap<K, Arc<OnceCell<Arc<V>>>>>,
}

impl<K, V> MemoCache<K, V>
where
    K: Eq + Hash + Clone + fmt::Display,
{
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            entries: Mutex::new(HashMap::new()),
        }
    }

    async fn cell(&self, key: &K) -> Arc<OnceCell<Arc<V>>> {
        let mut entries = self.entries.lock().await;
        entries.entry(key.clone()).or_default().clone()
    }

    pub async fn get_or_compute<F, Fut>(&self, key: K, compute: F) -> Arc<V>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = V>,
    {
        let cell = self.cell(&key).await;
        cell.get_or_init(|| async {
            debug!("{} cache miss for {}", self.name, key);
            Arc::new(compute().await)
        })
        .await
        .clone()
    }

    pub async fn get_or_try_compute<F, Fut, E>(&self, key: K, compute: F) -> Result<Arc<V>, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        let cell = self.cell(&key).await;
        cell.get_or_try_init(|| async {
            debug!("{} cache miss for {}", self.name, key);
            compute().await.map(Arc::new)
        })
        .await
        .cloned()
    }

    pub async fn get(&self, key: &K) -> Option<Arc<V>> {
        let entries = self.entries.lock().await;
        entries.get(key).and_then(|cell| cell.get().cloned())
    }

    pub async fn contains(&self, key: &K) -> bool {
        self.get(key).await.is_some()
    }

    /// Number of computed entries.
    pub async fn len(&self) -> usize {
        let entries = self.entries.lock().await;
        entries.values().filter(|cell| cell.initialized()).count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
