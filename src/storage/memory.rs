//! 进程内缓存存储

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::network::{Request, Response};

use super::{stamp, storable_key, Cache, CacheStorage, StoreError, StoreResult};

/// 内存中的命名缓存
#[derive(Clone, Debug)]
pub struct MemoryCache {
    name: Arc<str>,
    entries: Arc<RwLock<HashMap<String, Response>>>,
}

impl MemoryCache {
    fn new(name: &str) -> Self {
        Self {
            name: Arc::from(name),
            entries: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// 条目数量
    pub fn len(&self) -> usize {
        self.entries.read().map(|entries| entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Cache for MemoryCache {
    fn name(&self) -> &str {
        &self.name
    }

    fn put(&self, request: &Request, response: Response) -> StoreResult<()> {
        let key = storable_key(request)?;
        let mut entries = self.entries.write().map_err(|_| StoreError::Poisoned)?;
        entries.insert(key, stamp(response));
        Ok(())
    }

    fn put_all(&self, entries: Vec<(Request, Response)>) -> StoreResult<()> {
        // 先全部校验，再在同一把锁下写入
        let staged = entries
            .into_iter()
            .map(|(request, response)| Ok((storable_key(&request)?, stamp(response))))
            .collect::<StoreResult<Vec<_>>>()?;

        let mut map = self.entries.write().map_err(|_| StoreError::Poisoned)?;
        map.extend(staged);
        Ok(())
    }

    fn match_request(&self, request: &Request) -> StoreResult<Option<Response>> {
        if !request.method.is_get() {
            return Ok(None);
        }
        let entries = self.entries.read().map_err(|_| StoreError::Poisoned)?;
        Ok(entries.get(&request.cache_key()).cloned())
    }

    fn delete(&self, request: &Request) -> StoreResult<bool> {
        let mut entries = self.entries.write().map_err(|_| StoreError::Poisoned)?;
        Ok(entries.remove(&request.cache_key()).is_some())
    }

    fn keys(&self) -> StoreResult<Vec<String>> {
        let entries = self.entries.read().map_err(|_| StoreError::Poisoned)?;
        Ok(entries.keys().cloned().collect())
    }
}

/// 内存中的缓存集合
///
/// 克隆开销很小，克隆之间共享同一组缓存。
#[derive(Clone, Debug, Default)]
pub struct MemoryStorage {
    caches: Arc<RwLock<Vec<MemoryCache>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CacheStorage for MemoryStorage {
    type Cache = MemoryCache;

    fn open(&self, name: &str) -> StoreResult<MemoryCache> {
        let mut caches = self.caches.write().map_err(|_| StoreError::Poisoned)?;
        if let Some(cache) = caches.iter().find(|cache| cache.name() == name) {
            return Ok(cache.clone());
        }

        let cache = MemoryCache::new(name);
        caches.push(cache.clone());
        Ok(cache)
    }

    fn has(&self, name: &str) -> StoreResult<bool> {
        let caches = self.caches.read().map_err(|_| StoreError::Poisoned)?;
        Ok(caches.iter().any(|cache| cache.name() == name))
    }

    fn keys(&self) -> StoreResult<Vec<String>> {
        let caches = self.caches.read().map_err(|_| StoreError::Poisoned)?;
        Ok(caches.iter().map(|cache| cache.name().to_string()).collect())
    }

    fn delete(&self, name: &str) -> StoreResult<bool> {
        let mut caches = self.caches.write().map_err(|_| StoreError::Poisoned)?;
        let before = caches.len();
        caches.retain(|cache| cache.name() != name);
        Ok(caches.len() != before)
    }
}
