//! 基于 redb 的持久化缓存存储
//!
//! 每个命名缓存对应数据库中的一张表（`cache:<名称>`），值为 JSON 编码的响应。
//! 另有一张登记表记录缓存名称及其创建顺序。

use std::path::{Path, PathBuf};
use std::sync::Arc;

use redb::{Database, ReadableTable, TableDefinition, TableError, WriteTransaction};

use crate::network::{Request, Response};

use super::{stamp, storable_key, Cache, CacheStorage, StoreResult};

/// 缓存名称 → 创建序号
const REGISTRY: TableDefinition<&str, u64> = TableDefinition::new("__caches");
const TABLE_PREFIX: &str = "cache:";

fn table_name(cache_name: &str) -> String {
    format!("{TABLE_PREFIX}{cache_name}")
}

/// 在登记表中登记缓存（已存在则不变）
fn register(txn: &WriteTransaction, cache_name: &str) -> Result<(), redb::Error> {
    let mut registry = txn.open_table(REGISTRY)?;
    if registry.get(cache_name)?.is_some() {
        return Ok(());
    }

    let mut next = 0;
    for item in registry.iter()? {
        let (_, seq) = item?;
        next = next.max(seq.value() + 1);
    }
    registry.insert(cache_name, next)?;
    Ok(())
}

/// 持久化的命名缓存
#[derive(Clone)]
pub struct DiskCache {
    db: Arc<Database>,
    name: String,
    table: String,
}

impl DiskCache {
    fn write_batch(&self, batch: &[(String, Vec<u8>)]) -> Result<(), redb::Error> {
        let txn = self.db.begin_write()?;
        register(&txn, &self.name)?;
        {
            let mut table = txn.open_table(TableDefinition::<&str, &[u8]>::new(&self.table))?;
            for (key, value) in batch {
                table.insert(key.as_str(), value.as_slice())?;
            }
        }
        txn.commit()?;
        Ok(())
    }

    fn read(&self, key: &str) -> Result<Option<Vec<u8>>, redb::Error> {
        let txn = self.db.begin_read()?;
        let table = match txn.open_table(TableDefinition::<&str, &[u8]>::new(&self.table)) {
            Ok(table) => table,
            Err(TableError::TableDoesNotExist(_)) => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        Ok(table.get(key)?.map(|value| value.value().to_vec()))
    }

    fn remove(&self, key: &str) -> Result<bool, redb::Error> {
        let txn = self.db.begin_write()?;
        let removed = {
            let mut table = txn.open_table(TableDefinition::<&str, &[u8]>::new(&self.table))?;
            let removed = table.remove(key)?.is_some();
            removed
        };
        txn.commit()?;
        Ok(removed)
    }

    fn list(&self) -> Result<Vec<String>, redb::Error> {
        let txn = self.db.begin_read()?;
        let table = match txn.open_table(TableDefinition::<&str, &[u8]>::new(&self.table)) {
            Ok(table) => table,
            Err(TableError::TableDoesNotExist(_)) => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let mut keys = Vec::new();
        for item in table.iter()? {
            let (key, _) = item?;
            keys.push(key.value().to_string());
        }
        Ok(keys)
    }
}

impl Cache for DiskCache {
    fn name(&self) -> &str {
        &self.name
    }

    fn put(&self, request: &Request, response: Response) -> StoreResult<()> {
        self.put_all(vec![(request.clone(), response)])
    }

    fn put_all(&self, entries: Vec<(Request, Response)>) -> StoreResult<()> {
        let mut batch = Vec::with_capacity(entries.len());
        for (request, response) in entries {
            let key = storable_key(&request)?;
            batch.push((key, serde_json::to_vec(&stamp(response))?));
        }
        // 单个写事务：要么全部提交，要么全部不生效
        Ok(self.write_batch(&batch)?)
    }

    fn match_request(&self, request: &Request) -> StoreResult<Option<Response>> {
        if !request.method.is_get() {
            return Ok(None);
        }
        match self.read(&request.cache_key())? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    fn delete(&self, request: &Request) -> StoreResult<bool> {
        Ok(self.remove(&request.cache_key())?)
    }

    fn keys(&self) -> StoreResult<Vec<String>> {
        Ok(self.list()?)
    }
}

/// 持久化的缓存集合
///
/// 克隆共享同一个数据库句柄。
#[derive(Clone)]
pub struct DiskStorage {
    db: Arc<Database>,
    path: PathBuf,
}

impl DiskStorage {
    /// 打开（或创建）数据库文件
    pub fn open_path(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| super::StoreError::Other(format!("{}: {e}", parent.display())))?;
            }
        }
        let db = Database::create(&path).map_err(redb::Error::from)?;
        tracing::debug!("opened cache database {}", path.display());
        Ok(Self {
            db: Arc::new(db),
            path,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn registered(&self) -> Result<Vec<(String, u64)>, redb::Error> {
        let txn = self.db.begin_read()?;
        let registry = match txn.open_table(REGISTRY) {
            Ok(table) => table,
            Err(TableError::TableDoesNotExist(_)) => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let mut names = Vec::new();
        for item in registry.iter()? {
            let (name, seq) = item?;
            names.push((name.value().to_string(), seq.value()));
        }
        names.sort_by_key(|(_, seq)| *seq);
        Ok(names)
    }

    fn create(&self, name: &str) -> Result<(), redb::Error> {
        let txn = self.db.begin_write()?;
        register(&txn, name)?;
        txn.open_table(TableDefinition::<&str, &[u8]>::new(&table_name(name)))?;
        txn.commit()?;
        Ok(())
    }

    fn drop_cache(&self, name: &str) -> Result<bool, redb::Error> {
        let txn = self.db.begin_write()?;
        let registered = {
            let mut registry = txn.open_table(REGISTRY)?;
            let removed = registry.remove(name)?.is_some();
            removed
        };
        let table = table_name(name);
        let dropped = txn.delete_table(TableDefinition::<&str, &[u8]>::new(&table))?;
        txn.commit()?;
        Ok(registered || dropped)
    }
}

impl CacheStorage for DiskStorage {
    type Cache = DiskCache;

    fn open(&self, name: &str) -> StoreResult<DiskCache> {
        self.create(name)?;
        Ok(DiskCache {
            db: Arc::clone(&self.db),
            name: name.to_string(),
            table: table_name(name),
        })
    }

    fn has(&self, name: &str) -> StoreResult<bool> {
        Ok(self.registered()?.iter().any(|(registered, _)| registered == name))
    }

    fn keys(&self) -> StoreResult<Vec<String>> {
        Ok(self
            .registered()?
            .into_iter()
            .map(|(name, _)| name)
            .collect())
    }

    fn delete(&self, name: &str) -> StoreResult<bool> {
        Ok(self.drop_cache(name)?)
    }

    fn match_request(&self, request: &Request) -> StoreResult<Option<Response>> {
        if !request.method.is_get() {
            return Ok(None);
        }
        // 只读查找，不触发 open() 的登记写事务
        for name in self.keys()? {
            let cache = DiskCache {
                db: Arc::clone(&self.db),
                table: table_name(&name),
                name,
            };
            if let Some(response) = cache.match_request(request)? {
                return Ok(Some(response));
            }
        }
        Ok(None)
    }
}
