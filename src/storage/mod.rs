//! # 缓存存储模块
//!
//! 命名、带版本的请求→响应存储。一个 `CacheStorage` 持有若干以版本标签命名的
//! `Cache`，激活阶段通过删除非当前名称的存储完成版本迁移。
//!
//! # 模块组织
//!
//! - `memory` - 进程内存储后端
//! - `disk` - 基于 redb 的持久化存储后端

pub mod disk;
pub mod memory;

use thiserror::Error;

use crate::network::{Request, Response};

pub use disk::{DiskCache, DiskStorage};
pub use memory::{MemoryCache, MemoryStorage};

/// 存储错误
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] redb::Error),

    #[error("stored response could not be encoded: {0}")]
    Encoding(#[from] serde_json::Error),

    #[error("only GET requests can be stored, got {0}")]
    UnsupportedMethod(String),

    #[error("cache lock poisoned")]
    Poisoned,

    #[error("{0}")]
    Other(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// 单个命名缓存
///
/// 单键写入是原子的；同一键的并发写入以最后一次为准。
pub trait Cache: Clone + Send + Sync + 'static {
    fn name(&self) -> &str;

    /// Store one response. Rejects non-GET requests.
    fn put(&self, request: &Request, response: Response) -> StoreResult<()>;

    /// Store a batch in one atomic step: either every entry lands or none does.
    fn put_all(&self, entries: Vec<(Request, Response)>) -> StoreResult<()>;

    /// Look a request up. Non-GET requests never match.
    fn match_request(&self, request: &Request) -> StoreResult<Option<Response>>;

    fn delete(&self, request: &Request) -> StoreResult<bool>;

    /// Cache keys currently stored, in no particular order.
    fn keys(&self) -> StoreResult<Vec<String>>;
}

/// 命名缓存的集合
pub trait CacheStorage: Clone + Send + Sync + 'static {
    type Cache: Cache;

    /// Open the named cache, creating it when absent.
    fn open(&self, name: &str) -> StoreResult<Self::Cache>;

    fn has(&self, name: &str) -> StoreResult<bool>;

    /// Cache names in creation order.
    fn keys(&self) -> StoreResult<Vec<String>>;

    /// Delete the named cache. Returns whether it existed.
    fn delete(&self, name: &str) -> StoreResult<bool>;

    /// Look a request up across every cache, first hit in creation order wins.
    fn match_request(&self, request: &Request) -> StoreResult<Option<Response>> {
        if !request.method.is_get() {
            return Ok(None);
        }

        for name in self.keys()? {
            if let Some(response) = self.open(&name)?.match_request(request)? {
                return Ok(Some(response));
            }
        }

        Ok(None)
    }
}

/// 校验请求方法并给出存储用的缓存键
pub(crate) fn storable_key(request: &Request) -> StoreResult<String> {
    if !request.method.is_get() {
        return Err(StoreError::UnsupportedMethod(request.method.to_string()));
    }
    Ok(request.cache_key())
}

/// 打上存储时间戳
pub(crate) fn stamp(mut response: Response) -> Response {
    response.stored_at = Some(chrono::Utc::now());
    response
}
