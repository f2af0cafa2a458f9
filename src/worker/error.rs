//! 缓存管理器错误类型

use thiserror::Error;

use crate::network::NetworkError;
use crate::storage::StoreError;

use super::lifecycle::WorkerState;

/// 安装阶段错误
///
/// 任何失败都会中止整个安装，已获取的内容一律不提交。
#[derive(Error, Debug)]
pub enum InstallError {
    #[error("cannot install while {from}")]
    InvalidTransition { from: WorkerState },

    #[error("manifest entry '{entry}' is not a valid URL: {message}")]
    InvalidUrl { entry: String, message: String },

    #[error("precaching {url} failed: {source}")]
    Fetch {
        url: String,
        #[source]
        source: NetworkError,
    },

    #[error("precaching {url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("cache storage error: {0}")]
    Storage(#[from] StoreError),
}

/// 激活阶段错误
///
/// 单个过期缓存删除失败只记入报告，不作为错误返回。
#[derive(Error, Debug)]
pub enum ActivateError {
    #[error("cannot activate while {from}")]
    InvalidTransition { from: WorkerState },

    #[error("listing caches failed: {0}")]
    Storage(#[from] StoreError),
}

/// 安装加激活的组合错误
#[derive(Error, Debug)]
pub enum LifecycleError {
    #[error(transparent)]
    Install(#[from] InstallError),

    #[error(transparent)]
    Activate(#[from] ActivateError),
}

/// 请求拦截的结果错误
#[derive(Error, Debug)]
pub enum FetchError {
    /// Uncontrolled request (manager not active) that failed on the network
    #[error(transparent)]
    Network(#[from] NetworkError),

    /// Network failed and no cached response exists
    #[error("offline and no cached response for {url}: {source}")]
    NoMatch {
        url: String,
        #[source]
        source: NetworkError,
    },
}
