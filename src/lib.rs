//! # KTVDI Offline Library
//!
//! KTVDI 静态站点的离线运行时：版本化的离线缓存管理器与 HTML 局部片段加载器。
//!
//! ## 模块组织
//!
//! - `worker` - 离线缓存管理器（安装、激活、网络优先拦截）
//! - `partials` - 局部片段加载与 DOM 插槽注入
//! - `network` - 请求/响应模型与网络请求接缝
//! - `storage` - 命名缓存存储（内存与 redb 持久化后端）
//! - `config` - 显式配置（文件、`.env`、环境变量）
//! - `env` - 类型安全的环境变量
//! - `logging` - tracing 初始化

pub mod config;
pub mod env;
pub mod logging;
pub mod network;
pub mod partials;
pub mod storage;
pub mod worker;

// Re-export commonly used items for convenience
pub use config::{ConfigError, OfflineConfig};
pub use network::{Fetcher, HttpFetcher, Method, NetworkError, Request, Response, ResponseType};
pub use partials::{LoadError, PageDocument, PartialLoader, PartialSlot, SlotOutcome};
pub use storage::{Cache, CacheStorage, DiskStorage, MemoryStorage, StoreError};
pub use worker::{
    ActivateError, ActivationReport, AssetManifest, FetchError, InstallError, LifecycleError,
    OfflineCacheManager, WorkerState,
};
