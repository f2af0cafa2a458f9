//! # 离线缓存管理器
//!
//! 负责三件事：
//!
//! - 安装：打开当前版本的缓存并预缓存整个资源清单（全有或全无）
//! - 激活：删除所有非当前版本的缓存
//! - 拦截：网络优先，离线时回退到缓存
//!
//! # 模块组织
//!
//! - `manifest` - 预缓存资源清单
//! - `lifecycle` - 生命周期状态与激活报告
//! - `error` - 各阶段的错误类型

pub mod error;
pub mod lifecycle;
pub mod manifest;

use std::sync::{Mutex, MutexGuard};

use futures::future::{join_all, try_join_all};
use tokio::task::JoinSet;
use url::Url;

use crate::config::{ConfigError, OfflineConfig};
use crate::network::{Fetcher, Request, Response};
use crate::storage::{Cache, CacheStorage, StoreError, StoreResult};

pub use error::{ActivateError, FetchError, InstallError, LifecycleError};
pub use lifecycle::{ActivationReport, WorkerState};
pub use manifest::{AssetManifest, DEFAULT_ASSETS};

/// 在阻塞线程池上执行同步存储操作
async fn run_blocking<T, F>(operation: F) -> StoreResult<T>
where
    T: Send + 'static,
    F: FnOnce() -> StoreResult<T> + Send + 'static,
{
    tokio::task::spawn_blocking(operation)
        .await
        .map_err(|e| StoreError::Other(format!("storage task failed: {e}")))?
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// 离线缓存管理器
///
/// 由调用方推进生命周期：先 `install`，再 `activate`，之后每个请求走 `handle_fetch`。
pub struct OfflineCacheManager<F, S> {
    cache_name: String,
    origin: Url,
    manifest: AssetManifest,
    fetcher: F,
    storage: S,
    state: Mutex<WorkerState>,
    background: Mutex<JoinSet<()>>,
}

impl<F, S> OfflineCacheManager<F, S>
where
    F: Fetcher,
    S: CacheStorage,
{
    /// 创建缓存管理器
    ///
    /// # 参数
    ///
    /// * `config` - 使用前先校验，提供缓存名称、站点源和资源清单
    /// * `fetcher` - 网络访问
    /// * `storage` - 缓存存储后端
    pub fn new(config: &OfflineConfig, fetcher: F, storage: S) -> Result<Self, ConfigError> {
        config.validate()?;

        Ok(Self {
            cache_name: config.cache_name.clone(),
            origin: config.origin_url()?,
            manifest: config.precache.clone(),
            fetcher,
            storage,
            state: Mutex::new(WorkerState::Uninstalled),
            background: Mutex::new(JoinSet::new()),
        })
    }

    pub fn cache_name(&self) -> &str {
        &self.cache_name
    }

    pub fn manifest(&self) -> &AssetManifest {
        &self.manifest
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn state(&self) -> WorkerState {
        *lock(&self.state)
    }

    fn set_state(&self, state: WorkerState) {
        *lock(&self.state) = state;
    }

    /// 仅当当前状态为 `from` 时切换到 `to`，否则返回实际状态
    fn transition(&self, from: WorkerState, to: WorkerState) -> Result<(), WorkerState> {
        let mut state = lock(&self.state);
        if *state != from {
            return Err(*state);
        }
        *state = to;
        Ok(())
    }

    /// 安装：打开当前缓存并预缓存整个清单
    ///
    /// 并发获取清单中的全部 URL，只有全部以 2xx 成功时才一次性原子提交。
    pub async fn install(&self) -> Result<(), InstallError> {
        self.transition(WorkerState::Uninstalled, WorkerState::Installing)
            .map_err(|from| InstallError::InvalidTransition { from })?;

        match self.precache().await {
            Ok(count) => {
                self.set_state(WorkerState::Installed);
                tracing::info!("cache {} installed with {} assets", self.cache_name, count);
                Ok(())
            }
            Err(e) => {
                self.set_state(WorkerState::Uninstalled);
                tracing::warn!("install of cache {} failed: {}", self.cache_name, e);
                Err(e)
            }
        }
    }

    async fn precache(&self) -> Result<usize, InstallError> {
        let storage = self.storage.clone();
        let name = self.cache_name.clone();
        let cache = run_blocking(move || storage.open(&name)).await?;
        tracing::info!("opened cache {}", self.cache_name);

        let urls = self
            .manifest
            .resolve(&self.origin)
            .map_err(|(entry, e)| InstallError::InvalidUrl {
                entry,
                message: e.to_string(),
            })?;

        let fetches = urls.into_iter().map(|url| async move {
            let request = Request::get(url);
            let response =
                self.fetcher
                    .fetch(&request)
                    .await
                    .map_err(|source| InstallError::Fetch {
                        url: request.url.to_string(),
                        source,
                    })?;
            if !response.ok() {
                return Err(InstallError::Status {
                    url: request.url.to_string(),
                    status: response.status,
                });
            }
            Ok((request, response))
        });
        let entries = try_join_all(fetches).await?;

        let count = entries.len();
        run_blocking(move || cache.put_all(entries)).await?;
        Ok(count)
    }

    /// 激活：删除所有非当前版本的缓存
    ///
    /// 并发删除并等待全部完成。删除失败只记录日志并列入报告，激活照常完成。
    pub async fn activate(&self) -> Result<ActivationReport, ActivateError> {
        self.transition(WorkerState::Installed, WorkerState::Activating)
            .map_err(|from| ActivateError::InvalidTransition { from })?;

        let storage = self.storage.clone();
        let names = match run_blocking(move || storage.keys()).await {
            Ok(names) => names,
            Err(e) => {
                self.set_state(WorkerState::Installed);
                return Err(e.into());
            }
        };

        let deletions = names
            .into_iter()
            .filter(|name| *name != self.cache_name)
            .map(|name| {
                let storage = self.storage.clone();
                async move {
                    tracing::info!("deleting stale cache: {}", name);
                    let target = name.clone();
                    let result = run_blocking(move || storage.delete(&target)).await;
                    (name, result)
                }
            });

        let mut report = ActivationReport::default();
        for (name, result) in join_all(deletions).await {
            match result {
                Ok(_) => report.deleted.push(name),
                Err(e) => {
                    tracing::warn!("could not delete stale cache {}: {}", name, e);
                    report.failed.push((name, e.to_string()));
                }
            }
        }

        self.set_state(WorkerState::Active);
        tracing::info!(
            "cache {} active, {} stale caches removed",
            self.cache_name,
            report.deleted.len()
        );
        Ok(report)
    }

    /// 依次执行安装与激活
    pub async fn install_and_activate(&self) -> Result<ActivationReport, LifecycleError> {
        self.install().await?;
        Ok(self.activate().await?)
    }

    /// 拦截一次请求：网络优先，失败时回退到缓存
    ///
    /// GET 请求的 200 同源响应由后台任务复制进当前缓存，调用方无需等待即可拿到网络响应。
    /// 激活之前请求直接走网络。
    pub async fn handle_fetch(&self, request: Request) -> Result<Response, FetchError> {
        if !self.state().controls_fetches() {
            return Ok(self.fetcher.fetch(&request).await?);
        }

        match self.fetcher.fetch(&request).await {
            Ok(response) => {
                if response.is_cacheable() && request.method.is_get() {
                    self.store_in_background(request, response.clone());
                } else {
                    tracing::debug!(
                        "not caching {} {} (status {}, {:?})",
                        request.method,
                        request.url,
                        response.status,
                        response.response_type
                    );
                }
                Ok(response)
            }
            Err(error) => {
                tracing::debug!("network failed for {}: {}", request.url, error);
                let storage = self.storage.clone();
                let lookup = request.clone();
                match run_blocking(move || storage.match_request(&lookup)).await {
                    Ok(Some(response)) => {
                        tracing::debug!("serving {} from cache", request.url);
                        Ok(response)
                    }
                    Ok(None) => Err(FetchError::NoMatch {
                        url: request.url.to_string(),
                        source: error,
                    }),
                    Err(store_error) => {
                        tracing::warn!("cache lookup for {} failed: {}", request.url, store_error);
                        Err(FetchError::NoMatch {
                            url: request.url.to_string(),
                            source: error,
                        })
                    }
                }
            }
        }
    }

    /// 后台写入缓存，不等待、不上报结果
    fn store_in_background(&self, request: Request, response: Response) {
        let storage = self.storage.clone();
        let name = self.cache_name.clone();

        let mut tasks = lock(&self.background);
        while tasks.try_join_next().is_some() {}
        tasks.spawn_blocking(move || {
            let result = storage
                .open(&name)
                .and_then(|cache| cache.put(&request, response));
            if let Err(e) = result {
                tracing::debug!("background cache write for {} failed: {}", request.url, e);
            }
        });
    }

    /// 等待所有尚未完成的后台缓存写入
    pub async fn flush_background_writes(&self) {
        let mut tasks = std::mem::take(&mut *lock(&self.background));
        while tasks.join_next().await.is_some() {}
    }
}
