// 集成测试公共模块
//
// 提供脚本化的网络请求器、可注入故障的存储和测试配置

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use ktvdi_offline::network::{Fetcher, Method, NetworkError, Request, Response, ResponseType};
use ktvdi_offline::storage::{CacheStorage, MemoryCache, MemoryStorage, StoreError, StoreResult};
use ktvdi_offline::worker::DEFAULT_ASSETS;
use ktvdi_offline::OfflineConfig;
use url::Url;

pub const ORIGIN: &str = "https://ktvdi.test";

pub fn url(path: &str) -> Url {
    Url::parse(ORIGIN).unwrap().join(path).unwrap()
}

pub fn get(path: &str) -> Request {
    Request::get(url(path))
}

/// 测试配置
pub fn test_config(cache_name: &str) -> OfflineConfig {
    OfflineConfig {
        cache_name: cache_name.to_string(),
        origin: ORIGIN.to_string(),
        ..OfflineConfig::default()
    }
}

enum Route {
    Respond(Response),
    Fail(String),
}

/// 脚本化的网络请求器
///
/// 未登记的 URL 返回 404；`set_offline(true)` 让所有请求失败。
pub struct ScriptedFetcher {
    routes: Mutex<HashMap<String, Route>>,
    offline: AtomicBool,
    log: Mutex<Vec<(Method, String)>>,
}

impl ScriptedFetcher {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            routes: Mutex::new(HashMap::new()),
            offline: AtomicBool::new(false),
            log: Mutex::new(Vec::new()),
        })
    }

    /// 一个能提供全部默认清单资源的站点
    pub fn site() -> Arc<Self> {
        let fetcher = Self::new();
        for asset in DEFAULT_ASSETS {
            fetcher.respond(asset, 200, &format!("asset {asset}"));
        }
        fetcher
    }

    pub fn respond(&self, path: &str, status: u16, body: &str) {
        let target = url(path);
        let response = Response::new(
            target.as_str(),
            status,
            body.as_bytes().to_vec(),
            ResponseType::Basic,
        )
        .with_header("content-type", "text/html; charset=utf-8");
        self.respond_with(path, response);
    }

    pub fn respond_with(&self, path: &str, response: Response) {
        self.routes
            .lock()
            .unwrap()
            .insert(url(path).to_string(), Route::Respond(response));
    }

    pub fn fail(&self, path: &str) {
        self.routes
            .lock()
            .unwrap()
            .insert(url(path).to_string(), Route::Fail("connection refused".to_string()));
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn requests(&self) -> Vec<(Method, String)> {
        self.log.lock().unwrap().clone()
    }

    pub fn request_count(&self, path: &str) -> usize {
        let target = url(path).to_string();
        self.log
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, requested)| *requested == target)
            .count()
    }
}

impl Fetcher for ScriptedFetcher {
    async fn fetch(&self, request: &Request) -> Result<Response, NetworkError> {
        let target = request.url.to_string();
        self.log
            .lock()
            .unwrap()
            .push((request.method.clone(), target.clone()));

        if self.offline.load(Ordering::SeqCst) {
            return Err(NetworkError::Request {
                url: target,
                message: "network unreachable".to_string(),
            });
        }

        match self.routes.lock().unwrap().get(&target) {
            Some(Route::Respond(response)) => Ok(response.clone()),
            Some(Route::Fail(message)) => Err(NetworkError::Request {
                url: target,
                message: message.clone(),
            }),
            None => Ok(Response::new(&target, 404, b"not found".to_vec(), ResponseType::Basic)),
        }
    }
}

/// 删除指定缓存时总是失败的存储
#[derive(Clone)]
pub struct StickyStorage {
    pub inner: MemoryStorage,
    undeletable: Arc<Vec<String>>,
}

impl StickyStorage {
    pub fn new(inner: MemoryStorage, undeletable: &[&str]) -> Self {
        Self {
            inner,
            undeletable: Arc::new(undeletable.iter().map(|name| name.to_string()).collect()),
        }
    }
}

impl CacheStorage for StickyStorage {
    type Cache = MemoryCache;

    fn open(&self, name: &str) -> StoreResult<MemoryCache> {
        self.inner.open(name)
    }

    fn has(&self, name: &str) -> StoreResult<bool> {
        self.inner.has(name)
    }

    fn keys(&self) -> StoreResult<Vec<String>> {
        self.inner.keys()
    }

    fn delete(&self, name: &str) -> StoreResult<bool> {
        if self.undeletable.iter().any(|locked| locked == name) {
            return Err(StoreError::Other(format!("cache {name} is locked")));
        }
        self.inner.delete(name)
    }
}
