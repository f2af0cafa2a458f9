//! 配置管理
//!
//! 缓存名称等原本写死在脚本里的值，统一收敛到显式的 `OfflineConfig`，
//! 由调用方传入缓存管理器。加载顺序：默认值 → 配置文件 → `.env` → 环境变量。

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use crate::env::EnvError;
use crate::network::HttpFetcher;
use crate::partials::PartialSlot;
use crate::storage::{DiskStorage, StoreError};
use crate::worker::AssetManifest;

pub const DEFAULT_CACHE_NAME: &str = "ktvdi-v2";
pub const DEFAULT_ORIGIN: &str = "http://localhost:5000";
pub const DEFAULT_FALLBACK_MESSAGE: &str =
    r#"<p class="partial-error">Konten tidak dapat dimuat.</p>"#;
pub const CACHE_DB_FILE: &str = "caches.redb";

/// 按顺序查找的配置文件
pub const CONFIG_PATHS: &[&str] = &["ktvdi.toml", "ktvdi.json", "~/.config/ktvdi/config.toml"];

/// 配置错误
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("读取配置文件失败 {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("解析TOML配置失败: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("解析JSON配置失败: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Env(#[from] EnvError),

    #[error("打开缓存数据库失败: {0}")]
    Storage(#[from] StoreError),

    #[error("配置无效: {0}")]
    Invalid(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// 离线缓存与局部片段加载的配置
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct OfflineConfig {
    /// Current cache version tag
    pub cache_name: String,
    /// Site origin; manifest paths resolve against it and same-origin responses are `basic`
    pub origin: String,
    /// Assets precached at install time
    pub precache: AssetManifest,
    /// Directory of the on-disk cache database; in-memory storage when unset
    pub cache_dir: Option<String>,
    pub request_timeout_secs: u64,
    pub user_agent: Option<String>,
    /// HTML written into a slot whose partial failed to load
    pub fallback_message: String,
    pub partials: Vec<PartialSlot>,
}

impl Default for OfflineConfig {
    fn default() -> Self {
        Self {
            cache_name: DEFAULT_CACHE_NAME.to_string(),
            origin: DEFAULT_ORIGIN.to_string(),
            precache: AssetManifest::default(),
            cache_dir: None,
            request_timeout_secs: 30,
            user_agent: None,
            fallback_message: DEFAULT_FALLBACK_MESSAGE.to_string(),
            partials: PartialSlot::defaults(),
        }
    }
}

impl OfflineConfig {
    /// 加载完整配置：`.env`、配置文件、环境变量覆盖，最后校验
    pub fn load() -> ConfigResult<Self> {
        Self::load_dotenv();

        let mut config = match Self::find_config_file() {
            Some(path) => {
                tracing::info!("加载配置文件: {}", path.display());
                Self::from_file(&path)?
            }
            None => {
                tracing::info!("未找到配置文件，使用默认配置");
                Self::default()
            }
        };

        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// 从指定文件加载配置（按扩展名区分 TOML / JSON）
    pub fn from_file(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;

        if path.extension().and_then(|ext| ext.to_str()) == Some("json") {
            Ok(serde_json::from_str(&content)?)
        } else {
            Ok(toml::from_str(&content)?)
        }
    }

    fn find_config_file() -> Option<PathBuf> {
        CONFIG_PATHS
            .iter()
            .map(|path| PathBuf::from(shellexpand::tilde(path).as_ref()))
            .find(|path| path.exists())
    }

    fn load_dotenv() {
        for env_file in [".env.local", ".env"] {
            if Path::new(env_file).exists() && dotenv::from_filename(env_file).is_ok() {
                tracing::info!("已加载环境变量文件: {}", env_file);
                break;
            }
        }
    }

    /// 应用环境变量覆盖
    pub fn apply_env_overrides(&mut self) -> ConfigResult<()> {
        use crate::env::{cache, partials, EnvVar};

        if let Some(cache_name) = cache::CacheName::get_if_set()? {
            tracing::info!("环境变量覆盖缓存名称: {}", cache_name);
            self.cache_name = cache_name;
        }
        if let Some(origin) = cache::Origin::get_if_set()? {
            self.origin = origin;
        }
        if let Some(cache_dir) = cache::CacheDir::get_if_set()? {
            self.cache_dir = Some(cache_dir);
        }
        if let Some(timeout) = cache::RequestTimeout::get_if_set()? {
            self.request_timeout_secs = timeout.as_secs();
        }
        if let Some(message) = partials::FallbackMessage::get_if_set()? {
            self.fallback_message = message;
        }

        Ok(())
    }

    /// 验证配置
    pub fn validate(&self) -> ConfigResult<()> {
        if self.cache_name.trim().is_empty() {
            return Err(ConfigError::Invalid("缓存名称不能为空".to_string()));
        }
        if self.precache.is_empty() {
            return Err(ConfigError::Invalid("预缓存清单不能为空".to_string()));
        }
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::Invalid("请求超时必须大于0".to_string()));
        }

        let origin = self.origin_url()?;
        self.precache
            .resolve(&origin)
            .map_err(|(entry, e)| ConfigError::Invalid(format!("清单条目 '{entry}' 无效: {e}")))?;

        for slot in &self.partials {
            if slot.slot_id.is_empty() {
                return Err(ConfigError::Invalid("插槽 id 不能为空".to_string()));
            }
        }

        Ok(())
    }

    /// 解析后的站点源
    pub fn origin_url(&self) -> ConfigResult<Url> {
        let url = Url::parse(&self.origin)
            .map_err(|e| ConfigError::Invalid(format!("站点源 '{}' 无效: {e}", self.origin)))?;
        match url.scheme() {
            "http" | "https" => Ok(url),
            scheme => Err(ConfigError::Invalid(format!(
                "站点源必须使用 http 或 https，而不是 {scheme}"
            ))),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// 按配置构建 HTTP 请求器
    pub fn http_fetcher(&self) -> ConfigResult<HttpFetcher> {
        HttpFetcher::new(
            self.origin_url()?,
            self.request_timeout(),
            self.user_agent.as_deref(),
        )
        .map_err(|e| ConfigError::Invalid(e.to_string()))
    }

    /// 持久化数据库路径（未配置目录时为 `None`）
    pub fn cache_db_path(&self) -> Option<PathBuf> {
        self.cache_dir
            .as_ref()
            .map(|dir| PathBuf::from(shellexpand::tilde(dir).as_ref()).join(CACHE_DB_FILE))
    }

    /// 按配置打开持久化存储；未配置 `cache_dir` 时返回 `None`，由调用方使用内存存储
    pub fn disk_storage(&self) -> ConfigResult<Option<DiskStorage>> {
        match self.cache_db_path() {
            Some(path) => {
                tracing::info!("使用持久化缓存: {}", path.display());
                Ok(Some(DiskStorage::open_path(path)?))
            }
            None => Ok(None),
        }
    }

    /// 生成示例配置文件
    pub fn write_example(path: &Path) -> ConfigResult<()> {
        let content = toml::to_string_pretty(&Self::default())
            .map_err(|e| ConfigError::Invalid(format!("序列化配置失败: {e}")))?;
        std::fs::write(path, content).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })
    }
}
