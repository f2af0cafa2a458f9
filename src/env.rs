//! 统一的环境变量管理系统
//!
//! 提供类型安全、可验证的环境变量访问。配置文件的值会被这里读到的变量覆盖。

use std::env;
use std::fmt;
use std::time::Duration;

/// 环境变量解析错误
#[derive(Debug, Clone)]
pub struct EnvError {
    pub variable: String,
    pub message: String,
}

impl fmt::Display for EnvError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Environment variable '{}': {}", self.variable, self.message)
    }
}

impl std::error::Error for EnvError {}

pub type EnvResult<T> = Result<T, EnvError>;

/// 环境变量访问器特性
pub trait EnvVar<T> {
    const NAME: &'static str;
    const DEFAULT: Option<T>;
    const DESCRIPTION: &'static str;

    fn parse(value: &str) -> EnvResult<T>;

    fn get() -> EnvResult<T> {
        match env::var(Self::NAME) {
            Ok(value) => Self::parse(&value),
            Err(_) => {
                if let Some(default) = Self::DEFAULT {
                    Ok(default)
                } else {
                    Err(EnvError {
                        variable: Self::NAME.to_string(),
                        message: "Required environment variable not set".to_string(),
                    })
                }
            }
        }
    }

    /// 只在变量已设置时返回值（用于覆盖配置文件）
    fn get_if_set() -> EnvResult<Option<T>> {
        match env::var(Self::NAME) {
            Ok(value) => Self::parse(&value).map(Some),
            Err(_) => Ok(None),
        }
    }

    fn get_or_default(default: T) -> T {
        Self::get().unwrap_or(default)
    }
}

/// 核心环境变量定义
pub mod core {
    use super::*;

    /// 日志级别
    pub struct LogLevel;
    impl EnvVar<String> for LogLevel {
        const NAME: &'static str = "KTVDI_LOG_LEVEL";
        const DEFAULT: Option<String> = None;

        fn get() -> EnvResult<String> {
            match env::var(Self::NAME) {
                Ok(value) => Self::parse(&value),
                Err(_) => Ok("info".to_string()),
            }
        }
        const DESCRIPTION: &'static str = "Log level: trace, debug, info, warn, error";

        fn parse(value: &str) -> EnvResult<String> {
            match value.to_lowercase().as_str() {
                "trace" | "debug" | "info" | "warn" | "error" => Ok(value.to_lowercase()),
                _ => Err(EnvError {
                    variable: Self::NAME.to_string(),
                    message: format!(
                        "Invalid log level '{}'. Use: trace, debug, info, warn, error",
                        value
                    ),
                }),
            }
        }
    }

    /// 禁用颜色输出
    pub struct NoColor;
    impl EnvVar<bool> for NoColor {
        const NAME: &'static str = "NO_COLOR";
        const DEFAULT: Option<bool> = Some(false);
        const DESCRIPTION: &'static str = "Disable colored output when set to any value";

        fn parse(value: &str) -> EnvResult<bool> {
            // NO_COLOR 遵循标准：任何值都表示禁用颜色
            Ok(!value.is_empty())
        }
    }
}

/// 缓存相关环境变量
pub mod cache {
    use super::*;

    /// 当前缓存版本标签
    pub struct CacheName;
    impl EnvVar<String> for CacheName {
        const NAME: &'static str = "KTVDI_CACHE_NAME";
        const DEFAULT: Option<String> = None;
        const DESCRIPTION: &'static str =
            "Current cache version tag; bump it to migrate to a new asset manifest";

        fn parse(value: &str) -> EnvResult<String> {
            let name = value.trim();
            if name.is_empty() {
                return Err(EnvError {
                    variable: Self::NAME.to_string(),
                    message: "Cache name cannot be empty".to_string(),
                });
            }
            Ok(name.to_string())
        }
    }

    /// 站点源
    pub struct Origin;
    impl EnvVar<String> for Origin {
        const NAME: &'static str = "KTVDI_ORIGIN";
        const DEFAULT: Option<String> = None;
        const DESCRIPTION: &'static str = "Site origin used to resolve manifest paths";

        fn parse(value: &str) -> EnvResult<String> {
            let url = value.trim();
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(EnvError {
                    variable: Self::NAME.to_string(),
                    message: "Origin must start with http:// or https://".to_string(),
                });
            }
            if url::Url::parse(url).is_err() {
                return Err(EnvError {
                    variable: Self::NAME.to_string(),
                    message: format!("Invalid URL format: {}", url),
                });
            }
            Ok(url.to_string())
        }
    }

    /// 持久化缓存目录
    pub struct CacheDir;
    impl EnvVar<String> for CacheDir {
        const NAME: &'static str = "KTVDI_CACHE_DIR";
        const DEFAULT: Option<String> = None;
        const DESCRIPTION: &'static str = "Directory holding the on-disk cache database";

        fn parse(value: &str) -> EnvResult<String> {
            Ok(shellexpand::tilde(value.trim()).into_owned())
        }
    }

    /// 网络请求超时
    pub struct RequestTimeout;
    impl EnvVar<Duration> for RequestTimeout {
        const NAME: &'static str = "KTVDI_REQUEST_TIMEOUT";
        const DEFAULT: Option<Duration> = Some(Duration::from_secs(30));
        const DESCRIPTION: &'static str = "Network request timeout in seconds";

        fn parse(value: &str) -> EnvResult<Duration> {
            let seconds: u64 = value.trim().parse().map_err(|_| EnvError {
                variable: Self::NAME.to_string(),
                message: "Must be a valid number of seconds".to_string(),
            })?;

            if seconds == 0 {
                return Err(EnvError {
                    variable: Self::NAME.to_string(),
                    message: "Timeout must be greater than 0".to_string(),
                });
            }

            if seconds > 300 {
                return Err(EnvError {
                    variable: Self::NAME.to_string(),
                    message: "Timeout too long (max 300 seconds)".to_string(),
                });
            }

            Ok(Duration::from_secs(seconds))
        }
    }
}

/// 局部片段相关环境变量
pub mod partials {
    use super::*;

    /// 加载失败时写入插槽的提示
    pub struct FallbackMessage;
    impl EnvVar<String> for FallbackMessage {
        const NAME: &'static str = "KTVDI_FALLBACK_MESSAGE";
        const DEFAULT: Option<String> = None;
        const DESCRIPTION: &'static str =
            "HTML rendered into a slot whose partial could not be loaded";

        fn parse(value: &str) -> EnvResult<String> {
            Ok(value.to_string())
        }
    }
}

/// 环境变量文档生成器
pub fn generate_env_docs() -> String {
    let mut docs = String::new();
    docs.push_str("# Environment Variables Documentation\n\n");

    docs.push_str("## Core Configuration\n\n");
    docs.push_str(&format!(
        "- `{}`: {} (default: {:?})\n",
        core::LogLevel::NAME,
        core::LogLevel::DESCRIPTION,
        "info"
    ));
    docs.push_str(&format!(
        "- `{}`: {} (default: {:?})\n",
        core::NoColor::NAME,
        core::NoColor::DESCRIPTION,
        core::NoColor::DEFAULT
    ));

    docs.push_str("\n## Cache Configuration\n\n");
    docs.push_str(&format!(
        "- `{}`: {}\n",
        cache::CacheName::NAME,
        cache::CacheName::DESCRIPTION
    ));
    docs.push_str(&format!(
        "- `{}`: {}\n",
        cache::Origin::NAME,
        cache::Origin::DESCRIPTION
    ));
    docs.push_str(&format!(
        "- `{}`: {}\n",
        cache::CacheDir::NAME,
        cache::CacheDir::DESCRIPTION
    ));
    docs.push_str(&format!(
        "- `{}`: {} (default: {:?})\n",
        cache::RequestTimeout::NAME,
        cache::RequestTimeout::DESCRIPTION,
        cache::RequestTimeout::DEFAULT
    ));

    docs.push_str("\n## Partials Configuration\n\n");
    docs.push_str(&format!(
        "- `{}`: {}\n",
        partials::FallbackMessage::NAME,
        partials::FallbackMessage::DESCRIPTION
    ));

    docs
}
