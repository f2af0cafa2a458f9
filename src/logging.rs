//! 日志初始化

use tracing_subscriber::EnvFilter;

use crate::env::{core, EnvVar};

/// 安装全局 tracing 订阅者
///
/// 日志级别取自 `KTVDI_LOG_LEVEL`（默认 `info`），设置 `NO_COLOR` 时关闭 ANSI 颜色。
/// 重复调用时保留第一次安装的订阅者。
pub fn init_tracing() {
    let level = core::LogLevel::get_or_default("info".to_string());
    let no_color = core::NoColor::get_or_default(false);

    let filter = EnvFilter::try_new(format!("ktvdi_offline={level}"))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let result = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(!no_color)
        .with_target(false)
        .try_init();

    if result.is_err() {
        tracing::debug!("tracing subscriber already installed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_twice_is_harmless() {
        init_tracing();
        init_tracing();
    }
}
