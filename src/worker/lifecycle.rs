//! 生命周期状态

use std::fmt;

/// 缓存管理器的生命周期状态
///
/// Uninstalled → Installing → Installed → Activating → Active。
/// 安装失败回到 `Uninstalled`，激活失败回到 `Installed`。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum WorkerState {
    #[default]
    Uninstalled,
    Installing,
    Installed,
    Activating,
    Active,
}

impl WorkerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkerState::Uninstalled => "uninstalled",
            WorkerState::Installing => "installing",
            WorkerState::Installed => "installed",
            WorkerState::Activating => "activating",
            WorkerState::Active => "active",
        }
    }

    /// 是否处于拦截请求的状态
    pub fn controls_fetches(&self) -> bool {
        *self == WorkerState::Active
    }
}

impl fmt::Display for WorkerState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 激活结果
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ActivationReport {
    /// Stale caches that were removed
    pub deleted: Vec<String>,
    /// Stale caches whose deletion failed, with the error message
    pub failed: Vec<(String, String)>,
}

impl ActivationReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}
