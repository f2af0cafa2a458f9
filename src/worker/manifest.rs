//! 预缓存资源清单

use serde::{Deserialize, Serialize};
use url::Url;

/// 站点默认预缓存的资源
pub const DEFAULT_ASSETS: &[&str] = &[
    "/",
    "/static/css/style.css",
    "/static/manifest.json",
    "/static/icons/icon-192.png",
    "/static/icons/icon-512.png",
];

/// 安装阶段要写入缓存的固定 URL 列表
///
/// 保持顺序；条目可以是绝对 URL，也可以是相对站点源的路径。
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AssetManifest {
    entries: Vec<String>,
}

impl AssetManifest {
    pub fn new<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            entries: entries.into_iter().map(Into::into).collect(),
        }
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 以站点源为基准解析全部条目
    pub fn resolve(&self, origin: &Url) -> Result<Vec<Url>, (String, url::ParseError)> {
        self.entries
            .iter()
            .map(|entry| origin.join(entry).map_err(|e| (entry.clone(), e)))
            .collect()
    }
}

impl Default for AssetManifest {
    fn default() -> Self {
        Self::new(DEFAULT_ASSETS.iter().copied())
    }
}
