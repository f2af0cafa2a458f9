//! 局部片段加载器

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use crate::config::{ConfigError, OfflineConfig};
use crate::network::{Fetcher, Request};

use super::dom::{charset_from_content_type, decode_text, PageDocument};

pub const HEADER_PARTIAL: &str = "/static/partials/header.html";
pub const FOOTER_PARTIAL: &str = "/static/partials/footer.html";

/// 片段加载错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LoadError {
    #[error("loading {url} failed: {message}")]
    Network { url: String, message: String },

    #[error("loading {url} failed with HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("invalid partial URL '{url}': {message}")]
    InvalidUrl { url: String, message: String },

    #[error("no element with id '{slot_id}' in page")]
    MissingSlot { slot_id: String },
}

impl LoadError {
    pub fn url(&self) -> Option<&str> {
        match self {
            LoadError::Network { url, .. }
            | LoadError::Status { url, .. }
            | LoadError::InvalidUrl { url, .. } => Some(url),
            LoadError::MissingSlot { .. } => None,
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            LoadError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// 页面插槽与其片段来源
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartialSlot {
    pub slot_id: String,
    pub source: String,
}

impl PartialSlot {
    pub fn new(slot_id: &str, source: &str) -> Self {
        Self {
            slot_id: slot_id.to_string(),
            source: source.to_string(),
        }
    }

    /// `header` 与 `footer`
    pub fn defaults() -> Vec<Self> {
        vec![
            Self::new("header", HEADER_PARTIAL),
            Self::new("footer", FOOTER_PARTIAL),
        ]
    }
}

/// 单个插槽的加载结果
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SlotOutcome {
    pub slot_id: String,
    pub result: Result<(), LoadError>,
    /// Whether the fallback message was written into the slot
    pub fallback_rendered: bool,
}

/// 片段加载器
///
/// `load_page_partials` 不向外传播错误：失败的插槽记录日志并写入回退提示。
pub struct PartialLoader<F> {
    fetcher: F,
    origin: Url,
    fallback_message: String,
    slots: Vec<PartialSlot>,
}

impl<F: Fetcher> PartialLoader<F> {
    pub fn new(fetcher: F, origin: Url, fallback_message: impl Into<String>) -> Self {
        Self {
            fetcher,
            origin,
            fallback_message: fallback_message.into(),
            slots: PartialSlot::defaults(),
        }
    }

    pub fn from_config(config: &OfflineConfig, fetcher: F) -> Result<Self, ConfigError> {
        Ok(Self {
            fetcher,
            origin: config.origin_url()?,
            fallback_message: config.fallback_message.clone(),
            slots: config.partials.clone(),
        })
    }

    pub fn slots(&self) -> &[PartialSlot] {
        &self.slots
    }

    pub fn fallback_message(&self) -> &str {
        &self.fallback_message
    }

    /// 获取片段文本
    pub async fn fetch_partial(&self, source_url: &str) -> Result<String, LoadError> {
        let url = self
            .origin
            .join(source_url)
            .map_err(|e| LoadError::InvalidUrl {
                url: source_url.to_string(),
                message: e.to_string(),
            })?;

        let response = self
            .fetcher
            .fetch(&Request::get(url.clone()))
            .await
            .map_err(|e| LoadError::Network {
                url: url.to_string(),
                message: e.to_string(),
            })?;

        if !response.ok() {
            return Err(LoadError::Status {
                url: url.to_string(),
                status: response.status,
            });
        }

        let charset = response.content_type().and_then(charset_from_content_type);
        Ok(decode_text(&response.body, charset))
    }

    /// 获取片段并写入 id 为 `slot_id` 的元素
    pub async fn load_component(
        &self,
        document: &PageDocument,
        slot_id: &str,
        source_url: &str,
    ) -> Result<(), LoadError> {
        let html = self.fetch_partial(source_url).await?;

        if !document.set_inner_html(slot_id, &html) {
            return Err(LoadError::MissingSlot {
                slot_id: slot_id.to_string(),
            });
        }
        tracing::debug!("loaded {} into #{}", source_url, slot_id);
        Ok(())
    }

    /// 并发加载所有插槽，失败的插槽写入回退提示
    pub async fn load_page_partials(
        &self,
        document: &PageDocument,
        slots: &[PartialSlot],
    ) -> Vec<SlotOutcome> {
        let loads = slots.iter().map(|slot| async move {
            let result = self
                .load_component(document, &slot.slot_id, &slot.source)
                .await;

            let fallback_rendered = match &result {
                Ok(()) => false,
                Err(e) => {
                    tracing::warn!("partial for #{} failed: {}", slot.slot_id, e);
                    document.set_inner_html(&slot.slot_id, &self.fallback_message)
                }
            };

            SlotOutcome {
                slot_id: slot.slot_id.clone(),
                result,
                fallback_rendered,
            }
        });

        join_all(loads).await
    }

    /// 加载配置中的全部插槽并返回序列化后的页面
    pub async fn assemble_page(
        &self,
        page: &[u8],
        encoding: &str,
    ) -> std::io::Result<(Vec<u8>, Vec<SlotOutcome>)> {
        let document = PageDocument::parse(page, encoding);
        let outcomes = self.load_page_partials(&document, &self.slots).await;
        Ok((document.serialize()?, outcomes))
    }
}
