//! # 局部片段模块
//!
//! 页面就绪时获取 HTML 片段（页眉、页脚）并注入到页面中命名的插槽。
//!
//! # 模块组织
//!
//! - `dom` - 页面解析、按 id 查找、内容替换与序列化
//! - `loader` - 片段获取、错误类型与回退策略

pub mod dom;
pub mod loader;

pub use dom::PageDocument;
pub use loader::{LoadError, PartialLoader, PartialSlot, SlotOutcome, FOOTER_PARTIAL, HEADER_PARTIAL};
