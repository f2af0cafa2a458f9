//! # 网络模块
//!
//! 这个模块包含所有与网络通信相关的功能：
//!
//! - 请求与响应的值模型
//! - 网络请求接缝（`Fetcher`）及其 HTTP 实现
//!
//! # 模块组织
//!
//! - `request` - 请求/响应类型、缓存键、响应类型
//! - `fetch` - `Fetcher` 特性、`HttpFetcher`、网络错误

pub mod fetch;
pub mod request;

// Re-export commonly used items for convenience
pub use fetch::{classify_response, Fetcher, HttpFetcher, NetworkError};
pub use request::{Method, Request, Response, ResponseType};
