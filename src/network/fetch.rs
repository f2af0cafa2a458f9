//! 网络请求
//!
//! `Fetcher` 是拦截层与真实网络之间的接缝，`HttpFetcher` 是基于 reqwest 的实现。

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use url::Url;

use super::request::{Request, Response, ResponseType};

/// 网络错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NetworkError {
    /// 请求未能完成（离线、DNS、连接被拒绝、超时等）
    #[error("request to {url} failed: {message}")]
    Request { url: String, message: String },

    /// 响应体读取失败
    #[error("reading body of {url} failed: {message}")]
    Body { url: String, message: String },

    /// HTTP 客户端构建失败
    #[error("http client error: {0}")]
    Client(String),
}

/// 发起一次网络请求
///
/// 只有完全没有拿到响应时才返回 `Err`，HTTP 错误状态码仍然是 `Ok` 响应。
pub trait Fetcher: Send + Sync + 'static {
    fn fetch(
        &self,
        request: &Request,
    ) -> impl Future<Output = Result<Response, NetworkError>> + Send;
}

impl<F: Fetcher> Fetcher for Arc<F> {
    fn fetch(
        &self,
        request: &Request,
    ) -> impl Future<Output = Result<Response, NetworkError>> + Send {
        (**self).fetch(request)
    }
}

/// 基于 reqwest 的 HTTP 实现
#[derive(Clone, Debug)]
pub struct HttpFetcher {
    client: reqwest::Client,
    origin: Url,
}

impl HttpFetcher {
    /// 创建新的 HTTP 请求器
    ///
    /// # 参数
    ///
    /// * `origin` - 站点源，来自该源的响应类型为 `basic`
    /// * `timeout` - 整个请求的超时时间
    /// * `user_agent` - 可选的 User-Agent 头
    pub fn new(
        origin: Url,
        timeout: Duration,
        user_agent: Option<&str>,
    ) -> Result<Self, NetworkError> {
        let mut builder = reqwest::Client::builder().timeout(timeout);
        if let Some(user_agent) = user_agent {
            builder = builder.user_agent(user_agent);
        }
        let client = builder
            .build()
            .map_err(|e| NetworkError::Client(e.to_string()))?;

        Ok(Self { client, origin })
    }

    pub fn origin(&self) -> &Url {
        &self.origin
    }
}

impl Fetcher for HttpFetcher {
    async fn fetch(&self, request: &Request) -> Result<Response, NetworkError> {
        let mut builder = self
            .client
            .request((&request.method).into(), request.url.clone());
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }

        let response = builder.send().await.map_err(|e| NetworkError::Request {
            url: request.url.to_string(),
            message: e.to_string(),
        })?;

        let final_url = response.url().clone();
        let status = response.status().as_u16();
        let headers: Vec<(String, String)> = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|value| (name.as_str().to_string(), value.to_string()))
            })
            .collect();
        let body = response
            .bytes()
            .await
            .map_err(|e| NetworkError::Body {
                url: final_url.to_string(),
                message: e.to_string(),
            })?
            .to_vec();

        let response_type =
            classify_response(&self.origin, &request.url, &final_url, &headers);
        tracing::debug!(
            "{} {} -> {} ({:?})",
            request.method,
            request.url,
            status,
            response_type
        );

        Ok(Response {
            url: final_url.to_string(),
            status,
            headers,
            body,
            response_type,
            redirected: final_url != request.url,
            stored_at: None,
        })
    }
}

/// 根据请求 URL 与最终 URL 的源判断响应类型
///
/// 只有请求和最终响应都与站点同源时才是 `basic`；跨源后重定向回站点的响应仍按跨源处理。
pub fn classify_response(
    origin: &Url,
    request_url: &Url,
    final_url: &Url,
    headers: &[(String, String)],
) -> ResponseType {
    let site = origin.origin();
    if request_url.origin() == site && final_url.origin() == site {
        return ResponseType::Basic;
    }

    let has_cors = headers
        .iter()
        .any(|(name, _)| name.eq_ignore_ascii_case("access-control-allow-origin"));
    if has_cors {
        ResponseType::Cors
    } else {
        ResponseType::Opaque
    }
}
