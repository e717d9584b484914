// 该文件是 DermScan 项目的一部分。
// src/remote/client.rs - 远程推理 HTTP 客户端
//
// 本文件根据 Apache 许可证第 2.0 版（以下简称“许可证”）授权使用；
// 除非遵守该许可证条款，否则您不得使用本文件。
// 您可通过以下网址获取许可证副本：
// http://www.apache.org/licenses/LICENSE-2.0
// 除非适用法律要求或书面同意，根据本许可协议分发的软件均按“原样”提供，
// 不附带任何形式的明示或暗示的保证或条件。
// 有关许可权限与限制的具体条款，请参阅本许可协议。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, Wareless Group

use std::time::Duration;

use reqwest::{StatusCode, blocking::Client};
use thiserror::Error;
use tracing::{debug, info};
use url::Url;

use crate::remote::{InferenceRequest, InferenceResponse};

#[derive(Error, Debug)]
pub enum TransportError {
  #[error("Request failed: {0}")]
  Network(#[from] reqwest::Error),
  #[error("Error {status}: {body}")]
  Status { status: u16, body: String },
  #[error("Unexpected error: {0}")]
  Malformed(String),
}

/// 同步调用远程检测服务，超时是唯一的取消手段，不重试
pub struct RemoteClient {
  client: Client,
  endpoint: Url,
}

impl RemoteClient {
  pub fn new(endpoint: Url, timeout: Duration) -> Result<Self, TransportError> {
    let client = Client::builder().timeout(timeout).build()?;
    Ok(Self { client, endpoint })
  }

  pub fn detect(&self, request: &InferenceRequest) -> Result<InferenceResponse, TransportError> {
    info!("发送推理请求到 {}", self.endpoint);
    let response = self
      .client
      .post(self.endpoint.as_str())
      .json(request)
      .send()?;

    let status = response.status();
    let body = response.text()?;
    debug!("服务返回 {} ({} 字节)", status, body.len());

    if status != StatusCode::OK {
      return Err(TransportError::Status {
        status: status.as_u16(),
        body,
      });
    }

    serde_json::from_str(&body).map_err(|e| TransportError::Malformed(e.to_string()))
  }
}
