// 该文件是 DermScan 项目的一部分。
// src/remote.rs - 远程推理
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

use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub mod codec;
mod client;

pub use self::client::{RemoteClient, TransportError};
pub use self::codec::DecodeError;

/// 请求体 `{"filename": ..., "b64": ...}`
#[derive(Debug, Clone, Serialize)]
pub struct InferenceRequest {
  pub filename: String,
  #[serde(rename = "b64")]
  pub image_data: String,
}

impl InferenceRequest {
  /// 文件名只保留最后一级
  pub fn from_file(path: &Path) -> Result<Self, std::io::Error> {
    let filename = path
      .file_name()
      .map(|name| name.to_string_lossy().into_owned())
      .unwrap_or_default();
    Ok(Self {
      filename,
      image_data: codec::encode_file(path)?,
    })
  }
}

/// 响应体，检测结果按服务端给出的内容原样保留
#[derive(Debug, Clone, Deserialize)]
pub struct InferenceResponse {
  pub detections: Vec<Value>,
  #[serde(rename = "annotated_image_b64")]
  pub annotated_image: String,
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn request_uses_basename_and_b64_key() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("test2.jpg");
    std::fs::write(&path, b"hello").unwrap();

    let request = InferenceRequest::from_file(&path).unwrap();
    let body = serde_json::to_value(&request).unwrap();
    assert_eq!(
      body,
      json!({ "filename": "test2.jpg", "b64": "data:image/jpeg;base64,aGVsbG8=" })
    );
  }

  #[test]
  fn response_requires_both_fields() {
    let ok: InferenceResponse = serde_json::from_value(json!({
      "detections": [{ "box": [1, 2, 3, 4] }, { "anything": true }],
      "annotated_image_b64": "data:image/png;base64,aGVsbG8=",
      "extra": 1
    }))
    .unwrap();
    assert_eq!(ok.detections.len(), 2);

    let missing = serde_json::from_value::<InferenceResponse>(json!({ "detections": [] }));
    assert!(missing.is_err());
  }
}
