// 该文件是 DermScan 项目的一部分。
// src/remote/codec.rs - base64 data URI 编解码
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

use std::path::{Path, PathBuf};

use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use thiserror::Error;
use tracing::{debug, info};

const BASE64_MARKER: &str = ";base64,";

#[derive(Error, Debug)]
pub enum DecodeError {
  #[error("base64 数据无效: {0}")]
  Base64Error(#[from] base64::DecodeError),
  #[error("无法写入 {}: {}", .0.display(), .1)]
  IoError(PathBuf, std::io::Error),
}

/// 按扩展名选择 MIME 类型，未知扩展名为 `image/png`
pub fn mime_for_path(path: &Path) -> &'static str {
  let ext = path
    .extension()
    .and_then(|ext| ext.to_str())
    .map(|ext| ext.to_ascii_lowercase());

  match ext.as_deref() {
    Some("jpg") | Some("jpeg") => "image/jpeg",
    Some("webp") => "image/webp",
    _ => "image/png",
  }
}

pub fn encode_bytes(bytes: &[u8], mime: &str) -> String {
  format!("data:{}{}{}", mime, BASE64_MARKER, BASE64.encode(bytes))
}

/// 读取文件并编码为 `data:<mime>;base64,<payload>`
pub fn encode_file(path: &Path) -> Result<String, std::io::Error> {
  let bytes = std::fs::read(path)?;
  let mime = mime_for_path(path);
  debug!("编码 {} ({} 字节, {})", path.display(), bytes.len(), mime);
  Ok(encode_bytes(&bytes, mime))
}

/// 解码 data URI 或裸 base64，忽略其中的 ASCII 空白
pub fn decode_payload(payload: &str) -> Result<Vec<u8>, DecodeError> {
  let data = match payload.split_once(BASE64_MARKER) {
    Some((_, data)) => data,
    None => payload,
  };

  let data: String = data.chars().filter(|c| !c.is_ascii_whitespace()).collect();
  Ok(BASE64.decode(data)?)
}

/// 解码后原样写入目标文件，必要时创建父目录
pub fn save_payload(payload: &str, path: &Path) -> Result<PathBuf, DecodeError> {
  let bytes = decode_payload(payload)?;

  if let Some(parent) = path.parent()
    && !parent.as_os_str().is_empty()
  {
    std::fs::create_dir_all(parent).map_err(|e| DecodeError::IoError(parent.to_path_buf(), e))?;
  }

  std::fs::write(path, &bytes).map_err(|e| DecodeError::IoError(path.to_path_buf(), e))?;
  info!("保存图像到文件: {} ({} 字节)", path.display(), bytes.len());
  Ok(path.to_path_buf())
}
