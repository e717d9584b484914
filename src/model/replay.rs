// 该文件是 DermScan 项目的一部分。
// src/model/replay.rs - 原始结果回放检测器
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

use thiserror::Error;
use tracing::{debug, info};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  model::{Detector, RawResult},
};

#[derive(Error, Debug)]
pub enum ReplayDetectorError {
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
  #[error("无法读取回放文件 {}: {}", .0.display(), .1)]
  IoError(PathBuf, std::io::Error),
  #[error("回放文件不是合法 JSON: {0}")]
  InvalidDocument(serde_json::Error),
}

/// 回放事先保存的检测器原始输出，不运行模型
#[derive(Debug)]
pub struct ReplayDetector {
  result: Option<RawResult>,
}

pub struct ReplayDetectorBuilder {
  path: PathBuf,
}

impl FromUrlWithScheme for ReplayDetectorBuilder {
  const SCHEME: &'static str = "replay";
}

impl FromUrl for ReplayDetectorBuilder {
  type Error = ReplayDetectorError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(ReplayDetectorError::SchemeMismatch(format!(
        "期望方案 '{}', 实际方案 '{}'",
        Self::SCHEME,
        url.scheme()
      )));
    }

    Ok(ReplayDetectorBuilder {
      path: PathBuf::from(url.path()),
    })
  }
}

impl ReplayDetectorBuilder {
  pub fn build(self) -> Result<ReplayDetector, ReplayDetectorError> {
    info!("加载回放文件: {}", self.path.display());
    let text = std::fs::read_to_string(&self.path)
      .map_err(|e| ReplayDetectorError::IoError(self.path.clone(), e))?;
    let document = serde_json::from_str(&text).map_err(ReplayDetectorError::InvalidDocument)?;
    Ok(ReplayDetector::new(RawResult::from_document(document)))
  }
}

impl ReplayDetector {
  pub fn new(result: Option<RawResult>) -> Self {
    Self { result }
  }
}

impl Detector for ReplayDetector {
  type Error = ReplayDetectorError;

  fn detect(&self, source: &Path) -> Result<Option<RawResult>, Self::Error> {
    debug!("回放原始结果，忽略输入 {}", source.display());
    Ok(self.result.clone())
  }
}
