// 该文件是 DermScan 项目的一部分。
// src/output/record.rs - 检测结果 JSON 记录
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
use tracing::info;

use crate::model::DetectionSet;

#[derive(Error, Debug)]
pub enum RecordError {
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("序列化错误: {0}")]
  SerializeError(#[from] serde_json::Error),
}

/// 把检测集合写成 `[{"box": [...], "conf": .., "class": ..}, ...]`
pub struct Record {
  path: PathBuf,
}

impl Record {
  pub fn new(path: impl Into<PathBuf>) -> Self {
    Self { path: path.into() }
  }

  pub fn path(&self) -> &Path {
    &self.path
  }

  pub fn to_json(result: &DetectionSet) -> Result<String, RecordError> {
    Ok(serde_json::to_string_pretty(result)?)
  }

  pub fn record(&self, result: &DetectionSet) -> Result<(), RecordError> {
    if let Some(parent) = self.path.parent()
      && !parent.as_os_str().is_empty()
    {
      std::fs::create_dir_all(parent)?;
    }

    std::fs::write(&self.path, Self::to_json(result)?)?;
    info!("保存检测结果到文件: {}", self.path.display());
    Ok(())
  }
}
