// 该文件是 DermScan 项目的一部分。
// src/model.rs - 检测结果与检测器定义
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

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use url::Url;

use crate::{FromUrl, FromUrlWithScheme, config::LocalConfig};

/// 单个检测目标，构造后不可变
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Detection {
  #[serde(rename = "box")]
  bbox: [f32; 4], // [x_min, y_min, x_max, y_max]，原图像素坐标
  #[serde(rename = "conf")]
  confidence: f32,
  #[serde(rename = "class")]
  class_id: u32,
}

impl Detection {
  /// 角点按坐标轴排序，保证 `x_min <= x_max`、`y_min <= y_max`
  pub fn new(bbox: [f32; 4], confidence: f32, class_id: u32) -> Self {
    let [x0, y0, x1, y1] = bbox;
    Self {
      bbox: [x0.min(x1), y0.min(y1), x0.max(x1), y0.max(y1)],
      confidence,
      class_id,
    }
  }

  pub fn bbox(&self) -> &[f32; 4] {
    &self.bbox
  }

  pub fn confidence(&self) -> f32 {
    self.confidence
  }

  pub fn class_id(&self) -> u32 {
    self.class_id
  }
}

/// 一次推理的检测集合，保持检测器输出顺序
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct DetectionSet {
  items: Vec<Detection>,
}

impl DetectionSet {
  pub fn empty() -> Self {
    Self::default()
  }

  pub fn len(&self) -> usize {
    self.items.len()
  }

  pub fn is_empty(&self) -> bool {
    self.items.is_empty()
  }

  pub fn iter(&self) -> std::slice::Iter<'_, Detection> {
    self.items.iter()
  }

  pub fn as_slice(&self) -> &[Detection] {
    &self.items
  }
}

impl From<Vec<Detection>> for DetectionSet {
  fn from(items: Vec<Detection>) -> Self {
    Self { items }
  }
}

impl FromIterator<Detection> for DetectionSet {
  fn from_iter<I: IntoIterator<Item = Detection>>(iter: I) -> Self {
    Self {
      items: iter.into_iter().collect(),
    }
  }
}

impl<'a> IntoIterator for &'a DetectionSet {
  type Item = &'a Detection;
  type IntoIter = std::slice::Iter<'a, Detection>;

  fn into_iter(self) -> Self::IntoIter {
    self.items.iter()
  }
}

/// 检测器原始输出，字段布局与类型均不保证
#[derive(Debug, Clone, PartialEq)]
pub struct RawResult(Value);

impl RawResult {
  pub fn new(value: Value) -> Self {
    Self(value)
  }

  /// 从检测器输出文档中取出结果：数组取第一个元素，`null` 或空数组视为无结果
  pub fn from_document(document: Value) -> Option<Self> {
    match document {
      Value::Null => None,
      Value::Array(results) => results
        .into_iter()
        .next()
        .filter(|first| !first.is_null())
        .map(Self),
      other => Some(Self(other)),
    }
  }

  pub fn as_value(&self) -> &Value {
    &self.0
  }
}

pub trait Detector {
  type Error;

  /// 对单张图像执行推理，`None` 表示检测器未返回任何结果
  fn detect(&self, source: &Path) -> Result<Option<RawResult>, Self::Error>;
}

mod command;
mod replay;
pub use self::command::{CommandDetector, CommandDetectorBuilder, CommandDetectorError};
pub use self::replay::{ReplayDetector, ReplayDetectorBuilder, ReplayDetectorError};

#[derive(Error, Debug)]
pub enum DetectorError {
  #[error("外部命令检测器错误: {0}")]
  CommandDetectorError(#[from] CommandDetectorError),
  #[error("回放检测器错误: {0}")]
  ReplayDetectorError(#[from] ReplayDetectorError),
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
}

pub enum DetectorBuilder {
  Command(CommandDetectorBuilder),
  Replay(ReplayDetectorBuilder),
}

impl FromUrl for DetectorBuilder {
  type Error = DetectorError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    match url.scheme() {
      CommandDetectorBuilder::SCHEME => Ok(DetectorBuilder::Command(
        CommandDetectorBuilder::from_url(url)?,
      )),
      ReplayDetectorBuilder::SCHEME => Ok(DetectorBuilder::Replay(ReplayDetectorBuilder::from_url(
        url,
      )?)),
      other => Err(DetectorError::SchemeMismatch(other.to_string())),
    }
  }
}

impl DetectorBuilder {
  pub fn build(self, config: &LocalConfig) -> Result<DetectorWrapper, DetectorError> {
    match self {
      DetectorBuilder::Command(builder) => {
        let mut builder = builder
          .weights(&config.weights)
          .image_size(config.image_size)
          .confidence(config.confidence_threshold);
        if let Some(device) = &config.device {
          builder = builder.device(device);
        }
        Ok(DetectorWrapper::Command(builder.build()?))
      }
      DetectorBuilder::Replay(builder) => Ok(DetectorWrapper::Replay(builder.build()?)),
    }
  }
}

pub enum DetectorWrapper {
  Command(CommandDetector),
  Replay(ReplayDetector),
}

impl Detector for DetectorWrapper {
  type Error = DetectorError;

  fn detect(&self, source: &Path) -> Result<Option<RawResult>, Self::Error> {
    match self {
      DetectorWrapper::Command(detector) => detector.detect(source).map_err(DetectorError::from),
      DetectorWrapper::Replay(detector) => detector.detect(source).map_err(DetectorError::from),
    }
  }
}
