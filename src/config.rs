// 该文件是 DermScan 项目的一部分。
// src/config.rs - 运行配置
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

use std::{path::PathBuf, time::Duration};

use thiserror::Error;
use tracing::error;
use url::Url;

use crate::model::DetectorError;

pub const DEFAULT_WEIGHTS: &str = "models/dark_circles_best.pt";
pub const DEFAULT_IMAGE: &str = "models/test_images/test5.png";
pub const DEFAULT_OUTPUT_IMAGE: &str = "runs/predict/annotated.png";
pub const DEFAULT_OUTPUT_JSON: &str = "runs/predict/detections.json";
pub const DEFAULT_DETECTOR: &str = "command:yolo-predict";
pub const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.35;
pub const DEFAULT_IMAGE_SIZE: u32 = 640;

pub const DEFAULT_ENDPOINT: &str = "https://models-detection.onrender.com/predict/acne/json";
pub const DEFAULT_REMOTE_OUTPUT: &str = "annotated_result_dark_circles.png";
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// 启动阶段的致命错误，推理开始前终止
#[derive(Error, Debug)]
pub enum StartupError {
  #[error("模型权重不存在: {}，请放置权重文件或修改 --weights", .0.display())]
  WeightsNotFound(PathBuf),
  #[error("输入图像不存在: {}", .0.display())]
  ImageNotFound(PathBuf),
  #[error("检测器不可用: {0}")]
  DetectorUnavailable(#[from] DetectorError),
}

/// 本地推理配置
#[derive(Debug, Clone)]
pub struct LocalConfig {
  /// 检测器地址，`command:<程序>` 或 `replay:<原始结果文件>`
  pub detector: Url,
  pub weights: PathBuf,
  pub image: PathBuf,
  pub output_image: PathBuf,
  pub output_json: PathBuf,
  /// 由检测器执行的置信度阈值
  pub confidence_threshold: f32,
  pub image_size: u32,
  /// 推理设备，`None` 时由检测器自行选择
  pub device: Option<String>,
  /// 标签字体（TrueType），缺省时只画框不写字
  pub font: Option<PathBuf>,
  /// 类别名称，按类别编号索引
  pub labels: Vec<String>,
}

impl Default for LocalConfig {
  fn default() -> Self {
    Self {
      detector: default_detector_url(),
      weights: PathBuf::from(DEFAULT_WEIGHTS),
      image: PathBuf::from(DEFAULT_IMAGE),
      output_image: PathBuf::from(DEFAULT_OUTPUT_IMAGE),
      output_json: PathBuf::from(DEFAULT_OUTPUT_JSON),
      confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
      image_size: DEFAULT_IMAGE_SIZE,
      device: None,
      font: None,
      labels: Vec::new(),
    }
  }
}

fn default_detector_url() -> Url {
  Url::parse(DEFAULT_DETECTOR).expect("默认检测器地址无效")
}

impl LocalConfig {
  /// 检查权重与输入图像存在，不写任何文件
  pub fn validate(&self) -> Result<(), StartupError> {
    if !self.weights.exists() {
      error!("模型权重不存在: {}", self.weights.display());
      return Err(StartupError::WeightsNotFound(self.weights.clone()));
    }
    if !self.image.exists() {
      error!("输入图像不存在: {}", self.image.display());
      return Err(StartupError::ImageNotFound(self.image.clone()));
    }
    Ok(())
  }
}

/// 远程推理配置
#[derive(Debug, Clone)]
pub struct RemoteConfig {
  pub endpoint: Url,
  pub image: PathBuf,
  pub output: PathBuf,
  pub timeout: Duration,
}

impl RemoteConfig {
  pub fn new(endpoint: Url, image: impl Into<PathBuf>) -> Self {
    Self {
      endpoint,
      image: image.into(),
      output: PathBuf::from(DEFAULT_REMOTE_OUTPUT),
      timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
    }
  }

  pub fn validate(&self) -> Result<(), StartupError> {
    if !self.image.exists() {
      error!("输入图像不存在: {}", self.image.display());
      return Err(StartupError::ImageNotFound(self.image.clone()));
    }
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn local_defaults() {
    let config = LocalConfig::default();
    assert_eq!(config.confidence_threshold, 0.35);
    assert_eq!(config.image_size, 640);
    assert_eq!(config.detector.scheme(), "command");
    assert_eq!(config.output_json, PathBuf::from("runs/predict/detections.json"));
  }

  #[test]
  fn missing_weights_reported_before_image() {
    let config = LocalConfig {
      weights: PathBuf::from("/nonexistent/best.pt"),
      image: PathBuf::from("/nonexistent/test.png"),
      ..LocalConfig::default()
    };
    let err = config.validate().unwrap_err();
    assert!(matches!(err, StartupError::WeightsNotFound(_)));
    assert!(err.to_string().contains("/nonexistent/best.pt"));
  }

  #[test]
  fn remote_defaults() {
    let endpoint = Url::parse(DEFAULT_ENDPOINT).unwrap();
    let config = RemoteConfig::new(endpoint, "test2.png");
    assert_eq!(config.timeout, Duration::from_secs(60));
    assert_eq!(config.output, PathBuf::from("annotated_result_dark_circles.png"));
    assert!(config.validate().is_err());
  }
}
