// 该文件是 DermScan 项目的一部分。
// src/model/command.rs - 外部命令检测器
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

use std::{
  ffi::OsString,
  path::{Path, PathBuf},
  process::Command,
};

use thiserror::Error;
use tracing::{debug, error, info};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  model::{Detector, RawResult},
};

const DEFAULT_IMAGE_SIZE: u32 = 640;
const DEFAULT_CONFIDENCE: f32 = 0.35;

#[derive(Error, Debug)]
pub enum CommandDetectorError {
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
  #[error("未设置模型权重路径")]
  WeightsMissing,
  #[error("模型权重不存在: {}", .0.display())]
  WeightsNotFound(PathBuf),
  #[error("找不到检测程序 '{0}'，请确认检测器已安装")]
  ProgramNotFound(String),
  #[error("无法启动检测程序: {0}")]
  SpawnError(std::io::Error),
  #[error("检测程序退出码 {code:?}: {stderr}")]
  Failed { code: Option<i32>, stderr: String },
  #[error("检测程序输出不是合法 JSON: {0}")]
  InvalidOutput(serde_json::Error),
}

/// 通过子进程调用外部预测程序，程序在标准输出打印原始结果 JSON
pub struct CommandDetector {
  program: PathBuf,
  weights: PathBuf,
  image_size: u32,
  confidence: f32,
  device: Option<String>,
}

pub struct CommandDetectorBuilder {
  program: String,
  weights: Option<PathBuf>,
  image_size: u32,
  confidence: f32,
  device: Option<String>,
}

impl FromUrlWithScheme for CommandDetectorBuilder {
  const SCHEME: &'static str = "command";
}

impl FromUrl for CommandDetectorBuilder {
  type Error = CommandDetectorError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(CommandDetectorError::SchemeMismatch(format!(
        "期望方案 '{}', 实际方案 '{}'",
        Self::SCHEME,
        url.scheme()
      )));
    }

    Ok(CommandDetectorBuilder {
      program: url.path().to_string(),
      weights: None,
      image_size: DEFAULT_IMAGE_SIZE,
      confidence: DEFAULT_CONFIDENCE,
      device: None,
    })
  }
}

impl CommandDetectorBuilder {
  pub fn weights(mut self, weights: impl Into<PathBuf>) -> Self {
    self.weights = Some(weights.into());
    self
  }

  pub fn image_size(mut self, image_size: u32) -> Self {
    self.image_size = image_size;
    self
  }

  pub fn confidence(mut self, confidence: f32) -> Self {
    self.confidence = confidence;
    self
  }

  pub fn device(mut self, device: impl Into<String>) -> Self {
    self.device = Some(device.into());
    self
  }

  pub fn build(self) -> Result<CommandDetector, CommandDetectorError> {
    let weights = self.weights.ok_or(CommandDetectorError::WeightsMissing)?;
    if !weights.exists() {
      error!("模型权重不存在: {}", weights.display());
      return Err(CommandDetectorError::WeightsNotFound(weights));
    }

    let program = match resolve_program(&self.program) {
      Some(program) => program,
      None => {
        error!("找不到检测程序: {}", self.program);
        return Err(CommandDetectorError::ProgramNotFound(self.program));
      }
    };

    info!("使用检测程序: {}", program.display());
    info!("加载模型权重: {}", weights.display());

    Ok(CommandDetector {
      program,
      weights,
      image_size: self.image_size,
      confidence: self.confidence,
      device: self.device,
    })
  }
}

/// 含路径分隔符的程序名按路径检查，否则在 PATH 中查找
fn resolve_program(program: &str) -> Option<PathBuf> {
  let candidate = Path::new(program);
  if candidate.components().count() > 1 || candidate.is_absolute() {
    return candidate.is_file().then(|| candidate.to_path_buf());
  }

  let paths = std::env::var_os("PATH")?;
  std::env::split_paths(&paths)
    .map(|dir| dir.join(program))
    .find(|path| path.is_file())
}

impl CommandDetector {
  /// 传给检测程序的参数列表
  pub fn arguments(&self, source: &Path) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec![
      "--weights".into(),
      self.weights.clone().into_os_string(),
      "--source".into(),
      source.as_os_str().to_owned(),
      "--imgsz".into(),
      self.image_size.to_string().into(),
      "--conf".into(),
      self.confidence.to_string().into(),
    ];
    if let Some(device) = &self.device {
      args.push("--device".into());
      args.push(device.into());
    }
    args
  }
}

fn parse_output(stdout: &[u8]) -> Result<Option<RawResult>, CommandDetectorError> {
  let text = String::from_utf8_lossy(stdout);
  let text = text.trim();
  if text.is_empty() {
    return Ok(None);
  }

  let document = serde_json::from_str(text).map_err(CommandDetectorError::InvalidOutput)?;
  Ok(RawResult::from_document(document))
}

impl Detector for CommandDetector {
  type Error = CommandDetectorError;

  fn detect(&self, source: &Path) -> Result<Option<RawResult>, Self::Error> {
    let args = self.arguments(source);
    debug!("执行检测程序: {} {:?}", self.program.display(), args);

    let output = Command::new(&self.program)
      .args(&args)
      .output()
      .map_err(CommandDetectorError::SpawnError)?;

    if !output.status.success() {
      let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
      error!("检测程序执行失败: {}", stderr);
      return Err(CommandDetectorError::Failed {
        code: output.status.code(),
        stderr,
      });
    }

    debug!("检测程序输出 {} 字节", output.stdout.len());
    parse_output(&output.stdout)
  }
}
