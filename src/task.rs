// 该文件是 DermScan 项目的一部分。
// src/task.rs - 推理任务编排
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

pub trait Task<I, M, O>: Sized {
  type Output;
  type Error;
  fn run_task(self, input: I, model: M, output: O) -> Result<Self::Output, Self::Error>;
}

#[cfg(feature = "local")]
pub use self::local::{OneShotReport, OneShotTask};

#[cfg(feature = "remote")]
pub use self::remote::{RemoteOutcome, RemoteTask, RemoteTaskError};

#[cfg(feature = "local")]
mod local {
  use image::RgbImage;
  use tracing::info;

  use super::Task;
  use crate::{
    input::ImageFileInput,
    model::{DetectionSet, Detector},
    normalize::ResultNormalizer,
    output::Render,
  };

  #[derive(Debug)]
  pub struct OneShotReport<R> {
    pub detections: DetectionSet,
    pub artifacts: R,
  }

  /// 单张图像：推理、归一化、输出两个产物
  #[derive(Default)]
  pub struct OneShotTask {
    normalizer: ResultNormalizer,
  }

  impl OneShotTask {
    pub fn with_normalizer(mut self, normalizer: ResultNormalizer) -> Self {
      self.normalizer = normalizer;
      self
    }
  }

  impl<
    ME: std::error::Error + Sync + Send + 'static,
    RE: std::error::Error + Sync + Send + 'static,
    M: Detector<Error = ME>,
    O: Render<RgbImage, DetectionSet, Error = RE>,
  > Task<ImageFileInput, M, O> for OneShotTask
  {
    type Output = OneShotReport<O::Report>;
    type Error = anyhow::Error;

    fn run_task(self, input: ImageFileInput, model: M, output: O) -> Result<Self::Output, Self::Error> {
      info!("开始推理: {}", input.path().display());
      let now = std::time::Instant::now();
      let raw = model.detect(input.path())?;
      info!("推理完成，耗时: {:.2?}", now.elapsed());

      let detections = self.normalizer.normalize(raw.as_ref());
      info!("检测结果 (box = [xmin,ymin,xmax,ymax], conf, class):");
      for (i, det) in detections.iter().enumerate() {
        info!(
          " #{}: box={:?}, conf={:.3}, class={}",
          i,
          det.bbox(),
          det.confidence(),
          det.class_id()
        );
      }

      let artifacts = output.render_result(input.image(), &detections)?;
      info!("渲染完成，耗时: {:.2?}", now.elapsed());

      Ok(OneShotReport {
        detections,
        artifacts,
      })
    }
  }
}

#[cfg(feature = "remote")]
mod remote {
  use std::path::PathBuf;

  use thiserror::Error;
  use tracing::{error, info};

  use super::Task;
  use crate::remote::{DecodeError, InferenceRequest, RemoteClient, TransportError, codec};

  #[derive(Error, Debug)]
  pub enum RemoteTaskError {
    #[error("无法读取输入图像: {0}")]
    EncodeError(std::io::Error),
    #[error("无法保存标注图像: {0}")]
    DecodeError(#[from] DecodeError),
  }

  /// 传输失败只报告不中止，`Failed` 时不写任何文件
  #[derive(Debug)]
  pub enum RemoteOutcome {
    Saved { detections: usize, path: PathBuf },
    Failed(TransportError),
  }

  pub struct RemoteTask;

  impl Task<PathBuf, &RemoteClient, PathBuf> for RemoteTask {
    type Output = RemoteOutcome;
    type Error = RemoteTaskError;

    fn run_task(
      self,
      input: PathBuf,
      model: &RemoteClient,
      output: PathBuf,
    ) -> Result<Self::Output, Self::Error> {
      info!("编码图像为 base64: {}", input.display());
      let request = InferenceRequest::from_file(&input).map_err(RemoteTaskError::EncodeError)?;

      let response = match model.detect(&request) {
        Ok(response) => response,
        Err(e) => {
          error!("远程推理失败: {}", e);
          return Ok(RemoteOutcome::Failed(e));
        }
      };

      let detections = response.detections.len();
      info!("远程推理返回 {} 个检测", detections);

      let path = codec::save_payload(&response.annotated_image, &output)?;
      Ok(RemoteOutcome::Saved { detections, path })
    }
  }
}
