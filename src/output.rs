// 该文件是 DermScan 项目的一部分。
// src/output.rs - 输出定义
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

use image::RgbImage;
use thiserror::Error;
use tracing::{error, warn};

use crate::model::DetectionSet;

pub trait Render<Frame, Output>: Sized {
  type Report;
  type Error;
  fn render_result(&self, frame: &Frame, result: &Output) -> Result<Self::Report, Self::Error>;
}

pub mod annotate;
pub mod draw;
mod record;
mod save_image_file;

pub use self::annotate::{AnnotateError, Annotation, Annotator};
pub use self::draw::{Canvas, Draw, Plot, PlotError};
pub use self::record::{Record, RecordError};
pub use self::save_image_file::{SaveImageFile, SaveImageFileError};

#[derive(Error, Debug)]
pub enum OutputError {
  #[error("保存图像文件错误: {0}")]
  SaveImageFileError(#[from] SaveImageFileError),
  #[error("保存检测结果错误: {0}")]
  RecordError(#[from] RecordError),
}

/// 实际写入的图像内容
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageArtifact {
  /// 标注后的图像
  Annotated,
  /// 标注失败，写入原图
  Unannotated,
  /// 标注图像保存失败，改存原图
  SourceFallback,
}

#[derive(Debug, Clone)]
pub struct ArtifactReport {
  pub image_path: PathBuf,
  pub json_path: PathBuf,
  pub image: ImageArtifact,
  pub detections: usize,
}

/// 一次推理的两个产物：标注图像与检测结果 JSON
pub struct ArtifactOutput<P> {
  annotator: Annotator<P>,
  image: SaveImageFile,
  record: Record,
}

impl<P: Plot> ArtifactOutput<P> {
  pub fn new(annotator: Annotator<P>, image_path: &Path, json_path: &Path) -> Self {
    Self {
      annotator,
      image: SaveImageFile::new(image_path),
      record: Record::new(json_path),
    }
  }

  fn save_image(
    &self,
    source: &RgbImage,
    annotation: Annotation,
  ) -> Result<ImageArtifact, OutputError> {
    let artifact = if annotation.degraded {
      ImageArtifact::Unannotated
    } else {
      ImageArtifact::Annotated
    };

    match self.image.save_image(&annotation.image) {
      Ok(()) => Ok(artifact),
      Err(e) if !annotation.degraded => {
        warn!("无法保存标注图像，改存原图: {}", e);
        self.image.save_image(source)?;
        Ok(ImageArtifact::SourceFallback)
      }
      Err(e) => {
        error!("无法保存图像: {}", e);
        Err(e.into())
      }
    }
  }
}

impl<P: Plot> Render<RgbImage, DetectionSet> for ArtifactOutput<P> {
  type Report = ArtifactReport;
  type Error = OutputError;

  fn render_result(
    &self,
    frame: &RgbImage,
    result: &DetectionSet,
  ) -> Result<Self::Report, Self::Error> {
    let annotation = self.annotator.annotate(frame, result);
    // 图像保存失败时检测结果仍然写出
    let image = self.save_image(frame, annotation);
    let recorded = self.record.record(result);
    let image = image?;
    recorded?;

    Ok(ArtifactReport {
      image_path: self.image.path().to_path_buf(),
      json_path: self.record.path().to_path_buf(),
      image,
      detections: result.len(),
    })
  }
}
