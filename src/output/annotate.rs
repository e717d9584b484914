// 该文件是 DermScan 项目的一部分。
// src/output/annotate.rs - 检测结果标注
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

use image::RgbImage;
use thiserror::Error;
use tracing::{debug, warn};

use crate::{
  frame::{ChannelOrder, FrameError, PackedFrame},
  model::DetectionSet,
  output::draw::Plot,
};

#[derive(Error, Debug)]
pub enum AnnotateError {
  #[error("绘制失败: {0}")]
  PlotError(String),
  #[error("绘制结果无效: {0}")]
  FrameError(#[from] FrameError),
  #[error("绘制结果尺寸不符: 期望 {expected:?}, 实际 {actual:?}")]
  DimensionMismatch {
    expected: (u32, u32),
    actual: (u32, u32),
  },
}

/// 标注结果，`degraded` 为真时 `image` 是未标注的原图
#[derive(Debug, Clone)]
pub struct Annotation {
  pub image: RgbImage,
  pub degraded: bool,
}

pub struct Annotator<P> {
  plotter: P,
}

impl<P: Plot> Annotator<P> {
  pub fn new(plotter: P) -> Self {
    Self { plotter }
  }

  /// 绘制并统一转为 RGB，尺寸必须与原图一致
  pub fn try_annotate(
    &self,
    source: &RgbImage,
    detections: &DetectionSet,
  ) -> Result<RgbImage, AnnotateError> {
    let canvas = self
      .plotter
      .plot(source, detections)
      .map_err(|e| AnnotateError::PlotError(e.to_string()))?;

    let expected = source.dimensions();
    let actual = (canvas.width, canvas.height);
    if expected != actual {
      return Err(AnnotateError::DimensionMismatch { expected, actual });
    }

    let frame = PackedFrame::new(canvas.width, canvas.height, P::CHANNEL_ORDER, canvas.data)?;
    if frame.order() == ChannelOrder::Bgr {
      debug!("绘制结果为 BGR 顺序，转换为 RGB");
    }
    Ok(frame.into_rgb_image())
  }

  /// 绘制失败时返回原图，不向上传播错误
  pub fn annotate(&self, source: &RgbImage, detections: &DetectionSet) -> Annotation {
    match self.try_annotate(source, detections) {
      Ok(image) => Annotation {
        image,
        degraded: false,
      },
      Err(e) => {
        warn!("无法生成标注图像，改用原图: {}", e);
        Annotation {
          image: source.clone(),
          degraded: true,
        }
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{
    model::Detection,
    output::draw::{Canvas, Draw},
  };
  use image::Rgb;

  /// 以 BGR 顺序输出的绘制器，模拟 OpenCV 风格的绘图库
  struct BgrPlotter;

  impl Plot for BgrPlotter {
    type Error = String;
    const CHANNEL_ORDER: ChannelOrder = ChannelOrder::Bgr;

    fn plot(&self, image: &RgbImage, _: &DetectionSet) -> Result<Canvas, Self::Error> {
      let mut data = image.clone().into_raw();
      for pixel in data.chunks_exact_mut(3) {
        pixel.swap(0, 2);
      }
      Ok(Canvas {
        width: image.width(),
        height: image.height(),
        data,
      })
    }
  }

  struct FailingPlotter;

  impl Plot for FailingPlotter {
    type Error = String;
    const CHANNEL_ORDER: ChannelOrder = ChannelOrder::Rgb;

    fn plot(&self, _: &RgbImage, _: &DetectionSet) -> Result<Canvas, Self::Error> {
      Err("renderer crashed".to_string())
    }
  }

  struct ShrinkingPlotter;

  impl Plot for ShrinkingPlotter {
    type Error = String;
    const CHANNEL_ORDER: ChannelOrder = ChannelOrder::Rgb;

    fn plot(&self, _: &RgbImage, _: &DetectionSet) -> Result<Canvas, Self::Error> {
      Ok(Canvas {
        width: 1,
        height: 1,
        data: vec![0, 0, 0],
      })
    }
  }

  struct TruncatedPlotter;

  impl Plot for TruncatedPlotter {
    type Error = String;
    const CHANNEL_ORDER: ChannelOrder = ChannelOrder::Rgb;

    fn plot(&self, image: &RgbImage, _: &DetectionSet) -> Result<Canvas, Self::Error> {
      Ok(Canvas {
        width: image.width(),
        height: image.height(),
        data: vec![0; 5],
      })
    }
  }

  fn source() -> RgbImage {
    let mut image = RgbImage::from_pixel(8, 8, Rgb([200, 100, 50]));
    image.put_pixel(0, 0, Rgb([1, 2, 3]));
    image
  }

  fn one_detection() -> DetectionSet {
    DetectionSet::from(vec![Detection::new([1.0, 1.0, 6.0, 6.0], 0.7, 0)])
  }

  #[test]
  fn bgr_output_is_converted_to_rgb() {
    let annotation = Annotator::new(BgrPlotter).annotate(&source(), &one_detection());
    assert!(!annotation.degraded);
    assert_eq!(annotation.image, source());
  }

  #[test]
  fn plot_failure_returns_source_image() {
    let annotation = Annotator::new(FailingPlotter).annotate(&source(), &one_detection());
    assert!(annotation.degraded);
    assert_eq!(annotation.image, source());
  }

  #[test]
  fn mismatched_canvas_is_rejected() {
    let annotator = Annotator::new(ShrinkingPlotter);
    assert!(matches!(
      annotator.try_annotate(&source(), &one_detection()),
      Err(AnnotateError::DimensionMismatch {
        expected: (8, 8),
        actual: (1, 1)
      })
    ));
    assert!(annotator.annotate(&source(), &one_detection()).degraded);

    let annotator = Annotator::new(TruncatedPlotter);
    assert!(matches!(
      annotator.try_annotate(&source(), &one_detection()),
      Err(AnnotateError::FrameError(_))
    ));
  }

  #[test]
  fn draw_annotation_keeps_dimensions() {
    let annotation = Annotator::new(Draw::new()).annotate(&source(), &one_detection());
    assert!(!annotation.degraded);
    assert_eq!(annotation.image.dimensions(), (8, 8));
    assert_ne!(annotation.image, source());
  }
}
