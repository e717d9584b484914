// 该文件是 DermScan 项目的一部分。
// src/frame.rs - 打包像素帧定义
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

const PACKED_CHANNELS: usize = 3;

/// 三通道像素的字节顺序
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelOrder {
  Rgb,
  Bgr,
}

#[derive(Error, Debug)]
pub enum FrameError {
  #[error("数据长度不匹配: 期望长度 {expected}, 实际长度 {actual}")]
  LengthMismatch { expected: usize, actual: usize },
}

/// 按行紧密排列的三通道帧（HWC），通道顺序由 `order` 标记
#[derive(Debug, Clone)]
pub struct PackedFrame {
  order: ChannelOrder,
  pixels: RgbImage,
}

impl PackedFrame {
  pub fn new(
    width: u32,
    height: u32,
    order: ChannelOrder,
    data: Vec<u8>,
  ) -> Result<Self, FrameError> {
    let expected = PACKED_CHANNELS * width as usize * height as usize;
    let actual = data.len();
    if actual != expected {
      return Err(FrameError::LengthMismatch { expected, actual });
    }

    let pixels =
      RgbImage::from_raw(width, height, data).ok_or(FrameError::LengthMismatch { expected, actual })?;
    Ok(Self { order, pixels })
  }

  pub fn order(&self) -> ChannelOrder {
    self.order
  }

  /// 转为 RGB 图像，BGR 数据会先交换 R/B 通道
  pub fn into_rgb_image(self) -> RgbImage {
    let mut pixels = self.pixels;
    if self.order == ChannelOrder::Bgr {
      for pixel in pixels.pixels_mut() {
        pixel.0.swap(0, 2);
      }
    }
    pixels
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use image::Rgb;

  #[test]
  fn rejects_wrong_length() {
    let err = PackedFrame::new(2, 2, ChannelOrder::Rgb, vec![0u8; 11]).unwrap_err();
    assert!(matches!(
      err,
      FrameError::LengthMismatch {
        expected: 12,
        actual: 11
      }
    ));
  }

  #[test]
  fn bgr_frame_is_swapped_back_to_rgb() {
    let frame = PackedFrame::new(2, 1, ChannelOrder::Bgr, vec![1, 2, 3, 4, 5, 6]).unwrap();
    let image = frame.into_rgb_image();
    assert_eq!(image.get_pixel(0, 0), &Rgb([3, 2, 1]));
    assert_eq!(image.get_pixel(1, 0), &Rgb([6, 5, 4]));
  }

  #[test]
  fn rgb_frame_is_kept_unchanged() {
    let mut image = RgbImage::new(3, 2);
    image.put_pixel(2, 1, Rgb([10, 20, 30]));
    let frame = PackedFrame::new(3, 2, ChannelOrder::Rgb, image.clone().into_raw()).unwrap();
    assert_eq!(frame.order(), ChannelOrder::Rgb);
    assert_eq!(frame.into_rgb_image(), image);
  }
}
