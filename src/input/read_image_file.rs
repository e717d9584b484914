// 该文件是 DermScan 项目的一部分。
// src/input/read_image_file.rs - 图像文件输入
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

use image::{ImageReader, RgbImage};
use thiserror::Error;
use tracing::{debug, error};

#[derive(Error, Debug)]
pub enum ImageFileInputError {
  #[error("Image not found: {}", .0.display())]
  NotFound(PathBuf),
  #[error("I/O error: {0}")]
  IoError(std::io::Error),
  #[error("Image loading error: {0}")]
  ImageLoadError(image::ImageError),
}

impl From<std::io::Error> for ImageFileInputError {
  fn from(err: std::io::Error) -> Self {
    ImageFileInputError::IoError(err)
  }
}

impl From<image::ImageError> for ImageFileInputError {
  fn from(err: image::ImageError) -> Self {
    ImageFileInputError::ImageLoadError(err)
  }
}

/// 已解码的输入图像，同时保留原始路径供检测器读取
pub struct ImageFileInput {
  path: PathBuf,
  image: RgbImage,
}

impl ImageFileInput {
  pub fn open(path: impl AsRef<Path>) -> Result<Self, ImageFileInputError> {
    let path = path.as_ref();
    if !path.exists() {
      error!("Image not found: {}", path.display());
      return Err(ImageFileInputError::NotFound(path.to_path_buf()));
    }

    // 按内容探测格式，扩展名不可靠
    let image = ImageReader::open(path)?.with_guessed_format()?.decode()?;
    debug!(
      "读取图像 {}: {}x{}",
      path.display(),
      image.width(),
      image.height()
    );

    Ok(ImageFileInput {
      path: path.to_path_buf(),
      image: image.into_rgb8(),
    })
  }

  pub fn path(&self) -> &Path {
    &self.path
  }

  pub fn image(&self) -> &RgbImage {
    &self.image
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use image::Rgb;

  #[test]
  fn opens_and_decodes_to_rgb() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("test5.png");
    RgbImage::from_pixel(6, 4, Rgb([1, 2, 3])).save(&path).unwrap();

    let input = ImageFileInput::open(&path).unwrap();
    assert_eq!(input.path(), path.as_path());
    assert_eq!(input.image().dimensions(), (6, 4));
    assert_eq!(input.image().get_pixel(5, 3), &Rgb([1, 2, 3]));
  }

  #[test]
  fn missing_file_is_not_found() {
    assert!(matches!(
      ImageFileInput::open("/nonexistent/test5.png"),
      Err(ImageFileInputError::NotFound(_))
    ));
  }

  #[test]
  fn garbage_is_a_load_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("broken.png");
    std::fs::write(&path, b"definitely not an image").unwrap();
    assert!(ImageFileInput::open(&path).is_err());
  }
}
