// 该文件是 DermScan 项目的一部分。
// src/output/save_image_file.rs - 保存图像文件
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
use tracing::info;

#[derive(Error, Debug)]
pub enum SaveImageFileError {
  #[error("I/O 错误: {0}")]
  IoError(std::io::Error),
  #[error("图像错误: {0}")]
  ImageError(image::ImageError),
}

pub struct SaveImageFile {
  path: PathBuf,
}

impl SaveImageFile {
  pub fn new(path: impl Into<PathBuf>) -> Self {
    Self { path: path.into() }
  }

  pub fn path(&self) -> &Path {
    &self.path
  }

  /// 按扩展名选择格式写入，必要时创建父目录
  pub fn save_image(&self, image: &RgbImage) -> Result<(), SaveImageFileError> {
    if let Some(parent) = self.path.parent()
      && !parent.as_os_str().is_empty()
    {
      std::fs::create_dir_all(parent).map_err(SaveImageFileError::IoError)?;
    }

    image
      .save(&self.path)
      .map_err(SaveImageFileError::ImageError)?;

    info!("保存图像到文件: {}", self.path.display());

    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use image::Rgb;

  #[test]
  fn saves_png_into_new_directory() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("runs/predict/annotated.png");
    let image = RgbImage::from_pixel(4, 3, Rgb([9, 8, 7]));

    SaveImageFile::new(&path).save_image(&image).unwrap();
    let back = image::open(&path).unwrap().to_rgb8();
    assert_eq!(back, image);
  }

  #[test]
  fn unknown_extension_is_an_image_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("annotated.unknown");
    let image = RgbImage::new(2, 2);
    assert!(matches!(
      SaveImageFile::new(&path).save_image(&image),
      Err(SaveImageFileError::ImageError(_))
    ));
  }
}
