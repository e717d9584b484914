// 该文件是 DermScan 项目的一部分。
// src/output/draw.rs - 目标检测结果可视化
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

use ab_glyph::{FontArc, PxScale};
use image::{Rgb, RgbImage};
use imageproc::{
  drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_text_mut, text_size},
  rect::Rect,
};
use thiserror::Error;
use tracing::{debug, warn};

use crate::{frame::ChannelOrder, model::DetectionSet};

// 文本渲染常量
const LABEL_FONT_SIZE: f32 = 18.0;
const LABEL_PADDING: i32 = 2;
const LABEL_TEXT_COLOR: [u8; 3] = [255, 255, 255]; // 白色文本
const BOX_THICKNESS: i32 = 2;
const PALETTE_SIZE: usize = 20;
// 无字体时按字号估算标签宽度
const GLYPH_WIDTH_RATIO: f32 = 0.6;

static DEFAULT_FONT: &[u8] = include_bytes!("../../assets/DejaVuSans.ttf");

#[derive(Error, Debug)]
pub enum PlotError {
  #[error("无法读取字体文件 {}: {}", .0.display(), .1)]
  FontIoError(PathBuf, std::io::Error),
  #[error("字体文件无效: {}", .0.display())]
  InvalidFont(PathBuf),
  #[error("图像尺寸为零: {0}x{1}")]
  EmptyImage(u32, u32),
}

/// 绘制后得到的原始像素缓冲，通道顺序由绘制器约定
#[derive(Debug, Clone)]
pub struct Canvas {
  pub width: u32,
  pub height: u32,
  pub data: Vec<u8>,
}

/// 把检测结果绘制到图像上的能力
pub trait Plot {
  type Error: std::fmt::Display;

  /// 返回缓冲的通道顺序
  const CHANNEL_ORDER: ChannelOrder;

  fn plot(&self, image: &RgbImage, detections: &DetectionSet) -> Result<Canvas, Self::Error>;
}

pub struct Draw {
  font: Option<FontArc>,
  font_scale: PxScale,
  colors: Vec<Rgb<u8>>,
  labels: Vec<String>,
}

impl Default for Draw {
  fn default() -> Self {
    Self::new()
  }
}

impl Draw {
  pub fn new() -> Self {
    let colors = (0..PALETTE_SIZE)
      .map(|i| {
        let hue = (i as f32 / PALETTE_SIZE as f32) * 360.0;
        hsv_to_rgb(hue, 0.8, 0.9)
      })
      .collect();

    // 使用内置的默认字体数据
    let font = match FontArc::try_from_slice(DEFAULT_FONT) {
      Ok(font) => Some(font),
      Err(_) => {
        warn!("内置字体无法加载，标签只绘制底色");
        None
      }
    };

    Self {
      font,
      font_scale: PxScale::from(LABEL_FONT_SIZE),
      colors,
      labels: Vec::new(),
    }
  }

  pub fn with_font_file(mut self, path: &Path) -> Result<Self, PlotError> {
    let data =
      std::fs::read(path).map_err(|e| PlotError::FontIoError(path.to_path_buf(), e))?;
    let font =
      FontArc::try_from_vec(data).map_err(|_| PlotError::InvalidFont(path.to_path_buf()))?;
    debug!("加载标签字体: {}", path.display());
    self.font = Some(font);
    Ok(self)
  }

  /// 不绘制标签文字，只保留标签底色
  pub fn without_font(mut self) -> Self {
    self.font = None;
    self
  }

  pub fn with_labels(mut self, labels: Vec<String>) -> Self {
    self.labels = labels;
    self
  }

  pub fn has_font(&self) -> bool {
    self.font.is_some()
  }

  fn color_of(&self, class_id: u32) -> Rgb<u8> {
    self.colors[class_id as usize % self.colors.len()]
  }

  fn label_of(&self, class_id: u32, confidence: f32) -> String {
    let name = match self.labels.get(class_id as usize) {
      Some(name) => name.clone(),
      None => class_id.to_string(),
    };
    format!("{} {:.2}", name, confidence)
  }

  // bbox 为像素坐标 [x_min, y_min, x_max, y_max]
  fn draw_bbox_with_label(
    &self,
    image: &mut RgbImage,
    bbox: &[f32; 4],
    class_id: u32,
    confidence: f32,
  ) {
    let (w, h) = (image.width() as i32, image.height() as i32);
    let color = self.color_of(class_id);

    let x_min = (bbox[0].floor() as i32).clamp(0, w - 1);
    let y_min = (bbox[1].floor() as i32).clamp(0, h - 1);
    let x_max = (bbox[2].ceil() as i32).clamp(0, w - 1);
    let y_max = (bbox[3].ceil() as i32).clamp(0, h - 1);

    if x_min >= x_max || y_min >= y_max {
      debug!("跳过退化的检测框: {:?}", bbox);
      return;
    }

    let box_w = x_max - x_min + 1;
    let box_h = y_max - y_min + 1;

    // 绘制边框（加粗为2像素）
    for t in 0..BOX_THICKNESS {
      let (inner_w, inner_h) = (box_w - 2 * t, box_h - 2 * t);
      if inner_w <= 0 || inner_h <= 0 {
        break;
      }
      let rect = Rect::at(x_min + t, y_min + t).of_size(inner_w as u32, inner_h as u32);
      draw_hollow_rect_mut(image, rect, color);
    }

    let label = self.label_of(class_id, confidence);
    let (text_w, text_h) = match &self.font {
      Some(font) => text_size(self.font_scale, font, &label),
      None => (
        (label.chars().count() as f32 * LABEL_FONT_SIZE * GLYPH_WIDTH_RATIO).ceil() as u32,
        LABEL_FONT_SIZE.ceil() as u32,
      ),
    };
    let tab_w = (text_w as i32 + 2 * LABEL_PADDING).min(w - x_min);
    let tab_h = text_h as i32 + 2 * LABEL_PADDING;

    // 标签放在边框上方，空间不足时贴齐顶部
    let label_x = x_min;
    let label_y = (y_min - tab_h).max(0);

    if tab_w <= 0 || tab_h <= 0 {
      return;
    }
    let rect = Rect::at(label_x, label_y).of_size(tab_w as u32, tab_h as u32);
    draw_filled_rect_mut(image, rect, color);

    if let Some(font) = &self.font {
      draw_text_mut(
        image,
        Rgb(LABEL_TEXT_COLOR),
        label_x + LABEL_PADDING,
        label_y + LABEL_PADDING,
        self.font_scale,
        font,
        &label,
      );
    }
  }

  pub fn draw_detections_on_image(&self, image: &mut RgbImage, detections: &DetectionSet) {
    if self.font.is_none() && !detections.is_empty() {
      warn!("未配置标签字体，标签只绘制底色");
    }

    for detection in detections {
      self.draw_bbox_with_label(
        image,
        detection.bbox(),
        detection.class_id(),
        detection.confidence(),
      );
    }
  }
}

impl Plot for Draw {
  type Error = PlotError;

  const CHANNEL_ORDER: ChannelOrder = ChannelOrder::Rgb;

  fn plot(&self, image: &RgbImage, detections: &DetectionSet) -> Result<Canvas, Self::Error> {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
      return Err(PlotError::EmptyImage(width, height));
    }

    let mut image = image.clone();
    self.draw_detections_on_image(&mut image, detections);

    Ok(Canvas {
      width,
      height,
      data: image.into_raw(),
    })
  }
}

/// HSV 转 RGB
fn hsv_to_rgb(h: f32, s: f32, v: f32) -> Rgb<u8> {
  let c = v * s;
  let x = c * (1.0 - ((h / 60.0) % 2.0 - 1.0).abs());
  let m = v - c;

  let (r, g, b) = if h < 60.0 {
    (c, x, 0.0)
  } else if h < 120.0 {
    (x, c, 0.0)
  } else if h < 180.0 {
    (0.0, c, x)
  } else if h < 240.0 {
    (0.0, x, c)
  } else if h < 300.0 {
    (x, 0.0, c)
  } else {
    (c, 0.0, x)
  };

  Rgb([
    ((r + m) * 255.0) as u8,
    ((g + m) * 255.0) as u8,
    ((b + m) * 255.0) as u8,
  ])
}
