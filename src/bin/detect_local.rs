// 该文件是 DermScan 项目的一部分。
// src/bin/detect_local.rs - 本地单张图像推理
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

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing::{info, warn};
use url::Url;

use dermscan::{
  FromUrl,
  config::{self, LocalConfig, StartupError},
  input::ImageFileInput,
  model::DetectorBuilder,
  output::{ArtifactOutput, Annotator, Draw, ImageArtifact},
  task::{OneShotTask, Task},
};

/// 本地推理参数配置
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 检测器地址，`command:<程序>` 或 `replay:<原始结果文件>`
  #[arg(long, value_name = "DETECTOR", default_value = config::DEFAULT_DETECTOR)]
  pub detector: Url,
  /// 模型权重文件路径
  #[arg(long, value_name = "WEIGHTS", default_value = config::DEFAULT_WEIGHTS)]
  pub weights: PathBuf,
  /// 输入图像
  #[arg(long, value_name = "IMAGE", default_value = config::DEFAULT_IMAGE)]
  pub image: PathBuf,
  /// 标注图像输出路径
  #[arg(long, value_name = "PATH", default_value = config::DEFAULT_OUTPUT_IMAGE)]
  pub output_image: PathBuf,
  /// 检测结果 JSON 输出路径
  #[arg(long, value_name = "PATH", default_value = config::DEFAULT_OUTPUT_JSON)]
  pub output_json: PathBuf,
  /// 置信度阈值
  #[arg(long, default_value_t = config::DEFAULT_CONFIDENCE_THRESHOLD)]
  pub conf: f32,
  /// 推理尺寸
  #[arg(long, default_value_t = config::DEFAULT_IMAGE_SIZE)]
  pub imgsz: u32,
  /// 推理设备
  #[arg(long)]
  pub device: Option<String>,
  /// 标签字体（TrueType）
  #[arg(long, value_name = "FONT")]
  pub font: Option<PathBuf>,
  /// 类别名称，按编号顺序，逗号分隔
  #[arg(long, value_delimiter = ',')]
  pub labels: Vec<String>,
}

impl From<Args> for LocalConfig {
  fn from(args: Args) -> Self {
    LocalConfig {
      detector: args.detector,
      weights: args.weights,
      image: args.image,
      output_image: args.output_image,
      output_json: args.output_json,
      confidence_threshold: args.conf,
      image_size: args.imgsz,
      device: args.device,
      font: args.font,
      labels: args.labels,
    }
  }
}

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let config = LocalConfig::from(Args::parse());

  info!("检测器: {}", config.detector);
  info!("模型权重: {}", config.weights.display());
  info!("输入图像: {}", config.image.display());

  config.validate()?;
  let detector = DetectorBuilder::from_url(&config.detector)
    .and_then(|builder| builder.build(&config))
    .map_err(StartupError::from)?;
  let input = ImageFileInput::open(&config.image)?;

  let mut draw = Draw::new().with_labels(config.labels.clone());
  if let Some(font) = &config.font {
    draw = match draw.with_font_file(font) {
      Ok(draw) => draw,
      Err(e) => {
        warn!("字体加载失败，改用内置字体: {}", e);
        Draw::new().with_labels(config.labels.clone())
      }
    };
  }
  let output = ArtifactOutput::new(
    Annotator::new(draw),
    &config.output_image,
    &config.output_json,
  );

  let report = OneShotTask::default().run_task(input, detector, output)?;
  let artifacts = report.artifacts;

  match artifacts.image {
    ImageArtifact::Annotated => println!("Annotated image saved to: {}", artifacts.image_path.display()),
    ImageArtifact::Unannotated | ImageArtifact::SourceFallback => println!(
      "Annotation failed, source image saved to: {}",
      artifacts.image_path.display()
    ),
  }
  println!(
    "Saved {} detections to: {}",
    artifacts.detections,
    artifacts.json_path.display()
  );

  Ok(())
}
