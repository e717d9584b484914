// 该文件是 DermScan 项目的一部分。
// src/bin/detect_remote.rs - 远程单张图像推理
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

use anyhow::Result;
use clap::Parser;
use tracing::info;
use url::Url;

use dermscan::{
  config::{self, RemoteConfig},
  remote::RemoteClient,
  task::{RemoteOutcome, RemoteTask, Task},
};

/// 远程推理参数配置
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 远程检测服务地址
  #[arg(long, value_name = "URL", default_value = config::DEFAULT_ENDPOINT)]
  pub endpoint: Url,
  /// 输入图像
  #[arg(value_name = "IMAGE")]
  pub image: PathBuf,
  /// 标注图像输出路径
  #[arg(long, value_name = "PATH", default_value = config::DEFAULT_REMOTE_OUTPUT)]
  pub output: PathBuf,
  /// 请求超时（秒）
  #[arg(long, default_value_t = config::DEFAULT_TIMEOUT_SECS)]
  pub timeout: u64,
}

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = Args::parse();
  let config = RemoteConfig {
    output: args.output,
    timeout: Duration::from_secs(args.timeout),
    ..RemoteConfig::new(args.endpoint, args.image)
  };

  info!("远程服务: {}", config.endpoint);
  info!("输入图像: {}", config.image.display());
  config.validate()?;

  let client = RemoteClient::new(config.endpoint.clone(), config.timeout)?;

  println!("Encoding image to base64...");
  println!("Sending request to server...");
  match RemoteTask.run_task(config.image, &client, config.output)? {
    RemoteOutcome::Saved { detections, path } => {
      println!("✅ Success! Found {} detections", detections);
      println!("🎉 Annotated image saved at: {}", path.display());
    }
    RemoteOutcome::Failed(e) => println!("❌ {}", e),
  }

  Ok(())
}
