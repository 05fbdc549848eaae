// 该文件是 Lushi （路试） 项目的一部分。
// src/main.rs - 项目主程序
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

mod args;

use anyhow::Result;
use clap::Parser;
use tracing::info;

use lushi::config::NeuralNetConfig;
use lushi::driver::DriveLog;
use lushi::model::OnnxModel;

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = args::Args::parse();

  info!("Lushi 驾驶日志评估");
  info!("模型文件路径: {}", args.model);
  info!("驾驶数据路径: {}", args.data);

  // 任何 I/O 之前先确定配置有效
  let config = match &args.config {
    Some(path) => {
      info!("配置文件: {}", path);
      NeuralNetConfig::from_json_file(path)?
    }
    None => NeuralNetConfig::default(),
  };
  config.validate()?;

  let model = OnnxModel::load(&args.model)?;

  let mut drive_log =
    DriveLog::new(config, model, &args.model, &args.data).with_output_dir(&args.output_dir);
  drive_log.run()?;

  info!("评估完成");
  Ok(())
}
