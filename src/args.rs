// 该文件是 Lushi （路试） 项目的一部分。
// src/args.rs - 项目参数配置
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use clap::Parser;

/// Lushi 项目参数配置
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// ONNX 模型文件路径
  #[arg(long, value_name = "MODEL")]
  pub model: String,

  /// 驾驶数据目录路径
  /// 目录内须包含与目录同名的试验 CSV，例如
  /// ../data/2023-11-13-10-12-34/2023-11-13-10-12-34.csv
  #[arg(long, value_name = "DATA")]
  pub data: String,

  /// 神经网络配置文件（JSON），缺省使用内置默认值
  #[arg(long, value_name = "FILE")]
  pub config: Option<String>,

  /// 输出产物目录
  #[arg(long, default_value = ".", value_name = "DIR")]
  pub output_dir: String,
}
