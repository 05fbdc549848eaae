// 该文件是 Lushi （路试） 项目的一部分。
// src/config.rs - 神经网络配置
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

use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("配置文件解析错误: {0}")]
  ParseError(#[from] serde_json::Error),
  #[error("配置无效: {0}")]
  Invalid(String),
}

/// 神经网络配置
///
/// 训练与评估共用的一组选项。评估侧只读取与输入张量形状、
/// 时序模式以及输出缩放相关的字段。
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NeuralNetConfig {
  /// 裁剪矩形上边界（含）
  pub image_crop_y1: u32,
  /// 裁剪矩形下边界（不含）
  pub image_crop_y2: u32,
  /// 裁剪矩形左边界（含）
  pub image_crop_x1: u32,
  /// 裁剪矩形右边界（不含）
  pub image_crop_x2: u32,
  /// 模型输入宽度
  pub input_image_width: u32,
  /// 模型输入高度
  pub input_image_height: u32,
  /// 模型输入通道数
  pub input_image_depth: u32,
  /// 是否启用时序（滑动窗口）模式
  pub lstm: bool,
  /// 时序窗口长度
  pub lstm_timestep: usize,
  /// 模型输出通道数（1 仅转向角，2 含油门）
  pub num_outputs: u32,
  /// 转向角缩放除数，用于还原训练期的归一化
  pub steering_angle_scale: f64,
}

impl Default for NeuralNetConfig {
  fn default() -> Self {
    Self {
      image_crop_y1: 220,
      image_crop_y2: 480,
      image_crop_x1: 0,
      image_crop_x2: 640,
      input_image_width: 160,
      input_image_height: 70,
      input_image_depth: 3,
      lstm: false,
      lstm_timestep: 5,
      num_outputs: 1,
      steering_angle_scale: 1.0,
    }
  }
}

impl NeuralNetConfig {
  /// 从 JSON 配置文件加载，未出现的字段取默认值
  pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
    let text = std::fs::read_to_string(path)?;
    let config: Self = serde_json::from_str(&text)?;
    Ok(config)
  }

  /// 在任何 I/O 之前校验配置
  pub fn validate(&self) -> Result<(), ConfigError> {
    if self.image_crop_y2 <= self.image_crop_y1 {
      return Err(ConfigError::Invalid(format!(
        "裁剪矩形纵向为空: y1={}, y2={}",
        self.image_crop_y1, self.image_crop_y2
      )));
    }
    if self.image_crop_x2 <= self.image_crop_x1 {
      return Err(ConfigError::Invalid(format!(
        "裁剪矩形横向为空: x1={}, x2={}",
        self.image_crop_x1, self.image_crop_x2
      )));
    }
    if self.input_image_width == 0 || self.input_image_height == 0 {
      return Err(ConfigError::Invalid(format!(
        "输入尺寸无效: {}x{}",
        self.input_image_width, self.input_image_height
      )));
    }
    if self.input_image_depth != 3 {
      return Err(ConfigError::Invalid(format!(
        "当前仅支持 3 通道输入, 实际为 {}",
        self.input_image_depth
      )));
    }
    if self.lstm && self.lstm_timestep == 0 {
      return Err(ConfigError::Invalid(
        "时序模式下窗口长度必须大于 0".to_string(),
      ));
    }
    if self.num_outputs != 1 && self.num_outputs != 2 {
      return Err(ConfigError::Invalid(format!(
        "模型输出通道数必须为 1 或 2, 实际为 {}",
        self.num_outputs
      )));
    }
    if !self.steering_angle_scale.is_finite() || self.steering_angle_scale == 0.0 {
      return Err(ConfigError::Invalid(format!(
        "转向角缩放除数无效: {}",
        self.steering_angle_scale
      )));
    }
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn default_config_is_valid() {
    assert!(NeuralNetConfig::default().validate().is_ok());
  }

  #[test]
  fn empty_crop_rect_rejected() {
    let config = NeuralNetConfig {
      image_crop_y1: 100,
      image_crop_y2: 100,
      ..NeuralNetConfig::default()
    };
    assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
  }

  #[test]
  fn zero_timestep_rejected_in_lstm_mode() {
    let config = NeuralNetConfig {
      lstm: true,
      lstm_timestep: 0,
      ..NeuralNetConfig::default()
    };
    assert!(config.validate().is_err());

    // 非时序模式下窗口长度不参与校验
    let config = NeuralNetConfig {
      lstm: false,
      lstm_timestep: 0,
      ..NeuralNetConfig::default()
    };
    assert!(config.validate().is_ok());
  }

  #[test]
  fn bad_num_outputs_rejected() {
    let config = NeuralNetConfig {
      num_outputs: 3,
      ..NeuralNetConfig::default()
    };
    assert!(config.validate().is_err());
  }

  #[test]
  fn zero_scale_rejected() {
    let config = NeuralNetConfig {
      steering_angle_scale: 0.0,
      ..NeuralNetConfig::default()
    };
    assert!(config.validate().is_err());
  }

  #[test]
  fn json_file_overrides_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("net.json");
    std::fs::write(&path, r#"{"lstm": true, "lstm_timestep": 3}"#).unwrap();

    let config = NeuralNetConfig::from_json_file(&path).unwrap();
    assert!(config.lstm);
    assert_eq!(config.lstm_timestep, 3);
    assert_eq!(config.num_outputs, 1);
  }
}
