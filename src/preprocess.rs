// 该文件是 Lushi （路试） 项目的一部分。
// src/preprocess.rs - 图像预处理
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use std::path::Path;

use image::{ImageReader, RgbImage};
use thiserror::Error;

use crate::config::NeuralNetConfig;

#[derive(Error, Debug)]
pub enum PreprocessError {
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("图像解码错误: {0}")]
  ImageError(#[from] image::ImageError),
  #[error("裁剪矩形超出图像范围: 图像 {width}x{height}, 矩形 x[{x1},{x2}) y[{y1},{y2})")]
  CropOutOfBounds {
    width: u32,
    height: u32,
    x1: u32,
    x2: u32,
    y1: u32,
    y2: u32,
  },
}

/// 帧预处理器
///
/// 解码后的图像已是 RGB 通道顺序，与模型期望一致；随后裁剪到
/// 配置矩形、缩放到模型输入尺寸，并把像素归一化到 [0, 1]，
/// 以 NHWC 布局输出。
pub struct FramePreprocessor {
  crop_x1: u32,
  crop_x2: u32,
  crop_y1: u32,
  crop_y2: u32,
  width: u32,
  height: u32,
}

impl FramePreprocessor {
  pub fn new(config: &NeuralNetConfig) -> Self {
    Self {
      crop_x1: config.image_crop_x1,
      crop_x2: config.image_crop_x2,
      crop_y1: config.image_crop_y1,
      crop_y2: config.image_crop_y2,
      width: config.input_image_width,
      height: config.input_image_height,
    }
  }

  /// 单帧张量元素个数
  pub fn frame_len(&self) -> usize {
    (self.width as usize) * (self.height as usize) * (RGB_CHANNELS as usize)
  }

  /// 从磁盘加载一帧并完成全部预处理
  pub fn load_and_process<P: AsRef<Path>>(&self, path: P) -> Result<Vec<f32>, PreprocessError> {
    let image = ImageReader::open(path)?.decode()?;
    self.process(&image.into())
  }

  /// 裁剪、缩放并归一化一帧 RGB 图像
  pub fn process(&self, image: &RgbImage) -> Result<Vec<f32>, PreprocessError> {
    let (width, height) = image.dimensions();
    if self.crop_x2 > width || self.crop_y2 > height {
      return Err(PreprocessError::CropOutOfBounds {
        width,
        height,
        x1: self.crop_x1,
        x2: self.crop_x2,
        y1: self.crop_y1,
        y2: self.crop_y2,
      });
    }

    let cropped = image::imageops::crop_imm(
      image,
      self.crop_x1,
      self.crop_y1,
      self.crop_x2 - self.crop_x1,
      self.crop_y2 - self.crop_y1,
    )
    .to_image();

    let resized = image::imageops::resize(
      &cropped,
      self.width,
      self.height,
      image::imageops::FilterType::Triangle,
    );

    Ok(
      resized
        .into_raw()
        .into_iter()
        .map(|v| v as f32 / 255.0)
        .collect(),
    )
  }
}

const RGB_CHANNELS: u32 = 3;

#[cfg(test)]
mod tests {
  use super::*;
  use crate::config::NeuralNetConfig;

  fn small_config() -> NeuralNetConfig {
    NeuralNetConfig {
      image_crop_y1: 2,
      image_crop_y2: 10,
      image_crop_x1: 0,
      image_crop_x2: 16,
      input_image_width: 8,
      input_image_height: 4,
      ..NeuralNetConfig::default()
    }
  }

  #[test]
  fn output_length_matches_target_shape() {
    let preprocessor = FramePreprocessor::new(&small_config());
    let image = RgbImage::from_pixel(16, 12, image::Rgb([128, 64, 255]));

    let frame = preprocessor.process(&image).unwrap();
    assert_eq!(frame.len(), 8 * 4 * 3);
    assert_eq!(frame.len(), preprocessor.frame_len());
  }

  #[test]
  fn pixels_are_normalized() {
    let preprocessor = FramePreprocessor::new(&small_config());
    let image = RgbImage::from_pixel(16, 12, image::Rgb([255, 0, 51]));

    let frame = preprocessor.process(&image).unwrap();
    assert!(frame.iter().all(|v| (0.0..=1.0).contains(v)));
    // 纯色图像裁剪缩放后仍为纯色
    assert!((frame[0] - 1.0).abs() < 1e-6);
    assert!(frame[1].abs() < 1e-6);
    assert!((frame[2] - 0.2).abs() < 1e-6);
  }

  #[test]
  fn crop_beyond_image_is_an_error() {
    let preprocessor = FramePreprocessor::new(&small_config());
    let image = RgbImage::new(8, 8);

    assert!(matches!(
      preprocessor.process(&image),
      Err(PreprocessError::CropOutOfBounds { .. })
    ));
  }

  #[test]
  fn loads_frame_from_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("frame.png");
    RgbImage::from_pixel(16, 12, image::Rgb([10, 20, 30]))
      .save(&path)
      .unwrap();

    let preprocessor = FramePreprocessor::new(&small_config());
    let frame = preprocessor.load_and_process(&path).unwrap();
    assert_eq!(frame.len(), preprocessor.frame_len());
  }

  #[test]
  fn missing_image_is_fatal() {
    let preprocessor = FramePreprocessor::new(&small_config());
    assert!(preprocessor.load_and_process("/no/such/frame.jpg").is_err());
  }
}
