// 该文件是 Lushi （路试） 项目的一部分。
// src/model.rs - 模型封装
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use std::path::Path;

use ort::session::{Session, builder::GraphOptimizationLevel};
use ort::value::Tensor;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Error, Debug)]
pub enum ModelError {
  #[error("ONNX Runtime 错误: {0}")]
  OrtError(#[from] ort::Error),
  #[error("模型无效: {0}")]
  ModelInvalid(String),
  #[error("模型缺少输出 '{0}'")]
  MissingOutput(String),
  #[error("模型输出为空")]
  EmptyOutput,
}

/// 推理接口
///
/// 驱动器只依赖该接口：生产环境用 ONNX 会话实现，测试用桩实现。
pub trait Predictor {
  /// 对一个批张量执行推理，返回首个样本的输出向量
  fn predict(&mut self, shape: &[i64], data: Vec<f32>) -> Result<Vec<f32>, ModelError>;
}

/// 基于 ONNX Runtime 的转向模型
pub struct OnnxModel {
  session: Session,
  input_name: String,
  output_name: String,
}

impl OnnxModel {
  /// 从模型文件创建推理会话
  pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ModelError> {
    let path = path.as_ref();

    info!("加载模型文件: {}", path.display());
    if let Ok(meta) = std::fs::metadata(path) {
      debug!("模型文件大小: {:.2} MB", meta.len() as f64 / (1024.0 * 1024.0));
    }

    ort::init().commit();
    let session = Session::builder()?
      .with_optimization_level(GraphOptimizationLevel::Level3)
      .map_err(ort::Error::from)?
      .with_intra_threads(1)
      .map_err(ort::Error::from)?
      .commit_from_file(path)?;

    let input_name = session
      .inputs()
      .first()
      .map(|input| input.name().to_string())
      .ok_or_else(|| ModelError::ModelInvalid("模型没有输入张量".to_string()))?;
    let output_name = session
      .outputs()
      .first()
      .map(|output| output.name().to_string())
      .ok_or_else(|| ModelError::ModelInvalid("模型没有输出张量".to_string()))?;

    debug!("模型输入: {}", input_name);
    debug!("模型输出: {}", output_name);
    info!("模型加载完成");

    Ok(OnnxModel {
      session,
      input_name,
      output_name,
    })
  }
}

impl Predictor for OnnxModel {
  fn predict(&mut self, shape: &[i64], data: Vec<f32>) -> Result<Vec<f32>, ModelError> {
    debug!("执行模型推理, 输入形状: {:?}", shape);
    let tensor = Tensor::from_array((shape.to_vec(), data))?;
    let outputs = self.session.run(ort::inputs![&self.input_name => tensor])?;

    let output = outputs
      .get(&self.output_name)
      .ok_or_else(|| ModelError::MissingOutput(self.output_name.clone()))?;
    let (_, values) = output.try_extract_tensor::<f32>()?;
    if values.is_empty() {
      return Err(ModelError::EmptyOutput);
    }

    Ok(values.to_vec())
  }
}
