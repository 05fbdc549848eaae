// 该文件是 Lushi （路试） 项目的一部分。
// src/driver.rs - 评估驱动器
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

use std::collections::VecDeque;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{debug, info};

use crate::config::NeuralNetConfig;
use crate::dataset::{self, DATA_EXT, DriveDataset, DriveRecord};
use crate::model::Predictor;
use crate::preprocess::FramePreprocessor;
use crate::report;

/// 对比日志的扩展名
pub const LOG_EXT: &str = ".csv";
/// 对比日志的表头
const LOG_HEADER: &str = "image_name,label_steering_angle,pred_steering_angle";

/// 行处理模式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvalMode {
  /// 单帧推理
  SingleFrame,
  /// 时序滑动窗口推理
  Temporal { timestep: usize },
}

impl EvalMode {
  pub fn from_config(config: &NeuralNetConfig) -> Self {
    if config.lstm {
      EvalMode::Temporal {
        timestep: config.lstm_timestep,
      }
    } else {
      EvalMode::SingleFrame
    }
  }
}

/// 迭代进度观察器，只做日志输出，不参与控制流程
struct Progress {
  total: usize,
  done: usize,
}

impl Progress {
  const STRIDE: usize = 100;

  fn new(total: usize) -> Self {
    Progress { total, done: 0 }
  }

  fn tick(&mut self) {
    self.done += 1;
    if self.done % Self::STRIDE == 0 || self.done == self.total {
      info!("处理进度: {}/{}", self.done, self.total);
    }
  }
}

/// 评估驱动器
///
/// 对一次试验回放全部帧：逐行读取数据集、预处理图像、调用模型、
/// 累积标签与预测，并写出逐行对比日志。`run` 结束时交由
/// 报表模块绘图。一次实例只能运行一遍。
pub struct DriveLog<P: Predictor> {
  config: NeuralNetConfig,
  model: P,
  preprocessor: FramePreprocessor,
  data_path: PathBuf,
  data_name: String,
  prefix: String,
  output_dir: PathBuf,
  records: Vec<DriveRecord>,
  measurements: Vec<f64>,
  predictions: Vec<f64>,
}

impl<P: Predictor> DriveLog<P> {
  /// 创建驱动器
  ///
  /// `model_path` 与 `data_path` 的末段短名用于命名输出产物
  /// `<模型短名>_<数据短名>`，默认写到当前目录。
  pub fn new(config: NeuralNetConfig, model: P, model_path: &str, data_path: &str) -> Self {
    let model_name = dataset::short_name(model_path);
    let data_name = dataset::short_name(data_path);
    let prefix = format!("{model_name}_{data_name}");
    let preprocessor = FramePreprocessor::new(&config);

    DriveLog {
      config,
      model,
      preprocessor,
      data_path: PathBuf::from(data_path.trim_end_matches('/')),
      data_name,
      prefix,
      output_dir: PathBuf::from("."),
      records: Vec::new(),
      measurements: Vec::new(),
      predictions: Vec::new(),
    }
  }

  /// 改写输出产物所在目录
  pub fn with_output_dir<D: AsRef<Path>>(mut self, dir: D) -> Self {
    self.output_dir = dir.as_ref().to_path_buf();
    self
  }

  /// 输出产物的公共前缀（含目录）
  pub fn filename_base(&self) -> String {
    self.output_dir.join(&self.prefix).to_string_lossy().into_owned()
  }

  /// 加载试验数据集并报告样本数
  ///
  /// 数据集以原始物理单位加载，不做标签归一化。
  pub fn prepare(&mut self) -> Result<()> {
    let csv_path = self.data_path.join(format!("{}{}", self.data_name, DATA_EXT));
    let dataset = DriveDataset::load(&csv_path)
      .with_context(|| format!("无法读取试验数据 {}", csv_path.display()))?;

    info!("测试样本数: {}", dataset.len());
    self.records = dataset.records;
    Ok(())
  }

  /// 执行整个评估流程: 数据加载、逐行推理、日志写出、绘图
  pub fn run(&mut self) -> Result<()> {
    self.prepare()?;

    let filename_base = self.filename_base();
    let log_name = format!("{filename_base}{LOG_EXT}");
    let file = File::create(&log_name).with_context(|| format!("无法创建日志 {log_name}"))?;
    let mut writer = BufWriter::new(file);
    writeln!(writer, "{LOG_HEADER}")?;
    writer.flush()?;

    let mode = EvalMode::from_config(&self.config);
    debug!("行处理模式: {:?}", mode);

    let records = std::mem::take(&mut self.records);
    let mut progress = Progress::new(records.len());
    let mut window: VecDeque<Vec<f32>> = VecDeque::new();

    let height = self.config.input_image_height as i64;
    let width = self.config.input_image_width as i64;
    let depth = self.config.input_image_depth as i64;

    for record in &records {
      let frame_path = self.data_path.join(&record.image_name);
      let frame = self
        .preprocessor
        .load_and_process(&frame_path)
        .with_context(|| format!("无法处理图像 {}", frame_path.display()))?;

      let output = match mode {
        EvalMode::SingleFrame => Some(self.model.predict(&[1, height, width, depth], frame)?),
        EvalMode::Temporal { timestep } => {
          window.push_back(frame);
          if window.len() < timestep {
            // 窗口未满, 不产生预测
            None
          } else {
            let data: Vec<f32> = window.iter().flatten().copied().collect();
            let output = self
              .model
              .predict(&[1, timestep as i64, height, width, depth], data)?;
            window.pop_front();
            Some(output)
          }
        }
      };

      if let Some(output) = output {
        self.record_prediction(record, &output, &mut writer)?;
      }
      progress.tick();
    }

    drop(writer);
    info!("已保存 {}", log_name);

    let (measurements, predictions) = self.take_results();
    report::plot_results(&filename_base, measurements, predictions)?;

    Ok(())
  }

  /// 换算一次模型输出, 累积结果并写出一行日志
  ///
  /// 每行写后立即冲刷, 使中途被终止的运行也留下有效的部分日志。
  fn record_prediction(
    &mut self,
    record: &DriveRecord,
    output: &[f32],
    writer: &mut BufWriter<File>,
  ) -> Result<()> {
    let raw = *output
      .first()
      .ok_or_else(|| anyhow::anyhow!("模型输出为空"))?;
    let pred_steering_angle = raw / self.config.steering_angle_scale as f32;

    if self.config.num_outputs == 2 {
      // TODO: 油门通道尚未进入日志格式, 读出后仅做调试输出
      let pred_throttle = output.get(1).copied();
      debug!("油门预测: {:?}", pred_throttle);
    }

    let label_steering_angle = record.measurements[0];
    self.measurements.push(label_steering_angle);
    self.predictions.push(pred_steering_angle as f64);

    writeln!(
      writer,
      "{},{},{}",
      record.image_name, label_steering_angle, pred_steering_angle
    )?;
    writer.flush()?;
    Ok(())
  }

  /// 取走累积的标签与预测序列, 原字段清空
  ///
  /// 大样本运行时避免统计阶段持有两份数据。
  pub fn take_results(&mut self) -> (Vec<f64>, Vec<f64>) {
    (
      std::mem::take(&mut self.measurements),
      std::mem::take(&mut self.predictions),
    )
  }
}
