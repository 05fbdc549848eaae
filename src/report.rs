// 该文件是 Lushi （路试） 项目的一部分。
// src/report.rs - 评估结果统计与绘图
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use plotters::prelude::*;
use thiserror::Error;
use tracing::info;

/// 误差直方图的分箱数
const HIST_BINS: usize = 25;
/// 截断对比图的最大样本数
const PARTIAL_POINTS: usize = 1000;
/// 位图尺寸，按原始 6.4x4.8 英寸图幅的 150 DPI 换算
const FIG_SIZE: (u32, u32) = (960, 720);
/// 散点图用正方形画布保证等比例坐标
const SCATTER_SIZE: (u32, u32) = (720, 720);

#[derive(Error, Debug)]
pub enum ReportError {
  #[error("没有可报告的预测结果")]
  NoData,
  #[error("标签与预测数量不一致: {measurements} 对 {predictions}")]
  LengthMismatch {
    measurements: usize,
    predictions: usize,
  },
  #[error("绘图错误: {0}")]
  RenderError(String),
}

fn render_err<E: std::fmt::Display>(err: E) -> ReportError {
  ReportError::RenderError(err.to_string())
}

/// 一段误差序列的汇总统计
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunStats {
  pub mean_abs_error: f64,
  pub stdev: f64,
}

/// 平均绝对误差与总体标准差（不做样本校正）
pub fn compute_stats(differences: &[f64]) -> Result<RunStats, ReportError> {
  if differences.is_empty() {
    return Err(ReportError::NoData);
  }
  let n = differences.len() as f64;
  let mean = differences.iter().sum::<f64>() / n;
  let variance = differences.iter().map(|d| (d - mean).powi(2)).sum::<f64>() / n;
  Ok(RunStats {
    mean_abs_error: mean,
    stdev: variance.sqrt(),
  })
}

/// 每种图各保存一份位图与一份矢量图
macro_rules! save_figs {
  ($base:expr, $suffix:expr, $size:expr, $draw:expr) => {{
    let png = format!("{}_{}.png", $base, $suffix);
    let svg = format!("{}_{}.svg", $base, $suffix);
    {
      let area = BitMapBackend::new(&png, $size).into_drawing_area();
      ($draw)(&area)?;
      area.present().map_err(render_err)?;
    }
    {
      let area = SVGBackend::new(&svg, $size).into_drawing_area();
      ($draw)(&area)?;
      area.present().map_err(render_err)?;
    }
    info!("已保存 {} 与 {}", png, svg);
  }};
}

/// 消费一次评估的累积结果并产出全部图件
///
/// 取得标签与预测序列的所有权；空序列报 `NoData` 而不是让
/// 均值计算除零。
pub fn plot_results(
  filename_base: &str,
  measurements: Vec<f64>,
  predictions: Vec<f64>,
) -> Result<(), ReportError> {
  if measurements.len() != predictions.len() {
    return Err(ReportError::LengthMismatch {
      measurements: measurements.len(),
      predictions: predictions.len(),
    });
  }
  if measurements.is_empty() {
    return Err(ReportError::NoData);
  }

  let differences: Vec<f64> = measurements
    .iter()
    .zip(predictions.iter())
    .map(|(label, pred)| (label - pred).abs())
    .collect();

  save_figs!(filename_base, "err_hist", FIG_SIZE, |area| draw_err_hist(
    area,
    &differences
  ));
  save_figs!(filename_base, "scatter", SCATTER_SIZE, |area| draw_scatter(
    area,
    &measurements,
    &predictions
  ));

  let stats = compute_stats(&differences)?;
  save_figs!(filename_base, "comparison", FIG_SIZE, |area| {
    draw_comparison(area, &measurements, &predictions, stats)
  });

  let partial = PARTIAL_POINTS.min(measurements.len());
  let partial_stats = compute_stats(&differences[..partial])?;
  save_figs!(filename_base, "comparison_1st1000", FIG_SIZE, |area| {
    draw_comparison(
      area,
      &measurements[..partial],
      &predictions[..partial],
      partial_stats,
    )
  });

  Ok(())
}

/// 预测误差直方图: 观测范围内 25 个等宽箱, 横轴固定 [0, 1]
fn draw_err_hist<DB: DrawingBackend>(
  area: &DrawingArea<DB, plotters::coord::Shift>,
  differences: &[f64],
) -> Result<(), ReportError> {
  area.fill(&WHITE).map_err(render_err)?;

  let min = differences.iter().cloned().fold(f64::INFINITY, f64::min);
  let max = differences.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
  let range = max - min;

  let mut counts = vec![0usize; HIST_BINS];
  if range > 0.0 {
    for &diff in differences {
      let index = (((diff - min) / range) * HIST_BINS as f64) as usize;
      counts[index.min(HIST_BINS - 1)] += 1;
    }
  } else {
    // 所有误差相同, 全部落入一个箱
    counts[0] = differences.len();
  }
  let max_count = counts.iter().copied().max().unwrap_or(1).max(1) as f64;

  let mut chart = ChartBuilder::on(area)
    .margin(10)
    .set_label_area_size(LabelAreaPosition::Left, 60)
    .set_label_area_size(LabelAreaPosition::Bottom, 60)
    .build_cartesian_2d(0.0..1.0f64, 0.0..max_count * 1.05)
    .map_err(render_err)?;

  chart
    .configure_mesh()
    .x_desc("Steering Angle")
    .y_desc("Number of Predictions")
    .disable_mesh()
    .draw()
    .map_err(render_err)?;

  let bin_width = if range > 0.0 { range / HIST_BINS as f64 } else { 0.05 };
  for (index, &count) in counts.iter().enumerate() {
    if count == 0 {
      continue;
    }
    let center = min + (index as f64 + 0.5) * bin_width;
    let rect = Rectangle::new(
      [
        (center - 0.025, 0.0),
        (center + 0.025, count as f64),
      ],
      BLUE.filled(),
    );
    chart
      .draw_series(std::iter::once(rect))
      .map_err(render_err)?;
  }

  Ok(())
}

/// 标签-预测散点图, 两轴固定 [-1, 1], 带对角参考线
fn draw_scatter<DB: DrawingBackend>(
  area: &DrawingArea<DB, plotters::coord::Shift>,
  measurements: &[f64],
  predictions: &[f64],
) -> Result<(), ReportError> {
  area.fill(&WHITE).map_err(render_err)?;

  let mut chart = ChartBuilder::on(area)
    .margin(10)
    .set_label_area_size(LabelAreaPosition::Left, 60)
    .set_label_area_size(LabelAreaPosition::Bottom, 60)
    .build_cartesian_2d(-1.0..1.0f64, -1.0..1.0f64)
    .map_err(render_err)?;

  chart
    .configure_mesh()
    .x_desc("True Values")
    .y_desc("Predictions")
    .disable_mesh()
    .draw()
    .map_err(render_err)?;

  chart
    .draw_series(LineSeries::new(
      vec![(-1.0, -1.0), (1.0, 1.0)],
      BLACK.stroke_width(1),
    ))
    .map_err(render_err)?;

  chart
    .draw_series(
      measurements
        .iter()
        .zip(predictions.iter())
        .map(|(&label, &pred)| Circle::new((label, pred), 3, BLUE.mix(0.5).filled())),
    )
    .map_err(render_err)?;

  Ok(())
}

/// 标签与预测的时序对比, 标题标注 MAE 与总体标准差
fn draw_comparison<DB: DrawingBackend>(
  area: &DrawingArea<DB, plotters::coord::Shift>,
  measurements: &[f64],
  predictions: &[f64],
  stats: RunStats,
) -> Result<(), ReportError> {
  area.fill(&WHITE).map_err(render_err)?;

  let mut chart = ChartBuilder::on(area)
    .margin(10)
    .caption(
      format!("MAE: {:.3}, STDEV: {:.3}", stats.mean_abs_error, stats.stdev),
      ("sans-serif", 24.0),
    )
    .set_label_area_size(LabelAreaPosition::Left, 60)
    .set_label_area_size(LabelAreaPosition::Bottom, 60)
    .build_cartesian_2d(0..measurements.len(), -1.0..1.0f64)
    .map_err(render_err)?;

  chart
    .configure_mesh()
    .x_desc("Time Step")
    .y_desc("Steering Angle")
    .disable_mesh()
    .draw()
    .map_err(render_err)?;

  chart
    .draw_series(LineSeries::new(
      measurements.iter().copied().enumerate(),
      &BLUE,
    ))
    .map_err(render_err)?
    .label("ground truth")
    .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], BLUE));

  chart
    .draw_series(LineSeries::new(predictions.iter().copied().enumerate(), &RED))
    .map_err(render_err)?
    .label("prediction")
    .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], RED));

  chart
    .configure_series_labels()
    .position(SeriesLabelPosition::UpperRight)
    .background_style(WHITE.mix(0.8))
    .border_style(BLACK)
    .draw()
    .map_err(render_err)?;

  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn stats_match_hand_computation() {
    // mean = 0.2, variance = 0.01, std = 0.1
    let stats = compute_stats(&[0.1, 0.3]).unwrap();
    assert!((stats.mean_abs_error - 0.2).abs() < 1e-12);
    assert!((stats.stdev - 0.1).abs() < 1e-12);
  }

  #[test]
  fn stats_over_constant_differences() {
    let stats = compute_stats(&[0.5, 0.5, 0.5]).unwrap();
    assert!((stats.mean_abs_error - 0.5).abs() < 1e-12);
    assert_eq!(stats.stdev, 0.0);
  }

  #[test]
  fn empty_differences_report_no_data() {
    assert!(matches!(compute_stats(&[]), Err(ReportError::NoData)));
  }

  #[test]
  fn empty_run_reports_no_data_not_a_crash() {
    let err = plot_results("unused", Vec::new(), Vec::new()).unwrap_err();
    assert!(matches!(err, ReportError::NoData));
  }

  #[test]
  fn mismatched_lengths_rejected() {
    let err = plot_results("unused", vec![0.1], vec![0.1, 0.2]).unwrap_err();
    assert!(matches!(err, ReportError::LengthMismatch { .. }));
  }

  #[test]
  fn truncated_stats_cover_leading_subset() {
    let differences: Vec<f64> = (0..8).map(|i| i as f64 / 10.0).collect();
    let partial = 4usize.min(differences.len());
    let full = compute_stats(&differences).unwrap();
    let truncated = compute_stats(&differences[..partial]).unwrap();
    assert!(truncated.mean_abs_error < full.mean_abs_error);
    assert!((truncated.mean_abs_error - 0.15).abs() < 1e-12);
  }

  #[test]
  fn renders_all_eight_artifacts() {
    let dir = tempfile::tempdir().unwrap();
    let base = dir.path().join("model_trial");
    let base = base.to_str().unwrap();

    let measurements = vec![0.1, -0.2, 0.3, 0.0];
    let predictions = vec![0.15, -0.25, 0.2, 0.05];
    plot_results(base, measurements, predictions).unwrap();

    for suffix in ["err_hist", "scatter", "comparison", "comparison_1st1000"] {
      for ext in ["png", "svg"] {
        let path = format!("{base}_{suffix}.{ext}");
        assert!(std::path::Path::new(&path).exists(), "缺少图件 {path}");
      }
    }
  }
}
