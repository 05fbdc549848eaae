// 该文件是 Lushi （路试） 项目的一部分。
// src/dataset.rs - 驾驶数据读取
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use std::path::Path;

use thiserror::Error;
use tracing::debug;

/// 试验数据 CSV 的扩展名
pub const DATA_EXT: &str = ".csv";

#[derive(Error, Debug)]
pub enum DatasetError {
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("CSV 读取错误: {0}")]
  CsvError(#[from] csv::Error),
  #[error("第 {line} 行数据无效: {reason}")]
  BadRow { line: usize, reason: String },
}

/// 一条驾驶记录
///
/// CSV 行格式为 `图像文件名,<测量值...>,速度`：首字段为图像文件名，
/// 末字段为车速，中间为测量向量，其中 `measurements[0]` 是
/// 人工驾驶的转向角标签。
#[derive(Debug, Clone)]
pub struct DriveRecord {
  pub image_name: String,
  pub velocity: f64,
  pub measurements: Vec<f64>,
}

/// 一次试验的全部驾驶记录，按采集顺序排列
#[derive(Debug, Default)]
pub struct DriveDataset {
  pub records: Vec<DriveRecord>,
}

impl DriveDataset {
  /// 从试验 CSV 加载原始记录，不做标签归一化
  pub fn load<P: AsRef<Path>>(csv_path: P) -> Result<Self, DatasetError> {
    let csv_path = csv_path.as_ref();
    debug!("读取试验数据: {}", csv_path.display());

    let mut reader = csv::ReaderBuilder::new()
      .has_headers(false)
      .flexible(true)
      .trim(csv::Trim::All)
      .from_path(csv_path)?;

    let mut records = Vec::new();
    for (index, row) in reader.records().enumerate() {
      let line = index + 1;
      let row = row?;
      records.push(parse_record(&row, line)?);
    }

    Ok(DriveDataset { records })
  }

  pub fn len(&self) -> usize {
    self.records.len()
  }

  pub fn is_empty(&self) -> bool {
    self.records.is_empty()
  }
}

fn parse_record(row: &csv::StringRecord, line: usize) -> Result<DriveRecord, DatasetError> {
  if row.len() < 3 {
    return Err(DatasetError::BadRow {
      line,
      reason: format!("字段数不足: 期望至少 3 个, 实际 {} 个", row.len()),
    });
  }

  let image_name = row[0].to_string();
  if image_name.is_empty() {
    return Err(DatasetError::BadRow {
      line,
      reason: "图像文件名为空".to_string(),
    });
  }

  let parse_field = |field: &str| -> Result<f64, DatasetError> {
    field.parse::<f64>().map_err(|_| DatasetError::BadRow {
      line,
      reason: format!("字段 '{}' 不是数值", field),
    })
  };

  let velocity = parse_field(&row[row.len() - 1])?;
  let measurements = row
    .iter()
    .take(row.len() - 1)
    .skip(1)
    .map(parse_field)
    .collect::<Result<Vec<_>, _>>()?;

  Ok(DriveRecord {
    image_name,
    velocity,
    measurements,
  })
}

/// 取路径最后一段作为短名，忽略结尾的分隔符
///
/// 输出产物以 `<模型短名>_<数据短名>` 为前缀命名。
pub fn short_name(path: &str) -> String {
  let trimmed = path.trim_end_matches('/');
  match trimmed.rfind('/') {
    Some(pos) => trimmed[pos + 1..].to_string(),
    None => trimmed.to_string(),
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::io::Write;

  fn write_csv(contents: &str) -> (tempfile::TempDir, std::path::PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("trial.csv");
    let mut file = std::fs::File::create(&path).unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    (dir, path)
  }

  #[test]
  fn loads_rows_in_order() {
    let (_dir, path) = write_csv("a.jpg,0.25,9.8\nb.jpg,-0.5,0.1,10.2\n");
    let dataset = DriveDataset::load(&path).unwrap();

    assert_eq!(dataset.len(), 2);
    assert_eq!(dataset.records[0].image_name, "a.jpg");
    assert_eq!(dataset.records[0].measurements, vec![0.25]);
    assert_eq!(dataset.records[0].velocity, 9.8);
    // 四字段行: 测量向量含转向角与油门两个通道
    assert_eq!(dataset.records[1].measurements, vec![-0.5, 0.1]);
    assert_eq!(dataset.records[1].velocity, 10.2);
  }

  #[test]
  fn short_row_reports_line_number() {
    let (_dir, path) = write_csv("a.jpg,0.25,9.8\nb.jpg,0.5\n");
    let err = DriveDataset::load(&path).unwrap_err();
    match err {
      DatasetError::BadRow { line, .. } => assert_eq!(line, 2),
      other => panic!("意外的错误: {other}"),
    }
  }

  #[test]
  fn non_numeric_field_is_fatal() {
    let (_dir, path) = write_csv("a.jpg,oops,9.8\n");
    assert!(matches!(
      DriveDataset::load(&path),
      Err(DatasetError::BadRow { line: 1, .. })
    ));
  }

  #[test]
  fn empty_file_yields_empty_dataset() {
    let (_dir, path) = write_csv("");
    let dataset = DriveDataset::load(&path).unwrap();
    assert!(dataset.is_empty());
  }

  #[test]
  fn missing_csv_is_an_error() {
    assert!(DriveDataset::load("/no/such/trial.csv").is_err());
  }

  #[test]
  fn short_name_takes_trailing_component() {
    assert_eq!(short_name("/a/b/model"), "model");
    assert_eq!(short_name("/a/b/model/"), "model");
    assert_eq!(short_name("model"), "model");
    assert_eq!(short_name("../data/2023-11-13-10-12-34"), "2023-11-13-10-12-34");
  }
}
