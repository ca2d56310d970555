// 该文件是 Chepai （车牌识别） 项目的一部分。
// src/model.rs - 模型
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use std::path::Path;

use thiserror::Error;
use tracing::{debug, info};

use crate::blob::{Blob, ChannelOrder};

/// 两个检测阶段共用的网络输入边长
pub const NET_INPUT_W: u32 = 320;
pub const NET_INPUT_H: u32 = 320;

pub type NetBlob = Blob<NET_INPUT_W, NET_INPUT_H>;

/// 每行预测向量中类别分数之前的字段数：cx, cy, w, h, obj
pub const PRED_FIELDS: usize = 5;

#[derive(Error, Debug)]
pub enum ModelLoadError {
  #[error("模型文件读取失败: {0}")]
  Io(#[from] std::io::Error),
  #[error("模型权重无效: {0}")]
  InvalidWeights(String),
  #[error("网络配置无效: {0}")]
  InvalidConfig(String),
  #[error("类别表无效: {0}")]
  InvalidClassTable(String),
  #[error("推理后端初始化失败: {0}")]
  Backend(String),
}

/// 类别表：按行加载，行号即 class_id
#[derive(Debug, Clone)]
pub struct ClassTable {
  names: Box<[String]>,
}

impl ClassTable {
  pub fn from_file(path: &Path) -> Result<Self, ModelLoadError> {
    let text = std::fs::read_to_string(path)?;
    let names: Vec<String> = text
      .lines()
      .map(|line| line.trim().to_string())
      .filter(|line| !line.is_empty())
      .collect();
    if names.is_empty() {
      return Err(ModelLoadError::InvalidClassTable(format!(
        "类别表为空: {}",
        path.display()
      )));
    }
    Ok(Self::from_names(names))
  }

  pub fn from_names(names: Vec<String>) -> Self {
    ClassTable {
      names: names.into_boxed_slice(),
    }
  }

  pub fn label(&self, class_id: usize) -> Option<&str> {
    self.names.get(class_id).map(String::as_str)
  }

  pub fn len(&self) -> usize {
    self.names.len()
  }

  pub fn is_empty(&self) -> bool {
    self.names.is_empty()
  }
}

/// 黑盒检测网络接口：输入 blob，输出逐单元预测行
/// `[cx, cy, w, h, obj, 类别分数...]`（坐标为输入图像的比例值）。
///
/// `forward` 以 `&mut self` 进行：同一模型实例上的推理互斥。
/// 除非后端自证可重入并另行提供共享句柄，并发处理必须
/// 每路各持有一个模型实例，或在外部对调用串行化。
pub trait Network {
  type Error: std::error::Error + Send + Sync + 'static;

  fn forward(&mut self, blob: &NetBlob) -> Result<Box<[Box<[f32]>]>, Self::Error>;

  /// 网络训练时的通道顺序，构造 blob 时使用
  fn channel_order(&self) -> ChannelOrder {
    ChannelOrder::Rgb
  }
}

/// 从模型制品构造网络实例（每个阶段一个独立对象，无全局状态）
pub trait FromArtifacts: Network + Sized {
  fn from_artifacts(artifacts: &ModelArtifacts) -> Result<Self, ModelLoadError>;
}

/// 一个检测阶段的模型制品：权重、网络配置与类别表，
/// 加载一次后只读。
#[derive(Debug)]
pub struct ModelArtifacts {
  pub weights: Box<[u8]>,
  pub config: Box<[u8]>,
  pub classes: ClassTable,
}

impl ModelArtifacts {
  pub fn load(weights: &Path, config: &Path, names: &Path) -> Result<Self, ModelLoadError> {
    info!("加载模型权重: {}", weights.display());
    let weights_data = std::fs::read(weights)?;
    if weights_data.is_empty() {
      return Err(ModelLoadError::InvalidWeights(format!(
        "权重文件为空: {}",
        weights.display()
      )));
    }
    debug!(
      "权重大小: {:.2} MB",
      weights_data.len() as f64 / (1024.0 * 1024.0)
    );

    info!("加载网络配置: {}", config.display());
    let config_data = std::fs::read(config)?;
    if config_data.is_empty() {
      return Err(ModelLoadError::InvalidConfig(format!(
        "配置文件为空: {}",
        config.display()
      )));
    }

    info!("加载类别表: {}", names.display());
    let classes = ClassTable::from_file(names)?;
    debug!("类别数量: {}", classes.len());

    Ok(ModelArtifacts {
      weights: weights_data.into_boxed_slice(),
      config: config_data.into_boxed_slice(),
      classes,
    })
  }
}

#[cfg(feature = "backend_ort")]
mod onnx;
#[cfg(feature = "backend_ort")]
pub use self::onnx::{OrtNetwork, OrtNetworkError};

#[cfg(test)]
mod tests {
  use super::*;

  fn write_temp(name: &str, content: &[u8]) -> std::path::PathBuf {
    let path = std::env::temp_dir().join(format!("chepai-model-test-{}-{}", std::process::id(), name));
    std::fs::write(&path, content).unwrap();
    path
  }

  #[test]
  fn class_table_skips_blank_lines() {
    let path = write_temp("names", b"plate\n\n A \nB\n");
    let table = ClassTable::from_file(&path).unwrap();
    std::fs::remove_file(&path).ok();
    assert_eq!(table.len(), 3);
    assert_eq!(table.label(0), Some("plate"));
    assert_eq!(table.label(1), Some("A"));
    assert_eq!(table.label(3), None);
  }

  #[test]
  fn empty_class_table_is_rejected() {
    let path = write_temp("empty-names", b"\n\n");
    let err = ClassTable::from_file(&path).unwrap_err();
    std::fs::remove_file(&path).ok();
    assert!(matches!(err, ModelLoadError::InvalidClassTable(_)));
  }

  #[test]
  fn missing_weights_surface_io_error() {
    let weights = std::env::temp_dir().join("chepai-model-test-definitely-missing.weights");
    let config = write_temp("cfg", b"{}");
    let names = write_temp("names2", b"plate\n");
    let err = ModelArtifacts::load(&weights, &config, &names).unwrap_err();
    std::fs::remove_file(&config).ok();
    std::fs::remove_file(&names).ok();
    assert!(matches!(err, ModelLoadError::Io(_)));
  }

  #[test]
  fn empty_weights_are_invalid() {
    let weights = write_temp("empty.weights", b"");
    let config = write_temp("cfg2", b"{}");
    let names = write_temp("names3", b"plate\n");
    let err = ModelArtifacts::load(&weights, &config, &names).unwrap_err();
    std::fs::remove_file(&weights).ok();
    std::fs::remove_file(&config).ok();
    std::fs::remove_file(&names).ok();
    assert!(matches!(err, ModelLoadError::InvalidWeights(_)));
  }
}
