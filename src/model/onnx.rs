// 该文件是 Chepai （车牌识别） 项目的一部分。
// src/model/onnx.rs - ONNX Runtime 推理后端
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use ndarray::Array;
use ort::{
  session::{Session, builder::GraphOptimizationLevel},
  value::Value,
};
use thiserror::Error;
use tracing::{debug, info};

use crate::blob::ChannelOrder;
use crate::model::{FromArtifacts, ModelArtifacts, ModelLoadError, NetBlob, Network, PRED_FIELDS};

#[derive(Error, Debug)]
pub enum OrtNetworkError {
  #[error("ONNX Runtime 错误: {0}")]
  Ort(#[from] ort::Error),
  #[error("输入张量构造失败: {0}")]
  Input(String),
  #[error("模型没有输出张量")]
  NoOutput,
  #[error("输出大小 {0} 与行长度 {1} 不匹配")]
  OutputShape(usize, usize),
}

/// 网络配置文件：描述 ONNX 图输入输出约定的 JSON 文档。
/// 字段均可缺省：`channel_order`（"rgb"/"bgr"，默认 rgb）、
/// `row_len`（默认 5 + 类别数）、`transpose`
/// （输出为 `[1, row_len, N]` 时为 true，默认 false）。
#[derive(Debug, Clone)]
struct OnnxDescriptor {
  channel_order: ChannelOrder,
  row_len: usize,
  transpose: bool,
}

impl OnnxDescriptor {
  fn parse(config: &[u8], num_classes: usize) -> Result<Self, ModelLoadError> {
    let value: serde_json::Value = serde_json::from_slice(config)
      .map_err(|err| ModelLoadError::InvalidConfig(format!("网络描述解析失败: {err}")))?;

    let channel_order = match value
      .get("channel_order")
      .and_then(serde_json::Value::as_str)
      .unwrap_or("rgb")
    {
      "rgb" => ChannelOrder::Rgb,
      "bgr" => ChannelOrder::Bgr,
      other => {
        return Err(ModelLoadError::InvalidConfig(format!(
          "未知通道顺序: {other}"
        )));
      }
    };

    let row_len = value
      .get("row_len")
      .and_then(serde_json::Value::as_u64)
      .map(|len| len as usize)
      .unwrap_or(PRED_FIELDS + num_classes);
    if row_len <= PRED_FIELDS {
      return Err(ModelLoadError::InvalidConfig(format!(
        "行长度 {row_len} 小于等于坐标字段数 {PRED_FIELDS}"
      )));
    }

    let transpose = value
      .get("transpose")
      .and_then(serde_json::Value::as_bool)
      .unwrap_or(false);

    Ok(OnnxDescriptor {
      channel_order,
      row_len,
      transpose,
    })
  }
}

/// 以 ONNX Runtime 为后端的检测网络。
/// 权重文件即 `.onnx` 图；配置文件为 JSON 描述。
pub struct OrtNetwork {
  session: Session,
  descriptor: OnnxDescriptor,
}

impl FromArtifacts for OrtNetwork {
  fn from_artifacts(artifacts: &ModelArtifacts) -> Result<Self, ModelLoadError> {
    let descriptor = OnnxDescriptor::parse(&artifacts.config, artifacts.classes.len())?;

    info!("创建 ONNX Runtime 推理会话");
    let session = Session::builder()
      .and_then(|builder| builder.with_optimization_level(GraphOptimizationLevel::Level3))
      .and_then(|builder| builder.commit_from_memory(&artifacts.weights))
      .map_err(|err| ModelLoadError::Backend(err.to_string()))?;

    Ok(OrtNetwork { session, descriptor })
  }
}

impl Network for OrtNetwork {
  type Error = OrtNetworkError;

  fn forward(&mut self, blob: &NetBlob) -> Result<Box<[Box<[f32]>]>, Self::Error> {
    let input = Array::from_shape_vec(
      (1, blob.channels(), blob.height(), blob.width()),
      blob.as_nchw().to_vec(),
    )
    .map_err(|err| OrtNetworkError::Input(err.to_string()))?;
    let tensor = Value::from_array(input)?;

    debug!("执行模型推理");
    let outputs = self.session.run(ort::inputs![tensor])?;
    // 取第一个输出张量，名称随导出工具变化
    let first_key = outputs.keys().next().ok_or(OrtNetworkError::NoOutput)?;
    let (_, data) = outputs[first_key].try_extract_tensor::<f32>()?;

    let row_len = self.descriptor.row_len;
    if data.is_empty() || data.len() % row_len != 0 {
      return Err(OrtNetworkError::OutputShape(data.len(), row_len));
    }

    let rows: Box<[Box<[f32]>]> = if self.descriptor.transpose {
      let count = data.len() / row_len;
      (0..count)
        .map(|i| {
          (0..row_len)
            .map(|field| data[field * count + i])
            .collect::<Box<[f32]>>()
        })
        .collect()
    } else {
      data
        .chunks_exact(row_len)
        .map(|chunk| chunk.to_vec().into_boxed_slice())
        .collect()
    };

    debug!("模型输出 {} 行预测", rows.len());
    Ok(rows)
  }

  fn channel_order(&self) -> ChannelOrder {
    self.descriptor.channel_order
  }
}
