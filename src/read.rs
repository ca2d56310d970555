// 该文件是 Chepai （车牌识别） 项目的一部分。
// src/read.rs - 车牌字符定位
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use std::path::Path;

use tracing::{debug, warn};

use crate::detect::{self, Candidate, CHAR_NMS, NmsThresholds};
use crate::locate::{CONF_THRESHOLD, PlateRegion};
use crate::model::{ClassTable, FromArtifacts, ModelArtifacts, ModelLoadError, NetBlob, Network};

/// 一次字符命中：符号标签与水平位置（框左沿）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CharacterHit {
  pub label: String,
  pub x: u32,
}

/// 一次字符扫描的结果。`hits` 供组装车牌字符串，
/// `boxes` 是存活候选框，仅供叠加显示。
#[derive(Debug, Clone, Default)]
pub struct CharacterScan {
  pub hits: Vec<CharacterHit>,
  pub boxes: Vec<Candidate>,
}

/// 字符定位阶段。与车牌定位共用推理形态，
/// 但作用在规范化车牌裁剪上，保留全部存活候选。
pub struct PlateReader<N> {
  net: N,
  classes: ClassTable,
  conf_threshold: f32,
  nms: NmsThresholds,
}

impl<N: Network> PlateReader<N> {
  pub fn new(net: N, classes: ClassTable) -> Self {
    PlateReader {
      net,
      classes,
      conf_threshold: CONF_THRESHOLD,
      nms: CHAR_NMS,
    }
  }

  pub fn with_conf_threshold(mut self, threshold: f32) -> Self {
    self.conf_threshold = threshold;
    self
  }

  pub fn classes(&self) -> &ClassTable {
    &self.classes
  }

  /// 在车牌裁剪上定位全部字符。
  /// 空结果表示未检出字符，是合法终态而非错误。
  pub fn read(&mut self, plate: &PlateRegion) -> Result<CharacterScan, N::Error> {
    let (width, height) = plate.image.dimensions();
    let blob = NetBlob::from_image(&plate.image, self.net.channel_order());
    let rows = self.net.forward(&blob)?;

    let candidates = detect::decode_boxes(&rows, width, height, self.conf_threshold);
    let kept = detect::nms(&candidates, self.nms);

    let mut hits = Vec::with_capacity(kept.len());
    let mut boxes = Vec::with_capacity(kept.len());
    for &index in &kept {
      let candidate = &candidates[index];
      match self.classes.label(candidate.class_id) {
        Some(label) => {
          hits.push(CharacterHit {
            label: label.to_string(),
            x: candidate.bbox.x,
          });
          boxes.push(candidate.clone());
        }
        None => warn!("类别索引 {} 超出类别表，跳过", candidate.class_id),
      }
    }

    debug!("检出 {} 个字符", hits.len());
    Ok(CharacterScan { hits, boxes })
  }
}

impl<N: FromArtifacts> PlateReader<N> {
  /// 一次性加载模型制品并构造字符读取器。
  pub fn from_artifact_paths(
    weights: &Path,
    config: &Path,
    names: &Path,
  ) -> Result<Self, ModelLoadError> {
    let artifacts = ModelArtifacts::load(weights, config, names)?;
    let net = N::from_artifacts(&artifacts)?;
    Ok(Self::new(net, artifacts.classes))
  }
}
