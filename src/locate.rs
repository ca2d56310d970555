// 该文件是 Chepai （车牌识别） 项目的一部分。
// src/locate.rs - 车牌定位
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use std::path::Path;

use image::RgbImage;
use thiserror::Error;
use tracing::{debug, warn};

use crate::detect::{self, Candidate, NmsThresholds, PLATE_NMS, PixelBox};
use crate::model::{ClassTable, FromArtifacts, ModelArtifacts, ModelLoadError, NetBlob, Network};
use crate::skew;

/// 车牌裁剪的规范尺寸
pub const PLATE_W: u32 = 470;
pub const PLATE_H: u32 = 110;

/// 两个检测阶段共用的解码置信度阈值
pub const CONF_THRESHOLD: f32 = 0.3;

/// 抑制之后的候选选取策略。
/// 默认只取置信度最高的一个（召回换简单），
/// 多车牌场景可改用 TopK 或全量。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SelectionPolicy {
  #[default]
  Best,
  TopK(usize),
  AllAboveThreshold,
}

impl SelectionPolicy {
  fn limit(&self, survivors: usize) -> usize {
    match self {
      SelectionPolicy::Best => 1,
      SelectionPolicy::TopK(k) => *k,
      SelectionPolicy::AllAboveThreshold => survivors,
    }
  }
}

/// 一块候选车牌：从原图裁出、缩放到规范尺寸并已纠偏
#[derive(Debug, Clone)]
pub struct PlateRegion {
  pub image: RgbImage,
  /// 原图坐标下的检测框
  pub bbox: PixelBox,
  pub confidence: f32,
}

/// 单个候选框的处理失败。按候选记录并跳过，
/// 绝不中断整轮检测。
#[derive(Error, Debug)]
pub enum BoxProcessingError {
  #[error("候选框退化: {0}x{1}")]
  Degenerate(u32, u32),
}

/// 车牌定位阶段：持有自己的网络实例与类别表，
/// 不依赖任何全局状态。
pub struct PlateLocator<N> {
  net: N,
  classes: ClassTable,
  conf_threshold: f32,
  nms: NmsThresholds,
  policy: SelectionPolicy,
}

impl<N: Network> PlateLocator<N> {
  pub fn new(net: N, classes: ClassTable) -> Self {
    PlateLocator {
      net,
      classes,
      conf_threshold: CONF_THRESHOLD,
      nms: PLATE_NMS,
      policy: SelectionPolicy::default(),
    }
  }

  pub fn with_policy(mut self, policy: SelectionPolicy) -> Self {
    self.policy = policy;
    self
  }

  pub fn with_conf_threshold(mut self, threshold: f32) -> Self {
    self.conf_threshold = threshold;
    self
  }

  pub fn classes(&self) -> &ClassTable {
    &self.classes
  }

  /// 在整幅图像上定位车牌。
  ///
  /// 返回按置信度降序、经策略截取的车牌区域；
  /// 空结果表示未找到车牌，是合法终态而非错误。
  /// 单个候选框的裁剪失败只记录并跳过。
  pub fn locate(&mut self, image: &RgbImage) -> Result<Vec<PlateRegion>, N::Error> {
    let (width, height) = image.dimensions();
    let blob = NetBlob::from_image(image, self.net.channel_order());
    let rows = self.net.forward(&blob)?;

    let candidates = detect::decode_boxes(&rows, width, height, self.conf_threshold);
    let kept = detect::nms(&candidates, self.nms);
    debug!("车牌候选 {} 个，抑制后 {} 个", candidates.len(), kept.len());

    let limit = self.policy.limit(kept.len());
    let mut plates = Vec::new();
    for &index in &kept {
      if plates.len() >= limit {
        break;
      }
      let candidate = &candidates[index];
      debug!(
        "候选 {}: {} @ {:.3}",
        index,
        self.classes.label(candidate.class_id).unwrap_or("?"),
        candidate.confidence
      );
      match extract_region(image, candidate) {
        Ok(region) => plates.push(region),
        Err(err) => warn!("候选框 {} 处理失败，跳过: {}", index, err),
      }
    }
    Ok(plates)
  }
}

impl<N: FromArtifacts> PlateLocator<N> {
  /// 一次性加载模型制品并构造定位器。
  /// 任一制品缺失或损坏都以 `ModelLoadError` 上抛。
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

/// 裁出候选框、缩放到规范尺寸并纠偏。
/// 退化的候选框（零宽或零高）返回错误由调用方跳过。
fn extract_region(image: &RgbImage, candidate: &Candidate) -> Result<PlateRegion, BoxProcessingError> {
  let PixelBox { x, y, w, h } = candidate.bbox;
  if w == 0 || h == 0 {
    return Err(BoxProcessingError::Degenerate(w, h));
  }

  let crop = image::imageops::crop_imm(image, x, y, w, h).to_image();
  let resized = image::imageops::resize(&crop, PLATE_W, PLATE_H, image::imageops::FilterType::Triangle);
  let deskewed = skew::correct_skew(&resized);

  Ok(PlateRegion {
    image: deskewed,
    bbox: candidate.bbox,
    confidence: candidate.confidence,
  })
}

#[cfg(test)]
mod tests {
  use super::*;
  use image::Rgb;

  #[test]
  fn degenerate_boxes_are_rejected() {
    let image = RgbImage::from_pixel(64, 64, Rgb([0, 0, 0]));
    let candidate = Candidate {
      bbox: PixelBox { x: 10, y: 10, w: 0, h: 5 },
      confidence: 0.9,
      class_id: 0,
    };
    assert!(matches!(
      extract_region(&image, &candidate),
      Err(BoxProcessingError::Degenerate(0, 5))
    ));
  }

  #[test]
  fn extracted_region_has_canonical_size() {
    let image = RgbImage::from_pixel(640, 480, Rgb([30, 30, 30]));
    let candidate = Candidate {
      bbox: PixelBox { x: 100, y: 200, w: 160, h: 48 },
      confidence: 0.8,
      class_id: 0,
    };
    let region = extract_region(&image, &candidate).unwrap();
    assert_eq!(region.image.dimensions(), (PLATE_W, PLATE_H));
    assert_eq!(region.bbox, candidate.bbox);
  }
}
