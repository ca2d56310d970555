// 该文件是 Chepai （车牌识别） 项目的一部分。
// src/detect.rs - 候选框解码与非极大值抑制
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use tracing::debug;

use crate::model::PRED_FIELDS;

/// 像素坐标边界框，构造时已夹取到图像范围内
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelBox {
  pub x: u32,
  pub y: u32,
  pub w: u32,
  pub h: u32,
}

impl PixelBox {
  pub fn right(&self) -> u32 {
    self.x + self.w
  }

  pub fn bottom(&self) -> u32 {
    self.y + self.h
  }

  pub fn area(&self) -> u64 {
    self.w as u64 * self.h as u64
  }
}

/// 解码后的检测候选
#[derive(Debug, Clone)]
pub struct Candidate {
  pub bbox: PixelBox,
  pub confidence: f32,
  pub class_id: usize,
}

/// 抑制阈值对：低于 score 的候选直接剔除，
/// 与更高分候选的 IoU 超过 iou 的候选被抑制。
#[derive(Debug, Clone, Copy)]
pub struct NmsThresholds {
  pub score: f32,
  pub iou: f32,
}

/// 车牌检测阈值：宁可保留低置信度车牌，漏检代价最高
pub const PLATE_NMS: NmsThresholds = NmsThresholds { score: 0.1, iou: 0.1 };

/// 字符检测阈值：从严抑制，避免同一字符被重复读取
pub const CHAR_NMS: NmsThresholds = NmsThresholds { score: 0.5, iou: 0.4 };

/// 将网络输出的逐单元预测行解码为像素坐标候选框。
///
/// 每行为 `[cx, cy, w, h, obj, 类别分数...]`，坐标是图像尺寸的比例值。
/// 最佳类别即分数子向量的 argmax，其分数直接作为置信度（无 obj 门控），
/// 低于 `threshold` 的行被丢弃。框夹取方式为收缩宽高而非平移，
/// 保证 x,y ≥ 0 且 x+w ≤ width、y+h ≤ height。
pub fn decode_boxes(
  rows: &[Box<[f32]>],
  width: u32,
  height: u32,
  threshold: f32,
) -> Vec<Candidate> {
  let mut candidates = Vec::new();

  for row in rows {
    if row.len() <= PRED_FIELDS {
      continue;
    }
    let (class_id, confidence) = argmax(&row[PRED_FIELDS..]);
    if confidence <= threshold {
      continue;
    }

    let center_x = (row[0] * width as f32) as i64;
    let center_y = (row[1] * height as f32) as i64;
    let box_w = (row[2] * width as f32) as i64;
    let box_h = (row[3] * height as f32) as i64;

    candidates.push(Candidate {
      bbox: clamp_box(center_x, center_y, box_w, box_h, width, height),
      confidence,
      class_id,
    });
  }

  debug!("解码出 {} 个候选框", candidates.len());
  candidates
}

fn argmax(scores: &[f32]) -> (usize, f32) {
  let mut best = 0usize;
  let mut best_score = f32::MIN;
  for (class_id, &score) in scores.iter().enumerate() {
    if score > best_score {
      best = class_id;
      best_score = score;
    }
  }
  (best, best_score)
}

fn clamp_box(center_x: i64, center_y: i64, w: i64, h: i64, width: u32, height: u32) -> PixelBox {
  let width = width as i64;
  let height = height as i64;
  let w = w.clamp(0, width);
  let h = h.clamp(0, height);
  let x = (center_x - w / 2).min(width - w).max(0);
  let y = (center_y - h / 2).min(height - h).max(0);
  let w = w.min(width - x);
  let h = h.min(height - y);
  PixelBox {
    x: x as u32,
    y: y as u32,
    w: w as u32,
    h: h as u32,
  }
}

/// 贪心非极大值抑制。
///
/// 返回存活候选的索引序列，按置信度降序排列；
/// 调用方按序遍历即可，不需要集合成员判定。
pub fn nms(candidates: &[Candidate], thresholds: NmsThresholds) -> Vec<usize> {
  let mut order: Vec<usize> = (0..candidates.len())
    .filter(|&i| candidates[i].confidence >= thresholds.score)
    .collect();
  order.sort_by(|&a, &b| {
    candidates[b]
      .confidence
      .total_cmp(&candidates[a].confidence)
  });

  let mut keep = Vec::new();
  while let Some(best) = order.first().copied() {
    keep.push(best);
    order.retain(|&i| {
      i != best && iou(&candidates[best].bbox, &candidates[i].bbox) <= thresholds.iou
    });
  }

  debug!("抑制后剩余 {} / {} 个候选框", keep.len(), candidates.len());
  keep
}

/// 两个框的交并比
pub fn iou(a: &PixelBox, b: &PixelBox) -> f32 {
  let x1 = a.x.max(b.x);
  let y1 = a.y.max(b.y);
  let x2 = a.right().min(b.right());
  let y2 = a.bottom().min(b.bottom());

  let intersection = if x2 > x1 && y2 > y1 {
    ((x2 - x1) as u64 * (y2 - y1) as u64) as f32
  } else {
    0.0
  };
  let union = (a.area() + b.area()) as f32 - intersection;

  if union > 0.0 { intersection / union } else { 0.0 }
}
