// 该文件是 Chepai （车牌识别） 项目的一部分。
// src/output/draw.rs - 检测结果可视化
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use std::path::Path;

use ab_glyph::{FontVec, PxScale};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_hollow_rect_mut, draw_text_mut};
use imageproc::rect::Rect;
use thiserror::Error;

use crate::detect::{Candidate, PixelBox};

// 车牌框用绿色，字符框按序取固定调色板
const PLATE_COLOR: [u8; 3] = [0, 255, 0];
const PLATE_BORDER: i32 = 3;
const CHAR_BORDER: i32 = 2;
const CHAR_COLORS: [[u8; 3]; 6] = [
  [255, 64, 64],
  [64, 200, 64],
  [64, 96, 255],
  [230, 200, 0],
  [200, 64, 230],
  [0, 200, 200],
];

const LABEL_FONT_SIZE: f32 = 20.0;

#[derive(Error, Debug)]
pub enum DrawError {
  #[error("字体文件读取失败: {0}")]
  Io(#[from] std::io::Error),
  #[error("字体文件无效")]
  InvalidFont,
}

/// 叠加绘制器。本仓库不内嵌字体文件，
/// 只有提供了字体时才渲染置信度文本，框线不受影响。
pub struct Draw {
  font: Option<FontVec>,
  font_size: f32,
}

impl Default for Draw {
  fn default() -> Self {
    Draw {
      font: None,
      font_size: LABEL_FONT_SIZE,
    }
  }
}

impl Draw {
  pub fn with_font_file(mut self, path: &Path) -> Result<Self, DrawError> {
    let data = std::fs::read(path)?;
    let font = FontVec::try_from_vec(data).map_err(|_| DrawError::InvalidFont)?;
    self.font = Some(font);
    Ok(self)
  }

  /// 在输入副本上绘制车牌框与置信度（百分比）标注。
  /// 仅用于显示，不影响流水线返回的区域。
  pub fn annotate_plate(&self, image: &RgbImage, bbox: &PixelBox, confidence: f32) -> RgbImage {
    let mut copy = image.clone();
    draw_thick_rect(&mut copy, bbox, Rgb(PLATE_COLOR), PLATE_BORDER);

    if let Some(font) = &self.font {
      let label = format!("{:.1}%", confidence * 100.0);
      let x = bbox.x as i32 + 20;
      let y = (bbox.y as i32 - 20).max(0);
      draw_text_mut(
        &mut copy,
        Rgb(PLATE_COLOR),
        x,
        y,
        PxScale::from(self.font_size),
        font,
        &label,
      );
    }
    copy
  }

  /// 在车牌裁剪副本上绘制字符候选框，逐框轮换调色板颜色。
  pub fn annotate_characters(&self, plate: &RgbImage, boxes: &[Candidate]) -> RgbImage {
    let mut copy = plate.clone();
    for (index, candidate) in boxes.iter().enumerate() {
      let color = Rgb(CHAR_COLORS[index % CHAR_COLORS.len()]);
      draw_thick_rect(&mut copy, &candidate.bbox, color, CHAR_BORDER);

      if let Some(font) = &self.font {
        let label = format!("{:.2}", candidate.confidence);
        let x = candidate.bbox.x as i32;
        let y = (candidate.bbox.y as i32 - 6).max(0);
        draw_text_mut(&mut copy, color, x, y, PxScale::from(self.font_size), font, &label);
      }
    }
    copy
  }
}

fn draw_thick_rect(image: &mut RgbImage, bbox: &PixelBox, color: Rgb<u8>, border: i32) {
  if bbox.w == 0 || bbox.h == 0 {
    return;
  }
  for inset in 0..border {
    let w = bbox.w as i32 - 2 * inset;
    let h = bbox.h as i32 - 2 * inset;
    if w <= 0 || h <= 0 {
      break;
    }
    let rect = Rect::at(bbox.x as i32 + inset, bbox.y as i32 + inset).of_size(w as u32, h as u32);
    draw_hollow_rect_mut(image, rect, color);
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn plate_overlay_leaves_input_untouched() {
    let image = RgbImage::from_pixel(64, 32, Rgb([0, 0, 0]));
    let bbox = PixelBox { x: 8, y: 8, w: 32, h: 16 };
    let annotated = Draw::default().annotate_plate(&image, &bbox, 0.87);

    assert_eq!(image, RgbImage::from_pixel(64, 32, Rgb([0, 0, 0])));
    assert_eq!(annotated.get_pixel(8, 8), &Rgb(PLATE_COLOR));
  }

  #[test]
  fn degenerate_character_boxes_are_ignored() {
    let plate = RgbImage::from_pixel(47, 11, Rgb([10, 10, 10]));
    let boxes = vec![Candidate {
      bbox: PixelBox { x: 5, y: 5, w: 0, h: 0 },
      confidence: 0.5,
      class_id: 0,
    }];
    let annotated = Draw::default().annotate_characters(&plate, &boxes);
    assert_eq!(annotated, plate);
  }
}
