// 该文件是 Chepai （车牌识别） 项目的一部分。
// src/skew.rs - 车牌裁剪倾斜校正
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use image::{GrayImage, Rgb, RgbImage};
use imageproc::edges::canny;
use imageproc::hough::{LineDetectionOptions, detect_lines};
use tracing::debug;

const CANNY_LOW: f32 = 50.0;
const CANNY_HIGH: f32 = 150.0;
const HOUGH_VOTE_THRESHOLD: u32 = 100;
const HOUGH_SUGGESTED_RADIUS: u32 = 8;

/// 超过该角度的直线视为噪声或竖直边，不参与倾斜估计
pub const ANGLE_LIMIT_DEG: f32 = 5.0;

/// 估计裁剪区域偏离水平的角度（度）。
///
/// 灰度化后做边缘检测，再用霍夫变换找直线；
/// 每条直线的角度参数换算为相对水平的度数，
/// 绝对值超过 `limit` 的丢弃，余下取中位数。
/// 没有可用直线时返回 0。
pub fn estimate_skew_angle(image: &RgbImage, limit: f32) -> f32 {
  let gray: GrayImage = image::imageops::grayscale(image);
  let edges = canny(&gray, CANNY_LOW, CANNY_HIGH);
  let lines = detect_lines(
    &edges,
    LineDetectionOptions {
      vote_threshold: HOUGH_VOTE_THRESHOLD,
      suppression_radius: HOUGH_SUGGESTED_RADIUS,
    },
  );

  let mut angles: Vec<f32> = lines
    .iter()
    .map(|line| line.angle_in_degrees as f32 - 90.0)
    .filter(|angle| angle.abs() <= limit)
    .collect();

  if angles.is_empty() {
    debug!("未检出可用直线，倾斜角按 0 处理");
    return 0.0;
  }

  angles.sort_by(f32::total_cmp);
  let mid = angles.len() / 2;
  let median = if angles.len() % 2 == 0 {
    (angles[mid - 1] + angles[mid]) / 2.0
  } else {
    angles[mid]
  };
  debug!("参与估计的直线 {} 条，倾斜角 {:.2}°", angles.len(), median);
  median
}

/// 估计倾斜角并旋转回正，尺寸不变
pub fn correct_skew(image: &RgbImage) -> RgbImage {
  let angle = estimate_skew_angle(image, ANGLE_LIMIT_DEG);
  rotate_about_center(image, angle)
}

/// 绕图像中心旋转 `angle_deg` 度（逆时针为正），
/// 双三次插值，越界采样复制边缘像素，输出尺寸与输入一致。
pub fn rotate_about_center(image: &RgbImage, angle_deg: f32) -> RgbImage {
  let (width, height) = image.dimensions();
  if angle_deg == 0.0 || width == 0 || height == 0 {
    return image.clone();
  }

  let center_x = (width / 2) as f32;
  let center_y = (height / 2) as f32;
  let (sin, cos) = angle_deg.to_radians().sin_cos();

  let mut rotated = RgbImage::new(width, height);
  for y in 0..height {
    for x in 0..width {
      // 逆映射：输出像素取旋转前坐标处的采样值
      let dx = x as f32 - center_x;
      let dy = y as f32 - center_y;
      let src_x = cos * dx - sin * dy + center_x;
      let src_y = sin * dx + cos * dy + center_y;
      rotated.put_pixel(x, y, sample_bicubic(image, src_x, src_y));
    }
  }
  rotated
}

// Catmull-Rom 核（a = -0.5）
fn cubic_kernel(t: f32) -> f32 {
  const A: f32 = -0.5;
  let t = t.abs();
  if t <= 1.0 {
    (A + 2.0) * t * t * t - (A + 3.0) * t * t + 1.0
  } else if t < 2.0 {
    A * t * t * t - 5.0 * A * t * t + 8.0 * A * t - 4.0 * A
  } else {
    0.0
  }
}

fn sample_bicubic(image: &RgbImage, src_x: f32, src_y: f32) -> Rgb<u8> {
  let (width, height) = image.dimensions();
  let x0 = src_x.floor() as i64;
  let y0 = src_y.floor() as i64;
  let frac_x = src_x - x0 as f32;
  let frac_y = src_y - y0 as f32;

  let mut acc = [0f32; 3];
  let mut weight_sum = 0f32;
  for j in -1..=2i64 {
    let wy = cubic_kernel(frac_y - j as f32);
    if wy == 0.0 {
      continue;
    }
    let py = (y0 + j).clamp(0, height as i64 - 1) as u32;
    for i in -1..=2i64 {
      let wx = cubic_kernel(frac_x - i as f32);
      if wx == 0.0 {
        continue;
      }
      let px = (x0 + i).clamp(0, width as i64 - 1) as u32;
      let pixel = image.get_pixel(px, py);
      let weight = wx * wy;
      acc[0] += pixel[0] as f32 * weight;
      acc[1] += pixel[1] as f32 * weight;
      acc[2] += pixel[2] as f32 * weight;
      weight_sum += weight;
    }
  }

  if weight_sum == 0.0 {
    return Rgb([0, 0, 0]);
  }
  let to_u8 = |value: f32| (value / weight_sum).round().clamp(0.0, 255.0) as u8;
  Rgb([to_u8(acc[0]), to_u8(acc[1]), to_u8(acc[2])])
}

#[cfg(test)]
mod tests {
  use super::*;
  use image::Rgb;

  #[test]
  fn flat_image_has_no_skew() {
    let image = RgbImage::from_pixel(470, 110, Rgb([128, 128, 128]));
    assert_eq!(estimate_skew_angle(&image, ANGLE_LIMIT_DEG), 0.0);
  }

  #[test]
  fn horizontal_stripe_estimates_near_zero() {
    let mut image = RgbImage::from_pixel(470, 110, Rgb([0, 0, 0]));
    for x in 0..470 {
      for y in 40..70 {
        image.put_pixel(x, y, Rgb([255, 255, 255]));
      }
    }
    let angle = estimate_skew_angle(&image, ANGLE_LIMIT_DEG);
    assert!(angle.abs() <= 1.0, "水平条纹估计出 {angle}°");
  }

  #[test]
  fn zero_rotation_is_identity() {
    let mut image = RgbImage::from_pixel(40, 20, Rgb([10, 20, 30]));
    image.put_pixel(5, 5, Rgb([200, 100, 50]));
    assert_eq!(rotate_about_center(&image, 0.0), image);
  }

  #[test]
  fn rotation_preserves_dimensions() {
    let image = RgbImage::from_pixel(470, 110, Rgb([50, 60, 70]));
    let rotated = rotate_about_center(&image, 3.5);
    assert_eq!(rotated.dimensions(), (470, 110));
  }

  #[test]
  fn rotating_uniform_image_replicates_edges() {
    // 纯色图像旋转后仍是纯色：越界采样复制边缘而非填充背景色
    let image = RgbImage::from_pixel(64, 32, Rgb([90, 120, 150]));
    let rotated = rotate_about_center(&image, 4.0);
    for pixel in rotated.pixels() {
      assert_eq!(pixel, &Rgb([90, 120, 150]));
    }
  }

  #[test]
  fn correct_skew_keeps_canonical_size() {
    let image = RgbImage::from_pixel(470, 110, Rgb([200, 200, 200]));
    assert_eq!(correct_skew(&image).dimensions(), (470, 110));
  }
}
