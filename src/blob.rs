// 该文件是 Chepai （车牌识别） 项目的一部分。
// src/blob.rs - 网络输入张量
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

use image::RgbImage;

const BLOB_CHANNELS: usize = 3;

/// 像素归一化系数（1/255）
pub const BLOB_SCALE: f32 = 1.0 / 255.0;

/// 网络训练时使用的通道顺序。解码得到的图像为 RGB，
/// 网络要求 BGR 时构造 blob 会交换 R/B 两个通道。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChannelOrder {
  #[default]
  Rgb,
  Bgr,
}

/// 固定尺寸的归一化 NCHW f32 输入张量
#[derive(Debug, Clone)]
pub struct Blob<const W: u32, const H: u32> {
  data: Box<[f32]>,
}

impl<const W: u32, const H: u32> Blob<W, H> {
  /// 由 RGB 图像构造 blob：缩放到 W×H，按 1/255 归一化，
  /// 通道顺序匹配网络训练。
  pub fn from_image(image: &RgbImage, order: ChannelOrder) -> Self {
    let resized = if image.dimensions() == (W, H) {
      image.clone()
    } else {
      image::imageops::resize(image, W, H, image::imageops::FilterType::Triangle)
    };

    let width = W as usize;
    let plane = width * H as usize;
    let mut data = vec![0f32; BLOB_CHANNELS * plane].into_boxed_slice();

    for (x, y, pixel) in resized.enumerate_pixels() {
      let idx = y as usize * width + x as usize;
      let [r, g, b] = pixel.0;
      let (first, last) = match order {
        ChannelOrder::Rgb => (r, b),
        ChannelOrder::Bgr => (b, r),
      };
      data[idx] = first as f32 * BLOB_SCALE;
      data[plane + idx] = g as f32 * BLOB_SCALE;
      data[2 * plane + idx] = last as f32 * BLOB_SCALE;
    }

    Blob { data }
  }

  pub fn width(&self) -> usize {
    W as usize
  }

  pub fn height(&self) -> usize {
    H as usize
  }

  pub fn channels(&self) -> usize {
    BLOB_CHANNELS
  }

  pub fn as_nchw(&self) -> &[f32] {
    &self.data
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use image::Rgb;

  fn solid(width: u32, height: u32, color: [u8; 3]) -> RgbImage {
    RgbImage::from_pixel(width, height, Rgb(color))
  }

  #[test]
  fn blob_has_expected_shape() {
    let blob = Blob::<320, 320>::from_image(&solid(640, 480, [0, 0, 0]), ChannelOrder::Rgb);
    assert_eq!(blob.as_nchw().len(), 3 * 320 * 320);
    assert_eq!(blob.width(), 320);
    assert_eq!(blob.height(), 320);
  }

  #[test]
  fn blob_scales_pixels_to_unit_range() {
    let blob = Blob::<8, 8>::from_image(&solid(8, 8, [255, 0, 51]), ChannelOrder::Rgb);
    let plane = 8 * 8;
    assert!((blob.as_nchw()[0] - 1.0).abs() < 1e-6);
    assert!(blob.as_nchw()[plane].abs() < 1e-6);
    assert!((blob.as_nchw()[2 * plane] - 0.2).abs() < 1e-6);
  }

  #[test]
  fn bgr_order_swaps_first_and_last_plane() {
    let rgb = Blob::<4, 4>::from_image(&solid(4, 4, [255, 0, 0]), ChannelOrder::Rgb);
    let bgr = Blob::<4, 4>::from_image(&solid(4, 4, [255, 0, 0]), ChannelOrder::Bgr);
    let plane = 4 * 4;
    assert!((rgb.as_nchw()[0] - 1.0).abs() < 1e-6);
    assert!(bgr.as_nchw()[0].abs() < 1e-6);
    assert!((bgr.as_nchw()[2 * plane] - 1.0).abs() < 1e-6);
  }
}
