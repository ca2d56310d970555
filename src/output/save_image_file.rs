// 该文件是 Chepai （车牌识别） 项目的一部分。
// src/output/save_image_file.rs - 保存标注图像文件
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

use std::path::Path;

use image::RgbImage;
use thiserror::Error;
use tracing::warn;
use url::Url;

use crate::pipeline::Observation;
use crate::{
  FromUrl, FromUrlWithScheme,
  output::{Render, draw::Draw, draw::DrawError},
};

/// 将标注后的输入图保存到 `image:///path/out.png`。
/// 找到车牌时，纠偏后的车牌裁剪连同字符框另存为
/// `out.plate.png`。查询参数 `font=/path/to.ttf`
/// 启用置信度文本渲染。
pub struct SaveImageFileOutput {
  path: String,
  draw: Draw,
}

#[derive(Error, Debug)]
pub enum SaveImageFileError {
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("图像错误: {0}")]
  ImageError(#[from] image::ImageError),
  #[error("绘制错误: {0}")]
  DrawError(#[from] DrawError),
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
}

impl FromUrlWithScheme for SaveImageFileOutput {
  const SCHEME: &'static str = "image";
}

impl FromUrl for SaveImageFileOutput {
  type Error = SaveImageFileError;

  fn from_url(uri: &Url) -> Result<Self, Self::Error> {
    if uri.scheme() != Self::SCHEME {
      return Err(SaveImageFileError::SchemeMismatch(format!(
        "期望保存方式 '{}', 实际保存方式 '{}'",
        Self::SCHEME,
        uri.scheme()
      )));
    }

    let mut draw = Draw::default();
    for (key, value) in uri.query_pairs() {
      if key == "font" {
        draw = draw.with_font_file(Path::new(value.as_ref()))?;
      }
    }

    Ok(SaveImageFileOutput {
      path: uri.path().to_string(),
      draw,
    })
  }
}

impl SaveImageFileOutput {
  fn save_image(&self, image: &RgbImage, path: &Path) -> Result<(), SaveImageFileError> {
    if let Some(parent) = path.parent()
      && !parent.as_os_str().is_empty()
    {
      std::fs::create_dir_all(parent)?;
    }

    image.save(path)?;
    warn!("保存图像到文件: {}", path.display());
    Ok(())
  }
}

impl Render<RgbImage, Observation> for SaveImageFileOutput {
  type Error = SaveImageFileError;

  fn render_result(&self, frame: &RgbImage, result: &Observation) -> Result<(), Self::Error> {
    let path = Path::new(&self.path);

    match &result.plate {
      Some(plate) => {
        let annotated = self.draw.annotate_plate(frame, &plate.bbox, plate.confidence);
        self.save_image(&annotated, path)?;

        let segmented = self.draw.annotate_characters(&plate.image, &result.characters);
        self.save_image(&segmented, &path.with_extension("plate.png"))?;
      }
      None => {
        self.save_image(frame, path)?;
      }
    }
    Ok(())
  }
}
