// 该文件是 Chepai （车牌识别） 项目的一部分。
// src/fallback.rs - 外部文字识别回退通道
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use std::process::Command;

use image::RgbImage;
use thiserror::Error;
use tracing::{debug, warn};

/// 识别白名单：大写拉丁字母与数字
pub const OCR_WHITELIST: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// 外部文字识别引擎的边界。
/// 任何内部失败都折算为空字符串，绝不把错误抛过这条边界。
pub trait TextRecognizer {
  fn recognize(&self, image: &RgbImage, lang: &str, psm: u32) -> String;
}

#[derive(Error, Debug)]
enum TesseractError {
  #[error("临时图像写入失败: {0}")]
  Image(#[from] image::ImageError),
  #[error("进程执行失败: {0}")]
  Io(#[from] std::io::Error),
  #[error("识别进程退出异常: {0}")]
  Failed(String),
}

/// 调用系统 `tesseract` 可执行文件的识别器
pub struct TesseractCommand {
  program: String,
}

impl Default for TesseractCommand {
  fn default() -> Self {
    TesseractCommand {
      program: "tesseract".to_string(),
    }
  }
}

impl TesseractCommand {
  pub fn with_program(program: impl Into<String>) -> Self {
    TesseractCommand {
      program: program.into(),
    }
  }

  fn try_recognize(
    &self,
    image: &RgbImage,
    lang: &str,
    psm: u32,
  ) -> Result<String, TesseractError> {
    let input = std::env::temp_dir().join(format!("chepai-ocr-{}.png", std::process::id()));
    image.save(&input)?;

    let output = Command::new(&self.program)
      .arg(&input)
      .arg("stdout")
      .arg("-l")
      .arg(lang)
      .arg("--psm")
      .arg(psm.to_string())
      .arg("-c")
      .arg(format!("tessedit_char_whitelist={OCR_WHITELIST}"))
      .output();
    let _ = std::fs::remove_file(&input);

    let output = output?;
    if !output.status.success() {
      let stderr = String::from_utf8_lossy(&output.stderr);
      return Err(TesseractError::Failed(stderr.trim().to_string()));
    }

    let text = String::from_utf8_lossy(&output.stdout).trim().to_string();
    debug!("回退识别结果: {:?}", text);
    Ok(text)
  }
}

impl TextRecognizer for TesseractCommand {
  fn recognize(&self, image: &RgbImage, lang: &str, psm: u32) -> String {
    match self.try_recognize(image, lang, psm) {
      Ok(text) => text,
      Err(err) => {
        warn!("回退识别失败，按空结果处理: {}", err);
        String::new()
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use image::Rgb;

  #[test]
  fn missing_program_is_absorbed_to_empty_string() {
    let recognizer = TesseractCommand::with_program("chepai-no-such-ocr-binary");
    let image = RgbImage::from_pixel(32, 16, Rgb([255, 255, 255]));
    assert_eq!(recognizer.recognize(&image, "eng", 7), "");
  }
}
