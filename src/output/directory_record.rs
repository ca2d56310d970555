// 该文件是 Chepai （车牌识别） 项目的一部分。
// src/output/directory_record.rs - 目录记录输出
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use std::io::Write;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use chrono::{Datelike, Utc};
use image::RgbImage;
use thiserror::Error;
use url::Url;

use crate::pipeline::{Observation, Reading};
use crate::{
  FromUrl, FromUrlWithScheme,
  output::{Render, draw::Draw},
};

#[derive(Error, Debug)]
pub enum DirectoryRecordOutputError {
  #[error("URI 方案不匹配")]
  SchemeMismatch,
  #[error("图像错误: {0}")]
  ImageError(#[from] image::ImageError),
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("记录序列化失败: {0}")]
  RecordError(#[from] serde_json::Error),
}

/// 按日期分层的记录目录：`folder:///data/plates?always`。
/// 每帧保存标注图，并在当日目录的 `readings.jsonl`
/// 追加一行识别记录。默认只记录找到车牌的帧，
/// 查询参数 `always` 连未命中的帧也落盘。
pub struct DirectoryRecordOutput {
  directory: PathBuf,
  draw: Draw,
  frame_counter: Arc<Mutex<u32>>,
  always: bool,
}

impl FromUrlWithScheme for DirectoryRecordOutput {
  const SCHEME: &'static str = "folder";
}

impl FromUrl for DirectoryRecordOutput {
  type Error = DirectoryRecordOutputError;

  fn from_url(uri: &Url) -> Result<Self, Self::Error> {
    if uri.scheme() != Self::SCHEME {
      return Err(DirectoryRecordOutputError::SchemeMismatch);
    }

    let always = uri.query_pairs().any(|(key, _)| key == "always");

    Ok(DirectoryRecordOutput {
      directory: PathBuf::from(uri.path()),
      draw: Draw::default(),
      frame_counter: Arc::new(Mutex::new(0)),
      always,
    })
  }
}

impl DirectoryRecordOutput {
  fn frame_id(&self) -> u32 {
    let mut counter = self.frame_counter.lock().unwrap_or_else(|err| err.into_inner());
    *counter += 1;
    *counter
  }

  fn day_directory(&self) -> Result<PathBuf, DirectoryRecordOutputError> {
    let now = Utc::now();
    let directory = self
      .directory
      .join(now.year().to_string())
      .join(format!("{:02}", now.month()))
      .join(format!("{:02}", now.day()));
    if !directory.exists() {
      std::fs::create_dir_all(&directory)?;
    }
    Ok(directory)
  }

  fn append_record(
    &self,
    directory: &PathBuf,
    frame_name: &str,
    result: &Observation,
  ) -> Result<(), DirectoryRecordOutputError> {
    let reading = match &result.reading {
      Reading::Plate(text) => serde_json::Value::String(text.clone()),
      Reading::NoPlate => serde_json::Value::Null,
    };
    let record = match &result.plate {
      Some(plate) => serde_json::json!({
        "time": Utc::now().to_rfc3339(),
        "frame": frame_name,
        "reading": reading,
        "confidence": plate.confidence,
        "bbox": [plate.bbox.x, plate.bbox.y, plate.bbox.w, plate.bbox.h],
        "characters": result.characters.len(),
      }),
      None => serde_json::json!({
        "time": Utc::now().to_rfc3339(),
        "frame": frame_name,
        "reading": reading,
      }),
    };

    let mut file = std::fs::OpenOptions::new()
      .create(true)
      .append(true)
      .open(directory.join("readings.jsonl"))?;
    writeln!(file, "{}", serde_json::to_string(&record)?)?;
    Ok(())
  }
}

impl Render<RgbImage, Observation> for DirectoryRecordOutput {
  type Error = DirectoryRecordOutputError;

  fn render_result(&self, frame: &RgbImage, result: &Observation) -> Result<(), Self::Error> {
    if !self.always && result.plate.is_none() {
      return Ok(());
    }

    let directory = self.day_directory()?;
    let frame_name = format!(
      "{}-{:04X}.png",
      Utc::now().format("%H-%M-%S"),
      self.frame_id()
    );

    let annotated = match &result.plate {
      Some(plate) => self.draw.annotate_plate(frame, &plate.bbox, plate.confidence),
      None => frame.clone(),
    };
    annotated.save(directory.join(&frame_name))?;

    if let Some(plate) = &result.plate {
      let segmented = self.draw.annotate_characters(&plate.image, &result.characters);
      segmented.save(directory.join(format!("{frame_name}.plate.png")))?;
    }

    self.append_record(&directory, &frame_name, result)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use image::Rgb;

  #[test]
  fn no_plate_frames_are_skipped_without_always() {
    let root = std::env::temp_dir().join(format!("chepai-record-test-{}", std::process::id()));
    let url = Url::parse(&format!("folder://{}", root.display())).unwrap();
    let output = DirectoryRecordOutput::from_url(&url).unwrap();

    let frame = RgbImage::from_pixel(16, 16, Rgb([0, 0, 0]));
    let observation = Observation {
      reading: Reading::NoPlate,
      plate: None,
      characters: Vec::new(),
    };
    output.render_result(&frame, &observation).unwrap();
    assert!(!root.exists());
    std::fs::remove_dir_all(&root).ok();
  }

  #[test]
  fn always_records_even_without_plate() {
    let root = std::env::temp_dir().join(format!("chepai-record-always-{}", std::process::id()));
    let url = Url::parse(&format!("folder://{}?always", root.display())).unwrap();
    let output = DirectoryRecordOutput::from_url(&url).unwrap();

    let frame = RgbImage::from_pixel(16, 16, Rgb([0, 0, 0]));
    let observation = Observation {
      reading: Reading::NoPlate,
      plate: None,
      characters: Vec::new(),
    };
    output.render_result(&frame, &observation).unwrap();
    assert!(root.exists());
    std::fs::remove_dir_all(&root).ok();
  }
}
