// 该文件是 Chepai （车牌识别） 项目的一部分。
// src/pipeline.rs - 检测到识别的流水线编排
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
use tracing::{debug, info};

use crate::assemble;
use crate::detect::Candidate;
use crate::locate::{PlateLocator, PlateRegion};
use crate::model::Network;
use crate::read::PlateReader;

/// 未找到车牌时对外报告的文案。
/// 命令行与界面协作方依赖这段原文，不可改动。
pub const NO_PLATE_MESSAGE: &str =
  "No plates detected, Try to change Camera angle or Lighting Conditions";

/// 一次流水线运行的终态
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reading {
  /// 识别出的车牌字符串；车牌内未检出字符时为空串
  Plate(String),
  /// 未找到车牌。合法终态，提示换一张图片
  NoPlate,
}

/// 一次运行的完整观测：识别终态，加上仅供显示的
/// 车牌区域与字符候选框（不影响返回结果）。
#[derive(Debug)]
pub struct Observation {
  pub reading: Reading,
  pub plate: Option<PlateRegion>,
  pub characters: Vec<Candidate>,
}

#[derive(Error, Debug)]
pub enum PipelineError {
  #[error("图像文件不可读: {0}")]
  ImageUnreadable(#[from] std::io::Error),
  #[error("图像解码失败: {0}")]
  ImageUndecodable(#[from] image::ImageError),
  #[error("车牌检测推理失败: {0}")]
  Detection(#[source] Box<dyn std::error::Error + Send + Sync>),
  #[error("字符检测推理失败: {0}")]
  Recognition(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// 定位 → 字符检测 → 组装 的同步流水线。
///
/// 每个阶段各持有自己的模型实例。`process` 以 `&mut self`
/// 进行：同一实例上的调用互斥，并发处理需每路单独构建流水线。
/// 没有取消或超时机制，要求有界时延的调用方应在外部设限，
/// 超时后放弃结果而不是打断推理。
pub struct Pipeline<D, R> {
  locator: PlateLocator<D>,
  reader: PlateReader<R>,
}

impl<D: Network, R: Network> Pipeline<D, R> {
  pub fn new(locator: PlateLocator<D>, reader: PlateReader<R>) -> Self {
    Pipeline { locator, reader }
  }

  /// 完整流水线入口。
  pub fn process(&mut self, image: &RgbImage) -> Result<Reading, PipelineError> {
    Ok(self.process_observed(image)?.reading)
  }

  /// 与 `process` 相同，另带可视化细节。
  pub fn process_observed(&mut self, image: &RgbImage) -> Result<Observation, PipelineError> {
    let plates = self
      .locator
      .locate(image)
      .map_err(|err| PipelineError::Detection(Box::new(err)))?;

    let Some(plate) = plates.into_iter().next() else {
      info!("未检测到车牌");
      return Ok(Observation {
        reading: Reading::NoPlate,
        plate: None,
        characters: Vec::new(),
      });
    };

    debug!("车牌置信度 {:.3}，开始字符识别", plate.confidence);
    let scan = self
      .reader
      .read(&plate)
      .map_err(|err| PipelineError::Recognition(Box::new(err)))?;

    let plate_string = assemble::assemble(scan.hits);
    info!("识别结果: {:?}", plate_string);

    Ok(Observation {
      reading: Reading::Plate(plate_string),
      plate: Some(plate),
      characters: scan.boxes,
    })
  }

  /// 文本入口：按路径读图并返回识别文案。
  /// 未找到车牌时返回 [`NO_PLATE_MESSAGE`] 原文。
  pub fn process_path(&mut self, path: &Path) -> Result<String, PipelineError> {
    let image = image::ImageReader::open(path)?.decode()?.into_rgb8();
    match self.process(&image)? {
      Reading::Plate(text) => Ok(text),
      Reading::NoPlate => Ok(NO_PLATE_MESSAGE.to_string()),
    }
  }
}
