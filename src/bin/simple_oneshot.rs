// 该文件是 Chepai （车牌识别） 项目的一部分。
// src/bin/simple_oneshot.rs - 单张图像识别
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing::info;
use url::Url;

use chepai::{
  FromUrl,
  input::InputWrapper,
  locate::PlateLocator,
  model::OrtNetwork,
  output::{OutputWrapper, Render},
  pipeline::{NO_PLATE_MESSAGE, Pipeline, Reading},
  read::PlateReader,
};

/// Chepai 项目参数配置
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 车牌检测模型权重（.onnx）
  #[arg(long, value_name = "FILE")]
  pub detect_weights: PathBuf,
  /// 车牌检测网络描述（.json）
  #[arg(long, value_name = "FILE")]
  pub detect_config: PathBuf,
  /// 车牌检测类别表（.names）
  #[arg(long, value_name = "FILE")]
  pub detect_names: PathBuf,

  /// 字符识别模型权重（.onnx）
  #[arg(long, value_name = "FILE")]
  pub ocr_weights: PathBuf,
  /// 字符识别网络描述（.json）
  #[arg(long, value_name = "FILE")]
  pub ocr_config: PathBuf,
  /// 字符识别类别表（.names）
  #[arg(long, value_name = "FILE")]
  pub ocr_names: PathBuf,

  /// 输入来源，例如 image:///data/car.jpg
  #[arg(long, value_name = "SOURCE")]
  pub input: Url,
  /// 输出路径，例如 image:///data/car-annotated.png
  #[arg(long, value_name = "OUTPUT")]
  pub output: Url,
}

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = Args::parse();

  info!("检测模型: {}", args.detect_weights.display());
  info!("识别模型: {}", args.ocr_weights.display());
  info!("输入来源: {}", args.input);
  info!("输出路径: {}", args.output);

  let locator = PlateLocator::<OrtNetwork>::from_artifact_paths(
    &args.detect_weights,
    &args.detect_config,
    &args.detect_names,
  )?;
  let reader = PlateReader::<OrtNetwork>::from_artifact_paths(
    &args.ocr_weights,
    &args.ocr_config,
    &args.ocr_names,
  )?;
  let mut pipeline = Pipeline::new(locator, reader);

  let input = InputWrapper::from_url(&args.input)?;
  let output = OutputWrapper::from_url(&args.output)?;

  for frame in input {
    let now = std::time::Instant::now();
    let observation = pipeline.process_observed(&frame)?;
    info!("流水线完成，耗时: {:.2?}", now.elapsed());

    match &observation.reading {
      Reading::Plate(text) => println!("{text}"),
      Reading::NoPlate => println!("{NO_PLATE_MESSAGE}"),
    }
    output.render_result(&frame, &observation)?;
  }

  Ok(())
}
