// 该文件是 Chepai （车牌识别） 项目的一部分。
// src/bin/simple_batchshot.rs - 目录批量识别
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::Parser;
use tracing::{info, warn};
use url::Url;

use chepai::{
  FromUrl,
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

  /// 待扫描的图像目录
  #[arg(long, value_name = "DIR")]
  pub input_dir: PathBuf,
  /// 记录输出，例如 folder:///data/records?always
  #[arg(long, value_name = "OUTPUT")]
  pub output: Url,
}

fn is_image_file(path: &Path) -> bool {
  let Some(ext) = path.extension().and_then(|ext| ext.to_str()) else {
    return false;
  };
  matches!(
    ext.to_lowercase().as_str(),
    "jpg" | "jpeg" | "png" | "bmp" | "gif" | "webp"
  )
}

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = Args::parse();

  info!("扫描目录: {}", args.input_dir.display());
  info!("记录输出: {}", args.output);

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
  let output = OutputWrapper::from_url(&args.output)?;

  let mut entries: Vec<PathBuf> = std::fs::read_dir(&args.input_dir)?
    .filter_map(|entry| entry.ok().map(|entry| entry.path()))
    .filter(|path| is_image_file(path))
    .collect();
  entries.sort();

  let mut processed = 0usize;
  let mut plates_found = 0usize;

  for path in &entries {
    let reader = match image::ImageReader::open(path) {
      Ok(reader) => reader,
      Err(err) => {
        warn!("图像打开失败，跳过 {}: {}", path.display(), err);
        continue;
      }
    };
    let frame = match reader.decode() {
      Ok(image) => image.into_rgb8(),
      Err(err) => {
        warn!("图像解码失败，跳过 {}: {}", path.display(), err);
        continue;
      }
    };

    let observation = pipeline.process_observed(&frame)?;
    match &observation.reading {
      Reading::Plate(text) => {
        plates_found += 1;
        println!("{}: {}", path.display(), text);
      }
      Reading::NoPlate => {
        println!("{}: {}", path.display(), NO_PLATE_MESSAGE);
      }
    }
    output.render_result(&frame, &observation)?;
    processed += 1;
  }

  println!();
  println!("处理完成!");
  println!("总图像数: {}", processed);
  println!("命中车牌: {}", plates_found);

  Ok(())
}
