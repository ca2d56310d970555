// 该文件是 Chepai （车牌识别） 项目的一部分。
// tests/pipeline.rs - 流水线集成测试
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use image::{Rgb, RgbImage};

use chepai::locate::{PLATE_H, PLATE_W, PlateLocator, SelectionPolicy};
use chepai::model::{ClassTable, NetBlob, Network};
use chepai::pipeline::{NO_PLATE_MESSAGE, Pipeline, Reading};
use chepai::read::PlateReader;

/// 返回固定预测行的桩网络，替代黑盒检测模型
struct StubNetwork {
  rows: Vec<Box<[f32]>>,
}

impl StubNetwork {
  fn empty() -> Self {
    StubNetwork { rows: Vec::new() }
  }

  fn with_rows(rows: Vec<Box<[f32]>>) -> Self {
    StubNetwork { rows }
  }
}

impl Network for StubNetwork {
  type Error = std::convert::Infallible;

  fn forward(&mut self, _blob: &NetBlob) -> Result<Box<[Box<[f32]>]>, Self::Error> {
    Ok(self.rows.clone().into_boxed_slice())
  }
}

/// 一行预测：比例坐标 + obj 占位 + 独热类别分数
fn row(cx: f32, cy: f32, w: f32, h: f32, class_id: usize, num_classes: usize, score: f32) -> Box<[f32]> {
  let mut data = vec![cx, cy, w, h, 0.0];
  let mut scores = vec![0.0; num_classes];
  scores[class_id] = score;
  data.extend_from_slice(&scores);
  data.into_boxed_slice()
}

fn plate_classes() -> ClassTable {
  ClassTable::from_names(vec!["plate".to_string()])
}

fn ocr_classes(names: &[&str]) -> ClassTable {
  ClassTable::from_names(names.iter().map(|name| name.to_string()).collect())
}

fn pipeline_with(
  detector_rows: Vec<Box<[f32]>>,
  ocr_rows: Vec<Box<[f32]>>,
  ocr_names: &[&str],
) -> Pipeline<StubNetwork, StubNetwork> {
  let locator = PlateLocator::new(StubNetwork::with_rows(detector_rows), plate_classes());
  let reader = PlateReader::new(StubNetwork::with_rows(ocr_rows), ocr_classes(ocr_names));
  Pipeline::new(locator, reader)
}

/// 覆盖图像中部的车牌候选
fn plate_row() -> Box<[f32]> {
  row(0.5, 0.5, 0.25, 0.1, 0, 1, 0.9)
}

/// 字符候选：规范车牌裁剪（470×110）上的比例坐标。
/// x 位置由 cx 与宽度推出，class 独热分数 0.9。
fn char_row(cx: f32, class_id: usize, num_classes: usize) -> Box<[f32]> {
  row(cx, 0.5, 0.08, 0.6, class_id, num_classes, 0.9)
}

#[test]
fn no_plate_is_a_terminal_outcome_not_an_error() {
  let mut pipeline = pipeline_with(Vec::new(), Vec::new(), &["1"]);
  let image = RgbImage::from_pixel(640, 480, Rgb([80, 80, 80]));
  let reading = pipeline.process(&image).unwrap();
  assert_eq!(reading, Reading::NoPlate);
}

#[test]
fn no_plate_path_reports_exact_sentinel_message() {
  let mut pipeline = pipeline_with(Vec::new(), Vec::new(), &["1"]);
  let path = std::env::temp_dir().join(format!("chepai-pipeline-test-{}.png", std::process::id()));
  RgbImage::from_pixel(64, 48, Rgb([10, 10, 10]))
    .save(&path)
    .unwrap();

  let message = pipeline.process_path(&path).unwrap();
  std::fs::remove_file(&path).ok();
  assert_eq!(
    message,
    "No plates detected, Try to change Camera angle or Lighting Conditions"
  );
  assert_eq!(message, NO_PLATE_MESSAGE);
}

#[test]
fn unreadable_image_path_is_an_error() {
  let mut pipeline = pipeline_with(Vec::new(), Vec::new(), &["1"]);
  let path = std::env::temp_dir().join("chepai-pipeline-missing.png");
  assert!(pipeline.process_path(&path).is_err());
}

#[test]
fn plate_without_characters_reads_as_empty_string() {
  let mut pipeline = pipeline_with(vec![plate_row()], Vec::new(), &["1"]);
  let image = RgbImage::from_pixel(640, 480, Rgb([120, 120, 120]));
  let reading = pipeline.process(&image).unwrap();
  assert_eq!(reading, Reading::Plate(String::new()));
}

#[test]
fn characters_are_assembled_left_to_right() {
  // 类别表 ["1", "2", "3", "A"]；“A” 在最左侧
  let names = ["1", "2", "3", "A"];
  let ocr_rows = vec![
    char_row(0.30, 0, names.len()),
    char_row(0.50, 1, names.len()),
    char_row(0.70, 2, names.len()),
    char_row(0.08, 3, names.len()),
  ];
  let mut pipeline = pipeline_with(vec![plate_row()], ocr_rows, &names);
  let image = RgbImage::from_pixel(640, 480, Rgb([120, 120, 120]));
  let reading = pipeline.process(&image).unwrap();
  assert_eq!(reading, Reading::Plate("A123".to_string()));
}

#[test]
fn ww_marker_triggers_pattern_repair() {
  // “1 2 w 3 w w” 从左到右拼为 "12w3ww"，修复为 "123 ww"
  let names = ["1", "2", "3", "w"];
  let ocr_rows = vec![
    char_row(0.10, 0, names.len()),
    char_row(0.25, 1, names.len()),
    char_row(0.40, 3, names.len()),
    char_row(0.55, 2, names.len()),
    char_row(0.70, 3, names.len()),
    char_row(0.85, 3, names.len()),
  ];
  let mut pipeline = pipeline_with(vec![plate_row()], ocr_rows, &names);
  let image = RgbImage::from_pixel(640, 480, Rgb([120, 120, 120]));
  let reading = pipeline.process(&image).unwrap();
  assert_eq!(reading, Reading::Plate("123 ww".to_string()));
}

#[test]
fn observation_exposes_canonical_plate_region() {
  let mut pipeline = pipeline_with(vec![plate_row()], Vec::new(), &["1"]);
  let image = RgbImage::from_pixel(640, 480, Rgb([90, 90, 90]));
  let observation = pipeline.process_observed(&image).unwrap();

  let plate = observation.plate.expect("应当找到车牌");
  assert_eq!(plate.image.dimensions(), (PLATE_W, PLATE_H));
  assert!((plate.confidence - 0.9).abs() < 1e-6);
  assert!(observation.characters.is_empty());
}

#[test]
fn top_k_policy_keeps_multiple_plates() {
  // 两块相距很远的车牌候选
  let detector_rows = vec![
    row(0.25, 0.25, 0.2, 0.1, 0, 1, 0.9),
    row(0.75, 0.75, 0.2, 0.1, 0, 1, 0.8),
  ];
  let mut locator = PlateLocator::new(StubNetwork::with_rows(detector_rows), plate_classes())
    .with_policy(SelectionPolicy::TopK(2));
  let image = RgbImage::from_pixel(640, 480, Rgb([70, 70, 70]));
  let plates = locator.locate(&image).unwrap();
  assert_eq!(plates.len(), 2);
  assert!(plates[0].confidence >= plates[1].confidence);
}

#[test]
fn best_policy_keeps_single_plate() {
  let detector_rows = vec![
    row(0.25, 0.25, 0.2, 0.1, 0, 1, 0.7),
    row(0.75, 0.75, 0.2, 0.1, 0, 1, 0.95),
  ];
  let mut locator = PlateLocator::new(StubNetwork::with_rows(detector_rows), plate_classes());
  let image = RgbImage::from_pixel(640, 480, Rgb([70, 70, 70]));
  let plates = locator.locate(&image).unwrap();
  assert_eq!(plates.len(), 1);
  assert!((plates[0].confidence - 0.95).abs() < 1e-6);
}

#[test]
fn empty_stub_network_never_panics() {
  let mut locator = PlateLocator::new(StubNetwork::empty(), plate_classes());
  let image = RgbImage::from_pixel(16, 16, Rgb([0, 0, 0]));
  assert!(locator.locate(&image).unwrap().is_empty());
}
