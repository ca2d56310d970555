// 该文件是 Chepai （车牌识别） 项目的一部分。
// src/assemble.rs - 车牌字符串组装
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use crate::read::CharacterHit;

/// 阿拉伯字母到拉丁转写的查找表。
/// 历史上编码方向相反（向车牌文本注入阿拉伯字形），
/// 这里统一规范化为拉丁符号输出。
const ARABIC_TO_LATIN: [(&str, &str); 7] = [
  ("أ", "A"),
  ("ب", "B"),
  ("ج", "J"),
  ("د", "D"),
  ("ه", "H"),
  ("و", "W"),
  ("ي", "Y"),
];

/// 查表转写单个符号，表外符号原样通过。
/// 映射结果都是不动点，重复应用等价于应用一次。
pub fn map_symbol(label: &str) -> &str {
  for (arabic, latin) in ARABIC_TO_LATIN {
    if label == arabic {
      return latin;
    }
  }
  label
}

/// 将无序的字符命中组装为车牌字符串：
/// 按 x 升序（严格从左到右，不支持多行车牌）排序、
/// 逐个转写、拼接，最后做 ww 版式修复。
pub fn assemble(mut hits: Vec<CharacterHit>) -> String {
  hits.sort_by_key(|hit| hit.x);

  let mut plate = String::new();
  for hit in &hits {
    plate.push_str(map_symbol(&hit.label));
  }

  repair_ww(&plate)
}

/// “数字 + ww” 版式修复。
///
/// 字符串含 'w' 时视为双 W 车牌标记：取第一个 "ww" 之前的
/// 子串（没有 "ww" 时为整串），剔除所有非数字字符，
/// 重组为 `"<数字> ww"`。不含 'w' 时原样返回。
/// 这是针对一种已知版式的窄修复，不是通用 OCR 纠错。
pub fn repair_ww(plate: &str) -> String {
  if !plate.contains('w') {
    return plate.to_string();
  }

  let number_part = plate.split("ww").next().unwrap_or(plate);
  let digits: String = number_part.chars().filter(char::is_ascii_digit).collect();
  format!("{digits} ww")
}

#[cfg(test)]
mod tests {
  use super::*;

  fn hit(label: &str, x: u32) -> CharacterHit {
    CharacterHit {
      label: label.to_string(),
      x,
    }
  }

  #[test]
  fn characters_are_ordered_left_to_right() {
    let hits = vec![hit("1", 10), hit("2", 20), hit("3", 30), hit("A", 0)];
    assert_eq!(assemble(hits), "A123");
  }

  #[test]
  fn arabic_labels_are_transliterated() {
    let hits = vec![hit("أ", 0), hit("ب", 10), hit("7", 20)];
    assert_eq!(assemble(hits), "AB7");
  }

  #[test]
  fn mapping_is_idempotent() {
    for (arabic, latin) in ARABIC_TO_LATIN {
      let once = map_symbol(arabic);
      assert_eq!(once, latin);
      assert_eq!(map_symbol(once), once);
    }
    assert_eq!(map_symbol("Z"), "Z");
  }

  #[test]
  fn ww_pattern_keeps_digits_before_marker() {
    assert_eq!(repair_ww("12w3wwB"), "123 ww");
  }

  #[test]
  fn lone_w_still_triggers_repair() {
    // 与参考实现一致：有 'w' 但没有 "ww" 时取整串的数字部分
    assert_eq!(repair_ww("4w56"), "456 ww");
  }

  #[test]
  fn strings_without_w_pass_through() {
    assert_eq!(repair_ww("AB123"), "AB123");
    assert_eq!(repair_ww(""), "");
  }

  #[test]
  fn empty_hits_assemble_to_empty_string() {
    assert_eq!(assemble(Vec::new()), "");
  }
}
