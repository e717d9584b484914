// 该文件是 DermScan 项目的一部分。
// src/normalize.rs - 检测器原始输出归一化
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

//! 检测器输出的字段布局不固定：可能是 `boxes.{xyxy,conf,cls}` 结构，
//! 也可能把 `xyxy/conf/cls` 直接平铺在结果上。按顺序尝试各个适配器，
//! 全部失败时视为没有检测结果。
//!
//! 每个适配器整体成功或整体失败，任意一行格式错误都会让该适配器放弃。

use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use crate::model::{Detection, DetectionSet, RawResult};

const BOX_COORDS: usize = 4;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExtractionError {
  #[error("缺少字段: {0}")]
  MissingField(String),
  #[error("字段 {field} 类型不匹配: 期望 {expected}")]
  TypeMismatch {
    field: String,
    expected: &'static str,
  },
  #[error("字段 {field} 第 {index} 行无效: 期望 {expected}")]
  InvalidRow {
    field: String,
    index: usize,
    expected: &'static str,
  },
}

/// 从原始输出中提取检测集合的一种策略
pub trait RawDetectionSource {
  fn name(&self) -> &'static str;
  fn extract(&self, raw: &RawResult) -> Result<DetectionSet, ExtractionError>;
}

/// `boxes` 容器下的 `xyxy` / `conf` / `cls`
pub struct StructuredAdapter;

impl RawDetectionSource for StructuredAdapter {
  fn name(&self) -> &'static str {
    "boxes"
  }

  fn extract(&self, raw: &RawResult) -> Result<DetectionSet, ExtractionError> {
    let boxes = raw
      .as_value()
      .get("boxes")
      .ok_or_else(|| ExtractionError::MissingField("boxes".to_string()))?;
    if !boxes.is_object() {
      return Err(ExtractionError::TypeMismatch {
        field: "boxes".to_string(),
        expected: "object",
      });
    }
    extract_columns(boxes, "boxes.")
  }
}

/// 直接挂在结果上的 `xyxy` / `conf` / `cls`
pub struct FlatAdapter;

impl RawDetectionSource for FlatAdapter {
  fn name(&self) -> &'static str {
    "flat"
  }

  fn extract(&self, raw: &RawResult) -> Result<DetectionSet, ExtractionError> {
    extract_columns(raw.as_value(), "")
  }
}

fn column<'a>(
  container: &'a Value,
  prefix: &str,
  key: &str,
) -> Result<&'a Vec<Value>, ExtractionError> {
  let field = format!("{}{}", prefix, key);
  match container.get(key) {
    None => Err(ExtractionError::MissingField(field)),
    Some(Value::Array(values)) => Ok(values),
    Some(_) => Err(ExtractionError::TypeMismatch {
      field,
      expected: "array",
    }),
  }
}

fn finite(value: &Value) -> Option<f64> {
  value.as_f64().filter(|v| v.is_finite())
}

/// 超出 f32 范围的数值视为无效
fn finite_f32(value: &Value) -> Option<f32> {
  finite(value).map(|v| v as f32).filter(|v| v.is_finite())
}

fn to_bbox(row: &Value) -> Option<[f32; 4]> {
  let coords = row.as_array()?;
  if coords.len() != BOX_COORDS {
    return None;
  }

  let mut bbox = [0f32; BOX_COORDS];
  for (slot, coord) in bbox.iter_mut().zip(coords) {
    *slot = finite_f32(coord)?;
  }
  Some(bbox)
}

fn to_confidence(value: &Value) -> Option<f32> {
  finite_f32(value)
}

/// 类别编号向零截断，负数视为无效
fn to_class_id(value: &Value) -> Option<u32> {
  let v = finite(value)?.trunc();
  if v < 0.0 || v > u32::MAX as f64 {
    return None;
  }
  Some(v as u32)
}

fn convert_rows<T>(
  values: &[Value],
  field: String,
  expected: &'static str,
  convert: impl Fn(&Value) -> Option<T>,
) -> Result<Vec<T>, ExtractionError> {
  values
    .iter()
    .enumerate()
    .map(|(index, value)| {
      convert(value).ok_or_else(|| ExtractionError::InvalidRow {
        field: field.clone(),
        index,
        expected,
      })
    })
    .collect()
}

fn extract_columns(container: &Value, prefix: &str) -> Result<DetectionSet, ExtractionError> {
  let xyxy = column(container, prefix, "xyxy")?;
  let conf = column(container, prefix, "conf")?;
  let cls = column(container, prefix, "cls")?;

  let boxes = convert_rows(xyxy, format!("{}xyxy", prefix), "4 个数值", to_bbox)?;
  let scores = convert_rows(conf, format!("{}conf", prefix), "数值", to_confidence)?;
  let classes = convert_rows(cls, format!("{}cls", prefix), "非负数值", to_class_id)?;

  if boxes.len() != scores.len() || boxes.len() != classes.len() {
    warn!(
      "检测列长度不一致: xyxy={}, conf={}, cls={}，按最短列截断",
      boxes.len(),
      scores.len(),
      classes.len()
    );
  }

  Ok(
    boxes
      .into_iter()
      .zip(scores)
      .zip(classes)
      .map(|((bbox, score), class_id)| Detection::new(bbox, score, class_id))
      .collect(),
  )
}

/// 按顺序尝试各适配器，把原始输出转为检测集合
pub struct ResultNormalizer {
  sources: Vec<Box<dyn RawDetectionSource>>,
}

impl Default for ResultNormalizer {
  fn default() -> Self {
    Self {
      sources: vec![Box::new(StructuredAdapter), Box::new(FlatAdapter)],
    }
  }
}

impl ResultNormalizer {
  pub fn with_sources(sources: Vec<Box<dyn RawDetectionSource>>) -> Self {
    Self { sources }
  }

  /// 不会失败：无法识别的输出按空集合处理
  pub fn normalize(&self, raw: Option<&RawResult>) -> DetectionSet {
    let Some(raw) = raw else {
      warn!("检测器没有返回结果，按无检测处理");
      return DetectionSet::empty();
    };

    for source in &self.sources {
      match source.extract(raw) {
        Ok(set) => {
          debug!("使用 {} 布局提取到 {} 个检测", source.name(), set.len());
          return set;
        }
        Err(e) => debug!("{} 布局提取失败: {}", source.name(), e),
      }
    }

    warn!("无法识别检测器输出结构，按无检测处理");
    DetectionSet::empty()
  }
}

pub fn normalize(raw: Option<&RawResult>) -> DetectionSet {
  ResultNormalizer::default().normalize(raw)
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  fn raw(value: Value) -> RawResult {
    RawResult::new(value)
  }

  #[test]
  fn structured_boxes_are_extracted() {
    let raw = raw(json!({
      "boxes": {
        "xyxy": [[10.5, 20.0, 110.0, 220.25], [0, 0, 5, 5]],
        "conf": [0.91, 0.4],
        "cls": [0.0, 2.0]
      }
    }));
    let set = normalize(Some(&raw));
    assert_eq!(set.len(), 2);
    let first = &set.as_slice()[0];
    assert_eq!(first.bbox(), &[10.5, 20.0, 110.0, 220.25]);
    assert_eq!(first.confidence(), 0.91);
    assert_eq!(first.class_id(), 0);
    let second = &set.as_slice()[1];
    assert_eq!(second.bbox(), &[0.0, 0.0, 5.0, 5.0]);
    assert_eq!(second.class_id(), 2);
  }

  #[test]
  fn flat_fields_are_used_as_fallback() {
    let structured = raw(json!({
      "boxes": { "xyxy": [[1, 2, 3, 4]], "conf": [0.5], "cls": [1] }
    }));
    let flat = raw(json!({ "xyxy": [[1, 2, 3, 4]], "conf": [0.5], "cls": [1] }));
    assert_eq!(normalize(Some(&flat)), normalize(Some(&structured)));
    assert_eq!(normalize(Some(&flat)).len(), 1);
  }

  #[test]
  fn incomplete_boxes_container_falls_back_to_flat() {
    let raw = raw(json!({
      "boxes": { "xyxy": [[1, 2, 3, 4]], "conf": [0.5] },
      "xyxy": [[5, 6, 7, 8]],
      "conf": [0.7],
      "cls": [3]
    }));
    let set = normalize(Some(&raw));
    assert_eq!(set.len(), 1);
    assert_eq!(set.as_slice()[0].bbox(), &[5.0, 6.0, 7.0, 8.0]);
    assert_eq!(set.as_slice()[0].class_id(), 3);
  }

  #[test]
  fn unrecognized_or_missing_output_is_empty() {
    assert!(normalize(None).is_empty());
    assert!(normalize(Some(&raw(json!({ "predictions": [] })))).is_empty());
    assert!(normalize(Some(&raw(json!("boxes"))))
      .is_empty());
    assert!(normalize(Some(&raw(json!({ "boxes": [1, 2, 3] })))).is_empty());
  }

  #[test]
  fn values_beyond_f32_range_are_rejected() {
    let raw = raw(json!({ "xyxy": [[0, 0, 1e39, 5]], "conf": [0.5], "cls": [0] }));
    assert_eq!(
      FlatAdapter.extract(&raw).unwrap_err(),
      ExtractionError::InvalidRow {
        field: "xyxy".to_string(),
        index: 0,
        expected: "4 个数值",
      }
    );

    let raw = raw_conf(1e39);
    assert_eq!(
      FlatAdapter.extract(&raw).unwrap_err(),
      ExtractionError::InvalidRow {
        field: "conf".to_string(),
        index: 0,
        expected: "数值",
      }
    );
    assert!(normalize(Some(&raw)).is_empty());
  }

  fn raw_conf(conf: f64) -> RawResult {
    raw(json!({ "xyxy": [[0, 0, 1, 5]], "conf": [conf], "cls": [0] }))
  }

  #[test]
  fn serialized_values_stay_numeric() {
    let set = normalize(Some(&raw_conf(3.4e38)));
    assert_eq!(set.len(), 1);
    let text = serde_json::to_string(&set).unwrap();
    assert!(!text.contains("null"), "{}", text);
  }

  #[test]
  fn empty_columns_are_a_valid_empty_set() {
    let raw = raw(json!({ "boxes": { "xyxy": [], "conf": [], "cls": [] } }));
    let set = StructuredAdapter.extract(&raw).unwrap();
    assert!(set.is_empty());
  }

  #[test]
  fn one_malformed_row_fails_the_whole_strategy() {
    let raw = raw(json!({
      "boxes": {
        "xyxy": [[1, 2, 3, 4], [1, 2, 3]],
        "conf": [0.9, 0.8],
        "cls": [0, 1]
      }
    }));
    assert_eq!(
      StructuredAdapter.extract(&raw).unwrap_err(),
      ExtractionError::InvalidRow {
        field: "boxes.xyxy".to_string(),
        index: 1,
        expected: "4 个数值",
      }
    );
    // 没有平铺字段可回退，整体按空集合处理，良好的第一行也不保留
    assert!(normalize(Some(&raw)).is_empty());
  }

  #[test]
  fn type_mismatches_are_rejected() {
    let string_conf = raw(json!({ "xyxy": [[1, 2, 3, 4]], "conf": ["0.9"], "cls": [0] }));
    assert!(matches!(
      FlatAdapter.extract(&string_conf),
      Err(ExtractionError::InvalidRow { ref field, .. }) if field == "conf"
    ));

    let negative_class = raw(json!({ "xyxy": [[1, 2, 3, 4]], "conf": [0.9], "cls": [-1] }));
    assert!(FlatAdapter.extract(&negative_class).is_err());

    let scalar_column = raw(json!({ "xyxy": [[1, 2, 3, 4]], "conf": 0.9, "cls": [0] }));
    assert_eq!(
      FlatAdapter.extract(&scalar_column).unwrap_err(),
      ExtractionError::TypeMismatch {
        field: "conf".to_string(),
        expected: "array",
      }
    );
  }

  #[test]
  fn class_ids_truncate_toward_zero() {
    let raw = raw(json!({ "xyxy": [[0, 0, 1, 1], [0, 0, 1, 1]], "conf": [1, 0], "cls": [2.7, 5] }));
    let set = FlatAdapter.extract(&raw).unwrap();
    let classes: Vec<_> = set.iter().map(Detection::class_id).collect();
    assert_eq!(classes, [2, 5]);
    let scores: Vec<_> = set.iter().map(Detection::confidence).collect();
    assert_eq!(scores, [1.0, 0.0]);
  }

  #[test]
  fn uneven_columns_are_bounded_by_the_shortest() {
    let raw = raw(json!({
      "xyxy": [[0, 0, 1, 1], [1, 1, 2, 2], [2, 2, 3, 3]],
      "conf": [0.9, 0.8],
      "cls": [0, 1, 2]
    }));
    let set = normalize(Some(&raw));
    assert_eq!(set.len(), 2);
    assert_eq!(set.as_slice()[1].bbox(), &[1.0, 1.0, 2.0, 2.0]);
  }

  #[test]
  fn emission_order_is_kept() {
    let raw = raw(json!({
      "xyxy": [[0, 0, 1, 1], [0, 0, 1, 1], [0, 0, 1, 1]],
      "conf": [0.2, 0.9, 0.5],
      "cls": [0, 0, 0]
    }));
    let scores: Vec<_> = normalize(Some(&raw)).iter().map(Detection::confidence).collect();
    assert_eq!(scores, [0.2, 0.9, 0.5]);
  }

  #[test]
  fn custom_source_order_is_respected() {
    let raw = raw(json!({
      "boxes": { "xyxy": [[1, 1, 2, 2]], "conf": [0.1], "cls": [1] },
      "xyxy": [[3, 3, 4, 4]],
      "conf": [0.3],
      "cls": [3]
    }));
    let normalizer =
      ResultNormalizer::with_sources(vec![Box::new(FlatAdapter), Box::new(StructuredAdapter)]);
    let set = normalizer.normalize(Some(&raw));
    assert_eq!(set.as_slice()[0].class_id(), 3);
  }
}
