// Copyright 2021 Datafuse Labs
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

mod fill;

pub use fill::{
    fill_frame_with_null_values, fill_timestamps_with_null_values, generate_timestamps_with_step,
    process_metric_range_frames,
};

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{duration::millis_from_duration, error::FrameError};

const TIME_FIELD_TYPE: &str = "time";
const NUMBER_FIELD_TYPE: &str = "number";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Query {
    pub ref_id: String,
    pub expr: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub step: Option<String>,
}

impl Query {
    pub fn new(ref_id: impl Into<String>, expr: impl Into<String>) -> Self {
        Self {
            ref_id: ref_id.into(),
            expr: expr.into(),
            ..Default::default()
        }
    }

    pub fn with_step(mut self, step: impl Into<String>) -> Self {
        self.step = Some(step.into());
        self
    }

    /// Step in milliseconds, or `None` when unset or not a positive duration.
    pub fn step_ms(&self) -> Option<u64> {
        self.step
            .as_deref()
            .map(millis_from_duration)
            .filter(|step| *step > 0)
    }
}

/// Requested time range in epoch milliseconds, both ends inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryWindow {
    pub start_ms: i64,
    pub end_ms: i64,
}

impl QueryWindow {
    pub fn new(start_ms: i64, end_ms: i64) -> Self {
        Self { start_ms, end_ms }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldMeta {
    pub name: String,
    pub labels: BTreeMap<String, String>,
    pub config: Option<Value>,
}

impl FieldMeta {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SeriesFrame {
    pub ref_id: Option<String>,
    pub name: Option<String>,
    pub meta: Map<String, Value>,
    pub time_field: FieldMeta,
    pub value_field: FieldMeta,
    pub time: Vec<i64>,
    pub values: Vec<Option<f64>>,
}

impl SeriesFrame {
    pub fn new(time: Vec<i64>, values: Vec<Option<f64>>) -> Result<Self, FrameError> {
        if time.len() != values.len() {
            return Err(FrameError::LengthMismatch {
                time: time.len(),
                values: values.len(),
            });
        }
        Ok(Self {
            ref_id: None,
            name: None,
            meta: Map::new(),
            time_field: FieldMeta::named("Time"),
            value_field: FieldMeta::named("Value"),
            time,
            values,
        })
    }

    pub fn with_ref_id(mut self, ref_id: impl Into<String>) -> Self {
        self.ref_id = Some(ref_id.into());
        self
    }

    pub fn len(&self) -> usize {
        self.time.len()
    }

    pub fn is_empty(&self) -> bool {
        self.time.is_empty()
    }

    /// Only the first time field and the first number field are kept.
    pub fn from_json(value: Value) -> Result<Self, FrameError> {
        let raw: RawFrame = serde_json::from_value(value)?;
        let RawFrame { schema, data } = raw;

        let time_idx = schema
            .fields
            .iter()
            .position(|field| field.field_type == TIME_FIELD_TYPE)
            .ok_or(FrameError::MissingTimeField)?;
        let value_idx = schema
            .fields
            .iter()
            .position(|field| field.field_type == NUMBER_FIELD_TYPE)
            .ok_or(FrameError::MissingValueField)?;

        let empty = Vec::new();
        let raw_time = data.values.get(time_idx).unwrap_or(&empty);
        let raw_values = data.values.get(value_idx).unwrap_or(&empty);
        if raw_time.len() != raw_values.len() {
            return Err(FrameError::LengthMismatch {
                time: raw_time.len(),
                values: raw_values.len(),
            });
        }

        let time = raw_time
            .iter()
            .enumerate()
            .map(|(index, sample)| {
                timestamp_ms(sample).ok_or(FrameError::InvalidTimestamp { index })
            })
            .collect::<Result<Vec<_>, _>>()?;
        let values = raw_values
            .iter()
            .enumerate()
            .map(|(index, sample)| match sample {
                Value::Null => Ok(None),
                Value::Number(number) => number
                    .as_f64()
                    .map(Some)
                    .ok_or(FrameError::InvalidValue { index }),
                _ => Err(FrameError::InvalidValue { index }),
            })
            .collect::<Result<Vec<_>, _>>()?;

        let mut time_field = None;
        let mut value_field = None;
        for (idx, field) in schema.fields.into_iter().enumerate() {
            if idx == time_idx {
                time_field = Some(field.into_meta());
            } else if idx == value_idx {
                value_field = Some(field.into_meta());
            }
        }

        Ok(Self {
            ref_id: schema.ref_id,
            name: schema.name,
            meta: schema.meta.unwrap_or_default(),
            time_field: time_field.ok_or(FrameError::MissingTimeField)?,
            value_field: value_field.ok_or(FrameError::MissingValueField)?,
            time,
            values,
        })
    }

    pub fn to_json(&self) -> Value {
        let raw = RawFrame {
            schema: RawSchema {
                ref_id: self.ref_id.clone(),
                name: self.name.clone(),
                meta: (!self.meta.is_empty()).then(|| self.meta.clone()),
                fields: vec![
                    RawField::from_meta(&self.time_field, TIME_FIELD_TYPE),
                    RawField::from_meta(&self.value_field, NUMBER_FIELD_TYPE),
                ],
            },
            data: RawData {
                values: vec![
                    self.time.iter().map(|ts| Value::from(*ts)).collect(),
                    self.values
                        .iter()
                        .map(|value| value.map_or(Value::Null, Value::from))
                        .collect(),
                ],
            },
        };
        serde_json::to_value(raw).unwrap_or(Value::Null)
    }
}

fn timestamp_ms(sample: &Value) -> Option<i64> {
    let Value::Number(number) = sample else {
        return None;
    };
    number.as_i64().or_else(|| {
        number
            .as_f64()
            .filter(|value| value.fract() == 0.0 && value.is_finite())
            .map(|value| value as i64)
    })
}

#[derive(Debug, Serialize, Deserialize)]
struct RawFrame {
    schema: RawSchema,
    #[serde(default)]
    data: RawData,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawSchema {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    ref_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    meta: Option<Map<String, Value>>,
    #[serde(default)]
    fields: Vec<RawField>,
}

#[derive(Debug, Serialize, Deserialize)]
struct RawField {
    #[serde(default)]
    name: String,
    #[serde(rename = "type", default)]
    field_type: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    labels: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    config: Option<Value>,
}

impl RawField {
    fn from_meta(meta: &FieldMeta, field_type: &str) -> Self {
        Self {
            name: meta.name.clone(),
            field_type: field_type.to_string(),
            labels: meta.labels.clone(),
            config: meta.config.clone(),
        }
    }

    fn into_meta(self) -> FieldMeta {
        FieldMeta {
            name: self.name,
            labels: self.labels,
            config: self.config,
        }
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct RawData {
    #[serde(default)]
    values: Vec<Vec<Value>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn raw_frame() -> Value {
        json!({
            "schema": {
                "refId": "A",
                "name": "errors",
                "meta": {"executedQueryString": "* | stats count()"},
                "fields": [
                    {"name": "Time", "type": "time", "typeInfo": {"frame": "time.Time"}},
                    {"name": "Value", "type": "number", "labels": {"app": "web"}}
                ]
            },
            "data": {"values": [[1000, 2000, 3000], [1.5, null, 3]]}
        })
    }

    #[test]
    fn decodes_time_and_value_fields() {
        let frame = SeriesFrame::from_json(raw_frame()).unwrap();
        assert_eq!(frame.ref_id.as_deref(), Some("A"));
        assert_eq!(frame.name.as_deref(), Some("errors"));
        assert_eq!(frame.time, vec![1000, 2000, 3000]);
        assert_eq!(frame.values, vec![Some(1.5), None, Some(3.0)]);
        assert_eq!(frame.value_field.labels.get("app").map(String::as_str), Some("web"));
        assert_eq!(frame.time_field.name, "Time");
        assert!(frame.meta.contains_key("executedQueryString"));
    }

    #[test]
    fn encodes_back_to_dashboard_layout() {
        let frame = SeriesFrame::from_json(raw_frame()).unwrap();
        let encoded = frame.to_json();
        assert_eq!(encoded["schema"]["refId"], "A");
        assert_eq!(encoded["schema"]["fields"][0]["type"], "time");
        assert_eq!(encoded["schema"]["fields"][1]["labels"]["app"], "web");
        assert_eq!(encoded["data"]["values"][1], json!([1.5, null, 3.0]));
        assert_eq!(SeriesFrame::from_json(encoded).unwrap(), frame);
    }

    #[test]
    fn rejects_frames_without_required_fields() {
        let no_time = json!({"schema": {"fields": [{"name": "Value", "type": "number"}]}});
        assert!(matches!(
            SeriesFrame::from_json(no_time),
            Err(FrameError::MissingTimeField)
        ));
        let no_value = json!({"schema": {"fields": [{"name": "Time", "type": "time"}]}});
        assert!(matches!(
            SeriesFrame::from_json(no_value),
            Err(FrameError::MissingValueField)
        ));
        assert!(matches!(
            SeriesFrame::from_json(json!({"data": {}})),
            Err(FrameError::Json(_))
        ));
    }

    #[test]
    fn rejects_misaligned_or_malformed_samples() {
        let mut frame = raw_frame();
        frame["data"]["values"][1] = json!([1, 2]);
        assert!(matches!(
            SeriesFrame::from_json(frame),
            Err(FrameError::LengthMismatch { time: 3, values: 2 })
        ));

        let mut frame = raw_frame();
        frame["data"]["values"][0] = json!([1000, "soon", 3000]);
        assert!(matches!(
            SeriesFrame::from_json(frame),
            Err(FrameError::InvalidTimestamp { index: 1 })
        ));

        let mut frame = raw_frame();
        frame["data"]["values"][1] = json!([1, 2, "x"]);
        assert!(matches!(
            SeriesFrame::from_json(frame),
            Err(FrameError::InvalidValue { index: 2 })
        ));
    }

    #[test]
    fn frame_without_data_is_empty() {
        let frame = SeriesFrame::from_json(json!({
            "schema": {"fields": [{"name": "Time", "type": "time"}, {"name": "Value", "type": "number"}]}
        }))
        .unwrap();
        assert!(frame.is_empty());
    }

    #[test]
    fn new_checks_lengths() {
        assert!(matches!(
            SeriesFrame::new(vec![1, 2], vec![None]),
            Err(FrameError::LengthMismatch { time: 2, values: 1 })
        ));
        assert_eq!(SeriesFrame::new(vec![1], vec![Some(1.0)]).unwrap().len(), 1);
    }

    #[test]
    fn query_step_in_millis() {
        assert_eq!(Query::new("A", "*").with_step("1m").step_ms(), Some(60_000));
        assert_eq!(Query::new("A", "*").step_ms(), None);
        assert_eq!(Query::new("A", "*").with_step("").step_ms(), None);
        assert_eq!(Query::new("A", "*").with_step("soon").step_ms(), None);
    }

    #[test]
    fn query_decodes_from_dashboard_json() {
        let query: Query = serde_json::from_value(json!({
            "refId": "B",
            "expr": "* | stats count()",
            "step": "5m",
            "queryType": "range",
            "editorMode": "code"
        }))
        .unwrap();
        assert_eq!(query.ref_id, "B");
        assert_eq!(query.expr, "* | stats count()");
        assert_eq!(query.step_ms(), Some(300_000));
    }
}
