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

use std::collections::HashMap;

use log::{debug, trace};
use serde_json::{Value, json};

use super::{Query, QueryWindow, SeriesFrame};

const PREFERRED_VISUALISATION: &str = "graph";
const MULTI_SERIES_FRAME_TYPE: &str = "timeseries-multi";

/// Rewrites a range frame onto a regular grid spanning `window`, inserting
/// `None` where the backend returned no sample.
///
/// The grid stays aligned with the first returned sample. The frame is
/// returned unchanged when the query has no usable step or the frame has no
/// samples.
pub fn fill_frame_with_null_values(
    frame: &SeriesFrame,
    query: &Query,
    window: QueryWindow,
) -> SeriesFrame {
    let Some(step_ms) = query.step_ms() else {
        trace!("query {} has no step, frame kept as is", query.ref_id);
        return frame.clone();
    };
    let Some(&first) = frame.time.first() else {
        return frame.clone();
    };

    let grid = generate_timestamps_with_step(first, window.start_ms, window.end_ms, step_ms);
    let values = fill_timestamps_with_null_values(frame, &grid);
    debug!(
        "filled frame {:?}: {} samples onto {} slots of {step_ms}ms",
        frame.ref_id,
        frame.len(),
        grid.len()
    );

    SeriesFrame {
        ref_id: frame.ref_id.clone(),
        name: frame.name.clone(),
        meta: frame.meta.clone(),
        time_field: frame.time_field.clone(),
        value_field: frame.value_field.clone(),
        time: grid,
        values,
    }
}

/// Timestamps `anchor, anchor + step, ...` up to and including `end`, where
/// `anchor` is the first point at or after `start` that lies on the step
/// lattice through `first`.
pub fn generate_timestamps_with_step(first: i64, start: i64, end: i64, step: u64) -> Vec<i64> {
    if step == 0 {
        return Vec::new();
    }
    // i128 keeps the lattice maths exact across the whole i64 range.
    let (first, start, end, step) = (
        i128::from(first),
        i128::from(start),
        i128::from(end),
        i128::from(step),
    );

    let anchor = (first + ceil_div(start - first, step) * step).max(start);
    if end < anchor {
        return Vec::new();
    }

    let total_steps = (end - anchor) / step;
    (0..=total_steps)
        .filter_map(|i| i64::try_from(anchor + i * step).ok())
        .collect()
}

/// Values of `frame` looked up at each grid timestamp. Timestamps missing from
/// the frame map to `None`; when the frame repeats a timestamp the later
/// sample wins.
pub fn fill_timestamps_with_null_values(frame: &SeriesFrame, grid: &[i64]) -> Vec<Option<f64>> {
    let by_timestamp: HashMap<i64, Option<f64>> = frame
        .time
        .iter()
        .copied()
        .zip(frame.values.iter().copied())
        .collect();
    grid.iter()
        .map(|ts| by_timestamp.get(ts).copied().flatten())
        .collect()
}

/// Gap-fills every range frame using the query that produced it (matched by
/// ref id) and tags the frame as a multi-series graph.
pub fn process_metric_range_frames(
    frames: &[SeriesFrame],
    queries: &[Query],
    window: QueryWindow,
) -> Vec<SeriesFrame> {
    let by_ref_id: HashMap<&str, &Query> = queries
        .iter()
        .map(|query| (query.ref_id.as_str(), query))
        .collect();

    frames
        .iter()
        .map(|frame| {
            let query = frame
                .ref_id
                .as_deref()
                .and_then(|ref_id| by_ref_id.get(ref_id).copied());
            let mut filled = match query {
                Some(query) => fill_frame_with_null_values(frame, query, window),
                None => {
                    debug!("no query for frame {:?}, gap filling skipped", frame.ref_id);
                    frame.clone()
                }
            };
            mark_as_time_series(&mut filled);
            filled
        })
        .collect()
}

fn mark_as_time_series(frame: &mut SeriesFrame) {
    frame.meta.insert(
        "preferredVisualisationType".to_string(),
        Value::from(PREFERRED_VISUALISATION),
    );
    frame
        .meta
        .insert("type".to_string(), Value::from(MULTI_SERIES_FRAME_TYPE));
    frame.meta.insert("typeVersion".to_string(), json!([0, 1]));
}

fn ceil_div(lhs: i128, rhs: i128) -> i128 {
    let quotient = lhs.div_euclid(rhs);
    if lhs.rem_euclid(rhs) == 0 {
        quotient
    } else {
        quotient + 1
    }
}
