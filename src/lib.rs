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

//! Query-side helpers for a LogsQL dashboard datasource.
//!
//! - [`logsql`] rewrites raw query text: `in()` wildcards, regex operators
//!   bound to variables, stats pipe detection, ad-hoc and level filters.
//! - [`variables`] substitutes dashboard variables, choosing the value used
//!   for the "All" selection.
//! - [`duration`] converts between step strings such as `1h30m` and
//!   milliseconds.
//! - [`frame`] decodes metric result frames and fills missing steps with
//!   nulls so charts draw gaps.
//!
//! Everything except frame decoding is total and returns its input unchanged
//! when nothing matches.

pub mod duration;
pub mod error;
pub mod frame;
pub mod logsql;
pub mod variables;

pub use duration::{
    DurationUnit, SUPPORTED_DURATIONS, duration_from_millis, is_supported_duration,
    millis_from_duration,
};
pub use error::FrameError;
pub use frame::{
    FieldMeta, Query, QueryWindow, SeriesFrame, fill_frame_with_null_values,
    process_metric_range_frames,
};
pub use logsql::{
    AdHocFilter, FilterOperator, LevelFilterMode, add_filter_to_query, apply_level_filter,
    has_aggregation, normalize_in_wildcard, prepare_query, remove_filter_from_query,
};
pub use variables::{VariableModel, interpolate};
