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

use thiserror::Error;

/// Raised while decoding a raw data frame returned by the query client.
#[derive(Debug, Error)]
pub enum FrameError {
    #[error("invalid data frame JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("data frame has no time field")]
    MissingTimeField,
    #[error("data frame has no numeric value field")]
    MissingValueField,
    #[error("time field has {time} samples but value field has {values}")]
    LengthMismatch { time: usize, values: usize },
    #[error("time field sample {index} is not an integer timestamp")]
    InvalidTimestamp { index: usize },
    #[error("value field sample {index} is neither a number nor null")]
    InvalidValue { index: usize },
}
