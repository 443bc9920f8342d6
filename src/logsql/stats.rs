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

use std::sync::LazyLock;

use regex::Regex;

/// Aggregation functions of the `stats` pipe.
pub const STATS_PIPE_FUNCTIONS: [&str; 20] = [
    "avg",
    "count",
    "count_empty",
    "count_uniq",
    "count_uniq_hash",
    "histogram",
    "json_values",
    "max",
    "median",
    "min",
    "quantile",
    "rate",
    "rate_sum",
    "row_any",
    "row_max",
    "row_min",
    "sum",
    "sum_len",
    "uniq_values",
    "values",
];

static STATS_PIPE: LazyLock<Option<Regex>> =
    LazyLock::new(|| function_after_pipe(&STATS_PIPE_FUNCTIONS));

/// Coarse check for an aggregation query: some line has a `|` followed later
/// on the same line by a stats function name. Case-insensitive.
pub fn has_aggregation(expr: &str) -> bool {
    STATS_PIPE
        .as_ref()
        .is_some_and(|pattern| pattern.is_match(expr))
}

pub fn has_specific_function(expr: &str, name: &str) -> bool {
    if name.is_empty() {
        return false;
    }
    function_after_pipe(&[name]).is_some_and(|pattern| pattern.is_match(expr))
}

fn function_after_pipe(names: &[&str]) -> Option<Regex> {
    let alternatives = names
        .iter()
        .map(|name| regex::escape(name))
        .collect::<Vec<_>>()
        .join("|");
    Regex::new(&format!(r"(?i)\|.*\b(?:{alternatives})\b")).ok()
}
