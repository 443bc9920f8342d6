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

use log::trace;
use regex::Regex;

use super::split_at_first_pipe;

static LEVEL_FILTER: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"level\s*:\s*[A-Za-z0-9_]").ok());

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LevelFilterMode {
    /// The clicked level is the "unknown" level.
    pub unknown_level: bool,
    pub query_has_unknown_level: bool,
    /// Shift-click: toggle the level inside an `OR` list.
    pub multi_select: bool,
}

/// Applies a level button click to `query`. Only the text before the first
/// pipe is rewritten.
pub fn apply_level_filter(query: &str, level_expr: &str, mode: LevelFilterMode) -> String {
    if level_expr.trim().is_empty() {
        return query.to_string();
    }
    if query.trim().is_empty() {
        return level_expr.to_string();
    }

    let (filters, pipes) = split_at_first_pipe(query);
    let mut result = level_query(filters, level_expr, mode);
    if !pipes.is_empty() {
        if !result.ends_with(char::is_whitespace) {
            result.push(' ');
        }
        result.push_str(pipes);
    }
    trace!("level filter applied: `{query}` -> `{result}`");
    result
}

fn level_query(filters: &str, level_expr: &str, mode: LevelFilterMode) -> String {
    if filters.trim().is_empty() {
        return level_expr.to_string();
    }
    if !has_level_filter(filters) {
        return format!("{level_expr} | {filters}");
    }
    if mode.unknown_level || mode.query_has_unknown_level || !mode.multi_select {
        return level_expr.to_string();
    }
    if !filters.contains(level_expr) {
        return format!("{level_expr} OR {filters}");
    }
    filters
        .split(level_expr)
        .map(trim_or)
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" OR ")
}

fn has_level_filter(filters: &str) -> bool {
    LEVEL_FILTER
        .as_ref()
        .is_some_and(|pattern| pattern.is_match(filters))
}

fn trim_or(part: &str) -> &str {
    let mut part = part.trim();
    if part.get(..2).is_some_and(|head| head.eq_ignore_ascii_case("or")) {
        part = part[2..].trim();
    }
    let tail = part.len().saturating_sub(2);
    if part.len() >= 2 && part.get(tail..).is_some_and(|end| end.eq_ignore_ascii_case("or")) {
        part = part[..tail].trim();
    }
    part
}
