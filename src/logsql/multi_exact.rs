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
use regex::{Captures, Regex};

const WILDCARD: &str = r#"(\s*)(\.\*|"\."|"\*"|\*)(\s*)"#;

/// `field:in(<wildcard>)`, whitespace allowed around the colon.
static FIELD_IN_WILDCARD: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(&format!(r"\s*:\s*in\({WILDCARD}\)")).ok());

/// `label in(<wildcard>)` inside stream filters; the label may be quoted.
static STREAM_IN_WILDCARD: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(&format!(
        r#"("(?:\\.|[^"\\])*"|[^\s:]+)\s+in\({WILDCARD}\)"#
    ))
    .ok()
});

/// Rewrites match-all `in(...)` lists to the canonical `in(*)`.
///
/// Field filters become `field:in(*)` and stream label filters become
/// `label in(*)`. Lists of literal values are left untouched, and so is a
/// bare `in(*)`.
pub fn normalize_in_wildcard(expr: &str) -> String {
    let fields = rewrite(FIELD_IN_WILDCARD.as_ref(), expr, |_| ":in(*)".to_string());
    let streams = rewrite(STREAM_IN_WILDCARD.as_ref(), &fields, |caps| {
        format!("{} in(*)", &caps[1])
    });
    if streams != expr {
        trace!("in() wildcard normalized: `{expr}` -> `{streams}`");
    }
    streams
}

fn rewrite<F>(pattern: Option<&Regex>, expr: &str, canonical: F) -> String
where
    F: Fn(&Captures<'_>) -> String,
{
    let Some(pattern) = pattern else {
        return expr.to_string();
    };
    pattern
        .replace_all(expr, |caps: &Captures<'_>| {
            if is_canonical_wildcard(caps) {
                caps[0].to_string()
            } else {
                canonical(caps)
            }
        })
        .into_owned()
}

/// The last three groups of both patterns hold the wildcard and the
/// whitespace around it.
fn is_canonical_wildcard(caps: &Captures<'_>) -> bool {
    let groups = caps.len();
    let group = |idx: usize| caps.get(idx).map_or("", |m| m.as_str());
    group(groups - 2) == "*" && group(groups - 3).is_empty() && group(groups - 1).is_empty()
}
