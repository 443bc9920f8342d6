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

use std::{ops::Range, sync::LazyLock};

use log::trace;
use regex::{Captures, Regex};

use super::continues_identifier;

// Value must also end at whitespace, `|` or end of input; see ends_at_value_boundary.
static REGEX_FILTER: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(
        r#"(^|\||\s)([^\s:~]+)\s*:\s*~\s*(?:(?P<quoted_var>"\$[A-Za-z0-9_.-]+")|(?P<bare_var>\$[A-Za-z0-9_.-]+)|(?P<literal>"[^"]+"))"#,
    )
    .ok()
});

static REGEX_ALL_VALUE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r#"(:!?~)\s*"\*""#).ok());

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegexVariableMatch {
    pub text: String,
    pub range: Range<usize>,
    pub field: String,
    pub variable: String,
    pub quoted: bool,
}

pub fn to_exact_operator(expr: &str) -> String {
    to_exact_operator_with(expr, ":")
}

/// Rewrites every `field:~value` into `field<operator>value`. The value token
/// is kept verbatim, quoted or not.
pub fn to_exact_operator_with(expr: &str, operator: &str) -> String {
    let mut result = String::with_capacity(expr.len());
    let mut last = 0;
    for caps in regex_filters(expr) {
        let (Some(whole), Some(field), Some(value)) = (caps.get(0), caps.get(2), value_of(&caps))
        else {
            continue;
        };
        result.push_str(&expr[last..field.start()]);
        result.push_str(field.as_str());
        result.push_str(operator);
        result.push_str(value.as_str());
        last = whole.end();
    }
    if last == 0 {
        return expr.to_string();
    }
    result.push_str(&expr[last..]);
    trace!("regex operators rewritten to `{operator}`: `{expr}` -> `{result}`");
    result
}

/// First regex filter whose value is a dashboard variable. Such filters cannot
/// be interpolated safely.
pub fn detect_variable_in_regex(expr: &str) -> Option<RegexVariableMatch> {
    regex_filters(expr).into_iter().find_map(|caps| {
        let whole = caps.get(0)?;
        let field = caps.get(2)?;
        let (variable, quoted) = match (caps.name("quoted_var"), caps.name("bare_var")) {
            (Some(value), _) => (value.as_str().trim_matches('"'), true),
            (None, Some(value)) => (value.as_str(), false),
            (None, None) => return None,
        };
        Some(RegexVariableMatch {
            text: whole.as_str().to_string(),
            range: whole.range(),
            field: field.as_str().to_string(),
            variable: variable.trim_start_matches('$').to_string(),
            quoted,
        })
    })
}

/// Wraps `:~$name` as `:~"$name"` for each of `variables`, dropping any
/// whitespace between the operator and the variable.
pub fn quote_regex_variables<S: AsRef<str>>(expr: &str, variables: &[S]) -> String {
    let mut result = expr.to_string();
    for name in variables {
        let name = name.as_ref();
        if name.is_empty() {
            continue;
        }
        let pattern = format!(r":~\s*\$({})", regex::escape(name));
        let Ok(re) = Regex::new(&pattern) else {
            continue;
        };
        let mut quoted = String::with_capacity(result.len() + 2);
        let mut last = 0;
        for caps in re.captures_iter(&result) {
            let (Some(whole), Some(var)) = (caps.get(0), caps.get(1)) else {
                continue;
            };
            if continues_identifier(&result, whole.end()) {
                continue;
            }
            quoted.push_str(&result[last..whole.start()]);
            quoted.push_str(":~\"$");
            quoted.push_str(var.as_str());
            quoted.push('"');
            last = whole.end();
        }
        quoted.push_str(&result[last..]);
        result = quoted;
    }
    result
}

pub fn correct_regex_all_value(expr: &str) -> String {
    let Some(pattern) = REGEX_ALL_VALUE.as_ref() else {
        return expr.to_string();
    };
    pattern
        .replace_all(expr, |caps: &Captures<'_>| format!("{}\".*\"", &caps[1]))
        .into_owned()
}

/// Reports whether `text` ends inside the quoted value of a regex filter
/// (`:~"` or `=~"`) on its last line. Completion uses this to offer regex
/// friendly suggestions.
pub fn is_regex_operator_in_last_filter(text: &str) -> bool {
    let line = text.rsplit('\n').next().unwrap_or_default();
    let Some(open_quote) = unclosed_quote_start(line) else {
        return false;
    };
    let before = line[..open_quote].trim_end();
    let Some(before) = before.strip_suffix('~') else {
        return false;
    };
    before.trim_end().ends_with([':', '='])
}

fn regex_filters(expr: &str) -> Vec<Captures<'_>> {
    let mut found = Vec::new();
    let Some(pattern) = REGEX_FILTER.as_ref() else {
        return found;
    };
    let mut start = 0;
    while start <= expr.len() {
        let Some(caps) = pattern.captures_at(expr, start) else {
            break;
        };
        let Some(whole) = caps.get(0) else {
            break;
        };
        if ends_at_value_boundary(expr, whole.end()) {
            start = whole.end();
            found.push(caps);
        } else {
            start = next_char_boundary(expr, whole.start());
        }
    }
    found
}

fn value_of<'h>(caps: &Captures<'h>) -> Option<regex::Match<'h>> {
    caps.name("quoted_var")
        .or_else(|| caps.name("bare_var"))
        .or_else(|| caps.name("literal"))
}

fn ends_at_value_boundary(expr: &str, end: usize) -> bool {
    match expr[end..].chars().next() {
        None => true,
        Some(ch) => ch.is_whitespace() || ch == '|',
    }
}

fn next_char_boundary(expr: &str, index: usize) -> usize {
    expr[index..]
        .chars()
        .next()
        .map_or(expr.len() + 1, |ch| index + ch.len_utf8())
}

fn unclosed_quote_start(line: &str) -> Option<usize> {
    let mut open = None;
    let mut escaped = false;
    for (idx, ch) in line.char_indices() {
        match (open, ch) {
            (Some(_), _) if escaped => escaped = false,
            (Some(_), '\\') => escaped = true,
            (Some(_), '"') => open = None,
            (None, '"') => open = Some(idx),
            _ => {}
        }
    }
    open
}
