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

//! Pattern based rewrites over raw LogsQL text. Nothing here builds a syntax
//! tree; every pass matches a narrow, well known shape and leaves the rest of
//! the query as it was.

mod filters;
mod level;
mod multi_exact;
mod regex_operator;
mod stats;

pub use filters::{
    AdHocFilter, FilterOperator, add_filter_to_query, query_has_filter, remove_filter_from_query,
};
pub use level::{LevelFilterMode, apply_level_filter};
pub use multi_exact::normalize_in_wildcard;
pub use regex_operator::{
    RegexVariableMatch, correct_regex_all_value, detect_variable_in_regex,
    is_regex_operator_in_last_filter, quote_regex_variables, to_exact_operator,
    to_exact_operator_with,
};
pub use stats::{STATS_PIPE_FUNCTIONS, has_aggregation, has_specific_function};

use log::debug;

use crate::variables::{VariableModel, interpolate};

/// Prepares an editor query for execution.
///
/// Passes run in a fixed order because interpolation expects operator syntax
/// to be normalized already:
///
/// 1. [`normalize_in_wildcard`]
/// 2. [`correct_regex_all_value`]
/// 3. [`interpolate`] for each variable, in the given order
///
/// Regex operators bound to variables are not rewritten here; use
/// [`detect_variable_in_regex`] to warn and [`to_exact_operator`] when the
/// user accepts the fix.
pub fn prepare_query(expr: &str, variables: &[VariableModel]) -> String {
    let normalized = correct_regex_all_value(&normalize_in_wildcard(expr));
    let prepared = variables
        .iter()
        .fold(normalized, |query, variable| interpolate(&query, variable));
    if prepared != expr {
        debug!("query prepared: `{expr}` -> `{prepared}`");
    }
    prepared
}

/// True when the character at `end` would extend an identifier such as a
/// variable name.
pub(crate) fn continues_identifier(text: &str, end: usize) -> bool {
    text[end..]
        .chars()
        .next()
        .is_some_and(|ch| ch.is_ascii_alphanumeric() || ch == '_')
}

/// Splits `expr` before its first `|` that is not inside a double-quoted
/// string. The second half is empty when there is no pipe.
pub(crate) fn split_at_first_pipe(expr: &str) -> (&str, &str) {
    let mut in_quotes = false;
    let mut escaped = false;
    for (idx, ch) in expr.char_indices() {
        if in_quotes {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_quotes = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_quotes = true,
            '|' => return expr.split_at(idx),
            _ => {}
        }
    }
    (expr, "")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::variables::VariableOption;

    fn variable(name: &str) -> VariableModel {
        VariableModel {
            name: name.into(),
            ..Default::default()
        }
    }

    #[test]
    fn normalizes_before_interpolating() {
        let query = "app:in(.*) level:in($level) | stats count()";
        assert_eq!(
            prepare_query(query, &[variable("level")]),
            "app:in(*) level:in(*) | stats count()"
        );
    }

    #[test]
    fn regex_context_gets_regex_all_value() {
        let query = r#"host:~"$host" _stream:{app in($app)}"#;
        let app = VariableModel {
            name: "app".into(),
            regex: true,
            options: vec![VariableOption::new("web"), VariableOption::new("api")],
            ..Default::default()
        };
        assert_eq!(
            prepare_query(query, &[variable("host"), app]),
            r#"host:~".*" _stream:{app in("web","api")}"#
        );
    }

    #[test]
    fn regex_star_from_all_value_is_corrected_first() {
        let query = r#"host:~"*" pod:$pod"#;
        assert_eq!(
            prepare_query(query, &[variable("pod")]),
            r#"host:~".*" pod:*"#
        );
    }

    #[test]
    fn untouched_query_is_returned_as_is() {
        let query = "error | limit 10";
        assert_eq!(prepare_query(query, &[]), query);
        assert_eq!(prepare_query(query, &[variable("unused")]), query);
    }

    #[test]
    fn splits_at_first_unquoted_pipe() {
        assert_eq!(split_at_first_pipe("a | b | c"), ("a ", "| b | c"));
        assert_eq!(
            split_at_first_pipe(r#"_msg:"x|y" | stats"#),
            (r#"_msg:"x|y" "#, "| stats")
        );
        assert_eq!(
            split_at_first_pipe(r#"_msg:"x\"|y" | stats"#),
            (r#"_msg:"x\"|y" "#, "| stats")
        );
        assert_eq!(split_at_first_pipe("no pipes"), ("no pipes", ""));
    }

    #[test]
    fn identifier_continuation() {
        assert!(continues_identifier("$foobar", 4));
        assert!(!continues_identifier("$foo)", 4));
        assert!(!continues_identifier("$foo", 4));
    }
}
