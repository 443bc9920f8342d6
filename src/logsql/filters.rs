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

use log::trace;
use nom::{
    IResult, Parser,
    branch::alt,
    character::complete::{anychar, char, multispace0, none_of},
    combinator::recognize,
    error::Error as NomError,
    multi::{many0, many1},
    sequence::{pair, preceded},
};
use serde::{Deserialize, Serialize};

use super::split_at_first_pipe;

const STREAM_KEYS: [&str; 2] = ["_stream", "_stream_id"];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum FilterOperator {
    #[default]
    #[serde(rename = "=")]
    Equal,
    #[serde(rename = "!=")]
    NotEqual,
    #[serde(rename = "=|")]
    EqualAny,
    #[serde(rename = "!=|")]
    NotEqualAny,
}

/// Filter added from a log line or a table cell.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AdHocFilter {
    pub key: String,
    pub value: String,
    pub values: Vec<String>,
    pub operator: FilterOperator,
}

impl AdHocFilter {
    pub fn new(key: impl Into<String>, value: impl Into<String>, operator: FilterOperator) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            operator,
            ..Default::default()
        }
    }

    pub fn any_of<I, S>(key: impl Into<String>, values: I, operator: FilterOperator) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            key: key.into(),
            values: values.into_iter().map(Into::into).collect(),
            operator,
            ..Default::default()
        }
    }

    fn render(&self) -> String {
        let key = &self.key;
        let value = &self.value;
        let is_stream = STREAM_KEYS.contains(&key.as_str());
        match self.operator {
            FilterOperator::Equal if is_stream => format!("{key}:{value}"),
            FilterOperator::NotEqual if is_stream => format!("(! {key}: {value})"),
            FilterOperator::Equal => format!("{key}:={}", quote(value)),
            FilterOperator::NotEqual => format!("!{key}:={}", quote(value)),
            FilterOperator::EqualAny => format!("{key}:in({})", self.quoted_values()),
            FilterOperator::NotEqualAny => format!("!{key}:in({})", self.quoted_values()),
        }
    }

    fn quoted_values(&self) -> String {
        self.values
            .iter()
            .map(|value| quote(value))
            .collect::<Vec<_>>()
            .join(",")
    }
}

/// Appends `filter` to the filter part of `query` with `AND`, keeping pipes.
pub fn add_filter_to_query(query: &str, filter: &AdHocFilter) -> String {
    let rendered = filter.render();
    let (filters, pipes) = split_at_first_pipe(query);
    let filters = filters.trim();
    let mut result = if filters.is_empty() {
        rendered
    } else {
        format!("{filters} AND {rendered}")
    };
    if !pipes.is_empty() {
        result.push(' ');
        result.push_str(pipes);
    }
    trace!("filter added: `{query}` -> `{result}`");
    result
}

pub fn query_has_filter(query: &str, key: &str, value: &str) -> bool {
    let (filters, _) = split_at_first_pipe(query);
    filter_tokens(filters)
        .into_iter()
        .any(|token| matches_filter(split_parens(token).1, key, value))
}

/// Removes the first `key`/`value` filter and one logical operator next to it.
pub fn remove_filter_from_query(query: &str, key: &str, value: &str) -> String {
    let (filters, pipes) = split_at_first_pipe(query);
    let mut tokens: Vec<String> = filter_tokens(filters)
        .into_iter()
        .map(str::to_string)
        .collect();
    let Some(idx) = tokens
        .iter()
        .position(|token| matches_filter(split_parens(token).1, key, value))
    else {
        return query.to_string();
    };

    let (mut open, mut close) = {
        let (open, _, close) = split_parens(&tokens[idx]);
        (open.to_string(), close.to_string())
    };
    let balanced = open.len().min(close.len());
    open.truncate(open.len() - balanced);
    close.truncate(close.len() - balanced);

    let mut start = idx;
    let mut end = idx + 1;
    if start > 0 && is_negation(&tokens[start - 1]) {
        start -= 1;
    }
    if open.is_empty() && start > 0 && is_conjunction(&tokens[start - 1]) {
        start -= 1;
    } else if end < tokens.len() && is_conjunction(&tokens[end]) {
        end += 1;
    }
    tokens.drain(start..end);

    if let Some(next) = tokens.get_mut(start) {
        next.insert_str(0, &open);
    }
    if let Some(prev) = start.checked_sub(1).and_then(|prev| tokens.get_mut(prev)) {
        prev.push_str(&close);
    }

    let mut result = tokens.join(" ");
    if !pipes.is_empty() {
        if result.is_empty() {
            result.push('*');
        }
        result.push(' ');
        result.push_str(pipes);
    }
    trace!("filter removed: `{query}` -> `{result}`");
    result
}

fn quote(value: &str) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| format!("\"{value}\""))
}

fn matches_filter(body: &str, key: &str, value: &str) -> bool {
    let body = body.strip_prefix('!').unwrap_or(body);
    let Some(rest) = body
        .strip_prefix(key)
        .and_then(|rest| rest.strip_prefix(':'))
    else {
        return false;
    };
    let rest = rest.strip_prefix('=').unwrap_or(rest);
    rest == value || rest == quote(value) || rest == format!("\"{value}\"")
}

fn is_conjunction(token: &str) -> bool {
    token.eq_ignore_ascii_case("AND") || token.eq_ignore_ascii_case("OR")
}

fn is_negation(token: &str) -> bool {
    token.eq_ignore_ascii_case("NOT") || token == "!"
}

/// Splits leading `(` and unbalanced trailing `)` off a filter token.
fn split_parens(token: &str) -> (&str, &str, &str) {
    let rest = token.trim_start_matches('(');
    let open = &token[..token.len() - rest.len()];
    let mut depth = 0usize;
    let mut in_quotes = false;
    let mut escaped = false;
    let mut close_at = rest.len();
    for (idx, ch) in rest.char_indices() {
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
            '(' => depth += 1,
            ')' if depth == 0 => {
                close_at = idx;
                break;
            }
            ')' => depth -= 1,
            _ => {}
        }
    }
    (open, &rest[..close_at], &rest[close_at..])
}

type NomResult<'a, T> = IResult<&'a str, T, NomError<&'a str>>;

/// Whitespace separated tokens; whitespace inside double quotes does not split.
fn filter_tokens(input: &str) -> Vec<&str> {
    match many0(preceded(multispace0, filter_token)).parse(input) {
        Ok((rest, tokens)) if rest.trim().is_empty() => tokens,
        _ => input.split_whitespace().collect(),
    }
}

fn filter_token(input: &str) -> NomResult<'_, &str> {
    recognize(many1(alt((quoted, recognize(none_of(" \t\r\n\"")))))).parse(input)
}

fn quoted(input: &str) -> NomResult<'_, &str> {
    recognize((
        char('"'),
        many0(alt((
            recognize(pair(char('\\'), anychar)),
            recognize(none_of("\\\"")),
        ))),
        char('"'),
    ))
    .parse(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn adds_filter_with_operator() {
        let filter = AdHocFilter::new("baz", "qux", FilterOperator::Equal);
        assert_eq!(add_filter_to_query("foo: bar", &filter), r#"foo: bar AND baz:="qux""#);
        let filter = AdHocFilter::new("baz", "qux", FilterOperator::NotEqual);
        assert_eq!(add_filter_to_query("foo: bar", &filter), r#"foo: bar AND !baz:="qux""#);
    }

    #[test]
    fn adds_filter_before_pipes() {
        let filter = AdHocFilter::new("baz", "qux", FilterOperator::Equal);
        assert_eq!(
            add_filter_to_query("foo: bar | pipe1 | pipe2", &filter),
            r#"foo: bar AND baz:="qux" | pipe1 | pipe2"#
        );
        assert_eq!(
            add_filter_to_query(r#"_msg:"a|b" | stats count()"#, &filter),
            r#"_msg:"a|b" AND baz:="qux" | stats count()"#
        );
    }

    #[test]
    fn stream_keys_take_value_verbatim() {
        let query = "foo: bar | pipe1 | pipe2";
        let value = r#"{event: "test"}"#;
        assert_eq!(
            add_filter_to_query(query, &AdHocFilter::new("_stream", value, FilterOperator::Equal)),
            r#"foo: bar AND _stream:{event: "test"} | pipe1 | pipe2"#
        );
        assert_eq!(
            add_filter_to_query(
                query,
                &AdHocFilter::new("_stream", value, FilterOperator::NotEqual)
            ),
            r#"foo: bar AND (! _stream: {event: "test"}) | pipe1 | pipe2"#
        );
        assert_eq!(
            add_filter_to_query(
                query,
                &AdHocFilter::new("_stream_id", "stream123", FilterOperator::Equal)
            ),
            "foo: bar AND _stream_id:stream123 | pipe1 | pipe2"
        );
        assert_eq!(
            add_filter_to_query(
                query,
                &AdHocFilter::new("_stream_id", "stream123", FilterOperator::NotEqual)
            ),
            "foo: bar AND (! _stream_id: stream123) | pipe1 | pipe2"
        );
    }

    #[test]
    fn adds_value_groups() {
        let filter = AdHocFilter::any_of("baz", ["qux", "quux"], FilterOperator::EqualAny);
        assert_eq!(
            add_filter_to_query("foo: bar", &filter),
            r#"foo: bar AND baz:in("qux","quux")"#
        );
        let filter = AdHocFilter::any_of("baz", ["qux", "quux"], FilterOperator::NotEqualAny);
        assert_eq!(
            add_filter_to_query("foo: bar", &filter),
            r#"foo: bar AND !baz:in("qux","quux")"#
        );
    }

    #[test]
    fn adds_to_empty_query_and_escapes_values() {
        let filter = AdHocFilter::new("msg", r#"say "hi""#, FilterOperator::Equal);
        assert_eq!(add_filter_to_query("  ", &filter), r#"msg:="say \"hi\"""#);
        assert_eq!(
            add_filter_to_query("| stats count()", &filter),
            r#"msg:="say \"hi\"" | stats count()"#
        );
    }

    #[test]
    fn removes_filter() {
        assert_eq!(
            remove_filter_from_query(r#"foo: bar AND baz:="qux""#, "baz", "qux"),
            "foo: bar"
        );
        assert_eq!(
            remove_filter_from_query(r#"foo: bar AND baz:="qux" | pipe1 | pipe2"#, "baz", "qux"),
            "foo: bar | pipe1 | pipe2"
        );
    }

    #[test]
    fn removes_filter_inside_group() {
        assert_eq!(
            remove_filter_from_query(r#"foo: bar AND (baz:="qux" OR quux:"corge")"#, "baz", "qux"),
            r#"foo: bar AND (quux:"corge")"#
        );
        assert_eq!(
            remove_filter_from_query(r#"foo AND (quux:"corge" OR baz:="qux")"#, "baz", "qux"),
            r#"foo AND (quux:"corge")"#
        );
        assert_eq!(
            remove_filter_from_query(r#"foo AND (baz:="qux")"#, "baz", "qux"),
            "foo"
        );
    }

    #[test]
    fn removes_leading_filter_and_negations() {
        assert_eq!(
            remove_filter_from_query(r#"baz:="qux" AND foo:bar"#, "baz", "qux"),
            "foo:bar"
        );
        assert_eq!(
            remove_filter_from_query(r#"foo:bar AND NOT baz:qux"#, "baz", "qux"),
            "foo:bar"
        );
        assert_eq!(
            remove_filter_from_query(r#"foo:bar AND !baz:="qux""#, "baz", "qux"),
            "foo:bar"
        );
        assert_eq!(
            remove_filter_from_query(r#"baz:="qux" | stats count()"#, "baz", "qux"),
            "* | stats count()"
        );
    }

    #[test]
    fn keeps_query_without_filter() {
        let query = r#"foo: bar AND baz:="other""#;
        assert_eq!(remove_filter_from_query(query, "baz", "qux"), query);
        assert_eq!(remove_filter_from_query("", "baz", "qux"), "");
    }

    #[test]
    fn quoted_values_with_spaces_stay_whole() {
        let query = r#"app:="my app" AND level:="error""#;
        assert!(query_has_filter(query, "app", "my app"));
        assert_eq!(
            remove_filter_from_query(query, "level", "error"),
            r#"app:="my app""#
        );
    }

    #[test]
    fn detects_filter() {
        assert!(query_has_filter("foo:bar", "foo", "bar"));
        assert!(query_has_filter(r#"x AND foo:="bar""#, "foo", "bar"));
        assert!(query_has_filter(r#"(foo:"bar" OR y)"#, "foo", "bar"));
        assert!(!query_has_filter("foo:barbaz", "foo", "bar"));
        assert!(!query_has_filter("* | filter foo:bar", "foo", "bar"));
    }

    #[test]
    fn tokens_respect_quotes() {
        assert_eq!(
            filter_tokens(r#" a:"x y"  (b:c) "#),
            vec![r#"a:"x y""#, "(b:c)"]
        );
        assert_eq!(filter_tokens(r#"a:"open b"#), vec!["a:\"open", "b"]);
        assert_eq!(split_parens(r#"(k:in("a"))"#), ("(", r#"k:in("a")"#, ")"));
    }

    #[test]
    fn operator_decodes_from_symbols() {
        let filter: AdHocFilter = serde_json::from_value(serde_json::json!({
            "key": "baz",
            "values": ["a"],
            "operator": "!=|"
        }))
        .unwrap();
        assert_eq!(filter.operator, FilterOperator::NotEqualAny);
    }
}
