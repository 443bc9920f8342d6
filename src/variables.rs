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

//! Dashboard variable substitution for the "All" selection.

use log::debug;
use serde::{Deserialize, Deserializer, Serialize};

use crate::logsql::continues_identifier;

const DEFAULT_ALL_VALUE: &str = "*";
const DEFAULT_REGEX_ALL_VALUE: &str = ".*";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VariableModel {
    pub name: String,
    pub all_value: Option<String>,
    pub options: Vec<VariableOption>,
    pub allow_custom_value: bool,
    #[serde(deserialize_with = "flag_or_pattern")]
    pub regex: bool,
    pub query: Option<VariableQuery>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VariableOption {
    pub value: String,
}

impl VariableOption {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VariableQuery {
    pub query: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllValueSource {
    Explicit,
    Options,
    Default,
}

impl AllValueSource {
    /// Tried in order; [`AllValueSource::Default`] applies when none matches.
    pub const PRIORITY: [AllValueSource; 2] = [AllValueSource::Explicit, AllValueSource::Options];

    fn candidate(self, variable: &VariableModel) -> Option<(String, String)> {
        match self {
            AllValueSource::Explicit => variable
                .all_value
                .as_deref()
                .filter(|value| !value.is_empty())
                .map(|value| (value.to_string(), value.to_string())),
            AllValueSource::Options => variable.has_customized_options().then(|| {
                let values = variable.option_values();
                let plain = values
                    .iter()
                    .map(|value| format!("\"{value}\""))
                    .collect::<Vec<_>>()
                    .join(",");
                (plain, format!("({})", values.join("|")))
            }),
            AllValueSource::Default => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedAllValue {
    pub plain: String,
    pub regex: String,
    pub source: AllValueSource,
}

impl VariableModel {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn has_customized_options(&self) -> bool {
        self.query
            .as_ref()
            .is_some_and(|query| !query.query.is_empty())
            || self.allow_custom_value
            || self.regex
    }

    pub fn option_values(&self) -> Vec<&str> {
        self.options
            .iter()
            .map(|option| option.value.as_str())
            .collect()
    }

    pub fn resolve_all_value(&self) -> ResolvedAllValue {
        let (source, (plain, regex)) = AllValueSource::PRIORITY
            .into_iter()
            .find_map(|source| source.candidate(self).map(|values| (source, values)))
            .unwrap_or_else(|| {
                (
                    AllValueSource::Default,
                    (
                        DEFAULT_ALL_VALUE.to_string(),
                        DEFAULT_REGEX_ALL_VALUE.to_string(),
                    ),
                )
            });
        ResolvedAllValue {
            plain: normalize_plain_all_value(plain),
            regex: normalize_regex_all_value(regex),
            source,
        }
    }
}

/// Replaces every usage of `variable` in `expr` with its "All" value.
///
/// Regex usages `~"$name"` are substituted first with the regex form, then
/// every remaining `$name` gets the plain form. `$name` only matches as a
/// whole token, so `$foo` never touches `$foobar`.
pub fn interpolate(expr: &str, variable: &VariableModel) -> String {
    if variable.name.is_empty() {
        return expr.to_string();
    }
    let resolved = variable.resolve_all_value();
    debug!(
        "interpolating `${}` from {:?}: plain=`{}` regex=`{}`",
        variable.name, resolved.source, resolved.plain, resolved.regex
    );
    let regex_usage = format!("~\"${}\"", variable.name);
    let with_regex = expr.replace(&regex_usage, &format!("~\"{}\"", resolved.regex));
    replace_token(&with_regex, &format!("${}", variable.name), &resolved.plain)
}

/// Drops the quotes around `"$name"` unless the value belongs to a regex
/// operator (`~"$name"`).
pub fn remove_double_quotes_around_var(expr: &str, name: &str) -> String {
    if name.is_empty() {
        return expr.to_string();
    }
    let quoted = format!("\"${name}\"");
    let mut result = String::with_capacity(expr.len());
    let mut last = 0;
    for (idx, _) in expr.match_indices(&quoted) {
        if expr[..idx].ends_with('~') {
            continue;
        }
        result.push_str(&expr[last..idx]);
        result.push('$');
        result.push_str(name);
        last = idx + quoted.len();
    }
    result.push_str(&expr[last..]);
    result
}

fn replace_token(expr: &str, token: &str, replacement: &str) -> String {
    let mut result = String::with_capacity(expr.len());
    let mut last = 0;
    for (idx, _) in expr.match_indices(token) {
        let end = idx + token.len();
        if continues_identifier(expr, end) {
            continue;
        }
        result.push_str(&expr[last..idx]);
        result.push_str(replacement);
        last = end;
    }
    result.push_str(&expr[last..]);
    result
}

fn normalize_plain_all_value(value: String) -> String {
    if value == DEFAULT_REGEX_ALL_VALUE {
        DEFAULT_ALL_VALUE.to_string()
    } else {
        value
    }
}

fn normalize_regex_all_value(value: String) -> String {
    if value == DEFAULT_ALL_VALUE {
        DEFAULT_REGEX_ALL_VALUE.to_string()
    } else {
        value
    }
}

fn flag_or_pattern<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum FlagOrPattern {
        Flag(bool),
        Pattern(String),
    }

    Ok(
        match Option::<FlagOrPattern>::deserialize(deserializer)? {
            Some(FlagOrPattern::Flag(flag)) => flag,
            Some(FlagOrPattern::Pattern(pattern)) => !pattern.is_empty(),
            None => false,
        },
    )
}
