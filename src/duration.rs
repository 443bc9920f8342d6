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

//! Compact duration strings such as `1d 2h 3m 4s 5ms` and their millisecond
//! values.

use nom::{
    IResult, Parser,
    bytes::complete::take_while1,
    character::complete::{char, digit1},
    combinator::{all_consuming, opt, recognize},
    error::Error as NomError,
    sequence::pair,
};

const MILLIS_PER_SECOND: u64 = 1_000;
const MILLIS_PER_MINUTE: u64 = 60 * MILLIS_PER_SECOND;
const MILLIS_PER_HOUR: u64 = 60 * MILLIS_PER_MINUTE;
const MILLIS_PER_DAY: u64 = 24 * MILLIS_PER_HOUR;
const MILLIS_PER_WEEK: u64 = 7 * MILLIS_PER_DAY;
const MILLIS_PER_YEAR: u64 = 365 * MILLIS_PER_DAY;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DurationUnit {
    Years,
    Weeks,
    Days,
    Hours,
    Minutes,
    Seconds,
    Milliseconds,
}

const UNIT_COUNT: usize = 7;

/// Every unit accepted by [`millis_from_duration`], longest first.
pub const SUPPORTED_DURATIONS: [DurationUnit; UNIT_COUNT] = [
    DurationUnit::Years,
    DurationUnit::Weeks,
    DurationUnit::Days,
    DurationUnit::Hours,
    DurationUnit::Minutes,
    DurationUnit::Seconds,
    DurationUnit::Milliseconds,
];

impl DurationUnit {
    pub fn short(self) -> &'static str {
        match self {
            DurationUnit::Years => "y",
            DurationUnit::Weeks => "w",
            DurationUnit::Days => "d",
            DurationUnit::Hours => "h",
            DurationUnit::Minutes => "m",
            DurationUnit::Seconds => "s",
            DurationUnit::Milliseconds => "ms",
        }
    }

    /// Fixed length of one unit. Years are 365 days; there is no month unit.
    pub fn millis(self) -> u64 {
        match self {
            DurationUnit::Years => MILLIS_PER_YEAR,
            DurationUnit::Weeks => MILLIS_PER_WEEK,
            DurationUnit::Days => MILLIS_PER_DAY,
            DurationUnit::Hours => MILLIS_PER_HOUR,
            DurationUnit::Minutes => MILLIS_PER_MINUTE,
            DurationUnit::Seconds => MILLIS_PER_SECOND,
            DurationUnit::Milliseconds => 1,
        }
    }

    pub fn from_short(short: &str) -> Option<Self> {
        SUPPORTED_DURATIONS
            .into_iter()
            .find(|unit| unit.short() == short)
    }

    fn index(self) -> usize {
        self as usize
    }
}

/// Renders `ms` as `<d>d <h>h <m>m <s>s <ms>ms`, skipping zero components.
/// Returns an empty string for zero.
pub fn duration_from_millis(ms: u64) -> String {
    let components = [
        (ms / MILLIS_PER_DAY, DurationUnit::Days),
        ((ms / MILLIS_PER_HOUR) % 24, DurationUnit::Hours),
        ((ms / MILLIS_PER_MINUTE) % 60, DurationUnit::Minutes),
        ((ms / MILLIS_PER_SECOND) % 60, DurationUnit::Seconds),
        (ms % MILLIS_PER_SECOND, DurationUnit::Milliseconds),
    ];
    components
        .iter()
        .filter(|(count, _)| *count > 0)
        .map(|(count, unit)| format!("{count}{}", unit.short()))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Sums every recognised `<count><unit>` token in `text`.
///
/// Anything that does not look like a duration token is skipped. When a unit
/// appears more than once the last occurrence wins. Fractional counts only
/// contribute their integer part.
pub fn millis_from_duration(text: &str) -> u64 {
    let mut counts = [None::<u64>; UNIT_COUNT];
    let mut rest = text;
    while !rest.is_empty() {
        match duration_token(rest) {
            Ok((next, (count, unit))) => {
                if let Some((unit, count)) = resolve_token(count, unit) {
                    counts[unit.index()] = Some(count);
                }
                rest = next;
            }
            Err(_) => {
                let mut chars = rest.chars();
                chars.next();
                rest = chars.as_str();
            }
        }
    }

    SUPPORTED_DURATIONS
        .iter()
        .zip(counts)
        .filter_map(|(unit, count)| count.map(|count| count.saturating_mul(unit.millis())))
        .fold(0u64, u64::saturating_add)
}

/// Parses a single token such as `15m`. Returns `None` when the token carries
/// anything besides one count and one supported unit.
pub fn is_supported_duration(token: &str) -> Option<(DurationUnit, u64)> {
    all_consuming(duration_token)
        .parse(token.trim())
        .ok()
        .and_then(|(_, (count, unit))| resolve_token(count, unit))
}

type NomResult<'a, T> = IResult<&'a str, T, NomError<&'a str>>;

fn duration_token(input: &str) -> NomResult<'_, (&str, &str)> {
    (
        digit1,
        opt(recognize(pair(char('.'), digit1))),
        take_while1(is_unit_char),
    )
        .map(|(count, _, unit)| (count, unit))
        .parse(input)
}

fn resolve_token(count: &str, unit: &str) -> Option<(DurationUnit, u64)> {
    let unit = DurationUnit::from_short(unit)?;
    let count = count.parse::<u64>().ok()?;
    Some((unit, count))
}

fn is_unit_char(ch: char) -> bool {
    matches!(ch, 'y' | 'w' | 'd' | 'h' | 'm' | 's')
}
