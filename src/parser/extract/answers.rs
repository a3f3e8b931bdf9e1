use std::sync::LazyLock;

use regex::Regex;

use crate::dispatch::EMPTY_SENTINEL;
use crate::parser::tokens::{normalize_token, CategoricalToken};

static TOKEN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(Yes|No|Nonexistent)\b").unwrap());
static DATE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b\d{2}/\d{2}/\d{4}\b").unwrap());
static DATE_ONLY_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d{2}/\d{2}/\d{4}$").unwrap());
static FOOTER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(Applicant:|Project:|FY20\d{2}|CoC Application Page|Page\s+\d+)").unwrap()
});
static EXAMPLE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(for example|notified applicants on|if you notified applicants)").unwrap()
});

/// The accepted answer token closest to the bottom of the window,
/// title-cased. An empty `accept` list takes any vocabulary token. Empty when
/// the window holds none.
pub fn last_token(lines: &[String], accept: &[CategoricalToken]) -> String {
    lines
        .iter()
        .rev()
        .find_map(|l| {
            TOKEN_RE
                .captures_iter(l)
                .map(|caps| normalize_token(&caps[1]))
                .find(|t| accept.is_empty() || accept.iter().any(|a| a.as_str() == t.as_str()))
        })
        .unwrap_or_default()
}

/// Every `MM/DD/YYYY` date in the window, in reading order.
pub fn all_dates(lines: &[String]) -> Vec<String> {
    lines
        .iter()
        .flat_map(|l| DATE_RE.find_iter(l).map(|m| m.as_str().to_string()))
        .collect()
}

/// The date the respondent entered as an answer.
///
/// Footer dates are ignored. A date alone on its line, or closing a line that
/// is not an example in the prompt, is a candidate; the last candidate wins,
/// then the last date seen at all.
pub fn answer_date(lines: &[String]) -> String {
    let mut candidates: Vec<&str> = Vec::new();
    let mut any: Vec<&str> = Vec::new();

    for line in lines {
        if FOOTER_RE.is_match(line) {
            continue;
        }
        let dates: Vec<&str> = DATE_RE.find_iter(line).map(|m| m.as_str()).collect();
        if dates.is_empty() {
            continue;
        }
        any.extend(&dates);

        let stripped = line.trim();
        if DATE_ONLY_RE.is_match(stripped) {
            candidates.extend(&dates);
        } else if dates.len() == 1 && stripped.ends_with(dates[0]) && !EXAMPLE_RE.is_match(line) {
            candidates.extend(&dates);
        }
    }

    candidates
        .last()
        .or(any.last())
        .map(|d| d.to_string())
        .unwrap_or_else(|| EMPTY_SENTINEL.to_string())
}
