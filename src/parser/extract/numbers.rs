//! Numeric answers: counts typed after numbered questions, numbered rows
//! closing in a pair of counts, and regex captures over a whole section.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::{Captures, Regex};
use serde::Serialize;

use crate::parser::grid::numbered_rows;

static ITEM_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(\d+)\.\s+(.*)$").unwrap());
static NUMBER_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b\d+%?").unwrap());
static TRAILING_NUMBER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(\d+%?)\s*$").unwrap());
static PAIR_TAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(\d+)\s+(\d+)\s*$").unwrap());
static CHROME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(Applicant:|Project:|FY20\d{2}\s+CoC\s+Application|Page\s+\d+)").unwrap()
});
static WS_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

/// Lines searched below a question for its answer.
const ANSWER_LOOKAHEAD: usize = 10;

/// One numbered row that closes in two counts, e.g. the lived-experience
/// participation table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CountRow {
    pub index: u32,
    pub label: String,
    pub values: Vec<String>,
}

/// A compiled capture rule. Capture group `n` fills `columns[n - 1]`.
#[derive(Debug, Clone)]
pub struct CaptureRule {
    pub pattern: Regex,
    pub columns: Vec<String>,
    /// Pass over matches whose numeric groups are all bare years.
    pub skip_years: bool,
}

/// One value per numbered question `1.` through `items.`.
///
/// The answer is the number closing the question line, else the first number
/// on the lines below it, up to the next question. Bare years never count.
/// Questions that yield nothing are filled from the window's loose numbers in
/// reading order. Items listed in `percent_items` get a `%` suffix.
pub fn numbered_values(lines: &[String], items: u32, percent_items: &[u32]) -> Vec<String> {
    let mut values: Vec<String> = (1..=items)
        .map(|item| answer_after(lines, item).unwrap_or_default())
        .collect();

    if values.iter().any(|v| v.is_empty()) {
        let pool = loose_numbers(lines, items);
        for (slot, value) in values.iter_mut().enumerate() {
            if value.is_empty() {
                if let Some(n) = pool.get(slot) {
                    value.clone_from(n);
                }
            }
        }
    }

    for item in percent_items {
        let slot = item.checked_sub(1).and_then(|s| values.get_mut(s as usize));
        if let Some(v) = slot.filter(|v| !v.is_empty() && !v.ends_with('%')) {
            v.push('%');
        }
    }
    values
}

fn answer_after(lines: &[String], item: u32) -> Option<String> {
    let (at, question) = lines.iter().enumerate().find_map(|(at, line)| {
        let caps = ITEM_RE.captures(line)?;
        (caps[1].parse::<u32>().ok()? == item).then(|| (at, caps[2].to_string()))
    })?;

    if let Some(caps) = TRAILING_NUMBER_RE.captures(&question) {
        if !is_year(&caps[1]) {
            return Some(caps[1].to_string());
        }
    }

    for line in lines[at + 1..].iter().take(ANSWER_LOOKAHEAD) {
        if ITEM_RE.is_match(line) {
            break;
        }
        if CHROME_RE.is_match(line) {
            continue;
        }
        if let Some(tok) = NUMBER_RE.find_iter(line).map(|m| m.as_str()).find(|t| !is_year(t)) {
            return Some(tok.to_string());
        }
    }
    None
}

fn loose_numbers(lines: &[String], items: u32) -> Vec<String> {
    let mut out = Vec::new();
    for line in lines.iter().filter(|l| !CHROME_RE.is_match(l)) {
        for tok in NUMBER_RE.find_iter(line).map(|m| m.as_str()) {
            let enumerator = tok.parse::<u32>().is_ok_and(|n| (1..=items).contains(&n));
            if enumerator || is_year(tok) {
                continue;
            }
            out.push(tok.to_string());
            if out.len() == items as usize {
                return out;
            }
        }
    }
    out
}

fn is_year(token: &str) -> bool {
    !token.ends_with('%') && token.parse::<u32>().is_ok_and(|n| (1900..=2100).contains(&n))
}

/// Numbered rows closing in two counts. Wrapped labels are joined; a row
/// whose counts never show up is dropped. Sorted by index.
pub fn parse_count_pairs(lines: &[String]) -> Vec<CountRow> {
    let mut rows: Vec<CountRow> = numbered_rows(lines, |buf| PAIR_TAIL_RE.is_match(buf))
        .into_iter()
        .filter_map(|(index, buf)| {
            let caps = PAIR_TAIL_RE.captures(&buf)?;
            let label = WS_RE
                .replace_all(&buf[..caps.get_match().start()], " ")
                .trim()
                .to_string();
            Some(CountRow {
                index,
                label,
                values: vec![caps[1].to_string(), caps[2].to_string()],
            })
        })
        .collect();
    rows.sort_by_key(|r| r.index);
    rows
}

/// Run every rule over the window joined into one text; each rule takes its
/// first usable match. Columns of unmatched rules are absent.
pub fn capture_fields(lines: &[String], rules: &[CaptureRule]) -> BTreeMap<String, String> {
    let text = lines.join("\n");
    let mut out = BTreeMap::new();
    for rule in rules {
        let Some(caps) = rule
            .pattern
            .captures_iter(&text)
            .find(|caps| !(rule.skip_years && all_years(caps)))
        else {
            continue;
        };
        for (slot, column) in rule.columns.iter().enumerate() {
            if let Some(m) = caps.get(slot + 1) {
                let value = WS_RE.replace_all(m.as_str(), " ").trim().to_string();
                out.insert(column.clone(), value);
            }
        }
    }
    out
}

fn all_years(caps: &Captures) -> bool {
    let numeric: Vec<&str> = caps
        .iter()
        .skip(1)
        .flatten()
        .map(|m| m.as_str())
        .filter(|s| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit()))
        .collect();
    !numeric.is_empty() && numeric.iter().all(|s| is_year(s))
}
