use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::tokens::CategoricalToken;
use crate::error::Result;

const TOK: &str = r"(Yes|No|Nonexistent)";

static LEAD_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(\d+)\.\s*(.*)$").unwrap());
static DUAL_LEAD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+)[.)\-]?\s+(.*)$").unwrap());
static TRIPLE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"(?i)\b{TOK}\s+{TOK}\s+{TOK}\b$")).unwrap()
});
static SINGLE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(&format!(r"(?i)\b{TOK}\b$")).unwrap());
static ANY_TOKEN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(&format!(r"(?i)\b{TOK}\b")).unwrap());
static DUAL_TAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(&format!(r"(?i)\b{TOK}\s+{TOK}\s*$")).unwrap());
static WS_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

/// Which answer-grid shape a section uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GridVariant {
    Triple,
    Dual,
    Single,
}

impl GridVariant {
    pub fn width(&self) -> usize {
        match self {
            GridVariant::Triple => 3,
            GridVariant::Dual => 2,
            GridVariant::Single => 1,
        }
    }
}

/// One numbered row of a categorical answer grid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GridRecord {
    pub index: u32,
    pub label: String,
    pub values: Vec<CategoricalToken>,
}

/// How repeated row indices are treated after parsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DedupPolicy {
    #[default]
    KeepAll,
    KeepFirst,
}

/// Parse `lines` with the given variant.
pub fn parse_grid(variant: GridVariant, lines: &[String]) -> Result<Vec<GridRecord>> {
    match variant {
        GridVariant::Triple => parse_triple(lines),
        GridVariant::Dual => parse_dual(lines),
        GridVariant::Single => parse_single(lines),
    }
}

/// Rows ending in three answer tokens, e.g. `3. Law Enforcement Yes No Yes`.
pub fn parse_triple(lines: &[String]) -> Result<Vec<GridRecord>> {
    let rows = accumulate(lines, &LEAD_RE, |buf| TRIPLE_RE.is_match(buf));
    let mut records = Vec::with_capacity(rows.len());
    for (index, full) in rows {
        let Some(caps) = TRIPLE_RE.captures(&full) else {
            continue;
        };
        let label = collapse(&full[..caps.get_match().start()]);
        let values = (1..=3)
            .map(|i| CategoricalToken::parse(&caps[i], index))
            .collect::<Result<Vec<_>>>()?;
        records.push(GridRecord {
            index,
            label,
            values,
        });
    }
    Ok(sorted(records))
}

/// Rows ending in one answer token.
pub fn parse_single(lines: &[String]) -> Result<Vec<GridRecord>> {
    let rows = accumulate(lines, &LEAD_RE, |buf| SINGLE_RE.is_match(buf));
    let mut records = Vec::with_capacity(rows.len());
    for (index, full) in rows {
        let Some(caps) = SINGLE_RE.captures(&full) else {
            continue;
        };
        let label = collapse(&full[..caps.get_match().start()]);
        let value = CategoricalToken::parse(&caps[1], index)?;
        records.push(GridRecord {
            index,
            label,
            values: vec![value],
        });
    }
    Ok(sorted(records))
}

/// Rows carrying two answer tokens, taken as the last two tokens anywhere in
/// the accumulated text.
///
/// The tokens are cut from the label only when they sit together at the very
/// end; otherwise the label is the whole accumulated text, token words
/// included.
pub fn parse_dual(lines: &[String]) -> Result<Vec<GridRecord>> {
    let rows = accumulate(lines, &DUAL_LEAD_RE, |buf| {
        ANY_TOKEN_RE.find_iter(buf).take(2).count() >= 2
    });
    let mut records = Vec::with_capacity(rows.len());
    for (index, full) in rows {
        let tokens: Vec<&str> = ANY_TOKEN_RE.find_iter(&full).map(|m| m.as_str()).collect();
        if tokens.len() < 2 {
            continue;
        }
        let left = CategoricalToken::parse(tokens[tokens.len() - 2], index)?;
        let right = CategoricalToken::parse(tokens[tokens.len() - 1], index)?;
        let label = match DUAL_TAIL_RE.find(&full) {
            Some(tail) => full[..tail.start()].trim().to_string(),
            None => full.clone(),
        };
        records.push(GridRecord {
            index,
            label,
            values: vec![left, right],
        });
    }
    Ok(sorted(records))
}

/// Apply the caller's duplicate policy; input order decides which row is
/// "first".
pub fn dedup(records: Vec<GridRecord>, policy: DedupPolicy) -> Vec<GridRecord> {
    match policy {
        DedupPolicy::KeepAll => records,
        DedupPolicy::KeepFirst => {
            let mut seen = std::collections::HashSet::new();
            records.into_iter().filter(|r| seen.insert(r.index)).collect()
        }
    }
}

/// `(index, buffer)` for every `N.` row whose buffer satisfies `done`.
pub(crate) fn numbered_rows<F>(lines: &[String], done: F) -> Vec<(u32, String)>
where
    F: Fn(&str) -> bool,
{
    accumulate(lines, &LEAD_RE, done)
}

/// Collect `(index, buffer)` for every numbered row whose buffer reached the
/// terminal condition. A row interrupted by the next numbered line is
/// dropped.
fn accumulate<F>(lines: &[String], lead: &Regex, done: F) -> Vec<(u32, String)>
where
    F: Fn(&str) -> bool,
{
    let mut rows = Vec::new();
    let mut i = 0;
    while i < lines.len() {
        let line = lines[i].trim();
        i += 1;
        let Some(caps) = lead.captures(line) else {
            continue;
        };
        let Ok(index) = caps[1].parse::<u32>() else {
            continue;
        };

        let mut buf = caps[2].to_string();
        while !done(&buf) && i < lines.len() {
            let next = lines[i].trim();
            if lead.is_match(next) {
                break;
            }
            if !buf.is_empty() {
                buf.push(' ');
            }
            buf.push_str(next);
            i += 1;
        }

        if done(&buf) {
            rows.push((index, buf));
        } else {
            debug!(index, partial = %buf, "numbered row without answer tokens, skipped");
        }
    }
    rows
}

fn collapse(s: &str) -> String {
    WS_RE.replace_all(s, " ").trim().to_string()
}

fn sorted(mut records: Vec<GridRecord>) -> Vec<GridRecord> {
    records.sort_by_key(|r| r.index);
    records
}

#[cfg(test)]
mod tests {
    use super::*;
    use CategoricalToken::*;

    fn lines(text: &str) -> Vec<String> {
        text.lines().map(|l| l.to_string()).collect()
    }

    #[test]
    fn triple_single_line() {
        let recs = parse_triple(&lines("3. Some Label Yes No Nonexistent")).unwrap();
        assert_eq!(recs.len(), 1);
        assert_eq!(recs[0].index, 3);
        assert_eq!(recs[0].label, "Some Label");
        assert_eq!(recs[0].values, vec![Yes, No, Nonexistent]);
    }

    #[test]
    fn two_organization_page() {
        use crate::corpus::{Page, PageCorpus};
        use crate::parser::slicer::normalize_lines;

        let corpus = PageCorpus::new(vec![Page::new(
            1,
            "1. Organization A Yes No Nonexistent\n2. Organization B No No Yes",
        )])
        .unwrap();
        let recs = parse_triple(&normalize_lines(&corpus.pages()[0].text)).unwrap();
        assert_eq!(
            recs,
            vec![
                GridRecord {
                    index: 1,
                    label: "Organization A".into(),
                    values: vec![Yes, No, Nonexistent],
                },
                GridRecord {
                    index: 2,
                    label: "Organization B".into(),
                    values: vec![No, No, Yes],
                },
            ]
        );
    }

    #[test]
    fn triple_wrapped_label() {
        let text = "1. Affordable Housing Developer(s) Yes Yes No\n\
                    2. Agencies serving survivors of\n\
                    human trafficking and\n\
                    commercial sexual exploitation No Yes Yes";
        let recs = parse_triple(&lines(text)).unwrap();
        assert_eq!(recs.len(), 2);
        assert_eq!(recs[0].label, "Affordable Housing Developer(s)");
        assert_eq!(
            recs[1].label,
            "Agencies serving survivors of human trafficking and commercial sexual exploitation"
        );
        assert_eq!(recs[1].values, vec![No, Yes, Yes]);
    }

    #[test]
    fn triple_tokens_are_case_folded() {
        let recs = parse_triple(&lines("7. Hospital(s) YES no nonexistent")).unwrap();
        assert_eq!(recs[0].values, vec![Yes, No, Nonexistent]);
    }

    #[test]
    fn interrupted_row_is_dropped() {
        let text = "1. Label without answers\n\
                    that keeps going\n\
                    2. Second Label Yes No No";
        let recs = parse_triple(&lines(text)).unwrap();
        assert_eq!(recs.len(), 1);
        assert_eq!(recs[0].index, 2);
    }

    #[test]
    fn rows_sort_by_index_and_keep_duplicates() {
        let text = "4. Four No No No\n2. Two Yes Yes Yes\n2. Two again No No No";
        let recs = parse_triple(&lines(text)).unwrap();
        let idx: Vec<u32> = recs.iter().map(|r| r.index).collect();
        assert_eq!(idx, vec![2, 2, 4]);
        assert_eq!(recs[0].label, "Two");

        let deduped = dedup(recs, DedupPolicy::KeepFirst);
        let idx: Vec<u32> = deduped.iter().map(|r| r.index).collect();
        assert_eq!(idx, vec![2, 4]);
        assert_eq!(deduped[0].values, vec![Yes, Yes, Yes]);
    }

    #[test]
    fn non_numbered_lines_are_ignored() {
        let text = "Organization/Person Participated Voted\n1. State Government Yes No Yes";
        let recs = parse_triple(&lines(text)).unwrap();
        assert_eq!(recs.len(), 1);
        assert_eq!(recs[0].label, "State Government");
    }

    #[test]
    fn single_trailing_token() {
        let text = "1. Affirmatively Further Fair Housing? Yes\n\
                    2. Discrimination based on any protected\n\
                    classes under the Fair Housing Act? No";
        let recs = parse_single(&lines(text)).unwrap();
        assert_eq!(recs.len(), 2);
        assert_eq!(recs[0].values, vec![Yes]);
        assert_eq!(
            recs[1].label,
            "Discrimination based on any protected classes under the Fair Housing Act?"
        );
        assert_eq!(recs[1].values, vec![No]);
    }

    #[test]
    fn single_needs_token_at_the_end() {
        let recs = parse_single(&lines("1. Yes we did something else")).unwrap();
        assert!(recs.is_empty());
    }

    #[test]
    fn dual_strips_adjacent_tail() {
        let text = "1. Foster Care Yes No\n2) Health Care\nNo Yes";
        let recs = parse_dual(&lines(text)).unwrap();
        assert_eq!(recs.len(), 2);
        assert_eq!(recs[0].label, "Foster Care");
        assert_eq!(recs[0].values, vec![Yes, No]);
        assert_eq!(recs[1].label, "Health Care");
        assert_eq!(recs[1].values, vec![No, Yes]);
    }

    #[test]
    fn dual_non_adjacent_tokens_keep_label_text() {
        let text = "3. Youth Yes programs No (other)";
        let recs = parse_dual(&lines(text)).unwrap();
        assert_eq!(recs.len(), 1);
        assert_eq!(recs[0].values, vec![Yes, No]);
        assert_eq!(recs[0].label, "Youth Yes programs No (other)");
    }

    #[test]
    fn dual_uses_last_two_tokens() {
        let text = "5. Does no harm policy exist Yes Nonexistent";
        let recs = parse_dual(&lines(text)).unwrap();
        // accumulation stops once two tokens are present, so the first line
        // already holds "no", "Yes", "Nonexistent"; the last two win
        assert_eq!(recs[0].values, vec![Yes, Nonexistent]);
        assert_eq!(recs[0].label, "Does no harm policy exist");
    }
}
