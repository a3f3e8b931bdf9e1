use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

static ROW_START_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d+%\s").unwrap());
static PERCENT_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(\d+)%").unwrap());

const HEADER_KEYWORDS: &[&str] = &[
    "Public Housing Agency Name",
    "Enter the Percent of New Admissions",
    "During FY 2023 who were experiencing",
    "homelessness at entry",
    "participants no longer",
    "supportive services",
    "Moving On?",
    "CoC-PHA Crosswalk Report",
    "Enter information in the chart below",
    "FY2024 CoC Application Page",
];

const CHROME_PREFIXES: &[&str] = &["Applicant:", "Project:", "1C-7.", "NOFO Section"];

/// One public housing agency row of the 1C-7 table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PhaRow {
    pub pha_name: String,
    pub ph_hhm: String,
    pub ph_limit_hhm: String,
    pub psh: String,
}

struct Pending<'a> {
    line: &'a str,
    continuation: Vec<&'a str>,
}

/// Parse the PHA table. A line with a percentage opens a row; lines that
/// follow it (until the next percentage line) continue the agency name.
pub fn parse_pha_table(lines: &[String]) -> Vec<PhaRow> {
    let mut rows = Vec::new();
    let mut pending: Option<Pending> = None;

    for line in lines {
        if HEADER_KEYWORDS.iter().any(|k| line.contains(k)) {
            continue;
        }
        if CHROME_PREFIXES.iter().any(|p| line.starts_with(p)) {
            continue;
        }

        if ROW_START_RE.is_match(line) {
            if let Some(done) = pending.take() {
                rows.extend(flush(&done));
            }
            pending = Some(Pending {
                line: line.as_str(),
                continuation: Vec::new(),
            });
        } else if let Some(p) = pending.as_mut() {
            p.continuation.push(line.as_str());
        }
    }

    if let Some(done) = pending {
        rows.extend(flush(&done));
    }
    rows
}

fn flush(p: &Pending) -> Option<PhaRow> {
    let caps = PERCENT_RE.captures(p.line)?;
    let whole = caps.get(0)?;

    let mut name = p.line[..whole.start()].trim().to_string();
    if !p.continuation.is_empty() {
        name.push(' ');
        name.push_str(&p.continuation.join(" "));
    }

    let tokens: Vec<&str> = p.line[whole.end()..].split_whitespace().collect();
    let (psh, limit) = tokens.split_last()?;
    if limit.is_empty() {
        return None;
    }

    Some(PhaRow {
        pha_name: name,
        ph_hhm: format!("{}%", &caps[1]),
        ph_limit_hhm: limit.join(" "),
        psh: psh.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(text: &str) -> Vec<String> {
        text.lines().map(|l| l.to_string()).collect()
    }

    #[test]
    fn parses_rows_with_wrapped_names() {
        let text = "1C-7. Public Housing Agencies within Your CoC's Geographic Area\n\
                    Public Housing Agency Name\n\
                    Housing Authority of the City 12% Yes-Both Yes\n\
                    Applicant: Example CoC XX-500\n\
                    County Department of Community 4% No No\n\
                    Affairs";
        let rows = parse_pha_table(&lines(text));
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].pha_name, "Housing Authority of the City");
        assert_eq!(rows[0].ph_hhm, "12%");
        assert_eq!(rows[0].ph_limit_hhm, "Yes-Both");
        assert_eq!(rows[0].psh, "Yes");
        assert_eq!(rows[1].pha_name, "County Department of Community Affairs");
        assert_eq!(rows[1].ph_limit_hhm, "No");
        assert_eq!(rows[1].psh, "No");
    }

    #[test]
    fn short_rows_are_dropped() {
        let rows = parse_pha_table(&lines("Tiny Agency 3% Yes"));
        assert!(rows.is_empty());
    }
}
