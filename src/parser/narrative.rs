use std::sync::LazyLock;

use regex::Regex;

use super::slicer::{compile_pattern, AnchorPattern};
use crate::error::Result;

static LIMIT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?im)^\s*\(?\s*limit\s*[,\s]*\d{1,2}(?:,\d{3})?\s*characters\)?\.?\s*$").unwrap()
});
static PROMPT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?im)^Describe\s+in\s+the\s+field\s+below.*?$").unwrap());
static BLANK_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?m)^\s*$").unwrap());
static SPACES_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[ \t]+").unwrap());
static PARAGRAPHS_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\n{3,}").unwrap());
static WS_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

/// Page chrome that recurs on every page of the form.
pub const DEFAULT_BOILERPLATE: &[&str] = &[
    r"^NOFO Section.*?$",
    r"^Describe in the field below.*?$",
    r"^\(?\s*limit\s*[,\s]*\d{1,2}(?:,\d{3})?\s*characters\)?\.?\s*$",
    r"^FY\d{4}\s+CoC Application.*?$",
    r"^Applicant:.*?$",
    r"^Project:.*?$",
    r"^Page\s+\d+.*?$",
];

/// Line patterns blanked out of narrative text wherever they occur.
#[derive(Debug, Clone)]
pub struct Boilerplate {
    patterns: Vec<Regex>,
}

impl Boilerplate {
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Result<Self> {
        let patterns = patterns
            .iter()
            .map(|p| compile_pattern(p.as_ref()))
            .collect::<Result<Vec<_>>>()?;
        Ok(Boilerplate { patterns })
    }

    pub fn scrub(&self, text: &str) -> String {
        let mut out = text.to_string();
        for re in &self.patterns {
            out = re.replace_all(&out, "").into_owned();
        }
        out
    }
}

impl Default for Boilerplate {
    fn default() -> Self {
        Boilerplate::new(DEFAULT_BOILERPLATE).expect("built-in boilerplate patterns compile")
    }
}

/// Pulls a respondent's free-text answer out of a sliced section.
#[derive(Debug, Clone, Default)]
pub struct NarrativeExtractor {
    boilerplate: Boilerplate,
}

impl NarrativeExtractor {
    pub fn new(boilerplate: Boilerplate) -> Self {
        NarrativeExtractor { boilerplate }
    }

    pub fn extract(
        &self,
        lines: &[String],
        start: &AnchorPattern,
        stop: &AnchorPattern,
        keep_paragraphs: bool,
    ) -> String {
        self.extract_text(&lines.join("\n"), start, stop, keep_paragraphs)
    }

    /// The answer is whatever follows the earliest start match, past the
    /// character-limit marker (or the "describe" prompt), up to the earliest
    /// stop match. Returns an empty string when no start pattern matches.
    pub fn extract_text(
        &self,
        text: &str,
        start: &AnchorPattern,
        stop: &AnchorPattern,
        keep_paragraphs: bool,
    ) -> String {
        let Some(anchor_end) = earliest(start, text).map(|m| m.end()) else {
            return String::new();
        };
        let mut tail = &text[anchor_end..];

        if let Some(limit) = LIMIT_RE.find(tail) {
            tail = skip_blank(&tail[limit.end()..]);
        } else if let Some(prompt) = PROMPT_RE.find(tail) {
            let after = &tail[prompt.end()..];
            if let Some(blank) = BLANK_RE.find(after) {
                tail = &after[blank.end()..];
            }
        }

        if let Some(m) = earliest(stop, tail) {
            tail = &tail[..m.start()];
        }

        let scrubbed = self.boilerplate.scrub(tail);
        if keep_paragraphs {
            let spaced = SPACES_RE.replace_all(&scrubbed, " ");
            PARAGRAPHS_RE.replace_all(&spaced, "\n\n").trim().to_string()
        } else {
            WS_RE.replace_all(&scrubbed, " ").trim().to_string()
        }
    }
}

fn earliest<'t>(patterns: &AnchorPattern, text: &'t str) -> Option<regex::Match<'t>> {
    patterns
        .regexes()
        .iter()
        .filter_map(|re| re.find(text))
        .min_by_key(|m| m.start())
}

fn skip_blank(text: &str) -> &str {
    match BLANK_RE.find(text) {
        Some(blank) => &text[blank.end()..],
        None => text,
    }
}
