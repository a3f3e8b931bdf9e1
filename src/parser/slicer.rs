use std::ops::Range;
use std::sync::LazyLock;

use regex::{Regex, RegexBuilder};
use tracing::{debug, trace};

use crate::corpus::PageCorpus;
use crate::error::{ExtractError, Result};

static WS_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

/// Priority-ordered anchor regexes. Earlier patterns win over later ones no
/// matter where on the pages they match, so specific headings must come
/// before generic numeric fallbacks.
#[derive(Debug, Clone)]
pub struct AnchorPattern {
    patterns: Vec<Regex>,
}

/// Where an anchor pattern first matched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Anchor {
    pub page: u32,
    pub matched: String,
}

impl AnchorPattern {
    /// Compile case-insensitive, multi-line patterns.
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Result<Self> {
        let patterns = patterns
            .iter()
            .map(|p| compile_pattern(p.as_ref()))
            .collect::<Result<Vec<_>>>()?;
        Ok(AnchorPattern { patterns })
    }

    pub fn empty() -> Self {
        AnchorPattern {
            patterns: Vec::new(),
        }
    }

    pub fn sources(&self) -> Vec<String> {
        self.patterns.iter().map(|r| r.as_str().to_string()).collect()
    }

    pub fn regexes(&self) -> &[Regex] {
        &self.patterns
    }

    /// First pattern (in priority order) that matches any page, scanning pages
    /// in order.
    pub fn find(&self, corpus: &PageCorpus) -> Option<Anchor> {
        for re in &self.patterns {
            for page in corpus.pages() {
                if let Some(m) = re.find(&page.text) {
                    return Some(Anchor {
                        page: page.number,
                        matched: m.as_str().to_string(),
                    });
                }
            }
        }
        None
    }
}

pub(crate) fn compile_pattern(pattern: &str) -> Result<Regex> {
    RegexBuilder::new(pattern)
        .case_insensitive(true)
        .multi_line(true)
        .build()
        .map_err(|source| ExtractError::InvalidPattern {
            pattern: pattern.to_string(),
            source,
        })
}

/// Slice one subsection out of the corpus as normalized lines.
///
/// The body starts right after the start anchor's matched text and ends at
/// the first line of the stop anchor's matched text. Without a usable stop
/// anchor the window runs `lookahead` pages past the start page.
pub fn slice_section(
    corpus: &PageCorpus,
    start: &AnchorPattern,
    stop: &AnchorPattern,
    lookahead: u32,
) -> Result<Vec<String>> {
    let start_anchor = start
        .find(corpus)
        .ok_or_else(|| ExtractError::StartAnchorNotFound {
            patterns: start.sources(),
        })?;

    let stop_anchor = stop.find(corpus).filter(|a| a.page >= start_anchor.page);
    let stop_page = match &stop_anchor {
        Some(a) => a.page,
        None => start_anchor.page.saturating_add(lookahead),
    };
    debug!(
        start_page = start_anchor.page,
        stop_page,
        has_stop = stop_anchor.is_some(),
        "sliced section window"
    );

    let stitched = corpus
        .pages()
        .iter()
        .filter(|p| p.number >= start_anchor.page && p.number <= stop_page)
        .map(|p| p.text.as_str())
        .collect::<Vec<_>>()
        .join("\n");

    let mut body = match find_literal(&stitched, &start_anchor.matched) {
        Some(r) => &stitched[r.end..],
        None => {
            trace!(matched = %start_anchor.matched, "start text not relocated, using whole window");
            stitched.as_str()
        }
    };

    if let Some(anchor) = &stop_anchor {
        if let Some(first_line) = anchor.matched.lines().find(|l| !l.trim().is_empty()) {
            if let Some(r) = find_literal(body, first_line) {
                body = &body[..r.start];
            }
        }
    }

    Ok(normalize_lines(body))
}

/// Collapse internal whitespace, trim, and drop blank lines.
pub fn normalize_lines(text: &str) -> Vec<String> {
    text.lines()
        .map(|l| WS_RE.replace_all(l, " ").trim().to_string())
        .filter(|l| !l.is_empty())
        .collect()
}

fn find_literal(haystack: &str, needle: &str) -> Option<Range<usize>> {
    let re = RegexBuilder::new(&regex::escape(needle))
        .case_insensitive(true)
        .build()
        .ok()?;
    re.find(haystack).map(|m| m.range())
}
