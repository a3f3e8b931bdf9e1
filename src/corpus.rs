use std::path::Path;
use std::sync::LazyLock;

use anyhow::Context;
use regex::Regex;

use crate::error::{ExtractError, Result};

static PAGE_MARKER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^=== \[PAGE (\d+)/(\d+)\] ===[ \t]*\r?$").unwrap());

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    pub number: u32,
    pub text: String,
}

impl Page {
    pub fn new(number: u32, text: impl Into<String>) -> Self {
        Page {
            number,
            text: text.into(),
        }
    }
}

/// Ordered, read-only page texts of one document.
#[derive(Debug, Clone, Default)]
pub struct PageCorpus {
    pages: Vec<Page>,
}

impl PageCorpus {
    /// Page numbers must be positive and strictly increasing; gaps are fine.
    pub fn new(pages: Vec<Page>) -> Result<Self> {
        let mut last = 0;
        for page in &pages {
            if page.number <= last {
                return Err(ExtractError::InvalidCorpus(format!(
                    "page {} follows page {}",
                    page.number, last
                )));
            }
            last = page.number;
        }
        Ok(PageCorpus { pages })
    }

    /// Build a corpus from a text dump in the `=== [PAGE i/n] ===` layout.
    ///
    /// Text without markers is split on form feeds when it has any, and is
    /// otherwise a single page.
    pub fn from_marked_text(text: &str) -> Result<Self> {
        let markers: Vec<_> = PAGE_MARKER_RE.captures_iter(text).collect();
        if markers.is_empty() {
            return Ok(Self::from_unmarked(text));
        }

        let mut pages = Vec::with_capacity(markers.len());
        for (i, caps) in markers.iter().enumerate() {
            let whole = caps.get_match();
            let number = caps[1]
                .parse::<u32>()
                .map_err(|e| ExtractError::InvalidCorpus(format!("bad page number: {}", e)))?;
            let end = markers
                .get(i + 1)
                .map(|next| next.get_match().start())
                .unwrap_or(text.len());
            pages.push(Page::new(number, &text[whole.end()..end]));
        }
        Self::new(pages)
    }

    fn from_unmarked(text: &str) -> Self {
        let pages = if text.contains('\x0c') {
            text.split('\x0c')
                .enumerate()
                .map(|(i, body)| Page::new(i as u32 + 1, body))
                .collect()
        } else {
            vec![Page::new(1, text)]
        };
        PageCorpus { pages }
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {:?}", path))?;
        let corpus = Self::from_marked_text(&raw)
            .with_context(|| format!("Failed to split pages of {:?}", path))?;
        Ok(corpus)
    }

    pub fn pages(&self) -> &[Page] {
        &self.pages
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_page_markers() {
        let text = "\n\n=== [PAGE 1/3] ===\n\nfirst\n\n=== [PAGE 2/3] ===\n\nsecond\n\n=== [PAGE 3/3] ===\n\nthird";
        let corpus = PageCorpus::from_marked_text(text).unwrap();
        let numbers: Vec<u32> = corpus.pages().iter().map(|p| p.number).collect();
        assert_eq!(numbers, vec![1, 2, 3]);
        assert_eq!(corpus.pages()[1].text.trim(), "second");
        assert_eq!(corpus.pages()[2].text.trim(), "third");
    }

    #[test]
    fn unmarked_text_is_one_page() {
        let corpus = PageCorpus::from_marked_text("just text\nno markers").unwrap();
        assert_eq!(corpus.len(), 1);
        assert_eq!(corpus.pages()[0].number, 1);
    }

    #[test]
    fn form_feeds_split_pages() {
        let corpus = PageCorpus::from_marked_text("one\x0ctwo\x0cthree").unwrap();
        assert_eq!(corpus.len(), 3);
        assert_eq!(corpus.pages()[2].text, "three");
    }

    #[test]
    fn rejects_out_of_order_pages() {
        let err = PageCorpus::new(vec![Page::new(2, "a"), Page::new(2, "b")]).unwrap_err();
        assert!(matches!(err, ExtractError::InvalidCorpus(_)));
        assert!(PageCorpus::new(vec![Page::new(0, "a")]).is_err());
    }

    #[test]
    fn gaps_are_allowed() {
        let corpus = PageCorpus::new(vec![Page::new(1, "a"), Page::new(7, "b")]).unwrap();
        assert_eq!(corpus.len(), 2);
    }
}
