use regex::Regex;
use serde::Serialize;

use crate::corpus::PageCorpus;
use crate::error::Result;
use crate::parser::slicer::compile_pattern;

/// A header field and where it was found.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MetaField {
    pub value: String,
    pub page: u32,
    pub matched: String,
}

/// 1A applicant header.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CocMetadata {
    pub coc_number: Option<MetaField>,
    pub coc_name: Option<MetaField>,
    pub collab_app: Option<MetaField>,
    pub designation: Option<MetaField>,
    pub hmis_lead: Option<MetaField>,
}

impl CocMetadata {
    /// Row columns in form order; missing fields are blank.
    pub fn columns(&self) -> Vec<(String, String)> {
        let value = |f: &Option<MetaField>| f.as_ref().map(|m| m.value.clone()).unwrap_or_default();
        vec![
            ("1a_1a".to_string(), value(&self.coc_name)),
            ("1a_1b".to_string(), value(&self.coc_number)),
            ("1a_2".to_string(), value(&self.collab_app)),
            ("1a_3".to_string(), value(&self.designation)),
            ("1a_4".to_string(), value(&self.hmis_lead)),
        ]
    }
}

/// Scan all pages for the 1A header fields, falling back to the
/// `Applicant:` page footer for CoC number and name.
pub fn extract_metadata(corpus: &PageCorpus) -> Result<CocMetadata> {
    let first = |patterns: &[&str]| -> Result<Option<MetaField>> {
        for p in patterns {
            if let Some(found) = find_first(&compile_pattern(p)?, corpus) {
                return Ok(Some(found));
            }
        }
        Ok(None)
    };

    Ok(CocMetadata {
        coc_number: first(&[
            r"CoC\s+(?:Number|ID)\s*[:\-]\s*([A-Z]{2}\-\d{3})",
            r"Applicant:\s*(?:.+?)\s+([A-Z]{2}\-\d{3})\b",
        ])?,
        coc_name: first(&[
            r"CoC\s+(?:Name|Title)\s*[:\-]\s*([^\n]+?)\s*(?:\r?\n|$)",
            r"Applicant:\s*([A-Za-z0-9 ,&'()\-/]+?)\s+[A-Z]{2}\-\d{3}\b",
        ])?,
        collab_app: first(&[r"Collaborative Applicant(?:\s*Name)?\s*[:\-]\s*([^\n]+?)\s*(?:\r?\n|$)"])?,
        designation: first(&[r"CoC\s+Designation\s*[:\-]\s*([A-Z]{1,3})"])?,
        hmis_lead: first(&[r"HMIS\s+Lead\s*[:\-]\s*([^\n]+?)\s*(?:\r?\n|$)"])?,
    })
}

/// First match over the pages in order; the value is capture group 1 when
/// the pattern has one.
pub fn find_first(re: &Regex, corpus: &PageCorpus) -> Option<MetaField> {
    corpus.pages().iter().find_map(|page| {
        let caps = re.captures(&page.text)?;
        let whole = caps.get(0)?;
        let value = caps.get(1).unwrap_or(whole).as_str().trim().to_string();
        Some(MetaField {
            value,
            page: page.number,
            matched: whole.as_str().trim().to_string(),
        })
    })
}
