pub mod extract;
pub mod grid;
pub mod narrative;
pub mod slicer;
pub mod tokens;

use serde::Serialize;
use tracing::debug;

use crate::corpus::PageCorpus;
use crate::dispatch::{Dispatcher, SectionResults};
use crate::error::Result;
use extract::meta::{self, CocMetadata};

/// Everything read from one application.
#[derive(Debug, Clone, Serialize)]
pub struct DocumentResult {
    pub metadata: CocMetadata,
    pub sections: SectionResults,
}

/// Two passes: applicant header, then every section spec.
pub fn process_document(corpus: &PageCorpus, dispatcher: &Dispatcher) -> Result<DocumentResult> {
    let metadata = meta::extract_metadata(corpus)?;
    let sections = dispatcher.run(corpus)?;
    debug!(pages = corpus.len(), sections = sections.len(), "document processed");
    Ok(DocumentResult { metadata, sections })
}

// ── Tests ──
