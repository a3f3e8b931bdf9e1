//! Structured answer extraction for paginated CoC application text.
//!
//! A [`PageCorpus`] is sliced into subsections by priority-ordered anchor
//! patterns, each subsection is handed to the parser its [`specs::Spec`]
//! names, and the results are merged into one mapping per document.

pub mod corpus;
pub mod db;
pub mod dispatch;
pub mod error;
pub mod export;
pub mod parser;
pub mod row;
pub mod settings;
pub mod specs;

pub use corpus::{Page, PageCorpus};
pub use dispatch::{Dispatcher, SectionValue, EMPTY_SENTINEL};
pub use error::{ExtractError, Result};
pub use parser::{process_document, DocumentResult};
pub use row::{build_row, Row};
pub use specs::SpecRegistry;
