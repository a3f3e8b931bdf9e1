use thiserror::Error;

/// Failures raised by the slicing, parsing and spec-loading layers.
///
/// Soft gaps (a numbered row that never reached its answer tokens) and empty
/// narratives are not errors; they surface as missing rows and empty strings.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("start anchor not found, tried: {patterns:?}")]
    StartAnchorNotFound { patterns: Vec<String> },
    #[error("unexpected token '{value}' in row {index}")]
    IntegrityViolation { index: u32, value: String },
    #[error("invalid pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
    #[error("invalid page corpus: {0}")]
    InvalidCorpus(String),
    #[error("spec file error: {0}")]
    SpecFormat(#[from] serde_json::Error),
    #[error("duplicate spec key '{0}'")]
    DuplicateSpec(String),
    #[error("pattern '{pattern}' has {groups} capture groups but names {columns} columns")]
    CaptureMismatch {
        pattern: String,
        groups: usize,
        columns: usize,
    },
    #[error("section '{key}': {source}")]
    Section {
        key: String,
        #[source]
        source: Box<ExtractError>,
    },
}

impl ExtractError {
    pub(crate) fn in_section(self, key: &str) -> Self {
        ExtractError::Section {
            key: key.to_string(),
            source: Box::new(self),
        }
    }

    /// The underlying error with any section wrapping removed.
    pub fn root(&self) -> &ExtractError {
        match self {
            ExtractError::Section { source, .. } => source.root(),
            other => other,
        }
    }
}

pub type Result<T> = std::result::Result<T, ExtractError>;
