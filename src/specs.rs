//! Declarative section specifications.
//!
//! A spec file lists every subsection the dispatcher should read, in form
//! order. Each entry names its anchors and the parser that handles its body;
//! the registry compiles all patterns once when the file is loaded.
//!
//! Anchor lists are priority-ordered: the first pattern that matches any page
//! wins, regardless of where later patterns would have matched. Put the
//! specific titled heading before the bare `1C-4.` style fallback.

use std::collections::HashSet;
use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ExtractError, Result};
use crate::parser::extract::numbers::CaptureRule;
use crate::parser::grid::{DedupPolicy, GridVariant};
use crate::parser::narrative::{Boilerplate, DEFAULT_BOILERPLATE};
use crate::parser::slicer::{compile_pattern, AnchorPattern};
use crate::parser::tokens::CategoricalToken;

const BUILTIN_SPECS: &str = include_str!("../specs/coc_2024.json");

/// Inner start anchors for narratives that don't name their own.
const DEFAULT_NARRATIVE_START: &[&str] = &[
    r"^NOFO\s+Section.*$",
    r"^Describe\s+in\s+the\s+field\s+below.*$",
];

/// Any subsection header such as `1C-4b.` or `2A-1.`.
const DEFAULT_NARRATIVE_STOP: &[&str] = &[r"^\s*[1-4I][A-E][-–]\d+[a-z]?\.(?:\s|$)"];

fn default_lookahead() -> u32 {
    3
}

fn default_true() -> bool {
    true
}

fn default_gate_item() -> u32 {
    1
}

fn default_answer_item() -> u32 {
    2
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpecFile {
    pub form: String,
    /// Replaces the built-in boilerplate library when present.
    #[serde(default)]
    pub boilerplate: Option<Vec<String>>,
    pub specs: Vec<SpecConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpecConfig {
    pub key: String,
    /// Output column prefix; defaults to the key.
    #[serde(default)]
    pub column: Option<String>,
    pub start: Vec<String>,
    #[serde(default)]
    pub stop: Vec<String>,
    #[serde(default = "default_lookahead")]
    pub lookahead: u32,
    /// Number of numbered items the form declares for this section.
    #[serde(default)]
    pub max_index: u32,
    #[serde(flatten)]
    pub kind: KindConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum KindConfig {
    Triple {
        columns: [String; 3],
        #[serde(default)]
        post: Vec<PostTransform>,
    },
    Dual {
        columns: [String; 2],
        #[serde(default)]
        post: Vec<PostTransform>,
    },
    Single {
        #[serde(default)]
        post: Vec<PostTransform>,
    },
    Narrative {
        #[serde(default)]
        narrative_start: Vec<String>,
        #[serde(default)]
        narrative_stop: Vec<String>,
        #[serde(default = "default_true")]
        keep_paragraphs: bool,
    },
    LastToken {
        /// Tokens that count as the answer; empty takes the whole vocabulary.
        #[serde(default)]
        accept: Vec<CategoricalToken>,
    },
    Dates,
    AnswerDate,
    PhaTable,
    NumberedValues {
        #[serde(default)]
        percent_items: Vec<u32>,
    },
    RowPairs {
        columns: [String; 2],
    },
    Captures {
        rules: Vec<CaptureConfig>,
    },
    /// A yes/no item that unlocks a free-text item of the same section.
    GatedNarrative {
        #[serde(default = "default_gate_item")]
        gate_item: u32,
        #[serde(default = "default_answer_item")]
        answer_item: u32,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureConfig {
    pub pattern: String,
    /// One output column per capture group, in group order.
    pub columns: Vec<String>,
    #[serde(default)]
    pub skip_years: bool,
}

/// Cleanup applied to a parsed grid, in listed order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PostTransform {
    KeepFirst,
    IndexRange(u32, u32),
}

impl PostTransform {
    pub fn dedup_policy(&self) -> Option<DedupPolicy> {
        match self {
            PostTransform::KeepFirst => Some(DedupPolicy::KeepFirst),
            PostTransform::IndexRange(..) => None,
        }
    }
}

/// A compiled spec, ready to run.
#[derive(Debug, Clone)]
pub struct Spec {
    pub key: String,
    pub column: String,
    pub start: AnchorPattern,
    pub stop: AnchorPattern,
    pub lookahead: u32,
    pub max_index: u32,
    pub kind: SpecKind,
}

#[derive(Debug, Clone)]
pub enum SpecKind {
    Grid {
        variant: GridVariant,
        columns: Vec<String>,
        post: Vec<PostTransform>,
    },
    Narrative {
        start: AnchorPattern,
        stop: AnchorPattern,
        keep_paragraphs: bool,
    },
    LastToken {
        accept: Vec<CategoricalToken>,
    },
    Dates,
    AnswerDate,
    PhaTable,
    NumberedValues {
        percent_items: Vec<u32>,
    },
    CountPairs {
        columns: Vec<String>,
    },
    Captures {
        rules: Vec<CaptureRule>,
    },
    GatedNarrative {
        gate_item: u32,
        answer_item: u32,
        answer_start: AnchorPattern,
        stop: AnchorPattern,
    },
}

impl SpecKind {
    pub fn name(&self) -> &'static str {
        match self {
            SpecKind::Grid {
                variant: GridVariant::Triple,
                ..
            } => "triple",
            SpecKind::Grid {
                variant: GridVariant::Dual,
                ..
            } => "dual",
            SpecKind::Grid {
                variant: GridVariant::Single,
                ..
            } => "single",
            SpecKind::Narrative { .. } => "narrative",
            SpecKind::LastToken { .. } => "last_token",
            SpecKind::Dates => "dates",
            SpecKind::AnswerDate => "answer_date",
            SpecKind::PhaTable => "pha_table",
            SpecKind::NumberedValues { .. } => "numbered_values",
            SpecKind::CountPairs { .. } => "row_pairs",
            SpecKind::Captures { .. } => "captures",
            SpecKind::GatedNarrative { .. } => "gated_narrative",
        }
    }
}

/// All specs of one form, compiled, in form order.
#[derive(Debug, Clone)]
pub struct SpecRegistry {
    form: String,
    specs: Vec<Spec>,
    boilerplate: Boilerplate,
}

impl SpecRegistry {
    /// The 2024 CoC application specs shipped with the crate.
    pub fn builtin() -> Result<Self> {
        Self::from_json(BUILTIN_SPECS)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let file: SpecFile = serde_json::from_str(json)?;
        Self::compile(file)
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read spec file {:?}", path))?;
        let registry =
            Self::from_json(&raw).with_context(|| format!("Failed to load specs from {:?}", path))?;
        Ok(registry)
    }

    pub fn compile(file: SpecFile) -> Result<Self> {
        let boilerplate = match &file.boilerplate {
            Some(patterns) => Boilerplate::new(patterns)?,
            None => Boilerplate::new(DEFAULT_BOILERPLATE)?,
        };

        let mut seen = HashSet::new();
        let mut specs = Vec::with_capacity(file.specs.len());
        for cfg in file.specs {
            if !seen.insert(cfg.key.clone()) {
                return Err(ExtractError::DuplicateSpec(cfg.key));
            }
            specs.push(compile_spec(cfg)?);
        }
        debug!(form = %file.form, specs = specs.len(), "compiled spec registry");

        Ok(SpecRegistry {
            form: file.form,
            specs,
            boilerplate,
        })
    }

    pub fn form(&self) -> &str {
        &self.form
    }

    pub fn specs(&self) -> &[Spec] {
        &self.specs
    }

    pub fn get(&self, key: &str) -> Option<&Spec> {
        self.specs.iter().find(|s| s.key == key)
    }

    pub fn boilerplate(&self) -> &Boilerplate {
        &self.boilerplate
    }
}

fn compile_spec(cfg: SpecConfig) -> Result<Spec> {
    let kind = match cfg.kind {
        KindConfig::Triple { columns, post } => SpecKind::Grid {
            variant: GridVariant::Triple,
            columns: columns.to_vec(),
            post,
        },
        KindConfig::Dual { columns, post } => SpecKind::Grid {
            variant: GridVariant::Dual,
            columns: columns.to_vec(),
            post,
        },
        KindConfig::Single { post } => SpecKind::Grid {
            variant: GridVariant::Single,
            columns: vec!["value".to_string()],
            post,
        },
        KindConfig::Narrative {
            narrative_start,
            narrative_stop,
            keep_paragraphs,
        } => SpecKind::Narrative {
            start: or_default(&narrative_start, DEFAULT_NARRATIVE_START)?,
            stop: or_default(&narrative_stop, DEFAULT_NARRATIVE_STOP)?,
            keep_paragraphs,
        },
        KindConfig::LastToken { accept } => SpecKind::LastToken { accept },
        KindConfig::Dates => SpecKind::Dates,
        KindConfig::AnswerDate => SpecKind::AnswerDate,
        KindConfig::PhaTable => SpecKind::PhaTable,
        KindConfig::NumberedValues { percent_items } => SpecKind::NumberedValues { percent_items },
        KindConfig::RowPairs { columns } => SpecKind::CountPairs {
            columns: columns.to_vec(),
        },
        KindConfig::Captures { rules } => SpecKind::Captures {
            rules: rules
                .into_iter()
                .map(compile_capture)
                .collect::<Result<Vec<_>>>()?,
        },
        KindConfig::GatedNarrative {
            gate_item,
            answer_item,
        } => SpecKind::GatedNarrative {
            gate_item,
            answer_item,
            answer_start: AnchorPattern::new(&[format!(r"^\s*{answer_item}\.\s.*$")])?,
            stop: AnchorPattern::new(DEFAULT_NARRATIVE_STOP)?,
        },
    };

    Ok(Spec {
        column: cfg.column.unwrap_or_else(|| cfg.key.clone()),
        start: AnchorPattern::new(&cfg.start)?,
        stop: AnchorPattern::new(&cfg.stop)?,
        lookahead: cfg.lookahead,
        max_index: cfg.max_index,
        key: cfg.key,
        kind,
    })
}

fn compile_capture(cfg: CaptureConfig) -> Result<CaptureRule> {
    let pattern = compile_pattern(&cfg.pattern)?;
    let groups = pattern.captures_len() - 1;
    if groups != cfg.columns.len() {
        return Err(ExtractError::CaptureMismatch {
            pattern: cfg.pattern,
            groups,
            columns: cfg.columns.len(),
        });
    }
    Ok(CaptureRule {
        pattern,
        columns: cfg.columns,
        skip_years: cfg.skip_years,
    })
}

fn or_default(patterns: &[String], fallback: &[&str]) -> Result<AnchorPattern> {
    if patterns.is_empty() {
        AnchorPattern::new(fallback)
    } else {
        AnchorPattern::new(patterns)
    }
}
