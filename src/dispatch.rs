use std::collections::BTreeMap;

use serde::Serialize;
use tracing::{debug, info_span};

use crate::corpus::PageCorpus;
use crate::error::Result;
use crate::parser::extract::numbers::{self, CountRow};
use crate::parser::extract::{answers, pha};
use crate::parser::grid::{self, GridRecord};
use crate::parser::narrative::NarrativeExtractor;
use crate::parser::slicer::{slice_section, AnchorPattern};
use crate::parser::tokens::CategoricalToken;
use crate::specs::{PostTransform, Spec, SpecKind, SpecRegistry};

/// Marks "nothing was found" as opposed to an answer left blank on purpose.
pub const EMPTY_SENTINEL: &str = "Empty";

/// What one spec produced.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case", tag = "type", content = "value")]
pub enum SectionValue {
    Grid(Vec<GridRecord>),
    Narrative(String),
    Scalar(String),
    Values(Vec<String>),
    Pha(Vec<pha::PhaRow>),
    Counts(Vec<CountRow>),
    Fields(BTreeMap<String, String>),
    /// A gate token and the narrative it unlocks (empty unless the gate is `Yes`).
    Gated { gate: String, answer: String },
}

pub type SectionResults = BTreeMap<String, SectionValue>;

/// Runs every spec of a registry against one document.
#[derive(Debug, Clone)]
pub struct Dispatcher<'r> {
    registry: &'r SpecRegistry,
    narratives: NarrativeExtractor,
}

impl<'r> Dispatcher<'r> {
    pub fn new(registry: &'r SpecRegistry) -> Self {
        Dispatcher {
            registry,
            narratives: NarrativeExtractor::new(registry.boilerplate().clone()),
        }
    }

    pub fn registry(&self) -> &'r SpecRegistry {
        self.registry
    }

    /// Run all specs; the first fatal error aborts the document.
    pub fn run(&self, corpus: &PageCorpus) -> Result<SectionResults> {
        let mut out = SectionResults::new();
        for spec in self.registry.specs() {
            let value = self
                .run_spec(spec, corpus)
                .map_err(|e| e.in_section(&spec.key))?;
            out.insert(spec.key.clone(), value);
        }
        Ok(out)
    }

    pub fn run_spec(&self, spec: &Spec, corpus: &PageCorpus) -> Result<SectionValue> {
        let _span = info_span!("section", key = %spec.key, kind = spec.kind.name()).entered();
        let lines = slice_section(corpus, &spec.start, &spec.stop, spec.lookahead)?;
        debug!(lines = lines.len(), "section sliced");

        let value = match &spec.kind {
            SpecKind::Grid { variant, post, .. } => {
                let records = grid::parse_grid(*variant, &lines)?;
                SectionValue::Grid(apply_post(records, post))
            }
            SpecKind::Narrative {
                start,
                stop,
                keep_paragraphs,
            } => SectionValue::Narrative(self.narratives.extract(&lines, start, stop, *keep_paragraphs)),
            SpecKind::LastToken { accept } => SectionValue::Scalar(answers::last_token(&lines, accept)),
            SpecKind::Dates => SectionValue::Values(answers::all_dates(&lines)),
            SpecKind::AnswerDate => SectionValue::Scalar(answers::answer_date(&lines)),
            SpecKind::PhaTable => SectionValue::Pha(pha::parse_pha_table(&lines)),
            SpecKind::NumberedValues { percent_items } => {
                SectionValue::Values(numbers::numbered_values(&lines, spec.max_index, percent_items))
            }
            SpecKind::CountPairs { .. } => SectionValue::Counts(numbers::parse_count_pairs(&lines)),
            SpecKind::Captures { rules } => SectionValue::Fields(numbers::capture_fields(&lines, rules)),
            SpecKind::GatedNarrative {
                gate_item,
                answer_start,
                stop,
                ..
            } => self.gated(&lines, *gate_item, answer_start, stop)?,
        };
        Ok(value)
    }

    fn gated(
        &self,
        lines: &[String],
        gate_item: u32,
        answer_start: &AnchorPattern,
        stop: &AnchorPattern,
    ) -> Result<SectionValue> {
        let gate = grid::parse_single(lines)?
            .into_iter()
            .find(|r| r.index == gate_item)
            .and_then(|r| r.values.first().copied())
            .map(|t| t.as_str().to_string())
            .unwrap_or_default();
        let answer = if gate == CategoricalToken::Yes.as_str() {
            self.narratives.extract(lines, answer_start, stop, true)
        } else {
            String::new()
        };
        debug!(%gate, answered = !answer.is_empty(), "gated narrative");
        Ok(SectionValue::Gated { gate, answer })
    }
}

fn apply_post(mut records: Vec<GridRecord>, post: &[PostTransform]) -> Vec<GridRecord> {
    for step in post {
        records = match step {
            PostTransform::IndexRange(lo, hi) => records
                .into_iter()
                .filter(|r| r.index >= *lo && r.index <= *hi)
                .collect(),
            other => match other.dedup_policy() {
                Some(policy) => grid::dedup(records, policy),
                None => records,
            },
        };
    }
    records
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corpus::Page;
    use crate::error::ExtractError;
    use crate::parser::tokens::CategoricalToken::*;

    const SPECS: &str = r#"{
        "form": "test",
        "specs": [
            {"key": "orgs", "kind": "triple", "columns": ["meetings", "voted", "ces"],
             "start": ["^\\s*1B[-–]1\\."], "stop": ["^\\s*1B[-–]1a\\."], "max_index": 3},
            {"key": "narr_1b1a", "column": "1b_1a", "kind": "narrative",
             "start": ["^\\s*1B[-–]1a\\."], "stop": ["^\\s*1C[-–]1\\."]},
            {"key": "coord", "kind": "single", "start": ["^\\s*1C[-–]1\\."],
             "stop": ["^\\s*1C[-–]2\\."], "post": ["keep_first", {"index_range": [1, 2]}]}
        ]
    }"#;

    fn corpus() -> PageCorpus {
        PageCorpus::new(vec![
            Page::new(1, "Applicant: Test CoC XX-500\n1B-1. Inclusive Structure\n1. Organization A Yes No Nonexistent\n2. Organization B\nthat wraps No No Yes"),
            Page::new(2, "3. Organization C Yes Yes Yes\n1B-1a. Experience Promoting Racial Equity\nNOFO Section V.B.1.a.\nDescribe in the field below how your CoC\n(limit 2,500 characters)\nWe held meetings."),
            Page::new(3, "1C-1. Coordination\n1. Funding Collaboratives Yes\n2. Head Start No\n2. Head Start again Yes\n3. Housing Authorities Nonexistent\n1C-2. ESG"),
        ])
        .unwrap()
    }

    #[test]
    fn runs_every_spec_into_one_mapping() {
        let reg = SpecRegistry::from_json(SPECS).unwrap();
        let out = Dispatcher::new(&reg).run(&corpus()).unwrap();
        assert_eq!(out.len(), 3);

        let SectionValue::Grid(orgs) = &out["orgs"] else {
            panic!("expected grid");
        };
        assert_eq!(orgs.len(), 3);
        assert_eq!(orgs[1].label, "Organization B that wraps");
        assert_eq!(orgs[1].values, vec![No, No, Yes]);

        assert_eq!(out["narr_1b1a"], SectionValue::Narrative("We held meetings.".to_string()));

        let SectionValue::Grid(coord) = &out["coord"] else {
            panic!("expected grid");
        };
        let summary: Vec<(u32, &str)> = coord.iter().map(|r| (r.index, r.values[0].as_str())).collect();
        assert_eq!(summary, vec![(1, "Yes"), (2, "No")]);
    }

    #[test]
    fn runs_are_deterministic() {
        let reg = SpecRegistry::from_json(SPECS).unwrap();
        let d = Dispatcher::new(&reg);
        let c = corpus();
        assert_eq!(d.run(&c).unwrap(), d.run(&c).unwrap());
    }

    #[test]
    fn missing_section_names_the_spec() {
        let reg = SpecRegistry::from_json(SPECS).unwrap();
        let c = PageCorpus::new(vec![Page::new(1, "1B-1. only the first section\n1. A Yes Yes Yes")]).unwrap();
        let err = Dispatcher::new(&reg).run(&c).unwrap_err();
        match &err {
            ExtractError::Section { key, .. } => assert_eq!(key, "narr_1b1a"),
            other => panic!("unexpected error: {other}"),
        }
        assert!(matches!(err.root(), ExtractError::StartAnchorNotFound { .. }));
    }

    const GATED: &str = r#"{
        "form": "test",
        "specs": [
            {"key": "val_1c7d", "column": "1c_7d", "kind": "gated_narrative",
             "start": ["^\\s*1C[-–]7d\\."], "stop": ["^\\s*1C[-–]7e\\."]}
        ]
    }"#;

    fn joint_application(gate: &str) -> PageCorpus {
        let text = format!(
            "1C-7d. Submitting CoC and PHA Joint Applications\n\
             1. Did your CoC coordinate with a PHA(s) to submit a joint application? {gate}\n\
             2. Enter the type of competitive project your CoC coordinated with the PHA(s).\n\
             Stability Vouchers with the city housing authority.\n\
             1C-7e. Coordinating with PHA(s)"
        );
        PageCorpus::new(vec![Page::new(1, text)]).unwrap()
    }

    #[test]
    fn gate_yes_unlocks_the_follow_up_answer() {
        let reg = SpecRegistry::from_json(GATED).unwrap();
        let out = Dispatcher::new(&reg).run(&joint_application("Yes")).unwrap();
        assert_eq!(
            out["val_1c7d"],
            SectionValue::Gated {
                gate: "Yes".to_string(),
                answer: "Stability Vouchers with the city housing authority.".to_string(),
            }
        );
    }

    #[test]
    fn gate_no_suppresses_the_follow_up_answer() {
        let reg = SpecRegistry::from_json(GATED).unwrap();
        let out = Dispatcher::new(&reg).run(&joint_application("no")).unwrap();
        assert_eq!(
            out["val_1c7d"],
            SectionValue::Gated {
                gate: "No".to_string(),
                answer: String::new(),
            }
        );
    }
}
