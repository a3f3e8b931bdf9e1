//! Flattens one document's results into a wide row of named columns.

use serde::ser::{Serialize, SerializeMap, Serializer};

use crate::dispatch::{SectionValue, EMPTY_SENTINEL};
use crate::parser::extract::numbers::CountRow;
use crate::parser::extract::pha::PhaRow;
use crate::parser::grid::GridRecord;
use crate::parser::DocumentResult;
use crate::specs::{Spec, SpecKind, SpecRegistry};

const PHA_FIELDS: [&str; 4] = ["pha_name", "ph_hhm", "ph_limit_hhm", "psh"];

/// Ordered `(column, value)` pairs. Serializes as a JSON object in column
/// order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Row {
    pub columns: Vec<(String, String)>,
}

impl Row {
    pub fn get(&self, column: &str) -> Option<&str> {
        self.columns
            .iter()
            .find(|(c, _)| c == column)
            .map(|(_, v)| v.as_str())
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    fn push(&mut self, column: String, value: impl Into<String>) {
        self.columns.push((column, value.into()));
    }
}

impl Serialize for Row {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.columns.len()))?;
        for (column, value) in &self.columns {
            map.serialize_entry(column, value)?;
        }
        map.end()
    }
}

/// Project a document onto the registry's column layout.
pub fn build_row(registry: &SpecRegistry, doc: &DocumentResult) -> Row {
    let mut row = Row::default();
    for (column, value) in doc.metadata.columns() {
        row.push(column, value);
    }
    for spec in registry.specs() {
        push_spec(&mut row, spec, doc.sections.get(&spec.key));
    }
    row
}

fn push_spec(row: &mut Row, spec: &Spec, value: Option<&SectionValue>) {
    let prefix = spec.column.as_str();
    match &spec.kind {
        SpecKind::Grid { columns, .. } => {
            let records: &[GridRecord] = match value {
                Some(SectionValue::Grid(records)) => records,
                _ => &[],
            };
            let count = if spec.max_index > 0 {
                spec.max_index
            } else {
                records.iter().map(|r| r.index).max().unwrap_or(0)
            };
            for i in 1..=count {
                // rows are index-sorted, so the first hit is the first parsed
                let record = records.iter().find(|r| r.index == i);
                let cell = |slot: usize| {
                    record
                        .and_then(|r| r.values.get(slot))
                        .map(|t| t.as_str().to_string())
                        .unwrap_or_default()
                };
                if columns.len() <= 1 {
                    row.push(format!("{prefix}_{i}"), cell(0));
                } else {
                    for (slot, name) in columns.iter().enumerate() {
                        row.push(format!("{prefix}_{i}_{name}"), cell(slot));
                    }
                }
            }
        }
        SpecKind::Narrative { .. } => {
            let text = match value {
                Some(SectionValue::Narrative(t)) if !t.trim().is_empty() => t.clone(),
                _ => EMPTY_SENTINEL.to_string(),
            };
            row.push(prefix.to_string(), text);
        }
        SpecKind::LastToken { .. } | SpecKind::AnswerDate => {
            let scalar = match value {
                Some(SectionValue::Scalar(s)) => s.clone(),
                _ => String::new(),
            };
            row.push(prefix.to_string(), scalar);
        }
        SpecKind::Dates | SpecKind::NumberedValues { .. } => {
            let dates: &[String] = match value {
                Some(SectionValue::Values(v)) => v,
                _ => &[],
            };
            let count = if spec.max_index > 0 {
                spec.max_index as usize
            } else {
                dates.len()
            };
            for i in 0..count {
                row.push(
                    format!("{prefix}_{}", i + 1),
                    dates.get(i).cloned().unwrap_or_default(),
                );
            }
        }
        SpecKind::CountPairs { columns } => {
            let rows: &[CountRow] = match value {
                Some(SectionValue::Counts(r)) => r,
                _ => &[],
            };
            let count = if spec.max_index > 0 {
                spec.max_index
            } else {
                rows.iter().map(|r| r.index).max().unwrap_or(0)
            };
            for i in 1..=count {
                let record = rows.iter().find(|r| r.index == i);
                for (slot, name) in columns.iter().enumerate() {
                    let cell = record
                        .and_then(|r| r.values.get(slot))
                        .cloned()
                        .unwrap_or_default();
                    row.push(format!("{prefix}_{i}_{name}"), cell);
                }
            }
        }
        SpecKind::Captures { rules } => {
            let fields = match value {
                Some(SectionValue::Fields(f)) => Some(f),
                _ => None,
            };
            for name in rules.iter().flat_map(|r| &r.columns) {
                let cell = fields.and_then(|f| f.get(name)).cloned().unwrap_or_default();
                row.push(format!("{prefix}_{name}"), cell);
            }
        }
        SpecKind::GatedNarrative {
            gate_item,
            answer_item,
            ..
        } => {
            let (gate, answer) = match value {
                Some(SectionValue::Gated { gate, answer }) => (gate.clone(), answer.trim()),
                _ => (String::new(), ""),
            };
            // the follow-up only counts when the gate is open
            let answer = if gate == "Yes" && !answer.is_empty() {
                answer.to_string()
            } else {
                EMPTY_SENTINEL.to_string()
            };
            row.push(format!("{prefix}_{gate_item}"), gate);
            row.push(format!("{prefix}_{answer_item}"), answer);
        }
        SpecKind::PhaTable => {
            let rows: &[PhaRow] = match value {
                Some(SectionValue::Pha(r)) => r,
                _ => &[],
            };
            let count = if spec.max_index > 0 {
                spec.max_index as usize
            } else {
                rows.len()
            };
            for i in 0..count {
                for field in PHA_FIELDS {
                    let cell = rows.get(i).map(|r| pha_field(r, field)).unwrap_or_default();
                    row.push(format!("{prefix}_{field}_{}", i + 1), cell);
                }
            }
        }
    }
}

fn pha_field(row: &PhaRow, field: &str) -> String {
    match field {
        "pha_name" => row.pha_name.clone(),
        "ph_hhm" => row.ph_hhm.clone(),
        "ph_limit_hhm" => row.ph_limit_hhm.clone(),
        _ => row.psh.clone(),
    }
}
