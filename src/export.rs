//! Stacked wide table of every parsed document.

use std::collections::{HashMap, HashSet};
use std::io::Write;

use anyhow::Result;
use serde::ser::{Serialize, SerializeMap, Serializer};

use crate::row::Row;

struct Record<'a> {
    source: &'a str,
    row: &'a Row,
}

impl Serialize for Record<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.row.len() + 1))?;
        map.serialize_entry("source", self.source)?;
        for (column, value) in &self.row.columns {
            map.serialize_entry(column, value)?;
        }
        map.end()
    }
}

/// One JSON object per document: `source` first, then its columns in order.
pub fn write_json_lines<W: Write>(out: &mut W, rows: &[(String, Row)]) -> Result<()> {
    for (source, row) in rows {
        serde_json::to_writer(&mut *out, &Record { source, row })?;
        writeln!(out)?;
    }
    Ok(())
}

/// Tab-separated table. The header is `source` plus every column seen, in
/// first-seen order; a row without a column gets a blank cell.
pub fn write_tsv<W: Write>(out: &mut W, rows: &[(String, Row)]) -> Result<()> {
    let mut header: Vec<&str> = Vec::new();
    let mut seen = HashSet::new();
    for (_, row) in rows {
        for (column, _) in &row.columns {
            if seen.insert(column.as_str()) {
                header.push(column);
            }
        }
    }

    write!(out, "source")?;
    for column in &header {
        write!(out, "\t{}", escape(column))?;
    }
    writeln!(out)?;

    for (source, row) in rows {
        let cells: HashMap<&str, &str> = row
            .columns
            .iter()
            .map(|(c, v)| (c.as_str(), v.as_str()))
            .collect();
        write!(out, "{}", escape(source))?;
        for column in &header {
            write!(out, "\t{}", escape(cells.get(column).copied().unwrap_or_default()))?;
        }
        writeln!(out)?;
    }
    Ok(())
}

fn escape(cell: &str) -> String {
    cell.replace('\\', "\\\\")
        .replace('\t', "\\t")
        .replace('\n', "\\n")
        .replace('\r', "\\r")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(pairs: &[(&str, &str)]) -> Row {
        Row {
            columns: pairs.iter().map(|(c, v)| (c.to_string(), v.to_string())).collect(),
        }
    }

    fn sample() -> Vec<(String, Row)> {
        vec![
            ("a.txt".to_string(), row(&[("1a_1b", "XX-500"), ("1b_1a", "line one\nline two")])),
            ("b.txt".to_string(), row(&[("1a_1b", "XX-501"), ("1c_7_psh_3", "Yes")])),
        ]
    }

    #[test]
    fn json_lines_keep_column_order() {
        let mut buf = Vec::new();
        write_json_lines(&mut buf, &sample()).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(
            lines,
            vec![
                r#"{"source":"a.txt","1a_1b":"XX-500","1b_1a":"line one\nline two"}"#,
                r#"{"source":"b.txt","1a_1b":"XX-501","1c_7_psh_3":"Yes"}"#,
            ]
        );
    }

    #[test]
    fn tsv_unions_columns_and_escapes_cells() {
        let mut buf = Vec::new();
        write_tsv(&mut buf, &sample()).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert_eq!(
            text,
            "source\t1a_1b\t1b_1a\t1c_7_psh_3\n\
             a.txt\tXX-500\tline one\\nline two\t\n\
             b.txt\tXX-501\t\tYes\n"
        );
    }
}
