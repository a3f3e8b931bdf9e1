use std::path::Path;

use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension};

use crate::row::Row;

pub fn connect(path: &Path) -> Result<Connection> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create database directory {:?}", dir))?;
    }
    let conn = Connection::open(path).with_context(|| format!("Failed to open {:?}", path))?;
    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS documents (
            id           INTEGER PRIMARY KEY,
            source       TEXT UNIQUE NOT NULL,
            pages        INTEGER NOT NULL DEFAULT 0,
            status       TEXT NOT NULL CHECK(status IN ('ok','error')),
            error        TEXT,
            processed_at TEXT NOT NULL DEFAULT (datetime('now'))
        );
        CREATE INDEX IF NOT EXISTS idx_documents_status ON documents(status);

        CREATE TABLE IF NOT EXISTS answers (
            document_id  INTEGER NOT NULL REFERENCES documents(id),
            position     INTEGER NOT NULL,
            col          TEXT NOT NULL,
            value        TEXT NOT NULL,
            UNIQUE(document_id, col)
        );
        CREATE INDEX IF NOT EXISTS idx_answers_col ON answers(col);
        ",
    )?;
    Ok(())
}

pub struct ParsedDocument {
    pub source: String,
    pub pages: usize,
    pub row: Row,
}

pub struct FailedDocument {
    pub source: String,
    pub error: String,
}

/// Replace any earlier results for the same sources.
pub fn save_documents(conn: &Connection, docs: &[ParsedDocument]) -> Result<usize> {
    let tx = conn.unchecked_transaction()?;
    {
        let mut clear = tx.prepare(
            "DELETE FROM answers WHERE document_id IN (SELECT id FROM documents WHERE source = ?1)",
        )?;
        let mut doc_stmt = tx.prepare(
            "INSERT OR REPLACE INTO documents (source, pages, status, error, processed_at)
             VALUES (?1, ?2, 'ok', NULL, datetime('now'))",
        )?;
        let mut answer_stmt = tx.prepare(
            "INSERT INTO answers (document_id, position, col, value) VALUES (?1, ?2, ?3, ?4)",
        )?;
        for doc in docs {
            clear.execute(params![doc.source])?;
            doc_stmt.execute(params![doc.source, doc.pages as i64])?;
            let id = tx.last_insert_rowid();
            for (position, (col, value)) in doc.row.columns.iter().enumerate() {
                answer_stmt.execute(params![id, position as i64, col, value])?;
            }
        }
    }
    tx.commit()?;
    Ok(docs.len())
}

pub fn save_failures(conn: &Connection, failures: &[FailedDocument]) -> Result<usize> {
    let tx = conn.unchecked_transaction()?;
    {
        let mut clear = tx.prepare(
            "DELETE FROM answers WHERE document_id IN (SELECT id FROM documents WHERE source = ?1)",
        )?;
        let mut stmt = tx.prepare(
            "INSERT OR REPLACE INTO documents (source, pages, status, error, processed_at)
             VALUES (?1, 0, 'error', ?2, datetime('now'))",
        )?;
        for f in failures {
            clear.execute(params![f.source])?;
            stmt.execute(params![f.source, f.error])?;
        }
    }
    tx.commit()?;
    Ok(failures.len())
}

/// The stored row for one source, in column order.
pub fn fetch_row(conn: &Connection, source: &str) -> Result<Option<Row>> {
    let id: Option<i64> = conn
        .query_row(
            "SELECT id FROM documents WHERE source = ?1 AND status = 'ok'",
            params![source],
            |r| r.get(0),
        )
        .optional()?;
    let Some(id) = id else {
        return Ok(None);
    };

    let mut stmt =
        conn.prepare("SELECT col, value FROM answers WHERE document_id = ?1 ORDER BY position")?;
    let columns = stmt
        .query_map(params![id], |r| Ok((r.get(0)?, r.get(1)?)))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Some(Row { columns }))
}

/// Every successfully parsed source with its row, ordered by source.
pub fn fetch_rows(conn: &Connection) -> Result<Vec<(String, Row)>> {
    let mut stmt = conn.prepare("SELECT source FROM documents WHERE status = 'ok' ORDER BY source")?;
    let sources = stmt
        .query_map([], |r| r.get::<_, String>(0))?
        .collect::<Result<Vec<_>, _>>()?;

    let mut rows = Vec::with_capacity(sources.len());
    for source in sources {
        if let Some(row) = fetch_row(conn, &source)? {
            rows.push((source, row));
        }
    }
    Ok(rows)
}

pub struct Stats {
    pub documents: usize,
    pub ok: usize,
    pub errors: usize,
    pub answers: usize,
}

pub fn get_stats(conn: &Connection) -> Result<Stats> {
    let documents: usize = conn.query_row("SELECT COUNT(*) FROM documents", [], |r| r.get(0))?;
    let ok: usize = conn.query_row(
        "SELECT COUNT(*) FROM documents WHERE status = 'ok'",
        [],
        |r| r.get(0),
    )?;
    let answers: usize = conn.query_row("SELECT COUNT(*) FROM answers", [], |r| r.get(0))?;
    Ok(Stats {
        documents,
        ok,
        errors: documents - ok,
        answers,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("PRAGMA foreign_keys=ON;").unwrap();
        init_schema(&conn).unwrap();
        conn
    }

    fn row(pairs: &[(&str, &str)]) -> Row {
        Row {
            columns: pairs.iter().map(|(c, v)| (c.to_string(), v.to_string())).collect(),
        }
    }

    #[test]
    fn row_round_trips_in_column_order() {
        let conn = memory();
        let r = row(&[("1a_1b", "XX-500"), ("1b_1_1_meetings", "Yes"), ("1c_4a", "Empty")]);
        save_documents(
            &conn,
            &[ParsedDocument {
                source: "a.txt".into(),
                pages: 12,
                row: r.clone(),
            }],
        )
        .unwrap();
        assert_eq!(fetch_row(&conn, "a.txt").unwrap(), Some(r));
        assert_eq!(fetch_row(&conn, "missing.txt").unwrap(), None);
    }

    #[test]
    fn reprocessing_replaces_previous_results() {
        let conn = memory();
        let first = ParsedDocument {
            source: "a.txt".into(),
            pages: 1,
            row: row(&[("x", "1"), ("y", "2")]),
        };
        save_documents(&conn, &[first]).unwrap();
        save_failures(
            &conn,
            &[FailedDocument {
                source: "a.txt".into(),
                error: "start anchor not found".into(),
            }],
        )
        .unwrap();

        let s = get_stats(&conn).unwrap();
        assert_eq!((s.documents, s.ok, s.errors, s.answers), (1, 0, 1, 0));
        assert_eq!(fetch_row(&conn, "a.txt").unwrap(), None);
    }

    #[test]
    fn fetch_rows_skips_failures_and_sorts_by_source() {
        let conn = memory();
        save_documents(
            &conn,
            &[
                ParsedDocument {
                    source: "b.txt".into(),
                    pages: 2,
                    row: row(&[("x", "b1")]),
                },
                ParsedDocument {
                    source: "a.txt".into(),
                    pages: 2,
                    row: row(&[("x", "a1"), ("y", "a2")]),
                },
            ],
        )
        .unwrap();
        save_failures(
            &conn,
            &[FailedDocument {
                source: "0.txt".into(),
                error: "bad".into(),
            }],
        )
        .unwrap();

        let rows = fetch_rows(&conn).unwrap();
        let sources: Vec<&str> = rows.iter().map(|(s, _)| s.as_str()).collect();
        assert_eq!(sources, vec!["a.txt", "b.txt"]);
        assert_eq!(rows[0].1, row(&[("x", "a1"), ("y", "a2")]));
    }
}
