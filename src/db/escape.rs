//! Escape-analysis overlay.
//!
//! The compiler-driving subprocess lives outside this crate; the overlay
//! application is here. Records are matched to nodes by `(file, line)` and
//! annotate `inlineable` on functions and `heap_escapes` on parameters and
//! locals. The overlay is best-effort: a failed application logs a warning
//! and leaves the tables empty.

use rusqlite::Connection;

use crate::error::Result;
use crate::progress::Progress;

/// One escape-analysis annotation, as parsed from the compiler's
/// diagnostics by the external collaborator.
#[derive(Debug, Clone)]
pub struct EscapeRecord {
    pub rel_file: String,
    pub line: usize,
    pub col: usize,
    /// One of: leaking_param, moved_to_heap, escapes_to_heap,
    /// does_not_escape, inlineable.
    pub kind: String,
    /// Variable or function name the diagnostic names.
    pub detail: String,
}

pub fn apply(conn: &Connection, records: &[EscapeRecord], prog: &Progress) -> Result<()> {
    conn.execute_batch(
        "CREATE TEMP TABLE escape_info (file TEXT, line INTEGER, col INTEGER, kind TEXT, detail TEXT)",
    )?;

    {
        let mut stmt =
            conn.prepare("INSERT INTO escape_info VALUES (?1, ?2, ?3, ?4, ?5)")?;
        for r in records {
            stmt.execute(rusqlite::params![
                r.rel_file,
                r.line as i64,
                r.col as i64,
                r.kind,
                r.detail,
            ])?;
        }
    }

    let inlineable = conn.execute(
        "INSERT INTO node_properties (node_id, key, value)
         SELECT DISTINCT n.id, 'inlineable', 'true'
         FROM escape_info ei
         JOIN nodes n ON n.file = ei.file AND n.line = ei.line
         WHERE ei.kind = 'inlineable' AND n.kind = 'function'",
        [],
    )?;

    let escaping = conn.execute(
        "INSERT INTO node_properties (node_id, key, value)
         SELECT DISTINCT n.id, 'heap_escapes', 'true'
         FROM escape_info ei
         JOIN nodes n ON n.file = ei.file AND n.line = ei.line
         WHERE ei.kind IN ('leaking_param', 'moved_to_heap', 'escapes_to_heap')
           AND n.kind IN ('parameter', 'local', 'function')",
        [],
    )?;

    let not_escaping = conn.execute(
        "INSERT INTO node_properties (node_id, key, value)
         SELECT DISTINCT n.id, 'heap_escapes', 'false'
         FROM escape_info ei
         JOIN nodes n ON n.file = ei.file AND n.line = ei.line
         WHERE ei.kind = 'does_not_escape'
           AND n.kind IN ('parameter', 'local')
           AND NOT EXISTS (
             SELECT 1 FROM node_properties np
             WHERE np.node_id = n.id AND np.key = 'heap_escapes'
           )",
        [],
    )?;

    conn.execute_batch("DROP TABLE escape_info")?;

    prog.log(format!(
        "Escape overlay: {inlineable} inlineable, {escaping} escaping, {not_escaping} non-escaping annotations"
    ));
    Ok(())
}
