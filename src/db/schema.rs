//! Base tables, deferred indexes, and the bulk insert path.
//!
//! Indexes are created only after the bulk inserts and orphan cleanup:
//! index maintenance during a multi-hundred-thousand-row insert dominates
//! the write time otherwise. Empty strings and zero positions bind as
//! NULL so the nullable columns stay queryable with IS NULL.

use rusqlite::Connection;

use crate::error::Result;
use crate::graph::{props_json, GraphStore};
use crate::progress::Progress;

const BATCH_REPORT: usize = 50_000;

pub fn create_tables(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
CREATE TABLE nodes (
    id TEXT PRIMARY KEY,
    kind TEXT NOT NULL,
    name TEXT NOT NULL,
    file TEXT,
    line INTEGER,
    col INTEGER,
    end_line INTEGER,
    package TEXT,
    parent_function TEXT,
    type_info TEXT,
    properties TEXT
);

CREATE TABLE edges (
    source TEXT NOT NULL,
    target TEXT NOT NULL,
    kind TEXT NOT NULL,
    properties TEXT
);

CREATE TABLE sources (
    file TEXT PRIMARY KEY,
    content TEXT NOT NULL,
    package TEXT
);

CREATE TABLE metrics (
    function_id TEXT PRIMARY KEY,
    cyclomatic_complexity INTEGER,
    fan_in INTEGER,
    fan_out INTEGER,
    loc INTEGER,
    num_params INTEGER
);
",
    )?;
    Ok(())
}

pub fn create_indexes(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
CREATE INDEX idx_nodes_kind ON nodes(kind);
CREATE INDEX idx_nodes_package ON nodes(package);
CREATE INDEX idx_nodes_file ON nodes(file);
CREATE INDEX idx_nodes_parent ON nodes(parent_function);
CREATE INDEX idx_edges_source ON edges(source, kind);
CREATE INDEX idx_edges_target ON edges(target, kind);
CREATE INDEX idx_edges_kind ON edges(kind);
",
    )?;
    Ok(())
}

fn text_or_null(value: &str) -> Option<&str> {
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}

fn int_or_null(value: usize) -> Option<i64> {
    if value == 0 {
        None
    } else {
        Some(value as i64)
    }
}

pub fn insert_nodes(conn: &Connection, store: &GraphStore, prog: &Progress) -> Result<()> {
    let mut stmt = conn.prepare(
        "INSERT OR IGNORE INTO nodes
         (id, kind, name, file, line, col, end_line, package, parent_function, type_info, properties)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
    )?;

    for (i, node) in store.nodes.iter().enumerate() {
        let props = props_json(&node.properties);
        stmt.execute(rusqlite::params![
            node.id,
            node.kind.as_str(),
            node.name,
            text_or_null(&node.file),
            int_or_null(node.line),
            int_or_null(node.col),
            int_or_null(node.end_line),
            text_or_null(&node.package),
            text_or_null(&node.parent_function),
            text_or_null(&node.type_info),
            text_or_null(&props),
        ])?;
        if (i + 1) % BATCH_REPORT == 0 {
            prog.verbose(format!("  inserted {}/{} nodes", i + 1, store.nodes.len()));
        }
    }

    prog.log(format!("Inserted {} nodes", store.nodes.len()));
    Ok(())
}

pub fn insert_edges(conn: &Connection, store: &GraphStore, prog: &Progress) -> Result<()> {
    let mut stmt = conn
        .prepare("INSERT INTO edges (source, target, kind, properties) VALUES (?1, ?2, ?3, ?4)")?;

    for (i, edge) in store.edges.iter().enumerate() {
        let props = props_json(&edge.properties);
        stmt.execute(rusqlite::params![
            edge.source,
            edge.target,
            edge.kind.as_str(),
            text_or_null(&props),
        ])?;
        if (i + 1) % BATCH_REPORT == 0 {
            prog.verbose(format!("  inserted {}/{} edges", i + 1, store.edges.len()));
        }
    }

    prog.log(format!("Inserted {} edges", store.edges.len()));
    Ok(())
}

pub fn insert_sources(conn: &Connection, store: &GraphStore, prog: &Progress) -> Result<()> {
    let mut stmt = conn
        .prepare("INSERT OR IGNORE INTO sources (file, content, package) VALUES (?1, ?2, ?3)")?;

    let mut files: Vec<&String> = store.sources.keys().collect();
    files.sort();
    for file in &files {
        let content = &store.sources[*file];
        let package = pkg_from_path(file);
        stmt.execute(rusqlite::params![file, content, text_or_null(&package)])?;
    }

    prog.log(format!("Inserted {} source files", files.len()));
    Ok(())
}

pub fn insert_metrics(conn: &Connection, store: &GraphStore, prog: &Progress) -> Result<()> {
    let mut stmt = conn.prepare(
        "INSERT OR IGNORE INTO metrics
         (function_id, cyclomatic_complexity, fan_in, fan_out, loc, num_params)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
    )?;

    let mut ids: Vec<&String> = store.metrics.keys().collect();
    ids.sort();
    for id in &ids {
        let m = &store.metrics[*id];
        stmt.execute(rusqlite::params![
            m.function_id,
            m.cyclomatic_complexity,
            m.fan_in,
            m.fan_out,
            m.loc,
            m.num_params,
        ])?;
    }

    prog.log(format!("Inserted {} function metrics", ids.len()));
    Ok(())
}

/// Package hint from a relative file path: the directory part, or `main`.
fn pkg_from_path(rel_path: &str) -> String {
    match rel_path.rsplit_once('/') {
        Some((dir, _)) => dir.to_string(),
        None => "main".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn package_hint_is_the_directory() {
        assert_eq!(pkg_from_path("scrape/manager.go"), "scrape");
        assert_eq!(pkg_from_path("cmd/server/main.go"), "cmd/server");
        assert_eq!(pkg_from_path("main.go"), "main");
    }
}
