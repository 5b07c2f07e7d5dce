//! Persistence and derivation: flush the in-memory graph to SQLite and
//! build the derived tables the query surface depends on.
//!
//! The write path is staged: performance pragmas, base tables without
//! indexes, one immediate transaction for the bulk inserts, then the
//! derivation passes run serially on the same connection — heuristic DFG
//! from the flow-semantics model, orphan cleanup, deferred index creation,
//! evaluation-order edges, full-text search, summary statistics, analysis
//! views and findings, the taint model, dashboards, SCIP symbols, the
//! session-type block, and the self-describing schema docs. `ANALYZE` runs
//! before the dashboard passes so the planner has row counts.

pub mod escape;
mod dashboards;
mod findings;
mod schema;
mod schema_docs;
mod scip;
mod semantics;
mod session;
mod taint;
mod views;

use std::path::Path;

use rusqlite::{Connection, TransactionBehavior};

use crate::error::Result;
use crate::graph::GraphStore;
use crate::moduleset::ModuleSet;
use crate::progress::Progress;

pub use escape::EscapeRecord;

/// Write the full store to `path`, deleting any existing database first,
/// then run every derivation pass.
pub fn write(
    path: &Path,
    store: &GraphStore,
    modset: &ModuleSet,
    escape_records: &[EscapeRecord],
    validate: bool,
    prog: &Progress,
) -> Result<()> {
    prog.log(format!("Writing SQLite to {} ...", path.display()));

    let _ = std::fs::remove_file(path);

    let mut conn = Connection::open(path)?;
    conn.execute_batch(
        "PRAGMA journal_mode = WAL;
         PRAGMA synchronous = NORMAL;
         PRAGMA temp_store = MEMORY;
         PRAGMA mmap_size = 268435456;
         PRAGMA cache_size = -64000;",
    )?;

    schema::create_tables(&conn)?;

    // Bulk insert inside a single immediate transaction; any failure rolls
    // the whole base write back.
    {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        schema::insert_nodes(&tx, store, prog)?;
        schema::insert_edges(&tx, store, prog)?;
        schema::insert_sources(&tx, store, prog)?;
        schema::insert_metrics(&tx, store, prog)?;
        tx.commit()?;
    }

    prog.log("Building flow semantics model...");
    semantics::create_flow_semantics(&conn)?;

    prog.log("Inferring DFG for external calls...");
    semantics::heuristic_dfg(&conn, prog)?;

    // Orphan edges would poison the derived views; drop them before
    // indexing.
    let orphans = conn.execute(
        "DELETE FROM edges WHERE source NOT IN (SELECT id FROM nodes)
            OR target NOT IN (SELECT id FROM nodes)",
        [],
    )?;
    if orphans > 0 {
        prog.log(format!("Removed {orphans} orphan edges"));
    }

    prog.log("Creating indexes...");
    schema::create_indexes(&conn)?;

    prog.log("Computing evaluation order edges...");
    semantics::compute_eog(&conn, prog)?;

    prog.log("Building FTS5 index...");
    views::create_fts(&conn)?;

    prog.log("Computing summary statistics...");
    views::create_summary_stats(&conn)?;

    prog.log("Creating analysis views...");
    views::create_analysis_views(&conn)?;
    findings::create_findings(&conn)?;
    views::create_queries(&conn)?;

    prog.log("Building taint model...");
    taint::create_taint_model(&conn)?;

    prog.log("Computing additional analysis...");
    findings::additional_findings(&conn)?;

    if !escape_records.is_empty() {
        prog.log("Applying escape analysis annotations...");
        if let Err(e) = escape::apply(&conn, escape_records, prog) {
            prog.log(format!("Warning: escape analysis failed: {e}"));
        }
    }

    prog.log("Computing advanced analysis...");
    findings::advanced_findings(&conn)?;
    findings::pattern_findings(&conn)?;

    // Without statistics the planner has no row counts and picks
    // catastrophically bad plans on large edge tables.
    prog.log("Running ANALYZE for query planner...");
    conn.execute_batch("ANALYZE")?;

    prog.log("Building dashboard data...");
    dashboards::create_dashboard_data(&conn)?;

    prog.log("Building graph intelligence...");
    dashboards::create_graph_intelligence(&conn)?;

    prog.log("Building file and dependency analysis...");
    dashboards::create_file_and_dep_analysis(&conn)?;

    prog.log("Building type system analysis...");
    dashboards::create_type_system_analysis(&conn)?;

    prog.log("Building navigation and patterns...");
    dashboards::create_navigation(&conn)?;

    prog.log("Building schema documentation...");
    schema_docs::create(&conn)?;

    prog.log("Building SCIP symbol index...");
    scip::create(&conn, modset, prog)?;

    prog.log("Building communication patterns...");
    session::create_communication_patterns(&conn, prog)?;

    prog.log("Applying session-type corrections...");
    session::create_session_type_corrections(&conn, prog)?;

    if validate {
        run_validation(&conn, prog)?;
    }

    if let Ok(meta) = std::fs::metadata(path) {
        prog.log(format!(
            "Wrote {} ({} MB)",
            path.display(),
            meta.len() / (1024 * 1024)
        ));
    }

    Ok(())
}

/// Row-count sanity queries plus the orphan-edge count.
fn run_validation(conn: &Connection, prog: &Progress) -> Result<()> {
    prog.log("Running validation queries...");

    let orphans: i64 = conn.query_row(
        "SELECT COUNT(*) FROM edges WHERE source NOT IN (SELECT id FROM nodes)
            OR target NOT IN (SELECT id FROM nodes)",
        [],
        |row| row.get(0),
    )?;
    if orphans > 0 {
        prog.log(format!("  WARNING: {orphans} orphan edges"));
    } else {
        prog.log("  OK: zero orphan edges");
    }

    let mut stmt =
        conn.prepare("SELECT kind, COUNT(*) FROM nodes GROUP BY kind ORDER BY COUNT(*) DESC")?;
    let rows = stmt.query_map([], |row| {
        Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
    })?;
    for row in rows {
        let (kind, count) = row?;
        prog.log(format!("  nodes: {kind} = {count}"));
    }

    let mut stmt =
        conn.prepare("SELECT kind, COUNT(*) FROM edges GROUP BY kind ORDER BY COUNT(*) DESC")?;
    let rows = stmt.query_map([], |row| {
        Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
    })?;
    for row in rows {
        let (kind, count) = row?;
        prog.log(format!("  edges: {kind} = {count}"));
    }

    Ok(())
}
