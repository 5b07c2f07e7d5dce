//! SCIP-style cross-repository symbol identifiers.
//!
//! Symbols follow the `scip-go gomod <module> v0 <descriptor>` scheme:
//! functions get `package/name().`, methods `package/Type#Method().`,
//! types `package/Type#`, packages `package/`.

use rusqlite::Connection;

use crate::error::Result;
use crate::moduleset::ModuleSet;
use crate::progress::Progress;

pub fn create(conn: &Connection, modset: &ModuleSet, prog: &Progress) -> Result<()> {
    conn.execute_batch(
        "
CREATE TABLE scip_symbols (
    node_id TEXT PRIMARY KEY,
    scip_id TEXT NOT NULL,
    kind TEXT NOT NULL,
    package TEXT,
    display_name TEXT
);
",
    )?;

    let prefix = format!("scip-go gomod {} v0 ", modset.primary_mod_path());

    // Plain functions: package/name().
    conn.execute(
        "INSERT INTO scip_symbols (node_id, scip_id, kind, package, display_name)
         SELECT n.id,
           ?1 || REPLACE(n.package, '/', '.') || '/' || n.name || '().',
           'function', n.package, n.name
         FROM nodes n
         WHERE n.kind = 'function'
           AND n.name NOT LIKE '%.%'
           AND n.package IS NOT NULL AND n.name != ''",
        [&prefix],
    )?;

    // Methods: package/Type#Method().
    conn.execute(
        "INSERT OR IGNORE INTO scip_symbols (node_id, scip_id, kind, package, display_name)
         SELECT n.id,
           ?1 || REPLACE(n.package, '/', '.') || '/' ||
           REPLACE(REPLACE(SUBSTR(n.name, 1, INSTR(n.name, '.') - 1), '*', ''), ')', '') ||
           '#' || SUBSTR(n.name, INSTR(n.name, '.') + 1) || '().',
           'method', n.package, n.name
         FROM nodes n
         WHERE n.kind = 'function'
           AND n.name LIKE '%.%'
           AND n.package IS NOT NULL",
        [&prefix],
    )?;

    // Types: package/Type#
    conn.execute(
        "INSERT OR IGNORE INTO scip_symbols (node_id, scip_id, kind, package, display_name)
         SELECT n.id,
           ?1 || REPLACE(n.package, '/', '.') || '/' || n.name || '#',
           'type', n.package, n.name
         FROM nodes n
         WHERE n.kind = 'type_decl'
           AND n.package IS NOT NULL AND n.name != ''",
        [&prefix],
    )?;

    // Packages: package/
    conn.execute(
        "INSERT OR IGNORE INTO scip_symbols (node_id, scip_id, kind, package, display_name)
         SELECT n.id,
           ?1 || REPLACE(n.package, '/', '.') || '/',
           'package', n.package, n.name
         FROM nodes n
         WHERE n.kind = 'package'
           AND n.package IS NOT NULL",
        [&prefix],
    )?;

    conn.execute_batch(
        "
CREATE INDEX idx_scip_kind ON scip_symbols(kind);
CREATE INDEX idx_scip_pkg ON scip_symbols(package);

INSERT INTO queries (name, description, sql) VALUES
('scip_lookup', 'Look up SCIP symbol for a node',
 'SELECT s.scip_id, s.kind, s.display_name, n.file, n.line FROM scip_symbols s JOIN nodes n ON n.id = s.node_id WHERE s.display_name LIKE :pattern ORDER BY s.kind, s.display_name');
",
    )?;

    let total: i64 = conn.query_row("SELECT COUNT(*) FROM scip_symbols", [], |r| r.get(0))?;
    prog.log(format!("SCIP symbols: {total} total"));
    Ok(())
}
