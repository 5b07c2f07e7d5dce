//! The flow-semantics model, heuristic DFG for external calls, and
//! evaluation-order edges.
//!
//! `flow_semantics` describes how data moves through standard-library
//! functions the analysis cannot see into, in a small vocabulary:
//! `arg:<i>` / `arg:*` / `return:<i>`. The heuristic DFG derives edges for
//! every call whose callee is an `ext::` stub in three passes — precise
//! (arg→return per the model), side-effect (arg→arg), and fallback (all
//! args → call for callees with no model). All passes are INSERT OR IGNORE
//! so precise edges take precedence over fallback ones.

use rusqlite::Connection;

use crate::error::Result;
use crate::progress::Progress;

pub fn create_flow_semantics(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
CREATE TABLE flow_semantics (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    package TEXT NOT NULL,
    func_name TEXT NOT NULL,
    flow_from TEXT NOT NULL,
    flow_to TEXT NOT NULL,
    description TEXT
);

INSERT INTO flow_semantics (package, func_name, flow_from, flow_to, description) VALUES
-- String formatting: all value args contribute to the result
('fmt', 'Sprintf', 'arg:*', 'return:0', 'All args contribute to formatted string'),
('fmt', 'Sprint', 'arg:*', 'return:0', 'All args contribute to string'),
('fmt', 'Sprintln', 'arg:*', 'return:0', 'All args contribute to string'),

-- String operations: source string → result
('strings', 'Replace', 'arg:0', 'return:0', 'Source string flows to result'),
('strings', 'ReplaceAll', 'arg:0', 'return:0', 'Source string flows to result'),
('strings', 'ToLower', 'arg:0', 'return:0', 'String flows to lowered result'),
('strings', 'ToUpper', 'arg:0', 'return:0', 'String flows to uppered result'),
('strings', 'TrimSpace', 'arg:0', 'return:0', 'String flows to trimmed result'),
('strings', 'Trim', 'arg:0', 'return:0', 'String flows to trimmed result'),
('strings', 'TrimPrefix', 'arg:0', 'return:0', 'String flows to trimmed result'),
('strings', 'TrimSuffix', 'arg:0', 'return:0', 'String flows to trimmed result'),
('strings', 'Split', 'arg:0', 'return:0', 'String flows to split parts'),
('strings', 'Join', 'arg:0', 'return:0', 'Slice elements flow to joined string'),
('strings', 'Contains', 'arg:0', 'return:0', 'String checked for containment'),
('strings', 'HasPrefix', 'arg:0', 'return:0', 'String checked for prefix'),
('strings', 'HasSuffix', 'arg:0', 'return:0', 'String checked for suffix'),

-- Type conversions
('strconv', 'Atoi', 'arg:0', 'return:0', 'String flows to int'),
('strconv', 'ParseInt', 'arg:0', 'return:0', 'String flows to int64'),
('strconv', 'ParseFloat', 'arg:0', 'return:0', 'String flows to float'),
('strconv', 'ParseBool', 'arg:0', 'return:0', 'String flows to bool'),
('strconv', 'Itoa', 'arg:0', 'return:0', 'Int flows to string'),
('strconv', 'FormatInt', 'arg:0', 'return:0', 'Int64 flows to string'),
('strconv', 'FormatFloat', 'arg:0', 'return:0', 'Float flows to string'),

-- Encoding
('encoding/base64', 'EncodeToString', 'arg:0', 'return:0', 'Bytes flow to base64 string'),
('encoding/base64', 'DecodeString', 'arg:0', 'return:0', 'Base64 string flows to bytes'),
('encoding/hex', 'EncodeToString', 'arg:0', 'return:0', 'Bytes flow to hex string'),
('encoding/hex', 'DecodeString', 'arg:0', 'return:0', 'Hex string flows to bytes'),

-- JSON / YAML marshaling
('encoding/json', 'Marshal', 'arg:0', 'return:0', 'Value flows to JSON bytes'),
('encoding/json', 'Unmarshal', 'arg:0', 'arg:1', 'JSON bytes flow to target value'),
('gopkg.in/yaml.v2', 'Marshal', 'arg:0', 'return:0', 'Value flows to YAML bytes'),
('gopkg.in/yaml.v2', 'Unmarshal', 'arg:0', 'arg:1', 'YAML bytes flow to target value'),

-- URL / HTML escaping
('net/url', 'QueryEscape', 'arg:0', 'return:0', 'String flows to URL-escaped string'),
('net/url', 'PathEscape', 'arg:0', 'return:0', 'String flows to path-escaped string'),
('net/url', 'QueryUnescape', 'arg:0', 'return:0', 'URL-escaped flows to unescaped'),
('html', 'EscapeString', 'arg:0', 'return:0', 'String flows to HTML-escaped string'),
('html', 'UnescapeString', 'arg:0', 'return:0', 'HTML-escaped flows to unescaped'),

-- Path operations
('path/filepath', 'Join', 'arg:*', 'return:0', 'Path elements flow to joined path'),
('path/filepath', 'Clean', 'arg:0', 'return:0', 'Path flows to cleaned path'),
('path/filepath', 'Abs', 'arg:0', 'return:0', 'Path flows to absolute path'),
('path/filepath', 'Rel', 'arg:1', 'return:0', 'Target path flows to relative path'),
('path/filepath', 'Base', 'arg:0', 'return:0', 'Path flows to base name'),
('path/filepath', 'Dir', 'arg:0', 'return:0', 'Path flows to directory'),
('path/filepath', 'Ext', 'arg:0', 'return:0', 'Path flows to extension'),
('path', 'Join', 'arg:*', 'return:0', 'Path elements flow to joined path'),
('path', 'Clean', 'arg:0', 'return:0', 'Path flows to cleaned path'),
('path', 'Base', 'arg:0', 'return:0', 'Path flows to base name'),

-- I/O
('io', 'ReadAll', 'arg:0', 'return:0', 'Reader content flows to bytes'),
('io', 'Copy', 'arg:1', 'arg:0', 'Source reader flows to destination writer'),
('os', 'ReadFile', 'arg:0', 'return:0', 'File path determines content read'),

-- Regex
('regexp', 'MatchString', 'arg:1', 'return:0', 'String flows to match result'),
('regexp', 'Match', 'arg:1', 'return:0', 'Bytes flow to match result'),

-- Bytes
('bytes', 'Join', 'arg:0', 'return:0', 'Byte slices flow to joined result'),
('bytes', 'TrimSpace', 'arg:0', 'return:0', 'Bytes flow to trimmed result'),
('bytes', 'Contains', 'arg:0', 'return:0', 'Bytes checked for containment'),
('bytes', 'Replace', 'arg:0', 'return:0', 'Source bytes flow to result'),

-- Errors
('errors', 'New', 'arg:0', 'return:0', 'Message flows to error'),
('errors', 'Unwrap', 'arg:0', 'return:0', 'Wrapped error flows to inner error'),

-- Sort: mutates in place
('sort', 'Slice', 'arg:0', 'arg:0', 'Slice mutated in place'),
('sort', 'Sort', 'arg:0', 'arg:0', 'Sortable mutated in place');

CREATE INDEX idx_flow_sem_pkg ON flow_semantics(package, func_name);
"#,
    )?;
    Ok(())
}

/// Heuristic DFG for calls whose callee is an external stub.
pub fn heuristic_dfg(conn: &Connection, prog: &Progress) -> Result<()> {
    // Pass 1 — precise: arg → return (modeled as arg node → call node).
    let precise = conn.execute(
        r#"INSERT OR IGNORE INTO edges (source, target, kind, properties)
           SELECT DISTINCT arg_e.target, site_e.source, 'dfg', '{"heuristic":true}'
           FROM edges site_e
           JOIN nodes callee ON site_e.target = callee.id
           JOIN flow_semantics fs ON callee.package = fs.package AND callee.name = fs.func_name
             AND fs.flow_to LIKE 'return:%'
           JOIN edges arg_e ON arg_e.source = site_e.source AND arg_e.kind = 'argument'
           WHERE site_e.kind = 'call_site'
             AND callee.id LIKE 'ext::%'
             AND (fs.flow_from = 'arg:*'
                  OR fs.flow_from = 'arg:' || json_extract(arg_e.properties, '$.index'))"#,
        [],
    )?;

    // Pass 2 — side-effect: arg → arg (e.g. Unmarshal: bytes → target).
    let side_effect = conn.execute(
        r#"INSERT OR IGNORE INTO edges (source, target, kind, properties)
           SELECT DISTINCT src_arg.target, dst_arg.target, 'dfg', '{"heuristic":true,"side_effect":true}'
           FROM edges site_e
           JOIN nodes callee ON site_e.target = callee.id
           JOIN flow_semantics fs ON callee.package = fs.package AND callee.name = fs.func_name
             AND fs.flow_from LIKE 'arg:%' AND fs.flow_to LIKE 'arg:%'
           JOIN edges src_arg ON src_arg.source = site_e.source AND src_arg.kind = 'argument'
             AND (fs.flow_from = 'arg:*'
                  OR fs.flow_from = 'arg:' || json_extract(src_arg.properties, '$.index'))
           JOIN edges dst_arg ON dst_arg.source = site_e.source AND dst_arg.kind = 'argument'
             AND fs.flow_to = 'arg:' || json_extract(dst_arg.properties, '$.index')
           WHERE site_e.kind = 'call_site'
             AND callee.id LIKE 'ext::%'"#,
        [],
    )?;

    // Pass 3 — fallback: all args → call for callees with no model.
    let fallback = conn.execute(
        r#"INSERT OR IGNORE INTO edges (source, target, kind, properties)
           SELECT DISTINCT arg_e.target, site_e.source, 'dfg', '{"heuristic":true}'
           FROM edges site_e
           JOIN nodes callee ON site_e.target = callee.id
           JOIN edges arg_e ON arg_e.source = site_e.source AND arg_e.kind = 'argument'
           WHERE site_e.kind = 'call_site'
             AND callee.id LIKE 'ext::%'
             AND NOT EXISTS (
               SELECT 1 FROM flow_semantics fs
               WHERE callee.package = fs.package AND callee.name = fs.func_name
             )"#,
        [],
    )?;

    let total = precise + side_effect + fallback;
    if total > 0 {
        prog.log(format!(
            "Created {total} heuristic DFG edges ({precise} precise, {side_effect} side-effect, {fallback} fallback)"
        ));
    }
    Ok(())
}

/// Evaluation-order edges: arguments evaluate left to right, then the call
/// runs. arg[i] → arg[i+1], and the maximum-indexed argument → the call
/// node with `final = true`.
pub fn compute_eog(conn: &Connection, prog: &Progress) -> Result<()> {
    let sequential = conn.execute(
        r#"INSERT OR IGNORE INTO edges (source, target, kind, properties)
           SELECT DISTINCT src.target, dst.target, 'eog', NULL
           FROM edges src
           JOIN edges dst ON src.source = dst.source AND dst.kind = 'argument'
           WHERE src.kind = 'argument'
             AND CAST(json_extract(dst.properties, '$.index') AS INTEGER) =
                 CAST(json_extract(src.properties, '$.index') AS INTEGER) + 1"#,
        [],
    )?;

    let final_edges = conn.execute(
        r#"INSERT OR IGNORE INTO edges (source, target, kind, properties)
           SELECT DISTINCT la.arg_id, la.call_id, 'eog', '{"final":true}'
           FROM (
             SELECT e.source AS call_id, e.target AS arg_id,
               CAST(json_extract(e.properties, '$.index') AS INTEGER) AS idx
             FROM edges e WHERE e.kind = 'argument'
           ) la
           WHERE la.idx = (
             SELECT MAX(CAST(json_extract(e2.properties, '$.index') AS INTEGER))
             FROM edges e2 WHERE e2.kind = 'argument' AND e2.source = la.call_id
           )"#,
        [],
    )?;

    if sequential + final_edges > 0 {
        prog.log(format!(
            "Created {} EOG edges ({sequential} sequential, {final_edges} final-arg)",
            sequential + final_edges
        ));
    }
    Ok(())
}
