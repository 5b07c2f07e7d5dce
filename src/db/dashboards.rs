//! Pre-computed dashboard tables, graph intelligence, file/dependency
//! aggregates, type-system tables, and navigation aids.
//!
//! Each table is shaped to be directly consumable as chart data or a
//! detail panel; the heavy aggregations run after ANALYZE so the planner
//! has statistics.

use rusqlite::Connection;

use crate::error::Result;

pub fn create_dashboard_data(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
CREATE TABLE dashboard_complexity_distribution AS
  SELECT
    CASE
      WHEN cyclomatic_complexity <= 5 THEN '1-5'
      WHEN cyclomatic_complexity <= 10 THEN '6-10'
      WHEN cyclomatic_complexity <= 20 THEN '11-20'
      WHEN cyclomatic_complexity <= 50 THEN '21-50'
      ELSE '50+'
    END AS bucket,
    COUNT(*) AS count
  FROM metrics
  WHERE cyclomatic_complexity > 0
  GROUP BY bucket;

CREATE TABLE dashboard_package_treemap AS
  SELECT package,
    SUM(CASE WHEN kind = 'function' THEN end_line - line + 1 ELSE 0 END) AS loc,
    COUNT(CASE WHEN kind = 'function' THEN 1 END) AS functions,
    (SELECT COALESCE(SUM(m.cyclomatic_complexity), 0)
     FROM metrics m JOIN nodes f ON f.id = m.function_id
     WHERE f.package = nodes.package) AS total_complexity
  FROM nodes
  WHERE package IS NOT NULL
  GROUP BY package;

CREATE TABLE dashboard_findings_summary AS
  SELECT category, severity, COUNT(*) AS count
  FROM findings GROUP BY category, severity ORDER BY count DESC;

CREATE TABLE dashboard_edge_distribution AS
  SELECT kind, COUNT(*) AS count FROM edges GROUP BY kind ORDER BY count DESC;

CREATE TABLE dashboard_node_distribution AS
  SELECT kind, COUNT(*) AS count FROM nodes GROUP BY kind ORDER BY count DESC;

CREATE TABLE dashboard_complexity_vs_loc AS
  SELECT m.function_id, n.name, n.package,
    m.cyclomatic_complexity AS complexity, m.loc, m.fan_in, m.fan_out
  FROM metrics m JOIN nodes n ON n.id = m.function_id
  WHERE m.cyclomatic_complexity > 0 AND m.loc > 0;

CREATE TABLE dashboard_overview AS
  SELECT 'total_nodes' AS key, CAST((SELECT COUNT(*) FROM nodes) AS TEXT) AS value
  UNION ALL SELECT 'total_edges', CAST((SELECT COUNT(*) FROM edges) AS TEXT)
  UNION ALL SELECT 'total_functions', CAST((SELECT COUNT(*) FROM nodes WHERE kind='function') AS TEXT)
  UNION ALL SELECT 'total_packages', CAST((SELECT COUNT(DISTINCT package) FROM nodes WHERE package IS NOT NULL) AS TEXT)
  UNION ALL SELECT 'total_findings', CAST((SELECT COUNT(*) FROM findings) AS TEXT)
  UNION ALL SELECT 'avg_complexity',
    CAST((SELECT ROUND(AVG(cyclomatic_complexity), 2) FROM metrics WHERE cyclomatic_complexity > 0) AS TEXT);
",
    )?;
    Ok(())
}

pub fn create_graph_intelligence(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
CREATE TABLE dashboard_top_functions AS
  SELECT 'complexity' AS metric, function_id, cyclomatic_complexity AS value,
    RANK() OVER (ORDER BY cyclomatic_complexity DESC) AS rank
  FROM metrics WHERE cyclomatic_complexity > 1
  UNION ALL
  SELECT 'loc', function_id, loc, RANK() OVER (ORDER BY loc DESC) FROM metrics WHERE loc > 0
  UNION ALL
  SELECT 'fan_in', function_id, fan_in, RANK() OVER (ORDER BY fan_in DESC) FROM metrics WHERE fan_in > 0
  UNION ALL
  SELECT 'fan_out', function_id, fan_out, RANK() OVER (ORDER BY fan_out DESC) FROM metrics WHERE fan_out > 0;

DELETE FROM dashboard_top_functions WHERE rank > 50;

CREATE TABLE dashboard_hotspots AS
  SELECT n.id AS function_id, n.name, n.package, n.file, n.line,
    COALESCE(m.cyclomatic_complexity, 0) AS complexity,
    COALESCE(m.fan_in, 0) AS fan_in,
    (SELECT COUNT(*) FROM findings f WHERE f.node_id = n.id) AS finding_count,
    COALESCE(m.cyclomatic_complexity, 0) + COALESCE(m.fan_in, 0) * 2 +
      (SELECT COUNT(*) FROM findings f WHERE f.node_id = n.id) * 5 AS hotspot_score
  FROM nodes n
  LEFT JOIN metrics m ON m.function_id = n.id
  WHERE n.kind = 'function'
  ORDER BY hotspot_score DESC;

CREATE TABLE package_coupling AS
  SELECT source_package, target_package, call_count
  FROM v_package_deps ORDER BY call_count DESC;

CREATE TABLE error_chains AS
  SELECT n.id AS function_id, n.name, n.package,
    (SELECT COUNT(*) FROM edges e JOIN nodes c ON c.id = e.source
     WHERE e.kind = 'error_wrap' AND c.parent_function = n.id) AS error_wraps,
    (SELECT COUNT(*) FROM edges e WHERE e.source = n.id AND e.kind = 'call') AS callees
  FROM nodes n
  JOIN node_properties np ON np.node_id = n.id AND np.key = 'returns_error' AND np.value = '1'
  WHERE n.kind = 'function';
",
    )?;
    Ok(())
}

pub fn create_file_and_dep_analysis(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
CREATE TABLE dashboard_file_heatmap AS
  SELECT n.file, n.package,
    COUNT(CASE WHEN n.kind = 'function' THEN 1 END) AS function_count,
    SUM(CASE WHEN n.kind = 'function' THEN COALESCE(m.cyclomatic_complexity, 0) ELSE 0 END) AS total_complexity,
    (SELECT COUNT(*) FROM findings f WHERE f.file = n.file) AS finding_count,
    SUM(CASE WHEN n.kind = 'function' THEN COALESCE(m.cyclomatic_complexity, 0) ELSE 0 END) +
      (SELECT COUNT(*) FROM findings f WHERE f.file = n.file) * 3 AS hotspot_score
  FROM nodes n
  LEFT JOIN metrics m ON m.function_id = n.id
  WHERE n.file IS NOT NULL
  GROUP BY n.file;

CREATE TABLE dashboard_package_graph AS
  SELECT source_package AS source, target_package AS target, call_count AS weight
  FROM v_package_deps
  WHERE source_package NOT LIKE '%.%/%' AND target_package NOT LIKE '%.%/%';

CREATE TABLE dashboard_function_detail AS
  SELECT n.id AS function_id, n.name, n.package, n.file, n.line, n.end_line,
    n.type_info,
    COALESCE(m.cyclomatic_complexity, 0) AS complexity,
    COALESCE(m.loc, 0) AS loc,
    COALESCE(m.fan_in, 0) AS fan_in,
    COALESCE(m.fan_out, 0) AS fan_out,
    COALESCE(m.num_params, 0) AS num_params,
    (SELECT GROUP_CONCAT(DISTINCT c.name) FROM edges e JOIN nodes c ON c.id = e.source
     WHERE e.target = n.id AND e.kind = 'call' AND c.kind = 'function') AS callers,
    (SELECT GROUP_CONCAT(DISTINCT c.name) FROM edges e JOIN nodes c ON c.id = e.target
     WHERE e.source = n.id AND e.kind = 'call' AND c.kind = 'function') AS callees
  FROM nodes n
  LEFT JOIN metrics m ON m.function_id = n.id
  WHERE n.kind = 'function';
",
    )?;
    Ok(())
}

pub fn create_type_system_analysis(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
CREATE TABLE type_impl_map AS
  SELECT i.id AS interface_id, i.name AS interface_name, i.package AS interface_package,
    c.id AS impl_id, c.name AS impl_name, c.package AS impl_package,
    (SELECT COUNT(*) FROM edges hm WHERE hm.source = c.id AND hm.kind = 'has_method') AS method_count
  FROM edges e
  JOIN nodes c ON c.id = e.source
  JOIN nodes i ON i.id = e.target
  WHERE e.kind = 'implements';

CREATE TABLE type_hierarchy AS
  SELECT parent.id AS type_id, parent.name AS type_name, parent.package,
    child.id AS embedded_id, child.name AS embedded_name, child.package AS embedded_package
  FROM edges e
  JOIN nodes parent ON parent.id = e.source
  JOIN nodes child ON child.id = e.target
  WHERE e.kind = 'embeds';

CREATE TABLE type_method_set AS
  SELECT t.id AS type_id, t.name AS type_name, t.package,
    f.id AS method_id, f.name AS method_name,
    COALESCE(m.cyclomatic_complexity, 0) AS complexity,
    COALESCE(m.loc, 0) AS loc
  FROM edges e
  JOIN nodes t ON t.id = e.source
  JOIN nodes f ON f.id = e.target
  LEFT JOIN metrics m ON m.function_id = f.id
  WHERE e.kind = 'has_method';

-- Large interfaces (overly broad contracts)
INSERT INTO findings (category, severity, node_id, file, line, message, details)
  SELECT 'large_interface', 'info', n.id, n.file, n.line,
    n.name || ' has ' || cnt || ' methods',
    json_object('method_count', cnt, 'package', n.package)
  FROM (
    SELECT e.source AS id, COUNT(*) AS cnt
    FROM edges e
    JOIN nodes f ON f.id = e.target AND f.kind = 'field'
    WHERE e.kind = 'ast'
    GROUP BY e.source
    HAVING COUNT(*) > 10
  ) sub
  JOIN nodes n ON n.id = sub.id
  JOIN node_properties tk ON tk.node_id = n.id AND tk.key = 'type_kind' AND tk.value = 'interface';

-- Orphan types: no implements/embeds/method edges at all
INSERT INTO findings (category, severity, node_id, file, line, message, details)
  SELECT 'orphan_type', 'info', n.id, n.file, n.line,
    n.name || ' has no type relationships or methods',
    json_object('package', n.package)
  FROM nodes n
  WHERE n.kind = 'type_decl'
    AND NOT EXISTS (SELECT 1 FROM edges e WHERE (e.source = n.id OR e.target = n.id)
                    AND e.kind IN ('implements', 'embeds', 'has_method', 'alias_of'));
",
    )?;
    Ok(())
}

pub fn create_navigation(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
CREATE TABLE symbol_index AS
  SELECT id, name, kind, package, file, line,
    json_extract(properties, '$.exported') AS exported
  FROM nodes
  WHERE kind IN ('function', 'type_decl', 'field', 'local')
    AND name != '' AND file IS NOT NULL;
CREATE INDEX idx_symbol_name ON symbol_index(name);
CREATE INDEX idx_symbol_kind ON symbol_index(kind);

CREATE TABLE file_outline AS
  SELECT file, line, kind, name, id,
    CASE kind WHEN 'function' THEN 0 WHEN 'type_decl' THEN 1 ELSE 2 END AS sort_group
  FROM nodes
  WHERE kind IN ('function', 'type_decl', 'import') AND file IS NOT NULL
  ORDER BY file, line;
CREATE INDEX idx_file_outline ON file_outline(file, line);

CREATE TABLE xrefs AS
  SELECT e.target AS def_id, d.name AS def_name, d.kind AS def_kind,
    e.source AS use_id, u.file AS use_file, u.line AS use_line
  FROM edges e
  JOIN nodes d ON d.id = e.target
  JOIN nodes u ON u.id = e.source
  WHERE e.kind = 'ref';
CREATE INDEX idx_xrefs_def ON xrefs(def_id);
CREATE INDEX idx_xrefs_name ON xrefs(def_name);

CREATE TABLE go_pattern_summary AS
  SELECT package,
    SUM(CASE WHEN kind = 'go' THEN 1 ELSE 0 END) AS goroutine_count,
    SUM(CASE WHEN kind = 'send' THEN 1 ELSE 0 END) AS channel_send_count,
    SUM(CASE WHEN kind = 'select' THEN 1 ELSE 0 END) AS select_count,
    SUM(CASE WHEN kind = 'defer' THEN 1 ELSE 0 END) AS defer_count,
    SUM(CASE WHEN kind = 'branch' THEN 1 ELSE 0 END) AS branch_count
  FROM nodes
  WHERE package IS NOT NULL
  GROUP BY package;
",
    )?;
    Ok(())
}
