//! Full-text search, summary statistics, vertical property tables, the
//! analysis views, and the parameterized query catalogue.

use rusqlite::Connection;

use crate::error::Result;

/// FTS5 virtual table over source content.
pub fn create_fts(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE VIRTUAL TABLE sources_fts USING fts5(file, content, package, content=sources, content_rowid=rowid);
         INSERT INTO sources_fts(sources_fts) VALUES('rebuild');",
    )?;
    Ok(())
}

/// Pre-computed summary tables plus the vertical property projections.
/// Every JSON property key/value pair lands as a `(id, key, value)` row
/// with a composite index on `(key, value)`.
pub fn create_summary_stats(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
CREATE TABLE stats_node_kinds AS
  SELECT kind, COUNT(*) as count FROM nodes GROUP BY kind ORDER BY count DESC;

CREATE TABLE stats_edge_kinds AS
  SELECT kind, COUNT(*) as count FROM edges GROUP BY kind ORDER BY count DESC;

CREATE TABLE stats_packages AS
  SELECT n.package as package,
         COUNT(DISTINCT CASE WHEN n.kind='file' THEN n.id END) as files,
         COUNT(DISTINCT CASE WHEN n.kind='function' THEN n.id END) as functions,
         COUNT(DISTINCT CASE WHEN n.kind='type_decl' THEN n.id END) as types,
         SUM(CASE WHEN n.kind='function' THEN (n.end_line - n.line + 1) ELSE 0 END) as loc
  FROM nodes n
  WHERE n.package IS NOT NULL
  GROUP BY n.package
  ORDER BY functions DESC;

CREATE TABLE stats_overview AS
  SELECT
    (SELECT COUNT(*) FROM nodes) as total_nodes,
    (SELECT COUNT(*) FROM edges) as total_edges,
    (SELECT COUNT(*) FROM sources) as total_files,
    (SELECT COUNT(DISTINCT package) FROM nodes WHERE package IS NOT NULL) as total_packages,
    (SELECT COUNT(*) FROM nodes WHERE kind='function') as total_functions,
    (SELECT COUNT(*) FROM nodes WHERE kind='type_decl') as total_types,
    (SELECT COUNT(*) FROM metrics) as total_metrics;

CREATE TABLE node_properties (
    node_id TEXT NOT NULL,
    key TEXT NOT NULL,
    value TEXT NOT NULL
);
INSERT INTO node_properties (node_id, key, value)
  SELECT n.id, j.key, j.value
  FROM nodes n, json_each(n.properties) j
  WHERE n.properties IS NOT NULL AND n.properties != '';
CREATE INDEX idx_node_props_key_value ON node_properties(key, value);
CREATE INDEX idx_node_props_node ON node_properties(node_id);

CREATE TABLE edge_properties (
    source TEXT NOT NULL,
    target TEXT NOT NULL,
    edge_kind TEXT NOT NULL,
    key TEXT NOT NULL,
    value TEXT NOT NULL
);
INSERT INTO edge_properties (source, target, edge_kind, key, value)
  SELECT e.source, e.target, e.kind, j.key, j.value
  FROM edges e, json_each(e.properties) j
  WHERE e.properties IS NOT NULL AND e.properties != '';
CREATE INDEX idx_edge_props_key_value ON edge_properties(key, value);
",
    )?;
    Ok(())
}

/// The analysis view suite.
pub fn create_analysis_views(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
-- Flattened call graph with human-readable names
CREATE VIEW v_call_graph AS
  SELECT
    e.source AS caller_id,
    n1.name AS caller_name,
    n1.package AS caller_package,
    e.target AS callee_id,
    n2.name AS callee_name,
    n2.package AS callee_package,
    CASE WHEN ep.value IS NOT NULL THEN 1 ELSE 0 END AS is_dynamic
  FROM edges e
  JOIN nodes n1 ON e.source = n1.id
  JOIN nodes n2 ON e.target = n2.id
  LEFT JOIN edge_properties ep ON ep.source = e.source AND ep.target = e.target
    AND ep.edge_kind = 'call' AND ep.key = 'dynamic'
  WHERE e.kind = 'call';

-- Data flow edges with context
CREATE VIEW v_data_flow AS
  SELECT
    e.source AS def_id,
    n1.name AS def_name,
    n1.kind AS def_kind,
    n1.file AS def_file,
    n1.line AS def_line,
    e.target AS use_id,
    n2.name AS use_name,
    n2.kind AS use_kind,
    n2.file AS use_file,
    n2.line AS use_line
  FROM edges e
  JOIN nodes n1 ON e.source = n1.id
  JOIN nodes n2 ON e.target = n2.id
  WHERE e.kind = 'dfg';

-- Function summary with metrics and call counts
CREATE VIEW v_function_summary AS
  SELECT
    n.id,
    n.name,
    n.package,
    n.file,
    n.line,
    n.end_line,
    COALESCE(m.cyclomatic_complexity, 0) AS complexity,
    COALESCE(m.fan_in, 0) AS fan_in,
    COALESCE(m.fan_out, 0) AS fan_out,
    COALESCE(m.loc, n.end_line - n.line + 1) AS loc,
    COALESCE(m.num_params, 0) AS num_params,
    (SELECT COUNT(*) FROM edges e WHERE e.source = n.id AND e.kind = 'call') AS calls_out,
    (SELECT COUNT(*) FROM edges e WHERE e.target = n.id AND e.kind = 'call') AS calls_in
  FROM nodes n
  LEFT JOIN metrics m ON m.function_id = n.id
  WHERE n.kind = 'function';

-- Type hierarchy with implementations
CREATE VIEW v_type_hierarchy AS
  SELECT
    n1.id AS type_id,
    n1.name AS type_name,
    n1.package AS type_package,
    e.kind AS relationship,
    n2.id AS target_id,
    n2.name AS target_name,
    n2.package AS target_package
  FROM edges e
  JOIN nodes n1 ON e.source = n1.id
  JOIN nodes n2 ON e.target = n2.id
  WHERE e.kind IN ('implements', 'embeds', 'alias_of');

-- Package dependency graph: aggregated cross-package call edges
CREATE VIEW v_package_deps AS
  SELECT
    n1.package AS source_package,
    n2.package AS target_package,
    COUNT(*) AS call_count,
    COUNT(DISTINCT n1.id) AS distinct_callers,
    COUNT(DISTINCT n2.id) AS distinct_callees
  FROM edges e
  JOIN nodes n1 ON e.source = n1.id
  JOIN nodes n2 ON e.target = n2.id
  WHERE e.kind = 'call'
    AND n1.package IS NOT NULL AND n2.package IS NOT NULL
    AND n1.package != n2.package
  GROUP BY n1.package, n2.package;

-- File dependency graph
CREATE VIEW v_file_deps AS
  SELECT
    n1.file AS source_file,
    n2.file AS target_file,
    COUNT(*) AS call_count
  FROM edges e
  JOIN nodes n1 ON e.source = n1.id
  JOIN nodes n2 ON e.target = n2.id
  WHERE e.kind = 'call'
    AND n1.file IS NOT NULL AND n2.file IS NOT NULL
    AND n1.file != n2.file
  GROUP BY n1.file, n2.file;

-- Function I/O: parameters and return values per function
CREATE VIEW v_function_io AS
  SELECT
    f.id AS function_id,
    f.name AS function_name,
    f.package,
    p.id AS io_node_id,
    p.name AS io_name,
    p.kind AS io_kind,
    p.type_info AS io_type,
    json_extract(p.properties, '$.mutable') AS is_mutable,
    json_extract(p.properties, '$.nullable') AS is_nullable
  FROM nodes f
  JOIN edges e ON e.source = f.id AND e.kind = 'ast'
  JOIN nodes p ON p.id = e.target AND p.kind IN ('parameter', 'result')
  WHERE f.kind = 'function';

-- Exported API surface per package
CREATE VIEW v_api_surface AS
  SELECT n.package, n.kind, n.id, n.name, n.type_info, n.file, n.line
  FROM nodes n
  WHERE n.name GLOB '[A-Z]*'
    AND n.kind IN ('function', 'type_decl')
    AND n.package IS NOT NULL;

-- Methods grouped by receiver type
CREATE VIEW v_method_sets AS
  SELECT
    np.value AS receiver_type,
    n.package,
    n.id, n.name, n.type_info, n.file, n.line,
    COALESCE(m.cyclomatic_complexity, 0) AS complexity,
    COALESCE(m.loc, 0) AS loc
  FROM nodes n
  JOIN node_properties np ON np.node_id = n.id AND np.key = 'receiver'
  LEFT JOIN metrics m ON m.function_id = n.id
  WHERE n.kind = 'function';

-- Error-returning functions with metrics
CREATE VIEW v_error_handling AS
  SELECT
    n.id, n.name, n.package, n.file, n.line,
    COALESCE(m.fan_in, 0) AS callers,
    COALESCE(m.fan_out, 0) AS callees,
    COALESCE(m.cyclomatic_complexity, 0) AS complexity
  FROM nodes n
  JOIN node_properties np ON np.node_id = n.id AND np.key = 'returns_error' AND np.value = '1'
  LEFT JOIN metrics m ON m.function_id = n.id
  WHERE n.kind = 'function';

-- Package stability (afferent/efferent coupling, instability, abstractness)
CREATE VIEW v_package_stability AS
  WITH pkg_types AS (
    SELECT n.package, COUNT(*) AS total_types,
      SUM(CASE WHEN np.value = 'interface' THEN 1 ELSE 0 END) AS interface_count
    FROM nodes n
    LEFT JOIN node_properties np ON np.node_id = n.id AND np.key = 'type_kind'
    WHERE n.kind = 'type_decl' AND n.package IS NOT NULL
    GROUP BY n.package
  ),
  afferent AS (
    SELECT target_package AS package, COUNT(DISTINCT source_package) AS ca
    FROM v_package_deps GROUP BY target_package
  ),
  efferent AS (
    SELECT source_package AS package, COUNT(DISTINCT target_package) AS ce
    FROM v_package_deps GROUP BY source_package
  )
  SELECT
    COALESCE(pt.package, a.package, e.package) AS package,
    COALESCE(a.ca, 0) AS afferent_coupling,
    COALESCE(e.ce, 0) AS efferent_coupling,
    CASE WHEN COALESCE(a.ca, 0) + COALESCE(e.ce, 0) = 0 THEN 0.5
         ELSE ROUND(CAST(COALESCE(e.ce, 0) AS REAL) / (COALESCE(a.ca, 0) + COALESCE(e.ce, 0)), 3)
    END AS instability,
    COALESCE(pt.total_types, 0) AS total_types,
    COALESCE(pt.interface_count, 0) AS interface_count,
    CASE WHEN COALESCE(pt.total_types, 0) = 0 THEN 0.0
         ELSE ROUND(CAST(COALESCE(pt.interface_count, 0) AS REAL) / pt.total_types, 3)
    END AS abstractness
  FROM pkg_types pt
  FULL OUTER JOIN afferent a ON a.package = pt.package
  FULL OUTER JOIN efferent e ON e.package = COALESCE(pt.package, a.package);

-- Control flow profile per function
CREATE VIEW v_control_flow_profile AS
  SELECT
    n.parent_function AS function_id,
    fn.name AS function_name,
    fn.package,
    SUM(CASE WHEN n.kind = 'if' THEN 1 ELSE 0 END) AS if_count,
    SUM(CASE WHEN n.kind = 'for' THEN 1 ELSE 0 END) AS for_count,
    SUM(CASE WHEN n.kind = 'switch' THEN 1 ELSE 0 END) AS switch_count,
    SUM(CASE WHEN n.kind = 'select' THEN 1 ELSE 0 END) AS select_count,
    SUM(CASE WHEN n.kind = 'return' THEN 1 ELSE 0 END) AS return_count,
    SUM(CASE WHEN n.kind = 'defer' THEN 1 ELSE 0 END) AS defer_count,
    SUM(CASE WHEN n.kind = 'go' THEN 1 ELSE 0 END) AS go_count,
    COUNT(*) AS total_statements
  FROM nodes n
  JOIN nodes fn ON fn.id = n.parent_function
  WHERE n.parent_function IS NOT NULL
    AND n.kind IN ('if', 'for', 'switch', 'select', 'return', 'defer', 'go',
                   'assign', 'call', 'send', 'branch')
  GROUP BY n.parent_function;

-- Package cohesion: internal vs external calls
CREATE VIEW v_package_cohesion AS
  WITH pkg_calls AS (
    SELECT n1.package AS pkg,
      COUNT(*) AS total_calls,
      SUM(CASE WHEN n1.package = n2.package THEN 1 ELSE 0 END) AS internal_calls,
      SUM(CASE WHEN n1.package != n2.package THEN 1 ELSE 0 END) AS external_calls
    FROM edges e
    JOIN nodes n1 ON e.source = n1.id
    JOIN nodes n2 ON e.target = n2.id
    WHERE e.kind = 'call' AND n1.package IS NOT NULL AND n2.package IS NOT NULL
    GROUP BY n1.package
  ),
  pkg_funcs AS (
    SELECT package AS pkg, COUNT(*) AS func_count
    FROM nodes WHERE kind = 'function' AND package IS NOT NULL
    GROUP BY package
  )
  SELECT
    pc.pkg AS package,
    pf.func_count,
    pc.total_calls,
    pc.internal_calls,
    pc.external_calls,
    ROUND(CAST(pc.internal_calls AS REAL) / MAX(pc.total_calls, 1), 3) AS cohesion_ratio
  FROM pkg_calls pc
  JOIN pkg_funcs pf ON pf.pkg = pc.pkg;

-- Concurrency profile per package
CREATE VIEW v_concurrency_profile AS
  SELECT
    n.package,
    SUM(CASE WHEN n.kind = 'go' THEN 1 ELSE 0 END) AS goroutine_launches,
    SUM(CASE WHEN n.kind = 'send' THEN 1 ELSE 0 END) AS channel_sends,
    SUM(CASE WHEN n.kind = 'select' THEN 1 ELSE 0 END) AS select_stmts,
    (SELECT COUNT(*) FROM node_properties np2
     JOIN nodes n2 ON n2.id = np2.node_id AND n2.package = n.package
     WHERE np2.key = 'sync_kind') AS sync_primitives,
    SUM(CASE WHEN n.kind = 'defer' THEN 1 ELSE 0 END) AS defer_stmts
  FROM nodes n
  WHERE n.package IS NOT NULL
    AND n.kind IN ('go', 'send', 'select', 'defer')
  GROUP BY n.package
  HAVING SUM(CASE WHEN n.kind = 'go' THEN 1 ELSE 0 END) > 0
     OR SUM(CASE WHEN n.kind = 'send' THEN 1 ELSE 0 END) > 0
     OR SUM(CASE WHEN n.kind = 'select' THEN 1 ELSE 0 END) > 0;

-- Transitive package impact
CREATE VIEW v_package_impact AS
  WITH RECURSIVE impact(pkg, depth) AS (
    SELECT DISTINCT source_package, 0 FROM v_package_deps
    UNION
    SELECT pd.source_package, i.depth + 1
    FROM impact i
    JOIN v_package_deps pd ON pd.target_package = i.pkg
    WHERE i.depth < 10
  )
  SELECT pkg AS package,
    COUNT(DISTINCT pkg) - 1 AS packages_affected,
    MAX(depth) AS max_impact_depth
  FROM impact
  GROUP BY pkg;
",
    )?;
    Ok(())
}

/// Ready-to-use parameterized CTE queries for the consumer.
pub fn create_queries(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
CREATE TABLE queries (
    name TEXT PRIMARY KEY,
    description TEXT NOT NULL,
    sql TEXT NOT NULL
);

INSERT INTO queries (name, description, sql) VALUES
('backward_slice',
 'Backward program slice: all nodes contributing to a node via data flow',
 'WITH RECURSIVE slice(id, depth) AS (
  SELECT :node_id, 0
  UNION
  SELECT e.source, s.depth + 1
  FROM slice s JOIN edges e ON e.target = s.id
  WHERE e.kind IN (''dfg'', ''param_in'') AND s.depth < 20
)
SELECT DISTINCT n.* FROM slice s JOIN nodes n ON n.id = s.id ORDER BY n.file, n.line'),

('forward_slice',
 'Forward program slice: all nodes affected by a node via data flow',
 'WITH RECURSIVE slice(id, depth) AS (
  SELECT :node_id, 0
  UNION
  SELECT e.target, s.depth + 1
  FROM slice s JOIN edges e ON e.source = s.id
  WHERE e.kind IN (''dfg'', ''param_out'') AND s.depth < 20
)
SELECT DISTINCT n.* FROM slice s JOIN nodes n ON n.id = s.id ORDER BY n.file, n.line'),

('call_chain',
 'Transitive call chain from a function',
 'WITH RECURSIVE chain(id, depth, path) AS (
  SELECT :function_id, 0, :function_id
  UNION
  SELECT e.target, c.depth + 1, c.path || '' -> '' || e.target
  FROM chain c JOIN edges e ON e.source = c.id
  WHERE e.kind = ''call'' AND c.depth < 10
    AND c.path NOT LIKE ''%'' || e.target || ''%''
)
SELECT DISTINCT n.id, n.name, n.package, c.depth
FROM chain c JOIN nodes n ON n.id = c.id ORDER BY c.depth, n.name'),

('callers_of',
 'All callers of a function (transitive, up to depth 5)',
 'WITH RECURSIVE callers(id, depth) AS (
  SELECT :function_id, 0
  UNION
  SELECT e.source, c.depth + 1
  FROM callers c JOIN edges e ON e.target = c.id
  WHERE e.kind = ''call'' AND c.depth < 5
)
SELECT DISTINCT n.id, n.name, n.package, c.depth
FROM callers c JOIN nodes n ON n.id = c.id
WHERE n.kind = ''function'' ORDER BY c.depth, n.name'),

('scope_variables',
 'Variables visible at a block, walking the scope chain',
 'WITH RECURSIVE scope_chain(id) AS (
  SELECT :block_id
  UNION
  SELECT e.target FROM scope_chain sc JOIN edges e ON e.source = sc.id WHERE e.kind = ''scope''
)
SELECT n.* FROM scope_chain sc
JOIN edges e ON e.source = sc.id AND e.kind = ''ast''
JOIN nodes n ON n.id = e.target
WHERE n.kind IN (''local'', ''parameter'', ''result'')
ORDER BY n.file, n.line'),

('interface_implementors',
 'All types implementing a given interface',
 'SELECT n.id, n.name, n.package, n.file, n.line
FROM edges e JOIN nodes n ON e.source = n.id
WHERE e.kind = ''implements'' AND e.target = :interface_id
ORDER BY n.package, n.name'),

('function_cfg',
 'Basic blocks and their connections for a function',
 'SELECT
  bb.id AS block_id, bb.name AS block_name, bb.line AS block_line,
  e.target AS successor_id, n2.name AS successor_name,
  ep.value AS branch_label
FROM nodes bb
LEFT JOIN edges e ON e.source = bb.id AND e.kind = ''cfg''
LEFT JOIN nodes n2 ON e.target = n2.id
LEFT JOIN edge_properties ep ON ep.source = e.source AND ep.target = e.target
  AND ep.edge_kind = ''cfg'' AND ep.key = ''label''
WHERE bb.kind = ''basic_block'' AND bb.parent_function = :function_id
ORDER BY bb.line'),

('cross_package_calls',
 'Function calls crossing package boundaries',
 'SELECT n1.package AS caller_pkg, n1.name AS caller, n2.package AS callee_pkg, n2.name AS callee
FROM edges e
JOIN nodes n1 ON e.source = n1.id
JOIN nodes n2 ON e.target = n2.id
WHERE e.kind = ''call'' AND n1.package != n2.package AND n1.package IS NOT NULL AND n2.package IS NOT NULL
ORDER BY n1.package, n2.package'),

('context_propagation',
 'Context-carrying functions calling functions without context',
 'SELECT
  caller.id AS caller_id, caller.name AS caller_name, caller.package AS caller_pkg,
  callee.id AS callee_id, callee.name AS callee_name, callee.package AS callee_pkg,
  CASE WHEN callee_ctx.value IS NOT NULL THEN ''propagated'' ELSE ''MISSING'' END AS ctx_status
FROM edges e
JOIN nodes caller ON e.source = caller.id
JOIN nodes callee ON e.target = callee.id
JOIN node_properties caller_ctx ON caller_ctx.node_id = caller.id
  AND caller_ctx.key = ''has_context'' AND caller_ctx.value = ''1''
LEFT JOIN node_properties callee_ctx ON callee_ctx.node_id = callee.id
  AND callee_ctx.key = ''has_context'' AND callee_ctx.value = ''1''
WHERE e.kind = ''call'' AND callee.kind = ''function''
ORDER BY ctx_status DESC, caller.package, caller.name'),

('reaching_definitions',
 'Definitions that flow to a given use',
 'SELECT n.id, n.name, n.kind, n.file, n.line, n.type_info
FROM edges e JOIN nodes n ON e.source = n.id
WHERE e.kind = ''dfg'' AND e.target = :node_id
ORDER BY n.file, n.line'),

('goroutine_analysis',
 'Goroutine launches with the sync primitives of their host function',
 'SELECT
  g.id AS go_id, g.file, g.line,
  fn.name AS parent_function,
  (SELECT GROUP_CONCAT(DISTINCT np.value) FROM nodes sync
   JOIN node_properties np ON np.node_id = sync.id AND np.key = ''sync_kind''
   WHERE sync.parent_function = fn.id) AS sync_primitives,
  (SELECT COUNT(*) FROM nodes g2 WHERE g2.kind = ''go'' AND g2.parent_function = fn.id) AS goroutine_count
FROM nodes g
JOIN nodes fn ON g.parent_function = fn.id
WHERE g.kind = ''go''
ORDER BY goroutine_count DESC, fn.name'),

('taint_analysis',
 'Call nodes annotated with security roles',
 'SELECT n.id, n.name, n.file, n.line, n.parent_function,
    np_role.value AS taint_role,
    COALESCE(np_cat.value, '''') AS taint_category,
    fn.name AS function_name
  FROM node_properties np_role
  JOIN nodes n ON n.id = np_role.node_id
  LEFT JOIN node_properties np_cat ON np_cat.node_id = n.id AND np_cat.key = ''taint_category''
  LEFT JOIN nodes fn ON fn.id = n.parent_function
  WHERE np_role.key = ''taint_role''
  ORDER BY np_role.value, n.file, n.line'),

('taint_path',
 'Functions containing both taint sources and sinks',
 'SELECT DISTINCT fn.id, fn.name, fn.package, fn.file, fn.line,
    GROUP_CONCAT(DISTINCT src_cat.value) AS source_categories,
    GROUP_CONCAT(DISTINCT sink_cat.value) AS sink_categories
  FROM node_properties src_role
  JOIN nodes src ON src.id = src_role.node_id
  JOIN node_properties src_cat ON src_cat.node_id = src.id AND src_cat.key = ''taint_category''
  CROSS JOIN node_properties sink_role
  JOIN nodes sink ON sink.id = sink_role.node_id
  JOIN node_properties sink_cat ON sink_cat.node_id = sink.id AND sink_cat.key = ''taint_category''
  JOIN nodes fn ON fn.id = src.parent_function
  WHERE src_role.key = ''taint_role'' AND src_role.value = ''source''
    AND sink_role.key = ''taint_role'' AND sink_role.value = ''sink''
    AND src.parent_function = sink.parent_function AND src.parent_function IS NOT NULL
  GROUP BY fn.id ORDER BY fn.package, fn.name'),

('function_io',
 'Parameters and return values for a function',
 'SELECT * FROM v_function_io WHERE function_id = :function_id ORDER BY io_kind DESC, io_name'),

('data_flow_path',
 'Data flow paths from a source node',
 'WITH RECURSIVE flow_path(id, depth, path) AS (
    SELECT :source_id, 0, :source_id
    UNION
    SELECT e.target, fp.depth + 1, fp.path || '' -> '' || e.target
    FROM flow_path fp
    JOIN edges e ON e.source = fp.id AND e.kind = ''dfg''
    WHERE fp.depth < 15 AND fp.path NOT LIKE ''%'' || e.target || ''%''
  )
  SELECT fp.id, n.name, n.kind, n.file, n.line, fp.depth
  FROM flow_path fp
  JOIN nodes n ON n.id = fp.id
  ORDER BY fp.depth, n.file, n.line'),

('impact_analysis',
 'Transitive callers affected by changing a function',
 'WITH RECURSIVE callers(id, depth) AS (
    SELECT :function_id, 0
    UNION
    SELECT e.source, c.depth + 1
    FROM callers c
    JOIN edges e ON e.target = c.id AND e.kind = ''call''
    WHERE c.depth < 8
  )
  SELECT DISTINCT n.id, n.name, n.package, n.file, n.line, c.depth
  FROM callers c JOIN nodes n ON n.id = c.id
  WHERE n.kind = ''function''
  ORDER BY c.depth, n.package, n.name'),

('error_chain',
 'Error-returning call chains from a function',
 'WITH RECURSIVE err_chain(id, name, pkg, depth) AS (
    SELECT :function_id, (SELECT name FROM nodes WHERE id = :function_id),
           (SELECT package FROM nodes WHERE id = :function_id), 0
    UNION
    SELECT e.target, n.name, n.package, ec.depth + 1
    FROM err_chain ec
    JOIN edges e ON e.source = ec.id AND e.kind = ''call''
    JOIN nodes n ON n.id = e.target
    JOIN node_properties np ON np.node_id = n.id AND np.key = ''returns_error'' AND np.value = ''1''
    WHERE ec.depth < 10
  )
  SELECT DISTINCT id, name, pkg, depth FROM err_chain ORDER BY depth, name'),

('function_neighborhood',
 'Direct callers and callees of a function',
 'SELECT ''caller'' AS direction, n.id, n.name, n.package, n.file, n.line
  FROM edges e JOIN nodes n ON n.id = e.source
  WHERE e.target = :function_id AND e.kind = ''call'' AND n.kind = ''function''
  UNION ALL
  SELECT ''callee'' AS direction, n.id, n.name, n.package, n.file, n.line
  FROM edges e JOIN nodes n ON n.id = e.target
  WHERE e.source = :function_id AND e.kind = ''call'' AND n.kind = ''function''
  ORDER BY direction, name'),

('package_cohesion',
 'Package cohesion analysis',
 'SELECT package, func_count, total_calls, internal_calls, external_calls, cohesion_ratio
  FROM v_package_cohesion ORDER BY cohesion_ratio ASC'),

('concurrency_profile',
 'Per-package concurrency usage',
 'SELECT * FROM v_concurrency_profile ORDER BY goroutine_launches DESC'),

('package_impact',
 'Transitive package impact',
 'SELECT * FROM v_package_impact ORDER BY packages_affected DESC'),

('package_stability',
 'Package instability and abstractness',
 'SELECT package, afferent_coupling, efferent_coupling, instability,
    total_types, interface_count, abstractness,
    ROUND(ABS(instability + abstractness - 1.0), 3) AS distance_from_main_seq
  FROM v_package_stability
  ORDER BY distance_from_main_seq DESC'),

('function_risk_ranking',
 'Top riskiest functions by composite risk score',
 'SELECT node_id, file, line, message,
    json_extract(details, ''$.risk_score'') AS risk_score
  FROM findings
  WHERE category = ''risk_score''
  ORDER BY CAST(json_extract(details, ''$.risk_score'') AS REAL) DESC
  LIMIT 50'),

('file_complexity_heatmap',
 'Total complexity per file',
 'SELECT n.file, COUNT(*) AS function_count,
    SUM(COALESCE(m.cyclomatic_complexity, 0)) AS total_complexity,
    MAX(COALESCE(m.cyclomatic_complexity, 0)) AS max_complexity,
    ROUND(AVG(COALESCE(m.cyclomatic_complexity, 0)), 1) AS avg_complexity,
    SUM(COALESCE(m.loc, 0)) AS total_loc
  FROM nodes n
  LEFT JOIN metrics m ON m.function_id = n.id
  WHERE n.kind = ''function'' AND n.file IS NOT NULL
  GROUP BY n.file ORDER BY total_complexity DESC');
",
    )?;
    Ok(())
}
