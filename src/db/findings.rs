//! The findings table and its rule catalogue.
//!
//! Findings are pre-computed defect and hotspot signals materialized from
//! the graph: complexity, size, nesting, hubs, dead stores, unused params
//! and exports, circular dependencies, recursion, risk scores, structural
//! clones, and Go-idiom patterns (context placement, boolean blindness,
//! direct panics).

use rusqlite::Connection;

use crate::error::Result;

/// Table plus the base rules that need only nodes/metrics/edges.
pub fn create_findings(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
CREATE TABLE findings (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    category TEXT NOT NULL,
    severity TEXT NOT NULL,
    node_id TEXT,
    file TEXT,
    line INTEGER,
    message TEXT NOT NULL,
    details TEXT
);

-- High complexity functions
INSERT INTO findings (category, severity, node_id, file, line, message, details)
  SELECT 'complexity', 'warning', n.id, n.file, n.line,
    n.name || ' has cyclomatic complexity ' || m.cyclomatic_complexity,
    json_object('complexity', m.cyclomatic_complexity, 'package', n.package)
  FROM nodes n JOIN metrics m ON n.id = m.function_id
  WHERE m.cyclomatic_complexity >= 15;

-- Very large functions
INSERT INTO findings (category, severity, node_id, file, line, message, details)
  SELECT 'size', 'info', n.id, n.file, n.line,
    n.name || ' is ' || m.loc || ' lines long',
    json_object('loc', m.loc, 'package', n.package)
  FROM nodes n JOIN metrics m ON n.id = m.function_id
  WHERE m.loc >= 100;

-- Deeply nested control structures
INSERT INTO findings (category, severity, node_id, file, line, message, details)
  SELECT 'nesting', 'warning', np.node_id, n.file, n.line,
    n.kind || ' at depth ' || np.value || ' in ' || n.parent_function,
    json_object('depth', CAST(np.value AS INTEGER), 'kind', n.kind)
  FROM node_properties np
  JOIN nodes n ON np.node_id = n.id
  WHERE np.key = 'nesting_depth' AND CAST(np.value AS INTEGER) >= 8
    AND n.kind IN ('if', 'for', 'switch', 'select');

-- Hub functions (high fan-in + fan-out)
INSERT INTO findings (category, severity, node_id, file, line, message, details)
  SELECT 'hub', 'info', n.id, n.file, n.line,
    n.name || ': fan_in=' || m.fan_in || ' fan_out=' || m.fan_out,
    json_object('fan_in', m.fan_in, 'fan_out', m.fan_out, 'package', n.package)
  FROM nodes n JOIN metrics m ON n.id = m.function_id
  WHERE m.fan_in >= 10 AND m.fan_out >= 10;

-- Dead stores: locals with no outgoing DFG edges
INSERT INTO findings (category, severity, node_id, file, line, message, details)
  SELECT 'dead_store', 'warning', n.id, n.file, n.line,
    'unused variable ''' || n.name || ''' in ' || COALESCE(n.parent_function, n.package),
    json_object('variable', n.name, 'package', n.package)
  FROM nodes n
  WHERE n.kind = 'local' AND n.parent_function IS NOT NULL
    AND NOT EXISTS (SELECT 1 FROM edges e WHERE e.source = n.id AND e.kind = 'dfg')
    AND n.name != '_';

-- Unused parameters: no outgoing DFG edges
INSERT INTO findings (category, severity, node_id, file, line, message, details)
  SELECT 'unused_param', 'info', n.id, n.file, n.line,
    'unused parameter ''' || n.name || ''' in ' || COALESCE(n.parent_function, '?'),
    json_object('parameter', n.name, 'function', n.parent_function)
  FROM nodes n
  WHERE n.kind = 'parameter' AND n.parent_function IS NOT NULL
    AND NOT EXISTS (SELECT 1 FROM edges e WHERE e.source = n.id AND e.kind = 'dfg')
    AND n.name != '_';

-- Circular package dependencies
INSERT INTO findings (category, severity, node_id, file, line, message, details)
  SELECT 'circular_dep', 'warning', NULL, NULL, NULL,
    d1.source_package || ' <-> ' || d1.target_package || ' (' || d1.call_count || '/' || d2.call_count || ' calls)',
    json_object('package_a', d1.source_package, 'package_b', d1.target_package,
                'a_to_b_calls', d1.call_count, 'b_to_a_calls', d2.call_count)
  FROM v_package_deps d1
  JOIN v_package_deps d2 ON d1.source_package = d2.target_package AND d1.target_package = d2.source_package
  WHERE d1.source_package < d1.target_package
    AND d1.source_package NOT LIKE 'cmd/%' AND d1.target_package NOT LIKE 'cmd/%'
    AND d1.source_package NOT LIKE '%.%/%';

-- Functions launching multiple goroutines
INSERT INTO findings (category, severity, node_id, file, line, message, details)
  SELECT 'goroutine_spawner', 'info', fn.id, fn.file, fn.line,
    fn.name || ' launches ' || go_count || ' goroutine(s)',
    json_object('goroutine_count', go_count, 'package', fn.package)
  FROM (
    SELECT g.parent_function AS func_id, COUNT(*) AS go_count
    FROM nodes g
    WHERE g.kind = 'go' AND g.parent_function IS NOT NULL
    GROUP BY g.parent_function
    HAVING COUNT(*) >= 2
  ) sub
  JOIN nodes fn ON fn.id = sub.func_id;

CREATE INDEX idx_findings_category ON findings(category);
CREATE INDEX idx_findings_node ON findings(node_id);
",
    )?;
    Ok(())
}

/// Rules over exports, signatures, interface coupling, and concurrency.
pub fn additional_findings(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
-- Unused exports: no callers from other packages
INSERT INTO findings (category, severity, node_id, file, line, message, details)
SELECT 'unused_export', 'info', n.id, n.file, n.line,
  'exported ' || n.name || ' has no callers from other packages',
  json_object('name', n.name, 'package', n.package)
FROM nodes n
WHERE n.kind = 'function' AND n.name GLOB '[A-Z]*'
  AND n.package IS NOT NULL AND n.package NOT LIKE 'cmd/%'
  AND NOT EXISTS (
    SELECT 1 FROM edges e
    JOIN nodes caller ON e.source = caller.id AND caller.package != n.package
    WHERE e.target = n.id AND e.kind = 'call'
  );

-- Long parameter lists
INSERT INTO findings (category, severity, node_id, file, line, message, details)
SELECT 'long_param_list', 'info', n.id, n.file, n.line,
  n.name || ' has ' || m.num_params || ' parameters',
  json_object('num_params', m.num_params, 'package', n.package)
FROM nodes n
JOIN metrics m ON m.function_id = n.id
WHERE m.num_params > 5;

-- God functions: high complexity + large LOC + high fan_out
INSERT INTO findings (category, severity, node_id, file, line, message, details)
SELECT 'god_function', 'warning', n.id, n.file, n.line,
  n.name || ' (complexity=' || m.cyclomatic_complexity || ', loc=' || m.loc || ', fan_out=' || m.fan_out || ')',
  json_object('complexity', m.cyclomatic_complexity, 'loc', m.loc,
              'fan_in', m.fan_in, 'fan_out', m.fan_out, 'package', n.package)
FROM nodes n
JOIN metrics m ON m.function_id = n.id
WHERE m.cyclomatic_complexity >= 10 AND m.loc >= 50 AND m.fan_out >= 10;

-- Interface coupling: types implementing many interfaces
INSERT INTO findings (category, severity, node_id, file, line, message, details)
SELECT 'interface_coupling', 'info', n.id, n.file, n.line,
  n.name || ' implements ' || iface_count || ' interfaces',
  json_object('interface_count', iface_count, 'package', n.package)
FROM (
  SELECT e.source AS type_id, COUNT(*) AS iface_count
  FROM edges e WHERE e.kind = 'implements'
  GROUP BY e.source HAVING COUNT(*) >= 3
) impl
JOIN nodes n ON n.id = impl.type_id;

-- Concurrency risk: mutex locks and goroutine launches in one function
INSERT INTO findings (category, severity, node_id, file, line, message, details)
SELECT 'concurrency_risk', 'warning', fn.id, fn.file, fn.line,
  fn.name || ' uses mutex locks and spawns goroutines',
  json_object('package', fn.package)
FROM nodes fn
WHERE fn.kind = 'function'
  AND EXISTS (
    SELECT 1 FROM nodes g WHERE g.kind = 'go' AND g.parent_function = fn.id
  )
  AND EXISTS (
    SELECT 1 FROM node_properties np
    JOIN nodes n ON n.id = np.node_id AND n.parent_function = fn.id
    WHERE np.key = 'sync_kind' AND np.value LIKE '%mutex_%'
  );

-- Direct recursion
INSERT INTO findings (category, severity, node_id, file, line, message, details)
SELECT 'recursive', 'info', n.id, n.file, n.line,
  n.name || ' calls itself directly',
  json_object('package', n.package)
FROM nodes n
JOIN edges e ON e.source = n.id AND e.target = n.id AND e.kind = 'call'
WHERE n.kind = 'function';
",
    )?;
    Ok(())
}

/// Risk scores, dead code, interface bloat, and structural clones.
pub fn advanced_findings(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
-- Composite risk score: 3*norm(cc) + 2*norm(loc) + norm(fan_in) + norm(fan_out)
INSERT INTO findings (category, severity, node_id, file, line, message, details)
  WITH maxes AS (
    SELECT
      MAX(cyclomatic_complexity) AS max_cc,
      MAX(loc) AS max_loc,
      MAX(fan_in) AS max_fi,
      MAX(fan_out) AS max_fo
    FROM metrics
    WHERE cyclomatic_complexity > 0
  )
  SELECT 'risk_score', 'info', n.id, n.file, n.line,
    n.name || ' risk=' || CAST(ROUND(
      3.0 * CAST(m.cyclomatic_complexity AS REAL) / MAX(maxes.max_cc, 1) +
      2.0 * CAST(m.loc AS REAL) / MAX(maxes.max_loc, 1) +
      1.0 * CAST(m.fan_in AS REAL) / MAX(maxes.max_fi, 1) +
      1.0 * CAST(m.fan_out AS REAL) / MAX(maxes.max_fo, 1)
    , 2) AS TEXT),
    json_object(
      'risk_score', ROUND(
        3.0 * CAST(m.cyclomatic_complexity AS REAL) / MAX(maxes.max_cc, 1) +
        2.0 * CAST(m.loc AS REAL) / MAX(maxes.max_loc, 1) +
        1.0 * CAST(m.fan_in AS REAL) / MAX(maxes.max_fi, 1) +
        1.0 * CAST(m.fan_out AS REAL) / MAX(maxes.max_fo, 1)
      , 2),
      'complexity', m.cyclomatic_complexity,
      'loc', m.loc,
      'fan_in', m.fan_in,
      'fan_out', m.fan_out,
      'package', n.package
    )
  FROM metrics m
  JOIN nodes n ON n.id = m.function_id
  CROSS JOIN maxes
  WHERE m.cyclomatic_complexity >= 5 OR m.loc >= 30
  ORDER BY (
    3.0 * CAST(m.cyclomatic_complexity AS REAL) / MAX(maxes.max_cc, 1) +
    2.0 * CAST(m.loc AS REAL) / MAX(maxes.max_loc, 1) +
    1.0 * CAST(m.fan_in AS REAL) / MAX(maxes.max_fi, 1) +
    1.0 * CAST(m.fan_out AS REAL) / MAX(maxes.max_fo, 1)
  ) DESC
  LIMIT 200;

-- Dead code: unexported functions with zero callers, no entry points
INSERT INTO findings (category, severity, node_id, file, line, message, details)
  SELECT 'dead_code', 'warning', n.id, n.file, n.line,
    'unreachable function ' || n.name || ' (zero callers)',
    json_object('name', n.name, 'package', n.package)
  FROM nodes n
  LEFT JOIN metrics m ON m.function_id = n.id
  WHERE n.kind = 'function'
    AND COALESCE(m.fan_in, 0) = 0
    AND n.name NOT GLOB '[A-Z]*'
    AND n.name NOT IN ('main', 'init')
    AND n.name NOT LIKE '%Test%'
    AND n.name NOT LIKE '%Benchmark%'
    AND n.package IS NOT NULL
    AND n.package NOT LIKE 'cmd/%'
    AND n.id NOT LIKE 'ext::%';

-- Interface bloat: many-method interfaces
INSERT INTO findings (category, severity, node_id, file, line, message, details)
  SELECT 'interface_bloat', 'info', n.id, n.file, n.line,
    n.name || ' has ' || method_count || ' methods (consider splitting)',
    json_object('method_count', method_count, 'package', n.package)
  FROM (
    SELECT e.source AS type_id, COUNT(*) AS method_count
    FROM edges e
    JOIN nodes child ON child.id = e.target AND child.kind = 'field'
    JOIN nodes parent ON parent.id = e.source AND parent.kind = 'type_decl'
    JOIN node_properties tk ON tk.node_id = parent.id AND tk.key = 'type_kind' AND tk.value = 'interface'
    WHERE e.kind = 'ast'
    GROUP BY e.source
    HAVING COUNT(*) >= 5
  ) sub
  JOIN nodes n ON n.id = sub.type_id;

-- Structural clones: same complexity + param count + similar LOC
INSERT INTO findings (category, severity, node_id, file, line, message, details)
  SELECT 'similar_function', 'info', m1.function_id, n1.file, n1.line,
    n1.name || ' is structurally similar to ' || n2.name,
    json_object('twin_id', m2.function_id, 'twin_name', n2.name,
                'complexity', m1.cyclomatic_complexity,
                'loc_a', m1.loc, 'loc_b', m2.loc,
                'package_a', n1.package, 'package_b', n2.package)
  FROM metrics m1
  JOIN metrics m2 ON m1.function_id < m2.function_id
    AND m1.cyclomatic_complexity = m2.cyclomatic_complexity
    AND m1.num_params = m2.num_params
    AND ABS(m1.loc - m2.loc) <= 3
  JOIN nodes n1 ON n1.id = m1.function_id
  JOIN nodes n2 ON n2.id = m2.function_id
  WHERE m1.cyclomatic_complexity >= 5 AND m1.loc >= 15
    AND n1.package != n2.package;
",
    )?;
    Ok(())
}

/// Go-idiom pattern rules: context placement, large returns, boolean
/// blindness, direct panic calls.
pub fn pattern_findings(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
-- Context not first among 2+ params
INSERT INTO findings (category, severity, node_id, file, line, message, details)
  SELECT 'missing_context_first', 'info', n.id, n.file, n.line,
    n.name || ' has ' || m.num_params || ' params but context.Context is not first',
    json_object('num_params', m.num_params, 'package', n.package)
  FROM nodes n
  JOIN metrics m ON m.function_id = n.id
  JOIN node_properties np ON np.node_id = n.id AND np.key = 'has_context' AND np.value = '1'
  WHERE n.kind = 'function' AND m.num_params >= 2
    AND NOT EXISTS (
      SELECT 1 FROM edges e
      JOIN nodes p ON p.id = e.target AND p.kind = 'parameter'
      WHERE e.source = n.id AND e.kind = 'ast'
        AND p.type_info LIKE '%context.Context%'
        AND json_extract(p.properties, '$.index') = 0
    );

-- Large return tuples: 4+ results
INSERT INTO findings (category, severity, node_id, file, line, message, details)
  SELECT 'large_return', 'info', n.id, n.file, n.line,
    n.name || ' returns ' || result_count || ' values',
    json_object('result_count', result_count, 'package', n.package)
  FROM (
    SELECT e.source AS func_id, COUNT(*) AS result_count
    FROM edges e
    JOIN nodes r ON r.id = e.target AND r.kind = 'result'
    WHERE e.kind = 'ast'
    GROUP BY e.source
    HAVING COUNT(*) >= 4
  ) sub
  JOIN nodes n ON n.id = sub.func_id
  WHERE n.kind = 'function';

-- Boolean blindness: 2+ bool parameters
INSERT INTO findings (category, severity, node_id, file, line, message, details)
  SELECT 'bool_params', 'info', n.id, n.file, n.line,
    n.name || ' has ' || bool_count || ' bool parameters (consider options struct)',
    json_object('bool_count', bool_count, 'package', n.package)
  FROM (
    SELECT e.source AS func_id, COUNT(*) AS bool_count
    FROM edges e
    JOIN nodes p ON p.id = e.target AND p.kind = 'parameter'
    WHERE e.kind = 'ast' AND p.type_info = 'bool'
    GROUP BY e.source
    HAVING COUNT(*) >= 2
  ) sub
  JOIN nodes n ON n.id = sub.func_id
  WHERE n.kind = 'function';

-- Direct panic calls
INSERT INTO findings (category, severity, node_id, file, line, message, details)
  SELECT 'panic_call', 'warning', fn.id, fn.file, fn.line,
    fn.name || ' calls panic() directly',
    json_object('package', fn.package)
  FROM nodes fn
  WHERE fn.kind = 'function'
    AND EXISTS (
      SELECT 1 FROM nodes c
      WHERE c.kind = 'call' AND c.parent_function = fn.id AND c.name = 'panic'
    );
",
    )?;
    Ok(())
}
