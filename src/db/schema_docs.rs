//! The self-describing `schema_docs` table: every table, view, node kind,
//! edge kind, and property the database exposes, with usage examples.

use rusqlite::Connection;

use crate::error::Result;

pub fn create(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
CREATE TABLE schema_docs (
    category TEXT NOT NULL,
    name TEXT NOT NULL,
    description TEXT NOT NULL,
    example TEXT
);

-- Node kinds
INSERT INTO schema_docs (category, name, description, example) VALUES
('node_kind', 'package', 'Go package declaration', NULL),
('node_kind', 'file', 'Source file', NULL),
('node_kind', 'function', 'Function or method declaration', 'scrape::*Manager.Run@manager.go:142:1'),
('node_kind', 'parameter', 'Function parameter', NULL),
('node_kind', 'result', 'Function return value', NULL),
('node_kind', 'local', 'Local variable (short decl or var)', NULL),
('node_kind', 'call', 'Function/method call expression', NULL),
('node_kind', 'literal', 'Literal value (string, int, bool)', NULL),
('node_kind', 'identifier', 'Variable/const/type reference', NULL),
('node_kind', 'selector', 'Field or method selection (x.F)', NULL),
('node_kind', 'composite_lit', 'Struct/slice/map literal', NULL),
('node_kind', 'if', 'If statement', NULL),
('node_kind', 'for', 'For/range loop', NULL),
('node_kind', 'switch', 'Switch/type-switch statement', NULL),
('node_kind', 'select', 'Select statement (channel multiplexing)', NULL),
('node_kind', 'case', 'Case/default clause', NULL),
('node_kind', 'return', 'Return statement', NULL),
('node_kind', 'assign', 'Assignment statement', NULL),
('node_kind', 'go', 'Goroutine launch (go statement)', NULL),
('node_kind', 'defer', 'Defer statement', NULL),
('node_kind', 'send', 'Channel send operation', NULL),
('node_kind', 'block', 'Block scope (curly braces)', NULL),
('node_kind', 'branch', 'Break/continue/goto/fallthrough', NULL),
('node_kind', 'label', 'Label for goto/break/continue', NULL),
('node_kind', 'import', 'Import declaration', NULL),
('node_kind', 'comment', 'Comment group', NULL),
('node_kind', 'type_decl', 'Type declaration (struct, interface, alias)', NULL),
('node_kind', 'field', 'Struct field or interface method', NULL),
('node_kind', 'basic_block', 'Flow basic block (CFG endpoints)', NULL),
('node_kind', 'type_param', 'Generic type parameter', NULL),
('node_kind', 'incdec', 'Increment/decrement (x++/x--)', NULL),
('node_kind', 'unary_expr', 'Unary expression', NULL),
('node_kind', 'binary_expr', 'Binary expression', NULL),
('node_kind', 'index_expr', 'Index expression', NULL),
('node_kind', 'slice_expr', 'Slice expression', NULL),
('node_kind', 'type_assert_expr', 'Type assertion', NULL),
('node_kind', 'key_value_expr', 'Keyed element in composite literal', NULL),
('node_kind', 'meta_data', 'Graph metadata node', NULL);

-- Edge kinds
INSERT INTO schema_docs (category, name, description, example) VALUES
('edge_kind', 'ast', 'Parent to child in syntax tree', 'function -> parameter'),
('edge_kind', 'cfg', 'Control flow: basic_block to basic_block', 'Properties: {"label":"true"/"false"} on conditional branches'),
('edge_kind', 'cdg', 'Control dependence: block depends on branch', NULL),
('edge_kind', 'dom', 'Dominator tree edge', NULL),
('edge_kind', 'pdom', 'Post-dominator tree edge', NULL),
('edge_kind', 'dfg', 'Data flow: definition to use (intra-procedural)', 'Properties: {"heuristic":true} for external calls'),
('edge_kind', 'call', 'Caller function to callee function', 'Properties: {"dynamic":true} for interface dispatch'),
('edge_kind', 'call_site', 'Call AST node to callee function', NULL),
('edge_kind', 'param_in', 'Actual argument to formal parameter', 'Properties: {"index": N}'),
('edge_kind', 'param_out', 'Callee function to call site (return flow)', 'Properties: {"num_results": N}'),
('edge_kind', 'call_to_return', 'Caller function to its call site (IFDS bypass)', NULL),
('edge_kind', 'argument', 'Call to argument expression', 'Properties: {"index": N}'),
('edge_kind', 'receiver', 'Method call to receiver expression', NULL),
('edge_kind', 'ref', 'Identifier to its declaration', NULL),
('edge_kind', 'eval_type', 'Expression to its type declaration', NULL),
('edge_kind', 'scope', 'Block to nearest enclosing scope', NULL),
('edge_kind', 'initializer', 'Variable to its initializing expression', NULL),
('edge_kind', 'next_sibling', 'Statement to next statement in a block', NULL),
('edge_kind', 'branch_target', 'Branch statement to target label', NULL),
('edge_kind', 'defer_order', 'Later defer to earlier defer (LIFO)', 'Properties: {"exec_order": N}'),
('edge_kind', 'spawn', 'Goroutine launch to launched function', NULL),
('edge_kind', 'spawn_call', 'Goroutine launch to launched call', NULL),
('edge_kind', 'chan_flow', 'Channel send site to receive site', NULL),
('edge_kind', 'panic_recover', 'Panic site to recover site in same scope', NULL),
('edge_kind', 'implements', 'Concrete type to interface it implements', NULL),
('edge_kind', 'embeds', 'Struct to embedded type', NULL),
('edge_kind', 'alias_of', 'Type alias to aliased type', NULL),
('edge_kind', 'has_method', 'Type declaration to its method functions', NULL),
('edge_kind', 'satisfies_method', 'Concrete method to interface method it satisfies', NULL),
('edge_kind', 'imports', 'Package to imported package', NULL),
('edge_kind', 'init_order', 'Earlier package init to later init', 'Properties: {"order": N}'),
('edge_kind', 'error_wrap', 'Wrapping call to wrapped error argument', NULL),
('edge_kind', 'capture', 'Closure to captured variable cell', 'Properties: {"capture_kind":"by_reference"}'),
('edge_kind', 'condition', 'Control structure to its condition expression', NULL),
('edge_kind', 'doc', 'Declaration to its doc comment', NULL),
('edge_kind', 'eog', 'Evaluation order between call arguments', 'Properties: {"final":true} on the last-arg edge');

-- Node properties
INSERT INTO schema_docs (category, name, description, example) VALUES
('node_property', 'receiver', 'Receiver type for methods', '*Manager'),
('node_property', 'generic', 'Function or type has type parameters', 'true'),
('node_property', 'exported', 'Identifier is exported', 'true'),
('node_property', 'full_name', 'Package-qualified display name', 'scrape.*Manager.Run'),
('node_property', 'external', 'External stub node (not in analyzed code)', 'true'),
('node_property', 'code', 'Source snippet for the node', 'if err != nil {'),
('node_property', 'nesting_depth', 'Depth of control structure nesting', '5'),
('node_property', 'is_generated', 'File is generated', 'true'),
('node_property', 'build_tags', 'Build constraint of the file', 'linux && amd64'),
('node_property', 'returns_error', 'Function returns error', 'true'),
('node_property', 'returns_nilable', 'Function returns a nilable type', 'true'),
('node_property', 'nullable', 'Parameter accepts nil', 'true'),
('node_property', 'mutable', 'Parameter allows callee-visible mutation', 'true'),
('node_property', 'has_context', 'First parameter is context.Context', 'true'),
('node_property', 'context_param', 'Parameter is context.Context', 'true'),
('node_property', 'context_derivation', 'Call derives a new context', 'WithCancel'),
('node_property', 'sync_kind', 'Call targets a sync primitive', 'mutex_lock'),
('node_property', 'selection_kind', 'Selector classification', 'field_val / method_val / method_expr'),
('node_property', 'dispatch_type', 'Call dispatch classification', 'static / dynamic'),
('node_property', 'literal_kind', 'Literal token class', 'STRING'),
('node_property', 'decl', 'Declaration keyword of a package-level binding', 'var / const'),
('node_property', 'tag', 'Struct field tag', 'json:"name,omitempty"'),
('node_property', 'embedded', 'Field is an embedded type', 'true'),
('node_property', 'recursive', 'Function calls itself directly', 'true'),
('node_property', 'inlineable', 'Function can be inlined by the compiler', 'true'),
('node_property', 'heap_escapes', 'Variable escapes to the heap', 'true/false'),
('node_property', 'taint_role', 'Security taint classification', 'source/sink/barrier/propagator'),
('node_property', 'taint_category', 'Taint category detail', 'http_input, sql_injection');

-- Edge properties
INSERT INTO schema_docs (category, name, description, example) VALUES
('edge_property', 'index', 'Argument or parameter ordering', '0'),
('edge_property', 'label', 'CFG branch label', 'entry/exit/true/false'),
('edge_property', 'dynamic', 'Interface dispatch flag on call edges', 'true'),
('edge_property', 'var_name', 'Source-level variable name on dfg/capture edges', 'ch'),
('edge_property', 'capture_kind', 'Closure capture semantics', 'by_reference'),
('edge_property', 'final', 'Last-argument-to-call evaluation edge', 'true'),
('edge_property', 'exec_order', 'Defer LIFO rank (1 = runs first)', '1'),
('edge_property', 'order', 'Package init ordering', '1'),
('edge_property', 'heuristic', 'Edge derived from the flow-semantics model', 'true'),
('edge_property', 'side_effect', 'Heuristic flow into an output argument', 'true'),
('edge_property', 'num_results', 'Result count on param_out edges', '2');

-- Tables
INSERT INTO schema_docs (category, name, description, example) VALUES
('table', 'nodes', 'All graph nodes (AST + flow)', 'SELECT * FROM nodes WHERE kind=''function'' AND package=''scrape'''),
('table', 'edges', 'All graph edges', 'SELECT * FROM edges WHERE kind=''call'' AND source=:func_id'),
('table', 'sources', 'Source file contents', 'SELECT content FROM sources WHERE file=''scrape/manager.go'''),
('table', 'metrics', 'Function-level metrics', 'SELECT * FROM metrics ORDER BY cyclomatic_complexity DESC'),
('table', 'findings', 'Pre-computed analysis findings', 'SELECT * FROM findings WHERE category=''complexity'''),
('table', 'queries', 'Parameterized CTE queries', 'SELECT name, description FROM queries'),
('table', 'flow_semantics', 'Data-flow model for standard-library functions', 'SELECT * FROM flow_semantics WHERE package=''fmt'''),
('table', 'taint_specs', 'Security taint model', 'SELECT * FROM taint_specs WHERE role=''sink'''),
('table', 'node_properties', 'Vertical node property table', 'SELECT * FROM node_properties WHERE key=''receiver'''),
('table', 'edge_properties', 'Vertical edge property table', 'SELECT * FROM edge_properties WHERE key=''dynamic'''),
('table', 'stats_overview', 'Whole-graph summary statistics', 'SELECT * FROM stats_overview'),
('table', 'stats_packages', 'Per-package statistics', 'SELECT * FROM stats_packages ORDER BY functions DESC'),
('table', 'stats_node_kinds', 'Node count per kind', NULL),
('table', 'stats_edge_kinds', 'Edge count per kind', NULL),
('table', 'sources_fts', 'FTS5 full-text search on source code', 'SELECT file FROM sources_fts WHERE content MATCH ''mutex'''),
('table', 'scip_symbols', 'SCIP-compatible symbol identifiers', 'SELECT * FROM scip_symbols WHERE kind = ''method'''),
('table', 'symbol_index', 'Named declarations for symbol search', 'SELECT * FROM symbol_index WHERE name LIKE ''Manager%'''),
('table', 'file_outline', 'Per-file declaration outline', 'SELECT * FROM file_outline WHERE file = :file ORDER BY line'),
('table', 'xrefs', 'Definition-to-usage cross references', 'SELECT * FROM xrefs WHERE def_name = ''Manager'''),
('table', 'go_pattern_summary', 'Go construct counts per package', 'SELECT * FROM go_pattern_summary'),
('table', 'dashboard_complexity_distribution', 'Complexity histogram buckets', NULL),
('table', 'dashboard_package_treemap', 'Per-package LOC and complexity', NULL),
('table', 'dashboard_findings_summary', 'Finding category counts', NULL),
('table', 'dashboard_edge_distribution', 'Edge kind distribution', NULL),
('table', 'dashboard_node_distribution', 'Node kind distribution', NULL),
('table', 'dashboard_complexity_vs_loc', 'Complexity vs LOC scatter data', NULL),
('table', 'dashboard_overview', 'Key-value overview stats', NULL),
('table', 'dashboard_top_functions', 'Top-50 leaderboards per metric', 'SELECT * FROM dashboard_top_functions WHERE metric = ''complexity'''),
('table', 'dashboard_hotspots', 'Functions ranked by hotspot score', 'SELECT * FROM dashboard_hotspots LIMIT 20'),
('table', 'dashboard_file_heatmap', 'Per-file heatmap data', NULL),
('table', 'dashboard_package_graph', 'Internal package dependency graph', NULL),
('table', 'dashboard_function_detail', 'Pre-aggregated function profiles', NULL),
('table', 'package_coupling', 'Cross-package call coupling matrix', NULL),
('table', 'error_chains', 'Error wrapping/propagation summary', NULL),
('table', 'type_impl_map', 'Interface to implementation mapping', NULL),
('table', 'type_hierarchy', 'Type embedding hierarchy', NULL),
('table', 'type_method_set', 'Methods per type', NULL),
('table', 'comm_protocols', 'Session-typed protocol catalogue; client/server types should be duals', 'SELECT id, session_type_client FROM comm_protocols'),
('table', 'comm_participants', 'Components and their protocol roles', NULL),
('table', 'comm_endpoints', 'Detected protocol endpoints in the code', 'SELECT * FROM comm_endpoints ORDER BY protocol_id'),
('table', 'comm_causality', 'II/IO/OO causality edges; cycles indicate deadlock candidates', NULL),
('table', 'comm_conformance', 'Per-component protocol conformance', 'SELECT * FROM comm_conformance WHERE status != ''conforming'''),
('table', 'comm_subtype_check', 'Subtype conformance of each participant''s projection', NULL),
('table', 'comm_dependency_cycles', 'Detected causality cycles with severity', NULL),
('table', 'comm_association', 'Association verdict: safe, deadlock-free, live when it holds', 'SELECT protocol_id, is_associated FROM comm_association'),
('table', 'schema_docs', 'This table', NULL);

-- Views
INSERT INTO schema_docs (category, name, description, example) VALUES
('view', 'v_call_graph', 'Flattened call graph with names', 'SELECT * FROM v_call_graph WHERE caller_package=''scrape'''),
('view', 'v_data_flow', 'DFG edges with file/line context', NULL),
('view', 'v_function_summary', 'Per-function metrics and call counts', 'SELECT * FROM v_function_summary ORDER BY complexity DESC'),
('view', 'v_type_hierarchy', 'Implements/embeds/alias relationships', NULL),
('view', 'v_package_deps', 'Aggregated cross-package call edges', NULL),
('view', 'v_file_deps', 'File-level dependency graph', NULL),
('view', 'v_function_io', 'Parameters and results per function', NULL),
('view', 'v_api_surface', 'Exported functions and types per package', NULL),
('view', 'v_method_sets', 'Methods grouped by receiver type', NULL),
('view', 'v_error_handling', 'Error-returning functions with metrics', NULL),
('view', 'v_package_stability', 'Coupling, instability, abstractness per package', NULL),
('view', 'v_control_flow_profile', 'Control structure counts per function', NULL),
('view', 'v_package_cohesion', 'Internal vs external call ratio per package', NULL),
('view', 'v_concurrency_profile', 'Goroutines, channels, sync per package', NULL),
('view', 'v_package_impact', 'Transitive package impact', NULL),
('view', 'v_protocol_coverage', 'Protocol implementation coverage', NULL),
('view', 'v_comm_endpoint_detail', 'Detected endpoints with locations', NULL),
('view', 'v_session_duality', 'Client/server session type duality check', NULL),
('view', 'v_causality_summary', 'Causality edges with endpoint names', NULL),
('view', 'v_association_summary', 'Association verdict per protocol', NULL),
('view', 'v_subtype_detail', 'Subtype conformance detail per component', NULL),
('view', 'v_dependency_cycles', 'Causality cycles with severity', NULL);

CREATE INDEX idx_schema_docs_cat ON schema_docs(category);
"#,
    )?;
    Ok(())
}
