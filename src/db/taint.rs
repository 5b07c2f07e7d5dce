//! The security taint model: sources, sinks, barriers, and propagators.
//!
//! `taint_specs` enumerates standard-library functions with a security
//! role. Call nodes targeting them (via call_site edges into `ext::`
//! stubs) are annotated with `taint_role`/`taint_category` properties, and
//! functions containing both a source and a sink surface as taint-hotspot
//! findings.

use rusqlite::Connection;

use crate::error::Result;

pub fn create_taint_model(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
CREATE TABLE taint_specs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    package TEXT NOT NULL,
    func_name TEXT NOT NULL,
    role TEXT NOT NULL,
    category TEXT,
    description TEXT
);

-- Sources: functions introducing external/untrusted data
INSERT INTO taint_specs (package, func_name, role, category, description) VALUES
('net/http', 'FormValue', 'source', 'http_input', 'HTTP form value'),
('net/http', 'PostFormValue', 'source', 'http_input', 'HTTP POST form value'),
('net/http', 'ReadRequest', 'source', 'http_input', 'HTTP request read'),
('os', 'Getenv', 'source', 'env', 'Environment variable'),
('os', 'ReadFile', 'source', 'file_read', 'File read'),
('io', 'ReadAll', 'source', 'io_read', 'Reader content'),
('bufio', 'ReadString', 'source', 'io_read', 'Buffered read'),
('encoding/json', 'Unmarshal', 'source', 'deserialization', 'JSON unmarshal'),
('encoding/xml', 'Unmarshal', 'source', 'deserialization', 'XML unmarshal'),
('gopkg.in/yaml.v2', 'Unmarshal', 'source', 'deserialization', 'YAML unmarshal'),
('gopkg.in/yaml.v3', 'Unmarshal', 'source', 'deserialization', 'YAML unmarshal');

-- Sinks: security-sensitive operations
INSERT INTO taint_specs (package, func_name, role, category, description) VALUES
('os/exec', 'Command', 'sink', 'command_injection', 'OS command construction'),
('os/exec', 'CommandContext', 'sink', 'command_injection', 'OS command with context'),
('os', 'WriteFile', 'sink', 'file_write', 'File write'),
('os', 'Create', 'sink', 'file_write', 'File creation'),
('os', 'OpenFile', 'sink', 'file_write', 'File open'),
('html/template', 'Execute', 'sink', 'template_exec', 'HTML template execution'),
('text/template', 'Execute', 'sink', 'template_exec', 'Text template execution'),
('database/sql', 'Exec', 'sink', 'sql_injection', 'SQL execution'),
('database/sql', 'Query', 'sink', 'sql_injection', 'SQL query'),
('database/sql', 'QueryRow', 'sink', 'sql_injection', 'SQL query single row'),
('net/http', 'Redirect', 'sink', 'open_redirect', 'HTTP redirect'),
('log', 'Printf', 'sink', 'log_injection', 'Log formatted output'),
('log', 'Fatalf', 'sink', 'log_injection', 'Log fatal output');

-- Barriers: sanitizers and validators
INSERT INTO taint_specs (package, func_name, role, category, description) VALUES
('net/url', 'QueryEscape', 'barrier', 'url_escape', 'URL query escaping'),
('net/url', 'PathEscape', 'barrier', 'url_escape', 'URL path escaping'),
('html', 'EscapeString', 'barrier', 'html_escape', 'HTML entity escaping'),
('regexp', 'MatchString', 'barrier', 'validation', 'Regex match validation'),
('strconv', 'Atoi', 'barrier', 'type_conversion', 'String to int'),
('strconv', 'ParseInt', 'barrier', 'type_conversion', 'String to int64'),
('strconv', 'ParseFloat', 'barrier', 'type_conversion', 'String to float'),
('strconv', 'ParseBool', 'barrier', 'type_conversion', 'String to bool'),
('path/filepath', 'Clean', 'barrier', 'path_sanitize', 'Path sanitization'),
('path/filepath', 'Abs', 'barrier', 'path_sanitize', 'Absolute path resolution'),
('path', 'Clean', 'barrier', 'path_sanitize', 'Path sanitization');

-- Propagators: transformations that preserve taint
INSERT INTO taint_specs (package, func_name, role, category, description) VALUES
('fmt', 'Sprintf', 'propagator', 'string_format', 'String formatting'),
('fmt', 'Fprintf', 'propagator', 'string_format', 'Formatted write'),
('strings', 'Join', 'propagator', 'string_concat', 'String concatenation'),
('strings', 'Replace', 'propagator', 'string_transform', 'String replacement'),
('strings', 'ReplaceAll', 'propagator', 'string_transform', 'String replace all'),
('strings', 'TrimSpace', 'propagator', 'string_transform', 'String trimming'),
('strings', 'ToLower', 'propagator', 'string_transform', 'Case conversion'),
('strings', 'ToUpper', 'propagator', 'string_transform', 'Case conversion'),
('strings', 'Split', 'propagator', 'string_transform', 'String splitting'),
('bytes', 'Join', 'propagator', 'bytes_concat', 'Bytes concatenation'),
('encoding/base64', 'EncodeToString', 'propagator', 'encoding', 'Base64 encoding'),
('encoding/base64', 'DecodeString', 'propagator', 'encoding', 'Base64 decoding'),
('encoding/hex', 'EncodeToString', 'propagator', 'encoding', 'Hex encoding');

CREATE INDEX idx_taint_specs_role ON taint_specs(role);
CREATE INDEX idx_taint_specs_pkg ON taint_specs(package, func_name);

-- Annotate call nodes targeting taint-relevant functions
INSERT INTO node_properties (node_id, key, value)
SELECT DISTINCT c.id, 'taint_role', ts.role
FROM nodes c
JOIN edges cse ON cse.source = c.id AND cse.kind = 'call_site'
JOIN nodes callee ON callee.id = cse.target
JOIN taint_specs ts ON callee.package = ts.package AND callee.name = ts.func_name
WHERE c.kind = 'call';

INSERT INTO node_properties (node_id, key, value)
SELECT DISTINCT c.id, 'taint_category', ts.category
FROM nodes c
JOIN edges cse ON cse.source = c.id AND cse.kind = 'call_site'
JOIN nodes callee ON callee.id = cse.target
JOIN taint_specs ts ON callee.package = ts.package AND callee.name = ts.func_name
WHERE c.kind = 'call';

-- Hotspots: functions containing both sources and sinks
INSERT INTO findings (category, severity, node_id, file, line, message, details)
SELECT 'taint_hotspot', 'warning', fn.id, fn.file, fn.line,
  fn.name || ' has taint source (' || GROUP_CONCAT(DISTINCT src_cat.value) || ') and sink (' || GROUP_CONCAT(DISTINCT sink_cat.value) || ')',
  json_object('function', fn.name, 'package', fn.package,
              'source_categories', GROUP_CONCAT(DISTINCT src_cat.value),
              'sink_categories', GROUP_CONCAT(DISTINCT sink_cat.value))
FROM node_properties src_role
JOIN nodes src ON src.id = src_role.node_id
JOIN node_properties src_cat ON src_cat.node_id = src.id AND src_cat.key = 'taint_category'
JOIN nodes fn ON fn.id = src.parent_function
JOIN nodes sink ON sink.parent_function = fn.id
JOIN node_properties sink_role ON sink_role.node_id = sink.id
  AND sink_role.key = 'taint_role' AND sink_role.value = 'sink'
JOIN node_properties sink_cat ON sink_cat.node_id = sink.id AND sink_cat.key = 'taint_category'
WHERE src_role.key = 'taint_role' AND src_role.value = 'source'
  AND src.parent_function IS NOT NULL
GROUP BY fn.id;
",
    )?;
    Ok(())
}
