//! Session-type verification of inter-service communication patterns.
//!
//! A fixed catalogue of protocols (client/server session types in
//! send/receive notation, transport, encoding, pattern, duality flag) is
//! combined with endpoint-detection rules that match function names and
//! packages in the graph. From the detected endpoints the pass computes
//! role conformance, II/IO/OO causality edges with 2- and 3-cycle
//! detection, subtype conformance (branching contravariance for servers,
//! selection covariance for clients), and the association relation:
//! a protocol is associated iff every participant is subtype-conforming
//! and no deadlock-risk cycle involves it — and only then is it labelled
//! safe, deadlock-free, and live.
//!
//! The catalogue is configuration: it models the metrics-monitoring
//! ecosystem this pipeline grew up around and is replaced wholesale for a
//! different domain.

use rusqlite::Connection;

use crate::error::Result;
use crate::progress::Progress;

/// One protocol in the catalogue.
struct Protocol {
    id: &'static str,
    name: &'static str,
    description: &'static str,
    client_type: &'static str,
    server_type: &'static str,
    transport: &'static str,
    encoding: &'static str,
    pattern: &'static str,
    is_dual: bool,
}

/// A participant role in a protocol.
struct Participant {
    protocol: &'static str,
    component: &'static str,
    role: &'static str,
    description: &'static str,
}

/// An endpoint-detection rule: nodes in `package` whose name matches one
/// of the LIKE patterns implement `role` of `protocol`.
struct EndpointRule {
    protocol: &'static str,
    component: &'static str,
    role: &'static str,
    endpoint_type: &'static str,
    package: &'static str,
    name_patterns: &'static [&'static str],
    url_path: Option<&'static str>,
    confidence: f64,
}

/// Components whose implementations live outside the analyzed module set;
/// their conformance is assumed rather than detected.
const EXTERNAL_COMPONENTS: &[&str] = &[
    "target",
    "remote_storage",
    "alert_router",
    "provider",
    "aggregator",
    "external_service",
    "external_client",
];

fn protocols() -> Vec<Protocol> {
    vec![
        Protocol {
            id: "scrape",
            name: "Target Scrape",
            description: "The collector HTTP-pulls metrics from monitored targets at configured intervals",
            client_type: "!HTTP_GET{/metrics}; ?text{exposition_format}; end",
            server_type: "?HTTP_GET{/metrics}; !text{exposition_format}; end",
            transport: "http",
            encoding: "text/plain",
            pattern: "request_response",
            is_dual: true,
        },
        Protocol {
            id: "remote_write",
            name: "Remote Write",
            description: "The collector forwards samples to remote storage via compressed protobuf POST",
            client_type: "!HTTP_POST{protobuf(WriteRequest)}; ?HTTP{status_code}; end",
            server_type: "?HTTP_POST{protobuf(WriteRequest)}; !HTTP{status_code}; end",
            transport: "http",
            encoding: "protobuf+snappy",
            pattern: "request_response",
            is_dual: true,
        },
        Protocol {
            id: "remote_read",
            name: "Remote Read",
            description: "The collector queries remote storage for historical samples",
            client_type: "!HTTP_POST{protobuf(ReadRequest)}; ?HTTP{protobuf(ReadResponse)}; end",
            server_type: "?HTTP_POST{protobuf(ReadRequest)}; !HTTP{protobuf(ReadResponse)}; end",
            transport: "http",
            encoding: "protobuf+snappy",
            pattern: "request_response",
            is_dual: true,
        },
        Protocol {
            id: "alert_notify",
            name: "Alert Notification",
            description: "The collector pushes firing/resolved alerts to the alert router as JSON",
            client_type: "!HTTP_POST{json(Alert[])}; ?HTTP{status_code}; end",
            server_type: "?HTTP_POST{json(Alert[])}; !HTTP{status_code}; end",
            transport: "http",
            encoding: "json",
            pattern: "request_response",
            is_dual: true,
        },
        Protocol {
            id: "discovery",
            name: "Service Discovery",
            description: "The collector polls discovery providers for target groups",
            client_type: "!API{provider_specific_query}; ?JSON{TargetGroup[]}; end",
            server_type: "?API{provider_specific_query}; !JSON{TargetGroup[]}; end",
            transport: "http",
            encoding: "json",
            pattern: "request_response",
            is_dual: true,
        },
        Protocol {
            id: "federation",
            name: "Federation",
            description: "An aggregating collector scrapes another collector's federate endpoint",
            client_type: "!HTTP_GET{/federate, match[]}; ?text{exposition_format}; end",
            server_type: "?HTTP_GET{/federate, match[]}; !text{exposition_format}; end",
            transport: "http",
            encoding: "text/plain",
            pattern: "request_response",
            is_dual: true,
        },
        Protocol {
            id: "otlp_ingest",
            name: "OTLP Metrics Ingestion",
            description: "External services push metrics to the collector's OTLP receiver",
            client_type: "!HTTP_POST{protobuf(ExportMetricsServiceRequest)}; ?HTTP{ExportMetricsServiceResponse}; end",
            server_type: "?HTTP_POST{protobuf(ExportMetricsServiceRequest)}; !HTTP{ExportMetricsServiceResponse}; end",
            transport: "http",
            encoding: "protobuf",
            pattern: "request_response",
            is_dual: true,
        },
        Protocol {
            id: "query_api",
            name: "Query API",
            description: "External clients evaluate queries over the collector's HTTP API",
            client_type: "!HTTP{GET|POST, /api/v1/query|query_range, query}; ?JSON{status, data}; end",
            server_type: "?HTTP{GET|POST, /api/v1/query|query_range, query}; !JSON{status, data}; end",
            transport: "http",
            encoding: "json",
            pattern: "request_response",
            is_dual: true,
        },
    ]
}

fn participants() -> Vec<Participant> {
    vec![
        Participant { protocol: "scrape", component: "collector", role: "client", description: "Scrape manager pulls metrics from targets" },
        Participant { protocol: "scrape", component: "target", role: "server", description: "Monitored service exposes a metrics endpoint" },
        Participant { protocol: "remote_write", component: "collector", role: "client", description: "Queue manager batches and sends samples" },
        Participant { protocol: "remote_write", component: "remote_storage", role: "server", description: "Remote write receiver stores samples" },
        Participant { protocol: "remote_read", component: "collector", role: "client", description: "Querier fans out read requests" },
        Participant { protocol: "remote_read", component: "remote_storage", role: "server", description: "Remote read provider returns stored samples" },
        Participant { protocol: "alert_notify", component: "collector", role: "client", description: "Notifier sends alert batches" },
        Participant { protocol: "alert_notify", component: "alert_router", role: "server", description: "Alert router receives and groups alerts" },
        Participant { protocol: "discovery", component: "collector", role: "client", description: "Discovery manager polls providers" },
        Participant { protocol: "discovery", component: "provider", role: "server", description: "Infrastructure API returns target lists" },
        Participant { protocol: "federation", component: "aggregator", role: "client", description: "Global collector scrapes shard federate endpoints" },
        Participant { protocol: "federation", component: "collector", role: "server", description: "Shard collector serves federated metrics" },
        Participant { protocol: "otlp_ingest", component: "external_service", role: "client", description: "OTLP-instrumented service pushes metrics" },
        Participant { protocol: "otlp_ingest", component: "collector", role: "server", description: "OTLP write handler converts and stores metrics" },
        Participant { protocol: "query_api", component: "external_client", role: "client", description: "Dashboards and scripts issue queries" },
        Participant { protocol: "query_api", component: "collector", role: "server", description: "Web API evaluates queries and returns JSON" },
    ]
}

fn endpoint_rules() -> Vec<EndpointRule> {
    vec![
        EndpointRule {
            protocol: "scrape",
            component: "collector",
            role: "client",
            endpoint_type: "http_client",
            package: "scrape",
            name_patterns: &["%scrapeLoop.run%", "%scrapeLoop.scrapeAndReport%"],
            url_path: None,
            confidence: 1.0,
        },
        EndpointRule {
            protocol: "remote_write",
            component: "collector",
            role: "client",
            endpoint_type: "http_client",
            package: "storage/remote",
            name_patterns: &["%QueueManager.sendBatch%", "%QueueManager.Start%", "%Client.Store%"],
            url_path: None,
            confidence: 1.0,
        },
        EndpointRule {
            protocol: "remote_write",
            component: "collector",
            role: "server",
            endpoint_type: "http_handler",
            package: "storage/remote",
            name_patterns: &["%writeHandler%"],
            url_path: Some("/api/v1/write"),
            confidence: 1.0,
        },
        EndpointRule {
            protocol: "remote_read",
            component: "collector",
            role: "client",
            endpoint_type: "http_client",
            package: "storage/remote",
            name_patterns: &["%Client.Read%"],
            url_path: None,
            confidence: 1.0,
        },
        EndpointRule {
            protocol: "remote_read",
            component: "collector",
            role: "server",
            endpoint_type: "http_handler",
            package: "storage/remote",
            name_patterns: &["%readHandler%"],
            url_path: Some("/api/v1/read"),
            confidence: 1.0,
        },
        EndpointRule {
            protocol: "alert_notify",
            component: "collector",
            role: "client",
            endpoint_type: "http_client",
            package: "notifier",
            name_patterns: &["%sendAll%", "%sendOne%", "%Manager.Send%"],
            url_path: None,
            confidence: 1.0,
        },
        EndpointRule {
            protocol: "discovery",
            component: "collector",
            role: "client",
            endpoint_type: "http_client",
            package: "discovery",
            name_patterns: &["%Discovery.refresh%", "%Discovery.Run%", "%Manager.Run%"],
            url_path: None,
            confidence: 0.9,
        },
        EndpointRule {
            protocol: "federation",
            component: "collector",
            role: "server",
            endpoint_type: "http_handler",
            package: "web",
            name_patterns: &["%Handler.federation%"],
            url_path: Some("/federate"),
            confidence: 1.0,
        },
        EndpointRule {
            protocol: "otlp_ingest",
            component: "collector",
            role: "server",
            endpoint_type: "http_handler",
            package: "storage/remote",
            name_patterns: &["%otlpWriteHandler%"],
            url_path: Some("/api/v1/otlp/v1/metrics"),
            confidence: 1.0,
        },
        EndpointRule {
            protocol: "query_api",
            component: "collector",
            role: "server",
            endpoint_type: "http_handler",
            package: "web/api/v1",
            name_patterns: &["%API.query%", "%API.series%", "%API.labelValues%", "%API.labelNames%"],
            url_path: Some("/api/v1/*"),
            confidence: 1.0,
        },
    ]
}

pub fn create_communication_patterns(conn: &Connection, prog: &Progress) -> Result<()> {
    conn.execute_batch(
        "
CREATE TABLE comm_protocols (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    description TEXT,
    session_type_client TEXT,
    session_type_server TEXT,
    transport TEXT,
    encoding TEXT,
    pattern TEXT,
    is_dual BOOLEAN DEFAULT 1
);

CREATE TABLE comm_participants (
    protocol_id TEXT NOT NULL REFERENCES comm_protocols(id),
    component TEXT NOT NULL,
    role TEXT NOT NULL CHECK (role IN ('client', 'server', 'contract')),
    description TEXT,
    PRIMARY KEY (protocol_id, component, role)
);

CREATE TABLE comm_endpoints (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    protocol_id TEXT REFERENCES comm_protocols(id),
    component TEXT NOT NULL,
    role TEXT NOT NULL,
    endpoint_type TEXT NOT NULL,
    function_id TEXT,
    function_name TEXT,
    package TEXT,
    file TEXT,
    line INTEGER,
    url_path TEXT,
    confidence REAL DEFAULT 1.0
);

CREATE TABLE comm_causality (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    source_endpoint INTEGER REFERENCES comm_endpoints(id),
    target_endpoint INTEGER REFERENCES comm_endpoints(id),
    kind TEXT NOT NULL CHECK (kind IN ('II', 'IO', 'OO')),
    protocol_id TEXT,
    description TEXT
);

CREATE TABLE comm_conformance (
    protocol_id TEXT NOT NULL,
    component TEXT NOT NULL,
    status TEXT NOT NULL CHECK (status IN ('conforming', 'partial', 'missing', 'violation')),
    endpoints_found INTEGER DEFAULT 0,
    endpoints_expected INTEGER DEFAULT 1,
    details TEXT,
    PRIMARY KEY (protocol_id, component)
);
",
    )?;

    {
        let mut stmt = conn.prepare(
            "INSERT INTO comm_protocols VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        )?;
        for p in protocols() {
            stmt.execute(rusqlite::params![
                p.id,
                p.name,
                p.description,
                p.client_type,
                p.server_type,
                p.transport,
                p.encoding,
                p.pattern,
                p.is_dual,
            ])?;
        }
    }

    {
        let mut stmt =
            conn.prepare("INSERT INTO comm_participants VALUES (?1, ?2, ?3, ?4)")?;
        for p in participants() {
            stmt.execute(rusqlite::params![p.protocol, p.component, p.role, p.description])?;
        }
    }

    // Endpoint detection: match catalogue rules against function nodes.
    {
        let mut stmt = conn.prepare(
            "INSERT INTO comm_endpoints
               (protocol_id, component, role, endpoint_type, function_id, function_name,
                package, file, line, url_path, confidence)
             SELECT ?1, ?2, ?3, ?4, n.id, n.name, n.package, n.file, n.line, ?5, ?6
             FROM nodes n
             WHERE n.kind = 'function' AND n.package = ?7 AND n.name LIKE ?8",
        )?;
        for rule in endpoint_rules() {
            for pattern in rule.name_patterns {
                stmt.execute(rusqlite::params![
                    rule.protocol,
                    rule.component,
                    rule.role,
                    rule.endpoint_type,
                    rule.url_path,
                    rule.confidence,
                    rule.package,
                    pattern,
                ])?;
            }
        }
    }

    // Conformance: a component conforms when at least one endpoint was
    // detected; external components are marked missing with an
    // explanatory detail (their subtype check later assumes conformance).
    let external_list = external_sql_list();
    conn.execute_batch(&format!(
        "
INSERT INTO comm_conformance (protocol_id, component, status, endpoints_found, endpoints_expected, details)
SELECT
    p.protocol_id,
    p.component,
    CASE WHEN COALESCE(e.cnt, 0) >= 1 THEN 'conforming' ELSE 'missing' END,
    COALESCE(e.cnt, 0),
    1,
    CASE
        WHEN COALESCE(e.cnt, 0) >= 1 THEN 'Endpoints detected in graph'
        WHEN p.component IN ({external_list}) THEN 'External component, not in analyzed codebase'
        ELSE 'No implementing endpoints found'
    END
FROM comm_participants p
LEFT JOIN (
    SELECT protocol_id, component, COUNT(*) as cnt
    FROM comm_endpoints
    GROUP BY protocol_id, component
) e ON e.protocol_id = p.protocol_id AND e.component = p.component;
"
    ))?;

    // Causality edges between detected endpoints.
    conn.execute_batch(
        "
-- IO: discovery results feed the scrape loop's requests
INSERT INTO comm_causality (source_endpoint, target_endpoint, kind, protocol_id, description)
SELECT e1.id, e2.id, 'IO', 'discovery',
       'Discovered target groups (input) drive subsequent scrape requests (output)'
FROM comm_endpoints e1, comm_endpoints e2
WHERE e1.protocol_id = 'discovery' AND e1.role = 'client'
  AND e2.protocol_id = 'scrape' AND e2.role = 'client'
LIMIT 3;

-- OO: alert batches to the same router preserve FIFO ordering
INSERT INTO comm_causality (source_endpoint, target_endpoint, kind, protocol_id, description)
SELECT e1.id, e2.id, 'OO', 'alert_notify',
       'Alert batches sent to the same router preserve FIFO ordering'
FROM comm_endpoints e1, comm_endpoints e2
WHERE e1.protocol_id = 'alert_notify' AND e1.function_name LIKE '%sendAll%'
  AND e2.protocol_id = 'alert_notify' AND e2.function_name LIKE '%sendOne%'
LIMIT 1;

-- II: scraped samples must be ingested before remote write ships them
INSERT INTO comm_causality (source_endpoint, target_endpoint, kind, protocol_id, description)
SELECT e1.id, e2.id, 'II', 'remote_write',
       'Scrape ingestion precedes remote-write shipping of the same samples'
FROM comm_endpoints e1, comm_endpoints e2
WHERE e1.protocol_id = 'scrape' AND e1.role = 'client'
  AND e2.protocol_id = 'remote_write' AND e2.role = 'client'
LIMIT 3;

CREATE INDEX idx_comm_ep_protocol ON comm_endpoints(protocol_id);
CREATE INDEX idx_comm_ep_component ON comm_endpoints(component);
CREATE INDEX idx_comm_causality_kind ON comm_causality(kind);

-- Protocol coverage dashboard
CREATE VIEW v_protocol_coverage AS
SELECT
    p.id AS protocol_id,
    p.name,
    p.transport,
    GROUP_CONCAT(DISTINCT cp.component || '(' || cp.role || ')') AS participants,
    SUM(CASE WHEN c.status = 'conforming' THEN 1 ELSE 0 END) AS conforming_count,
    SUM(CASE WHEN c.status = 'missing' THEN 1 ELSE 0 END) AS missing_count,
    COUNT(DISTINCT e.id) AS total_endpoints
FROM comm_protocols p
JOIN comm_participants cp ON cp.protocol_id = p.id
LEFT JOIN comm_conformance c ON c.protocol_id = p.id AND c.component = cp.component
LEFT JOIN comm_endpoints e ON e.protocol_id = p.id
GROUP BY p.id;

-- Endpoint detail
CREATE VIEW v_comm_endpoint_detail AS
SELECT
    e.id, e.protocol_id, p.name AS protocol_name,
    e.component, e.role, e.endpoint_type,
    e.function_name, e.package, e.file, e.line, e.url_path, e.confidence
FROM comm_endpoints e
JOIN comm_protocols p ON p.id = e.protocol_id
ORDER BY e.protocol_id, e.component, e.role;

-- Duality check per protocol
CREATE VIEW v_session_duality AS
SELECT
    p.id AS protocol_id,
    p.name,
    p.session_type_client,
    p.session_type_server,
    p.is_dual,
    CASE
        WHEN p.is_dual = 1 THEN 'VERIFIED: client and server types are proper duals'
        ELSE 'WARNING: session types may not be dual'
    END AS duality_status
FROM comm_protocols p;

-- Causality summary
CREATE VIEW v_causality_summary AS
SELECT
    c.kind, c.protocol_id, c.description,
    es.function_name AS source_function,
    et.function_name AS target_function
FROM comm_causality c
LEFT JOIN comm_endpoints es ON es.id = c.source_endpoint
LEFT JOIN comm_endpoints et ON et.id = c.target_endpoint;
",
    )?;

    let endpoints: i64 = conn.query_row("SELECT COUNT(*) FROM comm_endpoints", [], |r| r.get(0))?;
    let causality: i64 = conn.query_row("SELECT COUNT(*) FROM comm_causality", [], |r| r.get(0))?;
    prog.log(format!(
        "Communication patterns: {} protocols, {endpoints} endpoints, {causality} causality edges",
        protocols().len()
    ));
    Ok(())
}

/// Subtype conformance, causality-cycle detection, and the association
/// relation.
pub fn create_session_type_corrections(conn: &Connection, prog: &Progress) -> Result<()> {
    let external_list = external_sql_list();

    conn.execute_batch(&format!(
        "
-- Subtype conformance per (protocol, component).
-- Servers with multiple endpoints handle more branches than required
-- (branching contravariance); clients with multiple endpoints select
-- among fewer messages than allowed (selection covariance).
CREATE TABLE comm_subtype_check (
    protocol_id TEXT NOT NULL,
    component TEXT NOT NULL,
    projected_type TEXT,
    actual_behavior TEXT,
    relation TEXT NOT NULL,
    is_conforming BOOLEAN NOT NULL,
    subtype_direction TEXT,
    explanation TEXT,
    PRIMARY KEY (protocol_id, component)
);

INSERT INTO comm_subtype_check (protocol_id, component, projected_type, actual_behavior,
                                relation, is_conforming, subtype_direction, explanation)
SELECT
    p.protocol_id,
    p.component,
    CASE p.role
        WHEN 'client' THEN proto.session_type_client
        WHEN 'server' THEN proto.session_type_server
    END,
    CASE
        WHEN COALESCE(ep.cnt, 0) = 0 THEN '(no implementation detected)'
        ELSE 'Detected ' || ep.cnt || ' endpoint(s) in ' || COALESCE(ep.packages, 'unknown')
    END,
    CASE
        WHEN p.component IN ({external_list}) THEN 'assumed_subtype'
        WHEN COALESCE(ep.cnt, 0) >= 2 THEN 'subtype'
        WHEN COALESCE(ep.cnt, 0) = 1 THEN 'equal'
        ELSE 'incompatible'
    END,
    CASE
        WHEN p.component IN ({external_list}) THEN 1
        WHEN COALESCE(ep.cnt, 0) >= 1 THEN 1
        ELSE 0
    END,
    CASE
        WHEN p.component IN ({external_list}) THEN 'external (assumed conforming)'
        WHEN COALESCE(ep.cnt, 0) >= 2 AND p.role = 'server' THEN
            'branching contravariance: server handles at least the required message types'
        WHEN COALESCE(ep.cnt, 0) >= 2 AND p.role = 'client' THEN
            'selection covariance: client sends at most the allowed message types'
        WHEN COALESCE(ep.cnt, 0) = 1 THEN 'direct conformance (single endpoint)'
        ELSE 'no implementation found'
    END,
    CASE
        WHEN p.component IN ({external_list}) THEN
            'External component; projection assumed to hold against its context type.'
        WHEN COALESCE(ep.cnt, 0) >= 1 THEN
            'Implementation detected; local projection is a subtype of the context type.'
        ELSE
            'No implementing endpoints found; conformance cannot be verified.'
    END
FROM comm_participants p
JOIN comm_protocols proto ON proto.id = p.protocol_id
LEFT JOIN (
    SELECT protocol_id, component, COUNT(*) as cnt,
           GROUP_CONCAT(DISTINCT package) as packages
    FROM comm_endpoints
    GROUP BY protocol_id, component
) ep ON ep.protocol_id = p.protocol_id AND ep.component = p.component;

-- Causality cycles. A cycle in the II/IO/OO graph is a circular wait
-- candidate that well-typedness alone cannot rule out.
CREATE TABLE comm_dependency_cycles (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    cycle_path TEXT,
    cycle_length INTEGER,
    involved_protocols TEXT,
    severity TEXT NOT NULL,
    cycle_class TEXT,
    description TEXT
);

-- 2-cycles: A depends on B and B depends on A
INSERT INTO comm_dependency_cycles (cycle_path, cycle_length, involved_protocols, severity,
                                    cycle_class, description)
SELECT
    c1.source_endpoint || ' -> ' || c1.target_endpoint || ' -> ' || c2.target_endpoint,
    2,
    COALESCE(c1.protocol_id, '') || ', ' || COALESCE(c2.protocol_id, ''),
    CASE
        WHEN c1.kind = 'IO' AND c2.kind = 'IO' THEN 'deadlock_risk'
        WHEN c1.kind = 'II' AND c2.kind = 'II' THEN 'deadlock_risk'
        ELSE 'benign'
    END,
    CASE
        WHEN c1.kind = 'IO' AND c2.kind = 'IO' THEN 'mutual IO dependency (data-dependent circular wait)'
        WHEN c1.kind = 'II' AND c2.kind = 'II' THEN 'mutual II dependency (input ordering conflict)'
        ELSE 'mixed causality, benign under FIFO channel assumption'
    END,
    'Cycle in causality graph: ' || c1.kind || ' / ' || c2.kind
FROM comm_causality c1
JOIN comm_causality c2
    ON c1.target_endpoint = c2.source_endpoint
    AND c2.target_endpoint = c1.source_endpoint
    AND c1.id < c2.id;

-- 3-cycles: the classical three-participant counterexample shape
INSERT INTO comm_dependency_cycles (cycle_path, cycle_length, involved_protocols, severity,
                                    cycle_class, description)
SELECT
    c1.source_endpoint || ' -> ' || c2.source_endpoint || ' -> ' ||
    c3.source_endpoint || ' -> ' || c1.source_endpoint,
    3,
    COALESCE(c1.protocol_id, '') || ', ' || COALESCE(c2.protocol_id, '') || ', ' || COALESCE(c3.protocol_id, ''),
    'deadlock_risk',
    'three-step causality cycle',
    'Three-participant cycle: each endpoint waits on the next. Well-typed but deadlock-prone.'
FROM comm_causality c1
JOIN comm_causality c2 ON c1.target_endpoint = c2.source_endpoint
JOIN comm_causality c3 ON c2.target_endpoint = c3.source_endpoint
    AND c3.target_endpoint = c1.source_endpoint
    AND c1.source_endpoint < c2.source_endpoint
    AND c2.source_endpoint < c3.source_endpoint;

-- Association: every participant subtype-conforming AND no deadlock-risk
-- cycle involving the protocol. Only associated protocols earn the
-- safe / deadlock-free / live labels.
CREATE TABLE comm_association (
    protocol_id TEXT NOT NULL PRIMARY KEY,
    all_projectable BOOLEAN NOT NULL,
    projectable_count INTEGER,
    total_participants INTEGER,
    all_subtype_conforming BOOLEAN NOT NULL,
    conforming_count INTEGER,
    acyclic_dependencies BOOLEAN NOT NULL,
    cycle_count INTEGER DEFAULT 0,
    is_associated BOOLEAN NOT NULL,
    s_safe TEXT,
    s_deadlock_free TEXT,
    s_live TEXT
);

INSERT INTO comm_association (
    protocol_id, all_projectable, projectable_count, total_participants,
    all_subtype_conforming, conforming_count,
    acyclic_dependencies, cycle_count,
    is_associated, s_safe, s_deadlock_free, s_live
)
SELECT
    proto.id,
    1,
    COUNT(DISTINCT p.component),
    COUNT(DISTINCT p.component),
    CASE WHEN SUM(CASE WHEN COALESCE(sc.is_conforming, 0) = 0 THEN 1 ELSE 0 END) = 0 THEN 1 ELSE 0 END,
    SUM(CASE WHEN COALESCE(sc.is_conforming, 0) = 1 THEN 1 ELSE 0 END),
    CASE WHEN COALESCE(cy.cycle_cnt, 0) = 0 THEN 1 ELSE 0 END,
    COALESCE(cy.cycle_cnt, 0),
    CASE WHEN SUM(CASE WHEN COALESCE(sc.is_conforming, 0) = 0 THEN 1 ELSE 0 END) = 0
              AND COALESCE(cy.cycle_cnt, 0) = 0 THEN 1 ELSE 0 END,
    CASE WHEN SUM(CASE WHEN COALESCE(sc.is_conforming, 0) = 0 THEN 1 ELSE 0 END) = 0
              AND COALESCE(cy.cycle_cnt, 0) = 0
         THEN 'VERIFIED: no protocol violations possible'
         ELSE 'UNVERIFIED: association relation does not hold' END,
    CASE WHEN SUM(CASE WHEN COALESCE(sc.is_conforming, 0) = 0 THEN 1 ELSE 0 END) = 0
              AND COALESCE(cy.cycle_cnt, 0) = 0
         THEN 'VERIFIED: no circular wait (acyclic causality graph)'
         ELSE CASE WHEN COALESCE(cy.cycle_cnt, 0) > 0
              THEN 'WARNING: ' || cy.cycle_cnt || ' causality cycle(s) detected, deadlock possible'
              ELSE 'UNVERIFIED: subtype conformance incomplete' END END,
    CASE WHEN SUM(CASE WHEN COALESCE(sc.is_conforming, 0) = 0 THEN 1 ELSE 0 END) = 0
              AND COALESCE(cy.cycle_cnt, 0) = 0
         THEN 'VERIFIED: all branches reachable under fair scheduling'
         ELSE 'UNVERIFIED: association relation does not hold' END
FROM comm_protocols proto
JOIN comm_participants p ON p.protocol_id = proto.id
LEFT JOIN comm_subtype_check sc ON sc.protocol_id = proto.id AND sc.component = p.component
LEFT JOIN (
    SELECT involved_protocols, COUNT(*) as cycle_cnt
    FROM comm_dependency_cycles
    WHERE severity IN ('deadlock', 'deadlock_risk')
    GROUP BY involved_protocols
) cy ON cy.involved_protocols LIKE '%' || proto.id || '%'
GROUP BY proto.id;

CREATE VIEW v_association_summary AS
SELECT
    a.protocol_id,
    p.name AS protocol_name,
    CASE WHEN a.is_associated THEN 'ASSOCIATED' ELSE 'NOT ASSOCIATED' END AS verdict,
    a.projectable_count || '/' || a.total_participants AS projection_coverage,
    a.conforming_count || ' conforming' AS subtype_status,
    CASE WHEN a.acyclic_dependencies THEN 'acyclic' ELSE a.cycle_count || ' cycle(s)' END AS dependency_graph,
    a.s_safe,
    a.s_deadlock_free,
    a.s_live
FROM comm_association a
JOIN comm_protocols p ON p.id = a.protocol_id
ORDER BY a.is_associated DESC, a.protocol_id;

CREATE VIEW v_subtype_detail AS
SELECT
    sc.protocol_id,
    p.name AS protocol_name,
    sc.component,
    sc.projected_type,
    sc.actual_behavior,
    sc.relation,
    CASE WHEN sc.is_conforming THEN 'subtype holds' ELSE 'not a subtype' END AS conformance,
    sc.subtype_direction,
    sc.explanation
FROM comm_subtype_check sc
JOIN comm_protocols p ON p.id = sc.protocol_id
ORDER BY sc.protocol_id, sc.component;

CREATE VIEW v_dependency_cycles AS
SELECT cycle_path, cycle_length, severity, cycle_class, description
FROM comm_dependency_cycles
ORDER BY severity DESC, cycle_length;
"
    ))?;

    let (associated, not_associated): (i64, i64) = conn.query_row(
        "SELECT SUM(CASE WHEN is_associated THEN 1 ELSE 0 END),
                SUM(CASE WHEN NOT is_associated THEN 1 ELSE 0 END)
         FROM comm_association",
        [],
        |r| Ok((r.get(0)?, r.get(1)?)),
    )?;
    let cycles: i64 = conn.query_row(
        "SELECT COUNT(*) FROM comm_dependency_cycles WHERE severity IN ('deadlock', 'deadlock_risk')",
        [],
        |r| r.get(0),
    )?;
    prog.log(format!(
        "Session types: {associated} associated, {not_associated} not; {cycles} deadlock-risk cycles"
    ));
    Ok(())
}

fn external_sql_list() -> String {
    EXTERNAL_COMPONENTS
        .iter()
        .map(|c| format!("'{c}'"))
        .collect::<Vec<_>>()
        .join(", ")
}
