//! The Code Property Graph data model and in-memory accumulator.
//!
//! Nodes and edges are accumulated in memory during the analysis phases and
//! flushed to SQLite once at the end. Deduplication happens here: nodes by
//! ID (first wins), edges by the `(source, target, kind)` triple. Property
//! bags are open maps serialized as JSON; `BTreeMap` keeps key order stable
//! so identical inputs produce byte-identical rows.

use std::collections::BTreeMap;

use rustc_hash::{FxHashMap, FxHashSet};
use serde::Serialize;

/// Node kinds in the graph. `as_str` values are the storage vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Package,
    File,
    Function,
    Parameter,
    Result,
    Local,
    Call,
    Literal,
    Identifier,
    Selector,
    CompositeLit,
    If,
    For,
    Switch,
    Select,
    Case,
    Return,
    Assign,
    Go,
    Defer,
    Send,
    Block,
    Branch,
    Label,
    Import,
    Comment,
    TypeDecl,
    Field,
    BasicBlock,
    TypeParam,
    IncDec,
    UnaryExpr,
    BinaryExpr,
    IndexExpr,
    SliceExpr,
    TypeAssertExpr,
    KeyValueExpr,
    MetaData,
}

impl NodeKind {
    pub fn as_str(self) -> &'static str {
        match self {
            NodeKind::Package => "package",
            NodeKind::File => "file",
            NodeKind::Function => "function",
            NodeKind::Parameter => "parameter",
            NodeKind::Result => "result",
            NodeKind::Local => "local",
            NodeKind::Call => "call",
            NodeKind::Literal => "literal",
            NodeKind::Identifier => "identifier",
            NodeKind::Selector => "selector",
            NodeKind::CompositeLit => "composite_lit",
            NodeKind::If => "if",
            NodeKind::For => "for",
            NodeKind::Switch => "switch",
            NodeKind::Select => "select",
            NodeKind::Case => "case",
            NodeKind::Return => "return",
            NodeKind::Assign => "assign",
            NodeKind::Go => "go",
            NodeKind::Defer => "defer",
            NodeKind::Send => "send",
            NodeKind::Block => "block",
            NodeKind::Branch => "branch",
            NodeKind::Label => "label",
            NodeKind::Import => "import",
            NodeKind::Comment => "comment",
            NodeKind::TypeDecl => "type_decl",
            NodeKind::Field => "field",
            NodeKind::BasicBlock => "basic_block",
            NodeKind::TypeParam => "type_param",
            NodeKind::IncDec => "incdec",
            NodeKind::UnaryExpr => "unary_expr",
            NodeKind::BinaryExpr => "binary_expr",
            NodeKind::IndexExpr => "index_expr",
            NodeKind::SliceExpr => "slice_expr",
            NodeKind::TypeAssertExpr => "type_assert_expr",
            NodeKind::KeyValueExpr => "key_value_expr",
            NodeKind::MetaData => "meta_data",
        }
    }
}

/// Edge kinds in the graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EdgeKind {
    Ast,
    Cfg,
    Cdg,
    Dom,
    Pdom,
    Dfg,
    Call,
    CallSite,
    ParamIn,
    ParamOut,
    CallToReturn,
    Argument,
    Receiver,
    Ref,
    EvalType,
    Scope,
    Initializer,
    NextSibling,
    BranchTarget,
    DeferOrder,
    Spawn,
    SpawnCall,
    ChanFlow,
    PanicRecover,
    Implements,
    Embeds,
    AliasOf,
    HasMethod,
    SatisfiesMethod,
    Imports,
    InitOrder,
    ErrorWrap,
    Capture,
    Condition,
    Doc,
    Eog,
}

impl EdgeKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EdgeKind::Ast => "ast",
            EdgeKind::Cfg => "cfg",
            EdgeKind::Cdg => "cdg",
            EdgeKind::Dom => "dom",
            EdgeKind::Pdom => "pdom",
            EdgeKind::Dfg => "dfg",
            EdgeKind::Call => "call",
            EdgeKind::CallSite => "call_site",
            EdgeKind::ParamIn => "param_in",
            EdgeKind::ParamOut => "param_out",
            EdgeKind::CallToReturn => "call_to_return",
            EdgeKind::Argument => "argument",
            EdgeKind::Receiver => "receiver",
            EdgeKind::Ref => "ref",
            EdgeKind::EvalType => "eval_type",
            EdgeKind::Scope => "scope",
            EdgeKind::Initializer => "initializer",
            EdgeKind::NextSibling => "next_sibling",
            EdgeKind::BranchTarget => "branch_target",
            EdgeKind::DeferOrder => "defer_order",
            EdgeKind::Spawn => "spawn",
            EdgeKind::SpawnCall => "spawn_call",
            EdgeKind::ChanFlow => "chan_flow",
            EdgeKind::PanicRecover => "panic_recover",
            EdgeKind::Implements => "implements",
            EdgeKind::Embeds => "embeds",
            EdgeKind::AliasOf => "alias_of",
            EdgeKind::HasMethod => "has_method",
            EdgeKind::SatisfiesMethod => "satisfies_method",
            EdgeKind::Imports => "imports",
            EdgeKind::InitOrder => "init_order",
            EdgeKind::ErrorWrap => "error_wrap",
            EdgeKind::Capture => "capture",
            EdgeKind::Condition => "condition",
            EdgeKind::Doc => "doc",
            EdgeKind::Eog => "eog",
        }
    }
}

/// A primitive property value. Serialized untagged so bags read naturally
/// as JSON objects.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum PropValue {
    Bool(bool),
    Int(i64),
    Str(String),
}

impl From<bool> for PropValue {
    fn from(v: bool) -> Self {
        PropValue::Bool(v)
    }
}
impl From<i64> for PropValue {
    fn from(v: i64) -> Self {
        PropValue::Int(v)
    }
}
impl From<usize> for PropValue {
    fn from(v: usize) -> Self {
        PropValue::Int(v as i64)
    }
}
impl From<&str> for PropValue {
    fn from(v: &str) -> Self {
        PropValue::Str(v.to_string())
    }
}
impl From<String> for PropValue {
    fn from(v: String) -> Self {
        PropValue::Str(v)
    }
}

/// Open property bag. BTreeMap keeps serialization order deterministic.
pub type Props = BTreeMap<String, PropValue>;

/// Serialize a property bag to a JSON string, or `""` if empty.
pub fn props_json(props: &Props) -> String {
    if props.is_empty() {
        return String::new();
    }
    serde_json::to_string(props).unwrap_or_default()
}

/// A vertex in the Code Property Graph.
///
/// Empty strings and zero positions mean "absent" and are stored as NULL.
#[derive(Debug, Clone, Default)]
pub struct Node {
    pub id: String,
    pub kind: NodeKind,
    pub name: String,
    /// Module-relative file path.
    pub file: String,
    pub line: usize,
    pub col: usize,
    pub end_line: usize,
    /// Module-relative import path.
    pub package: String,
    /// Node ID of the enclosing function, or "".
    pub parent_function: String,
    pub type_info: String,
    pub properties: Props,
}

impl Default for NodeKind {
    fn default() -> Self {
        NodeKind::MetaData
    }
}

/// A directed edge in the Code Property Graph.
#[derive(Debug, Clone)]
pub struct Edge {
    pub source: String,
    pub target: String,
    pub kind: EdgeKind,
    pub properties: Props,
}

impl Edge {
    /// Edge without properties.
    pub fn plain(source: impl Into<String>, target: impl Into<String>, kind: EdgeKind) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            kind,
            properties: Props::new(),
        }
    }

    /// Edge with a single property.
    pub fn with_prop(
        source: impl Into<String>,
        target: impl Into<String>,
        kind: EdgeKind,
        key: &str,
        value: impl Into<PropValue>,
    ) -> Self {
        let mut properties = Props::new();
        properties.insert(key.to_string(), value.into());
        Self {
            source: source.into(),
            target: target.into(),
            kind,
            properties,
        }
    }
}

/// Computed metrics for a single function.
#[derive(Debug, Clone, Default)]
pub struct FunctionMetrics {
    pub function_id: String,
    pub cyclomatic_complexity: i64,
    pub fan_in: i64,
    pub fan_out: i64,
    pub loc: i64,
    pub num_params: i64,
}

/// Accumulates the entire graph in memory before flushing to SQLite.
///
/// Nodes deduplicate by ID (re-adding an identical ID is a no-op, first
/// wins); edges by the `(source, target, kind)` triple, properties from a
/// duplicate insertion are discarded.
#[derive(Default)]
pub struct GraphStore {
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
    node_seen: FxHashMap<String, usize>,
    edge_seen: FxHashSet<(String, String, EdgeKind)>,
    /// file → content
    pub sources: FxHashMap<String, String>,
    /// function_id → metrics
    pub metrics: FxHashMap<String, FunctionMetrics>,
}

impl GraphStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a node, deduplicating by ID (first wins).
    pub fn add_node(&mut self, node: Node) {
        if self.node_seen.contains_key(&node.id) {
            return;
        }
        self.node_seen.insert(node.id.clone(), self.nodes.len());
        self.nodes.push(node);
    }

    /// Append an edge if no edge with the same (source, target, kind) exists.
    pub fn add_edge(&mut self, edge: Edge) {
        let key = (edge.source.clone(), edge.target.clone(), edge.kind);
        if !self.edge_seen.insert(key) {
            return;
        }
        self.edges.push(edge);
    }

    /// Record a source file's content, keyed by relative path.
    pub fn add_source(&mut self, rel_file: &str, content: String) {
        self.sources.entry(rel_file.to_string()).or_insert(content);
    }

    /// True if a node with this ID has been added.
    pub fn has_node(&self, id: &str) -> bool {
        self.node_seen.contains_key(id)
    }

    /// Set a property on an already-added node. No-op for unknown IDs.
    pub fn set_node_property(&mut self, id: &str, key: &str, value: impl Into<PropValue>) {
        if let Some(&idx) = self.node_seen.get(id) {
            self.nodes[idx]
                .properties
                .insert(key.to_string(), value.into());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(id: &str) -> Node {
        Node {
            id: id.into(),
            kind: NodeKind::Function,
            name: "f".into(),
            ..Default::default()
        }
    }

    #[test]
    fn add_node_is_idempotent_first_wins() {
        let mut g = GraphStore::new();
        let mut first = node("a");
        first.name = "first".into();
        let mut second = node("a");
        second.name = "second".into();
        g.add_node(first);
        g.add_node(second);
        assert_eq!(g.nodes.len(), 1);
        assert_eq!(g.nodes[0].name, "first");
    }

    #[test]
    fn add_edge_dedups_by_triple_keeping_first_properties() {
        let mut g = GraphStore::new();
        g.add_edge(Edge::with_prop("a", "b", EdgeKind::Call, "dynamic", true));
        g.add_edge(Edge::plain("a", "b", EdgeKind::Call));
        g.add_edge(Edge::plain("a", "b", EdgeKind::CallSite));
        assert_eq!(g.edges.len(), 2);
        assert_eq!(
            g.edges[0].properties.get("dynamic"),
            Some(&PropValue::Bool(true))
        );
    }

    #[test]
    fn props_json_is_deterministic_and_empty_maps_to_empty_string() {
        let mut props = Props::new();
        assert_eq!(props_json(&props), "");
        props.insert("index".into(), 2usize.into());
        props.insert("dynamic".into(), true.into());
        assert_eq!(props_json(&props), r#"{"dynamic":true,"index":2}"#);
    }

    #[test]
    fn set_node_property_mutates_existing_nodes_only() {
        let mut g = GraphStore::new();
        g.add_node(node("a"));
        g.set_node_property("a", "recursive", true);
        g.set_node_property("missing", "recursive", true);
        assert_eq!(
            g.nodes[0].properties.get("recursive"),
            Some(&PropValue::Bool(true))
        );
    }
}
