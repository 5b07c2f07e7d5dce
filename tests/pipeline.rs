//! End-to-end pipeline tests over a miniature Go workspace.
//!
//! The fixture module is written into a temp directory, the full analysis
//! runs over it, and the assertions check the scenario-level contracts:
//! direct calls, interface dispatch, channel coupling through closures,
//! defer ordering, evaluation order, heuristic data flow for external
//! calls, and the structural invariants of the produced database.

use std::path::PathBuf;

use gocpg::graph::{Edge, EdgeKind, GraphStore, Node, NodeKind, PropValue};
use gocpg::loader::SkipConfig;
use gocpg::moduleset::{ModuleInfo, ModuleSet};
use gocpg::progress::Progress;

const MAIN_GO: &str = r#"package main

func A() {
	B()
}

func B() {}
"#;

const IFACE_GO: &str = r#"package main

type I interface {
	F()
}

type T struct{}

func (t T) F() {}

func g(i I) {
	i.F()
}
"#;

const CHAN_GO: &str = r#"package main

func C() {
	ch := make(chan int)
	go func() {
		ch <- 1
	}()
	<-ch
}
"#;

const DEFER_GO: &str = r#"package main

func D() {
	defer d1()
	defer d2()
	defer d3()
}

func d1() {}
func d2() {}
func d3() {}
"#;

const EVAL_GO: &str = r#"package main

func f(x, y, z int) int { return x + y + z }

func E() int {
	a := 1
	b := 2
	c := 3
	return f(a, b, c)
}
"#;

const EXT_GO: &str = r#"package main

import "fmt"

func S(x, y int) string {
	s := fmt.Sprintf("%d-%d", x, y)
	return s
}
"#;

const SPIN_GO: &str = r#"package main

func Spin() {
	for {
	}
}
"#;

const EMPTY_GO: &str = "package main\n";

fn fixture() -> (tempfile::TempDir, ModuleSet) {
    let dir = tempfile::tempdir().expect("tempdir");
    let root = dir.path();
    std::fs::write(root.join("go.mod"), "module example.com/app\n\ngo 1.22\n").unwrap();
    std::fs::write(root.join("main.go"), MAIN_GO).unwrap();
    std::fs::write(root.join("iface.go"), IFACE_GO).unwrap();
    std::fs::write(root.join("chans.go"), CHAN_GO).unwrap();
    std::fs::write(root.join("defers.go"), DEFER_GO).unwrap();
    std::fs::write(root.join("eval.go"), EVAL_GO).unwrap();
    std::fs::write(root.join("ext.go"), EXT_GO).unwrap();
    std::fs::write(root.join("spin.go"), SPIN_GO).unwrap();
    std::fs::write(root.join("empty.go"), EMPTY_GO).unwrap();

    let modset = ModuleSet::new(
        ModuleInfo {
            mod_path: "example.com/app".to_string(),
            dir: PathBuf::from(root),
            prefix: String::new(),
        },
        Vec::new(),
    );
    (dir, modset)
}

fn analyze(modset: &ModuleSet) -> GraphStore {
    let prog = Progress::new(false);
    gocpg::analyze(modset, SkipConfig::default(), &prog)
        .expect("analysis succeeds")
        .store
}

fn func_node<'a>(store: &'a GraphStore, name: &str) -> &'a Node {
    store
        .nodes
        .iter()
        .find(|n| n.kind == NodeKind::Function && n.name == name)
        .unwrap_or_else(|| panic!("function node {name} missing"))
}

fn edges_of(store: &GraphStore, kind: EdgeKind) -> Vec<&Edge> {
    store.edges.iter().filter(|e| e.kind == kind).collect()
}

#[test]
fn direct_call_produces_call_and_call_site_edges() {
    let (_dir, modset) = fixture();
    let store = analyze(&modset);

    let a = func_node(&store, "A");
    let b = func_node(&store, "B");

    let calls = edges_of(&store, EdgeKind::Call);
    assert!(
        calls.iter().any(|e| e.source == a.id && e.target == b.id),
        "expected call edge A -> B"
    );

    let sites: Vec<_> = edges_of(&store, EdgeKind::CallSite)
        .into_iter()
        .filter(|e| e.target == b.id)
        .collect();
    assert_eq!(sites.len(), 1, "exactly one call_site into B");
    let site_node = store
        .nodes
        .iter()
        .find(|n| n.id == sites[0].source)
        .expect("call site node exists");
    assert_eq!(site_node.kind, NodeKind::Call);
    assert_eq!(site_node.parent_function, a.id);

    // Fan counts land in the metrics table.
    assert_eq!(store.metrics[&b.id].fan_in, 1);
    assert_eq!(store.metrics[&a.id].fan_out, 1);

    // Zero parameters and zero results: no param plumbing.
    assert!(edges_of(&store, EdgeKind::ParamIn)
        .iter()
        .all(|e| e.target != b.id));
    assert!(edges_of(&store, EdgeKind::ParamOut)
        .iter()
        .all(|e| e.source != b.id));
}

#[test]
fn interface_dispatch_is_dynamic_and_satisfied() {
    let (_dir, modset) = fixture();
    let store = analyze(&modset);

    let t_decl = store
        .nodes
        .iter()
        .find(|n| n.kind == NodeKind::TypeDecl && n.name == "T")
        .expect("type T");
    let i_decl = store
        .nodes
        .iter()
        .find(|n| n.kind == NodeKind::TypeDecl && n.name == "I")
        .expect("interface I");

    assert!(
        edges_of(&store, EdgeKind::Implements)
            .iter()
            .any(|e| e.source == t_decl.id && e.target == i_decl.id),
        "expected implements edge T -> I"
    );

    let t_f = func_node(&store, "T.F");
    let satisfies: Vec<_> = edges_of(&store, EdgeKind::SatisfiesMethod)
        .into_iter()
        .filter(|e| e.source == t_f.id)
        .collect();
    assert_eq!(satisfies.len(), 1, "T.F satisfies exactly one interface method");

    let g = func_node(&store, "g");
    let dynamic_call = edges_of(&store, EdgeKind::Call)
        .into_iter()
        .find(|e| e.source == g.id && e.target == t_f.id)
        .expect("call edge g -> T.F");
    assert_eq!(
        dynamic_call.properties.get("dynamic"),
        Some(&PropValue::Bool(true)),
        "interface dispatch carries dynamic=true"
    );

    let dynamic_site = edges_of(&store, EdgeKind::CallSite)
        .into_iter()
        .find(|e| e.target == t_f.id)
        .expect("call_site into T.F");
    assert_eq!(
        dynamic_site.properties.get("dynamic"),
        Some(&PropValue::Bool(true))
    );
}

#[test]
fn channel_send_in_closure_couples_to_receive() {
    let (_dir, modset) = fixture();
    let store = analyze(&modset);

    let flows = edges_of(&store, EdgeKind::ChanFlow);
    assert_eq!(flows.len(), 1, "exactly one chan_flow edge");

    let send = store
        .nodes
        .iter()
        .find(|n| n.id == flows[0].source)
        .expect("send node");
    let recv = store
        .nodes
        .iter()
        .find(|n| n.id == flows[0].target)
        .expect("receive node");
    assert_eq!(send.kind, NodeKind::Send);
    assert_eq!(recv.kind, NodeKind::UnaryExpr);
    assert_eq!(send.file, "chans.go");
    assert_eq!(recv.file, "chans.go");

    // The send sits inside the closure, not the host function.
    let closure = store
        .nodes
        .iter()
        .find(|n| n.kind == NodeKind::Function && n.name == "func literal" && n.file == "chans.go")
        .expect("closure node");
    assert_eq!(send.parent_function, closure.id);

    // Captured channel cell: closure -> local declaration, by reference.
    let captures: Vec<_> = edges_of(&store, EdgeKind::Capture)
        .into_iter()
        .filter(|e| e.source == closure.id)
        .collect();
    assert_eq!(captures.len(), 1);
    assert_eq!(
        captures[0].properties.get("capture_kind"),
        Some(&PropValue::Str("by_reference".to_string()))
    );
}

#[test]
fn defer_ordering_is_lifo() {
    let (_dir, modset) = fixture();
    let store = analyze(&modset);

    let defers: Vec<&Node> = store
        .nodes
        .iter()
        .filter(|n| n.kind == NodeKind::Defer && n.file == "defers.go")
        .collect();
    assert_eq!(defers.len(), 3);

    let order_edges: Vec<_> = edges_of(&store, EdgeKind::DeferOrder);
    assert_eq!(order_edges.len(), 2, "three defers chain with two edges");

    let by_line = |id: &str| {
        store
            .nodes
            .iter()
            .find(|n| n.id == id)
            .map(|n| n.line)
            .unwrap_or(0)
    };
    for edge in &order_edges {
        assert!(
            by_line(&edge.source) > by_line(&edge.target),
            "defer_order runs from later to earlier source order"
        );
    }
    let ranks: Vec<i64> = order_edges
        .iter()
        .filter_map(|e| match e.properties.get("exec_order") {
            Some(PropValue::Int(i)) => Some(*i),
            _ => None,
        })
        .collect();
    let mut sorted = ranks.clone();
    sorted.sort();
    assert_eq!(sorted, vec![1, 2]);
}

#[test]
fn argument_edges_are_indexed() {
    let (_dir, modset) = fixture();
    let store = analyze(&modset);

    // The call f(a, b, c) in eval.go.
    let call = store
        .nodes
        .iter()
        .find(|n| n.kind == NodeKind::Call && n.name == "f" && n.file == "eval.go")
        .expect("call node for f(a, b, c)");

    let mut indexes: Vec<i64> = edges_of(&store, EdgeKind::Argument)
        .into_iter()
        .filter(|e| e.source == call.id)
        .filter_map(|e| match e.properties.get("index") {
            Some(PropValue::Int(i)) => Some(*i),
            _ => None,
        })
        .collect();
    indexes.sort();
    assert_eq!(indexes, vec![0, 1, 2]);

    // param_in indexes stay within the callee's parameter range.
    for edge in edges_of(&store, EdgeKind::ParamIn) {
        if let Some(PropValue::Int(i)) = edge.properties.get("index") {
            assert!((0..=2).contains(i));
        }
    }
}

#[test]
fn external_call_creates_stub_not_in_scope() {
    let (_dir, modset) = fixture();
    let store = analyze(&modset);

    let stub = store
        .nodes
        .iter()
        .find(|n| n.id == "ext::fmt.Sprintf")
        .expect("external stub for fmt.Sprintf");
    assert_eq!(stub.kind, NodeKind::Function);
    assert_eq!(stub.package, "fmt");
    assert_eq!(
        stub.properties.get("external"),
        Some(&PropValue::Bool(true))
    );

    // Stubs never name an in-scope module path, and exist only when
    // referenced by a call edge.
    for node in &store.nodes {
        if let Some(qualified) = node.id.strip_prefix("ext::") {
            assert!(
                !qualified.starts_with("example.com/app"),
                "stub must not shadow an in-scope function: {}",
                node.id
            );
            assert!(
                store.edges.iter().any(|e| (e.kind == EdgeKind::Call
                    || e.kind == EdgeKind::CallSite)
                    && e.target == node.id),
                "stub {} must be referenced by a call edge",
                node.id
            );
        }
    }
}

#[test]
fn boundary_behaviors() {
    let (_dir, modset) = fixture();
    let store = analyze(&modset);

    // Empty function: entry/exit CFG only, no CDG.
    let b = func_node(&store, "B");
    let b_cfg: Vec<_> = edges_of(&store, EdgeKind::Cfg)
        .into_iter()
        .filter(|e| e.source == b.id || e.target == b.id)
        .collect();
    assert_eq!(b_cfg.len(), 2, "entry + exit only for an empty function");
    assert!(edges_of(&store, EdgeKind::Cdg)
        .iter()
        .all(|e| !e.source.starts_with(&b.id)));

    // Infinite loop: cfg entry exists, but no pdom and no cdg edges.
    let spin = func_node(&store, "Spin");
    assert!(
        edges_of(&store, EdgeKind::Cfg)
            .iter()
            .any(|e| e.source == spin.id),
        "entry edge exists for the infinite loop"
    );
    assert!(
        edges_of(&store, EdgeKind::Pdom)
            .iter()
            .all(|e| !e.source.starts_with(&spin.id) && !e.target.starts_with(&spin.id)),
        "no pdom edges for a function with no exit"
    );
    assert!(
        edges_of(&store, EdgeKind::Cdg)
            .iter()
            .all(|e| !e.source.starts_with(&spin.id)),
        "no cdg edges for a function with no exit"
    );

    // Package-only file still yields a file node under the package.
    let empty_file = store
        .nodes
        .iter()
        .find(|n| n.kind == NodeKind::File && n.file == "empty.go")
        .expect("file node for package-only file");
    assert!(store
        .edges
        .iter()
        .any(|e| e.kind == EdgeKind::Ast
            && e.source == "pkg::main"
            && e.target == empty_file.id));
}

#[test]
fn universal_invariants() {
    let (_dir, modset) = fixture();
    let store = analyze(&modset);

    // Node IDs are unique.
    let mut ids: Vec<&str> = store.nodes.iter().map(|n| n.id.as_str()).collect();
    let total = ids.len();
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), total, "node ids must be unique");

    // Edge triples are unique.
    let mut triples: Vec<(String, String, &'static str)> = store
        .edges
        .iter()
        .map(|e| (e.source.clone(), e.target.clone(), e.kind.as_str()))
        .collect();
    let total = triples.len();
    triples.sort();
    triples.dedup();
    assert_eq!(triples.len(), total, "edge triples must be unique");

    // Every function node has metrics with complexity >= 1.
    for node in &store.nodes {
        if node.kind == NodeKind::Function && !node.id.starts_with("ext::") {
            let m = store
                .metrics
                .get(&node.id)
                .unwrap_or_else(|| panic!("metrics missing for {}", node.id));
            assert!(m.cyclomatic_complexity >= 1);
        }
    }

    // Every satisfies_method edge accompanies an implements edge.
    assert!(!edges_of(&store, EdgeKind::SatisfiesMethod).is_empty());

    // For every call_site to callee C there is a call edge from the
    // enclosing function to C.
    for site in edges_of(&store, EdgeKind::CallSite) {
        let site_node = store
            .nodes
            .iter()
            .find(|n| n.id == site.source)
            .expect("call site node");
        assert!(
            store.edges.iter().any(|e| e.kind == EdgeKind::Call
                && e.source == site_node.parent_function
                && e.target == site.target),
            "call_site without matching call edge: {} -> {}",
            site.source,
            site.target
        );
    }
}

#[test]
fn pipeline_is_deterministic() {
    let (_dir, modset) = fixture();
    let first = analyze(&modset);
    let second = analyze(&modset);

    let node_ids = |store: &GraphStore| -> Vec<String> {
        store.nodes.iter().map(|n| n.id.clone()).collect()
    };
    let edge_keys = |store: &GraphStore| -> Vec<(String, String, &'static str)> {
        store
            .edges
            .iter()
            .map(|e| (e.source.clone(), e.target.clone(), e.kind.as_str()))
            .collect()
    };

    assert_eq!(node_ids(&first), node_ids(&second));
    assert_eq!(edge_keys(&first), edge_keys(&second));
}
