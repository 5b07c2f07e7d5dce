//! Function metrics: cyclomatic complexity, LOC, parameter counts, and —
//! once the call graph exists — fan-in/fan-out and recursion markers.
//!
//! Complexity is decision points + 1: every if, for/range, case clause,
//! comm clause, and short-circuit operator adds one. Anonymous function
//! literals are measured like named functions.

use tree_sitter::Node as TsNode;

use crate::ast::WalkOutput;
use crate::graph::{EdgeKind, FunctionMetrics, GraphStore, NodeKind};
use crate::loader::Workspace;
use crate::progress::Progress;
use crate::resolve;
use crate::syntax::{self, field, named_children};

/// Compute per-function metrics over the AST.
pub fn compute(ws: &Workspace, out: &WalkOutput, store: &mut GraphStore, prog: &Progress) {
    prog.log("Computing metrics...");
    let mut count = 0usize;

    for pkg in &ws.packages {
        for file in &pkg.files {
            let root = file.tree.root_node();
            visit_functions(root, &mut |node| {
                let (line, col) = syntax::pos(node);
                let Some(func_id) = out.functions.get(&file.rel, line, col) else {
                    return;
                };
                let func_id = func_id.to_string();

                let complexity = 1 + field(node, "body")
                    .map(|b| decision_points(&file.source, b))
                    .unwrap_or(0);
                let loc = syntax::end_line(node) - line + 1;
                let num_params = field(node, "parameters")
                    .map(resolve::count_param_slots)
                    .unwrap_or(0);

                store.metrics.insert(
                    func_id.clone(),
                    FunctionMetrics {
                        function_id: func_id,
                        cyclomatic_complexity: complexity as i64,
                        loc: loc as i64,
                        num_params: num_params as i64,
                        ..Default::default()
                    },
                );
                count += 1;
            });
        }
    }

    prog.log(format!("Computed metrics for {count} functions"));
}

/// Fill fan-in/fan-out from call edges and mark directly recursive
/// functions. Call endpoints with no AST-derived metrics (external stubs,
/// functions in filtered files) get a minimal record so fan-in survives.
/// Must run after the call graph phase.
pub fn compute_fan_in_out(store: &mut GraphStore) {
    use rustc_hash::FxHashMap;

    let mut fan_in: FxHashMap<String, i64> = FxHashMap::default();
    let mut fan_out: FxHashMap<String, i64> = FxHashMap::default();
    let mut recursive: Vec<String> = Vec::new();

    for edge in &store.edges {
        if edge.kind != EdgeKind::Call {
            continue;
        }
        *fan_out.entry(edge.source.clone()).or_default() += 1;
        *fan_in.entry(edge.target.clone()).or_default() += 1;
        if edge.source == edge.target {
            recursive.push(edge.source.clone());
        }
    }

    for id in recursive {
        if store
            .nodes
            .iter()
            .any(|n| n.id == id && n.kind == NodeKind::Function)
        {
            store.set_node_property(&id, "recursive", true);
        }
    }

    for (id, metrics) in store.metrics.iter_mut() {
        metrics.fan_in = fan_in.get(id).copied().unwrap_or(0);
        metrics.fan_out = fan_out.get(id).copied().unwrap_or(0);
    }

    // Minimal records for endpoints without AST-derived metrics.
    for (id, &count) in &fan_in {
        store
            .metrics
            .entry(id.clone())
            .or_insert_with(|| FunctionMetrics {
                function_id: id.clone(),
                fan_in: count,
                fan_out: fan_out.get(id).copied().unwrap_or(0),
                ..Default::default()
            });
    }
    for (id, &count) in &fan_out {
        store
            .metrics
            .entry(id.clone())
            .or_insert_with(|| FunctionMetrics {
                function_id: id.clone(),
                fan_out: count,
                fan_in: fan_in.get(id).copied().unwrap_or(0),
                ..Default::default()
            });
    }
}

/// Visit every function declaration, method declaration, and function
/// literal in the tree.
fn visit_functions(node: TsNode, f: &mut impl FnMut(TsNode)) {
    match node.kind() {
        "function_declaration" | "method_declaration" | "func_literal" => f(node),
        _ => {}
    }
    for child in syntax::children(node) {
        visit_functions(child, f);
    }
}

/// Decision points inside a function body. Nested function literals count
/// toward their own metric, not the host's — but the original reference
/// semantics count every decision in the lexical body, literals included,
/// so the traversal does not stop at literal boundaries.
fn decision_points(src: &str, body: TsNode) -> usize {
    let mut count = 0;
    count_decisions(src, body, &mut count);
    count
}

fn count_decisions(src: &str, node: TsNode, count: &mut usize) {
    match node.kind() {
        "if_statement" | "for_statement" => *count += 1,
        "expression_case" | "type_case" | "communication_case" | "default_case" => *count += 1,
        "binary_expression" => {
            if let Some(op) = field(node, "operator") {
                let text = syntax::text(src, op);
                if text == "&&" || text == "||" {
                    *count += 1;
                }
            }
        }
        _ => {}
    }
    for child in named_children(node) {
        count_decisions(src, child, count);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_decisions_and_short_circuits() {
        let src = r#"package p

func f(a, b int) int {
	if a > 0 && b > 0 {
		return a
	}
	for i := 0; i < b; i++ {
		switch i {
		case 1:
			a++
		default:
			a--
		}
	}
	return a
}
"#;
        let mut parser = syntax::go_parser().unwrap();
        let tree = syntax::parse(&mut parser, src, "t.go").unwrap();
        let func = syntax::child_of_kind(tree.root_node(), "function_declaration").unwrap();
        let body = field(func, "body").unwrap();
        // if + && + for + case + default = 5 decision points.
        assert_eq!(decision_points(src, body), 5);
    }
}
