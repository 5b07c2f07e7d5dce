//! Call graph construction and inter-procedural plumbing.
//!
//! Walks every call, goroutine launch, and deferred call in the flow
//! program, resolves targets through the VTA solver, and emits:
//!
//! - `call` edges (caller function → callee function, `dynamic` flagged
//!   for interface dispatch),
//! - `call_site` edges (call AST node → callee function),
//! - `param_in` edges (actual argument definition → formal parameter, with
//!   the parameter index; the receiver slot of a dynamic dispatch has no
//!   matching parameter and is skipped),
//! - `param_out` edges (callee → call site when the callee has results),
//! - `call_to_return` bypass edges (caller → its call site) for
//!   IFDS/IDE-style analyses where locals survive the call.
//!
//! External callees materialize as `ext::` stub nodes; in-scope callees
//! that fail to resolve are skipped entirely so a stub never shadows an
//! analyzed-but-hidden function.

pub mod vta;

use crate::ast::WalkOutput;
use crate::flow::ir::{Callee, FlowProgram, ValueKind};
use crate::graph::{Edge, EdgeKind, GraphStore, Node, NodeKind, PropValue, Props};
use crate::moduleset::ModuleSet;
use crate::progress::Progress;
use crate::resolve::Resolver;

use vta::{FuncCatalog, Target};

pub fn build(
    program: &FlowProgram,
    resolver: &Resolver,
    modset: &ModuleSet,
    out: &WalkOutput,
    store: &mut GraphStore,
    prog: &Progress,
) {
    prog.log("Building VTA call graph...");

    let catalog = FuncCatalog::build(resolver);

    let mut call_edges = 0usize;
    let mut call_site_edges = 0usize;
    let mut param_in_edges = 0usize;
    let mut param_out_edges = 0usize;
    let mut call_to_return_edges = 0usize;
    let mut stub_count = 0usize;

    for func in &program.funcs {
        let caller_id = func.node_id.clone();

        for value in &func.values {
            let (callee, has_callee_operand) = match &value.kind {
                ValueKind::Call { callee }
                | ValueKind::Go { callee }
                | ValueKind::DeferCall { callee } => {
                    let prefix = matches!(
                        callee,
                        Callee::Value(_) | Callee::Method { recv: Some(_), .. }
                    );
                    (callee, prefix)
                }
                _ => continue,
            };

            let targets =
                vta::resolve_targets(callee, func, program, resolver, &catalog, modset);
            if targets.is_empty() {
                continue;
            }

            // The call site's AST node, when the position resolves.
            let site_id = value
                .pos
                .and_then(|(line, col)| out.positions.get(&func.rel_file, line, col))
                .map(str::to_string);

            let skip_receiver_slot =
                matches!(callee, Callee::Method { recv: Some(_), .. });

            for target in &targets {
                if let Some(stub) = &target.stub {
                    let created = ensure_stub(store, target, stub, modset);
                    if created {
                        stub_count += 1;
                    }
                }

                let mut props = Props::new();
                if target.dynamic {
                    props.insert("dynamic".into(), true.into());
                }

                store.add_edge(Edge {
                    source: caller_id.clone(),
                    target: target.node_id.clone(),
                    kind: EdgeKind::Call,
                    properties: props.clone(),
                });
                call_edges += 1;

                let Some(site_id) = &site_id else { continue };

                store.add_edge(Edge {
                    source: site_id.clone(),
                    target: target.node_id.clone(),
                    kind: EdgeKind::CallSite,
                    properties: props,
                });
                call_site_edges += 1;

                // param_in: actual argument definitions → formal parameters.
                if let Some(def) = &target.def {
                    let offset = usize::from(has_callee_operand || skip_receiver_slot);
                    for (i, &arg) in value.operands.iter().enumerate().skip(offset) {
                        let param_index = i - offset;
                        let Some(param) = def.params.get(param_index) else {
                            break;
                        };
                        let Some((line, col)) = func.values[arg].pos else {
                            continue;
                        };
                        let Some(arg_id) = out.positions.get(&func.rel_file, line, col)
                        else {
                            continue;
                        };
                        store.add_edge(Edge::with_prop(
                            arg_id.to_string(),
                            param.node_id.clone(),
                            EdgeKind::ParamIn,
                            "index",
                            param_index,
                        ));
                        param_in_edges += 1;
                    }

                    // param_out: return-value flow back to the call site.
                    if !def.results.is_empty() {
                        store.add_edge(Edge::with_prop(
                            target.node_id.clone(),
                            site_id.clone(),
                            EdgeKind::ParamOut,
                            "num_results",
                            def.results.len(),
                        ));
                        param_out_edges += 1;
                    }
                }

                // IFDS bypass: locals not passed to the callee survive the
                // call through this edge.
                store.add_edge(Edge::plain(
                    caller_id.clone(),
                    site_id.clone(),
                    EdgeKind::CallToReturn,
                ));
                call_to_return_edges += 1;
            }
        }
    }

    prog.log(format!(
        "Created {call_edges} call, {call_site_edges} call_site, {param_in_edges} param_in, \
         {param_out_edges} param_out, {call_to_return_edges} call_to_return edges, {stub_count} external stubs"
    ));
}

/// Create the stub node for an external callee once. Returns true when the
/// node was newly added.
fn ensure_stub(
    store: &mut GraphStore,
    target: &Target,
    stub: &vta::Stub,
    modset: &ModuleSet,
) -> bool {
    if store.has_node(&target.node_id) {
        return false;
    }
    let mut props = Props::new();
    props.insert("external".into(), PropValue::Bool(true));
    props.insert("full_name".into(), stub.qualified.clone().into());

    store.add_node(Node {
        id: target.node_id.clone(),
        kind: NodeKind::Function,
        name: stub.name.clone(),
        package: modset.rel_pkg(&stub.pkg_path),
        type_info: stub.type_info.clone(),
        properties: props,
        ..Default::default()
    });
    true
}
