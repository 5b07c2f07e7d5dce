//! Basic-block nodes, CFG edges, and closure capture edges.

use crate::graph::{Edge, EdgeKind, GraphStore, Node, NodeKind, PropValue, Props};
use crate::ids;
use crate::progress::Progress;

use super::ir::{FlowFunc, FlowProgram, ValueKind};

/// Emit one `basic_block` node per block, an `entry` edge from the
/// function, `exit` edges from terminal blocks back to the function, and a
/// `cfg` edge per successor (labelled true/false after a conditional
/// branch). Capture edges are emitted here as well since both passes walk
/// the same functions.
pub fn extract(program: &FlowProgram, store: &mut GraphStore, prog: &Progress) {
    prog.log("Extracting CFG + capture edges...");

    let mut bb_nodes = 0usize;
    let mut cfg_edges = 0usize;
    let mut capture_edges = 0usize;

    for func in &program.funcs {
        emit_captures(func, store, &mut capture_edges);

        if func.blocks.is_empty() {
            continue;
        }

        let block_ids: Vec<String> = (0..func.blocks.len())
            .map(|i| ids::block_id(&func.node_id, i))
            .collect();

        for (i, block) in func.blocks.iter().enumerate() {
            let pos = block
                .instrs
                .iter()
                .find_map(|&v| func.values[v].pos);
            let (line, col) = pos.unwrap_or((0, 0));
            let file = if pos.is_some() {
                func.rel_file.clone()
            } else {
                String::new()
            };

            let mut props = Props::new();
            props.insert("index".into(), PropValue::Int(i as i64));

            store.add_node(Node {
                id: block_ids[i].clone(),
                kind: NodeKind::BasicBlock,
                name: if i == 0 {
                    "entry".to_string()
                } else {
                    format!("bb{i}")
                },
                file,
                line,
                col,
                package: func.rel_pkg.clone(),
                parent_function: func.node_id.clone(),
                properties: props,
                ..Default::default()
            });
            bb_nodes += 1;
        }

        // Entry edge: function → first block.
        store.add_edge(Edge::with_prop(
            func.node_id.clone(),
            block_ids[0].clone(),
            EdgeKind::Cfg,
            "label",
            "entry",
        ));
        cfg_edges += 1;

        // Exit edges: terminal blocks → function.
        for (i, block) in func.blocks.iter().enumerate() {
            if block.succs.is_empty() {
                store.add_edge(Edge::with_prop(
                    block_ids[i].clone(),
                    func.node_id.clone(),
                    EdgeKind::Cfg,
                    "label",
                    "exit",
                ));
                cfg_edges += 1;
            }
        }

        // Successor edges; conditional branches label [true, false].
        for (i, block) in func.blocks.iter().enumerate() {
            for (j, &succ) in block.succs.iter().enumerate() {
                let mut edge = Edge::plain(
                    block_ids[i].clone(),
                    block_ids[succ].clone(),
                    EdgeKind::Cfg,
                );
                if block.is_if && block.succs.len() == 2 {
                    let label = if j == 0 { "true" } else { "false" };
                    edge.properties.insert("label".into(), label.into());
                }
                store.add_edge(edge);
                cfg_edges += 1;
            }
        }
    }

    prog.log(format!(
        "Created {bb_nodes} basic_block nodes, {cfg_edges} CFG edges, {capture_edges} capture edges"
    ));
}

/// Closures always capture by reference: the closure and the enclosing
/// scope share the same cell.
fn emit_captures(func: &FlowFunc, store: &mut GraphStore, count: &mut usize) {
    if !func.is_child || func.free_vars.is_empty() {
        return;
    }
    for &fv in &func.free_vars {
        let value = &func.values[fv];
        let ValueKind::FreeVar { decl_node_id } = &value.kind else {
            continue;
        };
        let Some(decl) = decl_node_id else { continue };
        let mut edge = Edge::plain(func.node_id.clone(), decl.clone(), EdgeKind::Capture);
        if let Some(name) = &value.name {
            edge.properties.insert("var_name".into(), name.clone().into());
        }
        edge.properties
            .insert("capture_kind".into(), "by_reference".into());
        store.add_edge(edge);
        *count += 1;
    }
}
