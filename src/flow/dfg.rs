//! Intra-procedural data-flow edges: definition → use.
//!
//! For every value with a source position, each referrer with a position is
//! a use site; both positions resolve through the first-wins position index
//! to statement-level nodes. Self-edges (definition and use resolving to
//! the same node) are suppressed. Values carrying a source-level name
//! attach it as `var_name`.

use crate::graph::{Edge, EdgeKind, GraphStore};
use crate::ids::PositionIndex;
use crate::progress::Progress;

use super::ir::FlowProgram;

pub fn extract(
    program: &FlowProgram,
    positions: &PositionIndex,
    store: &mut GraphStore,
    prog: &Progress,
) {
    prog.log("Extracting DFG...");
    let mut dfg_edges = 0usize;

    for func in &program.funcs {
        for (value_id, value) in func.values.iter().enumerate() {
            let Some((def_line, def_col)) = value.pos else {
                continue;
            };
            let Some(def_node) = positions.get(&func.rel_file, def_line, def_col) else {
                continue;
            };
            let def_node = def_node.to_string();

            for &referrer in &func.referrers[value_id] {
                let Some((use_line, use_col)) = func.values[referrer].pos else {
                    continue;
                };
                let Some(use_node) = positions.get(&func.rel_file, use_line, use_col) else {
                    continue;
                };
                if use_node == def_node {
                    continue;
                }

                let mut edge = Edge::plain(def_node.clone(), use_node.to_string(), EdgeKind::Dfg);
                if let Some(name) = &value.name {
                    edge.properties
                        .insert("var_name".into(), name.clone().into());
                }
                store.add_edge(edge);
                dfg_edges += 1;
            }
        }
    }

    prog.log(format!("Created {dfg_edges} DFG edges"));
}
