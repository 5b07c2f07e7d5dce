//! Panic → recover pairing.
//!
//! Within each function, every panic site is connected to every recover
//! site in the same function scope: direct `recover()` calls, recovers
//! inside deferred closures or deferred named functions, and the
//! `defer recover()` form where the defer itself is the recover site.

use crate::graph::{Edge, EdgeKind, GraphStore};
use crate::ids::PositionIndex;
use crate::progress::Progress;

use super::ir::{Callee, FlowProgram, ValueKind};

pub fn extract(
    program: &FlowProgram,
    positions: &PositionIndex,
    store: &mut GraphStore,
    prog: &Progress,
) {
    prog.log("Extracting panic/recover flow edges...");
    let mut edges = 0usize;

    for func in &program.funcs {
        let mut panic_ids: Vec<String> = Vec::new();
        let mut recover_ids: Vec<String> = Vec::new();

        for value in &func.values {
            match &value.kind {
                ValueKind::Panic => {
                    if let Some(id) = resolve(positions, &func.rel_file, value.pos) {
                        panic_ids.push(id);
                    }
                }
                ValueKind::Recover => {
                    if let Some(id) = resolve(positions, &func.rel_file, value.pos) {
                        recover_ids.push(id);
                    }
                }
                ValueKind::DeferCall { callee } => match callee {
                    Callee::Builtin(name) if name == "recover" => {
                        // `defer recover()`: the defer itself is the site.
                        if let Some(id) = resolve(positions, &func.rel_file, value.pos) {
                            recover_ids.push(id);
                        }
                    }
                    _ => {
                        if let Some(target) = defer_target(program, func, callee) {
                            collect_recovers(program, target, positions, &mut recover_ids);
                        }
                    }
                },
                _ => {}
            }
        }

        for panic_id in &panic_ids {
            for recover_id in &recover_ids {
                store.add_edge(Edge::plain(
                    panic_id.clone(),
                    recover_id.clone(),
                    EdgeKind::PanicRecover,
                ));
                edges += 1;
            }
        }
    }

    prog.log(format!("Created {edges} panic/recover flow edges"));
}

fn resolve(positions: &PositionIndex, file: &str, pos: Option<(usize, usize)>) -> Option<String> {
    let (line, col) = pos?;
    positions.get(file, line, col).map(str::to_string)
}

/// Resolve the function a defer ultimately runs: a deferred closure
/// constructor, a direct function reference, or nothing resolvable.
fn defer_target(
    program: &FlowProgram,
    func: &super::ir::FlowFunc,
    callee: &Callee,
) -> Option<usize> {
    match callee {
        Callee::Known { node_id } => program.func_index(node_id),
        Callee::Value(v) => match &func.values[*v].kind {
            ValueKind::MakeClosure { func: child } => Some(*child),
            ValueKind::FuncRef { node_id } => program.func_index(node_id),
            _ => None,
        },
        _ => None,
    }
}

/// Scan a deferred function's body for recover() call sites.
fn collect_recovers(
    program: &FlowProgram,
    func_idx: usize,
    positions: &PositionIndex,
    out: &mut Vec<String>,
) {
    let func = &program.funcs[func_idx];
    for value in &func.values {
        if matches!(value.kind, ValueKind::Recover) {
            if let Some(id) = resolve(positions, &func.rel_file, value.pos) {
                out.push(id);
            }
        }
    }
}
