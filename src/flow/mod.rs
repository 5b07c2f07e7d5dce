//! Control- and data-flow extraction from the lowered flow IR.
//!
//! Runs after the AST walk: every in-scope function body is lowered into
//! the IR (`ir`), then the extractors emit basic blocks and CFG edges
//! (`cfg`), def→use DFG edges (`dfg`), control dependence via
//! post-dominator frontiers (`postdom`), channel send→receive coupling
//! (`channels`), and panic/recover pairing (`panics`). Closure capture
//! edges are emitted alongside the CFG pass.

pub mod channels;
pub mod cfg;
pub mod dfg;
pub mod ir;
pub mod panics;

mod postdom;

pub use postdom::post_dominators;

use crate::ast::WalkOutput;
use crate::graph::GraphStore;
use crate::loader::Workspace;
use crate::progress::Progress;
use crate::resolve::Resolver;

use ir::FlowProgram;

/// Lower all function bodies and run every flow extractor.
pub fn extract(
    ws: &Workspace,
    resolver: &Resolver,
    out: &WalkOutput,
    store: &mut GraphStore,
    prog: &Progress,
) -> FlowProgram {
    prog.log("Lowering function bodies...");
    let mut program = FlowProgram::default();
    for pkg in &ws.packages {
        for file in &pkg.files {
            ir::lower_file(&mut program, file, &pkg.rel_pkg, resolver, &out.functions);
        }
    }
    prog.log(format!("Lowered {} functions", program.funcs.len()));

    cfg::extract(&program, store, prog);
    dfg::extract(&program, &out.positions, store, prog);
    postdom::extract_cdg(&program, store, prog);
    channels::extract(&program, &out.positions, store, prog);
    panics::extract(&program, &out.positions, store, prog);

    program
}
