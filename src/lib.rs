//! gocpg — Code Property Graph generation for Go modules.
//!
//! The pipeline parses a set of Go modules, fuses AST, control flow, data
//! flow, control dependence, call graph, type relations, and metrics into
//! one heterogeneous graph, and materializes it as a queryable SQLite
//! database with derived analysis tables.
//!
//! # Pipeline phases
//!
//! 1. **Load** ([`loader`]): walk the module set, parse every in-scope
//!    file, group packages.
//! 2. **Resolve** ([`resolve`]): per-package symbol tables.
//! 3. **Walk** ([`ast`]): structural nodes, AST edges, scopes, refs, docs.
//! 4. **Flow** ([`flow`]): lower bodies to the flow IR; extract CFG, DFG,
//!    CDG, channel flow, panic/recover, captures.
//! 5. **Call graph** ([`callgraph`]): VTA-style target resolution with
//!    inter-procedural parameter plumbing and external stubs.
//! 6. **Type relations** ([`typerel`]) and **metrics** ([`metrics`]).
//! 7. **Persist** ([`db`]): bulk write plus the derivation passes.
//!
//! Phases are strictly sequential; the graph store and all indices are
//! owned by one phase at a time.
//!
//! # Example
//!
//! ```no_run
//! use std::path::{Path, PathBuf};
//! use gocpg::moduleset::{ModuleInfo, ModuleSet};
//! use gocpg::loader::SkipConfig;
//! use gocpg::progress::Progress;
//!
//! let modset = ModuleSet::new(
//!     ModuleInfo {
//!         mod_path: "github.com/example/server".into(),
//!         dir: PathBuf::from("/src/server"),
//!         prefix: String::new(),
//!     },
//!     Vec::new(),
//! );
//! let prog = Progress::new(false);
//! let analysis = gocpg::analyze(&modset, SkipConfig::default(), &prog)?;
//! gocpg::db::write(Path::new("out.db"), &analysis.store, &modset, &[], false, &prog)?;
//! # Ok::<(), gocpg::error::CpgError>(())
//! ```

pub mod ast;
pub mod callgraph;
pub mod db;
pub mod error;
pub mod flow;
pub mod graph;
pub mod ids;
pub mod loader;
pub mod metrics;
pub mod moduleset;
pub mod progress;
pub mod resolve;
pub mod syntax;
pub mod typerel;

use graph::{GraphStore, Node, NodeKind, PropValue, Props};
use loader::SkipConfig;
use moduleset::ModuleSet;
use progress::Progress;

/// Everything the analysis phases produce before persistence.
pub struct Analysis {
    pub store: GraphStore,
    pub walk: ast::WalkOutput,
    pub flow: flow::ir::FlowProgram,
}

/// Run every analysis phase over the module set, producing the in-memory
/// graph. Persistence is a separate step ([`db::write`]).
pub fn analyze(
    modset: &ModuleSet,
    skip: SkipConfig,
    prog: &Progress,
) -> error::Result<Analysis> {
    let ws = loader::load(modset, skip, prog)?;
    let resolver = resolve::Resolver::build(&ws);

    let mut store = GraphStore::new();

    let walk = ast::walk(&ws, modset, &resolver, &mut store, prog);
    let flow = flow::extract(&ws, &resolver, &walk, &mut store, prog);
    callgraph::build(&flow, &resolver, modset, &walk, &mut store, prog);
    typerel::extract(&resolver, &mut store, prog);
    metrics::compute(&ws, &walk, &mut store, prog);
    metrics::compute_fan_in_out(&mut store);

    add_meta_node(&mut store, modset);

    prog.log(format!(
        "Analysis complete: {} nodes, {} edges",
        store.nodes.len(),
        store.edges.len()
    ));

    Ok(Analysis { store, walk, flow })
}

fn add_meta_node(store: &mut GraphStore, modset: &ModuleSet) {
    let mut props = Props::new();
    props.insert("language".into(), "go".into());
    props.insert("version".into(), env!("CARGO_PKG_VERSION").into());
    props.insert("generator".into(), "gocpg".into());
    props.insert(
        "root".into(),
        modset.primary_dir().display().to_string().into(),
    );
    props.insert(
        "modules".into(),
        PropValue::Int(modset.modules().len() as i64),
    );
    store.add_node(Node {
        id: "META_DATA".to_string(),
        kind: NodeKind::MetaData,
        name: "CPG Metadata".to_string(),
        properties: props,
        ..Default::default()
    });
}
