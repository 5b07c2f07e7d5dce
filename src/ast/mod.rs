//! AST extraction: structural nodes, containment edges, lexical scope,
//! references, docs, and per-node properties.
//!
//! The walk is a pre-order traversal with an explicit parent stack; every
//! producing variant either creates a node, emits the `ast` edge from the
//! current parent, and drives its children itself, or falls through to the
//! generic recursion. After all packages are walked, a second pass emits
//! `has_method` edges from the fully-populated definition index.

mod walker;

use crate::graph::{Edge, EdgeKind, GraphStore, Node, NodeKind, PropValue, Props};
use crate::ids::{self, DefinitionIndex, FunctionIndex, PositionIndex};
use crate::loader::Workspace;
use crate::moduleset::ModuleSet;
use crate::progress::Progress;
use crate::resolve::Resolver;
use crate::syntax;

pub use walker::Walker;

/// Indices produced by the walk, consumed by the flow and call-graph phases.
pub struct WalkOutput {
    pub positions: PositionIndex,
    pub functions: FunctionIndex,
    pub definitions: DefinitionIndex,
}

/// Walk the AST of every loaded package, producing nodes and AST edges.
pub fn walk(
    ws: &Workspace,
    modset: &ModuleSet,
    resolver: &Resolver,
    store: &mut GraphStore,
    prog: &Progress,
) -> WalkOutput {
    prog.log("Walking AST...");

    let mut positions = PositionIndex::new();
    let mut functions = FunctionIndex::new();
    let mut definitions = DefinitionIndex::new();

    let nodes_before = store.nodes.len();
    let edges_before = store.edges.len();

    for pkg in &ws.packages {
        let pkg_node_id = ids::pkg_id(&pkg.rel_pkg);
        store.add_node(Node {
            id: pkg_node_id.clone(),
            kind: NodeKind::Package,
            name: pkg.name.clone(),
            package: pkg.rel_pkg.clone(),
            ..Default::default()
        });

        // Import edges between in-scope packages.
        for file in &pkg.files {
            let Some(imports) = resolver.imports_of(&file.rel) else {
                continue;
            };
            let mut targets: Vec<&String> = imports.values().collect();
            targets.sort();
            for path in targets {
                if modset.is_known_pkg(path) {
                    store.add_edge(Edge::plain(
                        pkg_node_id.clone(),
                        ids::pkg_id(&modset.rel_pkg(path)),
                        EdgeKind::Imports,
                    ));
                }
            }
        }

        let mut init_ids: Vec<String> = Vec::new();

        for file in &pkg.files {
            let file_node_id = ids::file_id(&file.rel);
            let root = file.tree.root_node();
            let loc = syntax::end_line(root);

            let mut props = Props::new();
            props.insert("loc".into(), PropValue::Int(loc as i64));
            if file.rel.ends_with(".pb.go") || file.rel.ends_with("_generated.go") {
                props.insert("is_generated".into(), true.into());
            }
            if let Some(tags) = build_tags(&file.source) {
                props.insert("build_tags".into(), tags.into());
            }

            store.add_node(Node {
                id: file_node_id.clone(),
                kind: NodeKind::File,
                name: ids::base_name(&file.rel).to_string(),
                file: file.rel.clone(),
                end_line: loc,
                package: pkg.rel_pkg.clone(),
                properties: props,
                ..Default::default()
            });
            store.add_edge(Edge::plain(
                pkg_node_id.clone(),
                file_node_id.clone(),
                EdgeKind::Ast,
            ));
            store.add_source(&file.rel, file.source.clone());

            let mut walker = Walker::new(
                &file.source,
                &pkg.rel_pkg,
                &file.rel,
                file_node_id,
                resolver,
                store,
                &mut positions,
                &mut functions,
                &mut definitions,
                &mut init_ids,
            );
            walker.walk_file(root);
        }

        // Chain init() functions within this package in source order.
        for i in 1..init_ids.len() {
            store.add_edge(Edge::with_prop(
                init_ids[i - 1].clone(),
                init_ids[i].clone(),
                EdgeKind::InitOrder,
                "order",
                i,
            ));
        }
    }

    let hm = emit_has_method(resolver, store);

    prog.log(format!(
        "Created {} nodes, {} edges, {} has_method edges",
        store.nodes.len() - nodes_before,
        store.edges.len() - edges_before - hm,
        hm
    ));

    WalkOutput {
        positions,
        functions,
        definitions,
    }
}

/// Emit `has_method` edges from every named type to its direct methods.
/// Runs after all packages are walked so the tables are fully populated.
fn emit_has_method(resolver: &Resolver, store: &mut GraphStore) -> usize {
    let mut count = 0;
    for scope in resolver.scopes_sorted() {
        let mut types: Vec<_> = scope.types.values().collect();
        types.sort_by(|a, b| a.name.cmp(&b.name));
        for ty in types {
            for method in scope.method_set(&ty.name) {
                let before = store.edges.len();
                store.add_edge(Edge::plain(
                    ty.node_id.clone(),
                    method.node_id.clone(),
                    EdgeKind::HasMethod,
                ));
                if store.edges.len() > before {
                    count += 1;
                }
            }
        }
    }
    count
}

/// Extract build-tag constraints from the leading comments of a file.
fn build_tags(source: &str) -> Option<String> {
    for line in source.lines() {
        let trimmed = line.trim();
        if let Some(tags) = trimmed.strip_prefix("//go:build ") {
            return Some(tags.to_string());
        }
        if let Some(tags) = trimmed.strip_prefix("// +build ") {
            return Some(tags.to_string());
        }
        if !trimmed.is_empty() && !trimmed.starts_with("//") {
            break;
        }
    }
    None
}
