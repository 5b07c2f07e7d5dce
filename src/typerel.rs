//! Type relationship extraction: implements, satisfies_method, embeds,
//! and alias_of edges over the syntactic method sets of the loaded
//! packages.
//!
//! A concrete type implements an interface when every interface method has
//! a matching method (same name, same parameter and result arity) in the
//! type's declared method set; value and pointer receivers both count.
//! The interface-dispatch resolution of the call-graph builder reuses the
//! same predicate through [`dynamic_targets`].

use crate::graph::{Edge, EdgeKind, GraphStore};
use crate::progress::Progress;
use crate::resolve::{FuncDef, MethodSig, PackageScope, Resolver, TypeDef, TypeShape};
use crate::syntax::type_base;

/// Emit implements / satisfies_method / embeds / alias_of edges.
pub fn extract(resolver: &Resolver, store: &mut GraphStore, prog: &Progress) {
    prog.log("Extracting type relationships...");

    let scopes = resolver.scopes_sorted();
    let mut implements = 0usize;
    let mut satisfies = 0usize;
    let mut embeds = 0usize;
    let mut aliases = 0usize;

    // Collect (scope, type) partitions once.
    let mut interfaces: Vec<(&PackageScope, &TypeDef)> = Vec::new();
    let mut concretes: Vec<(&PackageScope, &TypeDef)> = Vec::new();
    for scope in &scopes {
        let mut types: Vec<&TypeDef> = scope.types.values().collect();
        types.sort_by(|a, b| a.name.cmp(&b.name));
        for ty in types {
            match ty.shape {
                TypeShape::Interface => interfaces.push((scope, ty)),
                TypeShape::Alias => {
                    if let Some(target) = &ty.alias_target {
                        if let Some(target_id) = resolve_type_ref(resolver, scope, target) {
                            store.add_edge(Edge::plain(
                                ty.node_id.clone(),
                                target_id,
                                EdgeKind::AliasOf,
                            ));
                            aliases += 1;
                        }
                    }
                }
                TypeShape::Other => concretes.push((scope, ty)),
                TypeShape::Struct => concretes.push((scope, ty)),
            }
        }
    }

    for (c_scope, concrete) in &concretes {
        for (_, iface) in &interfaces {
            if iface.iface_methods.is_empty() {
                continue; // empty interfaces are satisfied vacuously
            }
            if !type_implements(c_scope, &concrete.name, iface) {
                continue;
            }
            store.add_edge(Edge::plain(
                concrete.node_id.clone(),
                iface.node_id.clone(),
                EdgeKind::Implements,
            ));
            implements += 1;
            satisfies += emit_satisfies_method(c_scope, &concrete.name, iface, store);
        }

        // Embedded fields: struct → embedded type declaration.
        for field in &concrete.fields {
            if !field.embedded {
                continue;
            }
            if let Some(target_id) = resolve_type_ref(resolver, c_scope, &field.type_name) {
                if target_id != concrete.node_id {
                    store.add_edge(Edge::plain(
                        concrete.node_id.clone(),
                        target_id,
                        EdgeKind::Embeds,
                    ));
                    embeds += 1;
                }
            }
        }
    }

    prog.log(format!(
        "Created {implements} implements, {embeds} embeds, {aliases} alias_of, {satisfies} satisfies_method edges"
    ));
}

/// True when every interface method has a matching declared method on the
/// type (any receiver form).
pub fn type_implements(scope: &PackageScope, type_name: &str, iface: &TypeDef) -> bool {
    iface
        .iface_methods
        .iter()
        .all(|m| scope.method(type_name, &m.name).is_some_and(|f| method_matches(m, f)))
}

/// Arity-level signature match between an interface method and a declared
/// method.
pub fn method_matches(sig: &MethodSig, f: &FuncDef) -> bool {
    sig.name == f.name && sig.num_params == f.params.len() && sig.num_results == f.results.len()
}

/// Connect each interface method to the concrete method satisfying it.
/// The value-receiver set is preferred when it already covers the whole
/// interface, so value methods are not double-reported through the pointer
/// set.
fn emit_satisfies_method(
    scope: &PackageScope,
    type_name: &str,
    iface: &TypeDef,
    store: &mut GraphStore,
) -> usize {
    let value_set_covers = iface.iface_methods.iter().all(|m| {
        scope
            .method(type_name, &m.name)
            .is_some_and(|f| !f.recv.starts_with('*') && method_matches(m, f))
    });

    let mut count = 0;
    for m in &iface.iface_methods {
        let Some(f) = scope.method(type_name, &m.name) else {
            continue;
        };
        if !method_matches(m, f) {
            continue;
        }
        if value_set_covers && f.recv.starts_with('*') {
            continue;
        }
        store.add_edge(Edge::plain(
            f.node_id.clone(),
            m.node_id.clone(),
            EdgeKind::SatisfiesMethod,
        ));
        count += 1;
    }
    count
}

/// Concrete methods that an interface method call can dispatch to: for
/// every loaded type implementing the interface, its method of that name.
pub fn dynamic_targets<'r>(
    resolver: &'r Resolver,
    iface: &TypeDef,
    method: &str,
) -> Vec<&'r FuncDef> {
    let mut out = Vec::new();
    for scope in resolver.scopes_sorted() {
        let mut types: Vec<&TypeDef> = scope.types.values().collect();
        types.sort_by(|a, b| a.name.cmp(&b.name));
        for ty in types {
            if matches!(ty.shape, TypeShape::Interface | TypeShape::Alias) {
                continue;
            }
            if !type_implements(scope, &ty.name, iface) {
                continue;
            }
            if let Some(f) = scope.method(&ty.name, method) {
                out.push(f);
            }
        }
    }
    out
}

/// Resolve a (possibly qualified, possibly pointer) type reference seen in
/// `scope` to the node ID of its declaration.
///
/// Qualified references use the default-alias convention: `pkg.T` resolves
/// against the loaded package whose import path ends in `pkg`.
pub fn resolve_type_ref(
    resolver: &Resolver,
    scope: &PackageScope,
    type_ref: &str,
) -> Option<String> {
    let base = type_base(type_ref);
    if let Some((alias, name)) = base.split_once('.') {
        for candidate in resolver.scopes_sorted() {
            let path = &candidate.import_path;
            if path == alias || path.ends_with(&format!("/{alias}")) {
                if let Some(ty) = candidate.types.get(name) {
                    return Some(ty.node_id.clone());
                }
            }
        }
        return None;
    }
    scope.types.get(base).map(|t| t.node_id.clone())
}
