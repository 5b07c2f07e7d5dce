//! Variable-type-analysis style call target resolution.
//!
//! The flow IR already collapses local variables to their defining values,
//! so the type-propagation half of VTA reduces to chasing value origins:
//! function values resolve through closure constructors and function
//! references, interface receivers resolve through the implements relation
//! to every concrete method that can satisfy the dispatch.

use rustc_hash::FxHashMap;

use crate::flow::ir::{Callee, FlowFunc, FlowProgram, ValueKind};
use crate::ids;
use crate::moduleset::ModuleSet;
use crate::resolve::{FuncDef, Resolver, TypeDef, TypeShape};
use crate::syntax::type_base;
use crate::typerel;

/// One resolved call target.
pub struct Target {
    /// Callee node ID: an in-scope function node or an `ext::` stub.
    pub node_id: String,
    /// True for interface dispatch.
    pub dynamic: bool,
    /// Declared signature of an in-scope callee (for param_in/param_out).
    pub def: Option<FuncDef>,
    /// Stub description for external callees, None when in-scope.
    pub stub: Option<Stub>,
}

/// A synthetic external callee.
pub struct Stub {
    pub qualified: String,
    pub pkg_path: String,
    pub name: String,
    pub type_info: String,
}

/// Catalogue of declared functions keyed by node ID, for signature lookup.
pub struct FuncCatalog {
    by_id: FxHashMap<String, FuncDef>,
}

impl FuncCatalog {
    pub fn build(resolver: &Resolver) -> Self {
        let mut by_id = FxHashMap::default();
        for scope in resolver.scopes_sorted() {
            for f in scope.funcs.values() {
                by_id.insert(f.node_id.clone(), f.clone());
            }
            for m in &scope.methods {
                by_id.insert(m.node_id.clone(), m.clone());
            }
        }
        Self { by_id }
    }

    pub fn get(&self, node_id: &str) -> Option<&FuncDef> {
        self.by_id.get(node_id)
    }
}

/// Resolve a call instruction's callee to its possible targets.
///
/// In-scope callees that cannot be resolved to a declaration (filtered
/// files, failed lookups) produce no target at all rather than a stub:
/// `ext::` must never name an in-scope module path.
pub fn resolve_targets(
    callee: &Callee,
    func: &FlowFunc,
    program: &FlowProgram,
    resolver: &Resolver,
    catalog: &FuncCatalog,
    modset: &ModuleSet,
) -> Vec<Target> {
    match callee {
        Callee::Known { node_id } => vec![Target {
            node_id: node_id.clone(),
            dynamic: false,
            def: catalog.get(node_id).cloned(),
            stub: None,
        }],
        Callee::External { pkg_path, name } => {
            if modset.is_known_pkg(pkg_path) {
                // In-scope module but unresolved (e.g. a filtered file):
                // skip rather than fabricate a stub.
                return Vec::new();
            }
            let qualified = format!("{pkg_path}.{name}");
            vec![Target {
                node_id: ids::ext_id(&qualified),
                dynamic: false,
                def: None,
                stub: Some(Stub {
                    qualified,
                    pkg_path: pkg_path.clone(),
                    name: name.clone(),
                    type_info: String::new(),
                }),
            }]
        }
        Callee::Builtin(_) | Callee::Unknown => Vec::new(),
        Callee::Value(v) => chase_value(*v, func, program, catalog),
        Callee::Method {
            recv_type, name, ..
        } => resolve_method(recv_type, name, func, resolver, modset),
    }
}

/// Chase a function-typed value to its origin.
fn chase_value(
    value: usize,
    func: &FlowFunc,
    program: &FlowProgram,
    catalog: &FuncCatalog,
) -> Vec<Target> {
    match &func.values[value].kind {
        ValueKind::MakeClosure { func: child } => {
            let node_id = program.funcs[*child].node_id.clone();
            vec![Target {
                node_id,
                dynamic: false,
                def: None,
                stub: None,
            }]
        }
        ValueKind::FuncRef { node_id } => vec![Target {
            node_id: node_id.clone(),
            dynamic: false,
            def: catalog.get(node_id).cloned(),
            stub: None,
        }],
        _ => Vec::new(),
    }
}

/// Resolve a method call through the receiver's type: concrete in-scope
/// receivers bind statically; interface receivers fan out to every
/// implementing method; external receivers produce one stub.
fn resolve_method(
    recv_type: &str,
    method: &str,
    func: &FlowFunc,
    resolver: &Resolver,
    modset: &ModuleSet,
) -> Vec<Target> {
    if recv_type.is_empty() {
        return Vec::new();
    }
    let base = type_base(recv_type);

    // Qualified receiver type: `alias.Type`.
    if let Some((alias, type_name)) = base.split_once('.') {
        if let Some(scope) = resolver.qualified_scope(&func.rel_file, alias) {
            return resolve_in_scope(scope, type_name, method, resolver);
        }
        if let Some(path) = resolver.import_target(&func.rel_file, alias) {
            if modset.is_known_pkg(path) {
                return Vec::new();
            }
            let pointer = recv_type.starts_with('*');
            let qualified = if pointer {
                format!("(*{path}.{type_name}).{method}")
            } else {
                format!("({path}.{type_name}).{method}")
            };
            return vec![Target {
                node_id: ids::ext_id(&qualified),
                dynamic: false,
                def: None,
                stub: Some(Stub {
                    qualified,
                    pkg_path: path.to_string(),
                    name: format!("{type_name}.{method}"),
                    type_info: String::new(),
                }),
            }];
        }
        return Vec::new();
    }

    let Some(scope) = resolver.scope_by_rel(&func.rel_pkg) else {
        return Vec::new();
    };
    resolve_in_scope(scope, base, method, resolver)
}

fn resolve_in_scope(
    scope: &crate::resolve::PackageScope,
    type_name: &str,
    method: &str,
    resolver: &Resolver,
) -> Vec<Target> {
    let Some(ty) = scope.types.get(type_name) else {
        // Unknown receiver type in an in-scope package: skip.
        return Vec::new();
    };

    if is_interface(ty) {
        return typerel::dynamic_targets(resolver, ty, method)
            .into_iter()
            .map(|f| Target {
                node_id: f.node_id.clone(),
                dynamic: true,
                def: Some(f.clone()),
                stub: None,
            })
            .collect();
    }

    scope
        .method(type_name, method)
        .map(|f| Target {
            node_id: f.node_id.clone(),
            dynamic: false,
            def: Some(f.clone()),
            stub: None,
        })
        .into_iter()
        .collect()
}

fn is_interface(ty: &TypeDef) -> bool {
    ty.shape == TypeShape::Interface
}
