//! Lightweight per-package symbol resolution.
//!
//! A pre-pass over every package's top-level declarations builds symbol
//! tables the later phases share: functions, methods, named types (with
//! struct fields and interface method sets), package-level variables, and
//! per-file imports. Node IDs are predicted here with the same position
//! scheme the walker uses, so a symbol's `node_id` and the walker-created
//! node coincide by construction.
//!
//! This is deliberately not a type checker. Everything downstream that
//! depends on a resolution (ref edges, dispatch classification, implements)
//! degrades to omission when a lookup fails.

use rustc_hash::FxHashMap;
use tree_sitter::Node;

use crate::ids::{base_name, func_id, stmt_id};
use crate::loader::{Package, Workspace};
use crate::syntax::{self, field, named_children, type_base, type_name};

/// One declared parameter or result slot.
#[derive(Debug, Clone)]
pub struct ParamDef {
    pub name: String,
    pub type_name: String,
    pub node_id: String,
    pub variadic: bool,
}

/// A top-level function or method declaration.
#[derive(Debug, Clone)]
pub struct FuncDef {
    pub name: String,
    /// Receiver as written (`*Manager`), empty for plain functions.
    pub recv: String,
    /// Receiver base type (`Manager`), empty for plain functions.
    pub recv_base: String,
    pub node_id: String,
    pub file: String,
    pub line: usize,
    pub col: usize,
    pub params: Vec<ParamDef>,
    pub results: Vec<ParamDef>,
    pub generic: bool,
}

impl FuncDef {
    /// Display name: `Run` or `*Manager.Run`.
    pub fn display_name(&self) -> String {
        if self.recv.is_empty() {
            self.name.clone()
        } else {
            format!("{}.{}", self.recv, self.name)
        }
    }

    /// Rendered signature for `type_info`.
    pub fn signature(&self) -> String {
        let params: Vec<String> = self
            .params
            .iter()
            .map(|p| {
                if p.variadic {
                    format!("...{}", p.type_name)
                } else {
                    p.type_name.clone()
                }
            })
            .collect();
        let results: Vec<String> = self.results.iter().map(|r| r.type_name.clone()).collect();
        match results.len() {
            0 => format!("func({})", params.join(", ")),
            1 => format!("func({}) {}", params.join(", "), results[0]),
            _ => format!("func({}) ({})", params.join(", "), results.join(", ")),
        }
    }
}

/// A struct field or embedded type.
#[derive(Debug, Clone)]
pub struct FieldDef {
    pub name: String,
    pub type_name: String,
    pub embedded: bool,
    pub node_id: String,
}

/// An interface method signature.
#[derive(Debug, Clone)]
pub struct MethodSig {
    pub name: String,
    pub node_id: String,
    pub num_params: usize,
    pub num_results: usize,
}

/// Shape of a named type declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeShape {
    Struct,
    Interface,
    Alias,
    Other,
}

impl TypeShape {
    pub fn as_str(self) -> &'static str {
        match self {
            TypeShape::Struct => "struct",
            TypeShape::Interface => "interface",
            TypeShape::Alias => "alias",
            TypeShape::Other => "alias",
        }
    }
}

/// A named type declaration.
#[derive(Debug, Clone)]
pub struct TypeDef {
    pub name: String,
    pub node_id: String,
    pub shape: TypeShape,
    pub generic: bool,
    pub fields: Vec<FieldDef>,
    pub iface_methods: Vec<MethodSig>,
    /// Rendered target for `type A = B` declarations.
    pub alias_target: Option<String>,
}

/// A package-level var or const.
#[derive(Debug, Clone)]
pub struct GlobalDef {
    pub name: String,
    pub node_id: String,
    pub type_name: String,
}

/// Symbol tables for one package.
#[derive(Default)]
pub struct PackageScope {
    pub rel_pkg: String,
    pub import_path: String,
    pub funcs: FxHashMap<String, FuncDef>,
    pub methods: Vec<FuncDef>,
    method_index: FxHashMap<(String, String), usize>,
    pub types: FxHashMap<String, TypeDef>,
    pub globals: FxHashMap<String, GlobalDef>,
}

impl PackageScope {
    /// Look up a method by receiver base type and name.
    pub fn method(&self, recv_base: &str, name: &str) -> Option<&FuncDef> {
        self.method_index
            .get(&(recv_base.to_string(), name.to_string()))
            .map(|&i| &self.methods[i])
    }

    /// All methods declared on a type (any receiver form).
    pub fn method_set(&self, type_name: &str) -> Vec<&FuncDef> {
        self.methods
            .iter()
            .filter(|m| m.recv_base == type_name)
            .collect()
    }
}

/// Resolution context across all loaded packages.
pub struct Resolver {
    scopes: FxHashMap<String, PackageScope>,
    rel_to_import: FxHashMap<String, String>,
    /// rel file → (alias → import path)
    imports: FxHashMap<String, FxHashMap<String, String>>,
}

impl Resolver {
    /// Build symbol tables for every package in the workspace.
    pub fn build(ws: &Workspace) -> Self {
        let mut scopes = FxHashMap::default();
        let mut rel_to_import = FxHashMap::default();
        let mut imports = FxHashMap::default();

        for pkg in &ws.packages {
            let scope = collect_package(pkg, &mut imports);
            rel_to_import.insert(pkg.rel_pkg.clone(), pkg.import_path.clone());
            scopes.insert(pkg.import_path.clone(), scope);
        }

        Self {
            scopes,
            rel_to_import,
            imports,
        }
    }

    pub fn scope(&self, import_path: &str) -> Option<&PackageScope> {
        self.scopes.get(import_path)
    }

    pub fn scope_by_rel(&self, rel_pkg: &str) -> Option<&PackageScope> {
        self.rel_to_import
            .get(rel_pkg)
            .and_then(|p| self.scopes.get(p))
    }

    /// Import table of a file: alias → import path.
    pub fn imports_of(&self, rel_file: &str) -> Option<&FxHashMap<String, String>> {
        self.imports.get(rel_file)
    }

    /// Resolve `alias.name` seen in `rel_file` to the target package scope,
    /// when the alias names a loaded package.
    pub fn qualified_scope(&self, rel_file: &str, alias: &str) -> Option<&PackageScope> {
        let path = self.imports.get(rel_file)?.get(alias)?;
        self.scopes.get(path)
    }

    /// The import path an alias refers to, loaded or not.
    pub fn import_target(&self, rel_file: &str, alias: &str) -> Option<&str> {
        self.imports
            .get(rel_file)?
            .get(alias)
            .map(String::as_str)
    }

    /// Iterate all package scopes in deterministic order.
    pub fn scopes_sorted(&self) -> Vec<&PackageScope> {
        let mut all: Vec<&PackageScope> = self.scopes.values().collect();
        all.sort_by(|a, b| a.import_path.cmp(&b.import_path));
        all
    }
}

fn collect_package(
    pkg: &Package,
    imports: &mut FxHashMap<String, FxHashMap<String, String>>,
) -> PackageScope {
    let mut scope = PackageScope {
        rel_pkg: pkg.rel_pkg.clone(),
        import_path: pkg.import_path.clone(),
        ..Default::default()
    };

    for file in &pkg.files {
        let src = &file.source;
        let base = base_name(&file.rel).to_string();
        let root = file.tree.root_node();

        let mut file_imports: FxHashMap<String, String> = FxHashMap::default();

        for decl in syntax::children(root) {
            match decl.kind() {
                "import_declaration" => collect_imports(src, decl, &mut file_imports),
                "function_declaration" => {
                    if let Some(def) = collect_func(src, decl, &pkg.rel_pkg, &file.rel, &base, "") {
                        scope.funcs.entry(def.name.clone()).or_insert(def);
                    }
                }
                "method_declaration" => {
                    let recv = receiver_type(src, decl).unwrap_or_default();
                    if recv.is_empty() {
                        continue;
                    }
                    if let Some(def) =
                        collect_func(src, decl, &pkg.rel_pkg, &file.rel, &base, &recv)
                    {
                        let key = (def.recv_base.clone(), def.name.clone());
                        if !scope.method_index.contains_key(&key) {
                            scope.method_index.insert(key, scope.methods.len());
                            scope.methods.push(def);
                        }
                    }
                }
                "type_declaration" => {
                    for spec in named_children(decl) {
                        if let Some(def) = collect_type(src, spec, &pkg.rel_pkg, &base) {
                            scope.types.entry(def.name.clone()).or_insert(def);
                        }
                    }
                }
                "var_declaration" | "const_declaration" => {
                    collect_globals(src, decl, &pkg.rel_pkg, &base, &mut scope.globals);
                }
                _ => {}
            }
        }

        imports.insert(file.rel.clone(), file_imports);
    }

    scope
}

fn collect_imports(src: &str, decl: Node, out: &mut FxHashMap<String, String>) {
    let mut specs: Vec<Node> = Vec::new();
    for child in syntax::children(decl) {
        match child.kind() {
            "import_spec" => specs.push(child),
            "import_spec_list" => specs.extend(
                syntax::children(child)
                    .into_iter()
                    .filter(|c| c.kind() == "import_spec"),
            ),
            _ => {}
        }
    }

    for spec in specs {
        let Some(path_node) = field(spec, "path") else {
            continue;
        };
        let path = syntax::text(src, path_node).trim_matches('"').to_string();
        let alias = match field(spec, "name") {
            Some(name) => syntax::text(src, name).to_string(),
            None => path.rsplit('/').next().unwrap_or(&path).to_string(),
        };
        if alias == "_" {
            continue;
        }
        out.insert(alias, path);
    }
}

/// Receiver type as written: `*Manager` or `Manager`.
pub fn receiver_type(src: &str, method_decl: Node) -> Option<String> {
    let recv = field(method_decl, "receiver")?;
    for param in named_children(recv) {
        if param.kind() != "parameter_declaration" {
            continue;
        }
        if let Some(ty) = field(param, "type") {
            return Some(type_name(src, ty));
        }
    }
    None
}

/// Receiver variable name, when the receiver is named.
pub fn receiver_name(src: &str, method_decl: Node) -> Option<String> {
    let recv = field(method_decl, "receiver")?;
    for param in named_children(recv) {
        if param.kind() != "parameter_declaration" {
            continue;
        }
        if let Some(name) = field(param, "name") {
            return Some(syntax::text(src, name).to_string());
        }
    }
    None
}

fn collect_func(
    src: &str,
    decl: Node,
    rel_pkg: &str,
    rel_file: &str,
    base: &str,
    recv: &str,
) -> Option<FuncDef> {
    let name_node = field(decl, "name")?;
    let name = syntax::text(src, name_node).to_string();
    let (line, col) = syntax::pos(decl);
    let recv_base = type_base(recv).to_string();
    let node_id = func_id(rel_pkg, recv, &name, base, line, col);

    let params = field(decl, "parameters")
        .map(|p| parse_params(src, p, rel_pkg, base, "parameter"))
        .unwrap_or_default();
    let results = field(decl, "result")
        .map(|r| parse_results(src, r, rel_pkg, base))
        .unwrap_or_default();
    let generic = field(decl, "type_parameters").is_some();

    Some(FuncDef {
        name,
        recv: recv.to_string(),
        recv_base,
        node_id,
        file: rel_file.to_string(),
        line,
        col,
        params,
        results,
        generic,
    })
}

/// Parse a `parameter_list` into ordered slots, one per name (unnamed
/// declarations contribute one slot).
pub fn parse_params(
    src: &str,
    list: Node,
    rel_pkg: &str,
    base: &str,
    kind: &str,
) -> Vec<ParamDef> {
    let mut out = Vec::new();
    for decl in named_children(list) {
        let variadic = decl.kind() == "variadic_parameter_declaration";
        if decl.kind() != "parameter_declaration" && !variadic {
            continue;
        }
        let ty = field(decl, "type")
            .map(|t| type_name(src, t))
            .unwrap_or_default();
        let names: Vec<Node> = syntax::children(decl)
            .into_iter()
            .filter(|c| c.kind() == "identifier")
            .collect();

        if names.is_empty() {
            let (line, col) = syntax::pos(decl);
            out.push(ParamDef {
                name: ty.clone(),
                type_name: ty.clone(),
                node_id: stmt_id(rel_pkg, base, line, col, kind),
                variadic,
            });
        } else {
            for name in names {
                let (line, col) = syntax::pos(name);
                out.push(ParamDef {
                    name: syntax::text(src, name).to_string(),
                    type_name: ty.clone(),
                    node_id: stmt_id(rel_pkg, base, line, col, kind),
                    variadic,
                });
            }
        }
    }
    out
}

/// Parse a function result: either a bare type or a parameter list.
pub fn parse_results(src: &str, result: Node, rel_pkg: &str, base: &str) -> Vec<ParamDef> {
    if result.kind() == "parameter_list" {
        parse_params(src, result, rel_pkg, base, "result")
    } else {
        let (line, col) = syntax::pos(result);
        let ty = type_name(src, result);
        vec![ParamDef {
            name: ty.clone(),
            type_name: ty,
            node_id: stmt_id(rel_pkg, base, line, col, "result"),
            variadic: false,
        }]
    }
}

fn collect_type(src: &str, spec: Node, rel_pkg: &str, base: &str) -> Option<TypeDef> {
    let is_alias = spec.kind() == "type_alias";
    if spec.kind() != "type_spec" && !is_alias {
        return None;
    }
    let name_node = field(spec, "name")?;
    let name = syntax::text(src, name_node).to_string();
    let (line, col) = syntax::pos(spec);
    let node_id = stmt_id(rel_pkg, base, line, col, "type_decl");
    let generic = field(spec, "type_parameters").is_some();

    let ty = field(spec, "type");
    let (shape, alias_target) = match ty.map(|t| t.kind()) {
        _ if is_alias => (
            TypeShape::Alias,
            ty.map(|t| type_name(src, t)),
        ),
        Some("struct_type") => (TypeShape::Struct, None),
        Some("interface_type") => (TypeShape::Interface, None),
        Some(_) => (TypeShape::Other, ty.map(|t| type_name(src, t))),
        None => (TypeShape::Other, None),
    };

    let mut fields = Vec::new();
    let mut iface_methods = Vec::new();
    if let Some(ty) = ty {
        match shape {
            TypeShape::Struct => collect_struct_fields(src, ty, rel_pkg, base, &mut fields),
            TypeShape::Interface => {
                collect_interface_methods(src, ty, rel_pkg, base, &mut iface_methods)
            }
            _ => {}
        }
    }

    Some(TypeDef {
        name,
        node_id,
        shape,
        generic,
        fields,
        iface_methods,
        alias_target,
    })
}

fn collect_struct_fields(
    src: &str,
    struct_ty: Node,
    rel_pkg: &str,
    base: &str,
    out: &mut Vec<FieldDef>,
) {
    let Some(list) = syntax::child_of_kind(struct_ty, "field_declaration_list") else {
        return;
    };
    for decl in named_children(list) {
        if decl.kind() != "field_declaration" {
            continue;
        }
        let (line, col) = syntax::pos(decl);
        let node_id = stmt_id(rel_pkg, base, line, col, "field");
        let names: Vec<Node> = syntax::children(decl)
            .into_iter()
            .filter(|c| c.kind() == "field_identifier")
            .collect();
        let ty = field(decl, "type").map(|t| type_name(src, t));

        if names.is_empty() {
            // Embedded field: the type itself is the name.
            let type_str = ty.unwrap_or_else(|| syntax::text(src, decl).to_string());
            out.push(FieldDef {
                name: type_base(&type_str).to_string(),
                type_name: type_str,
                embedded: true,
                node_id,
            });
        } else {
            let type_str = ty.unwrap_or_default();
            // One field node per declaration line, named after the first
            // identifier; additional names share the declared type.
            out.push(FieldDef {
                name: syntax::text(src, names[0]).to_string(),
                type_name: type_str,
                embedded: false,
                node_id,
            });
        }
    }
}

fn collect_interface_methods(
    src: &str,
    iface_ty: Node,
    rel_pkg: &str,
    base: &str,
    out: &mut Vec<MethodSig>,
) {
    for elem in named_children(iface_ty) {
        // Grammar versions name this node differently.
        if elem.kind() != "method_elem" && elem.kind() != "method_spec" {
            continue;
        }
        let Some(name_node) = field(elem, "name") else {
            continue;
        };
        let (line, col) = syntax::pos(elem);
        let num_params = field(elem, "parameters")
            .map(|p| count_param_slots(p))
            .unwrap_or(0);
        let num_results = field(elem, "result")
            .map(|r| {
                if r.kind() == "parameter_list" {
                    count_param_slots(r)
                } else {
                    1
                }
            })
            .unwrap_or(0);
        out.push(MethodSig {
            name: syntax::text(src, name_node).to_string(),
            node_id: stmt_id(rel_pkg, base, line, col, "field"),
            num_params,
            num_results,
        });
    }
}

/// Number of parameter slots in a parameter list (one per name, one per
/// unnamed declaration).
pub fn count_param_slots(list: Node) -> usize {
    let mut n = 0;
    for decl in named_children(list) {
        if decl.kind() != "parameter_declaration"
            && decl.kind() != "variadic_parameter_declaration"
        {
            continue;
        }
        let names = syntax::children(decl)
            .into_iter()
            .filter(|c| c.kind() == "identifier")
            .count();
        n += names.max(1);
    }
    n
}

fn collect_globals(
    src: &str,
    decl: Node,
    rel_pkg: &str,
    base: &str,
    out: &mut FxHashMap<String, GlobalDef>,
) {
    let mut specs: Vec<Node> = Vec::new();
    for child in syntax::children(decl) {
        match child.kind() {
            "var_spec" | "const_spec" => specs.push(child),
            "var_spec_list" | "const_spec_list" => specs.extend(
                syntax::children(child)
                    .into_iter()
                    .filter(|c| c.kind() == "var_spec" || c.kind() == "const_spec"),
            ),
            _ => {}
        }
    }

    for spec in specs {
        let ty = field(spec, "type").map(|t| type_name(src, t));
        for name in syntax::children(spec)
            .into_iter()
            .filter(|c| c.kind() == "identifier")
        {
            let name_str = syntax::text(src, name);
            if name_str == "_" {
                continue;
            }
            let (line, col) = syntax::pos(name);
            out.entry(name_str.to_string()).or_insert(GlobalDef {
                name: name_str.to_string(),
                node_id: stmt_id(rel_pkg, base, line, col, "local"),
                type_name: ty.clone().unwrap_or_default(),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::{Package, SourceFile, Workspace};
    use std::path::PathBuf;

    fn workspace(src: &str) -> Workspace {
        let mut parser = syntax::go_parser().unwrap();
        let tree = syntax::parse(&mut parser, src, "scrape/loop.go").unwrap();
        Workspace {
            packages: vec![Package {
                import_path: "github.com/example/server/scrape".into(),
                rel_pkg: "scrape".into(),
                name: "scrape".into(),
                files: vec![SourceFile {
                    abs: PathBuf::from("/w/scrape/loop.go"),
                    rel: "scrape/loop.go".into(),
                    source: src.into(),
                    tree,
                }],
            }],
        }
    }

    const SRC: &str = r#"package scrape

import (
	"context"
	fancy "net/http"
)

type Runner interface {
	Run(ctx context.Context) error
}

type Loop struct {
	Target string
	Client *fancy.Client
}

func (l *Loop) Run(ctx context.Context) error { return nil }

func NewLoop(target string) (*Loop, error) { return nil, nil }

var defaultTimeout = 10
"#;

    #[test]
    fn collects_funcs_methods_types_and_globals() {
        let ws = workspace(SRC);
        let r = Resolver::build(&ws);
        let scope = r.scope("github.com/example/server/scrape").unwrap();

        let f = scope.funcs.get("NewLoop").unwrap();
        assert_eq!(f.params.len(), 1);
        assert_eq!(f.results.len(), 2);
        assert_eq!(f.results[0].type_name, "*Loop");

        let m = scope.method("Loop", "Run").unwrap();
        assert_eq!(m.recv, "*Loop");
        assert_eq!(m.display_name(), "*Loop.Run");
        assert_eq!(m.signature(), "func(context.Context) error");

        let iface = scope.types.get("Runner").unwrap();
        assert_eq!(iface.shape, TypeShape::Interface);
        assert_eq!(iface.iface_methods.len(), 1);
        assert_eq!(iface.iface_methods[0].name, "Run");

        let st = scope.types.get("Loop").unwrap();
        assert_eq!(st.shape, TypeShape::Struct);
        assert_eq!(st.fields.len(), 2);
        assert!(!st.fields[0].embedded);

        assert!(scope.globals.contains_key("defaultTimeout"));
    }

    #[test]
    fn resolves_import_aliases() {
        let ws = workspace(SRC);
        let r = Resolver::build(&ws);
        assert_eq!(
            r.import_target("scrape/loop.go", "fancy"),
            Some("net/http")
        );
        assert_eq!(
            r.import_target("scrape/loop.go", "context"),
            Some("context")
        );
        assert_eq!(r.import_target("scrape/loop.go", "missing"), None);
    }
}
