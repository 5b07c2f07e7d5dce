//! Deterministic node identity and position indices.
//!
//! IDs are pure string constructions keyed by source position so the same
//! entity is recovered from the AST walker, the flow extractor, and the
//! resolver. The three indices are intentionally first-wins: flow-derived
//! positions must resolve to the outermost statement-level node even when
//! nested expressions share a source location.

use rustc_hash::FxHashMap;

/// Generate a deterministic ID for a function or method.
/// `recv` is empty for plain functions.
pub fn func_id(pkg: &str, recv: &str, name: &str, file: &str, line: usize, col: usize) -> String {
    if recv.is_empty() {
        format!("{pkg}::{name}@{file}:{line}:{col}")
    } else {
        format!("{pkg}::{recv}.{name}@{file}:{line}:{col}")
    }
}

/// Generate a deterministic ID for a statement-level AST node.
pub fn stmt_id(pkg: &str, file: &str, line: usize, col: usize, kind: &str) -> String {
    format!("{pkg}::@{file}:{line}:{col}:{kind}")
}

/// Node ID for a package (already module-relative).
pub fn pkg_id(rel_pkg: &str) -> String {
    format!("pkg::{rel_pkg}")
}

/// Node ID for a source file (module-relative path).
pub fn file_id(rel_file: &str) -> String {
    format!("file::{rel_file}")
}

/// Node ID for a flow basic block.
pub fn block_id(func_id: &str, index: usize) -> String {
    format!("{func_id}::bb{index}")
}

/// Node ID for an external stub function.
pub fn ext_id(qualified: &str) -> String {
    format!("ext::{qualified}")
}

/// Extract the filename without directory from a path.
pub fn base_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

/// Maps `(file, line, col)` to node IDs, enabling flow→AST position mapping.
///
/// First-wins: once a position is mapped, later registrations are ignored.
/// This preserves the statement-level node that flow instructions reference.
#[derive(Default)]
pub struct PositionIndex {
    map: FxHashMap<(String, u32, u32), String>,
}

impl PositionIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, file: &str, line: usize, col: usize, id: &str) {
        self.map
            .entry((file.to_string(), line as u32, col as u32))
            .or_insert_with(|| id.to_string());
    }

    pub fn get(&self, file: &str, line: usize, col: usize) -> Option<&str> {
        self.map
            .get(&(file.to_string(), line as u32, col as u32))
            .map(String::as_str)
    }
}

/// Position lookup restricted to function definitions.
///
/// Functions register two positions: the `func` keyword (AST viewpoint) and
/// the name identifier (resolver viewpoint), so both resolve to the same ID.
#[derive(Default)]
pub struct FunctionIndex {
    map: FxHashMap<(String, u32, u32), String>,
}

impl FunctionIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, file: &str, line: usize, col: usize, id: &str) {
        self.map
            .entry((file.to_string(), line as u32, col as u32))
            .or_insert_with(|| id.to_string());
    }

    pub fn get(&self, file: &str, line: usize, col: usize) -> Option<&str> {
        self.map
            .get(&(file.to_string(), line as u32, col as u32))
            .map(String::as_str)
    }
}

/// Identity of a declared object, used to resolve references to their
/// declaration nodes across files of the same analysis run.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DefKey {
    /// Package-level function: (rel_pkg, name).
    Func(String, String),
    /// Method: (rel_pkg, receiver base type, name).
    Method(String, String, String),
    /// Named type: (rel_pkg, name).
    Type(String, String),
    /// Struct field or interface method: (rel_pkg, owner type, name).
    Field(String, String, String),
    /// Package-level var or const: (rel_pkg, name).
    Global(String, String),
    /// Statement label: (function node id, label name).
    Label(String, String),
}

/// Maps declaration objects to node IDs for reference resolution
/// (ref, branch_target, has_method, eval_type).
#[derive(Default)]
pub struct DefinitionIndex {
    map: FxHashMap<DefKey, String>,
}

impl DefinitionIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, key: DefKey, id: &str) {
        self.map.entry(key).or_insert_with(|| id.to_string());
    }

    pub fn get(&self, key: &DefKey) -> Option<&str> {
        self.map.get(key).map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_formats() {
        assert_eq!(
            func_id("scrape", "", "run", "loop.go", 14, 1),
            "scrape::run@loop.go:14:1"
        );
        assert_eq!(
            func_id("scrape", "*Manager", "Run", "manager.go", 142, 1),
            "scrape::*Manager.Run@manager.go:142:1"
        );
        assert_eq!(
            stmt_id("scrape", "loop.go", 20, 8, "call"),
            "scrape::@loop.go:20:8:call"
        );
        assert_eq!(pkg_id("scrape"), "pkg::scrape");
        assert_eq!(file_id("scrape/loop.go"), "file::scrape/loop.go");
        assert_eq!(block_id("scrape::run@loop.go:14:1", 2), "scrape::run@loop.go:14:1::bb2");
        assert_eq!(base_name("scrape/loop.go"), "loop.go");
        assert_eq!(base_name("loop.go"), "loop.go");
    }

    #[test]
    fn position_index_is_first_wins() {
        let mut idx = PositionIndex::new();
        idx.set("a.go", 3, 5, "outer");
        idx.set("a.go", 3, 5, "inner");
        assert_eq!(idx.get("a.go", 3, 5), Some("outer"));
        assert_eq!(idx.get("a.go", 3, 6), None);
    }

    #[test]
    fn definition_index_resolves_by_key() {
        let mut idx = DefinitionIndex::new();
        let key = DefKey::Method("scrape".into(), "*Manager".into(), "Run".into());
        idx.set(key.clone(), "id1");
        idx.set(key.clone(), "id2");
        assert_eq!(idx.get(&key), Some("id1"));
    }
}
