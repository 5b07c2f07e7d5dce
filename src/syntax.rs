//! Tree-sitter helpers for Go syntax.
//!
//! Thin utilities shared by the loader, the resolver, the AST walker, and
//! the flow lowering: parser construction, 1-based positions, node text,
//! token location, doc-comment adjacency, and human-readable type
//! rendering. Everything here is pure syntax; no resolution happens.

use tree_sitter::{Node, Parser, Tree};

use crate::error::{CpgError, Result};

/// Construct a parser configured for the Go grammar.
pub fn go_parser() -> Result<Parser> {
    let mut parser = Parser::new();
    parser
        .set_language(&tree_sitter_go::LANGUAGE.into())
        .map_err(|e| CpgError::TreeSitter(e.to_string()))?;
    Ok(parser)
}

/// Parse a Go source buffer. Tree-sitter is error-tolerant, so a tree is
/// produced even for files with syntax errors; `None` only on internal
/// failure (timeout/cancellation, which we never set).
pub fn parse(parser: &mut Parser, source: &str, file: &str) -> Result<Tree> {
    parser.parse(source, None).ok_or_else(|| CpgError::Parse {
        file: file.to_string(),
        message: "tree-sitter returned no tree".to_string(),
    })
}

/// 1-based (line, col) of a node's start.
#[inline]
pub fn pos(node: Node) -> (usize, usize) {
    let p = node.start_position();
    (p.row + 1, p.column + 1)
}

/// 1-based line of a node's end.
#[inline]
pub fn end_line(node: Node) -> usize {
    node.end_position().row + 1
}

/// Decode a node's source text, replacing invalid UTF-8 with nothing.
#[inline]
pub fn text<'a>(source: &'a str, node: Node) -> &'a str {
    source.get(node.start_byte()..node.end_byte()).unwrap_or("")
}

/// Find a child node by field name.
#[inline]
pub fn field<'a>(node: Node<'a>, name: &str) -> Option<Node<'a>> {
    node.child_by_field_name(name)
}

/// Find the first child of the given kind (tokens included).
pub fn child_of_kind<'a>(node: Node<'a>, kind: &str) -> Option<Node<'a>> {
    let mut cursor = node.walk();
    let found = node.children(&mut cursor).find(|c| c.kind() == kind);
    found
}

/// Named children of a node, collected.
pub fn named_children(node: Node<'_>) -> Vec<Node<'_>> {
    let mut cursor = node.walk();
    node.named_children(&mut cursor).collect()
}

/// All children of a node (tokens included), collected.
pub fn children(node: Node<'_>) -> Vec<Node<'_>> {
    let mut cursor = node.walk();
    node.children(&mut cursor).collect()
}

/// Truncate a snippet to `max_len` characters, appending an ellipsis.
pub fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        return s.to_string();
    }
    let cut: String = s.chars().take(max_len).collect();
    format!("{cut}...")
}

/// Source snippet for a byte range, truncated.
pub fn snippet(source: &str, start: usize, end: usize, max_len: usize) -> String {
    let Some(s) = source.get(start..end) else {
        return String::new();
    };
    truncate(s, max_len)
}

/// Collect the doc comment group immediately preceding a declaration.
///
/// Go doc comments are `//` lines directly above the declaration with no
/// blank line in between. Returns the first comment node of the group, so
/// the caller can address the comment node the walker created for it.
pub fn doc_comment_start<'a>(node: Node<'a>) -> Option<Node<'a>> {
    let parent = node.parent()?;
    let mut expected_row = node.start_position().row;
    let mut first: Option<Node> = None;

    let kids = children(parent);
    let my_index = kids.iter().position(|k| k.id() == node.id())?;
    for sibling in kids[..my_index].iter().rev() {
        if sibling.kind() != "comment" {
            break;
        }
        if sibling.end_position().row + 1 != expected_row {
            break;
        }
        expected_row = sibling.start_position().row;
        first = Some(*sibling);
    }
    first
}

/// Render a human-readable name for a type expression.
///
/// Mirrors the display forms the rest of the pipeline keys on: `*T`,
/// `[]T`, `map[K]V`, `chan T`, `pkg.T`, `T[A]`.
pub fn type_name(source: &str, node: Node) -> String {
    match node.kind() {
        "type_identifier" | "identifier" | "package_identifier" => text(source, node).to_string(),
        "qualified_type" => text(source, node).to_string(),
        "pointer_type" => {
            let inner = named_children(node)
                .first()
                .map(|n| type_name(source, *n))
                .unwrap_or_default();
            format!("*{inner}")
        }
        "slice_type" => {
            let elem = field(node, "element")
                .map(|n| type_name(source, n))
                .unwrap_or_default();
            format!("[]{elem}")
        }
        "array_type" => {
            let elem = field(node, "element")
                .map(|n| type_name(source, n))
                .unwrap_or_default();
            format!("[]{elem}")
        }
        "map_type" => {
            let key = field(node, "key")
                .map(|n| type_name(source, n))
                .unwrap_or_default();
            let value = field(node, "value")
                .map(|n| type_name(source, n))
                .unwrap_or_default();
            format!("map[{key}]{value}")
        }
        "channel_type" => {
            let value = field(node, "value")
                .map(|n| type_name(source, n))
                .unwrap_or_default();
            format!("chan {value}")
        }
        "function_type" => "func".to_string(),
        "interface_type" => "interface{}".to_string(),
        "struct_type" => "struct{...}".to_string(),
        "generic_type" => {
            // T[A, B] — keep the base plus the instantiation as written.
            text(source, node).to_string()
        }
        "parenthesized_type" => named_children(node)
            .first()
            .map(|n| type_name(source, *n))
            .unwrap_or_default(),
        _ => text(source, node).to_string(),
    }
}

/// Base name of a receiver or embedded type: strips pointers and type
/// arguments. `*Manager` → `Manager`, `Set[T]` → `Set`.
pub fn type_base(name: &str) -> &str {
    let name = name.trim_start_matches('*');
    match name.find('[') {
        Some(i) => &name[..i],
        None => name,
    }
}

/// True if a rendered type can be nil (pointer, slice, map, chan,
/// interface, or function).
pub fn is_nilable_type(t: &str) -> bool {
    t.starts_with('*')
        || t.starts_with("[]")
        || t.starts_with("map[")
        || t.starts_with("chan ")
        || t == "chan"
        || t.starts_with("func")
        || t.starts_with("interface")
        || t.starts_with("<-chan")
        || t.starts_with("chan<-")
}

/// True if a rendered type allows callee-visible mutation (pointer, slice,
/// map, chan, or interface which may hold such).
pub fn is_mutable_type(t: &str) -> bool {
    t.starts_with('*')
        || t.starts_with("[]")
        || t.starts_with("map[")
        || t.starts_with("chan ")
        || t.starts_with("<-chan")
        || t.starts_with("chan<-")
        || t.starts_with("interface")
}

/// True if a rendered type is the ambient context type.
pub fn is_context_type(t: &str) -> bool {
    t == "context.Context"
}

/// True for Go exported identifiers (leading uppercase).
pub fn is_exported(name: &str) -> bool {
    name.chars().next().is_some_and(|c| c.is_uppercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_one(src: &str) -> (Tree, String) {
        let mut parser = go_parser().unwrap();
        let tree = parse(&mut parser, src, "t.go").unwrap();
        (tree, src.to_string())
    }

    #[test]
    fn positions_are_one_based() {
        let (tree, _) = parse_one("package p\n\nfunc f() {}\n");
        let root = tree.root_node();
        let func = child_of_kind(root, "function_declaration").unwrap();
        assert_eq!(pos(func), (3, 1));
        assert_eq!(end_line(func), 3);
    }

    #[test]
    fn renders_compound_types() {
        let src = "package p\n\nvar a map[string][]*Item\nvar b chan int\n";
        let (tree, src) = parse_one(src);
        let root = tree.root_node();
        let decls: Vec<_> = children(root)
            .into_iter()
            .filter(|n| n.kind() == "var_declaration")
            .collect();
        let spec = child_of_kind(decls[0], "var_spec").unwrap();
        let ty = field(spec, "type").unwrap();
        assert_eq!(type_name(&src, ty), "map[string][]*Item");
        let spec = child_of_kind(decls[1], "var_spec").unwrap();
        let ty = field(spec, "type").unwrap();
        assert_eq!(type_name(&src, ty), "chan int");
    }

    #[test]
    fn type_base_strips_pointer_and_generics() {
        assert_eq!(type_base("*Manager"), "Manager");
        assert_eq!(type_base("Set[T]"), "Set");
        assert_eq!(type_base("*Set[K, V]"), "Set");
        assert_eq!(type_base("Plain"), "Plain");
    }

    #[test]
    fn doc_comment_adjacency() {
        let src = "package p\n\n// Runs the loop.\n// Forever.\nfunc run() {}\n\n// stale\n\nfunc gap() {}\n";
        let (tree, _) = parse_one(src);
        let root = tree.root_node();
        let funcs: Vec<_> = children(root)
            .into_iter()
            .filter(|n| n.kind() == "function_declaration")
            .collect();
        let doc = doc_comment_start(funcs[0]).unwrap();
        assert_eq!(doc.start_position().row, 2);
        assert!(doc_comment_start(funcs[1]).is_none());
    }

    #[test]
    fn nilable_and_mutable_classification() {
        assert!(is_nilable_type("*Manager"));
        assert!(is_nilable_type("[]byte"));
        assert!(is_nilable_type("map[string]int"));
        assert!(is_nilable_type("chan int"));
        assert!(is_nilable_type("func"));
        assert!(!is_nilable_type("int"));
        assert!(is_mutable_type("*Manager"));
        assert!(!is_mutable_type("string"));
        assert!(is_context_type("context.Context"));
    }
}
