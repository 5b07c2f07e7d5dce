//! The per-file AST walker.
//!
//! One flat dispatch over the Go syntax variants keeps the kind-to-property
//! mapping in a single place. The walker maintains three stacks: the parent
//! stack (top = current AST parent for `ast` edges), the lexical scope stack
//! (name → binding, for `ref` edges and type inference), and the defer stack
//! (per enclosing function, for LIFO ordering edges).

use rustc_hash::{FxHashMap, FxHashSet};
use tree_sitter::Node as TsNode;

use crate::graph::{Edge, EdgeKind, GraphStore, Node, NodeKind, PropValue, Props};
use crate::ids::{self, stmt_id, DefKey, DefinitionIndex, FunctionIndex, PositionIndex};
use crate::resolve::{self, Resolver};
use crate::syntax::{self, field, is_exported, named_children, type_base, type_name};

/// A lexical binding. `node_id` is absent for names that resolve but have
/// no declaration node of their own (method receivers, range variables).
#[derive(Clone)]
struct Binding {
    node_id: Option<String>,
    type_name: String,
}

pub struct Walker<'a> {
    src: &'a str,
    rel_pkg: &'a str,
    rel_file: &'a str,
    base: String,
    file_node_id: String,
    resolver: &'a Resolver,
    store: &'a mut GraphStore,
    positions: &'a mut PositionIndex,
    functions: &'a mut FunctionIndex,
    definitions: &'a mut DefinitionIndex,
    init_ids: &'a mut Vec<String>,

    parent_stack: Vec<String>,
    scope_node_ids: FxHashSet<String>,
    scopes: Vec<FxHashMap<String, Binding>>,
    defer_frames: Vec<Vec<String>>,
    cur_func: String,
}

impl<'a> Walker<'a> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        src: &'a str,
        rel_pkg: &'a str,
        rel_file: &'a str,
        file_node_id: String,
        resolver: &'a Resolver,
        store: &'a mut GraphStore,
        positions: &'a mut PositionIndex,
        functions: &'a mut FunctionIndex,
        definitions: &'a mut DefinitionIndex,
        init_ids: &'a mut Vec<String>,
    ) -> Self {
        Self {
            src,
            rel_pkg,
            rel_file,
            base: ids::base_name(rel_file).to_string(),
            parent_stack: vec![file_node_id.clone()],
            file_node_id,
            resolver,
            store,
            positions,
            functions,
            definitions,
            init_ids,
            scope_node_ids: FxHashSet::default(),
            scopes: vec![FxHashMap::default()],
            defer_frames: Vec::new(),
            cur_func: String::new(),
        }
    }

    pub fn walk_file(&mut self, root: TsNode) {
        for child in named_children(root) {
            self.visit(child);
        }
        self.emit_comment_groups(root);
    }

    // =====================================================================
    // Dispatch
    // =====================================================================

    fn visit(&mut self, node: TsNode) {
        if !node.is_named() {
            return;
        }
        match node.kind() {
            "function_declaration" => self.visit_func_decl(node, false),
            "method_declaration" => self.visit_func_decl(node, true),
            "func_literal" => self.visit_func_lit(node),
            "call_expression" => {
                self.visit_call(node);
            }
            "if_statement" => self.visit_if(node),
            "for_statement" => self.visit_for(node),
            "expression_switch_statement" => self.visit_switch(node, "switch"),
            "type_switch_statement" => self.visit_switch(node, "type switch"),
            "select_statement" => self.visit_select(node),
            "expression_case" | "type_case" | "default_case" | "communication_case" => {
                self.visit_case(node)
            }
            "return_statement" => self.visit_return(node),
            "short_var_declaration" => self.visit_short_var(node),
            "assignment_statement" => self.visit_assignment(node),
            "go_statement" => self.visit_go(node),
            "defer_statement" => self.visit_defer(node),
            "send_statement" => self.visit_send(node),
            "break_statement" | "continue_statement" | "goto_statement"
            | "fallthrough_statement" => self.visit_branch(node),
            "labeled_statement" => self.visit_labeled(node),
            "block" => self.visit_block(node),
            "var_declaration" => self.visit_value_decl(node, "var"),
            "const_declaration" => self.visit_value_decl(node, "const"),
            "type_declaration" => {
                for spec in named_children(node) {
                    if spec.kind() == "type_spec" || spec.kind() == "type_alias" {
                        self.visit_type_spec(spec);
                    }
                }
            }
            "import_declaration" => self.visit_import_decl(node),
            "composite_literal" => {
                self.visit_composite_lit(node);
            }
            "int_literal" | "float_literal" | "imaginary_literal" | "rune_literal"
            | "interpreted_string_literal" | "raw_string_literal" => self.visit_literal(node),
            "identifier" => self.visit_ident(node),
            "true" | "false" => self.visit_bool_literal(node),
            "iota" => self.visit_named_const(node, "int"),
            "selector_expression" => {
                self.visit_selector(node);
            }
            "unary_expression" => self.visit_op_expr(node, NodeKind::UnaryExpr, "unary_expr"),
            "binary_expression" => self.visit_op_expr(node, NodeKind::BinaryExpr, "binary_expr"),
            "index_expression" => {
                self.visit_bracket_expr(node, NodeKind::IndexExpr, "index_expr", "index", "[")
            }
            "slice_expression" => {
                self.visit_bracket_expr(node, NodeKind::SliceExpr, "slice_expr", "slice", "[")
            }
            "type_assertion_expression" => self.visit_bracket_expr(
                node,
                NodeKind::TypeAssertExpr,
                "type_assert_expr",
                "type_assert",
                "(",
            ),
            "keyed_element" => self.visit_keyed_element(node),
            "inc_dec_statement" => self.visit_inc_dec(node),
            "range_clause" => {
                // Left-hand names are definitions, not uses.
                if let Some(right) = field(node, "right") {
                    self.visit(right);
                }
            }
            "expression_statement" => {
                for child in named_children(node) {
                    self.visit(child);
                }
            }
            "comment" | "package_clause" => {}
            _ => {
                // Transparent container (parenthesized expressions, literal
                // values, expression lists, range clauses, ...): recurse
                // without producing a node.
                for child in named_children(node) {
                    self.visit(child);
                }
            }
        }
    }

    // =====================================================================
    // Emission helpers
    // =====================================================================

    fn current_parent(&self) -> String {
        self.parent_stack.last().cloned().unwrap_or_default()
    }

    /// Add a node, the `ast` edge from the current parent, and the position
    /// registration. Fills in file/package/parent_function and the nesting
    /// depth property for statement-level nodes inside functions.
    fn emit(&mut self, mut node: Node) {
        node.package = self.rel_pkg.to_string();
        node.file = self.rel_file.to_string();
        node.parent_function = self.cur_func.clone();

        if !self.cur_func.is_empty()
            && !matches!(
                node.kind,
                NodeKind::Function | NodeKind::Parameter | NodeKind::Result
            )
        {
            let depth = self.parent_stack.len().saturating_sub(2);
            node.properties
                .insert("nesting_depth".into(), PropValue::Int(depth as i64));
        }

        if node.line > 0 {
            self.positions
                .set(&node.file, node.line, node.col, &node.id);
        }
        let parent = self.current_parent();
        self.store
            .add_edge(Edge::plain(parent, node.id.clone(), EdgeKind::Ast));
        self.store.add_node(node);
    }

    fn id_at(&self, node: TsNode, kind: &str) -> String {
        let (line, col) = syntax::pos(node);
        stmt_id(self.rel_pkg, &self.base, line, col, kind)
    }

    fn code_snippet(&self, start: usize, end: usize, max: usize) -> Option<String> {
        let s = syntax::snippet(self.src, start, end, max);
        let trimmed = s.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    }

    /// Emit a doc edge from a declaration to its adjacent comment group.
    fn emit_doc_edge(&mut self, decl_id: &str, decl: TsNode) {
        if let Some(comment) = syntax::doc_comment_start(decl) {
            let (line, col) = syntax::pos(comment);
            let comment_id = stmt_id(self.rel_pkg, &self.base, line, col, "comment");
            self.store
                .add_edge(Edge::plain(decl_id.to_string(), comment_id, EdgeKind::Doc));
        }
    }

    fn emit_condition_edge(&mut self, stmt_id: &str, cond: Option<TsNode>) {
        let Some(cond) = cond else { return };
        if let Some(cond_id) = self.expr_node_id(cond) {
            self.store.add_edge(Edge::plain(
                stmt_id.to_string(),
                cond_id,
                EdgeKind::Condition,
            ));
        }
    }

    /// Emit an eval_type edge from a node to the declaration of its
    /// resolved type, when that type is declared in scope.
    fn emit_eval_type(&mut self, node_id: &str, type_str: &str) {
        if type_str.is_empty() {
            return;
        }
        if let Some(type_decl_id) = self.resolve_type_decl(type_str) {
            if type_decl_id != node_id {
                self.store.add_edge(Edge::plain(
                    node_id.to_string(),
                    type_decl_id,
                    EdgeKind::EvalType,
                ));
            }
        }
    }

    /// Resolve a rendered type string to the node ID of its declaration.
    fn resolve_type_decl(&self, type_str: &str) -> Option<String> {
        let base = type_base(type_str);
        if let Some((alias, name)) = base.split_once('.') {
            let scope = self.resolver.qualified_scope(self.rel_file, alias)?;
            return scope.types.get(name).map(|t| t.node_id.clone());
        }
        let scope = self.resolver.scope_by_rel(self.rel_pkg)?;
        scope.types.get(base).map(|t| t.node_id.clone())
    }

    // =====================================================================
    // Lexical scope
    // =====================================================================

    fn bind(&mut self, name: &str, node_id: Option<String>, type_name: String) {
        if name == "_" || name.is_empty() {
            return;
        }
        if let Some(frame) = self.scopes.last_mut() {
            frame.insert(name.to_string(), Binding { node_id, type_name });
        }
    }

    fn lookup(&self, name: &str) -> Option<&Binding> {
        self.scopes.iter().rev().find_map(|frame| frame.get(name))
    }

    // =====================================================================
    // Functions
    // =====================================================================

    fn visit_func_decl(&mut self, node: TsNode, is_method: bool) {
        let Some(name_node) = field(node, "name") else {
            return;
        };
        let name = syntax::text(self.src, name_node).to_string();
        let recv = if is_method {
            resolve::receiver_type(self.src, node).unwrap_or_default()
        } else {
            String::new()
        };

        let (line, col) = syntax::pos(node);
        let end = syntax::end_line(node);
        let func_id = ids::func_id(self.rel_pkg, &recv, &name, &self.base, line, col);

        let def = {
            let scope = self.resolver.scope_by_rel(self.rel_pkg);
            if is_method {
                scope.and_then(|s| s.method(type_base(&recv), &name)).cloned()
            } else {
                scope.and_then(|s| s.funcs.get(&name)).cloned()
            }
        };

        let display_name = if recv.is_empty() {
            name.clone()
        } else {
            format!("{recv}.{name}")
        };

        let mut props = Props::new();
        props.insert(
            "full_name".into(),
            format!("{}.{}", self.rel_pkg, display_name).into(),
        );
        props.insert("exported".into(), is_exported(&name).into());
        if !recv.is_empty() {
            props.insert("receiver".into(), recv.clone().into());
        }
        if field(node, "type_parameters").is_some() {
            props.insert("generic".into(), true.into());
        }
        if let Some(def) = &def {
            if def
                .params
                .first()
                .is_some_and(|p| syntax::is_context_type(&p.type_name))
            {
                props.insert("has_context".into(), true.into());
            }
            if def.results.iter().any(|r| r.type_name == "error") {
                props.insert("returns_error".into(), true.into());
            }
            if def
                .results
                .iter()
                .any(|r| r.type_name != "error" && syntax::is_nilable_type(&r.type_name))
            {
                props.insert("returns_nilable".into(), true.into());
            }
        }
        let sig_end = field(node, "body")
            .map(|b| b.start_byte())
            .unwrap_or_else(|| node.end_byte());
        if let Some(code) = self.code_snippet(node.start_byte(), sig_end, 200) {
            props.insert("code".into(), code.into());
        }

        self.emit(Node {
            id: func_id.clone(),
            kind: NodeKind::Function,
            name: display_name,
            line,
            col,
            end_line: end,
            type_info: def.as_ref().map(|d| d.signature()).unwrap_or_default(),
            properties: props,
            ..Default::default()
        });
        self.emit_doc_edge(&func_id, node);

        // Register both the keyword position and the name position: the
        // flow extractor addresses functions by their name identifier.
        self.functions.set(self.rel_file, line, col, &func_id);
        let (name_line, name_col) = syntax::pos(name_node);
        self.functions
            .set(self.rel_file, name_line, name_col, &func_id);
        self.positions
            .set(self.rel_file, name_line, name_col, &func_id);

        let key = if is_method {
            DefKey::Method(
                self.rel_pkg.to_string(),
                type_base(&recv).to_string(),
                name.clone(),
            )
        } else {
            DefKey::Func(self.rel_pkg.to_string(), name.clone())
        };
        self.definitions.set(key, &func_id);

        if name == "init" && recv.is_empty() {
            self.init_ids.push(func_id.clone());
        }

        self.enter_function(node, func_id, def.as_ref(), is_method);
    }

    fn visit_func_lit(&mut self, node: TsNode) {
        let (line, col) = syntax::pos(node);
        let func_id = self.id_at(node, "func_lit");

        self.emit(Node {
            id: func_id.clone(),
            kind: NodeKind::Function,
            name: "func literal".to_string(),
            line,
            col,
            end_line: syntax::end_line(node),
            ..Default::default()
        });
        self.functions.set(self.rel_file, line, col, &func_id);

        self.enter_function(node, func_id, None, false);
    }

    /// Shared body handling for declarations and literals: parameter/result
    /// nodes, scope and defer frames, body traversal, defer ordering.
    fn enter_function(
        &mut self,
        node: TsNode,
        func_id: String,
        def: Option<&resolve::FuncDef>,
        is_method: bool,
    ) {
        self.scope_node_ids.insert(func_id.clone());
        self.parent_stack.push(func_id.clone());
        let prev_func = std::mem::replace(&mut self.cur_func, func_id);
        self.scopes.push(FxHashMap::default());
        self.defer_frames.push(Vec::new());

        if is_method {
            let recv_ty = resolve::receiver_type(self.src, node).unwrap_or_default();
            if let Some(recv_name) = resolve::receiver_name(self.src, node) {
                self.bind(&recv_name, None, recv_ty);
            }
        }

        if let Some(tparams) = field(node, "type_parameters") {
            let defs = resolve::parse_params(self.src, tparams, self.rel_pkg, &self.base, "type_param");
            for d in defs {
                self.emit_param_node(&d, NodeKind::TypeParam);
            }
        }
        let params = match def {
            Some(d) => d.params.clone(),
            None => field(node, "parameters")
                .map(|p| resolve::parse_params(self.src, p, self.rel_pkg, &self.base, "parameter"))
                .unwrap_or_default(),
        };
        for (i, p) in params.iter().enumerate() {
            let mut extra = Props::new();
            extra.insert("index".into(), PropValue::Int(i as i64));
            if syntax::is_mutable_type(&p.type_name) {
                extra.insert("mutable".into(), true.into());
            }
            if syntax::is_nilable_type(&p.type_name) {
                extra.insert("nullable".into(), true.into());
            }
            if syntax::is_context_type(&p.type_name) {
                extra.insert("context_param".into(), true.into());
            }
            self.emit_param_node_with(p, NodeKind::Parameter, extra);
            self.bind(&p.name, Some(p.node_id.clone()), p.type_name.clone());
        }
        let results = match def {
            Some(d) => d.results.clone(),
            None => field(node, "result")
                .map(|r| resolve::parse_results(self.src, r, self.rel_pkg, &self.base))
                .unwrap_or_default(),
        };
        for r in &results {
            self.emit_param_node(r, NodeKind::Result);
            if r.name != r.type_name {
                // Named result: visible in the function body.
                self.bind(&r.name, Some(r.node_id.clone()), r.type_name.clone());
            }
        }

        if let Some(body) = field(node, "body") {
            self.visit_block(body);
        }

        let defers = self.defer_frames.pop().unwrap_or_default();
        self.emit_defer_ordering(&defers);
        self.scopes.pop();
        self.cur_func = prev_func;
        self.parent_stack.pop();
    }

    fn emit_param_node(&mut self, p: &resolve::ParamDef, kind: NodeKind) {
        self.emit_param_node_with(p, kind, Props::new());
    }

    fn emit_param_node_with(&mut self, p: &resolve::ParamDef, kind: NodeKind, props: Props) {
        // The ID embeds the position; recover it rather than re-walking.
        let (line, col) = id_position(&p.node_id).unwrap_or((0, 0));
        self.emit(Node {
            id: p.node_id.clone(),
            kind,
            name: p.name.clone(),
            line,
            col,
            type_info: p.type_name.clone(),
            properties: props,
            ..Default::default()
        });
    }

    /// Defer nodes collected in source order are chained in reverse:
    /// the last defer in source order executes first.
    fn emit_defer_ordering(&mut self, defers: &[String]) {
        if defers.len() < 2 {
            return;
        }
        for i in (1..defers.len()).rev() {
            self.store.add_edge(Edge::with_prop(
                defers[i].clone(),
                defers[i - 1].clone(),
                EdgeKind::DeferOrder,
                "exec_order",
                defers.len() - i,
            ));
        }
    }

    // =====================================================================
    // Statements
    // =====================================================================

    fn visit_stmt_node(
        &mut self,
        node: TsNode,
        at: TsNode,
        kind: NodeKind,
        id_kind: &str,
        name: &str,
        code_to: Option<usize>,
    ) -> String {
        let (line, col) = syntax::pos(at);
        let id = stmt_id(self.rel_pkg, &self.base, line, col, id_kind);
        let mut props = Props::new();
        if let Some(end) = code_to {
            if let Some(code) = self.code_snippet(node.start_byte(), end, 120) {
                props.insert("code".into(), code.into());
            }
        }
        self.emit(Node {
            id: id.clone(),
            kind,
            name: name.to_string(),
            line,
            col,
            end_line: syntax::end_line(node),
            properties: props,
            ..Default::default()
        });
        id
    }

    fn visit_if(&mut self, node: TsNode) {
        let body_start = field(node, "consequence").map(|b| b.start_byte());
        let id = self.visit_stmt_node(node, node, NodeKind::If, "if", "if", body_start);
        self.emit_condition_edge(&id, field(node, "condition"));
        self.parent_stack.push(id);
        for child in named_children(node) {
            self.visit(child);
        }
        self.parent_stack.pop();
    }

    fn visit_for(&mut self, node: TsNode) {
        let is_range = syntax::child_of_kind(node, "range_clause").is_some();
        let name = if is_range { "range" } else { "for" };
        let body_start = field(node, "body").map(|b| b.start_byte());
        let id = self.visit_stmt_node(node, node, NodeKind::For, "for", name, body_start);
        if !is_range {
            self.emit_condition_edge(&id, field(node, "condition"));
        }
        self.parent_stack.push(id);
        self.scopes.push(FxHashMap::default());
        if let Some(range) = syntax::child_of_kind(node, "range_clause") {
            self.bind_range_vars(range);
        }
        for child in named_children(node) {
            self.visit(child);
        }
        self.scopes.pop();
        self.parent_stack.pop();
    }

    /// Bind `for k, v := range x` loop variables; element types are not
    /// recovered, so bindings carry no type.
    fn bind_range_vars(&mut self, range: TsNode) {
        if let Some(left) = field(range, "left") {
            for ident in named_children(left) {
                if ident.kind() == "identifier" {
                    let name = syntax::text(self.src, ident).to_string();
                    self.bind(&name, None, String::new());
                }
            }
        }
    }

    fn visit_switch(&mut self, node: TsNode, name: &str) {
        let id = self.visit_stmt_node(node, node, NodeKind::Switch, "switch", name, None);
        if name == "switch" {
            self.emit_condition_edge(&id, field(node, "value"));
        }
        self.parent_stack.push(id);
        for child in named_children(node) {
            self.visit(child);
        }
        self.parent_stack.pop();
    }

    fn visit_select(&mut self, node: TsNode) {
        let id = self.visit_stmt_node(node, node, NodeKind::Select, "select", "select", None);
        self.parent_stack.push(id);
        for child in named_children(node) {
            self.visit(child);
        }
        self.parent_stack.pop();
    }

    fn visit_case(&mut self, node: TsNode) {
        let in_select = node
            .parent()
            .is_some_and(|p| p.kind() == "select_statement");
        let name = if node.kind() == "communication_case" || in_select {
            "comm case"
        } else {
            "case"
        };
        let id = self.visit_stmt_node(node, node, NodeKind::Case, "case", name, None);
        self.parent_stack.push(id);
        self.scopes.push(FxHashMap::default());
        for child in named_children(node) {
            self.visit(child);
        }
        self.scopes.pop();
        self.parent_stack.pop();
    }

    fn visit_return(&mut self, node: TsNode) {
        let id = self.visit_stmt_node(
            node,
            node,
            NodeKind::Return,
            "return",
            "return",
            Some(node.end_byte()),
        );
        self.parent_stack.push(id);
        for child in named_children(node) {
            self.visit(child);
        }
        self.parent_stack.pop();
    }

    fn visit_short_var(&mut self, node: TsNode) {
        let Some(tok) = syntax::child_of_kind(node, ":=") else {
            return;
        };
        let id = self.visit_stmt_node(node, tok, NodeKind::Assign, "assign", ":=", Some(node.end_byte()));

        let lhs: Vec<TsNode> = field(node, "left").map(named_children).unwrap_or_default();
        let rhs: Vec<TsNode> = field(node, "right").map(named_children).unwrap_or_default();

        for (i, lhs_node) in lhs.iter().enumerate() {
            if lhs_node.kind() != "identifier" {
                continue;
            }
            let var_name = syntax::text(self.src, *lhs_node).to_string();
            if var_name == "_" {
                continue;
            }
            let (line, col) = syntax::pos(*lhs_node);
            let local_id = stmt_id(self.rel_pkg, &self.base, line, col, "local");
            let inferred = if lhs.len() == rhs.len() {
                rhs.get(i).map(|r| self.infer_type(*r)).unwrap_or_default()
            } else {
                String::new()
            };

            self.emit(Node {
                id: local_id.clone(),
                kind: NodeKind::Local,
                name: var_name.clone(),
                line,
                col,
                type_info: inferred.clone(),
                ..Default::default()
            });
            self.bind(&var_name, Some(local_id.clone()), inferred);

            // Initializer edges only for parallel 1-to-1 positions.
            if lhs.len() == rhs.len() {
                if let Some(rhs_id) = rhs.get(i).and_then(|r| self.expr_node_id(*r)) {
                    self.store
                        .add_edge(Edge::plain(local_id, rhs_id, EdgeKind::Initializer));
                }
            }
        }

        self.parent_stack.push(id);
        for r in rhs {
            self.visit(r);
        }
        self.parent_stack.pop();
    }

    fn visit_assignment(&mut self, node: TsNode) {
        let Some(op) = field(node, "operator") else {
            return;
        };
        let op_text = syntax::text(self.src, op).to_string();
        let id = self.visit_stmt_node(node, op, NodeKind::Assign, "assign", &op_text, Some(node.end_byte()));
        self.parent_stack.push(id);
        for child in named_children(node) {
            self.visit(child);
        }
        self.parent_stack.pop();
    }

    fn visit_go(&mut self, node: TsNode) {
        let id = self.visit_stmt_node(node, node, NodeKind::Go, "go", "go", None);

        if let Some(call) = syntax::child_of_kind(node, "call_expression") {
            // Two spawn edges: to the launched function reference and to the
            // launched call expression itself.
            if let Some(callee_id) = field(call, "function").and_then(|f| self.expr_node_id(f)) {
                self.store
                    .add_edge(Edge::plain(id.clone(), callee_id, EdgeKind::Spawn));
            }
            if let Some(call_id) = self.expr_node_id(call) {
                self.store
                    .add_edge(Edge::plain(id.clone(), call_id, EdgeKind::SpawnCall));
            }
        }

        self.parent_stack.push(id);
        for child in named_children(node) {
            self.visit(child);
        }
        self.parent_stack.pop();
    }

    fn visit_defer(&mut self, node: TsNode) {
        let id = self.visit_stmt_node(node, node, NodeKind::Defer, "defer", "defer", None);
        if let Some(frame) = self.defer_frames.last_mut() {
            frame.push(id.clone());
        }
        self.parent_stack.push(id);
        for child in named_children(node) {
            self.visit(child);
        }
        self.parent_stack.pop();
    }

    fn visit_send(&mut self, node: TsNode) {
        let Some(arrow) = syntax::child_of_kind(node, "<-") else {
            return;
        };
        let id = self.visit_stmt_node(node, arrow, NodeKind::Send, "send", "send", None);
        self.parent_stack.push(id);
        for child in named_children(node) {
            self.visit(child);
        }
        self.parent_stack.pop();
    }

    fn visit_branch(&mut self, node: TsNode) {
        let name = node.kind().trim_end_matches("_statement").to_string();
        let id = self.visit_stmt_node(node, node, NodeKind::Branch, "branch", &name, None);

        if let Some(label) = syntax::child_of_kind(node, "label_name") {
            let label_name = syntax::text(self.src, label).to_string();
            let key = DefKey::Label(self.cur_func.clone(), label_name);
            if let Some(target) = self.definitions.get(&key) {
                let target = target.to_string();
                self.store
                    .add_edge(Edge::plain(id, target, EdgeKind::BranchTarget));
            }
        }
    }

    fn visit_labeled(&mut self, node: TsNode) {
        let Some(colon) = syntax::child_of_kind(node, ":") else {
            return;
        };
        let Some(label) = field(node, "label") else {
            return;
        };
        let label_name = syntax::text(self.src, label).to_string();
        let (line, col) = syntax::pos(colon);
        let id = stmt_id(self.rel_pkg, &self.base, line, col, "label");
        self.emit(Node {
            id: id.clone(),
            kind: NodeKind::Label,
            name: label_name.clone(),
            line,
            col,
            ..Default::default()
        });
        self.definitions
            .set(DefKey::Label(self.cur_func.clone(), label_name), &id);

        self.parent_stack.push(id);
        for child in named_children(node) {
            if child.kind() != "label_name" {
                self.visit(child);
            }
        }
        self.parent_stack.pop();
    }

    fn visit_block(&mut self, node: TsNode) {
        let (line, col) = syntax::pos(node);
        let id = self.id_at(node, "block");
        self.emit(Node {
            id: id.clone(),
            kind: NodeKind::Block,
            name: "block".to_string(),
            line,
            col,
            end_line: syntax::end_line(node),
            ..Default::default()
        });

        // Scope edge to the nearest enclosing scope node.
        for ancestor in self.parent_stack.iter().rev() {
            if self.scope_node_ids.contains(ancestor) {
                self.store.add_edge(Edge::plain(
                    id.clone(),
                    ancestor.clone(),
                    EdgeKind::Scope,
                ));
                break;
            }
        }
        self.scope_node_ids.insert(id.clone());

        self.parent_stack.push(id);
        self.scopes.push(FxHashMap::default());

        // next_sibling edges between consecutive statements.
        let stmts = named_children(node);
        let mut prev_id: Option<String> = None;
        for stmt in &stmts {
            if let Some(cur) = self.stmt_node_id(*stmt) {
                if let Some(prev) = &prev_id {
                    self.store.add_edge(Edge::plain(
                        prev.clone(),
                        cur.clone(),
                        EdgeKind::NextSibling,
                    ));
                }
                prev_id = Some(cur);
            }
        }

        for stmt in stmts {
            self.visit(stmt);
        }

        self.scopes.pop();
        self.parent_stack.pop();
    }

    fn visit_value_decl(&mut self, node: TsNode, decl_kind: &str) {
        let mut specs: Vec<TsNode> = Vec::new();
        for child in syntax::children(node) {
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
            let declared_type = field(spec, "type").map(|t| type_name(self.src, t));
            let names: Vec<TsNode> = syntax::children(spec)
                .into_iter()
                .filter(|c| c.kind() == "identifier")
                .collect();
            let values: Vec<TsNode> = field(spec, "value").map(named_children).unwrap_or_default();

            for (i, name_node) in names.iter().enumerate() {
                let var_name = syntax::text(self.src, *name_node).to_string();
                if var_name == "_" {
                    continue;
                }
                let (line, col) = syntax::pos(*name_node);
                let local_id = stmt_id(self.rel_pkg, &self.base, line, col, "local");
                let type_info = declared_type.clone().unwrap_or_else(|| {
                    if names.len() == values.len() {
                        values.get(i).map(|v| self.infer_type(*v)).unwrap_or_default()
                    } else {
                        String::new()
                    }
                });

                let mut props = Props::new();
                props.insert("decl".into(), decl_kind.into());
                props.insert("exported".into(), is_exported(&var_name).into());

                self.emit(Node {
                    id: local_id.clone(),
                    kind: NodeKind::Local,
                    name: var_name.clone(),
                    line,
                    col,
                    type_info: type_info.clone(),
                    properties: props,
                    ..Default::default()
                });

                if names.len() == values.len() {
                    if let Some(value_id) = values.get(i).and_then(|v| self.expr_node_id(*v)) {
                        self.store.add_edge(Edge::plain(
                            local_id.clone(),
                            value_id,
                            EdgeKind::Initializer,
                        ));
                    }
                }
                self.emit_doc_edge(&local_id, spec);
                if self.cur_func.is_empty() {
                    self.definitions.set(
                        DefKey::Global(self.rel_pkg.to_string(), var_name.clone()),
                        &local_id,
                    );
                } else {
                    self.bind(&var_name, Some(local_id), type_info);
                }
            }

            for value in values {
                self.visit(value);
            }
        }
    }

    fn visit_type_spec(&mut self, spec: TsNode) {
        let Some(name_node) = field(spec, "name") else {
            return;
        };
        let name = syntax::text(self.src, name_node).to_string();
        let (line, col) = syntax::pos(spec);
        let id = stmt_id(self.rel_pkg, &self.base, line, col, "type_decl");

        let scope = self.resolver.scope_by_rel(self.rel_pkg);
        let def = scope.and_then(|s| s.types.get(&name));
        let type_kind = def.map(|d| d.shape.as_str()).unwrap_or("alias");

        let mut props = Props::new();
        props.insert("type_kind".into(), type_kind.into());
        props.insert(
            "full_name".into(),
            format!("{}.{}", self.rel_pkg, name).into(),
        );
        props.insert("exported".into(), is_exported(&name).into());
        if field(spec, "type_parameters").is_some() {
            props.insert("generic".into(), true.into());
        }
        if let Some(code) = self.code_snippet(spec.start_byte(), spec.end_byte(), 200) {
            props.insert("code".into(), code.into());
        }

        self.emit(Node {
            id: id.clone(),
            kind: NodeKind::TypeDecl,
            name: name.clone(),
            line,
            col,
            end_line: syntax::end_line(spec),
            type_info: name.clone(),
            properties: props,
            ..Default::default()
        });
        // The doc comment usually sits on the enclosing type_declaration
        // for single-spec declarations.
        self.emit_doc_edge(&id, spec);
        if let Some(parent) = spec.parent() {
            if parent.kind() == "type_declaration" && parent.named_child_count() == 1 {
                self.emit_doc_edge(&id, parent);
            }
        }
        self.definitions
            .set(DefKey::Type(self.rel_pkg.to_string(), name.clone()), &id);

        self.parent_stack.push(id);
        if let Some(tparams) = field(spec, "type_parameters") {
            let defs =
                resolve::parse_params(self.src, tparams, self.rel_pkg, &self.base, "type_param");
            for d in defs {
                self.emit_param_node(&d, NodeKind::TypeParam);
            }
        }
        if let Some(ty) = field(spec, "type") {
            match ty.kind() {
                "struct_type" => self.visit_struct_fields(&name, ty),
                "interface_type" => self.visit_interface_methods(&name, ty),
                _ => {}
            }
        }
        self.parent_stack.pop();
    }

    fn visit_struct_fields(&mut self, owner: &str, struct_ty: TsNode) {
        let Some(list) = syntax::child_of_kind(struct_ty, "field_declaration_list") else {
            return;
        };
        for decl in named_children(list) {
            if decl.kind() != "field_declaration" {
                continue;
            }
            let (line, col) = syntax::pos(decl);
            let id = stmt_id(self.rel_pkg, &self.base, line, col, "field");
            let names: Vec<TsNode> = syntax::children(decl)
                .into_iter()
                .filter(|c| c.kind() == "field_identifier")
                .collect();
            let ty = field(decl, "type").map(|t| type_name(self.src, t));
            let embedded = names.is_empty();
            let field_name = if embedded {
                type_base(ty.as_deref().unwrap_or("")).to_string()
            } else {
                syntax::text(self.src, names[0]).to_string()
            };

            let mut props = Props::new();
            props.insert("exported".into(), is_exported(&field_name).into());
            if embedded {
                props.insert("embedded".into(), true.into());
            }
            if let Some(tag) = field(decl, "tag") {
                let raw = syntax::text(self.src, tag);
                props.insert("tag".into(), raw.trim_matches('`').into());
            }

            self.emit(Node {
                id: id.clone(),
                kind: NodeKind::Field,
                name: field_name.clone(),
                line,
                col,
                type_info: ty.unwrap_or_default(),
                properties: props,
                ..Default::default()
            });
            self.emit_doc_edge(&id, decl);
            self.definitions.set(
                DefKey::Field(self.rel_pkg.to_string(), owner.to_string(), field_name),
                &id,
            );
        }
    }

    fn visit_interface_methods(&mut self, owner: &str, iface_ty: TsNode) {
        for elem in named_children(iface_ty) {
            if elem.kind() != "method_elem" && elem.kind() != "method_spec" {
                continue;
            }
            let Some(name_node) = field(elem, "name") else {
                continue;
            };
            let method_name = syntax::text(self.src, name_node).to_string();
            let (line, col) = syntax::pos(elem);
            let id = stmt_id(self.rel_pkg, &self.base, line, col, "field");

            let mut props = Props::new();
            props.insert("exported".into(), is_exported(&method_name).into());

            self.emit(Node {
                id: id.clone(),
                kind: NodeKind::Field,
                name: method_name.clone(),
                line,
                col,
                type_info: syntax::truncate(syntax::text(self.src, elem), 120),
                properties: props,
                ..Default::default()
            });
            self.emit_doc_edge(&id, elem);
            self.definitions.set(
                DefKey::Field(self.rel_pkg.to_string(), owner.to_string(), method_name),
                &id,
            );
        }
    }

    fn visit_import_decl(&mut self, node: TsNode) {
        let mut specs: Vec<TsNode> = Vec::new();
        for child in syntax::children(node) {
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
            let path = syntax::text(self.src, path_node).trim_matches('"').to_string();
            let alias = field(spec, "name").map(|n| syntax::text(self.src, n).to_string());
            let display = alias
                .clone()
                .unwrap_or_else(|| path.rsplit('/').next().unwrap_or(&path).to_string());

            let (line, col) = syntax::pos(spec);
            let id = stmt_id(self.rel_pkg, &self.base, line, col, "import");
            let mut props = Props::new();
            props.insert("path".into(), path.into());
            if let Some(alias) = alias {
                props.insert("alias".into(), alias.into());
            }
            self.emit(Node {
                id: id.clone(),
                kind: NodeKind::Import,
                name: display,
                line,
                col,
                properties: props,
                ..Default::default()
            });
            self.emit_doc_edge(&id, spec);
        }
    }

    fn visit_inc_dec(&mut self, node: TsNode) {
        let tok = syntax::child_of_kind(node, "++").or_else(|| syntax::child_of_kind(node, "--"));
        let Some(tok) = tok else { return };
        let name = syntax::text(self.src, tok).to_string();
        let id = self.visit_stmt_node(node, tok, NodeKind::IncDec, "incdec", &name, None);
        self.parent_stack.push(id);
        for child in named_children(node) {
            self.visit(child);
        }
        self.parent_stack.pop();
    }

    // =====================================================================
    // Expressions
    // =====================================================================

    fn visit_call(&mut self, node: TsNode) -> Option<String> {
        let fun = field(node, "function")?;
        let args_node = field(node, "arguments");
        let at = args_node.unwrap_or(node);
        let (line, col) = syntax::pos(at);
        let id = stmt_id(self.rel_pkg, &self.base, line, col, "call");

        let callee = self.callee_name(fun);
        let dispatch = self.classify_dispatch(fun);

        let mut props = Props::new();
        props.insert("dispatch_type".into(), dispatch.into());
        if let Some(code) = self.code_snippet(fun.start_byte(), node.end_byte(), 120) {
            props.insert("code".into(), code.into());
        }
        if fun.kind() == "selector_expression" {
            if let Some(kind) = self.detect_sync_primitive(fun) {
                props.insert("sync_kind".into(), kind.into());
            }
            if let Some(derivation) = self.detect_context_derivation(fun) {
                props.insert("context_derivation".into(), derivation.into());
            }
        }

        let type_info = self.infer_type(node);

        self.emit(Node {
            id: id.clone(),
            kind: NodeKind::Call,
            name: callee.clone(),
            line,
            col,
            end_line: syntax::end_line(node),
            type_info: type_info.clone(),
            properties: props,
            ..Default::default()
        });
        self.emit_eval_type(&id, &type_info);

        // Receiver edge for method calls.
        if fun.kind() == "selector_expression" {
            if let Some(recv_id) = field(fun, "operand").and_then(|b| self.expr_node_id(b)) {
                self.store
                    .add_edge(Edge::plain(id.clone(), recv_id, EdgeKind::Receiver));
            }
        }

        let args: Vec<TsNode> = args_node.map(named_children).unwrap_or_default();
        for (i, arg) in args.iter().enumerate() {
            if let Some(arg_id) = self.expr_node_id(*arg) {
                self.store.add_edge(Edge::with_prop(
                    id.clone(),
                    arg_id,
                    EdgeKind::Argument,
                    "index",
                    i,
                ));
            }
        }

        self.emit_error_wrap(&id, &callee, &args);

        self.parent_stack.push(id.clone());
        self.visit(fun);
        for arg in args {
            self.visit(arg);
        }
        self.parent_stack.pop();
        Some(id)
    }

    fn visit_selector(&mut self, node: TsNode) -> Option<String> {
        let field_node = field(node, "field")?;
        let operand = field(node, "operand");
        let sel_name = syntax::text(self.src, field_node).to_string();
        let (line, col) = syntax::pos(field_node);
        let id = stmt_id(self.rel_pkg, &self.base, line, col, "selector");

        let display = match operand {
            Some(op) if op.kind() == "identifier" => {
                format!("{}.{}", syntax::text(self.src, op), sel_name)
            }
            _ => sel_name.clone(),
        };

        let mut props = Props::new();
        let mut type_info = String::new();
        let mut ref_target: Option<String> = None;

        if let Some(op) = operand {
            if let Some((kind, ty, target)) = self.resolve_selection(op, &sel_name) {
                if let Some(kind) = kind {
                    props.insert("selection_kind".into(), kind.into());
                }
                type_info = ty;
                ref_target = target;
            }
        }

        self.emit(Node {
            id: id.clone(),
            kind: NodeKind::Selector,
            name: display,
            line,
            col,
            type_info: type_info.clone(),
            properties: props,
            ..Default::default()
        });
        self.emit_eval_type(&id, &type_info);
        if let Some(target) = ref_target {
            self.store
                .add_edge(Edge::plain(id.clone(), target, EdgeKind::Ref));
        }

        if let Some(op) = operand {
            self.parent_stack.push(id.clone());
            self.visit(op);
            self.parent_stack.pop();
        }
        Some(id)
    }

    /// Classify a selection `base.name` and resolve its target declaration.
    /// Returns (selection_kind, type_info, ref target node id).
    #[allow(clippy::type_complexity)]
    fn resolve_selection(
        &self,
        base: TsNode,
        name: &str,
    ) -> Option<(Option<&'static str>, String, Option<String>)> {
        // Qualified reference through an import alias.
        if base.kind() == "identifier" {
            let base_name = syntax::text(self.src, base);
            if self.lookup(base_name).is_none() {
                if let Some(scope) = self.resolver.qualified_scope(self.rel_file, base_name) {
                    if let Some(f) = scope.funcs.get(name) {
                        return Some((None, f.signature(), Some(f.node_id.clone())));
                    }
                    if let Some(g) = scope.globals.get(name) {
                        return Some((None, g.type_name.clone(), Some(g.node_id.clone())));
                    }
                    if let Some(t) = scope.types.get(name) {
                        return Some((None, t.name.clone(), Some(t.node_id.clone())));
                    }
                    return None;
                }
                if self.resolver.import_target(self.rel_file, base_name).is_some() {
                    return None; // external package reference
                }
                // Unbound identifier naming an in-scope type: method expression.
                let scope = self.resolver.scope_by_rel(self.rel_pkg)?;
                if scope.types.contains_key(base_name) {
                    if let Some(m) = scope.method(base_name, name) {
                        return Some((
                            Some("method_expr"),
                            m.signature(),
                            Some(m.node_id.clone()),
                        ));
                    }
                    return Some((Some("method_expr"), String::new(), None));
                }
                return None;
            }
        }

        let base_type = self.infer_type(base);
        if base_type.is_empty() {
            return None;
        }
        let base_name = type_base(&base_type).to_string();

        // Resolve the owning type's scope: same package, or a qualified one.
        let (scope, type_key) = if let Some((alias, ty)) = base_name.split_once('.') {
            (self.resolver.qualified_scope(self.rel_file, alias)?, ty.to_string())
        } else {
            (self.resolver.scope_by_rel(self.rel_pkg)?, base_name)
        };

        if let Some(ty) = scope.types.get(&type_key) {
            if let Some(f) = ty.fields.iter().find(|f| f.name == name) {
                return Some((
                    Some("field_val"),
                    f.type_name.clone(),
                    Some(f.node_id.clone()),
                ));
            }
            if ty.shape == resolve::TypeShape::Interface {
                if let Some(m) = ty.iface_methods.iter().find(|m| m.name == name) {
                    return Some((Some("method_val"), String::new(), Some(m.node_id.clone())));
                }
            }
        }
        if let Some(m) = scope.method(&type_key, name) {
            return Some((Some("method_val"), m.signature(), Some(m.node_id.clone())));
        }
        None
    }

    fn visit_ident(&mut self, node: TsNode) {
        let name = syntax::text(self.src, node);
        if name == "_" {
            return;
        }

        let (type_info, ref_target) = if let Some(binding) = self.lookup(name) {
            (binding.type_name.clone(), binding.node_id.clone())
        } else if let Some(scope) = self.resolver.scope_by_rel(self.rel_pkg) {
            if let Some(f) = scope.funcs.get(name) {
                (f.signature(), Some(f.node_id.clone()))
            } else if let Some(g) = scope.globals.get(name) {
                (g.type_name.clone(), Some(g.node_id.clone()))
            } else if let Some(t) = scope.types.get(name) {
                (t.name.clone(), Some(t.node_id.clone()))
            } else {
                return; // builtin, package name, or unresolved
            }
        } else {
            return;
        };

        let (line, col) = syntax::pos(node);
        let id = stmt_id(self.rel_pkg, &self.base, line, col, "identifier");
        self.emit(Node {
            id: id.clone(),
            kind: NodeKind::Identifier,
            name: name.to_string(),
            line,
            col,
            type_info: type_info.clone(),
            ..Default::default()
        });
        self.emit_eval_type(&id, &type_info);
        if let Some(target) = ref_target {
            self.store.add_edge(Edge::plain(id, target, EdgeKind::Ref));
        }
    }

    fn visit_bool_literal(&mut self, node: TsNode) {
        self.visit_named_const(node, "bool");
    }

    fn visit_named_const(&mut self, node: TsNode, ty: &str) {
        let (line, col) = syntax::pos(node);
        let id = stmt_id(self.rel_pkg, &self.base, line, col, "identifier");
        self.emit(Node {
            id,
            kind: NodeKind::Identifier,
            name: syntax::text(self.src, node).to_string(),
            line,
            col,
            type_info: ty.to_string(),
            ..Default::default()
        });
    }

    fn visit_literal(&mut self, node: TsNode) {
        let (line, col) = syntax::pos(node);
        let id = self.id_at(node, "literal");
        let value = syntax::truncate(syntax::text(self.src, node), 50);
        let literal_kind = match node.kind() {
            "int_literal" => "INT",
            "float_literal" => "FLOAT",
            "imaginary_literal" => "IMAG",
            "rune_literal" => "CHAR",
            _ => "STRING",
        };
        let mut props = Props::new();
        props.insert("literal_kind".into(), literal_kind.into());
        self.emit(Node {
            id,
            kind: NodeKind::Literal,
            name: value,
            line,
            col,
            properties: props,
            ..Default::default()
        });
    }

    fn visit_composite_lit(&mut self, node: TsNode) -> Option<String> {
        let body = field(node, "body")?;
        let (line, col) = syntax::pos(body);
        let id = stmt_id(self.rel_pkg, &self.base, line, col, "composite_lit");
        let ty = field(node, "type")
            .map(|t| type_name(self.src, t))
            .unwrap_or_default();

        self.emit(Node {
            id: id.clone(),
            kind: NodeKind::CompositeLit,
            name: ty.clone(),
            line,
            col,
            ..Default::default()
        });
        self.emit_eval_type(&id, &ty);

        self.parent_stack.push(id.clone());
        for child in named_children(body) {
            self.visit(child);
        }
        self.parent_stack.pop();
        Some(id)
    }

    fn visit_op_expr(&mut self, node: TsNode, kind: NodeKind, id_kind: &str) {
        let op = field(node, "operator").unwrap_or(node);
        let name = syntax::text(self.src, op).to_string();
        let (line, col) = syntax::pos(op);
        let id = stmt_id(self.rel_pkg, &self.base, line, col, id_kind);
        self.emit(Node {
            id: id.clone(),
            kind,
            name,
            line,
            col,
            ..Default::default()
        });
        self.parent_stack.push(id);
        for child in named_children(node) {
            self.visit(child);
        }
        self.parent_stack.pop();
    }

    fn visit_bracket_expr(
        &mut self,
        node: TsNode,
        kind: NodeKind,
        id_kind: &str,
        name: &str,
        token: &str,
    ) {
        let at = syntax::child_of_kind(node, token).unwrap_or(node);
        let (line, col) = syntax::pos(at);
        let id = stmt_id(self.rel_pkg, &self.base, line, col, id_kind);
        self.emit(Node {
            id: id.clone(),
            kind,
            name: name.to_string(),
            line,
            col,
            ..Default::default()
        });
        self.parent_stack.push(id);
        for child in named_children(node) {
            self.visit(child);
        }
        self.parent_stack.pop();
    }

    fn visit_keyed_element(&mut self, node: TsNode) {
        let at = syntax::child_of_kind(node, ":").unwrap_or(node);
        let (line, col) = syntax::pos(at);
        let id = stmt_id(self.rel_pkg, &self.base, line, col, "key_value_expr");
        self.emit(Node {
            id: id.clone(),
            kind: NodeKind::KeyValueExpr,
            name: "key_value".to_string(),
            line,
            col,
            ..Default::default()
        });
        self.parent_stack.push(id);
        for child in named_children(node) {
            self.visit(child);
        }
        self.parent_stack.pop();
    }

    // =====================================================================
    // Callee analysis
    // =====================================================================

    fn callee_name(&self, fun: TsNode) -> String {
        match fun.kind() {
            "identifier" => syntax::text(self.src, fun).to_string(),
            "selector_expression" => {
                let sel = field(fun, "field")
                    .map(|f| syntax::text(self.src, f))
                    .unwrap_or("?");
                match field(fun, "operand") {
                    Some(op) if op.kind() == "identifier" => {
                        format!("{}.{}", syntax::text(self.src, op), sel)
                    }
                    _ => sel.to_string(),
                }
            }
            // Generic instantiation: f[T](...)
            "index_expression" | "generic_type" => field(fun, "operand")
                .or_else(|| fun.named_child(0))
                .map(|op| self.callee_name(op))
                .unwrap_or_else(|| "?".to_string()),
            "parenthesized_expression" => fun
                .named_child(0)
                .map(|inner| self.callee_name(inner))
                .unwrap_or_else(|| "?".to_string()),
            "func_literal" => "func literal".to_string(),
            _ => "?".to_string(),
        }
    }

    /// Static: direct call by name, method on a concrete receiver, or an
    /// immediately invoked function literal. Dynamic: interface dispatch or
    /// a call through a function-typed value.
    fn classify_dispatch(&self, fun: TsNode) -> &'static str {
        match fun.kind() {
            "identifier" => {
                let name = syntax::text(self.src, fun);
                if self.lookup(name).is_some() {
                    // Call through a local function value.
                    "dynamic"
                } else {
                    "static"
                }
            }
            "selector_expression" => {
                let Some(op) = field(fun, "operand") else {
                    return "dynamic";
                };
                if op.kind() == "identifier" {
                    let base = syntax::text(self.src, op);
                    if self.lookup(base).is_none()
                        && self.resolver.import_target(self.rel_file, base).is_some()
                    {
                        return "static"; // qualified package call
                    }
                }
                let base_type = self.infer_type(op);
                if self.is_interface_type(&base_type) {
                    "dynamic"
                } else {
                    "static"
                }
            }
            "func_literal" => "static",
            "parenthesized_expression" => fun
                .named_child(0)
                .map(|inner| self.classify_dispatch(inner))
                .unwrap_or("dynamic"),
            "index_expression" | "generic_type" => "static",
            _ => "dynamic",
        }
    }

    fn is_interface_type(&self, ty: &str) -> bool {
        if ty.is_empty() {
            return false;
        }
        if ty.starts_with("interface") {
            return true;
        }
        let base = type_base(ty);
        let def = if let Some((alias, name)) = base.split_once('.') {
            self.resolver
                .qualified_scope(self.rel_file, alias)
                .and_then(|s| s.types.get(name))
        } else {
            self.resolver
                .scope_by_rel(self.rel_pkg)
                .and_then(|s| s.types.get(base))
        };
        def.is_some_and(|d| d.shape == resolve::TypeShape::Interface)
    }

    fn detect_sync_primitive(&self, sel: TsNode) -> Option<&'static str> {
        let base = field(sel, "operand")?;
        let method = syntax::text(self.src, field(sel, "field")?);
        let recv_type = self.infer_type(base);
        let recv = type_base(&recv_type);

        match (recv, method) {
            ("sync.Mutex", "Lock") => Some("mutex_lock"),
            ("sync.Mutex", "Unlock") => Some("mutex_unlock"),
            ("sync.RWMutex", "Lock") => Some("rwmutex_lock"),
            ("sync.RWMutex", "Unlock") => Some("rwmutex_unlock"),
            ("sync.RWMutex", "RLock") => Some("rwmutex_rlock"),
            ("sync.RWMutex", "RUnlock") => Some("rwmutex_runlock"),
            ("sync.WaitGroup", "Add") => Some("wg_add"),
            ("sync.WaitGroup", "Done") => Some("wg_done"),
            ("sync.WaitGroup", "Wait") => Some("wg_wait"),
            ("sync.Once", "Do") => Some("once_do"),
            ("sync.Cond", "Wait") => Some("cond_wait"),
            ("sync.Cond", "Signal") => Some("cond_signal"),
            ("sync.Cond", "Broadcast") => Some("cond_broadcast"),
            _ => None,
        }
    }

    fn detect_context_derivation(&self, sel: TsNode) -> Option<&'static str> {
        let base = field(sel, "operand")?;
        if base.kind() != "identifier" {
            return None;
        }
        let alias = syntax::text(self.src, base);
        if self.lookup(alias).is_some() {
            return None;
        }
        if self.resolver.import_target(self.rel_file, alias)? != "context" {
            return None;
        }
        match syntax::text(self.src, field(sel, "field")?) {
            "WithCancel" => Some("WithCancel"),
            "WithTimeout" => Some("WithTimeout"),
            "WithDeadline" => Some("WithDeadline"),
            "WithValue" => Some("WithValue"),
            "WithCancelCause" => Some("WithCancelCause"),
            "WithTimeoutCause" => Some("WithTimeoutCause"),
            "WithDeadlineCause" => Some("WithDeadlineCause"),
            _ => None,
        }
    }

    /// error_wrap edges for `fmt.Errorf` with `%w` verbs and `errors.Join`.
    fn emit_error_wrap(&mut self, call_id: &str, callee: &str, args: &[TsNode]) {
        match callee {
            "errors.Join" => {
                for arg in args {
                    if let Some(err_id) = self.expr_node_id(*arg) {
                        self.store.add_edge(Edge::plain(
                            call_id.to_string(),
                            err_id,
                            EdgeKind::ErrorWrap,
                        ));
                    }
                }
            }
            "fmt.Errorf" => {
                if args.len() < 2 {
                    return;
                }
                let format = args[0];
                if format.kind() != "interpreted_string_literal"
                    && format.kind() != "raw_string_literal"
                {
                    return;
                }
                let text = syntax::text(self.src, format);
                for arg_idx in wrap_verb_positions(text) {
                    // Verbs consume arguments in order, starting after the
                    // format string.
                    if let Some(err_id) =
                        args.get(arg_idx + 1).and_then(|a| self.expr_node_id(*a))
                    {
                        self.store.add_edge(Edge::plain(
                            call_id.to_string(),
                            err_id,
                            EdgeKind::ErrorWrap,
                        ));
                    }
                }
            }
            _ => {}
        }
    }

    // =====================================================================
    // Node ID prediction
    // =====================================================================

    /// Predict the node ID the walker creates for an expression, for edges
    /// that address sub-expressions (argument, receiver, initializer,
    /// condition, spawn). Unhandled expression shapes yield None.
    pub fn expr_node_id(&self, expr: TsNode) -> Option<String> {
        let id = |node: TsNode, kind: &str| {
            let (line, col) = syntax::pos(node);
            Some(stmt_id(self.rel_pkg, &self.base, line, col, kind))
        };
        match expr.kind() {
            "identifier" | "true" | "false" | "iota" => id(expr, "identifier"),
            "call_expression" => {
                let at = field(expr, "arguments").unwrap_or(expr);
                id(at, "call")
            }
            "int_literal" | "float_literal" | "imaginary_literal" | "rune_literal"
            | "interpreted_string_literal" | "raw_string_literal" => id(expr, "literal"),
            "composite_literal" => {
                let at = field(expr, "body").unwrap_or(expr);
                id(at, "composite_lit")
            }
            "selector_expression" => {
                let at = field(expr, "field")?;
                id(at, "selector")
            }
            "func_literal" => id(expr, "func_lit"),
            "unary_expression" => {
                let at = field(expr, "operator").unwrap_or(expr);
                id(at, "unary_expr")
            }
            "binary_expression" => {
                let at = field(expr, "operator").unwrap_or(expr);
                id(at, "binary_expr")
            }
            "index_expression" => {
                let at = syntax::child_of_kind(expr, "[").unwrap_or(expr);
                id(at, "index_expr")
            }
            "slice_expression" => {
                let at = syntax::child_of_kind(expr, "[").unwrap_or(expr);
                id(at, "slice_expr")
            }
            "type_assertion_expression" => {
                let at = syntax::child_of_kind(expr, "(").unwrap_or(expr);
                id(at, "type_assert_expr")
            }
            "parenthesized_expression" => self.expr_node_id(expr.named_child(0)?),
            _ => None,
        }
    }

    /// Predict the node ID for a statement (for next_sibling edges).
    fn stmt_node_id(&self, stmt: TsNode) -> Option<String> {
        let id = |node: TsNode, kind: &str| {
            let (line, col) = syntax::pos(node);
            Some(stmt_id(self.rel_pkg, &self.base, line, col, kind))
        };
        match stmt.kind() {
            "if_statement" => id(stmt, "if"),
            "for_statement" => id(stmt, "for"),
            "expression_switch_statement" | "type_switch_statement" => id(stmt, "switch"),
            "select_statement" => id(stmt, "select"),
            "return_statement" => id(stmt, "return"),
            "short_var_declaration" => {
                let tok = syntax::child_of_kind(stmt, ":=")?;
                id(tok, "assign")
            }
            "assignment_statement" => {
                let op = field(stmt, "operator")?;
                id(op, "assign")
            }
            "go_statement" => id(stmt, "go"),
            "defer_statement" => id(stmt, "defer"),
            "send_statement" => {
                let arrow = syntax::child_of_kind(stmt, "<-")?;
                id(arrow, "send")
            }
            "break_statement" | "continue_statement" | "goto_statement"
            | "fallthrough_statement" => id(stmt, "branch"),
            "block" => id(stmt, "block"),
            "labeled_statement" => {
                let colon = syntax::child_of_kind(stmt, ":")?;
                id(colon, "label")
            }
            "inc_dec_statement" => {
                let tok = syntax::child_of_kind(stmt, "++")
                    .or_else(|| syntax::child_of_kind(stmt, "--"))?;
                id(tok, "incdec")
            }
            "expression_statement" => self.expr_node_id(stmt.named_child(0)?),
            "call_expression" => self.expr_node_id(stmt),
            "var_declaration" | "const_declaration" => {
                let spec = syntax::child_of_kind(stmt, "var_spec")
                    .or_else(|| syntax::child_of_kind(stmt, "const_spec"))?;
                let name = syntax::children(spec)
                    .into_iter()
                    .find(|c| c.kind() == "identifier")?;
                id(name, "local")
            }
            _ => None,
        }
    }

    // =====================================================================
    // Type inference (best effort)
    // =====================================================================

    fn infer_type(&self, expr: TsNode) -> String {
        match expr.kind() {
            "identifier" => {
                let name = syntax::text(self.src, expr);
                if let Some(binding) = self.lookup(name) {
                    return binding.type_name.clone();
                }
                if let Some(scope) = self.resolver.scope_by_rel(self.rel_pkg) {
                    if let Some(f) = scope.funcs.get(name) {
                        return f.signature();
                    }
                    if let Some(g) = scope.globals.get(name) {
                        return g.type_name.clone();
                    }
                }
                String::new()
            }
            "selector_expression" => {
                let Some(op) = field(expr, "operand") else {
                    return String::new();
                };
                let Some(sel) = field(expr, "field") else {
                    return String::new();
                };
                let sel_name = syntax::text(self.src, sel);
                self.resolve_selection(op, sel_name)
                    .map(|(_, ty, _)| ty)
                    .unwrap_or_default()
            }
            "call_expression" => self.infer_call_type(expr),
            "composite_literal" => field(expr, "type")
                .map(|t| type_name(self.src, t))
                .unwrap_or_default(),
            "unary_expression" => {
                let op = field(expr, "operator")
                    .map(|o| syntax::text(self.src, o))
                    .unwrap_or("");
                let operand_ty = field(expr, "operand")
                    .map(|o| self.infer_type(o))
                    .unwrap_or_default();
                match op {
                    "&" if !operand_ty.is_empty() => format!("*{operand_ty}"),
                    "*" => operand_ty.trim_start_matches('*').to_string(),
                    "<-" => operand_ty
                        .strip_prefix("chan ")
                        .or_else(|| operand_ty.strip_prefix("<-chan "))
                        .unwrap_or("")
                        .to_string(),
                    "!" => "bool".to_string(),
                    _ => operand_ty,
                }
            }
            "binary_expression" => {
                let op = field(expr, "operator")
                    .map(|o| syntax::text(self.src, o))
                    .unwrap_or("");
                match op {
                    "==" | "!=" | "<" | "<=" | ">" | ">=" | "&&" | "||" => "bool".to_string(),
                    _ => field(expr, "left")
                        .map(|l| self.infer_type(l))
                        .unwrap_or_default(),
                }
            }
            "index_expression" => {
                let base_ty = field(expr, "operand")
                    .map(|o| self.infer_type(o))
                    .unwrap_or_default();
                if let Some(elem) = base_ty.strip_prefix("[]") {
                    elem.to_string()
                } else if let Some(rest) = base_ty.strip_prefix("map[") {
                    rest.split_once(']')
                        .map(|(_, v)| v.to_string())
                        .unwrap_or_default()
                } else {
                    String::new()
                }
            }
            "slice_expression" => field(expr, "operand")
                .map(|o| self.infer_type(o))
                .unwrap_or_default(),
            "type_assertion_expression" => field(expr, "type")
                .map(|t| type_name(self.src, t))
                .unwrap_or_default(),
            "parenthesized_expression" => expr
                .named_child(0)
                .map(|inner| self.infer_type(inner))
                .unwrap_or_default(),
            "int_literal" => "int".to_string(),
            "float_literal" => "float64".to_string(),
            "rune_literal" => "rune".to_string(),
            "interpreted_string_literal" | "raw_string_literal" => "string".to_string(),
            "true" | "false" => "bool".to_string(),
            "func_literal" => "func".to_string(),
            _ => String::new(),
        }
    }

    fn infer_call_type(&self, call: TsNode) -> String {
        let Some(fun) = field(call, "function") else {
            return String::new();
        };
        let args: Vec<TsNode> = field(call, "arguments").map(named_children).unwrap_or_default();

        if fun.kind() == "identifier" {
            let name = syntax::text(self.src, fun);
            match name {
                "make" => {
                    return args
                        .first()
                        .map(|t| type_name(self.src, *t))
                        .unwrap_or_default()
                }
                "new" => {
                    return args
                        .first()
                        .map(|t| format!("*{}", type_name(self.src, *t)))
                        .unwrap_or_default()
                }
                "len" | "cap" => return "int".to_string(),
                "append" => {
                    return args.first().map(|a| self.infer_type(*a)).unwrap_or_default()
                }
                _ => {}
            }
            if self.lookup(name).is_none() {
                if let Some(scope) = self.resolver.scope_by_rel(self.rel_pkg) {
                    if let Some(f) = scope.funcs.get(name) {
                        return f
                            .results
                            .first()
                            .map(|r| r.type_name.clone())
                            .unwrap_or_default();
                    }
                }
            }
            return String::new();
        }

        if fun.kind() == "selector_expression" {
            let (Some(op), Some(sel)) = (field(fun, "operand"), field(fun, "field")) else {
                return String::new();
            };
            let sel_name = syntax::text(self.src, sel);
            // Qualified call into a loaded package.
            if op.kind() == "identifier" {
                let base = syntax::text(self.src, op);
                if self.lookup(base).is_none() {
                    if let Some(scope) = self.resolver.qualified_scope(self.rel_file, base) {
                        if let Some(f) = scope.funcs.get(sel_name) {
                            return f
                                .results
                                .first()
                                .map(|r| r.type_name.clone())
                                .unwrap_or_default();
                        }
                    }
                    return String::new();
                }
            }
            // Method call: resolve through the receiver's method set.
            let recv_ty = self.infer_type(op);
            if recv_ty.is_empty() {
                return String::new();
            }
            let base_name = type_base(&recv_ty);
            let (scope, key) = if let Some((alias, ty)) = base_name.split_once('.') {
                match self.resolver.qualified_scope(self.rel_file, alias) {
                    Some(s) => (s, ty.to_string()),
                    None => return String::new(),
                }
            } else {
                match self.resolver.scope_by_rel(self.rel_pkg) {
                    Some(s) => (s, base_name.to_string()),
                    None => return String::new(),
                }
            };
            if let Some(m) = scope.method(&key, sel_name) {
                return m
                    .results
                    .first()
                    .map(|r| r.type_name.clone())
                    .unwrap_or_default();
            }
        }
        String::new()
    }

    // =====================================================================
    // Comments
    // =====================================================================

    /// Collect comment nodes of the whole file, group consecutive lines,
    /// and attach one comment node per group to the file node.
    fn emit_comment_groups(&mut self, root: TsNode) {
        let mut comments: Vec<TsNode> = Vec::new();
        collect_comments(root, &mut comments);
        if comments.is_empty() {
            return;
        }

        let mut groups: Vec<Vec<TsNode>> = Vec::new();
        for comment in comments {
            match groups.last_mut() {
                Some(group)
                    if group
                        .last()
                        .is_some_and(|prev| prev.end_position().row + 1 == comment.start_position().row) =>
                {
                    group.push(comment)
                }
                _ => groups.push(vec![comment]),
            }
        }

        for group in groups {
            let first = group[0];
            let (line, col) = syntax::pos(first);
            let id = stmt_id(self.rel_pkg, &self.base, line, col, "comment");
            let text: Vec<String> = group
                .iter()
                .map(|c| clean_comment(syntax::text(self.src, *c)))
                .collect();
            let name = syntax::truncate(text.join("\n").trim(), 200);
            let end = group.last().map(|c| syntax::end_line(*c)).unwrap_or(line);

            self.positions.set(self.rel_file, line, col, &id);
            self.store.add_node(Node {
                id: id.clone(),
                kind: NodeKind::Comment,
                name,
                file: self.rel_file.to_string(),
                line,
                col,
                end_line: end,
                package: self.rel_pkg.to_string(),
                ..Default::default()
            });
            self.store.add_edge(Edge::plain(
                self.file_node_id.clone(),
                id,
                EdgeKind::Ast,
            ));
        }
    }
}

fn collect_comments<'t>(node: TsNode<'t>, out: &mut Vec<TsNode<'t>>) {
    if node.kind() == "comment" {
        out.push(node);
        return;
    }
    for child in syntax::children(node) {
        collect_comments(child, out);
    }
}

fn clean_comment(raw: &str) -> String {
    let s = raw.trim();
    if let Some(line) = s.strip_prefix("//") {
        return line.trim().to_string();
    }
    s.trim_start_matches("/*")
        .trim_end_matches("*/")
        .trim()
        .to_string()
}

/// Argument indexes (0-based, counting from the first argument after the
/// format string) consumed by `%w` verbs in a format string.
fn wrap_verb_positions(format: &str) -> Vec<usize> {
    let bytes = format.as_bytes();
    let mut out = Vec::new();
    let mut arg = 0usize;
    let mut i = 0usize;
    while i + 1 < bytes.len() {
        if bytes[i] != b'%' {
            i += 1;
            continue;
        }
        i += 1;
        if bytes[i] == b'%' {
            i += 1;
            continue;
        }
        while i < bytes.len() && matches!(bytes[i], b'+' | b'-' | b'#' | b' ' | b'0') {
            i += 1;
        }
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
        }
        if i < bytes.len() && bytes[i] == b'.' {
            i += 1;
            while i < bytes.len() && bytes[i].is_ascii_digit() {
                i += 1;
            }
        }
        if i >= bytes.len() {
            break;
        }
        if bytes[i] == b'w' {
            out.push(arg);
        }
        arg += 1;
        i += 1;
    }
    out
}

/// Recover (line, col) from a position-keyed node ID.
fn id_position(id: &str) -> Option<(usize, usize)> {
    let mut parts = id.rsplit(':');
    let _kind = parts.next()?;
    let col = parts.next()?.parse().ok()?;
    let line = parts.next()?.parse().ok()?;
    Some((line, col))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wrap_verbs_count_argument_positions() {
        assert_eq!(wrap_verb_positions(r#""scrape %s: %w""#), vec![1]);
        assert_eq!(wrap_verb_positions(r#""%w / %w""#), vec![0, 1]);
        assert_eq!(wrap_verb_positions(r#""100%% done: %w""#), vec![0]);
        assert_eq!(wrap_verb_positions(r#""%d items""#), Vec::<usize>::new());
        assert_eq!(wrap_verb_positions(r#""%-8.3f then %w""#), vec![1]);
    }

    #[test]
    fn id_position_roundtrip() {
        let id = stmt_id("scrape", "loop.go", 42, 7, "parameter");
        assert_eq!(id_position(&id), Some((42, 7)));
    }
}
