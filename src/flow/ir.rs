//! The flow intermediate representation and its builder.
//!
//! Function bodies are lowered into basic blocks of instructions in a naive
//! SSA-style form: every expression produces a value, named locals are
//! collapsed to their defining values, and the channel-relevant operations
//! are explicit instructions (MakeChan, Send, Recv, Select, Go, Defer,
//! MakeClosure). Value referrers are computed after lowering; the
//! extractors downstream work purely on def→use chains and block structure.
//!
//! Positions follow the walker's conventions (calls at the argument list's
//! opening paren, receives at the arrow, operators at the operator token)
//! so an instruction's position resolves to the statement-level node the
//! walker registered for it.

use once_cell::sync::Lazy;
use rustc_hash::{FxHashMap, FxHashSet};
use tree_sitter::Node as TsNode;

use crate::ids::{self, stmt_id, FunctionIndex};
use crate::loader::SourceFile;
use crate::resolve::{self, Resolver};
use crate::syntax::{self, field, named_children, type_base, type_name};

pub type ValueId = usize;

/// Direction of a select state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChanDir {
    Send,
    Recv,
}

/// One communication state of a `select`.
#[derive(Debug, Clone)]
pub struct SelectState {
    pub dir: ChanDir,
    pub chan: ValueId,
    pub pos: Option<(usize, usize)>,
}

/// How a call site names its target.
#[derive(Debug, Clone)]
pub enum Callee {
    /// Statically resolved in-scope function or method.
    Known { node_id: String },
    /// Qualified call into a package outside the module set.
    External { pkg_path: String, name: String },
    /// A language builtin (len, append, close, ...).
    Builtin(String),
    /// Call through a function-typed value.
    Value(ValueId),
    /// Method call whose receiver type drives resolution.
    Method {
        recv: Option<ValueId>,
        recv_type: String,
        name: String,
    },
    /// Unresolvable callee; no inter-procedural edges.
    Unknown,
}

/// Kinds of values/instructions. Entries that produce no value (Store,
/// Send, terminators) still live in the value arena so referrer traversal
/// is uniform.
#[derive(Debug, Clone)]
pub enum ValueKind {
    Param { index: usize },
    FreeVar { decl_node_id: Option<String> },
    Global { decl_node_id: Option<String> },
    /// A reference to a declared function used as a value.
    FuncRef { node_id: String },
    Lit,
    Composite,
    MakeChan,
    MakeClosure { func: usize },
    FieldAddr { field: String },
    Load,
    Store,
    Send,
    Recv,
    Call { callee: Callee },
    Go { callee: Callee },
    DeferCall { callee: Callee },
    Panic,
    Recover,
    Select { states: Vec<SelectState> },
    UnOp,
    BinOp,
    Return,
    If,
    Opaque,
}

/// A value or instruction in the arena.
#[derive(Debug, Clone)]
pub struct ValueData {
    pub kind: ValueKind,
    /// (line, col) in the function's file, walker-position-compatible.
    pub pos: Option<(usize, usize)>,
    /// Source-level name, when one exists (locals, params, free vars,
    /// globals, field addresses).
    pub name: Option<String>,
    pub operands: Vec<ValueId>,
}

/// A basic block: instruction list plus successor indexes. `is_if` marks
/// blocks ending in a two-way conditional branch, whose successors are
/// ordered [true, false].
#[derive(Debug, Clone, Default)]
pub struct BlockData {
    pub instrs: Vec<ValueId>,
    pub succs: Vec<usize>,
    pub is_if: bool,
}

/// A lowered function.
pub struct FlowFunc {
    /// Node ID of the function (via the function index).
    pub node_id: String,
    pub rel_pkg: String,
    pub rel_file: String,
    pub values: Vec<ValueData>,
    pub blocks: Vec<BlockData>,
    pub params: Vec<ValueId>,
    pub free_vars: Vec<ValueId>,
    /// True for function literals (lowered inside another function).
    pub is_child: bool,
    /// Per-value referrer lists, parallel to `values`.
    pub referrers: Vec<Vec<ValueId>>,
}

/// The whole lowered program.
#[derive(Default)]
pub struct FlowProgram {
    pub funcs: Vec<FlowFunc>,
    pub by_node_id: FxHashMap<String, usize>,
}

impl FlowProgram {
    pub fn func_index(&self, node_id: &str) -> Option<usize> {
        self.by_node_id.get(node_id).copied()
    }
}

static BUILTINS: Lazy<FxHashSet<&'static str>> = Lazy::new(|| {
    [
        "len", "cap", "make", "new", "append", "copy", "delete", "close", "panic", "recover",
        "print", "println", "complex", "real", "imag", "min", "max", "clear",
    ]
    .into_iter()
    .collect()
});

/// Lower every function of a parsed file into the program.
pub fn lower_file(
    program: &mut FlowProgram,
    file: &SourceFile,
    rel_pkg: &str,
    resolver: &Resolver,
    functions: &FunctionIndex,
) {
    let base = ids::base_name(&file.rel).to_string();
    let mut lowerer = Lowerer {
        src: &file.source,
        rel_pkg,
        rel_file: &file.rel,
        base,
        resolver,
        functions,
        program,
        frames: Vec::new(),
    };

    let root = file.tree.root_node();
    for decl in named_children(root) {
        if decl.kind() == "function_declaration" || decl.kind() == "method_declaration" {
            lowerer.lower_function(decl);
        }
    }
}

#[derive(Clone)]
struct EnvEntry {
    value: ValueId,
    decl_node_id: Option<String>,
    type_name: String,
}

/// Per-function lowering state. Frames nest for function literals; a
/// literal's frame sits on top of its enclosing function's frame.
struct Frame {
    node_id: String,
    values: Vec<ValueData>,
    blocks: Vec<BlockData>,
    params: Vec<ValueId>,
    free_vars: Vec<ValueId>,
    /// Outer-frame value IDs bound by this literal, parallel to free_vars.
    free_bindings: Vec<ValueId>,
    cur: usize,
    env: Vec<FxHashMap<String, EnvEntry>>,
    globals: FxHashMap<String, ValueId>,
    loop_stack: Vec<(usize, usize)>,
}

impl Frame {
    fn new(node_id: String) -> Self {
        Self {
            node_id,
            values: Vec::new(),
            blocks: vec![BlockData::default()],
            params: Vec::new(),
            free_vars: Vec::new(),
            free_bindings: Vec::new(),
            cur: 0,
            env: vec![FxHashMap::default()],
            globals: FxHashMap::default(),
            loop_stack: Vec::new(),
        }
    }
}

struct Lowerer<'a> {
    src: &'a str,
    rel_pkg: &'a str,
    rel_file: &'a str,
    base: String,
    resolver: &'a Resolver,
    functions: &'a FunctionIndex,
    program: &'a mut FlowProgram,
    frames: Vec<Frame>,
}

impl<'a> Lowerer<'a> {
    // -- frame plumbing ---------------------------------------------------

    fn frame(&mut self) -> &mut Frame {
        self.frames.last_mut().expect("active frame")
    }

    fn new_value(
        &mut self,
        kind: ValueKind,
        pos: Option<(usize, usize)>,
        name: Option<String>,
        operands: Vec<ValueId>,
    ) -> ValueId {
        let frame = self.frame();
        let id = frame.values.len();
        frame.values.push(ValueData {
            kind,
            pos,
            name,
            operands,
        });
        id
    }

    /// Append an instruction value to the current block.
    fn instr(
        &mut self,
        kind: ValueKind,
        pos: Option<(usize, usize)>,
        name: Option<String>,
        operands: Vec<ValueId>,
    ) -> ValueId {
        let id = self.new_value(kind, pos, name, operands);
        let frame = self.frame();
        let cur = frame.cur;
        frame.blocks[cur].instrs.push(id);
        id
    }

    fn new_block(&mut self) -> usize {
        let frame = self.frame();
        frame.blocks.push(BlockData::default());
        frame.blocks.len() - 1
    }

    fn link(&mut self, from: usize, to: usize) {
        let frame = self.frame();
        if !frame.blocks[from].succs.contains(&to) {
            frame.blocks[from].succs.push(to);
        }
    }

    fn set_current(&mut self, block: usize) {
        self.frame().cur = block;
    }

    fn current(&mut self) -> usize {
        self.frame().cur
    }

    fn current_is_terminated(&mut self) -> bool {
        let frame = self.frame();
        let cur = frame.cur;
        frame.blocks[cur]
            .instrs
            .last()
            .is_some_and(|&v| matches!(frame.values[v].kind, ValueKind::Return | ValueKind::Panic))
    }

    // -- env --------------------------------------------------------------

    fn bind(&mut self, name: &str, entry: EnvEntry) {
        if name == "_" || name.is_empty() {
            return;
        }
        if let Some(scope) = self.frame().env.last_mut() {
            scope.insert(name.to_string(), entry);
        }
    }

    fn rebind(&mut self, name: &str, value: ValueId) {
        for scope in self.frame().env.iter_mut().rev() {
            if let Some(entry) = scope.get_mut(name) {
                entry.value = value;
                return;
            }
        }
    }

    fn lookup_local(&self, name: &str) -> Option<EnvEntry> {
        let frame = self.frames.last()?;
        frame
            .env
            .iter()
            .rev()
            .find_map(|scope| scope.get(name))
            .cloned()
    }

    /// Package-level global info, extracted by value to keep borrows local.
    fn package_global(&self, name: &str) -> Option<(String, String)> {
        let scope = self.resolver.scope_by_rel(self.rel_pkg)?;
        scope
            .globals
            .get(name)
            .map(|g| (g.node_id.clone(), g.type_name.clone()))
    }

    fn package_func(&self, name: &str) -> Option<(String, String)> {
        let scope = self.resolver.scope_by_rel(self.rel_pkg)?;
        scope.funcs.get(name).map(|f| (f.node_id.clone(), f.signature()))
    }

    /// Binding in the immediately enclosing function's frame.
    fn parent_binding(&self, name: &str) -> Option<EnvEntry> {
        if self.frames.len() < 2 {
            return None;
        }
        let parent = &self.frames[self.frames.len() - 2];
        parent
            .env
            .iter()
            .rev()
            .find_map(|scope| scope.get(name))
            .cloned()
    }

    /// Resolve a name against the current frame, the package scope, and
    /// finally the immediately enclosing function (creating a free
    /// variable). Deeper nesting is not chased.
    fn lookup(&mut self, name: &str) -> Option<EnvEntry> {
        if let Some(entry) = self.lookup_local(name) {
            return Some(entry);
        }

        if let Some((decl_id, ty)) = self.package_global(name) {
            if let Some(&v) = self.frame().globals.get(name) {
                return Some(EnvEntry {
                    value: v,
                    decl_node_id: Some(decl_id),
                    type_name: ty,
                });
            }
            let v = self.new_value(
                ValueKind::Global {
                    decl_node_id: Some(decl_id.clone()),
                },
                None,
                Some(name.to_string()),
                Vec::new(),
            );
            self.frame().globals.insert(name.to_string(), v);
            return Some(EnvEntry {
                value: v,
                decl_node_id: Some(decl_id),
                type_name: ty,
            });
        }

        if let Some((node_id, sig)) = self.package_func(name) {
            let v = self.new_value(
                ValueKind::FuncRef { node_id },
                None,
                Some(name.to_string()),
                Vec::new(),
            );
            return Some(EnvEntry {
                value: v,
                decl_node_id: None,
                type_name: sig,
            });
        }

        if let Some(outer) = self.parent_binding(name) {
            let fv = self.new_value(
                ValueKind::FreeVar {
                    decl_node_id: outer.decl_node_id.clone(),
                },
                None,
                Some(name.to_string()),
                Vec::new(),
            );
            let frame = self.frame();
            frame.free_vars.push(fv);
            frame.free_bindings.push(outer.value);
            // Cache in the outermost scope so repeated uses share one
            // free variable.
            if let Some(scope) = frame.env.first_mut() {
                scope.insert(
                    name.to_string(),
                    EnvEntry {
                        value: fv,
                        decl_node_id: outer.decl_node_id.clone(),
                        type_name: outer.type_name.clone(),
                    },
                );
            }
            return Some(EnvEntry {
                value: fv,
                decl_node_id: outer.decl_node_id,
                type_name: outer.type_name,
            });
        }

        None
    }

    // -- functions --------------------------------------------------------

    /// Lower a function declaration or literal. Returns the program index
    /// and, for literals, the outer-frame values it captured.
    fn lower_function(&mut self, node: TsNode) -> Option<(usize, Vec<ValueId>)> {
        let body = field(node, "body")?;
        let (line, col) = syntax::pos(node);
        let node_id = self.functions.get(self.rel_file, line, col)?.to_string();
        let is_child = !self.frames.is_empty();

        self.frames.push(Frame::new(node_id));

        // Receiver binds like a parameter without a declaration node.
        if node.kind() == "method_declaration" {
            let recv_ty = resolve::receiver_type(self.src, node).unwrap_or_default();
            if let Some(name) = resolve::receiver_name(self.src, node) {
                let index = self.frame().params.len();
                let v = self.new_value(
                    ValueKind::Param { index },
                    None,
                    Some(name.clone()),
                    Vec::new(),
                );
                self.frame().params.push(v);
                self.bind(
                    &name,
                    EnvEntry {
                        value: v,
                        decl_node_id: None,
                        type_name: recv_ty,
                    },
                );
            }
        }

        if let Some(params) = field(node, "parameters") {
            let defs =
                resolve::parse_params(self.src, params, self.rel_pkg, &self.base, "parameter");
            for def in defs {
                let index = self.frame().params.len();
                let pos = id_pos(&def.node_id);
                let v = self.new_value(
                    ValueKind::Param { index },
                    pos,
                    Some(def.name.clone()),
                    Vec::new(),
                );
                self.frame().params.push(v);
                self.bind(
                    &def.name,
                    EnvEntry {
                        value: v,
                        decl_node_id: Some(def.node_id.clone()),
                        type_name: def.type_name.clone(),
                    },
                );
            }
        }

        self.lower_block(body);

        let frame = self.frames.pop().expect("frame");
        let bindings = frame.free_bindings;
        let mut blocks = frame.blocks;
        prune_unreachable_blocks(&mut blocks);
        let mut func = FlowFunc {
            node_id: frame.node_id,
            rel_pkg: self.rel_pkg.to_string(),
            rel_file: self.rel_file.to_string(),
            values: frame.values,
            blocks,
            params: frame.params,
            free_vars: frame.free_vars,
            is_child,
            referrers: Vec::new(),
        };
        compute_referrers(&mut func);

        let idx = self.program.funcs.len();
        self.program.by_node_id.insert(func.node_id.clone(), idx);
        self.program.funcs.push(func);
        Some((idx, bindings))
    }

    fn lower_block(&mut self, block: TsNode) {
        self.frame().env.push(FxHashMap::default());
        for stmt in named_children(block) {
            self.lower_stmt(stmt);
        }
        self.frame().env.pop();
    }

    // -- statements -------------------------------------------------------

    fn lower_stmt(&mut self, stmt: TsNode) {
        match stmt.kind() {
            "block" => self.lower_block(stmt),
            "short_var_declaration" => self.lower_short_var(stmt),
            "assignment_statement" => self.lower_assignment(stmt),
            "var_declaration" | "const_declaration" => self.lower_var_decl(stmt),
            "expression_statement" => {
                for child in named_children(stmt) {
                    self.lower_expr(child);
                }
            }
            "call_expression" | "unary_expression" | "binary_expression"
            | "selector_expression" => {
                self.lower_expr(stmt);
            }
            "if_statement" => self.lower_if(stmt),
            "for_statement" => self.lower_for(stmt),
            "expression_switch_statement" | "type_switch_statement" => self.lower_switch(stmt),
            "select_statement" => self.lower_select(stmt),
            "return_statement" => {
                let mut operands = Vec::new();
                for list in named_children(stmt) {
                    for expr in named_children(list) {
                        if let Some(v) = self.lower_expr(expr) {
                            operands.push(v);
                        }
                    }
                }
                let pos = Some(syntax::pos(stmt));
                self.instr(ValueKind::Return, pos, None, operands);
            }
            "go_statement" => {
                if let Some(call) = syntax::child_of_kind(stmt, "call_expression") {
                    self.lower_call(call, CallMode::Go);
                }
            }
            "defer_statement" => {
                if let Some(call) = syntax::child_of_kind(stmt, "call_expression") {
                    self.lower_call(call, CallMode::Defer);
                }
            }
            "send_statement" => self.lower_send(stmt),
            "labeled_statement" => {
                for child in named_children(stmt) {
                    if child.kind() != "label_name" {
                        self.lower_stmt(child);
                    }
                }
            }
            "break_statement" => {
                if let Some(&(_, exit)) = self.frame().loop_stack.last() {
                    let cur = self.current();
                    self.link(cur, exit);
                    let dead = self.new_block();
                    self.set_current(dead);
                }
            }
            "continue_statement" => {
                if let Some(&(header, _)) = self.frame().loop_stack.last() {
                    let cur = self.current();
                    self.link(cur, header);
                    let dead = self.new_block();
                    self.set_current(dead);
                }
            }
            "inc_dec_statement" => {
                let operands: Vec<ValueId> = named_children(stmt)
                    .first()
                    .and_then(|n| self.lower_expr(*n))
                    .into_iter()
                    .collect();
                let pos = syntax::child_of_kind(stmt, "++")
                    .or_else(|| syntax::child_of_kind(stmt, "--"))
                    .map(syntax::pos);
                self.instr(ValueKind::BinOp, pos, None, operands);
            }
            "goto_statement" | "fallthrough_statement" | "empty_statement" | "comment" => {}
            _ => {
                for child in named_children(stmt) {
                    self.lower_stmt(child);
                }
            }
        }
    }

    fn lower_short_var(&mut self, stmt: TsNode) {
        let lhs: Vec<TsNode> = field(stmt, "left").map(named_children).unwrap_or_default();
        let rhs: Vec<TsNode> = field(stmt, "right").map(named_children).unwrap_or_default();

        let values: Vec<Option<ValueId>> = rhs.iter().map(|r| self.lower_expr(*r)).collect();

        for (i, l) in lhs.iter().enumerate() {
            if l.kind() != "identifier" {
                continue;
            }
            let name = syntax::text(self.src, *l).to_string();
            if name == "_" {
                continue;
            }
            let (line, col) = syntax::pos(*l);
            let decl = stmt_id(self.rel_pkg, &self.base, line, col, "local");
            let value = if lhs.len() == rhs.len() {
                values.get(i).copied().flatten()
            } else {
                values.first().copied().flatten()
            };
            let Some(value) = value else { continue };
            let ty = if lhs.len() == rhs.len() {
                rhs.get(i).map(|r| self.infer(*r)).unwrap_or_default()
            } else {
                String::new()
            };
            // Name the defining value after the variable so DFG edges can
            // carry var_name.
            if self.frame().values[value].name.is_none() {
                self.frame().values[value].name = Some(name.clone());
            }
            self.bind(
                &name,
                EnvEntry {
                    value,
                    decl_node_id: Some(decl),
                    type_name: ty,
                },
            );
        }
    }

    fn lower_assignment(&mut self, stmt: TsNode) {
        let lhs: Vec<TsNode> = field(stmt, "left").map(named_children).unwrap_or_default();
        let rhs: Vec<TsNode> = field(stmt, "right").map(named_children).unwrap_or_default();
        let op_pos = field(stmt, "operator").map(syntax::pos);

        let values: Vec<Option<ValueId>> = rhs.iter().map(|r| self.lower_expr(*r)).collect();

        for (i, l) in lhs.iter().enumerate() {
            let value = if lhs.len() == rhs.len() {
                values.get(i).copied().flatten()
            } else {
                values.first().copied().flatten()
            };
            let Some(value) = value else { continue };

            match l.kind() {
                "identifier" => {
                    let name = syntax::text(self.src, *l).to_string();
                    if self.lookup_local(&name).is_some() {
                        self.rebind(&name, value);
                    } else if let Some(entry) = self.lookup(&name) {
                        // Package global or captured cell: explicit store.
                        self.instr(
                            ValueKind::Store,
                            op_pos,
                            Some(name.clone()),
                            vec![entry.value, value],
                        );
                    }
                }
                "selector_expression" => {
                    if let Some(addr) = self.lower_field_addr(*l) {
                        self.instr(ValueKind::Store, op_pos, None, vec![addr, value]);
                    }
                }
                _ => {
                    if let Some(addr) = self.lower_expr(*l) {
                        self.instr(ValueKind::Store, op_pos, None, vec![addr, value]);
                    }
                }
            }
        }
    }

    fn lower_var_decl(&mut self, stmt: TsNode) {
        let mut specs: Vec<TsNode> = Vec::new();
        for child in syntax::children(stmt) {
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
            let declared = field(spec, "type").map(|t| type_name(self.src, t));
            let names: Vec<TsNode> = syntax::children(spec)
                .into_iter()
                .filter(|c| c.kind() == "identifier")
                .collect();
            let values: Vec<TsNode> = field(spec, "value").map(named_children).unwrap_or_default();
            let lowered: Vec<Option<ValueId>> = values.iter().map(|v| self.lower_expr(*v)).collect();

            for (i, name_node) in names.iter().enumerate() {
                let name = syntax::text(self.src, *name_node).to_string();
                if name == "_" {
                    continue;
                }
                let (line, col) = syntax::pos(*name_node);
                let decl = stmt_id(self.rel_pkg, &self.base, line, col, "local");
                let ty = declared.clone().unwrap_or_else(|| {
                    if names.len() == values.len() {
                        values.get(i).map(|v| self.infer(*v)).unwrap_or_default()
                    } else {
                        String::new()
                    }
                });
                let value = if names.len() == values.len() {
                    lowered.get(i).copied().flatten()
                } else {
                    None
                };
                let value = value.unwrap_or_else(|| {
                    // Zero-value declaration: the name itself is the
                    // definition site.
                    self.instr(
                        ValueKind::Opaque,
                        Some((line, col)),
                        Some(name.clone()),
                        Vec::new(),
                    )
                });
                if self.frame().values[value].name.is_none() {
                    self.frame().values[value].name = Some(name.clone());
                }
                self.bind(
                    &name,
                    EnvEntry {
                        value,
                        decl_node_id: Some(decl),
                        type_name: ty,
                    },
                );
            }
        }
    }

    fn lower_if(&mut self, stmt: TsNode) {
        if let Some(init) = field(stmt, "initializer") {
            self.lower_stmt(init);
        }
        let cond = field(stmt, "condition").and_then(|c| self.lower_expr(c));
        let pos = Some(syntax::pos(stmt));
        self.instr(ValueKind::If, pos, None, cond.into_iter().collect());

        let cond_block = self.current();
        self.frame().blocks[cond_block].is_if = true;

        let then_block = self.new_block();
        let join = self.new_block();
        self.link(cond_block, then_block);

        self.set_current(then_block);
        if let Some(consequence) = field(stmt, "consequence") {
            self.lower_block(consequence);
        }
        if !self.current_is_terminated() {
            let cur = self.current();
            self.link(cur, join);
        }

        match field(stmt, "alternative") {
            Some(alt) => {
                let else_block = self.new_block();
                self.link(cond_block, else_block);
                self.set_current(else_block);
                if alt.kind() == "block" {
                    self.lower_block(alt);
                } else {
                    // `else if`: the alternative is a chained if_statement.
                    self.lower_stmt(alt);
                }
                if !self.current_is_terminated() {
                    let cur = self.current();
                    self.link(cur, join);
                }
            }
            None => {
                self.link(cond_block, join);
            }
        }

        self.set_current(join);
    }

    fn lower_for(&mut self, stmt: TsNode) {
        if let Some(init) = field(stmt, "initializer") {
            self.lower_stmt(init);
        }

        let entry = self.current();
        let header = self.new_block();
        let body = self.new_block();
        let exit = self.new_block();
        self.link(entry, header);

        self.set_current(header);
        let range = syntax::child_of_kind(stmt, "range_clause");
        let is_range = range.is_some();
        if is_range {
            self.frame().env.push(FxHashMap::default());
        }
        let cond = if let Some(range) = range {
            let operand = field(range, "right").and_then(|r| self.lower_expr(r));
            if let Some(left) = field(range, "left") {
                for ident in named_children(left) {
                    if ident.kind() == "identifier" {
                        let name = syntax::text(self.src, ident).to_string();
                        let (line, col) = syntax::pos(ident);
                        let v = self.instr(
                            ValueKind::Opaque,
                            Some((line, col)),
                            Some(name.clone()),
                            operand.into_iter().collect(),
                        );
                        self.bind(
                            &name,
                            EnvEntry {
                                value: v,
                                decl_node_id: None,
                                type_name: String::new(),
                            },
                        );
                    }
                }
            }
            operand
        } else {
            field(stmt, "condition").and_then(|c| self.lower_expr(c))
        };
        let has_cond = cond.is_some();
        let pos = Some(syntax::pos(stmt));
        self.instr(ValueKind::If, pos, None, cond.into_iter().collect());
        self.frame().blocks[header].is_if = true;
        self.link(header, body);
        // A condition-less `for {}` never falls through to the exit; the
        // exit block stays for `break` targets and is pruned if unused.
        if has_cond || is_range {
            self.link(header, exit);
        }

        self.frame().loop_stack.push((header, exit));
        self.set_current(body);
        if let Some(body_node) = field(stmt, "body") {
            self.lower_block(body_node);
        }
        if let Some(update) = field(stmt, "update") {
            self.lower_stmt(update);
        }
        if !self.current_is_terminated() {
            let cur = self.current();
            self.link(cur, header);
        }
        self.frame().loop_stack.pop();
        if is_range {
            self.frame().env.pop();
        }

        self.set_current(exit);
    }

    fn lower_switch(&mut self, stmt: TsNode) {
        if let Some(init) = field(stmt, "initializer") {
            self.lower_stmt(init);
        }
        if let Some(value) = field(stmt, "value") {
            self.lower_expr(value);
        }

        let dispatch = self.current();
        let join = self.new_block();
        let mut has_default = false;

        for case in named_children(stmt) {
            let kind = case.kind();
            if kind != "expression_case" && kind != "type_case" && kind != "default_case" {
                continue;
            }
            if kind == "default_case" {
                has_default = true;
            }
            let case_block = self.new_block();
            self.link(dispatch, case_block);
            self.set_current(case_block);
            self.frame().env.push(FxHashMap::default());
            for child in named_children(case) {
                self.lower_stmt(child);
            }
            self.frame().env.pop();
            if !self.current_is_terminated() {
                let cur = self.current();
                self.link(cur, join);
            }
        }
        if !has_default {
            self.link(dispatch, join);
        }
        self.set_current(join);
    }

    fn lower_select(&mut self, stmt: TsNode) {
        let mut states = Vec::new();
        let mut cases: Vec<TsNode> = Vec::new();

        for case in named_children(stmt) {
            match case.kind() {
                "communication_case" => {
                    if let Some(send) = syntax::child_of_kind(case, "send_statement") {
                        let chan = field(send, "channel").and_then(|c| self.lower_expr(c));
                        if let Some(value) = field(send, "value") {
                            self.lower_expr(value);
                        }
                        if let Some(chan) = chan {
                            let pos = syntax::child_of_kind(send, "<-").map(syntax::pos);
                            states.push(SelectState {
                                dir: ChanDir::Send,
                                chan,
                                pos,
                            });
                        }
                    } else if let Some(recv) = find_receive_expr(case) {
                        let chan = field(recv, "operand").and_then(|c| self.lower_expr(c));
                        if let Some(chan) = chan {
                            let pos = field(recv, "operator")
                                .map(syntax::pos)
                                .or(Some(syntax::pos(recv)));
                            states.push(SelectState {
                                dir: ChanDir::Recv,
                                chan,
                                pos,
                            });
                        }
                    }
                    cases.push(case);
                }
                "default_case" => cases.push(case),
                _ => {}
            }
        }

        let pos = Some(syntax::pos(stmt));
        let operands: Vec<ValueId> = states.iter().map(|s| s.chan).collect();
        self.instr(ValueKind::Select { states }, pos, None, operands);

        let dispatch = self.current();
        let join = self.new_block();
        for case in cases {
            let case_block = self.new_block();
            self.link(dispatch, case_block);
            self.set_current(case_block);
            self.frame().env.push(FxHashMap::default());
            for child in named_children(case) {
                if child.kind() != "send_statement" && child.kind() != "receive_statement" {
                    self.lower_stmt(child);
                }
            }
            self.frame().env.pop();
            if !self.current_is_terminated() {
                let cur = self.current();
                self.link(cur, join);
            }
        }
        self.set_current(join);
    }

    fn lower_send(&mut self, stmt: TsNode) {
        let chan = field(stmt, "channel").and_then(|c| self.lower_expr(c));
        let value = field(stmt, "value").and_then(|v| self.lower_expr(v));
        let pos = syntax::child_of_kind(stmt, "<-").map(syntax::pos);
        let operands: Vec<ValueId> = chan.into_iter().chain(value).collect();
        self.instr(ValueKind::Send, pos, None, operands);
    }

    // -- expressions ------------------------------------------------------

    fn lower_expr(&mut self, expr: TsNode) -> Option<ValueId> {
        match expr.kind() {
            "identifier" => {
                let name = syntax::text(self.src, expr);
                self.lookup(name).map(|e| e.value)
            }
            "int_literal" | "float_literal" | "imaginary_literal" | "rune_literal"
            | "interpreted_string_literal" | "raw_string_literal" | "true" | "false" | "nil"
            | "iota" => {
                let pos = Some(syntax::pos(expr));
                Some(self.instr(ValueKind::Lit, pos, None, Vec::new()))
            }
            "composite_literal" => {
                let mut operands = Vec::new();
                if let Some(body) = field(expr, "body") {
                    for elem in named_children(body) {
                        for sub in elem_expressions(elem) {
                            if let Some(v) = self.lower_expr(sub) {
                                operands.push(v);
                            }
                        }
                    }
                }
                let pos = field(expr, "body").map(syntax::pos);
                Some(self.instr(ValueKind::Composite, pos, None, operands))
            }
            "call_expression" => self.lower_call(expr, CallMode::Normal),
            "selector_expression" => self.lower_selector_value(expr),
            "unary_expression" => {
                let op_node = field(expr, "operator")?;
                let op = syntax::text(self.src, op_node);
                let pos = Some(syntax::pos(op_node));
                let operand = field(expr, "operand").and_then(|o| self.lower_expr(o));
                match op {
                    "<-" => {
                        let chan = operand?;
                        Some(self.instr(ValueKind::Recv, pos, None, vec![chan]))
                    }
                    "*" => {
                        let addr = operand?;
                        Some(self.instr(ValueKind::Load, pos, None, vec![addr]))
                    }
                    _ => Some(self.instr(ValueKind::UnOp, pos, None, operand.into_iter().collect())),
                }
            }
            "binary_expression" => {
                let left = field(expr, "left").and_then(|l| self.lower_expr(l));
                let right = field(expr, "right").and_then(|r| self.lower_expr(r));
                let pos = field(expr, "operator").map(syntax::pos);
                Some(self.instr(
                    ValueKind::BinOp,
                    pos,
                    None,
                    left.into_iter().chain(right).collect(),
                ))
            }
            "index_expression" | "slice_expression" => {
                let mut operands = Vec::new();
                for child in named_children(expr) {
                    if let Some(v) = self.lower_expr(child) {
                        operands.push(v);
                    }
                }
                let pos = syntax::child_of_kind(expr, "[").map(syntax::pos);
                Some(self.instr(ValueKind::Opaque, pos, None, operands))
            }
            "type_assertion_expression" => {
                let operand = field(expr, "operand").and_then(|o| self.lower_expr(o));
                let pos = syntax::child_of_kind(expr, "(").map(syntax::pos);
                Some(self.instr(ValueKind::Opaque, pos, None, operand.into_iter().collect()))
            }
            "parenthesized_expression" => self.lower_expr(expr.named_child(0)?),
            "func_literal" => {
                let (func, bindings) = self.lower_function(expr)?;
                let pos = Some(syntax::pos(expr));
                Some(self.instr(ValueKind::MakeClosure { func }, pos, None, bindings))
            }
            _ => {
                let mut operands = Vec::new();
                for child in named_children(expr) {
                    if let Some(v) = self.lower_expr(child) {
                        operands.push(v);
                    }
                }
                if operands.is_empty() {
                    None
                } else {
                    let pos = Some(syntax::pos(expr));
                    Some(self.instr(ValueKind::Opaque, pos, None, operands))
                }
            }
        }
    }

    fn lower_selector_value(&mut self, expr: TsNode) -> Option<ValueId> {
        let operand = field(expr, "operand")?;
        let sel = field(expr, "field")?;
        let sel_name = syntax::text(self.src, sel).to_string();
        let sel_pos = Some(syntax::pos(sel));

        // Qualified reference through an import alias.
        if operand.kind() == "identifier" {
            let alias = syntax::text(self.src, operand).to_string();
            if self.lookup_local(&alias).is_none() {
                let qualified: Option<QualifiedMember> = self
                    .resolver
                    .qualified_scope(self.rel_file, &alias)
                    .map(|scope| {
                        if let Some(f) = scope.funcs.get(&sel_name) {
                            QualifiedMember::Func(f.node_id.clone())
                        } else if let Some(g) = scope.globals.get(&sel_name) {
                            QualifiedMember::Global(g.node_id.clone())
                        } else {
                            QualifiedMember::None
                        }
                    });
                match qualified {
                    Some(QualifiedMember::Func(node_id)) => {
                        return Some(self.new_value(
                            ValueKind::FuncRef { node_id },
                            sel_pos,
                            Some(sel_name),
                            Vec::new(),
                        ));
                    }
                    Some(QualifiedMember::Global(decl_id)) => {
                        return Some(self.new_value(
                            ValueKind::Global {
                                decl_node_id: Some(decl_id),
                            },
                            sel_pos,
                            Some(sel_name),
                            Vec::new(),
                        ));
                    }
                    Some(QualifiedMember::None) => return None,
                    None => {
                        if self.resolver.import_target(self.rel_file, &alias).is_some() {
                            return None; // external package member
                        }
                    }
                }
            }
        }

        let base = self.lower_expr(operand)?;
        let addr = self.instr(
            ValueKind::FieldAddr {
                field: sel_name.clone(),
            },
            sel_pos,
            Some(sel_name),
            vec![base],
        );
        Some(self.instr(ValueKind::Load, sel_pos, None, vec![addr]))
    }

    fn lower_field_addr(&mut self, expr: TsNode) -> Option<ValueId> {
        let operand = field(expr, "operand")?;
        let sel = field(expr, "field")?;
        let sel_name = syntax::text(self.src, sel).to_string();
        let base = self.lower_expr(operand)?;
        let pos = Some(syntax::pos(sel));
        Some(self.instr(
            ValueKind::FieldAddr {
                field: sel_name.clone(),
            },
            pos,
            Some(sel_name),
            vec![base],
        ))
    }

    fn lower_call(&mut self, call: TsNode, mode: CallMode) -> Option<ValueId> {
        let fun = field(call, "function")?;
        let args_node = field(call, "arguments");
        let pos = args_node.map(syntax::pos).or(Some(syntax::pos(call)));

        // Builtins with bespoke lowering.
        if fun.kind() == "identifier" {
            let name = syntax::text(self.src, fun).to_string();
            if self.lookup_local(&name).is_none() && BUILTINS.contains(name.as_str()) {
                return self.lower_builtin_call(call, &name, pos, mode);
            }
        }

        let callee = self.classify_callee(fun);
        let mut operands = Vec::new();
        match &callee {
            Callee::Method { recv: Some(v), .. } => operands.push(*v),
            Callee::Value(v) => operands.push(*v),
            _ => {}
        }
        if let Some(args) = args_node {
            for arg in named_children(args) {
                if arg.kind().ends_with("_type") {
                    continue;
                }
                if let Some(v) = self.lower_expr(arg) {
                    operands.push(v);
                }
            }
        }

        let kind = match mode {
            CallMode::Normal => ValueKind::Call { callee },
            CallMode::Go => ValueKind::Go { callee },
            CallMode::Defer => ValueKind::DeferCall { callee },
        };
        Some(self.instr(kind, pos, None, operands))
    }

    fn lower_builtin_call(
        &mut self,
        call: TsNode,
        name: &str,
        pos: Option<(usize, usize)>,
        mode: CallMode,
    ) -> Option<ValueId> {
        let args: Vec<TsNode> = field(call, "arguments").map(named_children).unwrap_or_default();

        match name {
            "make" if args.first().is_some_and(|a| a.kind() == "channel_type") => {
                return Some(self.instr(ValueKind::MakeChan, pos, None, Vec::new()));
            }
            "panic" if matches!(mode, CallMode::Normal) => {
                let operands: Vec<ValueId> =
                    args.iter().filter_map(|a| self.lower_expr(*a)).collect();
                let v = self.instr(ValueKind::Panic, pos, None, operands);
                let dead = self.new_block();
                self.set_current(dead);
                return Some(v);
            }
            "recover" => {
                let kind = match mode {
                    CallMode::Defer => ValueKind::DeferCall {
                        callee: Callee::Builtin("recover".to_string()),
                    },
                    _ => ValueKind::Recover,
                };
                return Some(self.instr(kind, pos, None, Vec::new()));
            }
            _ => {}
        }

        let operands: Vec<ValueId> = args
            .iter()
            .filter(|a| !a.kind().ends_with("_type"))
            .filter_map(|a| self.lower_expr(*a))
            .collect();
        let callee = Callee::Builtin(name.to_string());
        let kind = match mode {
            CallMode::Normal => ValueKind::Call { callee },
            CallMode::Go => ValueKind::Go { callee },
            CallMode::Defer => ValueKind::DeferCall { callee },
        };
        Some(self.instr(kind, pos, None, operands))
    }

    fn classify_callee(&mut self, fun: TsNode) -> Callee {
        match fun.kind() {
            "identifier" => {
                let name = syntax::text(self.src, fun).to_string();
                if let Some(entry) = self.lookup_local(&name) {
                    return Callee::Value(entry.value);
                }
                if let Some((node_id, _)) = self.package_func(&name) {
                    return Callee::Known { node_id };
                }
                if let Some(entry) = self.lookup(&name) {
                    return Callee::Value(entry.value);
                }
                Callee::Unknown
            }
            "selector_expression" => {
                let Some(operand) = field(fun, "operand") else {
                    return Callee::Unknown;
                };
                let Some(sel) = field(fun, "field") else {
                    return Callee::Unknown;
                };
                let name = syntax::text(self.src, sel).to_string();

                if operand.kind() == "identifier" {
                    let alias = syntax::text(self.src, operand).to_string();
                    if self.lookup_local(&alias).is_none() {
                        let known = self
                            .resolver
                            .qualified_scope(self.rel_file, &alias)
                            .map(|scope| scope.funcs.get(&name).map(|f| f.node_id.clone()));
                        match known {
                            Some(Some(node_id)) => return Callee::Known { node_id },
                            Some(None) => return Callee::Unknown,
                            None => {
                                if let Some(path) =
                                    self.resolver.import_target(self.rel_file, &alias)
                                {
                                    return Callee::External {
                                        pkg_path: path.to_string(),
                                        name,
                                    };
                                }
                            }
                        }
                    }
                }

                let recv_type = self.infer(operand);
                let recv = self.lower_expr(operand);
                Callee::Method {
                    recv,
                    recv_type,
                    name,
                }
            }
            "func_literal" => match self.lower_expr(fun) {
                Some(v) => Callee::Value(v),
                None => Callee::Unknown,
            },
            "parenthesized_expression" => match fun.named_child(0) {
                Some(inner) => self.classify_callee(inner),
                None => Callee::Unknown,
            },
            "index_expression" | "generic_type" => match field(fun, "operand") {
                Some(inner) => self.classify_callee(inner),
                None => Callee::Unknown,
            },
            _ => Callee::Unknown,
        }
    }

    // -- light type inference --------------------------------------------

    /// Minimal expression typing for receiver classification. Unresolvable
    /// shapes yield the empty string.
    fn infer(&self, expr: TsNode) -> String {
        match expr.kind() {
            "identifier" => {
                let name = syntax::text(self.src, expr);
                if let Some(entry) = self.lookup_local(name) {
                    return entry.type_name;
                }
                if let Some((_, ty)) = self.package_global(name) {
                    return ty;
                }
                if let Some(entry) = self.parent_binding(name) {
                    return entry.type_name;
                }
                String::new()
            }
            "selector_expression" => {
                let (Some(op), Some(sel)) = (field(expr, "operand"), field(expr, "field")) else {
                    return String::new();
                };
                let base_ty = self.infer(op);
                if base_ty.is_empty() {
                    return String::new();
                }
                let base = type_base(&base_ty).to_string();
                let looked = if let Some((alias, ty)) = base.split_once('.') {
                    self.resolver
                        .qualified_scope(self.rel_file, alias)
                        .map(|s| (s, ty.to_string()))
                } else {
                    self.resolver
                        .scope_by_rel(self.rel_pkg)
                        .map(|s| (s, base.clone()))
                };
                let Some((scope, key)) = looked else {
                    return String::new();
                };
                let field_name = syntax::text(self.src, sel);
                scope
                    .types
                    .get(&key)
                    .and_then(|t| t.fields.iter().find(|f| f.name == field_name))
                    .map(|f| f.type_name.clone())
                    .unwrap_or_default()
            }
            "unary_expression" => {
                let op = field(expr, "operator")
                    .map(|o| syntax::text(self.src, o))
                    .unwrap_or("");
                let inner = field(expr, "operand")
                    .map(|o| self.infer(o))
                    .unwrap_or_default();
                match op {
                    "&" if !inner.is_empty() => format!("*{inner}"),
                    "*" => inner.trim_start_matches('*').to_string(),
                    "<-" => inner.strip_prefix("chan ").unwrap_or("").to_string(),
                    _ => inner,
                }
            }
            "composite_literal" => field(expr, "type")
                .map(|t| type_name(self.src, t))
                .unwrap_or_default(),
            "call_expression" => {
                let Some(fun) = field(expr, "function") else {
                    return String::new();
                };
                if fun.kind() == "identifier" {
                    let name = syntax::text(self.src, fun);
                    if name == "make" {
                        return field(expr, "arguments")
                            .and_then(|a| named_children(a).into_iter().next())
                            .map(|t| type_name(self.src, t))
                            .unwrap_or_default();
                    }
                    if self.lookup_local(name).is_none() {
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
                    let (Some(op), Some(sel)) = (field(fun, "operand"), field(fun, "field"))
                    else {
                        return String::new();
                    };
                    let sel_name = syntax::text(self.src, sel);
                    if op.kind() == "identifier" {
                        let alias = syntax::text(self.src, op);
                        if self.lookup_local(alias).is_none() {
                            if let Some(scope) =
                                self.resolver.qualified_scope(self.rel_file, alias)
                            {
                                return scope
                                    .funcs
                                    .get(sel_name)
                                    .and_then(|f| f.results.first())
                                    .map(|r| r.type_name.clone())
                                    .unwrap_or_default();
                            }
                            if self.resolver.import_target(self.rel_file, alias).is_some() {
                                return String::new();
                            }
                        }
                    }
                    let recv = self.infer(op);
                    if recv.is_empty() {
                        return String::new();
                    }
                    let base = type_base(&recv).to_string();
                    if let Some(scope) = self.resolver.scope_by_rel(self.rel_pkg) {
                        if let Some(m) = scope.method(&base, sel_name) {
                            return m
                                .results
                                .first()
                                .map(|r| r.type_name.clone())
                                .unwrap_or_default();
                        }
                    }
                }
                String::new()
            }
            "parenthesized_expression" => expr
                .named_child(0)
                .map(|inner| self.infer(inner))
                .unwrap_or_default(),
            _ => String::new(),
        }
    }
}

enum QualifiedMember {
    Func(String),
    Global(String),
    None,
}

#[derive(Clone, Copy)]
enum CallMode {
    Normal,
    Go,
    Defer,
}

/// Expressions under a literal-value element (plain or keyed).
fn elem_expressions(elem: TsNode) -> Vec<TsNode> {
    match elem.kind() {
        "keyed_element" | "literal_element" => named_children(elem)
            .into_iter()
            .flat_map(|n| {
                if n.kind() == "literal_element" {
                    named_children(n)
                } else {
                    vec![n]
                }
            })
            .collect(),
        _ => vec![elem],
    }
}

/// Receive expression of a communication case: the first unary `<-` in the
/// communication clause (before the case body).
fn find_receive_expr(case: TsNode) -> Option<TsNode> {
    fn search(node: TsNode) -> Option<TsNode> {
        if node.kind() == "unary_expression" {
            if let Some(op) = node.child_by_field_name("operator") {
                if op.kind() == "<-" {
                    return Some(node);
                }
            }
        }
        for child in syntax::children(node) {
            if let Some(found) = search(child) {
                return Some(found);
            }
        }
        None
    }
    // Only the first named child can be the communication clause.
    syntax::named_children(case).first().and_then(|c| search(*c))
}

/// Drop blocks unreachable from the entry (dead continuations created
/// after return/panic/break, break targets of infinite loops that nothing
/// reaches) and renumber successor lists.
fn prune_unreachable_blocks(blocks: &mut Vec<BlockData>) {
    let n = blocks.len();
    if n <= 1 {
        return;
    }
    let mut reachable = vec![false; n];
    let mut stack = vec![0usize];
    while let Some(b) = stack.pop() {
        if reachable[b] {
            continue;
        }
        reachable[b] = true;
        stack.extend(blocks[b].succs.iter().copied());
    }
    if reachable.iter().all(|&r| r) {
        return;
    }

    let mut remap = vec![usize::MAX; n];
    let mut next = 0usize;
    for (i, &r) in reachable.iter().enumerate() {
        if r {
            remap[i] = next;
            next += 1;
        }
    }

    let old = std::mem::take(blocks);
    for (i, mut block) in old.into_iter().enumerate() {
        if !reachable[i] {
            continue;
        }
        block.succs = block.succs.iter().map(|&s| remap[s]).collect();
        blocks.push(block);
    }
}

/// Compute referrers: for each value, the values/instructions that use it.
fn compute_referrers(func: &mut FlowFunc) {
    let mut referrers: Vec<Vec<ValueId>> = vec![Vec::new(); func.values.len()];
    for (id, value) in func.values.iter().enumerate() {
        for &op in &value.operands {
            if op < referrers.len() && !referrers[op].contains(&id) {
                referrers[op].push(id);
            }
        }
    }
    func.referrers = referrers;
}

/// Recover (line, col) from a position-keyed node ID.
fn id_pos(id: &str) -> Option<(usize, usize)> {
    let mut parts = id.rsplit(':');
    let _kind = parts.next()?;
    let col = parts.next()?.parse().ok()?;
    let line = parts.next()?.parse().ok()?;
    Some((line, col))
}
