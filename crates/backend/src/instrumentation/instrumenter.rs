use std::sync::Arc;

use adana_syntax::{ast::*, Loc, NodeId};
use itertools::Itertools;
use rustc_hash::{FxHashMap, FxHashSet};

use super::{BranchKind, BranchSlot, CoverageEntry, CoverageKey, EntryKind, Metadata};
use crate::{
    analysis::ast_visitor::{VisitFlow, Visitor, Walk},
    error::{Error, Result},
};

/// Catch parameter of the handler added to `try` statements that have none.
pub const RETHROW_BINDING: &str = "__adana_error";

/// Flag set when the block of an instrumented `try` throws.
pub const THREW_BINDING: &str = "__adana_threw";

/// Where a branch arm is located.
#[derive(Clone, Copy, Debug)]
enum Arm {
    /// Code written in the source.
    Explicit(Option<Loc>),
    /// An outcome with no code of its own, located at its construct.
    Implicit(Option<Loc>),
}

impl Arm {
    fn key(self) -> Option<(CoverageKey, Loc)> {
        match self {
            Self::Explicit(loc) => loc.map(|loc| (CoverageKey::new(EntryKind::Branch, &loc), loc)),
            Self::Implicit(loc) => loc.map(|loc| (CoverageKey::implicit_arm(&loc), loc)),
        }
    }
}

/// Which kinds of coverage to collect.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct InstrumentOptions {
    pub statements: bool,
    pub branches: bool,
    pub functions: bool,
}

impl Default for InstrumentOptions {
    fn default() -> Self {
        Self { statements: true, branches: true, functions: true }
    }
}

/// Rewrites a program so that executing it counts which statements, branch arms and functions
/// ran, and records what was instrumented in a [`Metadata`].
///
/// Every unit that receives a counter and every injected node is marked in
/// [`Program::marks`]; marked nodes are skipped entirely, so instrumenting a program twice
/// yields no new entries and leaves the tree unchanged.
#[derive(Debug)]
pub struct Instrumenter {
    filename: Arc<str>,
    options: InstrumentOptions,
    metadata: Metadata,
    marks: Marks,
    registered: FxHashSet<CoverageKey>,

    /// Statements directly inside a statement list that is being walked.
    list_items: FxHashSet<NodeId>,
    /// Counters to insert before list statements, keyed by statement.
    statement_counters: FxHashMap<NodeId, CounterRef>,
    /// Counters to prepend to function bodies, keyed by function.
    function_counters: FxHashMap<NodeId, CounterRef>,
    /// Branch arm counters, keyed by the statement or expression owning the arms.
    arm_counters: FxHashMap<NodeId, Vec<CounterRef>>,
    /// `else if` statements whose arms were registered with the head of their chain.
    chain_links: FxHashSet<NodeId>,
    /// Binding names of anonymous functions.
    binding_names: FxHashMap<NodeId, String>,
}

impl Instrumenter {
    pub fn new(filename: impl Into<String>) -> Self {
        let filename: String = filename.into();
        Self {
            filename: Arc::from(filename.as_str()),
            options: InstrumentOptions::default(),
            metadata: Metadata::new(filename),
            marks: Marks::default(),
            registered: FxHashSet::default(),
            list_items: FxHashSet::default(),
            statement_counters: FxHashMap::default(),
            function_counters: FxHashMap::default(),
            arm_counters: FxHashMap::default(),
            chain_links: FxHashSet::default(),
            binding_names: FxHashMap::default(),
        }
    }

    pub fn with_options(mut self, options: InstrumentOptions) -> Self {
        self.options = options;
        self
    }

    /// Instrument `program` in place.
    ///
    /// On error the program may be partially rewritten and should be discarded.
    pub fn instrument(mut self, program: &mut Program) -> Result<Metadata> {
        self.marks = std::mem::take(&mut program.marks);
        let result = program.walk(&mut self);
        program.marks = std::mem::take(&mut self.marks);
        result?;

        debug!(
            file = %self.filename,
            entries = self.metadata.len(),
            groups = self.metadata.groups.len(),
            "instrumented program"
        );
        Ok(self.metadata)
    }

    fn counter_ref(&self, key: &CoverageKey) -> CounterRef {
        CounterRef { file: self.filename.clone(), key: key.as_arc().clone() }
    }

    /// Register one entry unless its key is already taken.
    fn register(
        &mut self,
        kind: EntryKind,
        node: &Node,
        name: Option<String>,
    ) -> Result<Option<CounterRef>> {
        let loc = node.loc.ok_or(Error::InvalidNode { node: node.id, kind })?;
        let key = CoverageKey::new(kind, &loc);
        if !self.registered.insert(key.clone()) {
            debug!(%key, "coverage key already registered, skipping");
            return Ok(None);
        }

        trace!(%key, ?name, "registered coverage entry");
        let counter = self.counter_ref(&key);
        self.metadata.entries.push(CoverageEntry { key, kind, loc, name, branch: None });
        Ok(Some(counter))
    }

    /// Register a branch group at `at` with one arm per location. Nothing is registered when
    /// any arm key is taken.
    fn register_group(
        &mut self,
        kind: BranchKind,
        at: &Node,
        arms: &[Arm],
    ) -> Result<Option<Vec<CounterRef>>> {
        if !self.options.branches {
            return Ok(None);
        }

        let invalid = || Error::InvalidNode { node: at.id, kind: EntryKind::Branch };
        let group_loc = at.loc.ok_or_else(invalid)?;
        let keyed =
            arms.iter().map(|arm| arm.key().ok_or_else(invalid)).collect::<Result<Vec<_>>>()?;

        if !keyed.iter().map(|(key, _)| key).all_unique() ||
            keyed.iter().any(|(key, _)| self.registered.contains(key))
        {
            debug!(?kind, loc = %group_loc, "branch keys already registered, skipping group");
            return Ok(None);
        }

        let group_id = self.metadata.push_group(kind, group_loc, keyed.len() as u32);
        let mut counters = Vec::with_capacity(keyed.len());
        for (index, (key, loc)) in keyed.into_iter().enumerate() {
            trace!(%key, %group_id, index, "registered branch arm");
            self.registered.insert(key.clone());
            counters.push(self.counter_ref(&key));
            self.metadata.entries.push(CoverageEntry {
                key,
                kind: EntryKind::Branch,
                loc,
                name: None,
                branch: Some(BranchSlot { group_id, branch_index: index as u32 }),
            });
        }
        Ok(Some(counters))
    }

    fn bind_name(&mut self, function: &Function, name: &str) {
        if function.name.is_none() {
            self.binding_names.insert(function.node.id, name.to_string());
        }
    }

    // ---------------------------------------------------------------------
    // injected nodes

    fn injected_expr(&mut self, kind: ExprKind) -> Expr {
        let expr = Expr::synthetic(kind);
        self.marks.mark(expr.id());
        expr
    }

    fn injected_stmt(&mut self, kind: StmtKind) -> Stmt {
        let stmt = Stmt::synthetic(kind);
        self.marks.mark(stmt.id());
        stmt
    }

    fn counter_stmt(&mut self, counter: CounterRef) -> Stmt {
        let expr = self.injected_expr(ExprKind::Counter(counter));
        self.injected_stmt(StmtKind::Expr(expr))
    }

    fn injected_block(&mut self, body: Vec<Stmt>) -> Stmt {
        let block = Block::synthetic(body);
        self.marks.mark(block.node.id);
        self.injected_stmt(StmtKind::Block(block))
    }

    /// Replace `expr` with `(counter, expr)`.
    fn wrap(&mut self, counter: CounterRef, expr: &mut Expr) {
        let counter = self.injected_expr(ExprKind::Counter(counter));
        let original = expr.take();
        *expr = self.injected_expr(ExprKind::Sequence(vec![counter, original]));
    }

    /// `test ? (c0, true) : (c1, false)`
    fn guarded_test(&mut self, test: Expr, counters: Vec<CounterRef>) -> Expr {
        let Some((taken, exited)) = counters.into_iter().collect_tuple() else { return test };
        let taken = self.injected_expr(ExprKind::Counter(taken));
        let exited = self.injected_expr(ExprKind::Counter(exited));
        let yes = self.injected_expr(ExprKind::Bool(true));
        let no = self.injected_expr(ExprKind::Bool(false));
        let consequent = self.injected_expr(ExprKind::Sequence(vec![taken, yes]));
        let alternate = self.injected_expr(ExprKind::Sequence(vec![exited, no]));
        self.injected_expr(ExprKind::Conditional {
            test: Box::new(test),
            consequent: Box::new(consequent),
            alternate: Box::new(alternate),
        })
    }

    /// Rewrite `try B catch (e) H finally F` as
    ///
    /// ```js
    /// { let threw = false; try B catch (e) { threw = true; c1; H } finally { threw || c0; F } }
    /// ```
    ///
    /// so that leaving `B` by `return`, `break` or `continue` also counts as completing it. A
    /// missing handler becomes `catch (error) { threw = true; c1; throw error; }`. The wrapper
    /// block keeps the statement's node.
    fn guard_try(&mut self, statement: &mut Stmt, completed: CounterRef, threw: CounterRef) {
        let StmtKind::Try(mut try_stmt) =
            std::mem::replace(&mut statement.kind, StmtKind::Empty)
        else {
            return;
        };

        let flag = self.injected_expr(ExprKind::Ident(THREW_BINDING.into()));
        let yes = self.injected_expr(ExprKind::Bool(true));
        let raise = self.injected_expr(ExprKind::Assign {
            op: AssignOp::Assign,
            target: Box::new(flag),
            value: Box::new(yes),
        });
        let raise = self.injected_stmt(StmtKind::Expr(raise));
        let threw = self.counter_stmt(threw);
        match &mut try_stmt.handler {
            Some(handler) => {
                handler.body.body.insert(0, threw);
                handler.body.body.insert(0, raise);
            }
            None => {
                // rethrow the original error so `finally` and callers see it unchanged
                let error = self.injected_expr(ExprKind::Ident(RETHROW_BINDING.into()));
                let rethrow = self.injected_stmt(StmtKind::Throw(error));
                let body = Block::synthetic(vec![raise, threw, rethrow]);
                let handler = CatchClause {
                    node: Node::synthetic(),
                    param: Some(RETHROW_BINDING.to_string()),
                    body,
                };
                self.marks.mark(handler.node.id);
                self.marks.mark(handler.body.node.id);
                try_stmt.handler = Some(handler);
            }
        }

        let flag = self.injected_expr(ExprKind::Ident(THREW_BINDING.into()));
        let completed = self.injected_expr(ExprKind::Counter(completed));
        let guard = self.injected_expr(ExprKind::Logical {
            op: LogicalOp::Or,
            left: Box::new(flag),
            right: Box::new(completed),
        });
        let guard = self.injected_stmt(StmtKind::Expr(guard));
        match &mut try_stmt.finalizer {
            Some(finalizer) => finalizer.body.insert(0, guard),
            None => {
                let finalizer = Block::synthetic(vec![guard]);
                self.marks.mark(finalizer.node.id);
                try_stmt.finalizer = Some(finalizer);
            }
        }

        let no = self.injected_expr(ExprKind::Bool(false));
        let declaration = self.injected_stmt(StmtKind::Var(VarDecl {
            kind: VarKind::Let,
            declarations: vec![VarDeclarator { name: THREW_BINDING.to_string(), init: Some(no) }],
        }));
        let guarded = self.injected_stmt(StmtKind::Try(try_stmt));
        let wrapper = Block::synthetic(vec![declaration, guarded]);
        self.marks.mark(wrapper.node.id);
        statement.kind = StmtKind::Block(wrapper);
    }

    fn prepend_to_body(&mut self, counter: CounterRef, body: &mut Stmt) {
        normalize_body(body);
        let counter = self.counter_stmt(counter);
        if let StmtKind::Block(block) = &mut body.kind {
            block.body.insert(0, counter);
        }
    }

    // ---------------------------------------------------------------------
    // registration per construct

    /// Register the arms of the `if` chain headed by `statement`. Returns whether a group was
    /// registered.
    fn enter_if_chain(&mut self, node: &Node, if_stmt: &IfStmt) -> Result<bool> {
        let mut arms = vec![Arm::Explicit(if_stmt.consequent.loc())];
        let mut chain = vec![node.id];
        let mut current = if_stmt;
        let mut current_loc = node.loc;
        loop {
            match current.alternate.as_deref() {
                Some(Stmt { node, kind: StmtKind::If(next) }) => {
                    arms.push(Arm::Explicit(next.consequent.loc()));
                    chain.push(node.id);
                    current = next;
                    current_loc = node.loc;
                }
                Some(alternate) => {
                    arms.push(Arm::Explicit(alternate.loc()));
                    break;
                }
                // implicit empty `else`
                None => {
                    arms.push(Arm::Implicit(current_loc));
                    break;
                }
            }
        }

        let Some(mut counters) = self.register_group(BranchKind::If, node, &arms)? else {
            return Ok(false);
        };
        let otherwise = counters.pop();
        let last = chain.len() - 1;
        for (index, (id, counter)) in chain.iter().zip(counters).enumerate() {
            let mut own = vec![counter];
            if index == last {
                own.extend(otherwise.clone());
            }
            self.arm_counters.insert(*id, own);
        }
        self.chain_links.extend(chain.into_iter().skip(1));
        Ok(true)
    }

    fn enter_statement(&mut self, statement: &mut Stmt, is_link: bool) -> Result<bool> {
        let node = statement.node.clone();
        let counters = match &mut statement.kind {
            StmtKind::If(if_stmt) => {
                normalize_body(&mut if_stmt.consequent);
                if let Some(alternate) = &mut if_stmt.alternate {
                    if !matches!(alternate.kind, StmtKind::If(_)) {
                        normalize_body(alternate);
                    }
                }
                if is_link {
                    return Ok(false);
                }
                return self.enter_if_chain(&node, if_stmt);
            }
            StmtKind::While(while_stmt) => {
                normalize_body(&mut while_stmt.body);
                let arms = [Arm::Explicit(while_stmt.body.loc()), Arm::Implicit(node.loc)];
                self.register_group(BranchKind::While, &node, &arms)?
            }
            StmtKind::DoWhile(do_while) => {
                normalize_body(&mut do_while.body);
                let arms = [Arm::Explicit(do_while.body.loc()), Arm::Implicit(node.loc)];
                self.register_group(BranchKind::DoWhile, &node, &arms)?
            }
            StmtKind::For(for_stmt) => {
                normalize_body(&mut for_stmt.body);
                None
            }
            StmtKind::Try(try_stmt) => {
                let handler = match &try_stmt.handler {
                    Some(handler) => Arm::Explicit(handler.node.loc),
                    None => Arm::Implicit(node.loc),
                };
                let arms = [Arm::Explicit(try_stmt.block.node.loc), handler];
                self.register_group(BranchKind::Try, &node, &arms)?
            }
            StmtKind::Switch(switch) => {
                let mut arms: Vec<_> =
                    switch.cases.iter().map(|case| Arm::Explicit(case.node.loc)).collect();
                if switch.cases.iter().all(|case| case.test.is_some()) {
                    // unmatched discriminant
                    arms.push(Arm::Implicit(node.loc));
                }
                self.register_group(BranchKind::Switch, &node, &arms)?
            }
            StmtKind::Var(decl) => {
                for declarator in &decl.declarations {
                    if let Some(Expr { kind: ExprKind::Function(function), .. }) = &declarator.init
                    {
                        self.bind_name(function, &declarator.name);
                    }
                }
                None
            }
            StmtKind::Class(class) => {
                for method in &class.methods {
                    self.bind_name(&method.function, &method.name);
                }
                None
            }
            StmtKind::Export(ExportDecl { default: true, declaration }) => {
                match &declaration.kind {
                    StmtKind::Function(function) => self.bind_name(function, "default"),
                    StmtKind::Expr(Expr { kind: ExprKind::Function(function), .. }) => {
                        self.bind_name(function, "default")
                    }
                    _ => {}
                }
                None
            }
            _ => None,
        };

        match counters {
            Some(counters) => {
                self.arm_counters.insert(node.id, counters);
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

/// Statements counted when they appear in a statement list.
fn is_countable(statement: &Stmt) -> bool {
    !matches!(statement.kind, StmtKind::Block(_) | StmtKind::Empty | StmtKind::Function(_))
}

/// Turn a non-block body into a block holding it, so counters can be placed before it.
fn normalize_body(body: &mut Stmt) {
    if body.is_block() {
        return;
    }
    let inner = body.take();
    let loc = inner.loc();
    let block = Block { node: Node::with_loc(loc), body: vec![inner] };
    *body = Stmt { node: Node::with_loc(loc), kind: StmtKind::Block(block) };
}

impl Visitor for Instrumenter {
    fn visit_statement_list(&mut self, list: &mut Vec<Stmt>) -> Result<VisitFlow> {
        self.list_items.extend(list.iter().map(Stmt::id));
        Ok(VisitFlow::Continue)
    }

    fn post_visit_statement_list(&mut self, list: &mut Vec<Stmt>) -> Result<()> {
        let statements = std::mem::take(list);
        list.reserve(statements.len());
        for statement in statements {
            self.list_items.remove(&statement.id());
            if let Some(counter) = self.statement_counters.remove(&statement.id()) {
                list.push(self.counter_stmt(counter));
            }
            list.push(statement);
        }
        Ok(())
    }

    fn visit_statement(&mut self, statement: &mut Stmt) -> Result<VisitFlow> {
        if self.marks.is_marked(statement.id()) {
            trace!(loc = ?statement.loc(), "skipping instrumented statement");
            return Ok(VisitFlow::Skip);
        }

        let mut instrumented = false;
        if self.options.statements &&
            self.list_items.contains(&statement.id()) &&
            is_countable(statement)
        {
            if let Some(counter) = self.register(EntryKind::Statement, &statement.node, None)? {
                self.statement_counters.insert(statement.id(), counter);
                instrumented = true;
            }
        }

        let is_link = self.chain_links.remove(&statement.id());
        instrumented |= self.enter_statement(statement, is_link)?;
        if instrumented || is_link {
            self.marks.mark(statement.id());
        }
        Ok(VisitFlow::Continue)
    }

    fn post_visit_statement(&mut self, statement: &mut Stmt) -> Result<()> {
        let Some(counters) = self.arm_counters.remove(&statement.id()) else { return Ok(()) };
        let mut counters = counters.into_iter();

        if matches!(statement.kind, StmtKind::Try(_)) {
            if let Some((completed, threw)) = counters.collect_tuple() {
                self.guard_try(statement, completed, threw);
            }
            return Ok(());
        }

        match &mut statement.kind {
            StmtKind::If(if_stmt) => {
                if let Some(counter) = counters.next() {
                    self.prepend_to_body(counter, &mut if_stmt.consequent);
                }
                if let Some(counter) = counters.next() {
                    match &mut if_stmt.alternate {
                        Some(alternate) => self.prepend_to_body(counter, alternate),
                        None => {
                            let counter = self.counter_stmt(counter);
                            let block = self.injected_block(vec![counter]);
                            if_stmt.alternate = Some(Box::new(block));
                        }
                    }
                }
            }
            StmtKind::While(WhileStmt { test, .. }) | StmtKind::DoWhile(DoWhileStmt { test, .. }) => {
                let original = test.take();
                *test = self.guarded_test(original, counters.collect());
            }
            StmtKind::Switch(switch) => {
                for case in &mut switch.cases {
                    if let Some(counter) = counters.next() {
                        let counter = self.counter_stmt(counter);
                        case.consequent.insert(0, counter);
                    }
                }
                if let Some(counter) = counters.next() {
                    if let Some(last) = switch.cases.last_mut() {
                        let exit = self.injected_stmt(StmtKind::Break);
                        last.consequent.push(exit);
                    }
                    let counter = self.counter_stmt(counter);
                    let default = SwitchCase {
                        node: Node::synthetic(),
                        test: None,
                        consequent: vec![counter],
                    };
                    self.marks.mark(default.node.id);
                    switch.cases.push(default);
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn visit_function(&mut self, function: &mut Function) -> Result<VisitFlow> {
        if self.marks.is_marked(function.node.id) {
            return Ok(VisitFlow::Skip);
        }
        if !self.options.functions {
            return Ok(VisitFlow::Continue);
        }

        let name =
            function.name.clone().or_else(|| self.binding_names.remove(&function.node.id));
        if let Some(counter) = self.register(EntryKind::Function, &function.node, name)? {
            self.function_counters.insert(function.node.id, counter);
            self.marks.mark(function.node.id);
        }
        Ok(VisitFlow::Continue)
    }

    fn post_visit_function(&mut self, function: &mut Function) -> Result<()> {
        let Some(counter) = self.function_counters.remove(&function.node.id) else {
            return Ok(());
        };
        match &mut function.body {
            FunctionBody::Block(block) => {
                let counter = self.counter_stmt(counter);
                block.body.insert(0, counter);
            }
            FunctionBody::Expr(expr) => self.wrap(counter, expr),
        }
        Ok(())
    }

    fn visit_expression(&mut self, expression: &mut Expr) -> Result<VisitFlow> {
        if self.marks.is_marked(expression.id()) {
            return Ok(VisitFlow::Skip);
        }

        let node = expression.node.clone();
        let counters = match &expression.kind {
            ExprKind::Conditional { consequent, alternate, .. } => {
                let arms = [Arm::Explicit(consequent.loc()), Arm::Explicit(alternate.loc())];
                self.register_group(BranchKind::Conditional, &node, &arms)?
            }
            ExprKind::Logical { op, left, right } => {
                let arms = [Arm::Explicit(left.loc()), Arm::Explicit(right.loc())];
                self.register_group(BranchKind::Logical { operator: *op }, &node, &arms)?
            }
            ExprKind::Assign { target, value, .. } => {
                if let ExprKind::Function(function) = &value.kind {
                    match &target.kind {
                        ExprKind::Ident(name) |
                        ExprKind::Member { property: MemberProp::Named(name), .. } => {
                            self.bind_name(function, name)
                        }
                        _ => {}
                    }
                }
                None
            }
            ExprKind::Object(properties) => {
                for property in properties {
                    if let ExprKind::Function(function) = &property.value.kind {
                        self.bind_name(function, &property.key);
                    }
                }
                None
            }
            _ => None,
        };

        if let Some(counters) = counters {
            self.arm_counters.insert(node.id, counters);
            self.marks.mark(node.id);
        }
        Ok(VisitFlow::Continue)
    }

    fn post_visit_expression(&mut self, expression: &mut Expr) -> Result<()> {
        let Some(counters) = self.arm_counters.remove(&expression.id()) else { return Ok(()) };
        let Some((first, second)) = counters.into_iter().collect_tuple() else { return Ok(()) };
        match &mut expression.kind {
            ExprKind::Conditional { consequent: first_arm, alternate: second_arm, .. } |
            ExprKind::Logical { left: first_arm, right: second_arm, .. } => {
                self.wrap(first, first_arm);
                self.wrap(second, second_arm);
            }
            _ => {}
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use adana_syntax::{parse, print, PrintOptions};

    use super::*;

    fn instrument(source: &str) -> (Program, Metadata) {
        let mut program = parse(source).unwrap();
        let metadata = Instrumenter::new("test.js").instrument(&mut program).unwrap();
        (program, metadata)
    }

    fn printed(program: &Program) -> String {
        print(program, &PrintOptions { prelude: false, ..Default::default() })
    }

    fn kinds(metadata: &Metadata) -> Vec<EntryKind> {
        metadata.entries.iter().map(|entry| entry.kind).collect()
    }

    #[test]
    fn test_statements_get_counters() {
        let (program, metadata) = instrument("a();\nb();\n");
        assert_eq!(kinds(&metadata), vec![EntryKind::Statement, EntryKind::Statement]);
        assert_eq!(metadata.entries[0].key.as_str(), "s:1:0:1:4");
        assert_eq!(
            printed(&program),
            "__adana_count(\"test.js\", \"s:1:0:1:4\");\na();\n\
             __adana_count(\"test.js\", \"s:2:0:2:4\");\nb();\n"
        );
    }

    #[test]
    fn test_blocks_empty_and_function_declarations_are_not_statements() {
        let (_, metadata) = instrument("{ a(); }\n;\nfunction f() {}\n");
        assert_eq!(kinds(&metadata), vec![EntryKind::Statement, EntryKind::Function]);
        assert_eq!(metadata.entries[1].name.as_deref(), Some("f"));
    }

    #[test]
    fn test_entries_are_in_preorder() {
        let (_, metadata) = instrument("if (a) { b(); } else { c(); }");
        let keys: Vec<_> = metadata.entries.iter().map(|e| e.key.as_str()).collect();
        assert_eq!(
            keys,
            vec!["s:1:0:1:29", "b:1:7:1:15", "b:1:21:1:29", "s:1:9:1:13", "s:1:23:1:27"]
        );
        assert_eq!(metadata.groups.len(), 1);
        assert_eq!(metadata.groups[0].kind, BranchKind::If);
        assert_eq!(metadata.groups[0].arms, 2);
    }

    #[test]
    fn test_if_chain_shares_one_group() {
        let (program, metadata) = instrument("if (a) x(); else if (b) y();");
        let branches: Vec<_> = metadata.entries_of(EntryKind::Branch).collect();
        let keys: Vec<_> = branches.iter().map(|b| b.key.as_str()).collect();
        // the implicit else arm is located at the last `if`
        assert_eq!(keys, vec!["b:1:7:1:11", "b:1:24:1:28", "i:1:17:1:28"]);
        assert_eq!(metadata.groups.len(), 1);
        assert!(branches.iter().all(|b| b.branch.map(|s| s.group_id) == Some(metadata.groups[0].id)));
        // one statement counter per call and per `if`, one per arm
        assert_eq!(printed(&program).matches("__adana_count(").count(), 6);
    }

    #[test]
    fn test_logical_and_conditional_wrapping() {
        let (program, metadata) = instrument("x = a || b;\ny = c ? d : e;");
        assert_eq!(metadata.groups.len(), 2);
        assert_eq!(metadata.groups[0].kind, BranchKind::Logical { operator: LogicalOp::Or });
        let out = printed(&program);
        assert!(out.contains(
            "x = (__adana_count(\"test.js\", \"b:1:4:1:5\"), a) || (__adana_count(\"test.js\", \"b:1:9:1:10\"), b);"
        ));
        assert!(out.contains(
            "y = c ? (__adana_count(\"test.js\", \"b:2:8:2:9\"), d) : (__adana_count(\"test.js\", \"b:2:12:2:13\"), e);"
        ));
    }

    #[test]
    fn test_loop_test_is_guarded() {
        let (program, metadata) = instrument("while (i < 3) i++;");
        assert_eq!(metadata.groups[0].kind, BranchKind::While);
        let out = printed(&program);
        assert!(out.contains("while (i < 3 ? (__adana_count("));
        assert!(out.contains("true) : (__adana_count("));
        assert!(out.contains("false)) {"));
    }

    #[test]
    fn test_try_without_catch_rethrows() {
        let (program, metadata) = instrument("try { a(); } finally { b(); }");
        assert_eq!(metadata.groups[0].kind, BranchKind::Try);
        let out = printed(&program);
        assert!(out.contains("catch (__adana_error) {"));
        assert!(out.contains("throw __adana_error;"));
        assert!(out.contains("let __adana_threw = false;"));
        assert!(out.contains("__adana_threw = true;"));
    }

    #[test]
    fn test_try_completion_is_counted_in_finally() {
        let (program, _) = instrument("try { a(); } catch (e) { b(); } finally { c(); }");
        let StmtKind::Block(wrapper) = &program.body[1].kind else { panic!("try is not wrapped") };
        let StmtKind::Try(try_stmt) = &wrapper.body[1].kind else { panic!("not a try") };

        let handler = &try_stmt.handler.as_ref().unwrap().body.body;
        assert!(matches!(&handler[0].kind, StmtKind::Expr(Expr { kind: ExprKind::Assign { .. }, .. })));
        assert!(matches!(&handler[1].kind, StmtKind::Expr(Expr { kind: ExprKind::Counter(_), .. })));

        let finalizer = &try_stmt.finalizer.as_ref().unwrap().body;
        assert_eq!(finalizer.len(), 3);
        assert!(matches!(
            &finalizer[0].kind,
            StmtKind::Expr(Expr { kind: ExprKind::Logical { op: LogicalOp::Or, .. }, .. })
        ));
    }

    #[test]
    fn test_nested_constructs_keep_their_groups() {
        for (source, kinds) in [
            ("if (a) if (b) x();", vec![BranchKind::If, BranchKind::If]),
            ("while (n) if (c) {}", vec![BranchKind::While, BranchKind::If]),
            ("if (a) {} else while (x) { x--; }", vec![BranchKind::If, BranchKind::While]),
            ("do if (a) x(); while (b);", vec![BranchKind::DoWhile, BranchKind::If]),
            ("if (a) {} else switch (x) { case 1: y(); }", vec![BranchKind::If, BranchKind::Switch]),
            ("if (a) {} else try { y(); } finally {}", vec![BranchKind::If, BranchKind::Try]),
            ("while (a) while (b) c();", vec![BranchKind::While, BranchKind::While]),
        ] {
            let (_, metadata) = instrument(source);
            let groups: Vec<_> = metadata.groups.iter().map(|group| group.kind).collect();
            assert_eq!(groups, kinds, "{source}");
            let keys: Vec<_> = metadata.entries.iter().map(|entry| &entry.key).collect();
            assert!(keys.iter().all_unique(), "{source}");
        }
    }

    #[test]
    fn test_switch_without_default_gets_unmatched_arm() {
        let (program, metadata) = instrument("switch (x) { case 1: a(); case 2: b(); }");
        assert_eq!(metadata.groups[0].arms, 3);
        let StmtKind::Switch(switch) = &program.body[1].kind else { panic!("not a switch") };
        assert_eq!(switch.cases.len(), 3);
        assert!(switch.cases[2].test.is_none());
        assert!(matches!(switch.cases[1].consequent.last().map(|s| &s.kind), Some(StmtKind::Break)));
    }

    #[test]
    fn test_function_names() {
        let (_, metadata) = instrument(
            "const f = () => 1;\nobj.g = function () {};\nlet o = { h() {} };\nclass C { m() {} }\nexport default function () {}",
        );
        let names: Vec<_> =
            metadata.entries_of(EntryKind::Function).map(|e| e.name.clone()).collect();
        assert_eq!(
            names,
            vec![
                Some("f".to_string()),
                Some("g".to_string()),
                Some("h".to_string()),
                Some("m".to_string()),
                Some("default".to_string())
            ]
        );
    }

    #[test]
    fn test_arrow_expression_body() {
        let (program, _) = instrument("const f = (x) => x + 1;");
        assert!(printed(&program)
            .contains("const f = (x) => (__adana_count(\"test.js\", \"f:1:10:1:22\"), x + 1);"));
    }

    #[test]
    fn test_second_pass_is_a_noop() {
        let (mut program, metadata) = instrument(
            "let i = 0;\ndo { i++; } while (i < 5);\ntry { a(); } catch (e) {}\nswitch (i) { case 1: b(); }\nconst f = () => i > 2 ? i : 0;",
        );
        assert!(!metadata.is_empty());
        let before = program.clone();
        let again = Instrumenter::new("test.js").instrument(&mut program).unwrap();
        assert!(again.is_empty());
        assert_eq!(program, before);
    }

    #[test]
    fn test_marked_statement_is_skipped() {
        let mut program = parse("do { } while(true);").unwrap();
        let id = program.body[0].id();
        program.marks.mark(id);
        let metadata = Instrumenter::new("").instrument(&mut program).unwrap();
        assert!(metadata.is_empty());
    }

    #[test]
    fn test_missing_location_is_invalid_node() {
        let mut program = parse("a();").unwrap();
        program.body.push(Stmt::expr(Expr::synthetic(ExprKind::Ident("b".into()))));
        let err = Instrumenter::new("test.js").instrument(&mut program).unwrap_err();
        assert!(matches!(err, Error::InvalidNode { kind: EntryKind::Statement, .. }));
    }

    #[test]
    fn test_disabled_kinds_are_not_collected() {
        let mut program = parse("function f() { return a && b; }\nf();").unwrap();
        let options = InstrumentOptions { statements: false, branches: true, functions: false };
        let metadata =
            Instrumenter::new("test.js").with_options(options).instrument(&mut program).unwrap();
        assert_eq!(kinds(&metadata), vec![EntryKind::Branch, EntryKind::Branch]);
    }
}
