//! Renders a (possibly instrumented) program back into JavaScript source.

use crate::{ast::*, parser::format_number};

/// Printer configuration.
#[derive(Clone, Debug)]
pub struct PrintOptions {
    /// Name of the function injected counters call.
    pub counter_fn: String,
    /// Property of `globalThis` holding the coverage object.
    pub coverage_global: String,
    /// Emit the definition of `counter_fn` when the program contains counters.
    pub prelude: bool,
    pub indent: String,
}

impl Default for PrintOptions {
    fn default() -> Self {
        Self {
            counter_fn: "__adana_count".to_string(),
            coverage_global: "__coverage__".to_string(),
            prelude: true,
            indent: "  ".to_string(),
        }
    }
}

/// Print a program with the given options.
pub fn print(program: &Program, opts: &PrintOptions) -> String {
    let mut printer = Printer { out: String::new(), depth: 0, opts, saw_counter: false };
    for stmt in &program.body {
        printer.stmt(stmt);
    }

    if printer.saw_counter && opts.prelude {
        let mut out = prelude(opts);
        out.push_str(&printer.out);
        out
    } else {
        printer.out
    }
}

fn prelude(opts: &PrintOptions) -> String {
    format!(
        "function {counter}(file, key) {{\n\
         {i}var all = globalThis.{global} = globalThis.{global} || {{}};\n\
         {i}var counters = all[file] = all[file] || {{}};\n\
         {i}counters[key] = (counters[key] || 0) + 1;\n\
         }}\n",
        counter = opts.counter_fn,
        global = opts.coverage_global,
        i = opts.indent,
    )
}

mod prec {
    pub const SEQUENCE: u8 = 1;
    pub const ASSIGN: u8 = 2;
    pub const CONDITIONAL: u8 = 3;
    pub const UNARY: u8 = 15;
    pub const POSTFIX: u8 = 16;
    pub const CALL: u8 = 17;
    pub const MEMBER: u8 = 18;
    pub const PRIMARY: u8 = 20;
}

fn precedence(expr: &Expr) -> u8 {
    match &expr.kind {
        ExprKind::Sequence(_) => prec::SEQUENCE,
        ExprKind::Assign { .. } => prec::ASSIGN,
        ExprKind::Function(function) if function.is_arrow => prec::ASSIGN,
        ExprKind::Conditional { .. } => prec::CONDITIONAL,
        ExprKind::Logical { op, .. } => op.precedence(),
        ExprKind::Binary { op, .. } => op.precedence(),
        ExprKind::Unary { .. } => prec::UNARY,
        ExprKind::Update { prefix: true, .. } => prec::UNARY,
        ExprKind::Update { prefix: false, .. } => prec::POSTFIX,
        ExprKind::Call { .. } | ExprKind::Counter(_) => prec::CALL,
        ExprKind::Member { .. } | ExprKind::New { .. } => prec::MEMBER,
        _ => prec::PRIMARY,
    }
}

/// The expression printed first when rendering `expr`.
fn leftmost(expr: &Expr) -> &Expr {
    match &expr.kind {
        ExprKind::Binary { left, .. } | ExprKind::Logical { left, .. } => leftmost(left),
        ExprKind::Assign { target, .. } => leftmost(target),
        ExprKind::Conditional { test, .. } => leftmost(test),
        ExprKind::Call { callee, .. } => leftmost(callee),
        ExprKind::Member { object, .. } => leftmost(object),
        ExprKind::Update { prefix: false, target, .. } => leftmost(target),
        ExprKind::Sequence(exprs) => exprs.first().map_or(expr, leftmost),
        _ => expr,
    }
}

/// Whether a statement starting with `expr` would be misread as a declaration or block.
fn starts_ambiguously(expr: &Expr) -> bool {
    match &leftmost(expr).kind {
        ExprKind::Object(_) => true,
        ExprKind::Function(function) => !function.is_arrow,
        _ => false,
    }
}

struct Printer<'a> {
    out: String,
    depth: usize,
    opts: &'a PrintOptions,
    saw_counter: bool,
}

impl Printer<'_> {
    fn push(&mut self, s: &str) {
        self.out.push_str(s);
    }

    fn indent(&mut self) {
        for _ in 0..self.depth {
            self.out.push_str(&self.opts.indent);
        }
    }

    fn newline(&mut self) {
        self.out.push('\n');
    }

    fn stmt(&mut self, stmt: &Stmt) {
        self.indent();
        self.stmt_inline(stmt);
        self.newline();
    }

    /// Print a statement without leading indentation or trailing newline.
    fn stmt_inline(&mut self, stmt: &Stmt) {
        match &stmt.kind {
            StmtKind::Expr(expr) => {
                if starts_ambiguously(expr) {
                    self.push("(");
                    self.expr(expr, prec::SEQUENCE);
                    self.push(")");
                } else {
                    self.expr(expr, prec::SEQUENCE);
                }
                self.push(";");
            }
            StmtKind::Var(decl) => {
                self.var_decl(decl);
                self.push(";");
            }
            StmtKind::Block(block) => self.block(block),
            StmtKind::If(if_stmt) => {
                self.push("if (");
                self.expr(&if_stmt.test, prec::SEQUENCE);
                self.push(")");
                self.body(&if_stmt.consequent);
                if let Some(alternate) = &if_stmt.alternate {
                    if if_stmt.consequent.is_block() {
                        self.push(" ");
                    } else {
                        self.newline();
                        self.indent();
                    }
                    self.push("else");
                    if matches!(alternate.kind, StmtKind::If(_)) {
                        self.push(" ");
                        self.stmt_inline(alternate);
                    } else {
                        self.body(alternate);
                    }
                }
            }
            StmtKind::While(while_stmt) => {
                self.push("while (");
                self.expr(&while_stmt.test, prec::SEQUENCE);
                self.push(")");
                self.body(&while_stmt.body);
            }
            StmtKind::DoWhile(do_while) => {
                self.push("do");
                self.body(&do_while.body);
                if do_while.body.is_block() {
                    self.push(" ");
                } else {
                    self.newline();
                    self.indent();
                }
                self.push("while (");
                self.expr(&do_while.test, prec::SEQUENCE);
                self.push(");");
            }
            StmtKind::For(for_stmt) => {
                self.push("for (");
                match &for_stmt.init {
                    Some(ForInit::Var(decl)) => self.var_decl(decl),
                    Some(ForInit::Expr(expr)) => self.expr(expr, prec::SEQUENCE),
                    None => {}
                }
                self.push(";");
                if let Some(test) = &for_stmt.test {
                    self.push(" ");
                    self.expr(test, prec::SEQUENCE);
                }
                self.push(";");
                if let Some(update) = &for_stmt.update {
                    self.push(" ");
                    self.expr(update, prec::SEQUENCE);
                }
                self.push(")");
                self.body(&for_stmt.body);
            }
            StmtKind::Return(arg) => {
                self.push("return");
                if let Some(arg) = arg {
                    self.push(" ");
                    self.expr(arg, prec::SEQUENCE);
                }
                self.push(";");
            }
            StmtKind::Break => self.push("break;"),
            StmtKind::Continue => self.push("continue;"),
            StmtKind::Throw(arg) => {
                self.push("throw ");
                self.expr(arg, prec::SEQUENCE);
                self.push(";");
            }
            StmtKind::Try(try_stmt) => {
                self.push("try ");
                self.block(&try_stmt.block);
                if let Some(handler) = &try_stmt.handler {
                    self.push(" catch ");
                    if let Some(param) = &handler.param {
                        self.push("(");
                        self.push(param);
                        self.push(") ");
                    }
                    self.block(&handler.body);
                }
                if let Some(finalizer) = &try_stmt.finalizer {
                    self.push(" finally ");
                    self.block(finalizer);
                }
            }
            StmtKind::Switch(switch) => {
                self.push("switch (");
                self.expr(&switch.discriminant, prec::SEQUENCE);
                self.push(") {");
                self.newline();
                self.depth += 1;
                for case in &switch.cases {
                    self.indent();
                    match &case.test {
                        Some(test) => {
                            self.push("case ");
                            self.expr(test, prec::SEQUENCE);
                            self.push(":");
                        }
                        None => self.push("default:"),
                    }
                    self.newline();
                    self.depth += 1;
                    for stmt in &case.consequent {
                        self.stmt(stmt);
                    }
                    self.depth -= 1;
                }
                self.depth -= 1;
                self.indent();
                self.push("}");
            }
            StmtKind::Function(function) => self.function(function),
            StmtKind::Class(class) => self.class(class),
            StmtKind::Export(export) => {
                self.push("export ");
                if export.default {
                    self.push("default ");
                }
                self.stmt_inline(&export.declaration);
            }
            StmtKind::Empty => self.push(";"),
        }
    }

    /// Body of `if`/loops: blocks on the same line, anything else indented on the next one.
    fn body(&mut self, stmt: &Stmt) {
        if let StmtKind::Block(block) = &stmt.kind {
            self.push(" ");
            self.block(block);
        } else {
            self.newline();
            self.depth += 1;
            self.indent();
            self.stmt_inline(stmt);
            self.depth -= 1;
        }
    }

    fn block(&mut self, block: &Block) {
        if block.body.is_empty() {
            self.push("{}");
            return;
        }
        self.push("{");
        self.newline();
        self.depth += 1;
        for stmt in &block.body {
            self.stmt(stmt);
        }
        self.depth -= 1;
        self.indent();
        self.push("}");
    }

    fn var_decl(&mut self, decl: &VarDecl) {
        self.push(decl.kind.as_str());
        self.push(" ");
        for (i, declarator) in decl.declarations.iter().enumerate() {
            if i > 0 {
                self.push(", ");
            }
            self.push(&declarator.name);
            if let Some(init) = &declarator.init {
                self.push(" = ");
                self.expr(init, prec::ASSIGN);
            }
        }
    }

    fn params(&mut self, params: &[String]) {
        self.push("(");
        self.push(&params.join(", "));
        self.push(")");
    }

    fn function(&mut self, function: &Function) {
        if function.is_arrow {
            self.params(&function.params);
            self.push(" => ");
            match &function.body {
                FunctionBody::Block(block) => self.block(block),
                FunctionBody::Expr(expr) => {
                    if matches!(leftmost(expr).kind, ExprKind::Object(_)) {
                        self.push("(");
                        self.expr(expr, prec::SEQUENCE);
                        self.push(")");
                    } else {
                        self.expr(expr, prec::ASSIGN);
                    }
                }
            }
            return;
        }

        self.push("function");
        if let Some(name) = &function.name {
            self.push(" ");
            self.push(name);
        }
        self.params(&function.params);
        self.push(" ");
        self.function_body(&function.body);
    }

    fn function_body(&mut self, body: &FunctionBody) {
        match body {
            FunctionBody::Block(block) => self.block(block),
            FunctionBody::Expr(expr) => {
                self.push("{ return ");
                self.expr(expr, prec::SEQUENCE);
                self.push("; }");
            }
        }
    }

    fn class(&mut self, class: &Class) {
        self.push("class");
        if let Some(name) = &class.name {
            self.push(" ");
            self.push(name);
        }
        if class.methods.is_empty() {
            self.push(" {}");
            return;
        }
        self.push(" {");
        self.newline();
        self.depth += 1;
        for method in &class.methods {
            self.indent();
            if method.is_static {
                self.push("static ");
            }
            self.push(&method.name);
            self.params(&method.function.params);
            self.push(" ");
            self.function_body(&method.function.body);
            self.newline();
        }
        self.depth -= 1;
        self.indent();
        self.push("}");
    }

    fn string(&mut self, s: &str) {
        // JSON string syntax is valid JavaScript
        let quoted = serde_json::to_string(s).unwrap_or_else(|_| format!("{s:?}"));
        self.push(&quoted);
    }

    fn args(&mut self, args: &[Expr]) {
        self.push("(");
        for (i, arg) in args.iter().enumerate() {
            if i > 0 {
                self.push(", ");
            }
            self.expr(arg, prec::ASSIGN);
        }
        self.push(")");
    }

    /// Logical operands mixing `??` with `&&`/`||` must be parenthesized.
    fn logical_operand(&mut self, op: LogicalOp, operand: &Expr, min: u8) {
        let mixes_nullish = match &operand.kind {
            ExprKind::Logical { op: inner, .. } => {
                (op == LogicalOp::Nullish) != (*inner == LogicalOp::Nullish)
            }
            _ => false,
        };
        if mixes_nullish {
            self.push("(");
            self.expr(operand, prec::SEQUENCE);
            self.push(")");
        } else {
            self.expr(operand, min);
        }
    }

    fn expr(&mut self, expr: &Expr, min: u8) {
        let wrap = precedence(expr) < min;
        if wrap {
            self.push("(");
        }

        match &expr.kind {
            ExprKind::Number(n) => self.push(&format_number(*n)),
            ExprKind::String(s) => self.string(s),
            ExprKind::Bool(b) => self.push(if *b { "true" } else { "false" }),
            ExprKind::Null => self.push("null"),
            ExprKind::Ident(name) => self.push(name),
            ExprKind::This => self.push("this"),
            ExprKind::Array(elements) => {
                self.push("[");
                for (i, element) in elements.iter().enumerate() {
                    if i > 0 {
                        self.push(", ");
                    }
                    self.expr(element, prec::ASSIGN);
                }
                self.push("]");
            }
            ExprKind::Object(properties) => {
                if properties.is_empty() {
                    self.push("{}");
                } else {
                    self.push("{ ");
                    for (i, property) in properties.iter().enumerate() {
                        if i > 0 {
                            self.push(", ");
                        }
                        self.string(&property.key);
                        self.push(": ");
                        self.expr(&property.value, prec::ASSIGN);
                    }
                    self.push(" }");
                }
            }
            ExprKind::Unary { op, arg } => {
                self.push(op.as_str());
                if matches!(op, UnaryOp::TypeOf | UnaryOp::Void) {
                    self.push(" ");
                }
                self.expr(arg, prec::POSTFIX);
            }
            ExprKind::Update { op, prefix, target } => {
                if *prefix {
                    self.push(op.as_str());
                    self.expr(target, prec::CALL);
                } else {
                    self.expr(target, prec::CALL);
                    self.push(op.as_str());
                }
            }
            ExprKind::Binary { op, left, right } => {
                self.expr(left, op.precedence());
                self.push(" ");
                self.push(op.as_str());
                self.push(" ");
                self.expr(right, op.precedence() + 1);
            }
            ExprKind::Logical { op, left, right } => {
                self.logical_operand(*op, left, op.precedence());
                self.push(" ");
                self.push(op.as_str());
                self.push(" ");
                self.logical_operand(*op, right, op.precedence() + 1);
            }
            ExprKind::Assign { op, target, value } => {
                self.expr(target, prec::CALL);
                self.push(" ");
                self.push(op.as_str());
                self.push(" ");
                self.expr(value, prec::ASSIGN);
            }
            ExprKind::Conditional { test, consequent, alternate } => {
                self.expr(test, prec::CONDITIONAL + 1);
                self.push(" ? ");
                self.expr(consequent, prec::ASSIGN);
                self.push(" : ");
                self.expr(alternate, prec::ASSIGN);
            }
            ExprKind::Call { callee, args } => {
                self.expr(callee, prec::CALL);
                self.args(args);
            }
            ExprKind::New { callee, args } => {
                self.push("new ");
                self.expr(callee, prec::MEMBER);
                self.args(args);
            }
            ExprKind::Member { object, property } => {
                self.expr(object, prec::CALL);
                match property {
                    MemberProp::Named(name) => {
                        self.push(".");
                        self.push(name);
                    }
                    MemberProp::Computed(property) => {
                        self.push("[");
                        self.expr(property, prec::SEQUENCE);
                        self.push("]");
                    }
                }
            }
            ExprKind::Function(function) => self.function(function),
            ExprKind::Sequence(exprs) => {
                for (i, expr) in exprs.iter().enumerate() {
                    if i > 0 {
                        self.push(", ");
                    }
                    self.expr(expr, prec::ASSIGN);
                }
            }
            ExprKind::Counter(counter) => {
                let opts = self.opts;
                self.saw_counter = true;
                self.push(&opts.counter_fn);
                self.push("(");
                self.string(&counter.file);
                self.push(", ");
                self.string(&counter.key);
                self.push(")");
            }
        }

        if wrap {
            self.push(")");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::parse;

    fn roundtrip(source: &str) -> String {
        let program = parse(source).unwrap();
        print(&program, &PrintOptions::default())
    }

    #[test]
    fn test_print_statements() {
        let printed = roundtrip("let a = 1, b\nif (a) { b = 2 } else if (b) c(); else { d() }");
        assert_eq!(
            printed,
            "let a = 1, b;\nif (a) {\n  b = 2;\n} else if (b)\n  c();\nelse {\n  d();\n}\n"
        );
    }

    #[test]
    fn test_print_preserves_grouping() {
        assert_eq!(roundtrip("(a + b) * c"), "(a + b) * c;\n");
        assert_eq!(roundtrip("a - (b - c)"), "a - (b - c);\n");
        assert_eq!(roundtrip("a ?? (b || c)"), "a ?? (b || c);\n");
        assert_eq!(roundtrip("-(-a)"), "-(-a);\n");
        assert_eq!(roundtrip("(function () {})()"), "(function() {}());\n");
        assert_eq!(roundtrip("f = () => ({ a: 1 })"), "f = () => ({ \"a\": 1 });\n");
        assert_eq!(roundtrip("new (f())()"), "new (f())();\n");
    }

    #[test]
    fn test_print_output_reparses() {
        let source = r#"
            class A { constructor(x) { this.x = x } static of(x) { return new A(x) } }
            switch (k) { case "a": f(); break; default: g() }
            try { h() } catch (e) { throw e } finally { done() }
            do x++; while (x < 3)
            for (let i = 0; i < 3; i++) total += i
            export default function () { return typeof total }
        "#;
        let once = roundtrip(source);
        let twice = roundtrip(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_counter_prelude() {
        let mut program = parse("foo();").unwrap();
        let counter = Expr::synthetic(ExprKind::Counter(CounterRef {
            file: Arc::from("a.js"),
            key: Arc::from("s:1:0:1:6"),
        }));
        program.body.insert(0, Stmt::expr(counter));

        let printed = print(&program, &PrintOptions::default());
        assert!(printed.starts_with("function __adana_count(file, key) {"));
        assert!(printed.ends_with("__adana_count(\"a.js\", \"s:1:0:1:6\");\nfoo();\n"));

        let bare = print(&program, &PrintOptions { prelude: false, ..Default::default() });
        assert!(bare.starts_with("__adana_count("));
    }
}
