use std::{cell::RefCell, rc::Rc, sync::Arc};

use adana_syntax::ast::*;
use itertools::Itertools;
use thiserror::Error;

use super::{
    store::CoverageStore,
    value::{Callable, Closure, NativeFn, Object, ObjectKind, ObjectRef, Scope, ScopeRef, Value},
};

/// Nesting of calls after which a `RangeError` is thrown.
pub const MAX_CALL_DEPTH: usize = 128;

const ERROR_CONSTRUCTORS: [(&str, NativeFn); 4] = [
    ("Error", error),
    ("TypeError", type_error),
    ("ReferenceError", reference_error),
    ("RangeError", range_error),
];

/// Abrupt completion of a statement or expression.
#[derive(Debug)]
pub enum Control {
    Throw(Value),
    Return(Value),
    Break,
    Continue,
}

type Completion<T = Value> = std::result::Result<T, Control>;

#[derive(Debug, Error)]
pub enum RuntimeError {
    /// The program threw a value nothing caught.
    #[error("uncaught {0}")]
    Uncaught(String),
    #[error("`{0}` outside of a {1}")]
    IllegalControl(&'static str, &'static str),
}

/// Assignable place.
enum Reference {
    Binding(String),
    Property(Value, String),
}

/// Tree-walking evaluator for the supported JavaScript subset.
///
/// Counter nodes left by instrumentation increment the interpreter's [`CoverageStore`]; nothing
/// else about execution is coverage specific.
pub struct Interpreter {
    store: Arc<CoverageStore>,
    global: ScopeRef,
    exports: ObjectRef,
    output: Vec<String>,
    depth: usize,
}

impl Interpreter {
    pub fn new(store: Arc<CoverageStore>) -> Self {
        let mut interpreter = Self {
            store,
            global: Scope::global(),
            exports: Rc::new(RefCell::new(Object::plain())),
            output: Vec::new(),
            depth: 0,
        };
        interpreter.install_globals();
        interpreter
    }

    pub fn store(&self) -> &Arc<CoverageStore> {
        &self.store
    }

    /// Lines written with `console.log`.
    pub fn output(&self) -> &[String] {
        &self.output
    }

    pub fn take_output(&mut self) -> Vec<String> {
        std::mem::take(&mut self.output)
    }

    pub fn exports(&self) -> Value {
        Value::Object(self.exports.clone())
    }

    pub fn global(&self, name: &str) -> Option<Value> {
        Scope::lookup(&self.global, name)
    }

    /// Run `program` in the global scope, returning the value of the last top-level expression
    /// statement.
    pub fn run(&mut self, program: &Program) -> Result<Value, RuntimeError> {
        let global = self.global.clone();
        let result = self.exec_list(&program.body, &global);
        debug!(lines = self.output.len(), ok = result.is_ok(), "program finished");
        match result {
            Ok(value) => Ok(value),
            Err(Control::Throw(value)) => Err(RuntimeError::Uncaught(value.inspect())),
            Err(Control::Return(_)) => Err(RuntimeError::IllegalControl("return", "function")),
            Err(Control::Break) => Err(RuntimeError::IllegalControl("break", "loop or switch")),
            Err(Control::Continue) => Err(RuntimeError::IllegalControl("continue", "loop")),
        }
    }

    /// Call a function value.
    pub fn call(&mut self, function: &Value, this: Value, args: &[Value]) -> Completion {
        match callable(function) {
            Some(Callable::Native { func, .. }) => func(self, &this, args),
            Some(Callable::Closure(closure)) if closure.is_class => self.throw(
                "TypeError",
                format!("Class constructor {} cannot be invoked without 'new'", closure.name()),
            ),
            Some(Callable::Closure(closure)) => self.call_closure(&closure, this, args),
            None => self.throw("TypeError", format!("{} is not a function", function.inspect())),
        }
    }

    fn install_globals(&mut self) {
        let global = self.global.clone();
        Scope::define(&global, "undefined", Value::Undefined);
        Scope::define(&global, "NaN", Value::Number(f64::NAN));
        Scope::define(&global, "Infinity", Value::Number(f64::INFINITY));
        Scope::define(&global, "globalThis", Value::object(Object::plain()));
        Scope::define(&global, "exports", Value::Object(self.exports.clone()));

        let mut console = Object::plain();
        console.set("log", native("log", console_log));
        Scope::define(&global, "console", Value::object(console));

        for (name, func) in ERROR_CONSTRUCTORS {
            Scope::define(&global, name, native(name, func));
        }
    }

    fn throw<T>(&self, name: &str, message: impl Into<String>) -> Completion<T> {
        Err(Control::Throw(Value::object(Object::error(name, &message.into()))))
    }

    // ---------------------------------------------------------------------
    // statements

    fn exec_list(&mut self, list: &[Stmt], scope: &ScopeRef) -> Completion {
        self.hoist(list, scope);
        let mut last = Value::Undefined;
        for statement in list {
            let value = self.exec(statement, scope)?;
            if matches!(statement.kind, StmtKind::Expr(_)) {
                last = value;
            }
        }
        Ok(last)
    }

    fn hoist(&mut self, list: &[Stmt], scope: &ScopeRef) {
        for statement in list {
            let function = match &statement.kind {
                StmtKind::Function(function) => function,
                StmtKind::Export(ExportDecl { declaration, .. }) => match &declaration.kind {
                    StmtKind::Function(function) => function,
                    _ => continue,
                },
                _ => continue,
            };
            if let Some(name) = &function.name {
                let closure = self.closure(function, scope, false);
                Scope::define(scope, name, Value::Object(closure));
            }
        }
    }

    fn exec_block(&mut self, block: &Block, scope: &ScopeRef) -> Completion {
        let scope = Scope::child(scope);
        self.exec_list(&block.body, &scope)
    }

    fn exec(&mut self, statement: &Stmt, scope: &ScopeRef) -> Completion {
        match &statement.kind {
            StmtKind::Expr(expr) => return self.eval(expr, scope),
            StmtKind::Var(decl) => self.declare(decl, scope)?,
            StmtKind::Block(block) => {
                self.exec_block(block, scope)?;
            }
            StmtKind::If(if_stmt) => {
                if self.eval(&if_stmt.test, scope)?.is_truthy() {
                    self.exec(&if_stmt.consequent, scope)?;
                } else if let Some(alternate) = &if_stmt.alternate {
                    self.exec(alternate, scope)?;
                }
            }
            StmtKind::While(while_stmt) => {
                while self.eval(&while_stmt.test, scope)?.is_truthy() {
                    match self.exec(&while_stmt.body, scope) {
                        Err(Control::Break) => break,
                        Ok(_) | Err(Control::Continue) => {}
                        Err(control) => return Err(control),
                    }
                }
            }
            StmtKind::DoWhile(do_while) => loop {
                match self.exec(&do_while.body, scope) {
                    Err(Control::Break) => break,
                    Ok(_) | Err(Control::Continue) => {}
                    Err(control) => return Err(control),
                }
                if !self.eval(&do_while.test, scope)?.is_truthy() {
                    break;
                }
            },
            StmtKind::For(for_stmt) => self.exec_for(for_stmt, scope)?,
            StmtKind::Return(argument) => {
                let value = match argument {
                    Some(argument) => self.eval(argument, scope)?,
                    None => Value::Undefined,
                };
                return Err(Control::Return(value));
            }
            StmtKind::Break => return Err(Control::Break),
            StmtKind::Continue => return Err(Control::Continue),
            StmtKind::Throw(argument) => return Err(Control::Throw(self.eval(argument, scope)?)),
            StmtKind::Try(try_stmt) => self.exec_try(try_stmt, scope)?,
            StmtKind::Switch(switch) => self.exec_switch(switch, scope)?,
            // named declarations are hoisted
            StmtKind::Function(function) if function.name.is_some() => {}
            StmtKind::Function(function) => {
                return Ok(Value::Object(self.closure(function, scope, false)));
            }
            StmtKind::Class(class) => {
                let value = self.class(class, scope);
                if let Some(name) = &class.name {
                    Scope::define(scope, name, value.clone());
                }
                return Ok(value);
            }
            StmtKind::Export(export) => self.exec_export(export, scope)?,
            StmtKind::Empty => {}
        }
        Ok(Value::Undefined)
    }

    fn declare(&mut self, decl: &VarDecl, scope: &ScopeRef) -> Completion<()> {
        for declarator in &decl.declarations {
            let value = match &declarator.init {
                Some(init) => self.eval(init, scope)?,
                None => Value::Undefined,
            };
            match decl.kind {
                VarKind::Var => Scope::define_var(scope, &declarator.name, value),
                VarKind::Let | VarKind::Const => Scope::define(scope, &declarator.name, value),
            }
        }
        Ok(())
    }

    fn exec_for(&mut self, for_stmt: &ForStmt, scope: &ScopeRef) -> Completion<()> {
        let scope = Scope::child(scope);
        match &for_stmt.init {
            Some(ForInit::Var(decl)) => self.declare(decl, &scope)?,
            Some(ForInit::Expr(expr)) => {
                self.eval(expr, &scope)?;
            }
            None => {}
        }
        loop {
            if let Some(test) = &for_stmt.test {
                if !self.eval(test, &scope)?.is_truthy() {
                    break;
                }
            }
            match self.exec(&for_stmt.body, &scope) {
                Err(Control::Break) => break,
                Ok(_) | Err(Control::Continue) => {}
                Err(control) => return Err(control),
            }
            if let Some(update) = &for_stmt.update {
                self.eval(update, &scope)?;
            }
        }
        Ok(())
    }

    fn exec_try(&mut self, try_stmt: &TryStmt, scope: &ScopeRef) -> Completion<()> {
        let result = match (self.exec_block(&try_stmt.block, scope), &try_stmt.handler) {
            (Err(Control::Throw(error)), Some(handler)) => {
                let scope = Scope::child(scope);
                if let Some(param) = &handler.param {
                    Scope::define(&scope, param, error);
                }
                self.exec_block(&handler.body, &scope)
            }
            (result, _) => result,
        };
        // an abrupt `finally` replaces the completion of the try statement
        if let Some(finalizer) = &try_stmt.finalizer {
            self.exec_block(finalizer, scope)?;
        }
        result.map(drop)
    }

    fn exec_switch(&mut self, switch: &SwitchStmt, scope: &ScopeRef) -> Completion<()> {
        let discriminant = self.eval(&switch.discriminant, scope)?;
        let scope = Scope::child(scope);

        let mut start = None;
        for (index, case) in switch.cases.iter().enumerate() {
            if let Some(test) = &case.test {
                if self.eval(test, &scope)?.strict_equals(&discriminant) {
                    start = Some(index);
                    break;
                }
            }
        }
        let Some(start) = start.or_else(|| switch.cases.iter().position(|c| c.test.is_none()))
        else {
            return Ok(());
        };

        for case in &switch.cases[start..] {
            match self.exec_list(&case.consequent, &scope) {
                Ok(_) => {}
                Err(Control::Break) => break,
                Err(control) => return Err(control),
            }
        }
        Ok(())
    }

    fn exec_export(&mut self, export: &ExportDecl, scope: &ScopeRef) -> Completion<()> {
        let declaration = &export.declaration;
        if export.default {
            let value = match &declaration.kind {
                StmtKind::Function(Function { name: Some(name), .. }) => {
                    Scope::lookup(scope, name).unwrap_or_default()
                }
                _ => self.exec(declaration, scope)?,
            };
            self.exports.borrow_mut().set("default", value);
            return Ok(());
        }

        self.exec(declaration, scope)?;
        let names: Vec<&str> = match &declaration.kind {
            StmtKind::Var(decl) => decl.declarations.iter().map(|d| d.name.as_str()).collect(),
            StmtKind::Function(function) => function.name.as_deref().into_iter().collect(),
            StmtKind::Class(class) => class.name.as_deref().into_iter().collect(),
            _ => Vec::new(),
        };
        for name in names {
            let value = Scope::lookup(scope, name).unwrap_or_default();
            self.exports.borrow_mut().set(name, value);
        }
        Ok(())
    }

    fn closure(&self, function: &Function, scope: &ScopeRef, is_class: bool) -> ObjectRef {
        let closure =
            Closure { function: Rc::new(function.clone()), scope: scope.clone(), is_class };
        let mut object = Object::function(Callable::Closure(closure));
        if !function.is_arrow && !is_class {
            object.set("prototype", Value::object(Object::plain()));
        }
        Rc::new(RefCell::new(object))
    }

    fn class(&mut self, class: &Class, scope: &ScopeRef) -> Value {
        let mut constructor = class
            .methods
            .iter()
            .find(|method| !method.is_static && method.name == "constructor")
            .map(|method| method.function.clone())
            .unwrap_or_else(|| Function {
                node: Node::synthetic(),
                name: None,
                params: Vec::new(),
                body: FunctionBody::Block(Block::synthetic(Vec::new())),
                is_arrow: false,
            });
        constructor.name = class.name.clone();

        let object = self.closure(&constructor, scope, true);
        let prototype = Rc::new(RefCell::new(Object::plain()));
        for method in &class.methods {
            if !method.is_static && method.name == "constructor" {
                continue;
            }
            let value = Value::Object(self.closure(&method.function, scope, false));
            if method.is_static {
                object.borrow_mut().set(&method.name, value);
            } else {
                prototype.borrow_mut().set(&method.name, value);
            }
        }
        object.borrow_mut().set("prototype", Value::Object(prototype));
        Value::Object(object)
    }

    // ---------------------------------------------------------------------
    // expressions

    fn eval(&mut self, expr: &Expr, scope: &ScopeRef) -> Completion {
        match &expr.kind {
            ExprKind::Number(n) => Ok(Value::Number(*n)),
            ExprKind::String(s) => Ok(Value::string(s)),
            ExprKind::Bool(b) => Ok(Value::Bool(*b)),
            ExprKind::Null => Ok(Value::Null),
            ExprKind::Ident(name) => match Scope::lookup(scope, name) {
                Some(value) => Ok(value),
                None => self.throw("ReferenceError", format!("{name} is not defined")),
            },
            ExprKind::This => Ok(Scope::this(scope)),
            ExprKind::Array(items) => {
                let items = self.eval_all(items, scope)?;
                Ok(Value::object(Object::array(items)))
            }
            ExprKind::Object(properties) => {
                let mut object = Object::plain();
                for property in properties {
                    let value = self.eval(&property.value, scope)?;
                    object.set(&property.key, value);
                }
                Ok(Value::object(object))
            }
            ExprKind::Unary { op, arg } => {
                if let (UnaryOp::TypeOf, ExprKind::Ident(name)) = (op, &arg.kind) {
                    if Scope::lookup(scope, name).is_none() {
                        return Ok(Value::string("undefined"));
                    }
                }
                let value = self.eval(arg, scope)?;
                Ok(match op {
                    UnaryOp::Not => Value::Bool(!value.is_truthy()),
                    UnaryOp::Minus => Value::Number(-value.to_number()),
                    UnaryOp::Plus => Value::Number(value.to_number()),
                    UnaryOp::TypeOf => Value::string(value.type_of()),
                    UnaryOp::Void => Value::Undefined,
                })
            }
            ExprKind::Update { op, prefix, target } => {
                let reference = self.reference(target, scope)?;
                let old = self.get_reference(&reference, scope)?.to_number();
                let new = match op {
                    UpdateOp::Increment => old + 1.0,
                    UpdateOp::Decrement => old - 1.0,
                };
                self.put_reference(reference, Value::Number(new), scope)?;
                Ok(Value::Number(if *prefix { new } else { old }))
            }
            ExprKind::Binary { op, left, right } => {
                let left = self.eval(left, scope)?;
                let right = self.eval(right, scope)?;
                Ok(binary(*op, &left, &right))
            }
            ExprKind::Logical { op, left, right } => {
                let left = self.eval(left, scope)?;
                let short_circuits = match op {
                    LogicalOp::And => !left.is_truthy(),
                    LogicalOp::Or => left.is_truthy(),
                    LogicalOp::Nullish => !left.is_nullish(),
                };
                if short_circuits {
                    Ok(left)
                } else {
                    self.eval(right, scope)
                }
            }
            ExprKind::Assign { op, target, value } => {
                let reference = self.reference(target, scope)?;
                let value = match op.binary() {
                    None => self.eval(value, scope)?,
                    Some(binary_op) => {
                        let current = self.get_reference(&reference, scope)?;
                        let value = self.eval(value, scope)?;
                        binary(binary_op, &current, &value)
                    }
                };
                self.put_reference(reference, value.clone(), scope)?;
                Ok(value)
            }
            ExprKind::Conditional { test, consequent, alternate } => {
                if self.eval(test, scope)?.is_truthy() {
                    self.eval(consequent, scope)
                } else {
                    self.eval(alternate, scope)
                }
            }
            ExprKind::Call { callee, args } => {
                let (function, this) = match &callee.kind {
                    ExprKind::Member { object, property } => {
                        let object = self.eval(object, scope)?;
                        let key = self.property_key(property, scope)?;
                        (self.get_property(&object, &key)?, object)
                    }
                    _ => (self.eval(callee, scope)?, Value::Undefined),
                };
                let args = self.eval_all(args, scope)?;
                if !function.is_callable() {
                    return self.throw("TypeError", format!("{} is not a function", describe(callee)));
                }
                self.call(&function, this, &args)
            }
            ExprKind::New { callee, args } => {
                let constructor = self.eval(callee, scope)?;
                let args = self.eval_all(args, scope)?;
                self.construct(&constructor, &args, callee)
            }
            ExprKind::Member { object, property } => {
                let object = self.eval(object, scope)?;
                let key = self.property_key(property, scope)?;
                self.get_property(&object, &key)
            }
            ExprKind::Function(function) => Ok(Value::Object(self.closure(function, scope, false))),
            ExprKind::Sequence(exprs) => {
                let mut last = Value::Undefined;
                for expr in exprs {
                    last = self.eval(expr, scope)?;
                }
                Ok(last)
            }
            ExprKind::Counter(counter) => {
                self.store.increment(&counter.file, &counter.key);
                Ok(Value::Undefined)
            }
        }
    }

    fn eval_all(&mut self, exprs: &[Expr], scope: &ScopeRef) -> Completion<Vec<Value>> {
        exprs.iter().map(|expr| self.eval(expr, scope)).collect()
    }

    fn call_closure(&mut self, closure: &Closure, this: Value, args: &[Value]) -> Completion {
        if self.depth >= MAX_CALL_DEPTH {
            return self.throw("RangeError", "Maximum call stack size exceeded");
        }

        let function = &closure.function;
        let this = (!function.is_arrow).then_some(this);
        let scope = Scope::function(&closure.scope, this);
        for (index, param) in function.params.iter().enumerate() {
            Scope::define(&scope, param, args.get(index).cloned().unwrap_or_default());
        }

        self.depth += 1;
        let result = match &function.body {
            FunctionBody::Block(block) => self.exec_list(&block.body, &scope).map(|_| Value::Undefined),
            FunctionBody::Expr(expr) => self.eval(expr, &scope),
        };
        self.depth -= 1;

        match result {
            Err(Control::Return(value)) => Ok(value),
            Err(Control::Break | Control::Continue) => Ok(Value::Undefined),
            result => result,
        }
    }

    fn construct(&mut self, constructor: &Value, args: &[Value], callee: &Expr) -> Completion {
        match callable(constructor) {
            Some(Callable::Native { func, .. }) => func(self, &Value::Undefined, args),
            Some(Callable::Closure(closure)) if !closure.function.is_arrow => {
                let mut instance = Object::plain();
                instance.proto = constructor
                    .as_object()
                    .and_then(|object| Object::lookup(object, "prototype"))
                    .and_then(|prototype| prototype.as_object().cloned());
                let instance = Value::object(instance);
                let result = self.call_closure(&closure, instance.clone(), args)?;
                Ok(if matches!(result, Value::Object(_)) { result } else { instance })
            }
            _ => self.throw("TypeError", format!("{} is not a constructor", describe(callee))),
        }
    }

    fn property_key(&mut self, property: &MemberProp, scope: &ScopeRef) -> Completion<String> {
        match property {
            MemberProp::Named(name) => Ok(name.clone()),
            MemberProp::Computed(expr) => Ok(self.eval(expr, scope)?.to_js_string()),
        }
    }

    fn get_property(&self, object: &Value, key: &str) -> Completion {
        match object {
            Value::Undefined | Value::Null => self.throw(
                "TypeError",
                format!("Cannot read properties of {} (reading '{key}')", object.to_js_string()),
            ),
            Value::String(s) => Ok(match key {
                "length" => Value::Number(s.encode_utf16().count() as f64),
                _ => key
                    .parse::<usize>()
                    .ok()
                    .and_then(|index| s.chars().nth(index))
                    .map_or(Value::Undefined, |c| Value::string(c.to_string())),
            }),
            Value::Object(object_ref) => {
                if let ObjectKind::Array(items) = &object_ref.borrow().kind {
                    if key == "length" {
                        return Ok(Value::Number(items.len() as f64));
                    }
                    if let Ok(index) = key.parse::<usize>() {
                        return Ok(items.get(index).cloned().unwrap_or_default());
                    }
                    if let Some(method) = array_method(key) {
                        return Ok(method);
                    }
                }
                Ok(Object::lookup(object_ref, key).unwrap_or_default())
            }
            Value::Bool(_) | Value::Number(_) => Ok(Value::Undefined),
        }
    }

    fn set_property(&self, object: &Value, key: &str, value: Value) -> Completion<()> {
        match object {
            Value::Undefined | Value::Null => self.throw(
                "TypeError",
                format!("Cannot set properties of {} (setting '{key}')", object.to_js_string()),
            ),
            Value::Object(object_ref) => {
                let mut object = object_ref.borrow_mut();
                if let ObjectKind::Array(items) = &mut object.kind {
                    if let Ok(index) = key.parse::<usize>() {
                        if index >= items.len() {
                            items.resize(index + 1, Value::Undefined);
                        }
                        items[index] = value;
                        return Ok(());
                    }
                }
                object.set(key, value);
                Ok(())
            }
            _ => Ok(()),
        }
    }

    fn reference(&mut self, target: &Expr, scope: &ScopeRef) -> Completion<Reference> {
        match &target.kind {
            ExprKind::Ident(name) => Ok(Reference::Binding(name.clone())),
            ExprKind::Member { object, property } => {
                let object = self.eval(object, scope)?;
                let key = self.property_key(property, scope)?;
                Ok(Reference::Property(object, key))
            }
            _ => self.throw("SyntaxError", "Invalid assignment target"),
        }
    }

    fn get_reference(&mut self, reference: &Reference, scope: &ScopeRef) -> Completion {
        match reference {
            Reference::Binding(name) => match Scope::lookup(scope, name) {
                Some(value) => Ok(value),
                None => self.throw("ReferenceError", format!("{name} is not defined")),
            },
            Reference::Property(object, key) => self.get_property(object, key),
        }
    }

    fn put_reference(&mut self, reference: Reference, value: Value, scope: &ScopeRef) -> Completion<()> {
        match reference {
            Reference::Binding(name) => {
                // assignments to undeclared names create globals
                if !Scope::assign(scope, &name, value.clone()) {
                    Scope::define(&self.global, &name, value);
                }
                Ok(())
            }
            Reference::Property(object, key) => self.set_property(&object, &key, value),
        }
    }
}

fn callable(value: &Value) -> Option<Callable> {
    value.as_object().and_then(|object| object.borrow().callable().cloned())
}

fn native(name: &'static str, func: NativeFn) -> Value {
    Value::object(Object::function(Callable::Native { name, func }))
}

/// Source-like description of a callee, used in error messages.
fn describe(expr: &Expr) -> String {
    match &expr.kind {
        ExprKind::Ident(name) => name.clone(),
        ExprKind::This => "this".to_string(),
        ExprKind::Member { object, property: MemberProp::Named(name) } => {
            format!("{}.{name}", describe(object))
        }
        ExprKind::Member { object, property: MemberProp::Computed(_) } => {
            format!("{}[...]", describe(object))
        }
        _ => "expression".to_string(),
    }
}

fn binary(op: BinaryOp, left: &Value, right: &Value) -> Value {
    let is_textual = |value: &Value| matches!(value, Value::String(_) | Value::Object(_));
    match op {
        BinaryOp::Add if is_textual(left) || is_textual(right) => {
            Value::string(format!("{}{}", left.to_js_string(), right.to_js_string()))
        }
        BinaryOp::Add => Value::Number(left.to_number() + right.to_number()),
        BinaryOp::Sub => Value::Number(left.to_number() - right.to_number()),
        BinaryOp::Mul => Value::Number(left.to_number() * right.to_number()),
        BinaryOp::Div => Value::Number(left.to_number() / right.to_number()),
        BinaryOp::Rem => Value::Number(left.to_number() % right.to_number()),
        BinaryOp::Eq => Value::Bool(left.loose_equals(right)),
        BinaryOp::NotEq => Value::Bool(!left.loose_equals(right)),
        BinaryOp::StrictEq => Value::Bool(left.strict_equals(right)),
        BinaryOp::StrictNotEq => Value::Bool(!left.strict_equals(right)),
        BinaryOp::Lt | BinaryOp::LtEq | BinaryOp::Gt | BinaryOp::GtEq => {
            Value::Bool(compare(op, left, right))
        }
    }
}

fn compare(op: BinaryOp, left: &Value, right: &Value) -> bool {
    if let (Value::String(a), Value::String(b)) = (left, right) {
        return match op {
            BinaryOp::Lt => a < b,
            BinaryOp::LtEq => a <= b,
            BinaryOp::Gt => a > b,
            _ => a >= b,
        };
    }
    let (a, b) = (left.to_number(), right.to_number());
    match op {
        BinaryOp::Lt => a < b,
        BinaryOp::LtEq => a <= b,
        BinaryOp::Gt => a > b,
        _ => a >= b,
    }
}

// -------------------------------------------------------------------------
// built-ins

fn console_log(interpreter: &mut Interpreter, _this: &Value, args: &[Value]) -> Completion {
    let line = args.iter().map(Value::inspect).join(" ");
    trace!(target: "adana::console", "{line}");
    interpreter.output.push(line);
    Ok(Value::Undefined)
}

fn new_error(name: &str, args: &[Value]) -> Completion {
    let message = match args.first() {
        Some(Value::Undefined) | None => String::new(),
        Some(message) => message.to_js_string(),
    };
    Ok(Value::object(Object::error(name, &message)))
}

fn error(_: &mut Interpreter, _: &Value, args: &[Value]) -> Completion {
    new_error("Error", args)
}

fn type_error(_: &mut Interpreter, _: &Value, args: &[Value]) -> Completion {
    new_error("TypeError", args)
}

fn reference_error(_: &mut Interpreter, _: &Value, args: &[Value]) -> Completion {
    new_error("ReferenceError", args)
}

fn range_error(_: &mut Interpreter, _: &Value, args: &[Value]) -> Completion {
    new_error("RangeError", args)
}

fn array_method(name: &str) -> Option<Value> {
    let (name, func): (&'static str, NativeFn) = match name {
        "push" => ("push", array_push),
        "pop" => ("pop", array_pop),
        "join" => ("join", array_join),
        "indexOf" => ("indexOf", array_index_of),
        _ => return None,
    };
    Some(native(name, func))
}

fn with_items<T>(this: &Value, f: impl FnOnce(&mut Vec<Value>) -> T) -> Option<T> {
    let mut object = this.as_object()?.borrow_mut();
    match &mut object.kind {
        ObjectKind::Array(items) => Some(f(items)),
        _ => None,
    }
}

fn array_push(_: &mut Interpreter, this: &Value, args: &[Value]) -> Completion {
    let len = with_items(this, |items| {
        items.extend(args.iter().cloned());
        items.len()
    });
    Ok(len.map_or(Value::Undefined, |len| Value::Number(len as f64)))
}

fn array_pop(_: &mut Interpreter, this: &Value, _: &[Value]) -> Completion {
    Ok(with_items(this, |items| items.pop()).flatten().unwrap_or_default())
}

fn array_join(_: &mut Interpreter, this: &Value, args: &[Value]) -> Completion {
    let separator = match args.first() {
        Some(Value::Undefined) | None => ",".to_string(),
        Some(separator) => separator.to_js_string(),
    };
    let joined = with_items(this, |items| {
        items
            .iter()
            .map(|item| if item.is_nullish() { String::new() } else { item.to_js_string() })
            .join(&separator)
    });
    Ok(joined.map_or(Value::Undefined, Value::string))
}

fn array_index_of(_: &mut Interpreter, this: &Value, args: &[Value]) -> Completion {
    let needle = args.first().cloned().unwrap_or_default();
    let index = with_items(this, |items| items.iter().position(|item| item.strict_equals(&needle)));
    Ok(Value::Number(index.flatten().map_or(-1.0, |index| index as f64)))
}

#[cfg(test)]
mod tests {
    use adana_syntax::parse;

    use super::*;
    use crate::instrumentation::Instrumenter;

    fn interpreter() -> Interpreter {
        Interpreter::new(Arc::new(CoverageStore::new()))
    }

    fn eval(source: &str) -> Value {
        interpreter().run(&parse(source).unwrap()).unwrap()
    }

    fn eval_str(source: &str) -> String {
        eval(source).to_js_string()
    }

    #[test]
    fn test_arithmetic_and_strings() {
        assert_eq!(eval_str("let a = 1 + 2; a * 2"), "6");
        assert_eq!(eval_str("'n=' + 4"), "n=4");
        assert_eq!(eval_str("7 % 4 - 1 / 2"), "2.5");
        assert_eq!(eval_str("typeof missing"), "undefined");
        assert_eq!(eval_str("'abc'.length"), "3");
        assert_eq!(eval_str("null ?? 'x'"), "x");
    }

    #[test]
    fn test_closures() {
        let source = "function make() { let n = 0; return () => ++n; }\nconst c = make();\nc();\nc()";
        assert_eq!(eval_str(source), "2");
    }

    #[test]
    fn test_classes() {
        let source = "class P {\n  constructor(x) { this.x = x; }\n  get() { return this.x; }\n  static of(x) { return new P(x); }\n}\nP.of(5).get()";
        assert_eq!(eval_str(source), "5");
    }

    #[test]
    fn test_arrays() {
        assert_eq!(eval_str("const a = [1]; a.push(2, 3); a[4] = 5; a.join('-')"), "1-2-3--5");
        assert_eq!(eval_str("[1, 2, 3].indexOf(3)"), "2");
        assert_eq!(eval_str("const a = [1, 2]; a.pop(); a.length"), "1");
    }

    #[test]
    fn test_control_flow() {
        let source = "let out = [];\nfor (let i = 0; i < 5; i++) {\n  if (i === 1) continue;\n  if (i === 3) break;\n  out.push(i);\n}\nlet j = 0;\ndo { j++; } while (j < 3);\nout.push(j);\nout.join()";
        assert_eq!(eval_str(source), "0,2,3");
    }

    #[test]
    fn test_switch_fallthrough() {
        let source = "let hits = [];\nswitch (2) {\n  case 1: hits.push(1);\n  case 2: hits.push(2);\n  case 3: hits.push(3); break;\n  default: hits.push(0);\n}\nhits.join()";
        assert_eq!(eval_str(source), "2,3");
    }

    #[test]
    fn test_try_catch_finally_order() {
        let mut interpreter = interpreter();
        let source = "try {\n  console.log('try');\n  throw new Error('boom');\n} catch (e) {\n  console.log(e.message);\n} finally {\n  console.log('finally');\n}";
        interpreter.run(&parse(source).unwrap()).unwrap();
        assert_eq!(interpreter.output(), ["try", "boom", "finally"]);
    }

    #[test]
    fn test_thrown_value_identity() {
        let source = "const err = { code: 1 };\nlet same;\ntry { throw err; } catch (e) { same = e === err; }\nsame";
        assert_eq!(eval_str(source), "true");
    }

    #[test]
    fn test_runtime_errors_are_catchable() {
        let source = "let name;\ntry { missing(); } catch (e) { name = e.name; }\nname";
        assert_eq!(eval_str(source), "ReferenceError");
        let source = "let message;\ntry { undefined.x; } catch (e) { message = e.message; }\nmessage";
        assert_eq!(eval_str(source), "Cannot read properties of undefined (reading 'x')");
    }

    #[test]
    fn test_uncaught_error() {
        let err = interpreter().run(&parse("throw new TypeError('bad')").unwrap()).unwrap_err();
        assert!(matches!(&err, RuntimeError::Uncaught(message) if message == "TypeError: bad"));
        let err = interpreter().run(&parse("throw 'plain'").unwrap()).unwrap_err();
        assert_eq!(err.to_string(), "uncaught plain");
    }

    #[test]
    fn test_exports() {
        let mut interpreter = interpreter();
        let source = "export const a = 1;\nexport function b() { return 2; }\nexport default function () { return 3; }";
        interpreter.run(&parse(source).unwrap()).unwrap();
        let exports = interpreter.exports();
        let exports = exports.as_object().unwrap();
        assert_eq!(exports.borrow().keys().collect::<Vec<_>>(), vec!["a", "b", "default"]);
        let default = Object::lookup(exports, "default").unwrap();
        assert_eq!(interpreter.call(&default, Value::Undefined, &[]).unwrap().to_js_string(), "3");
    }

    #[test]
    fn test_call_depth_limit() {
        let handle = std::thread::Builder::new()
            .stack_size(64 << 20)
            .spawn(|| {
                let program = parse("function f() { return f(); }\nf();").unwrap();
                interpreter().run(&program).unwrap_err().to_string()
            })
            .unwrap();
        assert_eq!(handle.join().unwrap(), "uncaught RangeError: Maximum call stack size exceeded");
    }

    #[test]
    fn test_counters_increment_store() {
        let mut program = parse("let i = 0;\nwhile (i < 3) { i++; }").unwrap();
        let metadata = Instrumenter::new("loop.js").instrument(&mut program).unwrap();
        let mut interpreter = interpreter();
        interpreter.run(&program).unwrap();

        let raw = interpreter.store().snapshot("loop.js").unwrap();
        let counts: Vec<_> = metadata.entries.iter().map(|entry| raw.get(entry.key.as_str())).collect();
        // `let`, `while`, arms [continue, exit], `i++`
        assert_eq!(counts, vec![1, 1, 3, 1, 3]);
    }
}
