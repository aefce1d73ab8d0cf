use std::{cell::RefCell, fmt, rc::Rc};

use adana_syntax::ast::Function;
use rustc_hash::FxHashMap;

use super::interpreter::{Control, Interpreter};

pub type ObjectRef = Rc<RefCell<Object>>;
pub type ScopeRef = Rc<RefCell<Scope>>;

/// Built-in function: receives the interpreter, `this` and the arguments.
pub type NativeFn = fn(&mut Interpreter, &Value, &[Value]) -> Result<Value, Control>;

/// Nesting depth up to which objects are rendered by [`Value::inspect`].
const INSPECT_DEPTH: usize = 2;

#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(Rc<str>),
    Object(ObjectRef),
}

impl Value {
    pub fn string(s: impl AsRef<str>) -> Self {
        Self::String(Rc::from(s.as_ref()))
    }

    pub fn object(object: Object) -> Self {
        Self::Object(Rc::new(RefCell::new(object)))
    }

    pub fn as_object(&self) -> Option<&ObjectRef> {
        match self {
            Self::Object(object) => Some(object),
            _ => None,
        }
    }

    pub fn is_nullish(&self) -> bool {
        matches!(self, Self::Undefined | Self::Null)
    }

    pub fn is_callable(&self) -> bool {
        self.as_object().is_some_and(|object| object.borrow().callable().is_some())
    }

    pub fn is_truthy(&self) -> bool {
        match self {
            Self::Undefined | Self::Null => false,
            Self::Bool(b) => *b,
            Self::Number(n) => *n != 0.0 && !n.is_nan(),
            Self::String(s) => !s.is_empty(),
            Self::Object(_) => true,
        }
    }

    pub fn type_of(&self) -> &'static str {
        match self {
            Self::Undefined => "undefined",
            Self::Null => "object",
            Self::Bool(_) => "boolean",
            Self::Number(_) => "number",
            Self::String(_) => "string",
            Self::Object(_) if self.is_callable() => "function",
            Self::Object(_) => "object",
        }
    }

    pub fn to_number(&self) -> f64 {
        match self {
            Self::Undefined => f64::NAN,
            Self::Null => 0.0,
            Self::Bool(b) => f64::from(u8::from(*b)),
            Self::Number(n) => *n,
            Self::String(s) => {
                let s = s.trim();
                if s.is_empty() {
                    0.0
                } else if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
                    u64::from_str_radix(hex, 16).map_or(f64::NAN, |n| n as f64)
                } else {
                    s.parse().unwrap_or(f64::NAN)
                }
            }
            Self::Object(object) => match &object.borrow().kind {
                ObjectKind::Array(items) if items.is_empty() => 0.0,
                ObjectKind::Array(items) if items.len() == 1 => items[0].to_number(),
                _ => f64::NAN,
            },
        }
    }

    /// String conversion used by `+` and property keys.
    pub fn to_js_string(&self) -> String {
        match self {
            Self::Undefined => "undefined".to_string(),
            Self::Null => "null".to_string(),
            Self::Bool(b) => b.to_string(),
            Self::Number(n) => number_to_string(*n),
            Self::String(s) => s.to_string(),
            Self::Object(object) => {
                let object = object.borrow();
                match &object.kind {
                    ObjectKind::Array(items) => items
                        .iter()
                        .map(|item| if item.is_nullish() { String::new() } else { item.to_js_string() })
                        .collect::<Vec<_>>()
                        .join(","),
                    ObjectKind::Error => object.error_summary(),
                    ObjectKind::Function(_) => "function".to_string(),
                    ObjectKind::Plain => "[object Object]".to_string(),
                }
            }
        }
    }

    /// `===`
    pub fn strict_equals(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Undefined, Self::Undefined) | (Self::Null, Self::Null) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Number(a), Self::Number(b)) => a == b,
            (Self::String(a), Self::String(b)) => a == b,
            (Self::Object(a), Self::Object(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// `==`
    pub fn loose_equals(&self, other: &Self) -> bool {
        match (self, other) {
            (a, b) if a.is_nullish() && b.is_nullish() => true,
            (a, b) if a.is_nullish() || b.is_nullish() => false,
            (Self::Object(_), Self::Object(_)) => self.strict_equals(other),
            (Self::Object(_), _) => Self::string(self.to_js_string()).loose_equals(other),
            (_, Self::Object(_)) => self.loose_equals(&Self::string(other.to_js_string())),
            (Self::String(a), Self::String(b)) => a == b,
            _ => self.to_number() == other.to_number(),
        }
    }

    /// Rendering used by `console.log`.
    pub fn inspect(&self) -> String {
        let mut out = String::new();
        self.write_inspect(&mut out, 0);
        out
    }

    fn write_inspect(&self, out: &mut String, depth: usize) {
        match self {
            Self::String(s) if depth > 0 => {
                out.push('\'');
                out.push_str(s);
                out.push('\'');
            }
            Self::Object(object) => {
                let object = object.borrow();
                match &object.kind {
                    ObjectKind::Function(callable) => match callable {
                        Callable::Closure(closure) if closure.is_class => {
                            out.push_str(&format!("[class {}]", closure.name()))
                        }
                        _ => out.push_str(&format!("[Function: {}]", callable.name())),
                    },
                    ObjectKind::Error => out.push_str(&object.error_summary()),
                    _ if depth > INSPECT_DEPTH => out.push_str(if object.is_array() {
                        "[Array]"
                    } else {
                        "[Object]"
                    }),
                    ObjectKind::Array(items) => {
                        if items.is_empty() {
                            out.push_str("[]");
                            return;
                        }
                        out.push_str("[ ");
                        for (i, item) in items.iter().enumerate() {
                            if i > 0 {
                                out.push_str(", ");
                            }
                            item.write_inspect(out, depth + 1);
                        }
                        out.push_str(" ]");
                    }
                    ObjectKind::Plain => {
                        if object.properties.is_empty() {
                            out.push_str("{}");
                            return;
                        }
                        out.push_str("{ ");
                        for (i, (key, value)) in object.properties.iter().enumerate() {
                            if i > 0 {
                                out.push_str(", ");
                            }
                            out.push_str(key);
                            out.push_str(": ");
                            value.write_inspect(out, depth + 1);
                        }
                        out.push_str(" }");
                    }
                }
            }
            _ => out.push_str(&self.to_js_string()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.inspect())
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String(s) => write!(f, "{s:?}"),
            _ => f.write_str(&self.inspect()),
        }
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::string(s)
    }
}

/// JavaScript `Number.prototype.toString()` for the common cases.
pub fn number_to_string(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        let s = if n > 0.0 { "Infinity" } else { "-Infinity" };
        s.to_string()
    } else if n == n.trunc() && n.abs() < 1e21 {
        format!("{}", n as i64)
    } else {
        format!("{n}")
    }
}

pub struct Object {
    pub kind: ObjectKind,
    pub proto: Option<ObjectRef>,
    properties: Vec<(String, Value)>,
}

pub enum ObjectKind {
    Plain,
    Array(Vec<Value>),
    /// Instance of one of the built-in error constructors.
    Error,
    Function(Callable),
}

impl Object {
    pub fn new(kind: ObjectKind) -> Self {
        Self { kind, proto: None, properties: Vec::new() }
    }

    pub fn plain() -> Self {
        Self::new(ObjectKind::Plain)
    }

    pub fn array(items: Vec<Value>) -> Self {
        Self::new(ObjectKind::Array(items))
    }

    pub fn error(name: &str, message: &str) -> Self {
        let mut object = Self::new(ObjectKind::Error);
        object.set("name", Value::string(name));
        object.set("message", Value::string(message));
        object
    }

    pub fn function(callable: Callable) -> Self {
        Self::new(ObjectKind::Function(callable))
    }

    pub fn is_array(&self) -> bool {
        matches!(self.kind, ObjectKind::Array(_))
    }

    pub fn callable(&self) -> Option<&Callable> {
        match &self.kind {
            ObjectKind::Function(callable) => Some(callable),
            _ => None,
        }
    }

    pub fn get_own(&self, key: &str) -> Option<Value> {
        self.properties.iter().find(|(k, _)| k == key).map(|(_, value)| value.clone())
    }

    pub fn set(&mut self, key: &str, value: Value) {
        match self.properties.iter_mut().find(|(k, _)| k == key) {
            Some((_, slot)) => *slot = value,
            None => self.properties.push((key.to_string(), value)),
        }
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> + '_ {
        self.properties.iter().map(|(key, _)| key.as_str())
    }

    /// Property lookup following the prototype chain.
    pub fn lookup(object: &ObjectRef, key: &str) -> Option<Value> {
        let mut current = object.clone();
        loop {
            let next = {
                let borrowed = current.borrow();
                if let Some(value) = borrowed.get_own(key) {
                    return Some(value);
                }
                borrowed.proto.clone()?
            };
            current = next;
        }
    }

    fn error_summary(&self) -> String {
        let name = self.get_own("name").map_or_else(|| "Error".to_string(), |n| n.to_js_string());
        match self.get_own("message").map(|m| m.to_js_string()) {
            Some(message) if !message.is_empty() => format!("{name}: {message}"),
            _ => name,
        }
    }
}

#[derive(Clone)]
pub enum Callable {
    Closure(Closure),
    Native { name: &'static str, func: NativeFn },
}

impl Callable {
    pub fn name(&self) -> &str {
        match self {
            Self::Closure(closure) => closure.name(),
            Self::Native { name, .. } => name,
        }
    }
}

#[derive(Clone)]
pub struct Closure {
    pub function: Rc<Function>,
    pub scope: ScopeRef,
    /// Class constructors can only be called with `new`.
    pub is_class: bool,
}

impl Closure {
    pub fn name(&self) -> &str {
        self.function.name.as_deref().unwrap_or("(anonymous)")
    }
}

/// Lexical environment. Function scopes carry `this`; arrow function scopes do not, so lookups
/// reach the enclosing function.
#[derive(Default)]
pub struct Scope {
    vars: FxHashMap<String, Value>,
    parent: Option<ScopeRef>,
    this: Option<Value>,
    is_function: bool,
}

impl Scope {
    pub fn global() -> ScopeRef {
        Rc::new(RefCell::new(Self {
            this: Some(Value::Undefined),
            is_function: true,
            ..Default::default()
        }))
    }

    pub fn child(parent: &ScopeRef) -> ScopeRef {
        Rc::new(RefCell::new(Self { parent: Some(parent.clone()), ..Default::default() }))
    }

    pub fn function(parent: &ScopeRef, this: Option<Value>) -> ScopeRef {
        Rc::new(RefCell::new(Self {
            parent: Some(parent.clone()),
            this,
            is_function: true,
            ..Default::default()
        }))
    }

    pub fn define(scope: &ScopeRef, name: &str, value: Value) {
        scope.borrow_mut().vars.insert(name.to_string(), value);
    }

    /// Define `name` in the closest function scope, as `var` does.
    pub fn define_var(scope: &ScopeRef, name: &str, value: Value) {
        let mut current = scope.clone();
        loop {
            let parent = {
                let borrowed = current.borrow();
                if borrowed.is_function {
                    None
                } else {
                    borrowed.parent.clone()
                }
            };
            match parent {
                Some(parent) => current = parent,
                None => break,
            }
        }
        Self::define(&current, name, value);
    }

    pub fn lookup(scope: &ScopeRef, name: &str) -> Option<Value> {
        let mut current = scope.clone();
        loop {
            let parent = {
                let borrowed = current.borrow();
                if let Some(value) = borrowed.vars.get(name) {
                    return Some(value.clone());
                }
                borrowed.parent.clone()?
            };
            current = parent;
        }
    }

    /// Assign an existing binding; returns `false` if `name` is not declared.
    pub fn assign(scope: &ScopeRef, name: &str, value: Value) -> bool {
        let mut current = scope.clone();
        loop {
            let parent = {
                let mut borrowed = current.borrow_mut();
                if let Some(slot) = borrowed.vars.get_mut(name) {
                    *slot = value;
                    return true;
                }
                match borrowed.parent.clone() {
                    Some(parent) => parent,
                    None => return false,
                }
            };
            current = parent;
        }
    }

    pub fn this(scope: &ScopeRef) -> Value {
        let mut current = scope.clone();
        loop {
            let parent = {
                let borrowed = current.borrow();
                if let Some(this) = &borrowed.this {
                    return this.clone();
                }
                match borrowed.parent.clone() {
                    Some(parent) => parent,
                    None => return Value::Undefined,
                }
            };
            current = parent;
        }
    }
}
