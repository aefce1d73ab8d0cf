//! Syntax tree of the supported JavaScript subset.
//!
//! Every statement, expression, block, function, switch case and catch clause carries a
//! [`Node`] header: a process-unique [`NodeId`] and the source location it was parsed from.
//! Nodes synthesized after parsing have no location.

use std::{fmt, sync::Arc};

use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};

use crate::loc::{Loc, NodeId};

/// Identity and location shared by all tree nodes.
#[derive(Clone, Debug, PartialEq)]
pub struct Node {
    pub id: NodeId,
    pub loc: Option<Loc>,
}

impl Node {
    pub fn new(loc: Loc) -> Self {
        Self { id: NodeId::fresh(), loc: Some(loc) }
    }

    /// A node without source location.
    pub fn synthetic() -> Self {
        Self { id: NodeId::fresh(), loc: None }
    }

    /// A fresh node reusing the location of another one.
    pub fn with_loc(loc: Option<Loc>) -> Self {
        Self { id: NodeId::fresh(), loc }
    }
}

/// Set of nodes that were already processed by a tree rewrite.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Marks(FxHashSet<NodeId>);

impl Marks {
    pub fn mark(&mut self, id: NodeId) -> bool {
        self.0.insert(id)
    }

    pub fn is_marked(&self, id: NodeId) -> bool {
        self.0.contains(&id)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Root of a parsed source file.
#[derive(Clone, Debug, PartialEq)]
pub struct Program {
    pub node: Node,
    pub body: Vec<Stmt>,
    pub marks: Marks,
}

impl Program {
    pub fn new(body: Vec<Stmt>, loc: Loc) -> Self {
        Self { node: Node::new(loc), body, marks: Marks::default() }
    }

    /// Whether the program uses `export`, i.e. must be treated as a module.
    pub fn is_module(&self) -> bool {
        self.body.iter().any(|stmt| matches!(stmt.kind, StmtKind::Export(_)))
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Stmt {
    pub node: Node,
    pub kind: StmtKind,
}

impl Stmt {
    pub fn new(kind: StmtKind, loc: Loc) -> Self {
        Self { node: Node::new(loc), kind }
    }

    pub fn synthetic(kind: StmtKind) -> Self {
        Self { node: Node::synthetic(), kind }
    }

    pub fn expr(expr: Expr) -> Self {
        Self::synthetic(StmtKind::Expr(expr))
    }

    pub fn id(&self) -> NodeId {
        self.node.id
    }

    pub fn loc(&self) -> Option<Loc> {
        self.node.loc
    }

    /// Take the statement out, leaving an empty statement behind.
    pub fn take(&mut self) -> Self {
        std::mem::replace(self, Self::synthetic(StmtKind::Empty))
    }

    pub fn is_block(&self) -> bool {
        matches!(self.kind, StmtKind::Block(_))
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum StmtKind {
    Expr(Expr),
    Var(VarDecl),
    Block(Block),
    If(IfStmt),
    While(WhileStmt),
    DoWhile(DoWhileStmt),
    For(ForStmt),
    Return(Option<Expr>),
    Break,
    Continue,
    Throw(Expr),
    Try(TryStmt),
    Switch(SwitchStmt),
    /// Function declaration.
    Function(Function),
    /// Class declaration.
    Class(Class),
    Export(ExportDecl),
    Empty,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Block {
    pub node: Node,
    pub body: Vec<Stmt>,
}

impl Block {
    pub fn new(body: Vec<Stmt>, loc: Loc) -> Self {
        Self { node: Node::new(loc), body }
    }

    pub fn synthetic(body: Vec<Stmt>) -> Self {
        Self { node: Node::synthetic(), body }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VarKind {
    Var,
    Let,
    Const,
}

impl VarKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Var => "var",
            Self::Let => "let",
            Self::Const => "const",
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct VarDecl {
    pub kind: VarKind,
    pub declarations: Vec<VarDeclarator>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct VarDeclarator {
    pub name: String,
    pub init: Option<Expr>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct IfStmt {
    pub test: Expr,
    pub consequent: Box<Stmt>,
    pub alternate: Option<Box<Stmt>>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct WhileStmt {
    pub test: Expr,
    pub body: Box<Stmt>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct DoWhileStmt {
    pub body: Box<Stmt>,
    pub test: Expr,
}

#[derive(Clone, Debug, PartialEq)]
pub enum ForInit {
    Var(VarDecl),
    Expr(Expr),
}

#[derive(Clone, Debug, PartialEq)]
pub struct ForStmt {
    pub init: Option<ForInit>,
    pub test: Option<Expr>,
    pub update: Option<Expr>,
    pub body: Box<Stmt>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct TryStmt {
    pub block: Block,
    pub handler: Option<CatchClause>,
    pub finalizer: Option<Block>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct CatchClause {
    pub node: Node,
    pub param: Option<String>,
    pub body: Block,
}

#[derive(Clone, Debug, PartialEq)]
pub struct SwitchStmt {
    pub discriminant: Expr,
    pub cases: Vec<SwitchCase>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct SwitchCase {
    pub node: Node,
    /// `None` for the `default` case.
    pub test: Option<Expr>,
    pub consequent: Vec<Stmt>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ExportDecl {
    pub default: bool,
    pub declaration: Box<Stmt>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Function {
    pub node: Node,
    pub name: Option<String>,
    pub params: Vec<String>,
    pub body: FunctionBody,
    pub is_arrow: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub enum FunctionBody {
    Block(Block),
    /// Concise arrow body.
    Expr(Box<Expr>),
}

#[derive(Clone, Debug, PartialEq)]
pub struct Class {
    pub name: Option<String>,
    pub methods: Vec<Method>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Method {
    pub name: String,
    pub is_static: bool,
    pub function: Function,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Expr {
    pub node: Node,
    pub kind: ExprKind,
}

impl Expr {
    pub fn new(kind: ExprKind, loc: Loc) -> Self {
        Self { node: Node::new(loc), kind }
    }

    pub fn synthetic(kind: ExprKind) -> Self {
        Self { node: Node::synthetic(), kind }
    }

    pub fn id(&self) -> NodeId {
        self.node.id
    }

    pub fn loc(&self) -> Option<Loc> {
        self.node.loc
    }

    /// Take the expression out, leaving a placeholder that must be replaced before printing.
    pub fn take(&mut self) -> Self {
        std::mem::replace(self, Self::synthetic(ExprKind::Sequence(vec![])))
    }

    /// `(first, ..., last)` without source location.
    pub fn sequence(exprs: Vec<Self>) -> Self {
        Self::synthetic(ExprKind::Sequence(exprs))
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum ExprKind {
    Number(f64),
    String(String),
    Bool(bool),
    Null,
    Ident(String),
    This,
    Array(Vec<Expr>),
    Object(Vec<Property>),
    Unary { op: UnaryOp, arg: Box<Expr> },
    Update { op: UpdateOp, prefix: bool, target: Box<Expr> },
    Binary { op: BinaryOp, left: Box<Expr>, right: Box<Expr> },
    Logical { op: LogicalOp, left: Box<Expr>, right: Box<Expr> },
    Assign { op: AssignOp, target: Box<Expr>, value: Box<Expr> },
    Conditional { test: Box<Expr>, consequent: Box<Expr>, alternate: Box<Expr> },
    Call { callee: Box<Expr>, args: Vec<Expr> },
    New { callee: Box<Expr>, args: Vec<Expr> },
    Member { object: Box<Expr>, property: MemberProp },
    Function(Box<Function>),
    Sequence(Vec<Expr>),
    /// Increment of a coverage counter, injected by instrumentation.
    Counter(CounterRef),
}

#[derive(Clone, Debug, PartialEq)]
pub struct Property {
    pub key: String,
    pub value: Expr,
}

#[derive(Clone, Debug, PartialEq)]
pub enum MemberProp {
    /// `object.name`
    Named(String),
    /// `object[expr]`
    Computed(Box<Expr>),
}

/// Reference to the counter of one coverage entry.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CounterRef {
    pub file: Arc<str>,
    pub key: Arc<str>,
}

impl fmt::Display for CounterRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.file, self.key)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Minus,
    Plus,
    TypeOf,
    Void,
}

impl UnaryOp {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Not => "!",
            Self::Minus => "-",
            Self::Plus => "+",
            Self::TypeOf => "typeof",
            Self::Void => "void",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UpdateOp {
    Increment,
    Decrement,
}

impl UpdateOp {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Increment => "++",
            Self::Decrement => "--",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Eq,
    NotEq,
    StrictEq,
    StrictNotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
}

impl BinaryOp {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::Div => "/",
            Self::Rem => "%",
            Self::Eq => "==",
            Self::NotEq => "!=",
            Self::StrictEq => "===",
            Self::StrictNotEq => "!==",
            Self::Lt => "<",
            Self::LtEq => "<=",
            Self::Gt => ">",
            Self::GtEq => ">=",
        }
    }

    /// Binding power, higher binds tighter.
    pub fn precedence(self) -> u8 {
        match self {
            Self::Eq | Self::NotEq | Self::StrictEq | Self::StrictNotEq => 10,
            Self::Lt | Self::LtEq | Self::Gt | Self::GtEq => 11,
            Self::Add | Self::Sub => 13,
            Self::Mul | Self::Div | Self::Rem => 14,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LogicalOp {
    #[serde(rename = "&&")]
    And,
    #[serde(rename = "||")]
    Or,
    #[serde(rename = "??")]
    Nullish,
}

impl LogicalOp {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::And => "&&",
            Self::Or => "||",
            Self::Nullish => "??",
        }
    }

    pub fn precedence(self) -> u8 {
        match self {
            Self::Nullish => 4,
            Self::Or => 5,
            Self::And => 6,
        }
    }
}

impl fmt::Display for LogicalOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AssignOp {
    Assign,
    AddAssign,
    SubAssign,
    MulAssign,
    DivAssign,
}

impl AssignOp {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Assign => "=",
            Self::AddAssign => "+=",
            Self::SubAssign => "-=",
            Self::MulAssign => "*=",
            Self::DivAssign => "/=",
        }
    }

    /// The binary operator applied by a compound assignment.
    pub fn binary(self) -> Option<BinaryOp> {
        match self {
            Self::Assign => None,
            Self::AddAssign => Some(BinaryOp::Add),
            Self::SubAssign => Some(BinaryOp::Sub),
            Self::MulAssign => Some(BinaryOp::Mul),
            Self::DivAssign => Some(BinaryOp::Div),
        }
    }
}
