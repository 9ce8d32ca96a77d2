//! Syntax tree of the playground script language

use crate::error::Span;
use std::rc::Rc;

/// A parsed script: the statement list run as the body of the harness
#[derive(Debug, Clone)]
pub struct Program {
    pub body: Vec<Stmt>,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeclKind {
    Let,
    Const,
    Var,
}

impl DeclKind {
    pub fn is_mutable(&self) -> bool {
        !matches!(self, DeclKind::Const)
    }
}

/// Binding target of a declaration, parameter or loop variable
#[derive(Debug, Clone, PartialEq)]
pub enum Pattern {
    Ident(String),
    /// `{ a, b: alias, ...rest }`
    Object {
        props: Vec<(String, Pattern)>,
        rest: Option<String>,
    },
    /// `[a, , b, ...rest]`
    Array {
        items: Vec<Option<Pattern>>,
        rest: Option<String>,
    },
}

#[derive(Debug, Clone)]
pub struct Declarator {
    pub target: Pattern,
    pub init: Option<Expr>,
}

#[derive(Debug, Clone)]
pub struct Param {
    pub pattern: Pattern,
    pub default: Option<Expr>,
    pub rest: bool,
}

#[derive(Debug, Clone)]
pub enum FunctionBody {
    Block(Vec<Stmt>),
    Expr(Box<Expr>),
}

#[derive(Debug, Clone)]
pub struct FunctionDecl {
    pub name: Option<String>,
    pub params: Vec<Param>,
    pub body: FunctionBody,
    pub is_arrow: bool,
    pub is_async: bool,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub enum Stmt {
    Declaration {
        kind: DeclKind,
        declarations: Vec<Declarator>,
        span: Span,
    },
    Expr(Expr),
    If {
        cond: Expr,
        then: Box<Stmt>,
        otherwise: Option<Box<Stmt>>,
        span: Span,
    },
    While {
        cond: Expr,
        body: Box<Stmt>,
        span: Span,
    },
    For {
        init: Option<Box<Stmt>>,
        cond: Option<Expr>,
        update: Option<Expr>,
        body: Box<Stmt>,
        span: Span,
    },
    ForOf {
        kind: DeclKind,
        target: Pattern,
        iterable: Expr,
        body: Box<Stmt>,
        span: Span,
    },
    ForIn {
        kind: DeclKind,
        target: Pattern,
        object: Expr,
        body: Box<Stmt>,
        span: Span,
    },
    Block(Vec<Stmt>, Span),
    Return(Option<Expr>, Span),
    Throw(Expr, Span),
    Try {
        block: Vec<Stmt>,
        param: Option<Pattern>,
        handler: Option<Vec<Stmt>>,
        finalizer: Option<Vec<Stmt>>,
        span: Span,
    },
    Break(Span),
    Continue(Span),
    Function(Rc<FunctionDecl>),
    Empty,
}

impl Stmt {
    pub fn span(&self) -> Span {
        match self {
            Stmt::Declaration { span, .. }
            | Stmt::If { span, .. }
            | Stmt::While { span, .. }
            | Stmt::For { span, .. }
            | Stmt::ForOf { span, .. }
            | Stmt::ForIn { span, .. }
            | Stmt::Try { span, .. } => *span,
            Stmt::Expr(expr) => expr.span(),
            Stmt::Block(_, span)
            | Stmt::Return(_, span)
            | Stmt::Throw(_, span)
            | Stmt::Break(span)
            | Stmt::Continue(span) => *span,
            Stmt::Function(decl) => decl.span,
            Stmt::Empty => Span::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    BigInt(i128),
    String(String),
}

#[derive(Debug, Clone)]
pub enum TemplatePart {
    Str(String),
    Expr(Expr),
}

/// Array element or call argument
#[derive(Debug, Clone)]
pub enum Element {
    Item(Expr),
    Spread(Expr),
}

#[derive(Debug, Clone)]
pub enum PropKey {
    Named(String),
    Computed(Expr),
}

#[derive(Debug, Clone)]
pub enum PropDef {
    KeyValue(PropKey, Expr),
    Spread(Expr),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Plus,
    Not,
    Typeof,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOp {
    Increment,
    Decrement,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Pow,
    Eq,
    Ne,
    StrictEq,
    StrictNe,
    Lt,
    Le,
    Gt,
    Ge,
    In,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOp {
    And,
    Or,
    Nullish,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignOp {
    Assign,
    Add,
    Sub,
    Mul,
    Div,
    Rem,
}

impl AssignOp {
    /// Binary operator applied by a compound assignment
    pub fn binary(&self) -> Option<BinaryOp> {
        match self {
            AssignOp::Assign => None,
            AssignOp::Add => Some(BinaryOp::Add),
            AssignOp::Sub => Some(BinaryOp::Sub),
            AssignOp::Mul => Some(BinaryOp::Mul),
            AssignOp::Div => Some(BinaryOp::Div),
            AssignOp::Rem => Some(BinaryOp::Rem),
        }
    }
}

#[derive(Debug, Clone)]
pub enum Expr {
    Literal(Literal, Span),
    Template(Vec<TemplatePart>, Span),
    Ident(String, Span),
    Array(Vec<Element>, Span),
    Object(Vec<PropDef>, Span),
    Function(Rc<FunctionDecl>),
    Unary(UnaryOp, Box<Expr>, Span),
    Update {
        op: UpdateOp,
        prefix: bool,
        target: Box<Expr>,
        span: Span,
    },
    Binary(Box<Expr>, BinaryOp, Box<Expr>, Span),
    Logical(Box<Expr>, LogicalOp, Box<Expr>, Span),
    Conditional {
        test: Box<Expr>,
        consequent: Box<Expr>,
        alternate: Box<Expr>,
        span: Span,
    },
    Assign {
        op: AssignOp,
        target: Box<Expr>,
        value: Box<Expr>,
        span: Span,
    },
    Member {
        object: Box<Expr>,
        property: String,
        optional: bool,
        span: Span,
    },
    Index {
        object: Box<Expr>,
        index: Box<Expr>,
        optional: bool,
        span: Span,
    },
    Call {
        callee: Box<Expr>,
        args: Vec<Element>,
        optional: bool,
        span: Span,
    },
    New {
        callee: Box<Expr>,
        args: Vec<Element>,
        span: Span,
    },
    Await(Box<Expr>, Span),
}

impl Expr {
    pub fn span(&self) -> Span {
        match self {
            Expr::Literal(_, span)
            | Expr::Template(_, span)
            | Expr::Ident(_, span)
            | Expr::Array(_, span)
            | Expr::Object(_, span)
            | Expr::Unary(_, _, span)
            | Expr::Binary(_, _, _, span)
            | Expr::Logical(_, _, _, span)
            | Expr::Await(_, span) => *span,
            Expr::Function(decl) => decl.span,
            Expr::Update { span, .. }
            | Expr::Conditional { span, .. }
            | Expr::Assign { span, .. }
            | Expr::Member { span, .. }
            | Expr::Index { span, .. }
            | Expr::Call { span, .. }
            | Expr::New { span, .. } => *span,
        }
    }

    /// Source-like rendering of a callee, for error messages
    pub fn label(&self) -> String {
        match self {
            Expr::Ident(name, _) => name.clone(),
            Expr::Member { object, property, .. } => format!("{}.{}", object.label(), property),
            Expr::Index { object, .. } => format!("{}[...]", object.label()),
            Expr::Call { callee, .. } => format!("{}(...)", callee.label()),
            Expr::Literal(Literal::String(s), _) => format!("\"{}\"", s),
            Expr::Literal(lit, _) => format!("{:?}", lit),
            _ => "expression".to_string(),
        }
    }

    pub fn is_assignable(&self) -> bool {
        matches!(self, Expr::Ident(..) | Expr::Member { .. } | Expr::Index { .. })
    }
}
