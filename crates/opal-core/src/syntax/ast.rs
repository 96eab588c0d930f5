//! Abstract syntax tree for the Opal source subset.

use crate::source::Span;
use serde::Serialize;
use std::sync::atomic::{AtomicU32, Ordering};

/// Unique identifier for AST nodes.
///
/// Expression nodes are identified by `NodeId` so later passes can attach
/// inferred types in a side map without mutating the tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Default)]
pub struct NodeId(pub u32);

impl NodeId {
    /// Create a new unique node ID.
    pub fn new() -> Self {
        static NEXT_ID: AtomicU32 = AtomicU32::new(0);
        NodeId(NEXT_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// A node with source location information.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Spanned<T> {
    pub node: T,
    pub span: Span,
}

impl<T> Spanned<T> {
    pub fn new(node: T, span: Span) -> Self {
        Self { node, span }
    }
}

impl<T> std::ops::Deref for Spanned<T> {
    type Target = T;
    fn deref(&self) -> &Self::Target {
        &self.node
    }
}

/// A complete source file.
#[derive(Debug, Clone, PartialEq, Serialize, Default)]
pub struct File {
    pub items: Vec<Spanned<Item>>,
}

/// Top-level declarations.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Item {
    Function(FunctionDecl),
    Class(ClassDecl),
    Enum(EnumDecl),
    Let(LetDecl),
    /// A bare statement at the top level. Parsed for error recovery; the
    /// declaration pass rejects it.
    Stmt(Stmt),
}

/// Declaration modifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
pub struct Modifiers {
    pub export: bool,
    pub declare: bool,
    pub is_static: bool,
}

/// A function or method declaration.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FunctionDecl {
    pub name: String,
    pub name_span: Span,
    pub modifiers: Modifiers,
    pub type_params: Vec<String>,
    pub params: Vec<Param>,
    /// Annotated return type; `None` means `void`.
    pub ret: Option<TyExpr>,
    /// `None` for bodyless declarations (`declare function f(): void;`).
    pub body: Option<Vec<Spanned<Stmt>>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Param {
    pub name: String,
    pub name_span: Span,
    pub ty: TyExpr,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassDecl {
    pub name: String,
    pub name_span: Span,
    pub modifiers: Modifiers,
    pub methods: Vec<Spanned<FunctionDecl>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnumDecl {
    pub name: String,
    pub name_span: Span,
    pub members: Vec<EnumMember>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnumMember {
    pub name: String,
    pub name_span: Span,
    pub value: Option<Expr>,
}

/// A variable declaration (`let` / `const` / `var`).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LetDecl {
    pub name: String,
    pub name_span: Span,
    pub ty: Option<TyExpr>,
    pub value: Option<Expr>,
}

/// Statements inside function bodies.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Stmt {
    Return { value: Option<Expr> },
    Let(LetDecl),
    Expr(Expr),
}

/// A surface type annotation: a name with optional type arguments
/// (the only recognized generic is `Ptr<T>`).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TyExpr {
    pub name: String,
    pub args: Vec<TyExpr>,
    pub span: Span,
}

/// An expression node.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Expr {
    pub id: NodeId,
    pub kind: ExprKind,
    pub span: Span,
}

impl Expr {
    pub fn new(kind: ExprKind, span: Span) -> Self {
        Self {
            id: NodeId::new(),
            kind,
            span,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum ExprKind {
    /// Numeric literal, kept as source text until a contextual type is known.
    Number { text: String },
    Bool(bool),
    Ident(String),
    Paren(Box<Expr>),
    Unary {
        op: UnaryOp,
        expr: Box<Expr>,
    },
    Binary {
        op: BinOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    /// `expr as Type`.
    Cast {
        expr: Box<Expr>,
        ty: TyExpr,
    },
    /// `base.member`.
    Member {
        base: Box<Expr>,
        member: String,
    },
    Call {
        callee: Box<Expr>,
        args: Vec<Expr>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    BitAnd,
    BitOr,
    BitXor,
    Shl,
    Shr,
}

impl BinOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Rem => "%",
            BinOp::BitAnd => "&",
            BinOp::BitOr => "|",
            BinOp::BitXor => "^",
            BinOp::Shl => "<<",
            BinOp::Shr => ">>",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum UnaryOp {
    Neg,
    Not,
}
