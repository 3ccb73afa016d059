// AST - CoreLX abstract syntax tree
//
// A closed sum of node variants so the semantic and codegen walkers are
// exhaustively checked. The tree is built once by the parser, consumed
// by the semantic pass and the code generator, then dropped.

use crate::compiler::diagnostics::SourcePos;

/// A complete source file
#[derive(Debug, Clone, Default)]
pub struct Program {
    pub assets: Vec<AssetDecl>,
    pub types: Vec<TypeDecl>,
    pub functions: Vec<FunctionDecl>,
}

/// `asset Name: kind [encoding]` with its captured payload lines
#[derive(Debug, Clone)]
pub struct AssetDecl {
    pub name: String,
    pub kind: String,
    /// Encoding tag; None means the default (`hex`)
    pub encoding: Option<String>,
    /// Raw payload lines, whitespace-trimmed
    pub payload: Vec<String>,
    pub pos: SourcePos,
}

/// `type Name: struct` with its field block
#[derive(Debug, Clone)]
pub struct TypeDecl {
    pub name: String,
    pub fields: Vec<FieldDecl>,
    pub pos: SourcePos,
}

#[derive(Debug, Clone)]
pub struct FieldDecl {
    pub name: String,
    pub type_name: String,
    pub pos: SourcePos,
}

/// `function Name(params) [-> type]` with its body
#[derive(Debug, Clone)]
pub struct FunctionDecl {
    pub name: String,
    pub params: Vec<Param>,
    pub return_type: Option<String>,
    pub body: Vec<Stmt>,
    pub pos: SourcePos,
}

#[derive(Debug, Clone)]
pub struct Param {
    pub name: String,
    pub type_name: Option<String>,
    pub pos: SourcePos,
}

/// Statements
#[derive(Debug, Clone)]
pub enum Stmt {
    /// `name := value` or `name: type := value` or `name: type`
    VarDecl {
        name: String,
        type_name: Option<String>,
        value: Option<Expr>,
        pos: SourcePos,
    },
    /// `target = value` where target is an identifier or member access
    Assign {
        target: Expr,
        value: Expr,
        pos: SourcePos,
    },
    /// `if` with zero or more `elseif` arms and an optional `else`
    If {
        arms: Vec<(Expr, Vec<Stmt>)>,
        else_body: Option<Vec<Stmt>>,
        pos: SourcePos,
    },
    While {
        cond: Expr,
        body: Vec<Stmt>,
        pos: SourcePos,
    },
    /// `for init, cond, post`
    For {
        init: Box<Stmt>,
        cond: Expr,
        post: Box<Stmt>,
        body: Vec<Stmt>,
        pos: SourcePos,
    },
    Return {
        value: Option<Expr>,
        pos: SourcePos,
    },
    Expr {
        expr: Expr,
        pos: SourcePos,
    },
}

impl Stmt {
    pub fn pos(&self) -> SourcePos {
        match self {
            Stmt::VarDecl { pos, .. }
            | Stmt::Assign { pos, .. }
            | Stmt::If { pos, .. }
            | Stmt::While { pos, .. }
            | Stmt::For { pos, .. }
            | Stmt::Return { pos, .. }
            | Stmt::Expr { pos, .. } => *pos,
        }
    }
}

/// Expressions
#[derive(Debug, Clone)]
pub enum Expr {
    Number {
        value: i64,
        pos: SourcePos,
    },
    Bool {
        value: bool,
        pos: SourcePos,
    },
    Str {
        value: String,
        pos: SourcePos,
    },
    Ident {
        name: String,
        pos: SourcePos,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
        pos: SourcePos,
    },
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
        pos: SourcePos,
    },
    Call {
        callee: Box<Expr>,
        args: Vec<Expr>,
        pos: SourcePos,
    },
    Member {
        object: Box<Expr>,
        field: String,
        pos: SourcePos,
    },
    Index {
        object: Box<Expr>,
        index: Box<Expr>,
        pos: SourcePos,
    },
}

impl Expr {
    pub fn pos(&self) -> SourcePos {
        match self {
            Expr::Number { pos, .. }
            | Expr::Bool { pos, .. }
            | Expr::Str { pos, .. }
            | Expr::Ident { pos, .. }
            | Expr::Unary { pos, .. }
            | Expr::Binary { pos, .. }
            | Expr::Call { pos, .. }
            | Expr::Member { pos, .. }
            | Expr::Index { pos, .. } => *pos,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    /// `-x`
    Neg,
    /// `!x`
    Not,
    /// `~x`
    BitNot,
    /// `&x` - address of a local
    AddrOf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    BitAnd,
    BitOr,
    BitXor,
    Shl,
    Shr,
}
