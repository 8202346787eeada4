// Abstract Syntax Tree for Homescript
//
// This module defines the AST produced by the parser and consumed by the
// semantic analyzer. Every node carries the source span it was parsed
// from; identifier-shaped leaves use [`Ident`] so that name and span
// travel together.

use crate::source::Span;
use serde::{Deserialize, Serialize};

/// An identifier together with its source span.
///
/// Singleton identifiers keep their leading `@` in `name`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ident {
    pub name: String,
    pub span: Span,
}

impl Ident {
    pub fn new(name: impl Into<String>, span: Span) -> Self {
        Self {
            name: name.into(),
            span,
        }
    }
}

/// A parsed Homescript module.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Program {
    pub filename: String,
    pub items: Vec<Item>,
}

/// Top-level item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Item {
    Import(ImportStmt),
    TypeDef(TypeDef),
    GlobalLet(LetStmt),
    Fn(FnDef),
    Singleton(SingletonDecl),
    Impl(ImplBlock),
}

/// `import { a, type B, templ C, trigger D } from module;`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportStmt {
    pub items: Vec<ImportItem>,
    pub module: Ident,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportItem {
    pub kind: ImportKind,
    pub name: Ident,
}

/// What kind of symbol an import spec names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportKind {
    Normal,
    Type,
    Template,
    Trigger,
}

impl ImportKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImportKind::Normal => "value",
            ImportKind::Type => "type",
            ImportKind::Template => "template",
            ImportKind::Trigger => "trigger",
        }
    }
}

/// `pub? type Name = <type>;`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeDef {
    pub is_pub: bool,
    pub name: Ident,
    pub rhs: TypeExpr,
    pub span: Span,
}

/// `singleton @name: <type>;`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SingletonDecl {
    pub name: Ident,
    pub type_expr: TypeExpr,
    pub span: Span,
}

/// `impl Template(cap, ...)? for @singleton { <methods> }`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImplBlock {
    pub template: Ident,
    /// `None` selects the template's default capabilities.
    pub capabilities: Option<CapabilityList>,
    pub singleton: Ident,
    pub methods: Vec<FnDef>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapabilityList {
    pub items: Vec<Ident>,
    pub span: Span,
}

/// Function definition (top-level or impl-block method).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FnDef {
    pub annotation: Option<Annotation>,
    pub modifier: FnModifier,
    pub name: Ident,
    pub params: Vec<Param>,
    pub params_span: Span,
    pub return_type: Option<TypeExpr>,
    pub body: Block,
    pub span: Span,
}

impl FnDef {
    /// The span diagnostics about the return type should point at: the
    /// annotation if present, the function name otherwise.
    pub fn return_span(&self) -> Span {
        match &self.return_type {
            Some(t) => t.span().clone(),
            None => self.name.span.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FnModifier {
    None,
    Pub,
    Event,
}

impl std::fmt::Display for FnModifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FnModifier::None => f.write_str("none"),
            FnModifier::Pub => f.write_str("pub"),
            FnModifier::Event => f.write_str("event"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Param {
    pub name: Ident,
    pub type_expr: TypeExpr,
}

/// `#[item, item]` preceding a function definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Annotation {
    pub items: Vec<AnnotationItem>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnnotationItem {
    Ident(Ident),
    Trigger(TriggerAnnotation),
}

/// `trigger <connective> <source>(<args>)` inside an annotation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriggerAnnotation {
    pub connective: TriggerConnective,
    pub trigger: Ident,
    pub args: Vec<Expression>,
    pub span: Span,
}

/// Dispatch keyword connecting a callback to a trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerConnective {
    On,
    Every,
    At,
}

impl TriggerConnective {
    pub fn as_str(&self) -> &'static str {
        match self {
            TriggerConnective::On => "on",
            TriggerConnective::Every => "every",
            TriggerConnective::At => "at",
        }
    }
}

impl std::fmt::Display for TriggerConnective {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Types
// ============================================================================

/// A type as written in source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TypeExpr {
    /// A primitive or user type name.
    Named(Ident),
    /// A singleton reference: `@name`.
    Singleton(Ident),
    /// `[T]`
    List(ListTypeExpr),
    /// `?T`
    Option(OptionTypeExpr),
    /// `{ field: T, ... }`
    Object(ObjectTypeExpr),
    /// `{ ? }`
    AnyObject(AnyObjectTypeExpr),
    /// `fn(name: T, ...) -> R`
    Function(FunctionTypeExpr),
}

impl TypeExpr {
    pub fn span(&self) -> &Span {
        match self {
            TypeExpr::Named(ident) => &ident.span,
            TypeExpr::Singleton(ident) => &ident.span,
            TypeExpr::List(node) => &node.span,
            TypeExpr::Option(node) => &node.span,
            TypeExpr::Object(node) => &node.span,
            TypeExpr::AnyObject(node) => &node.span,
            TypeExpr::Function(node) => &node.span,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListTypeExpr {
    pub inner: Box<TypeExpr>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionTypeExpr {
    pub inner: Box<TypeExpr>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectTypeExpr {
    pub fields: Vec<ObjectTypeField>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectTypeField {
    /// Optional field annotation: `#setting power: bool`.
    pub annotation: Option<Ident>,
    pub name: Ident,
    pub type_expr: TypeExpr,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnyObjectTypeExpr {
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionTypeExpr {
    pub params: Vec<Param>,
    pub params_span: Span,
    pub return_type: Option<Box<TypeExpr>>,
    pub span: Span,
}

// ============================================================================
// Statements
// ============================================================================

/// A block: `{ statements... trailing_expr? }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub statements: Vec<Statement>,
    /// A final expression without a terminating semicolon; supplies the
    /// block's result value.
    pub trailing_expr: Option<Box<Expression>>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Statement {
    Let(LetStmt),
    Return(ReturnStmt),
    Break(BreakStmt),
    Continue(ContinueStmt),
    Loop(LoopStmt),
    While(WhileStmt),
    For(ForStmt),
    Trigger(TriggerStmt),
    Expr(ExprStmt),
}

impl Statement {
    pub fn span(&self) -> &Span {
        match self {
            Statement::Let(node) => &node.span,
            Statement::Return(node) => &node.span,
            Statement::Break(node) => &node.span,
            Statement::Continue(node) => &node.span,
            Statement::Loop(node) => &node.span,
            Statement::While(node) => &node.span,
            Statement::For(node) => &node.span,
            Statement::Trigger(node) => &node.span,
            Statement::Expr(node) => &node.span,
        }
    }
}

/// `pub? let name: T? = expr;`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LetStmt {
    pub is_pub: bool,
    pub name: Ident,
    pub type_annotation: Option<TypeExpr>,
    pub initializer: Expression,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReturnStmt {
    pub value: Option<Expression>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BreakStmt {
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContinueStmt {
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoopStmt {
    pub body: Block,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WhileStmt {
    pub condition: Expression,
    pub body: Block,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForStmt {
    pub binding: Ident,
    pub iterable: Expression,
    pub body: Block,
    pub span: Span,
}

/// `trigger callback every source(args);`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriggerStmt {
    pub callback: Ident,
    pub connective: TriggerConnective,
    pub trigger: Ident,
    pub args: Vec<Expression>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExprStmt {
    pub expr: Expression,
    pub span: Span,
}

// ============================================================================
// Expressions
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Expression {
    Int(IntLiteral),
    Float(FloatLiteral),
    Bool(BoolLiteral),
    Str(StrLiteral),
    Null(NullLiteral),
    None(NoneLiteral),
    Range(RangeExpr),
    Ident(Ident),
    Singleton(Ident),
    List(ListLiteral),
    Object(ObjectLiteral),
    Lambda(LambdaExpr),
    Grouped(GroupedExpr),
    Prefix(PrefixExpr),
    Infix(InfixExpr),
    Assign(AssignExpr),
    Call(CallExpr),
    Index(IndexExpr),
    Member(MemberExpr),
    Cast(CastExpr),
    Block(Box<Block>),
    If(IfExpr),
    Match(MatchExpr),
    Try(TryExpr),
}

impl Expression {
    pub fn span(&self) -> &Span {
        match self {
            Expression::Int(node) => &node.span,
            Expression::Float(node) => &node.span,
            Expression::Bool(node) => &node.span,
            Expression::Str(node) => &node.span,
            Expression::Null(node) => &node.span,
            Expression::None(node) => &node.span,
            Expression::Range(node) => &node.span,
            Expression::Ident(node) => &node.span,
            Expression::Singleton(node) => &node.span,
            Expression::List(node) => &node.span,
            Expression::Object(node) => &node.span,
            Expression::Lambda(node) => &node.span,
            Expression::Grouped(node) => &node.span,
            Expression::Prefix(node) => &node.span,
            Expression::Infix(node) => &node.span,
            Expression::Assign(node) => &node.span,
            Expression::Call(node) => &node.span,
            Expression::Index(node) => &node.span,
            Expression::Member(node) => &node.span,
            Expression::Cast(node) => &node.span,
            Expression::Block(node) => &node.span,
            Expression::If(node) => &node.span,
            Expression::Match(node) => &node.span,
            Expression::Try(node) => &node.span,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntLiteral {
    pub value: i64,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FloatLiteral {
    pub value: f64,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoolLiteral {
    pub value: bool,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrLiteral {
    pub value: String,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NullLiteral {
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoneLiteral {
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RangeExpr {
    pub start: Box<Expression>,
    pub end: Box<Expression>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListLiteral {
    pub values: Vec<Expression>,
    pub span: Span,
}

/// `new { key: value, ... }`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectLiteral {
    pub fields: Vec<ObjectLiteralField>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectLiteralField {
    pub key: Ident,
    pub value: Expression,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LambdaExpr {
    pub params: Vec<Param>,
    pub params_span: Span,
    pub return_type: Option<TypeExpr>,
    pub body: Block,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupedExpr {
    pub inner: Box<Expression>,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrefixOp {
    /// `-x`
    Neg,
    /// `!x`
    Not,
    /// `some x`: wrap a value into an option
    Some,
}

impl std::fmt::Display for PrefixOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PrefixOp::Neg => f.write_str("-"),
            PrefixOp::Not => f.write_str("!"),
            PrefixOp::Some => f.write_str("some"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrefixExpr {
    pub op: PrefixOp,
    pub rhs: Box<Expression>,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InfixOp {
    Plus,
    Minus,
    Mul,
    Div,
    Rem,
    Pow,
    Shl,
    Shr,
    BitAnd,
    BitOr,
    BitXor,
    And,
    Or,
    Eq,
    Neq,
    Lt,
    Lte,
    Gt,
    Gte,
}

impl InfixOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            InfixOp::Plus => "+",
            InfixOp::Minus => "-",
            InfixOp::Mul => "*",
            InfixOp::Div => "/",
            InfixOp::Rem => "%",
            InfixOp::Pow => "**",
            InfixOp::Shl => "<<",
            InfixOp::Shr => ">>",
            InfixOp::BitAnd => "&",
            InfixOp::BitOr => "|",
            InfixOp::BitXor => "^",
            InfixOp::And => "&&",
            InfixOp::Or => "||",
            InfixOp::Eq => "==",
            InfixOp::Neq => "!=",
            InfixOp::Lt => "<",
            InfixOp::Lte => "<=",
            InfixOp::Gt => ">",
            InfixOp::Gte => ">=",
        }
    }
}

impl std::fmt::Display for InfixOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InfixExpr {
    pub lhs: Box<Expression>,
    pub op: InfixOp,
    pub rhs: Box<Expression>,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssignOp {
    Assign,
    Plus,
    Minus,
    Mul,
    Div,
    Rem,
    Pow,
    Shl,
    Shr,
    BitAnd,
    BitOr,
    BitXor,
}

impl AssignOp {
    /// The infix operator a compound assignment is built from, if any.
    pub fn base_infix(&self) -> Option<InfixOp> {
        Some(match self {
            AssignOp::Assign => return None,
            AssignOp::Plus => InfixOp::Plus,
            AssignOp::Minus => InfixOp::Minus,
            AssignOp::Mul => InfixOp::Mul,
            AssignOp::Div => InfixOp::Div,
            AssignOp::Rem => InfixOp::Rem,
            AssignOp::Pow => InfixOp::Pow,
            AssignOp::Shl => InfixOp::Shl,
            AssignOp::Shr => InfixOp::Shr,
            AssignOp::BitAnd => InfixOp::BitAnd,
            AssignOp::BitOr => InfixOp::BitOr,
            AssignOp::BitXor => InfixOp::BitXor,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssignExpr {
    pub lhs: Box<Expression>,
    pub op: AssignOp,
    pub rhs: Box<Expression>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallExpr {
    pub base: Box<Expression>,
    pub args: Vec<Expression>,
    /// `spawn f(...)`: run the call on a separate thread of execution.
    pub is_spawn: bool,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexExpr {
    pub base: Box<Expression>,
    pub index: Box<Expression>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemberExpr {
    pub base: Box<Expression>,
    pub member: Ident,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CastExpr {
    pub base: Box<Expression>,
    pub type_expr: TypeExpr,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IfExpr {
    pub condition: Box<Expression>,
    pub then_block: Block,
    pub else_block: Option<Box<Expression>>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchExpr {
    pub control: Box<Expression>,
    pub arms: Vec<MatchArm>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchArm {
    /// `None` is the default arm (`_`).
    pub literal: Option<Expression>,
    pub action: Expression,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TryExpr {
    pub try_block: Block,
    pub catch_ident: Ident,
    pub catch_block: Block,
    pub span: Span,
}
