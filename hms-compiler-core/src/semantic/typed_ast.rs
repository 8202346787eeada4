// Typed AST produced by the Homescript semantic analyzer
//
// Mirrors the parse AST, with every expression annotated with its result
// type. Nodes the analyzer could not type are replaced by the `Unknown`
// placeholder so downstream consumers always see a complete tree.

use serde::Serialize;

use crate::ast::{AssignOp, FnModifier, ImportKind, InfixOp, PrefixOp, TriggerConnective};
use crate::source::Span;

use super::module::AnalyzedParam;
use super::types::{Type, TypeKind};

/// The analyzer's output for one module.
#[derive(Debug, Clone, Default, Serialize)]
pub struct AnalyzedProgram {
    pub imports: Vec<AnalyzedImport>,
    pub types: Vec<AnalyzedTypeDef>,
    pub singletons: Vec<AnalyzedSingleton>,
    pub globals: Vec<AnalyzedLetStmt>,
    pub functions: Vec<AnalyzedFunctionDef>,
    pub impl_blocks: Vec<AnalyzedImplBlock>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnalyzedImport {
    pub module: String,
    pub items: Vec<AnalyzedImportItem>,
    pub span: Span,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnalyzedImportItem {
    pub name: String,
    pub kind: ImportKind,
    /// `unknown` where resolution failed; the entry is still inserted so
    /// later references do not cascade.
    pub ty: Type,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnalyzedTypeDef {
    pub name: String,
    pub ty: Type,
    pub is_pub: bool,
    pub span: Span,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnalyzedSingleton {
    pub name: String,
    pub ty: Type,
    pub span: Span,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnalyzedFunctionDef {
    pub name: String,
    pub modifier: FnModifier,
    pub parameters: Vec<AnalyzedParam>,
    pub return_type: Type,
    pub body: AnalyzedBlock,
    pub span: Span,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnalyzedImplBlock {
    pub template: String,
    pub singleton: String,
    pub capabilities: Vec<String>,
    pub methods: Vec<AnalyzedFunctionDef>,
    pub span: Span,
}

// ============================================================================
// Statements
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct AnalyzedBlock {
    pub statements: Vec<AnalyzedStatement>,
    pub trailing_expr: Option<Box<AnalyzedExpression>>,
    pub span: Span,
}

impl AnalyzedBlock {
    /// The block's result type: the trailing expression's type if there
    /// is one, `never` if a statement diverges, `null` otherwise.
    pub fn result_type(&self) -> Type {
        if let Some(expr) = &self.trailing_expr {
            return expr.result_type();
        }
        for stmt in &self.statements {
            let ty = stmt.result_type();
            if matches!(ty.kind, TypeKind::Never) {
                return ty;
            }
        }
        Type::new(TypeKind::Null, self.span.clone())
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalyzedStatement {
    Let(AnalyzedLetStmt),
    Return(AnalyzedReturnStmt),
    Break(AnalyzedBreakStmt),
    Continue(AnalyzedContinueStmt),
    Loop(AnalyzedLoopStmt),
    While(AnalyzedWhileStmt),
    For(AnalyzedForStmt),
    Trigger(AnalyzedTriggerStmt),
    Expr(AnalyzedExprStmt),
}

impl AnalyzedStatement {
    pub fn span(&self) -> &Span {
        match self {
            AnalyzedStatement::Let(node) => &node.span,
            AnalyzedStatement::Return(node) => &node.span,
            AnalyzedStatement::Break(node) => &node.span,
            AnalyzedStatement::Continue(node) => &node.span,
            AnalyzedStatement::Loop(node) => &node.span,
            AnalyzedStatement::While(node) => &node.span,
            AnalyzedStatement::For(node) => &node.span,
            AnalyzedStatement::Trigger(node) => &node.span,
            AnalyzedStatement::Expr(node) => &node.span,
        }
    }

    /// The type a statement contributes to its surrounding block: `never`
    /// for diverging statements, `null` otherwise.
    pub fn result_type(&self) -> Type {
        match self {
            AnalyzedStatement::Return(node) => Type::new(TypeKind::Never, node.span.clone()),
            AnalyzedStatement::Break(node) => Type::new(TypeKind::Never, node.span.clone()),
            AnalyzedStatement::Continue(node) => Type::new(TypeKind::Never, node.span.clone()),
            AnalyzedStatement::Let(node) => {
                if node.initializer.result_type().is_never() {
                    Type::new(TypeKind::Never, node.span.clone())
                } else {
                    Type::new(TypeKind::Null, node.span.clone())
                }
            }
            AnalyzedStatement::Loop(node) => {
                if node.never_terminates {
                    Type::new(TypeKind::Never, node.span.clone())
                } else {
                    Type::new(TypeKind::Null, node.span.clone())
                }
            }
            AnalyzedStatement::While(node) => Type::new(TypeKind::Null, node.span.clone()),
            AnalyzedStatement::For(node) => Type::new(TypeKind::Null, node.span.clone()),
            AnalyzedStatement::Trigger(node) => Type::new(TypeKind::Null, node.span.clone()),
            AnalyzedStatement::Expr(node) => node.expr.result_type(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AnalyzedLetStmt {
    pub name: String,
    /// The binding's declared (annotated or inferred) type.
    pub ty: Type,
    pub initializer: AnalyzedExpression,
    pub is_pub: bool,
    pub span: Span,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnalyzedReturnStmt {
    pub value: Option<AnalyzedExpression>,
    pub span: Span,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnalyzedBreakStmt {
    pub span: Span,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnalyzedContinueStmt {
    pub span: Span,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnalyzedLoopStmt {
    pub body: AnalyzedBlock,
    /// True when the body contains no reachable exit.
    pub never_terminates: bool,
    pub span: Span,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnalyzedWhileStmt {
    pub condition: AnalyzedExpression,
    pub body: AnalyzedBlock,
    /// Detection is not implemented for conditional loops.
    pub never_terminates: bool,
    pub span: Span,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnalyzedForStmt {
    pub binding: String,
    pub iterable: AnalyzedExpression,
    pub body: AnalyzedBlock,
    /// Detection is not implemented for conditional loops.
    pub never_terminates: bool,
    pub span: Span,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnalyzedTriggerStmt {
    pub callback: String,
    pub connective: TriggerConnective,
    pub trigger: String,
    pub args: Vec<AnalyzedExpression>,
    pub span: Span,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnalyzedExprStmt {
    pub expr: AnalyzedExpression,
    pub span: Span,
}

// ============================================================================
// Expressions
// ============================================================================

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalyzedExpression {
    Int(AnalyzedIntLiteral),
    Float(AnalyzedFloatLiteral),
    Bool(AnalyzedBoolLiteral),
    Str(AnalyzedStrLiteral),
    Null(AnalyzedNullLiteral),
    None(AnalyzedNoneLiteral),
    Range(AnalyzedRangeExpr),
    Ident(AnalyzedIdent),
    Singleton(AnalyzedSingletonRef),
    List(AnalyzedListLiteral),
    Object(AnalyzedObjectLiteral),
    Lambda(AnalyzedLambda),
    Grouped(AnalyzedGrouped),
    Prefix(AnalyzedPrefixExpr),
    Infix(AnalyzedInfixExpr),
    Assign(AnalyzedAssignExpr),
    Call(AnalyzedCallExpr),
    Index(AnalyzedIndexExpr),
    Member(AnalyzedMemberExpr),
    Cast(AnalyzedCastExpr),
    Block(Box<AnalyzedBlock>),
    If(AnalyzedIfExpr),
    Match(AnalyzedMatchExpr),
    Try(AnalyzedTryExpr),
    /// Placeholder for expressions that failed analysis.
    Unknown(AnalyzedUnknown),
}

impl AnalyzedExpression {
    pub fn span(&self) -> &Span {
        match self {
            AnalyzedExpression::Int(node) => &node.span,
            AnalyzedExpression::Float(node) => &node.span,
            AnalyzedExpression::Bool(node) => &node.span,
            AnalyzedExpression::Str(node) => &node.span,
            AnalyzedExpression::Null(node) => &node.span,
            AnalyzedExpression::None(node) => &node.span,
            AnalyzedExpression::Range(node) => &node.span,
            AnalyzedExpression::Ident(node) => &node.span,
            AnalyzedExpression::Singleton(node) => &node.span,
            AnalyzedExpression::List(node) => &node.span,
            AnalyzedExpression::Object(node) => &node.span,
            AnalyzedExpression::Lambda(node) => &node.span,
            AnalyzedExpression::Grouped(node) => &node.span,
            AnalyzedExpression::Prefix(node) => &node.span,
            AnalyzedExpression::Infix(node) => &node.span,
            AnalyzedExpression::Assign(node) => &node.span,
            AnalyzedExpression::Call(node) => &node.span,
            AnalyzedExpression::Index(node) => &node.span,
            AnalyzedExpression::Member(node) => &node.span,
            AnalyzedExpression::Cast(node) => &node.span,
            AnalyzedExpression::Block(node) => &node.span,
            AnalyzedExpression::If(node) => &node.span,
            AnalyzedExpression::Match(node) => &node.span,
            AnalyzedExpression::Try(node) => &node.span,
            AnalyzedExpression::Unknown(node) => &node.span,
        }
    }

    /// The type this expression produces.
    pub fn result_type(&self) -> Type {
        match self {
            AnalyzedExpression::Int(node) => Type::new(TypeKind::Int, node.span.clone()),
            AnalyzedExpression::Float(node) => Type::new(TypeKind::Float, node.span.clone()),
            AnalyzedExpression::Bool(node) => Type::new(TypeKind::Bool, node.span.clone()),
            AnalyzedExpression::Str(node) => Type::new(TypeKind::String, node.span.clone()),
            AnalyzedExpression::Null(node) => Type::new(TypeKind::Null, node.span.clone()),
            AnalyzedExpression::None(node) => Type::new(
                TypeKind::Option(Box::new(Type::new(TypeKind::Any, node.span.clone()))),
                node.span.clone(),
            ),
            AnalyzedExpression::Range(node) => Type::new(TypeKind::Range, node.span.clone()),
            AnalyzedExpression::Ident(node) => node.ty.clone(),
            AnalyzedExpression::Singleton(node) => node.ty.clone(),
            AnalyzedExpression::List(node) => node.ty.clone(),
            AnalyzedExpression::Object(node) => node.ty.clone(),
            AnalyzedExpression::Lambda(node) => node.ty.clone(),
            AnalyzedExpression::Grouped(node) => node.inner.result_type(),
            AnalyzedExpression::Prefix(node) => node.ty.clone(),
            AnalyzedExpression::Infix(node) => node.ty.clone(),
            AnalyzedExpression::Assign(node) => node.ty.clone(),
            AnalyzedExpression::Call(node) => node.ty.clone(),
            AnalyzedExpression::Index(node) => node.ty.clone(),
            AnalyzedExpression::Member(node) => node.ty.clone(),
            AnalyzedExpression::Cast(node) => node.ty.clone(),
            AnalyzedExpression::Block(node) => node.result_type(),
            AnalyzedExpression::If(node) => node.ty.clone(),
            AnalyzedExpression::Match(node) => node.ty.clone(),
            AnalyzedExpression::Try(node) => node.ty.clone(),
            AnalyzedExpression::Unknown(node) => Type::unknown(node.span.clone()),
        }
    }

    /// Whether this expression's value is known without executing
    /// user-defined functions: literals and composites of constants.
    pub fn constant(&self) -> bool {
        match self {
            AnalyzedExpression::Int(_)
            | AnalyzedExpression::Float(_)
            | AnalyzedExpression::Bool(_)
            | AnalyzedExpression::Str(_)
            | AnalyzedExpression::Null(_)
            | AnalyzedExpression::None(_) => true,
            AnalyzedExpression::Range(node) => node.start.constant() && node.end.constant(),
            AnalyzedExpression::List(node) => node.values.iter().all(|v| v.constant()),
            AnalyzedExpression::Object(node) => node.fields.iter().all(|f| f.value.constant()),
            AnalyzedExpression::Grouped(node) => node.inner.constant(),
            AnalyzedExpression::Prefix(node) => node.rhs.constant(),
            AnalyzedExpression::Infix(node) => node.lhs.constant() && node.rhs.constant(),
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AnalyzedIntLiteral {
    pub value: i64,
    pub span: Span,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnalyzedFloatLiteral {
    pub value: f64,
    pub span: Span,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnalyzedBoolLiteral {
    pub value: bool,
    pub span: Span,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnalyzedStrLiteral {
    pub value: String,
    pub span: Span,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnalyzedNullLiteral {
    pub span: Span,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnalyzedNoneLiteral {
    pub span: Span,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnalyzedRangeExpr {
    pub start: Box<AnalyzedExpression>,
    pub end: Box<AnalyzedExpression>,
    pub span: Span,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnalyzedIdent {
    pub name: String,
    pub ty: Type,
    pub span: Span,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnalyzedSingletonRef {
    pub name: String,
    pub ty: Type,
    pub span: Span,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnalyzedListLiteral {
    pub values: Vec<AnalyzedExpression>,
    pub ty: Type,
    pub span: Span,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnalyzedObjectLiteral {
    pub fields: Vec<AnalyzedObjectField>,
    pub ty: Type,
    pub span: Span,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnalyzedObjectField {
    pub key: String,
    pub value: AnalyzedExpression,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnalyzedLambda {
    pub parameters: Vec<AnalyzedParam>,
    pub return_type: Type,
    pub body: AnalyzedBlock,
    /// The lambda's function type.
    pub ty: Type,
    pub span: Span,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnalyzedGrouped {
    pub inner: Box<AnalyzedExpression>,
    pub span: Span,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnalyzedPrefixExpr {
    pub op: PrefixOp,
    pub rhs: Box<AnalyzedExpression>,
    pub ty: Type,
    pub span: Span,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnalyzedInfixExpr {
    pub lhs: Box<AnalyzedExpression>,
    pub op: InfixOp,
    pub rhs: Box<AnalyzedExpression>,
    pub ty: Type,
    pub span: Span,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnalyzedAssignExpr {
    pub lhs: Box<AnalyzedExpression>,
    pub op: AssignOp,
    pub rhs: Box<AnalyzedExpression>,
    pub ty: Type,
    pub span: Span,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnalyzedCallExpr {
    pub base: Box<AnalyzedExpression>,
    pub args: Vec<AnalyzedExpression>,
    pub is_spawn: bool,
    pub ty: Type,
    pub span: Span,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnalyzedIndexExpr {
    pub base: Box<AnalyzedExpression>,
    pub index: Box<AnalyzedExpression>,
    pub ty: Type,
    pub span: Span,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnalyzedMemberExpr {
    pub base: Box<AnalyzedExpression>,
    pub member: String,
    pub ty: Type,
    pub span: Span,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnalyzedCastExpr {
    pub base: Box<AnalyzedExpression>,
    /// The cast target; also the expression's result type.
    pub ty: Type,
    pub span: Span,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnalyzedIfExpr {
    pub condition: Box<AnalyzedExpression>,
    pub then_block: AnalyzedBlock,
    pub else_block: Option<Box<AnalyzedExpression>>,
    pub ty: Type,
    pub span: Span,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnalyzedMatchExpr {
    pub control: Box<AnalyzedExpression>,
    pub arms: Vec<AnalyzedMatchArm>,
    pub ty: Type,
    pub span: Span,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnalyzedMatchArm {
    /// `None` is the default arm.
    pub literal: Option<AnalyzedExpression>,
    pub action: AnalyzedExpression,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnalyzedTryExpr {
    pub try_block: AnalyzedBlock,
    pub catch_ident: String,
    pub catch_block: AnalyzedBlock,
    pub ty: Type,
    pub span: Span,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnalyzedUnknown {
    pub span: Span,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn int(value: i64) -> AnalyzedExpression {
        AnalyzedExpression::Int(AnalyzedIntLiteral {
            value,
            span: Span::synthetic(),
        })
    }

    #[test]
    fn test_empty_block_results_in_null() {
        let block = AnalyzedBlock {
            statements: vec![],
            trailing_expr: None,
            span: Span::synthetic(),
        };
        assert!(matches!(block.result_type().kind, TypeKind::Null));
    }

    #[test]
    fn test_diverging_statement_makes_block_never() {
        let block = AnalyzedBlock {
            statements: vec![AnalyzedStatement::Return(AnalyzedReturnStmt {
                value: None,
                span: Span::synthetic(),
            })],
            trailing_expr: None,
            span: Span::synthetic(),
        };
        assert!(matches!(block.result_type().kind, TypeKind::Never));
    }

    #[test]
    fn test_constant_predicate() {
        assert!(int(1).constant());

        let list = AnalyzedExpression::List(AnalyzedListLiteral {
            values: vec![int(1), int(2)],
            ty: Type::synthetic(TypeKind::List(Box::new(Type::synthetic(TypeKind::Int)))),
            span: Span::synthetic(),
        });
        assert!(list.constant());

        let sum = AnalyzedExpression::Infix(AnalyzedInfixExpr {
            lhs: Box::new(int(1)),
            op: InfixOp::Plus,
            rhs: Box::new(int(2)),
            ty: Type::synthetic(TypeKind::Int),
            span: Span::synthetic(),
        });
        assert!(sum.constant());

        let ident = AnalyzedExpression::Ident(AnalyzedIdent {
            name: "x".to_string(),
            ty: Type::synthetic(TypeKind::Int),
            span: Span::synthetic(),
        });
        assert!(!ident.constant());
    }
}
