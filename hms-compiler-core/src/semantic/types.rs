// Type representation for Homescript semantic analysis
//
// Types are immutable values. Every type carries the span it was derived
// from; spans never participate in equality, which is structural on the
// kind alone. Synthetic types (prelude symbols, recovery placeholders)
// carry a synthetic span.

use crate::ast;
use crate::source::Span;
use serde::Serialize;

use super::{Analyzer, HostProvider};

/// A semantic type together with the span it was derived from.
#[derive(Debug, Clone, Serialize)]
pub struct Type {
    pub kind: TypeKind,
    pub span: Span,
}

impl PartialEq for Type {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind
    }
}

impl Type {
    pub fn new(kind: TypeKind, span: Span) -> Self {
        Self { kind, span }
    }

    /// A type with a synthetic span (not tied to any source location).
    pub fn synthetic(kind: TypeKind) -> Self {
        Self {
            kind,
            span: Span::synthetic(),
        }
    }

    /// The recovery placeholder type.
    pub fn unknown(span: Span) -> Self {
        Self {
            kind: TypeKind::Unknown,
            span,
        }
    }

    /// Return a copy of this type carrying a different span.
    pub fn set_span(&self, span: Span) -> Type {
        Type {
            kind: self.kind.clone(),
            span,
        }
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self.kind, TypeKind::Unknown)
    }

    pub fn is_never(&self) -> bool {
        matches!(self.kind, TypeKind::Never)
    }

    /// Check whether any transitive component of this type is `any`.
    ///
    /// `{ ? }` (any-object) intentionally does not count.
    pub fn contains_any(&self) -> bool {
        match &self.kind {
            TypeKind::Any => true,
            TypeKind::List(inner) | TypeKind::Option(inner) => inner.contains_any(),
            TypeKind::Object(object) => object.fields.iter().any(|f| f.ty.contains_any()),
            TypeKind::Function(function) => {
                let params_contain = match &function.params {
                    Params::Normal(params) => params.iter().any(|p| p.ty.contains_any()),
                    Params::VarArgs(fixed, remaining) => {
                        fixed.iter().any(Type::contains_any) || remaining.contains_any()
                    }
                };
                params_contain || function.return_type.contains_any()
            }
            _ => false,
        }
    }
}

impl std::fmt::Display for Type {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.kind)
    }
}

/// The kind of a type.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TypeKind {
    /// Placeholder inserted where analysis could not produce a type.
    Unknown,
    /// The type of expressions that never produce a value.
    Never,
    Null,
    Int,
    Float,
    Bool,
    String,
    Range,
    Any,
    /// An object with arbitrary fields of type `any`.
    AnyObject,
    List(Box<Type>),
    Object(ObjectType),
    Option(Box<Type>),
    Function(Box<FunctionType>),
}

impl std::fmt::Display for TypeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TypeKind::Unknown => write!(f, "unknown"),
            TypeKind::Never => write!(f, "never"),
            TypeKind::Null => write!(f, "null"),
            TypeKind::Int => write!(f, "int"),
            TypeKind::Float => write!(f, "float"),
            TypeKind::Bool => write!(f, "bool"),
            TypeKind::String => write!(f, "str"),
            TypeKind::Range => write!(f, "range"),
            TypeKind::Any => write!(f, "any"),
            TypeKind::AnyObject => write!(f, "{{ ? }}"),
            TypeKind::List(inner) => write!(f, "[{inner}]"),
            TypeKind::Option(inner) => write!(f, "?{inner}"),
            TypeKind::Object(object) => {
                write!(f, "{{ ")?;
                for (i, field) in object.fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    if let Some(annotation) = &field.annotation {
                        write!(f, "#{annotation} ")?;
                    }
                    write!(f, "{}: {}", field.name, field.ty)?;
                }
                write!(f, " }}")
            }
            TypeKind::Function(function) => {
                write!(f, "fn(")?;
                match &function.params {
                    Params::Normal(params) => {
                        for (i, param) in params.iter().enumerate() {
                            if i > 0 {
                                write!(f, ", ")?;
                            }
                            match &param.singleton_ident {
                                Some(singleton) => write!(f, "{}: {singleton}", param.name)?,
                                None => write!(f, "{}: {}", param.name, param.ty)?,
                            }
                        }
                    }
                    Params::VarArgs(fixed, remaining) => {
                        for (i, ty) in fixed.iter().enumerate() {
                            if i > 0 {
                                write!(f, ", ")?;
                            }
                            write!(f, "{ty}")?;
                        }
                        if !fixed.is_empty() {
                            write!(f, ", ")?;
                        }
                        write!(f, "...{remaining}")?;
                    }
                }
                write!(f, ") -> {}", function.return_type)
            }
        }
    }
}

/// An object type: an ordered list of named fields.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ObjectType {
    pub fields: Vec<ObjectTypeField>,
}

impl ObjectType {
    /// Look up a field by name.
    pub fn field(&self, name: &str) -> Option<&ObjectTypeField> {
        self.fields.iter().find(|f| f.name == name)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ObjectTypeField {
    pub name: String,
    pub ty: Type,
    pub span: Span,
    /// Optional field annotation ident (`#setting power: bool`).
    pub annotation: Option<String>,
}

impl PartialEq for ObjectTypeField {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.ty == other.ty && self.annotation == other.annotation
    }
}

/// A function type.
#[derive(Debug, Clone, Serialize)]
pub struct FunctionType {
    pub params: Params,
    pub params_span: Span,
    pub return_type: Type,
}

impl PartialEq for FunctionType {
    fn eq(&self, other: &Self) -> bool {
        self.params == other.params && self.return_type == other.return_type
    }
}

impl FunctionType {
    pub fn new(params: Params, params_span: Span, return_type: Type) -> Self {
        Self {
            params,
            params_span,
            return_type,
        }
    }

    /// Wrap into a `Type` with the given span.
    pub fn into_type(self, span: Span) -> Type {
        Type::new(TypeKind::Function(Box::new(self)), span)
    }
}

/// Parameter list of a function type.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Params {
    Normal(Vec<FunctionParam>),
    /// A fixed prefix followed by arbitrarily many arguments of one type.
    VarArgs(Vec<Type>, Box<Type>),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FunctionParam {
    pub name: String,
    pub ty: Type,
    /// Set when the parameter extracts a singleton; such parameters are
    /// invisible at call sites.
    pub singleton_ident: Option<String>,
}

impl FunctionParam {
    pub fn new(name: impl Into<String>, ty: Type) -> Self {
        Self {
            name: name.into(),
            ty,
            singleton_ident: None,
        }
    }

    pub fn is_singleton_extractor(&self) -> bool {
        self.singleton_ident.is_some()
    }
}

/// The canonical error record bound to the catch identifier of a `try`.
pub fn error_record_type(span: Span) -> Type {
    let field = |name: &str, kind: TypeKind| ObjectTypeField {
        name: name.to_string(),
        ty: Type::synthetic(kind),
        span: Span::synthetic(),
        annotation: None,
    };
    Type::new(
        TypeKind::Object(ObjectType {
            fields: vec![
                field("message", TypeKind::String),
                field("line", TypeKind::Int),
                field("column", TypeKind::Int),
                field("filename", TypeKind::String),
            ],
        }),
        span,
    )
}

// ============================================================================
// Conversion from parsed type expressions
// ============================================================================

impl<H: HostProvider> Analyzer<H> {
    /// Convert a parsed type expression into a semantic type.
    ///
    /// Referenced type aliases and singletons are marked `used`. With
    /// `create_errors` false all diagnostics are suppressed; this is used
    /// at signature hoisting, where the same node is re-visited later with
    /// errors enabled.
    pub(crate) fn convert_type(&mut self, type_expr: &ast::TypeExpr, create_errors: bool) -> Type {
        match type_expr {
            ast::TypeExpr::Named(ident) => self.convert_named_type(ident, create_errors),
            ast::TypeExpr::Singleton(ident) => {
                match self.resolve_singleton_type(&ident.name, &ident.span) {
                    Some(ty) => ty,
                    None => {
                        if create_errors {
                            self.error(
                                format!("Undefined singleton '{}'", ident.name),
                                ident.span.clone(),
                            );
                        }
                        Type::unknown(ident.span.clone())
                    }
                }
            }
            ast::TypeExpr::List(node) => {
                let inner = self.convert_type(&node.inner, create_errors);
                Type::new(TypeKind::List(Box::new(inner)), node.span.clone())
            }
            ast::TypeExpr::Option(node) => {
                let inner = self.convert_type(&node.inner, create_errors);
                Type::new(TypeKind::Option(Box::new(inner)), node.span.clone())
            }
            ast::TypeExpr::AnyObject(node) => Type::new(TypeKind::AnyObject, node.span.clone()),
            ast::TypeExpr::Object(node) => self.convert_object_type(node, create_errors),
            ast::TypeExpr::Function(node) => self.convert_function_type(node, create_errors),
        }
    }

    fn convert_named_type(&mut self, ident: &ast::Ident, create_errors: bool) -> Type {
        let kind = match ident.name.as_str() {
            "null" => Some(TypeKind::Null),
            "int" => Some(TypeKind::Int),
            "float" => Some(TypeKind::Float),
            "range" => Some(TypeKind::Range),
            "bool" => Some(TypeKind::Bool),
            "str" => Some(TypeKind::String),
            "any" => Some(TypeKind::Any),
            _ => None,
        };
        if let Some(kind) = kind {
            return Type::new(kind, ident.span.clone());
        }

        match self.module_mut().get_type_mut(&ident.name) {
            Some(wrapper) => {
                wrapper.used = true;
                wrapper.ty.set_span(ident.span.clone())
            }
            None => {
                if create_errors {
                    self.error(
                        format!("Undefined type '{}'", ident.name),
                        ident.span.clone(),
                    );
                }
                Type::unknown(ident.span.clone())
            }
        }
    }

    /// Look up a singleton's declared type, marking the singleton used.
    pub(crate) fn resolve_singleton_type(&mut self, name: &str, span: &Span) -> Option<Type> {
        let singleton = self.module_mut().singletons.get_mut(name)?;
        singleton.used = true;
        Some(singleton.ty.set_span(span.clone()))
    }

    fn convert_object_type(&mut self, node: &ast::ObjectTypeExpr, create_errors: bool) -> Type {
        let mut fields: Vec<ObjectTypeField> = Vec::with_capacity(node.fields.len());

        for field in &node.fields {
            if fields.iter().any(|existing| existing.name == field.name.name) {
                if create_errors {
                    self.error(
                        format!("Duplicate field '{}' in object type", field.name.name),
                        field.name.span.clone(),
                    );
                }
                return Type::unknown(node.span.clone());
            }

            if let Some(annotation) = &field.annotation {
                self.check_field_annotation(annotation, create_errors);
            }

            let ty = self.convert_type(&field.type_expr, create_errors);
            fields.push(ObjectTypeField {
                name: field.name.name.clone(),
                ty,
                span: field.name.span.clone(),
                annotation: field.annotation.as_ref().map(|a| a.name.clone()),
            });
        }

        Type::new(TypeKind::Object(ObjectType { fields }), node.span.clone())
    }

    fn check_field_annotation(&mut self, annotation: &ast::Ident, create_errors: bool) {
        if self.known_annotations.iter().any(|known| *known == annotation.name) {
            return;
        }
        if !create_errors {
            return;
        }
        let mut diag = crate::diagnostic::Diagnostic::error(
            format!("Unknown field annotation '{}'", annotation.name),
            annotation.span.clone(),
        );
        if let Some(suggestion) =
            super::suggest::closest_match(&annotation.name, self.known_annotations.iter().map(String::as_str))
        {
            diag = diag.with_note(format!("an annotation with a similar name exists: '{suggestion}'"));
        }
        self.emit(diag);
    }

    fn convert_function_type(
        &mut self,
        node: &ast::FunctionTypeExpr,
        create_errors: bool,
    ) -> Type {
        let mut params: Vec<FunctionParam> = Vec::with_capacity(node.params.len());

        for param in &node.params {
            if params.iter().any(|existing| existing.name == param.name.name) {
                if create_errors {
                    self.error(
                        format!("Duplicate parameter '{}' in function type", param.name.name),
                        param.name.span.clone(),
                    );
                }
                return Type::unknown(node.span.clone());
            }

            let singleton_ident = match &param.type_expr {
                ast::TypeExpr::Singleton(ident) => Some(ident.name.clone()),
                _ => None,
            };
            let ty = self.convert_type(&param.type_expr, create_errors);
            params.push(FunctionParam {
                name: param.name.name.clone(),
                ty,
                singleton_ident,
            });
        }

        let return_type = match &node.return_type {
            Some(ret) => self.convert_type(ret, create_errors),
            None => Type::new(TypeKind::Null, node.span.clone()),
        };

        FunctionType::new(Params::Normal(params), node.params_span.clone(), return_type)
            .into_type(node.span.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn int() -> Type {
        Type::synthetic(TypeKind::Int)
    }

    #[test]
    fn test_equality_ignores_spans() {
        let a = Type::new(TypeKind::Int, Span::file("a.hms"));
        let b = Type::new(TypeKind::Int, Span::file("b.hms"));
        assert_eq!(a, b);

        let list_a = Type::synthetic(TypeKind::List(Box::new(a)));
        let list_b = Type::new(
            TypeKind::List(Box::new(b)),
            Span::file("c.hms"),
        );
        assert_eq!(list_a, list_b);
    }

    #[test]
    fn test_set_span_is_pure() {
        let original = Type::synthetic(TypeKind::Bool);
        let moved = original.set_span(Span::file("x.hms"));
        assert!(original.span.is_synthetic());
        assert_eq!(moved.span.filename, "x.hms");
        assert_eq!(original, moved);
    }

    #[test]
    fn test_contains_any() {
        assert!(Type::synthetic(TypeKind::Any).contains_any());
        assert!(!Type::synthetic(TypeKind::AnyObject).contains_any());
        assert!(
            Type::synthetic(TypeKind::List(Box::new(Type::synthetic(TypeKind::Any))))
                .contains_any()
        );
        let func = FunctionType::new(
            Params::Normal(vec![FunctionParam::new("x", Type::synthetic(TypeKind::Any))]),
            Span::synthetic(),
            Type::synthetic(TypeKind::Null),
        )
        .into_type(Span::synthetic());
        assert!(func.contains_any());
        assert!(!int().contains_any());
    }

    #[test]
    fn test_display() {
        assert_eq!(int().to_string(), "int");
        assert_eq!(
            Type::synthetic(TypeKind::Option(Box::new(int()))).to_string(),
            "?int"
        );
        assert_eq!(
            Type::synthetic(TypeKind::List(Box::new(int()))).to_string(),
            "[int]"
        );
        let func = FunctionType::new(
            Params::Normal(vec![FunctionParam::new("x", int())]),
            Span::synthetic(),
            Type::synthetic(TypeKind::Bool),
        )
        .into_type(Span::synthetic());
        assert_eq!(func.to_string(), "fn(x: int) -> bool");

        let varargs = FunctionType::new(
            Params::VarArgs(vec![], Box::new(Type::synthetic(TypeKind::Any))),
            Span::synthetic(),
            Type::synthetic(TypeKind::Null),
        )
        .into_type(Span::synthetic());
        assert_eq!(varargs.to_string(), "fn(...any) -> null");
    }

    #[test]
    fn test_error_record_type() {
        let ty = error_record_type(Span::synthetic());
        let TypeKind::Object(object) = &ty.kind else {
            panic!("expected object");
        };
        assert_eq!(object.fields.len(), 4);
        assert!(object.field("message").is_some());
        assert!(object.field("filename").is_some());
    }
}
