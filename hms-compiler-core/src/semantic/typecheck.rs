// Sub-assignment checking for Homescript types
//
// `type_check` decides whether a value of type `got` can flow into a slot
// expecting `expected`. The check is directional, not symmetric. It never
// emits diagnostics itself; it returns a structured error which callers
// forward (optionally with added context) to the diagnostic sink.

use super::types::{Params, Type, TypeKind};
use super::{Analyzer, HostProvider};
use crate::source::Span;

/// Options controlling a single `type_check` call.
#[derive(Debug, Clone, Copy)]
pub struct TypeCheckOptions {
    /// Whether function-typed values may appear on either side. Cast
    /// sites set this to false: function values cannot be cast at runtime.
    pub allow_fn_types: bool,
    /// Match function parameters positionally instead of requiring names
    /// to agree. Used when checking callbacks against host signatures.
    pub ignore_fn_param_name_mismatches: bool,
}

impl Default for TypeCheckOptions {
    fn default() -> Self {
        Self {
            allow_fn_types: true,
            ignore_fn_param_name_mismatches: false,
        }
    }
}

impl TypeCheckOptions {
    /// Options for checking callbacks: parameter names do not matter.
    pub fn ignore_param_names() -> Self {
        Self {
            allow_fn_types: true,
            ignore_fn_param_name_mismatches: true,
        }
    }

    /// Options for cast sites: function values are rejected.
    pub fn no_fn_types() -> Self {
        Self {
            allow_fn_types: false,
            ignore_fn_param_name_mismatches: false,
        }
    }
}

/// One side of a compatibility error: a message anchored at a span.
#[derive(Debug, Clone)]
pub struct CompatSide {
    pub message: String,
    pub notes: Vec<String>,
    pub span: Span,
}

/// A failed `type_check`: a diagnostic for the offending value and
/// optionally one pointing at where the expectation came from.
#[derive(Debug, Clone)]
pub struct CompatError {
    pub got: CompatSide,
    pub expected: Option<CompatSide>,
}

impl CompatError {
    fn mismatch(got: &Type, expected: &Type) -> Self {
        Self {
            got: CompatSide {
                message: format!("Mismatched types: expected '{expected}', got '{got}'"),
                notes: Vec::new(),
                span: got.span.clone(),
            },
            expected: Some(CompatSide {
                message: format!("expected '{expected}' due to this"),
                notes: Vec::new(),
                span: expected.span.clone(),
            }),
        }
    }

    fn with_note(mut self, note: impl Into<String>) -> Self {
        self.got.notes.push(note.into());
        self
    }

    /// Prefix the primary message, used when forwarding the error from an
    /// outer construct (trigger arguments, impl methods, ...).
    pub fn with_context(mut self, context: impl AsRef<str>) -> Self {
        self.got.message = format!("{}: {}", context.as_ref(), self.got.message);
        self
    }

    /// Re-anchor the primary message at a different span.
    pub fn at_span(mut self, span: Span) -> Self {
        self.got.span = span;
        self
    }
}

/// Check whether `got` sub-assigns into `expected`.
pub fn type_check(got: &Type, expected: &Type, options: TypeCheckOptions) -> Option<CompatError> {
    // Anything flows into `any`, `unknown` and `never`.
    if matches!(
        expected.kind,
        TypeKind::Any | TypeKind::Unknown | TypeKind::Never
    ) {
        return None;
    }
    // `unknown` and `never` flow anywhere (error recovery, divergence).
    // `any` on the value side is intentionally permissive; implicit-any
    // propagation is gated separately by the walker.
    if matches!(
        got.kind,
        TypeKind::Unknown | TypeKind::Never | TypeKind::Any
    ) {
        return None;
    }

    let either_is_fn = matches!(got.kind, TypeKind::Function(_))
        || matches!(expected.kind, TypeKind::Function(_));
    if either_is_fn && !options.allow_fn_types {
        return Some(CompatError {
            got: CompatSide {
                message: "Cannot cast a function value at runtime".to_string(),
                notes: Vec::new(),
                span: got.span.clone(),
            },
            expected: None,
        });
    }

    match (&got.kind, &expected.kind) {
        (TypeKind::List(got_inner), TypeKind::List(expected_inner)) => {
            type_check(got_inner, expected_inner, options)
        }
        (TypeKind::Option(got_inner), TypeKind::Option(expected_inner)) => {
            type_check(got_inner, expected_inner, options)
        }
        (TypeKind::Object(got_object), TypeKind::Object(expected_object)) => {
            for expected_field in &expected_object.fields {
                let Some(got_field) = got_object.field(&expected_field.name) else {
                    return Some(
                        CompatError::mismatch(got, expected).with_note(format!(
                            "field '{}: {}' is missing",
                            expected_field.name, expected_field.ty
                        )),
                    );
                };
                if let Some(err) = type_check(&got_field.ty, &expected_field.ty, options) {
                    return Some(err);
                }
            }
            for got_field in &got_object.fields {
                if expected_object.field(&got_field.name).is_none() {
                    return Some(
                        CompatError::mismatch(got, expected)
                            .with_note(format!("field '{}' is not expected", got_field.name)),
                    );
                }
            }
            None
        }
        (TypeKind::Function(got_fn), TypeKind::Function(expected_fn)) => {
            check_function(got, expected, got_fn, expected_fn, options)
        }
        (got_kind, expected_kind)
            if std::mem::discriminant(got_kind) == std::mem::discriminant(expected_kind) =>
        {
            None
        }
        _ => Some(CompatError::mismatch(got, expected)),
    }
}

fn check_function(
    got: &Type,
    expected: &Type,
    got_fn: &super::types::FunctionType,
    expected_fn: &super::types::FunctionType,
    options: TypeCheckOptions,
) -> Option<CompatError> {
    match (&got_fn.params, &expected_fn.params) {
        (Params::Normal(got_params), Params::Normal(expected_params)) => {
            if got_params.len() != expected_params.len() {
                return Some(CompatError::mismatch(got, expected).with_note(format!(
                    "expected {} parameters, got {}",
                    expected_params.len(),
                    got_params.len()
                )));
            }
            for (index, (got_param, expected_param)) in
                got_params.iter().zip(expected_params).enumerate()
            {
                if got_param.name != expected_param.name
                    && !options.ignore_fn_param_name_mismatches
                {
                    return Some(CompatError::mismatch(got, expected).with_note(format!(
                        "parameter {} is named '{}', expected '{}'",
                        index + 1,
                        got_param.name,
                        expected_param.name
                    )));
                }
                if got_param.singleton_ident != expected_param.singleton_ident {
                    return Some(CompatError::mismatch(got, expected).with_note(format!(
                        "parameter '{}' differs in singleton extraction",
                        expected_param.name
                    )));
                }
                if let Some(err) = type_check(&got_param.ty, &expected_param.ty, options) {
                    return Some(err);
                }
            }
        }
        (Params::Normal(got_params), Params::VarArgs(fixed, remaining)) => {
            if got_params.len() < fixed.len() {
                return Some(CompatError::mismatch(got, expected).with_note(format!(
                    "expected at least {} parameters, got {}",
                    fixed.len(),
                    got_params.len()
                )));
            }
            for (got_param, expected_ty) in got_params.iter().zip(fixed) {
                if let Some(err) = type_check(&got_param.ty, expected_ty, options) {
                    return Some(err);
                }
            }
            for got_param in &got_params[fixed.len()..] {
                if let Some(err) = type_check(&got_param.ty, remaining, options) {
                    return Some(err);
                }
            }
        }
        (
            Params::VarArgs(got_fixed, got_remaining),
            Params::VarArgs(expected_fixed, expected_remaining),
        ) => {
            if got_fixed.len() != expected_fixed.len() {
                return Some(CompatError::mismatch(got, expected).with_note(format!(
                    "expected {} fixed parameters, got {}",
                    expected_fixed.len(),
                    got_fixed.len()
                )));
            }
            for (got_ty, expected_ty) in got_fixed.iter().zip(expected_fixed) {
                if let Some(err) = type_check(got_ty, expected_ty, options) {
                    return Some(err);
                }
            }
            if let Some(err) = type_check(got_remaining, expected_remaining, options) {
                return Some(err);
            }
        }
        (Params::VarArgs(..), Params::Normal(_)) => {
            return Some(
                CompatError::mismatch(got, expected)
                    .with_note("a variadic function cannot stand in for a fixed-arity one"),
            );
        }
    }

    type_check(&got_fn.return_type, &expected_fn.return_type, options)
}

impl<H: HostProvider> Analyzer<H> {
    /// Forward a compatibility error to the diagnostic sink: an error at
    /// the offending value plus a hint at the source of the expectation.
    pub(crate) fn emit_compat(&mut self, err: CompatError) {
        let diag = crate::diagnostic::Diagnostic::error(err.got.message, err.got.span)
            .with_notes(err.got.notes);
        self.emit(diag);

        if let Some(expected) = err.expected {
            if !expected.span.is_synthetic() {
                let hint = crate::diagnostic::Diagnostic::hint(expected.message, expected.span)
                    .with_notes(expected.notes);
                self.emit(hint);
            }
        }
    }

    /// Check and report in one step; returns true when compatible.
    pub(crate) fn check_assignable(
        &mut self,
        got: &Type,
        expected: &Type,
        options: TypeCheckOptions,
    ) -> bool {
        match type_check(got, expected, options) {
            None => true,
            Some(err) => {
                self.emit_compat(err);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::semantic::types::{FunctionParam, FunctionType, ObjectType, ObjectTypeField};

    fn ty(kind: TypeKind) -> Type {
        Type::synthetic(kind)
    }

    fn object(fields: Vec<(&str, TypeKind)>) -> Type {
        ty(TypeKind::Object(ObjectType {
            fields: fields
                .into_iter()
                .map(|(name, kind)| ObjectTypeField {
                    name: name.to_string(),
                    ty: ty(kind),
                    span: Span::synthetic(),
                    annotation: None,
                })
                .collect(),
        }))
    }

    fn func(params: Vec<(&str, TypeKind)>, ret: TypeKind) -> Type {
        FunctionType::new(
            Params::Normal(
                params
                    .into_iter()
                    .map(|(name, kind)| FunctionParam::new(name, ty(kind)))
                    .collect(),
            ),
            Span::synthetic(),
            ty(ret),
        )
        .into_type(Span::synthetic())
    }

    #[test]
    fn test_reflexive() {
        let samples = vec![
            ty(TypeKind::Int),
            ty(TypeKind::String),
            ty(TypeKind::List(Box::new(ty(TypeKind::Bool)))),
            object(vec![("a", TypeKind::Int), ("b", TypeKind::String)]),
            func(vec![("x", TypeKind::Int)], TypeKind::Bool),
        ];
        for sample in samples {
            assert!(
                type_check(&sample, &sample, TypeCheckOptions::default()).is_none(),
                "not reflexive: {sample}"
            );
        }
    }

    #[test]
    fn test_permissive_sides() {
        for kind in [TypeKind::Any, TypeKind::Unknown, TypeKind::Never] {
            assert!(type_check(&ty(TypeKind::Int), &ty(kind.clone()), TypeCheckOptions::default()).is_none());
            assert!(type_check(&ty(kind), &ty(TypeKind::Int), TypeCheckOptions::default()).is_none());
        }
    }

    #[test]
    fn test_kind_mismatch() {
        let err = type_check(
            &ty(TypeKind::String),
            &ty(TypeKind::Int),
            TypeCheckOptions::default(),
        )
        .unwrap();
        assert_eq!(err.got.message, "Mismatched types: expected 'int', got 'str'");
    }

    #[test]
    fn test_object_missing_and_extra_fields() {
        let expected = object(vec![("a", TypeKind::Int)]);
        let missing = object(vec![]);
        let err = type_check(&missing, &expected, TypeCheckOptions::default()).unwrap();
        assert!(err.got.notes[0].contains("missing"));

        let extra = object(vec![("a", TypeKind::Int), ("b", TypeKind::Bool)]);
        let err = type_check(&extra, &expected, TypeCheckOptions::default()).unwrap();
        assert!(err.got.notes[0].contains("not expected"));
    }

    #[test]
    fn test_empty_object_into_empty_object() {
        assert!(type_check(&object(vec![]), &object(vec![]), TypeCheckOptions::default()).is_none());
    }

    #[test]
    fn test_function_param_names() {
        let got = func(vec![("x", TypeKind::Int)], TypeKind::Null);
        let expected = func(vec![("y", TypeKind::Int)], TypeKind::Null);
        assert!(type_check(&got, &expected, TypeCheckOptions::default()).is_some());
        assert!(type_check(&got, &expected, TypeCheckOptions::ignore_param_names()).is_none());
    }

    #[test]
    fn test_fn_types_gated() {
        let got = func(vec![], TypeKind::Null);
        let err = type_check(&got, &ty(TypeKind::Int), TypeCheckOptions::no_fn_types()).unwrap();
        assert_eq!(err.got.message, "Cannot cast a function value at runtime");
        assert!(err.expected.is_none());
    }

    #[test]
    fn test_varargs_accepts_fixed_prefix() {
        let expected = FunctionType::new(
            Params::VarArgs(vec![ty(TypeKind::String)], Box::new(ty(TypeKind::Int))),
            Span::synthetic(),
            ty(TypeKind::Null),
        )
        .into_type(Span::synthetic());
        let got = func(
            vec![("fmt", TypeKind::String), ("a", TypeKind::Int), ("b", TypeKind::Int)],
            TypeKind::Null,
        );
        assert!(type_check(&got, &expected, TypeCheckOptions::default()).is_none());

        let bad = func(vec![], TypeKind::Null);
        assert!(type_check(&bad, &expected, TypeCheckOptions::default()).is_some());
    }
}
