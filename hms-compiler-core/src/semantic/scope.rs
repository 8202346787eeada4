// Scope stack and symbol records for Homescript semantic analysis
//
// A module owns a stack of scopes; lookup walks from the innermost scope
// outwards. Scopes are swept when popped: every value and type alias that
// was never referenced produces an unused-name warning.

use indexmap::IndexMap;

use crate::diagnostic::Diagnostic;
use crate::source::Span;

use super::types::Type;
use super::{Analyzer, HostProvider};

/// Where a variable binding came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VariableOrigin {
    /// A `let` binding.
    Normal,
    /// A function or lambda parameter.
    Parameter,
    /// Installed by an `import` statement.
    Imported,
    /// Provided by the prelude or the host; exempt from unused checks.
    Builtin,
}

/// A value binding in a scope.
#[derive(Debug, Clone)]
pub struct Variable {
    pub ty: Type,
    pub decl_span: Span,
    pub used: bool,
    pub origin: VariableOrigin,
    pub is_pub: bool,
}

impl Variable {
    pub fn new(ty: Type, decl_span: Span, origin: VariableOrigin) -> Self {
        Self {
            ty,
            decl_span,
            used: false,
            origin,
            is_pub: false,
        }
    }

    pub fn declared(ty: Type, decl_span: Span, is_pub: bool) -> Self {
        Self {
            ty,
            decl_span,
            used: false,
            origin: VariableOrigin::Normal,
            is_pub,
        }
    }

    pub fn parameter(ty: Type, decl_span: Span) -> Self {
        Self::new(ty, decl_span, VariableOrigin::Parameter)
    }

    pub fn imported(ty: Type, decl_span: Span) -> Self {
        Self::new(ty, decl_span, VariableOrigin::Imported)
    }

    pub fn builtin(ty: Type) -> Self {
        Self::new(ty, Span::synthetic(), VariableOrigin::Builtin)
    }
}

/// A user type alias stored in the type scope.
#[derive(Debug, Clone)]
pub struct TypeWrapper {
    pub ty: Type,
    pub is_pub: bool,
    pub name_span: Span,
    pub used: bool,
}

impl TypeWrapper {
    pub fn new(ty: Type, is_pub: bool, name_span: Span) -> Self {
        Self {
            ty,
            is_pub,
            name_span,
            used: false,
        }
    }
}

/// One level of the scope stack.
#[derive(Debug, Clone, Default)]
pub struct Scope {
    pub values: IndexMap<String, Variable>,
    pub types: IndexMap<String, TypeWrapper>,
}

impl Scope {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<H: HostProvider> Analyzer<H> {
    pub(crate) fn push_scope(&mut self) {
        self.module_mut().scopes.push(Scope::new());
    }

    /// Pop the innermost scope, sweeping it for unused names.
    pub(crate) fn pop_scope(&mut self) {
        let scope = self
            .module_mut()
            .scopes
            .pop()
            .expect("pop_scope called with an empty scope stack");
        self.sweep_scope(&scope);
    }

    /// Emit unused-name warnings for everything in `scope`.
    ///
    /// Also used on the root scope at the end of module analysis, which is
    /// swept without being removed.
    pub(crate) fn sweep_scope(&mut self, scope: &Scope) {
        for (name, variable) in &scope.values {
            if variable.used || variable.is_pub || name.starts_with('_') {
                continue;
            }
            let diag = match variable.origin {
                VariableOrigin::Builtin => continue,
                VariableOrigin::Imported => Diagnostic::warning(
                    format!("Import '{name}' is unused"),
                    variable.decl_span.clone(),
                ),
                VariableOrigin::Normal => Diagnostic::warning(
                    format!("Variable '{name}' is unused"),
                    variable.decl_span.clone(),
                )
                .with_note(format!("if this is intentional, rename it to '_{name}'")),
                VariableOrigin::Parameter => Diagnostic::warning(
                    format!("Parameter '{name}' is unused"),
                    variable.decl_span.clone(),
                )
                .with_note(format!("if this is intentional, rename it to '_{name}'")),
            };
            self.emit(diag);
        }

        for (name, wrapper) in &scope.types {
            if wrapper.used || wrapper.is_pub || name.starts_with('_') {
                continue;
            }
            self.emit(Diagnostic::warning(
                format!("Type '{name}' is unused"),
                wrapper.name_span.clone(),
            ));
        }
    }
}
