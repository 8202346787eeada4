// Per-module analyzer state for Homescript
//
// Every module the analyzer touches (the entry module and everything it
// transitively imports) gets a [`ModuleState`]: its scope stack, function
// records, and the singleton/template/trigger tables. Module state is
// created when a module is first entered and lives until analysis returns.
//
// Cross-references between singletons, templates, functions and modules go
// exclusively through string names in these tables, never through
// pointers.

use indexmap::IndexMap;

use crate::ast::{FnModifier, TriggerConnective};
use crate::source::Span;

use super::scope::{Scope, TypeWrapper, Variable};
use super::types::Type;

/// What kind of function a record describes.
#[derive(Debug, Clone, PartialEq)]
pub enum FnKind {
    Normal { ident: String },
    Lambda,
}

impl FnKind {
    pub fn ident(&self) -> Option<&str> {
        match self {
            FnKind::Normal { ident } => Some(ident),
            FnKind::Lambda => None,
        }
    }
}

/// An analyzed function parameter.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct AnalyzedParam {
    pub ident: String,
    pub ty: Type,
    pub span: Span,
    pub is_singleton_extractor: bool,
    pub singleton_ident: Option<String>,
}

/// A function known to the current module.
#[derive(Debug, Clone)]
pub struct Function {
    pub kind: FnKind,
    pub ident_span: Span,
    pub parameters: Vec<AnalyzedParam>,
    pub params_span: Span,
    pub return_type: Type,
    pub return_span: Span,
    pub modifier: FnModifier,
    pub used: bool,
}

impl Function {
    /// Build this function's full `fn(...) -> T` type.
    pub fn as_type(&self, span: Span) -> Type {
        use super::types::{FunctionParam, FunctionType, Params};
        let params = self
            .parameters
            .iter()
            .map(|p| FunctionParam {
                name: p.ident.clone(),
                ty: p.ty.clone(),
                singleton_ident: p.singleton_ident.clone(),
            })
            .collect();
        FunctionType::new(
            Params::Normal(params),
            self.params_span.clone(),
            self.return_type.clone(),
        )
        .into_type(span)
    }
}

/// A module-scope singleton value.
#[derive(Debug, Clone)]
pub struct Singleton {
    pub ty: Type,
    pub implements: Vec<ImplBlockTemplate>,
    pub used: bool,
}

/// A template bound to a singleton by an `impl` block.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ImplBlockTemplate {
    pub template: String,
    pub template_span: Span,
    pub capabilities: Vec<String>,
}

/// One method a template requires.
#[derive(Debug, Clone)]
pub struct MethodSignature {
    /// Always a `Function`-kinded type.
    pub signature: Type,
    pub modifier: FnModifier,
}

/// A named subset of a template's methods, with optional conflicts.
#[derive(Debug, Clone, Default)]
pub struct Capability {
    pub requires_methods: Vec<String>,
    pub conflicts_with: Vec<String>,
}

/// An interface-like contract attachable to singletons.
#[derive(Debug, Clone)]
pub struct TemplateSpec {
    pub base_methods: IndexMap<String, MethodSignature>,
    pub capabilities: IndexMap<String, Capability>,
    pub default_capabilities: Vec<String>,
    pub span: Span,
}

/// A trigger imported into a module.
#[derive(Debug, Clone)]
pub struct TriggerBinding {
    /// How the trigger is fired: its parameter list is what trigger
    /// statements and annotations pass arguments to.
    pub trigger_fn_type: Type,
    /// What callback functions must look like.
    pub callback_fn_type: Type,
    pub connective: TriggerConnective,
    pub imported_at: Span,
}

impl TriggerBinding {
    /// A binding standing in for a trigger nobody could resolve.
    /// `unknown` signatures make every downstream check pass, so one
    /// failed lookup yields exactly one diagnostic.
    pub fn placeholder(span: Span) -> Self {
        Self {
            trigger_fn_type: Type::unknown(span.clone()),
            callback_fn_type: Type::unknown(span.clone()),
            connective: TriggerConnective::On,
            imported_at: span,
        }
    }
}

/// All analyzer state belonging to one module.
#[derive(Debug)]
pub struct ModuleState {
    pub filename: String,
    /// Modules this module imports, with the span of the importing
    /// statement. Drives cyclic-import detection.
    pub imports_modules: Vec<(String, Span)>,
    pub functions: Vec<Function>,
    pub scopes: Vec<Scope>,
    pub singletons: IndexMap<String, Singleton>,
    pub templates: IndexMap<String, TemplateSpec>,
    pub triggers: IndexMap<String, TriggerBinding>,
    /// Index into `functions` while a body is being walked.
    pub current_function: Option<usize>,
    pub loop_depth: u32,
    pub current_loop_is_terminated: bool,
    /// When set, expressions with an inferred `any` in their type are
    /// rejected and replaced by `unknown`.
    pub error_if_any_present: bool,
}

impl ModuleState {
    pub fn new(filename: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            imports_modules: Vec::new(),
            functions: Vec::new(),
            scopes: Vec::new(),
            singletons: IndexMap::new(),
            templates: IndexMap::new(),
            triggers: IndexMap::new(),
            current_function: None,
            loop_depth: 0,
            current_loop_is_terminated: false,
            error_if_any_present: false,
        }
    }

    // ========================================================================
    // Scope operations
    // ========================================================================

    fn innermost(&mut self) -> &mut Scope {
        self.scopes
            .last_mut()
            .expect("module has no scope; the root scope is pushed at module entry")
    }

    /// Add a value binding to the innermost scope.
    ///
    /// Without `force_add`, an existing binding wins and is returned so
    /// the caller can report a conflict. With `force_add`, the new binding
    /// replaces the old one, which is returned so the caller can emit
    /// shadowing diagnostics.
    pub fn add_var(&mut self, name: impl Into<String>, var: Variable, force_add: bool) -> Option<Variable> {
        let name = name.into();
        let scope = self.innermost();
        if let Some(existing) = scope.values.get(&name) {
            let previous = existing.clone();
            if force_add {
                scope.values.insert(name, var);
            }
            return Some(previous);
        }
        scope.values.insert(name, var);
        None
    }

    /// Look up a value binding, innermost scope first.
    pub fn get_var(&self, name: &str) -> Option<&Variable> {
        self.scopes.iter().rev().find_map(|s| s.values.get(name))
    }

    /// Like [`Self::get_var`] but mutable, so lookups can mark `used`.
    pub fn get_var_mut(&mut self, name: &str) -> Option<&mut Variable> {
        self.scopes
            .iter_mut()
            .rev()
            .find_map(|s| s.values.get_mut(name))
    }

    /// Add a type alias to the innermost scope. First writer wins; the
    /// existing record is returned on conflict.
    pub fn add_type(&mut self, name: impl Into<String>, wrapper: TypeWrapper) -> Option<TypeWrapper> {
        let name = name.into();
        let scope = self.innermost();
        if let Some(existing) = scope.types.get(&name) {
            return Some(existing.clone());
        }
        scope.types.insert(name, wrapper);
        None
    }

    pub fn get_type_mut(&mut self, name: &str) -> Option<&mut TypeWrapper> {
        self.scopes
            .iter_mut()
            .rev()
            .find_map(|s| s.types.get_mut(name))
    }

    // ========================================================================
    // Function records
    // ========================================================================

    /// Find a named function record.
    pub fn get_func(&self, ident: &str) -> Option<&Function> {
        self.functions
            .iter()
            .find(|f| f.kind.ident() == Some(ident))
    }

    pub fn get_func_mut(&mut self, ident: &str) -> Option<&mut Function> {
        self.functions
            .iter_mut()
            .find(|f| f.kind.ident() == Some(ident))
    }

    /// The function whose body is currently being walked.
    pub fn current_func(&self) -> Option<&Function> {
        self.current_function.map(|index| &self.functions[index])
    }
}

/// Search the import graph for a path that starts at `start` and returns
/// to it. On a hit, the full path is returned, e.g. `["a", "b", "a"]`.
pub fn import_graph_cycle(
    modules: &IndexMap<String, ModuleState>,
    start: &str,
) -> Option<Vec<String>> {
    let mut path = vec![start.to_string()];
    let mut visited = Vec::new();
    dfs(modules, start, start, &mut path, &mut visited).then_some(path)
}

fn dfs(
    modules: &IndexMap<String, ModuleState>,
    current: &str,
    target: &str,
    path: &mut Vec<String>,
    visited: &mut Vec<String>,
) -> bool {
    let Some(state) = modules.get(current) else {
        return false;
    };
    for (next, _) in &state.imports_modules {
        if next == target {
            path.push(next.clone());
            return true;
        }
        if visited.iter().any(|v| v == next) {
            continue;
        }
        visited.push(next.clone());
        path.push(next.clone());
        if dfs(modules, next, target, path, visited) {
            return true;
        }
        path.pop();
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::semantic::types::TypeKind;

    fn module_with_imports(imports: &[&str]) -> ModuleState {
        let mut state = ModuleState::new("test.hms");
        for import in imports {
            state
                .imports_modules
                .push((import.to_string(), Span::synthetic()));
        }
        state
    }

    #[test]
    fn test_cycle_detection() {
        let mut modules = IndexMap::new();
        modules.insert("a".to_string(), module_with_imports(&["b"]));
        modules.insert("b".to_string(), module_with_imports(&["a"]));

        let path = import_graph_cycle(&modules, "a").unwrap();
        assert_eq!(path, vec!["a", "b", "a"]);
    }

    #[test]
    fn test_no_cycle() {
        let mut modules = IndexMap::new();
        modules.insert("a".to_string(), module_with_imports(&["b"]));
        modules.insert("b".to_string(), module_with_imports(&[]));

        assert!(import_graph_cycle(&modules, "a").is_none());
    }

    #[test]
    fn test_longer_cycle() {
        let mut modules = IndexMap::new();
        modules.insert("a".to_string(), module_with_imports(&["b"]));
        modules.insert("b".to_string(), module_with_imports(&["c"]));
        modules.insert("c".to_string(), module_with_imports(&["a"]));

        let path = import_graph_cycle(&modules, "a").unwrap();
        assert_eq!(path, vec!["a", "b", "c", "a"]);
    }

    #[test]
    fn test_add_var_first_wins() {
        let mut state = ModuleState::new("test.hms");
        state.scopes.push(Scope::new());

        let int_var = Variable::builtin(Type::synthetic(TypeKind::Int));
        let bool_var = Variable::builtin(Type::synthetic(TypeKind::Bool));

        assert!(state.add_var("x", int_var, false).is_none());
        let previous = state.add_var("x", bool_var.clone(), false).unwrap();
        assert!(matches!(previous.ty.kind, TypeKind::Int));
        // Without force_add the first binding stands.
        assert!(matches!(state.get_var("x").unwrap().ty.kind, TypeKind::Int));

        // With force_add the new binding replaces it.
        let previous = state.add_var("x", bool_var, true).unwrap();
        assert!(matches!(previous.ty.kind, TypeKind::Int));
        assert!(matches!(state.get_var("x").unwrap().ty.kind, TypeKind::Bool));
    }

    #[test]
    fn test_get_var_walks_outwards() {
        let mut state = ModuleState::new("test.hms");
        state.scopes.push(Scope::new());
        state.add_var("x", Variable::builtin(Type::synthetic(TypeKind::Int)), false);
        state.scopes.push(Scope::new());
        state.add_var("x", Variable::builtin(Type::synthetic(TypeKind::Bool)), false);

        assert!(matches!(state.get_var("x").unwrap().ty.kind, TypeKind::Bool));
        state.scopes.pop();
        assert!(matches!(state.get_var("x").unwrap().ty.kind, TypeKind::Int));
    }
}
