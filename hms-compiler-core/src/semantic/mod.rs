// Semantic analysis for Homescript
//
// The analyzer consumes a parsed entry module and produces a typed AST
// for every reachable module plus a list of diagnostics. It performs name
// resolution, type inference and checking, module import resolution with
// cyclic-import detection, singleton/template/capability validation,
// trigger binding checks, and unused-name detection.
//
// Analysis is single-threaded and synchronous. One `Analyzer` owns all
// state for the duration of one `analyze` call; module recursion saves
// and restores the current-module pointer.

mod expression;
pub mod fields;
pub mod module;
pub mod scope;
mod statement;
pub mod suggest;
mod toplevel;
pub mod typecheck;
pub mod typed_ast;
pub mod types;

use indexmap::IndexMap;
use thiserror::Error;

use crate::ast;
use crate::diagnostic::{Diagnostic, Diagnostics};
use crate::source::Span;

use module::{ModuleState, TemplateSpec};
use scope::Variable;
use typed_ast::AnalyzedProgram;
use types::{FunctionParam, FunctionType, Params, Type, TypeKind};

pub use typecheck::{type_check, CompatError, TypeCheckOptions};

/// Error returned by host operations.
#[derive(Debug, Error)]
pub enum HostError {
    #[error("{0}")]
    Message(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// A trigger as described by the host.
#[derive(Debug, Clone)]
pub struct TriggerSpec {
    /// How the trigger is parameterized when registered.
    pub trigger_fn_type: Type,
    /// What callback functions must look like.
    pub callback_fn_type: Type,
    pub connective: ast::TriggerConnective,
}

/// One symbol provided by a builtin module.
#[derive(Debug, Clone)]
pub enum BuiltinImport {
    Value(Type),
    Type(Type),
    Template(TemplateSpec),
    Trigger(TriggerSpec),
}

/// Outcome of a builtin-import lookup.
#[derive(Debug, Clone)]
pub enum BuiltinImportResult {
    ModuleNotFound,
    SymbolNotFound,
    Found(BuiltinImport),
}

/// The capability object through which the analyzer reaches its embedder.
///
/// Tests provide a mock implementation with canned modules and builtins.
pub trait HostProvider {
    /// Resolve a user module to its source text. `Ok(None)` means the
    /// name does not refer to a user module (it may still be a builtin).
    fn resolve_code_module(&mut self, name: &str) -> Result<Option<String>, HostError>;

    /// Look up one symbol of a builtin module.
    fn get_builtin_import(
        &mut self,
        module: &str,
        name: &str,
        span: &Span,
        kind: ast::ImportKind,
    ) -> BuiltinImportResult;

    /// Invoked after error-free analysis; may contribute additional
    /// diagnostics.
    fn post_validation_hook(
        &mut self,
        _modules: &IndexMap<String, AnalyzedProgram>,
        _entry_module: &str,
    ) -> Vec<Diagnostic> {
        Vec::new()
    }

    /// Object-type field annotations the host understands; drives the
    /// annotation typo suggestions.
    fn known_object_field_annotations(&self) -> Vec<String> {
        Vec::new()
    }
}

/// A host that knows no modules and no builtins.
#[derive(Debug, Default)]
pub struct NullHost;

impl HostProvider for NullHost {
    fn resolve_code_module(&mut self, _name: &str) -> Result<Option<String>, HostError> {
        Ok(None)
    }

    fn get_builtin_import(
        &mut self,
        _module: &str,
        _name: &str,
        _span: &Span,
        _kind: ast::ImportKind,
    ) -> BuiltinImportResult {
        BuiltinImportResult::ModuleNotFound
    }
}

/// Everything one `analyze` call produces.
#[derive(Debug)]
pub struct AnalyzerOutput {
    /// Typed ASTs for every module that was reached.
    pub modules: IndexMap<String, AnalyzedProgram>,
    /// Semantic diagnostics in emission order.
    pub diagnostics: Vec<Diagnostic>,
    /// Parse-level errors from imported modules (separate channel).
    pub syntax_errors: Vec<Diagnostic>,
}

impl AnalyzerOutput {
    pub fn has_errors(&self) -> bool {
        !self.syntax_errors.is_empty()
            || self
                .diagnostics
                .iter()
                .any(|d| d.level == crate::diagnostic::Level::Error)
    }
}

/// Analyze a parsed entry module with the given host.
pub fn analyze<H: HostProvider>(
    entry_module: &str,
    program: &ast::Program,
    host: H,
) -> AnalyzerOutput {
    Analyzer::new(host).analyze(entry_module, program)
}

/// The semantic analyzer. Owns all per-run state.
pub struct Analyzer<H: HostProvider> {
    pub(crate) host: H,
    pub(crate) modules: IndexMap<String, ModuleState>,
    pub(crate) analyzed: IndexMap<String, AnalyzedProgram>,
    pub(crate) current_module: String,
    pub(crate) diagnostics: Diagnostics,
    pub(crate) syntax_errors: Vec<Diagnostic>,
    /// Prelude variables installed into every module's root scope.
    pub(crate) scope_additions: IndexMap<String, Variable>,
    pub(crate) known_annotations: Vec<String>,
}

impl<H: HostProvider> Analyzer<H> {
    pub fn new(host: H) -> Self {
        let known_annotations = host.known_object_field_annotations();
        Self {
            host,
            modules: IndexMap::new(),
            analyzed: IndexMap::new(),
            current_module: String::new(),
            diagnostics: Diagnostics::new(),
            syntax_errors: Vec::new(),
            scope_additions: IndexMap::new(),
            known_annotations,
        }
    }

    /// Add prelude variables visible in every module.
    pub fn with_scope_additions(mut self, additions: IndexMap<String, Variable>) -> Self {
        self.scope_additions = additions;
        self
    }

    /// Analyze the entry module and everything it imports.
    pub fn analyze(mut self, entry_module: &str, program: &ast::Program) -> AnalyzerOutput {
        self.analyze_module(entry_module, program);

        if !self.diagnostics.has_errors() && self.syntax_errors.is_empty() {
            let extra = self.host.post_validation_hook(&self.analyzed, entry_module);
            for diag in extra {
                self.diagnostics.add(diag);
            }
        }

        AnalyzerOutput {
            modules: self.analyzed,
            diagnostics: self.diagnostics.into_vec(),
            syntax_errors: self.syntax_errors,
        }
    }

    /// Analyze one module. Re-entrant: import statements call back into
    /// this for modules that have not been visited yet.
    pub(crate) fn analyze_module(&mut self, name: &str, program: &ast::Program) {
        let saved_module = std::mem::replace(&mut self.current_module, name.to_string());
        self.modules
            .insert(name.to_string(), ModuleState::new(program.filename.clone()));

        // Root scope: prelude plus the builtin `throw`.
        self.push_scope();
        let additions: Vec<(String, Variable)> = self
            .scope_additions
            .iter()
            .map(|(name, var)| (name.clone(), var.clone()))
            .collect();
        for (name, var) in additions {
            self.module_mut().add_var(name, var, false);
        }
        self.module_mut()
            .add_var("throw", Variable::builtin(throw_type()), false);

        let mut out = AnalyzedProgram::default();
        self.imports_step(program, &mut out);
        self.types_step(program, &mut out);
        self.singletons_step(program, &mut out);
        self.impl_signatures_step(program);
        self.fn_signatures_step(program);
        self.globals_step(program, &mut out);
        self.fn_bodies_step(program, &mut out);
        self.impl_bodies_step(program, &mut out);

        self.module_epilogue();

        self.analyzed.insert(name.to_string(), out);
        self.current_module = saved_module;
    }

    // ========================================================================
    // Shared plumbing
    // ========================================================================

    pub(crate) fn module(&self) -> &ModuleState {
        self.modules
            .get(&self.current_module)
            .expect("current module is registered before analysis begins")
    }

    pub(crate) fn module_mut(&mut self) -> &mut ModuleState {
        self.modules
            .get_mut(&self.current_module)
            .expect("current module is registered before analysis begins")
    }

    pub(crate) fn emit(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.add(diagnostic);
    }

    pub(crate) fn error(&mut self, message: impl Into<String>, span: Span) {
        self.diagnostics.error(message, span);
    }
}

/// `throw: fn(error: unknown) -> never`, available in every module.
fn throw_type() -> Type {
    FunctionType::new(
        Params::Normal(vec![FunctionParam::new(
            "error",
            Type::synthetic(TypeKind::Unknown),
        )]),
        Span::synthetic(),
        Type::synthetic(TypeKind::Never),
    )
    .into_type(Span::synthetic())
}

#[cfg(test)]
mod tests {
    use super::module::{Capability, MethodSignature};
    use super::*;
    use crate::diagnostic::Level;
    use crate::parser;
    use std::collections::HashMap;

    /// A canned host: user modules as source text, one builtin module
    /// (`devices`) with a value, a template and a trigger.
    #[derive(Default)]
    struct MockHost {
        modules: HashMap<String, String>,
        hook_diagnostics: Vec<Diagnostic>,
    }

    impl MockHost {
        fn with_module(mut self, name: &str, source: &str) -> Self {
            self.modules.insert(name.to_string(), source.to_string());
            self
        }
    }

    fn fn_type(params: Vec<(&str, TypeKind)>, ret: TypeKind) -> Type {
        FunctionType::new(
            Params::Normal(
                params
                    .into_iter()
                    .map(|(name, kind)| FunctionParam::new(name, Type::synthetic(kind)))
                    .collect(),
            ),
            Span::synthetic(),
            Type::synthetic(ret),
        )
        .into_type(Span::synthetic())
    }

    fn switchable_template() -> TemplateSpec {
        let mut base_methods = IndexMap::new();
        base_methods.insert(
            "set_power".to_string(),
            MethodSignature {
                signature: fn_type(vec![("power", TypeKind::Bool)], TypeKind::Null),
                modifier: ast::FnModifier::None,
            },
        );
        base_methods.insert(
            "dim".to_string(),
            MethodSignature {
                signature: fn_type(vec![("percent", TypeKind::Int)], TypeKind::Null),
                modifier: ast::FnModifier::None,
            },
        );

        let mut capabilities = IndexMap::new();
        capabilities.insert(
            "power".to_string(),
            Capability {
                requires_methods: vec!["set_power".to_string()],
                conflicts_with: vec![],
            },
        );
        capabilities.insert(
            "dimmable".to_string(),
            Capability {
                requires_methods: vec!["dim".to_string()],
                conflicts_with: vec!["fixed".to_string()],
            },
        );
        capabilities.insert(
            "fixed".to_string(),
            Capability {
                requires_methods: vec![],
                conflicts_with: vec!["dimmable".to_string()],
            },
        );

        TemplateSpec {
            base_methods,
            capabilities,
            default_capabilities: vec!["power".to_string()],
            span: Span::synthetic(),
        }
    }

    impl HostProvider for MockHost {
        fn resolve_code_module(&mut self, name: &str) -> Result<Option<String>, HostError> {
            Ok(self.modules.get(name).cloned())
        }

        fn get_builtin_import(
            &mut self,
            module: &str,
            name: &str,
            _span: &Span,
            _kind: ast::ImportKind,
        ) -> BuiltinImportResult {
            if module != "devices" {
                return BuiltinImportResult::ModuleNotFound;
            }
            match name {
                "brightness" => {
                    BuiltinImportResult::Found(BuiltinImport::Value(Type::synthetic(TypeKind::Int)))
                }
                "Switchable" => {
                    BuiltinImportResult::Found(BuiltinImport::Template(switchable_template()))
                }
                "minute" => BuiltinImportResult::Found(BuiltinImport::Trigger(TriggerSpec {
                    trigger_fn_type: fn_type(vec![("interval", TypeKind::Int)], TypeKind::Null),
                    callback_fn_type: fn_type(vec![("elapsed", TypeKind::Int)], TypeKind::Null),
                    connective: ast::TriggerConnective::Every,
                })),
                _ => BuiltinImportResult::SymbolNotFound,
            }
        }

        fn post_validation_hook(
            &mut self,
            _modules: &IndexMap<String, AnalyzedProgram>,
            _entry_module: &str,
        ) -> Vec<Diagnostic> {
            self.hook_diagnostics.clone()
        }

        fn known_object_field_annotations(&self) -> Vec<String> {
            vec!["setting".to_string()]
        }
    }

    fn analyze_with(source: &str, host: MockHost) -> AnalyzerOutput {
        let result = parser::parse(source, "main.hms");
        assert!(
            !result.diagnostics.has_errors(),
            "entry module has parse errors: {:?}",
            result.diagnostics
        );
        analyze("main", &result.program.unwrap(), host)
    }

    fn analyze_source(source: &str) -> AnalyzerOutput {
        analyze_with(source, MockHost::default())
    }

    fn errors(output: &AnalyzerOutput) -> Vec<&str> {
        output
            .diagnostics
            .iter()
            .filter(|d| d.level == Level::Error)
            .map(|d| d.message.as_str())
            .collect()
    }

    fn warnings(output: &AnalyzerOutput) -> Vec<&str> {
        output
            .diagnostics
            .iter()
            .filter(|d| d.level == Level::Warning)
            .map(|d| d.message.as_str())
            .collect()
    }

    fn assert_no_errors(output: &AnalyzerOutput) {
        assert!(
            errors(output).is_empty() && output.syntax_errors.is_empty(),
            "unexpected errors: {:?} / syntax {:?}",
            errors(output),
            output.syntax_errors
        );
    }

    // ========================================================================
    // End-to-end scenarios
    // ========================================================================

    #[test]
    fn test_missing_main() {
        let output = analyze_source("fn foo() {}");
        assert_eq!(errors(&output), vec!["Missing 'main' function"]);
        assert_eq!(warnings(&output), vec!["Function 'foo' is never used"]);
        // The missing-main error is anchored at the module's file.
        let error = output
            .diagnostics
            .iter()
            .find(|d| d.level == Level::Error)
            .unwrap();
        assert_eq!(error.span.filename, "main.hms");
    }

    #[test]
    fn test_cyclic_import() {
        let host = MockHost::default()
            .with_module("a", "import { x } from b;")
            .with_module("b", "import { x } from a;\npub let x = 1;\nfn main() {}");
        let output = analyze_with("import { y } from a;\nfn main() {}", host);

        let cycle_errors: Vec<_> = output
            .diagnostics
            .iter()
            .filter(|d| d.message.starts_with("Illegal cyclic import"))
            .collect();
        assert_eq!(cycle_errors.len(), 1);
        assert_eq!(
            cycle_errors[0].message,
            "Illegal cyclic import: module a -> b -> a"
        );
        assert_eq!(cycle_errors[0].span.filename, "a.hms");
        // Module a also lacks main.
        assert!(errors(&output)
            .iter()
            .any(|m| *m == "Missing 'main' function"));
    }

    #[test]
    fn test_unused_parameter() {
        let output = analyze_source("fn main() {}\nfn helper(x: int) -> int { 1 }");
        let warns = warnings(&output);
        assert!(warns.contains(&"Parameter 'x' is unused"));
        assert!(warns.contains(&"Function 'helper' is never used"));
        assert!(errors(&output).is_empty());
    }

    #[test]
    fn test_let_type_mismatch() {
        let output = analyze_source("fn main() { let _x: int = 'hi'; }");
        assert_eq!(
            errors(&output),
            vec!["Mismatched types: expected 'int', got 'str'"]
        );
        // A hint points at the annotation that created the expectation.
        assert!(output
            .diagnostics
            .iter()
            .any(|d| d.level == Level::Hint && d.message.contains("expected 'int'")));
    }

    #[test]
    fn test_break_outside_loop() {
        let output = analyze_source("fn main() { break; }");
        assert_eq!(
            errors(&output),
            vec!["Illegal use of 'break' outside of a loop"]
        );
    }

    #[test]
    fn test_missing_else_branch() {
        let output = analyze_source("fn main() { let _x = if true { 1 }; }");
        assert_eq!(
            errors(&output),
            vec!["Mismatched types: missing `else` branch with result type 'int'"]
        );
    }

    // ========================================================================
    // Types and inference
    // ========================================================================

    #[test]
    fn test_implicit_any_requires_annotation() {
        let output = analyze_source("fn main() { let _x = []; }");
        assert_eq!(
            errors(&output),
            vec!["Implicit '[any]' type requires an explicit type annotation"]
        );

        // With an annotation the same initializer is fine.
        let output = analyze_source("fn main() { let _x: [int] = []; }");
        assert_no_errors(&output);
    }

    #[test]
    fn test_option_construction() {
        let output = analyze_source(
            "fn main() { let x: ?int = some 5; let _y: ?int = none; if x.is_some() { x.unwrap().to_range(); } }",
        );
        assert_no_errors(&output);
    }

    #[test]
    fn test_list_element_inference() {
        let output = analyze_source("fn main() { let _x = [1, 'two']; }");
        assert_eq!(
            errors(&output),
            vec!["Mismatched types: expected 'int', got 'str'"]
        );
    }

    #[test]
    fn test_never_propagates_through_branches() {
        // Both branches diverge, so the if produces `never` and the
        // trailing int return type is still satisfied.
        let output = analyze_source(
            "fn main() { let _x = classify(3); }\n\
             fn classify(n: int) -> int {\n\
                 if n < 0 { return 0-n; } else { return n; }\n\
             }",
        );
        assert_no_errors(&output);
    }

    #[test]
    fn test_loop_termination() {
        // An unbroken `loop` diverges; code after it is fine and the
        // function never returns.
        let output = analyze_source("fn main() { run(); }\nfn run() { loop { tick(); } }\nfn tick() {}");
        assert_no_errors(&output);
    }

    #[test]
    fn test_match_requires_default_for_valued_result() {
        let output = analyze_source(
            "fn main() { let _x = match 1 { 0 => 'zero', 1 => 'one', }; }",
        );
        assert!(errors(&output)
            .iter()
            .any(|m| m.starts_with("Non-exhaustive match")));

        let output = analyze_source(
            "fn main() { let _x = match 1 { 0 => 'zero', _ => 'other', }; }",
        );
        assert_no_errors(&output);
    }

    #[test]
    fn test_match_arm_after_default_is_unreachable() {
        let output = analyze_source(
            "fn main() { let _x = match 1 { _ => 'other', 1 => 'one', }; }",
        );
        assert!(warnings(&output).contains(&"Unreachable match arm"));
    }

    #[test]
    fn test_try_catch_binds_error_record() {
        let output = analyze_source(
            "fn main() { let _x = try { risky() } catch err { err.message.len() }; }\n\
             fn risky() -> int { throw('boom'); 0 }",
        );
        assert_no_errors(&output);
    }

    #[test]
    fn test_spawn_wraps_result_in_handle() {
        let output = analyze_source(
            "fn main() { let handle = spawn work(2); let _r: int = handle.join(); }\n\
             fn work(n: int) -> int { n * 2 }",
        );
        assert_no_errors(&output);
    }

    #[test]
    fn test_spawn_rejects_function_arguments() {
        let output = analyze_source(
            "fn main() { spawn apply(fn() -> int { 1 }); }\n\
             fn apply(f: fn() -> int) -> int { f() }",
        );
        assert!(errors(&output)
            .contains(&"Function values cannot be passed to a spawned call"));
    }

    #[test]
    fn test_cast_rules() {
        let output = analyze_source("fn main() { let _a = 1 as float; let _b = true as int; }");
        assert_no_errors(&output);

        let output = analyze_source("fn main() { let _f = main as fn() -> null; }");
        assert!(errors(&output).contains(&"Cannot cast a function value at runtime"));
    }

    #[test]
    fn test_global_requires_constant_initializer() {
        let output = analyze_source("let limit = compute();\nfn compute() -> int { 1 }\nfn main() { let _x = limit; }");
        assert!(errors(&output).contains(&"Global values must have a constant initializer"));

        let output = analyze_source("pub let limit = 2 * 60;\nfn main() { let _x = limit; }");
        assert_no_errors(&output);
    }

    // ========================================================================
    // Imports and modules
    // ========================================================================

    #[test]
    fn test_import_from_user_module() {
        let host = MockHost::default().with_module(
            "lib",
            "pub fn double(n: int) -> int { n * 2 }\npub type Pair = { a: int, b: int };\nfn main() {}",
        );
        let output = analyze_with(
            "import { double, type Pair } from lib;\n\
             fn main() { let _p: Pair = new { a: 1, b: double(2) }; }",
            host,
        );
        assert_no_errors(&output);
    }

    #[test]
    fn test_import_private_symbol() {
        let host = MockHost::default()
            .with_module("lib", "fn helper() {}\nfn main() { helper(); }");
        let output = analyze_with("import { helper } from lib;\nfn main() { helper(); }", host);
        assert!(errors(&output).contains(&"'helper' is private in module 'lib'"));
    }

    #[test]
    fn test_unknown_module() {
        let output = analyze_source("import { x } from nowhere;\nfn main() { let _a = x; }");
        assert!(errors(&output).contains(&"Module 'nowhere' not found"));
        // The failed import still resolves to an unknown-typed entry, so
        // its use produces no second error.
        assert_eq!(errors(&output).len(), 1);
    }

    #[test]
    fn test_builtin_value_import() {
        let output = analyze_source(
            "import { brightness } from devices;\nfn main() { let _b: int = brightness; }",
        );
        assert_no_errors(&output);
    }

    #[test]
    fn test_unused_import_warning() {
        let host = MockHost::default()
            .with_module("lib", "pub let x = 1;\nfn main() {}");
        let output = analyze_with("import { x } from lib;\nfn main() {}", host);
        assert!(warnings(&output).contains(&"Import 'x' is unused"));
    }

    // ========================================================================
    // Singletons, templates, impl blocks
    // ========================================================================

    const LAMP_PRELUDE: &str = "import { templ Switchable } from devices;\n\
         singleton @lamp: { on: bool };\n";

    #[test]
    fn test_impl_with_default_capabilities() {
        let source = format!(
            "{LAMP_PRELUDE}\
             impl Switchable for @lamp {{\n\
                 fn set_power(self: @lamp, power: bool) {{ update(power); }}\n\
             }}\n\
             fn update(_state: bool) {{}}\n\
             fn main() {{}}"
        );
        let output = analyze_source(&source);
        assert_no_errors(&output);
    }

    #[test]
    fn test_impl_missing_method() {
        let source = format!("{LAMP_PRELUDE}impl Switchable for @lamp {{}}\nfn main() {{}}");
        let output = analyze_source(&source);
        let missing: Vec<_> = output
            .diagnostics
            .iter()
            .filter(|d| d.message.starts_with("Missing method 'set_power'"))
            .collect();
        assert_eq!(missing.len(), 1);
        // The error carries a ready-to-paste signature.
        assert!(missing[0].notes[0].contains("fn set_power(power: bool)"));
    }

    #[test]
    fn test_impl_method_must_extract_singleton() {
        let source = format!(
            "{LAMP_PRELUDE}\
             impl Switchable for @lamp {{\n\
                 fn set_power(power: bool) {{}}\n\
             }}\n\
             fn main() {{}}"
        );
        let output = analyze_source(&source);
        assert!(errors(&output)
            .iter()
            .any(|m| m.starts_with("Method 'set_power' must extract '@lamp'")));
    }

    #[test]
    fn test_impl_capability_conflict() {
        let source = format!(
            "{LAMP_PRELUDE}\
             impl Switchable(dimmable, fixed) for @lamp {{\n\
                 fn set_power(self: @lamp, power: bool) {{}}\n\
                 fn dim(self: @lamp, percent: int) {{}}\n\
             }}\n\
             fn main() {{}}"
        );
        let output = analyze_source(&source);
        let conflicts: Vec<_> = errors(&output)
            .into_iter()
            .filter(|m| m.starts_with("Capabilities 'dimmable' and 'fixed'"))
            .collect();
        // Reported once per unordered pair.
        assert_eq!(conflicts.len(), 1);
    }

    #[test]
    fn test_impl_excess_method() {
        let source = format!(
            "{LAMP_PRELUDE}\
             impl Switchable for @lamp {{\n\
                 fn set_power(self: @lamp, power: bool) {{}}\n\
                 fn dim(self: @lamp, percent: int) {{}}\n\
             }}\n\
             fn main() {{}}"
        );
        let output = analyze_source(&source);
        assert!(errors(&output)
            .iter()
            .any(|m| m.starts_with("Method 'dim' is not required")));
    }

    #[test]
    fn test_unknown_template_has_import_hint() {
        let output = analyze_source(
            "singleton @lamp: { on: bool };\nimpl Gone for @lamp {}\nfn main() {}",
        );
        let diag = output
            .diagnostics
            .iter()
            .find(|d| d.message == "Undefined template 'Gone'")
            .unwrap();
        assert!(diag.notes[0].contains("import { templ Gone }"));
    }

    // ========================================================================
    // Triggers
    // ========================================================================

    #[test]
    fn test_trigger_annotation() {
        let output = analyze_source(
            "import { trigger minute } from devices;\n\
             #[trigger every minute(10)]\n\
             event fn tick(elapsed: int) { elapsed.to_range(); }\n\
             fn main() {}",
        );
        assert_no_errors(&output);
        // The callback is flagged used by the annotation.
        assert!(!warnings(&output)
            .iter()
            .any(|m| m.contains("'tick' is never used")));
    }

    #[test]
    fn test_trigger_annotation_requires_event_modifier() {
        let output = analyze_source(
            "import { trigger minute } from devices;\n\
             #[trigger every minute(10)]\n\
             fn tick(elapsed: int) { let _e = elapsed; }\n\
             fn main() {}",
        );
        assert!(errors(&output)
            .contains(&"'trigger' annotations require the 'event' modifier"));
    }

    #[test]
    fn test_trigger_connective_mismatch() {
        let output = analyze_source(
            "import { trigger minute } from devices;\n\
             #[trigger on minute(10)]\n\
             event fn tick(elapsed: int) { let _e = elapsed; }\n\
             fn main() {}",
        );
        assert!(errors(&output)
            .iter()
            .any(|m| m.starts_with("Trigger 'minute' must be used with the 'every' connective")));
    }

    #[test]
    fn test_trigger_statement() {
        let output = analyze_source(
            "import { trigger minute } from devices;\n\
             event fn on_tick(elapsed: int) { let _e = elapsed; }\n\
             fn main() { trigger on_tick every minute(5); }",
        );
        assert_no_errors(&output);
    }

    #[test]
    fn test_trigger_argument_mismatch() {
        let output = analyze_source(
            "import { trigger minute } from devices;\n\
             event fn on_tick(elapsed: int) { let _e = elapsed; }\n\
             fn main() { trigger on_tick every minute('soon'); }",
        );
        assert!(errors(&output)
            .iter()
            .any(|m| m.starts_with("invalid trigger argument")));
    }

    #[test]
    fn test_unknown_trigger_inserts_placeholder() {
        let output = analyze_source(
            "event fn on_tick() {}\n\
             fn main() { trigger on_tick every whenever(); trigger on_tick every whenever(); }",
        );
        // One undefined-trigger error for the first use; the placeholder
        // absorbs the second.
        let undefined: Vec<_> = errors(&output)
            .into_iter()
            .filter(|m| m.starts_with("Undefined trigger"))
            .collect();
        assert_eq!(undefined.len(), 1);
    }

    // ========================================================================
    // Annotations and misc
    // ========================================================================

    #[test]
    fn test_allow_unused_annotation() {
        let output = analyze_source("#[allow_unused]\nfn helper() {}\nfn main() {}");
        assert!(!warnings(&output)
            .iter()
            .any(|m| m.contains("'helper' is never used")));
    }

    #[test]
    fn test_unknown_annotation_suggestion() {
        let output = analyze_source("#[alow_unused]\nfn helper() {}\nfn main() { helper(); }");
        let diag = output
            .diagnostics
            .iter()
            .find(|d| d.message == "Unknown function annotation 'alow_unused'")
            .unwrap();
        assert!(diag.notes[0].contains("allow_unused"));
    }

    #[test]
    fn test_field_annotation_checked_against_host_list() {
        let output = analyze_source(
            "type Config = { #setting power: bool };\n\
             fn main() { let _c: Config = new { power: true }; }",
        );
        assert_no_errors(&output);

        let output = analyze_source(
            "type Config = { #settings power: bool };\n\
             fn main() { let _c: Config = new { power: true }; }",
        );
        let diag = output
            .diagnostics
            .iter()
            .find(|d| d.message == "Unknown field annotation 'settings'")
            .unwrap();
        assert!(diag.notes[0].contains("setting"));
    }

    #[test]
    fn test_recursion_does_not_mark_used() {
        let output = analyze_source("fn countdown(n: int) { if n > 0 { countdown(n - 1); } }\nfn main() {}");
        assert!(warnings(&output).contains(&"Function 'countdown' is never used"));
    }

    #[test]
    fn test_shadowing_local_does_not_mark_function_used() {
        // `helper` in main resolves to the shadowing local, not to the
        // function, which therefore stays unused.
        let output = analyze_source("fn helper() {}\nfn main() { let helper = 5; let _y = helper; }");
        assert!(warnings(&output).contains(&"Function 'helper' is never used"));
    }

    #[test]
    fn test_post_validation_hook_runs_only_without_errors() {
        let mut host = MockHost::default();
        host.hook_diagnostics = vec![Diagnostic::info(
            "hook ran",
            Span::file("main.hms"),
        )];
        let output = analyze_with("fn main() {}", host);
        assert!(output.diagnostics.iter().any(|d| d.message == "hook ran"));

        let mut host = MockHost::default();
        host.hook_diagnostics = vec![Diagnostic::info(
            "hook ran",
            Span::file("main.hms"),
        )];
        let output = analyze_with("fn main() { break; }", host);
        assert!(!output.diagnostics.iter().any(|d| d.message == "hook ran"));
    }

    #[test]
    fn test_varargs_prelude_function() {
        let result = parser::parse("fn main() { log('a', 1, true); log(); }", "main.hms");
        assert!(!result.diagnostics.has_errors());

        let log_type = FunctionType::new(
            Params::VarArgs(vec![], Box::new(Type::synthetic(TypeKind::Any))),
            Span::synthetic(),
            Type::synthetic(TypeKind::Null),
        )
        .into_type(Span::synthetic());
        let mut additions = IndexMap::new();
        additions.insert("log".to_string(), Variable::builtin(log_type));

        let output = Analyzer::new(MockHost::default())
            .with_scope_additions(additions)
            .analyze("main", &result.program.unwrap());
        assert_no_errors(&output);
    }

    #[test]
    fn test_reanalysis_is_deterministic() {
        let source = "import { templ Switchable, trigger minute } from devices;\n\
             singleton @lamp: { on: bool };\n\
             impl Switchable for @lamp { fn set_power(self: @lamp, power: bool) {} }\n\
             #[trigger every minute(1)]\n\
             event fn tick(elapsed: int) { let _e = elapsed; }\n\
             fn unused_helper() {}\n\
             fn main() { let _x = if true { 1 } else { 2 }; }";

        let first = analyze_source(source);
        let second = analyze_source(source);
        assert_eq!(first.diagnostics, second.diagnostics);
        assert_eq!(first.modules.len(), second.modules.len());
    }

    #[test]
    fn test_imported_module_requires_main() {
        // Imported modules are held to the same rules as the entry module;
        // a library without `main` reports it at the library's file.
        let host = MockHost::default().with_module("lib", "pub let x = 1;");
        let output = analyze_with("import { x } from lib;\nfn main() { let _a = x; }", host);
        let missing: Vec<_> = output
            .diagnostics
            .iter()
            .filter(|d| d.message == "Missing 'main' function")
            .collect();
        assert_eq!(missing.len(), 1);
        assert_eq!(missing[0].span.filename, "lib.hms");
    }
}
