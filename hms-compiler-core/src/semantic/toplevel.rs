// Top-level analysis for Homescript modules
//
// Implements the fixed per-module pass order: imports, type definitions,
// singletons, impl-block signatures, function signatures, globals,
// function bodies, impl-block bodies. Signature hoisting makes every
// function callable before any body is walked.

use crate::ast;
use crate::diagnostic::Diagnostic;
use crate::parser;
use crate::source::Span;

use super::module::{
    AnalyzedParam, FnKind, Function, MethodSignature, Singleton, TriggerBinding,
};
use super::scope::{TypeWrapper, Variable};
use super::typecheck::{type_check, TypeCheckOptions};
use super::typed_ast::*;
use super::types::{Params, Type, TypeKind};
use super::{Analyzer, BuiltinImport, BuiltinImportResult, HostProvider};

impl<H: HostProvider> Analyzer<H> {
    // ========================================================================
    // Step (a): imports
    // ========================================================================

    pub(crate) fn imports_step(&mut self, program: &ast::Program, out: &mut AnalyzedProgram) {
        for item in &program.items {
            if let ast::Item::Import(import) = item {
                let analyzed = self.import_stmt(import);
                out.imports.push(analyzed);
            }
        }
    }

    fn import_stmt(&mut self, node: &ast::ImportStmt) -> AnalyzedImport {
        let module = node.module.name.clone();
        self.module_mut()
            .imports_modules
            .push((module.clone(), node.span.clone()));

        let resolved = self.host.resolve_code_module(&module);
        let items = match resolved {
            Err(err) => {
                self.error(
                    format!("Cannot resolve module '{module}': {err}"),
                    node.module.span.clone(),
                );
                self.dummy_import_items(node)
            }
            Ok(Some(source)) => self.import_from_code_module(node, &module, &source),
            Ok(None) => self.import_from_builtin_module(node, &module),
        };

        AnalyzedImport {
            module,
            items,
            span: node.span.clone(),
        }
    }

    /// Import from a user module the host resolved to source text.
    fn import_from_code_module(
        &mut self,
        node: &ast::ImportStmt,
        module: &str,
        source: &str,
    ) -> Vec<AnalyzedImportItem> {
        if !self.modules.contains_key(module) {
            let result = parser::parse(source, format!("{module}.hms"));
            for diag in result.diagnostics {
                self.syntax_errors.push(diag);
            }
            let Some(program) = result.program else {
                // Unrecoverable parse failure: degrade to dummy entries so
                // analysis of this module can proceed.
                return self.dummy_import_items(node);
            };

            self.analyze_module(module, &program);

            if let Some(path) = super::module::import_graph_cycle(&self.modules, &self.current_module)
            {
                self.error(
                    format!("Illegal cyclic import: module {}", path.join(" -> ")),
                    node.span.clone(),
                );
            }
        }

        node.items
            .iter()
            .map(|item| self.install_code_import(module, item))
            .collect()
    }

    fn install_code_import(
        &mut self,
        module: &str,
        item: &ast::ImportItem,
    ) -> AnalyzedImportItem {
        let name = &item.name.name;
        let span = &item.name.span;

        // A module that is still mid-analysis (cyclic import) has not
        // registered its symbols yet; failed lookups into it degrade
        // silently so the cycle error stands alone.
        let target_in_progress = !self.analyzed.contains_key(module);

        match item.kind {
            ast::ImportKind::Normal => {
                let target = self
                    .modules
                    .get(module)
                    .expect("imported module was analyzed above");

                let resolved = if let Some(func) = target.get_func(name) {
                    if func.modifier == ast::FnModifier::Pub {
                        Some(func.as_type(span.clone()))
                    } else {
                        None
                    }
                } else {
                    target
                        .scopes
                        .first()
                        .and_then(|root| root.values.get(name))
                        .filter(|var| var.is_pub)
                        .map(|var| var.ty.set_span(span.clone()))
                };

                let ty = match resolved {
                    Some(ty) => ty,
                    None => {
                        if !target_in_progress {
                            self.report_failed_value_import(module, item);
                        }
                        Type::unknown(span.clone())
                    }
                };
                self.install_imported_value(name, span, ty.clone());
                AnalyzedImportItem {
                    name: name.clone(),
                    kind: item.kind,
                    ty,
                }
            }
            ast::ImportKind::Type => {
                let target = self
                    .modules
                    .get(module)
                    .expect("imported module was analyzed above");

                let resolved = target
                    .scopes
                    .first()
                    .and_then(|root| root.types.get(name))
                    .filter(|wrapper| wrapper.is_pub)
                    .map(|wrapper| wrapper.ty.set_span(span.clone()));

                let ty = match resolved {
                    Some(ty) => ty,
                    None => {
                        if !target_in_progress {
                            self.error(
                                format!("Module '{module}' has no public type '{name}'"),
                                span.clone(),
                            );
                        }
                        Type::unknown(span.clone())
                    }
                };
                self.install_imported_type(name, span, ty.clone());
                AnalyzedImportItem {
                    name: name.clone(),
                    kind: item.kind,
                    ty,
                }
            }
            ast::ImportKind::Template => {
                let template = self
                    .modules
                    .get(module)
                    .and_then(|target| target.templates.get(name))
                    .cloned();

                match template {
                    Some(spec) => {
                        if self.module().templates.contains_key(name) {
                            self.error(
                                format!("Template '{name}' is already defined in this module"),
                                span.clone(),
                            );
                        } else {
                            self.module_mut().templates.insert(name.clone(), spec);
                        }
                    }
                    None => {
                        if !target_in_progress {
                            self.error(
                                format!("Module '{module}' has no template '{name}'"),
                                span.clone(),
                            );
                        }
                    }
                }
                AnalyzedImportItem {
                    name: name.clone(),
                    kind: item.kind,
                    ty: Type::unknown(span.clone()),
                }
            }
            ast::ImportKind::Trigger => {
                let binding = self
                    .modules
                    .get(module)
                    .and_then(|target| target.triggers.get(name))
                    .cloned();

                let ty = match binding {
                    Some(mut binding) => {
                        binding.imported_at = span.clone();
                        let ty = binding.callback_fn_type.clone();
                        self.install_trigger(name, span, binding);
                        ty
                    }
                    None => {
                        if !target_in_progress {
                            self.error(
                                format!("Module '{module}' has no trigger '{name}'"),
                                span.clone(),
                            );
                        }
                        self.install_trigger(name, span, TriggerBinding::placeholder(span.clone()));
                        Type::unknown(span.clone())
                    }
                };
                AnalyzedImportItem {
                    name: name.clone(),
                    kind: item.kind,
                    ty,
                }
            }
        }
    }

    fn report_failed_value_import(&mut self, module: &str, item: &ast::ImportItem) {
        let name = &item.name.name;
        let span = item.name.span.clone();
        let target = self
            .modules
            .get(module)
            .expect("imported module was analyzed above");

        if let Some(func) = target.get_func(name) {
            if func.modifier != ast::FnModifier::Pub {
                self.emit(
                    Diagnostic::error(format!("'{name}' is private in module '{module}'"), span)
                        .with_note("declare it 'pub' to export it"),
                );
                return;
            }
        }
        if let Some(root) = target.scopes.first() {
            if root.values.contains_key(name) {
                self.emit(
                    Diagnostic::error(format!("'{name}' is private in module '{module}'"), span)
                        .with_note("declare it 'pub' to export it"),
                );
                return;
            }
            if root.types.contains_key(name) {
                self.emit(
                    Diagnostic::error(
                        format!("'{name}' is a type in module '{module}'"),
                        span,
                    )
                    .with_note(format!("import it as 'type {name}'")),
                );
                return;
            }
        }
        self.error(
            format!("Module '{module}' has no member '{name}'"),
            item.name.span.clone(),
        );
    }

    /// Import from a host builtin module (no source text).
    fn import_from_builtin_module(
        &mut self,
        node: &ast::ImportStmt,
        module: &str,
    ) -> Vec<AnalyzedImportItem> {
        let mut module_not_found_reported = false;
        let mut items = Vec::with_capacity(node.items.len());

        for item in &node.items {
            let name = &item.name.name;
            let span = &item.name.span;
            let result = self
                .host
                .get_builtin_import(module, name, span, item.kind);

            let ty = match result {
                BuiltinImportResult::ModuleNotFound => {
                    if !module_not_found_reported {
                        self.error(
                            format!("Module '{module}' not found"),
                            node.module.span.clone(),
                        );
                        module_not_found_reported = true;
                    }
                    self.install_unknown_import(item);
                    Type::unknown(span.clone())
                }
                BuiltinImportResult::SymbolNotFound => {
                    self.error(
                        format!("Module '{module}' has no member '{name}'"),
                        span.clone(),
                    );
                    self.install_unknown_import(item);
                    Type::unknown(span.clone())
                }
                BuiltinImportResult::Found(builtin) => {
                    self.install_builtin_import(item, builtin)
                }
            };

            items.push(AnalyzedImportItem {
                name: name.clone(),
                kind: item.kind,
                ty,
            });
        }

        items
    }

    fn install_builtin_import(&mut self, item: &ast::ImportItem, builtin: BuiltinImport) -> Type {
        let name = &item.name.name;
        let span = &item.name.span;

        match (item.kind, builtin) {
            (ast::ImportKind::Normal, BuiltinImport::Value(ty)) => {
                let ty = ty.set_span(span.clone());
                self.install_imported_value(name, span, ty.clone());
                ty
            }
            (ast::ImportKind::Type, BuiltinImport::Type(ty)) => {
                let ty = ty.set_span(span.clone());
                self.install_imported_type(name, span, ty.clone());
                ty
            }
            (ast::ImportKind::Template, BuiltinImport::Template(spec)) => {
                if self.module().templates.contains_key(name) {
                    self.error(
                        format!("Template '{name}' is already defined in this module"),
                        span.clone(),
                    );
                } else {
                    self.module_mut().templates.insert(name.clone(), spec);
                }
                Type::unknown(span.clone())
            }
            (ast::ImportKind::Trigger, BuiltinImport::Trigger(spec)) => {
                let binding = TriggerBinding {
                    trigger_fn_type: spec.trigger_fn_type,
                    callback_fn_type: spec.callback_fn_type.clone(),
                    connective: spec.connective,
                    imported_at: span.clone(),
                };
                self.install_trigger(name, span, binding);
                spec.callback_fn_type
            }
            (kind, _) => {
                self.error(
                    format!("'{name}' cannot be imported as a {}", kind.as_str()),
                    span.clone(),
                );
                self.install_unknown_import(item);
                Type::unknown(span.clone())
            }
        }
    }

    fn install_imported_value(&mut self, name: &str, span: &Span, ty: Type) {
        let var = Variable::imported(ty, span.clone());
        if self.module_mut().add_var(name.to_string(), var, false).is_some() {
            self.error(
                format!("'{name}' is already defined in this module"),
                span.clone(),
            );
        }
    }

    fn install_imported_type(&mut self, name: &str, span: &Span, ty: Type) {
        let wrapper = TypeWrapper::new(ty, false, span.clone());
        if self.module_mut().add_type(name.to_string(), wrapper).is_some() {
            self.error(
                format!("Type '{name}' is already defined in this module"),
                span.clone(),
            );
        }
    }

    fn install_trigger(&mut self, name: &str, span: &Span, binding: TriggerBinding) {
        if self.module().triggers.contains_key(name) {
            self.error(
                format!("Trigger '{name}' is already defined in this module"),
                span.clone(),
            );
        } else {
            self.module_mut().triggers.insert(name.to_string(), binding);
        }
    }

    /// Insert an `unknown`-typed entry for a failed import so later
    /// references resolve instead of cascading.
    fn install_unknown_import(&mut self, item: &ast::ImportItem) {
        let name = &item.name.name;
        let span = &item.name.span;
        match item.kind {
            ast::ImportKind::Normal => {
                let var = Variable::imported(Type::unknown(span.clone()), span.clone());
                self.module_mut().add_var(name.clone(), var, false);
            }
            ast::ImportKind::Type => {
                let wrapper = TypeWrapper::new(Type::unknown(span.clone()), false, span.clone());
                self.module_mut().add_type(name.clone(), wrapper);
            }
            ast::ImportKind::Template => {}
            ast::ImportKind::Trigger => {
                if !self.module().triggers.contains_key(name) {
                    self.module_mut()
                        .triggers
                        .insert(name.clone(), TriggerBinding::placeholder(span.clone()));
                }
            }
        }
    }

    fn dummy_import_items(&mut self, node: &ast::ImportStmt) -> Vec<AnalyzedImportItem> {
        node.items
            .iter()
            .map(|item| {
                self.install_unknown_import(item);
                AnalyzedImportItem {
                    name: item.name.name.clone(),
                    kind: item.kind,
                    ty: Type::unknown(item.name.span.clone()),
                }
            })
            .collect()
    }

    // ========================================================================
    // Steps (b) and (c): type definitions and singletons
    // ========================================================================

    pub(crate) fn types_step(&mut self, program: &ast::Program, out: &mut AnalyzedProgram) {
        for item in &program.items {
            if let ast::Item::TypeDef(def) = item {
                let ty = self.convert_type(&def.rhs, true);
                let wrapper = TypeWrapper::new(ty.clone(), def.is_pub, def.name.span.clone());
                if self.module_mut().add_type(def.name.name.clone(), wrapper).is_some() {
                    self.error(
                        format!("Type '{}' is already defined in this module", def.name.name),
                        def.name.span.clone(),
                    );
                }
                out.types.push(AnalyzedTypeDef {
                    name: def.name.name.clone(),
                    ty,
                    is_pub: def.is_pub,
                    span: def.span.clone(),
                });
            }
        }
    }

    pub(crate) fn singletons_step(&mut self, program: &ast::Program, out: &mut AnalyzedProgram) {
        for item in &program.items {
            if let ast::Item::Singleton(decl) = item {
                let ty = self.convert_type(&decl.type_expr, true);
                if self.module().singletons.contains_key(&decl.name.name) {
                    self.error(
                        format!("Singleton '{}' is already declared", decl.name.name),
                        decl.name.span.clone(),
                    );
                } else {
                    self.module_mut().singletons.insert(
                        decl.name.name.clone(),
                        Singleton {
                            ty: ty.clone(),
                            implements: Vec::new(),
                            used: false,
                        },
                    );
                }
                out.singletons.push(AnalyzedSingleton {
                    name: decl.name.name.clone(),
                    ty,
                    span: decl.span.clone(),
                });
            }
        }
    }

    // ========================================================================
    // Steps (d) and (e): signature hoisting
    // ========================================================================

    /// Convert impl-block method signatures with diagnostics suppressed.
    /// The real validation happens in step (h); this pass only marks the
    /// referenced types and singletons used early.
    pub(crate) fn impl_signatures_step(&mut self, program: &ast::Program) {
        for item in &program.items {
            if let ast::Item::Impl(block) = item {
                for method in &block.methods {
                    self.analyze_params(&method.params, false, false);
                    if let Some(ret) = &method.return_type {
                        self.convert_type(ret, false);
                    }
                }
            }
        }
    }

    pub(crate) fn fn_signatures_step(&mut self, program: &ast::Program) {
        for item in &program.items {
            if let ast::Item::Fn(def) = item {
                self.fn_signature(def);
            }
        }
    }

    /// Convert a parameter list, detecting duplicate names and duplicate
    /// singleton extractions. `create_errors` gates type-conversion
    /// diagnostics, `report_duplicates` gates the duplicate checks; the
    /// two differ because signatures are visited twice (hoisting, body).
    pub(crate) fn analyze_params(
        &mut self,
        params: &[ast::Param],
        create_errors: bool,
        report_duplicates: bool,
    ) -> Vec<AnalyzedParam> {
        let mut analyzed: Vec<AnalyzedParam> = Vec::with_capacity(params.len());

        for param in params {
            if report_duplicates {
                if analyzed.iter().any(|p| p.ident == param.name.name) {
                    self.error(
                        format!("Duplicate parameter '{}'", param.name.name),
                        param.name.span.clone(),
                    );
                }
            }

            let singleton_ident = match &param.type_expr {
                ast::TypeExpr::Singleton(ident) => Some(ident.name.clone()),
                _ => None,
            };
            if report_duplicates {
                if let Some(singleton) = &singleton_ident {
                    let duplicate = analyzed
                        .iter()
                        .any(|p| p.singleton_ident.as_deref() == Some(singleton.as_str()));
                    if duplicate {
                        self.error(
                            format!("Duplicate singleton extraction of '{singleton}'"),
                            param.name.span.clone(),
                        );
                    }
                }
            }

            let ty = self.convert_type(&param.type_expr, create_errors);
            analyzed.push(AnalyzedParam {
                ident: param.name.name.clone(),
                ty,
                span: param.name.span.clone(),
                is_singleton_extractor: singleton_ident.is_some(),
                singleton_ident,
            });
        }

        analyzed
    }

    fn fn_signature(&mut self, def: &ast::FnDef) {
        let parameters = self.analyze_params(&def.params, false, true);
        let return_type = match &def.return_type {
            Some(annotation) => self.convert_type(annotation, false),
            None => Type::new(TypeKind::Null, def.return_span()),
        };

        if def.name.name == "main" {
            let visible_params = parameters
                .iter()
                .filter(|p| !p.is_singleton_extractor)
                .count();
            if visible_params > 0 {
                self.error(
                    "The 'main' function must not take parameters",
                    def.params_span.clone(),
                );
            }
            if !matches!(return_type.kind, TypeKind::Null | TypeKind::Unknown) {
                self.error(
                    "The 'main' function must not declare a return type",
                    def.return_span(),
                );
            }
        }

        if let Some(existing) = self.module().get_func(&def.name.name) {
            let first_span = existing.ident_span.clone();
            self.emit(
                Diagnostic::error(
                    format!("Duplicate function definition '{}'", def.name.name),
                    def.name.span.clone(),
                )
                .with_note(format!(
                    "'{}' was first defined at {}",
                    def.name.name, first_span
                )),
            );
            return;
        }

        let record = Function {
            kind: FnKind::Normal {
                ident: def.name.name.clone(),
            },
            ident_span: def.name.span.clone(),
            parameters,
            params_span: def.params_span.clone(),
            return_type,
            return_span: def.return_span(),
            modifier: def.modifier,
            used: false,
        };
        let fn_type = record.as_type(def.name.span.clone());
        self.module_mut().functions.push(record);

        // Functions resolve like variables; the entry is builtin-origin so
        // the unused-function walk is the only unused reporter.
        self.module_mut()
            .add_var(def.name.name.clone(), Variable::builtin(fn_type), false);

        if let Some(annotation) = &def.annotation {
            self.fn_annotation(def, annotation);
        }
    }

    fn fn_annotation(&mut self, def: &ast::FnDef, annotation: &ast::Annotation) {
        for item in &annotation.items {
            match item {
                ast::AnnotationItem::Ident(ident) => {
                    if ident.name == "allow_unused" {
                        if let Some(func) = self.module_mut().get_func_mut(&def.name.name) {
                            func.used = true;
                        }
                        continue;
                    }
                    if self.known_annotations.iter().any(|k| *k == ident.name) {
                        continue;
                    }
                    let mut diag = Diagnostic::error(
                        format!("Unknown function annotation '{}'", ident.name),
                        ident.span.clone(),
                    );
                    let candidates = std::iter::once("allow_unused")
                        .chain(self.known_annotations.iter().map(String::as_str));
                    if let Some(suggestion) =
                        super::suggest::closest_match(&ident.name, candidates)
                    {
                        diag = diag.with_note(format!(
                            "an annotation with a similar name exists: '{suggestion}'"
                        ));
                    }
                    self.emit(diag);
                }
                ast::AnnotationItem::Trigger(trigger) => {
                    if def.modifier != ast::FnModifier::Event {
                        self.error(
                            "'trigger' annotations require the 'event' modifier",
                            trigger.span.clone(),
                        );
                    }

                    let (_, binding) = self.resolve_trigger_use(
                        &trigger.trigger,
                        trigger.connective,
                        &trigger.span,
                        &trigger.args,
                    );

                    if let Some(binding) = binding {
                        let callback_ty = self
                            .module()
                            .get_func(&def.name.name)
                            .map(|f| f.as_type(def.name.span.clone()));
                        if let Some(callback_ty) = callback_ty {
                            if let Some(err) = type_check(
                                &callback_ty,
                                &binding.callback_fn_type,
                                TypeCheckOptions::ignore_param_names(),
                            ) {
                                self.emit_compat(
                                    err.at_span(def.name.span.clone())
                                        .with_context("invalid trigger callback"),
                                );
                            }
                        }
                    }

                    self.mark_callback_used(&def.name.name);
                }
            }
        }
    }

    // ========================================================================
    // Step (f): globals
    // ========================================================================

    pub(crate) fn globals_step(&mut self, program: &ast::Program, out: &mut AnalyzedProgram) {
        for item in &program.items {
            if let ast::Item::GlobalLet(stmt) = item {
                let analyzed = self.let_stmt(stmt, true);
                out.globals.push(analyzed);
            }
        }
    }

    // ========================================================================
    // Steps (g) and (h): bodies
    // ========================================================================

    pub(crate) fn fn_bodies_step(&mut self, program: &ast::Program, out: &mut AnalyzedProgram) {
        // Ordinary functions first, then event functions.
        for item in &program.items {
            if let ast::Item::Fn(def) = item {
                if def.modifier != ast::FnModifier::Event {
                    let analyzed = self.fn_body(def);
                    out.functions.push(analyzed);
                }
            }
        }
        for item in &program.items {
            if let ast::Item::Fn(def) = item {
                if def.modifier == ast::FnModifier::Event {
                    let analyzed = self.fn_body(def);
                    out.functions.push(analyzed);
                }
            }
        }
    }

    /// Re-visit a function's signature with diagnostics enabled and walk
    /// its body.
    pub(crate) fn fn_body(&mut self, def: &ast::FnDef) -> AnalyzedFunctionDef {
        let parameters = self.analyze_params(&def.params, true, false);
        let return_type = match &def.return_type {
            Some(annotation) => self.convert_type(annotation, true),
            None => Type::new(TypeKind::Null, def.return_span()),
        };

        let record = Function {
            kind: FnKind::Normal {
                ident: def.name.name.clone(),
            },
            ident_span: def.name.span.clone(),
            parameters: parameters.clone(),
            params_span: def.params_span.clone(),
            return_type: return_type.clone(),
            return_span: def.return_span(),
            modifier: def.modifier,
            used: true,
        };

        let body = self.function_body(record, &parameters, &def.body);

        let body_ty = body.result_type();
        if let Some(err) = type_check(&body_ty, &return_type, TypeCheckOptions::default()) {
            self.emit_compat(err);
        }

        AnalyzedFunctionDef {
            name: def.name.name.clone(),
            modifier: def.modifier,
            parameters,
            return_type,
            body,
            span: def.span.clone(),
        }
    }

    pub(crate) fn impl_bodies_step(&mut self, program: &ast::Program, out: &mut AnalyzedProgram) {
        for item in &program.items {
            if let ast::Item::Impl(block) = item {
                let analyzed = self.impl_block(block);
                out.impl_blocks.push(analyzed);
            }
        }
    }

    fn impl_block(&mut self, block: &ast::ImplBlock) -> AnalyzedImplBlock {
        let singleton_name = &block.singleton.name;

        // 1. The singleton being implemented.
        let singleton_known = match self.module_mut().singletons.get_mut(singleton_name) {
            Some(singleton) => {
                singleton.used = true;
                true
            }
            None => {
                self.error(
                    format!("Undefined singleton '{singleton_name}'"),
                    block.singleton.span.clone(),
                );
                false
            }
        };

        // 2. Analyze each method like a normal function definition.
        let methods: Vec<AnalyzedFunctionDef> = block
            .methods
            .iter()
            .map(|method| self.fn_body(method))
            .collect();

        // 3. The template being implemented.
        let Some(template) = self.module().templates.get(&block.template.name).cloned() else {
            self.emit(
                Diagnostic::error(
                    format!("Undefined template '{}'", block.template.name),
                    block.template.span.clone(),
                )
                .with_note(format!(
                    "templates are provided by modules; add 'import {{ templ {} }} from <module>;'",
                    block.template.name
                )),
            );
            let capabilities = block
                .capabilities
                .as_ref()
                .map(|caps| caps.items.iter().map(|c| c.name.clone()).collect())
                .unwrap_or_default();
            return AnalyzedImplBlock {
                template: block.template.name.clone(),
                singleton: singleton_name.clone(),
                capabilities,
                methods,
                span: block.span.clone(),
            };
        };

        // 4. Effective capability set: template defaults plus the
        // user-selected ones.
        let mut effective: Vec<String> = template.default_capabilities.clone();
        if let Some(user_caps) = &block.capabilities {
            for cap in &user_caps.items {
                if !template.capabilities.contains_key(&cap.name) {
                    let mut diag = Diagnostic::error(
                        format!(
                            "Undefined capability '{}' on template '{}'",
                            cap.name, block.template.name
                        ),
                        cap.span.clone(),
                    );
                    if let Some(suggestion) = super::suggest::closest_match(
                        &cap.name,
                        template.capabilities.keys().map(String::as_str),
                    ) {
                        diag = diag
                            .with_note(format!("a capability with a similar name exists: '{suggestion}'"));
                    }
                    self.emit(diag);
                    continue;
                }
                if !effective.contains(&cap.name) {
                    effective.push(cap.name.clone());
                }
            }
        }

        // 5. Capability conflicts, once per unordered pair.
        let mut reported_pairs: Vec<(String, String)> = Vec::new();
        for cap_name in &effective {
            let Some(capability) = template.capabilities.get(cap_name) else {
                continue;
            };
            for conflicting in &capability.conflicts_with {
                if !effective.contains(conflicting) {
                    continue;
                }
                let pair = if cap_name < conflicting {
                    (cap_name.clone(), conflicting.clone())
                } else {
                    (conflicting.clone(), cap_name.clone())
                };
                if reported_pairs.contains(&pair) {
                    continue;
                }
                reported_pairs.push(pair.clone());
                self.error(
                    format!(
                        "Capabilities '{}' and '{}' of template '{}' conflict",
                        pair.0, pair.1, block.template.name
                    ),
                    block
                        .capabilities
                        .as_ref()
                        .map(|c| c.span.clone())
                        .unwrap_or_else(|| block.template.span.clone()),
                );
            }
        }

        // 6. Methods the selected capabilities require.
        let mut required: Vec<String> = Vec::new();
        for cap_name in &effective {
            let Some(capability) = template.capabilities.get(cap_name) else {
                continue;
            };
            for method in &capability.requires_methods {
                if template.base_methods.contains_key(method) && !required.contains(method) {
                    required.push(method.clone());
                }
            }
        }

        // 7. Every required method must be implemented correctly.
        for method_name in &required {
            let signature = &template.base_methods[method_name.as_str()];
            let Some(implemented) = methods.iter().find(|m| &m.name == method_name) else {
                self.emit(
                    Diagnostic::error(
                        format!(
                            "Missing method '{method_name}' required by template '{}'",
                            block.template.name
                        ),
                        block.singleton.span.clone(),
                    )
                    .with_note(format!(
                        "add: {}",
                        render_method_signature(method_name, signature)
                    )),
                );
                continue;
            };
            let def_span = block
                .methods
                .iter()
                .find(|m| m.name.name == *method_name)
                .map(|m| m.name.span.clone())
                .unwrap_or_else(|| block.span.clone());
            self.check_impl_method(block, method_name, signature, implemented, def_span);
        }

        // 8. No methods beyond the required set.
        for method in &methods {
            if !required.contains(&method.name) {
                let span = block
                    .methods
                    .iter()
                    .find(|m| m.name.name == method.name)
                    .map(|m| m.name.span.clone())
                    .unwrap_or_else(|| block.span.clone());
                self.error(
                    format!(
                        "Method '{}' is not required by template '{}' with the selected capabilities",
                        method.name, block.template.name
                    ),
                    span,
                );
            }
        }

        // 9. Record the binding on the singleton.
        if singleton_known {
            if let Some(singleton) = self.module_mut().singletons.get_mut(singleton_name) {
                singleton.implements.push(super::module::ImplBlockTemplate {
                    template: block.template.name.clone(),
                    template_span: block.template.span.clone(),
                    capabilities: effective.clone(),
                });
            }
        }

        AnalyzedImplBlock {
            template: block.template.name.clone(),
            singleton: singleton_name.clone(),
            capabilities: effective,
            methods,
            span: block.span.clone(),
        }
    }

    fn check_impl_method(
        &mut self,
        block: &ast::ImplBlock,
        method_name: &str,
        signature: &MethodSignature,
        implemented: &AnalyzedFunctionDef,
        def_span: Span,
    ) {
        if implemented.modifier != signature.modifier {
            self.error(
                format!(
                    "Method '{method_name}' has modifier '{}', expected '{}'",
                    implemented.modifier, signature.modifier
                ),
                def_span.clone(),
            );
        }

        let extracts_singleton = implemented
            .parameters
            .first()
            .is_some_and(|p| p.singleton_ident.as_deref() == Some(block.singleton.name.as_str()));
        if !extracts_singleton {
            self.error(
                format!(
                    "Method '{method_name}' must extract '{}' as its first parameter",
                    block.singleton.name
                ),
                def_span.clone(),
            );
        }

        let TypeKind::Function(expected_fn) = &signature.signature.kind else {
            return;
        };
        let Params::Normal(expected_params) = &expected_fn.params else {
            // Variadic template methods are not produced by any host.
            return;
        };

        let expected: Vec<_> = expected_params
            .iter()
            .filter(|p| !p.is_singleton_extractor())
            .collect();
        let got: Vec<_> = implemented
            .parameters
            .iter()
            .filter(|p| !p.is_singleton_extractor)
            .collect();

        if expected.len() != got.len() {
            self.error(
                format!(
                    "Method '{method_name}' expects {} parameters, got {}",
                    expected.len(),
                    got.len()
                ),
                def_span.clone(),
            );
            return;
        }

        for (expected_param, got_param) in expected.iter().zip(&got) {
            if expected_param.name != got_param.ident {
                self.error(
                    format!(
                        "Parameter '{}' of method '{method_name}' must be named '{}'",
                        got_param.ident, expected_param.name
                    ),
                    got_param.span.clone(),
                );
            }
            if let Some(err) = type_check(
                &got_param.ty,
                &expected_param.ty,
                TypeCheckOptions::ignore_param_names(),
            ) {
                self.emit_compat(
                    err.at_span(got_param.span.clone())
                        .with_context(format!("invalid parameter of method '{method_name}'")),
                );
            }
        }

        if let Some(err) = type_check(
            &implemented.return_type,
            &expected_fn.return_type,
            TypeCheckOptions::ignore_param_names(),
        ) {
            self.emit_compat(
                err.at_span(def_span)
                    .with_context(format!("invalid return type of method '{method_name}'")),
            );
        }
    }

    // ========================================================================
    // Module epilogue
    // ========================================================================

    /// Verify `main` exists and warn about functions that are never used.
    pub(crate) fn module_epilogue(&mut self) {
        let filename = self.module().filename.clone();
        let has_main = self
            .module()
            .functions
            .iter()
            .any(|f| f.kind.ident() == Some("main"));
        if !has_main {
            self.error("Missing 'main' function", Span::file(filename));
        }

        let warnings: Vec<(String, Span)> = self
            .module()
            .functions
            .iter()
            .filter_map(|f| {
                let ident = f.kind.ident()?;
                let eligible = f.modifier == ast::FnModifier::None
                    && !f.used
                    && ident != "main"
                    && !ident.starts_with('_');
                eligible.then(|| (ident.to_string(), f.ident_span.clone()))
            })
            .collect();
        for (ident, span) in warnings {
            self.emit(Diagnostic::warning(
                format!("Function '{ident}' is never used"),
                span,
            ));
        }

        // Surface unused globals by sweeping the root scope in place.
        let root = self
            .module()
            .scopes
            .first()
            .cloned()
            .expect("root scope exists for the duration of module analysis");
        self.sweep_scope(&root);
    }
}

/// Render a template method signature ready to paste into an impl block.
fn render_method_signature(name: &str, signature: &MethodSignature) -> String {
    let modifier = match signature.modifier {
        ast::FnModifier::None => String::new(),
        other => format!("{other} "),
    };
    let TypeKind::Function(func) = &signature.signature.kind else {
        return format!("{modifier}fn {name}(...)");
    };

    let mut rendered = format!("{modifier}fn {name}(");
    if let Params::Normal(params) = &func.params {
        for (i, param) in params.iter().enumerate() {
            if i > 0 {
                rendered.push_str(", ");
            }
            match &param.singleton_ident {
                Some(singleton) => {
                    rendered.push_str(&format!("{}: {singleton}", param.name));
                }
                None => rendered.push_str(&format!("{}: {}", param.name, param.ty)),
            }
        }
    }
    rendered.push(')');
    if !matches!(func.return_type.kind, TypeKind::Null) {
        rendered.push_str(&format!(" -> {}", func.return_type));
    }
    rendered
}
