// Statement walker for Homescript semantic analysis

use crate::ast;
use crate::diagnostic::Diagnostic;
use crate::source::Span;

use super::module::TriggerBinding;
use super::scope::{Variable, VariableOrigin};
use super::typecheck::{type_check, TypeCheckOptions};
use super::typed_ast::*;
use super::types::{Params, Type, TypeKind};
use super::{Analyzer, HostProvider};

impl<H: HostProvider> Analyzer<H> {
    /// Walk a block. With `new_scope` false the caller has already pushed
    /// (and will pop) the scope, e.g. for function bodies whose parameters
    /// live in the same scope.
    pub(crate) fn block(&mut self, block: &ast::Block, new_scope: bool) -> AnalyzedBlock {
        if new_scope {
            self.push_scope();
        }

        let statements = block
            .statements
            .iter()
            .map(|stmt| self.statement(stmt))
            .collect();
        let trailing_expr = block
            .trailing_expr
            .as_ref()
            .map(|expr| Box::new(self.expression(expr)));

        if new_scope {
            self.pop_scope();
        }

        AnalyzedBlock {
            statements,
            trailing_expr,
            span: block.span.clone(),
        }
    }

    pub(crate) fn statement(&mut self, stmt: &ast::Statement) -> AnalyzedStatement {
        match stmt {
            ast::Statement::Let(node) => AnalyzedStatement::Let(self.let_stmt(node, false)),
            ast::Statement::Return(node) => AnalyzedStatement::Return(self.return_stmt(node)),
            ast::Statement::Break(node) => AnalyzedStatement::Break(self.break_stmt(node)),
            ast::Statement::Continue(node) => {
                AnalyzedStatement::Continue(self.continue_stmt(node))
            }
            ast::Statement::Loop(node) => AnalyzedStatement::Loop(self.loop_stmt(node)),
            ast::Statement::While(node) => AnalyzedStatement::While(self.while_stmt(node)),
            ast::Statement::For(node) => AnalyzedStatement::For(self.for_stmt(node)),
            ast::Statement::Trigger(node) => AnalyzedStatement::Trigger(self.trigger_stmt(node)),
            ast::Statement::Expr(node) => AnalyzedStatement::Expr(AnalyzedExprStmt {
                expr: self.expression(&node.expr),
                span: node.span.clone(),
            }),
        }
    }

    /// Walk a `let`. Globals (module scope) additionally require a
    /// constant initializer.
    pub(crate) fn let_stmt(&mut self, node: &ast::LetStmt, global: bool) -> AnalyzedLetStmt {
        let annotation = node
            .type_annotation
            .as_ref()
            .map(|t| self.convert_type(t, true));

        // Without an annotation, an inferred `any` has nowhere to be
        // named; the walker rejects it inside this initializer.
        let saved_flag = self.module().error_if_any_present;
        self.module_mut().error_if_any_present = annotation.is_none();
        let initializer = self.expression(&node.initializer);
        self.module_mut().error_if_any_present = saved_flag;

        let init_ty = initializer.result_type();

        if global && !initializer.constant() {
            self.error(
                "Global values must have a constant initializer",
                node.initializer.span().clone(),
            );
        }

        let ty = match annotation {
            Some(expected) => {
                if let Some(err) = type_check(&init_ty, &expected, TypeCheckOptions::default()) {
                    self.emit_compat(err);
                }
                expected
            }
            None => init_ty,
        };

        let variable = Variable::declared(ty.clone(), node.name.span.clone(), node.is_pub);
        let previous = self
            .module_mut()
            .add_var(node.name.name.clone(), variable, true);
        if let Some(previous) = previous {
            if previous.origin != VariableOrigin::Builtin {
                self.emit(Diagnostic::hint(
                    format!("'{}' shadows a previous declaration", node.name.name),
                    node.name.span.clone(),
                ));
            }
        }

        AnalyzedLetStmt {
            name: node.name.name.clone(),
            ty,
            initializer,
            is_pub: node.is_pub,
            span: node.span.clone(),
        }
    }

    fn return_stmt(&mut self, node: &ast::ReturnStmt) -> AnalyzedReturnStmt {
        let expected = match self.module().current_func() {
            Some(func) => Some(func.return_type.clone()),
            None => {
                self.error(
                    "Illegal use of 'return' outside of a function",
                    node.span.clone(),
                );
                None
            }
        };

        // The declared return type annotates this slot.
        let saved_flag = std::mem::take(&mut self.module_mut().error_if_any_present);
        let value = node.value.as_ref().map(|expr| self.expression(expr));
        self.module_mut().error_if_any_present = saved_flag;

        if let Some(expected) = expected {
            let got = value
                .as_ref()
                .map(|v| v.result_type())
                .unwrap_or_else(|| Type::new(TypeKind::Null, node.span.clone()));
            if let Some(err) = type_check(&got, &expected, TypeCheckOptions::default()) {
                let err = if value.is_none() {
                    err.at_span(node.span.clone())
                } else {
                    err
                };
                self.emit_compat(err.with_context("return value"));
            }
        }

        AnalyzedReturnStmt {
            value,
            span: node.span.clone(),
        }
    }

    fn break_stmt(&mut self, node: &ast::BreakStmt) -> AnalyzedBreakStmt {
        if self.module().loop_depth == 0 {
            self.error(
                "Illegal use of 'break' outside of a loop",
                node.span.clone(),
            );
        } else {
            self.module_mut().current_loop_is_terminated = true;
        }
        AnalyzedBreakStmt {
            span: node.span.clone(),
        }
    }

    fn continue_stmt(&mut self, node: &ast::ContinueStmt) -> AnalyzedContinueStmt {
        if self.module().loop_depth == 0 {
            self.error(
                "Illegal use of 'continue' outside of a loop",
                node.span.clone(),
            );
        }
        AnalyzedContinueStmt {
            span: node.span.clone(),
        }
    }

    /// Walk a loop body with the loop context entered, and verify the body
    /// produces no value.
    fn loop_body(&mut self, body: &ast::Block) -> (AnalyzedBlock, bool) {
        let module = self.module_mut();
        module.loop_depth += 1;
        let saved_terminated = std::mem::take(&mut module.current_loop_is_terminated);

        let analyzed = self.block(body, true);

        let body_ty = analyzed.result_type();
        if !matches!(
            body_ty.kind,
            TypeKind::Null | TypeKind::Never | TypeKind::Unknown
        ) {
            self.error(
                format!("Loop body must not produce a value, got '{body_ty}'"),
                body_ty.span.clone(),
            );
        }

        let module = self.module_mut();
        let terminated = module.current_loop_is_terminated;
        module.current_loop_is_terminated = saved_terminated;
        module.loop_depth -= 1;
        (analyzed, terminated)
    }

    fn loop_stmt(&mut self, node: &ast::LoopStmt) -> AnalyzedLoopStmt {
        let (body, terminated) = self.loop_body(&node.body);
        AnalyzedLoopStmt {
            body,
            never_terminates: !terminated,
            span: node.span.clone(),
        }
    }

    fn while_stmt(&mut self, node: &ast::WhileStmt) -> AnalyzedWhileStmt {
        let condition = self.expression(&node.condition);
        self.check_condition(&condition);

        let (body, _) = self.loop_body(&node.body);
        AnalyzedWhileStmt {
            condition,
            body,
            // TODO: constant-condition analysis would allow detecting
            // `while true` loops without a break.
            never_terminates: false,
            span: node.span.clone(),
        }
    }

    fn for_stmt(&mut self, node: &ast::ForStmt) -> AnalyzedForStmt {
        let iterable = self.expression(&node.iterable);
        let iterable_ty = iterable.result_type();

        let binding_ty = match &iterable_ty.kind {
            TypeKind::Range => Type::new(TypeKind::Int, node.binding.span.clone()),
            TypeKind::String => Type::new(TypeKind::String, node.binding.span.clone()),
            TypeKind::List(inner) => inner.set_span(node.binding.span.clone()),
            TypeKind::Any => Type::new(TypeKind::Any, node.binding.span.clone()),
            TypeKind::Unknown | TypeKind::Never => Type::unknown(node.binding.span.clone()),
            _ => {
                self.error(
                    format!("Type '{iterable_ty}' cannot be iterated"),
                    node.iterable.span().clone(),
                );
                Type::unknown(node.binding.span.clone())
            }
        };

        // The iterator variable lives in a scope of its own wrapped
        // around the body.
        self.push_scope();
        let variable = Variable::new(binding_ty, node.binding.span.clone(), VariableOrigin::Normal);
        self.module_mut()
            .add_var(node.binding.name.clone(), variable, true);

        let module = self.module_mut();
        module.loop_depth += 1;
        let saved_terminated = std::mem::take(&mut module.current_loop_is_terminated);

        let body = self.block(&node.body, false);

        let body_ty = body.result_type();
        if !matches!(
            body_ty.kind,
            TypeKind::Null | TypeKind::Never | TypeKind::Unknown
        ) {
            self.error(
                format!("Loop body must not produce a value, got '{body_ty}'"),
                body_ty.span.clone(),
            );
        }

        let module = self.module_mut();
        module.current_loop_is_terminated = saved_terminated;
        module.loop_depth -= 1;
        self.pop_scope();

        AnalyzedForStmt {
            binding: node.binding.name.clone(),
            iterable,
            body,
            never_terminates: false,
            span: node.span.clone(),
        }
    }

    fn trigger_stmt(&mut self, node: &ast::TriggerStmt) -> AnalyzedTriggerStmt {
        // The callback must be a declared event function.
        let callback_ty = match self.module().get_func(&node.callback.name) {
            Some(func) => {
                let modifier = func.modifier;
                let ty = func.as_type(node.callback.span.clone());
                if modifier != ast::FnModifier::Event {
                    self.error(
                        format!(
                            "Function '{}' cannot be used as a trigger callback",
                            node.callback.name
                        ),
                        node.callback.span.clone(),
                    );
                    self.emit(Diagnostic::hint(
                        "trigger callbacks must be declared with the 'event' modifier",
                        node.callback.span.clone(),
                    ));
                }
                Some(ty)
            }
            None => {
                self.error(
                    format!("Undefined function '{}'", node.callback.name),
                    node.callback.span.clone(),
                );
                None
            }
        };

        let is_self_trigger = self
            .module()
            .current_func()
            .and_then(|f| f.kind.ident())
            .is_some_and(|ident| ident == node.callback.name);
        if is_self_trigger {
            self.error(
                "A function cannot register itself as its own trigger callback",
                node.callback.span.clone(),
            );
        }

        self.mark_callback_used(&node.callback.name);

        let (args, binding) =
            self.resolve_trigger_use(&node.trigger, node.connective, &node.span, &node.args);

        if let (Some(callback_ty), Some(binding)) = (&callback_ty, &binding) {
            if let Some(err) = type_check(
                callback_ty,
                &binding.callback_fn_type,
                TypeCheckOptions::ignore_param_names(),
            ) {
                self.emit_compat(
                    err.at_span(node.callback.span.clone())
                        .with_context("invalid trigger callback"),
                );
            }
        }

        AnalyzedTriggerStmt {
            callback: node.callback.name.clone(),
            connective: node.connective,
            trigger: node.trigger.name.clone(),
            args,
            span: node.span.clone(),
        }
    }

    /// Mark a trigger callback used, both as a function record and as the
    /// scope entry the function was hoisted into.
    pub(crate) fn mark_callback_used(&mut self, name: &str) {
        if let Some(func) = self.module_mut().get_func_mut(name) {
            func.used = true;
        }
        if let Some(var) = self.module_mut().get_var_mut(name) {
            var.used = true;
        }
    }

    /// Resolve a trigger reference, verify the connective, and walk and
    /// type-check the trigger arguments. Shared between trigger statements
    /// and `#[trigger ...]` annotations.
    pub(crate) fn resolve_trigger_use(
        &mut self,
        trigger: &ast::Ident,
        connective: ast::TriggerConnective,
        use_span: &Span,
        args: &[ast::Expression],
    ) -> (Vec<AnalyzedExpression>, Option<TriggerBinding>) {
        let binding = self.module().triggers.get(&trigger.name).cloned();

        // Arguments flow into the trigger's declared parameters.
        let saved_flag = std::mem::take(&mut self.module_mut().error_if_any_present);
        let args: Vec<AnalyzedExpression> =
            args.iter().map(|arg| self.expression(arg)).collect();
        self.module_mut().error_if_any_present = saved_flag;

        let Some(binding) = binding else {
            self.emit(
                Diagnostic::error(
                    format!("Undefined trigger '{}'", trigger.name),
                    trigger.span.clone(),
                )
                .with_note(format!(
                    "import it first: 'import {{ trigger {} }} from <module>;'",
                    trigger.name
                )),
            );
            // Later uses of the same name resolve to a placeholder
            // instead of repeating the error.
            self.module_mut().triggers.insert(
                trigger.name.clone(),
                TriggerBinding::placeholder(trigger.span.clone()),
            );
            return (args, None);
        };

        // Placeholder bindings (unknown to the host) carry no reliable
        // connective; skip the check for them.
        if !binding.trigger_fn_type.is_unknown() && binding.connective != connective {
            self.error(
                format!(
                    "Trigger '{}' must be used with the '{}' connective, not '{}'",
                    trigger.name, binding.connective, connective
                ),
                use_span.clone(),
            );
        }

        if let TypeKind::Function(trigger_fn) = &binding.trigger_fn_type.kind {
            match &trigger_fn.params {
                Params::Normal(params) => {
                    let expected: Vec<_> = params
                        .iter()
                        .filter(|p| !p.is_singleton_extractor())
                        .collect();
                    if expected.len() != args.len() {
                        self.error(
                            format!(
                                "Trigger '{}' expects {} arguments, got {}",
                                trigger.name,
                                expected.len(),
                                args.len()
                            ),
                            use_span.clone(),
                        );
                    } else {
                        for (param, arg) in expected.iter().zip(&args) {
                            if let Some(err) = type_check(
                                &arg.result_type(),
                                &param.ty,
                                TypeCheckOptions::default(),
                            ) {
                                self.emit_compat(err.with_context("invalid trigger argument"));
                            }
                        }
                    }
                }
                Params::VarArgs(fixed, remaining) => {
                    if args.len() < fixed.len() {
                        self.error(
                            format!(
                                "Trigger '{}' expects at least {} arguments, got {}",
                                trigger.name,
                                fixed.len(),
                                args.len()
                            ),
                            use_span.clone(),
                        );
                    } else {
                        for (expected_ty, arg) in fixed.iter().zip(&args) {
                            if let Some(err) = type_check(
                                &arg.result_type(),
                                expected_ty,
                                TypeCheckOptions::default(),
                            ) {
                                self.emit_compat(err.with_context("invalid trigger argument"));
                            }
                        }
                        for arg in &args[fixed.len()..] {
                            if let Some(err) = type_check(
                                &arg.result_type(),
                                remaining,
                                TypeCheckOptions::default(),
                            ) {
                                self.emit_compat(err.with_context("invalid trigger argument"));
                            }
                        }
                    }
                }
            }
        }

        (args, Some(binding))
    }
}
