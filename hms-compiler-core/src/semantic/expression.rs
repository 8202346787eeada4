// Expression walker for Homescript semantic analysis
//
// Turns parsed expressions into typed ones, emitting diagnostics along the
// way. Analysis never stops at a defect: the offending node becomes an
// `Unknown` placeholder and the walk continues with plausible types.
//
// Two contextual flags are saved and restored around every expression:
// - `error_if_any_present` rejects inferred `any` outside annotated slots
// - `current_loop_is_terminated` is raised by `never`-typed expressions

use crate::ast;
use crate::diagnostic::Diagnostic;
use crate::source::Span;

use super::fields::{fields_of, object_builtin_members};
use super::module::FnKind;
use super::scope::VariableOrigin;
use super::typecheck::{type_check, TypeCheckOptions};
use super::typed_ast::*;
use super::types::{
    FunctionType, ObjectType, ObjectTypeField, Params, Type, TypeKind,
};
use super::{Analyzer, HostProvider};

impl<H: HostProvider> Analyzer<H> {
    /// Walk an expression.
    pub(crate) fn expression(&mut self, expr: &ast::Expression) -> AnalyzedExpression {
        let saved_any_flag = self.module().error_if_any_present;

        let analyzed = self.expression_inner(expr);

        let ty = analyzed.result_type();
        if ty.is_never() {
            self.module_mut().current_loop_is_terminated = true;
        }

        // Reject an inferred `any` where an explicit annotation is
        // required. Function and option results are exempt.
        let analyzed = if self.module().error_if_any_present
            && !matches!(ty.kind, TypeKind::Function(_) | TypeKind::Option(_))
            && ty.contains_any()
        {
            let span = analyzed.span().clone();
            self.error(
                format!("Implicit '{ty}' type requires an explicit type annotation"),
                span.clone(),
            );
            AnalyzedExpression::Unknown(AnalyzedUnknown { span })
        } else {
            analyzed
        };

        self.module_mut().error_if_any_present = saved_any_flag;
        analyzed
    }

    fn expression_inner(&mut self, expr: &ast::Expression) -> AnalyzedExpression {
        match expr {
            ast::Expression::Int(node) => AnalyzedExpression::Int(AnalyzedIntLiteral {
                value: node.value,
                span: node.span.clone(),
            }),
            ast::Expression::Float(node) => AnalyzedExpression::Float(AnalyzedFloatLiteral {
                value: node.value,
                span: node.span.clone(),
            }),
            ast::Expression::Bool(node) => AnalyzedExpression::Bool(AnalyzedBoolLiteral {
                value: node.value,
                span: node.span.clone(),
            }),
            ast::Expression::Str(node) => AnalyzedExpression::Str(AnalyzedStrLiteral {
                value: node.value.clone(),
                span: node.span.clone(),
            }),
            ast::Expression::Null(node) => AnalyzedExpression::Null(AnalyzedNullLiteral {
                span: node.span.clone(),
            }),
            ast::Expression::None(node) => AnalyzedExpression::None(AnalyzedNoneLiteral {
                span: node.span.clone(),
            }),
            ast::Expression::Range(node) => self.range_expr(node),
            ast::Expression::Ident(ident) => self.ident_expr(ident),
            ast::Expression::Singleton(ident) => self.singleton_expr(ident),
            ast::Expression::List(node) => self.list_expr(node),
            ast::Expression::Object(node) => self.object_expr(node),
            ast::Expression::Lambda(node) => self.lambda_expr(node),
            ast::Expression::Grouped(node) => {
                let inner = self.expression(&node.inner);
                AnalyzedExpression::Grouped(AnalyzedGrouped {
                    inner: Box::new(inner),
                    span: node.span.clone(),
                })
            }
            ast::Expression::Prefix(node) => self.prefix_expr(node),
            ast::Expression::Infix(node) => self.infix_expr(node),
            ast::Expression::Assign(node) => self.assign_expr(node),
            ast::Expression::Call(node) => self.call_expr(node),
            ast::Expression::Index(node) => self.index_expr(node),
            ast::Expression::Member(node) => self.member_expr(node),
            ast::Expression::Cast(node) => self.cast_expr(node),
            ast::Expression::Block(node) => {
                AnalyzedExpression::Block(Box::new(self.block(node, true)))
            }
            ast::Expression::If(node) => self.if_expr(node),
            ast::Expression::Match(node) => self.match_expr(node),
            ast::Expression::Try(node) => self.try_expr(node),
        }
    }

    // ========================================================================
    // Names
    // ========================================================================

    fn ident_expr(&mut self, ident: &ast::Ident) -> AnalyzedExpression {
        let name = &ident.name;

        let resolved = match self.module_mut().get_var_mut(name) {
            Some(var) => {
                var.used = true;
                Some((var.ty.clone(), var.origin))
            }
            None => None,
        };

        if let Some((ty, origin)) = resolved {
            // Only a function's own hoisted entry (builtin origin) credits
            // the function record; a shadowing local or parameter of the
            // same name resolves to itself and leaves the function unused.
            if origin == VariableOrigin::Builtin {
                self.mark_function_used(name);
            }
            return AnalyzedExpression::Ident(AnalyzedIdent {
                name: name.clone(),
                ty: ty.set_span(ident.span.clone()),
                span: ident.span.clone(),
            });
        }

        // Not a variable; try a function record directly.
        if let Some(func) = self.module().get_func(name) {
            let ty = func.as_type(ident.span.clone());
            self.mark_function_used(name);
            return AnalyzedExpression::Ident(AnalyzedIdent {
                name: name.clone(),
                ty,
                span: ident.span.clone(),
            });
        }

        self.error(format!("Undefined reference '{name}'"), ident.span.clone());
        AnalyzedExpression::Unknown(AnalyzedUnknown {
            span: ident.span.clone(),
        })
    }

    /// Mark the named function used, unless it is the function currently
    /// being analyzed: direct recursion does not count as a use.
    fn mark_function_used(&mut self, name: &str) {
        let module = self.module_mut();
        let is_self_reference = module
            .current_func()
            .and_then(|f| f.kind.ident())
            .is_some_and(|ident| ident == name);
        if is_self_reference {
            return;
        }
        if let Some(func) = module.get_func_mut(name) {
            func.used = true;
        }
    }

    fn singleton_expr(&mut self, ident: &ast::Ident) -> AnalyzedExpression {
        match self.resolve_singleton_type(&ident.name, &ident.span) {
            Some(ty) => AnalyzedExpression::Singleton(AnalyzedSingletonRef {
                name: ident.name.clone(),
                ty,
                span: ident.span.clone(),
            }),
            None => {
                self.error(
                    format!("Undefined singleton '{}'", ident.name),
                    ident.span.clone(),
                );
                AnalyzedExpression::Unknown(AnalyzedUnknown {
                    span: ident.span.clone(),
                })
            }
        }
    }

    // ========================================================================
    // Composite literals
    // ========================================================================

    fn range_expr(&mut self, node: &ast::RangeExpr) -> AnalyzedExpression {
        let start = self.expression(&node.start);
        let end = self.expression(&node.end);

        let expected = Type::synthetic(TypeKind::Int);
        for bound in [&start, &end] {
            if let Some(err) = type_check(&bound.result_type(), &expected, TypeCheckOptions::default()) {
                self.emit_compat(err.with_context("range bound"));
            }
        }

        AnalyzedExpression::Range(AnalyzedRangeExpr {
            start: Box::new(start),
            end: Box::new(end),
            span: node.span.clone(),
        })
    }

    fn list_expr(&mut self, node: &ast::ListLiteral) -> AnalyzedExpression {
        let mut element_type = Type::new(TypeKind::Any, node.span.clone());
        let mut values = Vec::with_capacity(node.values.len());

        for value in &node.values {
            let analyzed = self.expression(value);
            let ty = analyzed.result_type();
            if matches!(element_type.kind, TypeKind::Any) && !matches!(ty.kind, TypeKind::Any) {
                // The first non-`any` element fixes the element type.
                element_type = ty;
            } else if let Some(err) = type_check(&ty, &element_type, TypeCheckOptions::default()) {
                self.emit_compat(err);
            }
            values.push(analyzed);
        }

        let ty = Type::new(TypeKind::List(Box::new(element_type)), node.span.clone());
        AnalyzedExpression::List(AnalyzedListLiteral {
            values,
            ty,
            span: node.span.clone(),
        })
    }

    fn object_expr(&mut self, node: &ast::ObjectLiteral) -> AnalyzedExpression {
        let mut type_fields: Vec<ObjectTypeField> = Vec::with_capacity(node.fields.len());
        let mut fields = Vec::with_capacity(node.fields.len());

        for field in &node.fields {
            let key = &field.key.name;
            let duplicate = type_fields.iter().any(|f| &f.name == key);
            if duplicate {
                self.error(
                    format!("Duplicate field '{key}' in object literal"),
                    field.key.span.clone(),
                );
            }
            if object_builtin_members().contains(&key.as_str()) {
                self.error(
                    format!("Field '{key}' collides with a built-in object member"),
                    field.key.span.clone(),
                );
            }

            let value = self.expression(&field.value);
            if !duplicate {
                type_fields.push(ObjectTypeField {
                    name: key.clone(),
                    ty: value.result_type(),
                    span: field.key.span.clone(),
                    annotation: None,
                });
            }
            fields.push(AnalyzedObjectField {
                key: key.clone(),
                value,
            });
        }

        let ty = Type::new(
            TypeKind::Object(ObjectType {
                fields: type_fields,
            }),
            node.span.clone(),
        );
        AnalyzedExpression::Object(AnalyzedObjectLiteral {
            fields,
            ty,
            span: node.span.clone(),
        })
    }

    fn lambda_expr(&mut self, node: &ast::LambdaExpr) -> AnalyzedExpression {
        let parameters = self.analyze_params(&node.params, true, true);
        let return_type = match &node.return_type {
            Some(annotation) => self.convert_type(annotation, true),
            None => Type::new(TypeKind::Null, node.params_span.clone()),
        };
        let return_span = node
            .return_type
            .as_ref()
            .map(|t| t.span().clone())
            .unwrap_or_else(|| node.params_span.clone());

        let record = super::module::Function {
            kind: FnKind::Lambda,
            ident_span: node.span.clone(),
            parameters: parameters.clone(),
            params_span: node.params_span.clone(),
            return_type: return_type.clone(),
            return_span: return_span.clone(),
            modifier: ast::FnModifier::None,
            used: true,
        };

        let body = self.function_body(record, &parameters, &node.body);

        let body_ty = body.result_type();
        if let Some(err) = type_check(&body_ty, &return_type, TypeCheckOptions::default()) {
            self.emit_compat(err);
        }

        let ty = FunctionType::new(
            Params::Normal(
                parameters
                    .iter()
                    .map(|p| super::types::FunctionParam {
                        name: p.ident.clone(),
                        ty: p.ty.clone(),
                        singleton_ident: p.singleton_ident.clone(),
                    })
                    .collect(),
            ),
            node.params_span.clone(),
            return_type.clone(),
        )
        .into_type(node.span.clone());

        AnalyzedExpression::Lambda(AnalyzedLambda {
            parameters,
            return_type,
            body,
            ty,
            span: node.span.clone(),
        })
    }

    /// Analyze a function or lambda body with `record` temporarily pushed
    /// as the current function. Loop context does not cross the boundary.
    pub(crate) fn function_body(
        &mut self,
        record: super::module::Function,
        parameters: &[super::module::AnalyzedParam],
        body: &ast::Block,
    ) -> AnalyzedBlock {
        let module = self.module_mut();
        module.functions.push(record);
        let index = module.functions.len() - 1;
        let saved_current = module.current_function.replace(index);
        let saved_loop_depth = std::mem::take(&mut module.loop_depth);
        let saved_terminated = std::mem::take(&mut module.current_loop_is_terminated);

        self.push_scope();
        for param in parameters {
            let var = super::scope::Variable::parameter(param.ty.clone(), param.span.clone());
            self.module_mut().add_var(param.ident.clone(), var, true);
        }

        let analyzed = self.block(body, false);

        self.pop_scope();
        let module = self.module_mut();
        module.functions.pop();
        module.current_function = saved_current;
        module.loop_depth = saved_loop_depth;
        module.current_loop_is_terminated = saved_terminated;

        analyzed
    }

    // ========================================================================
    // Operators
    // ========================================================================

    fn prefix_expr(&mut self, node: &ast::PrefixExpr) -> AnalyzedExpression {
        let rhs = self.expression(&node.rhs);
        let rhs_ty = rhs.result_type();

        let ty = match node.op {
            ast::PrefixOp::Some => Type::new(
                TypeKind::Option(Box::new(rhs_ty)),
                node.span.clone(),
            ),
            ast::PrefixOp::Neg => match rhs_ty.kind {
                TypeKind::Int | TypeKind::Float | TypeKind::Unknown | TypeKind::Never => {
                    rhs_ty.set_span(node.span.clone())
                }
                _ => {
                    self.error(
                        format!("Prefix operator '-' is not supported on type '{rhs_ty}'"),
                        node.span.clone(),
                    );
                    Type::unknown(node.span.clone())
                }
            },
            ast::PrefixOp::Not => match rhs_ty.kind {
                TypeKind::Bool | TypeKind::Unknown | TypeKind::Never => {
                    rhs_ty.set_span(node.span.clone())
                }
                _ => {
                    self.error(
                        format!("Prefix operator '!' is not supported on type '{rhs_ty}'"),
                        node.span.clone(),
                    );
                    Type::unknown(node.span.clone())
                }
            },
        };

        AnalyzedExpression::Prefix(AnalyzedPrefixExpr {
            op: node.op,
            rhs: Box::new(rhs),
            ty,
            span: node.span.clone(),
        })
    }

    fn infix_expr(&mut self, node: &ast::InfixExpr) -> AnalyzedExpression {
        let lhs = self.expression(&node.lhs);
        let rhs = self.expression(&node.rhs);
        let lhs_ty = lhs.result_type();
        let rhs_ty = rhs.result_type();

        let ty = self.infix_result(node, &lhs_ty, &rhs_ty);

        AnalyzedExpression::Infix(AnalyzedInfixExpr {
            lhs: Box::new(lhs),
            op: node.op,
            rhs: Box::new(rhs),
            ty,
            span: node.span.clone(),
        })
    }

    fn infix_result(&mut self, node: &ast::InfixExpr, lhs_ty: &Type, rhs_ty: &Type) -> Type {
        // Divergence and recovery placeholders propagate silently.
        if lhs_ty.is_never() || rhs_ty.is_never() {
            return Type::new(TypeKind::Never, node.span.clone());
        }
        if lhs_ty.is_unknown() || rhs_ty.is_unknown() {
            return Type::unknown(node.span.clone());
        }

        // Equality works on every pair of matching kinds.
        if matches!(node.op, ast::InfixOp::Eq | ast::InfixOp::Neq) {
            if let Some(err) = type_check(rhs_ty, lhs_ty, TypeCheckOptions::default()) {
                self.emit_compat(err);
            }
            return Type::new(TypeKind::Bool, node.span.clone());
        }

        let result = infix_result_kind(&lhs_ty.kind, node.op);
        match result {
            Some(kind) => {
                if let Some(err) = type_check(rhs_ty, lhs_ty, TypeCheckOptions::default()) {
                    self.emit_compat(err);
                }
                Type::new(kind, node.span.clone())
            }
            None => {
                self.error(
                    format!(
                        "Infix operator '{}' is not supported on type '{lhs_ty}'",
                        node.op
                    ),
                    node.span.clone(),
                );
                Type::unknown(node.span.clone())
            }
        }
    }

    fn assign_expr(&mut self, node: &ast::AssignExpr) -> AnalyzedExpression {
        let lhs = self.expression(&node.lhs);
        let rhs = self.expression(&node.rhs);
        let lhs_ty = lhs.result_type();
        let rhs_ty = rhs.result_type();

        if let Some(base_op) = node.op.base_infix() {
            if !lhs_ty.is_unknown()
                && !lhs_ty.is_never()
                && infix_result_kind(&lhs_ty.kind, base_op).is_none()
            {
                self.error(
                    format!("Assignment operator '{}=' is not supported on type '{lhs_ty}'", base_op),
                    node.span.clone(),
                );
            }
        }

        if let Some(err) = type_check(&rhs_ty, &lhs_ty, TypeCheckOptions::default()) {
            self.emit_compat(err);
        }

        let ty = if lhs_ty.is_never() || rhs_ty.is_never() {
            Type::new(TypeKind::Never, node.span.clone())
        } else {
            Type::new(TypeKind::Null, node.span.clone())
        };

        AnalyzedExpression::Assign(AnalyzedAssignExpr {
            lhs: Box::new(lhs),
            op: node.op,
            rhs: Box::new(rhs),
            ty,
            span: node.span.clone(),
        })
    }

    // ========================================================================
    // Calls
    // ========================================================================

    fn call_expr(&mut self, node: &ast::CallExpr) -> AnalyzedExpression {
        let base = self.expression(&node.base);
        let base_ty = base.result_type();

        // Arguments flow into annotated parameter slots; the implicit-any
        // rule does not apply inside them.
        let saved_flag = std::mem::take(&mut self.module_mut().error_if_any_present);
        let args: Vec<AnalyzedExpression> =
            node.args.iter().map(|arg| self.expression(arg)).collect();
        self.module_mut().error_if_any_present = saved_flag;

        let mut ty = match &base_ty.kind {
            TypeKind::Function(func) => self.check_call(node, func, &args),
            TypeKind::Unknown | TypeKind::Never => Type::unknown(node.span.clone()),
            other => {
                self.error(
                    format!("Type '{other}' is not callable"),
                    node.base.span().clone(),
                );
                Type::unknown(node.span.clone())
            }
        };

        if node.is_spawn {
            for arg in &args {
                if matches!(arg.result_type().kind, TypeKind::Function(_)) {
                    self.emit(
                        Diagnostic::error(
                            "Function values cannot be passed to a spawned call",
                            arg.span().clone(),
                        )
                        .with_note("closures cannot be sent across threads"),
                    );
                }
            }
            ty = spawn_handle_type(ty, node.span.clone());
        }

        AnalyzedExpression::Call(AnalyzedCallExpr {
            base: Box::new(base),
            args,
            is_spawn: node.is_spawn,
            ty,
            span: node.span.clone(),
        })
    }

    fn check_call(
        &mut self,
        node: &ast::CallExpr,
        func: &FunctionType,
        args: &[AnalyzedExpression],
    ) -> Type {
        for arg in args {
            if matches!(arg.result_type().kind, TypeKind::Null) {
                self.error("This expression generates no value", arg.span().clone());
            }
        }

        match &func.params {
            Params::Normal(params) => {
                // Singleton extractors are injected by the runtime and
                // never passed explicitly.
                let expected: Vec<_> = params
                    .iter()
                    .filter(|p| !p.is_singleton_extractor())
                    .collect();

                if expected.len() != args.len() {
                    self.error(
                        format!(
                            "Function expects {} arguments, got {}",
                            expected.len(),
                            args.len()
                        ),
                        node.span.clone(),
                    );
                } else {
                    for (param, arg) in expected.iter().zip(args) {
                        if let Some(err) =
                            type_check(&arg.result_type(), &param.ty, TypeCheckOptions::default())
                        {
                            self.emit_compat(err);
                        }
                    }
                }
            }
            Params::VarArgs(fixed, remaining) => {
                if args.len() < fixed.len() {
                    self.error(
                        format!(
                            "Function expects at least {} arguments, got {}",
                            fixed.len(),
                            args.len()
                        ),
                        node.span.clone(),
                    );
                } else {
                    for (expected_ty, arg) in fixed.iter().zip(args) {
                        if let Some(err) =
                            type_check(&arg.result_type(), expected_ty, TypeCheckOptions::default())
                        {
                            self.emit_compat(err);
                        }
                    }
                    for arg in &args[fixed.len()..] {
                        if let Some(err) =
                            type_check(&arg.result_type(), remaining, TypeCheckOptions::default())
                        {
                            self.emit_compat(err);
                        }
                    }
                }
            }
        }

        func.return_type.set_span(node.span.clone())
    }

    // ========================================================================
    // Access
    // ========================================================================

    fn index_expr(&mut self, node: &ast::IndexExpr) -> AnalyzedExpression {
        let base = self.expression(&node.base);
        let index = self.expression(&node.index);
        let base_ty = base.result_type();
        let index_ty = index.result_type();

        let ty = if base_ty.is_unknown()
            || base_ty.is_never()
            || index_ty.is_unknown()
            || index_ty.is_never()
        {
            Type::unknown(node.span.clone())
        } else {
            match (&base_ty.kind, &index_ty.kind) {
                (TypeKind::Any, _) => Type::new(TypeKind::Any, node.span.clone()),
                (TypeKind::AnyObject, TypeKind::String) => {
                    Type::new(TypeKind::Any, node.span.clone())
                }
                (TypeKind::Object(object), TypeKind::String) => {
                    let literal_key = match &index {
                        AnalyzedExpression::Str(s) => Some(s.value.clone()),
                        _ => None,
                    };
                    match literal_key.and_then(|key| object.field(&key).cloned()) {
                        Some(field) => field.ty.set_span(node.span.clone()),
                        None => Type::new(TypeKind::Any, node.span.clone()),
                    }
                }
                (TypeKind::List(inner), TypeKind::Int) => inner.set_span(node.span.clone()),
                (TypeKind::String, TypeKind::Int) => {
                    Type::new(TypeKind::String, node.span.clone())
                }
                _ => {
                    self.error(
                        format!("Type '{base_ty}' cannot be indexed by '{index_ty}'"),
                        node.span.clone(),
                    );
                    Type::unknown(node.span.clone())
                }
            }
        };

        AnalyzedExpression::Index(AnalyzedIndexExpr {
            base: Box::new(base),
            index: Box::new(index),
            ty,
            span: node.span.clone(),
        })
    }

    fn member_expr(&mut self, node: &ast::MemberExpr) -> AnalyzedExpression {
        let base = self.expression(&node.base);
        let base_ty = base.result_type();

        let ty = if base_ty.is_unknown() || base_ty.is_never() {
            Type::unknown(node.span.clone())
        } else if matches!(base_ty.kind, TypeKind::Any) {
            Type::new(TypeKind::Any, node.span.clone())
        } else {
            match fields_of(&base_ty).get(&node.member.name) {
                Some(member_ty) => member_ty.set_span(node.member.span.clone()),
                None => {
                    self.error(
                        format!(
                            "Type '{base_ty}' has no member '{}'",
                            node.member.name
                        ),
                        node.member.span.clone(),
                    );
                    Type::unknown(node.span.clone())
                }
            }
        };

        AnalyzedExpression::Member(AnalyzedMemberExpr {
            base: Box::new(base),
            member: node.member.name.clone(),
            ty,
            span: node.span.clone(),
        })
    }

    fn cast_expr(&mut self, node: &ast::CastExpr) -> AnalyzedExpression {
        // The target annotation makes the base an annotated slot.
        let saved_flag = std::mem::take(&mut self.module_mut().error_if_any_present);
        let base = self.expression(&node.base);
        self.module_mut().error_if_any_present = saved_flag;

        let target = self.convert_type(&node.type_expr, true);
        let base_ty = base.result_type();

        let always_castable = matches!(
            base_ty.kind,
            TypeKind::Int | TypeKind::Float | TypeKind::Bool
        ) && matches!(
            target.kind,
            TypeKind::Int | TypeKind::Float | TypeKind::Bool
        );
        let object_erasure = matches!(base_ty.kind, TypeKind::Object(_))
            && matches!(target.kind, TypeKind::AnyObject);

        if !always_castable && !object_erasure {
            if let Some(err) = type_check(&base_ty, &target, TypeCheckOptions::no_fn_types()) {
                self.emit_compat(err.at_span(node.span.clone()));
            }
        }

        AnalyzedExpression::Cast(AnalyzedCastExpr {
            base: Box::new(base),
            ty: target.set_span(node.span.clone()),
            span: node.span.clone(),
        })
    }

    // ========================================================================
    // Control flow
    // ========================================================================

    /// Report a non-`bool` condition. Conditions have no interesting
    /// "expected" side, so this does not go through `emit_compat`.
    pub(crate) fn check_condition(&mut self, condition: &AnalyzedExpression) {
        let ty = condition.result_type();
        if !matches!(
            ty.kind,
            TypeKind::Bool | TypeKind::Unknown | TypeKind::Never | TypeKind::Any
        ) {
            self.error(
                format!("Mismatched types: expected 'bool', got '{ty}'"),
                condition.span().clone(),
            );
        }
    }

    fn if_expr(&mut self, node: &ast::IfExpr) -> AnalyzedExpression {
        let condition = self.expression(&node.condition);
        self.check_condition(&condition);

        let then_block = self.block(&node.then_block, true);
        let then_ty = then_block.result_type();

        let (else_block, ty) = match &node.else_block {
            Some(else_expr) => {
                let analyzed = self.expression(else_expr);
                let else_ty = analyzed.result_type();
                let ty = self.unify_branches(&then_ty, &else_ty, node.span.clone());
                (Some(Box::new(analyzed)), ty)
            }
            None => {
                let ty = if matches!(
                    then_ty.kind,
                    TypeKind::Null | TypeKind::Never | TypeKind::Unknown
                ) {
                    Type::new(TypeKind::Null, node.span.clone())
                } else {
                    self.error(
                        format!("Mismatched types: missing `else` branch with result type '{then_ty}'"),
                        node.span.clone(),
                    );
                    Type::unknown(node.span.clone())
                };
                (None, ty)
            }
        };

        AnalyzedExpression::If(AnalyzedIfExpr {
            condition: Box::new(condition),
            then_block,
            else_block,
            ty,
            span: node.span.clone(),
        })
    }

    /// Unify two branch result types the way `if`/`try` require.
    fn unify_branches(&mut self, first: &Type, second: &Type, span: Span) -> Type {
        if first.is_never() && second.is_never() {
            return Type::new(TypeKind::Never, span);
        }
        if first.is_never() {
            return second.set_span(span);
        }
        if second.is_never() {
            return first.set_span(span);
        }
        if let Some(err) = type_check(second, first, TypeCheckOptions::default()) {
            self.emit_compat(err);
            return Type::unknown(span);
        }
        first.set_span(span)
    }

    fn match_expr(&mut self, node: &ast::MatchExpr) -> AnalyzedExpression {
        let control = self.expression(&node.control);
        let control_ty = control.result_type();

        let mut arms = Vec::with_capacity(node.arms.len());
        let mut result: Option<Type> = None;
        let mut has_default = false;

        for arm in &node.arms {
            if has_default {
                match &arm.literal {
                    None => self.error("Duplicate default match arm ('_')", arm.span.clone()),
                    Some(_) => self.emit(
                        Diagnostic::warning("Unreachable match arm", arm.span.clone())
                            .with_note("the default arm above matches every value"),
                    ),
                }
            }

            let literal = match &arm.literal {
                Some(literal) => {
                    let analyzed = self.expression(literal);
                    if !analyzed.constant() {
                        self.error(
                            "Match arm patterns must be constant values",
                            analyzed.span().clone(),
                        );
                    }
                    if let Some(err) = type_check(
                        &analyzed.result_type(),
                        &control_ty,
                        TypeCheckOptions::default(),
                    ) {
                        self.emit_compat(err);
                    }
                    Some(analyzed)
                }
                None => {
                    has_default = true;
                    None
                }
            };

            let action = self.expression(&arm.action);
            let action_ty = action.result_type();
            let unified = match result.take() {
                None => action_ty,
                Some(acc) => {
                    let span = acc.span.clone();
                    self.unify_branches(&acc, &action_ty, span)
                }
            };
            result = Some(unified);

            arms.push(AnalyzedMatchArm { literal, action });
        }

        let ty = result
            .unwrap_or_else(|| Type::new(TypeKind::Null, node.span.clone()))
            .set_span(node.span.clone());

        if !has_default
            && !matches!(
                ty.kind,
                TypeKind::Null | TypeKind::Never | TypeKind::Unknown
            )
        {
            self.error(
                format!("Non-exhaustive match: a default arm ('_') is required when arms produce '{ty}'"),
                node.span.clone(),
            );
        }

        AnalyzedExpression::Match(AnalyzedMatchExpr {
            control: Box::new(control),
            arms,
            ty,
            span: node.span.clone(),
        })
    }

    fn try_expr(&mut self, node: &ast::TryExpr) -> AnalyzedExpression {
        let try_block = self.block(&node.try_block, true);

        self.push_scope();
        let error_ty = super::types::error_record_type(node.catch_ident.span.clone());
        let var = super::scope::Variable::new(
            error_ty,
            node.catch_ident.span.clone(),
            super::scope::VariableOrigin::Normal,
        );
        self.module_mut()
            .add_var(node.catch_ident.name.clone(), var, true);
        let catch_block = self.block(&node.catch_block, false);
        self.pop_scope();

        let try_ty = try_block.result_type();
        let catch_ty = catch_block.result_type();
        let ty = self.unify_branches(&try_ty, &catch_ty, node.span.clone());

        AnalyzedExpression::Try(AnalyzedTryExpr {
            try_block,
            catch_ident: node.catch_ident.name.clone(),
            catch_block,
            ty,
            span: node.span.clone(),
        })
    }
}

/// Result kind of an infix operation, dispatched on the left type.
/// Equality operators are handled separately; `None` means unsupported.
fn infix_result_kind(lhs: &TypeKind, op: ast::InfixOp) -> Option<TypeKind> {
    use ast::InfixOp::*;
    match lhs {
        TypeKind::Int => match op {
            Plus | Minus | Mul | Div | Rem | Pow | Shl | Shr | BitAnd | BitOr | BitXor => {
                Some(TypeKind::Int)
            }
            Lt | Lte | Gt | Gte => Some(TypeKind::Bool),
            _ => None,
        },
        TypeKind::Float => match op {
            Plus | Minus | Mul | Div | Pow => Some(TypeKind::Float),
            Lt | Lte | Gt | Gte => Some(TypeKind::Bool),
            _ => None,
        },
        TypeKind::String => match op {
            Plus => Some(TypeKind::String),
            _ => None,
        },
        TypeKind::Bool => match op {
            And | Or => Some(TypeKind::Bool),
            _ => None,
        },
        _ => None,
    }
}

/// The handle object a `spawn` call evaluates to.
fn spawn_handle_type(return_type: Type, span: Span) -> Type {
    let join = FunctionType::new(Params::Normal(vec![]), Span::synthetic(), return_type)
        .into_type(Span::synthetic());
    Type::new(
        TypeKind::Object(ObjectType {
            fields: vec![ObjectTypeField {
                name: "join".to_string(),
                ty: join,
                span: Span::synthetic(),
                annotation: None,
            }],
        }),
        span,
    )
}
