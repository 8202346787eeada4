// Expression and statement parser for Homescript using Pratt parsing
//
// Precedence, lowest to highest:
// - Assignment (= += -= ...), right-associative
// - Range (..)
// - Logical OR (||)
// - Logical AND (&&)
// - Bitwise OR (|), XOR (^), AND (&)
// - Equality (== !=)
// - Comparison (< <= > >=)
// - Shift (<< >>)
// - Additive (+ -)
// - Multiplicative (* / %)
// - Exponential (**)
// - Unary (! - some spawn)
// - Postfix (call, index, member, cast)

use crate::ast;
use crate::lexer::{unescape_string, TokenKind};

use super::Parser;

/// Precedence levels for Pratt parsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Precedence {
    None,
    Assign,
    Range,
    Or,
    And,
    BitOr,
    BitXor,
    BitAnd,
    Equality,
    Comparison,
    Shift,
    Additive,
    Multiplicative,
    Exponential,
    Unary,
    Postfix,
}

fn infix_precedence(kind: TokenKind) -> Option<Precedence> {
    use TokenKind::*;
    Option::Some(match kind {
        Eq | PlusEq | MinusEq | StarEq | SlashEq | PercentEq | StarStarEq | ShlEq | ShrEq
        | AmpEq | PipeEq | CaretEq => Precedence::Assign,
        DotDot => Precedence::Range,
        PipePipe => Precedence::Or,
        AmpAmp => Precedence::And,
        Pipe => Precedence::BitOr,
        Caret => Precedence::BitXor,
        Amp => Precedence::BitAnd,
        EqEq | BangEq => Precedence::Equality,
        Lt | LtEq | Gt | GtEq => Precedence::Comparison,
        Shl | Shr => Precedence::Shift,
        Plus | Minus => Precedence::Additive,
        Star | Slash | Percent => Precedence::Multiplicative,
        StarStar => Precedence::Exponential,
        Dot | LParen | LBracket | As => Precedence::Postfix,
        _ => return Option::None,
    })
}

fn binary_op(kind: TokenKind) -> Option<ast::InfixOp> {
    use TokenKind::*;
    Option::Some(match kind {
        Plus => ast::InfixOp::Plus,
        Minus => ast::InfixOp::Minus,
        Star => ast::InfixOp::Mul,
        Slash => ast::InfixOp::Div,
        Percent => ast::InfixOp::Rem,
        StarStar => ast::InfixOp::Pow,
        Shl => ast::InfixOp::Shl,
        Shr => ast::InfixOp::Shr,
        Amp => ast::InfixOp::BitAnd,
        Pipe => ast::InfixOp::BitOr,
        Caret => ast::InfixOp::BitXor,
        AmpAmp => ast::InfixOp::And,
        PipePipe => ast::InfixOp::Or,
        EqEq => ast::InfixOp::Eq,
        BangEq => ast::InfixOp::Neq,
        Lt => ast::InfixOp::Lt,
        LtEq => ast::InfixOp::Lte,
        Gt => ast::InfixOp::Gt,
        GtEq => ast::InfixOp::Gte,
        _ => return Option::None,
    })
}

fn assign_op(kind: TokenKind) -> Option<ast::AssignOp> {
    use TokenKind::*;
    Option::Some(match kind {
        Eq => ast::AssignOp::Assign,
        PlusEq => ast::AssignOp::Plus,
        MinusEq => ast::AssignOp::Minus,
        StarEq => ast::AssignOp::Mul,
        SlashEq => ast::AssignOp::Div,
        PercentEq => ast::AssignOp::Rem,
        StarStarEq => ast::AssignOp::Pow,
        ShlEq => ast::AssignOp::Shl,
        ShrEq => ast::AssignOp::Shr,
        AmpEq => ast::AssignOp::BitAnd,
        PipeEq => ast::AssignOp::BitOr,
        CaretEq => ast::AssignOp::BitXor,
        _ => return Option::None,
    })
}

impl<'a> Parser<'a> {
    /// Parse an expression.
    pub(super) fn parse_expression(&mut self) -> Option<ast::Expression> {
        self.parse_expr_precedence(Precedence::None)
    }

    /// Parse expression with minimum precedence (Pratt parsing).
    fn parse_expr_precedence(&mut self, min_prec: Precedence) -> Option<ast::Expression> {
        let mut left = self.parse_prefix()?;

        while let Some(prec) = infix_precedence(self.current_kind()) {
            if prec <= min_prec {
                break;
            }
            left = self.parse_infix(left, prec)?;
        }

        Some(left)
    }

    /// Parse prefix expression (unary or primary).
    fn parse_prefix(&mut self) -> Option<ast::Expression> {
        let op = match self.current_kind() {
            TokenKind::Minus => Some(ast::PrefixOp::Neg),
            TokenKind::Bang => Some(ast::PrefixOp::Not),
            TokenKind::Some => Some(ast::PrefixOp::Some),
            _ => None,
        };

        if let Some(op) = op {
            let start = self.advance().span;
            let rhs = self.parse_expr_precedence(Precedence::Unary)?;
            let span = start.until(rhs.span());
            return Some(ast::Expression::Prefix(ast::PrefixExpr {
                op,
                rhs: Box::new(rhs),
                span,
            }));
        }

        if self.check(TokenKind::Spawn) {
            return self.parse_spawn();
        }

        self.parse_primary()
    }

    /// `spawn f(args)`: the operand must be a call expression.
    fn parse_spawn(&mut self) -> Option<ast::Expression> {
        let start = self.expect(TokenKind::Spawn)?.span;
        let operand = self.parse_expr_precedence(Precedence::Unary)?;

        match operand {
            ast::Expression::Call(mut call) => {
                call.is_spawn = true;
                call.span = start.until(&call.span);
                Some(ast::Expression::Call(call))
            }
            other => {
                self.diagnostics.error(
                    "Expected function call after 'spawn'",
                    other.span().clone(),
                );
                Some(other)
            }
        }
    }

    fn parse_infix(
        &mut self,
        left: ast::Expression,
        prec: Precedence,
    ) -> Option<ast::Expression> {
        let kind = self.current_kind();

        // Postfix forms
        match kind {
            TokenKind::LParen => return self.parse_call(left),
            TokenKind::LBracket => return self.parse_index(left),
            TokenKind::Dot => return self.parse_member(left),
            TokenKind::As => return self.parse_cast(left),
            _ => {}
        }

        // Assignment (right-associative)
        if let Some(op) = assign_op(kind) {
            self.advance();
            let rhs = self.parse_expr_precedence(Precedence::None)?;
            let span = left.span().until(rhs.span());
            return Some(ast::Expression::Assign(ast::AssignExpr {
                lhs: Box::new(left),
                op,
                rhs: Box::new(rhs),
                span,
            }));
        }

        // Range
        if kind == TokenKind::DotDot {
            self.advance();
            let end = self.parse_expr_precedence(prec)?;
            let span = left.span().until(end.span());
            return Some(ast::Expression::Range(ast::RangeExpr {
                start: Box::new(left),
                end: Box::new(end),
                span,
            }));
        }

        // Ordinary binary operators (left-associative)
        let op = binary_op(kind)?;
        self.advance();
        let rhs = self.parse_expr_precedence(prec)?;
        let span = left.span().until(rhs.span());
        Some(ast::Expression::Infix(ast::InfixExpr {
            lhs: Box::new(left),
            op,
            rhs: Box::new(rhs),
            span,
        }))
    }

    fn parse_call(&mut self, base: ast::Expression) -> Option<ast::Expression> {
        self.expect(TokenKind::LParen)?;
        let args = self.parse_call_args()?;
        let close = self.expect(TokenKind::RParen)?.span;
        let span = base.span().until(&close);
        Some(ast::Expression::Call(ast::CallExpr {
            base: Box::new(base),
            args,
            is_spawn: false,
            span,
        }))
    }

    /// Comma-separated arguments, stopping before the closing paren.
    pub(super) fn parse_call_args(&mut self) -> Option<Vec<ast::Expression>> {
        let mut args = Vec::new();
        if !self.check(TokenKind::RParen) {
            loop {
                args.push(self.parse_expression()?);
                if self.consume(TokenKind::Comma).is_none() {
                    break;
                }
            }
        }
        Some(args)
    }

    fn parse_index(&mut self, base: ast::Expression) -> Option<ast::Expression> {
        self.expect(TokenKind::LBracket)?;
        let index = self.parse_expression()?;
        let close = self.expect(TokenKind::RBracket)?.span;
        let span = base.span().until(&close);
        Some(ast::Expression::Index(ast::IndexExpr {
            base: Box::new(base),
            index: Box::new(index),
            span,
        }))
    }

    fn parse_member(&mut self, base: ast::Expression) -> Option<ast::Expression> {
        self.expect(TokenKind::Dot)?;
        let member = self.expect_identifier()?;
        let span = base.span().until(&member.span);
        Some(ast::Expression::Member(ast::MemberExpr {
            base: Box::new(base),
            member,
            span,
        }))
    }

    fn parse_cast(&mut self, base: ast::Expression) -> Option<ast::Expression> {
        self.expect(TokenKind::As)?;
        let type_expr = self.parse_type()?;
        let span = base.span().until(type_expr.span());
        Some(ast::Expression::Cast(ast::CastExpr {
            base: Box::new(base),
            type_expr,
            span,
        }))
    }

    fn parse_primary(&mut self) -> Option<ast::Expression> {
        match self.current_kind() {
            TokenKind::IntLiteral => {
                let token = self.advance();
                let text = token.text(self.source).replace('_', "");
                let value = match text.parse::<i64>() {
                    Ok(v) => v,
                    Err(_) => {
                        self.diagnostics
                            .error("Integer literal out of range", token.span.clone());
                        0
                    }
                };
                Some(ast::Expression::Int(ast::IntLiteral {
                    value,
                    span: token.span,
                }))
            }
            TokenKind::FloatLiteral => {
                let token = self.advance();
                let text = token.text(self.source).replace('_', "");
                let value = match text.parse::<f64>() {
                    Ok(v) => v,
                    Err(_) => {
                        self.diagnostics
                            .error("Float literal out of range", token.span.clone());
                        0.0
                    }
                };
                Some(ast::Expression::Float(ast::FloatLiteral {
                    value,
                    span: token.span,
                }))
            }
            TokenKind::StringLiteral => {
                let token = self.advance();
                let value = unescape_string(token.text(self.source));
                Some(ast::Expression::Str(ast::StrLiteral {
                    value,
                    span: token.span,
                }))
            }
            TokenKind::True | TokenKind::False => {
                let value = self.check(TokenKind::True);
                let token = self.advance();
                Some(ast::Expression::Bool(ast::BoolLiteral {
                    value,
                    span: token.span,
                }))
            }
            TokenKind::Null => {
                let token = self.advance();
                Some(ast::Expression::Null(ast::NullLiteral { span: token.span }))
            }
            TokenKind::None => {
                let token = self.advance();
                Some(ast::Expression::None(ast::NoneLiteral { span: token.span }))
            }
            TokenKind::Identifier => Some(ast::Expression::Ident(self.expect_identifier()?)),
            TokenKind::AtIdent => Some(ast::Expression::Singleton(self.expect_at_ident()?)),
            TokenKind::LParen => {
                let open = self.advance().span;
                let inner = self.parse_expression()?;
                let close = self.expect(TokenKind::RParen)?.span;
                Some(ast::Expression::Grouped(ast::GroupedExpr {
                    inner: Box::new(inner),
                    span: open.until(&close),
                }))
            }
            TokenKind::LBracket => {
                let open = self.advance().span;
                let mut values = Vec::new();
                if !self.check(TokenKind::RBracket) {
                    loop {
                        values.push(self.parse_expression()?);
                        if self.consume(TokenKind::Comma).is_none() {
                            break;
                        }
                        if self.check(TokenKind::RBracket) {
                            break;
                        }
                    }
                }
                let close = self.expect(TokenKind::RBracket)?.span;
                Some(ast::Expression::List(ast::ListLiteral {
                    values,
                    span: open.until(&close),
                }))
            }
            TokenKind::New => self.parse_object_literal(),
            TokenKind::Fn => self.parse_lambda(),
            TokenKind::LBrace => {
                let block = self.parse_block()?;
                Some(ast::Expression::Block(Box::new(block)))
            }
            TokenKind::If => self.parse_if(),
            TokenKind::Match => self.parse_match(),
            TokenKind::Try => self.parse_try(),
            _ => {
                self.error_expected("expression");
                None
            }
        }
    }

    /// `new { key: value, ... }`
    fn parse_object_literal(&mut self) -> Option<ast::Expression> {
        let start = self.expect(TokenKind::New)?.span;
        self.expect(TokenKind::LBrace)?;

        let mut fields = Vec::new();
        if !self.check(TokenKind::RBrace) {
            loop {
                let key = self.expect_identifier()?;
                self.expect(TokenKind::Colon)?;
                let value = self.parse_expression()?;
                fields.push(ast::ObjectLiteralField { key, value });

                if self.consume(TokenKind::Comma).is_none() {
                    break;
                }
                if self.check(TokenKind::RBrace) {
                    break;
                }
            }
        }

        let close = self.expect(TokenKind::RBrace)?.span;
        Some(ast::Expression::Object(ast::ObjectLiteral {
            fields,
            span: start.until(&close),
        }))
    }

    /// `fn(params) -> T? { ... }` in expression position.
    fn parse_lambda(&mut self) -> Option<ast::Expression> {
        let start = self.expect(TokenKind::Fn)?.span;
        let (params, params_span) = self.parse_param_list()?;

        let return_type = if self.consume(TokenKind::Arrow).is_some() {
            Some(self.parse_type()?)
        } else {
            None
        };

        let body = self.parse_block()?;
        let span = start.until(&body.span);

        Some(ast::Expression::Lambda(ast::LambdaExpr {
            params,
            params_span,
            return_type,
            body,
            span,
        }))
    }

    fn parse_if(&mut self) -> Option<ast::Expression> {
        let start = self.expect(TokenKind::If)?.span;
        let condition = self.parse_expression()?;
        let then_block = self.parse_block()?;

        let (else_block, end) = if self.consume(TokenKind::Else).is_some() {
            if self.check(TokenKind::If) {
                let nested = self.parse_if()?;
                let end = nested.span().clone();
                (Some(Box::new(nested)), end)
            } else {
                let block = self.parse_block()?;
                let end = block.span.clone();
                (
                    Some(Box::new(ast::Expression::Block(Box::new(block)))),
                    end,
                )
            }
        } else {
            (None, then_block.span.clone())
        };

        Some(ast::Expression::If(ast::IfExpr {
            condition: Box::new(condition),
            then_block,
            else_block,
            span: start.until(&end),
        }))
    }

    fn parse_match(&mut self) -> Option<ast::Expression> {
        let start = self.expect(TokenKind::Match)?.span;
        let control = self.parse_expression()?;
        self.expect(TokenKind::LBrace)?;

        let mut arms = Vec::new();
        while !self.check(TokenKind::RBrace) && !self.check(TokenKind::Eof) {
            let literal = if self.check(TokenKind::Identifier) && self.current_text() == "_" {
                self.advance();
                None
            } else {
                Some(self.parse_expression()?)
            };

            self.expect(TokenKind::FatArrow)?;
            let action = self.parse_expression()?;
            let arm_start = literal
                .as_ref()
                .map(|l| l.span().clone())
                .unwrap_or_else(|| action.span().clone());
            let span = arm_start.until(action.span());
            arms.push(ast::MatchArm {
                literal,
                action,
                span,
            });

            if self.consume(TokenKind::Comma).is_none() {
                break;
            }
        }

        let close = self.expect(TokenKind::RBrace)?.span;
        Some(ast::Expression::Match(ast::MatchExpr {
            control: Box::new(control),
            arms,
            span: start.until(&close),
        }))
    }

    fn parse_try(&mut self) -> Option<ast::Expression> {
        let start = self.expect(TokenKind::Try)?.span;
        let try_block = self.parse_block()?;
        self.expect(TokenKind::Catch)?;
        let catch_ident = self.expect_identifier()?;
        let catch_block = self.parse_block()?;
        let span = start.until(&catch_block.span);

        Some(ast::Expression::Try(ast::TryExpr {
            try_block,
            catch_ident,
            catch_block,
            span,
        }))
    }

    // =========================================================================
    // Statements and blocks
    // =========================================================================

    /// `{ statements... trailing_expr? }`
    pub(super) fn parse_block(&mut self) -> Option<ast::Block> {
        let open = self.expect(TokenKind::LBrace)?.span;

        let mut statements = Vec::new();
        let mut trailing_expr = None;

        while !self.check(TokenKind::RBrace) && !self.check(TokenKind::Eof) {
            let stmt = match self.current_kind() {
                TokenKind::Let => self.parse_let_stmt(false).map(ast::Statement::Let),
                TokenKind::Return => self.parse_return_stmt().map(ast::Statement::Return),
                TokenKind::Break => self.parse_break_stmt().map(ast::Statement::Break),
                TokenKind::Continue => self.parse_continue_stmt().map(ast::Statement::Continue),
                TokenKind::Loop => self.parse_loop_stmt().map(ast::Statement::Loop),
                TokenKind::While => self.parse_while_stmt().map(ast::Statement::While),
                TokenKind::For => self.parse_for_stmt().map(ast::Statement::For),
                TokenKind::Trigger => self.parse_trigger_stmt().map(ast::Statement::Trigger),
                _ => {
                    match self.parse_expression() {
                        Some(expr) => {
                            if self.check(TokenKind::RBrace) {
                                trailing_expr = Some(Box::new(expr));
                                break;
                            }
                            let end = match self.expect(TokenKind::Semicolon) {
                                Some(token) => token.span,
                                None => {
                                    self.synchronize_stmt();
                                    continue;
                                }
                            };
                            let span = expr.span().until(&end);
                            Some(ast::Statement::Expr(ast::ExprStmt { expr, span }))
                        }
                        None => None,
                    }
                }
            };

            match stmt {
                Some(stmt) => statements.push(stmt),
                None => self.synchronize_stmt(),
            }
        }

        let close = self.expect(TokenKind::RBrace)?.span;
        Some(ast::Block {
            statements,
            trailing_expr,
            span: open.until(&close),
        })
    }

    /// `let name: T? = expr;` - `is_pub` is true only for `pub let` globals.
    pub(super) fn parse_let_stmt(&mut self, is_pub: bool) -> Option<ast::LetStmt> {
        let start = self.expect(TokenKind::Let)?.span;
        let name = self.expect_identifier()?;

        let type_annotation = if self.consume(TokenKind::Colon).is_some() {
            Some(self.parse_type()?)
        } else {
            None
        };

        self.expect(TokenKind::Eq)?;
        let initializer = self.parse_expression()?;
        let end = self.expect(TokenKind::Semicolon)?.span;

        Some(ast::LetStmt {
            is_pub,
            name,
            type_annotation,
            initializer,
            span: start.until(&end),
        })
    }

    fn parse_return_stmt(&mut self) -> Option<ast::ReturnStmt> {
        let start = self.expect(TokenKind::Return)?.span;
        let value = if self.check(TokenKind::Semicolon) {
            None
        } else {
            Some(self.parse_expression()?)
        };
        let end = self.expect(TokenKind::Semicolon)?.span;
        Some(ast::ReturnStmt {
            value,
            span: start.until(&end),
        })
    }

    fn parse_break_stmt(&mut self) -> Option<ast::BreakStmt> {
        let start = self.expect(TokenKind::Break)?.span;
        let end = self.expect(TokenKind::Semicolon)?.span;
        Some(ast::BreakStmt {
            span: start.until(&end),
        })
    }

    fn parse_continue_stmt(&mut self) -> Option<ast::ContinueStmt> {
        let start = self.expect(TokenKind::Continue)?.span;
        let end = self.expect(TokenKind::Semicolon)?.span;
        Some(ast::ContinueStmt {
            span: start.until(&end),
        })
    }

    fn parse_loop_stmt(&mut self) -> Option<ast::LoopStmt> {
        let start = self.expect(TokenKind::Loop)?.span;
        let body = self.parse_block()?;
        let span = start.until(&body.span);
        Some(ast::LoopStmt { body, span })
    }

    fn parse_while_stmt(&mut self) -> Option<ast::WhileStmt> {
        let start = self.expect(TokenKind::While)?.span;
        let condition = self.parse_expression()?;
        let body = self.parse_block()?;
        let span = start.until(&body.span);
        Some(ast::WhileStmt {
            condition,
            body,
            span,
        })
    }

    fn parse_for_stmt(&mut self) -> Option<ast::ForStmt> {
        let start = self.expect(TokenKind::For)?.span;
        let binding = self.expect_identifier()?;
        self.expect(TokenKind::In)?;
        let iterable = self.parse_expression()?;
        let body = self.parse_block()?;
        let span = start.until(&body.span);
        Some(ast::ForStmt {
            binding,
            iterable,
            body,
            span,
        })
    }

    /// `trigger callback every source(args);`
    fn parse_trigger_stmt(&mut self) -> Option<ast::TriggerStmt> {
        let start = self.expect(TokenKind::Trigger)?.span;
        let callback = self.expect_identifier()?;
        let connective = self.parse_connective()?;
        let trigger = self.expect_identifier()?;
        self.expect(TokenKind::LParen)?;
        let args = self.parse_call_args()?;
        self.expect(TokenKind::RParen)?;
        let end = self.expect(TokenKind::Semicolon)?.span;

        Some(ast::TriggerStmt {
            callback,
            connective,
            trigger,
            args,
            span: start.until(&end),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::super::parse;
    use crate::ast::{self, Expression, Item, Statement};

    fn parse_body(source: &str) -> ast::Block {
        let full = format!("fn main() {{ {source} }}");
        let result = parse(&full, "test.hms");
        assert!(
            !result.diagnostics.has_errors(),
            "parse errors: {:?}",
            result.diagnostics
        );
        let program = result.program.unwrap();
        let Item::Fn(def) = &program.items[0] else {
            panic!("expected fn");
        };
        def.body.clone()
    }

    #[test]
    fn test_precedence() {
        let body = parse_body("let x = 1 + 2 * 3;");
        let Statement::Let(stmt) = &body.statements[0] else {
            panic!("expected let");
        };
        let Expression::Infix(add) = &stmt.initializer else {
            panic!("expected infix");
        };
        assert_eq!(add.op, ast::InfixOp::Plus);
        assert!(matches!(&*add.rhs, Expression::Infix(m) if m.op == ast::InfixOp::Mul));
    }

    #[test]
    fn test_assignment_is_right_associative() {
        let body = parse_body("a = b = 1;");
        let Statement::Expr(stmt) = &body.statements[0] else {
            panic!("expected expr stmt");
        };
        let Expression::Assign(outer) = &stmt.expr else {
            panic!("expected assign");
        };
        assert!(matches!(&*outer.rhs, Expression::Assign(_)));
    }

    #[test]
    fn test_postfix_chain() {
        let body = parse_body("let x = items[0].name.len();");
        let Statement::Let(stmt) = &body.statements[0] else {
            panic!("expected let");
        };
        assert!(matches!(&stmt.initializer, Expression::Call(_)));
    }

    #[test]
    fn test_trailing_expr() {
        let body = parse_body("let x = 1; x");
        assert_eq!(body.statements.len(), 1);
        assert!(body.trailing_expr.is_some());
    }

    #[test]
    fn test_spawn_call() {
        let body = parse_body("spawn work(1);");
        let Statement::Expr(stmt) = &body.statements[0] else {
            panic!("expected expr stmt");
        };
        let Expression::Call(call) = &stmt.expr else {
            panic!("expected call");
        };
        assert!(call.is_spawn);
    }

    #[test]
    fn test_match_with_default() {
        let body = parse_body("let x = match code { 0 => 'ok', 1 => 'warn', _ => 'err', };");
        let Statement::Let(stmt) = &body.statements[0] else {
            panic!("expected let");
        };
        let Expression::Match(m) = &stmt.initializer else {
            panic!("expected match");
        };
        assert_eq!(m.arms.len(), 3);
        assert!(m.arms[2].literal.is_none());
    }

    #[test]
    fn test_try_catch() {
        let body = parse_body("let x = try { 1 } catch err { 0 };");
        let Statement::Let(stmt) = &body.statements[0] else {
            panic!("expected let");
        };
        let Expression::Try(t) = &stmt.initializer else {
            panic!("expected try");
        };
        assert_eq!(t.catch_ident.name, "err");
    }

    #[test]
    fn test_trigger_stmt() {
        let body = parse_body("trigger on_motion every motion_detected(3);");
        let Statement::Trigger(stmt) = &body.statements[0] else {
            panic!("expected trigger stmt");
        };
        assert_eq!(stmt.callback.name, "on_motion");
        assert_eq!(stmt.connective, ast::TriggerConnective::Every);
        assert_eq!(stmt.trigger.name, "motion_detected");
        assert_eq!(stmt.args.len(), 1);
    }

    #[test]
    fn test_range_and_cast() {
        let body = parse_body("for i in 0..10 { let f = i as float; }");
        let Statement::For(stmt) = &body.statements[0] else {
            panic!("expected for");
        };
        assert!(matches!(&stmt.iterable, Expression::Range(_)));
    }

    #[test]
    fn test_some_and_none() {
        let body = parse_body("let x: ?int = some 5; let y: ?int = none;");
        assert_eq!(body.statements.len(), 2);
        let Statement::Let(first) = &body.statements[0] else {
            panic!("expected let");
        };
        assert!(
            matches!(&first.initializer, Expression::Prefix(p) if p.op == ast::PrefixOp::Some)
        );
    }

    #[test]
    fn test_lambda() {
        let body = parse_body("let f = fn(x: int) -> int { x * 2 };");
        let Statement::Let(stmt) = &body.statements[0] else {
            panic!("expected let");
        };
        assert!(matches!(&stmt.initializer, Expression::Lambda(_)));
    }
}
