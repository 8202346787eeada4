// Type expression parser for Homescript

use crate::ast;
use crate::lexer::TokenKind;

use super::Parser;

impl<'a> Parser<'a> {
    /// Parse a type expression.
    pub(super) fn parse_type(&mut self) -> Option<ast::TypeExpr> {
        match self.current_kind() {
            TokenKind::Identifier => {
                let ident = self.expect_identifier()?;
                Some(ast::TypeExpr::Named(ident))
            }
            // `null` is a keyword token but a perfectly ordinary type name.
            TokenKind::Null => {
                let token = self.advance();
                Some(ast::TypeExpr::Named(ast::Ident::new("null", token.span)))
            }
            TokenKind::AtIdent => {
                let ident = self.expect_at_ident()?;
                Some(ast::TypeExpr::Singleton(ident))
            }
            TokenKind::LBracket => {
                let open = self.advance().span;
                let inner = self.parse_type()?;
                let close = self.expect(TokenKind::RBracket)?.span;
                Some(ast::TypeExpr::List(ast::ListTypeExpr {
                    inner: Box::new(inner),
                    span: open.until(&close),
                }))
            }
            TokenKind::Question => {
                let start = self.advance().span;
                let inner = self.parse_type()?;
                let span = start.until(inner.span());
                Some(ast::TypeExpr::Option(ast::OptionTypeExpr {
                    inner: Box::new(inner),
                    span,
                }))
            }
            TokenKind::LBrace => self.parse_object_type(),
            TokenKind::Fn => self.parse_function_type(),
            _ => {
                self.error_expected("type");
                None
            }
        }
    }

    /// `{ ? }` or `{ annotation? name: type, ... }`
    fn parse_object_type(&mut self) -> Option<ast::TypeExpr> {
        let open = self.expect(TokenKind::LBrace)?.span;

        // The any-object short form.
        if self.check(TokenKind::Question) {
            self.advance();
            let close = self.expect(TokenKind::RBrace)?.span;
            return Some(ast::TypeExpr::AnyObject(ast::AnyObjectTypeExpr {
                span: open.until(&close),
            }));
        }

        let mut fields = Vec::new();
        if !self.check(TokenKind::RBrace) {
            loop {
                let annotation = if self.consume(TokenKind::Hash).is_some() {
                    Some(self.expect_identifier()?)
                } else {
                    None
                };
                let name = self.expect_identifier()?;
                self.expect(TokenKind::Colon)?;
                let type_expr = self.parse_type()?;
                fields.push(ast::ObjectTypeField {
                    annotation,
                    name,
                    type_expr,
                });

                if self.consume(TokenKind::Comma).is_none() {
                    break;
                }
                if self.check(TokenKind::RBrace) {
                    break;
                }
            }
        }

        let close = self.expect(TokenKind::RBrace)?.span;
        Some(ast::TypeExpr::Object(ast::ObjectTypeExpr {
            fields,
            span: open.until(&close),
        }))
    }

    /// `fn(name: type, ...) -> type`
    fn parse_function_type(&mut self) -> Option<ast::TypeExpr> {
        let start = self.expect(TokenKind::Fn)?.span;
        let (params, params_span) = self.parse_param_list()?;

        let (return_type, end) = if self.consume(TokenKind::Arrow).is_some() {
            let ret = self.parse_type()?;
            let end = ret.span().clone();
            (Some(Box::new(ret)), end)
        } else {
            (None, params_span.clone())
        };

        Some(ast::TypeExpr::Function(ast::FunctionTypeExpr {
            params,
            params_span,
            return_type,
            span: start.until(&end),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::super::parse;
    use crate::ast::{Item, TypeExpr};

    fn parse_type_of_global(source: &str) -> TypeExpr {
        let result = parse(source, "test.hms");
        assert!(
            !result.diagnostics.has_errors(),
            "parse errors: {:?}",
            result.diagnostics
        );
        let program = result.program.unwrap();
        let Item::GlobalLet(stmt) = &program.items[0] else {
            panic!("expected global let");
        };
        stmt.type_annotation.clone().unwrap()
    }

    #[test]
    fn test_nested_types() {
        let ty = parse_type_of_global("let x: [?{ a: int }] = [];");
        let TypeExpr::List(list) = ty else {
            panic!("expected list");
        };
        let TypeExpr::Option(opt) = *list.inner else {
            panic!("expected option");
        };
        assert!(matches!(*opt.inner, TypeExpr::Object(_)));
    }

    #[test]
    fn test_any_object() {
        let ty = parse_type_of_global("let x: { ? } = new {};");
        assert!(matches!(ty, TypeExpr::AnyObject(_)));
    }

    #[test]
    fn test_function_type() {
        let ty = parse_type_of_global("let x: fn(a: int, b: str) -> bool = f;");
        let TypeExpr::Function(func) = ty else {
            panic!("expected function type");
        };
        assert_eq!(func.params.len(), 2);
        assert!(func.return_type.is_some());
    }

    #[test]
    fn test_null_type() {
        let ty = parse_type_of_global("let x: null = null;");
        assert!(matches!(ty, TypeExpr::Named(ident) if ident.name == "null"));
    }
}
