// Parser for Homescript
//
// A hand-written recursive descent parser with:
// - Pratt parsing for expressions
// - Error recovery via synchronization points
// - Multiple error reporting
// - Span tracking for all AST nodes

mod expr;
mod types;

use crate::ast;
use crate::diagnostic::Diagnostics;
use crate::lexer::{Lexer, Token, TokenKind};
use crate::source::Span;

/// Parser state.
pub struct Parser<'a> {
    source: &'a str,
    filename: String,
    tokens: Vec<Token>,
    cursor: usize,
    diagnostics: Diagnostics,
}

/// Result of parsing - either success or failure with partial AST.
pub struct ParseResult {
    pub program: Option<ast::Program>,
    pub diagnostics: Diagnostics,
}

impl<'a> Parser<'a> {
    /// Create a new parser from source code.
    pub fn new(source: &'a str, filename: impl Into<String>) -> Self {
        let filename = filename.into();
        let lexer = Lexer::new(source, filename.clone());
        let (tokens, lex_diags) = lexer.tokenize();

        Self {
            source,
            filename,
            tokens,
            cursor: 0,
            diagnostics: lex_diags,
        }
    }

    /// Parse the source and return the AST with diagnostics.
    pub fn parse(mut self) -> ParseResult {
        let program = self.parse_program();
        ParseResult {
            program,
            diagnostics: self.diagnostics,
        }
    }

    // =========================================================================
    // Token operations
    // =========================================================================

    fn current(&self) -> &Token {
        self.tokens.get(self.cursor).unwrap_or_else(|| {
            self.tokens
                .last()
                .expect("token stream always ends with EOF")
        })
    }

    pub(super) fn current_kind(&self) -> TokenKind {
        self.current().kind
    }

    pub(super) fn current_span(&self) -> Span {
        self.current().span.clone()
    }

    pub(super) fn current_text(&self) -> &str {
        self.current().text(self.source)
    }

    fn peek_kind(&self) -> TokenKind {
        self.tokens
            .get(self.cursor + 1)
            .map(|t| t.kind)
            .unwrap_or(TokenKind::Eof)
    }

    fn at_end(&self) -> bool {
        self.current_kind() == TokenKind::Eof
    }

    pub(super) fn check(&self, kind: TokenKind) -> bool {
        self.current_kind() == kind
    }

    /// Advance to the next token and return the previous one.
    pub(super) fn advance(&mut self) -> Token {
        let token = self.current().clone();
        if !self.at_end() {
            self.cursor += 1;
        }
        token
    }

    /// Consume a token if it matches, otherwise return None.
    pub(super) fn consume(&mut self, kind: TokenKind) -> Option<Token> {
        if self.check(kind) {
            Some(self.advance())
        } else {
            None
        }
    }

    /// Expect a specific token, emit error if not found.
    pub(super) fn expect(&mut self, kind: TokenKind) -> Option<Token> {
        if self.check(kind) {
            Some(self.advance())
        } else {
            self.error_expected(kind.display_name());
            None
        }
    }

    /// Expect an identifier and return it with its span.
    pub(super) fn expect_identifier(&mut self) -> Option<ast::Ident> {
        if self.check(TokenKind::Identifier) {
            let token = self.advance();
            Some(ast::Ident::new(token.text(self.source), token.span))
        } else {
            self.error_expected("identifier");
            None
        }
    }

    /// Expect a singleton identifier (`@name`).
    pub(super) fn expect_at_ident(&mut self) -> Option<ast::Ident> {
        if self.check(TokenKind::AtIdent) {
            let token = self.advance();
            Some(ast::Ident::new(token.text(self.source), token.span))
        } else {
            self.error_expected("singleton identifier");
            None
        }
    }

    // =========================================================================
    // Error handling
    // =========================================================================

    /// Report an "expected X" error.
    pub(super) fn error_expected(&mut self, what: &str) {
        let span = self.current_span();
        let got = self.current_kind().display_name();
        self.diagnostics
            .error(format!("Expected {}, found {}", what, got), span);
    }

    /// Synchronize to the next top-level item after an error.
    fn synchronize_item(&mut self) {
        // The failed item may have left us on an item-start token; step
        // over it so the loop cannot get stuck.
        if !self.at_end() {
            self.advance();
        }
        while !self.at_end() {
            if self.current_kind() == TokenKind::Semicolon {
                self.advance();
                return;
            }
            if self.current_kind().is_item_start() {
                return;
            }
            self.advance();
        }
    }

    /// Synchronize to the next statement boundary inside a block.
    pub(super) fn synchronize_stmt(&mut self) {
        while !self.at_end() {
            match self.current_kind() {
                TokenKind::Semicolon => {
                    self.advance();
                    return;
                }
                TokenKind::RBrace => return,
                _ => {
                    self.advance();
                }
            }
        }
    }

    // =========================================================================
    // Items
    // =========================================================================

    fn parse_program(&mut self) -> Option<ast::Program> {
        let mut items = Vec::new();

        while !self.at_end() {
            if let Some(item) = self.parse_item() {
                items.push(item);
            } else {
                self.synchronize_item();
            }
        }

        Some(ast::Program {
            filename: self.filename.clone(),
            items,
        })
    }

    fn parse_item(&mut self) -> Option<ast::Item> {
        match self.current_kind() {
            TokenKind::Import => self.parse_import().map(ast::Item::Import),
            TokenKind::Type => self.parse_type_def(false).map(ast::Item::TypeDef),
            TokenKind::Let => self.parse_global_let(false).map(ast::Item::GlobalLet),
            TokenKind::Singleton => self.parse_singleton_decl().map(ast::Item::Singleton),
            TokenKind::Impl => self.parse_impl_block().map(ast::Item::Impl),
            TokenKind::Pub => match self.peek_kind() {
                TokenKind::Type => {
                    self.advance();
                    self.parse_type_def(true).map(ast::Item::TypeDef)
                }
                TokenKind::Let => {
                    self.advance();
                    self.parse_global_let(true).map(ast::Item::GlobalLet)
                }
                TokenKind::Fn => {
                    self.advance();
                    self.parse_fn_def(None, ast::FnModifier::Pub).map(ast::Item::Fn)
                }
                _ => {
                    self.error_expected("'type', 'let' or 'fn' after 'pub'");
                    None
                }
            },
            TokenKind::Event => {
                self.advance();
                self.parse_fn_def(None, ast::FnModifier::Event).map(ast::Item::Fn)
            }
            TokenKind::Fn => self.parse_fn_def(None, ast::FnModifier::None).map(ast::Item::Fn),
            TokenKind::Hash => {
                let annotation = self.parse_annotation()?;
                let modifier = match self.current_kind() {
                    TokenKind::Pub => {
                        self.advance();
                        ast::FnModifier::Pub
                    }
                    TokenKind::Event => {
                        self.advance();
                        ast::FnModifier::Event
                    }
                    _ => ast::FnModifier::None,
                };
                self.parse_fn_def(Some(annotation), modifier).map(ast::Item::Fn)
            }
            _ => {
                self.error_expected("item ('import', 'type', 'let', 'fn', 'singleton' or 'impl')");
                None
            }
        }
    }

    /// `import { a, type B, templ C, trigger D } from module;`
    fn parse_import(&mut self) -> Option<ast::ImportStmt> {
        let start = self.expect(TokenKind::Import)?.span;
        self.expect(TokenKind::LBrace)?;

        let mut items = Vec::new();
        loop {
            let kind = match self.current_kind() {
                TokenKind::Type => {
                    self.advance();
                    ast::ImportKind::Type
                }
                TokenKind::Templ => {
                    self.advance();
                    ast::ImportKind::Template
                }
                TokenKind::Trigger => {
                    self.advance();
                    ast::ImportKind::Trigger
                }
                _ => ast::ImportKind::Normal,
            };
            let name = self.expect_identifier()?;
            items.push(ast::ImportItem { kind, name });

            if self.consume(TokenKind::Comma).is_none() {
                break;
            }
            // Allow a trailing comma before the closing brace.
            if self.check(TokenKind::RBrace) {
                break;
            }
        }

        self.expect(TokenKind::RBrace)?;
        self.expect(TokenKind::From)?;
        let module = self.expect_identifier()?;
        let end = self.expect(TokenKind::Semicolon)?.span;

        Some(ast::ImportStmt {
            items,
            module,
            span: start.until(&end),
        })
    }

    /// `type Name = <type>;`, with `pub` already consumed.
    fn parse_type_def(&mut self, is_pub: bool) -> Option<ast::TypeDef> {
        let start = self.expect(TokenKind::Type)?.span;
        let name = self.expect_identifier()?;
        self.expect(TokenKind::Eq)?;
        let rhs = self.parse_type()?;
        let end = self.expect(TokenKind::Semicolon)?.span;

        Some(ast::TypeDef {
            is_pub,
            name,
            rhs,
            span: start.until(&end),
        })
    }

    /// `let name: T? = expr;` at module scope, with `pub` already consumed.
    fn parse_global_let(&mut self, is_pub: bool) -> Option<ast::LetStmt> {
        self.parse_let_stmt(is_pub)
    }

    /// `singleton @name: <type>;`
    fn parse_singleton_decl(&mut self) -> Option<ast::SingletonDecl> {
        let start = self.expect(TokenKind::Singleton)?.span;
        let name = self.expect_at_ident()?;
        self.expect(TokenKind::Colon)?;
        let type_expr = self.parse_type()?;
        let end = self.expect(TokenKind::Semicolon)?.span;

        Some(ast::SingletonDecl {
            name,
            type_expr,
            span: start.until(&end),
        })
    }

    /// `impl Template(caps)? for @singleton { methods }`
    fn parse_impl_block(&mut self) -> Option<ast::ImplBlock> {
        let start = self.expect(TokenKind::Impl)?.span;
        let template = self.expect_identifier()?;

        let capabilities = if self.check(TokenKind::LParen) {
            let open = self.advance().span;
            let mut caps = Vec::new();
            if !self.check(TokenKind::RParen) {
                loop {
                    caps.push(self.expect_identifier()?);
                    if self.consume(TokenKind::Comma).is_none() {
                        break;
                    }
                }
            }
            let close = self.expect(TokenKind::RParen)?.span;
            Some(ast::CapabilityList {
                items: caps,
                span: open.until(&close),
            })
        } else {
            None
        };

        self.expect(TokenKind::For)?;
        let singleton = self.expect_at_ident()?;
        self.expect(TokenKind::LBrace)?;

        let mut methods = Vec::new();
        while !self.check(TokenKind::RBrace) && !self.at_end() {
            let modifier = match self.current_kind() {
                TokenKind::Pub => {
                    self.advance();
                    ast::FnModifier::Pub
                }
                TokenKind::Event => {
                    self.advance();
                    ast::FnModifier::Event
                }
                _ => ast::FnModifier::None,
            };
            match self.parse_fn_def(None, modifier) {
                Some(method) => methods.push(method),
                None => self.synchronize_stmt(),
            }
        }

        let end = self.expect(TokenKind::RBrace)?.span;

        Some(ast::ImplBlock {
            template,
            capabilities,
            singleton,
            methods,
            span: start.until(&end),
        })
    }

    /// `fn name(params) -> T? { ... }`, with annotation and modifier
    /// already consumed by the caller.
    fn parse_fn_def(
        &mut self,
        annotation: Option<ast::Annotation>,
        modifier: ast::FnModifier,
    ) -> Option<ast::FnDef> {
        let start = match &annotation {
            Some(a) => a.span.clone(),
            None => self.current_span(),
        };
        self.expect(TokenKind::Fn)?;
        let name = self.expect_identifier()?;
        let (params, params_span) = self.parse_param_list()?;

        let return_type = if self.consume(TokenKind::Arrow).is_some() {
            Some(self.parse_type()?)
        } else {
            None
        };

        let body = self.parse_block()?;
        let span = start.until(&body.span);

        Some(ast::FnDef {
            annotation,
            modifier,
            name,
            params,
            params_span,
            return_type,
            body,
            span,
        })
    }

    /// `(name: type, ...)`; returns the parameters and the span of the
    /// parenthesized list.
    pub(super) fn parse_param_list(&mut self) -> Option<(Vec<ast::Param>, Span)> {
        let open = self.expect(TokenKind::LParen)?.span;
        let mut params = Vec::new();

        if !self.check(TokenKind::RParen) {
            loop {
                let name = self.expect_identifier()?;
                self.expect(TokenKind::Colon)?;
                let type_expr = self.parse_type()?;
                params.push(ast::Param { name, type_expr });

                if self.consume(TokenKind::Comma).is_none() {
                    break;
                }
            }
        }

        let close = self.expect(TokenKind::RParen)?.span;
        Some((params, open.until(&close)))
    }

    /// `#[item, item, ...]`
    fn parse_annotation(&mut self) -> Option<ast::Annotation> {
        let start = self.expect(TokenKind::Hash)?.span;
        self.expect(TokenKind::LBracket)?;

        let mut items = Vec::new();
        loop {
            if self.check(TokenKind::Trigger) {
                let trigger_start = self.advance().span;
                let connective = self.parse_connective()?;
                let trigger = self.expect_identifier()?;
                self.expect(TokenKind::LParen)?;
                let args = self.parse_call_args()?;
                let close = self.expect(TokenKind::RParen)?.span;
                items.push(ast::AnnotationItem::Trigger(ast::TriggerAnnotation {
                    connective,
                    trigger,
                    args,
                    span: trigger_start.until(&close),
                }));
            } else {
                items.push(ast::AnnotationItem::Ident(self.expect_identifier()?));
            }

            if self.consume(TokenKind::Comma).is_none() {
                break;
            }
        }

        let end = self.expect(TokenKind::RBracket)?.span;
        Some(ast::Annotation {
            items,
            span: start.until(&end),
        })
    }

    pub(super) fn parse_connective(&mut self) -> Option<ast::TriggerConnective> {
        match self.current_kind() {
            TokenKind::On => {
                self.advance();
                Some(ast::TriggerConnective::On)
            }
            TokenKind::Every => {
                self.advance();
                Some(ast::TriggerConnective::Every)
            }
            TokenKind::At => {
                self.advance();
                Some(ast::TriggerConnective::At)
            }
            _ => {
                self.error_expected("trigger connective ('on', 'every' or 'at')");
                None
            }
        }
    }
}

/// Parse Homescript source code.
pub fn parse(source: &str, filename: impl Into<String>) -> ParseResult {
    Parser::new(source, filename).parse()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{Item, TypeExpr};

    fn parse_ok(source: &str) -> ast::Program {
        let result = parse(source, "test.hms");
        assert!(
            !result.diagnostics.has_errors(),
            "parse errors: {:?}",
            result.diagnostics
        );
        result.program.unwrap()
    }

    #[test]
    fn test_parse_import() {
        let program = parse_ok("import { foo, type Bar, templ Baz, trigger Qux } from devices;");
        let Item::Import(import) = &program.items[0] else {
            panic!("expected import");
        };
        assert_eq!(import.module.name, "devices");
        assert_eq!(import.items.len(), 4);
        assert_eq!(import.items[0].kind, ast::ImportKind::Normal);
        assert_eq!(import.items[1].kind, ast::ImportKind::Type);
        assert_eq!(import.items[2].kind, ast::ImportKind::Template);
        assert_eq!(import.items[3].kind, ast::ImportKind::Trigger);
    }

    #[test]
    fn test_parse_fn() {
        let program = parse_ok("fn main() {}\npub fn helper(x: int) -> int { x }");
        assert_eq!(program.items.len(), 2);
        let Item::Fn(main) = &program.items[0] else {
            panic!("expected fn");
        };
        assert_eq!(main.name.name, "main");
        assert_eq!(main.modifier, ast::FnModifier::None);
        let Item::Fn(helper) = &program.items[1] else {
            panic!("expected fn");
        };
        assert_eq!(helper.modifier, ast::FnModifier::Pub);
        assert_eq!(helper.params.len(), 1);
        assert!(helper.body.trailing_expr.is_some());
    }

    #[test]
    fn test_parse_singleton_and_impl() {
        let program = parse_ok(
            "singleton @lamp: { brightness: int };\n\
             impl Dimmer(dim) for @lamp { fn set_brightness(self: @lamp, value: int) {} }",
        );
        let Item::Singleton(decl) = &program.items[0] else {
            panic!("expected singleton");
        };
        assert_eq!(decl.name.name, "@lamp");
        let Item::Impl(imp) = &program.items[1] else {
            panic!("expected impl");
        };
        assert_eq!(imp.template.name, "Dimmer");
        assert_eq!(imp.singleton.name, "@lamp");
        assert_eq!(imp.capabilities.as_ref().unwrap().items[0].name, "dim");
        assert_eq!(imp.methods.len(), 1);
    }

    #[test]
    fn test_parse_annotation() {
        let program = parse_ok(
            "#[allow_unused, trigger every minute(10)]\nevent fn tick(elapsed: int) {}",
        );
        let Item::Fn(def) = &program.items[0] else {
            panic!("expected fn");
        };
        assert_eq!(def.modifier, ast::FnModifier::Event);
        let annotation = def.annotation.as_ref().unwrap();
        assert_eq!(annotation.items.len(), 2);
        assert!(matches!(annotation.items[0], ast::AnnotationItem::Ident(_)));
        let ast::AnnotationItem::Trigger(t) = &annotation.items[1] else {
            panic!("expected trigger annotation");
        };
        assert_eq!(t.connective, ast::TriggerConnective::Every);
        assert_eq!(t.trigger.name, "minute");
        assert_eq!(t.args.len(), 1);
    }

    #[test]
    fn test_parse_type_def() {
        let program = parse_ok("pub type Config = { #setting power: bool, name: str };");
        let Item::TypeDef(def) = &program.items[0] else {
            panic!("expected type def");
        };
        assert!(def.is_pub);
        let TypeExpr::Object(obj) = &def.rhs else {
            panic!("expected object type");
        };
        assert_eq!(obj.fields.len(), 2);
        assert_eq!(obj.fields[0].annotation.as_ref().unwrap().name, "setting");
    }

    #[test]
    fn test_error_recovery_continues() {
        let result = parse("fn () {}\nfn main() {}", "test.hms");
        assert!(result.diagnostics.has_errors());
        let program = result.program.unwrap();
        // The second function survives the first one's error.
        assert!(program
            .items
            .iter()
            .any(|i| matches!(i, Item::Fn(f) if f.name.name == "main")));
    }
}
