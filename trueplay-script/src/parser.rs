use crate::ast::*;
use crate::error::{Result, ScriptError, Span};
use crate::lexer::{unescape_body, Lexer, SpannedToken, Token};
use crate::value::format_number;
use std::rc::Rc;

static EOF_TOKEN: SpannedToken = SpannedToken {
    token: Token::Eof,
    span: Span { start: 0, end: 0 },
    line_break_before: true,
};

/// Binary operator table entry
#[derive(Clone, Copy)]
enum BinKind {
    Binary(BinaryOp),
    Logical(LogicalOp),
}

fn binary_operator(token: &Token) -> Option<(u8, BinKind)> {
    let entry = match token {
        Token::OrOr => (1, BinKind::Logical(LogicalOp::Or)),
        Token::QuestionQuestion => (1, BinKind::Logical(LogicalOp::Nullish)),
        Token::AndAnd => (2, BinKind::Logical(LogicalOp::And)),
        Token::EqEq => (3, BinKind::Binary(BinaryOp::Eq)),
        Token::NotEq => (3, BinKind::Binary(BinaryOp::Ne)),
        Token::EqEqEq => (3, BinKind::Binary(BinaryOp::StrictEq)),
        Token::NotEqEq => (3, BinKind::Binary(BinaryOp::StrictNe)),
        Token::Lt => (4, BinKind::Binary(BinaryOp::Lt)),
        Token::Le => (4, BinKind::Binary(BinaryOp::Le)),
        Token::Gt => (4, BinKind::Binary(BinaryOp::Gt)),
        Token::Ge => (4, BinKind::Binary(BinaryOp::Ge)),
        Token::In => (4, BinKind::Binary(BinaryOp::In)),
        Token::Plus => (5, BinKind::Binary(BinaryOp::Add)),
        Token::Minus => (5, BinKind::Binary(BinaryOp::Sub)),
        Token::Star => (6, BinKind::Binary(BinaryOp::Mul)),
        Token::Slash => (6, BinKind::Binary(BinaryOp::Div)),
        Token::Percent => (6, BinKind::Binary(BinaryOp::Rem)),
        Token::StarStar => (7, BinKind::Binary(BinaryOp::Pow)),
        _ => return None,
    };
    Some(entry)
}

fn assign_operator(token: &Token) -> Option<AssignOp> {
    match token {
        Token::Assign => Some(AssignOp::Assign),
        Token::PlusAssign => Some(AssignOp::Add),
        Token::MinusAssign => Some(AssignOp::Sub),
        Token::StarAssign => Some(AssignOp::Mul),
        Token::SlashAssign => Some(AssignOp::Div),
        Token::PercentAssign => Some(AssignOp::Rem),
        _ => None,
    }
}

fn describe(token: &Token) -> String {
    match token {
        Token::Eof => "end of input".to_string(),
        Token::Identifier(name) => format!("identifier '{}'", name),
        Token::Number(n) => format!("number {}", format_number(*n)),
        Token::BigInt(n) => format!("bigint {}n", n),
        Token::StringLiteral(_) => "string".to_string(),
        Token::TemplateLiteral(_) => "template literal".to_string(),
        other => match other.keyword_name() {
            Some(kw) => format!("keyword '{}'", kw),
            None => format!("token {:?}", other),
        },
    }
}

/// Deepest nesting of statements and expressions a program may have.
///
/// Left-associative chains (`a + b + c`, `a.b.c`, `f()()`) count one level
/// per link, so the tree handed to the evaluator is never deeper than this.
pub const MAX_NESTING_DEPTH: usize = 128;

/// Recursive-descent parser for script source
pub struct Parser<'a> {
    tokens: &'a [SpannedToken],
    pos: usize,
    depth: usize,
}

impl<'a> Parser<'a> {
    pub fn new(tokens: &'a [SpannedToken]) -> Self {
        Self::nested_in(tokens, 0)
    }

    /// Parser for source embedded `depth` levels into an enclosing program
    fn nested_in(tokens: &'a [SpannedToken], depth: usize) -> Self {
        Self { tokens, pos: 0, depth }
    }

    /// Go one nesting level deeper
    fn descend(&mut self) -> Result<()> {
        self.depth += 1;
        if self.depth > MAX_NESTING_DEPTH {
            return Err(ScriptError::ParserError {
                span: self.peek().span,
                message: format!("Nesting deeper than {} levels", MAX_NESTING_DEPTH),
            });
        }
        Ok(())
    }

    /// Run `parse` one nesting level deeper
    fn nested<T>(&mut self, parse: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        self.descend()?;
        let result = parse(self);
        self.depth -= 1;
        result
    }

    fn peek(&self) -> &SpannedToken {
        self.peek_at(0)
    }

    fn peek_at(&self, n: usize) -> &SpannedToken {
        self.tokens.get(self.pos + n).unwrap_or(&EOF_TOKEN)
    }

    fn peek_token(&self) -> &Token {
        &self.peek().token
    }

    fn advance(&mut self) -> SpannedToken {
        let token = self.peek().clone();
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        token
    }

    fn check(&self, expected: &Token) -> bool {
        std::mem::discriminant(self.peek_token()) == std::mem::discriminant(expected)
    }

    fn eat(&mut self, expected: &Token) -> bool {
        if self.check(expected) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, expected: Token, what: &str) -> Result<Span> {
        if self.check(&expected) {
            Ok(self.advance().span)
        } else {
            Err(self.unexpected(what))
        }
    }

    fn unexpected(&self, what: &str) -> ScriptError {
        let token = self.peek();
        ScriptError::ParserError {
            span: token.span,
            message: format!("Unexpected {}, expected {}", describe(&token.token), what),
        }
    }

    fn is_eof(&self) -> bool {
        matches!(self.peek_token(), Token::Eof)
    }

    fn prev_span(&self) -> Span {
        self.pos
            .checked_sub(1)
            .and_then(|i| self.tokens.get(i))
            .map(|t| t.span)
            .unwrap_or_default()
    }

    /// Expect the end of input after a standalone expression
    pub fn expect_eof(&self) -> Result<()> {
        if self.is_eof() {
            Ok(())
        } else {
            Err(self.unexpected("end of input"))
        }
    }

    /// Parse the entire input as a program body
    pub fn parse_program(&mut self) -> Result<Program> {
        let start = self.peek().span.start;
        let mut body = Vec::new();

        while !self.is_eof() {
            body.push(self.parse_statement()?);
        }

        let end = self.peek().span.end;
        Ok(Program {
            body,
            span: Span::new(start, end),
        })
    }

    /// Statement terminator: `;`, or an implied one before `}`, end of input,
    /// or a line break
    fn end_statement(&mut self) -> Result<()> {
        if self.eat(&Token::Semicolon) {
            return Ok(());
        }
        let next = self.peek();
        if matches!(next.token, Token::RBrace | Token::Eof) || next.line_break_before {
            Ok(())
        } else {
            Err(self.unexpected("';'"))
        }
    }

    fn parse_statement(&mut self) -> Result<Stmt> {
        self.nested(Self::parse_statement_inner)
    }

    fn parse_statement_inner(&mut self) -> Result<Stmt> {
        match self.peek_token() {
            Token::Let | Token::Const | Token::Var => {
                let stmt = self.parse_declaration()?;
                self.end_statement()?;
                Ok(stmt)
            }
            Token::Function => {
                let decl = self.parse_function(false, true)?;
                Ok(Stmt::Function(decl))
            }
            Token::Async if matches!(self.peek_at(1).token, Token::Function) => {
                self.advance();
                let decl = self.parse_function(true, true)?;
                Ok(Stmt::Function(decl))
            }
            Token::If => self.parse_if(),
            Token::While => self.parse_while(),
            Token::For => self.parse_for(),
            Token::Return => self.parse_return(),
            Token::Throw => {
                let start = self.advance().span;
                if self.peek().line_break_before {
                    return Err(ScriptError::ParserError {
                        span: start,
                        message: "Illegal newline after throw".to_string(),
                    });
                }
                let value = self.parse_expression()?;
                let span = start.merge(value.span());
                self.end_statement()?;
                Ok(Stmt::Throw(value, span))
            }
            Token::Try => self.parse_try(),
            Token::Break => {
                let span = self.advance().span;
                self.end_statement()?;
                Ok(Stmt::Break(span))
            }
            Token::Continue => {
                let span = self.advance().span;
                self.end_statement()?;
                Ok(Stmt::Continue(span))
            }
            Token::LBrace => {
                let start = self.peek().span;
                let body = self.parse_block_body()?;
                Ok(Stmt::Block(body, start.merge(self.prev_span())))
            }
            Token::Semicolon => {
                self.advance();
                Ok(Stmt::Empty)
            }
            _ => {
                let expr = self.parse_expression()?;
                self.end_statement()?;
                Ok(Stmt::Expr(expr))
            }
        }
    }

    fn decl_kind(&mut self) -> Result<DeclKind> {
        match self.advance().token {
            Token::Let => Ok(DeclKind::Let),
            Token::Const => Ok(DeclKind::Const),
            Token::Var => Ok(DeclKind::Var),
            _ => Err(ScriptError::ParserError {
                span: self.prev_span(),
                message: "Expected declaration".to_string(),
            }),
        }
    }

    fn parse_declaration(&mut self) -> Result<Stmt> {
        let start = self.peek().span;
        let kind = self.decl_kind()?;
        let declarations = self.parse_declarators(kind, None)?;
        Ok(Stmt::Declaration {
            kind,
            declarations,
            span: start.merge(self.prev_span()),
        })
    }

    /// Declarator list, optionally continuing after an already parsed target
    fn parse_declarators(&mut self, kind: DeclKind, first: Option<Pattern>) -> Result<Vec<Declarator>> {
        let mut declarations = Vec::new();
        let mut pending = first;

        loop {
            let target = match pending.take() {
                Some(target) => target,
                None => self.parse_binding_pattern()?,
            };
            let init = if self.eat(&Token::Assign) {
                Some(self.parse_assignment()?)
            } else {
                None
            };
            if init.is_none() && (kind == DeclKind::Const || !matches!(target, Pattern::Ident(_))) {
                return Err(ScriptError::ParserError {
                    span: self.prev_span(),
                    message: "Missing initializer in declaration".to_string(),
                });
            }
            declarations.push(Declarator { target, init });

            if !self.eat(&Token::Comma) {
                break;
            }
        }

        Ok(declarations)
    }

    fn parse_identifier(&mut self) -> Result<String> {
        match &self.peek().token {
            Token::Identifier(name) => {
                let name = name.clone();
                self.advance();
                Ok(name)
            }
            _ => Err(self.unexpected("identifier")),
        }
    }

    fn parse_binding_pattern(&mut self) -> Result<Pattern> {
        self.nested(Self::parse_binding_pattern_inner)
    }

    fn parse_binding_pattern_inner(&mut self) -> Result<Pattern> {
        match self.peek_token() {
            Token::Identifier(_) => Ok(Pattern::Ident(self.parse_identifier()?)),
            Token::LBrace => {
                self.advance();
                let mut props = Vec::new();
                let mut rest = None;
                while !self.check(&Token::RBrace) {
                    if self.eat(&Token::Ellipsis) {
                        rest = Some(self.parse_identifier()?);
                        break;
                    }
                    let (key, _) = self.parse_property_name()?;
                    let target = if self.eat(&Token::Colon) {
                        self.parse_binding_pattern()?
                    } else {
                        Pattern::Ident(key.clone())
                    };
                    props.push((key, target));
                    if !self.eat(&Token::Comma) {
                        break;
                    }
                }
                self.expect(Token::RBrace, "'}'")?;
                Ok(Pattern::Object { props, rest })
            }
            Token::LBracket => {
                self.advance();
                let mut items = Vec::new();
                let mut rest = None;
                while !self.check(&Token::RBracket) {
                    if self.eat(&Token::Comma) {
                        items.push(None);
                        continue;
                    }
                    if self.eat(&Token::Ellipsis) {
                        rest = Some(self.parse_identifier()?);
                        break;
                    }
                    items.push(Some(self.parse_binding_pattern()?));
                    if !self.eat(&Token::Comma) {
                        break;
                    }
                }
                self.expect(Token::RBracket, "']'")?;
                Ok(Pattern::Array { items, rest })
            }
            _ => Err(self.unexpected("binding name")),
        }
    }

    fn parse_block_body(&mut self) -> Result<Vec<Stmt>> {
        self.expect(Token::LBrace, "'{'")?;
        let mut body = Vec::new();
        while !self.check(&Token::RBrace) {
            if self.is_eof() {
                return Err(self.unexpected("'}'"));
            }
            body.push(self.parse_statement()?);
        }
        self.advance();
        Ok(body)
    }

    fn parse_params(&mut self) -> Result<Vec<Param>> {
        self.expect(Token::LParen, "'('")?;
        let mut params = Vec::new();
        while !self.check(&Token::RParen) {
            let rest = self.eat(&Token::Ellipsis);
            let pattern = self.parse_binding_pattern()?;
            let default = if !rest && self.eat(&Token::Assign) {
                Some(self.parse_assignment()?)
            } else {
                None
            };
            params.push(Param { pattern, default, rest });
            if rest || !self.eat(&Token::Comma) {
                break;
            }
        }
        self.expect(Token::RParen, "')'")?;
        Ok(params)
    }

    /// `function name(params) { ... }`, positioned at the `function` keyword
    fn parse_function(&mut self, is_async: bool, require_name: bool) -> Result<Rc<FunctionDecl>> {
        let start = self.expect(Token::Function, "'function'")?;
        let name = if matches!(self.peek_token(), Token::Identifier(_)) {
            Some(self.parse_identifier()?)
        } else if require_name {
            return Err(self.unexpected("function name"));
        } else {
            None
        };
        let params = self.parse_params()?;
        let body = self.parse_block_body()?;
        Ok(Rc::new(FunctionDecl {
            name,
            params,
            body: FunctionBody::Block(body),
            is_arrow: false,
            is_async,
            span: start.merge(self.prev_span()),
        }))
    }

    fn parse_if(&mut self) -> Result<Stmt> {
        let start = self.advance().span;
        self.expect(Token::LParen, "'('")?;
        let cond = self.parse_expression()?;
        self.expect(Token::RParen, "')'")?;
        let then = Box::new(self.parse_statement()?);
        let otherwise = if self.eat(&Token::Else) {
            Some(Box::new(self.parse_statement()?))
        } else {
            None
        };
        Ok(Stmt::If {
            cond,
            then,
            otherwise,
            span: start.merge(self.prev_span()),
        })
    }

    fn parse_while(&mut self) -> Result<Stmt> {
        let start = self.advance().span;
        self.expect(Token::LParen, "'('")?;
        let cond = self.parse_expression()?;
        self.expect(Token::RParen, "')'")?;
        let body = Box::new(self.parse_statement()?);
        Ok(Stmt::While {
            cond,
            body,
            span: start.merge(self.prev_span()),
        })
    }

    fn parse_for(&mut self) -> Result<Stmt> {
        let start = self.advance().span;
        self.expect(Token::LParen, "'('")?;

        let init = if matches!(self.peek_token(), Token::Let | Token::Const | Token::Var) {
            let decl_start = self.peek().span;
            let kind = self.decl_kind()?;
            let target = self.parse_binding_pattern()?;

            if self.eat(&Token::Of) {
                let iterable = self.parse_assignment()?;
                self.expect(Token::RParen, "')'")?;
                let body = Box::new(self.parse_statement()?);
                return Ok(Stmt::ForOf {
                    kind,
                    target,
                    iterable,
                    body,
                    span: start.merge(self.prev_span()),
                });
            }
            if self.eat(&Token::In) {
                let object = self.parse_expression()?;
                self.expect(Token::RParen, "')'")?;
                let body = Box::new(self.parse_statement()?);
                return Ok(Stmt::ForIn {
                    kind,
                    target,
                    object,
                    body,
                    span: start.merge(self.prev_span()),
                });
            }

            let declarations = self.parse_declarators(kind, Some(target))?;
            Some(Box::new(Stmt::Declaration {
                kind,
                declarations,
                span: decl_start.merge(self.prev_span()),
            }))
        } else if self.check(&Token::Semicolon) {
            None
        } else {
            Some(Box::new(Stmt::Expr(self.parse_expression()?)))
        };
        self.expect(Token::Semicolon, "';'")?;

        let cond = if self.check(&Token::Semicolon) {
            None
        } else {
            Some(self.parse_expression()?)
        };
        self.expect(Token::Semicolon, "';'")?;

        let update = if self.check(&Token::RParen) {
            None
        } else {
            Some(self.parse_expression()?)
        };
        self.expect(Token::RParen, "')'")?;

        let body = Box::new(self.parse_statement()?);
        Ok(Stmt::For {
            init,
            cond,
            update,
            body,
            span: start.merge(self.prev_span()),
        })
    }

    fn parse_return(&mut self) -> Result<Stmt> {
        let start = self.advance().span;
        let next = self.peek();
        let value = if matches!(next.token, Token::Semicolon | Token::RBrace | Token::Eof) || next.line_break_before {
            None
        } else {
            Some(self.parse_expression()?)
        };
        let span = start.merge(self.prev_span());
        self.end_statement()?;
        Ok(Stmt::Return(value, span))
    }

    fn parse_try(&mut self) -> Result<Stmt> {
        let start = self.advance().span;
        let block = self.parse_block_body()?;

        let mut param = None;
        let mut handler = None;
        if self.eat(&Token::Catch) {
            if self.eat(&Token::LParen) {
                param = Some(self.parse_binding_pattern()?);
                self.expect(Token::RParen, "')'")?;
            }
            handler = Some(self.parse_block_body()?);
        }

        let finalizer = if self.eat(&Token::Finally) {
            Some(self.parse_block_body()?)
        } else {
            None
        };

        if handler.is_none() && finalizer.is_none() {
            return Err(ScriptError::ParserError {
                span: start,
                message: "Missing catch or finally after try".to_string(),
            });
        }

        Ok(Stmt::Try {
            block,
            param,
            handler,
            finalizer,
            span: start.merge(self.prev_span()),
        })
    }

    // ===== Expressions =====

    pub fn parse_expression(&mut self) -> Result<Expr> {
        self.parse_assignment()
    }

    fn parse_assignment(&mut self) -> Result<Expr> {
        self.nested(Self::parse_assignment_inner)
    }

    fn parse_assignment_inner(&mut self) -> Result<Expr> {
        if let Some(arrow) = self.try_parse_arrow()? {
            return Ok(arrow);
        }

        let target = self.parse_conditional()?;
        let Some(op) = assign_operator(self.peek_token()) else {
            return Ok(target);
        };
        if !target.is_assignable() {
            return Err(ScriptError::ParserError {
                span: target.span(),
                message: "Invalid left-hand side in assignment".to_string(),
            });
        }
        self.advance();
        let value = self.parse_assignment()?;
        let span = target.span().merge(value.span());
        Ok(Expr::Assign {
            op,
            target: Box::new(target),
            value: Box::new(value),
            span,
        })
    }

    /// Index of the `)` matching the `(` at `open`
    fn matching_paren(&self, open: usize) -> Option<usize> {
        let mut depth = 0usize;
        for (i, token) in self.tokens.iter().enumerate().skip(open) {
            match token.token {
                Token::LParen => depth += 1,
                Token::RParen => {
                    depth -= 1;
                    if depth == 0 {
                        return Some(i);
                    }
                }
                Token::Eof => return None,
                _ => {}
            }
        }
        None
    }

    fn try_parse_arrow(&mut self) -> Result<Option<Expr>> {
        let is_async = matches!(self.peek_token(), Token::Async);
        let offset = usize::from(is_async);

        let is_arrow = match &self.peek_at(offset).token {
            Token::Identifier(_) => matches!(self.peek_at(offset + 1).token, Token::Arrow),
            Token::LParen => self
                .matching_paren(self.pos + offset)
                .and_then(|close| self.tokens.get(close + 1))
                .is_some_and(|t| matches!(t.token, Token::Arrow)),
            _ => false,
        };
        if !is_arrow {
            return Ok(None);
        }

        let start = self.peek().span;
        if is_async {
            self.advance();
        }
        let params = if matches!(self.peek_token(), Token::Identifier(_)) {
            vec![Param {
                pattern: Pattern::Ident(self.parse_identifier()?),
                default: None,
                rest: false,
            }]
        } else {
            self.parse_params()?
        };
        self.expect(Token::Arrow, "'=>'")?;

        let body = if self.check(&Token::LBrace) {
            FunctionBody::Block(self.parse_block_body()?)
        } else {
            FunctionBody::Expr(Box::new(self.parse_assignment()?))
        };

        Ok(Some(Expr::Function(Rc::new(FunctionDecl {
            name: None,
            params,
            body,
            is_arrow: true,
            is_async,
            span: start.merge(self.prev_span()),
        }))))
    }

    fn parse_conditional(&mut self) -> Result<Expr> {
        let test = self.parse_binary(1)?;
        if !self.eat(&Token::Question) {
            return Ok(test);
        }
        let consequent = self.parse_assignment()?;
        self.expect(Token::Colon, "':'")?;
        let alternate = self.parse_assignment()?;
        let span = test.span().merge(alternate.span());
        Ok(Expr::Conditional {
            test: Box::new(test),
            consequent: Box::new(consequent),
            alternate: Box::new(alternate),
            span,
        })
    }

    fn parse_binary(&mut self, min_prec: u8) -> Result<Expr> {
        let base = self.depth;
        let mut left = self.parse_unary()?;

        while let Some((prec, kind)) = binary_operator(self.peek_token()) {
            if prec < min_prec {
                break;
            }
            self.descend()?;
            self.advance();
            // `**` is right-associative
            let next_min = match kind {
                BinKind::Binary(BinaryOp::Pow) => prec,
                _ => prec + 1,
            };
            let right = self.parse_binary(next_min)?;
            let span = left.span().merge(right.span());
            left = match kind {
                BinKind::Binary(op) => Expr::Binary(Box::new(left), op, Box::new(right), span),
                BinKind::Logical(op) => Expr::Logical(Box::new(left), op, Box::new(right), span),
            };
        }

        self.depth = base;
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expr> {
        let op = match self.peek_token() {
            Token::Bang => UnaryOp::Not,
            Token::Minus => UnaryOp::Neg,
            Token::Plus => UnaryOp::Plus,
            Token::Typeof => UnaryOp::Typeof,
            Token::Await => {
                let start = self.advance().span;
                let operand = self.nested(Self::parse_unary)?;
                let span = start.merge(operand.span());
                return Ok(Expr::Await(Box::new(operand), span));
            }
            Token::PlusPlus | Token::MinusMinus => {
                let start = self.advance();
                let op = if matches!(start.token, Token::PlusPlus) {
                    UpdateOp::Increment
                } else {
                    UpdateOp::Decrement
                };
                let target = self.nested(Self::parse_unary)?;
                if !target.is_assignable() {
                    return Err(ScriptError::ParserError {
                        span: target.span(),
                        message: "Invalid left-hand side expression in prefix operation".to_string(),
                    });
                }
                let span = start.span.merge(target.span());
                return Ok(Expr::Update {
                    op,
                    prefix: true,
                    target: Box::new(target),
                    span,
                });
            }
            _ => return self.parse_postfix(),
        };

        let start = self.advance().span;
        let operand = self.nested(Self::parse_unary)?;
        let span = start.merge(operand.span());
        Ok(Expr::Unary(op, Box::new(operand), span))
    }

    fn parse_postfix(&mut self) -> Result<Expr> {
        let expr = self.parse_call_member()?;
        let next = self.peek();
        let op = match next.token {
            Token::PlusPlus if !next.line_break_before => UpdateOp::Increment,
            Token::MinusMinus if !next.line_break_before => UpdateOp::Decrement,
            _ => return Ok(expr),
        };
        if !expr.is_assignable() {
            return Err(ScriptError::ParserError {
                span: expr.span(),
                message: "Invalid left-hand side expression in postfix operation".to_string(),
            });
        }
        let end = self.advance().span;
        let span = expr.span().merge(end);
        Ok(Expr::Update {
            op,
            prefix: false,
            target: Box::new(expr),
            span,
        })
    }

    /// Property name after `.`: identifiers and keywords alike
    fn parse_property_name(&mut self) -> Result<(String, Span)> {
        let token = self.peek().clone();
        let name = match &token.token {
            Token::Identifier(name) => name.clone(),
            Token::StringLiteral(s) => s.clone(),
            Token::Number(n) => format_number(*n),
            other => match other.keyword_name() {
                Some(kw) => kw.to_string(),
                None => return Err(self.unexpected("property name")),
            },
        };
        self.advance();
        Ok((name, token.span))
    }

    fn parse_call_member(&mut self) -> Result<Expr> {
        let base = self.depth;
        let mut expr = if self.check(&Token::New) {
            self.parse_new()?
        } else {
            self.parse_primary()?
        };

        loop {
            if matches!(
                self.peek_token(),
                Token::Dot | Token::QuestionDot | Token::LBracket | Token::LParen
            ) {
                self.descend()?;
            }
            match self.peek_token() {
                Token::Dot => {
                    self.advance();
                    let (property, end) = self.parse_property_name()?;
                    let span = expr.span().merge(end);
                    expr = Expr::Member {
                        object: Box::new(expr),
                        property,
                        optional: false,
                        span,
                    };
                }
                Token::QuestionDot => {
                    self.advance();
                    match self.peek_token() {
                        Token::LParen => {
                            let args = self.parse_arguments()?;
                            let span = expr.span().merge(self.prev_span());
                            expr = Expr::Call {
                                callee: Box::new(expr),
                                args,
                                optional: true,
                                span,
                            };
                        }
                        Token::LBracket => {
                            self.advance();
                            let index = self.parse_expression()?;
                            let end = self.expect(Token::RBracket, "']'")?;
                            let span = expr.span().merge(end);
                            expr = Expr::Index {
                                object: Box::new(expr),
                                index: Box::new(index),
                                optional: true,
                                span,
                            };
                        }
                        _ => {
                            let (property, end) = self.parse_property_name()?;
                            let span = expr.span().merge(end);
                            expr = Expr::Member {
                                object: Box::new(expr),
                                property,
                                optional: true,
                                span,
                            };
                        }
                    }
                }
                Token::LBracket => {
                    self.advance();
                    let index = self.parse_expression()?;
                    let end = self.expect(Token::RBracket, "']'")?;
                    let span = expr.span().merge(end);
                    expr = Expr::Index {
                        object: Box::new(expr),
                        index: Box::new(index),
                        optional: false,
                        span,
                    };
                }
                Token::LParen => {
                    let args = self.parse_arguments()?;
                    let span = expr.span().merge(self.prev_span());
                    expr = Expr::Call {
                        callee: Box::new(expr),
                        args,
                        optional: false,
                        span,
                    };
                }
                _ => break,
            }
        }

        self.depth = base;
        Ok(expr)
    }

    fn parse_new(&mut self) -> Result<Expr> {
        let base = self.depth;
        let start = self.advance().span;
        let mut callee = if self.check(&Token::New) {
            self.nested(Self::parse_new)?
        } else {
            self.parse_primary()?
        };

        loop {
            if matches!(self.peek_token(), Token::Dot | Token::LBracket) {
                self.descend()?;
            }
            match self.peek_token() {
                Token::Dot => {
                    self.advance();
                    let (property, end) = self.parse_property_name()?;
                    let span = callee.span().merge(end);
                    callee = Expr::Member {
                        object: Box::new(callee),
                        property,
                        optional: false,
                        span,
                    };
                }
                Token::LBracket => {
                    self.advance();
                    let index = self.parse_expression()?;
                    let end = self.expect(Token::RBracket, "']'")?;
                    let span = callee.span().merge(end);
                    callee = Expr::Index {
                        object: Box::new(callee),
                        index: Box::new(index),
                        optional: false,
                        span,
                    };
                }
                _ => break,
            }
        }

        let args = if self.check(&Token::LParen) {
            self.parse_arguments()?
        } else {
            Vec::new()
        };
        self.depth = base;
        Ok(Expr::New {
            callee: Box::new(callee),
            args,
            span: start.merge(self.prev_span()),
        })
    }

    fn parse_arguments(&mut self) -> Result<Vec<Element>> {
        self.expect(Token::LParen, "'('")?;
        let mut args = Vec::new();
        while !self.check(&Token::RParen) {
            if self.eat(&Token::Ellipsis) {
                args.push(Element::Spread(self.parse_assignment()?));
            } else {
                args.push(Element::Item(self.parse_assignment()?));
            }
            if !self.eat(&Token::Comma) {
                break;
            }
        }
        self.expect(Token::RParen, "')'")?;
        Ok(args)
    }

    fn parse_primary(&mut self) -> Result<Expr> {
        let token = self.peek().clone();
        let span = token.span;

        let literal = match token.token {
            Token::Number(n) => Literal::Number(n),
            Token::BigInt(n) => Literal::BigInt(n),
            Token::StringLiteral(s) => Literal::String(s),
            Token::True => Literal::Bool(true),
            Token::False => Literal::Bool(false),
            Token::Null => Literal::Null,
            Token::Undefined => Literal::Undefined,
            Token::TemplateLiteral(raw) => {
                self.advance();
                return parse_template(&raw, span, self.depth);
            }
            Token::Identifier(name) => {
                self.advance();
                return Ok(Expr::Ident(name, span));
            }
            Token::LParen => {
                self.advance();
                let expr = self.parse_expression()?;
                self.expect(Token::RParen, "')'")?;
                return Ok(expr);
            }
            Token::LBracket => return self.parse_array_literal(),
            Token::LBrace => return self.parse_object_literal(),
            Token::Function => {
                let decl = self.parse_function(false, false)?;
                return Ok(Expr::Function(decl));
            }
            Token::Async if matches!(self.peek_at(1).token, Token::Function) => {
                self.advance();
                let decl = self.parse_function(true, false)?;
                return Ok(Expr::Function(decl));
            }
            _ => return Err(self.unexpected("expression")),
        };

        self.advance();
        Ok(Expr::Literal(literal, span))
    }

    fn parse_array_literal(&mut self) -> Result<Expr> {
        let start = self.advance().span;
        let mut items = Vec::new();

        while !self.check(&Token::RBracket) {
            if self.check(&Token::Comma) {
                let hole = self.advance().span;
                items.push(Element::Item(Expr::Literal(Literal::Undefined, hole)));
                continue;
            }
            if self.eat(&Token::Ellipsis) {
                items.push(Element::Spread(self.parse_assignment()?));
            } else {
                items.push(Element::Item(self.parse_assignment()?));
            }
            if !self.eat(&Token::Comma) {
                break;
            }
        }

        let end = self.expect(Token::RBracket, "']'")?;
        Ok(Expr::Array(items, start.merge(end)))
    }

    fn parse_object_literal(&mut self) -> Result<Expr> {
        let start = self.advance().span;
        let mut props = Vec::new();

        while !self.check(&Token::RBrace) {
            if self.eat(&Token::Ellipsis) {
                props.push(PropDef::Spread(self.parse_assignment()?));
            } else {
                let token = self.peek().clone();
                let shorthand = matches!(token.token, Token::Identifier(_));
                let key = if self.eat(&Token::LBracket) {
                    let key = self.parse_assignment()?;
                    self.expect(Token::RBracket, "']'")?;
                    PropKey::Computed(key)
                } else {
                    PropKey::Named(self.parse_property_name()?.0)
                };

                let value = if self.check(&Token::LParen) {
                    // method shorthand `name(params) { ... }`
                    let params = self.parse_params()?;
                    let body = self.parse_block_body()?;
                    let name = match &key {
                        PropKey::Named(name) => Some(name.clone()),
                        PropKey::Computed(_) => None,
                    };
                    Expr::Function(Rc::new(FunctionDecl {
                        name,
                        params,
                        body: FunctionBody::Block(body),
                        is_arrow: false,
                        is_async: false,
                        span: token.span.merge(self.prev_span()),
                    }))
                } else if self.eat(&Token::Colon) {
                    self.parse_assignment()?
                } else if shorthand {
                    match &key {
                        PropKey::Named(name) => Expr::Ident(name.clone(), token.span),
                        PropKey::Computed(_) => return Err(self.unexpected("':'")),
                    }
                } else {
                    return Err(self.unexpected("':'"));
                };
                props.push(PropDef::KeyValue(key, value));
            }

            if !self.eat(&Token::Comma) {
                break;
            }
        }

        let end = self.expect(Token::RBrace, "'}'")?;
        Ok(Expr::Object(props, start.merge(end)))
    }
}

/// Index of the `}` closing an interpolation that starts at `from`
fn closing_brace(raw: &str, from: usize) -> Option<usize> {
    let mut depth = 1usize;
    let mut quote: Option<char> = None;
    let mut escaped = false;

    for (i, c) in raw[from..].char_indices() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '\'' | '"' => quote = Some(c),
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(from + i);
                }
            }
            _ => {}
        }
    }
    None
}

/// Split a template literal body into text and `${...}` expression parts
fn parse_template(raw: &str, span: Span, depth: usize) -> Result<Expr> {
    let base = span.start + 1;
    let mut parts = Vec::new();
    let mut chunk_start = 0;
    let mut i = 0;

    let flush = |parts: &mut Vec<TemplatePart>, chunk: &str| -> Result<()> {
        let text = unescape_body(chunk).ok_or_else(|| ScriptError::LexerError {
            span,
            message: "Invalid escape sequence in template literal".to_string(),
        })?;
        if !text.is_empty() {
            parts.push(TemplatePart::Str(text));
        }
        Ok(())
    };

    while i < raw.len() {
        let rest = &raw[i..];
        if rest.starts_with('\\') {
            i += 1 + rest[1..].chars().next().map(char::len_utf8).unwrap_or(0);
            continue;
        }
        if rest.starts_with("${") {
            flush(&mut parts, &raw[chunk_start..i])?;
            let inner_start = i + 2;
            let end = closing_brace(raw, inner_start).ok_or_else(|| ScriptError::LexerError {
                span,
                message: "Unterminated template interpolation".to_string(),
            })?;
            let tokens = Lexer::with_offset(&raw[inner_start..end], base + inner_start).tokenize()?;
            let mut parser = Parser::nested_in(&tokens, depth);
            let expr = parser.parse_expression()?;
            parser.expect_eof()?;
            parts.push(TemplatePart::Expr(expr));
            i = end + 1;
            chunk_start = i;
            continue;
        }
        i += rest.chars().next().map(char::len_utf8).unwrap_or(1);
    }
    flush(&mut parts, &raw[chunk_start..])?;

    Ok(Expr::Template(parts, span))
}

/// Helper to parse a token stream into a program
pub fn parse(tokens: &[SpannedToken]) -> Result<Program> {
    let mut parser = Parser::new(tokens);
    parser.parse_program()
}
