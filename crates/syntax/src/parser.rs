//! Recursive descent parser producing [`Program`] trees.

use crate::{
    ast::*,
    error::{ParseError, ParseResult},
    lexer::{tokenize, Token, TokenKind},
    loc::{LineIndex, Loc},
};

/// Parse a source file into a program.
pub fn parse(source: &str) -> ParseResult<Program> {
    let program = Parser::new(source).parse_program()?;
    trace!(statements = program.body.len(), "parsed program");
    Ok(program)
}

pub struct Parser<'src> {
    source: &'src str,
    /// Always terminated by an `Eof` token.
    tokens: Vec<Token>,
    pos: usize,
    lines: LineIndex,
}

enum Operator {
    Binary(BinaryOp),
    Logical(LogicalOp),
}

impl Operator {
    fn from_token(kind: TokenKind) -> Option<Self> {
        let op = match kind {
            TokenKind::Plus => Self::Binary(BinaryOp::Add),
            TokenKind::Minus => Self::Binary(BinaryOp::Sub),
            TokenKind::Star => Self::Binary(BinaryOp::Mul),
            TokenKind::Slash => Self::Binary(BinaryOp::Div),
            TokenKind::Percent => Self::Binary(BinaryOp::Rem),
            TokenKind::EqEq => Self::Binary(BinaryOp::Eq),
            TokenKind::NotEq => Self::Binary(BinaryOp::NotEq),
            TokenKind::EqEqEq => Self::Binary(BinaryOp::StrictEq),
            TokenKind::NotEqEq => Self::Binary(BinaryOp::StrictNotEq),
            TokenKind::Lt => Self::Binary(BinaryOp::Lt),
            TokenKind::LtEq => Self::Binary(BinaryOp::LtEq),
            TokenKind::Gt => Self::Binary(BinaryOp::Gt),
            TokenKind::GtEq => Self::Binary(BinaryOp::GtEq),
            TokenKind::AndAnd => Self::Logical(LogicalOp::And),
            TokenKind::OrOr => Self::Logical(LogicalOp::Or),
            TokenKind::QuestionQuestion => Self::Logical(LogicalOp::Nullish),
            _ => return None,
        };
        Some(op)
    }

    fn precedence(&self) -> u8 {
        match self {
            Self::Binary(op) => op.precedence(),
            Self::Logical(op) => op.precedence(),
        }
    }
}

impl<'src> Parser<'src> {
    pub fn new(source: &'src str) -> Self {
        Self { source, tokens: tokenize(source), pos: 0, lines: LineIndex::new(source) }
    }

    pub fn parse_program(mut self) -> ParseResult<Program> {
        let mut body = Vec::new();
        while !self.at(TokenKind::Eof) {
            body.push(self.parse_statement()?);
        }
        Ok(Program::new(body, self.lines.loc(0, self.source.len())))
    }

    // ---------------------------------------------------------------------
    // token helpers

    fn current(&self) -> &Token {
        &self.tokens[self.pos]
    }

    fn peek(&self) -> TokenKind {
        self.current().kind
    }

    fn peek_at(&self, n: usize) -> TokenKind {
        self.tokens.get(self.pos + n).map_or(TokenKind::Eof, |t| t.kind)
    }

    fn at(&self, kind: TokenKind) -> bool {
        self.peek() == kind
    }

    fn advance(&mut self) -> Token {
        let token = self.current().clone();
        if token.kind != TokenKind::Eof {
            self.pos += 1;
        }
        token
    }

    fn eat(&mut self, kind: TokenKind) -> bool {
        if self.at(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: TokenKind, expected: &str) -> ParseResult<Token> {
        if self.at(kind) {
            Ok(self.advance())
        } else {
            Err(self.unexpected(expected))
        }
    }

    fn unexpected(&self, expected: &str) -> ParseError {
        let token = self.current();
        let position = self.lines.position(token.span.start);
        let text = token.text(self.source).to_string();
        match token.kind {
            TokenKind::Eof => ParseError::UnexpectedEof { expected: expected.to_string() },
            TokenKind::Error => ParseError::InvalidToken { text, position },
            _ => ParseError::UnexpectedToken { found: text, expected: expected.to_string(), position },
        }
    }

    fn start(&self) -> usize {
        self.current().span.start
    }

    fn prev_end(&self) -> usize {
        match self.pos {
            0 => 0,
            pos => self.tokens[pos - 1].span.end,
        }
    }

    fn loc_from(&self, start: usize) -> Loc {
        self.lines.loc(start, self.prev_end().max(start))
    }

    fn newline_before(&self) -> bool {
        let (from, to) = (self.prev_end(), self.start());
        from < to && self.source[from..to].contains('\n')
    }

    fn consume_semicolon(&mut self) {
        self.eat(TokenKind::Semicolon);
    }

    fn ident(&mut self, expected: &str) -> ParseResult<String> {
        let token = self.expect(TokenKind::Ident, expected)?;
        Ok(token.text(self.source).to_string())
    }

    /// Identifier or keyword, as allowed after `.` and in property keys.
    fn property_name(&mut self) -> ParseResult<String> {
        if self.at(TokenKind::Ident) || self.peek().is_keyword() {
            Ok(self.advance().text(self.source).to_string())
        } else {
            Err(self.unexpected("property name"))
        }
    }

    // ---------------------------------------------------------------------
    // statements

    fn parse_statement(&mut self) -> ParseResult<Stmt> {
        let start = self.start();
        let kind = match self.peek() {
            TokenKind::LBrace => StmtKind::Block(self.parse_block()?),
            TokenKind::Var | TokenKind::Let | TokenKind::Const => {
                let decl = self.parse_var_decl()?;
                self.consume_semicolon();
                StmtKind::Var(decl)
            }
            TokenKind::Function => StmtKind::Function(self.parse_function(true)?),
            TokenKind::Class => StmtKind::Class(self.parse_class(true)?),
            TokenKind::If => self.parse_if()?,
            TokenKind::While => {
                self.advance();
                let test = self.parse_paren_expression()?;
                let body = Box::new(self.parse_statement()?);
                StmtKind::While(WhileStmt { test, body })
            }
            TokenKind::Do => {
                self.advance();
                let body = Box::new(self.parse_statement()?);
                self.expect(TokenKind::While, "`while`")?;
                let test = self.parse_paren_expression()?;
                self.consume_semicolon();
                StmtKind::DoWhile(DoWhileStmt { body, test })
            }
            TokenKind::For => self.parse_for()?,
            TokenKind::Return => {
                self.advance();
                let arg = if self.ends_statement() { None } else { Some(self.parse_expression()?) };
                self.consume_semicolon();
                StmtKind::Return(arg)
            }
            TokenKind::Break => {
                self.advance();
                self.consume_semicolon();
                StmtKind::Break
            }
            TokenKind::Continue => {
                self.advance();
                self.consume_semicolon();
                StmtKind::Continue
            }
            TokenKind::Throw => {
                self.advance();
                let arg = self.parse_expression()?;
                self.consume_semicolon();
                StmtKind::Throw(arg)
            }
            TokenKind::Try => self.parse_try()?,
            TokenKind::Switch => self.parse_switch()?,
            TokenKind::Export => self.parse_export()?,
            TokenKind::Semicolon => {
                self.advance();
                StmtKind::Empty
            }
            _ => {
                let expr = self.parse_expression()?;
                self.consume_semicolon();
                StmtKind::Expr(expr)
            }
        };
        Ok(Stmt::new(kind, self.loc_from(start)))
    }

    fn ends_statement(&self) -> bool {
        matches!(self.peek(), TokenKind::Semicolon | TokenKind::RBrace | TokenKind::Eof) ||
            self.newline_before()
    }

    fn parse_block(&mut self) -> ParseResult<Block> {
        let start = self.start();
        self.expect(TokenKind::LBrace, "`{`")?;
        let mut body = Vec::new();
        while !self.at(TokenKind::RBrace) && !self.at(TokenKind::Eof) {
            body.push(self.parse_statement()?);
        }
        self.expect(TokenKind::RBrace, "`}`")?;
        Ok(Block::new(body, self.loc_from(start)))
    }

    fn parse_var_decl(&mut self) -> ParseResult<VarDecl> {
        let kind = match self.advance().kind {
            TokenKind::Let => VarKind::Let,
            TokenKind::Const => VarKind::Const,
            _ => VarKind::Var,
        };
        let mut declarations = Vec::new();
        loop {
            let name = self.ident("variable name")?;
            let init = if self.eat(TokenKind::Assign) { Some(self.parse_assignment()?) } else { None };
            declarations.push(VarDeclarator { name, init });
            if !self.eat(TokenKind::Comma) {
                break;
            }
        }
        Ok(VarDecl { kind, declarations })
    }

    fn parse_paren_expression(&mut self) -> ParseResult<Expr> {
        self.expect(TokenKind::LParen, "`(`")?;
        let expr = self.parse_expression()?;
        self.expect(TokenKind::RParen, "`)`")?;
        Ok(expr)
    }

    fn parse_if(&mut self) -> ParseResult<StmtKind> {
        self.advance();
        let test = self.parse_paren_expression()?;
        let consequent = Box::new(self.parse_statement()?);
        let alternate =
            if self.eat(TokenKind::Else) { Some(Box::new(self.parse_statement()?)) } else { None };
        Ok(StmtKind::If(IfStmt { test, consequent, alternate }))
    }

    fn parse_for(&mut self) -> ParseResult<StmtKind> {
        self.advance();
        self.expect(TokenKind::LParen, "`(`")?;
        let init = match self.peek() {
            TokenKind::Semicolon => None,
            TokenKind::Var | TokenKind::Let | TokenKind::Const => {
                Some(ForInit::Var(self.parse_var_decl()?))
            }
            _ => Some(ForInit::Expr(self.parse_expression()?)),
        };
        self.expect(TokenKind::Semicolon, "`;`")?;
        let test = if self.at(TokenKind::Semicolon) { None } else { Some(self.parse_expression()?) };
        self.expect(TokenKind::Semicolon, "`;`")?;
        let update = if self.at(TokenKind::RParen) { None } else { Some(self.parse_expression()?) };
        self.expect(TokenKind::RParen, "`)`")?;
        let body = Box::new(self.parse_statement()?);
        Ok(StmtKind::For(ForStmt { init, test, update, body }))
    }

    fn parse_try(&mut self) -> ParseResult<StmtKind> {
        self.advance();
        let block = self.parse_block()?;

        let handler = if self.at(TokenKind::Catch) {
            let start = self.start();
            self.advance();
            let param = if self.eat(TokenKind::LParen) {
                let name = self.ident("catch parameter")?;
                self.expect(TokenKind::RParen, "`)`")?;
                Some(name)
            } else {
                None
            };
            let body = self.parse_block()?;
            Some(CatchClause { node: Node::new(self.loc_from(start)), param, body })
        } else {
            None
        };

        let finalizer = if self.eat(TokenKind::Finally) { Some(self.parse_block()?) } else { None };
        if handler.is_none() && finalizer.is_none() {
            return Err(self.unexpected("`catch` or `finally`"));
        }
        Ok(StmtKind::Try(TryStmt { block, handler, finalizer }))
    }

    fn parse_switch(&mut self) -> ParseResult<StmtKind> {
        self.advance();
        let discriminant = self.parse_paren_expression()?;
        self.expect(TokenKind::LBrace, "`{`")?;

        let mut cases = Vec::new();
        while !self.at(TokenKind::RBrace) {
            let start = self.start();
            let test = match self.peek() {
                TokenKind::Case => {
                    self.advance();
                    Some(self.parse_expression()?)
                }
                TokenKind::Default => {
                    self.advance();
                    None
                }
                _ => return Err(self.unexpected("`case`, `default` or `}`")),
            };
            self.expect(TokenKind::Colon, "`:`")?;

            let mut consequent = Vec::new();
            while !matches!(
                self.peek(),
                TokenKind::Case | TokenKind::Default | TokenKind::RBrace | TokenKind::Eof
            ) {
                consequent.push(self.parse_statement()?);
            }
            cases.push(SwitchCase { node: Node::new(self.loc_from(start)), test, consequent });
        }
        self.expect(TokenKind::RBrace, "`}`")?;
        Ok(StmtKind::Switch(SwitchStmt { discriminant, cases }))
    }

    fn parse_export(&mut self) -> ParseResult<StmtKind> {
        self.advance();
        let default = self.eat(TokenKind::Default);
        let start = self.start();
        let kind = match self.peek() {
            TokenKind::Function => StmtKind::Function(self.parse_function(!default)?),
            TokenKind::Class => StmtKind::Class(self.parse_class(!default)?),
            TokenKind::Var | TokenKind::Let | TokenKind::Const if !default => {
                let decl = self.parse_var_decl()?;
                self.consume_semicolon();
                StmtKind::Var(decl)
            }
            _ if default => {
                let expr = self.parse_assignment()?;
                self.consume_semicolon();
                StmtKind::Expr(expr)
            }
            _ => return Err(self.unexpected("declaration")),
        };
        let declaration = Box::new(Stmt::new(kind, self.loc_from(start)));
        Ok(StmtKind::Export(ExportDecl { default, declaration }))
    }

    fn parse_params(&mut self) -> ParseResult<Vec<String>> {
        self.expect(TokenKind::LParen, "`(`")?;
        let mut params = Vec::new();
        while !self.at(TokenKind::RParen) {
            params.push(self.ident("parameter name")?);
            if !self.eat(TokenKind::Comma) {
                break;
            }
        }
        self.expect(TokenKind::RParen, "`)`")?;
        Ok(params)
    }

    fn parse_function(&mut self, require_name: bool) -> ParseResult<Function> {
        let start = self.start();
        self.expect(TokenKind::Function, "`function`")?;
        let name = if self.at(TokenKind::Ident) {
            Some(self.ident("function name")?)
        } else if require_name {
            return Err(self.unexpected("function name"));
        } else {
            None
        };
        let params = self.parse_params()?;
        let body = self.parse_block()?;
        Ok(Function {
            node: Node::new(self.loc_from(start)),
            name,
            params,
            body: FunctionBody::Block(body),
            is_arrow: false,
        })
    }

    /// Parameters and body of a method; `start` is the offset of the method name.
    fn parse_method_function(&mut self, start: usize, name: &str) -> ParseResult<Function> {
        let params = self.parse_params()?;
        let body = self.parse_block()?;
        Ok(Function {
            node: Node::new(self.loc_from(start)),
            name: Some(name.to_string()),
            params,
            body: FunctionBody::Block(body),
            is_arrow: false,
        })
    }

    fn parse_class(&mut self, require_name: bool) -> ParseResult<Class> {
        self.expect(TokenKind::Class, "`class`")?;
        let name = if self.at(TokenKind::Ident) {
            Some(self.ident("class name")?)
        } else if require_name {
            return Err(self.unexpected("class name"));
        } else {
            None
        };
        self.expect(TokenKind::LBrace, "`{`")?;

        let mut methods = Vec::new();
        while !self.at(TokenKind::RBrace) {
            if self.eat(TokenKind::Semicolon) {
                continue;
            }
            let start = self.start();
            let is_static = self.at(TokenKind::Static) && self.peek_at(1) != TokenKind::LParen;
            if is_static {
                self.advance();
            }
            let name = self.property_name()?;
            let function = self.parse_method_function(start, &name)?;
            methods.push(Method { name, is_static, function });
        }
        self.expect(TokenKind::RBrace, "`}`")?;
        Ok(Class { name, methods })
    }

    // ---------------------------------------------------------------------
    // expressions

    pub fn parse_expression(&mut self) -> ParseResult<Expr> {
        let start = self.start();
        let first = self.parse_assignment()?;
        if !self.at(TokenKind::Comma) {
            return Ok(first);
        }
        let mut exprs = vec![first];
        while self.eat(TokenKind::Comma) {
            exprs.push(self.parse_assignment()?);
        }
        Ok(Expr::new(ExprKind::Sequence(exprs), self.loc_from(start)))
    }

    fn parse_assignment(&mut self) -> ParseResult<Expr> {
        if self.is_arrow_start() {
            return self.parse_arrow();
        }

        let start = self.start();
        let target = self.parse_conditional()?;
        let op = match self.peek() {
            TokenKind::Assign => AssignOp::Assign,
            TokenKind::PlusAssign => AssignOp::AddAssign,
            TokenKind::MinusAssign => AssignOp::SubAssign,
            TokenKind::StarAssign => AssignOp::MulAssign,
            TokenKind::SlashAssign => AssignOp::DivAssign,
            _ => return Ok(target),
        };
        if !is_assignable(&target) {
            return Err(ParseError::InvalidAssignmentTarget {
                position: self.lines.position(start),
            });
        }
        self.advance();
        let value = self.parse_assignment()?;
        Ok(Expr::new(
            ExprKind::Assign { op, target: Box::new(target), value: Box::new(value) },
            self.loc_from(start),
        ))
    }

    /// `x =>` or `(...) =>` ahead.
    fn is_arrow_start(&self) -> bool {
        match self.peek() {
            TokenKind::Ident => self.peek_at(1) == TokenKind::Arrow,
            TokenKind::LParen => {
                let mut depth = 0usize;
                for (offset, token) in self.tokens[self.pos..].iter().enumerate() {
                    match token.kind {
                        TokenKind::LParen => depth += 1,
                        TokenKind::RParen => {
                            depth -= 1;
                            if depth == 0 {
                                return self.peek_at(offset + 1) == TokenKind::Arrow;
                            }
                        }
                        TokenKind::Eof => return false,
                        _ => {}
                    }
                }
                false
            }
            _ => false,
        }
    }

    fn parse_arrow(&mut self) -> ParseResult<Expr> {
        let start = self.start();
        let params = if self.at(TokenKind::Ident) {
            vec![self.ident("parameter name")?]
        } else {
            self.parse_params()?
        };
        self.expect(TokenKind::Arrow, "`=>`")?;
        let body = if self.at(TokenKind::LBrace) {
            FunctionBody::Block(self.parse_block()?)
        } else {
            FunctionBody::Expr(Box::new(self.parse_assignment()?))
        };
        let loc = self.loc_from(start);
        let function = Function { node: Node::new(loc), name: None, params, body, is_arrow: true };
        Ok(Expr::new(ExprKind::Function(Box::new(function)), loc))
    }

    fn parse_conditional(&mut self) -> ParseResult<Expr> {
        let start = self.start();
        let test = self.parse_binary(0)?;
        if !self.eat(TokenKind::Question) {
            return Ok(test);
        }
        let consequent = self.parse_assignment()?;
        self.expect(TokenKind::Colon, "`:`")?;
        let alternate = self.parse_assignment()?;
        Ok(Expr::new(
            ExprKind::Conditional {
                test: Box::new(test),
                consequent: Box::new(consequent),
                alternate: Box::new(alternate),
            },
            self.loc_from(start),
        ))
    }

    fn parse_binary(&mut self, min_precedence: u8) -> ParseResult<Expr> {
        let start = self.start();
        let mut left = self.parse_unary()?;
        while let Some(op) = Operator::from_token(self.peek()) {
            let precedence = op.precedence();
            if precedence < min_precedence {
                break;
            }
            self.advance();
            let right = Box::new(self.parse_binary(precedence + 1)?);
            let left_box = Box::new(left);
            let kind = match op {
                Operator::Binary(op) => ExprKind::Binary { op, left: left_box, right },
                Operator::Logical(op) => ExprKind::Logical { op, left: left_box, right },
            };
            left = Expr::new(kind, self.loc_from(start));
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> ParseResult<Expr> {
        let start = self.start();
        let op = match self.peek() {
            TokenKind::Bang => UnaryOp::Not,
            TokenKind::Minus => UnaryOp::Minus,
            TokenKind::Plus => UnaryOp::Plus,
            TokenKind::TypeOf => UnaryOp::TypeOf,
            TokenKind::Void => UnaryOp::Void,
            TokenKind::PlusPlus | TokenKind::MinusMinus => {
                let op = if self.advance().kind == TokenKind::PlusPlus {
                    UpdateOp::Increment
                } else {
                    UpdateOp::Decrement
                };
                let target = self.parse_unary()?;
                if !is_assignable(&target) {
                    return Err(ParseError::InvalidAssignmentTarget {
                        position: self.lines.position(start),
                    });
                }
                return Ok(Expr::new(
                    ExprKind::Update { op, prefix: true, target: Box::new(target) },
                    self.loc_from(start),
                ));
            }
            _ => return self.parse_postfix(),
        };
        self.advance();
        let arg = self.parse_unary()?;
        Ok(Expr::new(ExprKind::Unary { op, arg: Box::new(arg) }, self.loc_from(start)))
    }

    fn parse_postfix(&mut self) -> ParseResult<Expr> {
        let start = self.start();
        let expr = self.parse_call_member()?;
        let op = match self.peek() {
            TokenKind::PlusPlus if !self.newline_before() => UpdateOp::Increment,
            TokenKind::MinusMinus if !self.newline_before() => UpdateOp::Decrement,
            _ => return Ok(expr),
        };
        if !is_assignable(&expr) {
            return Err(ParseError::InvalidAssignmentTarget { position: self.lines.position(start) });
        }
        self.advance();
        Ok(Expr::new(
            ExprKind::Update { op, prefix: false, target: Box::new(expr) },
            self.loc_from(start),
        ))
    }

    fn parse_call_member(&mut self) -> ParseResult<Expr> {
        let start = self.start();
        let mut expr = if self.at(TokenKind::New) { self.parse_new()? } else { self.parse_primary()? };
        loop {
            let kind = match self.peek() {
                TokenKind::Dot | TokenKind::LBracket => self.parse_member_access(expr)?,
                TokenKind::LParen => {
                    let args = self.parse_arguments()?;
                    ExprKind::Call { callee: Box::new(expr), args }
                }
                _ => break,
            };
            expr = Expr::new(kind, self.loc_from(start));
        }
        Ok(expr)
    }

    fn parse_member_access(&mut self, object: Expr) -> ParseResult<ExprKind> {
        let property = if self.eat(TokenKind::Dot) {
            MemberProp::Named(self.property_name()?)
        } else {
            self.expect(TokenKind::LBracket, "`[`")?;
            let property = self.parse_expression()?;
            self.expect(TokenKind::RBracket, "`]`")?;
            MemberProp::Computed(Box::new(property))
        };
        Ok(ExprKind::Member { object: Box::new(object), property })
    }

    fn parse_new(&mut self) -> ParseResult<Expr> {
        let start = self.start();
        self.expect(TokenKind::New, "`new`")?;

        let callee_start = self.start();
        let mut callee = if self.at(TokenKind::New) { self.parse_new()? } else { self.parse_primary()? };
        while matches!(self.peek(), TokenKind::Dot | TokenKind::LBracket) {
            let kind = self.parse_member_access(callee)?;
            callee = Expr::new(kind, self.loc_from(callee_start));
        }

        let args = if self.at(TokenKind::LParen) { self.parse_arguments()? } else { Vec::new() };
        Ok(Expr::new(ExprKind::New { callee: Box::new(callee), args }, self.loc_from(start)))
    }

    fn parse_arguments(&mut self) -> ParseResult<Vec<Expr>> {
        self.expect(TokenKind::LParen, "`(`")?;
        let mut args = Vec::new();
        while !self.at(TokenKind::RParen) {
            args.push(self.parse_assignment()?);
            if !self.eat(TokenKind::Comma) {
                break;
            }
        }
        self.expect(TokenKind::RParen, "`)`")?;
        Ok(args)
    }

    fn parse_primary(&mut self) -> ParseResult<Expr> {
        let start = self.start();
        let kind = match self.peek() {
            TokenKind::Number => {
                let token = self.advance();
                ExprKind::Number(self.number(&token)?)
            }
            TokenKind::String => {
                let token = self.advance();
                ExprKind::String(unescape(token.text(self.source)))
            }
            TokenKind::True => {
                self.advance();
                ExprKind::Bool(true)
            }
            TokenKind::False => {
                self.advance();
                ExprKind::Bool(false)
            }
            TokenKind::Null => {
                self.advance();
                ExprKind::Null
            }
            TokenKind::This => {
                self.advance();
                ExprKind::This
            }
            TokenKind::Ident => ExprKind::Ident(self.ident("identifier")?),
            TokenKind::LParen => return self.parse_paren_expression(),
            TokenKind::LBracket => {
                self.advance();
                let mut elements = Vec::new();
                while !self.at(TokenKind::RBracket) {
                    elements.push(self.parse_assignment()?);
                    if !self.eat(TokenKind::Comma) {
                        break;
                    }
                }
                self.expect(TokenKind::RBracket, "`]`")?;
                ExprKind::Array(elements)
            }
            TokenKind::LBrace => ExprKind::Object(self.parse_object()?),
            TokenKind::Function => ExprKind::Function(Box::new(self.parse_function(false)?)),
            _ => return Err(self.unexpected("expression")),
        };
        Ok(Expr::new(kind, self.loc_from(start)))
    }

    fn parse_object(&mut self) -> ParseResult<Vec<Property>> {
        self.expect(TokenKind::LBrace, "`{`")?;
        let mut properties = Vec::new();
        while !self.at(TokenKind::RBrace) {
            let start = self.start();
            let (key, shorthand_allowed) = match self.peek() {
                TokenKind::String => (unescape(self.advance().text(self.source)), false),
                TokenKind::Number => {
                    let token = self.advance();
                    (format_number(self.number(&token)?), false)
                }
                TokenKind::Ident => (self.property_name()?, true),
                _ => (self.property_name()?, false),
            };

            let value = match self.peek() {
                TokenKind::Colon => {
                    self.advance();
                    self.parse_assignment()?
                }
                TokenKind::LParen => {
                    // anonymous, so keyword keys still print as valid function expressions
                    let mut function = self.parse_method_function(start, &key)?;
                    function.name = None;
                    let loc = self.loc_from(start);
                    Expr::new(ExprKind::Function(Box::new(function)), loc)
                }
                _ if shorthand_allowed => {
                    Expr::new(ExprKind::Ident(key.clone()), self.loc_from(start))
                }
                _ => return Err(self.unexpected("`:`")),
            };
            properties.push(Property { key, value });

            if !self.eat(TokenKind::Comma) {
                break;
            }
        }
        self.expect(TokenKind::RBrace, "`}`")?;
        Ok(properties)
    }

    fn number(&self, token: &Token) -> ParseResult<f64> {
        let text = token.text(self.source);
        let parsed = match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
            Some(hex) => i64::from_str_radix(hex, 16).ok().map(|n| n as f64),
            None => text.parse::<f64>().ok(),
        };
        parsed.ok_or_else(|| ParseError::InvalidNumber {
            text: text.to_string(),
            position: self.lines.position(token.span.start),
        })
    }
}

fn is_assignable(expr: &Expr) -> bool {
    matches!(expr.kind, ExprKind::Ident(_) | ExprKind::Member { .. })
}

/// Render a number the way JavaScript prints property keys.
pub(crate) fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e21 {
        format!("{}", n as i64)
    } else {
        format!("{n}")
    }
}

/// Decode a quoted string literal, quotes included.
fn unescape(raw: &str) -> String {
    let inner = &raw[1..raw.len() - 1];
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('b') => out.push('\u{8}'),
            Some('f') => out.push('\u{c}'),
            Some('v') => out.push('\u{b}'),
            Some('0') => out.push('\0'),
            Some(escape @ ('u' | 'x')) => {
                let digits: String =
                    chars.by_ref().take(if escape == 'u' { 4 } else { 2 }).collect();
                match u32::from_str_radix(&digits, 16).ok().and_then(char::from_u32) {
                    Some(decoded) => out.push(decoded),
                    None => {
                        out.push(escape);
                        out.push_str(&digits);
                    }
                }
            }
            Some(other) => out.push(other),
            None => {}
        }
    }
    out
}
