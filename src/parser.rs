use crate::{
    ast::{
        BinaryOp, Block, Expr, ExprKind, Ident, NodeId, Param, Proc, Program, Stmt, StmtKind,
        TypeExpr, UnaryOp,
    },
    diagnostic::{Diagnostic, DiagnosticKind, Diagnostics},
    lexer,
    token::{Span, Token, TokenKind},
};

pub type ParserResult<T> = Result<T, Diagnostic>;

const EXPR_START: &[TokenKind] = &[
    TokenKind::Identifier,
    TokenKind::Integer,
    TokenKind::Float,
    TokenKind::String,
    TokenKind::True,
    TokenKind::False,
    TokenKind::LParen,
    TokenKind::Minus,
    TokenKind::Bang,
];

/// Deepest nesting of blocks and expressions the parser accepts. Later
/// passes walk the tree recursively, so this also bounds their stack use.
pub const MAX_NESTING: usize = 128;

const INTEGER_SUFFIXES: &[&str] = &["u8", "u16", "u32", "u64", "i8", "i16", "i32", "i64"];

/// Recursive-descent parser over a lexed token vector.
///
/// Syntax errors are collected; after each one the parser skips to the next
/// statement boundary and keeps going.
pub struct Parser<'src> {
    tokens: Vec<Token<'src>>,
    pos: usize,
    next_id: u32,
    depth: usize,
    errors: Vec<Diagnostic>,
}

impl<'src> Parser<'src> {
    /// Constructs a new [Parser] from the output of the lexer.
    pub fn new(mut tokens: Vec<Token<'src>>) -> Self {
        if tokens.last().map(|t| t.kind) != Some(TokenKind::Eof) {
            let end = tokens.last().map_or(0, |t| t.span.end);
            tokens.push(Token {
                kind: TokenKind::Eof,
                span: Span::new(end, end),
                text: "",
            });
        }

        Self {
            tokens,
            pos: 0,
            next_id: 0,
            depth: 0,
            errors: Vec::new(),
        }
    }

    /// Parses the whole translation unit. Every syntax error ends up in
    /// `diagnostics`; the returned [Program] is only meaningful if none did.
    pub fn parse(mut self, diagnostics: &mut Diagnostics) -> Program {
        let mut procs = Vec::new();

        while !self.is_peek(&[TokenKind::Eof]) {
            let item_start = self.pos;
            let result = if self.is_peek(&[TokenKind::Proc]) {
                self.parse_proc()
            } else {
                Err(self.unexpected(&[TokenKind::Proc]))
            };

            match result {
                Ok(proc) => procs.push(proc),
                Err(err) => {
                    self.errors.push(err);
                    self.synchronize_item(item_start);
                }
            }
        }

        for err in self.errors {
            diagnostics.push(err);
        }

        Program { procs }
    }

    fn alloc_id(&mut self) -> NodeId {
        let id = NodeId(self.next_id);
        self.next_id += 1;
        id
    }

    #[inline]
    /// Returns the next [Token] without consuming it.
    fn peek(&self) -> Token<'src> {
        self.tokens[self.pos]
    }

    #[inline]
    fn peek_second(&self) -> Token<'src> {
        self.tokens[(self.pos + 1).min(self.tokens.len() - 1)]
    }

    #[inline]
    /// Checks if the peek [Token] is one of the given [TokenKind]s.
    fn is_peek(&self, kinds: &[TokenKind]) -> bool {
        kinds.contains(&self.peek().kind)
    }

    #[inline]
    /// Consumes and returns the next [Token]. [TokenKind::Eof] is never consumed.
    fn next(&mut self) -> Token<'src> {
        let token = self.peek();
        if token.kind != TokenKind::Eof {
            self.pos += 1;
        }
        token
    }

    fn try_next(&mut self, kind: TokenKind) -> Option<Token<'src>> {
        if self.is_peek(&[kind]) {
            Some(self.next())
        } else {
            None
        }
    }

    fn previous_end(&self) -> usize {
        self.pos
            .checked_sub(1)
            .map_or(0, |idx| self.tokens[idx].span.end)
    }

    /// Counts one more level of nesting, failing past [MAX_NESTING].
    fn enter(&mut self) -> ParserResult<()> {
        if self.depth >= MAX_NESTING {
            return Err(Diagnostic::new(
                DiagnosticKind::NestingTooDeep { limit: MAX_NESTING },
                self.peek().span,
            ));
        }
        self.depth += 1;
        Ok(())
    }

    /// Runs `parse` one level deeper. The depth is restored on both paths.
    fn nested<T>(
        &mut self,
        parse: impl FnOnce(&mut Self) -> ParserResult<T>,
    ) -> ParserResult<T> {
        let outer = self.depth;
        let result = self.enter().and_then(|()| parse(self));
        self.depth = outer;
        result
    }

    fn unexpected(&self, expected: &'static [TokenKind]) -> Diagnostic {
        let token = self.peek();
        Diagnostic::new(
            DiagnosticKind::UnexpectedToken {
                expected,
                found: token.kind,
            },
            token.span,
        )
    }

    /// Consumes and returns the next [Token] if it is of the given [TokenKind]s,
    /// otherwise returns an error.
    fn expect(&mut self, kinds: &'static [TokenKind]) -> ParserResult<Token<'src>> {
        if self.is_peek(kinds) {
            Ok(self.next())
        } else {
            Err(self.unexpected(kinds))
        }
    }

    fn expect_ident(&mut self) -> ParserResult<Ident> {
        let token = self.expect(&[TokenKind::Identifier])?;
        Ok(Ident {
            name: token.text.to_string(),
            span: token.span,
        })
    }

    fn parse_type(&mut self) -> ParserResult<TypeExpr> {
        let ident = self.expect_ident()?;
        Ok(TypeExpr {
            name: ident.name,
            span: ident.span,
        })
    }

    /// Skips to the next `proc` after a top-level error.
    fn synchronize_item(&mut self, item_start: usize) {
        if self.pos == item_start {
            self.next();
        }
        while !self.is_peek(&[TokenKind::Proc, TokenKind::Eof]) {
            self.next();
        }
    }

    /// Skips to the next statement boundary after an error inside a block.
    fn synchronize_stmt(&mut self, error_pos: usize) {
        loop {
            match self.peek().kind {
                TokenKind::Semicolon => {
                    self.next();
                    return;
                }
                TokenKind::Eof
                | TokenKind::RBrace
                | TokenKind::Proc
                | TokenKind::Let
                | TokenKind::If
                | TokenKind::For
                | TokenKind::Return
                    if self.pos != error_pos =>
                {
                    return
                }
                TokenKind::Eof | TokenKind::RBrace | TokenKind::Proc => return,
                _ => {
                    self.next();
                }
            }
        }
    }

    fn parse_proc(&mut self) -> ParserResult<Proc> {
        let start = self.expect(&[TokenKind::Proc])?.span;
        let id = self.alloc_id();
        let name = self.expect_ident()?;

        self.expect(&[TokenKind::LParen])?;
        let mut params = Vec::new();
        while !self.is_peek(&[TokenKind::RParen]) {
            let name = self.expect_ident()?;
            self.expect(&[TokenKind::Colon])?;
            let ty = self.parse_type()?;
            params.push(Param {
                id: self.alloc_id(),
                name,
                ty,
            });

            if self.try_next(TokenKind::Comma).is_none() {
                break;
            }
        }
        self.expect(&[TokenKind::RParen])?;

        let ret = match self.try_next(TokenKind::Colon) {
            Some(_) => Some(self.parse_type()?),
            None => None,
        };

        let body = self.parse_block()?;
        let span = start.to(body.span);

        Ok(Proc {
            id,
            name,
            params,
            ret,
            body,
            span,
        })
    }

    fn parse_block(&mut self) -> ParserResult<Block> {
        self.nested(Self::parse_block_inner)
    }

    fn parse_block_inner(&mut self) -> ParserResult<Block> {
        let start = self.expect(&[TokenKind::LBrace])?.span;

        let mut stmts = Vec::new();
        while !self.is_peek(&[TokenKind::RBrace, TokenKind::Eof, TokenKind::Proc]) {
            let error_pos = self.pos;
            match self.parse_stmt() {
                Ok(stmt) => stmts.push(stmt),
                Err(err) => {
                    self.errors.push(err);
                    self.synchronize_stmt(error_pos);
                }
            }
        }

        let end = self.expect(&[TokenKind::RBrace])?.span;
        Ok(Block {
            stmts,
            span: start.to(end),
        })
    }

    fn parse_stmt(&mut self) -> ParserResult<Stmt> {
        let start = self.peek().span;

        let kind = match self.peek().kind {
            TokenKind::LBrace => StmtKind::Block(self.parse_block()?),
            TokenKind::If => return self.parse_if(),
            TokenKind::For => {
                self.next();
                let id = self.alloc_id();
                let var = self.expect_ident()?;
                self.expect(&[TokenKind::In])?;
                let range_start = self.parse_expr()?;
                self.expect(&[TokenKind::DotDot])?;
                let end = self.parse_expr()?;
                let body = self.parse_block()?;
                StmtKind::For {
                    id,
                    var,
                    start: range_start,
                    end,
                    body,
                }
            }
            TokenKind::Let => {
                self.next();
                let id = self.alloc_id();
                let name = self.expect_ident()?;
                let ty = match self.try_next(TokenKind::Colon) {
                    Some(_) => Some(self.parse_type()?),
                    None => None,
                };
                self.expect(&[TokenKind::Assign])?;
                let init = self.parse_expr()?;
                self.expect(&[TokenKind::Semicolon])?;
                StmtKind::Let { id, name, ty, init }
            }
            TokenKind::Return => {
                self.next();
                let value = if self.is_peek(&[TokenKind::Semicolon]) {
                    None
                } else {
                    Some(self.parse_expr()?)
                };
                self.expect(&[TokenKind::Semicolon])?;
                StmtKind::Return(value)
            }
            TokenKind::Identifier if self.peek_second().kind == TokenKind::Assign => {
                let id = self.alloc_id();
                let target = self.expect_ident()?;
                self.next();
                let value = self.parse_expr()?;
                self.expect(&[TokenKind::Semicolon])?;
                StmtKind::Assign { id, target, value }
            }
            _ => {
                let expr = self.parse_expr()?;
                self.expect(&[TokenKind::Semicolon])?;
                StmtKind::Expr(expr)
            }
        };

        Ok(Stmt {
            kind,
            span: start.to(Span::new(start.start, self.previous_end())),
        })
    }

    fn parse_if(&mut self) -> ParserResult<Stmt> {
        let start = self.expect(&[TokenKind::If])?.span;
        let cond = self.parse_expr()?;
        let then = self.parse_block()?;

        let els = match self.try_next(TokenKind::Else) {
            None => None,
            Some(_) if self.is_peek(&[TokenKind::If]) => {
                let nested = self.parse_if()?;
                Some(Block {
                    span: nested.span,
                    stmts: vec![nested],
                })
            }
            Some(_) => Some(self.parse_block()?),
        };

        let end = els.as_ref().map_or(then.span, |els| els.span);
        Ok(Stmt {
            kind: StmtKind::If { cond, then, els },
            span: start.to(end),
        })
    }

    pub fn parse_expr(&mut self) -> ParserResult<Expr> {
        self.nested(Self::parse_or)
    }

    fn parse_binary_level(
        &mut self,
        operand: fn(&mut Self) -> ParserResult<Expr>,
        ops: &[(TokenKind, BinaryOp)],
    ) -> ParserResult<Expr> {
        let outer = self.depth;
        let result = self.parse_binary_chain(operand, ops);
        self.depth = outer;
        result
    }

    /// Each operator in a chain deepens the left spine of the tree by one.
    fn parse_binary_chain(
        &mut self,
        operand: fn(&mut Self) -> ParserResult<Expr>,
        ops: &[(TokenKind, BinaryOp)],
    ) -> ParserResult<Expr> {
        let mut lhs = operand(self)?;

        while let Some(&(_, op)) = ops.iter().find(|(kind, _)| self.is_peek(&[*kind])) {
            self.enter()?;
            self.next();
            let rhs = operand(self)?;
            let span = lhs.span.to(rhs.span);
            lhs = Expr {
                kind: ExprKind::Binary {
                    op,
                    lhs: Box::new(lhs),
                    rhs: Box::new(rhs),
                },
                id: self.alloc_id(),
                span,
            };
        }

        Ok(lhs)
    }

    fn parse_or(&mut self) -> ParserResult<Expr> {
        self.parse_binary_level(Self::parse_and, &[(TokenKind::OrOr, BinaryOp::Or)])
    }

    fn parse_and(&mut self) -> ParserResult<Expr> {
        self.parse_binary_level(Self::parse_equality, &[(TokenKind::AndAnd, BinaryOp::And)])
    }

    fn parse_equality(&mut self) -> ParserResult<Expr> {
        self.parse_binary_level(
            Self::parse_relational,
            &[
                (TokenKind::Equal, BinaryOp::Eq),
                (TokenKind::Unequal, BinaryOp::Ne),
            ],
        )
    }

    fn parse_relational(&mut self) -> ParserResult<Expr> {
        self.parse_binary_level(
            Self::parse_additive,
            &[
                (TokenKind::LessThan, BinaryOp::Lt),
                (TokenKind::LessEqual, BinaryOp::Le),
                (TokenKind::GreaterThan, BinaryOp::Gt),
                (TokenKind::GreaterEqual, BinaryOp::Ge),
            ],
        )
    }

    fn parse_additive(&mut self) -> ParserResult<Expr> {
        self.parse_binary_level(
            Self::parse_multiplicative,
            &[
                (TokenKind::Plus, BinaryOp::Add),
                (TokenKind::Minus, BinaryOp::Sub),
            ],
        )
    }

    fn parse_multiplicative(&mut self) -> ParserResult<Expr> {
        self.parse_binary_level(
            Self::parse_unary,
            &[
                (TokenKind::Asterisk, BinaryOp::Mul),
                (TokenKind::Slash, BinaryOp::Div),
                (TokenKind::Percent, BinaryOp::Rem),
            ],
        )
    }

    fn parse_unary(&mut self) -> ParserResult<Expr> {
        let op = match self.peek().kind {
            TokenKind::Minus => UnaryOp::Neg,
            TokenKind::Bang => UnaryOp::Not,
            _ => return self.parse_expr_atom(),
        };

        let start = self.next().span;
        let operand = self.nested(Self::parse_unary)?;
        let span = start.to(operand.span);
        Ok(Expr {
            kind: ExprKind::Unary {
                op,
                operand: Box::new(operand),
            },
            id: self.alloc_id(),
            span,
        })
    }

    pub fn parse_expr_atom(&mut self) -> ParserResult<Expr> {
        let token = self.peek();

        let kind = match token.kind {
            TokenKind::Identifier if self.peek_second().kind == TokenKind::LParen => {
                return self.parse_call()
            }
            TokenKind::Identifier => ExprKind::Ident(token.text.to_string()),
            TokenKind::Integer => parse_integer(token)?,
            TokenKind::Float => parse_float(token)?,
            TokenKind::String => ExprKind::String(lexer::unescape(token.text)),
            TokenKind::True => ExprKind::Bool(true),
            TokenKind::False => ExprKind::Bool(false),
            TokenKind::LParen => {
                self.next();
                let inner = self.parse_expr()?;
                self.expect(&[TokenKind::RParen])?;
                return Ok(inner);
            }
            _ => return Err(self.unexpected(EXPR_START)),
        };

        self.next();
        Ok(Expr {
            id: self.alloc_id(),
            kind,
            span: token.span,
        })
    }

    fn parse_call(&mut self) -> ParserResult<Expr> {
        let callee = self.expect_ident()?;
        self.expect(&[TokenKind::LParen])?;

        let mut args = Vec::new();
        while !self.is_peek(&[TokenKind::RParen]) {
            args.push(self.parse_expr()?);
            if self.try_next(TokenKind::Comma).is_none() {
                break;
            }
        }
        let end = self.expect(&[TokenKind::RParen])?.span;

        Ok(Expr {
            id: self.alloc_id(),
            span: callee.span.to(end),
            kind: ExprKind::Call { callee, args },
        })
    }
}

fn invalid_literal(token: Token<'_>, reason: &'static str) -> Diagnostic {
    Diagnostic::new(
        DiagnosticKind::InvalidLiteral {
            text: token.text.to_string(),
            reason,
        },
        token.span,
    )
}

/// Splits an integer token into radix, digits and suffix.
fn split_integer(text: &str) -> (u32, &str, &str) {
    let (radix, body) = match text.get(..2) {
        Some("0x") => (16, &text[2..]),
        Some("0b") => (2, &text[2..]),
        Some("0o") => (8, &text[2..]),
        _ => (10, text),
    };

    let split = body
        .find(|ch: char| ch != '_' && !ch.is_digit(radix))
        .unwrap_or(body.len());
    (radix, &body[..split], &body[split..])
}

fn parse_integer(token: Token<'_>) -> ParserResult<ExprKind> {
    let (radix, digits, suffix) = split_integer(token.text);

    let suffix = match suffix {
        "" => None,
        s if INTEGER_SUFFIXES.contains(&s) => Some(s.to_string()),
        _ => return Err(invalid_literal(token, "unknown integer suffix")),
    };

    let digits = digits.replace('_', "");
    let value = u64::from_str_radix(&digits, radix)
        .map_err(|_| invalid_literal(token, "integer literal is too large"))?;

    Ok(ExprKind::Integer { value, suffix })
}

fn parse_float(token: Token<'_>) -> ParserResult<ExprKind> {
    let split = token
        .text
        .find(|ch: char| ch.is_ascii_alphabetic() && ch != 'e' && ch != 'E')
        .unwrap_or(token.text.len());
    let (number, suffix) = token.text.split_at(split);

    if !matches!(suffix, "" | "f64") {
        return Err(invalid_literal(token, "unknown float suffix"));
    }

    let value: f64 = number
        .replace('_', "")
        .parse()
        .map_err(|_| invalid_literal(token, "malformed float literal"))?;

    Ok(ExprKind::Float {
        value_bits: value.to_bits(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::Lexer;

    fn parse(source: &str) -> (Program, Vec<Diagnostic>) {
        let mut diagnostics = Diagnostics::new(32);
        let tokens = Lexer::new(source).tokenize(&mut diagnostics);
        assert!(diagnostics.is_empty(), "lex errors in test input");
        let program = Parser::new(tokens).parse(&mut diagnostics);
        (program, diagnostics.into_vec())
    }

    fn parse_ok(source: &str) -> Program {
        let (program, errors) = parse(source);
        assert!(errors.is_empty(), "unexpected errors: {:?}", errors);
        program
    }

    /// Renders an expression as an s-expression to check tree shape.
    fn sexpr(expr: &Expr) -> String {
        match &expr.kind {
            ExprKind::Integer { value, suffix } => {
                format!("{}{}", value, suffix.as_deref().unwrap_or(""))
            }
            ExprKind::Float { value_bits } => f64::from_bits(*value_bits).to_string(),
            ExprKind::String(s) => format!("{:?}", s),
            ExprKind::Bool(b) => b.to_string(),
            ExprKind::Ident(name) => name.clone(),
            ExprKind::Unary { op, operand } => format!("({} {})", op, sexpr(operand)),
            ExprKind::Binary { op, lhs, rhs } => {
                format!("({} {} {})", op, sexpr(lhs), sexpr(rhs))
            }
            ExprKind::Call { callee, args } => {
                let args: Vec<_> = args.iter().map(sexpr).collect();
                format!("(call {} {})", callee.name, args.join(" "))
            }
        }
    }

    fn first_expr(program: &Program) -> &Expr {
        match &program.procs[0].body.stmts[0].kind {
            StmtKind::Expr(expr) | StmtKind::Assign { value: expr, .. } => expr,
            other => panic!("unexpected statement {:?}", other),
        }
    }

    #[test]
    fn precedence() {
        let cases = [
            ("1 + 2 * 3;", "(+ 1 (* 2 3))"),
            ("(1 + 2) * 3;", "(* (+ 1 2) 3)"),
            ("a - b - c;", "(- (- a b) c)"),
            ("-a * !b;", "(* (- a) (! b))"),
            ("a < b == c >= d;", "(== (< a b) (>= c d))"),
            ("a || b && c == d;", "(|| a (&& b (== c d)))"),
            ("x = num % div == 0;", "(== (% num div) 0)"),
            ("f(1, g(2,), 3u8);", "(call f 1 (call g 2) 3u8)"),
            ("0xff + 0b11 + 1_000 + 2.5;", "(+ (+ (+ 255 3) 1000) 2.5)"),
        ];

        for (input, expected) in cases {
            let program = parse_ok(&format!("proc main() {{ {} }}", input));
            assert_eq!(sexpr(first_expr(&program)), expected, "input: {}", input);
        }
    }

    #[test]
    fn procedure_declaration() {
        let program = parse_ok(
            "proc is_prime(num: u64): bool {
                for div in 2..(num / 2) {
                    if num % div == 0 {
                        return false;
                    }
                }
                return true;
            }
            proc main() {}",
        );

        assert_eq!(program.procs.len(), 2);
        let proc = &program.procs[0];
        assert_eq!(proc.name.name, "is_prime");
        assert_eq!(proc.params.len(), 1);
        assert_eq!(proc.params[0].name.name, "num");
        assert_eq!(proc.params[0].ty.name, "u64");
        assert_eq!(proc.ret.as_ref().map(|t| t.name.as_str()), Some("bool"));
        assert!(program.procs[1].ret.is_none());

        match &proc.body.stmts[0].kind {
            StmtKind::For {
                var, start, end, ..
            } => {
                assert_eq!(var.name, "div");
                assert_eq!(sexpr(start), "2");
                assert_eq!(sexpr(end), "(/ num 2)");
            }
            other => panic!("expected for loop, got {:?}", other),
        }
        assert!(matches!(proc.body.stmts[1].kind, StmtKind::Return(Some(_))));
    }

    #[test]
    fn else_if_nests_in_block() {
        let program = parse_ok("proc main() { if a { } else if b { } else { return; } }");

        let StmtKind::If { els: Some(els), .. } = &program.procs[0].body.stmts[0].kind else {
            panic!("expected if with else");
        };
        assert_eq!(els.stmts.len(), 1);
        assert!(matches!(
            &els.stmts[0].kind,
            StmtKind::If { els: Some(_), .. }
        ));
    }

    #[test]
    fn recovers_and_reports_each_error() {
        let (program, errors) = parse(
            "proc main() {
                let = 1;
                let ok = 2;
                return 2 + ;
            }",
        );

        assert_eq!(errors.len(), 2, "{:?}", errors);
        assert_eq!(
            errors[0].kind,
            DiagnosticKind::UnexpectedToken {
                expected: &[TokenKind::Identifier],
                found: TokenKind::Assign,
            }
        );
        assert_eq!(
            errors[1].kind,
            DiagnosticKind::UnexpectedToken {
                expected: EXPR_START,
                found: TokenKind::Semicolon,
            }
        );
        assert!(program.procs[0]
            .body
            .stmts
            .iter()
            .any(|stmt| matches!(&stmt.kind, StmtKind::Let { name, .. } if name.name == "ok")));
    }

    #[test]
    fn junk_between_procedures() {
        let (program, errors) = parse("let x = 1; proc main() { }");

        assert_eq!(errors.len(), 1);
        assert_eq!(program.procs.len(), 1);
        assert_eq!(program.procs[0].name.name, "main");
    }

    #[test]
    fn missing_closing_brace_before_next_proc() {
        let (program, errors) = parse("proc a() { f(); proc b() { }");

        assert_eq!(errors.len(), 1);
        assert_eq!(program.procs.len(), 1);
        assert_eq!(program.procs[0].name.name, "b");
    }

    #[test]
    fn invalid_literals() {
        let cases = [
            ("12abc", "unknown integer suffix"),
            ("99999999999999999999", "integer literal is too large"),
            ("1.5f32", "unknown float suffix"),
        ];

        for (literal, reason) in cases {
            let (_, errors) = parse(&format!("proc main() {{ {}; }}", literal));
            assert_eq!(
                errors.first().map(|e| e.kind.clone()),
                Some(DiagnosticKind::InvalidLiteral {
                    text: literal.to_string(),
                    reason,
                }),
                "literal: {}",
                literal
            );
        }
    }

    fn nesting_errors(source: &str) -> Vec<Diagnostic> {
        let (_, errors) = parse(source);
        errors
            .into_iter()
            .filter(|err| err.kind == DiagnosticKind::NestingTooDeep { limit: MAX_NESTING })
            .collect()
    }

    #[test]
    fn deep_nesting_is_rejected() {
        let cases = [
            format!("proc main() {{ let x = {}1; }}", "-".repeat(100_000)),
            format!("proc main() {{ let b = {}true; }}", "!".repeat(100_000)),
            format!(
                "proc main() {{ let x = {}1{}; }}",
                "(".repeat(100_000),
                ")".repeat(100_000)
            ),
            format!("proc main() {{ f({}1{}); }}", "f(".repeat(50_000), ")".repeat(50_000)),
            format!("proc main() {{ {}{} }}", "{".repeat(100_000), "}".repeat(100_000)),
            format!("proc main() {{ let x = 1{}; }}", " + 1".repeat(100_000)),
        ];

        for source in &cases {
            assert_eq!(nesting_errors(source).len(), 1, "input starts {:?}", &source[..40]);
        }
    }

    #[test]
    fn nesting_error_recovers_at_next_statement() {
        let source = format!(
            "proc main() {{ let x = {}1; let y = 2; }} proc other() {{ }}",
            "-".repeat(MAX_NESTING * 2)
        );
        let (program, errors) = parse(&source);

        assert_eq!(errors.len(), 1, "{:?}", errors);
        assert_eq!(errors[0].code(), "E0203");
        assert_eq!(program.procs.len(), 2);
        assert!(program.procs[0]
            .body
            .stmts
            .iter()
            .any(|stmt| matches!(&stmt.kind, StmtKind::Let { name, .. } if name.name == "y")));
    }

    #[test]
    fn moderate_nesting_is_accepted() {
        let sources = [
            format!("proc main() {{ let x = {}1; }}", "-".repeat(100)),
            format!("proc main() {{ let x = {}1{}; }}", "(".repeat(60), ")".repeat(60)),
            format!("proc main() {{ let x = 1{}; }}", " + 1".repeat(100)),
            format!("proc main() {{ {}{} }}", "{".repeat(100), "}".repeat(100)),
        ];

        for source in &sources {
            parse_ok(source);
        }
    }

    #[test]
    fn parsing_is_deterministic() {
        let source = "proc f(a: i32, b: i32): i32 { return a * b + 1; } proc main() { f(1, 2); }";
        assert_eq!(parse_ok(source), parse_ok(source));
    }
}
