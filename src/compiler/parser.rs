// Parser - recursive descent over the CoreLX token stream
//
// Builds the AST with standard precedence climbing: assignment exists
// only at statement level, then logical OR, logical AND, equality,
// comparison, bitwise OR/XOR/AND, shift, additive, multiplicative,
// unary, call/member, primary.
//
// The parser stops at its first error: the diagnostic is recorded and
// no Program is produced.

use crate::compiler::ast::*;
use crate::compiler::diagnostics::{codes, Diagnostic, SourcePos, SourceRange, Stage};
use crate::compiler::lexer::{Token, TokenKind};

type PResult<T> = Result<T, Box<Diagnostic>>;

/// Parse a token stream into a Program
///
/// On failure, pushes a single `E_SYNTAX` diagnostic and returns None.
pub fn parse(tokens: &[Token], file: &str, diagnostics: &mut Vec<Diagnostic>) -> Option<Program> {
    let mut parser = Parser {
        tokens,
        index: 0,
        file,
    };
    match parser.parse_program() {
        Ok(program) => Some(program),
        Err(diagnostic) => {
            diagnostics.push(*diagnostic);
            None
        }
    }
}

struct Parser<'a> {
    tokens: &'a [Token],
    index: usize,
    file: &'a str,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> &TokenKind {
        self.peek_at(0)
    }

    fn peek_at(&self, offset: usize) -> &TokenKind {
        self.tokens
            .get(self.index + offset)
            .map(|t| &t.kind)
            .unwrap_or(&TokenKind::Eof)
    }

    fn pos(&self) -> SourcePos {
        self.tokens
            .get(self.index)
            .or_else(|| self.tokens.last())
            .map(|t| t.pos)
            .unwrap_or_default()
    }

    fn advance(&mut self) -> TokenKind {
        let kind = self.peek().clone();
        if self.index < self.tokens.len() {
            self.index += 1;
        }
        kind
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.peek() == kind {
            self.index += 1;
            true
        } else {
            false
        }
    }

    fn error(&self, message: impl Into<String>) -> Box<Diagnostic> {
        Box::new(Diagnostic::error(
            Stage::Parser,
            "SyntaxError",
            codes::E_SYNTAX,
            message,
            self.file,
            SourceRange::at(self.pos()),
        ))
    }

    fn expect(&mut self, kind: TokenKind, context: &str) -> PResult<()> {
        if self.eat(&kind) {
            Ok(())
        } else {
            Err(self.error(format!(
                "expected {} {}, found {}",
                kind,
                context,
                self.peek()
            )))
        }
    }

    fn expect_ident(&mut self, context: &str) -> PResult<(String, SourcePos)> {
        let pos = self.pos();
        match self.peek() {
            TokenKind::Ident(name) => {
                let name = name.clone();
                self.index += 1;
                Ok((name, pos))
            }
            other => Err(self.error(format!("expected identifier {}, found {}", context, other))),
        }
    }

    // ========================================
    // Declarations
    // ========================================

    fn parse_program(&mut self) -> PResult<Program> {
        let mut program = Program::default();
        loop {
            match self.peek() {
                TokenKind::Newline => {
                    self.index += 1;
                }
                TokenKind::KwAsset => program.assets.push(self.parse_asset()?),
                TokenKind::KwType => program.types.push(self.parse_type()?),
                TokenKind::KwFunction => program.functions.push(self.parse_function()?),
                TokenKind::Eof => break,
                other => {
                    return Err(self.error(format!(
                        "expected 'asset', 'type', or 'function' at top level, found {}",
                        other
                    )));
                }
            }
        }
        Ok(program)
    }

    fn parse_asset(&mut self) -> PResult<AssetDecl> {
        let pos = self.pos();
        self.expect(TokenKind::KwAsset, "to open an asset declaration")?;
        let (name, _) = self.expect_ident("after 'asset'")?;
        self.expect(TokenKind::Colon, "after the asset name")?;
        let (kind, _) = self.expect_ident("naming the asset kind")?;

        // Encoding may follow the kind on the same line
        let mut encoding = None;
        if let TokenKind::Ident(word) = self.peek() {
            encoding = Some(word.clone());
            self.index += 1;
        }
        self.expect(TokenKind::Newline, "after the asset header")?;

        // Collect captured payload lines
        let mut payload = Vec::new();
        while let TokenKind::PayloadLine(line) = self.peek() {
            payload.push(line.clone());
            self.index += 1;
        }

        // Or the encoding may be the first indented line by itself
        if encoding.is_none() {
            if let Some(first) = payload.first() {
                if matches!(first.as_str(), "hex" | "b64" | "text") {
                    encoding = Some(payload.remove(0));
                }
            }
        }

        Ok(AssetDecl {
            name,
            kind,
            encoding,
            payload,
            pos,
        })
    }

    fn parse_type(&mut self) -> PResult<TypeDecl> {
        let pos = self.pos();
        self.expect(TokenKind::KwType, "to open a type declaration")?;
        let (name, _) = self.expect_ident("after 'type'")?;
        self.expect(TokenKind::Colon, "after the type name")?;
        self.expect(TokenKind::KwStruct, "after ':'")?;
        self.expect(TokenKind::Newline, "after 'struct'")?;
        self.expect(TokenKind::Indent, "to open the field block")?;

        let mut fields = Vec::new();
        while !matches!(self.peek(), TokenKind::Dedent | TokenKind::Eof) {
            let (field_name, field_pos) = self.expect_ident("naming a field")?;
            self.expect(TokenKind::Colon, "after the field name")?;
            let (type_name, _) = self.expect_ident("naming the field type")?;
            self.expect(TokenKind::Newline, "after the field type")?;
            fields.push(FieldDecl {
                name: field_name,
                type_name,
                pos: field_pos,
            });
        }
        self.expect(TokenKind::Dedent, "to close the field block")?;

        Ok(TypeDecl { name, fields, pos })
    }

    fn parse_function(&mut self) -> PResult<FunctionDecl> {
        let pos = self.pos();
        self.expect(TokenKind::KwFunction, "to open a function declaration")?;
        let (name, _) = self.expect_ident("after 'function'")?;
        self.expect(TokenKind::LParen, "after the function name")?;

        let mut params = Vec::new();
        if !matches!(self.peek(), TokenKind::RParen) {
            loop {
                let (param_name, param_pos) = self.expect_ident("naming a parameter")?;
                let mut type_name = None;
                if self.eat(&TokenKind::Colon) {
                    let (t, _) = self.expect_ident("naming the parameter type")?;
                    type_name = Some(t);
                }
                params.push(Param {
                    name: param_name,
                    type_name,
                    pos: param_pos,
                });
                if !self.eat(&TokenKind::Comma) {
                    break;
                }
            }
        }
        self.expect(TokenKind::RParen, "to close the parameter list")?;

        let mut return_type = None;
        if self.eat(&TokenKind::Arrow) {
            let (t, _) = self.expect_ident("naming the return type")?;
            return_type = Some(t);
        }
        self.expect(TokenKind::Newline, "after the function header")?;

        let body = self.parse_block()?;
        Ok(FunctionDecl {
            name,
            params,
            return_type,
            body,
            pos,
        })
    }

    // ========================================
    // Statements
    // ========================================

    fn parse_block(&mut self) -> PResult<Vec<Stmt>> {
        self.expect(TokenKind::Indent, "to open a block")?;
        let mut stmts = Vec::new();
        while !matches!(self.peek(), TokenKind::Dedent | TokenKind::Eof) {
            if self.eat(&TokenKind::Newline) {
                continue;
            }
            stmts.push(self.parse_stmt()?);
        }
        self.expect(TokenKind::Dedent, "to close the block")?;
        Ok(stmts)
    }

    fn parse_stmt(&mut self) -> PResult<Stmt> {
        let pos = self.pos();
        match self.peek() {
            TokenKind::KwIf => self.parse_if(),
            TokenKind::KwWhile => {
                self.index += 1;
                let cond = self.parse_expr()?;
                self.expect(TokenKind::Newline, "after the loop condition")?;
                let body = self.parse_block()?;
                Ok(Stmt::While { cond, body, pos })
            }
            TokenKind::KwFor => {
                self.index += 1;
                let init = Box::new(self.parse_simple_stmt()?);
                self.expect(TokenKind::Comma, "between the loop clauses")?;
                let cond = self.parse_expr()?;
                self.expect(TokenKind::Comma, "between the loop clauses")?;
                let post = Box::new(self.parse_simple_stmt()?);
                self.expect(TokenKind::Newline, "after the loop header")?;
                let body = self.parse_block()?;
                Ok(Stmt::For {
                    init,
                    cond,
                    post,
                    body,
                    pos,
                })
            }
            TokenKind::KwReturn => {
                self.index += 1;
                let value = if matches!(self.peek(), TokenKind::Newline) {
                    None
                } else {
                    Some(self.parse_expr()?)
                };
                self.expect(TokenKind::Newline, "after 'return'")?;
                Ok(Stmt::Return { value, pos })
            }
            _ => {
                let stmt = self.parse_simple_stmt()?;
                self.expect(TokenKind::Newline, "after the statement")?;
                Ok(stmt)
            }
        }
    }

    fn parse_if(&mut self) -> PResult<Stmt> {
        let pos = self.pos();
        self.expect(TokenKind::KwIf, "to open an if statement")?;
        let mut arms = Vec::new();

        let cond = self.parse_expr()?;
        self.expect(TokenKind::Newline, "after the condition")?;
        arms.push((cond, self.parse_block()?));

        let mut else_body = None;
        loop {
            match self.peek() {
                TokenKind::KwElseif => {
                    self.index += 1;
                    let cond = self.parse_expr()?;
                    self.expect(TokenKind::Newline, "after the condition")?;
                    arms.push((cond, self.parse_block()?));
                }
                TokenKind::KwElse => {
                    self.index += 1;
                    self.expect(TokenKind::Newline, "after 'else'")?;
                    else_body = Some(self.parse_block()?);
                    break;
                }
                _ => break,
            }
        }

        Ok(Stmt::If {
            arms,
            else_body,
            pos,
        })
    }

    /// A declaration, assignment, or expression without its newline
    ///
    /// Used directly for `for` init/post clauses.
    fn parse_simple_stmt(&mut self) -> PResult<Stmt> {
        let pos = self.pos();

        // Typed declaration: `name: type [:= value]`
        if matches!(self.peek(), TokenKind::Ident(_))
            && matches!(self.peek_at(1), TokenKind::Colon)
            && matches!(self.peek_at(2), TokenKind::Ident(_))
        {
            let (name, _) = self.expect_ident("naming the variable")?;
            self.index += 1; // colon
            let (type_name, _) = self.expect_ident("naming the type")?;
            let value = if self.eat(&TokenKind::Declare) {
                Some(self.parse_expr()?)
            } else {
                None
            };
            return Ok(Stmt::VarDecl {
                name,
                type_name: Some(type_name),
                value,
                pos,
            });
        }

        let expr = self.parse_expr()?;

        if self.eat(&TokenKind::Declare) {
            let name = match expr {
                Expr::Ident { name, .. } => name,
                _ => return Err(self.error("':=' requires a plain identifier on the left")),
            };
            let value = self.parse_expr()?;
            return Ok(Stmt::VarDecl {
                name,
                type_name: None,
                value: Some(value),
                pos,
            });
        }

        if self.eat(&TokenKind::Assign) {
            match expr {
                Expr::Ident { .. } | Expr::Member { .. } | Expr::Index { .. } => {}
                _ => return Err(self.error("invalid assignment target")),
            }
            let value = self.parse_expr()?;
            return Ok(Stmt::Assign {
                target: expr,
                value,
                pos,
            });
        }

        Ok(Stmt::Expr { expr, pos })
    }

    // ========================================
    // Expressions (precedence climbing)
    // ========================================

    fn parse_expr(&mut self) -> PResult<Expr> {
        self.parse_or()
    }

    fn parse_or(&mut self) -> PResult<Expr> {
        let mut lhs = self.parse_and()?;
        while matches!(self.peek(), TokenKind::OrOr) {
            let pos = self.pos();
            self.index += 1;
            let rhs = self.parse_and()?;
            lhs = binary(BinaryOp::Or, lhs, rhs, pos);
        }
        Ok(lhs)
    }

    fn parse_and(&mut self) -> PResult<Expr> {
        let mut lhs = self.parse_equality()?;
        while matches!(self.peek(), TokenKind::AndAnd) {
            let pos = self.pos();
            self.index += 1;
            let rhs = self.parse_equality()?;
            lhs = binary(BinaryOp::And, lhs, rhs, pos);
        }
        Ok(lhs)
    }

    fn parse_equality(&mut self) -> PResult<Expr> {
        let mut lhs = self.parse_comparison()?;
        loop {
            let op = match self.peek() {
                TokenKind::EqEq => BinaryOp::Eq,
                TokenKind::NotEq => BinaryOp::Ne,
                _ => break,
            };
            let pos = self.pos();
            self.index += 1;
            let rhs = self.parse_comparison()?;
            lhs = binary(op, lhs, rhs, pos);
        }
        Ok(lhs)
    }

    fn parse_comparison(&mut self) -> PResult<Expr> {
        let mut lhs = self.parse_bitor()?;
        loop {
            let op = match self.peek() {
                TokenKind::Lt => BinaryOp::Lt,
                TokenKind::Le => BinaryOp::Le,
                TokenKind::Gt => BinaryOp::Gt,
                TokenKind::Ge => BinaryOp::Ge,
                _ => break,
            };
            let pos = self.pos();
            self.index += 1;
            let rhs = self.parse_bitor()?;
            lhs = binary(op, lhs, rhs, pos);
        }
        Ok(lhs)
    }

    fn parse_bitor(&mut self) -> PResult<Expr> {
        let mut lhs = self.parse_bitxor()?;
        while matches!(self.peek(), TokenKind::Pipe) {
            let pos = self.pos();
            self.index += 1;
            let rhs = self.parse_bitxor()?;
            lhs = binary(BinaryOp::BitOr, lhs, rhs, pos);
        }
        Ok(lhs)
    }

    fn parse_bitxor(&mut self) -> PResult<Expr> {
        let mut lhs = self.parse_bitand()?;
        while matches!(self.peek(), TokenKind::Caret) {
            let pos = self.pos();
            self.index += 1;
            let rhs = self.parse_bitand()?;
            lhs = binary(BinaryOp::BitXor, lhs, rhs, pos);
        }
        Ok(lhs)
    }

    fn parse_bitand(&mut self) -> PResult<Expr> {
        let mut lhs = self.parse_shift()?;
        while matches!(self.peek(), TokenKind::Amp) {
            let pos = self.pos();
            self.index += 1;
            let rhs = self.parse_shift()?;
            lhs = binary(BinaryOp::BitAnd, lhs, rhs, pos);
        }
        Ok(lhs)
    }

    fn parse_shift(&mut self) -> PResult<Expr> {
        let mut lhs = self.parse_additive()?;
        loop {
            let op = match self.peek() {
                TokenKind::Shl => BinaryOp::Shl,
                TokenKind::Shr => BinaryOp::Shr,
                _ => break,
            };
            let pos = self.pos();
            self.index += 1;
            let rhs = self.parse_additive()?;
            lhs = binary(op, lhs, rhs, pos);
        }
        Ok(lhs)
    }

    fn parse_additive(&mut self) -> PResult<Expr> {
        let mut lhs = self.parse_multiplicative()?;
        loop {
            let op = match self.peek() {
                TokenKind::Plus => BinaryOp::Add,
                TokenKind::Minus => BinaryOp::Sub,
                _ => break,
            };
            let pos = self.pos();
            self.index += 1;
            let rhs = self.parse_multiplicative()?;
            lhs = binary(op, lhs, rhs, pos);
        }
        Ok(lhs)
    }

    fn parse_multiplicative(&mut self) -> PResult<Expr> {
        let mut lhs = self.parse_unary()?;
        loop {
            let op = match self.peek() {
                TokenKind::Star => BinaryOp::Mul,
                TokenKind::Slash => BinaryOp::Div,
                TokenKind::Percent => BinaryOp::Mod,
                _ => break,
            };
            let pos = self.pos();
            self.index += 1;
            let rhs = self.parse_unary()?;
            lhs = binary(op, lhs, rhs, pos);
        }
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> PResult<Expr> {
        let pos = self.pos();
        let op = match self.peek() {
            TokenKind::Minus => Some(UnaryOp::Neg),
            TokenKind::Bang => Some(UnaryOp::Not),
            TokenKind::Tilde => Some(UnaryOp::BitNot),
            TokenKind::Amp => Some(UnaryOp::AddrOf),
            _ => None,
        };
        if let Some(op) = op {
            self.index += 1;
            let operand = Box::new(self.parse_unary()?);
            return Ok(Expr::Unary { op, operand, pos });
        }
        self.parse_postfix()
    }

    fn parse_postfix(&mut self) -> PResult<Expr> {
        let mut expr = self.parse_primary()?;
        loop {
            match self.peek() {
                TokenKind::LParen => {
                    let pos = self.pos();
                    self.index += 1;
                    let mut args = Vec::new();
                    if !matches!(self.peek(), TokenKind::RParen) {
                        loop {
                            args.push(self.parse_expr()?);
                            if !self.eat(&TokenKind::Comma) {
                                break;
                            }
                        }
                    }
                    self.expect(TokenKind::RParen, "to close the argument list")?;
                    expr = Expr::Call {
                        callee: Box::new(expr),
                        args,
                        pos,
                    };
                }
                TokenKind::Dot => {
                    let pos = self.pos();
                    self.index += 1;
                    let (field, _) = self.expect_ident("after '.'")?;
                    expr = Expr::Member {
                        object: Box::new(expr),
                        field,
                        pos,
                    };
                }
                _ => break,
            }
        }
        Ok(expr)
    }

    fn parse_primary(&mut self) -> PResult<Expr> {
        let pos = self.pos();
        match self.advance() {
            TokenKind::Int(value) => Ok(Expr::Number { value, pos }),
            TokenKind::KwTrue => Ok(Expr::Bool { value: true, pos }),
            TokenKind::KwFalse => Ok(Expr::Bool { value: false, pos }),
            TokenKind::Str(value) => Ok(Expr::Str { value, pos }),
            TokenKind::Ident(name) => Ok(Expr::Ident { name, pos }),
            TokenKind::LParen => {
                let expr = self.parse_expr()?;
                self.expect(TokenKind::RParen, "to close the grouping")?;
                Ok(expr)
            }
            other => {
                self.index -= 1;
                Err(self.error(format!("expected an expression, found {}", other)))
            }
        }
    }
}

fn binary(op: BinaryOp, lhs: Expr, rhs: Expr, pos: SourcePos) -> Expr {
    Expr::Binary {
        op,
        lhs: Box::new(lhs),
        rhs: Box::new(rhs),
        pos,
    }
}
