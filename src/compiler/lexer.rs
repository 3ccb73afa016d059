// Lexer - CoreLX token stream
//
// Produces an ordered token sequence with synthetic INDENT/DEDENT tokens
// from leading-whitespace changes at the start of logical lines. Blank
// and comment lines (leading `#`) are skipped without affecting the
// indentation state.
//
// Asset payload handling: after a line opening with the `asset` keyword,
// every deeper-indented line is captured verbatim as a `PayloadLine`
// token instead of being tokenized; the parser interprets the first such
// line as an encoding tag when it names one.
//
// The lexer stops at its first error; the diagnostic carries the literal
// message plus line/column.

use crate::compiler::diagnostics::{codes, Diagnostic, SourcePos, SourceRange, Stage};
use std::fmt;

/// Token kinds
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    // Literals and names
    Ident(String),
    Int(i64),
    Str(String),
    /// Raw asset payload line, captured without tokenization
    PayloadLine(String),

    // Keywords
    KwAsset,
    KwType,
    KwStruct,
    KwFunction,
    KwIf,
    KwElseif,
    KwElse,
    KwWhile,
    KwFor,
    KwReturn,
    KwTrue,
    KwFalse,

    // Punctuation and operators
    Declare, // :=
    Assign,  // =
    Arrow,   // ->
    Colon,
    Comma,
    Dot,
    LParen,
    RParen,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Amp,
    Pipe,
    Caret,
    Tilde,
    Bang,
    Shl, // <<
    Shr, // >>
    EqEq,
    NotEq,
    Lt,
    Le,
    Gt,
    Ge,
    AndAnd,
    OrOr,

    // Structure
    Newline,
    Indent,
    Dedent,
    Eof,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::Ident(name) => write!(f, "identifier '{}'", name),
            TokenKind::Int(value) => write!(f, "number {}", value),
            TokenKind::Str(_) => write!(f, "string literal"),
            TokenKind::PayloadLine(_) => write!(f, "asset payload line"),
            TokenKind::KwAsset => write!(f, "'asset'"),
            TokenKind::KwType => write!(f, "'type'"),
            TokenKind::KwStruct => write!(f, "'struct'"),
            TokenKind::KwFunction => write!(f, "'function'"),
            TokenKind::KwIf => write!(f, "'if'"),
            TokenKind::KwElseif => write!(f, "'elseif'"),
            TokenKind::KwElse => write!(f, "'else'"),
            TokenKind::KwWhile => write!(f, "'while'"),
            TokenKind::KwFor => write!(f, "'for'"),
            TokenKind::KwReturn => write!(f, "'return'"),
            TokenKind::KwTrue => write!(f, "'true'"),
            TokenKind::KwFalse => write!(f, "'false'"),
            TokenKind::Declare => write!(f, "':='"),
            TokenKind::Assign => write!(f, "'='"),
            TokenKind::Arrow => write!(f, "'->'"),
            TokenKind::Colon => write!(f, "':'"),
            TokenKind::Comma => write!(f, "','"),
            TokenKind::Dot => write!(f, "'.'"),
            TokenKind::LParen => write!(f, "'('"),
            TokenKind::RParen => write!(f, "')'"),
            TokenKind::Plus => write!(f, "'+'"),
            TokenKind::Minus => write!(f, "'-'"),
            TokenKind::Star => write!(f, "'*'"),
            TokenKind::Slash => write!(f, "'/'"),
            TokenKind::Percent => write!(f, "'%'"),
            TokenKind::Amp => write!(f, "'&'"),
            TokenKind::Pipe => write!(f, "'|'"),
            TokenKind::Caret => write!(f, "'^'"),
            TokenKind::Tilde => write!(f, "'~'"),
            TokenKind::Bang => write!(f, "'!'"),
            TokenKind::Shl => write!(f, "'<<'"),
            TokenKind::Shr => write!(f, "'>>'"),
            TokenKind::EqEq => write!(f, "'=='"),
            TokenKind::NotEq => write!(f, "'!='"),
            TokenKind::Lt => write!(f, "'<'"),
            TokenKind::Le => write!(f, "'<='"),
            TokenKind::Gt => write!(f, "'>'"),
            TokenKind::Ge => write!(f, "'>='"),
            TokenKind::AndAnd => write!(f, "'&&'"),
            TokenKind::OrOr => write!(f, "'||'"),
            TokenKind::Newline => write!(f, "end of line"),
            TokenKind::Indent => write!(f, "indent"),
            TokenKind::Dedent => write!(f, "dedent"),
            TokenKind::Eof => write!(f, "end of file"),
        }
    }
}

/// A token with its source position
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub pos: SourcePos,
}

fn keyword(word: &str) -> Option<TokenKind> {
    match word {
        "asset" => Some(TokenKind::KwAsset),
        "type" => Some(TokenKind::KwType),
        "struct" => Some(TokenKind::KwStruct),
        "function" => Some(TokenKind::KwFunction),
        "if" => Some(TokenKind::KwIf),
        "elseif" => Some(TokenKind::KwElseif),
        "else" => Some(TokenKind::KwElse),
        "while" => Some(TokenKind::KwWhile),
        "for" => Some(TokenKind::KwFor),
        "return" => Some(TokenKind::KwReturn),
        "true" => Some(TokenKind::KwTrue),
        "false" => Some(TokenKind::KwFalse),
        _ => None,
    }
}

/// Lex a source file into tokens
///
/// On error, appends one `E_LEX` diagnostic and returns the tokens
/// produced so far (without a trailing Eof).
pub fn lex(source: &str, file: &str, diagnostics: &mut Vec<Diagnostic>) -> Vec<Token> {
    let mut tokens: Vec<Token> = Vec::new();
    let mut indent_stack: Vec<usize> = vec![0];
    // Indentation level of the most recent asset header, while its
    // payload block is still open
    let mut payload_indent: Option<usize> = None;
    let mut last_line = 0u32;

    for (index, raw_line) in source.lines().enumerate() {
        let line_no = index as u32 + 1;
        last_line = line_no;

        let content = raw_line.trim_end();
        let body = content.trim_start();
        if body.is_empty() || body.starts_with('#') {
            continue;
        }

        let indent = indent_width(content);

        if let Some(asset_indent) = payload_indent {
            if indent > asset_indent {
                tokens.push(Token {
                    kind: TokenKind::PayloadLine(body.to_string()),
                    pos: SourcePos::new(line_no, indent as u32 + 1),
                });
                continue;
            }
            payload_indent = None;
        }

        // Indentation bookkeeping
        let current = *indent_stack.last().expect("indent stack is never empty");
        let line_pos = SourcePos::new(line_no, 1);
        if indent > current {
            indent_stack.push(indent);
            tokens.push(Token {
                kind: TokenKind::Indent,
                pos: line_pos,
            });
        } else if indent < current {
            while indent < *indent_stack.last().expect("indent stack is never empty") {
                indent_stack.pop();
                tokens.push(Token {
                    kind: TokenKind::Dedent,
                    pos: line_pos,
                });
            }
            if indent != *indent_stack.last().expect("indent stack is never empty") {
                diagnostics.push(Diagnostic::error(
                    Stage::Lexer,
                    "LexError",
                    codes::E_LEX,
                    "inconsistent dedent: indentation matches no enclosing block",
                    file,
                    SourceRange::at(line_pos),
                ));
                return tokens;
            }
        }

        // Tokenize the line body
        let opens_asset = body.starts_with("asset")
            && body[5..].chars().next().map_or(true, |c| !ident_char(c));
        if let Err(diagnostic) = tokenize_line(body, line_no, indent, file, &mut tokens) {
            diagnostics.push(*diagnostic);
            return tokens;
        }
        tokens.push(Token {
            kind: TokenKind::Newline,
            pos: SourcePos::new(line_no, content.len() as u32 + 1),
        });

        if opens_asset {
            payload_indent = Some(indent);
        }
    }

    // Close any open blocks
    let eof_pos = SourcePos::new(last_line + 1, 1);
    while *indent_stack.last().expect("indent stack is never empty") > 0 {
        indent_stack.pop();
        tokens.push(Token {
            kind: TokenKind::Dedent,
            pos: eof_pos,
        });
    }
    tokens.push(Token {
        kind: TokenKind::Eof,
        pos: eof_pos,
    });
    tokens
}

/// Leading whitespace width; tabs count as four columns
fn indent_width(line: &str) -> usize {
    let mut width = 0;
    for c in line.chars() {
        match c {
            ' ' => width += 1,
            '\t' => width += 4,
            _ => break,
        }
    }
    width
}

fn ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

fn tokenize_line(
    body: &str,
    line_no: u32,
    indent: usize,
    file: &str,
    tokens: &mut Vec<Token>,
) -> Result<(), Box<Diagnostic>> {
    let chars: Vec<char> = body.chars().collect();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        let column = (indent + i + 1) as u32;
        let pos = SourcePos::new(line_no, column);

        if c == ' ' || c == '\t' {
            i += 1;
            continue;
        }
        if c == '#' {
            break; // trailing comment
        }

        // Identifiers and keywords
        if c.is_ascii_alphabetic() || c == '_' {
            let start = i;
            while i < chars.len() && ident_char(chars[i]) {
                i += 1;
            }
            let word: String = chars[start..i].iter().collect();
            let kind = keyword(&word).unwrap_or(TokenKind::Ident(word));
            tokens.push(Token { kind, pos });
            continue;
        }

        // Integer literals (decimal or 0x hex)
        if c.is_ascii_digit() {
            let start = i;
            let hex = c == '0' && i + 1 < chars.len() && (chars[i + 1] == 'x' || chars[i + 1] == 'X');
            if hex {
                i += 2;
                while i < chars.len() && chars[i].is_ascii_hexdigit() {
                    i += 1;
                }
                let digits: String = chars[start + 2..i].iter().collect();
                if digits.is_empty() {
                    return Err(Box::new(Diagnostic::error(
                        Stage::Lexer,
                        "LexError",
                        codes::E_LEX,
                        "hex literal has no digits",
                        file,
                        SourceRange::at(pos),
                    )));
                }
                let value = i64::from_str_radix(&digits, 16).map_err(|_| {
                    Box::new(Diagnostic::error(
                        Stage::Lexer,
                        "LexError",
                        codes::E_LEX,
                        "hex literal out of range",
                        file,
                        SourceRange::at(pos),
                    ))
                })?;
                tokens.push(Token {
                    kind: TokenKind::Int(value),
                    pos,
                });
            } else {
                while i < chars.len() && chars[i].is_ascii_digit() {
                    i += 1;
                }
                let digits: String = chars[start..i].iter().collect();
                let value = digits.parse::<i64>().map_err(|_| {
                    Box::new(Diagnostic::error(
                        Stage::Lexer,
                        "LexError",
                        codes::E_LEX,
                        "number literal out of range",
                        file,
                        SourceRange::at(pos),
                    ))
                })?;
                tokens.push(Token {
                    kind: TokenKind::Int(value),
                    pos,
                });
            }
            continue;
        }

        // String literals (double-quoted, no escapes)
        if c == '"' {
            let start = i + 1;
            let mut end = start;
            while end < chars.len() && chars[end] != '"' {
                end += 1;
            }
            if end == chars.len() {
                return Err(Box::new(Diagnostic::error(
                    Stage::Lexer,
                    "LexError",
                    codes::E_LEX,
                    "unterminated string literal",
                    file,
                    SourceRange::at(pos),
                )));
            }
            let value: String = chars[start..end].iter().collect();
            tokens.push(Token {
                kind: TokenKind::Str(value),
                pos,
            });
            i = end + 1;
            continue;
        }

        // Operators and punctuation, longest first
        let two: String = chars[i..chars.len().min(i + 2)].iter().collect();
        let kind = match two.as_str() {
            ":=" => Some((TokenKind::Declare, 2)),
            "->" => Some((TokenKind::Arrow, 2)),
            "<<" => Some((TokenKind::Shl, 2)),
            ">>" => Some((TokenKind::Shr, 2)),
            "==" => Some((TokenKind::EqEq, 2)),
            "!=" => Some((TokenKind::NotEq, 2)),
            "<=" => Some((TokenKind::Le, 2)),
            ">=" => Some((TokenKind::Ge, 2)),
            "&&" => Some((TokenKind::AndAnd, 2)),
            "||" => Some((TokenKind::OrOr, 2)),
            _ => None,
        };
        let kind = kind.or(match c {
            ':' => Some((TokenKind::Colon, 1)),
            '=' => Some((TokenKind::Assign, 1)),
            ',' => Some((TokenKind::Comma, 1)),
            '.' => Some((TokenKind::Dot, 1)),
            '(' => Some((TokenKind::LParen, 1)),
            ')' => Some((TokenKind::RParen, 1)),
            '+' => Some((TokenKind::Plus, 1)),
            '-' => Some((TokenKind::Minus, 1)),
            '*' => Some((TokenKind::Star, 1)),
            '/' => Some((TokenKind::Slash, 1)),
            '%' => Some((TokenKind::Percent, 1)),
            '&' => Some((TokenKind::Amp, 1)),
            '|' => Some((TokenKind::Pipe, 1)),
            '^' => Some((TokenKind::Caret, 1)),
            '~' => Some((TokenKind::Tilde, 1)),
            '!' => Some((TokenKind::Bang, 1)),
            '<' => Some((TokenKind::Lt, 1)),
            '>' => Some((TokenKind::Gt, 1)),
            _ => None,
        });

        match kind {
            Some((kind, width)) => {
                tokens.push(Token { kind, pos });
                i += width;
            }
            None => {
                return Err(Box::new(Diagnostic::error(
                    Stage::Lexer,
                    "LexError",
                    codes::E_LEX,
                    format!("unexpected character '{}'", c),
                    file,
                    SourceRange::at(pos),
                )));
            }
        }
    }
    Ok(())
}
