//! # Lexer
//!
//! Maximal-munch tokenizer for the C subset. Whitespace, `//`/`/* */`
//! comments, and preprocessor-style `#...` lines are consumed and produce
//! no tokens. The first unrecognized byte aborts lexing with a
//! [`CompileError`] carrying the 1-based line and column of the offending
//! character — there is no error recovery.

pub mod cursor;
pub mod token;


use crate::error::{CompileError, CompileResult, ErrorKind, Span};
use cursor::Cursor;
use token::{Token, TokenKind};

const KEYWORDS: &[(&str, TokenKind)] = &[
    ("int", TokenKind::KwInt),
    ("void", TokenKind::KwVoid),
    ("return", TokenKind::KwReturn),
    ("if", TokenKind::KwIf),
    ("else", TokenKind::KwElse),
    ("goto", TokenKind::KwGoto),
    ("do", TokenKind::KwDo),
    ("while", TokenKind::KwWhile),
    ("for", TokenKind::KwFor),
    ("break", TokenKind::KwBreak),
    ("continue", TokenKind::KwContinue),
    ("switch", TokenKind::KwSwitch),
    ("case", TokenKind::KwCase),
    ("default", TokenKind::KwDefault),
];

#[must_use]
pub fn tokenize(source: &str) -> CompileResult<Vec<Token>> {
    let span = tracing::debug_span!("lex");
    let _enter = span.enter();

    let mut cursor = Cursor::new(source);
    let mut tokens = Vec::new();

    while let Some(token) = lex_token(&mut cursor)? {
        tokens.push(token);
    }

    let (line, col) = cursor.current_pos();
    tokens.push(Token {
        kind: TokenKind::Eof,
        lexeme: String::new(),
        span: Span::new(line, col),
    });

    tracing::debug!(tokens = tokens.len(), "lexed");
    Ok(tokens)
}

fn lex_token(cursor: &mut Cursor) -> CompileResult<Option<Token>> {
    skip_trivia(cursor)?;

    if cursor.is_at_end() {
        return Ok(None);
    }

    let (line, col) = cursor.current_pos();
    let ch = cursor.peek().unwrap();

    let (kind, lexeme) = if ch.is_ascii_digit() {
        lex_constant(cursor)?
    } else if ch.is_ascii_alphabetic() || ch == '_' {
        lex_word(cursor)
    } else {
        lex_operator(cursor, line, col)?
    };

    Ok(Some(Token {
        kind,
        lexeme,
        span: Span::new(line, col),
    }))
}

/// Skip whitespace, `//` and `/* */` comments, and `#...` preprocessor lines.
fn skip_trivia(cursor: &mut Cursor) -> CompileResult<()> {
    loop {
        match cursor.peek() {
            Some(c) if c.is_whitespace() => {
                cursor.advance();
            }
            Some('#') => {
                while !matches!(cursor.peek(), None | Some('\n')) {
                    cursor.advance();
                }
            }
            Some('/') if cursor.peek_at(1) == Some('/') => {
                while !matches!(cursor.peek(), None | Some('\n')) {
                    cursor.advance();
                }
            }
            Some('/') if cursor.peek_at(1) == Some('*') => {
                let (line, col) = cursor.current_pos();
                cursor.advance();
                cursor.advance();
                loop {
                    match (cursor.peek(), cursor.peek_at(1)) {
                        (Some('*'), Some('/')) => {
                            cursor.advance();
                            cursor.advance();
                            break;
                        }
                        (None, _) => {
                            return Err(CompileError::new(
                                ErrorKind::Lex,
                                "unterminated block comment",
                                Span::new(line, col),
                            ))
                        }
                        _ => {
                            cursor.advance();
                        }
                    }
                }
            }
            _ => return Ok(()),
        }
    }
}

fn lex_constant(cursor: &mut Cursor) -> CompileResult<(TokenKind, String)> {
    let (line, col) = cursor.current_pos();
    let mut digits = String::new();
    while matches!(cursor.peek(), Some(c) if c.is_ascii_digit()) {
        digits.push(cursor.advance().unwrap());
    }
    // A constant may not be immediately followed by an identifier character
    // (e.g. `123abc` is not `123` then `abc`).
    if matches!(cursor.peek(), Some(c) if c.is_ascii_alphabetic() || c == '_') {
        return Err(CompileError::new(
            ErrorKind::Lex,
            format!("invalid numeric literal near '{digits}'"),
            Span::new(line, col),
        ));
    }
    Ok((TokenKind::Constant(digits.clone()), digits))
}

fn lex_word(cursor: &mut Cursor) -> (TokenKind, String) {
    let mut word = String::new();
    while matches!(cursor.peek(), Some(c) if c.is_ascii_alphanumeric() || c == '_') {
        word.push(cursor.advance().unwrap());
    }
    let kind = KEYWORDS
        .iter()
        .find(|(kw, _)| *kw == word)
        .map(|(_, kind)| kind.clone())
        .unwrap_or_else(|| TokenKind::Identifier(word.clone()));
    (kind, word)
}

/// Multi-character operators are tried longest-first so `<<=` is never
/// mis-split into `<<` followed by `=`.
fn lex_operator(cursor: &mut Cursor, line: usize, col: usize) -> CompileResult<(TokenKind, String)> {
    let three: Option<String> = (0..3).map(|i| cursor.peek_at(i)).collect();
    if let Some(s) = three.as_deref() {
        if let Some(kind) = match s {
            "<<=" => Some(TokenKind::LessLessEqual),
            ">>=" => Some(TokenKind::GreaterGreaterEqual),
            _ => None,
        } {
            for _ in 0..3 {
                cursor.advance();
            }
            return Ok((kind, s.to_string()));
        }
    }

    let two: Option<String> = (0..2).map(|i| cursor.peek_at(i)).collect();
    if let Some(s) = two.as_deref() {
        if let Some(kind) = match s {
            "++" => Some(TokenKind::PlusPlus),
            "+=" => Some(TokenKind::PlusEqual),
            "--" => Some(TokenKind::MinusMinus),
            "-=" => Some(TokenKind::MinusEqual),
            "*=" => Some(TokenKind::StarEqual),
            "/=" => Some(TokenKind::SlashEqual),
            "%=" => Some(TokenKind::PercentEqual),
            "==" => Some(TokenKind::EqualEqual),
            "!=" => Some(TokenKind::BangEqual),
            "<=" => Some(TokenKind::LessEqual),
            ">=" => Some(TokenKind::GreaterEqual),
            "<<" => Some(TokenKind::LessLess),
            ">>" => Some(TokenKind::GreaterGreater),
            "&&" => Some(TokenKind::AmpAmp),
            "&=" => Some(TokenKind::AmpEqual),
            "||" => Some(TokenKind::PipePipe),
            "|=" => Some(TokenKind::PipeEqual),
            "^=" => Some(TokenKind::CaretEqual),
            _ => None,
        } {
            cursor.advance();
            cursor.advance();
            return Ok((kind, s.to_string()));
        }
    }

    let ch = cursor.advance().unwrap();
    let kind = match ch {
        '(' => TokenKind::OpenParen,
        ')' => TokenKind::CloseParen,
        '{' => TokenKind::OpenBrace,
        '}' => TokenKind::CloseBrace,
        ';' => TokenKind::Semicolon,
        ':' => TokenKind::Colon,
        '?' => TokenKind::Question,
        '+' => TokenKind::Plus,
        '-' => TokenKind::Minus,
        '*' => TokenKind::Star,
        '/' => TokenKind::Slash,
        '%' => TokenKind::Percent,
        '~' => TokenKind::Tilde,
        '!' => TokenKind::Bang,
        '=' => TokenKind::Equal,
        '<' => TokenKind::Less,
        '>' => TokenKind::Greater,
        '&' => TokenKind::Amp,
        '|' => TokenKind::Pipe,
        '^' => TokenKind::Caret,
        other => {
            return Err(CompileError::new(
                ErrorKind::Lex,
                format!("unexpected character '{other}'"),
                Span::new(line, col),
            ))
        }
    };
    Ok((kind, ch.to_string()))
}
