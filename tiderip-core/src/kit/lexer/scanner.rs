//! Tiderip 扫描器
//!
//! 支持：
//! - 关键字、标识符
//! - 单字符与双字符运算符（`== != <= >= << >> && || ..`）
//! - 十进制与 `0x` 十六进制数字
//! - 字符串转义与 `%(...)` 插值（只允许一层）
//! - `//`、`/* */` 注释与文件开头的 shebang 行

use super::error::{LexErrorKind, LexerError};
use super::token_kind::{Literal, Token, TokenKind};
use std::sync::Arc;
use tiderip_log::{debug, trace, Logger};

pub struct Lexer<'a> {
    source: &'a str,
    logger: Arc<Logger>,
    pos: usize,
    line: u32,
    column: u32,
    /// 插值表达式内尚未闭合的 `(` 数量，0 表示不在插值中
    interp_parens: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Self {
        Self::with_logger(source, Logger::noop())
    }

    pub fn with_logger(source: &'a str, logger: Arc<Logger>) -> Self {
        trace!(logger, "scanning {} bytes", source.len());
        let mut lexer = Lexer {
            source,
            logger,
            pos: 0,
            line: 1,
            column: 1,
            interp_parens: 0,
        };
        if source.starts_with("#!") {
            while let Some(c) = lexer.peek() {
                if c == '\n' {
                    break;
                }
                lexer.advance();
            }
        }
        lexer
    }

    pub fn source(&self) -> &'a str {
        self.source
    }

    fn peek(&self) -> Option<char> {
        self.source[self.pos..].chars().next()
    }

    fn peek_next(&self) -> Option<char> {
        let mut chars = self.source[self.pos..].chars();
        chars.next();
        chars.next()
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn match_char(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn error(&self, kind: LexErrorKind) -> LexerError {
        LexerError::at(kind, self.line, self.column)
    }

    fn make(&self, kind: TokenKind, start: usize, line: u32, column: u32) -> Token {
        Token {
            kind,
            lexeme: self.source[start..self.pos].to_string(),
            start,
            line,
            column,
            literal: Literal::None,
        }
    }

    /// 产生下一个 token，源码结束后一直返回 Eof
    pub fn next_token(&mut self) -> Result<Token, LexerError> {
        match self.scan_token() {
            Ok(token) => {
                trace!(
                    self.logger,
                    "{}:{} {:?} {:?}",
                    token.line,
                    token.column,
                    token.kind,
                    token.lexeme
                );
                Ok(token)
            }
            Err(err) => {
                debug!(
                    self.logger,
                    "lex error at {}:{}: {}",
                    err.line(),
                    err.column(),
                    err.message()
                );
                Err(err)
            }
        }
    }

    fn scan_token(&mut self) -> Result<Token, LexerError> {
        self.skip_blanks()?;

        let start = self.pos;
        let (line, column) = (self.line, self.column);
        let Some(c) = self.advance() else {
            return Ok(self.make(TokenKind::Eof, start, line, column));
        };

        let kind = match c {
            ',' => TokenKind::Comma,
            ':' => TokenKind::Colon,
            '(' => {
                if self.interp_parens > 0 {
                    self.interp_parens += 1;
                }
                TokenKind::LeftParen
            }
            ')' => {
                if self.interp_parens > 0 {
                    self.interp_parens -= 1;
                    if self.interp_parens == 0 {
                        // 插值表达式结束，继续扫描外层字符串
                        return self.scan_string(start, line, column);
                    }
                }
                TokenKind::RightParen
            }
            '[' => TokenKind::LeftBracket,
            ']' => TokenKind::RightBracket,
            '{' => TokenKind::LeftBrace,
            '}' => TokenKind::RightBrace,
            '?' => TokenKind::Question,
            '~' => TokenKind::BitNot,
            '+' => TokenKind::Add,
            '-' => TokenKind::Sub,
            '*' => TokenKind::Mul,
            '/' => TokenKind::Div,
            '%' => TokenKind::Mod,
            '.' => {
                if self.match_char('.') {
                    TokenKind::DotDot
                } else {
                    TokenKind::Dot
                }
            }
            '=' => {
                if self.match_char('=') {
                    TokenKind::Equal
                } else {
                    TokenKind::Assign
                }
            }
            '!' => {
                if self.match_char('=') {
                    TokenKind::NotEqual
                } else {
                    TokenKind::LogicNot
                }
            }
            '&' => {
                if self.match_char('&') {
                    TokenKind::LogicAnd
                } else {
                    TokenKind::BitAnd
                }
            }
            '|' => {
                if self.match_char('|') {
                    TokenKind::LogicOr
                } else {
                    TokenKind::BitOr
                }
            }
            '<' => {
                if self.match_char('=') {
                    TokenKind::LessEqual
                } else if self.match_char('<') {
                    TokenKind::BitShiftLeft
                } else {
                    TokenKind::Less
                }
            }
            '>' => {
                if self.match_char('=') {
                    TokenKind::GreaterEqual
                } else if self.match_char('>') {
                    TokenKind::BitShiftRight
                } else {
                    TokenKind::Greater
                }
            }
            '"' => return self.scan_string(start, line, column),
            c if c.is_ascii_digit() => return self.scan_number(c, start, line, column),
            c if c.is_ascii_alphabetic() || c == '_' => {
                return Ok(self.scan_identifier(start, line, column))
            }
            other => {
                return Err(LexerError::at(
                    LexErrorKind::UnsupportedChar(other),
                    line,
                    column,
                ))
            }
        };
        Ok(self.make(kind, start, line, column))
    }

    /// 跳过空白与注释
    fn skip_blanks(&mut self) -> Result<(), LexerError> {
        loop {
            match self.peek() {
                Some(' ' | '\t' | '\r' | '\n') => {
                    self.advance();
                }
                Some('/') if self.peek_next() == Some('/') => {
                    while let Some(c) = self.peek() {
                        if c == '\n' {
                            break;
                        }
                        self.advance();
                    }
                }
                Some('/') if self.peek_next() == Some('*') => {
                    let (line, column) = (self.line, self.column);
                    self.advance();
                    self.advance();
                    loop {
                        match self.advance() {
                            None => {
                                return Err(LexerError::at(
                                    LexErrorKind::UnterminatedComment,
                                    line,
                                    column,
                                ))
                            }
                            Some('*') if self.peek() == Some('/') => {
                                self.advance();
                                break;
                            }
                            Some(_) => {}
                        }
                    }
                }
                _ => return Ok(()),
            }
        }
    }

    fn scan_identifier(&mut self, start: usize, line: u32, column: u32) -> Token {
        while let Some(c) = self.peek() {
            if c.is_ascii_alphanumeric() || c == '_' {
                self.advance();
            } else {
                break;
            }
        }
        let text = &self.source[start..self.pos];
        let kind = TokenKind::keyword(text).unwrap_or(TokenKind::Id);
        self.make(kind, start, line, column)
    }

    fn scan_number(
        &mut self,
        first: char,
        start: usize,
        line: u32,
        column: u32,
    ) -> Result<Token, LexerError> {
        let is_hex = first == '0'
            && matches!(self.peek(), Some('x' | 'X'))
            && self.peek_next().is_some_and(|c| c.is_ascii_hexdigit());

        let value = if is_hex {
            self.advance();
            let mut value = 0.0;
            while let Some(digit) = self.peek().and_then(|c| c.to_digit(16)) {
                value = value * 16.0 + digit as f64;
                self.advance();
            }
            value
        } else {
            while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                self.advance();
            }
            // `1..3` 是区间，小数点后必须紧跟数字
            if self.peek() == Some('.') && self.peek_next().is_some_and(|c| c.is_ascii_digit()) {
                self.advance();
                while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                    self.advance();
                }
            }
            let text = &self.source[start..self.pos];
            text.parse::<f64>().map_err(|_| {
                LexerError::at(LexErrorKind::InvalidNumber(text.to_string()), line, column)
            })?
        };

        let mut token = self.make(TokenKind::Num, start, line, column);
        token.literal = Literal::Num(value);
        Ok(token)
    }

    /// 扫描字符串体，遇到 `%(` 时产生 Interpolation token
    fn scan_string(&mut self, start: usize, line: u32, column: u32) -> Result<Token, LexerError> {
        let mut text = String::new();
        loop {
            match self.advance() {
                None => {
                    return Err(LexerError::at(
                        LexErrorKind::UnterminatedString,
                        line,
                        column,
                    ))
                }
                Some('"') => {
                    let mut token = self.make(TokenKind::String, start, line, column);
                    token.literal = Literal::Str(text);
                    return Ok(token);
                }
                Some('%') if self.peek() == Some('(') => {
                    if self.interp_parens > 0 {
                        return Err(self.error(LexErrorKind::NestedInterpolation));
                    }
                    self.advance();
                    self.interp_parens = 1;
                    let mut token = self.make(TokenKind::Interpolation, start, line, column);
                    token.literal = Literal::Str(text);
                    return Ok(token);
                }
                Some('\\') => {
                    let escaped = self.scan_escape(line, column)?;
                    text.push(escaped);
                }
                Some(c) => text.push(c),
            }
        }
    }

    fn scan_escape(&mut self, line: u32, column: u32) -> Result<char, LexerError> {
        let Some(c) = self.advance() else {
            return Err(LexerError::at(
                LexErrorKind::UnterminatedString,
                line,
                column,
            ));
        };
        let escaped = match c {
            '0' => '\0',
            'a' => '\x07',
            'b' => '\x08',
            'f' => '\x0c',
            'n' => '\n',
            'r' => '\r',
            't' => '\t',
            '"' => '"',
            '\\' => '\\',
            'u' => return self.scan_unicode_escape(),
            other => return Err(self.error(LexErrorKind::UnsupportedEscape(other))),
        };
        Ok(escaped)
    }

    fn scan_unicode_escape(&mut self) -> Result<char, LexerError> {
        let mut digits = String::with_capacity(4);
        for _ in 0..4 {
            match self.peek() {
                None | Some('"') => {
                    return Err(self.error(LexErrorKind::UnterminatedUnicodeEscape))
                }
                Some(c) => {
                    digits.push(c);
                    self.advance();
                }
            }
        }
        u32::from_str_radix(&digits, 16)
            .ok()
            .and_then(char::from_u32)
            .ok_or_else(|| self.error(LexErrorKind::InvalidUnicodeEscape(digits)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kit::lexer::tokenize;

    fn kinds(source: &str) -> Vec<TokenKind> {
        tokenize(source)
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn test_tokens_are_logged_under_lexer_target() {
        let (logger, ring) = tiderip_log::LogConfig::new(tiderip_log::Level::Trace)
            .with_ring_buffer(64)
            .init();
        let ring = ring.unwrap();
        let mut lexer = Lexer::with_logger("var x", logger);
        while lexer.next_token().unwrap().kind != TokenKind::Eof {}

        let records = ring.dump_records();
        assert!(records.iter().all(|r| r.target.contains("::lexer")));
        assert!(records.iter().any(|r| r.message.contains("Var")));
        assert!(records.iter().any(|r| r.message.contains("Eof")));
    }

    #[test]
    fn test_two_char_operators() {
        assert_eq!(
            kinds("== != <= >= << >> && || .."),
            vec![
                TokenKind::Equal,
                TokenKind::NotEqual,
                TokenKind::LessEqual,
                TokenKind::GreaterEqual,
                TokenKind::BitShiftLeft,
                TokenKind::BitShiftRight,
                TokenKind::LogicAnd,
                TokenKind::LogicOr,
                TokenKind::DotDot,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_keywords_and_identifiers() {
        assert_eq!(
            kinds("class Point is super _x"),
            vec![
                TokenKind::Class,
                TokenKind::Id,
                TokenKind::Is,
                TokenKind::Super,
                TokenKind::Id,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_numbers() {
        let tokens = tokenize("12 3.5 0xff 1..3").unwrap();
        assert_eq!(tokens[0].literal, Literal::Num(12.0));
        assert_eq!(tokens[1].literal, Literal::Num(3.5));
        assert_eq!(tokens[2].literal, Literal::Num(255.0));
        // 区间：1 .. 3
        assert_eq!(tokens[3].literal, Literal::Num(1.0));
        assert_eq!(tokens[4].kind, TokenKind::DotDot);
        assert_eq!(tokens[5].literal, Literal::Num(3.0));
    }

    #[test]
    fn test_string_escapes() {
        let tokens = tokenize(r#""a\tb\n\"q\" A\\""#).unwrap();
        assert_eq!(tokens[0].literal, Literal::Str("a\tb\n\"q\" A\\".to_string()));
    }

    #[test]
    fn test_unicode_escape_utf8() {
        let tokens = tokenize(r#""\u4e2d""#).unwrap();
        assert_eq!(tokens[0].literal, Literal::Str("中".to_string()));
    }

    #[test]
    fn test_interpolation() {
        let tokens = tokenize(r#""a %(x + (1)) b %(y) c""#).unwrap();
        let kinds: Vec<_> = tokens.iter().map(|t| t.kind).collect();
        assert_eq!(
            kinds,
            vec![
                TokenKind::Interpolation,
                TokenKind::Id,
                TokenKind::Add,
                TokenKind::LeftParen,
                TokenKind::Num,
                TokenKind::RightParen,
                TokenKind::Interpolation,
                TokenKind::Id,
                TokenKind::String,
                TokenKind::Eof,
            ]
        );
        assert_eq!(tokens[0].literal, Literal::Str("a ".to_string()));
        assert_eq!(tokens[6].literal, Literal::Str(" b ".to_string()));
        assert_eq!(tokens[8].literal, Literal::Str(" c".to_string()));
    }

    #[test]
    fn test_nested_interpolation_rejected() {
        let err = tokenize(r#""a %("b %(c)")""#).unwrap_err();
        assert_eq!(err.kind, LexErrorKind::NestedInterpolation);
    }

    #[test]
    fn test_comments_and_shebang() {
        let source = "#!/usr/bin/env tiderip\n// line\nvar /* block\n comment */ x";
        let tokens = tokenize(source).unwrap();
        assert_eq!(tokens[0].kind, TokenKind::Var);
        assert_eq!(tokens[0].line, 3);
        assert_eq!(tokens[1].kind, TokenKind::Id);
        assert_eq!(tokens[1].line, 4);
    }

    #[test]
    fn test_shebang_only_at_start() {
        let err = tokenize("var x\n#!oops").unwrap_err();
        assert_eq!(err.kind, LexErrorKind::UnsupportedChar('#'));
        assert_eq!(err.line, 2);
    }

    #[test]
    fn test_errors() {
        assert_eq!(
            tokenize("\"abc").unwrap_err().kind,
            LexErrorKind::UnterminatedString
        );
        assert_eq!(
            tokenize("/* never closed").unwrap_err().kind,
            LexErrorKind::UnterminatedComment
        );
        assert_eq!(
            tokenize(r#""\u12""#).unwrap_err().kind,
            LexErrorKind::UnterminatedUnicodeEscape
        );
        assert_eq!(
            tokenize("var $x").unwrap_err().kind,
            LexErrorKind::UnsupportedChar('$')
        );
        assert_eq!(
            tokenize(r#""\q""#).unwrap_err().kind,
            LexErrorKind::UnsupportedEscape('q')
        );
    }

    #[test]
    fn test_column_tracking() {
        let tokens = tokenize("var  answer").unwrap();
        assert_eq!(tokens[0].column, 1);
        assert_eq!(tokens[1].column, 6);
    }
}
