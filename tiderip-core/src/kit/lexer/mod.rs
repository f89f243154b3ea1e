//! 词法分析器
//!
//! 按需产生 token：编译器每次只向前看一个 token。

pub mod error;
pub mod scanner;
pub mod token_kind;

pub use error::{LexErrorKind, LexerError};
pub use scanner::Lexer;
pub use token_kind::{Literal, Token, TokenKind};

/// 一次性把整段源码切成 token（包含结尾的 Eof）
pub fn tokenize(source: &str) -> Result<Vec<Token>, LexerError> {
    let mut lexer = Lexer::new(source);
    let mut tokens = Vec::new();
    loop {
        let token = lexer.next_token()?;
        let done = token.kind == TokenKind::Eof;
        tokens.push(token);
        if done {
            return Ok(tokens);
        }
    }
}
