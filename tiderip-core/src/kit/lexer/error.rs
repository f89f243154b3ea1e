//! Lexer 错误类型
//!
//! 词法错误对当前编译是致命的，携带出错的行列号。

/// 词法错误种类
#[derive(Debug, Clone, PartialEq)]
pub enum LexErrorKind {
    /// 不支持的字符
    UnsupportedChar(char),
    UnterminatedString,
    UnterminatedComment,
    /// `\u` 后不足 4 位
    UnterminatedUnicodeEscape,
    /// `\u` 后不是合法码点
    InvalidUnicodeEscape(String),
    UnsupportedEscape(char),
    /// 插值表达式里又出现插值
    NestedInterpolation,
    InvalidNumber(String),
}

/// 词法错误，包含结构化信息
#[derive(Debug, Clone, PartialEq)]
pub struct LexerError {
    pub kind: LexErrorKind,
    pub line: u32,
    pub column: u32,
}

impl LexerError {
    /// 在指定位置创建错误
    pub fn at(kind: LexErrorKind, line: u32, column: u32) -> Self {
        Self { kind, line, column }
    }

    /// 获取行号（1-based）
    pub fn line(&self) -> u32 {
        self.line
    }

    /// 获取列号（1-based）
    pub fn column(&self) -> u32 {
        self.column
    }

    pub fn message(&self) -> String {
        match &self.kind {
            LexErrorKind::UnsupportedChar(ch) => format!("unsupported char '{}'", ch),
            LexErrorKind::UnterminatedString => "unterminated string".to_string(),
            LexErrorKind::UnterminatedComment => "unterminated block comment".to_string(),
            LexErrorKind::UnterminatedUnicodeEscape => {
                "unterminated unicode escape, expect 4 hex digits".to_string()
            }
            LexErrorKind::InvalidUnicodeEscape(seq) => {
                format!("invalid unicode escape '\\u{}'", seq)
            }
            LexErrorKind::UnsupportedEscape(ch) => format!("unsupported escape '\\{}'", ch),
            LexErrorKind::NestedInterpolation => {
                "nested string interpolation is not supported".to_string()
            }
            LexErrorKind::InvalidNumber(text) => format!("invalid number '{}'", text),
        }
    }
}

impl std::fmt::Display for LexerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}:{}] {}", self.line, self.column, self.message())
    }
}

impl std::error::Error for LexerError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lexer_error_display() {
        let err = LexerError::at(LexErrorKind::UnterminatedString, 3, 7);
        let display = err.to_string();
        assert!(display.starts_with("[3:7]"));
        assert!(display.contains("unterminated string"));
    }

    #[test]
    fn test_lexer_error_unsupported_char() {
        let err = LexerError::at(LexErrorKind::UnsupportedChar('@'), 1, 1);
        assert_eq!(err.line(), 1);
        assert_eq!(err.column(), 1);
        assert!(err.to_string().contains("'@'"));
    }

    #[test]
    fn test_lexer_error_escape() {
        let err = LexerError::at(LexErrorKind::UnsupportedEscape('q'), 5, 10);
        assert!(err.message().contains("\\q"));
    }
}
