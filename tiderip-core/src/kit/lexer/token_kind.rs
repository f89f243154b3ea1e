//! Tiderip Token 类型定义

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    // 字面量
    Num,
    String,
    /// 内嵌表达式之前的字符串片段：`"a %(`
    Interpolation,
    Id,

    // 关键字
    Var,
    Fun,
    If,
    Else,
    True,
    False,
    While,
    For,
    Break,
    Continue,
    Return,
    Null,
    Class,
    This,
    Static,
    Is,
    Super,
    Import,

    // 分隔符
    Comma,
    Colon,
    LeftParen,
    RightParen,
    LeftBracket,
    RightBracket,
    LeftBrace,
    RightBrace,
    Dot,
    DotDot,
    Question,

    // 运算符
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Assign,
    BitAnd,
    BitOr,
    BitNot,
    BitShiftRight,
    BitShiftLeft,
    LogicAnd,
    LogicOr,
    LogicNot,
    Equal,
    NotEqual,
    Greater,
    GreaterEqual,
    Less,
    LessEqual,

    Eof,
}

const KEYWORDS: &[(&str, TokenKind)] = &[
    ("var", TokenKind::Var),
    ("fun", TokenKind::Fun),
    ("if", TokenKind::If),
    ("else", TokenKind::Else),
    ("true", TokenKind::True),
    ("false", TokenKind::False),
    ("while", TokenKind::While),
    ("for", TokenKind::For),
    ("break", TokenKind::Break),
    ("continue", TokenKind::Continue),
    ("return", TokenKind::Return),
    ("null", TokenKind::Null),
    ("class", TokenKind::Class),
    ("is", TokenKind::Is),
    ("static", TokenKind::Static),
    ("this", TokenKind::This),
    ("super", TokenKind::Super),
    ("import", TokenKind::Import),
];

impl TokenKind {
    /// 关键字查表，非关键字返回 None
    pub fn keyword(ident: &str) -> Option<TokenKind> {
        KEYWORDS
            .iter()
            .find(|(name, _)| *name == ident)
            .map(|(_, kind)| *kind)
    }

    /// 大写名称，用于 token 转储
    pub fn name(&self) -> &'static str {
        match self {
            TokenKind::Num => "NUM",
            TokenKind::String => "STRING",
            TokenKind::Interpolation => "INTERPOLATION",
            TokenKind::Id => "ID",
            TokenKind::Var => "VAR",
            TokenKind::Fun => "FUN",
            TokenKind::If => "IF",
            TokenKind::Else => "ELSE",
            TokenKind::True => "TRUE",
            TokenKind::False => "FALSE",
            TokenKind::While => "WHILE",
            TokenKind::For => "FOR",
            TokenKind::Break => "BREAK",
            TokenKind::Continue => "CONTINUE",
            TokenKind::Return => "RETURN",
            TokenKind::Null => "NULL",
            TokenKind::Class => "CLASS",
            TokenKind::This => "THIS",
            TokenKind::Static => "STATIC",
            TokenKind::Is => "IS",
            TokenKind::Super => "SUPER",
            TokenKind::Import => "IMPORT",
            TokenKind::Comma => "COMMA",
            TokenKind::Colon => "COLON",
            TokenKind::LeftParen => "LEFT_PAREN",
            TokenKind::RightParen => "RIGHT_PAREN",
            TokenKind::LeftBracket => "LEFT_BRACKET",
            TokenKind::RightBracket => "RIGHT_BRACKET",
            TokenKind::LeftBrace => "LEFT_BRACE",
            TokenKind::RightBrace => "RIGHT_BRACE",
            TokenKind::Dot => "DOT",
            TokenKind::DotDot => "DOT_DOT",
            TokenKind::Question => "QUESTION",
            TokenKind::Add => "ADD",
            TokenKind::Sub => "SUB",
            TokenKind::Mul => "MUL",
            TokenKind::Div => "DIV",
            TokenKind::Mod => "MOD",
            TokenKind::Assign => "ASSIGN",
            TokenKind::BitAnd => "BIT_AND",
            TokenKind::BitOr => "BIT_OR",
            TokenKind::BitNot => "BIT_NOT",
            TokenKind::BitShiftRight => "BIT_SHIFT_RIGHT",
            TokenKind::BitShiftLeft => "BIT_SHIFT_LEFT",
            TokenKind::LogicAnd => "LOGIC_AND",
            TokenKind::LogicOr => "LOGIC_OR",
            TokenKind::LogicNot => "LOGIC_NOT",
            TokenKind::Equal => "EQUAL",
            TokenKind::NotEqual => "NOT_EQUAL",
            TokenKind::Greater => "GREATER",
            TokenKind::GreaterEqual => "GREATER_EQUAL",
            TokenKind::Less => "LESS",
            TokenKind::LessEqual => "LESS_EQUAL",
            TokenKind::Eof => "EOF",
        }
    }
}

impl std::fmt::Display for TokenKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// 数字与字符串 token 携带的字面量
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Literal {
    #[default]
    None,
    Num(f64),
    Str(String),
}

/// 单个 token
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    /// 源码原文
    pub lexeme: String,
    /// 起始字节偏移
    pub start: usize,
    /// 起始行号（1-based）
    pub line: u32,
    /// 起始列号（1-based，按字符计）
    pub column: u32,
    pub literal: Literal,
}

impl Token {
    /// 编译器开始前的占位 token
    pub fn placeholder() -> Self {
        Token {
            kind: TokenKind::Eof,
            lexeme: String::new(),
            start: 0,
            line: 1,
            column: 1,
            literal: Literal::None,
        }
    }

    /// `--tokens` 的单行格式：`3L: ID [name]`
    pub fn dump(&self) -> String {
        format!("{}L: {} [{}]", self.line, self.kind.name(), self.lexeme)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keyword_lookup() {
        assert_eq!(TokenKind::keyword("class"), Some(TokenKind::Class));
        assert_eq!(TokenKind::keyword("import"), Some(TokenKind::Import));
        assert_eq!(TokenKind::keyword("Class"), None);
        assert_eq!(TokenKind::keyword("value"), None);
    }

    #[test]
    fn test_token_dump() {
        let token = Token {
            kind: TokenKind::Id,
            lexeme: "count".to_string(),
            start: 10,
            line: 3,
            column: 5,
            literal: Literal::None,
        };
        assert_eq!(token.dump(), "3L: ID [count]");
    }
}
