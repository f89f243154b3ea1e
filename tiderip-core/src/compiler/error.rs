//! 编译错误

use crate::kit::lexer::LexerError;

/// 语义错误种类
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SyntaxErrorKind {
    #[error("expect {expected}, found '{found}'")]
    UnexpectedToken { expected: String, found: String },
    #[error("expect expression, found '{0}'")]
    ExpectedExpression(String),
    #[error("local variable '{0}' redefined")]
    LocalRedefinition(String),
    #[error("module variable '{0}' redefined")]
    ModuleVarRedefinition(String),
    #[error("field '{0}' redefined")]
    FieldRedefinition(String),
    #[error("method '{0}' redefined")]
    MethodRedefinition(String),
    #[error("identifier '{name}' is longer than {max}")]
    IdentifierTooLong { name: String, max: usize },
    #[error("the max number of local variables is {0}")]
    TooManyLocals(usize),
    #[error("the max number of upvalues is {0}")]
    TooManyUpvalues(usize),
    #[error("the max number of arguments is {0}")]
    TooManyArgs(usize),
    #[error("the max number of fields is {0}")]
    TooManyFields(usize),
    #[error("the max number of constants is {0}")]
    TooManyConstants(usize),
    #[error("jump offset too large")]
    JumpTooLarge,
    #[error("bad constructor: {0}")]
    BadConstructor(String),
    #[error("'break' outside a loop")]
    BreakOutsideLoop,
    #[error("'continue' outside a loop")]
    ContinueOutsideLoop,
    #[error("'this' outside a method")]
    ThisOutsideMethod,
    #[error("'super' outside a method")]
    SuperOutsideMethod,
    #[error("undefined function '{0}'")]
    UndefinedFunction(String),
    #[error("undefined variable '{0}'")]
    UndefinedVariable(String),
    #[error("instance field '{0}' used in a static method")]
    FieldInStaticMethod(String),
    #[error("class definition must be at module scope")]
    ClassNotAtModuleScope,
    #[error("fun definition must be at module scope")]
    FunNotAtModuleScope,
    #[error("invalid assignment target")]
    InvalidAssignmentTarget,
    #[error("instance field '{0}' can't have an initializer")]
    InstanceFieldInitializer(String),
}

/// 一次编译的失败原因
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CompileError {
    #[error("lexer error {0}")]
    Lexer(#[from] LexerError),
    #[error("[{module} line {line}] {kind}")]
    Syntax {
        module: String,
        line: u32,
        kind: SyntaxErrorKind,
    },
}

impl CompileError {
    pub fn line(&self) -> u32 {
        match self {
            CompileError::Lexer(err) => err.line(),
            CompileError::Syntax { line, .. } => *line,
        }
    }

    pub fn kind(&self) -> Option<&SyntaxErrorKind> {
        match self {
            CompileError::Syntax { kind, .. } => Some(kind),
            CompileError::Lexer(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kit::lexer::LexErrorKind;

    #[test]
    fn test_display() {
        let err = CompileError::Syntax {
            module: "main".to_string(),
            line: 4,
            kind: SyntaxErrorKind::UndefinedVariable("foo".to_string()),
        };
        assert_eq!(err.to_string(), "[main line 4] undefined variable 'foo'");
        assert_eq!(err.line(), 4);

        let lex: CompileError = LexerError::at(LexErrorKind::UnterminatedString, 2, 7).into();
        assert_eq!(lex.line(), 2);
        assert!(lex.kind().is_none());
    }
}
