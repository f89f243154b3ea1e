//! API 错误类型
//!
//! 提供统一的错误类型和结构化错误报告。

use serde::Serialize;
use std::path::PathBuf;
use thiserror::Error;
use tiderip_config::Phase;
use tiderip_core::compiler::CompileError;
use tiderip_core::core::RuntimeError;

/// 词法错误（结构化）
pub use tiderip_core::kit::lexer::LexerError;

/// Tiderip 错误类型
#[derive(Error, Debug)]
pub enum TideripError {
    /// 读取源文件失败
    #[error("could not read '{}': {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// 编译错误（词法错误包含在内）
    #[error("{0}")]
    Compile(#[from] CompileError),

    /// 运行时错误
    #[error("{0}")]
    Runtime(#[from] RuntimeError),

    /// 字节码转储无法序列化
    #[error("could not serialize bytecode dump: {0}")]
    Dump(#[from] serde_json::Error),
}

impl From<LexerError> for TideripError {
    fn from(err: LexerError) -> Self {
        TideripError::Compile(CompileError::Lexer(err))
    }
}

impl TideripError {
    /// 获取错误行号（如果有）
    pub fn line(&self) -> Option<u32> {
        match self {
            TideripError::Io { .. } | TideripError::Dump(_) => None,
            TideripError::Compile(e) => Some(e.line()),
            TideripError::Runtime(e) => Some(e.line).filter(|line| *line > 0),
        }
    }

    /// 获取出错的阶段，读文件和转储失败时没有阶段
    pub fn phase(&self) -> Option<Phase> {
        match self {
            TideripError::Io { .. } | TideripError::Dump(_) => None,
            TideripError::Compile(CompileError::Lexer(_)) => Some(Phase::Lexer),
            TideripError::Compile(_) => Some(Phase::Compiler),
            TideripError::Runtime(_) => Some(Phase::Vm),
        }
    }

    /// 转换为结构化错误报告
    ///
    /// 适用于 Web API、LSP 等需要结构化数据的场景。
    /// CLI 可以直接打印，上层应用可以序列化为 JSON。
    pub fn to_report(&self) -> ErrorReport {
        match self {
            TideripError::Io { path, source } => ErrorReport {
                phase: "io",
                module: None,
                line: None,
                column: None,
                error_kind: format!("{:?}", source.kind()),
                message: format!("could not read '{}': {}", path.display(), source),
                trace: Vec::new(),
            },
            TideripError::Dump(e) => ErrorReport {
                phase: "dump",
                module: None,
                line: None,
                column: None,
                error_kind: "Serialize".to_string(),
                message: e.to_string(),
                trace: Vec::new(),
            },
            TideripError::Compile(CompileError::Lexer(e)) => ErrorReport {
                phase: Phase::Lexer.as_str(),
                module: None,
                line: Some(e.line()),
                column: Some(e.column()),
                error_kind: format!("{:?}", e.kind),
                message: e.message(),
                trace: Vec::new(),
            },
            TideripError::Compile(CompileError::Syntax { module, line, kind }) => ErrorReport {
                phase: Phase::Compiler.as_str(),
                module: Some(module.clone()),
                line: Some(*line),
                column: None,
                error_kind: kind_name(kind),
                message: kind.to_string(),
                trace: Vec::new(),
            },
            TideripError::Runtime(e) => ErrorReport {
                phase: Phase::Vm.as_str(),
                module: Some(e.module.clone()).filter(|m| !m.is_empty()),
                line: Some(e.line).filter(|line| *line > 0),
                column: None,
                error_kind: "RuntimeError".to_string(),
                message: e.message.clone(),
                trace: e
                    .trace
                    .iter()
                    .map(|frame| format!("{} ({} line {})", frame.function, frame.module, frame.line))
                    .collect(),
            },
        }
    }
}

/// `UndefinedVariable("x")` -> `UndefinedVariable`
fn kind_name<T: std::fmt::Debug>(kind: &T) -> String {
    let debug = format!("{:?}", kind);
    debug
        .split(|c: char| !c.is_alphanumeric() && c != '_')
        .next()
        .unwrap_or_default()
        .to_string()
}

/// 结构化错误报告
///
/// 上层应用（CLI、Web、LSP）可以根据自己的需求格式化。
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorReport {
    /// 错误阶段: io, dump, lexer, compiler, vm
    pub phase: &'static str,
    /// 出错的模块（如果有）
    pub module: Option<String>,
    /// 错误行号（1-based，如果有）
    pub line: Option<u32>,
    /// 错误列号（1-based，只有词法错误有）
    pub column: Option<u32>,
    /// 错误类型（可用于程序化处理）
    pub error_kind: String,
    /// 人类可读的错误消息
    pub message: String,
    /// 运行时调用栈，最内层在前
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub trace: Vec<String>,
}

impl std::fmt::Display for ErrorReport {
    /// 默认的 CLI 友好格式
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (&self.module, self.line, self.column) {
            (_, Some(line), Some(col)) => {
                write!(f, "[{}:{}] {} error: {}", line, col, self.phase, self.message)?
            }
            (Some(module), Some(line), None) => write!(
                f,
                "[{} line {}] {} error: {}",
                module, line, self.phase, self.message
            )?,
            _ => write!(f, "[{}] error: {}", self.phase, self.message)?,
        }
        for frame in &self.trace {
            write!(f, "\n  at {}", frame)?;
        }
        Ok(())
    }
}

impl ErrorReport {
    /// 转换为 JSON 格式（Web API 使用）
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| {
            format!(r#"{{"phase":"{}","message":"unserializable error"}}"#, self.phase)
        })
    }

    /// 简洁格式（适合终端）
    pub fn to_short(&self) -> String {
        format!("{}: {}", self.phase, self.message)
    }
}
