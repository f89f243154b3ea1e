//! 运行时错误
//!
//! 顶层协程中止时交给调用方的错误描述。

/// 调用栈中的一帧
#[derive(Debug, Clone, PartialEq)]
pub struct TraceFrame {
    pub function: String,
    pub module: String,
    pub line: u32,
}

/// 顶层协程中止
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("[{module} line {line}] runtime error: {message}")]
pub struct RuntimeError {
    /// 错误值的字符串形式
    pub message: String,
    pub module: String,
    pub line: u32,
    /// 最内层在前
    pub trace: Vec<TraceFrame>,
}

impl RuntimeError {
    /// 不属于任何帧的错误（例如引导失败）
    pub fn detached(message: impl Into<String>) -> Self {
        RuntimeError {
            message: message.into(),
            module: String::new(),
            line: 0,
            trace: Vec::new(),
        }
    }

    /// 多行报告：首行 + 调用栈
    pub fn report(&self) -> String {
        let mut out = self.to_string();
        for frame in &self.trace {
            out.push_str(&format!(
                "\n  at {} ({} line {})",
                frame.function, frame.module, frame.line
            ));
        }
        out
    }
}
