//! API 类型定义
//!
//! 执行的输出类型。

/// 执行输出
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExecuteOutput {
    /// 标准输出捕获（只在 `capture_output` 打开时有内容）
    pub stdout: String,
    /// 模块函数的 JSON 字节码转储（`dump_bytecode` 打开时）
    pub bytecode: Option<String>,
}
