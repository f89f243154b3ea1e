//! CLI 格式化输出
//!
//! 提供命令行友好的错误显示和源码上下文打印。

use tiderip_api::TideripError;

/// 错误行前后显示的上下文行数
const CONTEXT_LINES: usize = 2;

/// 打印错误，编译错误附带源代码上下文
pub fn print_error_with_source(e: &TideripError, source: Option<&str>) {
    let report = e.to_report();
    eprintln!("{}", report);

    if let (TideripError::Compile(_), Some(source), Some(line)) = (e, source, report.line) {
        eprint!("{}", source_context(source, line as usize, report.column.map(|c| c as usize)));
    }
}

/// 源代码上下文（显示错误行前后几行），行号越界时为空
pub fn source_context(source: &str, error_line: usize, error_col: Option<usize>) -> String {
    let lines: Vec<&str> = source.lines().collect();
    let total_lines = lines.len();
    if error_line == 0 || error_line > total_lines {
        return String::new();
    }

    let start_line = error_line.saturating_sub(CONTEXT_LINES).max(1);
    let end_line = (error_line + CONTEXT_LINES).min(total_lines);
    let width = end_line.to_string().len();

    let mut out = String::new();
    let separator = "-".repeat(width + 1);
    out.push_str(&format!("{}|--\n", separator));
    for line_idx in start_line..=end_line {
        out.push_str(&format!("{:>width$} | {}\n", line_idx, lines[line_idx - 1], width = width));
        if line_idx == error_line {
            if let Some(col) = error_col {
                let marker = " ".repeat(col.saturating_sub(1));
                out.push_str(&format!("{} | {}^\n", " ".repeat(width), marker));
            }
        }
    }
    out.push_str(&format!("{}|--\n", separator));
    out
}
