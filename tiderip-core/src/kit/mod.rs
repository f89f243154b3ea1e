//! 通用工具：词法分析器

pub mod lexer;
