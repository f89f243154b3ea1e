//! 终端相关的输出与交互

mod cli;
mod repl;

pub use cli::print_error_with_source;
pub use repl::run_repl;
