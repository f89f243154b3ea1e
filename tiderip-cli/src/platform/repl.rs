//! 交互式解释器

use crate::platform::print_error_with_source;
use std::io::{self, BufRead, Write};
use tiderip_api::{RunConfig, Session};

pub const PROMPT: &str = ">>> ";

/// 逐行读取并执行，`exit` 或输入结束时退出
pub fn run_repl(config: &RunConfig) -> io::Result<()> {
    println!("Tiderip Version:{}", env!("CARGO_PKG_VERSION"));
    let mut session = Session::new(config);
    let stdin = io::stdin();
    let mut line = String::new();
    loop {
        print!("{}", PROMPT);
        io::stdout().flush()?;

        line.clear();
        if stdin.lock().read_line(&mut line)? == 0 {
            println!();
            return Ok(());
        }
        let input = line.trim();
        if input == "exit" {
            return Ok(());
        }
        if input.is_empty() {
            continue;
        }
        if let Err(e) = session.execute(input) {
            print_error_with_source(&e, Some(input));
        }
    }
}
