//! tiderip-log - 结构化日志系统
//!
//! 为 Tiderip 编译器和虚拟机设计的日志系统：
//! - **显式传递**：没有全局 logger，`Arc<Logger>` 通过参数传给 `Vm`/`Compiler`
//! - **惰性格式化**：级别未启用时宏不会格式化消息
//! - **可回放**：环形缓冲区保留最后 N 条记录，测试里用它断言日志
//!
//! ```ignore
//! use tiderip_log::{LogConfig, debug};
//!
//! let (logger, ring) = LogConfig::dev().init();
//! debug!(logger, "vm ready");
//! ```

mod config;
mod logger;
mod macros;
mod record;
mod ring_buffer;

pub use config::{LogConfig, OutputConfig};
pub use logger::{LogSink, Logger};
#[cfg(feature = "stderr")]
pub use logger::StderrSink;
#[cfg(feature = "stdout")]
pub use logger::StdoutSink;
pub use record::{Level, Record};
pub use ring_buffer::{LogRingBuffer, RingBufferStats};

// 宏通过 #[macro_export] 导出到 crate 根：
// trace!, debug!, info!, warn!, error!, log!

/// 日志结果类型
pub type Result<T> = std::result::Result<T, Error>;

/// 日志系统错误类型
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// 无法识别的级别名
    #[error("unknown log level '{0}'")]
    UnknownLevel(String),
    /// IO 错误
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
