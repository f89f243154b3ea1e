//! 日志配置
//!
//! 一键创建带输出目标的日志器。

use crate::{Level, LogRingBuffer, Logger};
use std::sync::Arc;

/// 日志输出目标配置
#[derive(Clone, Debug, PartialEq)]
pub enum OutputConfig {
    #[cfg(feature = "stdout")]
    Stdout,
    #[cfg(feature = "stderr")]
    Stderr,
    /// 环形缓冲区（容量）
    RingBuffer(usize),
}

/// 日志配置
///
/// ```
/// use tiderip_log::{LogConfig, Level};
///
/// let (logger, ring) = LogConfig::new(Level::Debug).with_ring_buffer(128).init();
/// assert!(ring.is_some());
/// assert_eq!(logger.level(), Level::Debug);
/// ```
#[derive(Clone, Debug)]
pub struct LogConfig {
    pub level: Level,
    pub outputs: Vec<OutputConfig>,
}

impl LogConfig {
    pub fn new(level: Level) -> Self {
        LogConfig {
            level,
            outputs: Vec::new(),
        }
    }

    /// 开发环境：Debug 级别，stderr + 10000 条环形缓冲
    #[cfg(feature = "stderr")]
    pub fn dev() -> Self {
        LogConfig {
            level: Level::Debug,
            outputs: vec![OutputConfig::Stderr, OutputConfig::RingBuffer(10000)],
        }
    }

    /// 测试环境：静默
    pub fn test() -> Self {
        LogConfig::new(Level::Error)
    }

    #[cfg(feature = "stdout")]
    pub fn with_stdout(mut self) -> Self {
        if !self.outputs.contains(&OutputConfig::Stdout) {
            self.outputs.push(OutputConfig::Stdout);
        }
        self
    }

    #[cfg(feature = "stderr")]
    pub fn with_stderr(mut self) -> Self {
        if !self.outputs.contains(&OutputConfig::Stderr) {
            self.outputs.push(OutputConfig::Stderr);
        }
        self
    }

    /// 添加环形缓冲区（只保留一个，重复调用时以最后一次容量为准）
    pub fn with_ring_buffer(mut self, capacity: usize) -> Self {
        self.outputs
            .retain(|o| !matches!(o, OutputConfig::RingBuffer(_)));
        self.outputs.push(OutputConfig::RingBuffer(capacity));
        self
    }

    /// 创建日志器，同时返回环形缓冲区（如果配置了）
    pub fn init(&self) -> (Arc<Logger>, Option<Arc<LogRingBuffer>>) {
        let logger = Logger::new(self.level);
        let mut ring = None;
        for output in &self.outputs {
            match output {
                #[cfg(feature = "stdout")]
                OutputConfig::Stdout => logger.add_sink(crate::StdoutSink),
                #[cfg(feature = "stderr")]
                OutputConfig::Stderr => logger.add_sink(crate::StderrSink),
                OutputConfig::RingBuffer(capacity) => {
                    let buffer = LogRingBuffer::new(*capacity);
                    logger.add_sink(buffer.clone());
                    ring = Some(buffer);
                }
            }
        }
        (logger, ring)
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        LogConfig::new(Level::Info)
    }
}
