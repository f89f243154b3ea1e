//! CLI 日志系统初始化
//!
//! `tiderip-log` 的记录被转发成 `tracing` 事件，
//! 再由 `tracing-subscriber` 按阶段过滤。

use crate::config::LogConfig;
use std::io;
use tiderip_config::Phase;
use tiderip_log::{Level, LogSink, Record};
use tracing_subscriber::{
    filter::Targets, fmt, layer::SubscriberExt, util::SubscriberInitExt, Layer, Registry,
};

/// 日志输出格式
#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum LogFormat {
    /// 紧凑格式
    Compact,
    /// JSON 格式（工具集成）
    Json,
}

/// 把记录按阶段转发到 `tiderip::<phase>` 目标
pub struct TracingSink;

macro_rules! forward {
    ($target:literal, $level:expr, $message:expr) => {
        match $level {
            Level::Trace => tracing::trace!(target: $target, "{}", $message),
            Level::Debug => tracing::debug!(target: $target, "{}", $message),
            Level::Info => tracing::info!(target: $target, "{}", $message),
            Level::Warn => tracing::warn!(target: $target, "{}", $message),
            Level::Error => tracing::error!(target: $target, "{}", $message),
        }
    };
}

impl LogSink for TracingSink {
    fn write(&self, record: &Record) {
        let message = &record.message;
        match Phase::from_module_path(record.target) {
            Some(Phase::Lexer) => forward!("tiderip::lexer", record.level, message),
            Some(Phase::Compiler) => forward!("tiderip::compiler", record.level, message),
            Some(Phase::Vm) => forward!("tiderip::vm", record.level, message),
            None => forward!("tiderip::api", record.level, message),
        }
    }
}

/// 使用指定格式和日志配置初始化日志系统（输出到 stderr）
pub fn init(log_config: &LogConfig, format: LogFormat) {
    let mut targets = Targets::new()
        .with_default(log_config.global)
        .with_target("tiderip::api", log_config.global)
        .with_target("tiderip::cli", log_config.global);
    for phase in Phase::ALL {
        targets = targets.with_target(phase.target(), log_config.level_for(phase));
    }

    let layer: Box<dyn Layer<Registry> + Send + Sync> = match format {
        LogFormat::Compact => fmt::layer()
            .compact()
            .with_target(true)
            .without_time()
            .with_writer(io::stderr)
            .boxed(),
        LogFormat::Json => fmt::layer()
            .json()
            .with_target(true)
            .with_writer(io::stderr)
            .boxed(),
    };

    // 重复初始化（例如测试里）时忽略
    let _ = tracing_subscriber::registry()
        .with(layer.with_filter(targets))
        .try_init();
}
