//! CLI 配置
//!
//! 包含 CLI 特有的配置：分阶段的日志级别

use tiderip_config::Phase;
use tracing::Level;

/// CLI 日志配置
#[derive(Debug, Clone)]
pub struct LogConfig {
    pub global: Level,
    pub lexer: Option<Level>,
    pub compiler: Option<Level>,
    pub vm: Option<Level>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            global: Level::WARN,
            lexer: None,
            compiler: None,
            vm: None,
        }
    }
}

impl LogConfig {
    /// Get log level for a specific phase
    pub fn level_for(&self, phase: Phase) -> Level {
        match phase {
            Phase::Lexer => self.lexer.unwrap_or(self.global),
            Phase::Compiler => self.compiler.unwrap_or(self.global),
            Phase::Vm => self.vm.unwrap_or(self.global),
        }
    }

    /// 所有阶段里最详细的级别，决定 `Logger` 放行哪些记录
    pub fn most_verbose(&self) -> tiderip_log::Level {
        Phase::ALL
            .iter()
            .map(|phase| to_record_level(self.level_for(*phase)))
            .chain(std::iter::once(to_record_level(self.global)))
            .min()
            .unwrap_or(tiderip_log::Level::Warn)
    }
}

/// 解析命令行上的级别名，`silent` 视为 error
pub fn parse_level(s: &str) -> Result<Level, String> {
    s.parse::<tiderip_log::Level>()
        .map(to_tracing_level)
        .map_err(|e| e.to_string())
}

pub fn to_tracing_level(level: tiderip_log::Level) -> Level {
    match level {
        tiderip_log::Level::Trace => Level::TRACE,
        tiderip_log::Level::Debug => Level::DEBUG,
        tiderip_log::Level::Info => Level::INFO,
        tiderip_log::Level::Warn => Level::WARN,
        tiderip_log::Level::Error => Level::ERROR,
    }
}

fn to_record_level(level: Level) -> tiderip_log::Level {
    match level {
        Level::TRACE => tiderip_log::Level::Trace,
        Level::DEBUG => tiderip_log::Level::Debug,
        Level::INFO => tiderip_log::Level::Info,
        Level::WARN => tiderip_log::Level::Warn,
        _ => tiderip_log::Level::Error,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_for_falls_back_to_global() {
        let cfg = LogConfig {
            vm: Some(Level::TRACE),
            ..LogConfig::default()
        };
        assert_eq!(cfg.level_for(Phase::Vm), Level::TRACE);
        assert_eq!(cfg.level_for(Phase::Compiler), Level::WARN);
        assert_eq!(cfg.most_verbose(), tiderip_log::Level::Trace);
    }

    #[test]
    fn test_parse_level() {
        assert_eq!(parse_level("debug"), Ok(Level::DEBUG));
        assert_eq!(parse_level("SILENT"), Ok(Level::ERROR));
        assert!(parse_level("loud").is_err());
    }
}
