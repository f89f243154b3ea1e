//! API 层配置
//!
//! 包含执行配置 RunConfig 和全局单例（供 CLI 使用）

use once_cell::sync::OnceCell;
use std::path::PathBuf;
use std::sync::Arc;
use tiderip_config::VmConfig;
use tiderip_log::Logger;

/// Execution configuration
#[derive(Clone)]
pub struct RunConfig {
    /// Virtual machine configuration (limits, stack sizes, source extension)
    pub vm: VmConfig,
    /// Directory imported modules are resolved against
    pub root_dir: PathBuf,
    /// Print the token stream instead of running
    pub dump_tokens: bool,
    /// Print a JSON dump of the compiled module before running
    pub dump_bytecode: bool,
    /// Collect script output into `ExecuteOutput::stdout` instead of writing to stdout
    pub capture_output: bool,
    /// Logger (optional)
    pub logger: Arc<Logger>,
}

impl std::fmt::Debug for RunConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunConfig")
            .field("vm", &self.vm)
            .field("root_dir", &self.root_dir)
            .field("dump_tokens", &self.dump_tokens)
            .field("dump_bytecode", &self.dump_bytecode)
            .field("capture_output", &self.capture_output)
            .finish()
    }
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            vm: VmConfig::default(),
            root_dir: PathBuf::from("."),
            dump_tokens: false,
            dump_bytecode: false,
            capture_output: false,
            logger: Logger::noop(),
        }
    }
}

// Global config singleton for CLI convenience
static GLOBAL_CONFIG: OnceCell<RunConfig> = OnceCell::new();

/// Initialize global configuration
///
/// Returns the rejected config if one was already installed.
pub fn init(config: RunConfig) -> Result<(), RunConfig> {
    GLOBAL_CONFIG.set(config)
}

/// Get global config, falling back to the default one
pub fn config() -> &'static RunConfig {
    GLOBAL_CONFIG.get_or_init(RunConfig::default)
}

/// Check if config is initialized
pub fn is_initialized() -> bool {
    GLOBAL_CONFIG.get().is_some()
}
