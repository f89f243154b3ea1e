//! 文件系统模块加载器
//!
//! `import name` 解析为 `root + name + extension`。

use std::path::{Path, PathBuf};
use tiderip_core::ModuleLoader;

/// 从目录读取模块源码
#[derive(Debug, Clone)]
pub struct FileModuleLoader {
    root: PathBuf,
    extension: String,
}

impl FileModuleLoader {
    pub fn new(root: impl Into<PathBuf>, extension: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            extension: extension.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// 模块名对应的文件路径
    pub fn resolve(&self, name: &str) -> PathBuf {
        self.root.join(format!("{}{}", name, self.extension))
    }
}

impl ModuleLoader for FileModuleLoader {
    fn load(&self, name: &str) -> Result<String, String> {
        let path = self.resolve(name);
        std::fs::read_to_string(&path).map_err(|e| format!("{}: {}", path.display(), e))
    }
}
