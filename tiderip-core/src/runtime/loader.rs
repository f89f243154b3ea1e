//! 模块源码加载
//!
//! core 不读文件；`System.importModule` 通过这里拿到源码。

use std::collections::HashMap;

/// 按模块名提供源码
pub trait ModuleLoader {
    fn load(&self, name: &str) -> Result<String, String>;
}

/// 默认加载器：任何 import 都失败
#[derive(Debug, Default, Clone, Copy)]
pub struct NoModuleLoader;

impl ModuleLoader for NoModuleLoader {
    fn load(&self, name: &str) -> Result<String, String> {
        Err(format!("no module loader configured for '{}'", name))
    }
}

/// 内存中的模块表，嵌入方与测试使用
#[derive(Debug, Default, Clone)]
pub struct MemoryModuleLoader {
    sources: HashMap<String, String>,
}

impl MemoryModuleLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_module(mut self, name: impl Into<String>, source: impl Into<String>) -> Self {
        self.insert(name, source);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, source: impl Into<String>) {
        self.sources.insert(name.into(), source.into());
    }
}

impl ModuleLoader for MemoryModuleLoader {
    fn load(&self, name: &str) -> Result<String, String> {
        self.sources
            .get(name)
            .cloned()
            .ok_or_else(|| format!("module '{}' not found", name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_loader() {
        let loader = MemoryModuleLoader::new().with_module("util", "var x = 1");
        assert_eq!(loader.load("util").unwrap(), "var x = 1");
        assert!(loader.load("other").is_err());
        assert!(NoModuleLoader.load("util").is_err());
    }
}
