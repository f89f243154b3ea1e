//! 文件系统测试的公共工具

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use tiderip_api::RunConfig;

static NEXT_DIR: AtomicUsize = AtomicUsize::new(0);

/// 测试结束时删除的临时目录
pub struct ScratchDir {
    path: PathBuf,
}

impl ScratchDir {
    pub fn new(tag: &str) -> Self {
        let path = std::env::temp_dir().join(format!(
            "tiderip-{}-{}-{}",
            tag,
            std::process::id(),
            NEXT_DIR.fetch_add(1, Ordering::SeqCst)
        ));
        std::fs::create_dir_all(&path).expect("create scratch dir");
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 写入 `name` 并返回完整路径
    pub fn write(&self, name: &str, source: &str) -> PathBuf {
        let file = self.path.join(name);
        std::fs::write(&file, source).expect("write script");
        file
    }
}

impl Drop for ScratchDir {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.path);
    }
}

pub fn captured() -> RunConfig {
    RunConfig {
        capture_output: true,
        ..RunConfig::default()
    }
}
