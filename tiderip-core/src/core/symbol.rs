//! 符号表：名字 <-> 稠密索引

use std::collections::HashMap;

#[derive(Debug, Default, Clone)]
pub struct SymbolTable {
    names: Vec<String>,
    index: HashMap<String, usize>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// 追加名字（调用方保证不重复）
    pub fn add(&mut self, name: &str) -> usize {
        let id = self.names.len();
        self.names.push(name.to_string());
        self.index.insert(name.to_string(), id);
        id
    }

    /// 查找，不存在时追加
    pub fn ensure(&mut self, name: &str) -> usize {
        match self.find(name) {
            Some(id) => id,
            None => self.add(name),
        }
    }

    pub fn find(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    pub fn get(&self, id: usize) -> Option<&str> {
        self.names.get(id).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn truncate(&mut self, len: usize) {
        for name in self.names.drain(len.min(self.names.len())..) {
            self.index.remove(&name);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ensure_is_idempotent() {
        let mut table = SymbolTable::new();
        let a = table.ensure("toString");
        let b = table.ensure("+(_)");
        assert_eq!(table.ensure("toString"), a);
        assert_ne!(a, b);
        assert_eq!(table.get(b), Some("+(_)"));
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_truncate_forgets_names() {
        let mut table = SymbolTable::new();
        table.add("a");
        table.add("b");
        table.truncate(1);
        assert_eq!(table.find("b"), None);
        assert_eq!(table.find("a"), Some(0));
        assert_eq!(table.ensure("c"), 1);
    }
}
