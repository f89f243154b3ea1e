//! Map 对象
//!
//! 条目按插入顺序存放（删除留下空洞），另有 键 -> 位置 的索引。
//! 只有值类型可以作为键：null、bool、num、string、range、class。

use super::class::ObjClass;
use super::object::ObjString;
use super::value::{Obj, Value};
use std::cell::RefCell;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

#[derive(Clone, Debug)]
pub enum MapKey {
    Null,
    Bool(bool),
    /// 数字的位模式，`-0` 归一到 `0`
    Num(u64),
    Str(Rc<ObjString>),
    Range(u64, u64),
    Class(Rc<ObjClass>),
}

fn num_bits(n: f64) -> u64 {
    if n == 0.0 {
        0f64.to_bits()
    } else {
        n.to_bits()
    }
}

impl MapKey {
    /// 非值类型返回 None
    pub fn from_value(value: &Value) -> Option<MapKey> {
        match value {
            Value::Null => Some(MapKey::Null),
            Value::Bool(b) => Some(MapKey::Bool(*b)),
            Value::Num(n) => Some(MapKey::Num(num_bits(*n))),
            Value::Obj(Obj::String(s)) => Some(MapKey::Str(s.clone())),
            Value::Obj(Obj::Range(r)) => Some(MapKey::Range(num_bits(r.from), num_bits(r.to))),
            Value::Obj(Obj::Class(c)) => Some(MapKey::Class(c.clone())),
            _ => None,
        }
    }
}

impl PartialEq for MapKey {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (MapKey::Null, MapKey::Null) => true,
            (MapKey::Bool(a), MapKey::Bool(b)) => a == b,
            (MapKey::Num(a), MapKey::Num(b)) => a == b,
            (MapKey::Str(a), MapKey::Str(b)) => a.as_str() == b.as_str(),
            (MapKey::Range(a1, a2), MapKey::Range(b1, b2)) => a1 == b1 && a2 == b2,
            (MapKey::Class(a), MapKey::Class(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl Eq for MapKey {}

impl Hash for MapKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            MapKey::Null => {}
            MapKey::Bool(b) => b.hash(state),
            MapKey::Num(bits) => bits.hash(state),
            MapKey::Str(s) => s.hash_code().hash(state),
            MapKey::Range(from, to) => {
                from.hash(state);
                to.hash(state);
            }
            MapKey::Class(c) => (Rc::as_ptr(c) as usize).hash(state),
        }
    }
}

#[derive(Debug, Default)]
struct MapInner {
    entries: Vec<Option<(Value, Value)>>,
    index: HashMap<MapKey, usize>,
}

#[derive(Debug, Default)]
pub struct ObjMap {
    inner: RefCell<MapInner>,
}

impl ObjMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.inner.borrow().index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, key: &MapKey) -> Option<Value> {
        let inner = self.inner.borrow();
        let slot = *inner.index.get(key)?;
        inner.entries[slot].as_ref().map(|(_, v)| v.clone())
    }

    pub fn contains(&self, key: &MapKey) -> bool {
        self.inner.borrow().index.contains_key(key)
    }

    /// 插入或覆盖；`key_value` 是键的原始值
    pub fn set(&self, key: MapKey, key_value: Value, value: Value) {
        let mut inner = self.inner.borrow_mut();
        if let Some(&slot) = inner.index.get(&key) {
            inner.entries[slot] = Some((key_value, value));
        } else {
            let slot = inner.entries.len();
            inner.entries.push(Some((key_value, value)));
            inner.index.insert(key, slot);
        }
    }

    /// 删除并返回旧值
    pub fn remove(&self, key: &MapKey) -> Option<Value> {
        let mut inner = self.inner.borrow_mut();
        let slot = inner.index.remove(key)?;
        let removed = inner.entries[slot].take().map(|(_, v)| v);
        if inner.index.is_empty() {
            inner.entries.clear();
        }
        removed
    }

    pub fn clear(&self) {
        let mut inner = self.inner.borrow_mut();
        inner.entries.clear();
        inner.index.clear();
    }

    /// 从 `from` 开始（含）的第一个有效条目位置
    pub fn next_entry(&self, from: usize) -> Option<usize> {
        let inner = self.inner.borrow();
        (from..inner.entries.len()).find(|&i| inner.entries[i].is_some())
    }

    pub fn entry(&self, slot: usize) -> Option<(Value, Value)> {
        self.inner.borrow().entries.get(slot).cloned().flatten()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(value: &Value) -> MapKey {
        MapKey::from_value(value).unwrap()
    }

    #[test]
    fn test_value_type_keys_only() {
        assert!(MapKey::from_value(&Value::string("a")).is_some());
        assert!(MapKey::from_value(&Value::range(1.0, 2.0)).is_some());
        assert!(MapKey::from_value(&Value::list(vec![])).is_none());
    }

    #[test]
    fn test_string_keys_by_content() {
        let map = ObjMap::new();
        map.set(key(&Value::string("k")), Value::string("k"), Value::Num(1.0));
        assert_eq!(map.get(&key(&Value::string("k"))), Some(Value::Num(1.0)));
        map.set(key(&Value::string("k")), Value::string("k"), Value::Num(2.0));
        assert_eq!(map.len(), 1);
        assert_eq!(map.get(&key(&Value::string("k"))), Some(Value::Num(2.0)));
    }

    #[test]
    fn test_negative_zero_key() {
        let map = ObjMap::new();
        map.set(key(&Value::Num(0.0)), Value::Num(0.0), Value::Bool(true));
        assert!(map.contains(&key(&Value::Num(-0.0))));
    }

    #[test]
    fn test_iteration_skips_removed() {
        let map = ObjMap::new();
        for i in 0..3 {
            let k = Value::Num(i as f64);
            map.set(key(&k), k, Value::Null);
        }
        assert_eq!(map.remove(&key(&Value::Num(1.0))), Some(Value::Null));
        assert_eq!(map.next_entry(0), Some(0));
        assert_eq!(map.next_entry(1), Some(2));
        assert_eq!(map.next_entry(3), None);
        assert_eq!(map.entry(2).map(|(k, _)| k), Some(Value::Num(2.0)));
    }
}
