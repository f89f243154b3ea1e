//! Map 的原生方法
//!
//! 迭代器是条目数组中的位置，删除留下的空洞在迭代时跳过。

use super::{bind, bind_static, ret, validate_int};
use crate::core::{MapKey, Obj, ObjClass, ObjMap, PrimResult, Value, Vm};
use std::rc::Rc;

pub fn register(vm: &mut Vm, map: &ObjClass) {
    bind_static(vm, map, "new()", map_new);

    bind(vm, map, "[_]", map_subscript);
    bind(vm, map, "[_]=(_)", map_subscript_setter);
    bind(vm, map, "addCore_(_,_)", map_add_core);
    bind(vm, map, "clear()", map_clear);
    bind(vm, map, "containsKey(_)", map_contains_key);
    bind(vm, map, "count", map_count);
    bind(vm, map, "remove(_)", map_remove);
    bind(vm, map, "iterate_(_)", map_iterate);
    bind(vm, map, "keyIteratorValue_(_)", map_key_iterator_value);
    bind(vm, map, "valueIteratorValue_(_)", map_value_iterator_value);
}

fn receiver(args: &[Value]) -> Rc<ObjMap> {
    args[0].as_map().cloned().unwrap_or_default()
}

fn validate_key(value: &Value) -> Result<MapKey, String> {
    MapKey::from_value(value).ok_or_else(|| "key must be a value type".to_string())
}

fn map_new(_vm: &mut Vm, args: &mut [Value]) -> PrimResult {
    ret(args, Value::Obj(Obj::Map(Rc::new(ObjMap::new()))))
}

/// 键不存在时返回 null
fn map_subscript(_vm: &mut Vm, args: &mut [Value]) -> PrimResult {
    let key = try_prim!(validate_key(&args[1]));
    let value = receiver(args).get(&key).unwrap_or(Value::Null);
    ret(args, value)
}

fn map_subscript_setter(_vm: &mut Vm, args: &mut [Value]) -> PrimResult {
    let key = try_prim!(validate_key(&args[1]));
    let value = args[2].clone();
    receiver(args).set(key, args[1].clone(), value.clone());
    ret(args, value)
}

/// map 字面量用，返回 map 本身
fn map_add_core(_vm: &mut Vm, args: &mut [Value]) -> PrimResult {
    let key = try_prim!(validate_key(&args[1]));
    receiver(args).set(key, args[1].clone(), args[2].clone());
    PrimResult::Continue
}

fn map_clear(_vm: &mut Vm, args: &mut [Value]) -> PrimResult {
    receiver(args).clear();
    ret(args, Value::Null)
}

fn map_contains_key(_vm: &mut Vm, args: &mut [Value]) -> PrimResult {
    let key = try_prim!(validate_key(&args[1]));
    let found = receiver(args).contains(&key);
    ret(args, Value::Bool(found))
}

fn map_count(_vm: &mut Vm, args: &mut [Value]) -> PrimResult {
    let count = receiver(args).len();
    ret(args, Value::Num(count as f64))
}

/// 返回被删除的值，键不存在时返回 null
fn map_remove(_vm: &mut Vm, args: &mut [Value]) -> PrimResult {
    let key = try_prim!(validate_key(&args[1]));
    let removed = receiver(args).remove(&key).unwrap_or(Value::Null);
    ret(args, removed)
}

fn map_iterate(_vm: &mut Vm, args: &mut [Value]) -> PrimResult {
    let map = receiver(args);
    let from = if args[1].is_null() {
        0
    } else {
        let iter = try_prim!(validate_int(&args[1], "iterator"));
        if iter < 0.0 {
            return ret(args, Value::Bool(false));
        }
        iter as usize + 1
    };
    let value = map
        .next_entry(from)
        .map(|slot| Value::Num(slot as f64))
        .unwrap_or(Value::Bool(false));
    ret(args, value)
}

fn entry(args: &[Value]) -> Result<(Value, Value), String> {
    let slot = validate_int(&args[1], "iterator")?;
    if slot < 0.0 {
        return Err("iterator out of bounds".to_string());
    }
    receiver(args)
        .entry(slot as usize)
        .ok_or_else(|| "iterator out of bounds".to_string())
}

fn map_key_iterator_value(_vm: &mut Vm, args: &mut [Value]) -> PrimResult {
    let (key, _) = try_prim!(entry(args));
    ret(args, key)
}

fn map_value_iterator_value(_vm: &mut Vm, args: &mut [Value]) -> PrimResult {
    let (_, value) = try_prim!(entry(args));
    ret(args, value)
}
