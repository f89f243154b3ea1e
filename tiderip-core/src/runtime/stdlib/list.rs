//! List 的原生方法

use super::{bind, bind_static, range_slice, ret, validate_index, validate_int};
use crate::core::{ObjClass, ObjList, PrimResult, Value, Vm};
use std::rc::Rc;

pub fn register(vm: &mut Vm, list: &ObjClass) {
    bind_static(vm, list, "new()", list_new);

    bind(vm, list, "[_]", list_subscript);
    bind(vm, list, "[_]=(_)", list_subscript_setter);
    bind(vm, list, "add(_)", list_add);
    bind(vm, list, "addCore_(_)", list_add_core);
    bind(vm, list, "clear()", list_clear);
    bind(vm, list, "count", list_count);
    bind(vm, list, "insert(_,_)", list_insert);
    bind(vm, list, "iterate(_)", list_iterate);
    bind(vm, list, "iteratorValue(_)", list_iterator_value);
    bind(vm, list, "removeAt(_)", list_remove_at);
}

fn receiver(args: &[Value]) -> Rc<ObjList> {
    args[0]
        .as_list()
        .cloned()
        .unwrap_or_else(|| Rc::new(ObjList::new(Vec::new())))
}

fn list_new(_vm: &mut Vm, args: &mut [Value]) -> PrimResult {
    ret(args, Value::list(Vec::new()))
}

fn list_subscript(_vm: &mut Vm, args: &mut [Value]) -> PrimResult {
    let list = receiver(args);
    let elements = list.elements.borrow();
    if let Some((start, count, ascending)) = try_prim!(range_slice(&args[1], elements.len())) {
        let slice: Vec<Value> = if ascending {
            elements[start..start + count].to_vec()
        } else {
            elements[start + 1 - count..=start].iter().rev().cloned().collect()
        };
        drop(elements);
        return ret(args, Value::list(slice));
    }
    let index = try_prim!(validate_index(&args[1], elements.len(), "index"));
    let value = elements[index].clone();
    drop(elements);
    ret(args, value)
}

fn list_subscript_setter(_vm: &mut Vm, args: &mut [Value]) -> PrimResult {
    let list = receiver(args);
    let index = try_prim!(validate_index(&args[1], list.len(), "index"));
    let value = args[2].clone();
    list.elements.borrow_mut()[index] = value.clone();
    ret(args, value)
}

/// 返回被添加的元素
fn list_add(_vm: &mut Vm, args: &mut [Value]) -> PrimResult {
    let value = args[1].clone();
    receiver(args).push(value.clone());
    ret(args, value)
}

/// 列表字面量用，返回列表本身以便链式调用
fn list_add_core(_vm: &mut Vm, args: &mut [Value]) -> PrimResult {
    let value = args[1].clone();
    receiver(args).push(value);
    PrimResult::Continue
}

fn list_clear(_vm: &mut Vm, args: &mut [Value]) -> PrimResult {
    receiver(args).elements.borrow_mut().clear();
    ret(args, Value::Null)
}

fn list_count(_vm: &mut Vm, args: &mut [Value]) -> PrimResult {
    let count = receiver(args).len();
    ret(args, Value::Num(count as f64))
}

/// 下标可以等于长度（追加），负数从末尾算起
fn list_insert(_vm: &mut Vm, args: &mut [Value]) -> PrimResult {
    let list = receiver(args);
    let count = list.len();
    let n = try_prim!(validate_int(&args[1], "index"));
    let index = if n < 0.0 { n + count as f64 + 1.0 } else { n };
    if index < 0.0 || index > count as f64 {
        return super::error("index out of bounds");
    }
    let value = args[2].clone();
    list.elements.borrow_mut().insert(index as usize, value.clone());
    ret(args, value)
}

fn list_iterate(_vm: &mut Vm, args: &mut [Value]) -> PrimResult {
    let count = receiver(args).len();
    if args[1].is_null() {
        let first = if count == 0 {
            Value::Bool(false)
        } else {
            Value::Num(0.0)
        };
        return ret(args, first);
    }
    let iter = try_prim!(validate_int(&args[1], "iterator"));
    let value = if iter < 0.0 || iter + 1.0 >= count as f64 {
        Value::Bool(false)
    } else {
        Value::Num(iter + 1.0)
    };
    ret(args, value)
}

fn list_iterator_value(_vm: &mut Vm, args: &mut [Value]) -> PrimResult {
    let list = receiver(args);
    let index = try_prim!(validate_index(&args[1], list.len(), "iterator"));
    let value = list.get(index).unwrap_or_default();
    ret(args, value)
}

fn list_remove_at(_vm: &mut Vm, args: &mut [Value]) -> PrimResult {
    let list = receiver(args);
    let index = try_prim!(validate_index(&args[1], list.len(), "index"));
    let removed = list.elements.borrow_mut().remove(index);
    ret(args, removed)
}
