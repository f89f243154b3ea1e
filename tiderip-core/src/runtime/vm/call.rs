//! upvalue 捕获与关闭、类的创建与方法绑定

use crate::core::opcode::read_u16;
use crate::core::{
    Method, Obj, ObjClass, ObjClosure, ObjFn, ObjThread, ObjUpvalue, OpCode, ThreadState,
    UpvalueState, Value, Vm,
};
use std::cell::RefCell;
use std::rc::{Rc, Weak};
use tiderip_log::debug;

/// 捕获当前协程的栈槽；同一槽位只会有一个打开的 upvalue
pub fn capture_upvalue(
    state: &mut ThreadState,
    thread: &Rc<ObjThread>,
    slot: usize,
) -> Rc<ObjUpvalue> {
    match state
        .open_upvalues
        .binary_search_by_key(&slot, |up| up.open_slot().unwrap_or(usize::MAX))
    {
        Ok(index) => state.open_upvalues[index].clone(),
        Err(index) => {
            let upvalue = Rc::new(ObjUpvalue::open(thread, slot));
            state.open_upvalues.insert(index, upvalue.clone());
            upvalue
        }
    }
}

/// 关闭所有指向 `from` 及以上栈槽的 upvalue
pub fn close_upvalues(state: &mut ThreadState, from: usize) {
    while let Some(upvalue) = state.open_upvalues.last() {
        match upvalue.open_slot() {
            Some(slot) if slot < from => break,
            Some(slot) => {
                let value = state.stack.get(slot).cloned().unwrap_or(Value::Null);
                upvalue.close(value);
            }
            None => {}
        }
        state.open_upvalues.pop();
    }
}

fn owned_by(owner: &Weak<ObjThread>, thread: &Rc<ObjThread>) -> bool {
    std::ptr::eq(owner.as_ptr(), Rc::as_ptr(thread))
}

/// 读 upvalue；打开的 upvalue 可能指向别的协程的栈
pub fn read_upvalue(state: &ThreadState, thread: &Rc<ObjThread>, upvalue: &ObjUpvalue) -> Value {
    match &*upvalue.state.borrow() {
        UpvalueState::Closed(value) => value.clone(),
        UpvalueState::Open { thread: owner, slot } => {
            if owned_by(owner, thread) {
                state.stack.get(*slot).cloned().unwrap_or(Value::Null)
            } else {
                owner
                    .upgrade()
                    .and_then(|t| t.state.borrow().stack.get(*slot).cloned())
                    .unwrap_or(Value::Null)
            }
        }
    }
}

pub fn write_upvalue(
    state: &mut ThreadState,
    thread: &Rc<ObjThread>,
    upvalue: &ObjUpvalue,
    value: Value,
) {
    let mut up = upvalue.state.borrow_mut();
    match &mut *up {
        UpvalueState::Closed(slot) => *slot = value,
        UpvalueState::Open { thread: owner, slot } => {
            if owned_by(owner, thread) {
                if let Some(target) = state.stack.get_mut(*slot) {
                    *target = value;
                }
            } else if let Some(other) = owner.upgrade() {
                if let Some(target) = other.state.borrow_mut().stack.get_mut(*slot) {
                    *target = value;
                }
            }
        }
    }
}

/// CREATE_CLASS：校验父类后创建类及其元类，字段数是本类字段数加上父类的字段数
pub fn create_class(
    vm: &Vm,
    name: &Value,
    superclass: &Value,
    own_field_num: usize,
) -> Result<Rc<ObjClass>, String> {
    let Some(name) = name.as_str() else {
        return Err("class name must be a string".to_string());
    };
    let Some(superclass) = superclass.as_class() else {
        return Err(format!("superclass of '{}' must be a class", name));
    };
    if vm.core.is_builtin(superclass) {
        return Err(format!(
            "class '{}' can't inherit builtin class '{}'",
            name, superclass.name
        ));
    }
    let field_num = own_field_num + superclass.field_num;
    let max = vm.config.limits.clamped().max_field_num;
    if field_num > max {
        return Err(format!("class '{}' has more than {} fields", name, max));
    }

    let class = ObjClass::new(name, Some(superclass.clone()), field_num);
    let meta = ObjClass::new(format!("{} metaclass", name), Some(vm.core.class.clone()), 0);
    class.set_meta(meta);
    debug!(
        vm.logger,
        "class '{}' < '{}' created with {} fields", name, superclass.name, field_num
    );
    Ok(class)
}

/// INSTANCE_METHOD / STATIC_METHOD：实例方法的字段下标移过父类的字段，
/// 再写入 super 调用的父类后放进方法表
pub fn bind_method(
    class: &Rc<ObjClass>,
    symbol: usize,
    closure: Rc<ObjClosure>,
    is_static: bool,
) -> Result<(), String> {
    let target = if is_static {
        class
            .meta()
            .ok_or_else(|| format!("class '{}' has no metaclass", class.name))?
    } else {
        class.clone()
    };
    let inherited = target.superclass.as_ref().map_or(0, |s| s.field_num);
    let closure = if is_static || inherited == 0 {
        closure
    } else {
        let func = shift_fields(&closure.func, inherited)?;
        Rc::new(ObjClosure::new(func, closure.upvalues.clone()))
    };
    let superclass = target
        .superclass
        .clone()
        .map(Value::class)
        .unwrap_or(Value::Null);
    patch_super(&closure.func, &superclass);
    target.set_method(symbol, Method::Script(closure));
    Ok(())
}

/// 复制一份字段操作数加上 `offset` 的函数，嵌套函数里的字段访问一并处理
fn shift_fields(func: &ObjFn, offset: usize) -> Result<Rc<ObjFn>, String> {
    let mut code = func.code.clone();
    let mut constants = func.constants.borrow().clone();
    let mut ip = 0;
    while ip < code.len() {
        let Some(op) = OpCode::from_u8(code[ip]) else {
            break;
        };
        match op {
            OpCode::LoadThisField
            | OpCode::StoreThisField
            | OpCode::LoadField
            | OpCode::StoreField => {
                if let Some(operand) = code.get_mut(ip + 1) {
                    let index = *operand as usize + offset;
                    *operand = u8::try_from(index)
                        .map_err(|_| format!("field {} of '{}' is out of range", index, func.name))?;
                }
            }
            OpCode::CreateClosure => {
                let index = read_u16(&code, ip + 1) as usize;
                if let Some(inner) = constants.get(index).and_then(|v| v.as_fn().cloned()) {
                    constants[index] = Value::Obj(Obj::Fn(shift_fields(&inner, offset)?));
                }
            }
            _ => {}
        }
        ip += 1 + op.operand_bytes(&code, ip + 1, &constants);
    }
    Ok(Rc::new(ObjFn {
        name: func.name.clone(),
        code,
        lines: func.lines.clone(),
        constants: RefCell::new(constants),
        arg_num: func.arg_num,
        upvalue_num: func.upvalue_num,
        max_stack_slots: func.max_stack_slots,
        module: func.module.clone(),
    }))
}

/// SUPERn 的第二个操作数是常量槽，绑定时才知道父类；嵌套函数里的 super 一并处理
fn patch_super(func: &ObjFn, superclass: &Value) {
    let mut nested = Vec::new();
    let code = &func.code;
    let mut ip = 0;
    while ip < code.len() {
        let Some(op) = OpCode::from_u8(code[ip]) else {
            break;
        };
        if op.is_super() {
            let index = read_u16(code, ip + 3) as usize;
            if let Some(slot) = func.constants.borrow_mut().get_mut(index) {
                *slot = superclass.clone();
            }
        } else if op == OpCode::CreateClosure {
            let index = read_u16(code, ip + 1) as usize;
            if let Some(inner) = func.constant(index).and_then(|v| v.as_fn().cloned()) {
                nested.push(inner);
            }
        }
        ip += 1 + op.operand_bytes(code, ip + 1, &func.constants.borrow());
    }
    for inner in nested {
        patch_super(&inner, superclass);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn function(code: Vec<u8>, constants: Vec<Value>) -> Rc<ObjFn> {
        let lines = vec![1; code.len()];
        Rc::new(ObjFn {
            name: "f".to_string(),
            code,
            lines,
            constants: RefCell::new(constants),
            arg_num: 0,
            upvalue_num: 0,
            max_stack_slots: 4,
            module: Weak::new(),
        })
    }

    fn thread() -> Rc<ObjThread> {
        let closure = Rc::new(ObjClosure::new(function(vec![], vec![]), vec![]));
        ObjThread::new(closure, 8)
    }

    #[test]
    fn test_upvalue_capture_and_close() {
        let thread = thread();
        let mut state = thread.state.borrow_mut();
        state.stack.push(Value::Num(1.0));
        state.stack.push(Value::Num(2.0));

        let a = capture_upvalue(&mut state, &thread, 1);
        let b = capture_upvalue(&mut state, &thread, 2);
        let again = capture_upvalue(&mut state, &thread, 1);
        assert!(Rc::ptr_eq(&a, &again));
        assert_eq!(state.open_upvalues.len(), 2);

        write_upvalue(&mut state, &thread, &b, Value::Num(20.0));
        assert_eq!(state.stack[2], Value::Num(20.0));

        close_upvalues(&mut state, 2);
        assert_eq!(state.open_upvalues.len(), 1);
        assert!(b.open_slot().is_none());
        state.stack[2] = Value::Null;
        assert_eq!(read_upvalue(&state, &thread, &b), Value::Num(20.0));
        assert_eq!(read_upvalue(&state, &thread, &a), Value::Num(1.0));
    }

    #[test]
    fn test_upvalue_of_other_thread() {
        let owner = thread();
        owner.state.borrow_mut().stack.push(Value::Num(5.0));
        let up = capture_upvalue(&mut owner.state.borrow_mut(), &owner, 1);

        let other = thread();
        let state = other.state.borrow();
        assert_eq!(read_upvalue(&state, &other, &up), Value::Num(5.0));
    }

    #[test]
    fn test_patch_super_recurses_into_closures() {
        let base = ObjClass::new("Base", None, 0);
        let inner = function(
            vec![OpCode::Super0 as u8, 0, 0, 0, 0, OpCode::Return as u8],
            vec![Value::Null],
        );
        let outer = function(
            vec![OpCode::CreateClosure as u8, 0, 0, OpCode::Return as u8],
            vec![Value::Obj(crate::core::Obj::Fn(inner.clone()))],
        );
        patch_super(&outer, &Value::class(base.clone()));
        let patched = inner.constant(0).unwrap();
        assert!(Rc::ptr_eq(patched.as_class().unwrap(), &base));
    }

    #[test]
    fn test_create_class_checks_superclass() {
        let vm = Vm::new();
        let err = create_class(&vm, &Value::string("A"), &Value::Num(1.0), 0).unwrap_err();
        assert!(err.contains("must be a class"));

        let err = create_class(&vm, &Value::string("A"), &Value::class(vm.core.list.clone()), 0)
            .unwrap_err();
        assert!(err.contains("can't inherit builtin class 'List'"));

        let class =
            create_class(&vm, &Value::string("A"), &Value::class(vm.core.object.clone()), 2)
                .unwrap();
        assert_eq!(class.field_num, 2);
        assert_eq!(class.meta().unwrap().name, "A metaclass");

        let sub = create_class(&vm, &Value::string("B"), &Value::class(class), 1).unwrap();
        assert_eq!(sub.field_num, 3);

        let err = create_class(&vm, &Value::string("C"), &Value::class(sub), 126).unwrap_err();
        assert!(err.contains("more than 128 fields"));
    }

    #[test]
    fn test_shift_fields_recurses_into_closures() {
        let inner = function(
            vec![OpCode::LoadField as u8, 1, OpCode::Return as u8],
            vec![],
        );
        let outer = function(
            vec![
                OpCode::LoadThisField as u8,
                0,
                OpCode::StoreThisField as u8,
                2,
                OpCode::CreateClosure as u8,
                0,
                0,
                OpCode::Return as u8,
            ],
            vec![Value::Obj(Obj::Fn(inner.clone()))],
        );
        let shifted = shift_fields(&outer, 3).unwrap();
        assert_eq!(shifted.code[1], 3);
        assert_eq!(shifted.code[3], 5);
        // 编译产物本身保持不变
        assert_eq!(outer.code[1], 0);
        assert_eq!(inner.code[1], 1);

        let nested = shifted.constant(0).unwrap();
        assert_eq!(nested.as_fn().unwrap().code[1], 4);
    }

    #[test]
    fn test_bind_instance_method_shifts_fields() {
        let base = ObjClass::new("Base", None, 2);
        let class = ObjClass::new("Sub", Some(base), 3);
        let getter = function(vec![OpCode::LoadThisField as u8, 0, OpCode::Return as u8], vec![]);
        let closure = Rc::new(ObjClosure::new(getter, vec![]));
        bind_method(&class, 0, closure, false).unwrap();
        let Method::Script(bound) = class.method(0) else {
            panic!("expected script method");
        };
        assert_eq!(bound.func.code[1], 2);
    }
}
