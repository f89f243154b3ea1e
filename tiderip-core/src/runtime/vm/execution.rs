//! run() 主执行循环
//!
//! 外层循环负责协程切换，`run_thread` 在单个协程里解释指令直到需要切换。

use super::call::{
    bind_method, capture_upvalue, close_upvalues, create_class, read_upvalue, write_upvalue,
};
use crate::core::opcode::read_u16;
use crate::core::{
    CallFrame, Method, Obj, ObjClosure, ObjInstance, ObjThread, OpCode, PrimResult,
    RuntimeError, ThreadStatus, TraceFrame, Value, Vm,
};
use std::rc::Rc;
use tiderip_log::{debug, warn};
#[cfg(feature = "trace_execution")]
use tiderip_log::trace;

/// 单个协程停下来的原因
enum Step {
    /// 切换到另一个协程
    Switch(Rc<ObjThread>),
    /// 挂起整个虚拟机
    Suspend,
    /// 协程的入口函数返回
    Finished(Value),
    /// 协程出错
    Error(Value),
}

/// 从 `thread` 开始执行，直到没有可运行的协程
///
/// 非顶层协程出错时只中止它自己，调用者拿到 null 继续执行；
/// 没有调用者的协程出错才成为运行时错误返回。
pub fn run(vm: &mut Vm, thread: Rc<ObjThread>) -> Result<(), RuntimeError> {
    let mut thread = thread;
    loop {
        vm.current = Some(thread.clone());
        match run_thread(vm, &thread) {
            Step::Switch(next) => {
                debug!(vm.logger, "switch to thread {:p}", Rc::as_ptr(&next));
                thread = next;
            }
            Step::Suspend => {
                debug!(vm.logger, "vm suspended");
                vm.current = None;
                return Ok(());
            }
            Step::Finished(value) => {
                let caller = {
                    let mut state = thread.state.borrow_mut();
                    state.status = ThreadStatus::Finished;
                    state.caller.take()
                };
                match caller {
                    Some(caller) => {
                        set_result(&caller, value);
                        thread = caller;
                    }
                    None => {
                        vm.current = None;
                        return Ok(());
                    }
                }
            }
            Step::Error(err) => {
                let caller = {
                    let mut state = thread.state.borrow_mut();
                    state.error = err.clone();
                    state.status = ThreadStatus::Aborted;
                    state.caller.take()
                };
                warn!(vm.logger, "thread aborted: {}", err);
                match caller {
                    Some(caller) => {
                        set_result(&caller, Value::Null);
                        thread = caller;
                    }
                    None => {
                        vm.current = None;
                        return Err(runtime_error(&thread, &err));
                    }
                }
            }
        }
    }
}

/// 调用者栈顶是它发起切换时留下的结果槽
fn set_result(caller: &ObjThread, value: Value) {
    if let Some(slot) = caller.state.borrow_mut().stack.last_mut() {
        *slot = value;
    }
}

fn runtime_error(thread: &ObjThread, err: &Value) -> RuntimeError {
    let state = thread.state.borrow();
    let trace: Vec<TraceFrame> = state
        .frames
        .iter()
        .rev()
        .map(|frame| TraceFrame {
            function: frame.closure.func.name.clone(),
            module: frame.closure.func.module_name(),
            line: frame.closure.func.line_at(frame.ip.saturating_sub(1)),
        })
        .collect();
    let (module, line) = trace
        .first()
        .map(|frame| (frame.module.clone(), frame.line))
        .unwrap_or_default();
    RuntimeError {
        message: err.to_string(),
        module,
        line,
        trace,
    }
}

/// 执行字节码的主循环
fn run_thread(vm: &mut Vm, thread: &Rc<ObjThread>) -> Step {
    let mut st = thread.state.borrow_mut();
    let Some(frame) = st.frames.last().cloned() else {
        return Step::Finished(Value::Null);
    };
    let mut closure = frame.closure;
    let mut ip = frame.ip;
    let mut base = frame.stack_start;
    let mut func = closure.func.clone();
    let mut module = func.module.upgrade();

    macro_rules! save_ip {
        () => {
            if let Some(frame) = st.frames.last_mut() {
                frame.ip = ip;
            }
        };
    }
    macro_rules! throw {
        ($($arg:tt)*) => {{
            save_ip!();
            return Step::Error(Value::string(format!($($arg)*)));
        }};
    }
    macro_rules! load_frame {
        () => {
            match st.frames.last() {
                Some(frame) => {
                    closure = frame.closure.clone();
                    ip = frame.ip;
                    base = frame.stack_start;
                    func = closure.func.clone();
                    module = func.module.upgrade();
                }
                None => return Step::Finished(Value::Null),
            }
        };
    }
    macro_rules! read_u8 {
        () => {{
            let byte = func.code.get(ip).copied().unwrap_or(OpCode::End as u8);
            ip += 1;
            byte as usize
        }};
    }
    macro_rules! read_u16 {
        () => {{
            let value = read_u16(&func.code, ip) as usize;
            ip += 2;
            value
        }};
    }
    macro_rules! pop {
        () => {
            st.stack.pop().unwrap_or_default()
        };
    }
    macro_rules! peek {
        () => {
            st.stack.last().cloned().unwrap_or_default()
        };
    }
    macro_rules! call_closure {
        ($target:expr, $start:expr) => {{
            let target: Rc<ObjClosure> = $target;
            if st.frames.len() >= vm.config.max_frames {
                throw!("stack overflow: more than {} frames", vm.config.max_frames);
            }
            if $start + target.func.max_stack_slots > vm.config.max_stack_size {
                throw!("stack overflow: more than {} slots", vm.config.max_stack_size);
            }
            save_ip!();
            st.frames.push(CallFrame {
                closure: target,
                ip: 0,
                stack_start: $start,
            });
            load_frame!();
        }};
    }

    loop {
        let byte = read_u8!() as u8;
        let Some(op) = OpCode::from_u8(byte) else {
            throw!("invalid opcode {}", byte);
        };

        #[cfg(feature = "trace_execution")]
        trace!(vm.logger, "{:>5} {:<16} {:?}", ip - 1, op.name(), st.stack);

        if let Some(arg_num) = op.call_arg_num() {
            let symbol = read_u16!();
            let Some(args_start) = st.stack.len().checked_sub(arg_num + 1) else {
                throw!("stack underflow");
            };
            let class = if op.is_super() {
                let index = read_u16!();
                match func.constant(index).and_then(|v| v.as_class().cloned()) {
                    Some(class) => class,
                    None => throw!("'super' used outside of a bound method"),
                }
            } else {
                vm.class_of(&st.stack[args_start])
            };

            match class.method(symbol) {
                Method::None => {
                    throw!(
                        "{} does not implement '{}'",
                        class.name,
                        vm.method_name(symbol)
                    );
                }
                Method::Primitive(primitive) => {
                    let mut args = st.stack.split_off(args_start);
                    save_ip!();
                    drop(st);
                    let result = primitive(vm, &mut args);
                    st = thread.state.borrow_mut();
                    let ret = args.into_iter().next().unwrap_or_default();
                    match result {
                        PrimResult::Continue => st.stack.push(ret),
                        PrimResult::Switch(next) => {
                            st.stack.push(ret);
                            return match next {
                                Some(next) => Step::Switch(next),
                                None => Step::Suspend,
                            };
                        }
                        PrimResult::Error(err) => return Step::Error(err),
                    }
                }
                Method::Script(target) => call_closure!(target, args_start),
                Method::FnCall => {
                    let Some(target) = st.stack[args_start].as_closure().cloned() else {
                        throw!("receiver is not a function");
                    };
                    let expected = target.func.arg_num;
                    if arg_num < expected {
                        throw!(
                            "function '{}' expects {} arguments, got {}",
                            target.func.name,
                            expected,
                            arg_num
                        );
                    }
                    // 多余的实参丢弃
                    st.stack.truncate(args_start + 1 + expected);
                    call_closure!(target, args_start);
                }
            }
            continue;
        }

        match op {
            OpCode::LoadConstant => {
                let index = read_u16!();
                let value = func.constant(index).unwrap_or(Value::Null);
                st.stack.push(value);
            }
            OpCode::PushNull => st.stack.push(Value::Null),
            OpCode::PushFalse => st.stack.push(Value::Bool(false)),
            OpCode::PushTrue => st.stack.push(Value::Bool(true)),
            OpCode::LoadLocalVar => {
                let slot = base + read_u8!();
                let value = st.stack.get(slot).cloned().unwrap_or_default();
                st.stack.push(value);
            }
            OpCode::StoreLocalVar => {
                let slot = base + read_u8!();
                let value = peek!();
                if let Some(target) = st.stack.get_mut(slot) {
                    *target = value;
                }
            }
            OpCode::LoadUpvalue => {
                let index = read_u8!();
                let Some(upvalue) = closure.upvalues.get(index).cloned() else {
                    throw!("upvalue {} out of range", index);
                };
                let value = read_upvalue(&st, thread, &upvalue);
                st.stack.push(value);
            }
            OpCode::StoreUpvalue => {
                let index = read_u8!();
                let Some(upvalue) = closure.upvalues.get(index).cloned() else {
                    throw!("upvalue {} out of range", index);
                };
                let value = peek!();
                write_upvalue(&mut st, thread, &upvalue, value);
            }
            OpCode::LoadModuleVar => {
                let index = read_u16!();
                let value = module
                    .as_ref()
                    .and_then(|m| m.var(index))
                    .unwrap_or_default();
                st.stack.push(value);
            }
            OpCode::StoreModuleVar => {
                let index = read_u16!();
                let value = peek!();
                if let Some(m) = &module {
                    m.set_var(index, value);
                }
            }
            OpCode::LoadThisField => {
                let index = read_u8!();
                let Some(instance) = st.stack.get(base).and_then(|v| v.as_instance()).cloned()
                else {
                    throw!("only instances have fields");
                };
                let Some(value) = instance.field(index) else {
                    throw!("field {} out of range", index);
                };
                st.stack.push(value);
            }
            OpCode::StoreThisField => {
                let index = read_u8!();
                let Some(instance) = st.stack.get(base).and_then(|v| v.as_instance()).cloned()
                else {
                    throw!("only instances have fields");
                };
                if !instance.set_field(index, peek!()) {
                    throw!("field {} out of range", index);
                }
            }
            OpCode::LoadField => {
                let index = read_u8!();
                let object = pop!();
                let Some(instance) = object.as_instance() else {
                    throw!("only instances have fields");
                };
                let Some(value) = instance.field(index) else {
                    throw!("field {} out of range", index);
                };
                st.stack.push(value);
            }
            OpCode::StoreField => {
                let index = read_u8!();
                let object = pop!();
                let Some(instance) = object.as_instance() else {
                    throw!("only instances have fields");
                };
                if !instance.set_field(index, peek!()) {
                    throw!("field {} out of range", index);
                }
            }
            OpCode::Pop => {
                pop!();
            }
            OpCode::Jump => {
                let offset = read_u16!();
                ip += offset;
            }
            OpCode::Loop => {
                let offset = read_u16!();
                ip = ip.saturating_sub(offset);
            }
            OpCode::JumpIfFalse => {
                let offset = read_u16!();
                if pop!().is_falsy() {
                    ip += offset;
                }
            }
            OpCode::And => {
                let offset = read_u16!();
                if peek!().is_falsy() {
                    ip += offset;
                } else {
                    pop!();
                }
            }
            OpCode::Or => {
                let offset = read_u16!();
                if peek!().is_truthy() {
                    ip += offset;
                } else {
                    pop!();
                }
            }
            OpCode::CloseUpvalue => {
                let top = st.stack.len().saturating_sub(1);
                close_upvalues(&mut st, top);
                pop!();
            }
            OpCode::Return => {
                let result = pop!();
                close_upvalues(&mut st, base);
                st.frames.pop();
                if st.frames.is_empty() {
                    st.stack.clear();
                    return Step::Finished(result);
                }
                st.stack.truncate(base);
                st.stack.push(result);
                load_frame!();
            }
            OpCode::CreateClosure => {
                let index = read_u16!();
                let Some(proto) = func.constant(index).and_then(|v| v.as_fn().cloned()) else {
                    throw!("constant {} is not a function", index);
                };
                let mut upvalues = Vec::with_capacity(proto.upvalue_num);
                for _ in 0..proto.upvalue_num {
                    let is_enclosing_local = read_u8!() == 1;
                    let index = read_u8!();
                    if is_enclosing_local {
                        upvalues.push(capture_upvalue(&mut st, thread, base + index));
                    } else {
                        match closure.upvalues.get(index) {
                            Some(upvalue) => upvalues.push(upvalue.clone()),
                            None => throw!("upvalue {} out of range", index),
                        }
                    }
                }
                let created = Rc::new(ObjClosure::new(proto, upvalues));
                st.stack.push(Value::closure(created));
            }
            OpCode::Construct => {
                let Some(class) = st.stack.get(base).and_then(|v| v.as_class()).cloned() else {
                    throw!("'this' should be a class");
                };
                st.stack[base] = Value::Obj(Obj::Instance(Rc::new(ObjInstance::new(class))));
            }
            OpCode::CreateClass => {
                let field_num = read_u8!();
                let superclass = pop!();
                let name = peek!();
                match create_class(vm, &name, &superclass, field_num) {
                    Ok(class) => {
                        if let Some(top) = st.stack.last_mut() {
                            *top = Value::class(class);
                        }
                    }
                    Err(msg) => throw!("{}", msg),
                }
            }
            OpCode::InstanceMethod | OpCode::StaticMethod => {
                let symbol = read_u16!();
                let class = pop!();
                let method = pop!();
                let (Some(class), Some(method)) = (class.as_class(), method.as_closure()) else {
                    throw!("method must be bound to a class");
                };
                let is_static = op == OpCode::StaticMethod;
                if let Err(msg) = bind_method(class, symbol, method.clone(), is_static) {
                    throw!("{}", msg);
                }
            }
            OpCode::End => throw!("reached end of '{}' without return", func.name),
            _ => throw!("unexpected opcode {}", op.name()),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::core::InterpretResult;
    use crate::runtime::{SharedBuffer, Vm};

    fn output(source: &str) -> String {
        let mut vm = Vm::new();
        let out = SharedBuffer::new();
        vm.set_output(out.clone());
        let result = vm.execute_module("main", source);
        assert!(result.is_success(), "{:?}", result);
        out.contents()
    }

    #[test]
    fn test_closure_counter() {
        let out = output(
            "fun counter() {\n\
               var n = 0\n\
               return Fn.new { n = n + 1 }\n\
             }\n\
             var c = counter()\n\
             c.call()\n\
             System.print(c.call())\n",
        );
        assert_eq!(out, "2\n");
    }

    #[test]
    fn test_loop_captures_fresh_variable() {
        let out = output(
            "var fns = []\n\
             for i (1..3) {\n\
               fns.add(Fn.new { i })\n\
             }\n\
             for f (fns) System.write(f.call())\n",
        );
        assert_eq!(out, "123");
    }

    #[test]
    fn test_break_and_continue() {
        let out = output(
            "var i = 0\n\
             while (true) {\n\
               i = i + 1\n\
               if (i == 2) continue\n\
               if (i > 4) break\n\
               System.write(i)\n\
             }\n",
        );
        assert_eq!(out, "134");
    }

    #[test]
    fn test_super_call() {
        let out = output(
            "class A {\n\
               name { return \"A\" }\n\
             }\n\
             class B < A {\n\
               new() {}\n\
               name { return \"B\" + super.name }\n\
             }\n\
             System.print(B.new().name)\n",
        );
        assert_eq!(out, "BA\n");
    }

    #[test]
    fn test_fn_call_drops_extra_args() {
        let out = output("var f = Fn.new { |a| a }\nSystem.print(f.call(1, 2))\n");
        assert_eq!(out, "1\n");
    }

    #[test]
    fn test_fn_call_missing_args_is_error() {
        let mut vm = Vm::new();
        vm.set_output(SharedBuffer::new());
        match vm.execute_module("main", "var f = Fn.new { |a, b| a }\nf.call(1)\n") {
            InterpretResult::RuntimeError(err) => assert!(err.message.contains("expects 2")),
            other => panic!("expected runtime error, got {:?}", other),
        }
    }

    #[test]
    fn test_deep_recursion_overflows() {
        let mut vm = Vm::new();
        vm.set_output(SharedBuffer::new());
        match vm.execute_module("main", "fun f(n) { return f(n + 1) }\nf(0)\n") {
            InterpretResult::RuntimeError(err) => assert!(err.message.contains("stack overflow")),
            other => panic!("expected runtime error, got {:?}", other),
        }
    }
}
