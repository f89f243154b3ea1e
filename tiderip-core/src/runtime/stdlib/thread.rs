//! Thread（协程）的原生方法
//!
//! 切换协程的原生方法返回 `PrimResult::Switch`，由执行循环完成切换。
//! 发起切换的协程栈顶留有结果槽：被调协程 yield 或结束时把值写进去。

use super::{bind, bind_static, error, ret};
use crate::core::{ObjClass, ObjClosure, ObjThread, PrimResult, ThreadStatus, Value, Vm};
use std::rc::Rc;
use tiderip_log::debug;

pub fn register(vm: &mut Vm, thread: &ObjClass) {
    bind_static(vm, thread, "new(_)", thread_new);
    bind_static(vm, thread, "abort(_)", thread_abort);
    bind_static(vm, thread, "current", thread_current);
    bind_static(vm, thread, "suspend()", thread_suspend);
    bind_static(vm, thread, "yield()", thread_yield);
    bind_static(vm, thread, "yield(_)", thread_yield_value);

    bind(vm, thread, "call()", thread_call);
    bind(vm, thread, "call(_)", thread_call_value);
    bind(vm, thread, "isDone", thread_is_done);
    bind(vm, thread, "error", thread_error);
}

fn thread_new(vm: &mut Vm, args: &mut [Value]) -> PrimResult {
    let Some(closure) = args[1].as_closure().cloned() else {
        return error("argument must be a function");
    };
    if closure.func.arg_num > 1 {
        return error("thread function can take at most one parameter");
    }
    let thread = ObjThread::new(closure, vm.config.initial_stack_size);
    ret(args, Value::thread(thread))
}

/// 以 `err` 中止当前协程；null 不做任何事
fn thread_abort(_vm: &mut Vm, args: &mut [Value]) -> PrimResult {
    if args[1].is_null() {
        return ret(args, Value::Null);
    }
    PrimResult::Error(args[1].clone())
}

fn thread_current(vm: &mut Vm, args: &mut [Value]) -> PrimResult {
    let current = vm.current.clone().map(Value::thread).unwrap_or(Value::Null);
    ret(args, current)
}

/// 挂起整个虚拟机，回到宿主
fn thread_suspend(_vm: &mut Vm, _args: &mut [Value]) -> PrimResult {
    PrimResult::Switch(None)
}

fn thread_yield(vm: &mut Vm, _args: &mut [Value]) -> PrimResult {
    yield_to_caller(vm, Value::Null)
}

fn thread_yield_value(vm: &mut Vm, args: &mut [Value]) -> PrimResult {
    yield_to_caller(vm, args[1].clone())
}

/// 把值交给调用者并切回去
fn yield_to_caller(vm: &mut Vm, value: Value) -> PrimResult {
    let Some(current) = vm.current.clone() else {
        return error("no thread is running");
    };
    let caller = {
        let mut state = current.state.borrow_mut();
        let caller = state.caller.take();
        if caller.is_some() {
            state.status = ThreadStatus::Yielded;
        }
        caller
    };
    let Some(caller) = caller else {
        return error("can't yield from a thread with no caller");
    };
    if let Some(slot) = caller.state.borrow_mut().stack.last_mut() {
        *slot = value;
    }
    debug!(vm.logger, "thread yielded to its caller");
    PrimResult::Switch(Some(caller))
}

fn thread_call(vm: &mut Vm, args: &mut [Value]) -> PrimResult {
    switch_to(vm, &args[0], Value::Null)
}

fn thread_call_value(vm: &mut Vm, args: &mut [Value]) -> PrimResult {
    switch_to(vm, &args[0], args[1].clone())
}

/// 运行目标协程，当前协程成为它的调用者
///
/// 首次运行时 `value` 是入口函数的参数；恢复时它成为 `yield` 的返回值。
fn switch_to(vm: &mut Vm, target: &Value, value: Value) -> PrimResult {
    let Some(target) = target.as_thread().cloned() else {
        return error("receiver must be a thread");
    };
    {
        let mut state = target.state.borrow_mut();
        match state.status {
            ThreadStatus::Finished => return error("can't switch to a finished thread"),
            ThreadStatus::Aborted => return error("can't switch to an aborted thread"),
            ThreadStatus::Running => return error("thread has been called"),
            ThreadStatus::Ready | ThreadStatus::Yielded => {}
        }
        if state.caller.is_some() {
            return error("thread has been called");
        }
        if state.frames.is_empty() {
            return error("can't switch to a finished thread");
        }

        let fresh = state.status == ThreadStatus::Ready;
        state.caller = vm.current.clone();
        state.status = ThreadStatus::Running;
        if fresh {
            if entry_arity(&state.frames[0].closure) == 1 {
                state.stack.push(value);
            }
        } else if let Some(slot) = state.stack.last_mut() {
            *slot = value;
        }
    }
    debug!(vm.logger, "switch to thread {:p}", Rc::as_ptr(&target));
    PrimResult::Switch(Some(target))
}

fn entry_arity(closure: &ObjClosure) -> usize {
    closure.func.arg_num
}

fn thread_is_done(_vm: &mut Vm, args: &mut [Value]) -> PrimResult {
    let done = args[0].as_thread().map(|t| t.is_done()).unwrap_or(true);
    ret(args, Value::Bool(done))
}

fn thread_error(_vm: &mut Vm, args: &mut [Value]) -> PrimResult {
    let err = args[0].as_thread().map(|t| t.error()).unwrap_or(Value::Null);
    ret(args, err)
}

#[cfg(test)]
mod tests {
    use crate::core::InterpretResult;
    use crate::runtime::{SharedBuffer, Vm};

    fn run(source: &str) -> (InterpretResult, String) {
        let mut vm = Vm::new();
        let out = SharedBuffer::new();
        vm.set_output(out.clone());
        let result = vm.execute_module("main", source);
        (result, out.contents())
    }

    fn output(source: &str) -> String {
        let (result, out) = run(source);
        assert!(result.is_success(), "{:?}", result);
        out
    }

    #[test]
    fn test_yield_and_resume() {
        let out = output(
            "var t = Thread.new {\n\
               System.print(\"a\")\n\
               var got = Thread.yield(1)\n\
               System.print(got)\n\
               return 3\n\
             }\n\
             System.print(t.call())\n\
             System.print(t.call(2))\n\
             System.print(t.isDone)\n",
        );
        assert_eq!(out, "a\n1\n2\n3\ntrue\n");
    }

    #[test]
    fn test_entry_parameter() {
        let out = output("var t = Thread.new { |x| x * 10 }\nSystem.print(t.call(4))\n");
        assert_eq!(out, "40\n");
    }

    #[test]
    fn test_call_finished_thread_is_error() {
        let (result, _) = run("var t = Thread.new { 1 }\nt.call()\nt.call()\n");
        match result {
            InterpretResult::RuntimeError(err) => {
                assert_eq!(err.message, "can't switch to a finished thread");
                assert_eq!(err.line, 3);
            }
            other => panic!("expected runtime error, got {:?}", other),
        }
    }

    #[test]
    fn test_abort_only_kills_callee() {
        let out = output(
            "var t = Thread.new {\n\
               Thread.abort(\"boom\")\n\
             }\n\
             System.print(t.call())\n\
             System.print(t.error)\n\
             System.print(t.isDone)\n",
        );
        assert_eq!(out, "null\nboom\ntrue\n");
    }

    #[test]
    fn test_yield_without_caller_is_error() {
        let (result, _) = run("Thread.yield(1)\n");
        match result {
            InterpretResult::RuntimeError(err) => {
                assert_eq!(err.message, "can't yield from a thread with no caller")
            }
            other => panic!("expected runtime error, got {:?}", other),
        }
    }

    #[test]
    fn test_generator_loop() {
        let out = output(
            "var gen = Thread.new {\n\
               for i (1..3) Thread.yield(i)\n\
             }\n\
             while (!gen.isDone) {\n\
               var v = gen.call()\n\
               if (v != null) System.write(v)\n\
             }\n",
        );
        assert_eq!(out, "123");
    }

    #[test]
    fn test_suspend_stops_vm() {
        let out = output("System.write(1)\nThread.suspend()\nSystem.write(2)\n");
        assert_eq!(out, "1");
    }
}
