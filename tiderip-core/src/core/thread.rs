//! 协程（thread）对象
//!
//! 每个协程有自己的值栈与调用帧；同一时刻只有一个协程在运行。

use super::object::{ObjClosure, ObjUpvalue};
use super::value::Value;
use std::cell::RefCell;
use std::rc::Rc;

/// 协程状态机
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ThreadStatus {
    /// 已创建，还没运行过
    Ready,
    /// 正在运行，或处在当前运行链上等待被调者返回
    Running,
    /// 主动 yield，可被再次 call
    Yielded,
    /// 调用帧清空
    Finished,
    /// 出错或被 abort，不可恢复
    Aborted,
}

#[derive(Debug, Clone)]
pub struct CallFrame {
    pub closure: Rc<ObjClosure>,
    pub ip: usize,
    /// 本帧在值栈中的起点（槽 0 是接收者或闭包本身）
    pub stack_start: usize,
}

#[derive(Debug)]
pub struct ThreadState {
    pub stack: Vec<Value>,
    pub frames: Vec<CallFrame>,
    /// 仍指向本栈的 upvalue，按栈槽升序
    pub open_upvalues: Vec<Rc<ObjUpvalue>>,
    pub caller: Option<Rc<ObjThread>>,
    /// 非 null 表示已中止
    pub error: Value,
    pub status: ThreadStatus,
}

#[derive(Debug)]
pub struct ObjThread {
    pub state: RefCell<ThreadState>,
}

impl ObjThread {
    /// 以闭包为入口创建协程，闭包本身放在栈槽 0
    pub fn new(closure: Rc<ObjClosure>, stack_capacity: usize) -> Rc<Self> {
        let mut stack = Vec::with_capacity(stack_capacity.max(1));
        stack.push(Value::closure(closure.clone()));
        Rc::new(ObjThread {
            state: RefCell::new(ThreadState {
                stack,
                frames: vec![CallFrame {
                    closure,
                    ip: 0,
                    stack_start: 0,
                }],
                open_upvalues: Vec::new(),
                caller: None,
                error: Value::Null,
                status: ThreadStatus::Ready,
            }),
        })
    }

    pub fn status(&self) -> ThreadStatus {
        self.state.borrow().status
    }

    /// 调用帧已空或已出错
    pub fn is_done(&self) -> bool {
        let state = self.state.borrow();
        state.frames.is_empty() || !state.error.is_null()
    }

    pub fn error(&self) -> Value {
        self.state.borrow().error.clone()
    }

    pub fn has_caller(&self) -> bool {
        self.state.borrow().caller.is_some()
    }
}

impl Drop for ObjThread {
    /// 栈随协程一起释放，仍指向它的 upvalue 关闭成栈槽的当前值
    fn drop(&mut self) {
        let state = self.state.get_mut();
        for upvalue in state.open_upvalues.drain(..) {
            if let Some(slot) = upvalue.open_slot() {
                upvalue.close(state.stack.get(slot).cloned().unwrap_or(Value::Null));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::object::ObjFn;
    use std::rc::Weak;

    fn empty_closure() -> Rc<ObjClosure> {
        Rc::new(ObjClosure::new(
            Rc::new(ObjFn {
                name: "t".to_string(),
                code: vec![],
                lines: vec![],
                constants: RefCell::new(vec![]),
                arg_num: 0,
                upvalue_num: 0,
                max_stack_slots: 1,
                module: Weak::new(),
            }),
            vec![],
        ))
    }

    #[test]
    fn test_drop_closes_open_upvalues() {
        let thread = ObjThread::new(empty_closure(), 8);
        let upvalue = Rc::new(ObjUpvalue::open(&thread, 1));
        {
            let mut state = thread.state.borrow_mut();
            state.stack.push(Value::Num(5.0));
            state.open_upvalues.push(upvalue.clone());
        }
        drop(thread);
        assert!(upvalue.open_slot().is_none());
        match &*upvalue.state.borrow() {
            crate::core::object::UpvalueState::Closed(value) => assert_eq!(*value, Value::Num(5.0)),
            other => panic!("expected closed upvalue, got {:?}", other),
        };
    }

    #[test]
    fn test_new_thread_is_ready() {
        let thread = ObjThread::new(empty_closure(), 8);
        assert_eq!(thread.status(), ThreadStatus::Ready);
        assert!(!thread.is_done());
        assert!(thread.error().is_null());
        assert_eq!(thread.state.borrow().stack.len(), 1);
    }

    #[test]
    fn test_error_marks_done() {
        let thread = ObjThread::new(empty_closure(), 8);
        thread.state.borrow_mut().error = Value::string("boom");
        assert!(thread.is_done());
    }
}
