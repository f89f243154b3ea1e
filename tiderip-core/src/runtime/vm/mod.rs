//! 虚拟机实现

use crate::compiler::{self, CompileError};
use crate::core::{
    CoreClasses, InterpretResult, Obj, ObjClass, ObjClosure, ObjFn, ObjModule, ObjThread,
    RuntimeError, SymbolTable, ThreadStatus, Value, Vm,
};
use crate::runtime::loader::{ModuleLoader, NoModuleLoader};
use crate::runtime::stdlib;
use std::cell::RefCell;
use std::collections::HashMap;
use std::io::{self, BufRead, BufReader, Write};
use std::rc::Rc;
use std::sync::Arc;
use std::time::{Instant, SystemTime, UNIX_EPOCH};
use tiderip_config::VmConfig;
use tiderip_log::{debug, error, warn, Logger};

// 子模块
mod call;
mod execution;

impl Vm {
    /// 默认配置，不输出日志
    pub fn new() -> Self {
        Self::with_config_and_logger(VmConfig::default(), Logger::noop())
    }

    pub fn with_config(config: VmConfig) -> Self {
        Self::with_config_and_logger(config, Logger::noop())
    }

    /// 创建虚拟机并完成核心库引导
    ///
    /// 引导失败不会 panic：原因被记下，之后每次执行都返回该错误。
    pub fn with_config_and_logger(config: VmConfig, logger: Arc<Logger>) -> Self {
        let object = ObjClass::new("object", None, 0);
        let class = ObjClass::new("class", Some(object.clone()), 0);
        let mut vm = Vm {
            config,
            logger: logger.clone(),
            method_names: SymbolTable::new(),
            core: CoreClasses::bootstrap(object, class),
            core_module: Rc::new(ObjModule::new("core")),
            modules: HashMap::new(),
            current: None,
            output: Box::new(io::stdout()),
            input: Box::new(BufReader::new(io::stdin())),
            loader: Box::new(NoModuleLoader),
            start: Instant::now(),
            rand_state: seed(),
            boot_error: None,
        };
        match stdlib::bootstrap(&mut vm) {
            Ok(()) => debug!(logger, "core library ready, {} methods", vm.method_names.len()),
            Err(err) => {
                error!(logger, "core library bootstrap failed: {}", err);
                vm.boot_error = Some(err);
            }
        }
        vm
    }

    pub fn config(&self) -> &VmConfig {
        &self.config
    }

    pub fn logger(&self) -> Arc<Logger> {
        self.logger.clone()
    }

    /// 替换脚本输出（默认标准输出）
    pub fn set_output<W: Write + 'static>(&mut self, output: W) {
        self.output = Box::new(output);
    }

    /// 替换 `System.inputString_()` 的输入（默认标准输入）
    pub fn set_input<R: BufRead + 'static>(&mut self, input: R) {
        self.input = Box::new(input);
    }

    pub fn set_module_loader<L: ModuleLoader + 'static>(&mut self, loader: L) {
        self.loader = Box::new(loader);
    }

    pub fn method_names(&self) -> &SymbolTable {
        &self.method_names
    }

    pub fn module(&self, name: &str) -> Option<Rc<ObjModule>> {
        self.modules.get(name).cloned()
    }

    /// 读取已加载模块的变量
    pub fn module_variable(&self, module: &str, name: &str) -> Option<Value> {
        self.modules.get(module).and_then(|m| m.var_by_name(name))
    }

    /// 取已有模块，否则新建并复制核心模块的全部变量
    pub fn module_or_new(&mut self, name: &str) -> Rc<ObjModule> {
        if let Some(module) = self.modules.get(name) {
            return module.clone();
        }
        let module = Rc::new(ObjModule::new(name));
        for index in 0..self.core_module.var_count() {
            if let (Some(var), Some(value)) =
                (self.core_module.var_name(index), self.core_module.var(index))
            {
                module.add_var(&var, value);
            }
        }
        self.modules.insert(name.to_string(), module.clone());
        debug!(self.logger, "module '{}' created", name);
        module
    }

    /// 编译源码到指定模块（不存在则创建）
    pub fn compile_module(&mut self, name: &str, source: &str) -> Result<Rc<ObjFn>, CompileError> {
        let module = self.module_or_new(name);
        compiler::compile_module(self, module, source)
    }

    /// 在新协程中运行模块函数，直到它结束、中止或挂起
    pub fn run_function(&mut self, func: Rc<ObjFn>) -> InterpretResult {
        if let Some(err) = &self.boot_error {
            return InterpretResult::RuntimeError(RuntimeError::detached(err.clone()));
        }
        let closure = Rc::new(ObjClosure::new(func, Vec::new()));
        let thread = ObjThread::new(closure, self.config.initial_stack_size);
        thread.state.borrow_mut().status = ThreadStatus::Running;

        let result = execution::run(self, thread);
        if let Err(err) = self.output.flush() {
            warn!(self.logger, "failed to flush output: {}", err);
        }
        match result {
            Ok(()) => InterpretResult::Success,
            Err(err) => InterpretResult::RuntimeError(err),
        }
    }

    /// 编译并运行一段源码
    pub fn execute_module(&mut self, name: &str, source: &str) -> InterpretResult {
        if let Some(err) = &self.boot_error {
            return InterpretResult::RuntimeError(RuntimeError::detached(err.clone()));
        }
        match self.compile_module(name, source) {
            Ok(func) => self.run_function(func),
            Err(err) => InterpretResult::CompileError(err),
        }
    }

    /// 值所属的类
    pub fn class_of(&self, value: &Value) -> Rc<ObjClass> {
        let core = &self.core;
        match value {
            Value::Undefined => core.object.clone(),
            Value::Null => core.null.clone(),
            Value::Bool(_) => core.bool.clone(),
            Value::Num(_) => core.num.clone(),
            Value::Obj(obj) => match obj {
                Obj::String(_) => core.string.clone(),
                Obj::List(_) => core.list.clone(),
                Obj::Map(_) => core.map.clone(),
                Obj::Range(_) => core.range.clone(),
                Obj::Module(_) => core.object.clone(),
                Obj::Fn(_) | Obj::Closure(_) => core.func.clone(),
                Obj::Instance(instance) => instance.class.clone(),
                Obj::Class(class) => class.meta().unwrap_or_else(|| core.class.clone()),
                Obj::Thread(_) => core.thread.clone(),
            },
        }
    }

    /// 方法符号对应的签名
    pub fn method_name(&self, symbol: usize) -> String {
        self.method_names.get(symbol).unwrap_or("?").to_string()
    }
}

impl Default for Vm {
    fn default() -> Self {
        Self::new()
    }
}

fn seed() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0x2545_f491_4f6c_dd1d)
        | 1
}

/// 可共享的输出缓冲，嵌入方和测试用它收集脚本输出
#[derive(Debug, Clone, Default)]
pub struct SharedBuffer(Rc<RefCell<Vec<u8>>>);

impl SharedBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.borrow()).into_owned()
    }

    pub fn clear(&self) {
        self.0.borrow_mut().clear();
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(source: &str) -> (InterpretResult, String) {
        let mut vm = Vm::new();
        let out = SharedBuffer::new();
        vm.set_output(out.clone());
        let result = vm.execute_module("test", source);
        (result, out.contents())
    }

    #[test]
    fn test_bootstrap_succeeds() {
        let vm = Vm::new();
        assert!(vm.boot_error.is_none(), "{:?}", vm.boot_error);
        assert!(vm.core_module.find_var("System").is_some());
        assert!(vm.core_module.find_var("List").is_some());
    }

    #[test]
    fn test_class_of_builtins() {
        let vm = Vm::new();
        assert_eq!(vm.class_of(&Value::Num(1.0)).name, "Num");
        assert_eq!(vm.class_of(&Value::Null).name, "Null");
        assert_eq!(vm.class_of(&Value::string("s")).name, "String");
        assert_eq!(vm.class_of(&Value::class(vm.core.object.clone())).name, "objectMeta");
        assert_eq!(vm.class_of(&Value::class(vm.core.class.clone())).name, "class");
    }

    #[test]
    fn test_new_module_copies_core_vars() {
        let mut vm = Vm::new();
        let module = vm.module_or_new("fresh");
        assert_eq!(module.var_count(), vm.core_module.var_count());
        assert!(Rc::ptr_eq(&module, &vm.module_or_new("fresh")));
    }

    #[test]
    fn test_point_sum() {
        let (result, out) = run(
            "class Point {\n\
               var x\n\
               var y\n\
               new(a, b) {\n\
                 x = a\n\
                 y = b\n\
               }\n\
               sum() { return x + y }\n\
             }\n\
             var p = Point.new(3, 4)\n\
             System.writeString_(p.sum().toString)\n",
        );
        assert!(result.is_success(), "{:?}", result);
        assert_eq!(out, "7");
    }

    #[test]
    fn test_runtime_error_has_line_and_trace() {
        let (result, _) = run("var a = 1\nfun f() {\n  return a.nope\n}\nf()\n");
        match result {
            InterpretResult::RuntimeError(err) => {
                assert_eq!(err.message, "Num does not implement 'nope'");
                assert_eq!(err.line, 3);
                assert_eq!(err.trace.len(), 2);
                assert_eq!(err.trace[0].function, "f");
                assert_eq!(err.trace[1].line, 5);
            }
            other => panic!("expected runtime error, got {:?}", other),
        }
    }

    #[test]
    fn test_compile_error_is_reported() {
        let (result, _) = run("var = 1");
        assert!(matches!(result, InterpretResult::CompileError(_)));
    }

    #[test]
    fn test_module_state_persists_between_runs() {
        let mut vm = Vm::new();
        let out = SharedBuffer::new();
        vm.set_output(out.clone());
        assert!(vm.execute_module("repl", "var count = 41").is_success());
        assert!(vm
            .execute_module("repl", "count = count + 1\nSystem.print(count)")
            .is_success());
        assert_eq!(out.contents(), "42\n");
        assert_eq!(vm.module_variable("repl", "count"), Some(Value::Num(42.0)));
    }
}
