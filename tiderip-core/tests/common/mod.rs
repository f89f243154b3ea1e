//! 测试辅助工具
//!
//! 提供端到端测试的辅助函数

#![allow(dead_code)]

use std::rc::Rc;
use tiderip_core::core::ObjFn;
use tiderip_core::{
    dump_function, CompileError, FunctionDump, InterpretResult, MemoryModuleLoader, RuntimeError,
    SharedBuffer, Vm,
};

/// 执行错误
#[derive(Debug)]
pub enum ExecError {
    Compile(CompileError),
    Runtime(RuntimeError),
}

/// 执行 Tiderip 代码并返回脚本输出
///
/// # Example
/// ```
/// let output = run_code("System.print(1 + 2)").unwrap();
/// assert_eq!(output, "3\n");
/// ```
pub fn run_code(code: &str) -> Result<String, ExecError> {
    run_with_modules(code, &[])
}

/// 带若干可导入模块执行
pub fn run_with_modules(code: &str, modules: &[(&str, &str)]) -> Result<String, ExecError> {
    let mut vm = Vm::new();
    let out = SharedBuffer::new();
    vm.set_output(out.clone());
    let mut loader = MemoryModuleLoader::new();
    for (name, source) in modules {
        loader.insert(*name, *source);
    }
    vm.set_module_loader(loader);

    match vm.execute_module("main", code) {
        InterpretResult::Success => Ok(out.contents()),
        InterpretResult::CompileError(err) => Err(ExecError::Compile(err)),
        InterpretResult::RuntimeError(err) => Err(ExecError::Runtime(err)),
    }
}

/// 执行并断言成功
pub fn output_of(code: &str) -> String {
    match run_code(code) {
        Ok(out) => out,
        Err(err) => panic!("unexpected failure: {:?}\n--- source ---\n{}", err, code),
    }
}

/// 执行并取出运行时错误
pub fn runtime_error(code: &str) -> RuntimeError {
    match run_code(code) {
        Err(ExecError::Runtime(err)) => err,
        other => panic!("expected runtime error, got {:?}", other),
    }
}

/// 编译并取出编译错误
pub fn compile_error(code: &str) -> CompileError {
    match run_code(code) {
        Err(ExecError::Compile(err)) => err,
        other => panic!("expected compile error, got {:?}", other),
    }
}

/// 只编译，返回虚拟机（用于翻译方法符号）和模块函数
pub fn compile(code: &str) -> (Vm, Rc<ObjFn>) {
    let mut vm = Vm::new();
    let func = match vm.compile_module("main", code) {
        Ok(func) => func,
        Err(err) => panic!("compile failed: {}", err),
    };
    (vm, func)
}

/// 编译并转储字节码
pub fn dump(code: &str) -> FunctionDump {
    let (vm, func) = compile(code);
    dump_function(&func, &|symbol| vm.method_name(symbol))
}

/// 深度优先遍历所有函数
pub fn all_functions(dump: &FunctionDump) -> Vec<&FunctionDump> {
    let mut out = vec![dump];
    for nested in &dump.functions {
        out.extend(all_functions(nested));
    }
    out
}
