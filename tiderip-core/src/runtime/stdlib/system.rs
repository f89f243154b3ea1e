//! System 的原生方法：时钟、模块导入、输入输出、随机数

use super::{bind_static, error, ret, validate_int, validate_string};
use crate::core::{ObjClass, ObjClosure, ObjThread, PrimResult, ThreadStatus, Value, Vm};
use std::io::Write;
use std::rc::Rc;
use tiderip_log::{debug, info, warn};

pub fn register(vm: &mut Vm, system: &ObjClass) {
    bind_static(vm, system, "clock", system_clock);
    bind_static(vm, system, "importModule(_)", system_import_module);
    bind_static(vm, system, "getModuleVariable(_,_)", system_get_module_variable);
    bind_static(vm, system, "writeString_(_)", system_write_string);
    bind_static(vm, system, "inputString_()", system_input_string);
    bind_static(vm, system, "getRand(_,_)", system_get_rand);
}

/// 虚拟机启动以来的秒数
fn system_clock(vm: &mut Vm, args: &mut [Value]) -> PrimResult {
    let seconds = vm.start.elapsed().as_secs_f64();
    ret(args, Value::Num(seconds))
}

/// 加载并在新协程里运行模块
///
/// 已加载的模块不会重复执行。新协程的调用者是当前协程，
/// 模块顶层执行完毕后回到 import 语句之后继续。
fn system_import_module(vm: &mut Vm, args: &mut [Value]) -> PrimResult {
    let name = try_prim!(validate_string(&args[1], "module name"));
    let name = name.as_str().to_string();
    if vm.modules.contains_key(&name) {
        return ret(args, Value::Null);
    }

    let source = match vm.loader.load(&name) {
        Ok(source) => source,
        Err(reason) => {
            warn!(vm.logger, "module '{}' not found: {}", name, reason);
            return error(format!("could not load module '{}': {}", name, reason));
        }
    };
    let func = match vm.compile_module(&name, &source) {
        Ok(func) => func,
        Err(err) => {
            vm.modules.remove(&name);
            return error(format!("could not compile module '{}': {}", name, err));
        }
    };
    info!(vm.logger, "importing module '{}'", name);

    let closure = Rc::new(ObjClosure::new(func, Vec::new()));
    let thread = ObjThread::new(closure, vm.config.initial_stack_size);
    {
        let mut state = thread.state.borrow_mut();
        state.caller = vm.current.clone();
        state.status = ThreadStatus::Running;
    }
    args[0] = Value::Null;
    PrimResult::Switch(Some(thread))
}

fn system_get_module_variable(vm: &mut Vm, args: &mut [Value]) -> PrimResult {
    let module_name = try_prim!(validate_string(&args[1], "module name"));
    let var_name = try_prim!(validate_string(&args[2], "variable name"));
    let Some(module) = vm.modules.get(module_name.as_str()) else {
        return error(format!("module '{}' is not loaded", module_name.as_str()));
    };
    match module.var_by_name(var_name.as_str()) {
        Some(value) => ret(args, value),
        None => error(format!(
            "variable '{}' is not defined in module '{}'",
            var_name.as_str(),
            module_name.as_str()
        )),
    }
}

/// 返回写出的字符串
fn system_write_string(vm: &mut Vm, args: &mut [Value]) -> PrimResult {
    let text = try_prim!(validate_string(&args[1], "argument"));
    if let Err(err) = vm.output.write_all(text.as_str().as_bytes()) {
        return error(format!("write failed: {}", err));
    }
    let value = args[1].clone();
    ret(args, value)
}

/// 读一行，去掉行尾换行；输入结束时返回 null
fn system_input_string(vm: &mut Vm, args: &mut [Value]) -> PrimResult {
    if let Err(err) = vm.output.flush() {
        debug!(vm.logger, "flush before input failed: {}", err);
    }
    let mut line = String::new();
    match vm.input.read_line(&mut line) {
        Ok(0) => ret(args, Value::Null),
        Ok(_) => {
            let trimmed = line.trim_end_matches(['\n', '\r']).to_string();
            ret(args, Value::string(trimmed))
        }
        Err(err) => error(format!("read failed: {}", err)),
    }
}

/// `[start, end]` 内的随机整数
fn system_get_rand(vm: &mut Vm, args: &mut [Value]) -> PrimResult {
    let start = try_prim!(validate_int(&args[1], "start"));
    let end = try_prim!(validate_int(&args[2], "end"));
    if end < start {
        return error("end must not be less than start");
    }
    let span = (end - start) as u64 + 1;
    let n = start + (next_rand(&mut vm.rand_state) % span) as f64;
    ret(args, Value::Num(n))
}

fn next_rand(state: &mut u64) -> u64 {
    *state = state
        .wrapping_mul(6_364_136_223_846_793_005)
        .wrapping_add(1_442_695_040_888_963_407);
    *state >> 33
}
