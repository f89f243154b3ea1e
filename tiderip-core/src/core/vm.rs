//! 虚拟机状态定义
//!
//! 这里只有数据；执行逻辑在 runtime/vm，核心库在 runtime/stdlib。

use super::class::ObjClass;
use super::error::RuntimeError;
use super::object::ObjModule;
use super::symbol::SymbolTable;
use super::thread::ObjThread;
use crate::compiler::CompileError;
use crate::runtime::loader::ModuleLoader;
use std::collections::HashMap;
use std::io::{BufRead, Write};
use std::rc::Rc;
use std::sync::Arc;
use std::time::Instant;
use tiderip_config::VmConfig;
use tiderip_log::Logger;

/// 解释执行结果
#[derive(Debug)]
pub enum InterpretResult {
    Success,
    CompileError(CompileError),
    RuntimeError(RuntimeError),
}

impl InterpretResult {
    pub fn is_success(&self) -> bool {
        matches!(self, InterpretResult::Success)
    }
}

/// 内建类；`class_of` 依赖它们
///
/// 引导完成前，除 object/class 外都暂时指向 object。
#[derive(Debug, Clone)]
pub struct CoreClasses {
    pub object: Rc<ObjClass>,
    pub class: Rc<ObjClass>,
    pub null: Rc<ObjClass>,
    pub bool: Rc<ObjClass>,
    pub num: Rc<ObjClass>,
    pub string: Rc<ObjClass>,
    pub list: Rc<ObjClass>,
    pub map: Rc<ObjClass>,
    pub range: Rc<ObjClass>,
    pub func: Rc<ObjClass>,
    pub thread: Rc<ObjClass>,
}

impl CoreClasses {
    pub(crate) fn bootstrap(object: Rc<ObjClass>, class: Rc<ObjClass>) -> Self {
        CoreClasses {
            null: object.clone(),
            bool: object.clone(),
            num: object.clone(),
            string: object.clone(),
            list: object.clone(),
            map: object.clone(),
            range: object.clone(),
            func: object.clone(),
            thread: object.clone(),
            object,
            class,
        }
    }

    /// 不能被脚本继承的内建类（object 除外）
    pub fn is_builtin(&self, class: &ObjClass) -> bool {
        if std::ptr::eq(class, self.object.as_ref()) {
            return false;
        }
        [
            &self.null,
            &self.bool,
            &self.num,
            &self.string,
            &self.list,
            &self.map,
            &self.range,
            &self.func,
            &self.thread,
        ]
        .iter()
        .any(|c| std::ptr::eq(class, c.as_ref()))
    }
}

/// 虚拟机
pub struct Vm {
    pub(crate) config: VmConfig,
    pub(crate) logger: Arc<Logger>,
    /// 全局方法名符号表，所有类的方法表按它索引
    pub(crate) method_names: SymbolTable,
    pub(crate) core: CoreClasses,
    /// 核心模块，新模块创建时复制它的全部变量
    pub(crate) core_module: Rc<ObjModule>,
    pub(crate) modules: HashMap<String, Rc<ObjModule>>,
    /// 正在运行的协程
    pub(crate) current: Option<Rc<ObjThread>>,
    pub(crate) output: Box<dyn Write>,
    pub(crate) input: Box<dyn BufRead>,
    pub(crate) loader: Box<dyn ModuleLoader>,
    pub(crate) start: Instant,
    pub(crate) rand_state: u64,
    /// 引导失败时的原因，之后的执行请求都直接报错
    pub(crate) boot_error: Option<String>,
}
