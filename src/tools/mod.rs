//! 工具层：工具 trait 与注册表、参数校验、执行上下文（工作单元 / 共享资源）、内置工具

pub mod context;
pub mod echo;
pub mod registry;
pub mod result;
pub mod validation;

pub use context::{
    ExecutionContext, LazyResource, NoopUnitOfWork, NoopUnitOfWorkFactory, SharedResources,
    UnitOfWork, UnitOfWorkFactory,
};
pub use echo::EchoTool;
pub use registry::{DispatchContext, Tool, ToolRegistry};
pub use result::{ToolExecutionResult, ToolOutput};
pub use validation::{parse_arguments, validate_arguments};
