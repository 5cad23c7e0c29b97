//! 工具注册表
//!
//! 所有工具实现 Tool trait（definition / validate / execute），由 ToolRegistry 按名注册与调度。
//! dispatch 的固定流程：查找处理器 -> 解析并按 schema 校验参数 -> 打开工作单元 -> 带超时执行
//! -> 成功 commit / 失败 rollback -> 释放。任何失败都折叠为 ToolExecutionResult，从不向调用方抛出；
//! 每次调用输出结构化审计日志（JSON）。

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::time::timeout;

use crate::catalog::{SafetyClass, ToolCatalog, ToolDefinition};
use crate::core::{AgentError, RecoveryAction, RecoveryEngine};
use crate::memory::ToolCallRequest;
use crate::tools::{
    parse_arguments, validate_arguments, ExecutionContext, NoopUnitOfWorkFactory, SharedResources,
    ToolExecutionResult, ToolOutput, UnitOfWork, UnitOfWorkFactory,
};

/// 审计日志中参数预览的最大字符数
const ARGS_PREVIEW_CHARS: usize = 200;

/// 工具 trait：定义（名称、描述、参数 schema、读写分类）、额外校验、异步执行
#[async_trait]
pub trait Tool: Send + Sync {
    fn definition(&self) -> ToolDefinition;

    /// schema 校验通过后的领域校验；默认不做额外检查
    fn validate(&self, _args: &Map<String, Value>) -> Result<(), String> {
        Ok(())
    }

    async fn execute(
        &self,
        ctx: &mut ExecutionContext,
        args: Map<String, Value>,
    ) -> Result<ToolOutput, String>;
}

/// 调度时的调用方信息
#[derive(Debug, Clone, Default)]
pub struct DispatchContext {
    pub user_id: String,
    pub language: String,
}

impl DispatchContext {
    pub fn new(user_id: impl Into<String>, language: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            language: language.into(),
        }
    }
}

/// 工具注册表：目录 + 处理器 + 共享资源 + 工作单元工厂 + 单次调用超时
pub struct ToolRegistry {
    catalog: ToolCatalog,
    handlers: HashMap<String, Arc<dyn Tool>>,
    resources: Arc<SharedResources>,
    units: Arc<dyn UnitOfWorkFactory>,
    timeout: Duration,
    recovery: RecoveryEngine,
}

impl ToolRegistry {
    pub fn new(timeout: Duration) -> Self {
        Self {
            catalog: ToolCatalog::new(),
            handlers: HashMap::new(),
            resources: Arc::new(SharedResources::new()),
            units: Arc::new(NoopUnitOfWorkFactory),
            timeout,
            recovery: RecoveryEngine::new(),
        }
    }

    pub fn with_resources(mut self, resources: Arc<SharedResources>) -> Self {
        self.resources = resources;
        self
    }

    pub fn with_unit_of_work(mut self, units: Arc<dyn UnitOfWorkFactory>) -> Self {
        self.units = units;
        self
    }

    /// 注册工具；定义非法或名称重复时返回 Validation 错误
    pub fn register(&mut self, tool: impl Tool + 'static) -> Result<(), AgentError> {
        let def = tool.definition();
        let name = def.name.clone();
        self.catalog.register(def)?;
        self.handlers.insert(name, Arc::new(tool));
        Ok(())
    }

    pub fn catalog(&self) -> &ToolCatalog {
        &self.catalog
    }

    pub fn definition(&self, name: &str) -> Option<&ToolDefinition> {
        self.catalog.get(name)
    }

    pub fn safety_of(&self, name: &str) -> Option<SafetyClass> {
        self.catalog.get(name).map(|d| d.safety)
    }

    pub fn tool_names(&self) -> Vec<String> {
        self.catalog.names().into_iter().map(String::from).collect()
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// 调度一次工具调用；永不返回错误，失败折叠为 success=false 的结果
    pub async fn dispatch(&self, call: &ToolCallRequest, scope: &DispatchContext) -> ToolExecutionResult {
        let start = Instant::now();
        let outcome = self.dispatch_inner(call, scope).await;
        let duration_ms = start.elapsed().as_millis() as u64;

        let (ok, label) = match &outcome {
            Ok(_) => (true, "ok"),
            Err(AgentError::UnknownTool(_)) => (false, "unknown_tool"),
            Err(AgentError::InvalidArguments { .. }) => (false, "invalid_arguments"),
            Err(AgentError::ToolTimeout(_)) => (false, "timeout"),
            Err(_) => (false, "error"),
        };
        let audit = serde_json::json!({
            "event": "tool_audit",
            "tool": call.name,
            "call_id": call.id,
            "user_id": scope.user_id,
            "ok": ok,
            "outcome": label,
            "duration_ms": duration_ms,
            "args_preview": args_preview(&call.arguments),
        });
        tracing::info!(audit = %audit, "tool");

        match outcome {
            Ok((safety, output)) => {
                ToolExecutionResult::succeeded(&call.id, &call.name, safety, output, duration_ms)
            }
            Err(err) => {
                let message = match self.recovery.handle(&err) {
                    RecoveryAction::ObserveAndContinue(hint) => hint,
                    _ => err.to_string(),
                };
                ToolExecutionResult::failed(
                    &call.id,
                    &call.name,
                    self.safety_of(&call.name),
                    message,
                    err.to_string(),
                    duration_ms,
                )
            }
        }
    }

    async fn dispatch_inner(
        &self,
        call: &ToolCallRequest,
        scope: &DispatchContext,
    ) -> Result<(SafetyClass, ToolOutput), AgentError> {
        let (tool, def) = match (self.handlers.get(&call.name), self.catalog.get(&call.name)) {
            (Some(tool), Some(def)) => (tool.clone(), def),
            _ => return Err(AgentError::UnknownTool(call.name.clone())),
        };

        let invalid = |reason: String| AgentError::InvalidArguments {
            tool: call.name.clone(),
            reason,
        };
        let args = parse_arguments(&call.arguments).map_err(invalid)?;
        validate_arguments(def, &args)
            .and_then(|_| tool.validate(&args))
            .map_err(invalid)?;

        let failed = |reason: String| AgentError::ToolExecution {
            tool: call.name.clone(),
            reason,
        };
        let unit = self
            .units
            .begin()
            .await
            .map_err(|e| failed(format!("could not open unit of work: {e}")))?;

        let mut ctx = ExecutionContext::new(
            scope.user_id.clone(),
            call.id.clone(),
            scope.language.clone(),
            self.resources.clone(),
            unit,
        );
        let outcome = timeout(self.timeout, tool.execute(&mut ctx, args)).await;
        let unit = ctx.take_unit();

        match outcome {
            Ok(Ok(output)) => {
                if let Some(unit) = unit {
                    unit.commit()
                        .await
                        .map_err(|e| failed(format!("commit failed: {e}")))?;
                }
                Ok((def.safety, output))
            }
            Ok(Err(reason)) => {
                rollback(unit, &call.name).await;
                Err(failed(reason))
            }
            Err(_) => {
                rollback(unit, &call.name).await;
                Err(AgentError::ToolTimeout(call.name.clone()))
            }
        }
    }
}

async fn rollback(unit: Option<Box<dyn UnitOfWork>>, tool: &str) {
    if let Some(unit) = unit {
        if let Err(e) = unit.rollback().await {
            tracing::warn!(tool = %tool, "rollback failed: {}", e);
        }
    }
}

fn args_preview(args: &str) -> String {
    if args.chars().count() > ARGS_PREVIEW_CHARS {
        format!("{}...", args.chars().take(ARGS_PREVIEW_CHARS).collect::<String>())
    } else {
        args.to_string()
    }
}
