//! Agent 主循环
//!
//! 翻译输入 -> 拼 system + 历史 + 本轮 user -> [调用模型 -> 按请求顺序调度工具 -> 写回 tool 轮]* -> 最终回复
//! -> WRITE 成功则清空会话，否则保存 -> 翻译输出 -> 生成语音安全文本。
//!
//! 循环受 max_turns 硬上限约束，耗尽时返回固定降级回复；模型服务失败只终止本次运行且不写会话，
//! 工具失败折叠为 tool 轮交给模型自行纠正。

use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::mpsc::UnboundedSender;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

use crate::agent::{default_system_prompt, voice_safe, AgentEvent};
use crate::config::{AgentSection, LlmSection};
use crate::core::{AgentError, RecoveryAction, RecoveryEngine};
use crate::llm::{ChatRequest, LlmClient, LlmResponse, SamplingConfig};
use crate::memory::{ConversationHistory, Message, ToolCallRequest};
use crate::tools::{DispatchContext, ToolExecutionResult, ToolRegistry};
use crate::translation::{same_language, TranslationCascade};

/// Observation 预览最大字符数
const OBSERVATION_PREVIEW_CHARS: usize = 200;

/// 主循环参数
#[derive(Debug, Clone)]
pub struct AgentSettings {
    pub max_turns: usize,
    pub working_language: String,
    pub sampling: SamplingConfig,
    pub model_timeout: Duration,
    pub concurrent_tools: bool,
    pub degraded_message: String,
    pub failure_message: String,
    pub system_prompt: String,
}

impl AgentSettings {
    pub fn from_config(agent: &AgentSection, llm: &LlmSection) -> Self {
        Self {
            max_turns: agent.max_turns.max(1),
            working_language: agent.working_language.clone(),
            sampling: SamplingConfig {
                temperature: agent.temperature,
                max_tokens: llm.max_tokens,
            },
            model_timeout: Duration::from_secs(llm.timeouts.request),
            concurrent_tools: agent.concurrent_tools,
            degraded_message: agent.degraded_message.clone(),
            failure_message: agent.failure_message.clone(),
            system_prompt: agent
                .system_prompt
                .clone()
                .unwrap_or_else(|| default_system_prompt(&agent.working_language)),
        }
    }
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self::from_config(&AgentSection::default(), &LlmSection::default())
    }
}

/// 本次运行如何结束
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    /// 模型给出最终回复
    Answered,
    /// 达到 max_turns 仍无最终回复
    Degraded,
    /// 模型服务失败
    Failed,
}

/// 一次运行的结果
#[derive(Debug, Clone, Serialize)]
pub struct AgentResult {
    pub response: String,
    pub voice_safe_response: String,
    /// 已执行的工具调用，按执行（即请求）顺序
    pub tool_calls: Vec<ToolExecutionResult>,
    pub performed_write: bool,
    /// 本次调用模型的次数
    pub turns_used: usize,
    pub outcome: RunOutcome,
}

impl AgentResult {
    pub fn tool_names(&self) -> Vec<&str> {
        self.tool_calls.iter().map(|c| c.tool_name.as_str()).collect()
    }
}

/// 运行选项：取消令牌与事件通道
#[derive(Default, Clone)]
pub struct RunOptions {
    pub cancel: CancellationToken,
    pub events: Option<UnboundedSender<AgentEvent>>,
}

impl RunOptions {
    pub fn with_cancel(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn with_events(mut self, tx: UnboundedSender<AgentEvent>) -> Self {
        self.events = Some(tx);
        self
    }

    fn emit(&self, ev: AgentEvent) {
        if let Some(tx) = &self.events {
            let _ = tx.send(ev);
        }
    }
}

/// 单次运行的可变状态
struct RunState {
    messages: Vec<Message>,
    executed: Vec<ToolExecutionResult>,
    performed_write: bool,
    turns_used: usize,
}

/// Agent 执行器：组合模型、工具注册表、会话历史与翻译级联；可被多个会话并发共享
pub struct AgentExecutor {
    llm: Arc<dyn LlmClient>,
    registry: Arc<ToolRegistry>,
    history: ConversationHistory,
    translator: Arc<TranslationCascade>,
    recovery: RecoveryEngine,
    settings: AgentSettings,
    tool_specs: Vec<Value>,
}

impl AgentExecutor {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        registry: Arc<ToolRegistry>,
        history: ConversationHistory,
        translator: Arc<TranslationCascade>,
        settings: AgentSettings,
    ) -> Self {
        let tool_specs = registry.catalog().function_specs();
        Self {
            llm,
            registry,
            history,
            translator,
            recovery: RecoveryEngine::new(),
            settings,
            tool_specs,
        }
    }

    pub fn settings(&self) -> &AgentSettings {
        &self.settings
    }

    pub fn history(&self) -> &ConversationHistory {
        &self.history
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// 渠道适配器入口：永不报错，失败以固定致歉文本返回
    pub async fn run(&self, utterance: &str, user_id: &str, language: &str) -> AgentResult {
        match self
            .run_with(utterance, user_id, language, RunOptions::default())
            .await
        {
            Ok(result) => result,
            Err(e) => {
                tracing::error!(user_id = %user_id, "agent run aborted: {}", e);
                self.failure_result(0, Vec::new(), false)
            }
        }
    }

    /// 带取消与事件推送的运行；仅在被取消时返回 Err(Cancelled)
    pub async fn run_with(
        &self,
        utterance: &str,
        user_id: &str,
        language: &str,
        options: RunOptions,
    ) -> Result<AgentResult, AgentError> {
        let working = self.settings.working_language.as_str();
        let language = if language.trim().is_empty() {
            working
        } else {
            language
        };
        let needs_translation = !same_language(language, working);

        let input = if needs_translation {
            let translated = self.translator.translate(utterance, language, working).await;
            options.emit(AgentEvent::Translated {
                from: language.to_string(),
                to: working.to_string(),
            });
            translated
        } else {
            utterance.to_string()
        };

        let mut state = RunState {
            messages: vec![Message::system(self.settings.system_prompt.clone())],
            executed: Vec::new(),
            performed_write: false,
            turns_used: 0,
        };
        state.messages.extend(self.history.load(user_id).await);
        state.messages.push(Message::user(input));

        let scope = DispatchContext::new(user_id, language);
        let final_text = match self.reason(&mut state, &scope, &options).await {
            Ok(text) => text,
            Err(AgentError::Cancelled) => {
                self.clear_after_write(user_id, &state, &options).await;
                options.emit(AgentEvent::Error {
                    text: "cancelled".to_string(),
                });
                return Err(AgentError::Cancelled);
            }
            Err(e) => {
                if self.recovery.handle(&e) != RecoveryAction::Abort {
                    tracing::warn!("unexpected recoverable error escaped the loop: {}", e);
                }
                tracing::error!(user_id = %user_id, turns = state.turns_used, "model service failed: {}", e);
                options.emit(AgentEvent::Error {
                    text: self.settings.failure_message.clone(),
                });
                self.clear_after_write(user_id, &state, &options).await;
                return Ok(self.failure_result(
                    state.turns_used,
                    state.executed,
                    state.performed_write,
                ));
            }
        };

        let (response, outcome) = match final_text {
            Some(text) => {
                options.emit(AgentEvent::Final { text: text.clone() });
                (text, RunOutcome::Answered)
            }
            None => {
                tracing::warn!(
                    user_id = %user_id,
                    max_turns = self.settings.max_turns,
                    "turn limit reached without a final answer"
                );
                options.emit(AgentEvent::Degraded);
                (self.settings.degraded_message.clone(), RunOutcome::Degraded)
            }
        };
        state.messages.push(Message::assistant(response.clone()));

        if state.performed_write {
            self.clear_after_write(user_id, &state, &options).await;
        } else if let Err(e) = self.history.save(user_id, &state.messages).await {
            if self.recovery.handle(&e) == RecoveryAction::Degrade {
                tracing::warn!(user_id = %user_id, "session not saved: {}", e);
            }
        }

        let response = if needs_translation {
            self.translator.translate(&response, working, language).await
        } else {
            response
        };
        let voice_safe_response = voice_safe(&response);

        tracing::info!(
            user_id = %user_id,
            turns = state.turns_used,
            tools = state.executed.len(),
            performed_write = state.performed_write,
            outcome = ?outcome,
            "agent run finished"
        );

        Ok(AgentResult {
            response,
            voice_safe_response,
            tool_calls: state.executed,
            performed_write: state.performed_write,
            turns_used: state.turns_used,
            outcome,
        })
    }

    /// 推理循环：返回 Some(最终回复)，或在耗尽 max_turns 时返回 None
    async fn reason(
        &self,
        state: &mut RunState,
        scope: &DispatchContext,
        options: &RunOptions,
    ) -> Result<Option<String>, AgentError> {
        for turn in 1..=self.settings.max_turns {
            if options.cancel.is_cancelled() {
                return Err(AgentError::Cancelled);
            }
            options.emit(AgentEvent::Turn {
                turn,
                max_turns: self.settings.max_turns,
            });
            options.emit(AgentEvent::Thinking);

            state.turns_used += 1;
            let response = self.call_model(&state.messages, &options.cancel).await?;

            let (content, calls) = match response {
                LlmResponse::ToolCalls { content, calls } if !calls.is_empty() => (content, calls),
                LlmResponse::ToolCalls { content, .. } | LlmResponse::Text(content) => {
                    return Ok(Some(content));
                }
            };

            state
                .messages
                .push(Message::assistant_tool_calls(content, calls.clone()));
            let results = self.dispatch_all(&calls, scope, options).await?;
            for result in results {
                state.performed_write |= result.is_successful_write();
                state
                    .messages
                    .push(Message::tool(result.call_id.clone(), result.to_observation()));
                state.executed.push(result);
            }
        }
        Ok(None)
    }

    async fn call_model(
        &self,
        messages: &[Message],
        cancel: &CancellationToken,
    ) -> Result<LlmResponse, AgentError> {
        let request = ChatRequest {
            messages,
            tools: &self.tool_specs,
            sampling: &self.settings.sampling,
        };
        tokio::select! {
            _ = cancel.cancelled() => Err(AgentError::Cancelled),
            outcome = timeout(self.settings.model_timeout, self.llm.chat(request)) => match outcome {
                Ok(Ok(response)) => Ok(response),
                Ok(Err(e)) => Err(AgentError::ModelService(e)),
                Err(_) => Err(AgentError::ModelTimeout),
            },
        }
    }

    /// 调度一轮内的全部工具调用；无论串行还是并发，结果都按请求顺序返回
    async fn dispatch_all(
        &self,
        calls: &[ToolCallRequest],
        scope: &DispatchContext,
        options: &RunOptions,
    ) -> Result<Vec<ToolExecutionResult>, AgentError> {
        for call in calls {
            options.emit(AgentEvent::ToolCall {
                id: call.id.clone(),
                tool: call.name.clone(),
                args: call.arguments.clone(),
            });
        }

        let results = if self.settings.concurrent_tools {
            if options.cancel.is_cancelled() {
                return Err(AgentError::Cancelled);
            }
            join_all(calls.iter().map(|call| self.registry.dispatch(call, scope))).await
        } else {
            let mut results = Vec::with_capacity(calls.len());
            for call in calls {
                if options.cancel.is_cancelled() {
                    return Err(AgentError::Cancelled);
                }
                results.push(self.registry.dispatch(call, scope).await);
            }
            results
        };

        for r in &results {
            options.emit(AgentEvent::Observation {
                tool: r.tool_name.clone(),
                success: r.success,
                preview: preview(&r.message),
            });
        }
        Ok(results)
    }

    /// 本次运行已有 WRITE 成功时清空会话，避免后续轮次引用已变更的实体
    async fn clear_after_write(&self, user_id: &str, state: &RunState, options: &RunOptions) {
        if !state.performed_write {
            return;
        }
        match self.history.clear(user_id).await {
            Ok(()) => {
                tracing::info!(user_id = %user_id, "write tool succeeded, session cleared");
                options.emit(AgentEvent::SessionCleared);
            }
            Err(e) => tracing::warn!(user_id = %user_id, "failed to clear session: {}", e),
        }
    }

    fn failure_result(
        &self,
        turns_used: usize,
        executed: Vec<ToolExecutionResult>,
        performed_write: bool,
    ) -> AgentResult {
        let response = self.settings.failure_message.clone();
        AgentResult {
            voice_safe_response: voice_safe(&response),
            response,
            tool_calls: executed,
            performed_write,
            turns_used,
            outcome: RunOutcome::Failed,
        }
    }
}

fn preview(text: &str) -> String {
    if text.chars().count() > OBSERVATION_PREVIEW_CHARS {
        format!(
            "{}...",
            text.chars().take(OBSERVATION_PREVIEW_CHARS).collect::<String>()
        )
    } else {
        text.to_string()
    }
}
