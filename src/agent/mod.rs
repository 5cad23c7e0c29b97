//! Agent 运行时：渠道适配器（语音 / 短信 / HTTP）调用的无头入口
//!
//! - **executor**: 推理主循环与 run 入口
//! - **builder**: 从配置组装执行器
//! - **events**: 过程事件
//! - **prompt**: 系统提示词
//! - **voice**: 语音安全文本

pub mod builder;
pub mod events;
pub mod executor;
pub mod prompt;
pub mod voice;

pub use builder::{create_executor, create_llm_from_config, create_translation_cascade};
pub use events::AgentEvent;
pub use executor::{AgentExecutor, AgentResult, AgentSettings, RunOptions, RunOutcome};
pub use prompt::default_system_prompt;
pub use voice::voice_safe;
