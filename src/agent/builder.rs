//! 从 AppConfig 组装 AgentExecutor：模型后端、翻译级联、会话存储

use std::sync::Arc;
use std::time::Duration;

use crate::agent::{AgentExecutor, AgentSettings};
use crate::config::AppConfig;
use crate::llm::{LlmClient, MockLlmClient, OpenAiClient};
use crate::memory::{create_session_store, ConversationHistory};
use crate::tools::ToolRegistry;
use crate::translation::{HttpTranslationProvider, LlmTranslationProvider, TranslationCascade};

/// DeepSeek 的 OpenAI 兼容端点
const DEEPSEEK_BASE_URL: &str = "https://api.deepseek.com";
const DEEPSEEK_DEFAULT_MODEL: &str = "deepseek-chat";

/// 配置中的 api_key 优先，其次按顺序查找环境变量
fn api_key(cfg: &AppConfig, vars: &[&str]) -> Option<String> {
    cfg.llm
        .api_key
        .clone()
        .or_else(|| vars.iter().find_map(|v| std::env::var(v).ok()))
}

/// 按 [llm].provider 选择后端；密钥取自配置或环境变量，缺失时退回 Mock
pub fn create_llm_from_config(cfg: &AppConfig) -> Arc<dyn LlmClient> {
    let provider = cfg.llm.provider.to_lowercase();
    match provider.as_str() {
        "openai" => match api_key(cfg, &["OPENAI_API_KEY"]) {
            Some(key) => {
                tracing::info!("Using OpenAI LLM ({})", cfg.llm.model);
                Arc::new(OpenAiClient::new(cfg.llm.base_url.as_deref(), &cfg.llm.model, Some(&key)))
            }
            None => {
                tracing::warn!("OPENAI_API_KEY not set, using Mock LLM");
                Arc::new(MockLlmClient)
            }
        },
        "deepseek" => match api_key(cfg, &["DEEPSEEK_API_KEY", "OPENAI_API_KEY"]) {
            Some(key) => {
                // 未显式配置模型时沿用默认值 gpt-4o-mini，需换成 DeepSeek 模型
                let model = if cfg.llm.model.starts_with("gpt-") {
                    DEEPSEEK_DEFAULT_MODEL
                } else {
                    cfg.llm.model.as_str()
                };
                let base = cfg.llm.base_url.as_deref().unwrap_or(DEEPSEEK_BASE_URL);
                tracing::info!("Using DeepSeek LLM ({})", model);
                Arc::new(OpenAiClient::new(Some(base), model, Some(&key)))
            }
            None => {
                tracing::warn!("DEEPSEEK_API_KEY not set, using Mock LLM");
                Arc::new(MockLlmClient)
            }
        },
        "mock" => Arc::new(MockLlmClient),
        other => {
            tracing::warn!(provider = %other, "unknown LLM provider, using Mock LLM");
            Arc::new(MockLlmClient)
        }
    }
}

/// 按 [[translation.providers]] 顺序组装级联；llm 类型复用主模型
pub fn create_translation_cascade(cfg: &AppConfig, llm: Arc<dyn LlmClient>) -> TranslationCascade {
    let mut cascade = TranslationCascade::new().with_cache(cfg.translation.cache_capacity);
    if !cfg.translation.enabled {
        return cascade;
    }

    for (i, p) in cfg.translation.providers.iter().enumerate() {
        let timeout = Duration::from_secs(p.timeout_secs.max(1));
        let name = p.name.clone().unwrap_or_else(|| format!("{}-{}", p.kind, i));
        match p.kind.to_lowercase().as_str() {
            "http" => match &p.url {
                Some(url) => {
                    let provider = HttpTranslationProvider::new(name, url.clone(), p.api_key.clone(), timeout);
                    cascade = cascade.with_provider(Arc::new(provider), timeout);
                }
                None => tracing::warn!(provider = %name, "http translation provider without url, skipped"),
            },
            "llm" => {
                cascade = cascade.with_provider(Arc::new(LlmTranslationProvider::new(name, llm.clone())), timeout);
            }
            other => tracing::warn!(kind = %other, "unknown translation provider kind, skipped"),
        }
    }
    cascade
}

/// 组装执行器；registry 由调用方注册好业务工具
pub fn create_executor(cfg: &AppConfig, registry: ToolRegistry) -> AgentExecutor {
    let llm = create_llm_from_config(cfg);
    let translator = create_translation_cascade(cfg, llm.clone());
    let store = create_session_store(cfg.memory.sqlite_path.as_deref());
    let history = ConversationHistory::new(
        store,
        cfg.memory.max_turns,
        Duration::from_secs(cfg.memory.ttl_secs),
    );
    AgentExecutor::new(
        llm,
        Arc::new(registry),
        history,
        Arc::new(translator),
        AgentSettings::from_config(&cfg.agent, &cfg.llm),
    )
}
