//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `STEWARD__*` 覆盖（双下划线表示嵌套，如 `STEWARD__AGENT__MAX_TURNS=8`）。
//! 所有键都有默认值，缺省配置即可在本地用 mock 模型跑通。

use std::path::PathBuf;

use serde::Deserialize;

use crate::core::AgentError;

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub app: AppSection,
    pub agent: AgentSection,
    pub llm: LlmSection,
    pub memory: MemorySection,
    pub translation: TranslationSection,
    pub tools: ToolsSection,
}

/// [app] 段
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppSection {
    pub name: Option<String>,
}

/// [agent] 段：主循环上限、采样温度、工作语言、工具并发、固定回复文案
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AgentSection {
    pub max_turns: usize,
    pub temperature: f32,
    pub working_language: String,
    /// 同一轮内的多个工具调用是否并发执行；结果始终按请求顺序写回
    pub concurrent_tools: bool,
    /// 超过 max_turns 仍无最终回复时返回
    pub degraded_message: String,
    /// 模型服务失败时返回
    pub failure_message: String,
    /// 覆盖内置系统提示词
    pub system_prompt: Option<String>,
}

pub const DEFAULT_DEGRADED_MESSAGE: &str =
    "Sorry, I couldn't finish that request. Could you try rephrasing it or breaking it into smaller steps?";
pub const DEFAULT_FAILURE_MESSAGE: &str =
    "Sorry, something went wrong on my side. Please try again in a moment.";

impl Default for AgentSection {
    fn default() -> Self {
        Self {
            max_turns: 6,
            temperature: 0.0,
            working_language: "en".to_string(),
            concurrent_tools: false,
            degraded_message: DEFAULT_DEGRADED_MESSAGE.to_string(),
            failure_message: DEFAULT_FAILURE_MESSAGE.to_string(),
            system_prompt: None,
        }
    }
}

/// [llm] 段：后端选择与超时
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmSection {
    /// 后端：openai / deepseek / mock
    pub provider: String,
    pub model: String,
    pub base_url: Option<String>,
    pub api_key: Option<String>,
    pub max_tokens: Option<u32>,
    pub timeouts: LlmTimeoutsSection,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            model: "gpt-4o-mini".to_string(),
            base_url: None,
            api_key: None,
            max_tokens: None,
            timeouts: LlmTimeoutsSection::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmTimeoutsSection {
    /// 单次模型调用超时（秒）
    pub request: u64,
}

impl Default for LlmTimeoutsSection {
    fn default() -> Self {
        Self { request: 60 }
    }
}

/// [memory] 段：会话轮数上限 K、滑动 TTL、可选 SQLite 路径
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MemorySection {
    pub max_turns: usize,
    pub ttl_secs: u64,
    /// 未设置时使用内存会话存储
    pub sqlite_path: Option<PathBuf>,
}

impl Default for MemorySection {
    fn default() -> Self {
        Self {
            max_turns: 20,
            ttl_secs: 1800,
            sqlite_path: None,
        }
    }
}

/// [translation] 段
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TranslationSection {
    pub enabled: bool,
    /// 0 表示不缓存
    pub cache_capacity: usize,
    /// 按顺序尝试
    pub providers: Vec<TranslationProviderSection>,
}

impl Default for TranslationSection {
    fn default() -> Self {
        Self {
            enabled: true,
            cache_capacity: 256,
            providers: Vec::new(),
        }
    }
}

/// [[translation.providers]] 条目
#[derive(Debug, Clone, Deserialize)]
pub struct TranslationProviderSection {
    /// http（LibreTranslate 兼容）或 llm
    pub kind: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_translation_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_translation_timeout_secs() -> u64 {
    5
}

/// [tools] 段
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ToolsSection {
    /// 单次工具调用超时（秒）
    pub tool_timeout_secs: u64,
}

impl Default for ToolsSection {
    fn default() -> Self {
        Self {
            tool_timeout_secs: 30,
        }
    }
}

/// 从 config 目录加载配置，环境变量 STEWARD__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml、default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量 STEWARD__*（双下划线表示嵌套键）
/// 4. 反序列化后校验取值范围，失败返回 AgentError::Config
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, AgentError> {
    let mut builder = config::Config::builder();

    let default_names = ["config/default", "../config/default", "default"];
    for name in default_names {
        let path = format!("{}.toml", name);
        if std::path::Path::new(&path).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(ref path) = config_path {
        if path.exists() {
            builder = builder.add_source(config::File::from(path.clone()).required(false));
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix("STEWARD")
            .separator("__")
            .try_parsing(true),
    );

    let cfg: AppConfig = builder
        .build()
        .and_then(|c| c.try_deserialize())
        .map_err(|e| AgentError::Config(e.to_string()))?;
    cfg.validate()?;
    Ok(cfg)
}

impl AppConfig {
    /// 拒绝会让主循环或翻译层无法工作的取值
    pub fn validate(&self) -> Result<(), AgentError> {
        if self.agent.max_turns == 0 {
            return Err(AgentError::Config("agent.max_turns must be at least 1".to_string()));
        }
        if self.agent.working_language.trim().is_empty() {
            return Err(AgentError::Config("agent.working_language must not be empty".to_string()));
        }
        if self.memory.max_turns == 0 {
            return Err(AgentError::Config("memory.max_turns must be at least 1".to_string()));
        }
        if let Some(p) = self
            .translation
            .providers
            .iter()
            .find(|p| p.kind.eq_ignore_ascii_case("http") && p.url.is_none())
        {
            return Err(AgentError::Config(format!(
                "translation provider '{}' of kind http needs a url",
                p.name.as_deref().unwrap_or(&p.kind)
            )));
        }
        Ok(())
    }
}
