//! 翻译层：有序、失败即降级的多提供方级联
//!
//! 用户语言与工作语言不同时，在进入主循环前、返回用户前各翻译一次；
//! 任一提供方失败（超时 / 网络 / 非成功响应）即尝试下一个，全部失败返回原文。

pub mod cache;
pub mod cascade;
pub mod http;
pub mod llm;

use async_trait::async_trait;

use crate::core::AgentError;

pub use cache::TranslationCache;
pub use cascade::TranslationCascade;
pub use http::HttpTranslationProvider;
pub use llm::LlmTranslationProvider;

/// 翻译提供方：失败返回 AgentError::Translation，由级联吸收
#[async_trait]
pub trait TranslationProvider: Send + Sync {
    fn name(&self) -> &str;

    async fn translate(&self, text: &str, source: &str, target: &str) -> Result<String, AgentError>;
}

/// 语言标签的主子标签（小写），如 "en-US" -> "en"
pub fn primary_language(tag: &str) -> String {
    tag.trim()
        .split(|c: char| c == '-' || c == '_')
        .next()
        .unwrap_or_default()
        .to_lowercase()
}

pub fn same_language(a: &str, b: &str) -> bool {
    primary_language(a) == primary_language(b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_language_ignores_region_and_case() {
        assert!(same_language("en-US", "en"));
        assert!(same_language("EN", "en_gb"));
        assert!(!same_language("fr", "en"));
    }
}
