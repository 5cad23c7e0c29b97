//! 基于 LLM 的翻译提供方：专用翻译服务都不可用时，用同一模型服务兜底

use std::sync::Arc;

use async_trait::async_trait;

use crate::core::AgentError;
use crate::llm::LlmClient;
use crate::memory::Message;
use crate::translation::TranslationProvider;

pub struct LlmTranslationProvider {
    name: String,
    llm: Arc<dyn LlmClient>,
}

impl LlmTranslationProvider {
    pub fn new(name: impl Into<String>, llm: Arc<dyn LlmClient>) -> Self {
        Self {
            name: name.into(),
            llm,
        }
    }
}

fn instruction(source: &str, target: &str) -> String {
    format!(
        "Translate the user's message from language '{source}' to language '{target}'. \
         Reply with the translation only, without quotes, notes or explanations. \
         Keep names, numbers and identifiers unchanged."
    )
}

#[async_trait]
impl TranslationProvider for LlmTranslationProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn translate(&self, text: &str, source: &str, target: &str) -> Result<String, AgentError> {
        let messages = [Message::system(instruction(source, target)), Message::user(text)];
        let out = self
            .llm
            .complete(&messages)
            .await
            .map_err(|e| AgentError::Translation(e.to_string()))?;
        Ok(out.trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{LlmError, LlmResponse, ScriptedLlmClient};

    #[tokio::test]
    async fn test_llm_provider_returns_trimmed_text() {
        let llm = Arc::new(ScriptedLlmClient::new(vec![Ok(LlmResponse::text("  hello \n"))]));
        let provider = LlmTranslationProvider::new("llm", llm.clone());
        assert_eq!(provider.translate("hola", "es", "en").await.unwrap(), "hello");
        let req = &llm.requests()[0];
        assert!(req.messages[0].content.contains("'es'"));
        assert!(req.tool_names.is_empty());
    }

    #[tokio::test]
    async fn test_llm_provider_maps_errors() {
        let llm = Arc::new(ScriptedLlmClient::new(vec![Err(LlmError::Timeout)]));
        let provider = LlmTranslationProvider::new("llm", llm);
        assert!(matches!(
            provider.translate("hola", "es", "en").await,
            Err(AgentError::Translation(_))
        ));
    }
}
