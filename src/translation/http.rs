//! HTTP 翻译提供方（LibreTranslate 兼容接口）
//!
//! POST {url}，JSON 体 {"q", "source", "target", "format": "text", "api_key"?}，
//! 成功响应取 translatedText；非 2xx 或缺字段视为失败。

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::core::AgentError;
use crate::translation::{primary_language, TranslationProvider};

#[derive(Serialize)]
struct TranslateRequest<'a> {
    q: &'a str,
    source: String,
    target: String,
    format: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    api_key: Option<&'a str>,
}

#[derive(Deserialize)]
struct TranslateResponse {
    #[serde(rename = "translatedText")]
    translated_text: Option<String>,
    error: Option<String>,
}

/// LibreTranslate 兼容的 HTTP 提供方
pub struct HttpTranslationProvider {
    name: String,
    client: Client,
    url: String,
    api_key: Option<String>,
}

impl HttpTranslationProvider {
    /// timeout 作为 reqwest 客户端的整体超时；级联层另有独立超时
    pub fn new(name: impl Into<String>, url: impl Into<String>, api_key: Option<String>, timeout: Duration) -> Self {
        let name = name.into();
        let client = Client::builder().timeout(timeout).build().unwrap_or_else(|e| {
            tracing::warn!(
                provider = %name,
                "failed to build HTTP client, using defaults without the configured timeout: {}",
                e
            );
            Client::new()
        });
        Self {
            name,
            client,
            url: url.into(),
            api_key,
        }
    }
}

fn failed(e: impl std::fmt::Display) -> AgentError {
    AgentError::Translation(e.to_string())
}

#[async_trait]
impl TranslationProvider for HttpTranslationProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn translate(&self, text: &str, source: &str, target: &str) -> Result<String, AgentError> {
        let body = TranslateRequest {
            q: text,
            source: primary_language(source),
            target: primary_language(target),
            format: "text",
            api_key: self.api_key.as_deref(),
        };
        let resp = self
            .client
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .map_err(|e| failed(format!("request failed: {e}")))?;
        if !resp.status().is_success() {
            return Err(failed(format!("HTTP {}", resp.status())));
        }
        let parsed: TranslateResponse = resp
            .json()
            .await
            .map_err(|e| failed(format!("read body: {e}")))?;
        match (parsed.translated_text, parsed.error) {
            (Some(t), _) => Ok(t),
            (None, Some(err)) => Err(failed(err)),
            (None, None) => Err(failed("response without translatedText")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_body_uses_primary_subtags() {
        let body = TranslateRequest {
            q: "hola",
            source: primary_language("es-MX"),
            target: primary_language("en"),
            format: "text",
            api_key: None,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["source"], "es");
        assert!(json.get("api_key").is_none());
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_translation_error() {
        let provider = HttpTranslationProvider::new(
            "local",
            "http://127.0.0.1:9/translate",
            None,
            Duration::from_millis(200),
        );
        let err = provider.translate("hola", "es", "en").await.unwrap_err();
        assert!(matches!(err, AgentError::Translation(_)));
    }

    #[tokio::test]
    async fn test_configured_timeout_bounds_silent_endpoint() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        // 接受连接但从不响应
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });

        let provider = HttpTranslationProvider::new(
            "silent",
            format!("http://{addr}/translate"),
            None,
            Duration::from_millis(100),
        );
        let outcome = tokio::time::timeout(Duration::from_secs(5), provider.translate("hola", "es", "en")).await;
        assert!(matches!(outcome, Ok(Err(AgentError::Translation(_)))));
    }
}
