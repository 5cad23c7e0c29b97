//! 翻译级联
//!
//! 按顺序尝试提供方，每个都有独立超时；失败或返回空文本即落到下一个。
//! translate 从不报错：全部失败时返回原文，因此翻译故障不会阻塞或打断主循环。

use std::sync::Arc;
use std::time::Duration;

use tokio::time::timeout;

use crate::core::AgentError;
use crate::translation::{same_language, TranslationCache, TranslationProvider};

struct ProviderSlot {
    provider: Arc<dyn TranslationProvider>,
    timeout: Duration,
}

/// 有序的翻译提供方链 + 可选结果缓存
#[derive(Default)]
pub struct TranslationCascade {
    providers: Vec<ProviderSlot>,
    cache: Option<TranslationCache>,
}

impl TranslationCascade {
    pub fn new() -> Self {
        Self::default()
    }

    /// 追加一个提供方（按追加顺序尝试）
    pub fn with_provider(mut self, provider: Arc<dyn TranslationProvider>, timeout: Duration) -> Self {
        self.providers.push(ProviderSlot { provider, timeout });
        self
    }

    /// capacity 为 0 时不启用缓存
    pub fn with_cache(mut self, capacity: usize) -> Self {
        self.cache = (capacity > 0).then(|| TranslationCache::new(capacity));
        self
    }

    pub fn provider_names(&self) -> Vec<&str> {
        self.providers.iter().map(|s| s.provider.name()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    /// 翻译文本；同语言或空白输入原样返回，全部提供方失败时返回原文
    pub async fn translate(&self, text: &str, source: &str, target: &str) -> String {
        if text.trim().is_empty() || same_language(source, target) {
            return text.to_string();
        }
        if let Some(hit) = self.cache.as_ref().and_then(|c| c.get(text, source, target)) {
            return hit;
        }

        for slot in &self.providers {
            let name = slot.provider.name();
            match self.try_provider(slot, text, source, target).await {
                Ok(translated) => {
                    tracing::debug!(provider = %name, source = %source, target = %target, "translated");
                    if let Some(cache) = &self.cache {
                        cache.put(text, source, target, translated.clone());
                    }
                    return translated;
                }
                Err(e) => {
                    tracing::warn!(provider = %name, "translation provider failed: {}", e);
                }
            }
        }

        if !self.providers.is_empty() {
            tracing::warn!(
                source = %source,
                target = %target,
                "all translation providers failed, passing text through untranslated"
            );
        }
        text.to_string()
    }

    async fn try_provider(
        &self,
        slot: &ProviderSlot,
        text: &str,
        source: &str,
        target: &str,
    ) -> Result<String, AgentError> {
        let translated = timeout(slot.timeout, slot.provider.translate(text, source, target))
            .await
            .map_err(|_| {
                AgentError::Translation(format!("timed out after {}ms", slot.timeout.as_millis()))
            })??;
        if translated.trim().is_empty() {
            return Err(AgentError::Translation("empty translation".to_string()));
        }
        Ok(translated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    enum Behaviour {
        Ok(&'static str),
        Fail,
        Hang,
        Empty,
    }

    struct FakeProvider {
        name: &'static str,
        behaviour: Behaviour,
        calls: AtomicUsize,
    }

    impl FakeProvider {
        fn new(name: &'static str, behaviour: Behaviour) -> Arc<Self> {
            Arc::new(Self {
                name,
                behaviour,
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl TranslationProvider for FakeProvider {
        fn name(&self) -> &str {
            self.name
        }

        async fn translate(&self, _text: &str, _source: &str, _target: &str) -> Result<String, AgentError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.behaviour {
                Behaviour::Ok(s) => Ok(s.to_string()),
                Behaviour::Fail => Err(AgentError::Translation("HTTP 503".into())),
                Behaviour::Hang => {
                    tokio::time::sleep(Duration::from_secs(5)).await;
                    Ok("too late".to_string())
                }
                Behaviour::Empty => Ok("   ".to_string()),
            }
        }
    }

    const SHORT: Duration = Duration::from_millis(50);

    #[tokio::test]
    async fn test_falls_through_to_next_provider() {
        let first = FakeProvider::new("primary", Behaviour::Fail);
        let second = FakeProvider::new("secondary", Behaviour::Ok("hello"));
        let cascade = TranslationCascade::new()
            .with_provider(first.clone(), SHORT)
            .with_provider(second.clone(), SHORT);
        assert_eq!(cascade.translate("hola", "es", "en").await, "hello");
        assert_eq!(first.calls.load(Ordering::SeqCst), 1);
        assert_eq!(second.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_timeout_and_empty_output_fall_through() {
        let cascade = TranslationCascade::new()
            .with_provider(FakeProvider::new("slow", Behaviour::Hang), SHORT)
            .with_provider(FakeProvider::new("blank", Behaviour::Empty), SHORT)
            .with_provider(FakeProvider::new("good", Behaviour::Ok("hello")), SHORT);
        assert_eq!(cascade.translate("hola", "es", "en").await, "hello");
    }

    #[tokio::test]
    async fn test_total_failure_returns_original() {
        let cascade = TranslationCascade::new()
            .with_provider(FakeProvider::new("a", Behaviour::Fail), SHORT)
            .with_provider(FakeProvider::new("b", Behaviour::Hang), SHORT);
        assert_eq!(cascade.translate("hola mundo", "es", "en").await, "hola mundo");
    }

    #[tokio::test]
    async fn test_same_language_skips_providers() {
        let p = FakeProvider::new("a", Behaviour::Ok("changed"));
        let cascade = TranslationCascade::new().with_provider(p.clone(), SHORT);
        assert_eq!(cascade.translate("hello", "en-US", "en").await, "hello");
        assert_eq!(p.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_cache_avoids_second_call() {
        let p = FakeProvider::new("a", Behaviour::Ok("hello"));
        let cascade = TranslationCascade::new()
            .with_provider(p.clone(), SHORT)
            .with_cache(8);
        assert_eq!(cascade.translate("hola", "es", "en").await, "hello");
        assert_eq!(cascade.translate("hola", "es", "en").await, "hello");
        assert_eq!(p.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failures_are_not_cached() {
        let p = FakeProvider::new("a", Behaviour::Fail);
        let cascade = TranslationCascade::new()
            .with_provider(p.clone(), SHORT)
            .with_cache(8);
        cascade.translate("hola", "es", "en").await;
        cascade.translate("hola", "es", "en").await;
        assert_eq!(p.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_no_providers_passes_through() {
        let cascade = TranslationCascade::new();
        assert_eq!(cascade.translate("hola", "es", "en").await, "hola");
    }

    proptest::proptest! {
        #[test]
        fn prop_translate_never_empty_for_non_empty_input(text in "\\PC{1,40}") {
            let rt = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
            let cascade = TranslationCascade::new()
                .with_provider(FakeProvider::new("fail", Behaviour::Fail), SHORT)
                .with_provider(FakeProvider::new("blank", Behaviour::Empty), SHORT);
            let out = rt.block_on(cascade.translate(&text, "es", "en"));
            proptest::prop_assert_eq!(out, text);
        }
    }
}
