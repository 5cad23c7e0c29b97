//! 翻译结果缓存：按 (原文, 源语言, 目标语言) 键控，容量满时淘汰最早写入的条目

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

type CacheKey = (String, String, String);

#[derive(Default)]
struct Inner {
    map: HashMap<CacheKey, String>,
    order: VecDeque<CacheKey>,
}

/// 有界 FIFO 缓存；只缓存成功的翻译
pub struct TranslationCache {
    capacity: usize,
    inner: Mutex<Inner>,
}

impl TranslationCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            inner: Mutex::new(Inner::default()),
        }
    }

    fn key(text: &str, source: &str, target: &str) -> CacheKey {
        (text.to_string(), source.to_lowercase(), target.to_lowercase())
    }

    pub fn get(&self, text: &str, source: &str, target: &str) -> Option<String> {
        let inner = self.inner.lock().ok()?;
        inner.map.get(&Self::key(text, source, target)).cloned()
    }

    pub fn put(&self, text: &str, source: &str, target: &str, translated: String) {
        let Ok(mut inner) = self.inner.lock() else {
            return;
        };
        let key = Self::key(text, source, target);
        if inner.map.insert(key.clone(), translated).is_none() {
            inner.order.push_back(key);
        }
        while inner.map.len() > self.capacity {
            match inner.order.pop_front() {
                Some(oldest) => {
                    inner.map.remove(&oldest);
                }
                None => break,
            }
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().map(|i| i.map.len()).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
