use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// 页面响应缓存
///
/// 以注入服务的方式提供给处理器，方便在测试中替换实现。
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ResponseCache: Send + Sync {
    async fn get(&self, key: &str) -> Option<String>;

    async fn set(&self, key: &str, value: String, ttl: Duration);

    async fn delete(&self, key: &str) -> bool;

    /// 立即清空所有缓存项
    async fn clear(&self);

    /// 删除已过期的缓存项，返回删除数量
    async fn purge_expired(&self) -> usize;
}

/// 缓存项
#[derive(Debug, Clone)]
struct CacheItem<T> {
    value: T,
    expires_at: Instant,
}

impl<T> CacheItem<T> {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at > now
    }
}

/// 简单的内存缓存实现
#[derive(Debug, Clone)]
pub struct Cache<T: Clone + Send + Sync> {
    data: Arc<RwLock<HashMap<String, CacheItem<T>>>>,
}

impl<T: Clone + Send + Sync + 'static> Cache<T> {
    /// 创建新的缓存实例
    pub fn new() -> Self {
        Self {
            data: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// 设置带有自定义TTL的缓存项
    pub fn insert_with_ttl(&self, key: String, value: T, ttl: Duration) {
        let item = CacheItem {
            value,
            expires_at: Instant::now() + ttl,
        };
        self.data.write().insert(key, item);
    }

    /// 获取未过期的缓存项
    pub fn lookup(&self, key: &str) -> Option<T> {
        let now = Instant::now();
        self.data
            .read()
            .get(key)
            .filter(|item| item.is_live(now))
            .map(|item| item.value.clone())
    }

    /// 删除缓存项
    pub fn remove(&self, key: &str) -> bool {
        self.data.write().remove(key).is_some()
    }

    /// 清空所有缓存
    pub fn remove_all(&self) {
        self.data.write().clear();
    }

    /// 清理过期项
    pub fn cleanup_expired(&self) -> usize {
        let now = Instant::now();
        let mut data = self.data.write();
        let before = data.len();
        data.retain(|_, item| item.is_live(now));
        before - data.len()
    }
}

impl<T: Clone + Send + Sync + 'static> Default for Cache<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ResponseCache for Cache<String> {
    async fn get(&self, key: &str) -> Option<String> {
        self.lookup(key)
    }

    async fn set(&self, key: &str, value: String, ttl: Duration) {
        self.insert_with_ttl(key.to_string(), value, ttl)
    }

    async fn delete(&self, key: &str) -> bool {
        self.remove(key)
    }

    async fn clear(&self) {
        self.remove_all()
    }

    async fn purge_expired(&self) -> usize {
        self.cleanup_expired()
    }
}

/// 生成页面缓存键：固定前缀 + 访问者 + 路径和查询串
pub fn page_key(prefix: &str, viewer_id: Option<i64>, path_and_query: &str) -> String {
    let viewer = viewer_id
        .map(|id| id.to_string())
        .unwrap_or_else(|| "anonymous".to_string());
    format!("{}:{}:{}", prefix, viewer, path_and_query)
}
