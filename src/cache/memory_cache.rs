//! Cache en memoria con TTL
//!
//! Implementa `CacheOperations` sin infraestructura externa: se usa en
//! despliegues sin Redis y en los tests.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use super::{glob_to_regex, CacheOperations};

/// Entrada en cache con su expiración
#[derive(Debug, Clone)]
struct CachedEntry {
    value: String,
    expires_at: Instant,
}

/// Estadísticas del cache
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries_created: u64,
    pub entries_expired: u64,
}

#[derive(Default)]
pub struct MemoryCache {
    entries: RwLock<HashMap<String, CachedEntry>>,
    stats: RwLock<CacheStats>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get_stats(&self) -> CacheStats {
        self.stats.read().await.clone()
    }

    pub async fn size(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Eliminar entradas expiradas
    pub async fn cleanup_expired(&self) -> u64 {
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, entry| entry.expires_at > now);
        let cleaned = (before - entries.len()) as u64;
        self.stats.write().await.entries_expired += cleaned;
        cleaned
    }
}

#[async_trait]
impl CacheOperations for MemoryCache {
    async fn get(&self, key: &str) -> Option<String> {
        let mut entries = self.entries.write().await;
        let mut stats = self.stats.write().await;

        match entries.get(key) {
            Some(entry) if entry.expires_at > Instant::now() => {
                stats.hits += 1;
                debug!("📥 Cache HIT para clave: {}", key);
                Some(entry.value.clone())
            }
            Some(_) => {
                entries.remove(key);
                stats.entries_expired += 1;
                stats.misses += 1;
                debug!("❌ Cache MISS (expirada) para clave: {}", key);
                None
            }
            None => {
                stats.misses += 1;
                debug!("❌ Cache MISS para clave: {}", key);
                None
            }
        }
    }

    async fn set(&self, key: &str, value: &str, ttl_seconds: u64) -> bool {
        let entry = CachedEntry {
            value: value.to_string(),
            expires_at: Instant::now() + Duration::from_secs(ttl_seconds),
        };
        self.entries.write().await.insert(key.to_string(), entry);
        self.stats.write().await.entries_created += 1;
        debug!("💾 Cache SET para clave: {} (TTL: {}s)", key, ttl_seconds);
        true
    }

    async fn delete(&self, key: &str) {
        self.entries.write().await.remove(key);
    }

    async fn delete_by_pattern(&self, pattern: &str) -> u64 {
        let re = match glob_to_regex(pattern) {
            Ok(re) => re,
            Err(e) => {
                warn!("⚠️ Patrón de cache inválido {}: {}", pattern, e);
                return 0;
            }
        };
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|key, _| !re.is_match(key));
        let removed = (before - entries.len()) as u64;
        debug!("🗑️ Cache DELETE patrón {} (eliminados: {})", pattern, removed);
        removed
    }

    async fn is_available(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_cache_basic_operations() {
        let cache = MemoryCache::new();
        assert!(cache.set("afrozon:vehicle:vin:A", "{\"x\":1}", 60).await);
        assert_eq!(cache.get("afrozon:vehicle:vin:A").await.as_deref(), Some("{\"x\":1}"));
        assert_eq!(cache.get("missing").await, None);

        let stats = cache.get_stats().await;
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.entries_created, 1);
    }

    #[tokio::test]
    async fn test_zero_ttl_expires_immediately() {
        let cache = MemoryCache::new();
        cache.set("k", "v", 0).await;
        assert_eq!(cache.get("k").await, None);
        assert_eq!(cache.get_stats().await.entries_expired, 1);
    }

    #[tokio::test]
    async fn test_delete_by_pattern() {
        let cache = MemoryCache::new();
        cache.set("afrozon:listings:aaa", "1", 60).await;
        cache.set("afrozon:listings:bbb", "2", 60).await;
        cache.set("afrozon:exchange_rate:USD:NGN", "1500", 60).await;

        assert_eq!(cache.delete_by_pattern("afrozon:listings:*").await, 2);
        assert_eq!(cache.size().await, 1);
        assert!(cache.get("afrozon:exchange_rate:USD:NGN").await.is_some());
    }

    #[tokio::test]
    async fn test_json_helpers_through_trait_object() {
        let cache: std::sync::Arc<dyn CacheOperations> = std::sync::Arc::new(MemoryCache::new());
        cache.set_json("k", &vec![1, 2, 3], 60).await;
        let value: Option<Vec<i32>> = cache.get_json("k").await;
        assert_eq!(value, Some(vec![1, 2, 3]));

        cache.set("bad", "not json", 60).await;
        let value: Option<Vec<i32>> = cache.get_json("bad").await;
        assert_eq!(value, None);
        assert_eq!(cache.get("bad").await, None);
    }
}
