use async_trait::async_trait;
use redis::{aio::ConnectionManager, AsyncCommands, RedisResult};
use tracing::{debug, error, info, warn};

use super::CacheOperations;

/// Cliente Redis con connection manager y operaciones async.
///
/// Si Redis no responde al iniciar, el cliente queda sin conexión y todas
/// las operaciones se comportan como miss.
#[derive(Clone)]
pub struct RedisClient {
    manager: Option<ConnectionManager>,
}

impl RedisClient {
    /// Conectar a Redis; nunca falla
    pub async fn connect(redis_url: &str) -> Self {
        info!("🔗 Conectando a Redis: {}", redis_url);

        match Self::open(redis_url).await {
            Ok(manager) => {
                info!("✅ Redis conectado exitosamente");
                Self { manager: Some(manager) }
            }
            Err(e) => {
                warn!("⚠️ Redis no disponible, cache deshabilitado: {}", e);
                Self::disconnected()
            }
        }
    }

    /// Cliente sin conexión: todas las lecturas son miss
    pub fn disconnected() -> Self {
        Self { manager: None }
    }

    async fn open(redis_url: &str) -> RedisResult<ConnectionManager> {
        let client = redis::Client::open(redis_url)?;
        let mut manager = ConnectionManager::new(client).await?;
        let _: String = redis::cmd("PING").query_async(&mut manager).await?;
        Ok(manager)
    }

    fn connection(&self) -> Option<ConnectionManager> {
        self.manager.clone()
    }
}

#[async_trait]
impl CacheOperations for RedisClient {
    async fn get(&self, key: &str) -> Option<String> {
        let mut conn = self.connection()?;

        match conn.get::<_, Option<String>>(key).await {
            Ok(Some(value)) => {
                debug!("📥 Cache HIT para clave: {}", key);
                Some(value)
            }
            Ok(None) => {
                debug!("❌ Cache MISS para clave: {}", key);
                None
            }
            Err(e) => {
                warn!("⚠️ Error leyendo cache para clave {}: {}", key, e);
                None
            }
        }
    }

    async fn set(&self, key: &str, value: &str, ttl_seconds: u64) -> bool {
        let Some(mut conn) = self.connection() else {
            return false;
        };
        if ttl_seconds == 0 {
            return false;
        }

        let result: RedisResult<()> = conn.set_ex(key, value, ttl_seconds).await;
        match result {
            Ok(()) => {
                debug!("💾 Cache SET para clave: {} (TTL: {}s)", key, ttl_seconds);
                true
            }
            Err(e) => {
                error!("❌ Error guardando en cache para clave {}: {}", key, e);
                false
            }
        }
    }

    async fn delete(&self, key: &str) {
        let Some(mut conn) = self.connection() else {
            return;
        };

        let result: RedisResult<i64> = conn.del(key).await;
        match result {
            Ok(count) => debug!("🗑️ Cache DELETE para clave: {} (eliminados: {})", key, count),
            Err(e) => warn!("⚠️ Error eliminando cache para clave {}: {}", key, e),
        }
    }

    async fn delete_by_pattern(&self, pattern: &str) -> u64 {
        let Some(mut conn) = self.connection() else {
            return 0;
        };

        let mut cursor: u64 = 0;
        let mut removed: u64 = 0;
        loop {
            let page: RedisResult<(u64, Vec<String>)> = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(pattern)
                .arg("COUNT")
                .arg(200)
                .query_async(&mut conn)
                .await;

            let (next, keys) = match page {
                Ok(page) => page,
                Err(e) => {
                    warn!("⚠️ Error escaneando patrón {}: {}", pattern, e);
                    break;
                }
            };

            if !keys.is_empty() {
                let deleted: RedisResult<u64> = conn.del(&keys).await;
                match deleted {
                    Ok(count) => removed += count,
                    Err(e) => warn!("⚠️ Error eliminando claves del patrón {}: {}", pattern, e),
                }
            }

            if next == 0 {
                break;
            }
            cursor = next;
        }

        debug!("🗑️ Cache DELETE patrón {} (eliminados: {})", pattern, removed);
        removed
    }

    async fn is_available(&self) -> bool {
        let Some(mut conn) = self.connection() else {
            return false;
        };
        match redis::cmd("PING").query_async::<_, String>(&mut conn).await {
            Ok(response) => response == "PONG",
            Err(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_disconnected_client_degrades_to_miss() {
        let client = RedisClient::disconnected();
        assert!(!client.is_available().await);
        assert!(!client.set("k", "v", 60).await);
        assert_eq!(client.get("k").await, None);
        assert_eq!(client.delete_by_pattern("*").await, 0);
        client.delete("k").await;
    }
}
