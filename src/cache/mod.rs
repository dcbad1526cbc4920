//! Cache
//!
//! Este módulo contiene el cache clave/valor con TTL. Cualquier falla de
//! infraestructura se degrada a semántica de "miss": ningún método falla.

pub mod cache_config;
pub mod memory_cache;
pub mod redis_client;

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use tracing::warn;

pub use cache_config::{CacheConfig, CacheKeys};
pub use memory_cache::MemoryCache;
pub use redis_client::RedisClient;

/// Operaciones de cache
#[async_trait]
pub trait CacheOperations: Send + Sync {
    /// Valor crudo o `None` en miss / cache no disponible
    async fn get(&self, key: &str) -> Option<String>;

    /// `true` si el valor quedó guardado
    async fn set(&self, key: &str, value: &str, ttl_seconds: u64) -> bool;

    async fn delete(&self, key: &str);

    /// Eliminar todas las claves que coinciden con un glob (`*`, `?`)
    async fn delete_by_pattern(&self, pattern: &str) -> u64;

    /// Capacidad: el backend está conectado
    async fn is_available(&self) -> bool;
}

impl dyn CacheOperations {
    /// Leer y deserializar JSON; un valor corrupto cuenta como miss
    pub async fn get_json<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = self.get(key).await?;
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!("⚠️ Valor de cache inválido para clave {}: {}", key, e);
                self.delete(key).await;
                None
            }
        }
    }

    pub async fn set_json<T: Serialize + Sync>(&self, key: &str, value: &T, ttl_seconds: u64) -> bool {
        match serde_json::to_string(value) {
            Ok(serialized) => self.set(key, &serialized, ttl_seconds).await,
            Err(e) => {
                warn!("⚠️ No se pudo serializar valor para clave {}: {}", key, e);
                false
            }
        }
    }
}

/// Convertir un glob de Redis a regex anclada
pub(crate) fn glob_to_regex(pattern: &str) -> Result<regex::Regex, regex::Error> {
    let mut expr = String::with_capacity(pattern.len() + 2);
    expr.push('^');
    for ch in pattern.chars() {
        match ch {
            '*' => expr.push_str(".*"),
            '?' => expr.push('.'),
            other => expr.push_str(&regex::escape(&other.to_string())),
        }
    }
    expr.push('$');
    regex::Regex::new(&expr)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_glob_to_regex() {
        let re = glob_to_regex("afrozon:listings:*").unwrap();
        assert!(re.is_match("afrozon:listings:abc123"));
        assert!(!re.is_match("afrozon:vehicle:vin:X"));

        let re = glob_to_regex("a?c.d").unwrap();
        assert!(re.is_match("abc.d"));
        assert!(!re.is_match("abcxd"));
    }
}
