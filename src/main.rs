use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use dotenvy::dotenv;
use tokio::signal;
use tracing::{error, info, warn};

use afrozon_backend::build_router;
use afrozon_backend::cache::{memory_cache::MemoryCache, redis_client::RedisClient, CacheOperations};
use afrozon_backend::clients::exchange_rate::HttpRateSource;
use afrozon_backend::clients::listing_provider::HttpListingProvider;
use afrozon_backend::config::database::run_migrations;
use afrozon_backend::config::environment::EnvironmentConfig;
use afrozon_backend::services::ManualPaymentGateway;
use afrozon_backend::state::{AppState, Backends};

#[tokio::main]
async fn main() -> Result<()> {
    // Cargar variables de entorno
    dotenv().ok();
    let config = EnvironmentConfig::from_env()?;

    // Configurar logging
    tracing_subscriber::fmt()
        .with_max_level(config.tracing_level())
        .init();

    info!("🚗 AfroZon - Backend de importación de vehículos");
    info!("================================================");
    info!("🌍 Entorno: {}", config.environment);

    // Inicializar base de datos
    let pool = match config.database().create_pool().await {
        Ok(pool) => pool,
        Err(e) => {
            error!("❌ Error conectando a la base de datos: {}", e);
            return Err(anyhow::anyhow!("Error de base de datos: {}", e));
        }
    };
    run_migrations(&pool)
        .await
        .context("database migrations failed")?;
    info!("✅ Migraciones aplicadas");

    // Cache: Redis si está configurado, memoria en otro caso
    let cache: Arc<dyn CacheOperations> = match config.cache().redis_url {
        Some(url) => Arc::new(RedisClient::connect(&url).await) as Arc<dyn CacheOperations>,
        None => {
            warn!("⚠️ REDIS_URL no definido, usando cache en memoria");
            Arc::new(MemoryCache::new())
        }
    };

    let provider = HttpListingProvider::new(config.listing_provider())
        .map_err(|e| anyhow::anyhow!("listing provider client: {}", e))?;
    let rates = HttpRateSource::new(config.exchange_rate_api_url.clone(), config.request_timeout())?;

    let backends = Backends::postgres(
        pool,
        cache,
        Arc::new(provider),
        Arc::new(rates),
        Arc::new(ManualPaymentGateway),
    );

    let addr: SocketAddr = config.server_url().parse()?;
    let app = build_router(AppState::new(config, backends));

    info!("🌐 Servidor iniciando en http://{}", addr);
    info!("🔍 Endpoints disponibles:");
    info!("   GET  /health");
    info!("   GET|POST /api/vehicles, GET|PUT|DELETE /api/vehicles/:id");
    info!("   GET|POST /api/orders, /api/orders/:id/...");
    info!("   GET  /api/pricing/landed-cost, GET|PUT /api/pricing/fees");
    info!("   POST /api/payments/webhook");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        error!("❌ Error del servidor: {}", e);
        return Err(e.into());
    }

    info!("👋 Servidor terminado");
    Ok(())
}

/// Señal de apagado graceful
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("❌ No se pudo escuchar Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("❌ No se pudo instalar el handler de SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("🛑 Señal Ctrl+C recibida, apagando servidor...");
        },
        _ = terminate => {
            info!("🛑 Señal de terminación recibida, apagando servidor...");
        },
    }
}
