//! # Configuración del Servidor
//! src/config.rs
//!
//! Configuración del servidor con soporte para argumentos CLI y variables de
//! entorno.
//!
//! ## Ejemplos de uso
//!
//! ### CLI
//! ```bash
//! ./static_server --port 8080 \
//!   --root ./www \
//!   --workers 8 \
//!   --queue-capacity 50 \
//!   --read-timeout-ms 5000
//! ```
//!
//! ### Variables de entorno
//! ```bash
//! HTTP_PORT=8080 CONTENT_ROOT=/srv/www CONCURRENCY_MODE=capped ./static_server
//! ```

use crate::error::ConfigError;
use crate::pool::{PoolSettings, ShutdownMode};
use crate::server::engine::EngineSettings;
use clap::{Parser, ValueEnum};
use std::time::Duration;
use tracing::info;

/// Máximo de workers aceptado
pub const MAX_WORKERS: usize = 1024;

/// Tamaño mínimo del buffer de request
pub const MIN_REQUEST_BYTES: usize = 16;

/// Estrategia de concurrencia
///
/// Las tres se ejecutan sobre el mismo `WorkerPool`; `capped` y `single` son
/// configuraciones degeneradas del pool con cola de capacidad 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ConcurrencyMode {
    /// Pool fijo de workers alimentado por una cola acotada
    Pool,
    /// Un worker por conexión, limitado a `workers` conexiones simultáneas
    Capped,
    /// Una conexión a la vez
    Single,
}

/// Configuración del servidor de archivos
#[derive(Debug, Clone, Parser)]
#[command(name = "static_server")]
#[command(about = "Servidor HTTP/1.0 de archivos estáticos con pool de workers acotado")]
#[command(version = "0.1.0")]
pub struct Config {
    /// Puerto en el que escucha el servidor
    #[arg(short, long, default_value = "8080", env = "HTTP_PORT")]
    pub port: u16,

    /// Host/IP en el que escucha
    #[arg(long, default_value = "127.0.0.1", env = "HTTP_HOST")]
    pub host: String,

    /// Directorio desde el que se sirven los archivos
    #[arg(long, default_value = "./www", env = "CONTENT_ROOT")]
    pub root: String,

    /// Archivo servido para `GET /`
    #[arg(long, default_value = "index.html", env = "INDEX_FILE")]
    pub index: String,

    // === Concurrencia ===

    /// Estrategia de concurrencia
    #[arg(long, value_enum, default_value = "pool", env = "CONCURRENCY_MODE")]
    pub mode: ConcurrencyMode,

    /// Workers del pool (o conexiones simultáneas en modo capped)
    #[arg(short, long, default_value = "5", env = "WORKERS")]
    pub workers: usize,

    /// Capacidad de la cola de conexiones pendientes (modo pool)
    #[arg(long = "queue-capacity", default_value = "50", env = "QUEUE_CAPACITY")]
    pub queue_capacity: usize,

    /// Modo de shutdown del pool al detener el servidor
    #[arg(long = "shutdown", value_enum, default_value = "graceful", env = "SHUTDOWN_MODE")]
    pub shutdown: ShutdownMode,

    // === Límites por conexión ===

    /// Deadline de lectura en milisegundos (0 = sin límite)
    #[arg(long = "read-timeout-ms", default_value = "5000", env = "READ_TIMEOUT_MS")]
    pub read_timeout_ms: u64,

    /// Deadline de escritura en milisegundos (0 = sin límite)
    #[arg(long = "write-timeout-ms", default_value = "5000", env = "WRITE_TIMEOUT_MS")]
    pub write_timeout_ms: u64,

    /// Tamaño máximo del head del request
    #[arg(long = "max-request-bytes", default_value = "8192", env = "MAX_REQUEST_BYTES")]
    pub max_request_bytes: usize,

    /// Latencia artificial antes de leer cada request (solo para pruebas)
    #[arg(long = "simulated-latency-ms", default_value = "0", env = "SIMULATED_LATENCY_MS")]
    pub simulated_latency_ms: u64,
}

impl Config {
    /// Crea una nueva configuración parseando argumentos CLI
    pub fn new() -> Self {
        Config::parse()
    }

    /// Obtiene la dirección completa para bind (host:port)
    ///
    /// # Ejemplo
    /// ```rust
    /// use static_server::config::Config;
    ///
    /// let config = Config::default();
    /// assert_eq!(config.address(), "127.0.0.1:8080");
    /// ```
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Valida la configuración
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.workers == 0 {
            return Err(ConfigError::NoWorkers);
        }
        if self.workers > MAX_WORKERS {
            return Err(ConfigError::TooManyWorkers { max: MAX_WORKERS });
        }
        if self.mode == ConcurrencyMode::Pool && self.queue_capacity == 0 {
            return Err(ConfigError::ZeroQueueCapacity);
        }
        if self.max_request_bytes < MIN_REQUEST_BYTES {
            return Err(ConfigError::RequestLimitTooSmall { min: MIN_REQUEST_BYTES });
        }
        if self.index.trim().is_empty() {
            return Err(ConfigError::EmptyIndex);
        }
        Ok(())
    }

    /// Traduce el modo de concurrencia a tamaño de pool y cola
    ///
    /// # Ejemplo
    /// ```rust
    /// use static_server::config::{ConcurrencyMode, Config};
    ///
    /// let mut config = Config::default();
    /// config.mode = ConcurrencyMode::Single;
    /// let settings = config.pool_settings();
    /// assert_eq!((settings.workers, settings.capacity), (1, 1));
    /// ```
    pub fn pool_settings(&self) -> PoolSettings {
        match self.mode {
            ConcurrencyMode::Pool => PoolSettings {
                workers: self.workers,
                capacity: self.queue_capacity,
            },
            ConcurrencyMode::Capped => PoolSettings {
                workers: self.workers,
                capacity: 1,
            },
            ConcurrencyMode::Single => PoolSettings {
                workers: 1,
                capacity: 1,
            },
        }
    }

    pub fn engine_settings(&self) -> EngineSettings {
        EngineSettings {
            max_request_bytes: self.max_request_bytes,
            read_timeout: millis(self.read_timeout_ms),
            write_timeout: millis(self.write_timeout_ms),
            simulated_latency: millis(self.simulated_latency_ms),
        }
    }

    /// Registra un resumen de la configuración
    pub fn log_summary(&self) {
        let pool = self.pool_settings();
        info!(
            address = %self.address(),
            root = %self.root,
            index = %self.index,
            mode = ?self.mode,
            workers = pool.workers,
            queue_capacity = pool.capacity,
            read_timeout_ms = self.read_timeout_ms,
            write_timeout_ms = self.write_timeout_ms,
            max_request_bytes = self.max_request_bytes,
            simulated_latency_ms = self.simulated_latency_ms,
            shutdown = ?self.shutdown,
            "configuration loaded"
        );
    }
}

fn millis(ms: u64) -> Option<Duration> {
    (ms > 0).then(|| Duration::from_millis(ms))
}

impl Default for Config {
    /// Configuración por defecto
    fn default() -> Self {
        Self {
            port: 8080,
            host: "127.0.0.1".to_string(),
            root: "./www".to_string(),
            index: "index.html".to_string(),
            mode: ConcurrencyMode::Pool,
            workers: 5,
            queue_capacity: 50,
            shutdown: ShutdownMode::Graceful,
            read_timeout_ms: 5_000,
            write_timeout_ms: 5_000,
            max_request_bytes: 8192,
            simulated_latency_ms: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.port, 8080);
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.workers, 5);
        assert_eq!(config.queue_capacity, 50);
        assert_eq!(config.mode, ConcurrencyMode::Pool);
        assert_eq!(config.shutdown, ShutdownMode::Graceful);
    }

    #[test]
    fn test_address_custom() {
        let mut config = Config::default();
        config.host = "0.0.0.0".to_string();
        config.port = 3000;
        assert_eq!(config.address(), "0.0.0.0:3000");
    }

    #[test]
    fn test_validate_success() {
        assert!(Config::default().validate().is_ok());
    }

    // ==================== Validation ====================

    #[test]
    fn test_validate_invalid_workers() {
        let mut config = Config::default();
        config.workers = 0;
        assert_eq!(config.validate(), Err(ConfigError::NoWorkers));

        config.workers = MAX_WORKERS + 1;
        assert_eq!(config.validate(), Err(ConfigError::TooManyWorkers { max: MAX_WORKERS }));
    }

    #[test]
    fn test_validate_queue_capacity_only_matters_in_pool_mode() {
        let mut config = Config::default();
        config.queue_capacity = 0;
        assert_eq!(config.validate(), Err(ConfigError::ZeroQueueCapacity));

        config.mode = ConcurrencyMode::Capped;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_request_limit() {
        let mut config = Config::default();
        config.max_request_bytes = 4;
        assert_eq!(
            config.validate(),
            Err(ConfigError::RequestLimitTooSmall { min: MIN_REQUEST_BYTES })
        );
    }

    #[test]
    fn test_validate_empty_index() {
        let mut config = Config::default();
        config.index = "  ".to_string();
        assert_eq!(config.validate(), Err(ConfigError::EmptyIndex));
    }

    // ==================== Derived settings ====================

    #[test]
    fn test_pool_settings_per_mode() {
        let mut config = Config::default();
        config.workers = 8;
        config.queue_capacity = 64;

        let pool = config.pool_settings();
        assert_eq!((pool.workers, pool.capacity), (8, 64));

        config.mode = ConcurrencyMode::Capped;
        let capped = config.pool_settings();
        assert_eq!((capped.workers, capped.capacity), (8, 1));

        config.mode = ConcurrencyMode::Single;
        let single = config.pool_settings();
        assert_eq!((single.workers, single.capacity), (1, 1));
    }

    #[test]
    fn test_engine_settings_zero_disables_timeouts() {
        let mut config = Config::default();
        config.read_timeout_ms = 0;
        config.simulated_latency_ms = 250;

        let engine = config.engine_settings();
        assert_eq!(engine.read_timeout, None);
        assert_eq!(engine.write_timeout, Some(Duration::from_millis(5_000)));
        assert_eq!(engine.simulated_latency, Some(Duration::from_millis(250)));
        assert_eq!(engine.max_request_bytes, 8192);
    }

    #[test]
    fn test_parse_from_cli_args() {
        let config = Config::try_parse_from([
            "static_server",
            "--port",
            "9000",
            "--root",
            "/srv/www",
            "--mode",
            "capped",
            "--workers",
            "3",
            "--shutdown",
            "abrupt",
        ])
        .unwrap();

        assert_eq!(config.port, 9000);
        assert_eq!(config.root, "/srv/www");
        assert_eq!(config.mode, ConcurrencyMode::Capped);
        assert_eq!(config.workers, 3);
        assert_eq!(config.shutdown, ShutdownMode::Abrupt);
    }

    #[test]
    fn test_log_summary_does_not_panic() {
        Config::default().log_summary();
    }
}
