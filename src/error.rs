//! # Errores del Servidor
//! src/error.rs
//!
//! Los fallos por conexión (transporte, request malformado, recurso ausente)
//! se resuelven dentro del worker y nunca llegan aquí. Estos tipos cubren lo
//! que sí se reporta al llamador: configuración inválida, ciclo de vida del
//! pool y errores del listener.

use std::io;
use thiserror::Error;

/// Configuración inválida
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("workers must be >= 1")]
    NoWorkers,

    #[error("workers must be <= {max}")]
    TooManyWorkers { max: usize },

    #[error("queue capacity must be >= 1")]
    ZeroQueueCapacity,

    #[error("max request bytes must be >= {min}")]
    RequestLimitTooSmall { min: usize },

    #[error("index file name must not be empty")]
    EmptyIndex,
}

/// Errores del ciclo de vida del pool de workers
#[derive(Debug, Error)]
pub enum PoolError {
    /// `submit` después de iniciado el shutdown. La conexión ya fue cerrada.
    #[error("worker pool is closed")]
    Closed,

    #[error("worker pool was already shut down")]
    AlreadyShutdown,

    #[error("worker pool was already started")]
    AlreadyStarted,

    #[error("failed to spawn worker {index}: {source}")]
    Spawn {
        index: usize,
        #[source]
        source: io::Error,
    },
}

/// Errores de nivel servidor (bind, accept loop, pool)
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("worker pool error: {0}")]
    Pool(#[from] PoolError),
}
