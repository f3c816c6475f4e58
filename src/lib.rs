//! # Static Server
//! src/lib.rs
//!
//! Servidor HTTP/1.0 concurrente de archivos estáticos. Un accept loop entrega
//! cada conexión a un pool fijo de workers a través de una cola acotada, y
//! cada worker ejecuta el intercambio request/response completo.
//!
//! ## Arquitectura
//!
//! - `http`: request line, responses, códigos de estado y tipos MIME
//! - `content`: resolución segura de targets dentro del directorio raíz
//! - `pool`: cola acotada y pool de workers con shutdown ordenado o abrupto
//! - `server`: motor de protocolo por conexión y accept loop TCP
//! - `metrics`: contadores y latencias por conexión
//! - `config`: argumentos CLI y variables de entorno
//!
//! ## Ejemplo de uso
//!
//! ```no_run
//! use static_server::config::Config;
//! use static_server::server::Server;
//!
//! let server = Server::new(Config::default());
//! let stop = server.shutdown_handle();
//! // `stop.trigger()` desde otro thread termina `run`
//! let stats = server.run().expect("server failed");
//! println!("processed {}", stats.processed);
//! # drop(stop);
//! ```

pub mod config;
pub mod content;
pub mod error;
pub mod http;
pub mod metrics;
pub mod pool;
pub mod server;
