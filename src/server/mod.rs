//! # Módulo del Servidor HTTP
//! src/server/mod.rs
//!
//! - `connection`: trait de conexión sobre el que trabajan pool y motor
//! - `engine`: máquina de estados de una conexión (leer, clasificar, responder)
//! - `tcp`: listener y accept loop que alimenta el pool

pub mod connection;
pub mod engine;
pub mod tcp;

pub use connection::Connection;
pub use engine::{CloseReason, EngineSettings, Outcome, ProtocolEngine};
pub use tcp::{Server, ShutdownHandle};
