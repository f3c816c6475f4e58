//! # Conexión de Cliente
//! src/server/connection.rs
//!
//! Abstracción mínima de una conexión aceptada: un stream de bytes legible y
//! escribible con deadlines configurables y un cierre explícito. El pool y el
//! motor de protocolo trabajan sobre este trait, así que los tests pueden usar
//! conexiones en memoria.

use std::io::{self, Read, Write};
use std::net::{Shutdown, TcpStream};
use std::time::Duration;

pub trait Connection: Read + Write + Send + 'static {
    /// Identificador del peer para logs
    fn peer(&self) -> String;

    /// Deadlines de lectura y escritura (`None` = sin límite)
    fn set_timeouts(&self, read: Option<Duration>, write: Option<Duration>) -> io::Result<()>;

    /// Cierra la conexión. Consumir `self` garantiza un único cierre.
    fn close(self)
    where
        Self: Sized,
    {
        drop(self);
    }
}

impl Connection for TcpStream {
    fn peer(&self) -> String {
        self.peer_addr()
            .map(|addr| addr.to_string())
            .unwrap_or_else(|_| "unknown".to_string())
    }

    fn set_timeouts(&self, read: Option<Duration>, write: Option<Duration>) -> io::Result<()> {
        self.set_read_timeout(read)?;
        self.set_write_timeout(write)
    }

    fn close(self) {
        // El peer puede haber cerrado ya; no hay nada que hacer con el error
        let _ = self.shutdown(Shutdown::Both);
    }
}
