//! # Lectura incremental del request
//! src/http/reader.rs
//!
//! Un único `read()` no garantiza recibir el request completo: TCP puede
//! entregar la request line en varios segmentos. Este módulo acumula bytes en
//! un buffer hasta encontrar el fin de los headers (`\r\n\r\n` o `\n\n`), o
//! hasta que el peer cierre, venza el deadline o se alcance el límite de tamaño.

use super::request::has_request_line;
use std::io::{self, ErrorKind, Read};
use thiserror::Error;

/// Tamaño de cada lectura individual
const READ_CHUNK: usize = 1024;

/// Errores al leer el head del request
#[derive(Debug, Error)]
pub enum ReadError {
    /// El peer cerró la conexión sin enviar bytes
    #[error("peer closed the connection before sending data")]
    PeerClosed,

    /// Venció el deadline antes de tener una request line completa
    #[error("timed out waiting for the request line ({received} bytes received)")]
    TimedOut { received: usize },

    /// Se alcanzó el límite sin ver el fin de la request line
    #[error("request head exceeds {limit} bytes")]
    TooLarge { limit: usize },

    #[error("transport error: {0}")]
    Io(#[from] io::Error),
}

/// Lee el head del request acumulando lecturas parciales
///
/// Retorna el buffer acumulado cuando:
/// - aparece el terminador de headers,
/// - el peer cierra tras haber enviado algo (se usa lo recibido), o
/// - vence el deadline / se llena el buffer pero la request line ya está completa.
///
/// # Ejemplo
///
/// ```
/// use static_server::http::reader::read_request_head;
///
/// let mut input: &[u8] = b"GET / HTTP/1.0\r\nHost: x\r\n\r\n";
/// let head = read_request_head(&mut input, 8192).unwrap();
/// assert!(head.starts_with(b"GET / HTTP/1.0"));
/// ```
pub fn read_request_head<R: Read>(reader: &mut R, max_bytes: usize) -> Result<Vec<u8>, ReadError> {
    let mut buffer = Vec::with_capacity(READ_CHUNK.min(max_bytes));
    let mut chunk = [0u8; READ_CHUNK];

    loop {
        let room = max_bytes.saturating_sub(buffer.len()).min(READ_CHUNK);
        if room == 0 {
            return if has_request_line(&buffer) {
                Ok(buffer)
            } else {
                Err(ReadError::TooLarge { limit: max_bytes })
            };
        }

        match reader.read(&mut chunk[..room]) {
            Ok(0) => {
                return if buffer.is_empty() {
                    Err(ReadError::PeerClosed)
                } else {
                    Ok(buffer)
                };
            }
            Ok(n) => {
                // Solo hace falta revisar la zona nueva (más 3 bytes de solape)
                let scan_from = buffer.len().saturating_sub(3);
                buffer.extend_from_slice(&chunk[..n]);
                if has_header_terminator(&buffer[scan_from..]) {
                    return Ok(buffer);
                }
            }
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {
                return if has_request_line(&buffer) {
                    Ok(buffer)
                } else {
                    Err(ReadError::TimedOut { received: buffer.len() })
                };
            }
            Err(e) => return Err(ReadError::Io(e)),
        }
    }
}

fn has_header_terminator(bytes: &[u8]) -> bool {
    bytes.windows(4).any(|w| w == b"\r\n\r\n") || bytes.windows(2).any(|w| w == b"\n\n")
}
