//! # Parsing de la Request Line
//! src/http/request.rs
//!
//! El servidor solo interpreta la primera línea del request:
//!
//! ```text
//! GET /index.html HTTP/1.0\r\n
//! Host: localhost:8080\r\n        <- aceptado pero ignorado
//! \r\n
//! ```
//!
//! `method`, `target` y `version` son los tres primeros tokens separados por
//! espacios. Los tokens extra se ignoran; menos de tres es un request malformado.

use thiserror::Error;

/// Método HTTP del request
///
/// Solo `GET` se sirve; cualquier otro token (incluidos métodos válidos como
/// `POST` o en minúsculas como `get`) termina en 405.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Method {
    /// GET - Obtener un recurso
    Get,

    /// Cualquier otro token
    Other(String),
}

impl Method {
    fn from_token(token: &str) -> Self {
        match token {
            "GET" => Method::Get,
            other => Method::Other(other.to_string()),
        }
    }

    /// Convierte el método a string
    pub fn as_str(&self) -> &str {
        match self {
            Method::Get => "GET",
            Method::Other(token) => token,
        }
    }
}

/// Errores que pueden ocurrir durante el parsing
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// No hay ningún byte que parsear
    #[error("empty request")]
    EmptyRequest,

    /// La request line tiene menos de tres tokens
    #[error("malformed request line: expected 3 tokens, found {found}")]
    MalformedRequestLine { found: usize },
}

/// Request line parseada
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestLine {
    method: Method,
    target: String,
    version: String,
}

impl RequestLine {
    /// Parsea la primera línea de un buffer crudo
    ///
    /// La línea termina en el primer `\n` (con o sin `\r`); si no hay
    /// terminador se usa el buffer completo. Los bytes no UTF-8 se reemplazan
    /// en lugar de rechazar el request.
    ///
    /// # Ejemplo
    ///
    /// ```
    /// use static_server::http::request::{Method, RequestLine};
    ///
    /// let line = RequestLine::parse(b"GET /style.css HTTP/1.0\r\nHost: x\r\n\r\n").unwrap();
    /// assert_eq!(line.method(), &Method::Get);
    /// assert_eq!(line.target(), "/style.css");
    /// assert_eq!(line.version(), "HTTP/1.0");
    /// ```
    pub fn parse(buffer: &[u8]) -> Result<Self, ParseError> {
        if buffer.is_empty() {
            return Err(ParseError::EmptyRequest);
        }

        let first_line = match buffer.iter().position(|&b| b == b'\n') {
            Some(end) => &buffer[..end],
            None => buffer,
        };
        let text = String::from_utf8_lossy(first_line);

        let mut tokens = text.split_whitespace();
        let (method, target, version) = match (tokens.next(), tokens.next(), tokens.next()) {
            (Some(m), Some(t), Some(v)) => (m, t, v),
            (m, t, _) => {
                let found = usize::from(m.is_some()) + usize::from(t.is_some());
                return Err(ParseError::MalformedRequestLine { found });
            }
        };

        Ok(Self {
            method: Method::from_token(method),
            target: target.to_string(),
            version: version.to_string(),
        })
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Identificador del recurso tal como llegó (incluye query si la hay)
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Versión HTTP (solo informativa, no se valida)
    pub fn version(&self) -> &str {
        &self.version
    }
}

/// Retorna true si el buffer ya contiene la request line completa
pub fn has_request_line(buffer: &[u8]) -> bool {
    buffer.contains(&b'\n')
}
